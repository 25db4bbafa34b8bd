//! Shared vocabulary for the luagd binding layer.
//!
//! - [`TypeHash`]: deterministic identity for types, methods and constants
//! - [`Variant`] / [`VariantType`]: values and type tags crossing the host boundary
//! - [`api`]: the engine's extension API description
//! - [`HostInterface`]: the engine seam
//! - [`HostError`] / [`ApiError`]: shared error types

pub mod api;
mod error;
mod host;
pub mod math;
mod type_hash;
mod variant;

pub use error::{ApiError, HostError};
pub use host::HostInterface;
pub use math::{Color, ObjectId, Vector2, Vector2i, Vector3, Vector3i};
pub use type_hash::{TypeHash, hash_constants};
pub use variant::{Variant, VariantType};
