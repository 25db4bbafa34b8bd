//! Reference engine for the luagd binding layer.
//!
//! [`ReferenceHost`] implements [`HostInterface`](luagd_core::HostInterface)
//! in-process: the builtin math types with their constants, constructors and
//! methods, and a small class hierarchy (`Object`, `RefCounted`, `Node`,
//! `CanvasItem`, `Node2D`). [`extension_api`] returns the matching API
//! description.

mod builtins;
mod classdb;
mod host;

pub use classdb::{ClassDb, ClassDef, MethodFn, ObjectData};
pub use host::ReferenceHost;

use luagd_core::ApiError;
use luagd_core::api::ExtensionApi;

/// The API description matching [`ReferenceHost`], as JSON.
pub const EXTENSION_API_JSON: &str = include_str!("../data/extension_api.json");

/// Parse [`EXTENSION_API_JSON`].
pub fn extension_api() -> Result<ExtensionApi, ApiError> {
    ExtensionApi::from_json(EXTENSION_API_JSON)
}
