//! Deterministic hash-based identity for bound types, methods and constants.
//!
//! [`TypeHash`] is a 64-bit hash computed from names, so the binding registry
//! can key its tables before anything is registered and script-side lookups
//! need a single map lookup.
//!
//! # Hash Computation
//!
//! Uses XXHash64 with domain-specific mixing constants so a method and a
//! constant that share a name on the same type never collide.
//!
//! # Examples
//!
//! ```
//! use luagd_core::TypeHash;
//!
//! let vector2 = TypeHash::from_name("Vector2");
//! assert_eq!(vector2, TypeHash::from_name("Vector2"));
//!
//! let length = TypeHash::from_method(vector2, "length");
//! let zero = TypeHash::from_constant(vector2, "length");
//! assert_ne!(length, zero);
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
pub mod hash_constants {
    /// Domain marker for type hashes
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for method hashes
    pub const METHOD: u64 = 0x7d3c8b4a92e15f6d;

    /// Domain marker for constant hashes
    pub const CONSTANT: u64 = 0x5ea77ffbcdf5f302;

    /// Domain marker for member (property) hashes
    pub const MEMBER: u64 = 0x3e9f5d2a8c7b1403;

    /// Separator mixed between owner and name
    pub const SEP: u64 = 0x4bc94d6bd06053ad;
}

/// A deterministic 64-bit hash identifying a type, method, member or constant.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a type or class name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Create a method hash from the owning type and the method name.
    ///
    /// Engine methods are not overloaded by signature, so the name is enough.
    #[inline]
    pub fn from_method(owner: TypeHash, name: &str) -> Self {
        Self::mix(hash_constants::METHOD, owner, name)
    }

    /// Create a constant hash from the owning type and the constant name.
    #[inline]
    pub fn from_constant(owner: TypeHash, name: &str) -> Self {
        Self::mix(hash_constants::CONSTANT, owner, name)
    }

    /// Create a member hash from the owning type and the member name.
    #[inline]
    pub fn from_member(owner: TypeHash, name: &str) -> Self {
        Self::mix(hash_constants::MEMBER, owner, name)
    }

    #[inline]
    fn mix(domain: u64, owner: TypeHash, name: &str) -> Self {
        let hash = (domain ^ owner.0)
            .wrapping_mul(hash_constants::SEP)
            .wrapping_add(xxh64(name.as_bytes(), 0));
        TypeHash(hash)
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
