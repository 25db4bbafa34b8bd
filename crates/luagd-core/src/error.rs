//! Error types shared across the binding layer.
//!
//! ```text
//! HostError - the engine refused or could not resolve a request
//! ApiError  - the extension API description is malformed or inconsistent
//! ```

use thiserror::Error;

use crate::variant::VariantType;

/// Errors reported by a [`HostInterface`](crate::HostInterface).
///
/// `Clone` so a failed lookup can be cached and replayed without asking the
/// host again.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// The builtin type has no constant with this name.
    #[error("constant '{name}' not found on {variant_type}")]
    ConstantNotFound {
        variant_type: VariantType,
        name: String,
    },

    /// The type or class has no method with this name.
    #[error("method '{method}' not found on {owner}")]
    MethodNotFound { owner: String, method: String },

    /// The type has no member with this name.
    #[error("member '{member}' not found on {variant_type}")]
    MemberNotFound {
        variant_type: VariantType,
        member: String,
    },

    /// The builtin type has no constructor with this index.
    #[error("constructor {index} not found on {variant_type}")]
    ConstructorNotFound {
        variant_type: VariantType,
        index: u32,
    },

    /// The class is not registered with the engine.
    #[error("class '{0}' not found")]
    ClassNotFound(String),

    /// The class exists but cannot be instantiated.
    #[error("class '{0}' is not instantiable")]
    NotInstantiable(String),

    /// The object id does not refer to a live object.
    #[error("invalid object id {0}")]
    InvalidObject(u64),

    /// An argument was rejected by the engine.
    #[error("invalid argument {index} to '{method}': {reason}")]
    InvalidArgument {
        method: String,
        index: usize,
        reason: String,
    },

    /// The call reached the engine but failed there.
    #[error("call to '{method}' failed: {reason}")]
    CallFailed { method: String, reason: String },
}

impl HostError {
    pub fn method_not_found(owner: impl Into<String>, method: impl Into<String>) -> Self {
        HostError::MethodNotFound {
            owner: owner.into(),
            method: method.into(),
        }
    }

    pub fn call_failed(method: impl Into<String>, reason: impl Into<String>) -> Self {
        HostError::CallFailed {
            method: method.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while reading or validating the extension API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// The document is not valid JSON or does not match the expected shape.
    #[error("invalid extension API document: {0}")]
    Json(String),

    /// A builtin class name does not match any builtin type tag.
    #[error("unknown builtin type '{0}'")]
    UnknownType(String),

    /// A class inherits from a class that is not in the document.
    #[error("class '{class}' inherits unknown class '{parent}'")]
    UnknownParent { class: String, parent: String },

    /// A name is declared twice.
    #[error("duplicate declaration of '{0}'")]
    Duplicate(String),

    /// The inheritance graph contains a cycle.
    #[error("inheritance cycle involving class '{0}'")]
    InheritanceCycle(String),

    /// A signature uses a builtin type that has no value representation.
    #[error("'{item}' uses unsupported type {ty}")]
    UnsupportedType { item: String, ty: VariantType },
}
