//! Script-facing errors.
//!
//! A native function that fails returns a [`LuaError`]; the state unwinds
//! the call's stack slots and hands the error back to the caller, where a
//! real Luau runtime would raise it as a script error.

use luagd_core::HostError;
use thiserror::Error;

/// Result alias for everything that runs on a [`LuaState`](crate::LuaState).
pub type LuaResult<T> = Result<T, LuaError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LuaError {
    /// A script error with a free-form message.
    #[error("{0}")]
    Runtime(String),

    /// An argument has the wrong type (or is missing).
    #[error("invalid argument #{index} ({expected} expected, got {actual})")]
    ArgumentType {
        index: i32,
        expected: String,
        actual: &'static str,
    },

    /// A call received the wrong number of arguments.
    #[error("wrong number of arguments: expected {expected}, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("attempt to call a {0} value")]
    NotCallable(&'static str),

    #[error("attempt to index a {0} value")]
    NotIndexable(&'static str),

    #[error("invalid stack index {0}")]
    InvalidIndex(i32),

    #[error("attempt to modify a readonly table")]
    ReadOnly,

    #[error("invalid table key ({0})")]
    InvalidKey(&'static str),

    #[error("stack overflow (call depth exceeded {0})")]
    StackOverflow(usize),

    /// The engine rejected a request.
    #[error(transparent)]
    Host(#[from] HostError),
}

impl LuaError {
    pub fn runtime(message: impl Into<String>) -> Self {
        LuaError::Runtime(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luagd_core::VariantType;

    #[test]
    fn messages() {
        let err = LuaError::ArgumentType {
            index: 2,
            expected: "Vector2".into(),
            actual: "number",
        };
        assert_eq!(
            err.to_string(),
            "invalid argument #2 (Vector2 expected, got number)"
        );

        let err: LuaError = HostError::ConstantNotFound {
            variant_type: VariantType::Color,
            name: "TEAL".into(),
        }
        .into();
        assert_eq!(err.to_string(), "constant 'TEAL' not found on Color");
    }
}
