//! Binds a host engine's builtin types, classes and constants into an
//! embedded Luau runtime.
//!
//! - [`core`]: variants, type hashes, the API description and the engine seam
//! - [`lua`]: the scripting state and its value model
//! - [`bindings`]: library tables, lazy constants and method dispatch
//! - [`host`]: an in-process reference engine
//!
//! [`Runtime`] wires the pieces together:
//!
//! ```
//! use luagd::Runtime;
//!
//! let mut runtime = Runtime::reference().unwrap();
//! let state = runtime.state_mut();
//!
//! state.get_global("Node2D").unwrap();
//! state.get_field(-1, "new").unwrap();
//! state.call(0, Some(1)).unwrap();
//! state.call_method("get_class", 0, Some(1)).unwrap();
//! assert_eq!(state.to_str(-1).as_deref(), Some("Node2D"));
//! ```

mod runtime;

pub use luagd_bindings as bindings;
pub use luagd_core as core;
pub use luagd_host as host;
pub use luagd_runtime as lua;

pub use luagd_bindings::{BindingContext, BindingRegistry, BuiltinConstant, builtin_const};
pub use luagd_core::{
    ApiError, Color, HostError, HostInterface, ObjectId, Variant, VariantType, Vector2, Vector2i,
    Vector3, Vector3i,
};
pub use luagd_runtime::{LuaError, LuaResult, LuaState, NativeFn, Value};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeError};

pub mod prelude {
    pub use crate::bindings::StackOp;
    pub use crate::{
        BindingContext, HostInterface, LuaError, LuaResult, LuaState, NativeFn, Runtime,
        RuntimeBuilder, RuntimeError, Value, Variant, VariantType,
    };
}
