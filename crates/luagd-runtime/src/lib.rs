//! A minimal Luau-style execution state for native bindings.
//!
//! This crate models the parts of a Luau VM that binding code talks to: the
//! value stack, tables with metatables and read-only flags, userdata, native
//! closures with upvalues, and the `__namecall` fast path for method calls.
//!
//! ```
//! use luagd_runtime::{LuaState, NativeFn};
//!
//! let mut state = LuaState::new();
//! state.push_function(NativeFn::new("double", |state: &mut LuaState| {
//!     let n = state.check_number(1)?;
//!     state.push_number(n * 2.0);
//!     Ok(1)
//! }));
//! state.push_number(21.0);
//! state.call(1, Some(1)).unwrap();
//! assert_eq!(state.to_number(-1), Some(42.0));
//! ```

mod error;
mod native_fn;
mod state;
mod value;

pub use error::{LuaError, LuaResult};
pub use native_fn::{NativeCallable, NativeFn};
pub use state::{LuaState, MAX_CALL_DEPTH, MULTRET};
pub use value::{Key, Table, TableRef, Userdata, UserdataRef, Value, format_number};
