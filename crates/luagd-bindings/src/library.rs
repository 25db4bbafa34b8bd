//! Library tables: the globals scripts use to reach a type's constructor,
//! constants and static methods.
//!
//! ```text
//! newlib(state, "Vector2", "Vector2")     stack: [.., instance_mt, lib]
//!   ... install metamethods and library functions ...
//! poplib(state, false)                    stack: [..]
//! ```

use std::rc::Rc;

use luagd_runtime::{LuaError, LuaResult, LuaState, NativeFn, Value};

use crate::builtins::builtin_global_index;
use crate::stack_ops::OBJECT_FLAG;

/// Metatable field naming the type a table describes.
pub const TYPE_FIELD: &str = "__type";

/// Value stored under `__metatable` once a library is finalized.
pub const LOCKED_METATABLE: &str = "The metatable is locked";

/// Create the global library table `global_name` bound to the instance
/// metatable `mt_name`.
///
/// The instance metatable is created if needed. The library gets a metatable
/// whose `__type` is `global_name` and whose `__index` is
/// [`builtin_global_index`]. Leaves `[instance_mt, lib]` on the stack, lib on
/// top; finish with [`poplib`].
pub fn newlib(state: &mut LuaState, global_name: &str, mt_name: &str) -> LuaResult<()> {
    state.new_metatable(mt_name);
    if state.is_readonly(-1) {
        state.pop(1)?;
        return Err(LuaError::runtime(format!("library '{global_name}' is already open")));
    }
    state.push_string(mt_name);
    state.set_field(-2, TYPE_FIELD)?;

    state.new_table();

    state.new_table();
    state.push_string(global_name);
    state.set_field(-2, TYPE_FIELD)?;
    state.push_function(NativeFn::new("builtin_global_index", builtin_global_index));
    state.set_field(-2, "__index")?;
    state.set_metatable(-2)?;

    state.push_value(-1)?;
    state.set_global(global_name)?;
    Ok(())
}

/// Finalize the library left by [`newlib`] and pop both tables.
///
/// With `is_obj` the instance metatable is flagged as an object metatable.
/// Both tables (and the library's metatable) become read-only and their
/// metatables are locked against script access.
pub fn poplib(state: &mut LuaState, is_obj: bool) -> LuaResult<()> {
    let lib = state.check_table(-1)?;
    let mt = state.check_table(-2)?;

    if is_obj {
        mt.set_str(OBJECT_FLAG, Value::Boolean(true))?;
    }
    mt.set_str("__metatable", Value::from(LOCKED_METATABLE))?;

    if let Some(lib_mt) = lib.metatable() {
        lib_mt.set_str("__metatable", Value::from(LOCKED_METATABLE))?;
        lib_mt.set_readonly(true);
    }
    mt.set_readonly(true);
    lib.set_readonly(true);

    state.pop(2)
}

/// The `__type` of the library table at `index`.
pub fn library_type(state: &LuaState, index: i32) -> Option<Rc<str>> {
    let lib = state.to_table(index)?;
    match lib.metatable()?.get_str(TYPE_FIELD) {
        Value::String(name) => Some(name),
        _ => None,
    }
}
