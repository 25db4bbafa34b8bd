//! Global enums, exposed as `Enum.<Name>.<VALUE>`.

use log::debug;
use luagd_runtime::{LuaError, LuaResult, LuaState, Value};

use crate::context::BindingContext;

/// Global table holding one table per global enum.
pub const ENUM_GLOBAL: &str = "Enum";

/// Fill the global `Enum` table with every global enum and lock it.
///
/// Returns the number of enums added.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn open_global_enums(state: &mut LuaState) -> LuaResult<usize> {
    let ctx = BindingContext::from_state(state)?;

    let enums = match state.globals().get_str(ENUM_GLOBAL) {
        Value::Table(table) if table.is_readonly() => {
            return Err(LuaError::runtime("global enums are already open"));
        }
        Value::Table(table) => table,
        Value::Nil => {
            let table = state.new_table();
            state.set_global(ENUM_GLOBAL)?;
            table
        }
        other => {
            return Err(LuaError::runtime(format!(
                "global '{ENUM_GLOBAL}' is a {}",
                other.type_name()
            )));
        }
    };

    for binding in ctx.registry().global_enums() {
        let table = state.new_table();
        for (name, value) in &binding.values {
            table.set_str(name, Value::Number(*value as f64))?;
        }
        table.set_readonly(true);
        state.pop(1)?;
        enums.set_str(&binding.name, Value::Table(table))?;
    }
    enums.set_readonly(true);

    let count = ctx.registry().global_enums().len();
    debug!("opened {count} global enums");
    Ok(count)
}
