//! Argument marshalling against declared API types.

use luagd_core::api::ArgType;
use luagd_core::{ObjectId, Variant, VariantType};
use luagd_runtime::{LuaError, LuaResult, LuaState, Value};

use crate::context::BindingContext;
use crate::registry::MethodBinding;
use crate::stack_ops::{StackOp, get_builtin, unsupported};

/// Convert the value at `index` to the declared type `ty`.
pub fn check_arg(
    state: &LuaState,
    index: i32,
    ty: &ArgType,
    ctx: &BindingContext,
) -> LuaResult<Variant> {
    match ty {
        ArgType::Any => Variant::get(state, index).ok_or_else(|| unsupported(state, index)),
        ArgType::Enum(name) => i64::get(state, index)
            .map(Variant::Int)
            .ok_or_else(|| state.arg_error(index, name.as_str())),
        ArgType::Class(class) => check_object(state, index, class, ctx),
        ArgType::Builtin(VariantType::Object) => check_object(state, index, "Object", ctx),
        ArgType::Builtin(variant_type) => check_builtin(state, index, *variant_type)
            .ok_or_else(|| state.arg_error(index, variant_type.api_name())),
    }
}

fn check_builtin(state: &LuaState, index: i32, variant_type: VariantType) -> Option<Variant> {
    match variant_type {
        VariantType::Nil => state.is_none_or_nil(index).then_some(Variant::Nil),
        VariantType::Bool => bool::get(state, index).map(Variant::Bool),
        VariantType::Int => i64::get(state, index).map(Variant::Int),
        VariantType::Float => f64::get(state, index).map(Variant::Float),
        VariantType::String => String::get(state, index).map(Variant::String),
        VariantType::StringName => String::get(state, index).map(Variant::StringName),
        other => get_builtin(state, index, other),
    }
}

/// Objects must be instances of `class` or a subclass; nil is accepted.
fn check_object(
    state: &LuaState,
    index: i32,
    class: &str,
    ctx: &BindingContext,
) -> LuaResult<Variant> {
    if matches!(state.value(index), Some(Value::Nil)) {
        return Ok(Variant::Nil);
    }
    let object = ObjectId::get(state, index).ok_or_else(|| state.arg_error(index, class))?;
    let actual = ctx.host().object_get_class_name(object)?;
    if ctx.registry().is_subclass(&actual, class) {
        Ok(Variant::Object(object))
    } else {
        Err(state.arg_error(index, class))
    }
}

/// Whether the value at `index` converts to `ty`, without raising.
pub fn matches_arg(state: &LuaState, index: i32, ty: &ArgType, ctx: &BindingContext) -> bool {
    check_arg(state, index, ty, ctx).is_ok()
}

/// Check the count and types of the arguments from `first` to the top of
/// the frame against `method`, converting them for the host.
pub fn collect_args(
    state: &LuaState,
    first: i32,
    method: &MethodBinding,
    ctx: &BindingContext,
) -> LuaResult<Vec<Variant>> {
    let count = (state.get_top() - first + 1).max(0) as usize;
    if !method.accepts_count(count) {
        let expected = if count < method.required_arguments() {
            method.required_arguments()
        } else {
            method.arguments().len()
        };
        return Err(LuaError::ArgumentCount {
            expected,
            actual: count,
        });
    }

    (0..count)
        .map(|i| check_arg(state, first + i as i32, method.argument_type(i), ctx))
        .collect()
}

/// Push a host result if `method` declares one. Returns the result count.
pub fn push_result(
    state: &mut LuaState,
    method: &MethodBinding,
    result: Variant,
) -> LuaResult<usize> {
    if method.return_type().is_none() {
        return Ok(0);
    }
    Variant::push(state, result)?;
    Ok(1)
}
