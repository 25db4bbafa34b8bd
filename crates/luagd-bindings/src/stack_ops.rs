//! Typed stack adapters.
//!
//! [`StackOp`] moves native values on and off the stack. Builtin math types
//! travel as userdata carrying a [`Variant`] and tagged with the metatable
//! registered under the type's name; objects travel as userdata carrying an
//! [`ObjectId`] under a metatable flagged with [`OBJECT_FLAG`].

use luagd_core::{Color, ObjectId, Variant, VariantType, Vector2, Vector2i, Vector3, Vector3i};
use luagd_runtime::{LuaError, LuaResult, LuaState, TableRef, Value};

use crate::context::BindingContext;

/// Metatable field marking object metatables.
pub const OBJECT_FLAG: &str = "__isobject";

/// Conversion between a native type and stack values.
pub trait StackOp: Sized {
    /// Name used in argument errors.
    const TYPE_NAME: &'static str;

    fn push(state: &mut LuaState, value: Self) -> LuaResult<()>;

    /// Read the value at `index` without raising.
    fn get(state: &LuaState, index: i32) -> Option<Self>;

    /// Convert a host value into this type.
    fn from_variant(variant: &Variant) -> Option<Self>;

    fn is(state: &LuaState, index: i32) -> bool {
        Self::get(state, index).is_some()
    }

    /// Read the value at `index`, raising a typed argument error.
    fn check(state: &LuaState, index: i32) -> LuaResult<Self> {
        Self::get(state, index).ok_or_else(|| state.arg_error(index, Self::TYPE_NAME))
    }
}

// ============================================================================
// Script-Native Types
// ============================================================================

impl StackOp for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn push(state: &mut LuaState, value: Self) -> LuaResult<()> {
        state.push_boolean(value);
        Ok(())
    }

    fn get(state: &LuaState, index: i32) -> Option<Self> {
        match state.value(index)? {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        variant.as_bool()
    }
}

impl StackOp for i64 {
    const TYPE_NAME: &'static str = "integer";

    fn push(state: &mut LuaState, value: Self) -> LuaResult<()> {
        state.push_number(value as f64);
        Ok(())
    }

    fn get(state: &LuaState, index: i32) -> Option<Self> {
        let n = state.to_number(index)?;
        (n.is_finite() && n.fract() == 0.0).then_some(n as i64)
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        variant.as_int()
    }
}

impl StackOp for i32 {
    const TYPE_NAME: &'static str = "integer";

    fn push(state: &mut LuaState, value: Self) -> LuaResult<()> {
        state.push_number(value as f64);
        Ok(())
    }

    fn get(state: &LuaState, index: i32) -> Option<Self> {
        i64::get(state, index).and_then(|n| i32::try_from(n).ok())
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        variant.as_int().and_then(|n| i32::try_from(n).ok())
    }
}

impl StackOp for f64 {
    const TYPE_NAME: &'static str = "number";

    fn push(state: &mut LuaState, value: Self) -> LuaResult<()> {
        state.push_number(value);
        Ok(())
    }

    fn get(state: &LuaState, index: i32) -> Option<Self> {
        state.to_number(index)
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        variant.as_float()
    }
}

impl StackOp for f32 {
    const TYPE_NAME: &'static str = "number";

    fn push(state: &mut LuaState, value: Self) -> LuaResult<()> {
        state.push_number(value as f64);
        Ok(())
    }

    fn get(state: &LuaState, index: i32) -> Option<Self> {
        state.to_number(index).map(|n| n as f32)
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        variant.as_float().map(|n| n as f32)
    }
}

impl StackOp for String {
    const TYPE_NAME: &'static str = "string";

    fn push(state: &mut LuaState, value: Self) -> LuaResult<()> {
        state.push_string(&value);
        Ok(())
    }

    fn get(state: &LuaState, index: i32) -> Option<Self> {
        state.to_str(index).map(|s| s.to_string())
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        variant.as_str().map(str::to_owned)
    }
}

// ============================================================================
// Builtin Userdata
// ============================================================================

/// The metatable registered for builtin type `name`, created on first use.
pub(crate) fn instance_metatable(state: &mut LuaState, name: &str) -> LuaResult<TableRef> {
    if let Some(mt) = state.metatable_named(name) {
        return Ok(mt);
    }
    state.new_metatable(name);
    let mt = state.check_table(-1)?;
    state.pop(1)?;
    Ok(mt)
}

/// Push a builtin value as tagged userdata.
pub fn push_builtin(state: &mut LuaState, value: Variant) -> LuaResult<()> {
    let mt = instance_metatable(state, value.get_type().api_name())?;
    state.new_userdata(value).set_metatable(Some(mt));
    Ok(())
}

/// Builtin value at `index` carrying type `variant_type`.
pub fn get_builtin(state: &LuaState, index: i32, variant_type: VariantType) -> Option<Variant> {
    let ud = state.test_udata(index, variant_type.api_name())?;
    let value = ud.borrow::<Variant>()?;
    (value.get_type() == variant_type).then(|| value.clone())
}

/// Any builtin value at `index`, whatever its type.
pub fn get_any_builtin(state: &LuaState, index: i32) -> Option<Variant> {
    let ud = state.to_userdata(index)?;
    let value = ud.borrow::<Variant>()?.clone();
    get_builtin(state, index, value.get_type())
}

macro_rules! builtin_stack_op {
    ($($ty:ident),* $(,)?) => {
        $(
            impl StackOp for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);

                fn push(state: &mut LuaState, value: Self) -> LuaResult<()> {
                    push_builtin(state, Variant::$ty(value))
                }

                fn get(state: &LuaState, index: i32) -> Option<Self> {
                    match get_builtin(state, index, VariantType::$ty)? {
                        Variant::$ty(value) => Some(value),
                        _ => None,
                    }
                }

                fn from_variant(variant: &Variant) -> Option<Self> {
                    match variant {
                        Variant::$ty(value) => Some(*value),
                        _ => None,
                    }
                }
            }
        )*
    };
}

builtin_stack_op!(Vector2, Vector2i, Vector3, Vector3i, Color);

// ============================================================================
// Objects
// ============================================================================

/// Push an object under the metatable of its class, or of the nearest
/// ancestor that has one.
pub fn push_object(state: &mut LuaState, object: ObjectId) -> LuaResult<()> {
    let ctx = BindingContext::from_state(state)?;
    let class = ctx.host().object_get_class_name(object)?;

    let registered = ctx
        .registry()
        .ancestors(&class)
        .find_map(|c| state.metatable_named(c.name()));
    let mt = match registered {
        Some(mt) => mt,
        None => {
            let mt = instance_metatable(state, VariantType::Object.api_name())?;
            if !mt.is_readonly() {
                mt.set_str(OBJECT_FLAG, Value::Boolean(true))?;
            }
            mt
        }
    };

    state.new_userdata(object).set_metatable(Some(mt));
    Ok(())
}

pub(crate) fn is_object_metatable(mt: &TableRef) -> bool {
    mt.get_str(OBJECT_FLAG).is_truthy()
}

impl StackOp for ObjectId {
    const TYPE_NAME: &'static str = "Object";

    fn push(state: &mut LuaState, value: Self) -> LuaResult<()> {
        push_object(state, value)
    }

    fn get(state: &LuaState, index: i32) -> Option<Self> {
        let ud = state.to_userdata(index)?;
        if !ud.metatable().is_some_and(|mt| is_object_metatable(&mt)) {
            return None;
        }
        ud.borrow::<ObjectId>().map(|id| *id)
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        variant.as_object()
    }
}

// ============================================================================
// Variant
// ============================================================================

impl StackOp for Variant {
    const TYPE_NAME: &'static str = "Variant";

    fn push(state: &mut LuaState, value: Self) -> LuaResult<()> {
        match value {
            Variant::Nil => state.push_nil(),
            Variant::Bool(b) => state.push_boolean(b),
            Variant::Int(i) => state.push_number(i as f64),
            Variant::Float(f) => state.push_number(f),
            Variant::String(s) | Variant::StringName(s) => state.push_string(&s),
            Variant::Object(id) => return push_object(state, id),
            builtin => return push_builtin(state, builtin),
        }
        Ok(())
    }

    /// Numbers read as floats; callers that know the declared type narrow
    /// them.
    fn get(state: &LuaState, index: i32) -> Option<Self> {
        match state.value(index)? {
            Value::Nil => Some(Variant::Nil),
            Value::Boolean(b) => Some(Variant::Bool(*b)),
            Value::Number(n) => Some(Variant::Float(*n)),
            Value::String(s) => Some(Variant::String(s.to_string())),
            Value::Userdata(_) => ObjectId::get(state, index)
                .map(Variant::Object)
                .or_else(|| get_any_builtin(state, index)),
            Value::Table(_) | Value::Function(_) => None,
        }
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        Some(variant.clone())
    }
}

/// Error for a value that has no host representation.
pub(crate) fn unsupported(state: &LuaState, index: i32) -> LuaError {
    state.arg_error(index, Variant::TYPE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::bound_state;
    use luagd_core::HostInterface;

    #[test]
    fn primitives() {
        let mut state = LuaState::new();
        i64::push(&mut state, 7).unwrap();
        f32::push(&mut state, 0.5).unwrap();
        <String as StackOp>::push(&mut state, "name".into()).unwrap();
        bool::push(&mut state, true).unwrap();

        assert_eq!(i64::get(&state, 1), Some(7));
        assert_eq!(i32::get(&state, 1), Some(7));
        assert_eq!(i64::get(&state, 2), None);
        assert_eq!(f64::get(&state, 2), Some(0.5));
        assert_eq!(String::get(&state, 3).as_deref(), Some("name"));
        assert_eq!(bool::get(&state, 4), Some(true));
        assert!(!bool::is(&state, 1));
    }

    #[test]
    fn check_names_expected_type() {
        let mut state = LuaState::new();
        state.push_string("nope");
        let err = Vector2::check(&state, 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid argument #1 (Vector2 expected, got string)"
        );
    }

    #[test]
    fn builtins_are_tagged_by_type() {
        let mut state = LuaState::new();
        Vector2::push(&mut state, Vector2::new(1.0, 2.0)).unwrap();
        Color::push(&mut state, Color::new(0.1, 0.2, 0.3, 1.0)).unwrap();

        assert_eq!(Vector2::get(&state, 1), Some(Vector2::new(1.0, 2.0)));
        assert_eq!(Vector2::get(&state, 2), None);
        assert!(Color::is(&state, 2));
        assert_eq!(
            Variant::get(&state, 1),
            Some(Variant::Vector2(Vector2::new(1.0, 2.0)))
        );
    }

    #[test]
    fn foreign_userdata_is_not_a_builtin() {
        let mut state = LuaState::new();
        state.new_userdata(Variant::Vector2(Vector2::ZERO));
        assert_eq!(Vector2::get(&state, 1), None);
        assert_eq!(Variant::get(&state, 1), None);
    }

    #[test]
    fn objects_round_trip() {
        let (mut state, host) = bound_state();
        let id = host.classdb_construct_object("Node").unwrap();
        ObjectId::push(&mut state, id).unwrap();

        assert_eq!(ObjectId::get(&state, 1), Some(id));
        assert_eq!(Variant::get(&state, 1), Some(Variant::Object(id)));
        let mt = state.to_userdata(1).unwrap().metatable().unwrap();
        assert!(is_object_metatable(&mt));
    }

    #[test]
    fn variant_push_matches_kind() {
        let mut state = LuaState::new();
        Variant::push(&mut state, Variant::Int(3)).unwrap();
        Variant::push(&mut state, Variant::StringName("n".into())).unwrap();
        Variant::push(&mut state, Variant::Nil).unwrap();
        Variant::push(&mut state, Vector3i::new(1, 2, 3).into()).unwrap();

        assert_eq!(state.type_name(1), "number");
        assert_eq!(state.type_name(2), "string");
        assert_eq!(state.type_name(3), "nil");
        assert_eq!(Vector3i::get(&state, 4), Some(Vector3i::new(1, 2, 3)));
    }

    #[test]
    fn tables_have_no_host_value() {
        let mut state = LuaState::new();
        state.new_table();
        assert_eq!(Variant::get(&state, 1), None);
        assert_eq!(
            unsupported(&state, 1).to_string(),
            "invalid argument #1 (Variant expected, got table)"
        );
    }
}
