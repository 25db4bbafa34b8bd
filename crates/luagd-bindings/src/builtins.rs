//! Builtin type bindings: library tables, constant and static method lookup,
//! method dispatch, member access and constructors.

use log::{debug, trace, warn};
use luagd_core::Variant;
use luagd_runtime::{LuaError, LuaResult, LuaState, NativeFn, Value};

use crate::context::BindingContext;
use crate::library::{library_type, newlib, poplib};
use crate::marshal::{check_arg, collect_args, matches_arg, push_result};
use crate::registry::BuiltinBinding;
use crate::stack_ops::{StackOp, get_any_builtin};

/// Install a library table and instance metatable for every builtin type
/// that scripts do not represent natively.
///
/// Returns the number of libraries opened.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn open_builtins(state: &mut LuaState) -> LuaResult<usize> {
    let ctx = BindingContext::from_state(state)?;
    let mut opened = 0;

    for binding in ctx.registry().builtins() {
        if binding.variant_type().is_script_native() {
            continue;
        }
        let name = binding.name();
        newlib(state, name, name)?;

        state.push_function(NativeFn::new("builtin_namecall", builtin_namecall));
        state.set_field(-3, "__namecall")?;
        state.push_function(NativeFn::new("builtin_member_index", builtin_member_index));
        state.set_field(-3, "__index")?;
        state.push_function(NativeFn::new("builtin_tostring", builtin_tostring));
        state.set_field(-3, "__tostring")?;
        state.push_function(NativeFn::new("builtin_eq", builtin_eq));
        state.set_field(-3, "__eq")?;

        state.push_function(NativeFn::with_upvalues(
            "builtin_ctor",
            builtin_ctor,
            vec![Value::from(name)],
        ));
        state.set_field(-2, "new")?;

        poplib(state, false)?;
        opened += 1;
    }

    debug!("opened {opened} builtin libraries");
    Ok(opened)
}

fn binding_for<'a>(ctx: &'a BindingContext, type_name: &str) -> LuaResult<&'a BuiltinBinding> {
    ctx.registry()
        .builtin(type_name)
        .ok_or_else(|| LuaError::runtime(format!("unknown builtin type {type_name}")))
}

fn invalid_member(key: &str, type_name: &str) -> LuaError {
    LuaError::runtime(format!("'{key}' is not a valid member of {type_name}"))
}

fn invalid_method(method: &str, type_name: &str) -> LuaError {
    LuaError::runtime(format!("'{method}' is not a valid method of {type_name}"))
}

// ============================================================================
// Library Index
// ============================================================================

/// `__index` of a library table: `(lib, key)`.
///
/// Constants are pushed through their lazy accessor, builtin enum values as
/// numbers, static methods as bound functions. Anything else is an error.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn builtin_global_index(state: &mut LuaState) -> LuaResult<usize> {
    let key = state.check_string(2)?;
    let type_name = library_type(state, 1).ok_or_else(|| state.arg_error(1, "library"))?;
    let ctx = BindingContext::from_state(state)?;

    let Some(binding) = ctx.registry().builtin(&type_name) else {
        return Err(invalid_member(&key, &type_name));
    };

    if let Some(constant) = binding.constant(&key) {
        trace!("constant {type_name}.{key}");
        return constant.push(state);
    }
    if let Some(value) = binding.enum_value(&key) {
        state.push_number(value as f64);
        return Ok(1);
    }
    if let Some(method) = binding.method(&key).filter(|m| m.is_static()) {
        state.push_function(NativeFn::with_upvalues(
            method.name(),
            builtin_static_call,
            vec![Value::from(binding.name()), Value::from(method.name())],
        ));
        return Ok(1);
    }

    Err(invalid_member(&key, &type_name))
}

/// A static method fetched from a library table. Upvalues: type name,
/// method name.
fn builtin_static_call(state: &mut LuaState) -> LuaResult<usize> {
    let (type_name, method_name) = match (state.upvalue(1), state.upvalue(2)) {
        (Some(Value::String(t)), Some(Value::String(m))) => (t, m),
        _ => return Err(LuaError::runtime("static method is missing its binding")),
    };
    let ctx = BindingContext::from_state(state)?;
    let binding = binding_for(&ctx, &type_name)?;
    let method = binding
        .method(&method_name)
        .ok_or_else(|| invalid_method(&method_name, &type_name))?;

    let args = collect_args(state, 1, method, &ctx)?;
    let result = ctx
        .host()
        .variant_call_static(binding.variant_type(), method.name(), &args)
        .inspect_err(|err| warn!("{type_name}.{method_name} failed: {err}"))?;
    push_result(state, method, result)
}

// ============================================================================
// Instances
// ============================================================================

/// `__namecall` of a builtin instance metatable: `self` at 1, arguments
/// above it, method name from the namecall slot.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn builtin_namecall(state: &mut LuaState) -> LuaResult<usize> {
    let method = state
        .namecall_atom()
        .ok_or_else(|| LuaError::runtime("no method name for namecall"))?;
    call_builtin_method(state, &method)
}

/// Call `method_name` on the builtin value at index 1.
fn call_builtin_method(state: &mut LuaState, method_name: &str) -> LuaResult<usize> {
    let target = get_any_builtin(state, 1).ok_or_else(|| state.arg_error(1, "builtin"))?;
    let ctx = BindingContext::from_state(state)?;
    let type_name = target.get_type().api_name();
    let binding = binding_for(&ctx, type_name)?;

    let method = binding
        .method(method_name)
        .filter(|m| !m.is_static())
        .ok_or_else(|| invalid_method(method_name, type_name))?;
    trace!("namecall {type_name}:{method_name}");

    let args = collect_args(state, 2, method, &ctx)?;
    let mut receiver = target;
    let result = ctx
        .host()
        .variant_call(&mut receiver, method.name(), &args)
        .inspect_err(|err| warn!("{type_name}:{method_name} failed: {err}"))?;

    if !method.is_const() {
        if let Some(ud) = state.to_userdata(1) {
            if let Some(mut payload) = ud.borrow_mut::<Variant>() {
                *payload = receiver;
            }
        }
    }

    push_result(state, method, result)
}

/// A method fetched with `.` instead of `:`. Upvalue: method name.
fn builtin_method(state: &mut LuaState) -> LuaResult<usize> {
    match state.upvalue(1) {
        Some(Value::String(method)) => call_builtin_method(state, &method),
        _ => Err(LuaError::runtime("method is missing its binding")),
    }
}

/// `__index` of a builtin instance metatable: `(self, key)`.
///
/// Members are read through the host; method names yield a function that
/// takes the receiver as its first argument.
pub fn builtin_member_index(state: &mut LuaState) -> LuaResult<usize> {
    let target = get_any_builtin(state, 1).ok_or_else(|| state.arg_error(1, "builtin"))?;
    let key = state.check_string(2)?;
    let ctx = BindingContext::from_state(state)?;
    let type_name = target.get_type().api_name();
    let binding = binding_for(&ctx, type_name)?;

    if binding.member(&key).is_some() {
        let value = ctx.host().variant_get_member(&target, &key)?;
        Variant::push(state, value)?;
        return Ok(1);
    }
    if binding.method(&key).is_some_and(|m| !m.is_static()) {
        state.push_function(NativeFn::with_upvalues(
            &key,
            builtin_method,
            vec![Value::String(key.clone())],
        ));
        return Ok(1);
    }

    Err(invalid_member(&key, type_name))
}

fn builtin_tostring(state: &mut LuaState) -> LuaResult<usize> {
    let target = get_any_builtin(state, 1).ok_or_else(|| state.arg_error(1, "builtin"))?;
    let ctx = BindingContext::from_state(state)?;
    let text = ctx.host().variant_stringify(&target);
    state.push_string(&text);
    Ok(1)
}

fn builtin_eq(state: &mut LuaState) -> LuaResult<usize> {
    let equal = match (get_any_builtin(state, 1), get_any_builtin(state, 2)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };
    state.push_boolean(equal);
    Ok(1)
}

// ============================================================================
// Constructors
// ============================================================================

/// `lib.new(...)`. Upvalue: type name.
///
/// Picks the first declared constructor whose arity and argument types match.
pub fn builtin_ctor(state: &mut LuaState) -> LuaResult<usize> {
    let type_name = match state.upvalue(1) {
        Some(Value::String(name)) => name,
        _ => return Err(LuaError::runtime("constructor is missing its type")),
    };
    let ctx = BindingContext::from_state(state)?;
    let binding = binding_for(&ctx, &type_name)?;
    let count = state.get_top().max(0) as usize;

    let ctor = binding.constructors().iter().find(|ctor| {
        ctor.arguments.len() == count
            && ctor
                .arguments
                .iter()
                .enumerate()
                .all(|(i, ty)| matches_arg(state, i as i32 + 1, ty, &ctx))
    });
    let Some(ctor) = ctor else {
        return Err(LuaError::runtime(format!(
            "no constructor of {type_name} matches the given arguments"
        )));
    };

    let args = ctor
        .arguments
        .iter()
        .enumerate()
        .map(|(i, ty)| check_arg(state, i as i32 + 1, ty, &ctx))
        .collect::<LuaResult<Vec<_>>>()?;
    let value = ctx
        .host()
        .variant_construct(binding.variant_type(), ctor.index, &args)?;
    Variant::push(state, value)?;
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::registry::BindingRegistry;
    use crate::test_support::{CountingHost, bound_state, bound_state_with};
    use luagd_core::api::BuiltinMethodApi;
    use luagd_core::{Color, HostError, HostInterface, ObjectId, VariantType, Vector2, Vector2i};
    use luagd_host::{ReferenceHost, extension_api};

    fn opened() -> LuaState {
        let (mut state, _host) = bound_state();
        open_builtins(&mut state).unwrap();
        state
    }

    fn index_global(state: &mut LuaState, global: &str, key: &str) -> LuaResult<()> {
        state.get_global(global)?;
        match state.get_field(-1, key) {
            Ok(()) => state.remove(-2),
            Err(err) => {
                state.pop(1)?;
                Err(err)
            }
        }
    }

    #[test]
    fn skips_script_native_types() {
        let (mut state, _host) = bound_state();
        let opened = open_builtins(&mut state).unwrap();
        assert_eq!(opened, 5);
        assert_eq!(state.get_top(), 0);

        for name in ["Nil", "bool", "int", "float", "String"] {
            state.get_global(name).unwrap();
            assert!(state.is_none_or_nil(-1), "{name}");
            state.pop(1).unwrap();
        }
        state.get_global("Vector2").unwrap();
        assert!(state.is_readonly(-1));
    }

    #[test]
    fn global_index_serves_constants_lazily() {
        let (mut state, host) = bound_state_with(CountingHost::new());
        open_builtins(&mut state).unwrap();
        assert_eq!(host.constant_lookups(), 0);

        for _ in 0..4 {
            index_global(&mut state, "Vector2", "UP").unwrap();
            assert_eq!(Vector2::get(&state, -1), Some(Vector2::new(0.0, -1.0)));
            state.pop(1).unwrap();
        }
        assert_eq!(host.constant_lookups(), 1);

        index_global(&mut state, "Vector2", "AXIS_X").unwrap();
        assert_eq!(state.to_number(-1), Some(0.0));
        assert_eq!(host.constant_lookups(), 2);
    }

    #[test]
    fn global_index_rejects_unknown_keys() {
        let mut state = opened();
        let err = index_global(&mut state, "Color", "PLAID").unwrap_err();
        assert_eq!(err.to_string(), "'PLAID' is not a valid member of Color");

        // Instance methods are not reachable through the library.
        let err = index_global(&mut state, "Color", "inverted").unwrap_err();
        assert_eq!(err.to_string(), "'inverted' is not a valid member of Color");
    }

    #[test]
    fn static_methods_through_library() {
        let mut state = opened();
        index_global(&mut state, "Color", "from_hsv").unwrap();
        state.push_number(0.0);
        state.push_number(1.0);
        state.push_number(1.0);
        state.call(3, Some(1)).unwrap();
        assert_eq!(Color::get(&state, -1), Some(Color::new(1.0, 0.0, 0.0, 1.0)));
    }

    #[test]
    fn namecall_dispatches_to_host() {
        let mut state = opened();
        Vector2::push(&mut state, Vector2::new(3.0, 4.0)).unwrap();
        state.call_method("length", 0, Some(1)).unwrap();
        assert_eq!(state.to_number(-1), Some(5.0));

        Vector2::push(&mut state, Vector2::new(1.0, 2.0)).unwrap();
        Vector2::push(&mut state, Vector2::new(3.0, 4.0)).unwrap();
        state.call_method("dot", 1, Some(1)).unwrap();
        assert_eq!(state.to_number(-1), Some(11.0));
    }

    #[test]
    fn namecall_checks_arguments() {
        let mut state = opened();
        Vector2::push(&mut state, Vector2::ONE).unwrap();
        state.push_number(1.0);
        let err = state.call_method("dot", 1, Some(1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid argument #2 (Vector2 expected, got number)"
        );

        Vector2::push(&mut state, Vector2::ONE).unwrap();
        let err = state.call_method("dot", 0, Some(1)).unwrap_err();
        assert_eq!(
            err,
            LuaError::ArgumentCount {
                expected: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn namecall_rejects_unknown_and_static_methods() {
        let mut state = opened();
        Vector2::push(&mut state, Vector2::ONE).unwrap();
        let err = state.call_method("explode", 0, Some(1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "'explode' is not a valid method of Vector2"
        );

        Vector2::push(&mut state, Vector2::ONE).unwrap();
        let err = state.call_method("from_angle", 0, Some(1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "'from_angle' is not a valid method of Vector2"
        );
    }

    #[test]
    fn namecall_without_atom_fails() {
        let mut state = opened();
        state.push_function(NativeFn::new("builtin_namecall", builtin_namecall));
        Vector2::push(&mut state, Vector2::ONE).unwrap();
        let err = state.call(1, Some(1)).unwrap_err();
        assert_eq!(err.to_string(), "no method name for namecall");
    }

    #[test]
    fn default_arguments_may_be_omitted() {
        let mut state = opened();
        Color::push(&mut state, Color::new(1.0, 0.0, 0.0, 1.0)).unwrap();
        state.call_method("to_html", 0, Some(1)).unwrap();
        assert_eq!(state.to_str(-1).as_deref(), Some("ff0000ff"));

        Color::push(&mut state, Color::new(1.0, 0.0, 0.0, 1.0)).unwrap();
        state.push_boolean(false);
        state.call_method("to_html", 1, Some(1)).unwrap();
        assert_eq!(state.to_str(-1).as_deref(), Some("ff0000"));
    }

    #[test]
    fn members_and_dot_methods() {
        let mut state = opened();
        Vector2i::push(&mut state, Vector2i::new(-3, 7)).unwrap();

        state.get_field(1, "y").unwrap();
        assert_eq!(state.to_number(-1), Some(7.0));
        state.pop(1).unwrap();

        state.get_field(1, "abs").unwrap();
        state.push_value(1).unwrap();
        state.call(1, Some(1)).unwrap();
        assert_eq!(Vector2i::get(&state, -1), Some(Vector2i::new(3, 7)));
        state.pop(1).unwrap();

        let err = state.get_field(1, "w").unwrap_err();
        assert_eq!(err.to_string(), "'w' is not a valid member of Vector2i");
    }

    #[test]
    fn tostring_and_equality() {
        let mut state = opened();
        Vector2::push(&mut state, Vector2::new(1.0, 2.5)).unwrap();
        Vector2::push(&mut state, Vector2::new(1.0, 2.5)).unwrap();
        Vector2::push(&mut state, Vector2::ZERO).unwrap();

        assert_eq!(state.to_display_string(1).unwrap(), "(1, 2.5)");
        assert!(state.equal(1, 2).unwrap());
        assert!(!state.equal(1, 3).unwrap());
    }

    #[test]
    fn constructors_pick_first_match() {
        let mut state = opened();

        index_global(&mut state, "Vector2", "new").unwrap();
        state.call(0, Some(1)).unwrap();
        assert_eq!(Vector2::get(&state, -1), Some(Vector2::ZERO));

        index_global(&mut state, "Vector2", "new").unwrap();
        state.push_number(1.0);
        state.push_number(2.0);
        state.call(2, Some(1)).unwrap();
        assert_eq!(Vector2::get(&state, -1), Some(Vector2::new(1.0, 2.0)));

        index_global(&mut state, "Vector2", "new").unwrap();
        Vector2i::push(&mut state, Vector2i::new(4, 5)).unwrap();
        state.call(1, Some(1)).unwrap();
        assert_eq!(Vector2::get(&state, -1), Some(Vector2::new(4.0, 5.0)));
    }

    #[test]
    fn constructor_mismatch() {
        let mut state = opened();
        index_global(&mut state, "Vector2i", "new").unwrap();
        state.push_number(1.5);
        state.push_number(2.0);
        let err = state.call(2, Some(1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "no constructor of Vector2i matches the given arguments"
        );
    }

    #[test]
    fn opening_twice_fails() {
        let mut state = opened();
        let err = open_builtins(&mut state).unwrap_err();
        assert_eq!(err.to_string(), "library 'Vector2' is already open");
    }

    /// Reference host whose `Vector2.normalize` rescales the receiver.
    #[derive(Debug, Default)]
    struct InPlaceHost(ReferenceHost);

    impl HostInterface for InPlaceHost {
        fn variant_get_constant_value(
            &self,
            variant_type: VariantType,
            name: &str,
        ) -> Result<Variant, HostError> {
            self.0.variant_get_constant_value(variant_type, name)
        }

        fn variant_construct(
            &self,
            variant_type: VariantType,
            index: u32,
            args: &[Variant],
        ) -> Result<Variant, HostError> {
            self.0.variant_construct(variant_type, index, args)
        }

        fn variant_call(
            &self,
            target: &mut Variant,
            method: &str,
            args: &[Variant],
        ) -> Result<Variant, HostError> {
            if method == "normalize" {
                if let Variant::Vector2(v) = target {
                    *v = v.normalized();
                    return Ok(Variant::Nil);
                }
            }
            self.0.variant_call(target, method, args)
        }

        fn variant_call_static(
            &self,
            variant_type: VariantType,
            method: &str,
            args: &[Variant],
        ) -> Result<Variant, HostError> {
            self.0.variant_call_static(variant_type, method, args)
        }

        fn variant_get_member(&self, target: &Variant, member: &str) -> Result<Variant, HostError> {
            self.0.variant_get_member(target, member)
        }

        fn classdb_construct_object(&self, class: &str) -> Result<ObjectId, HostError> {
            self.0.classdb_construct_object(class)
        }

        fn object_method_bind_call(
            &self,
            object: ObjectId,
            class: &str,
            method: &str,
            args: &[Variant],
        ) -> Result<Variant, HostError> {
            self.0.object_method_bind_call(object, class, method, args)
        }

        fn object_get_class_name(&self, object: ObjectId) -> Result<String, HostError> {
            self.0.object_get_class_name(object)
        }
    }

    #[test]
    fn mutating_method_writes_receiver_back() {
        let mut api = extension_api().unwrap();
        let vector2 = api
            .builtin_classes
            .iter_mut()
            .find(|class| class.name == "Vector2")
            .unwrap();
        vector2.methods.push(BuiltinMethodApi {
            name: "normalize".into(),
            ..Default::default()
        });

        let registry = BindingRegistry::from_api(&api).unwrap();
        let mut state = LuaState::new();
        BindingContext::new(Arc::new(InPlaceHost::default()), Arc::new(registry))
            .install(&mut state);
        open_builtins(&mut state).unwrap();

        Vector2::push(&mut state, Vector2::new(2.0, 0.0)).unwrap();
        state.push_value(1).unwrap();
        state.call_method("normalized", 0, Some(1)).unwrap();
        assert_eq!(Vector2::get(&state, -1), Some(Vector2::new(1.0, 0.0)));
        assert_eq!(Vector2::get(&state, 1), Some(Vector2::new(2.0, 0.0)));
        state.pop(1).unwrap();

        state.push_value(1).unwrap();
        state.call_method("normalize", 0, None).unwrap();
        assert_eq!(state.get_top(), 1);
        assert_eq!(Vector2::get(&state, 1), Some(Vector2::new(1.0, 0.0)));
    }
}
