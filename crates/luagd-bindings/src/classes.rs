//! Engine class bindings.

use log::{debug, trace, warn};
use luagd_core::{ObjectId, Variant};
use luagd_runtime::{LuaError, LuaResult, LuaState, NativeFn, Value};

use crate::context::BindingContext;
use crate::library::{newlib, poplib};
use crate::marshal::{collect_args, push_result};
use crate::stack_ops::{StackOp, push_object};

/// Install a library table and instance metatable for every class, parents
/// before children.
///
/// Instantiable classes get `new`; abstract ones get a `new` that raises.
/// Integer constants and enum values are copied into the library.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn open_classes(state: &mut LuaState) -> LuaResult<usize> {
    let ctx = BindingContext::from_state(state)?;
    let mut opened = 0;

    for class in ctx.registry().classes() {
        let name = class.name();
        newlib(state, name, name)?;

        state.push_function(NativeFn::new("class_namecall", class_namecall));
        state.set_field(-3, "__namecall")?;
        state.push_function(NativeFn::new("object_tostring", object_tostring));
        state.set_field(-3, "__tostring")?;
        state.push_function(NativeFn::new("object_eq", object_eq));
        state.set_field(-3, "__eq")?;

        let ctor = if class.is_instantiable() {
            NativeFn::with_upvalues("class_ctor", class_ctor, vec![Value::from(name)])
        } else {
            NativeFn::with_upvalues("class_no_ctor", class_no_ctor, vec![Value::from(name)])
        };
        state.push_function(ctor);
        state.set_field(-2, "new")?;

        for (constant, value) in class.constants() {
            state.push_number(*value as f64);
            state.set_field(-2, constant)?;
        }

        poplib(state, true)?;
        opened += 1;
    }

    debug!("opened {opened} class libraries");
    Ok(opened)
}

fn class_upvalue(state: &LuaState) -> LuaResult<std::rc::Rc<str>> {
    match state.upvalue(1) {
        Some(Value::String(name)) => Ok(name),
        _ => Err(LuaError::runtime("class function is missing its class name")),
    }
}

/// `lib.new()` of an instantiable class. Upvalue: class name.
pub fn class_ctor(state: &mut LuaState) -> LuaResult<usize> {
    let class = class_upvalue(state)?;
    let ctx = BindingContext::from_state(state)?;
    let object = ctx
        .host()
        .classdb_construct_object(&class)
        .inspect_err(|err| warn!("constructing {class} failed: {err}"))?;
    trace!("new {class} {object}");
    push_object(state, object)?;
    Ok(1)
}

/// `lib.new()` of an abstract class. Upvalue: class name.
pub fn class_no_ctor(state: &mut LuaState) -> LuaResult<usize> {
    let class = class_upvalue(state)?;
    Err(LuaError::runtime(format!("class {class} is not instantiable")))
}

/// `__namecall` of a class instance metatable.
///
/// The method is resolved on the object's class and then its ancestors,
/// nearest first, and called on the declaring class.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn class_namecall(state: &mut LuaState) -> LuaResult<usize> {
    let method_name = state
        .namecall_atom()
        .ok_or_else(|| LuaError::runtime("no method name for namecall"))?;
    let object = ObjectId::check(state, 1)?;
    let ctx = BindingContext::from_state(state)?;
    let class = ctx.host().object_get_class_name(object)?;

    let (owner, method) = ctx
        .registry()
        .find_class_method(&class, &method_name)
        .ok_or_else(|| {
            LuaError::runtime(format!("'{method_name}' is not a valid method of {class}"))
        })?;
    trace!(
        "namecall {class}:{method_name} (declared on {})",
        owner.name()
    );

    let args = collect_args(state, 2, method, &ctx)?;
    let result = ctx
        .host()
        .object_method_bind_call(object, owner.name(), method.name(), &args)
        .inspect_err(|err| warn!("{}:{method_name} failed: {err}", owner.name()))?;
    push_result(state, method, result)
}

fn object_tostring(state: &mut LuaState) -> LuaResult<usize> {
    let object = ObjectId::check(state, 1)?;
    let ctx = BindingContext::from_state(state)?;
    let text = ctx.host().variant_stringify(&Variant::Object(object));
    state.push_string(&text);
    Ok(1)
}

fn object_eq(state: &mut LuaState) -> LuaResult<usize> {
    let equal = match (ObjectId::get(state, 1), ObjectId::get(state, 2)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };
    state.push_boolean(equal);
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::bound_state;
    use luagd_core::{HostInterface, Vector2};

    fn opened() -> (LuaState, std::sync::Arc<luagd_host::ReferenceHost>) {
        let (mut state, host) = bound_state();
        crate::open_builtins(&mut state).unwrap();
        open_classes(&mut state).unwrap();
        (state, host)
    }

    fn construct(state: &mut LuaState, class: &str) -> LuaResult<()> {
        state.get_global(class)?;
        state.get_field(-1, "new")?;
        state.remove(-2)?;
        state.call(0, Some(1))
    }

    #[test]
    fn every_class_gets_a_library() {
        let (mut state, _host) = bound_state();
        assert_eq!(open_classes(&mut state).unwrap(), 5);
        assert_eq!(state.get_top(), 0);

        let mt = state.metatable_named("Node2D").unwrap();
        assert!(mt.is_readonly());
        assert!(crate::stack_ops::is_object_metatable(&mt));
    }

    #[test]
    fn constants_and_enum_values_in_library() {
        let (mut state, _host) = opened();
        state.get_global("Node").unwrap();
        state.get_field(-1, "NOTIFICATION_READY").unwrap();
        assert_eq!(state.to_number(-1), Some(13.0));
        state.get_field(-2, "PROCESS_MODE_DISABLED").unwrap();
        assert_eq!(state.to_number(-1), Some(4.0));

        // Inherited constants stay on the declaring class.
        state.get_global("Node2D").unwrap();
        let err = state.get_field(-1, "NOTIFICATION_READY").unwrap_err();
        assert_eq!(
            err.to_string(),
            "'NOTIFICATION_READY' is not a valid member of Node2D"
        );
    }

    #[test]
    fn ctor_creates_object_of_class() {
        let (mut state, host) = opened();
        construct(&mut state, "Node2D").unwrap();

        let object = ObjectId::get(&state, -1).unwrap();
        assert_eq!(host.object_get_class_name(object).unwrap(), "Node2D");
        let ud = state.to_userdata(-1).unwrap();
        assert!(ud.metatable().unwrap().ptr_eq(&state.metatable_named("Node2D").unwrap()));
    }

    #[test]
    fn no_ctor_raises() {
        let (mut state, host) = opened();
        let before = host.classes().object_count();
        let err = construct(&mut state, "CanvasItem").unwrap_err();
        assert_eq!(err.to_string(), "class CanvasItem is not instantiable");
        assert_eq!(host.classes().object_count(), before);
    }

    #[test]
    fn namecall_resolves_through_ancestors() {
        let (mut state, _host) = opened();
        construct(&mut state, "Node2D").unwrap();

        Vector2::push(&mut state, Vector2::new(2.0, 3.0)).unwrap();
        state.call_method("set_position", 1, Some(0)).unwrap();
        assert_eq!(state.get_top(), 0);
    }

    #[test]
    fn namecall_results_follow_return_type() {
        let (mut state, _host) = opened();
        construct(&mut state, "Node2D").unwrap();

        state.push_value(1).unwrap();
        Vector2::push(&mut state, Vector2::new(2.0, 3.0)).unwrap();
        state.call_method("set_position", 1, None).unwrap();
        assert_eq!(state.get_top(), 1);

        state.push_value(1).unwrap();
        state.call_method("get_position", 0, None).unwrap();
        assert_eq!(state.get_top(), 2);
        assert_eq!(Vector2::get(&state, -1), Some(Vector2::new(2.0, 3.0)));
        state.pop(1).unwrap();

        // Declared on CanvasItem.
        state.push_value(1).unwrap();
        state.call_method("hide", 0, None).unwrap();
        state.push_value(1).unwrap();
        state.call_method("is_visible", 0, None).unwrap();
        assert_eq!(bool::get(&state, -1), Some(false));
        state.pop(1).unwrap();

        // Declared on Object.
        state.push_value(1).unwrap();
        state.call_method("get_class", 0, None).unwrap();
        assert_eq!(state.to_str(-1).as_deref(), Some("Node2D"));
    }

    #[test]
    fn namecall_unknown_method() {
        let (mut state, _host) = opened();
        construct(&mut state, "RefCounted").unwrap();
        let err = state.call_method("get_child_count", 0, Some(1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "'get_child_count' is not a valid method of RefCounted"
        );
    }

    #[test]
    fn object_arguments_and_enum_arguments() {
        let (mut state, host) = opened();
        construct(&mut state, "Node").unwrap();
        construct(&mut state, "Node2D").unwrap();

        state.push_value(1).unwrap();
        state.push_value(2).unwrap();
        state.call_method("add_child", 1, Some(0)).unwrap();

        state.push_value(1).unwrap();
        state.push_number(3.0);
        state.call_method("set_process_mode", 1, Some(0)).unwrap();

        let parent = ObjectId::get(&state, 1).unwrap();
        let data = host.classes().object(parent).unwrap();
        assert_eq!(data.get("child_count"), Variant::Int(1));
        assert_eq!(data.get("process_mode"), Variant::Int(3));

        // A RefCounted is not a Node.
        construct(&mut state, "RefCounted").unwrap();
        state.push_value(1).unwrap();
        state.insert(-2).unwrap();
        let err = state.call_method("add_child", 1, Some(0)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid argument #2 (Node expected, got userdata)"
        );
    }

    #[test]
    fn vararg_methods_forward_extra_arguments() {
        let (mut state, _host) = opened();
        construct(&mut state, "Object").unwrap();
        state.push_number(10.0);
        state.push_string("extra");
        Vector2::push(&mut state, Vector2::ONE).unwrap();
        state.call_method("notify", 3, Some(1)).unwrap();
        assert_eq!(state.to_number(-1), Some(2.0));
    }

    #[test]
    fn objects_compare_by_id() {
        let (mut state, _host) = opened();
        construct(&mut state, "Node").unwrap();
        let id = ObjectId::get(&state, 1).unwrap();
        ObjectId::push(&mut state, id).unwrap();

        let first = state.to_userdata(1).unwrap();
        let second = state.to_userdata(2).unwrap();
        assert!(!first.ptr_eq(&second));
        assert!(state.equal(1, 2).unwrap());
        assert_eq!(
            state.to_display_string(1).unwrap(),
            format!("<Node#{}>", id.0)
        );
    }
}
