//! Bindings between a host engine and a Luau state.
//!
//! Every engine type becomes a global library table plus an instance
//! metatable:
//!
//! - builtin value types ([`open_builtins`]): lazily fetched constants,
//!   static methods, constructors, member access and `:method()` calls
//! - engine classes ([`open_classes`]): `new` (or a raising `new` for
//!   abstract classes), integer constants, and `:method()` calls resolved
//!   through the class hierarchy
//! - global enums ([`open_global_enums`]) under `Enum`
//!
//! All of it is driven by a [`BindingRegistry`] built from the engine's API
//! description and a [`BindingContext`] installed on the state.
//!
//! ```
//! use std::sync::Arc;
//! use luagd_bindings::{BindingContext, BindingRegistry, open_builtins};
//! use luagd_host::{ReferenceHost, extension_api};
//! use luagd_runtime::LuaState;
//!
//! let registry = BindingRegistry::from_api(&extension_api().unwrap()).unwrap();
//! let mut state = LuaState::new();
//! BindingContext::new(Arc::new(ReferenceHost::new()), Arc::new(registry)).install(&mut state);
//!
//! open_builtins(&mut state).unwrap();
//! state.get_global("Vector2").unwrap();
//! state.get_field(-1, "ONE").unwrap();
//! assert_eq!(state.to_display_string(-1).unwrap(), "(1, 1)");
//! ```

mod builtins;
mod classes;
mod constant;
mod context;
mod enums;
mod library;
mod marshal;
mod registry;
mod stack_ops;

pub use builtins::{
    builtin_ctor, builtin_global_index, builtin_member_index, builtin_namecall, open_builtins,
};
pub use classes::{class_ctor, class_namecall, class_no_ctor, open_classes};
pub use constant::BuiltinConstant;
pub use context::BindingContext;
pub use enums::{ENUM_GLOBAL, open_global_enums};
pub use library::{LOCKED_METATABLE, TYPE_FIELD, library_type, newlib, poplib};
pub use marshal::{check_arg, collect_args, matches_arg, push_result};
pub use registry::{
    Ancestors, BindingRegistry, BuiltinBinding, ClassBinding, ConstructorBinding, EnumBinding,
    MethodBinding,
};
pub use stack_ops::{OBJECT_FLAG, StackOp, get_any_builtin, get_builtin, push_builtin, push_object};

#[doc(hidden)]
pub mod __private {
    pub use luagd_runtime::{LuaResult, LuaState};
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use luagd_core::{HostError, HostInterface, ObjectId, Variant, VariantType};
    use luagd_host::{ReferenceHost, extension_api};
    use luagd_runtime::LuaState;

    use crate::{BindingContext, BindingRegistry};

    /// Reference host that counts constant lookups.
    #[derive(Debug, Default)]
    pub struct CountingHost {
        inner: ReferenceHost,
        lookups: AtomicUsize,
    }

    impl CountingHost {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn constant_lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    impl HostInterface for CountingHost {
        fn variant_get_constant_value(
            &self,
            variant_type: VariantType,
            name: &str,
        ) -> Result<Variant, HostError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.variant_get_constant_value(variant_type, name)
        }

        fn variant_construct(
            &self,
            variant_type: VariantType,
            index: u32,
            args: &[Variant],
        ) -> Result<Variant, HostError> {
            self.inner.variant_construct(variant_type, index, args)
        }

        fn variant_call(
            &self,
            target: &mut Variant,
            method: &str,
            args: &[Variant],
        ) -> Result<Variant, HostError> {
            self.inner.variant_call(target, method, args)
        }

        fn variant_call_static(
            &self,
            variant_type: VariantType,
            method: &str,
            args: &[Variant],
        ) -> Result<Variant, HostError> {
            self.inner.variant_call_static(variant_type, method, args)
        }

        fn variant_get_member(&self, target: &Variant, member: &str) -> Result<Variant, HostError> {
            self.inner.variant_get_member(target, member)
        }

        fn variant_stringify(&self, value: &Variant) -> String {
            self.inner.variant_stringify(value)
        }

        fn classdb_construct_object(&self, class: &str) -> Result<ObjectId, HostError> {
            self.inner.classdb_construct_object(class)
        }

        fn object_method_bind_call(
            &self,
            object: ObjectId,
            class: &str,
            method: &str,
            args: &[Variant],
        ) -> Result<Variant, HostError> {
            self.inner.object_method_bind_call(object, class, method, args)
        }

        fn object_get_class_name(&self, object: ObjectId) -> Result<String, HostError> {
            self.inner.object_get_class_name(object)
        }
    }

    pub fn bound_state() -> (LuaState, Arc<ReferenceHost>) {
        bound_state_with(ReferenceHost::new())
    }

    /// A state with a context for `host` and the bundled API installed.
    pub fn bound_state_with<H: HostInterface + 'static>(host: H) -> (LuaState, Arc<H>) {
        let api = extension_api().expect("bundled api parses");
        let registry = BindingRegistry::from_api(&api).expect("bundled api is consistent");
        let host = Arc::new(host);
        let mut state = LuaState::new();
        BindingContext::new(host.clone(), Arc::new(registry)).install(&mut state);
        (state, host)
    }
}
