//! Lazy builtin constants.
//!
//! A [`BuiltinConstant`] fetches one named constant of one builtin type from
//! the host the first time it is needed and keeps the outcome for the life of
//! the process. The fetch happens at most once per accessor even under
//! concurrent first use; the conversion to the script representation runs on
//! every access.
//!
//! Hand-written accessors use [`builtin_const!`](crate::builtin_const); the
//! registry creates one accessor per constant declared by the API.

use std::borrow::Cow;

use log::trace;
use luagd_core::{HostError, HostInterface, Variant, VariantType};
use luagd_runtime::{LuaError, LuaResult, LuaState};
use once_cell::sync::OnceCell;

use crate::context::BindingContext;
use crate::stack_ops::StackOp;

/// One cached constant of a builtin type.
///
/// A failed lookup is cached too: every later access reports the same error
/// without asking the host again.
pub struct BuiltinConstant {
    variant_type: VariantType,
    name: Cow<'static, str>,
    cell: OnceCell<Result<Variant, HostError>>,
}

impl BuiltinConstant {
    /// An accessor usable in a `static`.
    pub const fn new(variant_type: VariantType, name: &'static str) -> Self {
        Self {
            variant_type,
            name: Cow::Borrowed(name),
            cell: OnceCell::new(),
        }
    }

    pub fn from_owned(variant_type: VariantType, name: String) -> Self {
        Self {
            variant_type,
            name: Cow::Owned(name),
            cell: OnceCell::new(),
        }
    }

    pub fn variant_type(&self) -> VariantType {
        self.variant_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the host has been asked already.
    pub fn is_fetched(&self) -> bool {
        self.cell.get().is_some()
    }

    /// The constant's value, fetching it on first use.
    pub fn value(&self, host: &dyn HostInterface) -> Result<&Variant, HostError> {
        self.cell
            .get_or_init(|| {
                trace!("fetching constant {}.{}", self.variant_type, self.name);
                host.variant_get_constant_value(self.variant_type, &self.name)
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Push the constant as a `T`. Returns the number of results (always 1).
    ///
    /// The state's [`BindingContext`] is only consulted for the first fetch.
    pub fn push_as<T: StackOp>(&self, state: &mut LuaState) -> LuaResult<usize> {
        let value = match self.cell.get() {
            Some(outcome) => outcome.as_ref().map_err(Clone::clone)?,
            None => self.value(BindingContext::from_state(state)?.host())?,
        };
        let converted = T::from_variant(value).ok_or_else(|| {
            LuaError::runtime(format!(
                "constant {}.{} is not a {}",
                self.variant_type,
                self.name,
                T::TYPE_NAME
            ))
        })?;
        T::push(state, converted)?;
        Ok(1)
    }

    /// Push the constant in its natural script representation.
    pub fn push(&self, state: &mut LuaState) -> LuaResult<usize> {
        self.push_as::<Variant>(state)
    }
}

impl std::fmt::Debug for BuiltinConstant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinConstant")
            .field("variant_type", &self.variant_type)
            .field("name", &self.name)
            .field("fetched", &self.is_fetched())
            .finish()
    }
}

/// Define a native function that pushes a builtin constant.
///
/// Each expansion owns its own cached accessor: the host is asked at most
/// once per expansion site, however often and from however many states the
/// function is called.
///
/// ```
/// use luagd_bindings::builtin_const;
/// use luagd_core::{Vector2, VariantType};
/// use luagd_runtime::NativeFn;
///
/// let zero = NativeFn::new("Vector2.ZERO", builtin_const!(VariantType::Vector2, ZERO, Vector2));
/// assert_eq!(zero.name(), "Vector2.ZERO");
/// ```
#[macro_export]
macro_rules! builtin_const {
    ($variant_type:expr, $name:ident, $target:ty) => {{
        fn accessor(
            state: &mut $crate::__private::LuaState,
        ) -> $crate::__private::LuaResult<usize> {
            static CONSTANT: $crate::BuiltinConstant =
                $crate::BuiltinConstant::new($variant_type, stringify!($name));
            CONSTANT.push_as::<$target>(state)
        }
        accessor
    }};
}
