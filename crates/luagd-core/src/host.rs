//! The engine seam.
//!
//! Everything the binding layer needs from the engine goes through
//! [`HostInterface`]. The engine owns object storage, builtin behavior and
//! the constant tables; the binding layer only marshals values and decides
//! what to call.

use crate::error::HostError;
use crate::math::ObjectId;
use crate::variant::{Variant, VariantType};

/// Native interface of the host engine.
///
/// Implementations must be shareable across threads: constant caches are
/// process-wide and may be filled from any state.
pub trait HostInterface: Send + Sync {
    /// Fetch a named constant of a builtin type.
    fn variant_get_constant_value(
        &self,
        variant_type: VariantType,
        name: &str,
    ) -> Result<Variant, HostError>;

    /// Construct a builtin value with the constructor at `index`.
    fn variant_construct(
        &self,
        variant_type: VariantType,
        index: u32,
        args: &[Variant],
    ) -> Result<Variant, HostError>;

    /// Call a method on a builtin value.
    ///
    /// `target` is mutable because non-const builtin methods may modify the
    /// receiver in place.
    fn variant_call(
        &self,
        target: &mut Variant,
        method: &str,
        args: &[Variant],
    ) -> Result<Variant, HostError>;

    /// Call a static method of a builtin type.
    fn variant_call_static(
        &self,
        variant_type: VariantType,
        method: &str,
        args: &[Variant],
    ) -> Result<Variant, HostError>;

    /// Read a member (such as `x` on a vector) of a builtin value.
    fn variant_get_member(&self, target: &Variant, member: &str) -> Result<Variant, HostError>;

    /// Render a value the way the engine prints it.
    fn variant_stringify(&self, value: &Variant) -> String {
        value.to_string()
    }

    /// Instantiate a class.
    fn classdb_construct_object(&self, class: &str) -> Result<ObjectId, HostError>;

    /// Call a bound class method on an object.
    ///
    /// `class` is the class that declares the method, which may be an
    /// ancestor of the object's class.
    fn object_method_bind_call(
        &self,
        object: ObjectId,
        class: &str,
        method: &str,
        args: &[Variant],
    ) -> Result<Variant, HostError>;

    /// The most derived class of a live object.
    fn object_get_class_name(&self, object: ObjectId) -> Result<String, HostError>;
}
