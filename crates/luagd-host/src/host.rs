use log::{trace, warn};
use luagd_core::{HostError, HostInterface, ObjectId, Variant, VariantType};

use crate::builtins;
use crate::classdb::ClassDb;

/// In-process engine backing the bundled API description.
///
/// Builtin behavior is fixed; the class database can be extended before the
/// host is shared.
#[derive(Debug)]
pub struct ReferenceHost {
    classes: ClassDb,
}

impl ReferenceHost {
    /// A host with the core class hierarchy registered.
    pub fn new() -> Self {
        Self::with_classes(ClassDb::with_core_classes())
    }

    pub fn with_classes(classes: ClassDb) -> Self {
        Self { classes }
    }

    pub fn classes(&self) -> &ClassDb {
        &self.classes
    }
}

impl Default for ReferenceHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostInterface for ReferenceHost {
    fn variant_get_constant_value(
        &self,
        variant_type: VariantType,
        name: &str,
    ) -> Result<Variant, HostError> {
        trace!("constant lookup {variant_type}.{name}");
        builtins::constant(variant_type, name).ok_or_else(|| {
            warn!("unknown constant {variant_type}.{name}");
            HostError::ConstantNotFound {
                variant_type,
                name: name.to_owned(),
            }
        })
    }

    fn variant_construct(
        &self,
        variant_type: VariantType,
        index: u32,
        args: &[Variant],
    ) -> Result<Variant, HostError> {
        builtins::construct(variant_type, index, args)
    }

    fn variant_call(
        &self,
        target: &mut Variant,
        method: &str,
        args: &[Variant],
    ) -> Result<Variant, HostError> {
        builtins::call(target, method, args)
    }

    fn variant_call_static(
        &self,
        variant_type: VariantType,
        method: &str,
        args: &[Variant],
    ) -> Result<Variant, HostError> {
        builtins::call_static(variant_type, method, args)
    }

    fn variant_get_member(&self, target: &Variant, member: &str) -> Result<Variant, HostError> {
        builtins::get_member(target, member)
    }

    fn variant_stringify(&self, value: &Variant) -> String {
        match value {
            Variant::Object(id) => match self.classes.class_of(*id) {
                Ok(class) => format!("<{}#{}>", class, id.0),
                Err(_) => "<Freed Object>".to_owned(),
            },
            other => other.to_string(),
        }
    }

    fn classdb_construct_object(&self, class: &str) -> Result<ObjectId, HostError> {
        let id = self.classes.instantiate(class)?;
        trace!("constructed {class} as {id}");
        Ok(id)
    }

    fn object_method_bind_call(
        &self,
        object: ObjectId,
        class: &str,
        method: &str,
        args: &[Variant],
    ) -> Result<Variant, HostError> {
        self.classes.call(object, class, method, args)
    }

    fn object_get_class_name(&self, object: ObjectId) -> Result<String, HostError> {
        self.classes.class_of(object)
    }
}
