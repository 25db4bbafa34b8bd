//! Extension API description.
//!
//! The engine publishes its bindable surface as a JSON document (builtin
//! classes, classes, global enums). These types deserialize the subset the
//! binding layer consumes; unknown fields are ignored.
//!
//! ```
//! use luagd_core::api::ExtensionApi;
//!
//! let api = ExtensionApi::from_json(r#"{
//!     "builtin_classes": [
//!         { "name": "Vector2", "constants": [{ "name": "ZERO", "type": "Vector2", "value": "Vector2(0, 0)" }] }
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(api.builtin_classes[0].constants[0].name, "ZERO");
//! ```

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

use crate::error::ApiError;
use crate::variant::VariantType;

bitflags! {
    /// Method qualifiers declared by the API.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodFlags: u8 {
        const CONST = 1 << 0;
        const VARARG = 1 << 1;
        const STATIC = 1 << 2;
        const VIRTUAL = 1 << 3;
    }
}

/// Root of the API document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExtensionApi {
    #[serde(default)]
    pub header: ApiHeader,
    #[serde(default)]
    pub builtin_classes: Vec<BuiltinClassApi>,
    #[serde(default)]
    pub classes: Vec<ClassApi>,
    #[serde(default)]
    pub global_enums: Vec<EnumApi>,
}

impl ExtensionApi {
    /// Parse an API document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ApiError> {
        serde_json::from_str(json).map_err(|e| ApiError::Json(e.to_string()))
    }

    /// Hash of the document's content. Equal descriptions hash equally.
    pub fn fingerprint(&self) -> Result<u64, ApiError> {
        let bytes = serde_json::to_vec(self).map_err(|e| ApiError::Json(e.to_string()))?;
        Ok(xxh64(&bytes, 0))
    }

    /// Find a builtin class by name.
    pub fn builtin_class(&self, name: &str) -> Option<&BuiltinClassApi> {
        self.builtin_classes.iter().find(|class| class.name == name)
    }

    /// Find a class by name.
    pub fn class(&self, name: &str) -> Option<&ClassApi> {
        self.classes.iter().find(|class| class.name == name)
    }
}

/// Engine version information.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiHeader {
    #[serde(default)]
    pub version_major: u32,
    #[serde(default)]
    pub version_minor: u32,
    #[serde(default)]
    pub version_patch: u32,
    #[serde(default)]
    pub version_full_name: String,
}

/// A builtin value type (Vector2, Color, ...).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BuiltinClassApi {
    pub name: String,
    #[serde(default)]
    pub constants: Vec<BuiltinConstantApi>,
    #[serde(default)]
    pub constructors: Vec<ConstructorApi>,
    #[serde(default)]
    pub methods: Vec<BuiltinMethodApi>,
    #[serde(default)]
    pub members: Vec<MemberApi>,
    #[serde(default)]
    pub enums: Vec<EnumApi>,
}

impl BuiltinClassApi {
    /// The builtin type tag this class describes.
    pub fn variant_type(&self) -> Result<VariantType, ApiError> {
        VariantType::from_api_name(&self.name)
            .ok_or_else(|| ApiError::UnknownType(self.name.clone()))
    }
}

/// A builtin constant. `value` is the engine's textual rendering; the
/// actual value is always fetched from the host.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BuiltinConstantApi {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConstructorApi {
    pub index: u32,
    #[serde(default)]
    pub arguments: Vec<ArgumentApi>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BuiltinMethodApi {
    pub name: String,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub is_vararg: bool,
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub arguments: Vec<ArgumentApi>,
}

impl BuiltinMethodApi {
    pub fn flags(&self) -> MethodFlags {
        let mut flags = MethodFlags::empty();
        flags.set(MethodFlags::CONST, self.is_const);
        flags.set(MethodFlags::VARARG, self.is_vararg);
        flags.set(MethodFlags::STATIC, self.is_static);
        flags
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MemberApi {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArgumentApi {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub default_value: Option<String>,
}

/// An engine class (Object, Node, ...).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClassApi {
    pub name: String,
    #[serde(default)]
    pub inherits: Option<String>,
    #[serde(default)]
    pub is_instantiable: bool,
    #[serde(default)]
    pub is_refcounted: bool,
    #[serde(default)]
    pub api_type: String,
    #[serde(default)]
    pub constants: Vec<ClassConstantApi>,
    #[serde(default)]
    pub enums: Vec<EnumApi>,
    #[serde(default)]
    pub methods: Vec<ClassMethodApi>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClassConstantApi {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClassMethodApi {
    pub name: String,
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub is_vararg: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub return_value: Option<ReturnValueApi>,
    #[serde(default)]
    pub arguments: Vec<ArgumentApi>,
}

impl ClassMethodApi {
    pub fn flags(&self) -> MethodFlags {
        let mut flags = MethodFlags::empty();
        flags.set(MethodFlags::CONST, self.is_const);
        flags.set(MethodFlags::VARARG, self.is_vararg);
        flags.set(MethodFlags::STATIC, self.is_static);
        flags.set(MethodFlags::VIRTUAL, self.is_virtual);
        flags
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReturnValueApi {
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnumApi {
    pub name: String,
    #[serde(default)]
    pub is_bitfield: bool,
    #[serde(default)]
    pub values: Vec<EnumValueApi>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnumValueApi {
    pub name: String,
    pub value: i64,
}

/// A declared argument or return type, resolved from its API spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgType {
    /// `Variant`: accepts anything.
    Any,
    /// A builtin value type.
    Builtin(VariantType),
    /// An engine class; passed as an object.
    Class(String),
    /// `enum::X` or `bitfield::X`; passed as an int.
    Enum(String),
}

impl ArgType {
    /// Resolve an API type spelling.
    ///
    /// Class names are not validated here; the registry checks them against
    /// the class list.
    pub fn parse(spelling: &str) -> Self {
        if spelling == "Variant" {
            return ArgType::Any;
        }
        if let Some(name) = spelling
            .strip_prefix("enum::")
            .or_else(|| spelling.strip_prefix("bitfield::"))
        {
            return ArgType::Enum(name.to_owned());
        }
        if spelling.starts_with("typedarray::") {
            return ArgType::Builtin(VariantType::Array);
        }
        match VariantType::from_api_name(spelling) {
            Some(ty) => ArgType::Builtin(ty),
            None => ArgType::Class(spelling.to_owned()),
        }
    }

    /// The builtin type values of this declared type travel as.
    pub fn variant_type(&self) -> Option<VariantType> {
        match self {
            ArgType::Any => None,
            ArgType::Builtin(ty) => Some(*ty),
            ArgType::Class(_) => Some(VariantType::Object),
            ArgType::Enum(_) => Some(VariantType::Int),
        }
    }
}
