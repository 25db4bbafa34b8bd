//! Engine builtin type tags and the host value type.
//!
//! - [`VariantType`]: the engine's builtin type tag, with its fixed ordinals
//! - [`Variant`]: a value moving across the host boundary

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::math::{Color, ObjectId, Vector2, Vector2i, Vector3, Vector3i};

/// Builtin type tag.
///
/// The discriminants are the engine's ordinals and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum VariantType {
    Nil = 0,
    Bool = 1,
    Int = 2,
    Float = 3,
    String = 4,
    Vector2 = 5,
    Vector2i = 6,
    Rect2 = 7,
    Rect2i = 8,
    Vector3 = 9,
    Vector3i = 10,
    Transform2D = 11,
    Vector4 = 12,
    Vector4i = 13,
    Plane = 14,
    Quaternion = 15,
    Aabb = 16,
    Basis = 17,
    Transform3D = 18,
    Projection = 19,
    Color = 20,
    StringName = 21,
    NodePath = 22,
    Rid = 23,
    Object = 24,
    Callable = 25,
    Signal = 26,
    Dictionary = 27,
    Array = 28,
    PackedByteArray = 29,
    PackedInt32Array = 30,
    PackedInt64Array = 31,
    PackedFloat32Array = 32,
    PackedFloat64Array = 33,
    PackedStringArray = 34,
    PackedVector2Array = 35,
    PackedVector3Array = 36,
    PackedColorArray = 37,
}

impl VariantType {
    /// All tags in ordinal order.
    pub const ALL: [VariantType; 38] = [
        VariantType::Nil,
        VariantType::Bool,
        VariantType::Int,
        VariantType::Float,
        VariantType::String,
        VariantType::Vector2,
        VariantType::Vector2i,
        VariantType::Rect2,
        VariantType::Rect2i,
        VariantType::Vector3,
        VariantType::Vector3i,
        VariantType::Transform2D,
        VariantType::Vector4,
        VariantType::Vector4i,
        VariantType::Plane,
        VariantType::Quaternion,
        VariantType::Aabb,
        VariantType::Basis,
        VariantType::Transform3D,
        VariantType::Projection,
        VariantType::Color,
        VariantType::StringName,
        VariantType::NodePath,
        VariantType::Rid,
        VariantType::Object,
        VariantType::Callable,
        VariantType::Signal,
        VariantType::Dictionary,
        VariantType::Array,
        VariantType::PackedByteArray,
        VariantType::PackedInt32Array,
        VariantType::PackedInt64Array,
        VariantType::PackedFloat32Array,
        VariantType::PackedFloat64Array,
        VariantType::PackedStringArray,
        VariantType::PackedVector2Array,
        VariantType::PackedVector3Array,
        VariantType::PackedColorArray,
    ];

    /// The name the extension API uses for this type.
    pub const fn api_name(self) -> &'static str {
        match self {
            VariantType::Nil => "Nil",
            VariantType::Bool => "bool",
            VariantType::Int => "int",
            VariantType::Float => "float",
            VariantType::String => "String",
            VariantType::Vector2 => "Vector2",
            VariantType::Vector2i => "Vector2i",
            VariantType::Rect2 => "Rect2",
            VariantType::Rect2i => "Rect2i",
            VariantType::Vector3 => "Vector3",
            VariantType::Vector3i => "Vector3i",
            VariantType::Transform2D => "Transform2D",
            VariantType::Vector4 => "Vector4",
            VariantType::Vector4i => "Vector4i",
            VariantType::Plane => "Plane",
            VariantType::Quaternion => "Quaternion",
            VariantType::Aabb => "AABB",
            VariantType::Basis => "Basis",
            VariantType::Transform3D => "Transform3D",
            VariantType::Projection => "Projection",
            VariantType::Color => "Color",
            VariantType::StringName => "StringName",
            VariantType::NodePath => "NodePath",
            VariantType::Rid => "RID",
            VariantType::Object => "Object",
            VariantType::Callable => "Callable",
            VariantType::Signal => "Signal",
            VariantType::Dictionary => "Dictionary",
            VariantType::Array => "Array",
            VariantType::PackedByteArray => "PackedByteArray",
            VariantType::PackedInt32Array => "PackedInt32Array",
            VariantType::PackedInt64Array => "PackedInt64Array",
            VariantType::PackedFloat32Array => "PackedFloat32Array",
            VariantType::PackedFloat64Array => "PackedFloat64Array",
            VariantType::PackedStringArray => "PackedStringArray",
            VariantType::PackedVector2Array => "PackedVector2Array",
            VariantType::PackedVector3Array => "PackedVector3Array",
            VariantType::PackedColorArray => "PackedColorArray",
        }
    }

    /// Look a tag up by its extension API name.
    pub fn from_api_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.api_name() == name)
    }

    /// Whether scripts see values of this type as native script values
    /// (nil, boolean, number, string) rather than as bound userdata.
    pub const fn is_script_native(self) -> bool {
        matches!(
            self,
            VariantType::Nil
                | VariantType::Bool
                | VariantType::Int
                | VariantType::Float
                | VariantType::String
        )
    }

    /// Whether [`Variant`] can carry values of this type.
    pub const fn has_value_model(self) -> bool {
        matches!(
            self,
            VariantType::Nil
                | VariantType::Bool
                | VariantType::Int
                | VariantType::Float
                | VariantType::String
                | VariantType::StringName
                | VariantType::Vector2
                | VariantType::Vector2i
                | VariantType::Vector3
                | VariantType::Vector3i
                | VariantType::Color
                | VariantType::Object
        )
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// A value crossing the host boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    StringName(String),
    Vector2(Vector2),
    Vector2i(Vector2i),
    Vector3(Vector3),
    Vector3i(Vector3i),
    Color(Color),
    Object(ObjectId),
}

impl Variant {
    /// The builtin type tag of this value.
    pub fn get_type(&self) -> VariantType {
        match self {
            Variant::Nil => VariantType::Nil,
            Variant::Bool(_) => VariantType::Bool,
            Variant::Int(_) => VariantType::Int,
            Variant::Float(_) => VariantType::Float,
            Variant::String(_) => VariantType::String,
            Variant::StringName(_) => VariantType::StringName,
            Variant::Vector2(_) => VariantType::Vector2,
            Variant::Vector2i(_) => VariantType::Vector2i,
            Variant::Vector3(_) => VariantType::Vector3,
            Variant::Vector3i(_) => VariantType::Vector3i,
            Variant::Color(_) => VariantType::Color,
            Variant::Object(_) => VariantType::Object,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Variant::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Variant::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float view of the value; ints widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Variant::Float(v) => Some(*v),
            Variant::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) | Variant::StringName(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Variant::Object(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Nil => write!(f, "null"),
            Variant::Bool(v) => write!(f, "{}", v),
            Variant::Int(v) => write!(f, "{}", v),
            Variant::Float(v) => write!(f, "{}", v),
            Variant::String(s) | Variant::StringName(s) => write!(f, "{}", s),
            Variant::Vector2(v) => write!(f, "{}", v),
            Variant::Vector2i(v) => write!(f, "{}", v),
            Variant::Vector3(v) => write!(f, "{}", v),
            Variant::Vector3i(v) => write!(f, "{}", v),
            Variant::Color(v) => write!(f, "{}", v),
            Variant::Object(id) => write!(f, "{}", id),
        }
    }
}

macro_rules! impl_variant_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Variant {
                fn from(value: $ty) -> Self {
                    Variant::$variant(value)
                }
            }
        )*
    };
}

impl_variant_from!(
    bool => Bool,
    i64 => Int,
    f64 => Float,
    String => String,
    Vector2 => Vector2,
    Vector2i => Vector2i,
    Vector3 => Vector3,
    Vector3i => Vector3i,
    Color => Color,
    ObjectId => Object,
);

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Variant::Int(value as i64)
    }
}

impl From<f32> for Variant {
    fn from(value: f32) -> Self {
        Variant::Float(value as f64)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_round_trip() {
        for (ordinal, ty) in VariantType::ALL.iter().enumerate() {
            assert_eq!(u32::from(*ty), ordinal as u32);
            assert_eq!(VariantType::try_from(ordinal as u32).unwrap(), *ty);
        }
        assert!(VariantType::try_from(38u32).is_err());
    }

    #[test]
    fn api_names() {
        assert_eq!(
            VariantType::from_api_name("Vector2"),
            Some(VariantType::Vector2)
        );
        assert_eq!(VariantType::from_api_name("AABB"), Some(VariantType::Aabb));
        assert_eq!(VariantType::from_api_name("Node"), None);
        assert_eq!(VariantType::Rid.to_string(), "RID");
    }

    #[test]
    fn script_native_types() {
        assert!(VariantType::Float.is_script_native());
        assert!(VariantType::String.is_script_native());
        assert!(!VariantType::StringName.is_script_native());
        assert!(!VariantType::Vector2.is_script_native());
    }

    #[test]
    fn value_model_covers_every_variant_case() {
        let modelled: Vec<_> = VariantType::ALL
            .into_iter()
            .filter(|ty| ty.has_value_model())
            .collect();
        assert_eq!(modelled.len(), 12);
        assert!(modelled.contains(&Variant::from(ObjectId(1)).get_type()));
        assert!(!VariantType::Array.has_value_model());
        assert!(!VariantType::Dictionary.has_value_model());
    }

    #[test]
    fn get_type_matches_variant() {
        assert_eq!(Variant::Nil.get_type(), VariantType::Nil);
        assert_eq!(
            Variant::from(Color::default()).get_type(),
            VariantType::Color
        );
        assert_eq!(Variant::from(ObjectId(3)).get_type(), VariantType::Object);
    }
}
