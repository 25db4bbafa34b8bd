//! Builtin value behavior: constants, constructors, methods and members of
//! the math types.

use luagd_core::{Color, HostError, Variant, VariantType, Vector2, Vector2i, Vector3, Vector3i};

pub(crate) fn constant(variant_type: VariantType, name: &str) -> Option<Variant> {
    let value = match (variant_type, name) {
        (VariantType::Vector2, "AXIS_X") => Variant::Int(0),
        (VariantType::Vector2, "AXIS_Y") => Variant::Int(1),
        (VariantType::Vector2, "ZERO") => Vector2::ZERO.into(),
        (VariantType::Vector2, "ONE") => Vector2::ONE.into(),
        (VariantType::Vector2, "LEFT") => Vector2::new(-1.0, 0.0).into(),
        (VariantType::Vector2, "RIGHT") => Vector2::new(1.0, 0.0).into(),
        (VariantType::Vector2, "UP") => Vector2::new(0.0, -1.0).into(),
        (VariantType::Vector2, "DOWN") => Vector2::new(0.0, 1.0).into(),

        (VariantType::Vector2i, "ZERO") => Vector2i::new(0, 0).into(),
        (VariantType::Vector2i, "ONE") => Vector2i::new(1, 1).into(),

        (VariantType::Vector3, "ZERO") => Vector3::ZERO.into(),
        (VariantType::Vector3, "ONE") => Vector3::new(1.0, 1.0, 1.0).into(),
        (VariantType::Vector3, "UP") => Vector3::new(0.0, 1.0, 0.0).into(),
        (VariantType::Vector3, "FORWARD") => Vector3::new(0.0, 0.0, -1.0).into(),

        (VariantType::Vector3i, "ZERO") => Vector3i::new(0, 0, 0).into(),
        (VariantType::Vector3i, "ONE") => Vector3i::new(1, 1, 1).into(),

        (VariantType::Color, "WHITE") => Color::new(1.0, 1.0, 1.0, 1.0).into(),
        (VariantType::Color, "BLACK") => Color::new(0.0, 0.0, 0.0, 1.0).into(),
        (VariantType::Color, "RED") => Color::new(1.0, 0.0, 0.0, 1.0).into(),
        (VariantType::Color, "TRANSPARENT") => Color::new(1.0, 1.0, 1.0, 0.0).into(),

        _ => return None,
    };
    Some(value)
}

// ============================================================================
// Argument Access
// ============================================================================

fn arg<'a>(method: &str, args: &'a [Variant], index: usize) -> Result<&'a Variant, HostError> {
    args.get(index).ok_or_else(|| HostError::InvalidArgument {
        method: method.to_owned(),
        index,
        reason: "missing".into(),
    })
}

fn mismatch(method: &str, index: usize, expected: &str, actual: &Variant) -> HostError {
    HostError::InvalidArgument {
        method: method.to_owned(),
        index,
        reason: format!("expected {expected}, got {}", actual.get_type()),
    }
}

fn float_arg(method: &str, args: &[Variant], index: usize) -> Result<f32, HostError> {
    let value = arg(method, args, index)?;
    value
        .as_float()
        .map(|f| f as f32)
        .ok_or_else(|| mismatch(method, index, "float", value))
}

fn int_arg(method: &str, args: &[Variant], index: usize) -> Result<i32, HostError> {
    let value = arg(method, args, index)?;
    value
        .as_int()
        .and_then(|i| i32::try_from(i).ok())
        .ok_or_else(|| mismatch(method, index, "int", value))
}

fn bool_arg(method: &str, args: &[Variant], index: usize) -> Result<bool, HostError> {
    let value = arg(method, args, index)?;
    value.as_bool().ok_or_else(|| mismatch(method, index, "bool", value))
}

fn vector2_arg(method: &str, args: &[Variant], index: usize) -> Result<Vector2, HostError> {
    match arg(method, args, index)? {
        Variant::Vector2(v) => Ok(*v),
        other => Err(mismatch(method, index, "Vector2", other)),
    }
}

fn vector3_arg(method: &str, args: &[Variant], index: usize) -> Result<Vector3, HostError> {
    match arg(method, args, index)? {
        Variant::Vector3(v) => Ok(*v),
        other => Err(mismatch(method, index, "Vector3", other)),
    }
}

fn color_arg(method: &str, args: &[Variant], index: usize) -> Result<Color, HostError> {
    match arg(method, args, index)? {
        Variant::Color(c) => Ok(*c),
        other => Err(mismatch(method, index, "Color", other)),
    }
}

// ============================================================================
// Construction
// ============================================================================

pub(crate) fn construct(
    variant_type: VariantType,
    index: u32,
    args: &[Variant],
) -> Result<Variant, HostError> {
    const CTOR: &str = "constructor";
    let value = match (variant_type, index, args) {
        (VariantType::Vector2, 0, []) => Vector2::ZERO.into(),
        (VariantType::Vector2, 1, [Variant::Vector2(v)]) => (*v).into(),
        (VariantType::Vector2, 2, [Variant::Vector2i(v)]) => {
            Vector2::new(v.x as f32, v.y as f32).into()
        }
        (VariantType::Vector2, 3, _) => {
            Vector2::new(float_arg(CTOR, args, 0)?, float_arg(CTOR, args, 1)?).into()
        }

        (VariantType::Vector2i, 0, []) => Vector2i::new(0, 0).into(),
        (VariantType::Vector2i, 1, [Variant::Vector2i(v)]) => (*v).into(),
        (VariantType::Vector2i, 2, [Variant::Vector2(v)]) => {
            Vector2i::new(v.x as i32, v.y as i32).into()
        }
        (VariantType::Vector2i, 3, _) => {
            Vector2i::new(int_arg(CTOR, args, 0)?, int_arg(CTOR, args, 1)?).into()
        }

        (VariantType::Vector3, 0, []) => Vector3::ZERO.into(),
        (VariantType::Vector3, 1, [Variant::Vector3(v)]) => (*v).into(),
        (VariantType::Vector3, 2, [Variant::Vector3i(v)]) => {
            Vector3::new(v.x as f32, v.y as f32, v.z as f32).into()
        }
        (VariantType::Vector3, 3, _) => Vector3::new(
            float_arg(CTOR, args, 0)?,
            float_arg(CTOR, args, 1)?,
            float_arg(CTOR, args, 2)?,
        )
        .into(),

        (VariantType::Vector3i, 0, []) => Vector3i::new(0, 0, 0).into(),
        (VariantType::Vector3i, 3, _) => Vector3i::new(
            int_arg(CTOR, args, 0)?,
            int_arg(CTOR, args, 1)?,
            int_arg(CTOR, args, 2)?,
        )
        .into(),

        (VariantType::Color, 0, []) => Color::new(0.0, 0.0, 0.0, 1.0).into(),
        (VariantType::Color, 1, [Variant::Color(c)]) => (*c).into(),
        (VariantType::Color, 3, _) => Color::new(
            float_arg(CTOR, args, 0)?,
            float_arg(CTOR, args, 1)?,
            float_arg(CTOR, args, 2)?,
            1.0,
        )
        .into(),
        (VariantType::Color, 4, _) => Color::new(
            float_arg(CTOR, args, 0)?,
            float_arg(CTOR, args, 1)?,
            float_arg(CTOR, args, 2)?,
            float_arg(CTOR, args, 3)?,
        )
        .into(),

        _ => {
            return Err(HostError::ConstructorNotFound {
                variant_type,
                index,
            });
        }
    };
    Ok(value)
}

// ============================================================================
// Methods
// ============================================================================

pub(crate) fn call(
    target: &mut Variant,
    method: &str,
    args: &[Variant],
) -> Result<Variant, HostError> {
    let result = match (&*target, method) {
        (Variant::Vector2(v), "length") => Variant::Float(v.length() as f64),
        (Variant::Vector2(v), "length_squared") => Variant::Float(v.length_squared() as f64),
        (Variant::Vector2(v), "normalized") => v.normalized().into(),
        (Variant::Vector2(v), "abs") => v.abs().into(),
        (Variant::Vector2(v), "dot") => {
            let with = vector2_arg(method, args, 0)?;
            Variant::Float(v.dot(with) as f64)
        }
        (Variant::Vector2(v), "lerp") => {
            let to = vector2_arg(method, args, 0)?;
            let weight = float_arg(method, args, 1)?;
            Vector2::new(v.x + (to.x - v.x) * weight, v.y + (to.y - v.y) * weight).into()
        }

        (Variant::Vector2i(v), "abs") => v.abs().into(),
        (Variant::Vector3i(v), "abs") => Vector3i::new(v.x.abs(), v.y.abs(), v.z.abs()).into(),

        (Variant::Vector3(v), "length") => Variant::Float(v.length() as f64),
        (Variant::Vector3(v), "normalized") => v.normalized().into(),
        (Variant::Vector3(v), "dot") => {
            let with = vector3_arg(method, args, 0)?;
            Variant::Float(v.dot(with) as f64)
        }
        (Variant::Vector3(v), "cross") => v.cross(vector3_arg(method, args, 0)?).into(),

        (Variant::Color(c), "inverted") => c.inverted().into(),
        (Variant::Color(c), "lerp") => {
            c.lerp(color_arg(method, args, 0)?, float_arg(method, args, 1)?).into()
        }
        (Variant::Color(c), "to_html") => {
            let with_alpha = match args.first() {
                Some(_) => bool_arg(method, args, 0)?,
                None => true,
            };
            Variant::String(to_html(*c, with_alpha))
        }

        (other, _) => {
            return Err(HostError::method_not_found(other.get_type().api_name(), method));
        }
    };
    Ok(result)
}

pub(crate) fn call_static(
    variant_type: VariantType,
    method: &str,
    args: &[Variant],
) -> Result<Variant, HostError> {
    match (variant_type, method) {
        (VariantType::Vector2, "from_angle") => {
            let angle = float_arg(method, args, 0)?;
            Ok(Vector2::new(angle.cos(), angle.sin()).into())
        }
        (VariantType::Color, "from_hsv") => {
            let h = float_arg(method, args, 0)?;
            let s = float_arg(method, args, 1)?;
            let v = float_arg(method, args, 2)?;
            let alpha = match args.get(3) {
                Some(_) => float_arg(method, args, 3)?,
                None => 1.0,
            };
            Ok(from_hsv(h, s, v, alpha).into())
        }
        _ => Err(HostError::method_not_found(variant_type.api_name(), method)),
    }
}

pub(crate) fn get_member(target: &Variant, member: &str) -> Result<Variant, HostError> {
    let value = match (target, member) {
        (Variant::Vector2(v), "x") => Variant::Float(v.x as f64),
        (Variant::Vector2(v), "y") => Variant::Float(v.y as f64),
        (Variant::Vector2i(v), "x") => Variant::Int(v.x as i64),
        (Variant::Vector2i(v), "y") => Variant::Int(v.y as i64),
        (Variant::Vector3(v), "x") => Variant::Float(v.x as f64),
        (Variant::Vector3(v), "y") => Variant::Float(v.y as f64),
        (Variant::Vector3(v), "z") => Variant::Float(v.z as f64),
        (Variant::Vector3i(v), "x") => Variant::Int(v.x as i64),
        (Variant::Vector3i(v), "y") => Variant::Int(v.y as i64),
        (Variant::Vector3i(v), "z") => Variant::Int(v.z as i64),
        (Variant::Color(c), "r") => Variant::Float(c.r as f64),
        (Variant::Color(c), "g") => Variant::Float(c.g as f64),
        (Variant::Color(c), "b") => Variant::Float(c.b as f64),
        (Variant::Color(c), "a") => Variant::Float(c.a as f64),
        (other, _) => {
            return Err(HostError::MemberNotFound {
                variant_type: other.get_type(),
                member: member.to_owned(),
            });
        }
    };
    Ok(value)
}

fn to_html(color: Color, with_alpha: bool) -> String {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    let mut html = format!(
        "{:02x}{:02x}{:02x}",
        channel(color.r),
        channel(color.g),
        channel(color.b)
    );
    if with_alpha {
        html.push_str(&format!("{:02x}", channel(color.a)));
    }
    html
}

fn from_hsv(h: f32, s: f32, v: f32, alpha: f32) -> Color {
    if s <= 0.0 {
        return Color::new(v, v, v, alpha);
    }
    let h = h.rem_euclid(1.0) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match sector as i32 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    Color::new(r, g, b, alpha)
}
