//! Value conversion for bindings whose member type differs from the property type.
//!
//! Built-in conversions cover the primitive numeric types among each other,
//! any primitive to `String` (honoring a display format), and `String` back
//! to primitives by parsing. Further conversions can be registered per
//! `(from, to)` type pair with [`ValueConverter::register`].
//!
//! # Format strings
//!
//! | Format    | Meaning                                        | `3.14159` / `42` |
//! |-----------|------------------------------------------------|------------------|
//! | `F<n>`    | fixed point with `n` decimals (default 2)      | `3.14`           |
//! | `D<n>`    | integer zero-padded to `n` digits              | `0042`           |
//! | `X`, `x`  | hexadecimal integer                            | `2A`, `2a`       |
//! | `P<n>`    | percentage with `n` decimals (default 2)       | `314.16%`        |
//! | `..{0}..` | template; `{0:F1}` applies a nested format     | `Score: 3.1`     |
//!
//! Precisions and widths above 99 are clamped to 99.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::logging::targets;

/// Converts a value, optionally applying a display format.
pub type ConverterFn = fn(&dyn Any, Option<&str>) -> Option<Box<dyn Any>>;

/// Largest precision or width a display format may request.
const MAX_FORMAT_PRECISION: usize = 99;

static CONVERTERS: OnceLock<Mutex<HashMap<(TypeId, TypeId), ConverterFn>>> = OnceLock::new();

fn converters() -> &'static Mutex<HashMap<(TypeId, TypeId), ConverterFn>> {
    CONVERTERS.get_or_init(|| Mutex::new(HashMap::new()))
}

macro_rules! for_numeric_types {
    ($mac:ident) => {
        $mac!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64)
    };
}

fn is_numeric(type_id: TypeId) -> bool {
    macro_rules! check {
        ($($ty:ty),*) => {
            false $(|| type_id == TypeId::of::<$ty>())*
        };
    }
    for_numeric_types!(check)
}

fn is_float(type_id: TypeId) -> bool {
    type_id == TypeId::of::<f32>() || type_id == TypeId::of::<f64>()
}

fn is_text(type_id: TypeId) -> bool {
    type_id == TypeId::of::<String>() || type_id == TypeId::of::<Arc<str>>()
}

fn is_parseable(type_id: TypeId) -> bool {
    is_numeric(type_id)
        || is_text(type_id)
        || type_id == TypeId::of::<bool>()
        || type_id == TypeId::of::<char>()
}

fn as_f64(value: &dyn Any) -> Option<f64> {
    macro_rules! try_numeric {
        ($($ty:ty),*) => {
            $(
                if let Some(value) = value.downcast_ref::<$ty>() {
                    return Some(*value as f64);
                }
            )*
        };
    }
    for_numeric_types!(try_numeric);
    None
}

fn as_i128(value: &dyn Any) -> Option<i128> {
    macro_rules! try_integer {
        ($($ty:ty),*) => {
            $(
                if let Some(value) = value.downcast_ref::<$ty>() {
                    return Some(*value as i128);
                }
            )*
        };
    }
    try_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
    as_f64(value).map(|value| value.round() as i128)
}

fn as_text(value: &dyn Any) -> Option<&str> {
    value
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| value.downcast_ref::<Arc<str>>().map(|text| &**text))
}

fn from_f64(value: f64, to: TypeId) -> Option<Box<dyn Any>> {
    macro_rules! try_into {
        ($($ty:ty),*) => {
            $(
                if to == TypeId::of::<$ty>() {
                    let value = if is_float(to) { value } else { value.round() };
                    return Some(Box::new(value as $ty));
                }
            )*
        };
    }
    for_numeric_types!(try_into);
    None
}

fn parse_into(text: &str, to: TypeId) -> Option<Box<dyn Any>> {
    let text = text.trim();
    macro_rules! try_parse {
        ($($ty:ty),*) => {
            $(
                if to == TypeId::of::<$ty>() {
                    return text.parse::<$ty>().ok().map(|value| Box::new(value) as Box<dyn Any>);
                }
            )*
        };
    }
    for_numeric_types!(try_parse);
    try_parse!(bool, char);
    if to == TypeId::of::<String>() {
        return Some(Box::new(text.to_string()));
    }
    if to == TypeId::of::<Arc<str>>() {
        return Some(Box::new(Arc::<str>::from(text)));
    }
    None
}

/// Render a value for display.
///
/// Returns `None` for types that have no built-in display conversion.
pub fn format_value(value: &dyn Any, format: Option<&str>) -> Option<String> {
    let format = format.map(str::trim).filter(|format| !format.is_empty());

    if let Some(template) = format.filter(|format| format.contains("{0")) {
        return format_template(value, template);
    }
    if let Some(text) = as_text(value) {
        return Some(text.to_string());
    }
    if let Some(value) = value.downcast_ref::<bool>() {
        return Some(value.to_string());
    }
    if let Some(value) = value.downcast_ref::<char>() {
        return Some(value.to_string());
    }

    let number = as_f64(value)?;
    let Some(format) = format else {
        return Some(display_number(value, number));
    };

    let mut chars = format.chars();
    let kind = chars.next();
    let precision = chars
        .as_str()
        .parse::<usize>()
        .ok()
        .map(|precision| precision.min(MAX_FORMAT_PRECISION));

    Some(match kind {
        Some('F' | 'f') => format!("{:.*}", precision.unwrap_or(2), number),
        Some('P' | 'p') => format!("{:.*}%", precision.unwrap_or(2), number * 100.0),
        Some('D' | 'd') => {
            let integer = as_i128(value)?;
            let width = precision.unwrap_or(1);
            if integer < 0 {
                format!("-{:0width$}", integer.unsigned_abs())
            } else {
                format!("{:0width$}", integer)
            }
        }
        Some('X') => format!("{:X}", as_i128(value)?),
        Some('x') => format!("{:x}", as_i128(value)?),
        _ => {
            tracing::trace!(target: targets::BINDING, format, "unknown display format");
            display_number(value, number)
        }
    })
}

fn display_number(value: &dyn Any, number: f64) -> String {
    if let Some(value) = value.downcast_ref::<f32>() {
        value.to_string()
    } else if is_float(value.type_id()) {
        number.to_string()
    } else {
        as_i128(value).map(|value| value.to_string()).unwrap_or_else(|| number.to_string())
    }
}

fn format_template(value: &dyn Any, template: &str) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{0") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}')?;
        let spec = after[..end].strip_prefix(':');
        out.push_str(&format_value(value, spec)?);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}

/// The conversion registry.
pub struct ValueConverter;

impl ValueConverter {
    /// Register a conversion from `From` to `To`, replacing any built-in one.
    pub fn register<From: 'static, To: 'static>(converter: ConverterFn) {
        converters()
            .lock()
            .insert((TypeId::of::<From>(), TypeId::of::<To>()), converter);
    }

    /// Returns `true` if values of type `from` can be converted to `to`.
    pub fn can_convert(from: TypeId, to: TypeId) -> bool {
        if converters().lock().contains_key(&(from, to)) {
            return true;
        }
        if to == TypeId::of::<String>() || to == TypeId::of::<Arc<str>>() {
            return is_parseable(from);
        }
        if is_text(from) {
            return is_parseable(to);
        }
        is_numeric(from) && is_numeric(to)
    }

    /// Convert `value` to the type `to`.
    pub fn convert(value: &dyn Any, to: TypeId, format: Option<&str>) -> Option<Box<dyn Any>> {
        let from = value.type_id();
        let registered = converters().lock().get(&(from, to)).copied();
        if let Some(converter) = registered {
            return converter(value, format);
        }

        if to == TypeId::of::<String>() {
            return format_value(value, format).map(|text| Box::new(text) as Box<dyn Any>);
        }
        if to == TypeId::of::<Arc<str>>() {
            return format_value(value, format).map(|text| Box::new(Arc::<str>::from(text)) as Box<dyn Any>);
        }
        if let Some(text) = as_text(value) {
            return parse_into(text, to);
        }
        if is_numeric(from) {
            return as_f64(value).and_then(|number| from_f64(number, to));
        }
        None
    }

    /// Convert `value` to `T`.
    pub fn convert_to<T: 'static>(value: &dyn Any, format: Option<&str>) -> Option<T> {
        Self::convert(value, TypeId::of::<T>(), format)
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(ValueConverter::convert_to::<f64>(&3i32, None), Some(3.0));
        assert_eq!(ValueConverter::convert_to::<i32>(&2.6f64, None), Some(3));
        assert_eq!(ValueConverter::convert_to::<u8>(&300i32, None), Some(255));
        assert!(ValueConverter::can_convert(TypeId::of::<i64>(), TypeId::of::<f32>()));
    }

    #[test]
    fn test_display_formats() {
        assert_eq!(format_value(&3.14159f64, Some("F2")).as_deref(), Some("3.14"));
        assert_eq!(format_value(&3.14159f64, Some("F")).as_deref(), Some("3.14"));
        assert_eq!(format_value(&42i32, Some("D4")).as_deref(), Some("0042"));
        assert_eq!(format_value(&-7i32, Some("D3")).as_deref(), Some("-007"));
        assert_eq!(format_value(&255u32, Some("X")).as_deref(), Some("FF"));
        assert_eq!(format_value(&255u32, Some("x")).as_deref(), Some("ff"));
        assert_eq!(format_value(&0.5f32, Some("P0")).as_deref(), Some("50%"));
        assert_eq!(format_value(&1.5f32, None).as_deref(), Some("1.5"));
        assert_eq!(format_value(&7u8, None).as_deref(), Some("7"));
    }

    #[test]
    fn test_precision_clamped() {
        let fixed = format_value(&1.0f64, Some("F99999999999")).unwrap();
        assert_eq!(fixed.len(), "1.".len() + 99);
        let padded = format_value(&7i32, Some("D4000")).unwrap();
        assert_eq!(padded.len(), 99);
        let percent = format_value(&0.5f64, Some("P100")).unwrap();
        assert_eq!(percent.len(), "50.".len() + 99 + "%".len());
    }

    #[test]
    fn test_templates() {
        assert_eq!(
            format_value(&"World".to_string(), Some("Hello, {0}!")).as_deref(),
            Some("Hello, World!")
        );
        assert_eq!(
            format_value(&3.14159f64, Some("Score: {0:F1}")).as_deref(),
            Some("Score: 3.1")
        );
        assert_eq!(format_value(&1i32, Some("{0")), None);
    }

    #[test]
    fn test_parsing() {
        assert_eq!(ValueConverter::convert_to::<i32>(&" 12 ".to_string(), None), Some(12));
        assert_eq!(ValueConverter::convert_to::<bool>(&"true".to_string(), None), Some(true));
        assert_eq!(ValueConverter::convert_to::<f32>(&"abc".to_string(), None), None);
        assert_eq!(ValueConverter::convert_to::<String>(&12.5f64, Some("F1")), Some("12.5".to_string()));
    }

    #[test]
    fn test_registered_converter() {
        #[derive(Debug, PartialEq)]
        struct Celsius(f64);

        fn to_celsius(value: &dyn Any, _format: Option<&str>) -> Option<Box<dyn Any>> {
            value
                .downcast_ref::<f64>()
                .map(|f| Box::new(Celsius((f - 32.0) * 5.0 / 9.0)) as Box<dyn Any>)
        }

        assert!(!ValueConverter::can_convert(TypeId::of::<f64>(), TypeId::of::<Celsius>()));
        ValueConverter::register::<f64, Celsius>(to_celsius);
        assert!(ValueConverter::can_convert(TypeId::of::<f64>(), TypeId::of::<Celsius>()));
        assert_eq!(ValueConverter::convert_to::<Celsius>(&212.0f64, None), Some(Celsius(100.0)));
    }
}
