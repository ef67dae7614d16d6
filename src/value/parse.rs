//! Parsing value text into typed values.
//!
//! Integer literals follow the C convention the display formats mirror:
//! `0x` prefix is hexadecimal, a leading `0` is octal, everything else
//! decimal. Dates are `YYYY/MM/DD` or ISO basic `YYYYMMDD`; times are
//! ISO basic `YYYYMMDDThhmmss`, UTC.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use smol_str::SmolStr;

use crate::error::{OksError, Result};

use super::{EnumValue, Kind, Value};

/// Split off an optional sign and return the digit text with its radix.
fn int_radix(text: &str) -> (&str, u32) {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        (hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (&digits[1..], 8)
    } else {
        (digits, 10)
    }
}

fn parse_signed(text: &str, type_name: &'static str) -> Result<i64> {
    let negative = text.starts_with('-');
    let (digits, radix) = int_radix(text);
    let magnitude = u64::from_str_radix(digits, radix)
        .map_err(|e| OksError::value_read(text, type_name, e.to_string()))?;
    if negative {
        if magnitude > i64::MIN.unsigned_abs() {
            return Err(OksError::value_read(text, type_name, "out of bounds"));
        }
        Ok((magnitude as i64).wrapping_neg())
    } else {
        i64::try_from(magnitude).map_err(|_| OksError::value_read(text, type_name, "out of bounds"))
    }
}

fn parse_unsigned(text: &str, type_name: &'static str) -> Result<u64> {
    if text.starts_with('-') {
        return Err(OksError::value_read(text, type_name, "negative value"));
    }
    let (digits, radix) = int_radix(text);
    u64::from_str_radix(digits, radix)
        .map_err(|e| OksError::value_read(text, type_name, e.to_string()))
}

macro_rules! narrow {
    ($value:expr, $text:expr, $ty:ty, $name:expr) => {
        <$ty>::try_from($value).map_err(|_| OksError::value_read($text, $name, "out of bounds"))?
    };
}

pub(crate) fn parse_bool(text: &str) -> Result<bool> {
    match text {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(OksError::value_read(text, "bool", "expected boolean literal")),
    }
}

pub(crate) fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y%m%d"))
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .map_err(|e| OksError::value_read(text, "date", e.to_string()))
}

pub(crate) fn parse_time(text: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y%m%dT%H%M%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y/%m/%d %H:%M:%S"))
        .map_err(|e| OksError::value_read(text, "time", e.to_string()))
}

/// Look up an enumeration token in an attribute's range.
pub(crate) fn parse_enum(text: &str, enumerators: &[Arc<str>]) -> Result<EnumValue> {
    enumerators
        .iter()
        .position(|token| token.as_ref() == text)
        .map(|ord| EnumValue {
            ord: ord as u16,
            token: Arc::clone(&enumerators[ord]),
        })
        .ok_or_else(|| OksError::value_read(text, "enum", "not a declared enumerator"))
}

/// Parse one token of value text against a declared single-value kind.
///
/// `enumerators` is consulted for [`Kind::Enum`] only. Reference kinds
/// cannot be parsed from a single token and report *ValueRead*.
pub fn parse_token(text: &str, kind: Kind, enumerators: &[Arc<str>]) -> Result<Value> {
    Ok(match kind {
        Kind::S8 => Value::S8(narrow!(parse_signed(text, "s8")?, text, i8, "s8")),
        Kind::U8 => Value::U8(narrow!(parse_unsigned(text, "u8")?, text, u8, "u8")),
        Kind::S16 => Value::S16(narrow!(parse_signed(text, "s16")?, text, i16, "s16")),
        Kind::U16 => Value::U16(narrow!(parse_unsigned(text, "u16")?, text, u16, "u16")),
        Kind::S32 => Value::S32(narrow!(parse_signed(text, "s32")?, text, i32, "s32")),
        Kind::U32 => Value::U32(narrow!(parse_unsigned(text, "u32")?, text, u32, "u32")),
        Kind::S64 => Value::S64(parse_signed(text, "s64")?),
        Kind::U64 => Value::U64(parse_unsigned(text, "u64")?),
        Kind::Float => Value::Float(
            text.parse::<f32>()
                .map_err(|e| OksError::value_read(text, "float", e.to_string()))?,
        ),
        Kind::Double => Value::Double(
            text.parse::<f64>()
                .map_err(|e| OksError::value_read(text, "double", e.to_string()))?,
        ),
        Kind::Bool => Value::Bool(parse_bool(text)?),
        Kind::Date => Value::Date(parse_date(text)?),
        Kind::Time => Value::Time(parse_time(text)?),
        Kind::String => Value::String(text.to_string()),
        Kind::Class => Value::ClassRef(SmolStr::new(text)),
        Kind::Enum => Value::Enum(parse_enum(text, enumerators)?),
        Kind::Uid | Kind::Uid2 => {
            // "id@class" is the only textual reference form
            match text.split_once('@') {
                Some((id, class)) if !id.is_empty() && !class.is_empty() => Value::Uid2 {
                    class: SmolStr::new(class),
                    id: SmolStr::new(id),
                },
                _ if text.is_empty() => Value::Uid2Unset,
                _ => {
                    return Err(OksError::value_read(text, "uid", "expected \"id@class\""));
                }
            }
        }
        Kind::Object | Kind::List => {
            return Err(OksError::value_read(text, kind.type_name(), "not a textual kind"));
        }
    })
}

/// Parse a comma-separated list of tokens into a multi-value list.
/// String-kind text is taken verbatim as a single element; splitting a
/// string on commas would corrupt legitimate values.
pub fn parse_tokens(text: &str, kind: Kind, enumerators: &[Arc<str>]) -> Result<Value> {
    if text.is_empty() {
        return Ok(Value::List(Vec::new()));
    }
    if kind == Kind::String {
        return Ok(Value::List(vec![Value::String(text.to_string())]));
    }
    let mut items = Vec::new();
    for token in text.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        items.push(parse_token(token, kind, enumerators)?);
    }
    Ok(Value::List(items))
}
