//! The conversion matrix.
//!
//! A value assigned to an attribute of a different declared type is
//! converted rather than rejected: integer widths widen or narrow,
//! floats truncate towards zero when becoming integers, booleans map to
//! 0/1, numbers and strings convert through their text form, and single
//! values wrap into lists (or lists collapse to their first element)
//! when the multiplicity differs. A conversion that cannot represent
//! the value reports *ValueRead*.

use std::sync::Arc;

use crate::error::{OksError, Result};

use super::{parse, Kind, Value};

/// The declared shape a value is converted to: kind, multiplicity and
/// (for enumerations) the declaring range.
pub struct ConversionTarget<'a> {
    pub kind: Kind,
    pub multi: bool,
    pub enumerators: &'a [Arc<str>],
}

impl Value {
    /// Convert to the target's declared type. See the module docs for
    /// the matrix.
    pub fn convert(&self, target: &ConversionTarget<'_>) -> Result<Value> {
        // multiplicity first: wrap or take the first element
        if target.multi {
            let single = ConversionTarget {
                multi: false,
                ..*target
            };
            return Ok(match self {
                Value::List(items) => {
                    let converted: Result<Vec<Value>> =
                        items.iter().map(|v| v.convert(&single)).collect();
                    Value::List(converted?)
                }
                other => Value::List(vec![other.convert(&single)?]),
            });
        }
        if let Value::List(items) = self {
            return match items.first() {
                Some(first) => first.convert(target),
                None => Err(OksError::value_read(
                    "(empty list)",
                    target.kind.type_name(),
                    "cannot convert empty multi-value to single value",
                )),
            };
        }

        if self.kind() == target.kind {
            return Ok(self.clone());
        }

        let type_name = target.kind.type_name();

        // numeric sources
        if let Some(i) = self.as_i128() {
            return convert_i128(i, target.kind, &self.as_text());
        }
        if let Some(f) = self.as_f64() {
            return match target.kind {
                Kind::Float => Ok(Value::Float(f as f32)),
                Kind::Double => Ok(Value::Double(f)),
                k if k.is_integer() => {
                    // truncation towards zero
                    let t = f.trunc();
                    if !t.is_finite() {
                        return Err(OksError::value_read(self.as_text(), type_name, "not finite"));
                    }
                    convert_i128(t as i128, k, &self.as_text())
                }
                Kind::Bool => Ok(Value::Bool(f != 0.0)),
                Kind::String => Ok(Value::String(self.as_text())),
                _ => Err(self.conversion_error(type_name)),
            };
        }
        if let Value::Bool(b) = self {
            return match target.kind {
                k if k.is_integer() => convert_i128(*b as i128, k, &self.as_text()),
                Kind::Float => Ok(Value::Float(*b as u8 as f32)),
                Kind::Double => Ok(Value::Double(*b as u8 as f64)),
                Kind::String => Ok(Value::String(self.as_text())),
                _ => Err(self.conversion_error(type_name)),
            };
        }

        // text-mediated conversions: everything can become a string, and
        // a string re-parses as anything textual
        match (self, target.kind) {
            (_, Kind::String) => Ok(Value::String(self.as_text())),
            (Value::String(s), _) => parse::parse_token(s, target.kind, target.enumerators),
            (Value::Enum(e), _) => parse::parse_token(&e.token, target.kind, target.enumerators),
            (Value::Uid2 { class, id: _ }, Kind::Class) => Ok(Value::ClassRef(class.clone())),
            _ => Err(self.conversion_error(type_name)),
        }
    }

    fn conversion_error(&self, type_name: &'static str) -> OksError {
        OksError::value_read(
            self.as_text(),
            type_name,
            format!("cannot convert from {}", self.type_name()),
        )
    }
}

fn convert_i128(i: i128, kind: Kind, text: &str) -> Result<Value> {
    fn bounds(text: &str, kind: Kind) -> OksError {
        OksError::value_read(text, kind.type_name(), "out of bounds")
    }

    Ok(match kind {
        Kind::S8 => Value::S8(i8::try_from(i).map_err(|_| bounds(text, kind))?),
        Kind::U8 => Value::U8(u8::try_from(i).map_err(|_| bounds(text, kind))?),
        Kind::S16 => Value::S16(i16::try_from(i).map_err(|_| bounds(text, kind))?),
        Kind::U16 => Value::U16(u16::try_from(i).map_err(|_| bounds(text, kind))?),
        Kind::S32 => Value::S32(i32::try_from(i).map_err(|_| bounds(text, kind))?),
        Kind::U32 => Value::U32(u32::try_from(i).map_err(|_| bounds(text, kind))?),
        Kind::S64 => Value::S64(i64::try_from(i).map_err(|_| bounds(text, kind))?),
        Kind::U64 => Value::U64(u64::try_from(i).map_err(|_| bounds(text, kind))?),
        Kind::Float => Value::Float(i as f32),
        Kind::Double => Value::Double(i as f64),
        Kind::Bool => Value::Bool(i != 0),
        Kind::String => Value::String(i.to_string()),
        _ => {
            return Err(OksError::value_read(
                text,
                kind.type_name(),
                "cannot convert from integer",
            ));
        }
    })
}
