//! Typed value model.
//!
//! A [`Value`] is the tagged union stored in every attribute and
//! relationship slot of an object. The set of kinds is closed; every
//! operation (parse, format, compare, convert, range check) is one
//! `match` over the tag.
//!
//! Object references come in three resolution states:
//! - [`Value::ObjectRef`] - resolved handle into the kernel's object arena
//! - [`Value::Uid`] - class resolved, object id pending a bind pass
//! - [`Value::Uid2`] - neither class nor object resolved

mod convert;
mod parse;
mod range;

#[cfg(test)]
mod tests;

pub use convert::ConversionTarget;
pub use parse::{parse_token, parse_tokens};
pub use range::RangeSpec;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use smol_str::SmolStr;

use crate::error::{OksError, Result};
use crate::object::ObjectId;
use crate::schema::ClassId;

/// The closed set of value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    S64,
    U64,
    Float,
    Double,
    Bool,
    Class,
    Object,
    Date,
    Time,
    String,
    List,
    Uid,
    Uid2,
    Enum,
}

impl Kind {
    /// The attribute-type token as it appears in schema files. The data
    /// model spells unresolved references `uid`; a schema `uid` attribute
    /// therefore maps to [`Kind::Uid2`].
    pub fn from_type_token(token: &str) -> Option<Kind> {
        Some(match token {
            "bool" => Kind::Bool,
            "s8" => Kind::S8,
            "u8" => Kind::U8,
            "s16" => Kind::S16,
            "u16" => Kind::U16,
            "s32" => Kind::S32,
            "u32" => Kind::U32,
            "s64" => Kind::S64,
            "u64" => Kind::U64,
            "float" => Kind::Float,
            "double" => Kind::Double,
            "date" => Kind::Date,
            "time" => Kind::Time,
            "string" => Kind::String,
            "uid" => Kind::Uid2,
            "enum" => Kind::Enum,
            "class" => Kind::Class,
            _ => return None,
        })
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Kind::S8 => "s8",
            Kind::U8 => "u8",
            Kind::S16 => "s16",
            Kind::U16 => "u16",
            Kind::S32 => "s32",
            Kind::U32 => "u32",
            Kind::S64 => "s64",
            Kind::U64 => "u64",
            Kind::Float => "float",
            Kind::Double => "double",
            Kind::Bool => "bool",
            Kind::Class => "class",
            Kind::Object => "object",
            Kind::Date => "date",
            Kind::Time => "time",
            Kind::String => "string",
            Kind::List => "list",
            Kind::Uid => "uid",
            Kind::Uid2 => "uid2",
            Kind::Enum => "enum",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Kind::S8 | Kind::U8 | Kind::S16 | Kind::U16 | Kind::S32 | Kind::U32 | Kind::S64 | Kind::U64
        )
    }

    pub fn is_number(self) -> bool {
        self.is_integer() || matches!(self, Kind::Float | Kind::Double | Kind::Bool)
    }

    /// True for the three object-reference states.
    pub fn is_object(self) -> bool {
        matches!(self, Kind::Object | Kind::Uid | Kind::Uid2)
    }
}

/// An enumeration value: a shared token out of the declaring attribute's
/// range plus its position in that range.
///
/// Equality is by token identity, not text: the `Arc` is the very entry
/// of the attribute's enumerator list, so re-declaring the range makes
/// stale values detectably unequal even when the label text matches.
#[derive(Debug, Clone)]
pub struct EnumValue {
    pub ord: u16,
    pub token: Arc<str>,
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.token, &other.token)
    }
}

impl Eq for EnumValue {}

impl PartialOrd for EnumValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.ord.cmp(&other.ord))
    }
}

impl Ord for EnumValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ord.cmp(&other.ord)
    }
}

/// Integer display format of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntFormat {
    #[default]
    Dec,
    Hex,
    Oct,
}

impl IntFormat {
    pub fn from_token(token: &str) -> IntFormat {
        match token {
            "hex" => IntFormat::Hex,
            "oct" => IntFormat::Oct,
            _ => IntFormat::Dec,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            IntFormat::Dec => "dec",
            IntFormat::Hex => "hex",
            IntFormat::Oct => "oct",
        }
    }
}

/// A typed value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    S8(i8),
    U8(u8),
    S16(i16),
    U16(u16),
    S32(i32),
    U32(u32),
    S64(i64),
    U64(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    /// A class-valued attribute: the name of a class.
    ClassRef(SmolStr),
    /// Resolved reference into the object arena.
    ObjectRef(ObjectId),
    /// Deferred reference: class resolved, object id pending binding.
    Uid { class: ClassId, id: SmolStr },
    /// A null reference: nothing set, nothing to bind.
    #[default]
    Uid2Unset,
    /// Fully deferred reference: class name and object id.
    Uid2 { class: SmolStr, id: SmolStr },
    Date(NaiveDate),
    Time(NaiveDateTime),
    String(String),
    Enum(EnumValue),
    List(Vec<Value>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::S8(_) => Kind::S8,
            Value::U8(_) => Kind::U8,
            Value::S16(_) => Kind::S16,
            Value::U16(_) => Kind::U16,
            Value::S32(_) => Kind::S32,
            Value::U32(_) => Kind::U32,
            Value::S64(_) => Kind::S64,
            Value::U64(_) => Kind::U64,
            Value::Float(_) => Kind::Float,
            Value::Double(_) => Kind::Double,
            Value::Bool(_) => Kind::Bool,
            Value::ClassRef(_) => Kind::Class,
            Value::ObjectRef(_) => Kind::Object,
            Value::Uid { .. } => Kind::Uid,
            Value::Uid2 { .. } | Value::Uid2Unset => Kind::Uid2,
            Value::Date(_) => Kind::Date,
            Value::Time(_) => Kind::Time,
            Value::String(_) => Kind::String,
            Value::Enum(_) => Kind::Enum,
            Value::List(_) => Kind::List,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().type_name()
    }

    /// An empty value for a relationship slot: `Uid2Unset` for a
    /// single-value relationship, an empty list for a multi-value one.
    pub fn null_relationship(multi: bool) -> Value {
        if multi {
            Value::List(Vec::new())
        } else {
            Value::Uid2Unset
        }
    }

    /// True when this slot holds no object reference at all.
    pub fn is_null_reference(&self) -> bool {
        match self {
            Value::Uid2Unset => true,
            Value::List(items) => items.is_empty(),
            _ => false,
        }
    }

    fn as_i128(&self) -> Option<i128> {
        Some(match self {
            Value::S8(v) => *v as i128,
            Value::U8(v) => *v as i128,
            Value::S16(v) => *v as i128,
            Value::U16(v) => *v as i128,
            Value::S32(v) => *v as i128,
            Value::U32(v) => *v as i128,
            Value::S64(v) => *v as i128,
            Value::U64(v) => *v as i128,
            _ => return None,
        })
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        Some(match self {
            Value::Float(v) => *v as f64,
            Value::Double(v) => *v,
            _ => return None,
        })
    }

    /// Total order within one kind; integer widths promote, everything
    /// else cross-kind is an [`OksError::IncompatibleComparison`].
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        if let (Some(a), Some(b)) = (self.as_i128(), other.as_i128()) {
            return Ok(a.cmp(&b));
        }
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a
                .partial_cmp(&b)
                .ok_or_else(|| self.incompatible_with(other));
        }

        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Ok(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Ok(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (Value::ClassRef(a), Value::ClassRef(b)) => Ok(a.cmp(b)),
            (Value::Enum(a), Value::Enum(b)) => Ok(a.cmp(b)),
            (Value::ObjectRef(a), Value::ObjectRef(b)) => Ok(a.cmp(b)),
            (Value::Uid { class: c1, id: i1 }, Value::Uid { class: c2, id: i2 }) => {
                Ok((c1, i1).cmp(&(c2, i2)))
            }
            (Value::Uid2 { class: c1, id: i1 }, Value::Uid2 { class: c2, id: i2 }) => {
                Ok((c1, i1).cmp(&(c2, i2)))
            }
            (Value::Uid2Unset, Value::Uid2Unset) => Ok(Ordering::Equal),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        other => return Ok(other),
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => Err(self.incompatible_with(other)),
        }
    }

    fn incompatible_with(&self, other: &Value) -> OksError {
        OksError::IncompatibleComparison {
            left: self.type_name(),
            right: other.type_name(),
        }
    }

    /// Sort a multi-value list in place.
    pub fn sort(&mut self, ascending: bool) {
        if let Value::List(items) = self {
            items.sort_by(|a, b| {
                let ord = a.compare(b).unwrap_or(Ordering::Equal);
                if ascending { ord } else { ord.reverse() }
            });
        }
    }

    /// Render the value with an integer display format. Temporal kinds
    /// come out in ISO-8601 basic form, UTC.
    pub fn format(&self, format: IntFormat) -> String {
        fn int(v: i128, negative: bool, format: IntFormat) -> String {
            let magnitude = v.unsigned_abs();
            let sign = if negative { "-" } else { "" };
            match format {
                IntFormat::Dec => format!("{sign}{magnitude}"),
                IntFormat::Hex => format!("{sign}0x{magnitude:x}"),
                IntFormat::Oct => {
                    if magnitude == 0 {
                        "0".to_string()
                    } else {
                        format!("{sign}0{magnitude:o}")
                    }
                }
            }
        }

        if let Some(i) = self.as_i128() {
            return int(i, i < 0, format);
        }

        match self {
            Value::S8(_)
            | Value::U8(_)
            | Value::S16(_)
            | Value::U16(_)
            | Value::S32(_)
            | Value::U32(_)
            | Value::S64(_)
            | Value::U64(_) => unreachable!(),
            Value::Float(v) => format!("{v}"),
            Value::Double(v) => format!("{v}"),
            Value::Bool(v) => (if *v { "1" } else { "0" }).to_string(),
            Value::ClassRef(name) => name.to_string(),
            // resolved and half-resolved references need kernel context
            // for a class name; the file engine renders them itself
            Value::ObjectRef(_) => "(object)".to_string(),
            Value::Uid { class: _, id } => format!("{id}@?"),
            Value::Uid2 { class, id } => format!("{id}@{class}"),
            Value::Uid2Unset => String::new(),
            Value::Date(d) => d.format("%Y%m%d").to_string(),
            Value::Time(t) => t.format("%Y%m%dT%H%M%S").to_string(),
            Value::String(s) => s.clone(),
            Value::Enum(e) => e.token.to_string(),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.format(format)).collect();
                parts.join(" ")
            }
        }
    }

    /// The string used for regex range checks and `~` comparisons.
    pub fn as_text(&self) -> String {
        self.format(IntFormat::Dec)
    }
}

/// Equality never reports incompatibility: values of non-comparable
/// kinds are simply unequal.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.as_i128(), other.as_i128()) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a == b;
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::ClassRef(a), Value::ClassRef(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::ObjectRef(a), Value::ObjectRef(b)) => a == b,
            (Value::Uid { class: c1, id: i1 }, Value::Uid { class: c2, id: i2 }) => {
                c1 == c2 && i1 == i2
            }
            (Value::Uid2 { class: c1, id: i1 }, Value::Uid2 { class: c2, id: i2 }) => {
                c1 == c2 && i1 == i2
            }
            (Value::Uid2Unset, Value::Uid2Unset) => true,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(IntFormat::Dec))
    }
}
