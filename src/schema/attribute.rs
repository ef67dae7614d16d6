//! Attribute declarations.

use std::sync::Arc;

use smol_str::SmolStr;

use crate::error::{OksError, Result};
use crate::value::{
    parse_token, parse_tokens, ConversionTarget, EnumValue, IntFormat, Kind, RangeSpec, Value,
};
use crate::xml;
use crate::xml::{Tag, XmlWriter};

pub(crate) const ATTRIBUTE_TAG: &str = "attribute";

/// An attribute declaration: name, primitive type, optional range,
/// display format, multiplicity and default.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: SmolStr,
    pub description: String,
    data_type: Kind,
    range: String,
    pub format: IntFormat,
    pub multi: bool,
    pub no_null: bool,
    pub ordered: bool,
    pub init_value: String,
    /// Shared tokens of an enumeration range, in range order. Enum
    /// values point into this list; re-initializing the range detaches
    /// every existing value.
    enumerators: Vec<Arc<str>>,
    range_spec: Option<RangeSpec>,
}

impl Attribute {
    pub fn new(name: impl Into<SmolStr>, data_type: Kind) -> Result<Attribute> {
        let mut attribute = Attribute {
            name: name.into(),
            description: String::new(),
            data_type,
            range: String::new(),
            format: IntFormat::Dec,
            multi: false,
            no_null: false,
            ordered: false,
            init_value: String::new(),
            enumerators: Vec::new(),
            range_spec: None,
        };
        if attribute.name.is_empty() {
            return Err(OksError::schema("attribute name is empty"));
        }
        if matches!(data_type, Kind::Object | Kind::List | Kind::Uid) {
            return Err(OksError::schema(format!(
                "\"{}\" is not a declarable attribute type",
                data_type.type_name()
            )));
        }
        // enum ranges are validated once the range text arrives
        Ok(attribute)
    }

    pub fn with_range(mut self, range: &str) -> Result<Attribute> {
        self.set_range(range)?;
        Ok(self)
    }

    pub fn with_init_value(mut self, init: &str) -> Attribute {
        self.init_value = init.to_string();
        self
    }

    pub fn with_multi(mut self, multi: bool) -> Attribute {
        self.multi = multi;
        self
    }

    pub fn data_type(&self) -> Kind {
        self.data_type
    }

    pub fn range(&self) -> &str {
        &self.range
    }

    pub fn enumerators(&self) -> &[Arc<str>] {
        &self.enumerators
    }

    pub fn range_spec(&self) -> Option<&RangeSpec> {
        self.range_spec.as_ref()
    }

    pub fn is_integer(&self) -> bool {
        self.data_type.is_integer()
    }

    pub fn is_number(&self) -> bool {
        self.data_type.is_number()
    }

    /// Rebuild the enumerator tokens from the range text. Every
    /// existing enum value becomes detectably stale.
    pub(crate) fn init_enum(&mut self) -> Result<()> {
        if self.data_type != Kind::Enum {
            self.enumerators.clear();
            return Ok(());
        }
        self.enumerators = self
            .range
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(Arc::from)
            .collect();
        if self.enumerators.is_empty() {
            return Err(OksError::schema(format!(
                "range of enumeration attribute \"{}\" is empty",
                self.name
            )));
        }
        if self.enumerators.len() > u16::MAX as usize {
            return Err(OksError::schema(format!(
                "range of enumeration attribute \"{}\" has too many tokens",
                self.name
            )));
        }
        Ok(())
    }

    pub(crate) fn init_range(&mut self) -> Result<()> {
        self.range_spec = if self.data_type == Kind::Enum {
            // the enumerator list itself is the range
            None
        } else {
            RangeSpec::parse(&self.range, self.data_type, &self.enumerators)?
        };
        Ok(())
    }

    pub(crate) fn set_data_type(&mut self, data_type: Kind) -> Result<()> {
        self.data_type = data_type;
        self.init_enum()?;
        self.init_range()
    }

    /// Normalize and set the range text, then rebuild enum tokens and
    /// the parsed range. On failure the previous range is restored.
    /// String ranges are regular expressions and kept verbatim.
    pub(crate) fn set_range(&mut self, range: &str) -> Result<()> {
        let normalized = if self.data_type == Kind::String {
            range.to_string()
        } else {
            let tokens: Vec<&str> = range
                .split([',', ' ', '\t'])
                .filter(|t| !t.is_empty())
                .collect();
            tokens.join(",")
        };

        if !normalized.is_empty() && self.data_type == Kind::Bool {
            return Err(OksError::schema(
                "boolean type can't have user-defined range",
            ));
        }

        let old = std::mem::replace(&mut self.range, normalized);
        if let Err(e) = self.init_enum().and_then(|()| self.init_range()) {
            self.range = old;
            let _ = self.init_enum();
            let _ = self.init_range();
            return Err(e);
        }
        Ok(())
    }

    /// Look up an enumeration token of this attribute.
    pub fn enum_value(&self, token: &str) -> Result<EnumValue> {
        self.enumerators
            .iter()
            .position(|t| t.as_ref() == token)
            .map(|ord| EnumValue {
                ord: ord as u16,
                token: Arc::clone(&self.enumerators[ord]),
            })
            .ok_or_else(|| OksError::value_range(token, &self.range))
    }

    pub fn conversion_target(&self) -> ConversionTarget<'_> {
        ConversionTarget {
            kind: self.data_type,
            multi: self.multi,
            enumerators: &self.enumerators,
        }
    }

    /// Parse value text according to this declaration; multi-valued
    /// attributes take a comma-separated token list.
    pub fn parse_value(&self, text: &str) -> Result<Value> {
        if self.multi {
            parse_tokens(text, self.data_type, &self.enumerators)
        } else {
            parse_token(text, self.data_type, &self.enumerators)
        }
    }

    /// Check a value against the range; enum membership was already
    /// enforced at parse time.
    pub fn check_range(&self, value: &Value, skip_string_range: bool) -> Result<()> {
        match &self.range_spec {
            Some(spec) => spec.check(value, skip_string_range),
            None => Ok(()),
        }
    }

    /// The default value of a slot: the parsed init-value, or the
    /// type's zero value.
    pub fn init_data(&self) -> Result<Value> {
        if !self.init_value.is_empty() {
            return self.parse_value(&self.init_value);
        }
        if self.multi {
            return Ok(Value::List(Vec::new()));
        }
        Ok(match self.data_type {
            Kind::S8 => Value::S8(0),
            Kind::U8 => Value::U8(0),
            Kind::S16 => Value::S16(0),
            Kind::U16 => Value::U16(0),
            Kind::S32 => Value::S32(0),
            Kind::U32 => Value::U32(0),
            Kind::S64 => Value::S64(0),
            Kind::U64 => Value::U64(0),
            Kind::Float => Value::Float(0.0),
            Kind::Double => Value::Double(0.0),
            Kind::Bool => Value::Bool(false),
            Kind::String => Value::String(String::new()),
            Kind::Class => Value::ClassRef(SmolStr::default()),
            Kind::Date => Value::Date(chrono::NaiveDate::default()),
            Kind::Time => Value::Time(chrono::NaiveDateTime::default()),
            Kind::Enum => {
                let first = self.enumerators.first().ok_or_else(|| {
                    OksError::schema(format!(
                        "range of enumeration attribute \"{}\" is empty",
                        self.name
                    ))
                })?;
                Value::Enum(EnumValue {
                    ord: 0,
                    token: Arc::clone(first),
                })
            }
            Kind::Uid | Kind::Uid2 => Value::Uid2Unset,
            Kind::Object | Kind::List => Value::Uid2Unset,
        })
    }

    /// Verify the init value satisfies the declared range.
    pub(crate) fn validate_init_against_range(&self) -> Result<()> {
        if self.range.is_empty() || self.data_type == Kind::Class {
            return Ok(());
        }
        let init = self.init_data().map_err(|e| {
            OksError::schema(format!(
                "failed to set initial value '{}' of attribute '{}': {e}",
                self.init_value, self.name
            ))
        })?;
        self.check_range(&init, false).map_err(|e| {
            OksError::schema(format!(
                "initial value '{}' of attribute '{}' does not match range: {e}",
                self.init_value, self.name
            ))
        })
    }

    // ------------------------------------------------------------------
    // XML
    // ------------------------------------------------------------------

    pub(crate) fn from_xml(tag: &Tag) -> Result<Attribute> {
        let name = tag
            .attr("name")
            .ok_or_else(|| OksError::schema("attribute without name"))?;
        let type_token = tag
            .attr("type")
            .ok_or_else(|| OksError::schema(format!("attribute \"{name}\" has no type")))?;
        let data_type = Kind::from_type_token(type_token).ok_or_else(|| {
            OksError::schema(format!(
                "value '{type_token}' is not a valid attribute type"
            ))
        })?;

        let mut attribute = Attribute::new(SmolStr::new(name), data_type)?;
        attribute.description = tag.attr("description").unwrap_or_default().to_string();
        attribute.range = tag.attr("range").unwrap_or_default().to_string();
        attribute.format = IntFormat::from_token(tag.attr("format").unwrap_or("dec"));
        attribute.multi = xml::str_to_bool(tag.attr("is-multi-value").unwrap_or("no"));
        attribute.init_value = tag.attr("init-value").unwrap_or_default().to_string();
        attribute.no_null = xml::str_to_bool(tag.attr("is-not-null").unwrap_or("no"));
        attribute.ordered = xml::str_to_bool(tag.attr("ordered").unwrap_or("no"));
        attribute.init_enum()?;
        attribute.init_range()?;
        attribute.validate_init_against_range()?;
        Ok(attribute)
    }

    pub(crate) fn write_xml<W: std::io::Write>(&self, w: &mut XmlWriter<W>) -> std::io::Result<()> {
        w.put_raw("  ")?;
        w.put_start_tag(ATTRIBUTE_TAG)?;
        w.put_attribute("name", &self.name)?;
        if !self.description.is_empty() {
            w.put_attribute("description", &self.description)?;
        }
        w.put_attribute("type", self.data_type.type_name())?;
        if !self.range.is_empty() {
            w.put_attribute("range", &self.range)?;
        }
        if self.is_integer() && self.format != IntFormat::Dec {
            w.put_attribute("format", self.format.token())?;
        }
        if self.multi {
            w.put_attribute("is-multi-value", xml::bool_to_str(self.multi))?;
        }
        if !self.init_value.is_empty() {
            w.put_attribute("init-value", &self.init_value)?;
        }
        if self.no_null {
            w.put_attribute("is-not-null", xml::bool_to_str(self.no_null))?;
        }
        if self.ordered {
            w.put_attribute("ordered", xml::bool_to_str(self.ordered))?;
        }
        w.put_end_tag()
    }
}
