//! Relationship declarations.

use smol_str::SmolStr;

use crate::error::{OksError, Result};
use crate::xml;
use crate::xml::{Tag, XmlWriter};

use super::ClassId;

pub(crate) const RELATIONSHIP_TAG: &str = "relationship";

/// `zero` or `one`: may the relationship be left unset?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowCardinality {
    Zero,
    One,
}

impl LowCardinality {
    pub fn token(self) -> &'static str {
        match self {
            LowCardinality::Zero => "zero",
            LowCardinality::One => "one",
        }
    }

    pub fn from_token(token: &str) -> Option<LowCardinality> {
        match token {
            "zero" => Some(LowCardinality::Zero),
            "one" => Some(LowCardinality::One),
            _ => None,
        }
    }
}

/// `one` or `many`: single- or multi-valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighCardinality {
    One,
    Many,
}

impl HighCardinality {
    pub fn token(self) -> &'static str {
        match self {
            HighCardinality::One => "one",
            HighCardinality::Many => "many",
        }
    }

    pub fn from_token(token: &str) -> Option<HighCardinality> {
        match token {
            "one" => Some(HighCardinality::One),
            "many" => Some(HighCardinality::Many),
            _ => None,
        }
    }
}

/// A relationship declaration: target class by name plus the resolved
/// target cache, cardinalities and the composite/exclusive/dependent
/// flags.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub name: SmolStr,
    pub description: String,
    /// Declared target class, by name.
    pub class_type: SmolStr,
    pub low_cc: LowCardinality,
    pub high_cc: HighCardinality,
    pub composite: bool,
    pub exclusive: bool,
    pub dependent: bool,
    pub ordered: bool,
    /// Resolved target class; re-linked whenever classes are added or
    /// removed. `None` leaves a bind-classes status entry.
    pub(crate) target: Option<ClassId>,
}

impl Relationship {
    pub fn new(
        name: impl Into<SmolStr>,
        class_type: impl Into<SmolStr>,
        low_cc: LowCardinality,
        high_cc: HighCardinality,
    ) -> Result<Relationship> {
        let relationship = Relationship {
            name: name.into(),
            description: String::new(),
            class_type: class_type.into(),
            low_cc,
            high_cc,
            composite: false,
            exclusive: false,
            dependent: false,
            ordered: false,
            target: None,
        };
        if relationship.name.is_empty() {
            return Err(OksError::schema("relationship name is empty"));
        }
        if relationship.class_type.is_empty() {
            return Err(OksError::schema(format!(
                "relationship \"{}\" has empty class type",
                relationship.name
            )));
        }
        Ok(relationship)
    }

    pub fn with_composite(mut self, composite: bool, exclusive: bool, dependent: bool) -> Self {
        self.composite = composite;
        self.exclusive = exclusive;
        self.dependent = dependent;
        self
    }

    pub fn with_ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    pub fn is_multi(&self) -> bool {
        self.high_cc == HighCardinality::Many
    }

    /// Composite, exclusive and dependent: forward edges maintain a
    /// reverse entry on the target.
    pub fn maintains_rcr(&self) -> bool {
        self.composite && self.exclusive && self.dependent
    }

    /// Resolved target class, when the declared name is loaded.
    pub fn target(&self) -> Option<ClassId> {
        self.target
    }

    // ------------------------------------------------------------------
    // XML
    // ------------------------------------------------------------------

    pub(crate) fn from_xml(tag: &Tag) -> Result<Relationship> {
        let name = tag
            .attr("name")
            .ok_or_else(|| OksError::schema("relationship without name"))?;
        let class_type = tag
            .attr("class-type")
            .ok_or_else(|| OksError::schema(format!("relationship \"{name}\" has no class-type")))?;
        let low = tag.attr("low-cc").unwrap_or("zero");
        let high = tag.attr("high-cc").unwrap_or("one");
        let low_cc = LowCardinality::from_token(low)
            .ok_or_else(|| OksError::schema(format!("bad low-cc \"{low}\"")))?;
        let high_cc = HighCardinality::from_token(high)
            .ok_or_else(|| OksError::schema(format!("bad high-cc \"{high}\"")))?;

        let mut relationship =
            Relationship::new(SmolStr::new(name), SmolStr::new(class_type), low_cc, high_cc)?;
        relationship.description = tag.attr("description").unwrap_or_default().to_string();
        relationship.composite = xml::str_to_bool(tag.attr("is-composite").unwrap_or("no"));
        relationship.exclusive = xml::str_to_bool(tag.attr("is-exclusive").unwrap_or("no"));
        relationship.dependent = xml::str_to_bool(tag.attr("is-dependent").unwrap_or("no"));
        relationship.ordered = xml::str_to_bool(tag.attr("ordered").unwrap_or("no"));
        Ok(relationship)
    }

    pub(crate) fn write_xml<W: std::io::Write>(&self, w: &mut XmlWriter<W>) -> std::io::Result<()> {
        w.put_raw("  ")?;
        w.put_start_tag(RELATIONSHIP_TAG)?;
        w.put_attribute("name", &self.name)?;
        if !self.description.is_empty() {
            w.put_attribute("description", &self.description)?;
        }
        w.put_attribute("class-type", &self.class_type)?;
        w.put_attribute("low-cc", self.low_cc.token())?;
        w.put_attribute("high-cc", self.high_cc.token())?;
        w.put_attribute("is-composite", xml::bool_to_str(self.composite))?;
        w.put_attribute("is-exclusive", xml::bool_to_str(self.exclusive))?;
        w.put_attribute("is-dependent", xml::bool_to_str(self.dependent))?;
        if self.ordered {
            w.put_attribute("ordered", xml::bool_to_str(self.ordered))?;
        }
        w.put_end_tag()
    }
}
