//! Method declarations.
//!
//! Methods carry no kernel semantics; they describe callable interfaces
//! for code generators. Each method holds implementations keyed by
//! language.

use smol_str::SmolStr;

use crate::error::{OksError, Result};
use crate::xml::{Tag, TagKind, XmlReader, XmlWriter};

pub(crate) const METHOD_TAG: &str = "method";
pub(crate) const IMPLEMENTATION_TAG: &str = "method-implementation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodImplementation {
    pub language: String,
    pub prototype: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: SmolStr,
    pub description: String,
    implementations: Vec<MethodImplementation>,
}

impl Method {
    pub fn new(name: impl Into<SmolStr>) -> Result<Method> {
        let method = Method {
            name: name.into(),
            description: String::new(),
            implementations: Vec::new(),
        };
        if method.name.is_empty() {
            return Err(OksError::schema("method name is empty"));
        }
        Ok(method)
    }

    pub fn implementations(&self) -> &[MethodImplementation] {
        &self.implementations
    }

    pub fn find_implementation(&self, language: &str) -> Option<&MethodImplementation> {
        self.implementations.iter().find(|i| i.language == language)
    }

    /// Add an implementation; the language must be new to this method.
    pub fn add_implementation(
        &mut self,
        language: &str,
        prototype: &str,
        body: &str,
    ) -> Result<()> {
        if self.find_implementation(language).is_some() {
            return Err(OksError::schema(format!(
                "method \"{}\" already has implementation for language \"{language}\"",
                self.name
            )));
        }
        self.implementations.push(MethodImplementation {
            language: language.to_string(),
            prototype: prototype.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    pub fn remove_implementation(&mut self, language: &str) -> Result<()> {
        let position = self
            .implementations
            .iter()
            .position(|i| i.language == language)
            .ok_or_else(|| {
                OksError::schema(format!(
                    "method \"{}\" has no implementation for language \"{language}\"",
                    self.name
                ))
            })?;
        self.implementations.remove(position);
        Ok(())
    }

    // ------------------------------------------------------------------
    // XML
    // ------------------------------------------------------------------

    /// Parse a `<method>` element; consumes up to and including the
    /// closing tag when the element has implementation children.
    pub(crate) fn from_xml(tag: &Tag, reader: &mut XmlReader<'_>) -> Result<Method> {
        let name = tag
            .attr("name")
            .ok_or_else(|| reader.error_at(tag.offset, "method without name"))?;
        let mut method = Method::new(SmolStr::new(name))?;
        method.description = tag.attr("description").unwrap_or_default().to_string();

        if tag.kind == TagKind::Empty {
            return Ok(method);
        }

        loop {
            let child = reader.require_tag(IMPLEMENTATION_TAG)?;
            if child.is_end_of(METHOD_TAG) {
                break;
            }
            if !child.is_start_of(IMPLEMENTATION_TAG) {
                return Err(reader.error_at(
                    child.offset,
                    format!("unexpected tag <{}> inside <{METHOD_TAG}>", child.name),
                ));
            }
            let language = child
                .attr("language")
                .ok_or_else(|| reader.error_at(child.offset, "method-implementation without language"))?;
            method
                .add_implementation(
                    language,
                    child.attr("prototype").unwrap_or_default(),
                    child.attr("body").unwrap_or_default(),
                )
                .map_err(|e| reader.error_at(child.offset, e.to_string()))?;
            if child.kind == TagKind::Start {
                let end = reader.require_tag(IMPLEMENTATION_TAG)?;
                if !end.is_end_of(IMPLEMENTATION_TAG) {
                    return Err(reader.error_at(end.offset, "expected </method-implementation>"));
                }
            }
        }
        Ok(method)
    }

    pub(crate) fn write_xml<W: std::io::Write>(&self, w: &mut XmlWriter<W>) -> std::io::Result<()> {
        w.put_raw("  ")?;
        w.put_start_tag(METHOD_TAG)?;
        w.put_attribute("name", &self.name)?;
        if !self.description.is_empty() {
            w.put_attribute("description", &self.description)?;
        }
        if self.implementations.is_empty() {
            return w.put_end_tag();
        }
        w.put_eol()?;
        for implementation in &self.implementations {
            w.put_raw("   ")?;
            w.put_start_tag(IMPLEMENTATION_TAG)?;
            w.put_attribute("language", &implementation.language)?;
            w.put_attribute("prototype", &implementation.prototype)?;
            w.put_attribute("body", &implementation.body)?;
            w.put_end_tag()?;
        }
        w.put_raw("  ")?;
        w.put_last_tag(METHOD_TAG)
    }
}
