//! The dialect reader.
//!
//! A thin event loop over `quick_xml` that yields owned [`Tag`]s: tag
//! name plus unescaped attribute pairs. XML comments are skipped at any
//! tag position, whitespace between tags is ignored, and everything
//! carries a byte offset convertible to (line, column) for diagnostics.

use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::base::{LineCol, LineIndex};
use crate::error::{OksError, Result};

use super::escape::unescape;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `<name …>`
    Start,
    /// `<name …/>`
    Empty,
    /// `</name>`
    End,
}

/// One tag with its unescaped attributes, owned.
#[derive(Debug)]
pub struct Tag {
    pub kind: TagKind,
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Byte offset of the tag in the document, for diagnostics.
    pub offset: usize,
}

impl Tag {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_start_of(&self, name: &str) -> bool {
        matches!(self.kind, TagKind::Start | TagKind::Empty) && self.name == name
    }

    pub fn is_end_of(&self, name: &str) -> bool {
        self.kind == TagKind::End && self.name == name
    }
}

/// Streaming reader over one in-memory document.
pub struct XmlReader<'a> {
    path: PathBuf,
    src: &'a str,
    inner: Reader<&'a [u8]>,
    /// Offset of the inner reader's slice within `src`; non-zero after
    /// a `restore_position`.
    base: usize,
    line_index: LineIndex,
    checkpoint: Option<usize>,
}

/// End offset of a document-type declaration in the prolog, if any.
/// The OKS DTD is an internal subset full of nested `>`, which the
/// event reader must not see; the dialect layer steps over it.
fn skip_prolog_doctype(src: &str) -> usize {
    let Some(d) = src.find("<!DOCTYPE") else {
        return 0;
    };
    let rest = &src[d..];
    match rest.find('[') {
        Some(b) if !rest[..b].contains('>') => match rest[b..].find("]>") {
            Some(e) => d + b + e + 2,
            None => 0,
        },
        _ => match rest.find('>') {
            Some(e) => d + e + 1,
            None => 0,
        },
    }
}

impl<'a> XmlReader<'a> {
    pub fn new(path: impl Into<PathBuf>, src: &'a str) -> Self {
        let base = skip_prolog_doctype(src);
        let mut inner = Reader::from_str(&src[base..]);
        // Each `restore_position` rebuilds `inner` from a byte offset, so
        // quick-xml's own open-tag stack never spans a checkpoint and an
        // end tag past a checkpoint looks unmatched to it; the dialect
        // layer already matches end tags explicitly via
        // `is_end_of`/`require_tag`, so quick-xml's own check is redundant.
        inner.config_mut().allow_unmatched_ends = true;
        Self {
            path: path.into(),
            src,
            inner,
            base,
            line_index: LineIndex::new(src.as_bytes()),
            checkpoint: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current byte offset in the document.
    pub fn position(&self) -> usize {
        self.base + self.inner.buffer_position() as usize
    }

    pub fn line_col(&self, offset: usize) -> LineCol {
        self.line_index.line_col(offset)
    }

    /// Build a positioned bad-file-data error.
    pub fn error_at(&self, offset: usize, message: impl Into<String>) -> OksError {
        let LineCol { line, column } = self.line_col(offset);
        OksError::bad_file_data(&self.path, line, column, message)
    }

    /// Remember the current position. One checkpoint at a time.
    pub fn store_position(&mut self) {
        self.checkpoint = Some(self.position());
    }

    /// Rewind to the stored checkpoint, if any.
    pub fn restore_position(&mut self) {
        if let Some(offset) = self.checkpoint.take() {
            let mut inner = Reader::from_str(&self.src[offset..]);
            inner.config_mut().allow_unmatched_ends = true;
            self.inner = inner;
            self.base = offset;
        }
    }

    /// Next tag event, skipping declarations, doctype, processing
    /// instructions, comments and inter-tag whitespace. `None` at end
    /// of document.
    pub fn next_tag(&mut self) -> Result<Option<Tag>> {
        loop {
            let offset = self.position();
            let event = self
                .inner
                .read_event()
                .map_err(|e| self.error_at(self.position(), e.to_string()))?;

            match event {
                Event::Start(start) => return Ok(Some(self.make_tag(TagKind::Start, &start, offset)?)),
                Event::Empty(start) => return Ok(Some(self.make_tag(TagKind::Empty, &start, offset)?)),
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    return Ok(Some(Tag {
                        kind: TagKind::End,
                        name,
                        attributes: Vec::new(),
                        offset,
                    }));
                }
                Event::Eof => return Ok(None),
                Event::Text(text) => {
                    let raw = text.into_inner();
                    let raw = String::from_utf8_lossy(&raw);
                    if !raw.trim().is_empty() {
                        return Err(self.error_at(offset, format!("unexpected text \"{}\"", raw.trim())));
                    }
                }
                Event::Comment(_) | Event::Decl(_) | Event::DocType(_) | Event::PI(_) => {}
                Event::CData(_) => {
                    return Err(self.error_at(offset, "unexpected CDATA section"));
                }
                // entity references and anything else the dialect does
                // not use between tags
                _ => {
                    return Err(self.error_at(offset, "unexpected XML content"));
                }
            }
        }
    }

    /// Like [`next_tag`](Self::next_tag), but end-of-document is an
    /// error mentioning the expected tag.
    pub fn require_tag(&mut self, expected: &str) -> Result<Tag> {
        let offset = self.position();
        self.next_tag()?.ok_or_else(|| {
            self.error_at(offset, format!("unexpected end of document, expected <{expected}>"))
        })
    }

    fn make_tag(&self, kind: TagKind, start: &BytesStart<'_>, offset: usize) -> Result<Tag> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes().with_checks(true) {
            let attr = attr.map_err(|e| self.error_at(offset, e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let raw = String::from_utf8_lossy(&attr.value).into_owned();
            let value = unescape(&raw)
                .map_err(|e| self.error_at(offset + e.offset, e.message))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Tag {
            kind,
            name,
            attributes,
            offset,
        })
    }
}
