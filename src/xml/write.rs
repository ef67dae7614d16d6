//! The dialect writer.
//!
//! Mirrors the reader: start/empty/end tags, escaped attribute values,
//! raw output for the preamble and DTD blocks. Methods return plain
//! `io::Result`; the kernel attaches the file path when it bubbles an
//! error up.

use std::io::{self, Write};

use super::escape::escape;

pub struct XmlWriter<W: Write> {
    out: W,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn put_raw(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())
    }

    /// `<name`
    pub fn put_start_tag(&mut self, name: &str) -> io::Result<()> {
        write!(self.out, "<{name}")
    }

    /// ` name="value"` with escaping
    pub fn put_attribute(&mut self, name: &str, value: &str) -> io::Result<()> {
        write!(self.out, " {name}=\"{}\"", escape(value))
    }

    pub fn put_numeric_attribute(&mut self, name: &str, value: u64) -> io::Result<()> {
        write!(self.out, " {name}=\"{value}\"")
    }

    /// `/>` and a newline: close an empty tag
    pub fn put_end_tag(&mut self) -> io::Result<()> {
        self.out.write_all(b"/>\n")
    }

    /// `>` and a newline: close a start tag with children to follow
    pub fn put_eol(&mut self) -> io::Result<()> {
        self.out.write_all(b">\n")
    }

    /// `</name>` and a newline
    pub fn put_last_tag(&mut self, name: &str) -> io::Result<()> {
        writeln!(self.out, "</{name}>")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
