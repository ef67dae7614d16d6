//! Streaming reader and writer for the OKS XML dialect.
//!
//! The codec is format-agnostic: it hands out tags and attribute pairs
//! and knows nothing about schema or object elements. Entity handling is
//! restricted to the OKS subset; anything else is bad file data with the
//! exact line and column.

mod escape;
mod pool;
mod read;
mod write;

#[cfg(test)]
mod tests;

pub use escape::{escape, unescape};
pub use pool::{acquire_buffer, PooledBuffer};
pub use read::{Tag, TagKind, XmlReader};
pub use write::XmlWriter;

/// `yes` / `no`, the boolean wire form of flag attributes.
pub fn bool_to_str(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

/// Anything but `yes` reads as false.
pub fn str_to_bool(s: &str) -> bool {
    s == "yes"
}
