//! Foundation types for the OKS kernel.
//!
//! This module provides fundamental types used throughout the crate:
//! - [`Arena`], [`RawId`] - Generational arena storage for files, classes
//!   and objects; a dangling handle is detected by a generation compare
//! - [`LineCol`], [`LineIndex`] - Byte offset to line/column conversion
//!   for positional diagnostics
//!
//! This module has NO dependencies on other oks modules.

mod arena;
mod line_index;

pub use arena::{Arena, ArenaId, RawId};
pub use line_index::{LineCol, LineIndex};
