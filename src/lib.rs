//! # oks-kernel
//!
//! In-memory object kernel for engineering configuration data: an
//! XML-backed schema and object database with predicate and path queries.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! query     → predicate queries, index acceleration, path queries
//!   ↓
//! kernel    → file engine: load/reload/save/close, includes, binding,
//!             advisory locks, parallel validation
//!   ↓
//! object    → object store: identity, value vectors, reverse composite
//!             references, attribute indices
//!   ↓
//! schema    → classes, attributes, relationships, methods, inheritance
//!   ↓
//! file      → file descriptors, comments, lock sidecars
//!   ↓
//! xml       → streaming reader/writer for the OKS XML dialect
//!   ↓
//! value     → tagged value model: parse, convert, compare, range-check
//!   ↓
//! base      → Primitives (generational arenas, id newtypes, LineIndex)
//! ```

// ============================================================================
// MODULES (dependency order: base → value → xml → file → schema → object →
// kernel → query)
// ============================================================================

/// Foundation types: generational arenas, id newtypes, LineIndex
pub mod base;

/// Kernel configuration and the environment boundary
pub mod config;

/// The crate-wide error type
pub mod error;

/// Typed value model: parse, convert, compare, range-check, format
pub mod value;

/// Streaming reader/writer for the OKS XML dialect
pub mod xml;

/// File descriptors, comments, advisory lock sidecars
pub mod file;

/// Schema graph: classes, attributes, relationships, methods, inheritance
pub mod schema;

/// Object store: identity, value vectors, RCRs, attribute indices
pub mod object;

/// Kernel: file engine, include resolution, binding, validation pipeline
pub mod kernel;

/// Predicate and path queries
pub mod query;

// Re-export the types almost every embedder needs
pub use config::KernelConfig;
pub use error::{OksError, Result};
pub use file::{FileFormat, FileId, FileStatus, OksFile};
pub use kernel::{Kernel, SharedKernel};
pub use object::ObjectId;
pub use schema::{Attribute, AttributeType, Class, ClassId, Relationship};
pub use value::Value;
