//! Error types for kernel operations.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OksError>;

/// Errors that can occur while loading, mutating, saving or querying
/// the database.
///
/// Bind errors are deliberately absent: unresolved references left after
/// a bind pass are aggregated into the kernel's bind-status strings and
/// never thrown, because multi-file loads intentionally resolve across
/// later files.
#[derive(Debug, Error)]
pub enum OksError {
    /// Malformed XML or values; always carries the file and position.
    #[error("bad file data ({}:{line}:{column}): {message}", path.display())]
    BadFileData {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    /// Value text does not parse to the declared type.
    #[error("failed to read \"{text}\" as {type_name}: {reason}")]
    ValueRead {
        text: String,
        type_name: &'static str,
        reason: String,
    },

    /// Value parses but violates the attribute's range.
    #[error("value {value} is out of range \"{range}\"")]
    ValueRange { value: String, range: String },

    /// Invalid regular expression in a string range or query.
    #[error("bad regular expression \"{pattern}\": {reason}")]
    BadRegex { pattern: String, reason: String },

    /// Comparison across non-comparable value kinds.
    #[error("cannot compare {left} with {right}")]
    IncompatibleComparison {
        left: &'static str,
        right: &'static str,
    },

    /// Duplicate names, inheritance cycle, cardinality breach,
    /// class-type mismatch on a relationship value.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// A reference could not be resolved and the caller requested
    /// strict treatment.
    #[error("unresolved reference: {0}")]
    ReferenceError(String),

    /// An unresolved reference was hit while recursing through a query.
    #[error("cannot execute query: {0}")]
    UnresolvedDuringQuery(String),

    /// The file's advisory lock is held by another process; carries the
    /// holder line from the lock sidecar.
    #[error("file {} is locked by \"{holder}\"", path.display())]
    FileLocked { path: PathBuf, holder: String },

    #[error("cannot find file \"{0}\"")]
    FileNotFound(String),

    /// A file-descriptor operation (include edit, comment edit, rename)
    /// could not be applied.
    #[error("cannot {action} on file {}: {reason}", path.display())]
    FileChange {
        path: PathBuf,
        action: &'static str,
        reason: String,
    },

    #[error("file {} is read-only", .0.display())]
    FileReadOnly(PathBuf),

    /// Circular dependency between included files (strict policy).
    #[error("circular include: {0}")]
    IncludeCycle(String),

    /// A kernel operation needed an active schema or data file.
    #[error("no active {0} file is set")]
    NoActiveFile(&'static str),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OksError {
    /// Create a [`OksError::BadFileData`] for a position in a file.
    pub fn bad_file_data(
        path: impl Into<PathBuf>,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::BadFileData {
            path: path.into(),
            line,
            column,
            message: message.into(),
        }
    }

    pub fn value_read(
        text: impl Into<String>,
        type_name: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::ValueRead {
            text: text.into(),
            type_name,
            reason: reason.into(),
        }
    }

    pub fn value_range(value: impl Into<String>, range: impl Into<String>) -> Self {
        Self::ValueRange {
            value: value.into(),
            range: range.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaViolation(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Attach a path to a raw I/O error.
pub fn io_context<T>(path: &Path, result: std::io::Result<T>) -> Result<T> {
    result.map_err(|e| OksError::io(path, e))
}
