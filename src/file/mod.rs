//! OKS file descriptors.
//!
//! An [`OksFile`] mirrors the header of one XML document: identity
//! (paths, logical name, type), the `<info>` timestamps, the include
//! list in declaration order, comments, and the runtime flags the file
//! engine drives (read-only, updated, on-disk, advisory lock).

mod lock;

pub use lock::{lock_sidecar_path, read_lock_holder, FileLock};

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDateTime;
use indexmap::IndexMap;

use crate::define_arena_id;
use crate::error::{OksError, Result};

define_arena_id!(
    /// Handle of a loaded file in the kernel's file arena.
    FileId
);

/// `schema` or `data`, the `oks-format` of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Schema,
    Data,
}

impl FileFormat {
    pub fn token(self) -> &'static str {
        match self {
            FileFormat::Schema => "schema",
            FileFormat::Data => "data",
        }
    }

    pub fn from_token(token: &str) -> Option<FileFormat> {
        match token {
            "schema" => Some(FileFormat::Schema),
            "data" => Some(FileFormat::Data),
            _ => None,
        }
    }
}

/// Update status of a file, computed against the on-disk state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// In sync with the file on disk.
    NotModified,
    /// Modified in memory and not yet saved.
    Modified,
    /// Created in memory, never saved.
    WasNotSaved,
    /// Changed on disk by an external process after load.
    ExternallyModified,
    /// Removed on disk after load.
    Removed,
}

/// A modification comment from the file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Process identity (`user@host (pid …)`) that created the comment.
    pub created_by: String,
    /// Host where the comment was created.
    pub created_on: String,
    /// Free-form author label (name, e-mail, …).
    pub author: String,
    /// The comment text; never empty.
    pub text: String,
}

/// ISO-8601 basic (`YYYYMMDDThhmmss`), the timestamp form used by file
/// headers and comment keys.
pub(crate) fn format_timestamp(t: NaiveDateTime) -> String {
    t.format("%Y%m%dT%H%M%S").to_string()
}

pub(crate) fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y%m%dT%H%M%S").ok()
}

pub(crate) fn now_utc() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

pub(crate) fn user_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

pub(crate) fn host_name() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.is_empty() {
            return name;
        }
    }
    #[cfg(unix)]
    {
        if let Ok(text) = std::fs::read_to_string("/etc/hostname") {
            let name = text.trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }
    "localhost".to_string()
}

/// Descriptor of one loaded, created or included XML document.
#[derive(Debug)]
pub struct OksFile {
    /// Path used to open the file, absolute.
    full_name: PathBuf,
    /// Path as given by the user or the include directive.
    short_name: String,
    /// Path relative to the repository root, when the file is below one.
    repository_name: String,
    pub logical_name: String,
    pub file_type: String,
    format: FileFormat,
    /// Classes (schema) or objects (data) counted at load/save time.
    pub number_of_items: usize,
    pub created_by: String,
    pub created_on: String,
    pub creation_time: Option<NaiveDateTime>,
    pub last_modified_by: String,
    pub last_modified_on: String,
    pub last_modification_time: Option<NaiveDateTime>,
    read_only: bool,
    /// Dirty flag: the in-memory state differs from disk.
    updated: bool,
    /// False until the first save of a created file.
    on_disk: bool,
    includes: Vec<String>,
    /// Include edges resolved to loaded files; rebuilt on every load.
    pub(crate) resolved_includes: Vec<FileId>,
    /// Comments keyed by their creation timestamp.
    comments: IndexMap<String, Comment>,
    /// First file that included this one, if any.
    pub(crate) included_by: Option<FileId>,
    lock: Option<FileLock>,
    /// mtime observed at load or save, for external-change detection.
    pub(crate) last_modified: Option<SystemTime>,
}

/// Cloning a descriptor never clones the advisory lock: a private
/// kernel copy starts without write intent.
impl Clone for OksFile {
    fn clone(&self) -> Self {
        Self {
            full_name: self.full_name.clone(),
            short_name: self.short_name.clone(),
            repository_name: self.repository_name.clone(),
            logical_name: self.logical_name.clone(),
            file_type: self.file_type.clone(),
            format: self.format,
            number_of_items: self.number_of_items,
            created_by: self.created_by.clone(),
            created_on: self.created_on.clone(),
            creation_time: self.creation_time,
            last_modified_by: self.last_modified_by.clone(),
            last_modified_on: self.last_modified_on.clone(),
            last_modification_time: self.last_modification_time,
            read_only: self.read_only,
            updated: self.updated,
            on_disk: self.on_disk,
            includes: self.includes.clone(),
            resolved_includes: self.resolved_includes.clone(),
            comments: self.comments.clone(),
            included_by: self.included_by,
            lock: None,
            last_modified: self.last_modified,
        }
    }
}

impl OksFile {
    /// Descriptor for a file created in memory (`new_schema` / `new_data`).
    pub fn create(
        full_name: PathBuf,
        short_name: String,
        logical_name: String,
        file_type: String,
        format: FileFormat,
    ) -> Self {
        Self {
            full_name,
            short_name,
            repository_name: String::new(),
            logical_name,
            file_type,
            format,
            number_of_items: 0,
            created_by: user_name(),
            created_on: host_name(),
            creation_time: Some(now_utc()),
            last_modified_by: String::new(),
            last_modified_on: String::new(),
            last_modification_time: None,
            read_only: false,
            updated: true,
            on_disk: false,
            includes: Vec::new(),
            resolved_includes: Vec::new(),
            comments: IndexMap::new(),
            included_by: None,
            lock: None,
            last_modified: None,
        }
    }

    /// Descriptor for a file being loaded from disk; header fields are
    /// filled by the parser.
    pub(crate) fn loaded(
        full_name: PathBuf,
        short_name: String,
        format: FileFormat,
        read_only: bool,
        last_modified: Option<SystemTime>,
    ) -> Self {
        let mut file = Self::create(full_name, short_name, String::new(), String::new(), format);
        file.created_by = String::new();
        file.created_on = String::new();
        file.creation_time = None;
        file.read_only = read_only;
        file.updated = false;
        file.on_disk = true;
        file.last_modified = last_modified;
        file
    }

    pub fn full_name(&self) -> &Path {
        &self.full_name
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Path inside the repository, or the full path when the file does
    /// not belong to one.
    pub fn well_formed_name(&self) -> String {
        if self.repository_name.is_empty() {
            self.full_name.display().to_string()
        } else {
            self.repository_name.clone()
        }
    }

    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }

    pub(crate) fn set_repository_name(&mut self, name: String) {
        self.repository_name = name;
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub(crate) fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_updated(&self) -> bool {
        self.updated
    }

    pub(crate) fn set_updated(&mut self) {
        self.updated = true;
    }

    pub(crate) fn clear_updated(&mut self) {
        self.updated = false;
    }

    pub fn is_on_disk(&self) -> bool {
        self.on_disk
    }

    pub(crate) fn set_on_disk(&mut self) {
        self.on_disk = true;
    }

    pub fn include_files(&self) -> &[String] {
        &self.includes
    }

    pub fn parent(&self) -> Option<FileId> {
        self.included_by
    }

    /// Record the first includer of this file.
    pub(crate) fn check_parent(&mut self, parent: Option<FileId>) {
        if self.included_by.is_none() {
            self.included_by = parent;
        }
    }

    /// Point the descriptor at a new path (save-as); the file is not on
    /// disk there until the next save.
    pub(crate) fn rename_paths(&mut self, full_name: PathBuf, short_name: String) {
        self.full_name = full_name;
        self.short_name = short_name;
        self.on_disk = false;
    }

    // ------------------------------------------------------------------
    // Locking
    // ------------------------------------------------------------------

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    /// Take the advisory lock. No-op when this kernel already holds it.
    pub fn lock(&mut self) -> Result<()> {
        if self.lock.is_some() {
            return Ok(());
        }
        if self.on_disk && self.read_only {
            return Err(OksError::FileReadOnly(self.full_name.clone()));
        }
        self.lock = Some(FileLock::acquire(&self.full_name)?);
        Ok(())
    }

    /// Release the advisory lock and remove the sidecar.
    pub fn unlock(&mut self) -> Result<()> {
        if let Some(lock) = self.lock.take() {
            lock.release()?;
        }
        Ok(())
    }

    /// The holder line of the lock sidecar, also for locks held by
    /// other processes. `None` when no sidecar exists.
    pub fn lock_holder(&self) -> Option<String> {
        read_lock_holder(&self.full_name)
    }

    // ------------------------------------------------------------------
    // Includes
    // ------------------------------------------------------------------

    pub(crate) fn set_includes(&mut self, includes: Vec<String>) {
        self.includes = includes;
    }

    /// Add an include; takes the lock and marks the file dirty. The new
    /// include is loaded on the next save/load cycle.
    pub fn add_include_file(&mut self, name: &str) -> Result<()> {
        if self.includes.iter().any(|i| i == name) {
            return Ok(());
        }
        self.lock()?;
        self.includes.push(name.to_string());
        self.updated = true;
        Ok(())
    }

    pub fn remove_include_file(&mut self, name: &str) -> Result<()> {
        let position = self.includes.iter().position(|i| i == name).ok_or_else(|| {
            OksError::FileChange {
                path: self.full_name.clone(),
                action: "remove include",
                reason: format!("file does not include \"{name}\""),
            }
        })?;
        self.lock()?;
        self.includes.remove(position);
        self.updated = true;
        Ok(())
    }

    pub fn rename_include_file(&mut self, from: &str, to: &str) -> Result<()> {
        let position = self.includes.iter().position(|i| i == from).ok_or_else(|| {
            OksError::FileChange {
                path: self.full_name.clone(),
                action: "rename include",
                reason: format!("file does not include \"{from}\""),
            }
        })?;
        self.lock()?;
        self.includes[position] = to.to_string();
        self.updated = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------

    pub fn comments(&self) -> &IndexMap<String, Comment> {
        &self.comments
    }

    pub(crate) fn insert_comment(&mut self, creation_time: String, comment: Comment) {
        self.comments.insert(creation_time, comment);
    }

    /// Add a comment stamped now; the creation time is the key.
    pub fn add_comment(&mut self, text: &str, author: &str) -> Result<String> {
        if text.is_empty() {
            return Err(OksError::FileChange {
                path: self.full_name.clone(),
                action: "add comment",
                reason: "comment text is empty".to_string(),
            });
        }
        self.lock()?;
        let mut key = format_timestamp(now_utc());
        while self.comments.contains_key(&key) {
            key.push('\'');
        }
        self.comments.insert(
            key.clone(),
            Comment {
                created_by: user_name(),
                created_on: host_name(),
                author: author.to_string(),
                text: text.to_string(),
            },
        );
        self.updated = true;
        Ok(key)
    }

    pub fn modify_comment(&mut self, creation_time: &str, text: &str, author: &str) -> Result<()> {
        if text.is_empty() {
            return Err(OksError::FileChange {
                path: self.full_name.clone(),
                action: "modify comment",
                reason: "comment text is empty".to_string(),
            });
        }
        self.lock()?;
        let comment = self.comments.get_mut(creation_time).ok_or_else(|| {
            OksError::FileChange {
                path: self.full_name.clone(),
                action: "modify comment",
                reason: format!("no comment created at \"{creation_time}\""),
            }
        })?;
        comment.text = text.to_string();
        comment.author = author.to_string();
        self.updated = true;
        Ok(())
    }

    pub fn remove_comment(&mut self, creation_time: &str) -> Result<()> {
        self.lock()?;
        if self.comments.shift_remove(creation_time).is_none() {
            return Err(OksError::FileChange {
                path: self.full_name.clone(),
                action: "remove comment",
                reason: format!("no comment created at \"{creation_time}\""),
            });
        }
        self.updated = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Header fields
    // ------------------------------------------------------------------

    pub fn set_logical_name(&mut self, name: &str) -> Result<()> {
        self.lock()?;
        self.logical_name = name.to_string();
        self.updated = true;
        Ok(())
    }

    pub fn set_type(&mut self, file_type: &str) -> Result<()> {
        self.lock()?;
        self.file_type = file_type.to_string();
        self.updated = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    /// Compute the update status against the on-disk state.
    pub fn status(&self) -> FileStatus {
        if !self.on_disk {
            return FileStatus::WasNotSaved;
        }
        if self.updated {
            return FileStatus::Modified;
        }
        match std::fs::metadata(&self.full_name) {
            Err(_) => FileStatus::Removed,
            Ok(meta) => {
                let disk_mtime = meta.modified().ok();
                if disk_mtime.is_some() && disk_mtime != self.last_modified {
                    FileStatus::ExternallyModified
                } else {
                    FileStatus::NotModified
                }
            }
        }
    }

    /// Remember the current on-disk mtime as the known state.
    pub fn update_status_of_file(&mut self) {
        if let Ok(meta) = std::fs::metadata(&self.full_name) {
            self.last_modified = meta.modified().ok();
        }
    }
}
