//! The kernel: the in-memory database and its file engine.
//!
//! One [`Kernel`] owns every file descriptor, class and object. All
//! public operations go through `&self` / `&mut self`, which gives the
//! single-writer / multi-reader discipline at compile time; embedders
//! that share a kernel across threads wrap it in a [`SharedKernel`].
//! Notification callbacks run on the mutating thread, after the
//! mutation is committed, and receive plain records.

mod alias;
mod bind;
mod load;
mod objects;
mod path;
mod pipeline;
mod reload;
mod save;
mod schema_edit;

#[cfg(test)]
mod tests;

pub use pipeline::{validate_files, ValidationReport};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::base::Arena;
use crate::config::KernelConfig;
use crate::error::{OksError, Result};
use crate::file::{FileFormat, FileId, OksFile};
use crate::object::{Obj, ObjectId};
use crate::schema::{Class, ClassId, EventEmitter, ObjectEvent, ReloadBatch, SchemaEvent};

/// A kernel shared between threads: shared lock for readers, exclusive
/// for every structural mutator.
pub type SharedKernel = Arc<RwLock<Kernel>>;

pub struct Kernel {
    pub(crate) config: KernelConfig,

    pub(crate) files: Arena<OksFile, FileId>,
    /// Schema files by full path, in load order.
    pub(crate) schema_files: IndexMap<PathBuf, FileId>,
    /// Data files by full path, in load order.
    pub(crate) data_files: IndexMap<PathBuf, FileId>,

    pub(crate) classes: Arena<Class, ClassId>,
    pub(crate) class_index: FxHashMap<SmolStr, ClassId>,

    pub(crate) objects: Arena<Obj, ObjectId>,

    pub(crate) active_schema: Option<FileId>,
    pub(crate) active_data: Option<FileId>,

    pub(crate) bind_objects_status: String,
    pub(crate) bind_classes_status: String,
    /// Per-file error lines collected by multi-file loads.
    pub(crate) load_errors: Vec<String>,

    next_object_serial: u64,

    pub(crate) schema_events: EventEmitter<SchemaEvent>,
    pub(crate) object_events: EventEmitter<ObjectEvent>,
    pub(crate) reload_events: EventEmitter<ReloadBatch>,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Kernel {
        Kernel {
            config,
            files: Arena::new(),
            schema_files: IndexMap::new(),
            data_files: IndexMap::new(),
            classes: Arena::new(),
            class_index: FxHashMap::default(),
            objects: Arena::new(),
            active_schema: None,
            active_data: None,
            bind_objects_status: String::new(),
            bind_classes_status: String::new(),
            load_errors: Vec::new(),
            next_object_serial: 0,
            schema_events: EventEmitter::new(),
            object_events: EventEmitter::new(),
            reload_events: EventEmitter::new(),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut KernelConfig {
        &mut self.config
    }

    // ------------------------------------------------------------------
    // Arena access
    // ------------------------------------------------------------------

    pub fn class(&self, id: ClassId) -> Result<&Class> {
        self.classes
            .get(id)
            .ok_or_else(|| OksError::ReferenceError("dangling class handle".to_string()))
    }

    pub(crate) fn class_mut(&mut self, id: ClassId) -> Result<&mut Class> {
        self.classes
            .get_mut(id)
            .ok_or_else(|| OksError::ReferenceError("dangling class handle".to_string()))
    }

    pub fn object(&self, id: ObjectId) -> Result<&Obj> {
        self.objects
            .get(id)
            .ok_or_else(|| OksError::ReferenceError("dangling object handle".to_string()))
    }

    pub(crate) fn object_mut(&mut self, id: ObjectId) -> Result<&mut Obj> {
        self.objects
            .get_mut(id)
            .ok_or_else(|| OksError::ReferenceError("dangling object handle".to_string()))
    }

    pub fn file(&self, id: FileId) -> Result<&OksFile> {
        self.files
            .get(id)
            .ok_or_else(|| OksError::ReferenceError("dangling file handle".to_string()))
    }

    pub fn file_mut(&mut self, id: FileId) -> Result<&mut OksFile> {
        self.files
            .get_mut(id)
            .ok_or_else(|| OksError::ReferenceError("dangling file handle".to_string()))
    }

    /// O(1) liveness check of a class handle.
    pub fn is_dangling_class(&self, id: ClassId) -> bool {
        !self.classes.contains(id)
    }

    /// O(1) liveness check of an object handle.
    pub fn is_dangling_object(&self, id: ObjectId) -> bool {
        !self.objects.contains(id)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn find_class(&self, name: &str) -> Option<ClassId> {
        self.class_index.get(name).copied()
    }

    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &Class)> {
        self.classes.iter()
    }

    pub fn number_of_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn all_objects(&self) -> impl Iterator<Item = (ObjectId, &Obj)> {
        self.objects.iter()
    }

    pub fn number_of_objects(&self) -> usize {
        self.objects.len()
    }

    /// Find an object by class and id, optionally searching the whole
    /// inheritance cone of the class.
    pub fn find_object(&self, class: ClassId, id: &str, search_subclasses: bool) -> Option<ObjectId> {
        let c = self.classes.get(class)?;
        if let Some(found) = c.objects.get(id) {
            return Some(*found);
        }
        if search_subclasses {
            for sub in &c.all_sub {
                if let Some(found) = self.classes.get(*sub).and_then(|s| s.objects.get(id)) {
                    return Some(*found);
                }
            }
        }
        None
    }

    /// True when `class` is `target` or one of its subclasses.
    pub fn is_castable(&self, class: ClassId, target: ClassId) -> bool {
        if class == target {
            return true;
        }
        self.classes
            .get(class)
            .is_some_and(|c| c.all_super.contains(&target))
    }

    /// `is_subclass_of` by names.
    pub fn is_subclass_of(&self, class: &str, target: &str) -> bool {
        match (self.find_class(class), self.find_class(target)) {
            (Some(c), Some(t)) => c != t && self.is_castable(c, t),
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // File tables
    // ------------------------------------------------------------------

    pub fn schema_files(&self) -> &IndexMap<PathBuf, FileId> {
        &self.schema_files
    }

    pub fn data_files(&self) -> &IndexMap<PathBuf, FileId> {
        &self.data_files
    }

    fn find_file_in(&self, name: &str, table: &IndexMap<PathBuf, FileId>) -> Option<FileId> {
        for (path, id) in table {
            if path == Path::new(name) {
                return Some(*id);
            }
            if let Some(file) = self.files.get(*id) {
                if file.short_name() == name || file.repository_name() == name {
                    return Some(*id);
                }
            }
        }
        None
    }

    pub fn find_schema_file(&self, name: &str) -> Option<FileId> {
        self.find_file_in(name, &self.schema_files)
    }

    pub fn find_data_file(&self, name: &str) -> Option<FileId> {
        self.find_file_in(name, &self.data_files)
    }

    /// Classes owned by a schema file.
    pub fn classes_of_file(&self, file: FileId) -> Vec<ClassId> {
        self.classes
            .iter()
            .filter(|(_, c)| c.file() == file)
            .map(|(id, _)| id)
            .collect()
    }

    /// Objects owned by a data file.
    pub fn objects_of_file(&self, file: FileId) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, o)| o.file == file)
            .map(|(id, _)| id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Active files
    // ------------------------------------------------------------------

    pub fn get_active_schema(&self) -> Option<FileId> {
        self.active_schema
    }

    pub fn get_active_data(&self) -> Option<FileId> {
        self.active_data
    }

    /// New classes go to this schema file; it must be writable.
    pub fn set_active_schema(&mut self, file: FileId) -> Result<()> {
        let descriptor = self.file(file)?;
        if descriptor.format() != FileFormat::Schema {
            return Err(OksError::FileChange {
                path: descriptor.full_name().to_path_buf(),
                action: "set active schema",
                reason: "not a schema file".to_string(),
            });
        }
        if descriptor.is_read_only() {
            return Err(OksError::FileReadOnly(descriptor.full_name().to_path_buf()));
        }
        self.active_schema = Some(file);
        Ok(())
    }

    /// New objects go to this data file; it must be writable.
    pub fn set_active_data(&mut self, file: FileId) -> Result<()> {
        let descriptor = self.file(file)?;
        if descriptor.format() != FileFormat::Data {
            return Err(OksError::FileChange {
                path: descriptor.full_name().to_path_buf(),
                action: "set active data",
                reason: "not a data file".to_string(),
            });
        }
        if descriptor.is_read_only() {
            return Err(OksError::FileReadOnly(descriptor.full_name().to_path_buf()));
        }
        self.active_data = Some(file);
        Ok(())
    }

    /// Re-stat one file to refresh external-change detection.
    pub fn update_status_of_file(&mut self, file: FileId) -> Result<()> {
        self.file_mut(file)?.update_status_of_file();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Bind status
    // ------------------------------------------------------------------

    /// Residual unresolved object references after the last bind pass;
    /// empty when everything resolved.
    pub fn get_bind_objects_status(&self) -> &str {
        &self.bind_objects_status
    }

    /// Unresolved relationship target classes; empty when the schema
    /// graph is closed.
    pub fn get_bind_classes_status(&self) -> &str {
        &self.bind_classes_status
    }

    /// Errors recorded against files during the last multi-file load.
    pub fn load_errors(&self) -> &[String] {
        &self.load_errors
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub fn subscribe_schema(&mut self, callback: impl FnMut(&SchemaEvent) + Send + 'static) {
        self.schema_events.subscribe(callback);
    }

    pub fn subscribe_objects(&mut self, callback: impl FnMut(&ObjectEvent) + Send + 'static) {
        self.object_events.subscribe(callback);
    }

    /// One callback per affected class after a reload.
    pub fn subscribe_reload(&mut self, callback: impl FnMut(&ReloadBatch) + Send + 'static) {
        self.reload_events.subscribe(callback);
    }

    // ------------------------------------------------------------------
    // Internals shared by the submodules
    // ------------------------------------------------------------------

    /// Lock the owning file of a mutation and flip its dirty flag.
    pub(crate) fn touch_file(&mut self, file: FileId) -> Result<()> {
        let descriptor = self.file_mut(file)?;
        descriptor.lock()?;
        descriptor.set_updated();
        Ok(())
    }

    pub(crate) fn next_generated_id(&mut self, class: ClassId) -> SmolStr {
        loop {
            self.next_object_serial += 1;
            let id = SmolStr::new(format!("obj-{}", self.next_object_serial));
            if self.find_object(class, &id, true).is_none() {
                return id;
            }
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

/// A private copy sharing no mutable state with the source; used by the
/// validation pipeline's workers. Subscriptions do not carry over.
impl Clone for Kernel {
    fn clone(&self) -> Self {
        Kernel {
            config: self.config.clone(),
            files: self.files.clone(),
            schema_files: self.schema_files.clone(),
            data_files: self.data_files.clone(),
            classes: self.classes.clone(),
            class_index: self.class_index.clone(),
            objects: self.objects.clone(),
            active_schema: self.active_schema,
            active_data: self.active_data,
            bind_objects_status: self.bind_objects_status.clone(),
            bind_classes_status: self.bind_classes_status.clone(),
            load_errors: self.load_errors.clone(),
            next_object_serial: self.next_object_serial,
            schema_events: EventEmitter::new(),
            object_events: EventEmitter::new(),
            reload_events: EventEmitter::new(),
        }
    }
}
