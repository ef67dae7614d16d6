//! Diffing reload of externally modified data files.
//!
//! Reload syncs memory to disk without disturbing untouched state:
//! objects unchanged in the file keep their handle, removed objects are
//! destroyed with the unbind scan, added objects are created, changed
//! objects are mutated in place. Reload is not an edit — it neither
//! locks nor dirties files — and its notifications are coalesced into
//! one batch per affected class.

use std::io::Read;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tracing::{info, warn};

use crate::error::{OksError, Result};
use crate::file::{FileFormat, FileId};
use crate::object::ObjectId;
use crate::schema::{ClassId, ReloadBatch};
use crate::value::Value;
use crate::xml::{acquire_buffer, XmlReader};

use super::alias::AliasTable;
use super::load::DATA_ROOT_TAG;
use super::Kernel;

#[derive(Default)]
struct ClassDiff {
    created: Vec<ObjectId>,
    modified: Vec<ObjectId>,
    removed: Vec<SmolStr>,
}

impl Kernel {
    /// Re-read a set of externally modified data files and apply the
    /// difference in place. `allow_schema_extension` permits new
    /// includes appearing in the reloaded files to bring in schema
    /// files.
    pub fn reload_data(&mut self, files: &[FileId], allow_schema_extension: bool) -> Result<()> {
        let mut diffs: FxHashMap<SmolStr, ClassDiff> = FxHashMap::default();

        for file in files {
            self.reload_one(*file, allow_schema_extension, &mut diffs)?;
        }

        self.bind_objects();

        for (class, diff) in diffs {
            if diff.created.is_empty() && diff.modified.is_empty() && diff.removed.is_empty() {
                continue;
            }
            self.reload_events.emit(&ReloadBatch {
                class,
                created: diff.created,
                modified: diff.modified,
                removed: diff.removed,
            });
        }
        Ok(())
    }

    fn reload_one(
        &mut self,
        file: FileId,
        allow_schema_extension: bool,
        diffs: &mut FxHashMap<SmolStr, ClassDiff>,
    ) -> Result<()> {
        let (full, format) = {
            let descriptor = self.file(file)?;
            (descriptor.full_name().to_path_buf(), descriptor.format())
        };
        if format != FileFormat::Data {
            return Err(OksError::schema(format!(
                "cannot reload \"{}\": not a data file",
                full.display()
            )));
        }
        info!("reloading {}", full.display());

        let mut buffer = acquire_buffer();
        {
            let mut handle = std::fs::File::open(&full).map_err(|e| OksError::io(&full, e))?;
            handle
                .read_to_string(&mut buffer)
                .map_err(|e| OksError::io(&full, e))?;
        }

        let mut reader = XmlReader::new(&full, &buffer);
        let root = reader.require_tag(DATA_ROOT_TAG)?;
        if !root.is_start_of(DATA_ROOT_TAG) {
            return Err(reader.error_at(root.offset, "expected <oks-data>"));
        }

        // refresh the header on a scratch descriptor, then adopt it
        let mut header = crate::file::OksFile::loaded(
            full.clone(),
            self.file(file)?.short_name().to_string(),
            FileFormat::Data,
            self.file(file)?.is_read_only(),
            std::fs::metadata(&full).ok().and_then(|m| m.modified().ok()),
        );
        self.read_header(&mut reader, &mut header)?;

        // new includes may extend the schema
        let known: FxHashSet<FileId> = self
            .schema_files
            .values()
            .chain(self.data_files.values())
            .copied()
            .collect();
        for include in header.include_files() {
            let loaded = self.load_file_for_reload(include, file)?;
            if let Some(loaded) = loaded {
                let is_new_schema = !known.contains(&loaded)
                    && self.file(loaded)?.format() == FileFormat::Schema;
                if is_new_schema && !allow_schema_extension {
                    self.close_any(loaded)?;
                    return Err(OksError::schema(format!(
                        "reload of \"{}\" would extend the schema via include \"{include}\"",
                        full.display()
                    )));
                }
            }
        }

        // parse the new contents into a staging table
        let mut aliases = AliasTable::new();
        let mut staged: IndexMap<(ClassId, SmolStr), Vec<Value>> = IndexMap::new();
        loop {
            let Some(tag) = reader.next_tag()? else {
                break;
            };
            if tag.is_end_of(DATA_ROOT_TAG) {
                break;
            }
            if !tag.is_start_of("obj") {
                return Err(reader.error_at(
                    tag.offset,
                    format!("unexpected tag <{}>, expected <obj>", tag.name),
                ));
            }
            let (class, id, values) = self.read_object_record(&mut reader, &tag, &mut aliases)?;
            if staged.insert((class, id.clone()), values).is_some() {
                warn!("object \"{id}\" appears twice in {}", full.display());
            }
        }

        // diff against the objects currently owned by the file
        let current: Vec<ObjectId> = self.objects_of_file(file);
        let mut current_by_identity: FxHashMap<(ClassId, SmolStr), ObjectId> = current
            .iter()
            .filter_map(|id| {
                let o = self.objects.get(*id)?;
                Some(((o.class, o.id.clone()), *id))
            })
            .collect();

        let mut affected_classes: FxHashSet<ClassId> = FxHashSet::default();

        for ((class, id), values) in staged {
            let class_name = self.class(class)?.name.clone();
            match current_by_identity.remove(&(class, id.clone())) {
                Some(existing) => {
                    let changed = {
                        let o = self.object(existing)?;
                        o.values.len() != values.len()
                            || o.values
                                .iter()
                                .zip(values.iter())
                                .any(|(a, b)| !self.values_equivalent(a, b))
                    };
                    if changed {
                        self.overwrite_object_values(existing, values)?;
                        affected_classes.insert(class);
                        diffs.entry(class_name).or_default().modified.push(existing);
                    }
                }
                None => {
                    if self.check_id_unique(class, &id).is_err() {
                        warn!(
                            "reload of {} skips duplicated object \"{id}@{class_name}\"",
                            full.display()
                        );
                        continue;
                    }
                    let object = self.adopt_object(file, class, id, values, None)?;
                    affected_classes.insert(class);
                    diffs.entry(class_name).or_default().created.push(object);
                }
            }
        }

        // whatever was not staged disappeared from the file
        let removed: Vec<ObjectId> = current_by_identity.into_values().collect();
        if !removed.is_empty() {
            self.unbind_to_uids(&removed)?;
        }
        for object in removed {
            let (class, id) = {
                let o = self.object(object)?;
                (o.class, o.id.clone())
            };
            let class_name = self.class(class)?.name.clone();
            self.drop_composite_entries_of(object)?;
            let _ = self.unindex_for_close(class, object);
            if let Ok(c) = self.class_mut(class) {
                c.objects.shift_remove(&id);
            }
            self.objects.remove(object);
            affected_classes.insert(class);
            diffs.entry(class_name).or_default().removed.push(id);
        }

        for class in affected_classes {
            self.rebuild_indices(class)?;
        }

        // adopt the refreshed header
        {
            let descriptor = self.file_mut(file)?;
            descriptor.logical_name = header.logical_name.clone();
            descriptor.file_type = header.file_type.clone();
            descriptor.created_by = header.created_by.clone();
            descriptor.created_on = header.created_on.clone();
            descriptor.creation_time = header.creation_time;
            descriptor.last_modified_by = header.last_modified_by.clone();
            descriptor.last_modified_on = header.last_modified_on.clone();
            descriptor.last_modification_time = header.last_modification_time;
            descriptor.set_includes(header.include_files().to_vec());
            descriptor.clear_updated();
            descriptor.update_status_of_file();
        }
        let count = self.objects_of_file(file).len();
        self.file_mut(file)?.number_of_items = count;
        Ok(())
    }

    /// Load an include during reload; parse failures are recorded, not
    /// fatal, matching the multi-file load policy.
    fn load_file_for_reload(&mut self, include: &str, parent: FileId) -> Result<Option<FileId>> {
        match self.load_file_with_parent(include, parent) {
            Ok(id) => Ok(Some(id)),
            Err(
                error @ (OksError::FileNotFound(_)
                | OksError::Io { .. }
                | OksError::IncludeCycle(_)),
            ) => Err(error),
            Err(error) => {
                warn!("include \"{include}\" failed to load during reload: {error}");
                Ok(None)
            }
        }
    }

    /// Replace an object's values in place, dropping the reverse
    /// entries its old composite edges created (a later bind pass
    /// recreates the current ones).
    fn overwrite_object_values(&mut self, object: ObjectId, values: Vec<Value>) -> Result<()> {
        self.drop_composite_entries_of(object)?;
        self.object_mut(object)?.values = values;
        Ok(())
    }

    /// Remove the RCR entries created by this object's composite
    /// forward edges.
    pub(crate) fn drop_composite_entries_of(&mut self, object: ObjectId) -> Result<()> {
        let forward: Vec<(SmolStr, Value)> = {
            let o = self.object(object)?;
            let Some(class) = self.classes.get(o.class) else {
                return Ok(());
            };
            class
                .all_relationships
                .iter()
                .enumerate()
                .filter(|(_, r)| r.maintains_rcr())
                .filter_map(|(i, r)| {
                    o.values
                        .get(class.all_attributes.len() + i)
                        .map(|v| (r.name.clone(), v.clone()))
                })
                .collect()
        };
        for (relationship, value) in forward {
            let remove = |kernel: &mut Kernel, v: &Value| {
                if let Value::ObjectRef(child) = v {
                    if let Some(child) = kernel.objects.get_mut(*child) {
                        child.remove_rcr(object, &relationship);
                    }
                }
            };
            match &value {
                Value::List(items) => {
                    for item in items {
                        remove(self, item);
                    }
                }
                single => remove(self, single),
            }
        }
        Ok(())
    }

    /// Reference-aware value comparison: a resolved reference equals a
    /// deferred uid naming the same `(class, id)`.
    pub(crate) fn values_equivalent(&self, a: &Value, b: &Value) -> bool {
        let identity = |v: &Value| -> Option<(SmolStr, SmolStr)> {
            match v {
                Value::ObjectRef(target) => {
                    let o = self.objects.get(*target)?;
                    let class = self.classes.get(o.class)?;
                    Some((class.name.clone(), o.id.clone()))
                }
                Value::Uid { class, id } => self
                    .classes
                    .get(*class)
                    .map(|c| (c.name.clone(), id.clone())),
                Value::Uid2 { class, id } => Some((class.clone(), id.clone())),
                _ => None,
            }
        };

        match (a, b) {
            (Value::List(left), Value::List(right)) => {
                left.len() == right.len()
                    && left
                        .iter()
                        .zip(right.iter())
                        .all(|(x, y)| self.values_equivalent(x, y))
            }
            _ => match (identity(a), identity(b)) {
                (Some(x), Some(y)) => x == y,
                (None, None) => a == b,
                _ => false,
            },
        }
    }
}
