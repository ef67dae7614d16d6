//! Loading, creating and closing files.
//!
//! A load parses the header, recurses into includes (bounded by the
//! table of already loaded files), parses class or object entries in
//! order, and finishes with a bind pass. Parse and value errors abort
//! the offending file — it is unloaded and the error recorded — while
//! sibling includes and later loads continue.

use std::io::Read;

use smol_str::SmolStr;
use tracing::{debug, info, warn};

use crate::config::DuplicatedObjectsPolicy;
use crate::error::{OksError, Result};
use crate::file::{parse_timestamp, Comment, FileFormat, FileId, OksFile};
use crate::object::ObjectId;
use crate::schema::{
    Attribute, Class, ClassId, Method, Relationship, SchemaEvent, ATTRIBUTE_TAG, METHOD_TAG,
    RELATIONSHIP_TAG,
};
use crate::value::{parse_token, Kind, Value};
use crate::xml::{acquire_buffer, Tag, TagKind, XmlReader};

use super::alias::AliasTable;
use super::path::canonical;
use super::Kernel;

pub(crate) const SCHEMA_ROOT_TAG: &str = "oks-schema";
pub(crate) const DATA_ROOT_TAG: &str = "oks-data";

impl Kernel {
    // ------------------------------------------------------------------
    // Public load entry points
    // ------------------------------------------------------------------

    /// Load a file, deciding schema vs data from its root tag.
    pub fn load_file(&mut self, name: &str, bind: bool) -> Result<FileId> {
        self.k_load(name, None, bind, None)
    }

    pub fn load_schema(&mut self, name: &str) -> Result<FileId> {
        self.k_load(name, Some(FileFormat::Schema), true, None)
    }

    /// Load a data file. Callers loading many files should pass
    /// `bind = false` and call [`Kernel::bind_objects`] once at the end.
    pub fn load_data(&mut self, name: &str, bind: bool) -> Result<FileId> {
        self.k_load(name, Some(FileFormat::Data), bind, None)
    }

    /// Load with an explicit includer, used by reload when new includes
    /// appear in a re-read header.
    pub(super) fn load_file_with_parent(&mut self, name: &str, parent: FileId) -> Result<FileId> {
        self.k_load(name, None, false, Some(parent))
    }

    // ------------------------------------------------------------------
    // Creating files
    // ------------------------------------------------------------------

    /// Create a schema file in memory and make it active.
    pub fn new_schema(&mut self, name: &str) -> Result<FileId> {
        let full = canonical(std::path::Path::new(name));
        if self.schema_files.contains_key(&full) || self.data_files.contains_key(&full) {
            return Err(OksError::schema(format!(
                "file \"{name}\" is already loaded"
            )));
        }
        let mut file = OksFile::create(
            full.clone(),
            name.to_string(),
            String::new(),
            String::new(),
            FileFormat::Schema,
        );
        file.lock()?;
        let repository_name = self.repository_name_of(&full);
        file.set_repository_name(repository_name);
        let id = self.files.insert(file);
        self.schema_files.insert(full, id);
        self.active_schema = Some(id);
        Ok(id)
    }

    /// Create a data file in memory and make it active.
    pub fn new_data(&mut self, name: &str, logical_name: &str, file_type: &str) -> Result<FileId> {
        let full = canonical(std::path::Path::new(name));
        if self.schema_files.contains_key(&full) || self.data_files.contains_key(&full) {
            return Err(OksError::schema(format!(
                "file \"{name}\" is already loaded"
            )));
        }
        let mut file = OksFile::create(
            full.clone(),
            name.to_string(),
            logical_name.to_string(),
            file_type.to_string(),
            FileFormat::Data,
        );
        file.lock()?;
        let repository_name = self.repository_name_of(&full);
        file.set_repository_name(repository_name);
        let id = self.files.insert(file);
        self.data_files.insert(full, id);
        self.active_data = Some(id);
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Closing files
    // ------------------------------------------------------------------

    /// Close a schema file: unload its classes. Objects of those
    /// classes must have been closed first.
    pub fn close_schema(&mut self, file: FileId) -> Result<()> {
        if self.file(file)?.format() != FileFormat::Schema {
            return Err(OksError::schema("not a schema file"));
        }
        self.k_close_schema(file)?;
        self.close_dangling_includes()
    }

    /// Close a data file: unload its objects. With `unbind`, forward
    /// edges from surviving objects become deferred uids; without it
    /// the caller promises no such edges exist.
    pub fn close_data(&mut self, file: FileId, unbind: bool) -> Result<()> {
        if self.file(file)?.format() != FileFormat::Data {
            return Err(OksError::schema("not a data file"));
        }
        self.k_close_data(file, unbind)?;
        self.close_dangling_includes()
    }

    pub fn close_all_data(&mut self) -> Result<()> {
        let files: Vec<FileId> = self.data_files.values().copied().collect();
        for file in files {
            if self.files.contains(file) {
                self.k_close_data(file, false)?;
            }
        }
        Ok(())
    }

    pub fn close_all_schema(&mut self) -> Result<()> {
        let files: Vec<FileId> = self.schema_files.values().copied().collect();
        for file in files {
            if self.files.contains(file) {
                self.k_close_schema(file)?;
            }
        }
        Ok(())
    }

    pub fn close_all(&mut self) -> Result<()> {
        self.close_all_data()?;
        self.close_all_schema()
    }

    /// Close a file of either format (used by dangling-include sweeps).
    pub(crate) fn close_any(&mut self, file: FileId) -> Result<()> {
        match self.file(file)?.format() {
            FileFormat::Schema => self.k_close_schema(file),
            FileFormat::Data => self.k_close_data(file, true),
        }
    }

    fn k_close_schema(&mut self, file: FileId) -> Result<()> {
        let classes = self.classes_of_file(file);
        for class in &classes {
            let c = self.class(*class)?;
            if let Some((id, _)) = c.objects.first() {
                return Err(OksError::schema(format!(
                    "cannot close schema file: object \"{id}@{}\" still exists",
                    c.name
                )));
            }
        }
        for class in classes {
            let name = self.class(class)?.name.clone();
            self.class_index.remove(&name);
            self.classes.remove(class);
            self.schema_events.emit(&SchemaEvent::ClassDeleted { name });
        }
        self.registrate()?;
        self.forget_file(file)
    }

    fn k_close_data(&mut self, file: FileId, unbind: bool) -> Result<()> {
        let members = self.objects_of_file(file);
        if unbind {
            self.unbind_to_uids(&members)?;
        }
        for object in members {
            let (class, id) = {
                let o = self.object(object)?;
                (o.class, o.id.clone())
            };
            let _ = self.unindex_for_close(class, object);
            if let Ok(c) = self.class_mut(class) {
                c.objects.shift_remove(&id);
            }
            self.objects.remove(object);
        }
        self.forget_file(file)
    }

    pub(super) fn unindex_for_close(&mut self, class: ClassId, object: ObjectId) -> Result<()> {
        let entries: Vec<(SmolStr, usize)> = self
            .class(class)?
            .indices
            .values()
            .map(|i| (i.attribute().clone(), i.offset))
            .collect();
        for (name, offset) in entries {
            let Some(value) = self
                .objects
                .get(object)
                .and_then(|o| o.values.get(offset))
                .cloned()
            else {
                continue;
            };
            if let Some(index) = self.class_mut(class)?.indices.get_mut(&name) {
                index.remove(&value, object);
            }
        }
        Ok(())
    }

    /// Convert forward edges pointing into the closing set back to
    /// deferred uids. Quiet: a close is not an edit, so no locks, no
    /// dirty flags, no notifications.
    pub(super) fn unbind_to_uids(&mut self, closing: &[ObjectId]) -> Result<()> {
        let closing: rustc_hash::FxHashSet<ObjectId> = closing.iter().copied().collect();
        let identities: rustc_hash::FxHashMap<ObjectId, (SmolStr, SmolStr)> = closing
            .iter()
            .filter_map(|id| {
                let o = self.objects.get(*id)?;
                let class = self.classes.get(o.class)?;
                Some((*id, (class.name.clone(), o.id.clone())))
            })
            .collect();

        let survivors: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|(id, _)| !closing.contains(id))
            .map(|(id, _)| id)
            .collect();
        for object in survivors {
            let Some(o) = self.objects.get_mut(object) else {
                continue;
            };
            for value in &mut o.values {
                let convert = |v: &mut Value| {
                    if let Value::ObjectRef(target) = v {
                        if let Some((class, id)) = identities.get(target) {
                            *v = Value::Uid2 {
                                class: class.clone(),
                                id: id.clone(),
                            };
                        }
                    }
                };
                match value {
                    Value::List(items) => items.iter_mut().for_each(convert),
                    single => convert(single),
                }
            }
        }
        Ok(())
    }

    /// Drop a file descriptor: unlock, clear active, remove from the
    /// tables and the arena.
    fn forget_file(&mut self, file: FileId) -> Result<()> {
        self.file_mut(file)?.unlock()?;
        if self.active_schema == Some(file) {
            self.active_schema = None;
        }
        if self.active_data == Some(file) {
            self.active_data = None;
        }
        self.schema_files.retain(|_, id| *id != file);
        self.data_files.retain(|_, id| *id != file);
        self.files.remove(file);
        Ok(())
    }

    // ------------------------------------------------------------------
    // The load machinery
    // ------------------------------------------------------------------

    fn k_load(
        &mut self,
        name: &str,
        expected: Option<FileFormat>,
        bind: bool,
        parent: Option<FileId>,
    ) -> Result<FileId> {
        let full = self.get_file_path(name, parent)?;

        if let Some(existing) = self
            .schema_files
            .get(&full)
            .or_else(|| self.data_files.get(&full))
            .copied()
        {
            self.file_mut(existing)?.check_parent(parent);
            return Ok(existing);
        }

        let mut buffer = acquire_buffer();
        {
            let mut handle =
                std::fs::File::open(&full).map_err(|e| OksError::io(&full, e))?;
            handle
                .read_to_string(&mut buffer)
                .map_err(|e| OksError::io(&full, e))?;
        }
        let metadata = std::fs::metadata(&full).ok();
        let read_only = metadata
            .as_ref()
            .map(|m| m.permissions().readonly())
            .unwrap_or(false);
        let mtime = metadata.as_ref().and_then(|m| m.modified().ok());

        let mut reader = XmlReader::new(&full, &buffer);
        let root = reader.require_tag("oks root")?;
        let format = match root.name.as_str() {
            SCHEMA_ROOT_TAG => FileFormat::Schema,
            DATA_ROOT_TAG => FileFormat::Data,
            other => {
                return Err(reader.error_at(root.offset, format!("unexpected root tag <{other}>")));
            }
        };
        if let Some(expected) = expected {
            if expected != format {
                return Err(reader.error_at(
                    root.offset,
                    format!("expected an oks {} file", expected.token()),
                ));
            }
        }

        let mut descriptor =
            OksFile::loaded(full.clone(), name.to_string(), format, read_only, mtime);
        let repository_name = self.repository_name_of(&full);
        descriptor.set_repository_name(repository_name);
        descriptor.check_parent(parent);
        self.read_header(&mut reader, &mut descriptor)?;
        let includes = descriptor.include_files().to_vec();

        // register before recursing so shared includes load only once
        let id = self.files.insert(descriptor);
        match format {
            FileFormat::Schema => self.schema_files.insert(full.clone(), id),
            FileFormat::Data => self.data_files.insert(full.clone(), id),
        };
        info!("loading {} file {}", format.token(), full.display());

        // includes: parse errors of a sibling are recorded and do not
        // stop the rest; unresolvable paths do
        for include in &includes {
            match self.k_load(include, None, false, Some(id)) {
                Ok(child) => self.file_mut(id)?.resolved_includes.push(child),
                Err(
                    error @ (OksError::FileNotFound(_)
                    | OksError::Io { .. }
                    | OksError::IncludeCycle(_)
                    | OksError::FileLocked { .. }),
                ) => {
                    self.abort_load(id);
                    return Err(error);
                }
                Err(error) => {
                    warn!("include \"{include}\" failed to load: {error}");
                }
            }
        }
        self.check_include_dag(id).inspect_err(|_| {
            self.abort_load(id);
        })?;

        let count = match format {
            FileFormat::Schema => self.read_classes(&mut reader, id),
            FileFormat::Data => self.read_objects(&mut reader, id),
        };
        let count = match count {
            Ok(count) => count,
            Err(error) => {
                self.load_errors
                    .push(format!("{}: {error}", full.display()));
                self.abort_load(id);
                return Err(error);
            }
        };

        self.file_mut(id)?.number_of_items = count;
        if bind && format == FileFormat::Data {
            self.bind_objects();
        }
        debug!("loaded {count} items from {}", full.display());
        Ok(id)
    }

    /// Unload whatever a failing load managed to put in.
    fn abort_load(&mut self, file: FileId) {
        for class in self.classes_of_file(file) {
            let objects: Vec<ObjectId> = self
                .classes
                .get(class)
                .map(|c| c.objects.values().copied().collect())
                .unwrap_or_default();
            for object in objects {
                self.objects.remove(object);
            }
            if let Some(c) = self.classes.remove(class) {
                self.class_index.remove(&c.name);
            }
        }
        for object in self.objects_of_file(file) {
            if let Some(o) = self.objects.remove(object) {
                if let Some(c) = self.classes.get_mut(o.class) {
                    c.objects.shift_remove(&o.id);
                }
            }
        }
        let _ = self.registrate();
        let _ = self.forget_file(file);
    }

    // ------------------------------------------------------------------
    // Header
    // ------------------------------------------------------------------

    /// Parse `<info>`, the optional `<include>` and `<comments>`
    /// sections; leaves the reader at the first entry tag.
    pub(super) fn read_header(&mut self, reader: &mut XmlReader<'_>, file: &mut OksFile) -> Result<()> {
        let info = reader.require_tag("info")?;
        if !info.is_start_of("info") {
            return Err(reader.error_at(info.offset, "expected <info>"));
        }
        file.logical_name = info.attr("name").unwrap_or_default().to_string();
        file.file_type = info.attr("type").unwrap_or_default().to_string();
        file.created_by = info.attr("created-by").unwrap_or_default().to_string();
        file.created_on = info.attr("created-on").unwrap_or_default().to_string();
        file.creation_time = info.attr("creation-time").and_then(parse_timestamp);
        file.last_modified_by = info.attr("last-modified-by").unwrap_or_default().to_string();
        file.last_modified_on = info.attr("last-modified-on").unwrap_or_default().to_string();
        file.last_modification_time = info
            .attr("last-modification-time")
            .and_then(parse_timestamp);

        reader.store_position();
        if let Some(tag) = reader.next_tag()? {
            if tag.is_start_of("include") && tag.kind == TagKind::Start {
                let mut includes = Vec::new();
                loop {
                    let entry = reader.require_tag("file")?;
                    if entry.is_end_of("include") {
                        break;
                    }
                    if !entry.is_start_of("file") {
                        return Err(reader.error_at(entry.offset, "expected <file path=…/>"));
                    }
                    let path = entry
                        .attr("path")
                        .ok_or_else(|| reader.error_at(entry.offset, "<file> without path"))?;
                    includes.push(path.to_string());
                }
                file.set_includes(includes);
            } else {
                reader.restore_position();
            }
        }

        reader.store_position();
        if let Some(tag) = reader.next_tag()? {
            if tag.is_start_of("comments") && tag.kind == TagKind::Start {
                loop {
                    let entry = reader.require_tag("comment")?;
                    if entry.is_end_of("comments") {
                        break;
                    }
                    if !entry.is_start_of("comment") {
                        return Err(reader.error_at(entry.offset, "expected <comment …/>"));
                    }
                    let creation_time = entry
                        .attr("creation-time")
                        .ok_or_else(|| {
                            reader.error_at(entry.offset, "<comment> without creation-time")
                        })?
                        .to_string();
                    file.insert_comment(
                        creation_time,
                        Comment {
                            created_by: entry.attr("created-by").unwrap_or_default().to_string(),
                            created_on: entry.attr("created-on").unwrap_or_default().to_string(),
                            author: entry.attr("author").unwrap_or_default().to_string(),
                            text: entry.attr("text").unwrap_or_default().to_string(),
                        },
                    );
                }
            } else {
                reader.restore_position();
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Schema entries
    // ------------------------------------------------------------------

    fn read_classes(&mut self, reader: &mut XmlReader<'_>, file: FileId) -> Result<usize> {
        let mut created: Vec<(ClassId, SmolStr)> = Vec::new();
        let mut count = 0usize;
        loop {
            let Some(tag) = reader.next_tag()? else {
                break;
            };
            if tag.is_end_of(SCHEMA_ROOT_TAG) {
                break;
            }
            if !tag.is_start_of("class") {
                return Err(reader.error_at(
                    tag.offset,
                    format!("unexpected tag <{}>, expected <class>", tag.name),
                ));
            }
            if let Some(class) = self.read_class(reader, file, &tag)? {
                created.push(class);
                count += 1;
            }
        }
        self.registrate()?;
        for (class, name) in created {
            self.schema_events
                .emit(&SchemaEvent::ClassCreated { class, name });
        }
        Ok(count)
    }

    fn read_class(
        &mut self,
        reader: &mut XmlReader<'_>,
        file: FileId,
        tag: &Tag,
    ) -> Result<Option<(ClassId, SmolStr)>> {
        let name = tag
            .attr("name")
            .ok_or_else(|| reader.error_at(tag.offset, "<class> without name"))?;
        let name = SmolStr::new(name);

        if self.class_index.contains_key(&name) {
            if self.config.allow_duplicated_classes {
                warn!("ignoring duplicated class \"{name}\"");
                if tag.kind == TagKind::Start {
                    self.skip_class_body(reader)?;
                }
                return Ok(None);
            }
            return Err(reader.error_at(
                tag.offset,
                format!("class \"{name}\" is duplicated"),
            ));
        }

        let mut class = Class::new(name.clone(), file);
        class.description = tag.attr("description").unwrap_or_default().to_string();
        class.is_abstract = crate::xml::str_to_bool(tag.attr("is-abstract").unwrap_or("no"));

        if tag.kind == TagKind::Start {
            loop {
                let child = reader.require_tag("class member")?;
                if child.is_end_of("class") {
                    break;
                }
                match child.name.as_str() {
                    "superclass" => {
                        let super_name = child.attr("name").ok_or_else(|| {
                            reader.error_at(child.offset, "<superclass> without name")
                        })?;
                        class.super_class_names.push(SmolStr::new(super_name));
                    }
                    ATTRIBUTE_TAG => {
                        let attribute = Attribute::from_xml(&child)
                            .map_err(|e| reader.error_at(child.offset, e.to_string()))?;
                        if class.find_direct_attribute(&attribute.name).is_some() {
                            return Err(reader.error_at(
                                child.offset,
                                format!("attribute \"{}\" is duplicated", attribute.name),
                            ));
                        }
                        class.direct_attributes.push(attribute);
                    }
                    RELATIONSHIP_TAG => {
                        let relationship = Relationship::from_xml(&child)
                            .map_err(|e| reader.error_at(child.offset, e.to_string()))?;
                        if class.find_direct_relationship(&relationship.name).is_some() {
                            return Err(reader.error_at(
                                child.offset,
                                format!("relationship \"{}\" is duplicated", relationship.name),
                            ));
                        }
                        class.direct_relationships.push(relationship);
                    }
                    METHOD_TAG => {
                        let method = Method::from_xml(&child, reader)?;
                        if class.find_method(&method.name).is_some() {
                            return Err(reader.error_at(
                                child.offset,
                                format!("method \"{}\" is duplicated", method.name),
                            ));
                        }
                        class.direct_methods.push(method);
                    }
                    other => {
                        return Err(reader.error_at(
                            child.offset,
                            format!("unexpected tag <{other}> inside <class>"),
                        ));
                    }
                }
            }
        }

        let id = self.classes.insert(class);
        self.class_index.insert(name.clone(), id);
        Ok(Some((id, name)))
    }

    fn skip_class_body(&self, reader: &mut XmlReader<'_>) -> Result<()> {
        loop {
            let tag = reader.require_tag("</class>")?;
            if tag.is_end_of("class") {
                return Ok(());
            }
            if tag.kind == TagKind::Start {
                // methods are the only nested class members
                loop {
                    let inner = reader.require_tag("nested end")?;
                    if inner.kind == TagKind::End && inner.name == tag.name {
                        break;
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Data entries
    // ------------------------------------------------------------------

    fn read_objects(&mut self, reader: &mut XmlReader<'_>, file: FileId) -> Result<usize> {
        let mut aliases = AliasTable::new();
        let mut created: Vec<ObjectId> = Vec::new();
        let mut count = 0usize;
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
            if let Some(object) = self.read_object(reader, file, &tag, &mut aliases)? {
                created.push(object);
                count += 1;
            }
        }
        for object in created {
            self.object_events.emit(&crate::schema::ObjectEvent::Created { object });
        }
        Ok(count)
    }

    /// Parse one `<obj>` element into `(class, id, values)` without
    /// touching the store; shared by load and reload.
    pub(super) fn read_object_record(
        &self,
        reader: &mut XmlReader<'_>,
        tag: &Tag,
        aliases: &mut AliasTable,
    ) -> Result<(ClassId, SmolStr, Vec<Value>)> {
        let class_token = tag
            .attr("class")
            .ok_or_else(|| reader.error_at(tag.offset, "<obj> without class"))?;
        let class_name = aliases.for_read(class_token);
        let id = tag
            .attr("id")
            .ok_or_else(|| reader.error_at(tag.offset, "<obj> without id"))?;

        let class = self.find_class(&class_name).ok_or_else(|| {
            reader.error_at(
                tag.offset,
                format!("cannot find class \"{class_name}\""),
            )
        })?;
        if self.class(class)?.is_abstract {
            return Err(reader.error_at(
                tag.offset,
                format!("class \"{class_name}\" is abstract and cannot have objects"),
            ));
        }

        let mut values = self.initial_values(class).map_err(|e| {
            reader.error_at(tag.offset, format!("cannot init object \"{id}\": {e}"))
        })?;

        if tag.kind == TagKind::Start {
            loop {
                let child = reader.require_tag("</obj>")?;
                if child.is_end_of("obj") {
                    break;
                }
                match child.name.as_str() {
                    "attr" => self.read_attr_value(reader, class, &child, &mut values)?,
                    "rel" => self.read_rel_value(reader, class, &child, &mut values, aliases)?,
                    other => {
                        return Err(reader.error_at(
                            child.offset,
                            format!("unexpected tag <{other}> inside <obj>"),
                        ));
                    }
                }
            }
        }

        Ok((class, SmolStr::new(id), values))
    }

    fn read_object(
        &mut self,
        reader: &mut XmlReader<'_>,
        file: FileId,
        tag: &Tag,
        aliases: &mut AliasTable,
    ) -> Result<Option<ObjectId>> {
        let (class, id, values) = self.read_object_record(reader, tag, aliases)?;
        let class_name = self.class(class)?.name.clone();

        // duplicated-objects handling
        let mut duplicated_index = None;
        let mut id = id;
        if let Err(error) = self.check_id_unique(class, &id) {
            let same_class_duplicate = self.class(class)?.objects.contains_key(&id);
            if !same_class_duplicate || self.config.test_duplicated_objects_via_inheritance {
                // duplicate across the inheritance cone is never repaired
                return Err(error);
            }
            match self.config.duplicated_objects {
                DuplicatedObjectsPolicy::Reject => return Err(error),
                DuplicatedObjectsPolicy::KeepFirst => {
                    warn!("ignoring duplicated object \"{id}@{class_name}\"");
                    return Ok(None);
                }
                DuplicatedObjectsPolicy::AutoRename => {
                    let mut n = 1u32;
                    let renamed = loop {
                        let candidate = SmolStr::new(format!("{id}-{n}"));
                        if self.find_object(class, &candidate, true).is_none() {
                            break candidate;
                        }
                        n += 1;
                    };
                    warn!("renaming duplicated object \"{id}@{class_name}\" to \"{renamed}\"");
                    duplicated_index = Some(n);
                    id = renamed;
                }
            }
        }

        let object = self.adopt_object(file, class, id, values, duplicated_index)?;
        Ok(Some(object))
    }

    /// One `<attr>` element: compact `val="…"` packing or extended
    /// `<data val=…/>` children, detected by the presence of children.
    fn read_attr_value(
        &self,
        reader: &mut XmlReader<'_>,
        class: ClassId,
        tag: &Tag,
        values: &mut [Value],
    ) -> Result<()> {
        let name = tag
            .attr("name")
            .ok_or_else(|| reader.error_at(tag.offset, "<attr> without name"))?;
        let (info, attribute) = {
            let c = self.class(class)?;
            let info = c.data_info(name).ok_or_else(|| {
                reader.error_at(
                    tag.offset,
                    format!("class \"{}\" has no attribute \"{name}\"", c.name),
                )
            })?;
            let attribute = c.find_attribute(name).cloned().ok_or_else(|| {
                reader.error_at(tag.offset, format!("\"{name}\" is not an attribute"))
            })?;
            (info, attribute)
        };

        let file_kind = tag.attr("type").and_then(Kind::from_type_token);

        let value = if tag.kind == TagKind::Empty {
            let text = tag.attr("val").unwrap_or_default();
            self.parse_attr_text(&attribute, file_kind, text)
                .map_err(|e| reader.error_at(tag.offset, e.to_string()))?
        } else {
            // extended form: each <data val=…/> is one element
            let mut items = Vec::new();
            loop {
                let child = reader.require_tag("</attr>")?;
                if child.is_end_of("attr") {
                    break;
                }
                if !child.is_start_of("data") {
                    return Err(reader.error_at(
                        child.offset,
                        format!("unexpected tag <{}> inside <attr>", child.name),
                    ));
                }
                let text = child.attr("val").unwrap_or_default();
                let element = self
                    .parse_attr_token(&attribute, file_kind, text)
                    .map_err(|e| reader.error_at(child.offset, e.to_string()))?;
                items.push(element);
            }
            if attribute.multi {
                Value::List(items)
            } else {
                match items.into_iter().next() {
                    Some(first) => {
                        warn!(
                            "single-value attribute \"{name}\" read from multi-value form"
                        );
                        first
                    }
                    None => attribute
                        .init_data()
                        .map_err(|e| reader.error_at(tag.offset, e.to_string()))?,
                }
            }
        };

        attribute
            .check_range(&value, self.config.skip_string_range)
            .map_err(|e| reader.error_at(tag.offset, e.to_string()))?;
        values[info.offset] = value;
        Ok(())
    }

    /// Compact text: the full value of a single-value attribute, or
    /// whitespace-separated element tokens of a multi-value one.
    fn parse_attr_text(
        &self,
        attribute: &Attribute,
        file_kind: Option<Kind>,
        text: &str,
    ) -> Result<Value> {
        if !attribute.multi {
            return self.parse_attr_token(attribute, file_kind, text);
        }
        let mut items = Vec::new();
        for token in text.split_whitespace() {
            items.push(self.parse_attr_token(attribute, file_kind, token)?);
        }
        Ok(Value::List(items))
    }

    /// One element token, honoring a differing declared-on-file type by
    /// converting after the parse.
    fn parse_attr_token(
        &self,
        attribute: &Attribute,
        file_kind: Option<Kind>,
        text: &str,
    ) -> Result<Value> {
        match file_kind {
            Some(kind) if kind != attribute.data_type() => {
                let parsed = parse_token(text, kind, attribute.enumerators())?;
                let converted = parsed.convert(&crate::value::ConversionTarget {
                    kind: attribute.data_type(),
                    multi: false,
                    enumerators: attribute.enumerators(),
                })?;
                warn!(
                    "value of attribute \"{}\" converted from {} to {}",
                    attribute.name,
                    kind.type_name(),
                    attribute.data_type().type_name()
                );
                Ok(converted)
            }
            _ => parse_token(text, attribute.data_type(), attribute.enumerators()),
        }
    }

    /// One `<rel>` element: inline `class=/id=` or `<ref class= id=/>`
    /// children.
    fn read_rel_value(
        &self,
        reader: &mut XmlReader<'_>,
        class: ClassId,
        tag: &Tag,
        values: &mut [Value],
        aliases: &mut AliasTable,
    ) -> Result<()> {
        let name = tag
            .attr("name")
            .ok_or_else(|| reader.error_at(tag.offset, "<rel> without name"))?;
        let (info, multi) = {
            let c = self.class(class)?;
            let info = c.data_info(name).ok_or_else(|| {
                reader.error_at(
                    tag.offset,
                    format!("class \"{}\" has no relationship \"{name}\"", c.name),
                )
            })?;
            let relationship = c.relationship_at(info.offset).ok_or_else(|| {
                reader.error_at(tag.offset, format!("\"{name}\" is not a relationship"))
            })?;
            (info, relationship.is_multi())
        };

        let mut uids: Vec<Value> = Vec::new();
        if tag.kind == TagKind::Empty {
            if let (Some(class_token), Some(id)) = (tag.attr("class"), tag.attr("id")) {
                uids.push(self.make_uid(aliases, class_token, id));
            }
        } else {
            loop {
                let child = reader.require_tag("</rel>")?;
                if child.is_end_of("rel") {
                    break;
                }
                if !child.is_start_of("ref") {
                    return Err(reader.error_at(
                        child.offset,
                        format!("unexpected tag <{}> inside <rel>", child.name),
                    ));
                }
                let class_token = child
                    .attr("class")
                    .ok_or_else(|| reader.error_at(child.offset, "<ref> without class"))?;
                let id = child
                    .attr("id")
                    .ok_or_else(|| reader.error_at(child.offset, "<ref> without id"))?;
                uids.push(self.make_uid(aliases, class_token, id));
            }
        }

        values[info.offset] = if multi {
            Value::List(uids)
        } else {
            match uids.into_iter().next() {
                Some(first) => first,
                None => Value::Uid2Unset,
            }
        };
        Ok(())
    }

    fn make_uid(&self, aliases: &mut AliasTable, class_token: &str, id: &str) -> Value {
        let class_name = aliases.for_read(class_token);
        match self.find_class(&class_name) {
            Some(class) => Value::Uid {
                class,
                id: SmolStr::new(id),
            },
            None => Value::Uid2 {
                class: class_name,
                id: SmolStr::new(id),
            },
        }
    }
}
