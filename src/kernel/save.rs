//! Saving files.
//!
//! A save writes the XML preamble, the DTD, the `<info>` header with
//! fresh last-modified fields, the includes in declaration order, the
//! comments, then the entries. Data entries default to the compact
//! form: values packed into `val="…"` attributes and class names
//! aliased through the shortest-first generator. The extended form
//! spells every element out and serves backups and inspection tools.
//!
//! Writes go to a sibling temporary file first and rename over the
//! target, so a failed save never truncates good data.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use smol_str::SmolStr;
use tracing::info;

use crate::error::{OksError, Result};
use crate::file::{format_timestamp, host_name, now_utc, user_name, FileFormat, FileId};
use crate::object::ObjectId;
use crate::schema::ClassId;
use crate::value::{Kind, Value};
use crate::xml::XmlWriter;

use super::alias::{AliasTable, ClassToken};
use super::load::{DATA_ROOT_TAG, SCHEMA_ROOT_TAG};
use super::Kernel;

const XML_FILE_HEADER: &str = "<?xml version=\"1.0\" encoding=\"ASCII\"?>";

const SCHEMA_FILE_DTD: &str = r#"<!DOCTYPE oks-schema [
  <!ELEMENT oks-schema (info, (include)?, (comments)?, (class)+)>
  <!ELEMENT info EMPTY>
  <!ATTLIST info
      name CDATA #IMPLIED
      type CDATA #IMPLIED
      num-of-items CDATA #REQUIRED
      oks-format CDATA #FIXED "schema"
      oks-version CDATA #REQUIRED
      created-by CDATA #IMPLIED
      created-on CDATA #IMPLIED
      creation-time CDATA #IMPLIED
      last-modified-by CDATA #IMPLIED
      last-modified-on CDATA #IMPLIED
      last-modification-time CDATA #IMPLIED
  >
  <!ELEMENT include (file)+>
  <!ELEMENT file EMPTY>
  <!ATTLIST file
      path CDATA #REQUIRED
  >
  <!ELEMENT comments (comment)+>
  <!ELEMENT comment EMPTY>
  <!ATTLIST comment
      creation-time CDATA #REQUIRED
      created-by CDATA #REQUIRED
      created-on CDATA #REQUIRED
      author CDATA #REQUIRED
      text CDATA #REQUIRED
  >
  <!ELEMENT class (superclass | attribute | relationship | method)*>
  <!ATTLIST class
      name CDATA #REQUIRED
      description CDATA ""
      is-abstract (yes|no) "no"
  >
  <!ELEMENT superclass EMPTY>
  <!ATTLIST superclass name CDATA #REQUIRED>
  <!ELEMENT attribute EMPTY>
  <!ATTLIST attribute
      name CDATA #REQUIRED
      description CDATA ""
      type (bool|s8|u8|s16|u16|s32|u32|s64|u64|float|double|date|time|string|uid|enum|class) #REQUIRED
      range CDATA ""
      format (dec|hex|oct) "dec"
      is-multi-value (yes|no) "no"
      init-value CDATA ""
      is-not-null (yes|no) "no"
      ordered (yes|no) "no"
  >
  <!ELEMENT relationship EMPTY>
  <!ATTLIST relationship
      name CDATA #REQUIRED
      description CDATA ""
      class-type CDATA #REQUIRED
      low-cc (zero|one) #REQUIRED
      high-cc (one|many) #REQUIRED
      is-composite (yes|no) #REQUIRED
      is-exclusive (yes|no) #REQUIRED
      is-dependent (yes|no) #REQUIRED
      ordered (yes|no) "no"
  >
  <!ELEMENT method (method-implementation*)>
  <!ATTLIST method
      name CDATA #REQUIRED
      description CDATA ""
  >
  <!ELEMENT method-implementation EMPTY>
  <!ATTLIST method-implementation
      language CDATA #REQUIRED
      prototype CDATA #REQUIRED
      body CDATA ""
  >
]>"#;

const DATA_FILE_DTD: &str = r#"<!DOCTYPE oks-data [
  <!ELEMENT oks-data (info, (include)?, (comments)?, (obj)+)>
  <!ELEMENT info EMPTY>
  <!ATTLIST info
      name CDATA #IMPLIED
      type CDATA #IMPLIED
      num-of-items CDATA #REQUIRED
      oks-format CDATA #FIXED "data"
      oks-version CDATA #REQUIRED
      created-by CDATA #IMPLIED
      created-on CDATA #IMPLIED
      creation-time CDATA #IMPLIED
      last-modified-by CDATA #IMPLIED
      last-modified-on CDATA #IMPLIED
      last-modification-time CDATA #IMPLIED
  >
  <!ELEMENT include (file)+>
  <!ELEMENT file EMPTY>
  <!ATTLIST file
      path CDATA #REQUIRED
  >
  <!ELEMENT comments (comment)+>
  <!ELEMENT comment EMPTY>
  <!ATTLIST comment
      creation-time CDATA #REQUIRED
      created-by CDATA #REQUIRED
      created-on CDATA #REQUIRED
      author CDATA #REQUIRED
      text CDATA #REQUIRED
  >
  <!ELEMENT obj (attr | rel)*>
  <!ATTLIST obj
      class CDATA #REQUIRED
      id CDATA #REQUIRED
  >
  <!ELEMENT attr (data)*>
  <!ATTLIST attr
      name CDATA #REQUIRED
      type CDATA #IMPLIED
      val CDATA ""
  >
  <!ELEMENT data EMPTY>
  <!ATTLIST data
      val CDATA #REQUIRED
  >
  <!ELEMENT rel (ref)*>
  <!ATTLIST rel
      name CDATA #REQUIRED
      class CDATA #IMPLIED
      id CDATA #IMPLIED
  >
  <!ELEMENT ref EMPTY>
  <!ATTLIST ref
      class CDATA #REQUIRED
      id CDATA #REQUIRED
  >
]>"#;

fn oks_version() -> String {
    format!("oks-kernel/{}", env!("CARGO_PKG_VERSION"))
}

impl Kernel {
    // ------------------------------------------------------------------
    // Public save entry points
    // ------------------------------------------------------------------

    /// Save a schema file to its path.
    pub fn save_schema(&mut self, file: FileId) -> Result<()> {
        self.k_save(file, FileFormat::Schema, None, false)
    }

    /// Save a data file in the compact form.
    pub fn save_data(&mut self, file: FileId) -> Result<()> {
        self.k_save(file, FileFormat::Data, None, false)
    }

    /// Save a data file in the extended form (`<data>`/`<ref>` child
    /// elements; no aliases, no default elision).
    pub fn save_data_extended(&mut self, file: FileId) -> Result<()> {
        self.k_save(file, FileFormat::Data, None, true)
    }

    /// Save under a new name; the descriptor is renamed to it.
    pub fn save_as_schema(&mut self, name: &str, file: FileId) -> Result<()> {
        self.rename_descriptor(file, name)?;
        self.save_schema(file)
    }

    pub fn save_as_data(&mut self, name: &str, file: FileId) -> Result<()> {
        self.rename_descriptor(file, name)?;
        self.save_data(file)
    }

    /// Write a backup copy next to the file; the descriptor keeps
    /// pointing at the original. Backups use the extended data form.
    pub fn backup_schema(&mut self, file: FileId, suffix: &str) -> Result<()> {
        let target = backup_path(self.file(file)?.full_name(), suffix);
        self.k_save(file, FileFormat::Schema, Some(target), false)
    }

    pub fn backup_data(&mut self, file: FileId, suffix: &str) -> Result<()> {
        let target = backup_path(self.file(file)?.full_name(), suffix);
        self.k_save(file, FileFormat::Data, Some(target), true)
    }

    /// Save every modified, writable schema file.
    pub fn save_all_schema(&mut self) -> Result<()> {
        let files: Vec<FileId> = self.schema_files.values().copied().collect();
        for file in files {
            let descriptor = self.file(file)?;
            if descriptor.is_updated() && !descriptor.is_read_only() {
                self.save_schema(file)?;
            }
        }
        Ok(())
    }

    /// Save every modified, writable data file.
    pub fn save_all_data(&mut self) -> Result<()> {
        let files: Vec<FileId> = self.data_files.values().copied().collect();
        for file in files {
            let descriptor = self.file(file)?;
            if descriptor.is_updated() && !descriptor.is_read_only() {
                self.save_data(file)?;
            }
        }
        Ok(())
    }

    fn rename_descriptor(&mut self, file: FileId, name: &str) -> Result<()> {
        let full = super::path::canonical(Path::new(name));
        if self
            .schema_files
            .get(&full)
            .or_else(|| self.data_files.get(&full))
            .is_some_and(|existing| *existing != file)
        {
            return Err(OksError::schema(format!(
                "file \"{name}\" is already loaded"
            )));
        }
        let format = self.file(file)?.format();
        let table = match format {
            FileFormat::Schema => &mut self.schema_files,
            FileFormat::Data => &mut self.data_files,
        };
        table.retain(|_, id| *id != file);
        table.insert(full.clone(), file);

        let repository_name = self.repository_name_of(&full);
        let descriptor = self.file_mut(file)?;
        descriptor.rename_paths(full, name.to_string());
        descriptor.set_repository_name(repository_name);
        descriptor.set_updated();
        Ok(())
    }

    // ------------------------------------------------------------------
    // The writer
    // ------------------------------------------------------------------

    fn k_save(
        &mut self,
        file: FileId,
        format: FileFormat,
        backup_target: Option<PathBuf>,
        extended: bool,
    ) -> Result<()> {
        let is_backup = backup_target.is_some();
        {
            let descriptor = self.file(file)?;
            if descriptor.format() != format {
                return Err(OksError::schema(format!(
                    "not an oks {} file",
                    format.token()
                )));
            }
            if descriptor.is_read_only() && !is_backup {
                return Err(OksError::FileReadOnly(descriptor.full_name().to_path_buf()));
            }
        }
        if !is_backup {
            self.file_mut(file)?.lock()?;
            let descriptor = self.file_mut(file)?;
            descriptor.last_modified_by = user_name();
            descriptor.last_modified_on = host_name();
            descriptor.last_modification_time = Some(now_utc());
        }

        let count = match format {
            FileFormat::Schema => self.classes_of_file(file).len(),
            FileFormat::Data => self.objects_of_file(file).len(),
        };
        self.file_mut(file)?.number_of_items = count;

        let mut out: Vec<u8> = Vec::with_capacity(16 * 1024);
        {
            let mut writer = XmlWriter::new(&mut out);
            self.write_document(&mut writer, file, format, extended)
                .map_err(|e| OksError::io(self.file(file).map(|f| f.full_name().to_path_buf()).unwrap_or_default(), e))?;
        }

        let target = match &backup_target {
            Some(target) => target.clone(),
            None => self.file(file)?.full_name().to_path_buf(),
        };
        write_atomically(&target, &out)?;
        info!("saved {} ({count} items)", target.display());

        if !is_backup {
            let descriptor = self.file_mut(file)?;
            descriptor.clear_updated();
            descriptor.set_on_disk();
            descriptor.update_status_of_file();
        }
        Ok(())
    }

    fn write_document(
        &self,
        w: &mut XmlWriter<&mut Vec<u8>>,
        file: FileId,
        format: FileFormat,
        extended: bool,
    ) -> std::io::Result<()> {
        let descriptor = match self.file(file) {
            Ok(d) => d,
            Err(_) => return Err(std::io::Error::other("dangling file handle")),
        };
        let (root, dtd) = match format {
            FileFormat::Schema => (SCHEMA_ROOT_TAG, SCHEMA_FILE_DTD),
            FileFormat::Data => (DATA_ROOT_TAG, DATA_FILE_DTD),
        };

        w.put_raw(XML_FILE_HEADER)?;
        w.put_raw("\n\n<!-- ")?;
        w.put_raw(root)?;
        w.put_raw(" version 2.2 -->\n\n\n")?;
        w.put_raw(dtd)?;
        w.put_raw("\n\n")?;

        w.put_start_tag(root)?;
        w.put_raw(">\n\n")?;

        w.put_start_tag("info")?;
        w.put_attribute("name", &descriptor.logical_name)?;
        w.put_attribute("type", &descriptor.file_type)?;
        w.put_numeric_attribute("num-of-items", descriptor.number_of_items as u64)?;
        w.put_attribute("oks-format", format.token())?;
        w.put_attribute("oks-version", &oks_version())?;
        w.put_attribute("created-by", &descriptor.created_by)?;
        w.put_attribute("created-on", &descriptor.created_on)?;
        if let Some(t) = descriptor.creation_time {
            w.put_attribute("creation-time", &format_timestamp(t))?;
        }
        w.put_attribute("last-modified-by", &descriptor.last_modified_by)?;
        w.put_attribute("last-modified-on", &descriptor.last_modified_on)?;
        if let Some(t) = descriptor.last_modification_time {
            w.put_attribute("last-modification-time", &format_timestamp(t))?;
        }
        w.put_end_tag()?;
        w.put_raw("\n")?;

        if !descriptor.include_files().is_empty() {
            w.put_start_tag("include")?;
            w.put_eol()?;
            for include in descriptor.include_files() {
                w.put_raw(" ")?;
                w.put_start_tag("file")?;
                w.put_attribute("path", include)?;
                w.put_end_tag()?;
            }
            w.put_last_tag("include")?;
            w.put_raw("\n")?;
        }

        if !descriptor.comments().is_empty() {
            w.put_start_tag("comments")?;
            w.put_eol()?;
            for (creation_time, comment) in descriptor.comments() {
                w.put_raw(" ")?;
                w.put_start_tag("comment")?;
                w.put_attribute("creation-time", creation_time)?;
                w.put_attribute("created-by", &comment.created_by)?;
                w.put_attribute("created-on", &comment.created_on)?;
                w.put_attribute("author", &comment.author)?;
                w.put_attribute("text", &comment.text)?;
                w.put_end_tag()?;
            }
            w.put_last_tag("comments")?;
            w.put_raw("\n")?;
        }

        match format {
            FileFormat::Schema => self.write_classes(w, file)?,
            FileFormat::Data => self.write_objects(w, file, extended)?,
        }

        w.put_last_tag(root)?;
        w.flush()
    }

    fn write_classes(&self, w: &mut XmlWriter<&mut Vec<u8>>, file: FileId) -> std::io::Result<()> {
        let mut classes = self.classes_of_file(file);
        classes.sort_by_key(|id| self.classes.get(*id).map(|c| c.name.clone()).unwrap_or_default());

        for id in classes {
            let Some(class) = self.classes.get(id) else {
                continue;
            };
            w.put_raw("\n")?;
            w.put_start_tag("class")?;
            w.put_attribute("name", &class.name)?;
            if !class.description.is_empty() {
                w.put_attribute("description", &class.description)?;
            }
            if class.is_abstract {
                w.put_attribute("is-abstract", "yes")?;
            }

            let empty = class.super_class_names().is_empty()
                && class.direct_attributes().is_empty()
                && class.direct_relationships().is_empty()
                && class.direct_methods().is_empty();
            if empty {
                w.put_end_tag()?;
                continue;
            }
            w.put_eol()?;

            for super_name in class.super_class_names() {
                w.put_raw("  ")?;
                w.put_start_tag("superclass")?;
                w.put_attribute("name", super_name)?;
                w.put_end_tag()?;
            }
            for attribute in class.direct_attributes() {
                attribute.write_xml(w)?;
            }
            for relationship in class.direct_relationships() {
                relationship.write_xml(w)?;
            }
            for method in class.direct_methods() {
                method.write_xml(w)?;
            }
            w.put_last_tag("class")?;
        }
        w.put_raw("\n")?;
        Ok(())
    }

    fn write_objects(
        &self,
        w: &mut XmlWriter<&mut Vec<u8>>,
        file: FileId,
        extended: bool,
    ) -> std::io::Result<()> {
        let mut aliases = AliasTable::new();

        let mut classes: Vec<ClassId> = self.classes.ids();
        classes.sort_by_key(|id| self.classes.get(*id).map(|c| c.name.clone()).unwrap_or_default());

        for class_id in classes {
            let Some(class) = self.classes.get(class_id) else {
                continue;
            };
            let members: Vec<ObjectId> = class
                .objects
                .values()
                .copied()
                .filter(|o| self.objects.get(*o).is_some_and(|o| o.file == file))
                .collect();
            if members.is_empty() {
                continue;
            }

            for object in members {
                self.write_object(w, &mut aliases, class_id, object, extended)?;
            }
        }
        w.put_raw("\n")?;
        Ok(())
    }

    fn class_token(&self, aliases: &mut AliasTable, name: &str, extended: bool) -> String {
        if extended {
            return name.to_string();
        }
        match aliases.for_write(name) {
            ClassToken::First => format!("@{name}"),
            ClassToken::Alias(alias) => alias.to_string(),
        }
    }

    fn write_object(
        &self,
        w: &mut XmlWriter<&mut Vec<u8>>,
        aliases: &mut AliasTable,
        class_id: ClassId,
        object: ObjectId,
        extended: bool,
    ) -> std::io::Result<()> {
        let Some(class) = self.classes.get(class_id) else {
            return Ok(());
        };
        let Some(o) = self.objects.get(object) else {
            return Ok(());
        };

        w.put_raw("\n")?;
        w.put_start_tag("obj")?;
        let token = self.class_token(aliases, &class.name, extended);
        w.put_attribute("class", &token)?;
        w.put_attribute("id", &o.id)?;
        w.put_eol()?;

        for (offset, attribute) in class.all_attributes.iter().enumerate() {
            let Some(value) = o.values.get(offset) else {
                continue;
            };
            // skip values still equal to the declared default
            if !extended {
                if let Ok(default) = attribute.init_data() {
                    if *value == default {
                        continue;
                    }
                }
            }

            w.put_raw(" ")?;
            w.put_start_tag("attr")?;
            w.put_attribute("name", &attribute.name)?;
            w.put_attribute("type", attribute.data_type().type_name())?;

            let packable = !matches!(
                attribute.data_type(),
                Kind::String | Kind::Class | Kind::Uid | Kind::Uid2
            );
            match value {
                Value::List(items) if extended || !packable => {
                    w.put_eol()?;
                    for item in items {
                        w.put_raw("  ")?;
                        w.put_start_tag("data")?;
                        w.put_attribute("val", &item.format(attribute.format))?;
                        w.put_end_tag()?;
                    }
                    w.put_raw(" ")?;
                    w.put_last_tag("attr")?;
                }
                value => {
                    w.put_attribute("val", &value.format(attribute.format))?;
                    w.put_end_tag()?;
                }
            }
        }

        for (i, relationship) in class.all_relationships.iter().enumerate() {
            let offset = class.all_attributes.len() + i;
            let Some(value) = o.values.get(offset) else {
                continue;
            };
            if !extended && value.is_null_reference() {
                continue;
            }

            w.put_raw(" ")?;
            w.put_start_tag("rel")?;
            w.put_attribute("name", &relationship.name)?;

            let reference = |kernel: &Kernel, v: &Value| -> Option<(SmolStr, SmolStr)> {
                match v {
                    Value::ObjectRef(target) => {
                        let target = kernel.objects.get(*target)?;
                        let class = kernel.classes.get(target.class)?;
                        Some((class.name.clone(), target.id.clone()))
                    }
                    Value::Uid { class, id } => kernel
                        .classes
                        .get(*class)
                        .map(|c| (c.name.clone(), id.clone())),
                    Value::Uid2 { class, id } => Some((class.clone(), id.clone())),
                    _ => None,
                }
            };

            match value {
                Value::List(items) => {
                    w.put_eol()?;
                    for item in items {
                        if let Some((class_name, id)) = reference(self, item) {
                            let token = self.class_token(aliases, &class_name, extended);
                            w.put_raw("  ")?;
                            w.put_start_tag("ref")?;
                            w.put_attribute("class", &token)?;
                            w.put_attribute("id", &id)?;
                            w.put_end_tag()?;
                        }
                    }
                    w.put_raw(" ")?;
                    w.put_last_tag("rel")?;
                }
                single => {
                    if let Some((class_name, id)) = reference(self, single) {
                        let token = self.class_token(aliases, &class_name, extended);
                        w.put_attribute("class", &token)?;
                        w.put_attribute("id", &id)?;
                    }
                    w.put_end_tag()?;
                }
            }
        }

        w.put_last_tag("obj")
    }
}

fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Write through a sibling temporary file plus rename.
fn write_atomically(target: &Path, contents: &[u8]) -> Result<()> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temporary = target.with_file_name(format!(".{file_name}.oks-tmp-{}", std::process::id()));

    let write = || -> std::io::Result<()> {
        let mut handle = std::fs::File::create(&temporary)?;
        handle.write_all(contents)?;
        handle.flush()?;
        handle.sync_all()?;
        std::fs::rename(&temporary, target)
    };
    write().map_err(|e| {
        let _ = std::fs::remove_file(&temporary);
        OksError::io(target, e)
    })
}
