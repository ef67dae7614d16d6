//! Object lifecycle and typed reads/writes.
//!
//! Identity is `(class, id)`, unique within the class — and across its
//! whole inheritance cone when the kernel is configured to test that.
//! Writes type-check against the declaring attribute or relationship,
//! converting with a warning on mismatch, and keep the reverse
//! composite references and attribute indices in sync.

use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use tracing::warn;

use crate::error::{OksError, Result};
use crate::file::FileId;
use crate::object::{AttributeIndex, Obj, ObjectId};
use crate::schema::{ClassId, DataInfo, HighCardinality, LowCardinality, ObjectEvent, Relationship};
use crate::value::Value;

use super::Kernel;

impl Kernel {
    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Check the id is free, across the inheritance cone of every root
    /// ancestor when the duplicated-objects-via-inheritance test is on.
    pub(crate) fn check_id_unique(&self, class: ClassId, id: &str) -> Result<()> {
        let c = self.class(class)?;
        if c.objects.contains_key(id) {
            return Err(OksError::schema(format!(
                "object \"{id}@{}\" already exists",
                c.name
            )));
        }

        if self.config.test_duplicated_objects_via_inheritance {
            // every class of the connected inheritance component: the
            // cones of the topmost ancestors (or of the class itself)
            let mut roots: Vec<ClassId> = c
                .all_super
                .iter()
                .copied()
                .filter(|s| {
                    self.classes
                        .get(*s)
                        .is_some_and(|sc| sc.all_super.is_empty())
                })
                .collect();
            if roots.is_empty() {
                roots.push(class);
            }
            for root in roots {
                let Ok(root_class) = self.class(root) else {
                    continue;
                };
                for member in std::iter::once(root).chain(root_class.all_sub.iter().copied()) {
                    if member == class {
                        continue;
                    }
                    if self
                        .classes
                        .get(member)
                        .is_some_and(|m| m.objects.contains_key(id))
                    {
                        return Err(OksError::schema(format!(
                            "cannot create object \"{id}@{}\": class \"{}\" inherits from \"{}\" and already has object with such id",
                            c.name,
                            self.class(member)?.name,
                            root_class.name,
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create an object in the active data file.
    pub fn create_object(&mut self, class: ClassId, id: Option<&str>) -> Result<ObjectId> {
        let file = self.active_data.ok_or(OksError::NoActiveFile("data"))?;
        self.create_object_in(file, class, id)
    }

    /// Create an object in a given data file; a missing id is generated.
    pub fn create_object_in(
        &mut self,
        file: FileId,
        class: ClassId,
        id: Option<&str>,
    ) -> Result<ObjectId> {
        if self.class(class)?.is_abstract {
            return Err(OksError::schema(format!(
                "cannot create object of abstract class \"{}\"",
                self.class(class)?.name
            )));
        }
        let id: SmolStr = match id {
            Some(id) if !id.is_empty() => SmolStr::new(id),
            _ => self.next_generated_id(class),
        };
        self.check_id_unique(class, &id)?;
        self.touch_file(file)?;

        let values = self.initial_values(class)?;
        let object = self.objects.insert(Obj {
            class,
            id: id.clone(),
            values,
            rcrs: Vec::new(),
            file,
            duplicated_index: None,
        });
        self.class_mut(class)?.objects.insert(id, object);
        self.index_object(class, object)?;
        self.object_events.emit(&ObjectEvent::Created { object });
        Ok(object)
    }

    /// Default value vector for one class, in layout order.
    pub(crate) fn initial_values(&self, class: ClassId) -> Result<Vec<Value>> {
        let c = self.class(class)?;
        let mut values = Vec::with_capacity(c.value_slots());
        for attribute in &c.all_attributes {
            values.push(attribute.init_data()?);
        }
        for relationship in &c.all_relationships {
            values.push(Value::null_relationship(relationship.is_multi()));
        }
        Ok(values)
    }

    /// Used by the loader: insert a fully parsed object, bypassing the
    /// per-write checks (values were checked while parsing).
    pub(crate) fn adopt_object(
        &mut self,
        file: FileId,
        class: ClassId,
        id: SmolStr,
        values: Vec<Value>,
        duplicated_index: Option<u32>,
    ) -> Result<ObjectId> {
        let object = self.objects.insert(Obj {
            class,
            id: id.clone(),
            values,
            rcrs: Vec::new(),
            file,
            duplicated_index,
        });
        self.class_mut(class)?.objects.insert(id, object);
        self.index_object(class, object)?;
        Ok(object)
    }

    fn index_object(&mut self, class: ClassId, object: ObjectId) -> Result<()> {
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
                index.insert(&value, object);
            }
        }
        Ok(())
    }

    fn unindex_object(&mut self, class: ClassId, object: ObjectId) -> Result<()> {
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

    // ------------------------------------------------------------------
    // Rename
    // ------------------------------------------------------------------

    /// Give an object a new id, unique across its inheritance cone.
    pub fn rename_object(&mut self, object: ObjectId, new_id: &str) -> Result<()> {
        if new_id.is_empty() {
            return Err(OksError::schema("object id is empty"));
        }
        let (class, old_id, file) = {
            let o = self.object(object)?;
            (o.class, o.id.clone(), o.file)
        };
        if old_id == new_id {
            return Ok(());
        }
        self.check_id_unique(class, new_id)?;
        self.touch_file(file)?;

        let new_id = SmolStr::new(new_id);
        self.object_mut(object)?.id = new_id.clone();
        let table = &mut self.class_mut(class)?.objects;
        table.shift_remove(&old_id);
        table.insert(new_id.clone(), object);

        self.object_events.emit(&ObjectEvent::Renamed {
            object,
            old_id,
            new_id,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Destruction
    // ------------------------------------------------------------------

    /// Destroy an object.
    ///
    /// The normal path scans every object and converts forward edges
    /// pointing at the victim into deferred uids. The fast path skips
    /// the scan under the caller's promise that no references exist;
    /// debug builds verify the promise.
    pub fn destroy_object(&mut self, object: ObjectId, fast: bool) -> Result<()> {
        let (class, id, file) = {
            let o = self.object(object)?;
            (o.class, o.id.clone(), o.file)
        };
        let class_name = self.class(class)?.name.clone();
        self.touch_file(file)?;

        if fast {
            debug_assert!(
                self.inbound_references(object).is_empty(),
                "fast destroy of a referenced object"
            );
        } else {
            self.unbind_references_to(object, &class_name, &id)?;
        }

        // drop reverse entries this object's forward edges created
        let forward: Vec<(SmolStr, Value)> = {
            let o = self.object(object)?;
            let c = self.class(class)?;
            c.all_relationships
                .iter()
                .enumerate()
                .filter(|(_, r)| r.maintains_rcr())
                .filter_map(|(i, r)| {
                    o.values
                        .get(c.all_attributes.len() + i)
                        .map(|v| (r.name.clone(), v.clone()))
                })
                .collect()
        };
        for (relationship, value) in forward {
            self.remove_rcr_entries(&value, object, &relationship);
        }

        self.unindex_object(class, object)?;
        self.class_mut(class)?.objects.shift_remove(&id);
        self.objects.remove(object);

        self.object_events.emit(&ObjectEvent::Deleted {
            class: class_name,
            id,
        });
        Ok(())
    }

    /// Every `(object, relationship)` whose forward edge points at the
    /// given object.
    pub(crate) fn inbound_references(&self, target: ObjectId) -> Vec<(ObjectId, SmolStr)> {
        let mut inbound = Vec::new();
        for (source, o) in self.objects.iter() {
            let Some(class) = self.classes.get(o.class) else {
                continue;
            };
            for (i, relationship) in class.all_relationships.iter().enumerate() {
                let offset = class.all_attributes.len() + i;
                let points = match o.values.get(offset) {
                    Some(Value::ObjectRef(r)) => *r == target,
                    Some(Value::List(items)) => items
                        .iter()
                        .any(|v| matches!(v, Value::ObjectRef(r) if *r == target)),
                    _ => false,
                };
                if points {
                    inbound.push((source, relationship.name.clone()));
                }
            }
        }
        inbound
    }

    /// Convert every forward edge pointing at the victim into a
    /// deferred uid, marking the owners' files dirty.
    fn unbind_references_to(
        &mut self,
        victim: ObjectId,
        victim_class: &SmolStr,
        victim_id: &SmolStr,
    ) -> Result<()> {
        let inbound = self.inbound_references(victim);
        let mut touched_files: FxHashSet<FileId> = FxHashSet::default();
        for (source, relationship) in inbound {
            let (class, file) = {
                let o = self.object(source)?;
                (o.class, o.file)
            };
            let Some(info) = self.class(class)?.data_info(&relationship) else {
                continue;
            };
            let replacement = Value::Uid2 {
                class: victim_class.clone(),
                id: victim_id.clone(),
            };
            if let Some(slot) = self.object_mut(source)?.values.get_mut(info.offset) {
                match slot {
                    Value::List(items) => {
                        for item in items.iter_mut() {
                            if matches!(item, Value::ObjectRef(r) if *r == victim) {
                                *item = replacement.clone();
                            }
                        }
                    }
                    other => *other = replacement,
                }
            }
            touched_files.insert(file);
            self.object_events.emit(&ObjectEvent::Changed { object: source });
        }
        for file in touched_files {
            if let Ok(descriptor) = self.file_mut(file) {
                descriptor.set_updated();
            }
        }
        Ok(())
    }

    fn remove_rcr_entries(&mut self, value: &Value, parent: ObjectId, relationship: &SmolStr) {
        match value {
            Value::ObjectRef(child) => {
                if let Some(child) = self.objects.get_mut(*child) {
                    child.remove_rcr(parent, relationship);
                }
            }
            Value::List(items) => {
                for item in items {
                    if let Value::ObjectRef(child) = item {
                        if let Some(child) = self.objects.get_mut(*child) {
                            child.remove_rcr(parent, relationship);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Layout lookup: resolve a name once, read by offset afterwards.
    pub fn data_info(&self, class: ClassId, name: &str) -> Result<DataInfo> {
        self.class(class)?.data_info(name).ok_or_else(|| {
            OksError::schema(format!(
                "class \"{}\" has no attribute or relationship \"{name}\"",
                self.class(class).map(|c| c.name.clone()).unwrap_or_default()
            ))
        })
    }

    pub fn get_value(&self, object: ObjectId, info: DataInfo) -> Result<&Value> {
        self.object(object)?
            .values
            .get(info.offset)
            .ok_or_else(|| OksError::schema("value offset out of layout".to_string()))
    }

    pub fn get_attribute_value(&self, object: ObjectId, name: &str) -> Result<&Value> {
        let class = self.object(object)?.class;
        let info = self.data_info(class, name)?;
        if info.is_relationship {
            return Err(OksError::schema(format!("\"{name}\" is a relationship")));
        }
        self.get_value(object, info)
    }

    pub fn get_relationship_value(&self, object: ObjectId, name: &str) -> Result<&Value> {
        let class = self.object(object)?.class;
        let info = self.data_info(class, name)?;
        if !info.is_relationship {
            return Err(OksError::schema(format!("\"{name}\" is an attribute")));
        }
        self.get_value(object, info)
    }

    // ------------------------------------------------------------------
    // Attribute writes
    // ------------------------------------------------------------------

    /// Set an attribute: convert on type mismatch (with a warning),
    /// range-check, keep indices current, mark the file dirty, notify.
    pub fn set_attribute_value(&mut self, object: ObjectId, name: &str, value: Value) -> Result<()> {
        let (class, file) = {
            let o = self.object(object)?;
            (o.class, o.file)
        };
        let info = self.data_info(class, name)?;
        if info.is_relationship {
            return Err(OksError::schema(format!("\"{name}\" is a relationship")));
        }

        let (value, attribute_name) = {
            let attribute = self
                .class(class)?
                .find_attribute(name)
                .ok_or_else(|| OksError::schema(format!("no attribute \"{name}\"")))?;

            let expected_list = attribute.multi;
            let matches_shape = match (&value, expected_list) {
                (Value::List(items), true) => items
                    .iter()
                    .all(|v| v.kind() == attribute.data_type()),
                (single, false) => single.kind() == attribute.data_type(),
                _ => false,
            };
            let value = if matches_shape {
                value
            } else {
                let converted = value.convert(&attribute.conversion_target())?;
                warn!(
                    "value of attribute \"{name}\" converted from {} to {}",
                    value.type_name(),
                    attribute.data_type().type_name()
                );
                converted
            };
            attribute.check_range(&value, self.config.skip_string_range)?;
            (value, attribute.name.clone())
        };

        self.touch_file(file)?;

        // index maintenance wants the old value
        let old = self
            .object(object)?
            .values
            .get(info.offset)
            .cloned()
            .unwrap_or_default();
        if let Some(index) = self.class_mut(class)?.indices.get_mut(&attribute_name) {
            index.remove(&old, object);
            index.insert(&value, object);
        }

        if let Some(slot) = self.object_mut(object)?.values.get_mut(info.offset) {
            *slot = value;
        }
        self.object_events.emit(&ObjectEvent::Changed { object });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Relationship writes
    // ------------------------------------------------------------------

    fn relationship_of(&self, class: ClassId, name: &str) -> Result<(DataInfo, Relationship)> {
        let info = self.data_info(class, name)?;
        if !info.is_relationship {
            return Err(OksError::schema(format!("\"{name}\" is an attribute")));
        }
        let relationship = self
            .class(class)?
            .relationship_at(info.offset)
            .cloned()
            .ok_or_else(|| OksError::schema(format!("no relationship at offset of \"{name}\"")))?;
        Ok((info, relationship))
    }

    fn check_target_class(&self, relationship: &Relationship, target: ObjectId) -> Result<()> {
        let target_class = self.object(target)?.class;
        let declared = relationship.target.ok_or_else(|| {
            OksError::schema(format!(
                "class \"{}\" of relationship \"{}\" is not loaded",
                relationship.class_type, relationship.name
            ))
        })?;
        if !self.is_castable(target_class, declared) {
            return Err(OksError::schema(format!(
                "object \"{}@{}\" cannot be value of relationship \"{}\": its class is not derived from \"{}\"",
                self.object(target)?.id,
                self.class(target_class)?.name,
                relationship.name,
                relationship.class_type
            )));
        }
        Ok(())
    }

    /// One reverse entry per composite forward edge; exclusivity
    /// forbids a second composite parent.
    fn add_rcr(&mut self, child: ObjectId, parent: ObjectId, relationship: &Relationship) -> Result<()> {
        if !relationship.maintains_rcr() {
            return Ok(());
        }
        {
            let c = self.object(child)?;
            if c.rcrs.iter().any(|r| r.parent != parent) {
                return Err(OksError::schema(format!(
                    "cannot add RCR to object \"{}\": it already has a composite parent",
                    c.id
                )));
            }
        }
        self.object_mut(child)?.add_rcr(parent, &relationship.name);
        Ok(())
    }

    fn remove_rcr(&mut self, child: ObjectId, parent: ObjectId, relationship: &Relationship) {
        if !relationship.maintains_rcr() {
            return;
        }
        if let Some(child) = self.objects.get_mut(child) {
            child.remove_rcr(parent, &relationship.name);
        }
    }

    /// Set a single-value relationship. `None` clears it, which a
    /// `low-cc = one` relationship forbids unless the loader override
    /// is passed.
    pub fn set_relationship_value(
        &mut self,
        object: ObjectId,
        name: &str,
        target: Option<ObjectId>,
        skip_non_null_check: bool,
    ) -> Result<()> {
        let (class, file) = {
            let o = self.object(object)?;
            (o.class, o.file)
        };
        let (info, relationship) = self.relationship_of(class, name)?;
        if relationship.high_cc == HighCardinality::Many {
            return Err(OksError::schema(format!(
                "relationship \"{name}\" is multi-value"
            )));
        }
        if target.is_none() && relationship.low_cc == LowCardinality::One && !skip_non_null_check {
            return Err(OksError::schema(format!(
                "cannot set null value of relationship \"{name}\" with low cardinality \"one\""
            )));
        }
        if let Some(target) = target {
            self.check_target_class(&relationship, target)?;
        }

        self.touch_file(file)?;

        let old = self.object(object)?.values.get(info.offset).cloned();
        if let Some(Value::ObjectRef(previous)) = old {
            self.remove_rcr(previous, object, &relationship);
        }
        if let Some(target) = target {
            self.add_rcr(target, object, &relationship)?;
        }

        let new_value = match target {
            Some(target) => Value::ObjectRef(target),
            None => Value::Uid2Unset,
        };
        if let Some(slot) = self.object_mut(object)?.values.get_mut(info.offset) {
            *slot = new_value;
        }
        self.object_events.emit(&ObjectEvent::Changed { object });
        Ok(())
    }

    /// Set a single-value relationship to a deferred `(class, id)`
    /// reference resolved by a later bind pass.
    pub fn set_relationship_uid(
        &mut self,
        object: ObjectId,
        name: &str,
        class_name: &str,
        id: &str,
    ) -> Result<()> {
        let (class, file) = {
            let o = self.object(object)?;
            (o.class, o.file)
        };
        let (info, relationship) = self.relationship_of(class, name)?;
        if relationship.high_cc == HighCardinality::Many {
            return Err(OksError::schema(format!(
                "relationship \"{name}\" is multi-value"
            )));
        }
        self.touch_file(file)?;

        let old = self.object(object)?.values.get(info.offset).cloned();
        if let Some(Value::ObjectRef(previous)) = old {
            self.remove_rcr(previous, object, &relationship);
        }

        let new_value = match self.find_class(class_name) {
            Some(class) => Value::Uid {
                class,
                id: SmolStr::new(id),
            },
            None => Value::Uid2 {
                class: SmolStr::new(class_name),
                id: SmolStr::new(id),
            },
        };
        if let Some(slot) = self.object_mut(object)?.values.get_mut(info.offset) {
            *slot = new_value;
        }
        self.object_events.emit(&ObjectEvent::Changed { object });
        Ok(())
    }

    /// Add to a multi-value relationship: append when ordered, set
    /// semantics otherwise.
    pub fn add_relationship_value(
        &mut self,
        object: ObjectId,
        name: &str,
        target: ObjectId,
    ) -> Result<()> {
        let (class, file) = {
            let o = self.object(object)?;
            (o.class, o.file)
        };
        let (info, relationship) = self.relationship_of(class, name)?;
        if relationship.high_cc != HighCardinality::Many {
            return Err(OksError::schema(format!(
                "relationship \"{name}\" is single-value"
            )));
        }
        self.check_target_class(&relationship, target)?;
        self.touch_file(file)?;

        let already_present = matches!(
            self.object(object)?.values.get(info.offset),
            Some(Value::List(items)) if items.iter().any(|v| matches!(v, Value::ObjectRef(r) if *r == target))
        );
        if already_present && !relationship.ordered {
            return Ok(());
        }

        self.add_rcr(target, object, &relationship)?;
        if let Some(Value::List(items)) = self.object_mut(object)?.values.get_mut(info.offset) {
            items.push(Value::ObjectRef(target));
        } else {
            let slot = self
                .object_mut(object)?
                .values
                .get_mut(info.offset)
                .ok_or_else(|| OksError::schema("value offset out of layout".to_string()))?;
            *slot = Value::List(vec![Value::ObjectRef(target)]);
        }
        self.object_events.emit(&ObjectEvent::Changed { object });
        Ok(())
    }

    /// Remove a value from a multi-value relationship.
    pub fn remove_relationship_value(
        &mut self,
        object: ObjectId,
        name: &str,
        target: ObjectId,
    ) -> Result<()> {
        let (class, file) = {
            let o = self.object(object)?;
            (o.class, o.file)
        };
        let (info, relationship) = self.relationship_of(class, name)?;
        if relationship.high_cc != HighCardinality::Many {
            return Err(OksError::schema(format!(
                "relationship \"{name}\" is single-value"
            )));
        }
        if relationship.low_cc == LowCardinality::One {
            // removing the last value would empty a non-null slot
            let remaining = match self.object(object)?.values.get(info.offset) {
                Some(Value::List(items)) => items
                    .iter()
                    .filter(|v| !matches!(v, Value::ObjectRef(r) if *r == target))
                    .count(),
                _ => 0,
            };
            if remaining == 0 {
                return Err(OksError::schema(format!(
                    "cannot remove last value of relationship \"{name}\" with low cardinality \"one\""
                )));
            }
        }
        self.touch_file(file)?;

        let mut removed = false;
        if let Some(Value::List(items)) = self.object_mut(object)?.values.get_mut(info.offset) {
            let before = items.len();
            items.retain(|v| !matches!(v, Value::ObjectRef(r) if *r == target));
            removed = items.len() != before;
        }
        if !removed {
            return Err(OksError::schema(format!(
                "relationship \"{name}\" has no such object value"
            )));
        }
        self.remove_rcr(target, object, &relationship);
        self.object_events.emit(&ObjectEvent::Changed { object });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Attribute indices
    // ------------------------------------------------------------------

    /// Build a sorted index over one attribute of one class. Abstract
    /// classes have no objects and take no indices.
    pub fn build_index(&mut self, class: ClassId, attribute: &str) -> Result<()> {
        let c = self.class(class)?;
        if c.is_abstract {
            return Err(OksError::schema(format!(
                "cannot build index for abstract class \"{}\"",
                c.name
            )));
        }
        if c.indices.contains_key(attribute) {
            return Err(OksError::schema(format!(
                "class \"{}\" already has index for attribute \"{attribute}\"",
                c.name
            )));
        }
        let info = self.data_info(class, attribute)?;
        if info.is_relationship {
            return Err(OksError::schema(format!("\"{attribute}\" is a relationship")));
        }

        let mut index = AttributeIndex::new(SmolStr::new(attribute), info.offset);
        let members: Vec<ObjectId> = self.class(class)?.objects.values().copied().collect();
        for object in &members {
            if let Some(value) = self.objects.get(*object).and_then(|o| o.values.get(info.offset)) {
                index.insert(value, *object);
            }
        }
        tracing::debug!(
            "built index for attribute '{attribute}' in class '{}' over {} instances",
            self.class(class)?.name,
            members.len()
        );
        self.class_mut(class)?
            .indices
            .insert(SmolStr::new(attribute), index);
        Ok(())
    }

    pub fn drop_index(&mut self, class: ClassId, attribute: &str) -> Result<()> {
        if self
            .class_mut(class)?
            .indices
            .remove(attribute)
            .is_none()
        {
            return Err(OksError::schema(format!(
                "class has no index for attribute \"{attribute}\""
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Graph walks
    // ------------------------------------------------------------------

    /// Objects referencing the given one, through a named relationship
    /// or any (`"*"`). Full scan; composite parents are cheaper through
    /// [`Obj::reverse_composite_rels`].
    pub fn get_all_rels(&self, target: ObjectId, name: &str) -> Vec<(ObjectId, SmolStr)> {
        self.inbound_references(target)
            .into_iter()
            .filter(|(_, relationship)| name == "*" || relationship == name)
            .collect()
    }

    /// Objects transitively referenced from a start object, up to a
    /// recursion depth.
    pub fn references(&self, object: ObjectId, depth: usize, add_self: bool) -> FxHashSet<ObjectId> {
        let mut out = FxHashSet::default();
        if add_self {
            out.insert(object);
        }
        let mut frontier = vec![object];
        for _ in 0..depth {
            let mut next = Vec::new();
            for source in frontier {
                let Some(o) = self.objects.get(source) else {
                    continue;
                };
                for value in &o.values {
                    let mut push = |v: &Value| {
                        if let Value::ObjectRef(r) = v {
                            if out.insert(*r) {
                                next.push(*r);
                            }
                        }
                    };
                    match value {
                        Value::List(items) => items.iter().for_each(&mut push),
                        single => push(single),
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        out
    }
}
