//! Schema mutation and the cache-rebuild pass.
//!
//! Every mutator follows the same shape: take the owning file's lock
//! and mark it dirty, apply the change to the class's direct tables,
//! rebuild the derived caches, and emit a change notification. A
//! rebuild failure (inheritance cycle, duplicate flattened name,
//! missing superclass) rolls the change back before surfacing.

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tracing::warn;

use crate::error::{OksError, Result};
use crate::file::FileId;
use crate::object::AttributeIndex;
use crate::schema::{
    Attribute, Class, ClassChange, ClassId, DataInfo, Method, Relationship, SchemaEvent,
};
use crate::value::{Kind, Value};

use super::Kernel;

/// Snapshot of one class's layout used to carry object values across a
/// schema change.
struct LayoutSnapshot {
    attributes: Vec<Attribute>,
    data_info: FxHashMap<SmolStr, DataInfo>,
}

impl Kernel {
    // ------------------------------------------------------------------
    // Class lifecycle
    // ------------------------------------------------------------------

    /// Create a class in a schema file.
    pub fn create_class(&mut self, file: FileId, name: &str) -> Result<ClassId> {
        if name.is_empty() {
            return Err(OksError::schema("class name is empty"));
        }
        if self.class_index.contains_key(name) {
            return Err(OksError::schema(format!(
                "class \"{name}\" already exists"
            )));
        }
        self.touch_file(file)?;
        let id = self.classes.insert(Class::new(SmolStr::new(name), file));
        self.class_index.insert(SmolStr::new(name), id);
        self.registrate()?;
        self.schema_events.emit(&SchemaEvent::ClassCreated {
            class: id,
            name: SmolStr::new(name),
        });
        Ok(id)
    }

    /// Create a class in the active schema file.
    pub fn create_class_in_active(&mut self, name: &str) -> Result<ClassId> {
        let file = self
            .active_schema
            .ok_or(OksError::NoActiveFile("schema"))?;
        self.create_class(file, name)
    }

    /// Destroy a class and its objects. Classes inheriting from it keep
    /// it alive; destroying one of those first is required.
    pub fn destroy_class(&mut self, class: ClassId) -> Result<()> {
        let name = self.class(class)?.name.clone();

        for (_, other) in self.classes.iter() {
            if other.super_class_names.contains(&name) {
                return Err(OksError::schema(format!(
                    "cannot destroy class \"{name}\": it is a superclass of \"{}\"",
                    other.name
                )));
            }
        }

        let file = self.class(class)?.file();
        self.touch_file(file)?;

        let objects: Vec<_> = self.class(class)?.objects.values().copied().collect();
        for object in objects {
            self.destroy_object(object, false)?;
        }

        self.class_index.remove(&name);
        self.classes.remove(class);
        self.registrate()?;
        self.schema_events.emit(&SchemaEvent::ClassDeleted { name });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Shared mutation plumbing
    // ------------------------------------------------------------------

    /// Apply a change to a class, rebuild caches, roll back on failure
    /// and emit the change event on success.
    fn mutate_class<T>(
        &mut self,
        class: ClassId,
        change: ClassChange,
        detail: SmolStr,
        apply: impl FnOnce(&mut Class) -> Result<T>,
        revert: impl FnOnce(&mut Class),
    ) -> Result<T> {
        let file = self.class(class)?.file();
        self.touch_file(file)?;

        let value = apply(self.class_mut(class)?)?;
        if let Err(error) = self.registrate() {
            revert(self.class_mut(class)?);
            self.registrate()
                .expect("rollback restores a previously valid schema");
            return Err(error);
        }

        let name = self.class(class)?.name.clone();
        self.schema_events.emit(&SchemaEvent::ClassChanged {
            class,
            name,
            change,
            detail,
        });
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Superclasses
    // ------------------------------------------------------------------

    pub fn add_super_class(&mut self, class: ClassId, super_name: &str) -> Result<()> {
        let super_name = SmolStr::new(super_name);
        if self.class(class)?.super_class_names.contains(&super_name) {
            return Ok(());
        }
        let added = super_name.clone();
        let removed = super_name.clone();
        self.mutate_class(
            class,
            ClassChange::SuperClassesList,
            super_name.clone(),
            move |c| {
                c.super_class_names.push(added);
                Ok(())
            },
            move |c| {
                c.super_class_names.retain(|n| *n != removed);
            },
        )
    }

    pub fn remove_super_class(&mut self, class: ClassId, super_name: &str) -> Result<()> {
        let super_name = SmolStr::new(super_name);
        let position = self
            .class(class)?
            .super_class_names
            .iter()
            .position(|n| *n == super_name)
            .ok_or_else(|| {
                OksError::schema(format!("class has no superclass \"{super_name}\""))
            })?;
        let restored = super_name.clone();
        self.mutate_class(
            class,
            ClassChange::SuperClassesList,
            super_name,
            move |c| {
                c.super_class_names.remove(position);
                Ok(())
            },
            move |c| {
                c.super_class_names.insert(position, restored);
            },
        )
    }

    // ------------------------------------------------------------------
    // Class properties
    // ------------------------------------------------------------------

    pub fn set_class_description(&mut self, class: ClassId, description: &str) -> Result<()> {
        let old = self.class(class)?.description.clone();
        let new = description.to_string();
        self.mutate_class(
            class,
            ClassChange::Description,
            SmolStr::default(),
            move |c| {
                c.description = new;
                Ok(())
            },
            move |c| c.description = old,
        )
    }

    /// Abstract classes may not own objects.
    pub fn set_class_is_abstract(&mut self, class: ClassId, is_abstract: bool) -> Result<()> {
        if is_abstract && !self.class(class)?.objects.is_empty() {
            return Err(OksError::schema(format!(
                "cannot make class \"{}\" abstract: it has objects",
                self.class(class)?.name
            )));
        }
        let old = self.class(class)?.is_abstract;
        self.mutate_class(
            class,
            ClassChange::IsAbstract,
            SmolStr::default(),
            move |c| {
                c.is_abstract = is_abstract;
                Ok(())
            },
            move |c| c.is_abstract = old,
        )
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    pub fn add_attribute(&mut self, class: ClassId, attribute: Attribute) -> Result<()> {
        let name = attribute.name.clone();
        if attribute.data_type() == Kind::Enum && attribute.enumerators().is_empty() {
            return Err(OksError::schema(format!(
                "range of enumeration attribute \"{name}\" is empty"
            )));
        }
        if self.class(class)?.find_direct_attribute(&name).is_some() {
            return Err(OksError::schema(format!(
                "class \"{}\" already has direct attribute \"{name}\"",
                self.class(class)?.name
            )));
        }
        let removed = name.clone();
        self.mutate_class(
            class,
            ClassChange::AttributesList,
            name,
            move |c| {
                c.direct_attributes.push(attribute);
                Ok(())
            },
            move |c| {
                c.direct_attributes.retain(|a| a.name != removed);
            },
        )
    }

    pub fn remove_attribute(&mut self, class: ClassId, name: &str) -> Result<()> {
        let position = self
            .class(class)?
            .direct_attributes
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| self.no_direct_attribute(class, name))?;
        let file = self.class(class)?.file();
        self.touch_file(file)?;

        let removed = self.class_mut(class)?.direct_attributes.remove(position);
        if let Err(error) = self.registrate() {
            self.class_mut(class)?
                .direct_attributes
                .insert(position, removed);
            self.registrate()
                .expect("rollback restores a previously valid schema");
            return Err(error);
        }

        let class_name = self.class(class)?.name.clone();
        self.schema_events.emit(&SchemaEvent::ClassChanged {
            class,
            name: class_name,
            change: ClassChange::AttributesList,
            detail: SmolStr::new(name),
        });
        Ok(())
    }

    fn no_direct_attribute(&self, class: ClassId, name: &str) -> OksError {
        let class_name = self
            .classes
            .get(class)
            .map(|c| c.name.as_str().to_string())
            .unwrap_or_default();
        OksError::schema(format!(
            "class \"{class_name}\" has no direct attribute \"{name}\""
        ))
    }

    fn no_direct_relationship(&self, class: ClassId, name: &str) -> OksError {
        let class_name = self
            .classes
            .get(class)
            .map(|c| c.name.as_str().to_string())
            .unwrap_or_default();
        OksError::schema(format!(
            "class \"{class_name}\" has no direct relationship \"{name}\""
        ))
    }

    /// Shared frame of the per-attribute setters.
    fn mutate_attribute<T: Clone + 'static, U: Fn(&Attribute) -> T, V: Fn(&mut Attribute, T) -> Result<()> + Copy + 'static>(
        &mut self,
        class: ClassId,
        name: &str,
        change: ClassChange,
        read: U,
        write: V,
    ) -> Result<impl FnOnce(&mut Kernel, T) -> Result<()> + use<T, U, V>> {
        let position = self
            .class(class)?
            .direct_attributes
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| self.no_direct_attribute(class, name))?;
        let old = read(&self.class(class)?.direct_attributes[position]);
        let detail = SmolStr::new(name);
        Ok(move |kernel: &mut Kernel, new: T| {
            let rollback = old.clone();
            kernel.mutate_class(
                class,
                change,
                detail,
                move |c| write(&mut c.direct_attributes[position], new),
                move |c| {
                    let _ = write(&mut c.direct_attributes[position], rollback);
                },
            )
        })
    }

    pub fn rename_attribute(&mut self, class: ClassId, name: &str, new_name: &str) -> Result<()> {
        if name == new_name {
            return Ok(());
        }
        if new_name.is_empty() {
            return Err(OksError::schema("attribute name is empty"));
        }
        if self.class(class)?.find_direct_attribute(new_name).is_some() {
            return Err(OksError::schema(format!(
                "class \"{}\" already has direct attribute \"{new_name}\"",
                self.class(class)?.name
            )));
        }
        let apply = self.mutate_attribute(
            class,
            name,
            ClassChange::AttributesList,
            |a| a.name.clone(),
            |a, value: SmolStr| {
                a.name = value;
                Ok(())
            },
        )?;
        apply(self, SmolStr::new(new_name))
    }

    pub fn set_attribute_type(&mut self, class: ClassId, name: &str, data_type: Kind) -> Result<()> {
        let apply = self.mutate_attribute(
            class,
            name,
            ClassChange::AttributeType,
            Attribute::clone,
            |a, value: Attribute| {
                *a = value;
                Ok(())
            },
        )?;
        // build the changed attribute first so a bad type never lands
        let mut changed = self
            .class(class)?
            .find_direct_attribute(name)
            .ok_or_else(|| self.no_direct_attribute(class, name))?
            .clone();
        changed.set_data_type(data_type)?;
        apply(self, changed)
    }

    pub fn set_attribute_range(&mut self, class: ClassId, name: &str, range: &str) -> Result<()> {
        let apply = self.mutate_attribute(
            class,
            name,
            ClassChange::AttributeRange,
            Attribute::clone,
            |a, value: Attribute| {
                *a = value;
                Ok(())
            },
        )?;
        let mut changed = self
            .class(class)?
            .find_direct_attribute(name)
            .ok_or_else(|| self.no_direct_attribute(class, name))?
            .clone();
        changed.set_range(range)?;
        changed.validate_init_against_range()?;
        apply(self, changed)
    }

    pub fn set_attribute_init_value(&mut self, class: ClassId, name: &str, init: &str) -> Result<()> {
        let apply = self.mutate_attribute(
            class,
            name,
            ClassChange::AttributeInitValue,
            Attribute::clone,
            |a, value: Attribute| {
                *a = value;
                Ok(())
            },
        )?;
        let mut changed = self
            .class(class)?
            .find_direct_attribute(name)
            .ok_or_else(|| self.no_direct_attribute(class, name))?
            .clone();
        changed.init_value = init.to_string();
        changed.validate_init_against_range()?;
        apply(self, changed)
    }

    pub fn set_attribute_format(
        &mut self,
        class: ClassId,
        name: &str,
        format: crate::value::IntFormat,
    ) -> Result<()> {
        let apply = self.mutate_attribute(
            class,
            name,
            ClassChange::AttributeFormat,
            |a| a.format,
            |a, value| {
                a.format = value;
                Ok(())
            },
        )?;
        apply(self, format)
    }

    pub fn set_attribute_is_multi_values(
        &mut self,
        class: ClassId,
        name: &str,
        multi: bool,
    ) -> Result<()> {
        let apply = self.mutate_attribute(
            class,
            name,
            ClassChange::AttributeMultiValueCardinality,
            |a| a.multi,
            |a, value| {
                a.multi = value;
                Ok(())
            },
        )?;
        apply(self, multi)
    }

    pub fn set_attribute_is_no_null(
        &mut self,
        class: ClassId,
        name: &str,
        no_null: bool,
    ) -> Result<()> {
        let apply = self.mutate_attribute(
            class,
            name,
            ClassChange::AttributeIsNoNull,
            |a| a.no_null,
            |a, value| {
                a.no_null = value;
                Ok(())
            },
        )?;
        apply(self, no_null)
    }

    pub fn set_attribute_description(
        &mut self,
        class: ClassId,
        name: &str,
        description: &str,
    ) -> Result<()> {
        let apply = self.mutate_attribute(
            class,
            name,
            ClassChange::AttributeDescription,
            |a| a.description.clone(),
            |a, value: String| {
                a.description = value;
                Ok(())
            },
        )?;
        apply(self, description.to_string())
    }

    // ------------------------------------------------------------------
    // Relationships
    // ------------------------------------------------------------------

    pub fn add_relationship(&mut self, class: ClassId, relationship: Relationship) -> Result<()> {
        let name = relationship.name.clone();
        if self
            .class(class)?
            .find_direct_relationship(&name)
            .is_some()
        {
            return Err(OksError::schema(format!(
                "class \"{}\" already has direct relationship \"{name}\"",
                self.class(class)?.name
            )));
        }
        let removed = name.clone();
        self.mutate_class(
            class,
            ClassChange::RelationshipsList,
            name,
            move |c| {
                c.direct_relationships.push(relationship);
                Ok(())
            },
            move |c| {
                c.direct_relationships.retain(|r| r.name != removed);
            },
        )
    }

    pub fn remove_relationship(&mut self, class: ClassId, name: &str) -> Result<()> {
        let position = self
            .class(class)?
            .direct_relationships
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| self.no_direct_relationship(class, name))?;
        let file = self.class(class)?.file();
        self.touch_file(file)?;

        let removed = self.class_mut(class)?.direct_relationships.remove(position);
        if let Err(error) = self.registrate() {
            self.class_mut(class)?
                .direct_relationships
                .insert(position, removed);
            self.registrate()
                .expect("rollback restores a previously valid schema");
            return Err(error);
        }

        let class_name = self.class(class)?.name.clone();
        self.schema_events.emit(&SchemaEvent::ClassChanged {
            class,
            name: class_name,
            change: ClassChange::RelationshipsList,
            detail: SmolStr::new(name),
        });
        Ok(())
    }

    fn mutate_relationship<T: Clone + 'static, U: Fn(&Relationship) -> T, V: Fn(&mut Relationship, T) + Copy + 'static>(
        &mut self,
        class: ClassId,
        name: &str,
        change: ClassChange,
        read: U,
        write: V,
    ) -> Result<impl FnOnce(&mut Kernel, T) -> Result<()> + use<T, U, V>> {
        let position = self
            .class(class)?
            .direct_relationships
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| self.no_direct_relationship(class, name))?;
        let old = read(&self.class(class)?.direct_relationships[position]);
        let detail = SmolStr::new(name);
        Ok(move |kernel: &mut Kernel, new: T| {
            let rollback = old.clone();
            kernel.mutate_class(
                class,
                change,
                detail,
                move |c| {
                    write(&mut c.direct_relationships[position], new);
                    Ok(())
                },
                move |c| write(&mut c.direct_relationships[position], rollback),
            )
        })
    }

    pub fn rename_relationship(&mut self, class: ClassId, name: &str, new_name: &str) -> Result<()> {
        if name == new_name {
            return Ok(());
        }
        if new_name.is_empty() {
            return Err(OksError::schema("relationship name is empty"));
        }
        if self
            .class(class)?
            .find_direct_relationship(new_name)
            .is_some()
        {
            return Err(OksError::schema(format!(
                "class \"{}\" already has direct relationship \"{new_name}\"",
                self.class(class)?.name
            )));
        }
        let apply = self.mutate_relationship(
            class,
            name,
            ClassChange::RelationshipsList,
            |r| r.name.clone(),
            |r, value: SmolStr| r.name = value,
        )?;
        apply(self, SmolStr::new(new_name))
    }

    pub fn set_relationship_class_type(
        &mut self,
        class: ClassId,
        name: &str,
        class_type: &str,
    ) -> Result<()> {
        if class_type.is_empty() {
            return Err(OksError::schema("relationship class type is empty"));
        }
        let apply = self.mutate_relationship(
            class,
            name,
            ClassChange::RelationshipClassType,
            |r| r.class_type.clone(),
            |r, value: SmolStr| r.class_type = value,
        )?;
        apply(self, SmolStr::new(class_type))
    }

    pub fn set_relationship_low_cc(
        &mut self,
        class: ClassId,
        name: &str,
        low_cc: crate::schema::LowCardinality,
    ) -> Result<()> {
        let apply = self.mutate_relationship(
            class,
            name,
            ClassChange::RelationshipLowCc,
            |r| r.low_cc,
            |r, value| r.low_cc = value,
        )?;
        apply(self, low_cc)
    }

    pub fn set_relationship_high_cc(
        &mut self,
        class: ClassId,
        name: &str,
        high_cc: crate::schema::HighCardinality,
    ) -> Result<()> {
        let apply = self.mutate_relationship(
            class,
            name,
            ClassChange::RelationshipHighCc,
            |r| r.high_cc,
            |r, value| r.high_cc = value,
        )?;
        apply(self, high_cc)
    }

    pub fn set_relationship_composite(&mut self, class: ClassId, name: &str, v: bool) -> Result<()> {
        let apply = self.mutate_relationship(
            class,
            name,
            ClassChange::RelationshipComposite,
            |r| r.composite,
            |r, value| r.composite = value,
        )?;
        apply(self, v)
    }

    pub fn set_relationship_exclusive(&mut self, class: ClassId, name: &str, v: bool) -> Result<()> {
        let apply = self.mutate_relationship(
            class,
            name,
            ClassChange::RelationshipExclusive,
            |r| r.exclusive,
            |r, value| r.exclusive = value,
        )?;
        apply(self, v)
    }

    pub fn set_relationship_dependent(&mut self, class: ClassId, name: &str, v: bool) -> Result<()> {
        let apply = self.mutate_relationship(
            class,
            name,
            ClassChange::RelationshipDependent,
            |r| r.dependent,
            |r, value| r.dependent = value,
        )?;
        apply(self, v)
    }

    pub fn set_relationship_description(
        &mut self,
        class: ClassId,
        name: &str,
        description: &str,
    ) -> Result<()> {
        let apply = self.mutate_relationship(
            class,
            name,
            ClassChange::RelationshipDescription,
            |r| r.description.clone(),
            |r, value: String| r.description = value,
        )?;
        apply(self, description.to_string())
    }

    // ------------------------------------------------------------------
    // Methods
    // ------------------------------------------------------------------

    pub fn add_method(&mut self, class: ClassId, method: Method) -> Result<()> {
        let name = method.name.clone();
        if self.class(class)?.find_method(&name).is_some() {
            return Err(OksError::schema(format!(
                "class \"{}\" already has method \"{name}\"",
                self.class(class)?.name
            )));
        }
        self.mutate_class(
            class,
            ClassChange::MethodsList,
            name,
            move |c| {
                c.direct_methods.push(method);
                Ok(())
            },
            |_| {},
        )
    }

    pub fn remove_method(&mut self, class: ClassId, name: &str) -> Result<()> {
        let position = self
            .class(class)?
            .direct_methods
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| {
                OksError::schema(format!("class has no method \"{name}\""))
            })?;
        self.mutate_class(
            class,
            ClassChange::MethodsList,
            SmolStr::new(name),
            move |c| {
                c.direct_methods.remove(position);
                Ok(())
            },
            |_| {},
        )
    }

    // ------------------------------------------------------------------
    // The cache-rebuild pass
    // ------------------------------------------------------------------

    /// Rebuild every derived cache: transitive superclasses (ancestors
    /// first), transitive subclasses, flattened tables, layout offsets,
    /// resolved relationship targets and the bind-classes status. Object
    /// value vectors of classes whose layout changed are rebuilt slot by
    /// slot, converting where the declared type changed.
    pub(crate) fn registrate(&mut self) -> Result<()> {
        // snapshot old layouts for the reshape below
        let snapshots: FxHashMap<ClassId, LayoutSnapshot> = self
            .classes
            .iter()
            .map(|(id, c)| {
                (
                    id,
                    LayoutSnapshot {
                        attributes: c.all_attributes.clone(),
                        data_info: c.data_info.clone(),
                    },
                )
            })
            .collect();

        let (linearized, mut unresolved) = self.linearize_superclasses()?;

        // invert into transitive subclasses
        let mut subclasses: FxHashMap<ClassId, Vec<ClassId>> = FxHashMap::default();
        for (id, supers) in &linearized {
            for ancestor in supers {
                subclasses.entry(*ancestor).or_default().push(*id);
            }
        }

        // flattened tables + layout
        let mut flattened: FxHashMap<ClassId, (Vec<Attribute>, Vec<Relationship>)> =
            FxHashMap::default();
        for (id, class) in self.classes.iter() {
            let mut attributes = Vec::new();
            let mut relationships = Vec::new();
            let mut seen: FxHashSet<SmolStr> = FxHashSet::default();

            let lineage = linearized.get(&id).map(Vec::as_slice).unwrap_or(&[]);
            for source in lineage.iter().copied().chain(std::iter::once(id)) {
                let Some(source_class) = self.classes.get(source) else {
                    continue;
                };
                for attribute in &source_class.direct_attributes {
                    if !seen.insert(attribute.name.clone()) {
                        return Err(OksError::schema(format!(
                            "class \"{}\" has duplicated attribute or relationship \"{}\"",
                            class.name, attribute.name
                        )));
                    }
                    attributes.push(attribute.clone());
                }
                for relationship in &source_class.direct_relationships {
                    if !seen.insert(relationship.name.clone()) {
                        return Err(OksError::schema(format!(
                            "class \"{}\" has duplicated attribute or relationship \"{}\"",
                            class.name, relationship.name
                        )));
                    }
                    relationships.push(relationship.clone());
                }
            }
            flattened.insert(id, (attributes, relationships));
        }

        // apply, resolve relationship targets, rebuild the status
        let ids = self.classes.ids();
        for id in &ids {
            let (mut attributes, mut relationships) = flattened.remove(id).unwrap_or_default();
            let mut data_info = FxHashMap::default();
            for (offset, attribute) in attributes.iter_mut().enumerate() {
                data_info.insert(
                    attribute.name.clone(),
                    DataInfo {
                        offset,
                        is_relationship: false,
                    },
                );
            }
            let attribute_count = attributes.len();
            for (i, relationship) in relationships.iter_mut().enumerate() {
                relationship.target = self.class_index.get(&relationship.class_type).copied();
                data_info.insert(
                    relationship.name.clone(),
                    DataInfo {
                        offset: attribute_count + i,
                        is_relationship: true,
                    },
                );
            }

            let class_name;
            {
                let Ok(class) = self.class_mut(*id) else {
                    continue;
                };
                class_name = class.name.clone();
                for relationship in &mut class.direct_relationships {
                    relationship.target = None; // re-linked through the flattened table
                }
                class.all_super = linearized.get(id).cloned().unwrap_or_default();
                class.all_sub = subclasses.remove(id).unwrap_or_default();
                class.all_attributes = attributes;
                class.all_relationships = relationships;
                class.data_info = data_info;
            }

            for relationship in &self.class(*id)?.all_relationships {
                if relationship.target.is_none() {
                    unresolved.push(format!(
                        "cannot find class \"{}\" (the class type of relationship \"{}\" of class \"{}\")",
                        relationship.class_type, relationship.name, class_name
                    ));
                }
            }
        }

        unresolved.sort();
        unresolved.dedup();
        self.bind_classes_status = if unresolved.is_empty() {
            String::new()
        } else {
            let mut status = unresolved.join("\n");
            status.push('\n');
            status
        };

        self.reshape_objects(&snapshots)?;
        Ok(())
    }

    /// Ancestors-before-descendants linearization of each class's
    /// superclasses. Cycles are hard errors; a superclass that is not
    /// loaded is soft — the class flattens without it and a status
    /// line is reported.
    fn linearize_superclasses(
        &self,
    ) -> Result<(FxHashMap<ClassId, Vec<ClassId>>, Vec<String>)> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Unvisited,
            OnStack,
            Done,
        }

        let mut states: FxHashMap<ClassId, State> = FxHashMap::default();
        let mut linearized: FxHashMap<ClassId, Vec<ClassId>> = FxHashMap::default();
        let mut missing: Vec<String> = Vec::new();

        fn visit(
            kernel: &Kernel,
            id: ClassId,
            states: &mut FxHashMap<ClassId, State>,
            linearized: &mut FxHashMap<ClassId, Vec<ClassId>>,
            missing: &mut Vec<String>,
        ) -> Result<()> {
            match states.get(&id).copied().unwrap_or(State::Unvisited) {
                State::Done => return Ok(()),
                State::OnStack => {
                    return Err(OksError::schema(format!(
                        "circular inheritance involving class \"{}\"",
                        kernel.class(id).map(|c| c.name.clone()).unwrap_or_default()
                    )));
                }
                State::Unvisited => {}
            }
            states.insert(id, State::OnStack);

            let class = kernel.class(id)?;
            let mut order: Vec<ClassId> = Vec::new();
            for super_name in &class.super_class_names {
                let Some(super_id) = kernel.class_index.get(super_name).copied() else {
                    missing.push(format!(
                        "cannot find superclass \"{super_name}\" of class \"{}\"",
                        class.name
                    ));
                    continue;
                };
                visit(kernel, super_id, states, linearized, missing)?;
                for ancestor in linearized.get(&super_id).into_iter().flatten() {
                    if !order.contains(ancestor) {
                        order.push(*ancestor);
                    }
                }
                if !order.contains(&super_id) {
                    order.push(super_id);
                }
            }

            states.insert(id, State::Done);
            linearized.insert(id, order);
            Ok(())
        }

        for id in self.classes.ids() {
            visit(self, id, &mut states, &mut linearized, &mut missing)?;
        }
        Ok((linearized, missing))
    }

    /// Rebuild the value vectors of objects whose class layout changed,
    /// then rebuild the affected attribute indices.
    fn reshape_objects(&mut self, snapshots: &FxHashMap<ClassId, LayoutSnapshot>) -> Result<()> {
        let ids = self.classes.ids();
        for class_id in ids {
            let Some(snapshot) = snapshots.get(&class_id) else {
                continue;
            };
            let unchanged = {
                let class = self.class(class_id)?;
                class.all_attributes.len() == snapshot.attributes.len()
                    && class
                        .all_attributes
                        .iter()
                        .zip(&snapshot.attributes)
                        .all(|(a, b)| {
                            a.name == b.name
                                && a.data_type() == b.data_type()
                                && a.multi == b.multi
                                && a.range() == b.range()
                        })
                    && class.data_info == snapshot.data_info
            };
            if unchanged {
                continue;
            }

            let objects: Vec<ObjectIdAndValues> = {
                let class = self.class(class_id)?;
                class
                    .objects
                    .values()
                    .filter_map(|id| self.objects.get(*id).map(|o| (*id, o.values.clone())))
                    .collect()
            };

            for (object_id, old_values) in objects {
                let new_values = self.carry_values(class_id, snapshot, &old_values)?;
                if let Some(object) = self.objects.get_mut(object_id) {
                    object.values = new_values;
                }
            }

            self.rebuild_indices(class_id)?;
        }
        Ok(())
    }

    /// Map one object's values from an old layout onto the new one.
    fn carry_values(
        &self,
        class_id: ClassId,
        snapshot: &LayoutSnapshot,
        old_values: &[Value],
    ) -> Result<Vec<Value>> {
        let class = self.class(class_id)?;
        let mut values = Vec::with_capacity(class.value_slots());

        for attribute in &class.all_attributes {
            let carried = snapshot
                .data_info
                .get(&attribute.name)
                .filter(|info| !info.is_relationship)
                .and_then(|info| old_values.get(info.offset))
                .and_then(|old| {
                    old.convert(&attribute.conversion_target())
                        .map_err(|e| {
                            warn!(
                                "dropping value of attribute \"{}\" after schema change: {e}",
                                attribute.name
                            );
                            e
                        })
                        .ok()
                });
            match carried {
                Some(value) => values.push(value),
                None => values.push(attribute.init_data()?),
            }
        }
        for relationship in &class.all_relationships {
            let carried = snapshot
                .data_info
                .get(&relationship.name)
                .filter(|info| info.is_relationship)
                .and_then(|info| old_values.get(info.offset))
                .cloned();
            match carried {
                Some(value) => values.push(value),
                None => values.push(Value::null_relationship(relationship.is_multi())),
            }
        }
        Ok(values)
    }

    /// Re-derive every index of a class from its objects.
    pub(crate) fn rebuild_indices(&mut self, class_id: ClassId) -> Result<()> {
        let index_names: Vec<SmolStr> = self
            .class(class_id)?
            .indices
            .keys()
            .cloned()
            .collect();
        if index_names.is_empty() {
            return Ok(());
        }

        for name in index_names {
            let Some(info) = self.class(class_id)?.data_info(&name) else {
                // the indexed attribute is gone with the schema change
                self.class_mut(class_id)?.indices.remove(&name);
                continue;
            };
            let mut index = AttributeIndex::new(name.clone(), info.offset);
            let members: Vec<_> = self.class(class_id)?.objects.values().copied().collect();
            for object_id in members {
                if let Some(value) = self
                    .objects
                    .get(object_id)
                    .and_then(|o| o.values.get(info.offset))
                {
                    index.insert(value, object_id);
                }
            }
            self.class_mut(class_id)?.indices.insert(name, index);
        }
        Ok(())
    }
}

type ObjectIdAndValues = (crate::object::ObjectId, Vec<Value>);
