//! The bind pass.
//!
//! Multi-file loads leave relationship values as deferred uids; the
//! bind pass walks every object, substitutes resolved references where
//! the target is now loaded, and accumulates a status string for the
//! rest. Nothing here throws: later loads are expected to resolve the
//! residue, and `get_bind_objects_status` reports what is left.

use std::fmt::Write;

use smol_str::SmolStr;

use crate::object::ObjectId;
use crate::schema::ClassId;
use crate::value::Value;

use super::Kernel;

/// What one deferred uid turned into.
enum Resolution {
    /// Target found and castable.
    Bound(ObjectId),
    /// Target object (or its class) is not loaded.
    Unresolved,
    /// Target found but its class is not castable to the declared one.
    WrongClass(ObjectId),
}

impl Kernel {
    /// Resolve deferred uids against the class-scoped object tables and
    /// rebuild the bind-objects status.
    pub fn bind_objects(&mut self) {
        let mut status = String::new();

        for object in self.objects.ids() {
            let Some((class, object_id)) = self
                .objects
                .get(object)
                .map(|o| (o.class, o.id.clone()))
            else {
                continue;
            };
            let Some(relationships) = self.classes.get(class).map(|c| {
                let base = c.all_attributes.len();
                c.all_relationships
                    .iter()
                    .enumerate()
                    .map(|(i, r)| (base + i, r.clone()))
                    .collect::<Vec<_>>()
            }) else {
                continue;
            };
            let class_name = self
                .classes
                .get(class)
                .map(|c| c.name.clone())
                .unwrap_or_default();

            for (offset, relationship) in relationships {
                let Some(slot) = self.objects.get(object).and_then(|o| o.values.get(offset))
                else {
                    continue;
                };

                // collect the replacements first, then apply
                enum Patch {
                    Single(Value),
                    Element(usize, Value),
                }
                let mut patches: Vec<Patch> = Vec::new();
                let mut new_rcrs: Vec<ObjectId> = Vec::new();

                let resolve_one = |kernel: &Kernel,
                                       value: &Value,
                                       status: &mut String|
                 -> Option<(Value, Option<ObjectId>)> {
                    let (target_class, target_id) = match value {
                        Value::Uid { class, id } => (Some(*class), id.clone()),
                        Value::Uid2 { class, id } => (kernel.find_class(class), id.clone()),
                        _ => return None,
                    };
                    match kernel.resolve_uid(target_class, &target_id, relationship.target) {
                        Resolution::Bound(found) => {
                            Some((Value::ObjectRef(found), Some(found)))
                        }
                        Resolution::WrongClass(found) => {
                            let _ = writeln!(
                                status,
                                "the class of object \"{}\" is not derived from class \"{}\" of relationship \"{}\" of object \"{}@{}\"",
                                kernel.describe_object(found),
                                relationship.class_type,
                                relationship.name,
                                object_id,
                                class_name,
                            );
                            None
                        }
                        Resolution::Unresolved => {
                            let _ = writeln!(
                                status,
                                "cannot find object \"{}@{}\" referenced by relationship \"{}\" of object \"{}@{}\"",
                                target_id,
                                value_class_name(kernel, value),
                                relationship.name,
                                object_id,
                                class_name,
                            );
                            None
                        }
                    }
                };

                match slot {
                    Value::List(items) => {
                        for (i, item) in items.iter().enumerate() {
                            if let Some((replacement, bound)) = resolve_one(self, item, &mut status)
                            {
                                patches.push(Patch::Element(i, replacement));
                                if let Some(bound) = bound {
                                    new_rcrs.push(bound);
                                }
                            }
                        }
                    }
                    single => {
                        if let Some((replacement, bound)) = resolve_one(self, single, &mut status) {
                            patches.push(Patch::Single(replacement));
                            if let Some(bound) = bound {
                                new_rcrs.push(bound);
                            }
                        }
                    }
                }

                if patches.is_empty() {
                    continue;
                }
                if let Some(o) = self.objects.get_mut(object) {
                    if let Some(slot) = o.values.get_mut(offset) {
                        for patch in patches {
                            match (patch, &mut *slot) {
                                (Patch::Single(value), slot) => *slot = value,
                                (Patch::Element(i, value), Value::List(items)) => {
                                    if let Some(element) = items.get_mut(i) {
                                        *element = value;
                                    }
                                }
                                _ => {}
                            }
                        }
                    }
                }
                if relationship.maintains_rcr() {
                    for child in new_rcrs {
                        if let Some(child_object) = self.objects.get_mut(child) {
                            child_object.add_rcr(object, &relationship.name);
                        }
                    }
                }
            }
        }

        self.bind_objects_status = status;
    }

    fn resolve_uid(
        &self,
        target_class: Option<ClassId>,
        id: &str,
        declared: Option<ClassId>,
    ) -> Resolution {
        let Some(target_class) = target_class else {
            return Resolution::Unresolved;
        };
        let Some(found) = self.find_object(target_class, id, true) else {
            return Resolution::Unresolved;
        };
        let found_class = match self.objects.get(found) {
            Some(o) => o.class,
            None => return Resolution::Unresolved,
        };
        match declared {
            Some(declared) if !self.is_castable(found_class, declared) => {
                Resolution::WrongClass(found)
            }
            _ => Resolution::Bound(found),
        }
    }

    pub(crate) fn describe_object(&self, object: ObjectId) -> String {
        match self.objects.get(object) {
            Some(o) => {
                let class = self
                    .classes
                    .get(o.class)
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                format!("{}@{class}", o.id)
            }
            None => "(dangling)".to_string(),
        }
    }
}

fn value_class_name(kernel: &Kernel, value: &Value) -> SmolStr {
    match value {
        Value::Uid { class, .. } => kernel
            .classes
            .get(*class)
            .map(|c| c.name.clone())
            .unwrap_or_default(),
        Value::Uid2 { class, .. } => class.clone(),
        _ => SmolStr::default(),
    }
}
