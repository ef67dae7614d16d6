//! Change notifications.
//!
//! Subscribers receive plain event records after the mutation is
//! committed; events never hand out kernel references, so a callback
//! cannot re-enter the kernel mid-mutation.

use smol_str::SmolStr;

use crate::object::ObjectId;

use super::ClassId;

/// Fine-grained kind of a class change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassChange {
    AttributesList,
    AttributeType,
    AttributeRange,
    AttributeFormat,
    AttributeMultiValueCardinality,
    AttributeInitValue,
    AttributeIsNoNull,
    AttributeDescription,
    RelationshipsList,
    RelationshipClassType,
    RelationshipLowCc,
    RelationshipHighCc,
    RelationshipComposite,
    RelationshipExclusive,
    RelationshipDependent,
    RelationshipDescription,
    SuperClassesList,
    MethodsList,
    IsAbstract,
    Description,
}

/// Schema graph notification.
#[derive(Debug, Clone)]
pub enum SchemaEvent {
    ClassCreated {
        class: ClassId,
        name: SmolStr,
    },
    ClassChanged {
        class: ClassId,
        name: SmolStr,
        change: ClassChange,
        /// Attribute/relationship/superclass name the change concerns.
        detail: SmolStr,
    },
    ClassDeleted {
        name: SmolStr,
    },
}

/// Object store notification.
#[derive(Debug, Clone)]
pub enum ObjectEvent {
    Created {
        object: ObjectId,
    },
    Changed {
        object: ObjectId,
    },
    Renamed {
        object: ObjectId,
        old_id: SmolStr,
        new_id: SmolStr,
    },
    Deleted {
        class: SmolStr,
        id: SmolStr,
    },
}

/// One coalesced batch of reload effects for a single class.
#[derive(Debug, Clone)]
pub struct ReloadBatch {
    pub class: SmolStr,
    pub created: Vec<ObjectId>,
    pub modified: Vec<ObjectId>,
    /// Ids of destroyed objects.
    pub removed: Vec<SmolStr>,
}

/// A list of subscriber callbacks for one event type.
pub struct EventEmitter<E> {
    subscribers: Vec<Box<dyn FnMut(&E) + Send>>,
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&E) + Send + 'static) {
        self.subscribers.push(Box::new(callback));
    }

    pub fn emit(&mut self, event: &E) {
        for subscriber in &mut self.subscribers {
            subscriber(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
