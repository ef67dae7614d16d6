//! The object store.
//!
//! An object is `(class, id)` plus a contiguous value vector laid out by
//! its class (attributes first, then relationships) and the list of
//! reverse composite references pointing back at composite parents.
//! Objects live in the kernel's arena; every create/write/rename/destroy
//! entry point is on [`crate::kernel::Kernel`], which owns the identity
//! tables and emits notifications.

mod index;

#[cfg(test)]
mod tests;

pub use index::AttributeIndex;

use smol_str::SmolStr;

use crate::define_arena_id;
use crate::file::FileId;
use crate::schema::ClassId;
use crate::value::Value;

define_arena_id!(
    /// Handle of an object in the kernel's object arena.
    ObjectId
);

/// Reverse composite reference: one entry per composite forward edge
/// pointing at this object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rcr {
    pub parent: ObjectId,
    pub relationship: SmolStr,
}

/// One stored object.
#[derive(Debug, Clone)]
pub struct Obj {
    pub(crate) class: ClassId,
    pub(crate) id: SmolStr,
    /// Values in the class's layout order.
    pub(crate) values: Vec<Value>,
    /// Reverse composite references.
    pub(crate) rcrs: Vec<Rcr>,
    /// Owning data file.
    pub(crate) file: FileId,
    /// Set when the id was auto-generated to resolve a duplicate.
    pub(crate) duplicated_index: Option<u32>,
}

impl Obj {
    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn id(&self) -> &SmolStr {
        &self.id
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Constant-time slot read through a layout offset.
    pub fn value_at(&self, offset: usize) -> Option<&Value> {
        self.values.get(offset)
    }

    /// Composite parents of this object.
    pub fn reverse_composite_rels(&self) -> &[Rcr] {
        &self.rcrs
    }

    /// True iff at least one composite parent references this object.
    pub fn is_composite_parented(&self) -> bool {
        !self.rcrs.is_empty()
    }

    pub fn is_duplicated(&self) -> bool {
        self.duplicated_index.is_some()
    }

    pub(crate) fn add_rcr(&mut self, parent: ObjectId, relationship: &SmolStr) {
        if !self
            .rcrs
            .iter()
            .any(|r| r.parent == parent && &r.relationship == relationship)
        {
            self.rcrs.push(Rcr {
                parent,
                relationship: relationship.clone(),
            });
        }
    }

    pub(crate) fn remove_rcr(&mut self, parent: ObjectId, relationship: &SmolStr) {
        self.rcrs
            .retain(|r| !(r.parent == parent && &r.relationship == relationship));
    }
}
