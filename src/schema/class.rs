//! Class nodes and their derived caches.
//!
//! A class owns its direct attributes, relationships and methods. The
//! flattened tables, the layout map and the inheritance caches are
//! derived state, rebuilt by the kernel on every schema mutation; the
//! value layout assigns attributes first, then relationships, each an
//! offset into every object's value vector.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::define_arena_id;
use crate::file::FileId;
use crate::object::{AttributeIndex, ObjectId};

use super::{Attribute, Method, Relationship};

define_arena_id!(
    /// Handle of a class in the kernel's class arena.
    ClassId
);

/// Offset of an attribute or relationship value inside the value vector
/// of a class's objects, resolved once by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataInfo {
    pub offset: usize,
    pub is_relationship: bool,
}

/// A schema class.
#[derive(Debug, Clone)]
pub struct Class {
    pub name: SmolStr,
    pub description: String,
    pub is_abstract: bool,
    /// Owning schema file.
    pub(crate) file: FileId,
    /// Direct superclasses, by name, in declaration order.
    pub(crate) super_class_names: Vec<SmolStr>,
    pub(crate) direct_attributes: Vec<Attribute>,
    pub(crate) direct_relationships: Vec<Relationship>,
    pub(crate) direct_methods: Vec<Method>,

    // ------------------------------------------------------------------
    // Derived caches, rebuilt on schema mutation
    // ------------------------------------------------------------------
    /// Transitive superclasses, ancestors before descendants.
    pub(crate) all_super: Vec<ClassId>,
    /// Transitive subclasses.
    pub(crate) all_sub: Vec<ClassId>,
    /// Flattened attribute table in inheritance order (owned copies).
    pub(crate) all_attributes: Vec<Attribute>,
    /// Flattened relationship table in inheritance order (owned copies).
    pub(crate) all_relationships: Vec<Relationship>,
    /// Name → value-vector offset over both flattened tables.
    pub(crate) data_info: FxHashMap<SmolStr, DataInfo>,
    /// Objects of this exact class, in insertion (file) order.
    pub(crate) objects: IndexMap<SmolStr, ObjectId>,
    /// Optional attribute indices, by attribute name.
    pub(crate) indices: FxHashMap<SmolStr, AttributeIndex>,
}

impl Class {
    pub(crate) fn new(name: SmolStr, file: FileId) -> Class {
        Class {
            name,
            description: String::new(),
            is_abstract: false,
            file,
            super_class_names: Vec::new(),
            direct_attributes: Vec::new(),
            direct_relationships: Vec::new(),
            direct_methods: Vec::new(),
            all_super: Vec::new(),
            all_sub: Vec::new(),
            all_attributes: Vec::new(),
            all_relationships: Vec::new(),
            data_info: FxHashMap::default(),
            objects: IndexMap::new(),
            indices: FxHashMap::default(),
        }
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn super_class_names(&self) -> &[SmolStr] {
        &self.super_class_names
    }

    pub fn direct_attributes(&self) -> &[Attribute] {
        &self.direct_attributes
    }

    pub fn direct_relationships(&self) -> &[Relationship] {
        &self.direct_relationships
    }

    pub fn direct_methods(&self) -> &[Method] {
        &self.direct_methods
    }

    /// Transitive superclasses, ancestors first.
    pub fn all_super_classes(&self) -> &[ClassId] {
        &self.all_super
    }

    /// Transitive subclasses.
    pub fn all_sub_classes(&self) -> &[ClassId] {
        &self.all_sub
    }

    /// Flattened attribute table, inheritance order.
    pub fn all_attributes(&self) -> &[Attribute] {
        &self.all_attributes
    }

    /// Flattened relationship table, inheritance order.
    pub fn all_relationships(&self) -> &[Relationship] {
        &self.all_relationships
    }

    /// Objects of this exact class, id → handle, in file order.
    pub fn objects(&self) -> &IndexMap<SmolStr, ObjectId> {
        &self.objects
    }

    /// Number of value slots per object of this class.
    pub fn value_slots(&self) -> usize {
        self.all_attributes.len() + self.all_relationships.len()
    }

    /// Constant-time layout lookup by name.
    pub fn data_info(&self, name: &str) -> Option<DataInfo> {
        self.data_info.get(name).copied()
    }

    /// Search the flattened attribute table.
    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        match self.data_info.get(name) {
            Some(info) if !info.is_relationship => self.all_attributes.get(info.offset),
            _ => None,
        }
    }

    /// Search the flattened relationship table.
    pub fn find_relationship(&self, name: &str) -> Option<&Relationship> {
        match self.data_info.get(name) {
            Some(info) if info.is_relationship => self
                .all_relationships
                .get(info.offset - self.all_attributes.len()),
            _ => None,
        }
    }

    pub fn find_direct_attribute(&self, name: &str) -> Option<&Attribute> {
        self.direct_attributes.iter().find(|a| a.name == name)
    }

    pub fn find_direct_relationship(&self, name: &str) -> Option<&Relationship> {
        self.direct_relationships.iter().find(|r| r.name == name)
    }

    pub fn find_method(&self, name: &str) -> Option<&Method> {
        self.direct_methods.iter().find(|m| m.name == name)
    }

    /// Relationship behind a layout offset, if the offset is one.
    pub(crate) fn relationship_at(&self, offset: usize) -> Option<&Relationship> {
        self.all_relationships
            .get(offset.checked_sub(self.all_attributes.len())?)
    }
}
