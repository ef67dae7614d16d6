//! Attribute indices.
//!
//! A sorted multimap `value → objects` over one attribute of one class.
//! Queries whose top-level shape is a comparator — or a conjunction or
//! disjunction of two comparators on the same attribute — are answered
//! from the index instead of scanning the class's objects.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;

use smol_str::SmolStr;

use crate::query::CompareOp;
use crate::value::Value;

use super::ObjectId;

/// Total-order wrapper: values in one index share the attribute's kind,
/// so [`Value::compare`] applies; the kind tag breaks ties for the
/// impossible mixed case instead of panicking.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IndexKey(pub(crate) Value);

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.0.compare(&other.0) {
            Ok(ordering) => ordering,
            Err(_) => {
                let a = &self.0;
                let b = &other.0;
                match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => x.total_cmp(&y),
                    _ => a
                        .type_name()
                        .cmp(b.type_name())
                        .then_with(|| a.as_text().cmp(&b.as_text())),
                }
            }
        }
    }
}

/// The sorted index of one (class, attribute) pair.
#[derive(Debug, Clone)]
pub struct AttributeIndex {
    pub(crate) attribute: SmolStr,
    /// Layout offset of the indexed attribute.
    pub(crate) offset: usize,
    map: BTreeMap<IndexKey, Vec<ObjectId>>,
}

impl AttributeIndex {
    pub(crate) fn new(attribute: SmolStr, offset: usize) -> Self {
        Self {
            attribute,
            offset,
            map: BTreeMap::new(),
        }
    }

    pub fn attribute(&self) -> &SmolStr {
        &self.attribute
    }

    pub fn len(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub(crate) fn insert(&mut self, value: &Value, object: ObjectId) {
        self.map
            .entry(IndexKey(value.clone()))
            .or_default()
            .push(object);
    }

    pub(crate) fn remove(&mut self, value: &Value, object: ObjectId) {
        let key = IndexKey(value.clone());
        if let Some(objects) = self.map.get_mut(&key) {
            objects.retain(|o| *o != object);
            if objects.is_empty() {
                self.map.remove(&key);
            }
        }
    }

    fn matches(op: CompareOp, ordering: Ordering) -> bool {
        match op {
            CompareOp::Equal => ordering == Ordering::Equal,
            CompareOp::NotEqual => ordering != Ordering::Equal,
            CompareOp::Less => ordering == Ordering::Less,
            CompareOp::LessOrEqual => ordering != Ordering::Greater,
            CompareOp::Greater => ordering == Ordering::Greater,
            CompareOp::GreaterOrEqual => ordering != Ordering::Less,
            CompareOp::RegExp => false,
        }
    }

    /// Can this operator be answered from a sorted index?
    pub(crate) fn supports(op: CompareOp) -> bool {
        !matches!(op, CompareOp::RegExp)
    }

    /// All objects whose indexed value satisfies `op value`.
    pub(crate) fn find_all(&self, value: &Value, op: CompareOp) -> Vec<ObjectId> {
        let key = IndexKey(value.clone());
        let mut out = Vec::new();
        match op {
            CompareOp::Equal => {
                if let Some(objects) = self.map.get(&key) {
                    out.extend_from_slice(objects);
                }
            }
            CompareOp::Less => {
                for (_, objects) in self.map.range((Bound::Unbounded, Bound::Excluded(key))) {
                    out.extend_from_slice(objects);
                }
            }
            CompareOp::LessOrEqual => {
                for (_, objects) in self.map.range((Bound::Unbounded, Bound::Included(key))) {
                    out.extend_from_slice(objects);
                }
            }
            CompareOp::Greater => {
                for (_, objects) in self.map.range((Bound::Excluded(key), Bound::Unbounded)) {
                    out.extend_from_slice(objects);
                }
            }
            CompareOp::GreaterOrEqual => {
                for (_, objects) in self.map.range((Bound::Included(key), Bound::Unbounded)) {
                    out.extend_from_slice(objects);
                }
            }
            CompareOp::NotEqual => {
                for (k, objects) in &self.map {
                    if *k != key {
                        out.extend_from_slice(objects);
                    }
                }
            }
            CompareOp::RegExp => {}
        }
        out
    }

    /// Objects satisfying the conjunction (`and = true`) or disjunction
    /// of two constraints on this index's attribute. Walks the sorted
    /// keys once, never the objects.
    pub(crate) fn find_all_two(
        &self,
        and: bool,
        value1: &Value,
        op1: CompareOp,
        value2: &Value,
        op2: CompareOp,
    ) -> Vec<ObjectId> {
        let key1 = IndexKey(value1.clone());
        let key2 = IndexKey(value2.clone());
        let mut out = Vec::new();
        for (key, objects) in &self.map {
            let first = Self::matches(op1, key.cmp(&key1));
            let second = Self::matches(op2, key.cmp(&key2));
            let selected = if and { first && second } else { first || second };
            if selected {
                out.extend_from_slice(objects);
            }
        }
        out
    }
}
