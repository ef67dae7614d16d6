//! Predicate query execution.
//!
//! A query runs over one class — and, on request, its whole
//! inheritance cone. When the top-level shape is a comparator on an
//! indexed attribute, or a two-comparator conjunction/disjunction on
//! the same indexed attribute, the index answers instead of a scan.
//! An unresolved reference met while recursing aborts the query.

use std::cmp::Ordering;

use crate::error::{OksError, Result};
use crate::object::{AttributeIndex, ObjectId};
use crate::schema::{ClassId, HighCardinality};
use crate::value::Value;

use super::{CompareOp, Comparator, Query, QueryExpr};

use crate::kernel::Kernel;

impl Kernel {
    /// Execute a query against a class.
    pub fn execute_query(&self, class: ClassId, query: &Query) -> Result<Vec<ObjectId>> {
        query.expr.check_syntax()?;

        let mut out: Vec<ObjectId> = Vec::new();
        let c = self.class(class)?;

        if !c.objects.is_empty() {
            let mut indexed = false;

            match &query.expr {
                QueryExpr::Comparator(comparator) => {
                    if let Some(attribute) = comparator.attribute() {
                        if let Some(index) = c.indices.get(attribute) {
                            if AttributeIndex::supports(comparator.op()) {
                                out.extend(index.find_all(comparator.value(), comparator.op()));
                                indexed = true;
                            }
                        }
                    }
                }
                QueryExpr::And(operands) | QueryExpr::Or(operands) => {
                    if let [QueryExpr::Comparator(first), QueryExpr::Comparator(second)] =
                        operands.as_slice()
                    {
                        let same_attribute = first.attribute().is_some()
                            && first.attribute() == second.attribute();
                        if same_attribute
                            && AttributeIndex::supports(first.op())
                            && AttributeIndex::supports(second.op())
                        {
                            if let Some(index) = first
                                .attribute()
                                .and_then(|attribute| c.indices.get(attribute))
                            {
                                out.extend(index.find_all_two(
                                    matches!(query.expr, QueryExpr::And(_)),
                                    first.value(),
                                    first.op(),
                                    second.value(),
                                    second.op(),
                                ));
                                indexed = true;
                            }
                        }
                    }
                }
                _ => {}
            }

            if !indexed {
                for object in c.objects.values() {
                    if self.satisfies_query(*object, &query.expr)? {
                        out.push(*object);
                    }
                }
            }
        }

        if query.search_subclasses {
            for sub in &c.all_sub {
                let Ok(sub_class) = self.class(*sub) else {
                    continue;
                };
                for object in sub_class.objects.values() {
                    if self.satisfies_query(*object, &query.expr)? {
                        out.push(*object);
                    }
                }
            }
        }

        Ok(out)
    }

    /// Check one object against a query expression.
    pub fn satisfies_query(&self, object: ObjectId, expr: &QueryExpr) -> Result<bool> {
        match expr {
            QueryExpr::Comparator(comparator) => self.apply_comparator(object, comparator),

            QueryExpr::Relationship { name, all, expr } => {
                let o = self.object(object)?;
                let class = self.class(o.class)?;
                let info = class.data_info(name).ok_or_else(|| {
                    OksError::schema(format!(
                        "class \"{}\" has no relationship \"{name}\"",
                        class.name
                    ))
                })?;
                let relationship = class.relationship_at(info.offset).ok_or_else(|| {
                    OksError::schema(format!("\"{name}\" is not a relationship"))
                })?;
                let slot = o.values.get(info.offset).ok_or_else(|| {
                    OksError::schema("value offset out of layout".to_string())
                })?;

                if relationship.high_cc == HighCardinality::Many {
                    let Value::List(items) = slot else {
                        return Ok(false);
                    };
                    if items.is_empty() {
                        return Ok(false);
                    }
                    for item in items {
                        let target = match item {
                            Value::ObjectRef(target) => Some(*target),
                            Value::Uid { class, id } => {
                                return Err(self.unresolved_in_query(name, class, id));
                            }
                            Value::Uid2 { class, id } => {
                                return Err(OksError::UnresolvedDuringQuery(format!(
                                    "object \"{id}@{class}\" referenced through multi-value relationship \"{name}\" is not loaded in memory"
                                )));
                            }
                            _ => None,
                        };
                        match (*all, target) {
                            (true, None) => return Ok(false),
                            (true, Some(target)) => {
                                if !self.satisfies_query(target, expr)? {
                                    return Ok(false);
                                }
                            }
                            (false, None) => {}
                            (false, Some(target)) => {
                                if self.satisfies_query(target, expr)? {
                                    return Ok(true);
                                }
                            }
                        }
                    }
                    Ok(*all)
                } else {
                    match slot {
                        Value::ObjectRef(target) => self.satisfies_query(*target, expr),
                        Value::Uid2Unset => Ok(false),
                        Value::Uid { class, id } => Err(self.unresolved_in_query(name, class, id)),
                        Value::Uid2 { class, id } => Err(OksError::UnresolvedDuringQuery(format!(
                            "object \"{id}@{class}\" referenced through single-value relationship \"{name}\" is not loaded in memory"
                        ))),
                        _ => Ok(false),
                    }
                }
            }

            QueryExpr::Not(inner) => Ok(!self.satisfies_query(object, inner)?),

            QueryExpr::And(operands) => {
                for operand in operands {
                    if !self.satisfies_query(object, operand)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }

            QueryExpr::Or(operands) => {
                for operand in operands {
                    if self.satisfies_query(object, operand)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    fn unresolved_in_query(
        &self,
        relationship: &str,
        class: &ClassId,
        id: &str,
    ) -> OksError {
        let class_name = self
            .classes
            .get(*class)
            .map(|c| c.name.as_str().to_string())
            .unwrap_or_default();
        OksError::UnresolvedDuringQuery(format!(
            "object \"{id}@{class_name}\" referenced through relationship \"{relationship}\" is not loaded in memory"
        ))
    }

    fn apply_comparator(&self, object: ObjectId, comparator: &Comparator) -> Result<bool> {
        let o = self.object(object)?;

        // compare the object id when no attribute is named
        let id_value;
        let left: &Value = match comparator.attribute() {
            None => {
                id_value = Value::String(o.id.as_str().to_string());
                &id_value
            }
            Some(name) => {
                let class = self.class(o.class)?;
                let info = class.data_info(name).ok_or_else(|| {
                    OksError::schema(format!(
                        "class \"{}\" has no attribute \"{name}\"",
                        class.name
                    ))
                })?;
                o.values.get(info.offset).ok_or_else(|| {
                    OksError::schema("value offset out of layout".to_string())
                })?
            }
        };

        match comparator.op() {
            CompareOp::RegExp => {
                let regex = comparator.compiled_regex()?;
                Ok(regex.is_match(&left.as_text()))
            }
            CompareOp::Equal => Ok(left == comparator.value()),
            CompareOp::NotEqual => Ok(left != comparator.value()),
            op => {
                let ordering = left.compare(comparator.value())?;
                Ok(match op {
                    CompareOp::Less => ordering == Ordering::Less,
                    CompareOp::LessOrEqual => ordering != Ordering::Greater,
                    CompareOp::Greater => ordering == Ordering::Greater,
                    CompareOp::GreaterOrEqual => ordering != Ordering::Less,
                    _ => false,
                })
            }
        }
    }
}
