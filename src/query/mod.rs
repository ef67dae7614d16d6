//! Queries over the object graph.
//!
//! A predicate [`Query`] is a tree of attribute comparators,
//! relationship traversals with some/all quantifiers and logical
//! not/and/or, executed against one class and optionally its whole
//! inheritance cone. A [`QueryPath`] is the other query form: the list
//! of objects connecting a start object to a goal object through named
//! relationships.

mod execute;
mod path;

#[cfg(test)]
mod tests;

pub use path::{PathExpression, QueryPath};

use std::fmt;

use once_cell::sync::OnceCell;
use regex::Regex;
use smol_str::SmolStr;

use crate::error::{OksError, Result};
use crate::value::Value;

/// Comparator operators of a predicate query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    /// `~`: the comparator's value is a regular expression matched
    /// against the attribute's text.
    RegExp,
    LessOrEqual,
    GreaterOrEqual,
    Less,
    Greater,
}

impl CompareOp {
    pub fn token(self) -> &'static str {
        match self {
            CompareOp::Equal => "=",
            CompareOp::NotEqual => "!=",
            CompareOp::RegExp => "~=",
            CompareOp::LessOrEqual => "<=",
            CompareOp::GreaterOrEqual => ">=",
            CompareOp::Less => "<",
            CompareOp::Greater => ">",
        }
    }
}

/// An attribute comparator. `attribute = None` compares the object id.
///
/// For [`CompareOp::RegExp`] the pattern compiles lazily on first use
/// and stays cached until the comparator's value changes.
#[derive(Debug)]
pub struct Comparator {
    attribute: Option<SmolStr>,
    value: Value,
    op: CompareOp,
    regex: OnceCell<Regex>,
}

impl Comparator {
    pub fn new(attribute: impl Into<SmolStr>, value: Value, op: CompareOp) -> Comparator {
        Comparator {
            attribute: Some(attribute.into()),
            value,
            op,
            regex: OnceCell::new(),
        }
    }

    /// Compare the object id instead of an attribute.
    pub fn object_id(value: Value, op: CompareOp) -> Comparator {
        Comparator {
            attribute: None,
            value,
            op,
            regex: OnceCell::new(),
        }
    }

    pub fn attribute(&self) -> Option<&SmolStr> {
        self.attribute.as_ref()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    /// Replace the compared value; drops the cached pattern.
    pub fn set_value(&mut self, value: Value) {
        self.value = value;
        self.regex = OnceCell::new();
    }

    /// The compiled pattern for `~` comparators; compiled at most once
    /// per value.
    pub(crate) fn compiled_regex(&self) -> Result<&Regex> {
        self.regex.get_or_try_init(|| {
            let pattern = self.value.as_text();
            Regex::new(&pattern).map_err(|e| OksError::BadRegex {
                pattern,
                reason: e.to_string(),
            })
        })
    }
}

/// A predicate query expression.
#[derive(Debug)]
pub enum QueryExpr {
    Comparator(Comparator),
    /// Recurse through the named relationship. With `all = true` every
    /// referenced object must satisfy the nested expression; otherwise
    /// one is enough.
    Relationship {
        name: SmolStr,
        all: bool,
        expr: Box<QueryExpr>,
    },
    Not(Box<QueryExpr>),
    And(Vec<QueryExpr>),
    Or(Vec<QueryExpr>),
}

impl QueryExpr {
    /// Structural validity: and/or take at least two operands, every
    /// leaf is complete.
    pub fn check_syntax(&self) -> Result<()> {
        match self {
            QueryExpr::Comparator(_) => Ok(()),
            QueryExpr::Relationship { expr, .. } | QueryExpr::Not(expr) => expr.check_syntax(),
            QueryExpr::And(exprs) | QueryExpr::Or(exprs) => {
                if exprs.len() < 2 {
                    return Err(OksError::schema(format!(
                        "cannot execute {} for {} argument, two or more are required",
                        if matches!(self, QueryExpr::And(_)) { "'and'" } else { "'or'" },
                        exprs.len()
                    )));
                }
                exprs.iter().try_for_each(QueryExpr::check_syntax)
            }
        }
    }
}

/// A predicate query: expression plus the subclass switch.
#[derive(Debug)]
pub struct Query {
    pub search_subclasses: bool,
    pub expr: QueryExpr,
}

impl Query {
    pub fn new(search_subclasses: bool, expr: QueryExpr) -> Query {
        Query {
            search_subclasses,
            expr,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attribute {
            Some(name) => write!(f, "(\"{name}\" {} {})", self.value, self.op.token()),
            None => write!(f, "(object-id {} {})", self.value, self.op.token()),
        }
    }
}

impl fmt::Display for QueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryExpr::Comparator(c) => c.fmt(f),
            QueryExpr::Relationship { name, all, expr } => {
                write!(
                    f,
                    "(\"{name}\" {} {expr})",
                    if *all { "all" } else { "some" }
                )
            }
            QueryExpr::Not(expr) => write!(f, "(not {expr})"),
            QueryExpr::And(exprs) | QueryExpr::Or(exprs) => {
                write!(
                    f,
                    "({}",
                    if matches!(self, QueryExpr::And(_)) { "and" } else { "or" }
                )?;
                for expr in exprs {
                    write!(f, " {expr}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} {})",
            if self.search_subclasses {
                "all-subclasses"
            } else {
                "this-class"
            },
            self.expr
        )
    }
}
