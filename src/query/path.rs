//! Path queries.
//!
//! A path query computes the list of objects between a start object
//! and a goal, walking only named relationships. Each level is a group
//! of relationship names with a flag: *direct* consumes exactly one
//! hop, *nested* searches through the named relationships to arbitrary
//! depth. The traversal keeps the current path as a revisit guard and
//! returns the first path found.
//!
//! The textual form mirrors the tree:
//!
//! ```text
//! (path-to "my-id@my-class" (direct "A" "B" (nested "N")))
//! ```
//!
//! A relationship name starting with `?` is optional: a class without
//! it is skipped instead of reported.

use std::fmt;

use smol_str::SmolStr;

use crate::error::{OksError, Result};
use crate::kernel::Kernel;
use crate::object::ObjectId;
use crate::value::Value;

/// One level of a path query.
#[derive(Debug, Clone)]
pub struct PathExpression {
    /// Search to arbitrary depth through the named relationships.
    pub nested: bool,
    pub rel_names: Vec<SmolStr>,
    pub next: Option<Box<PathExpression>>,
}

/// A path query: goal object plus the nested level chain.
#[derive(Debug, Clone)]
pub struct QueryPath {
    pub goal: ObjectId,
    pub start: PathExpression,
}

// ----------------------------------------------------------------------
// Parsing
// ----------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Token {
    Open,
    Close,
    Quoted(String),
    Word(String),
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            '"' => {
                let mut word = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => word.push(c),
                        None => {
                            return Err(OksError::schema(
                                "bad path query: unterminated string literal",
                            ));
                        }
                    }
                }
                tokens.push(Token::Quoted(word));
            }
            c if c.is_whitespace() => {}
            c => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || next == '(' || next == ')' {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: std::vec::IntoIter<Token>,
}

impl Parser {
    fn next(&mut self) -> Result<Token> {
        self.tokens
            .next()
            .ok_or_else(|| OksError::schema("bad path query: unexpected end of input"))
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        let found = self.next()?;
        if found != token {
            return Err(OksError::schema(format!(
                "bad path query: unexpected token {found:?}"
            )));
        }
        Ok(())
    }

    /// `(direct|nested "name"… (…)? )`
    fn expression(&mut self) -> Result<PathExpression> {
        self.expect(Token::Open)?;
        self.expression_body()
    }

    /// Level contents, the opening parenthesis already consumed.
    fn expression_body(&mut self) -> Result<PathExpression> {
        let nested = match self.next()? {
            Token::Word(word) if word == "direct" => false,
            Token::Word(word) if word == "nested" => true,
            other => {
                return Err(OksError::schema(format!(
                    "bad path query: expected direct or nested, found {other:?}"
                )));
            }
        };

        let mut rel_names = Vec::new();
        let mut next = None;
        loop {
            match self.next()? {
                Token::Quoted(name) => rel_names.push(SmolStr::new(name)),
                Token::Open => {
                    next = Some(Box::new(self.expression_body()?));
                    self.expect(Token::Close)?;
                    break;
                }
                Token::Close => break,
                other => {
                    return Err(OksError::schema(format!(
                        "bad path query: unexpected token {other:?}"
                    )));
                }
            }
        }

        if rel_names.is_empty() {
            return Err(OksError::schema(
                "bad path query: a level names at least one relationship",
            ));
        }
        Ok(PathExpression {
            nested,
            rel_names,
            next,
        })
    }
}

impl QueryPath {
    pub fn new(goal: ObjectId, start: PathExpression) -> QueryPath {
        QueryPath { goal, start }
    }

    /// Parse `(path-to "id@class" (…))`, resolving the goal object in
    /// the kernel.
    pub fn parse(text: &str, kernel: &Kernel) -> Result<QueryPath> {
        let mut parser = Parser {
            tokens: tokenize(text)?.into_iter(),
        };
        parser.expect(Token::Open)?;
        match parser.next()? {
            Token::Word(word) if word == "path-to" => {}
            other => {
                return Err(OksError::schema(format!(
                    "bad path query: expected path-to, found {other:?}"
                )));
            }
        }
        let reference = match parser.next()? {
            Token::Quoted(reference) => reference,
            other => {
                return Err(OksError::schema(format!(
                    "bad path query: expected \"id@class\", found {other:?}"
                )));
            }
        };
        let (id, class_name) = reference.split_once('@').ok_or_else(|| {
            OksError::schema(format!("bad path query: \"{reference}\" is not \"id@class\""))
        })?;
        let class = kernel
            .find_class(class_name)
            .ok_or_else(|| OksError::schema(format!("cannot find class \"{class_name}\"")))?;
        let goal = kernel.find_object(class, id, true).ok_or_else(|| {
            OksError::ReferenceError(format!("cannot find object \"{id}@{class_name}\""))
        })?;

        let start = parser.expression()?;
        parser.expect(Token::Close)?;
        Ok(QueryPath { goal, start })
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", if self.nested { "nested" } else { "direct" })?;
        for name in &self.rel_names {
            write!(f, " \"{name}\"")?;
        }
        if let Some(next) = &self.next {
            write!(f, " {next}")?;
        }
        write!(f, ")")
    }
}

// ----------------------------------------------------------------------
// Execution
// ----------------------------------------------------------------------

impl Kernel {
    /// The first path from `start` to the query's goal, inclusive of
    /// both ends, or `None` when no path exists.
    pub fn find_path(&self, start: ObjectId, query: &QueryPath) -> Option<Vec<ObjectId>> {
        let mut path = Vec::new();
        if self.path_satisfies(start, query.goal, &query.start, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn path_satisfies(
        &self,
        current: ObjectId,
        goal: ObjectId,
        expr: &PathExpression,
        path: &mut Vec<ObjectId>,
    ) -> bool {
        if path.contains(&current) {
            return false;
        }
        path.push(current);

        for name in &expr.rel_names {
            let (name, optional) = match name.strip_prefix('?') {
                Some(stripped) => (stripped, true),
                None => (name.as_str(), false),
            };

            let Some(slot) = self.relationship_slot(current, name) else {
                if !optional {
                    tracing::debug!(
                        "path query: {} has no relationship \"{name}\"",
                        self.describe_object(current)
                    );
                }
                continue;
            };

            let targets: Vec<ObjectId> = match &slot {
                Value::ObjectRef(target) => vec![*target],
                Value::List(items) => items
                    .iter()
                    .filter_map(|v| match v {
                        Value::ObjectRef(target) => Some(*target),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };

            // direct hit through this relationship group
            if targets.contains(&goal) {
                path.push(goal);
                return true;
            }

            match &expr.next {
                Some(next) => {
                    if expr.nested {
                        // either step to the next level here …
                        path.pop();
                        if self.path_satisfies(current, goal, next, path) {
                            return true;
                        }
                        path.push(current);
                        // … or go deeper through the same level
                        for target in &targets {
                            if self.path_satisfies(*target, goal, expr, path) {
                                return true;
                            }
                        }
                    } else {
                        for target in &targets {
                            if self.path_satisfies(*target, goal, next, path) {
                                return true;
                            }
                        }
                    }
                }
                None if expr.nested => {
                    // last level: keep searching through the same names
                    for target in &targets {
                        if self.path_satisfies(*target, goal, expr, path) {
                            return true;
                        }
                    }
                }
                None => {}
            }
        }

        path.pop();
        false
    }

    fn relationship_slot(&self, object: ObjectId, name: &str) -> Option<Value> {
        let o = self.objects.get(object)?;
        let class = self.classes.get(o.class)?;
        let info = class.data_info(name)?;
        if !info.is_relationship {
            return None;
        }
        o.values.get(info.offset).cloned()
    }
}
