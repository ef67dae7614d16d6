//! UML-style range expressions.
//!
//! A range is a comma-separated list of terms, each a literal, an
//! interval `low..high`, a half-open `*..high` / `low..*`, or `*`. A
//! term containing `*..*` (or a lone `*`) makes the whole range accept
//! anything, so parsing returns no spec at all. For string attributes
//! the entire range text is one regular expression. Enumeration ranges
//! are not parsed here; they are the attribute's ordered label list.

use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::error::{OksError, Result};

use super::{parse_token, Kind, Value};

/// A parsed, checkable range.
#[derive(Debug, Clone)]
pub struct RangeSpec {
    /// The original range text, kept for diagnostics.
    text: String,
    /// `*..x` terms: value must be <= x.
    less: Vec<Value>,
    /// `x..*` terms: value must be >= x.
    greater: Vec<Value>,
    /// plain literals: value must be equal.
    equal: Vec<Value>,
    /// `low..high` terms, both bounds inclusive.
    intervals: Vec<(Value, Value)>,
    /// string ranges: one regular expression over the whole text.
    like: Option<Regex>,
}

fn is_star(token: &str) -> bool {
    token == "*"
}

impl RangeSpec {
    /// Parse a range for an attribute of the given kind. Returns
    /// `None` when the range accepts every value (empty text or a `*`
    /// term).
    pub fn parse(range: &str, kind: Kind, enumerators: &[Arc<str>]) -> Result<Option<RangeSpec>> {
        if range.is_empty() {
            return Ok(None);
        }

        if kind == Kind::String {
            let like = Regex::new(range).map_err(|e| OksError::BadRegex {
                pattern: range.to_string(),
                reason: e.to_string(),
            })?;
            return Ok(Some(RangeSpec {
                text: range.to_string(),
                less: Vec::new(),
                greater: Vec::new(),
                equal: Vec::new(),
                intervals: Vec::new(),
                like: Some(like),
            }));
        }

        let mut spec = RangeSpec {
            text: range.to_string(),
            less: Vec::new(),
            greater: Vec::new(),
            equal: Vec::new(),
            intervals: Vec::new(),
            like: None,
        };

        for token in range.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if is_star(token) {
                debug!("range token '{token}' of '{range}' allows any value");
                return Ok(None);
            }

            let (low, high) = match token.find("..") {
                Some(p) => (&token[..p], Some(&token[p + 2..])),
                None => (token, None),
            };

            let plus_infinity = high.is_some_and(is_star);
            let minus_infinity = is_star(low);

            if minus_infinity && plus_infinity {
                debug!("range token '{token}' of '{range}' allows any value");
                return Ok(None);
            }

            match high {
                None => spec.equal.push(parse_token(low, kind, enumerators)?),
                Some(high) if minus_infinity => {
                    spec.less.push(parse_token(high, kind, enumerators)?);
                }
                Some(_) if plus_infinity => {
                    spec.greater.push(parse_token(low, kind, enumerators)?);
                }
                Some(high) => {
                    spec.intervals.push((
                        parse_token(low, kind, enumerators)?,
                        parse_token(high, kind, enumerators)?,
                    ));
                }
            }
        }

        Ok(Some(spec))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// True when the value satisfies at least one term. String ranges
    /// are skipped entirely when `skip_string_range` is set.
    pub fn contains(&self, value: &Value, skip_string_range: bool) -> bool {
        for bound in &self.less {
            if value.compare(bound).is_ok_and(|o| o.is_le()) {
                return true;
            }
        }
        for bound in &self.greater {
            if value.compare(bound).is_ok_and(|o| o.is_ge()) {
                return true;
            }
        }
        for literal in &self.equal {
            if value == literal {
                return true;
            }
        }
        for (low, high) in &self.intervals {
            if value.compare(low).is_ok_and(|o| o.is_ge())
                && value.compare(high).is_ok_and(|o| o.is_le())
            {
                return true;
            }
        }
        if let Some(like) = &self.like {
            if skip_string_range {
                return true;
            }
            if like.is_match(&value.as_text()) {
                return true;
            }
        }
        false
    }

    /// Check a value (each element of a list individually) against the
    /// range; *ValueRange* on violation.
    pub fn check(&self, value: &Value, skip_string_range: bool) -> Result<()> {
        match value {
            Value::List(items) => {
                for item in items {
                    self.check(item, skip_string_range)?;
                }
                Ok(())
            }
            single => {
                if self.contains(single, skip_string_range) {
                    Ok(())
                } else {
                    Err(OksError::value_range(single.as_text(), &self.text))
                }
            }
        }
    }
}
