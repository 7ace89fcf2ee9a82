//! Field paths for the Json plugin
//!
//! A path walks into a JSON document: `.` descends into an object key and
//! `[n]` picks a zero-based array element. Indices chain (`x5c[0][1]`) and
//! keys containing special characters are written inside double quotes:
//!
//! ```text
//! env.production[0].field
//! production.keys[1].x5c[0][1][0]."with space"[3]
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// One traversal step
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    Key(String),
    Index(usize),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Key(key) => write!(f, "{}", key),
            Step::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// A parsed path, keeping the text it was parsed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    steps: Vec<Step>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self> {
        let fail = |reason: &str| Error::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let mut steps = Vec::new();
        let mut rest = path;
        // true at the start and right after a '.'
        let mut need_key = true;

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('[') {
                if need_key && !steps.is_empty() {
                    return Err(fail("expected a key after '.'"));
                }
                let end = after.find(']').ok_or_else(|| fail("unterminated '['"))?;
                let index = after[..end]
                    .parse::<usize>()
                    .map_err(|_| fail("array index must be a non-negative integer"))?;
                steps.push(Step::Index(index));
                rest = &after[end + 1..];
                need_key = false;
            } else if let Some(after) = rest.strip_prefix('.') {
                if need_key {
                    return Err(fail("empty key"));
                }
                rest = after;
                need_key = true;
            } else if need_key {
                if let Some(after) = rest.strip_prefix('"') {
                    let end = after.find('"').ok_or_else(|| fail("unterminated quoted key"))?;
                    steps.push(Step::Key(after[..end].to_string()));
                    rest = &after[end + 1..];
                } else {
                    let end = rest.find(|c| c == '.' || c == '[').unwrap_or(rest.len());
                    let key = &rest[..end];
                    if key.contains('"') || key.contains(']') {
                        return Err(fail("special characters in a key need double quotes"));
                    }
                    steps.push(Step::Key(key.to_string()));
                    rest = &rest[end..];
                }
                need_key = false;
            } else {
                return Err(fail("expected '.' or '[' after a quoted key or index"));
            }
        }

        if steps.is_empty() {
            return Err(fail("path is empty"));
        }
        if need_key {
            return Err(fail("path ends with '.'"));
        }

        Ok(Self {
            raw: path.to_string(),
            steps,
        })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for JsonPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        JsonPath::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
