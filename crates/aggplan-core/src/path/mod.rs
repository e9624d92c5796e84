//! Bucket paths: dotted references from a pipeline to the value produced by
//! another aggregation, relative to the pipeline's position in the tree.
//!
//! Grammar:
//! - elements are separated by `.` or `>` (never inside a bracket key);
//! - an element is a name, optionally followed by one `[key]` qualifier;
//! - `_count` and `_key` are reserved terminals and never name a nested
//!   aggregation.

mod resolve;


use std::fmt;
use thiserror::Error as ThisError;

// re-exports
pub(crate) use resolve::{Head, resolve_head};
pub use resolve::{Resolution, resolve, resolve_within};

/// Terminal meaning "this aggregation's document count".
pub const COUNT_TERMINAL: &str = "_count";

/// Terminal meaning "this bucket's key".
pub const KEY_TERMINAL: &str = "_key";

///
/// PathError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum PathError {
    #[error("invalid bucket path [{path}]: {reason}")]
    Malformed { path: String, reason: String },

    #[error("{}", render_unresolved(.path, .element))]
    Unresolved {
        path: String,
        element: Option<String>,
    },
}

impl PathError {
    fn malformed(path: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// The raw path this error refers to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Malformed { path, .. } | Self::Unresolved { path, .. } => path,
        }
    }
}

fn render_unresolved(path: &str, element: &Option<String>) -> String {
    match element {
        Some(element) => format!("No aggregation [{element}] found for path [{path}]"),
        None => format!("No aggregation found for path [{path}]"),
    }
}

///
/// PathElement
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathElement {
    name: String,
    key: Option<String>,
}

impl PathElement {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// `_count`, or `_key` in any letter case.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.name == COUNT_TERMINAL || self.name.eq_ignore_ascii_case(KEY_TERMINAL)
    }
}

///
/// BucketPath
///
/// A parsed bucket path; keeps the raw text for error reporting.
/// Always holds at least one element.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BucketPath {
    raw: String,
    elements: Vec<PathElement>,
}

impl BucketPath {
    /// Parse a bucket path. Pure; fails on any syntax it cannot split
    /// into well-formed elements.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::malformed(raw, "path is empty"));
        }

        let mut elements = Vec::new();
        let mut start = 0;
        let mut in_key = false;

        for (idx, ch) in raw.char_indices() {
            match ch {
                '[' if in_key => return Err(PathError::malformed(raw, "nested '[' in key")),
                '[' => in_key = true,
                ']' if !in_key => return Err(PathError::malformed(raw, "unbalanced ']'")),
                ']' => in_key = false,
                '.' | '>' if !in_key => {
                    elements.push(parse_element(raw, &raw[start..idx])?);
                    start = idx + ch.len_utf8();
                }
                _ => {}
            }
        }

        if in_key {
            return Err(PathError::malformed(raw, "unclosed '['"));
        }
        elements.push(parse_element(raw, &raw[start..])?);

        Ok(Self {
            raw: raw.to_string(),
            elements,
        })
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    #[must_use]
    pub fn first(&self) -> &PathElement {
        &self.elements[0]
    }

    /// The whole path is exactly `_count` or `_key`: the value of the
    /// current bucket, with no reference to another aggregation.
    #[must_use]
    pub fn is_bare_terminal(&self) -> bool {
        self.raw == COUNT_TERMINAL || self.raw == KEY_TERMINAL
    }
}

impl fmt::Display for BucketPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// One element: `name` or `name[key]`; brackets were balanced by the caller.
fn parse_element(raw: &str, text: &str) -> Result<PathElement, PathError> {
    if text.is_empty() {
        return Err(PathError::malformed(raw, "empty path element"));
    }

    let Some(open) = text.find('[') else {
        return Ok(PathElement {
            name: text.to_string(),
            key: None,
        });
    };

    if open == 0 {
        return Err(PathError::malformed(
            raw,
            format!("element [{text}] has a key but no name"),
        ));
    }
    if !text.ends_with(']') {
        return Err(PathError::malformed(
            raw,
            format!("element [{text}] has characters after its key"),
        ));
    }

    let key = &text[open + 1..text.len() - 1];
    if key.is_empty() || key.contains(['[', ']']) {
        return Err(PathError::malformed(
            raw,
            format!("element [{text}] has an invalid key"),
        ));
    }

    Ok(PathElement {
        name: text[..open].to_string(),
        key: Some(key.to_string()),
    })
}
