//! Label sets describing one Loki stream.
//!
//! Labels reach the exporter either as a serialized string
//! (`{job="api", level="error"}`, legacy API) or as a structured map (v1 API).
//! Both are normalized into the same [`LabelSet`] shape before they become
//! metric dimensions.

mod parser;

pub use parser::parse_label_set;

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur while building a label set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelParseError {
    /// A label pair has no `=` separator.
    #[error("Missing '=' separator in label pair '{0}'")]
    MissingSeparator(String),

    /// A label value is not a quoted string.
    #[error("Malformed label value in '{0}'")]
    MalformedValue(String),

    /// The opening and closing braces do not match.
    #[error("Unbalanced braces in label string '{0}'")]
    UnbalancedBraces(String),

    /// A label name is empty after normalization.
    #[error("Label name cannot be empty")]
    EmptyName,

    /// A label name is not a valid metric dimension identifier.
    #[error("Invalid label name: '{0}'")]
    InvalidName(String),

    /// The same label name occurs twice.
    #[error("Duplicate label name: '{0}'")]
    DuplicateName(String),
}

/// Ordered mapping from label name to label value.
///
/// Names are unique, non-empty and valid Prometheus label identifiers.
///
/// # Example
///
/// ```
/// use shared::labels::{parse_label_set, LabelSet};
///
/// let labels = parse_label_set(r#"{job="api", level="error"}"#).unwrap();
/// assert_eq!(labels.get("job"), Some("api"));
/// assert_eq!(labels.names().collect::<Vec<_>>(), vec!["job", "level"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    pairs: Vec<(String, String)>,
}

impl LabelSet {
    /// Creates an empty label set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a label set with a single label.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid label name.
    pub fn single(
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, LabelParseError> {
        let mut labels = Self::new();
        labels.try_insert(name.as_ref(), value.as_ref())?;
        Ok(labels)
    }

    /// Builds a label set from structured name/value pairs, applying the
    /// same normalization as the string parser.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is invalid or occurs twice after
    /// normalization.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, LabelParseError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut labels = Self::new();
        for (name, value) in pairs {
            labels.try_insert(name.as_ref(), value.as_ref())?;
        }
        Ok(labels)
    }

    /// Normalizes and appends a label.
    ///
    /// The name is trimmed, unquoted, and one leading and one trailing
    /// underscore are removed. The value is trimmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the normalized name is empty, not a valid label
    /// identifier, or already present.
    pub fn try_insert(&mut self, name: &str, value: &str) -> Result<(), LabelParseError> {
        let name = normalize_name(name);

        if name.is_empty() {
            return Err(LabelParseError::EmptyName);
        }
        if !is_valid_label_name(name) {
            return Err(LabelParseError::InvalidName(name.to_string()));
        }
        if self.get(name).is_some() {
            return Err(LabelParseError::DuplicateName(name.to_string()));
        }

        self.pairs.push((name.to_string(), value.trim().to_string()));
        Ok(())
    }

    /// Returns the value of a label.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the label names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(n, _)| n.as_str())
    }

    /// Returns the label values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(_, v)| v.as_str())
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if the set has no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl std::fmt::Display for LabelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value:?}")?;
        }
        f.write_str("}")
    }
}

/// Labels of one stream as delivered by Loki.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLabels {
    /// Serialized label string from the legacy API.
    Serialized(String),
    /// Structured label map from the v1 API.
    Structured(BTreeMap<String, String>),
}

impl StreamLabels {
    /// Converts the labels into a normalized [`LabelSet`].
    ///
    /// # Errors
    ///
    /// Returns an error if the serialized string is malformed or a label name
    /// is invalid.
    pub fn into_label_set(self) -> Result<LabelSet, LabelParseError> {
        match self {
            Self::Serialized(raw) => parse_label_set(&raw),
            Self::Structured(map) => LabelSet::from_pairs(map),
        }
    }
}

fn normalize_name(name: &str) -> &str {
    let name = name.trim();
    let name = name
        .strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .map_or(name, str::trim);
    let name = name.strip_prefix('_').unwrap_or(name);
    name.strip_suffix('_').unwrap_or(name)
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
