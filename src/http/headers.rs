//! Parsed request headers.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    normalized: String,
    raw: String,
}

/// Header map keyed by lower-cased name.
///
/// Each value is kept twice: trimmed and lower-cased (what [`HeaderMap::get`]
/// returns) and trimmed with its original casing ([`HeaderMap::get_raw`]).
/// A repeated name replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    fields: HashMap<String, Field>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, normalizing the name and both value forms.
    pub fn insert(&mut self, name: &str, value: &str) {
        let raw = value.trim();
        self.fields.insert(
            name.trim().to_ascii_lowercase(),
            Field {
                normalized: raw.to_lowercase(),
                raw: raw.to_string(),
            },
        );
    }

    /// Lower-cased, trimmed value for `name` (any casing).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.normalized.as_str())
    }

    /// Trimmed value for `name` with its original casing.
    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.raw.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate `(name, normalized value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(k, f)| (k.as_str(), f.normalized.as_str()))
    }

    /// Iterate `(name, raw value)` pairs in no particular order.
    pub fn iter_raw(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, f)| (k.as_str(), f.raw.as_str()))
    }

    fn field(&self, name: &str) -> Option<&Field> {
        match self.fields.get(name) {
            Some(field) => Some(field),
            None => self.fields.get(&name.to_ascii_lowercase()),
        }
    }
}
