//! Moodle's indexed-array parameter convention.
//!
//! # Design
//! The REST endpoint only understands a flat string-to-string mapping, so
//! structured arguments are flattened into keys of the form
//! `prefix[index][field]` (or `prefix[index]` for scalar list elements).
//! `encode` builds the operation-specific part of the map. Session defaults
//! are merged afterwards with `ParamMap::merge_defaults` so they always win
//! on key collision.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A single scalar argument before it is rendered for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl ParamValue {
    /// Wire representation. Booleans become `0` / `1`.
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", u8::from(*b)),
            ParamValue::Int(n) => write!(f, "{n}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<u64> for ParamValue {
    // Moodle ids fit comfortably in i64; anything larger is sent verbatim.
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(n) => ParamValue::Int(n),
            Err(_) => ParamValue::Text(value.to_string()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// One element of an indexed list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListItem {
    /// Rendered as `prefix[index]`.
    Scalar(ParamValue),
    /// Rendered as one `prefix[index][field]` key per field.
    Fields(Vec<(String, ParamValue)>),
}

/// A named list flattened with zero-based contiguous indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedList {
    pub prefix: String,
    pub items: Vec<ListItem>,
}

impl IndexedList {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            items: Vec::new(),
        }
    }

    pub fn scalars<I, V>(prefix: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        Self {
            prefix: prefix.to_string(),
            items: values.into_iter().map(|v| ListItem::Scalar(v.into())).collect(),
        }
    }

    pub fn push_fields(mut self, fields: Vec<(String, ParamValue)>) -> Self {
        self.items.push(ListItem::Fields(fields));
        self
    }
}

/// The flat parameter mapping handed to the transport.
///
/// Keys are kept sorted so the wire order is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParamMap(BTreeMap<String, String>);

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into().to_wire());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Overlay `defaults` on top of this map. Existing keys are overwritten.
    pub fn merge_defaults(&mut self, defaults: &ParamMap) {
        for (k, v) in &defaults.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

/// Flatten `base` and every list in `lists` into a single `ParamMap`.
///
/// `base` is applied first, then lists in order. Later keys overwrite
/// earlier ones.
pub fn encode(base: &[(String, ParamValue)], lists: &[IndexedList]) -> ParamMap {
    let mut map = ParamMap::new();
    for (key, value) in base {
        map.insert(key.as_str(), value.clone());
    }
    for list in lists {
        for (index, item) in list.items.iter().enumerate() {
            match item {
                ListItem::Scalar(value) => {
                    map.insert(format!("{}[{index}]", list.prefix), value.clone());
                }
                ListItem::Fields(fields) => {
                    for (field, value) in fields {
                        map.insert(format!("{}[{index}][{field}]", list.prefix), value.clone());
                    }
                }
            }
        }
    }
    map
}
