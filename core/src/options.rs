//! Keyword options and their per-operation allow-lists.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ApiError;
use crate::params::{IndexedList, ParamValue};

/// Options accepted by `core_course_duplicate_course`.
pub const DUPLICATE_OPTIONS: &[&str] = &[
    "activities",
    "blocks",
    "filters",
    "users",
    "role_assignments",
    "comments",
    "usercompletion",
    "logs",
    "grade_histories",
];

/// Options accepted by `core_course_import_course`.
pub const IMPORT_OPTIONS: &[&str] = &["activities", "blocks", "filters"];

/// Optional per-course fields accepted by `core_course_create_courses`.
pub const COURSE_CREATE_OPTIONS: &[&str] = &[
    "idnumber",
    "summary",
    "summaryformat",
    "format",
    "showgrades",
    "newsitems",
    "startdate",
    "enddate",
    "maxbytes",
    "showreports",
    "visible",
    "groupmode",
    "groupmodeforce",
    "defaultgroupingid",
    "lang",
    "forcetheme",
    "enablecompletion",
    "completionnotify",
];

/// Optional per-category fields accepted by `core_course_create_categories`.
pub const CATEGORY_CREATE_OPTIONS: &[&str] =
    &["parent", "idnumber", "description", "descriptionformat", "theme"];

/// Caller-supplied keyword options for a single operation.
///
/// Iteration is ordered by option name, which fixes the index each option
/// receives on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet(BTreeMap<String, ParamValue>);

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fail with every name not present in `allowed`.
    pub fn validate(&self, operation: &'static str, allowed: &[&str]) -> Result<(), ApiError> {
        validate(operation, self.names(), allowed)
    }

    /// Fail on the first option whose value is not an on/off flag. `Bool`
    /// and the integers `0` / `1` are accepted.
    pub fn validate_flags(&self, operation: &'static str) -> Result<(), ApiError> {
        for (name, value) in self.iter() {
            match value {
                ParamValue::Bool(_) | ParamValue::Int(0 | 1) => {}
                other => {
                    tracing::warn!(operation, name, value = %other, "rejecting non-flag option value");
                    return Err(ApiError::InvalidOptionValue {
                        operation,
                        name: name.to_string(),
                        value: other.to_wire(),
                    });
                }
            }
        }
        Ok(())
    }

    /// `prefix[i][name]` / `prefix[i][value]` pairs, one per option.
    pub fn to_named_list(&self, prefix: &str) -> IndexedList {
        self.iter().fold(IndexedList::new(prefix), |list, (name, value)| {
            list.push_fields(vec![
                ("name".to_string(), ParamValue::from(name)),
                ("value".to_string(), value.clone()),
            ])
        })
    }

    /// Options as `(field, value)` pairs, for merging into a single list item.
    pub fn to_fields(&self) -> Vec<(String, ParamValue)> {
        self.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for OptionSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Compute `supplied - allowed`. A non-empty difference is an error carrying
/// exactly the unrecognised names.
pub fn validate<'a>(
    operation: &'static str,
    supplied: impl IntoIterator<Item = &'a str>,
    allowed: &[&str],
) -> Result<(), ApiError> {
    let unknown: BTreeSet<String> = supplied
        .into_iter()
        .filter(|name| !allowed.contains(name))
        .map(str::to_string)
        .collect();

    if unknown.is_empty() {
        return Ok(());
    }
    tracing::warn!(operation, ?unknown, "rejecting unsupported options");
    Err(ApiError::UnsupportedOption { operation, unknown })
}
