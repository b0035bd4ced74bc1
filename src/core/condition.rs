//! Declarative record filters.
//!
//! A [`ConditionSet`] is an OR over [`Condition`]s; a condition is an AND over
//! its fields. The `key` field understands `%` as a wildcard for exactly one
//! backslash-delimited path segment.

use crate::core::error::{PluginError, Result};
use crate::core::record::Record;
use serde_json::Value;

/// Field holding a hierarchical registry path.
pub const PATH_FIELD: &str = "key";
/// Matches exactly one path segment.
pub const WILDCARD: &str = "%";
pub const PATH_SEPARATOR: char = '\\';

/// Expected field values; every one must match. A field may appear more than
/// once after [`ConditionSet::combine`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition(Vec<(String, Value)>);

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, expected: impl Into<Value>) -> Self {
        self.0.push((field.to_string(), expected.into()));
        self
    }

    /// Parse the `--filter` syntax: `field=value[,field=value...]`.
    pub fn parse(filter: &str) -> Result<Self> {
        let mut condition = Condition::new();
        for pair in filter.split(',').filter(|p| !p.is_empty()) {
            let (field, value) = pair.split_once('=').ok_or_else(|| {
                PluginError::ConfigError(format!(
                    "filter '{}' must be written as field=value",
                    pair
                ))
            })?;
            if field.is_empty() {
                return Err(PluginError::ConfigError(format!(
                    "filter '{}' has an empty field name",
                    pair
                )));
            }
            condition.0.push((field.to_string(), Value::from(value)));
        }
        if condition.0.is_empty() {
            return Err(PluginError::ConfigError(format!(
                "filter '{}' names no fields",
                filter
            )));
        }
        Ok(condition)
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| match record.get(field) {
                Some(actual) => field_matches(field, expected, actual),
                None => false,
            })
    }

    /// AND two conditions together.
    fn merged(&self, other: &Condition) -> Condition {
        let mut fields = self.0.clone();
        fields.extend(other.0.iter().cloned());
        Condition(fields)
    }
}

/// Alternatives; an empty set matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionSet(Vec<Condition>);

impl ConditionSet {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.0
    }

    pub fn parse_filters<S: AsRef<str>>(filters: &[S]) -> Result<Self> {
        filters
            .iter()
            .map(|f| Condition::parse(f.as_ref()))
            .collect::<Result<Vec<_>>>()
            .map(ConditionSet)
    }

    /// Cross product of two sets: a record passes when it satisfies some
    /// condition of each.
    pub fn combine(&self, other: &ConditionSet) -> ConditionSet {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let mut combined = Vec::with_capacity(self.0.len() * other.0.len());
        for left in &self.0 {
            for right in &other.0 {
                combined.push(left.merged(right));
            }
        }
        ConditionSet(combined)
    }
}

impl From<Vec<Condition>> for ConditionSet {
    fn from(conditions: Vec<Condition>) -> Self {
        ConditionSet(conditions)
    }
}

impl FromIterator<Condition> for ConditionSet {
    fn from_iter<I: IntoIterator<Item = Condition>>(iter: I) -> Self {
        ConditionSet(iter.into_iter().collect())
    }
}

/// True when `record` satisfies at least one condition of `conditions`, or
/// when `conditions` is empty.
pub fn matches(record: &Record, conditions: &ConditionSet) -> bool {
    conditions.is_empty() || conditions.0.iter().any(|c| c.matches(record))
}

fn field_matches(field: &str, expected: &Value, actual: &Value) -> bool {
    if field == PATH_FIELD {
        if let (Value::String(pattern), Value::String(path)) = (expected, actual) {
            if has_wildcard_segment(pattern) {
                return path_matches(pattern, path);
            }
        }
    }
    expected == actual
}

fn has_wildcard_segment(pattern: &str) -> bool {
    pattern.split(PATH_SEPARATOR).any(|segment| segment == WILDCARD)
}

fn path_matches(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = pattern.split(PATH_SEPARATOR).collect();
    let path: Vec<&str> = path.split(PATH_SEPARATOR).collect();
    pattern.len() == path.len()
        && pattern
            .iter()
            .zip(&path)
            .all(|(want, got)| *want == WILDCARD || want == got)
}
