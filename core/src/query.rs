//! Query parameters understood by InoCore list endpoints.
//!
//! # Design
//! Structured values are flattened into bracketed keys the way PHP parses
//! them back into nested arrays: the `i`-th filter becomes
//! `filter[i][property]`, `filter[i][expression]` and `filter[i][value]`.
//! Sequence order is wire order, so filter conjunction order and sort
//! precedence survive the trip. Percent-encoding happens later, when the pairs
//! are attached to the request URL.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sort direction for a `sort` entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// One conjunctive filter condition, e.g. `id eq 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub property: String,
    pub expression: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub property: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Query parameters for a single call.
///
/// Deserializes from the JSON object shape the API documents
/// (`{"filter": [...], "sort": [...], "limit": 10}`); keys other than the four
/// recognized ones are kept in `extra` and passed through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    #[serde(rename = "filter", default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    #[serde(rename = "sort", default, skip_serializing_if = "Vec::is_empty")]
    pub sorts: Vec<Sort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(
        mut self,
        property: impl Into<String>,
        expression: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push(Filter {
            property: property.into(),
            expression: expression.into(),
            value: value.into(),
        });
        self
    }

    pub fn sort(mut self, property: impl Into<String>, direction: SortDirection) -> Self {
        self.sorts.push(Sort {
            property: property.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Pass an arbitrary key through. Arrays become repeated indexed entries.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
            && self.sorts.is_empty()
            && self.limit.is_none()
            && self.offset.is_none()
            && !self.extra.values().any(has_scalar)
    }

    /// Flatten into decoded `(key, value)` pairs in wire order.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();

        for (i, filter) in self.filters.iter().enumerate() {
            pairs.push((format!("filter[{i}][property]"), filter.property.clone()));
            pairs.push((format!("filter[{i}][expression]"), filter.expression.clone()));
            flatten_into(&mut pairs, format!("filter[{i}][value]"), &filter.value);
        }

        for (i, sort) in self.sorts.iter().enumerate() {
            pairs.push((format!("sort[{i}][property]"), sort.property.clone()));
            pairs.push((format!("sort[{i}][direction]"), sort.direction.as_str().to_string()));
        }

        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }

        for (key, value) in &self.extra {
            flatten_into(&mut pairs, key.clone(), value);
        }

        pairs
    }
}

impl TryFrom<Value> for QueryParams {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
    }
}

fn flatten_into(pairs: &mut Vec<(String, String)>, key: String, value: &Value) {
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_into(pairs, format!("{key}[{i}]"), item);
            }
        }
        Value::Object(map) => {
            for (field, item) in map {
                flatten_into(pairs, format!("{key}[{field}]"), item);
            }
        }
        scalar => pairs.push((key, render_scalar(scalar))),
    }
}

/// Whether flattening `value` emits at least one pair.
fn has_scalar(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().any(has_scalar),
        Value::Object(map) => map.values().any(has_scalar),
        _ => true,
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
