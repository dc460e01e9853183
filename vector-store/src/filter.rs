//! Typed metadata filters and their rendering to boolean expressions.
//!
//! Backends that speak a textual filter language use the [`Display`]
//! rendering (`field == "value" and other in [1, 2]`); string literals are
//! escaped there, so callers never splice raw values into expressions.
//! In-process backends evaluate the typed form with [`FilterExpr::matches`].

use crate::document::{Metadata, VectorDocument};
use crate::error::{Result, VectorStoreError};
use crate::validate::is_identifier;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Caller-supplied equality filters, keyed by field name.
pub type Filters = BTreeMap<String, Value>;

/// Field holding the source document id on every row.
pub const DOC_ID_FIELD: &str = "doc_id";

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FilterValue {
    fn from_json(field: &str, value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(FilterValue::Str(s.clone())),
            Value::Bool(b) => Ok(FilterValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(FilterValue::Int(i)),
                None => n.as_f64().map(FilterValue::Float).ok_or_else(|| {
                    VectorStoreError::Validation(format!("unsupported number for '{field}'"))
                }),
            },
            Value::Null | Value::Array(_) | Value::Object(_) => Err(VectorStoreError::Validation(
                format!("filter '{field}' must be a string, number, or boolean"),
            )),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (FilterValue::Str(expected), Value::String(actual)) => expected == actual,
            (FilterValue::Bool(expected), Value::Bool(actual)) => expected == actual,
            (FilterValue::Int(expected), Value::Number(actual)) => match actual.as_i64() {
                Some(actual) => *expected == actual,
                None => actual.as_f64() == Some(*expected as f64),
            },
            (FilterValue::Float(expected), Value::Number(actual)) => {
                actual.as_f64() == Some(*expected)
            }
            _ => false,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Str(s) => write!(f, "\"{}\"", escape_str(s)),
            FilterValue::Int(i) => write!(f, "{i}"),
            FilterValue::Float(x) => write!(f, "{x:?}"),
            FilterValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Eq { field: String, value: FilterValue },
    In { field: String, values: Vec<FilterValue> },
    And(Vec<FilterExpr>),
}

impl FilterExpr {
    /// Build a conjunction from caller filters. Scalars become equality
    /// tests and arrays become membership tests. Returns `None` for an
    /// empty filter map.
    pub fn from_filters(filters: &Filters) -> Result<Option<Self>> {
        let mut clauses = Vec::with_capacity(filters.len());
        for (field, value) in filters {
            if !is_identifier(field) {
                return Err(VectorStoreError::Validation(format!(
                    "invalid filter field '{field}'"
                )));
            }
            let clause = match value {
                Value::Array(items) => {
                    if items.is_empty() {
                        return Err(VectorStoreError::Validation(format!(
                            "filter '{field}' has an empty value list"
                        )));
                    }
                    let values = items
                        .iter()
                        .map(|item| FilterValue::from_json(field, item))
                        .collect::<Result<Vec<_>>>()?;
                    FilterExpr::In {
                        field: field.clone(),
                        values,
                    }
                }
                scalar => FilterExpr::Eq {
                    field: field.clone(),
                    value: FilterValue::from_json(field, scalar)?,
                },
            };
            clauses.push(clause);
        }

        Ok(match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(FilterExpr::And(clauses)),
        })
    }

    /// `doc_id == "<id>"`
    pub fn doc_id_eq(doc_id: &str) -> Self {
        FilterExpr::Eq {
            field: DOC_ID_FIELD.to_string(),
            value: FilterValue::Str(doc_id.to_string()),
        }
    }

    /// `doc_id in ["<id>", ...]`
    pub fn doc_ids_in<S: AsRef<str>>(doc_ids: &[S]) -> Self {
        FilterExpr::In {
            field: DOC_ID_FIELD.to_string(),
            values: doc_ids
                .iter()
                .map(|id| FilterValue::Str(id.as_ref().to_string()))
                .collect(),
        }
    }

    /// Evaluate against a record, resolving field names through `lookup`.
    pub fn matches<F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<Value>,
    {
        match self {
            FilterExpr::Eq { field, value } => lookup(field).is_some_and(|v| value.matches(&v)),
            FilterExpr::In { field, values } => {
                lookup(field).is_some_and(|v| values.iter().any(|value| value.matches(&v)))
            }
            FilterExpr::And(clauses) => clauses.iter().all(|clause| clause.matches(lookup)),
        }
    }

    /// Evaluate against a stored row. `id` and `doc_id` resolve to the row's
    /// own columns; everything else is looked up in its metadata.
    pub fn matches_document(&self, document: &VectorDocument) -> bool {
        self.matches(&|field: &str| match field {
            "id" => Some(Value::String(document.id.clone())),
            DOC_ID_FIELD => Some(Value::String(document.doc_id.clone())),
            other => document.metadata.get(other).cloned(),
        })
    }

    /// Evaluate against an id plus metadata map.
    pub fn matches_metadata(&self, id: &str, metadata: &Metadata) -> bool {
        self.matches(&|field: &str| match field {
            "id" => Some(Value::String(id.to_string())),
            other => metadata.get(other).cloned(),
        })
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Eq { field, value } => write!(f, "{field} == {value}"),
            FilterExpr::In { field, values } => {
                let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{field} in [{}]", rendered.join(", "))
            }
            FilterExpr::And(clauses) => {
                let rendered: Vec<String> = clauses
                    .iter()
                    .map(|clause| match clause {
                        FilterExpr::And(_) => format!("({clause})"),
                        _ => clause.to_string(),
                    })
                    .collect();
                write!(f, "{}", rendered.join(" and "))
            }
        }
    }
}

/// Escape a string for use inside a double-quoted filter literal.
pub fn escape_str(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}
