pub mod mapper;
pub mod operators;
pub mod tags;
pub mod validator;

use crate::error::RepositoryError;
use chrono::NaiveDateTime;
use sea_orm::sea_query::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filter maps are ordered so that compiled statements (and therefore
/// cache keys) are deterministic for a given set of filters.
pub type FilterMap = BTreeMap<String, FilterValue>;

/// One `(key, value, author_id)` tuple of a tag filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagTriple {
    pub key: String,
    pub value: String,
    pub author_id: String,
}

impl TagTriple {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        author_id: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            author_id: author_id.into(),
        }
    }
}

/// Dynamic value carried by a filter key. Adapters deserialize these
/// straight out of request payloads; typed callers build them through the
/// `From` impls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    DateTime(NaiveDateTime),
    List(Vec<FilterValue>),
    Tags(Vec<TagTriple>),
}

impl FilterValue {
    pub fn is_list(&self) -> bool {
        matches!(self, FilterValue::List(_) | FilterValue::Tags(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FilterValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FilterValue::Int(i) if *i >= 0 => Some(*i as u64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FilterValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Short label for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FilterValue::Null => "null",
            FilterValue::Bool(_) => "bool",
            FilterValue::Int(_) => "int",
            FilterValue::Float(_) => "float",
            FilterValue::Str(_) => "string",
            FilterValue::DateTime(_) => "datetime",
            FilterValue::List(_) => "list",
            FilterValue::Tags(_) => "tags",
        }
    }

    /// Convert a scalar into a bindable SQL value. Lists and tag tuples
    /// never convert directly; the operators expand them themselves.
    pub fn to_sql_value(&self) -> Result<Value, RepositoryError> {
        match self {
            FilterValue::Null => Ok(Value::String(None)),
            FilterValue::Bool(b) => Ok((*b).into()),
            FilterValue::Int(i) => Ok((*i).into()),
            FilterValue::Float(f) => Ok((*f).into()),
            FilterValue::Str(s) => Ok(s.clone().into()),
            FilterValue::DateTime(dt) => Ok((*dt).into()),
            FilterValue::List(_) | FilterValue::Tags(_) => Err(
                RepositoryError::InvalidQuery(format!(
                    "a {} value cannot be bound as a scalar",
                    self.kind()
                )),
            ),
        }
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        FilterValue::Int(v as i64)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Int(v)
    }
}

impl From<u64> for FilterValue {
    fn from(v: u64) -> Self {
        FilterValue::Int(v as i64)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        FilterValue::Float(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Str(v.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Str(v)
    }
}

impl From<NaiveDateTime> for FilterValue {
    fn from(v: NaiveDateTime) -> Self {
        FilterValue::DateTime(v)
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => FilterValue::Null,
        }
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        FilterValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<TagTriple>> for FilterValue {
    fn from(v: Vec<TagTriple>) -> Self {
        FilterValue::Tags(v)
    }
}
