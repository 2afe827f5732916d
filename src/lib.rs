//! # csvdir
//!
//! Treats a directory of delimited text files as transient relational data. Every operation
//! opens a [`engine::Session`] that loads the relevant files into an embedded SQL engine,
//! runs synthesized or compiled statements against them, writes changes back and tears every
//! loaded table down again before returning.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub mod config;
pub mod connector;
pub mod engine;
pub mod mapping;
pub(crate) mod observability;
pub mod query;
pub mod secret;
pub mod storage;
pub mod value_cmp;

pub use config::CsvDirConfig;
pub use connector::{CsvDirConnector, SearchOptions, SyncDelta, SyncDeltaKind};
pub use query::filter::Filter;
pub use secret::GuardedString;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("could not open the query engine")]
    Connection(#[source] rusqlite::Error),
    #[error("session already closed")]
    SessionClosed,
    #[error("statement failed: {statement}")]
    Query {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("no record with identifier {0}")]
    NotFound(String),
    #[error("a record with identifier {0} already exists")]
    AlreadyExists(String),
    #[error("invalid identifier {uid:?}: {reason}")]
    InvalidIdentifier { uid: String, reason: String },
    #[error("attribute {name} cannot be written: {reason}")]
    InvalidAttribute { name: String, reason: String },
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("malformed source file {path:?}: {reason}")]
    MalformedSource { path: PathBuf, reason: String },
    #[error("IOError")]
    IOError(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Externally visible identifier of a record: the key column values joined with the key
/// separator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(pub String);

impl Uid {
    pub fn new(value: impl Into<String>) -> Self {
        Uid(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the identifier back into its key components.
    pub fn components<'a>(&'a self, separator: &'a str) -> Vec<&'a str> {
        split_key(&self.0, separator)
    }
}

impl Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Uid {
    fn from(value: &str) -> Self {
        Uid(value.to_string())
    }
}

impl From<String> for Uid {
    fn from(value: String) -> Self {
        Uid(value)
    }
}

/// Joins key values in key order. Values must not contain the separator.
pub fn join_key<S: AsRef<str>>(values: &[S], separator: &str) -> String {
    values
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Inverse of [`join_key`].
pub fn split_key<'a>(uid: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return vec![uid];
    }
    uid.split(separator).collect()
}

/// A single attribute value as seen by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Multi(Vec<String>),
    Bool(bool),
    Secret(GuardedString),
    Binary(Vec<u8>),
}

impl Value {
    /// Textual form of a value, first element for multivalues. `None` for binary and secret
    /// values which have no plain text rendering.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(text) => Some(text.clone()),
            Value::Multi(values) => values.first().cloned(),
            Value::Bool(flag) => Some(flag.to_string()),
            Value::Secret(_) | Value::Binary(_) => None,
        }
    }

    pub fn values(&self) -> Vec<String> {
        match self {
            Value::Multi(values) => values.clone(),
            other => other.as_text().into_iter().collect(),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::Multi(value)
    }
}

/// A named attribute handed in by the host. A `None` value is an explicit null.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<Value>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Attribute {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn null(name: impl Into<String>) -> Self {
        Attribute {
            name: name.into(),
            value: None,
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// One record as delivered to the host: identifier plus attributes by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub uid: Uid,
    attributes: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(uid: Uid) -> Self {
        Record {
            uid,
            attributes: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).or_else(|| {
            self.attributes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes.iter()
    }
}

/// Column name to textual value, the shape statements are synthesized from.
pub type AttributeMap = BTreeMap<String, String>;
