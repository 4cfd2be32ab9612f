//! Value types for the Vellum record store
//!
//! This module defines:
//! - Value: the unified enum for all field values, including links, lists
//!   and nested records
//! - ValueType: the *declared* shape of a field (list nesting over a base
//!   type), carried by field types in the schema registry
//!
//! ## Byte form
//!
//! Field values are stored and compared as their serialized bytes
//! (bincode). The index-filter snapshot carries these raw bytes, not the
//! logical value, so downstream consumers can compare without decoding.
//!
//! Different variants never compare equal, even when they hold the same
//! logical content: `Long(1) != String("1")`.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::id::Link;
use crate::record::Record;

/// A field value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    /// UTF-8 string
    String(String),
    /// 64-bit signed integer
    Long(i64),
    /// Boolean
    Bool(bool),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Link to another record
    Link(Link),
    /// Nested (id-less) record
    Record(Box<Record>),
    /// List of values
    List(Vec<Value>),
}

impl Value {
    /// Serialize this value to its stored byte form
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize a value from its stored byte form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// The name of this value's variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "String",
            Value::Long(_) => "Long",
            Value::Bool(_) => "Bool",
            Value::Bytes(_) => "Bytes",
            Value::Link(_) => "Link",
            Value::Record(_) => "Record",
            Value::List(_) => "List",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Link> for Value {
    fn from(l: Link) -> Self {
        Value::Link(l)
    }
}

/// Base type at the bottom of a declared value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseType {
    /// UTF-8 string
    String,
    /// 64-bit signed integer
    Long,
    /// Boolean
    Bool,
    /// Raw bytes
    Bytes,
    /// Link to another record
    Link,
    /// Nested record
    Record,
}

/// Declared shape of a field value: a base type wrapped in zero or more
/// list layers
///
/// The deepest base type governs link extraction: a field declared as
/// `List(List(Link))` still contributes links.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// A plain base type
    Base(BaseType),
    /// A list of a nested value type
    List(Box<ValueType>),
}

impl ValueType {
    /// A plain string field
    pub fn string() -> Self {
        ValueType::Base(BaseType::String)
    }

    /// A plain long field
    pub fn long() -> Self {
        ValueType::Base(BaseType::Long)
    }

    /// A plain bool field
    pub fn bool() -> Self {
        ValueType::Base(BaseType::Bool)
    }

    /// A plain bytes field
    pub fn bytes() -> Self {
        ValueType::Base(BaseType::Bytes)
    }

    /// A link field
    pub fn link() -> Self {
        ValueType::Base(BaseType::Link)
    }

    /// A nested-record field
    pub fn record() -> Self {
        ValueType::Base(BaseType::Record)
    }

    /// Wrap a value type in a list layer
    pub fn list_of(inner: ValueType) -> Self {
        ValueType::List(Box::new(inner))
    }

    /// Resolve the deepest base type through any list nesting
    pub fn base_type(&self) -> BaseType {
        match self {
            ValueType::Base(b) => *b,
            ValueType::List(inner) => inner.base_type(),
        }
    }
}
