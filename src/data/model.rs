use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

/// Reserved top-level key holding the file's scalar header entries.
pub const METADATA_KEY: &str = "METADATA";

// ---------------------------------------------------------------------------
// Record – the decoded save file
// ---------------------------------------------------------------------------

/// One node of the decoded tree: keys in the order they were first seen.
pub type Record = IndexMap<String, Value>;

/// A record value is either a raw string or another record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(String),
    Nested(Record),
}

impl Value {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::Nested(_) => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Nested(r) => Some(r),
            Value::Scalar(_) => None,
        }
    }

    /// An opened section that never received an entry.
    pub fn is_empty_record(&self) -> bool {
        matches!(self, Value::Nested(r) if r.is_empty())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(s.to_string())
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Nested(r)
    }
}

/// The `METADATA` map of a decoded record, if present.
pub fn metadata(record: &Record) -> Option<&Record> {
    record.get(METADATA_KEY).and_then(Value::as_record)
}

// ---------------------------------------------------------------------------
// SpectrumSeries – the P_<n> trace
// ---------------------------------------------------------------------------

/// Frequency / power pairs pulled out of a `P_<n>` section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumSeries {
    /// Frequency axis (x), in the file's own unit.
    pub frequencies: Vec<f64>,
    /// Power axis (y) – same length as `frequencies`.
    pub powers: Vec<f64>,
    /// Unit token written after the first frequency, e.g. `MHz`.
    pub frequency_unit: Option<String>,
}

impl SpectrumSeries {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

// ---------------------------------------------------------------------------
// MetadataValue – a typed metadata cell for export
// ---------------------------------------------------------------------------

/// Metadata strings re-typed for columnar output.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl MetadataValue {
    /// Pick the narrowest type the raw text parses as.
    pub fn guess(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return MetadataValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return MetadataValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return MetadataValue::Float(f);
        }
        match s {
            "true" => MetadataValue::Bool(true),
            "false" => MetadataValue::Bool(false),
            _ => MetadataValue::String(s.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => Ok(()),
        }
    }
}

impl Serialize for MetadataValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetadataValue::String(s) => serializer.serialize_str(s),
            MetadataValue::Integer(i) => serializer.serialize_i64(*i),
            MetadataValue::Float(v) => serializer.serialize_f64(*v),
            MetadataValue::Bool(b) => serializer.serialize_bool(*b),
            MetadataValue::Null => serializer.serialize_unit(),
        }
    }
}

/// One exported spectrum: the trace plus its typed metadata columns.
#[derive(Debug, Clone)]
pub struct Spectrum {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub metadata: BTreeMap<String, MetadataValue>,
}
