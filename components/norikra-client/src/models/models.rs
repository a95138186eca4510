// External crates
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;

/// A single event record: field name to value, in insertion order.
///
/// Records carry no schema on the client side, any shape accepted by a codec
/// is a valid record.
pub type Record = Map<String, Value>;

/// An ordered chunk of records submitted to the server in one `send` call.
pub type Batch = Vec<Record>;

/// Query name to the events that query produced, as returned by `sweep`.
///
/// The map carries no meaningful iteration order, consumers impose their own.
pub type QueryResultSet = HashMap<String, Vec<TimedRecord>>;

/// An output event of a query, paired with its event time in epoch seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedRecord {
    pub timestamp: i64,
    pub record: Record,
}

impl TimedRecord {
    /// Pair a record with its event time.
    pub fn new(timestamp: i64, record: Record) -> Self {
        Self { timestamp, record }
    }
}

/// Target as reported by the server's `targets` call.
///
/// Older servers answer with bare target names, newer ones with a map per
/// target, both shapes deserialize into this struct.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "TargetRepr")]
pub struct TargetInfo {
    pub name: String,
    pub auto_field: Option<bool>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TargetRepr {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        auto_field: Option<bool>,
    },
}

impl From<TargetRepr> for TargetInfo {
    fn from(repr: TargetRepr) -> Self {
        match repr {
            TargetRepr::Name(name) => Self {
                name,
                auto_field: None,
            },
            TargetRepr::Detailed { name, auto_field } => Self { name, auto_field },
        }
    }
}

/// Field definition of a target, as reported by the server's `fields` call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub optional: Option<bool>,
}

/// Registered query, as reported by the server's `queries` call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryInfo {
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub targets: Vec<String>,
    pub expression: String,
}

/// A `name:type` field declaration given to `target open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: String,
}

impl FromStr for FieldDefinition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((name, field_type)) if !name.is_empty() && !field_type.is_empty() => Ok(Self {
                name: name.to_string(),
                field_type: field_type.to_string(),
            }),
            _ => Err(format!("invalid field definition '{s}', expected NAME:TYPE")),
        }
    }
}
