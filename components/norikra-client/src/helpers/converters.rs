//! Conversions between wire values of the MessagePack-RPC protocol and the
//! client's internal types.
//!
//! Outbound conversions are total. Inbound conversions fail with
//! [`RpcError::Protocol`] when the server answers with an unexpected shape.

// Local crates
use crate::models::models::{FieldDefinition, QueryResultSet, Record, TimedRecord};
use crate::rpc::service::RpcError;

// External crates
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Field declarations of `target open` -> `{name: type, ...}`, or nil when
/// no field was declared.
pub fn field_definitions_to_value(fields: &[FieldDefinition]) -> Value {
    if fields.is_empty() {
        return Value::Null;
    }

    let map: Map<String, Value> = fields
        .iter()
        .map(|f| (f.name.clone(), Value::String(f.field_type.clone())))
        .collect();
    Value::Object(map)
}

/// Deserialize a call result into a list, treating nil as an empty list.
pub fn value_to_list<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, RpcError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value).map_err(|e| RpcError::Protocol(e.to_string()))
}

/// `[time, {field: value, ...}]` -> [`TimedRecord`]
///
/// Event times may arrive as floats, they are truncated to whole seconds.
impl TryFrom<Value> for TimedRecord {
    type Error = RpcError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Array(mut pair) = value else {
            return Err(RpcError::Protocol(
                "event entry is not a [time, event] pair".to_string(),
            ));
        };
        if pair.len() != 2 {
            return Err(RpcError::Protocol(format!(
                "event entry has {} elements, expected 2",
                pair.len()
            )));
        }

        let record = match pair.pop() {
            Some(Value::Object(record)) => record,
            Some(Value::Null) => Record::new(),
            _ => return Err(RpcError::Protocol("event body is not a map".to_string())),
        };
        let timestamp = match pair.pop() {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .ok_or_else(|| RpcError::Protocol(format!("event time {n} is not an integer")))?,
            _ => return Err(RpcError::Protocol("event time is not a number".to_string())),
        };

        Ok(TimedRecord { timestamp, record })
    }
}

/// `[[time, event], ...]` -> `Vec<TimedRecord>`, nil meaning no events.
pub fn value_to_timed_records(value: Value) -> Result<Vec<TimedRecord>, RpcError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(entries) => entries.into_iter().map(TimedRecord::try_from).collect(),
        _ => Err(RpcError::Protocol(
            "event list is not an array".to_string(),
        )),
    }
}

/// `{query_name: [[time, event], ...], ...}` -> [`QueryResultSet`]
pub fn value_to_result_set(value: Value) -> Result<QueryResultSet, RpcError> {
    match value {
        Value::Null => Ok(QueryResultSet::new()),
        Value::Object(map) => map
            .into_iter()
            .map(|(name, events)| Ok((name, value_to_timed_records(events)?)))
            .collect(),
        _ => Err(RpcError::Protocol(
            "sweep result is not a map of query names".to_string(),
        )),
    }
}
