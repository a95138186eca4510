//! Per-line record codecs.
//!
//! Every event crossing the client is one line of text on stdin/stdout and one
//! [`Record`] in memory. [`Format`] selects how the two are mapped onto each
//! other:
//!
//! - [`Format::Json`]: one JSON object per line.
//! - [`Format::Ltsv`]: tab separated `label:value` fields per line.

// Local crates
use crate::models::models::Record;

// External crates
use clap::ValueEnum;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

/// Supported line formats for `event send`, `event fetch` and `event sweep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// One JSON object per line.
    #[default]
    Json,
    /// Labeled tab-separated values, `label:value` fields.
    Ltsv,
}

/// Codec errors
/// - `EmptyLine`, `InvalidUtf8` and `Malformed` are raised while decoding input lines.
/// - `Encode` only happens if a record cannot be rendered as text.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("empty line")]
    EmptyLine,
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
    #[error("malformed {format} line: {reason}")]
    Malformed { format: Format, reason: String },
    #[error("failed to encode record: {0}")]
    Encode(String),
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Json => f.write_str("json"),
            Format::Ltsv => f.write_str("ltsv"),
        }
    }
}

impl Format {
    /// Decode a single line of input into a [`Record`].
    ///
    /// Trailing line terminators are ignored. Blank lines are rejected so that
    /// a stray empty line never turns into an empty event on the server.
    #[instrument(
        name = "norikra_client_parser::decode",
        target = "parser::parser::Format",
        skip_all,
        level = "trace"
    )]
    pub fn decode(&self, line: &str) -> Result<Record, CodecError> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            return Err(CodecError::EmptyLine);
        }

        match self {
            Format::Json => decode_json(line),
            Format::Ltsv => decode_ltsv(line),
        }
    }

    /// Encode a [`Record`] as a single line of output, without terminator.
    pub fn encode(&self, record: &Record) -> Result<String, CodecError> {
        match self {
            Format::Json => {
                serde_json::to_string(record).map_err(|e| CodecError::Encode(e.to_string()))
            }
            Format::Ltsv => Ok(encode_ltsv(record)),
        }
    }
}

fn decode_json(line: &str) -> Result<Record, CodecError> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(other) => Err(CodecError::Malformed {
            format: Format::Json,
            reason: format!("expected a JSON object, found {}", json_kind(&other)),
        }),
        Err(e) => {
            tracing::debug!(error = %e, "Failed to decode JSON input line");
            Err(CodecError::Malformed {
                format: Format::Json,
                reason: e.to_string(),
            })
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn decode_ltsv(line: &str) -> Result<Record, CodecError> {
    let mut record = Record::new();

    for field in line.split('\t') {
        let Some((label, value)) = field.split_once(':') else {
            return Err(CodecError::Malformed {
                format: Format::Ltsv,
                reason: format!("field '{field}' has no ':' separator"),
            });
        };
        record.insert(label.to_string(), Value::String(unescape_ltsv(value)));
    }

    Ok(record)
}

fn encode_ltsv(record: &Record) -> String {
    record
        .iter()
        .map(|(label, value)| {
            let text = match value {
                Value::String(s) => escape_ltsv(s),
                other => escape_ltsv(&other.to_string()),
            };
            format!("{label}:{text}")
        })
        .collect::<Vec<_>>()
        .join("\t")
}

fn escape_ltsv(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\t' => escaped.push_str("\\t"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn unescape_ltsv(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => unescaped.push('\t'),
            Some('n') => unescaped.push('\n'),
            Some('r') => unescaped.push('\r'),
            Some('\\') => unescaped.push('\\'),
            // Unknown escapes are kept verbatim
            Some(other) => {
                unescaped.push('\\');
                unescaped.push(other);
            }
            None => unescaped.push('\\'),
        }
    }
    unescaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test records are objects"),
        }
    }

    #[test]
    fn json_decode_keeps_field_order() {
        let decoded = Format::Json
            .decode("{\"zeta\":1,\"alpha\":\"a\",\"mid\":null}\n")
            .unwrap();

        let keys: Vec<&str> = decoded.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn json_decode_rejects_non_objects() {
        let err = Format::Json.decode("[1,2,3]").unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn json_decode_rejects_broken_lines() {
        assert!(matches!(
            Format::Json.decode("{\"a\":"),
            Err(CodecError::Malformed { .. })
        ));
    }

    #[test]
    fn blank_lines_are_errors_in_both_formats() {
        assert!(matches!(Format::Json.decode("\n"), Err(CodecError::EmptyLine)));
        assert!(matches!(Format::Ltsv.decode("  \r\n"), Err(CodecError::EmptyLine)));
    }

    #[test]
    fn json_round_trip_preserves_pairs() {
        let original = "{\"path\":\"/\",\"status\":200,\"ok\":true,\"ref\":null}";
        let decoded = Format::Json.decode(original).unwrap();
        let encoded = Format::Json.encode(&decoded).unwrap();

        assert_eq!(Format::Json.decode(&encoded).unwrap(), decoded);
        assert_eq!(encoded, original);
    }

    #[test]
    fn ltsv_decode_splits_on_first_colon() {
        let decoded = Format::Ltsv
            .decode("host:127.0.0.1\ttime:10:00:01\tpath:/index.html\n")
            .unwrap();

        assert_eq!(
            decoded,
            record(json!({"host": "127.0.0.1", "time": "10:00:01", "path": "/index.html"}))
        );
    }

    #[test]
    fn ltsv_decode_rejects_field_without_separator() {
        let err = Format::Ltsv.decode("host:a\tbroken").unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn ltsv_encode_renders_non_text_values_as_json() {
        let encoded = Format::Ltsv
            .encode(&record(json!({"time": "2013/05/14 17:57:59", "count": 3, "flag": false, "x": null})))
            .unwrap();

        assert_eq!(encoded, "time:2013/05/14 17:57:59\tcount:3\tflag:false\tx:null");
    }

    #[test]
    fn ltsv_round_trip_escapes_separators() {
        let original = record(json!({"msg": "a\tb\nc\\d", "k": "v"}));
        let encoded = Format::Ltsv.encode(&original).unwrap();

        assert!(!encoded.contains('\n'));
        assert_eq!(encoded.matches('\t').count(), 1);
        assert_eq!(Format::Ltsv.decode(&encoded).unwrap(), original);
    }
}
