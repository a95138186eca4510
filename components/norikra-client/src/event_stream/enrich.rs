// Local crates
use crate::helpers::load_config::FormatOptions;
use crate::models::models::{Record, TimedRecord};
use crate::runtime::errors::CommandError;

// External crates
use serde_json::Value;

/// Build a new record with `enrichment` fields first, followed by the fields
/// of `record` in their original order.
///
/// On a key collision the enrichment value is kept and the original field is
/// dropped.
pub fn enrich<I>(enrichment: I, record: Record) -> Record
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut enriched: Record = enrichment.into_iter().collect();
    for (key, value) in record {
        if !enriched.contains_key(&key) {
            enriched.insert(key, value);
        }
    }
    enriched
}

/// Render one output event as a line: the event time under
/// `options.time_key`, the query name under `options.query_name_key` when
/// given, then the event's own fields.
pub fn render_event(
    options: &FormatOptions,
    timed: TimedRecord,
    query_name: Option<&str>,
) -> Result<String, CommandError> {
    let time = options.time_formatter.render(timed.timestamp)?;

    let mut enrichment = vec![(options.time_key.clone(), Value::String(time))];
    if let Some(name) = query_name {
        enrichment.push((
            options.query_name_key.clone(),
            Value::String(name.to_string()),
        ));
    }

    let record = enrich(enrichment, timed.record);
    Ok(options.format.encode(&record)?)
}
