// Local crates
use crate::event_stream::enrich::render_event;
use crate::helpers::load_config::FormatOptions;
use crate::models::models::{QueryResultSet, TimedRecord};
use crate::rpc::service::EventService;
use crate::runtime::errors::CommandError;

// External crates
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::instrument;

/// Order a sweep result by query name, ascending.
///
/// Events of a single query keep the order the server returned them in, they
/// are not re-sorted by time.
pub fn sorted_by_query_name(result_set: QueryResultSet) -> Vec<(String, Vec<TimedRecord>)> {
    let mut groups: Vec<(String, Vec<TimedRecord>)> = result_set.into_iter().collect();
    groups.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
    groups
}

/// Output lines of a whole sweep result, grouped by sorted query name.
///
/// Lines are rendered lazily while iterating.
pub fn sweep_lines(
    result_set: QueryResultSet,
    options: &FormatOptions,
) -> impl Iterator<Item = Result<String, CommandError>> + '_ {
    sorted_by_query_name(result_set)
        .into_iter()
        .flat_map(move |(query_name, events)| {
            events
                .into_iter()
                .map(move |timed| render_event(options, timed, Some(&query_name)))
        })
}

/// Fetch every output event of the queries in `group` (the default group
/// when `None`) and write them to `out`, one line per event.
///
/// Returns the number of events written.
#[instrument(
    name = "norikra_client_sweep::sweep",
    target = "event_stream::sweep",
    skip(service, options, out),
    level = "debug"
)]
pub async fn sweep<S, W>(
    service: &S,
    group: Option<&str>,
    options: &FormatOptions,
    out: &mut W,
) -> Result<usize, CommandError>
where
    S: EventService,
    W: AsyncWrite + Unpin,
{
    let result_set = service.sweep(group).await?;
    tracing::debug!(
        queries = result_set.len(),
        events = result_set.values().map(Vec::len).sum::<usize>(),
        "Received sweep result from norikra server"
    );

    let mut written = 0usize;
    for line in sweep_lines(result_set, options) {
        let line = line?;
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
        written += 1;
    }
    out.flush().await?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::load_config::{Config, EventOverrides};
    use crate::models::models::Record;
    use crate::rpc::service::RpcError;
    use crate::testing::MockService;
    use serde_json::{Value, json};

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test records are objects"),
        }
    }

    fn options() -> FormatOptions {
        Config::default()
            .format_options(EventOverrides {
                utc: true,
                ..Default::default()
            })
            .unwrap()
    }

    fn events(times: &[i64]) -> Vec<TimedRecord> {
        times
            .iter()
            .map(|t| TimedRecord::new(*t, record(json!({"t": t}))))
            .collect()
    }

    #[test]
    fn query_names_are_sorted() {
        let mut set = QueryResultSet::new();
        set.insert("b".into(), events(&[1]));
        set.insert("a".into(), events(&[2]));
        set.insert("c".into(), events(&[3]));

        let names: Vec<String> = sorted_by_query_name(set)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn events_inside_a_query_are_not_reordered() {
        let mut set = QueryResultSet::new();
        set.insert("q".into(), events(&[300, 100, 200]));

        let times: Vec<i64> = sorted_by_query_name(set)
            .remove(0)
            .1
            .iter()
            .map(|e| e.timestamp)
            .collect();
        assert_eq!(times, vec![300, 100, 200]);
    }

    #[tokio::test]
    async fn writes_groups_in_query_name_order() {
        let mut result_set = QueryResultSet::new();
        result_set.insert(
            "q2".into(),
            vec![TimedRecord::new(200, record(json!({"y": 2})))],
        );
        result_set.insert(
            "q1".into(),
            vec![TimedRecord::new(100, record(json!({"x": 1})))],
        );
        let service = MockService {
            result_set,
            ..Default::default()
        };
        let mut out = Vec::new();

        let written = sweep(&service, Some("g"), &options(), &mut out)
            .await
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"time\":\"1970/01/01 00:01:40\",\"query\":\"q1\",\"x\":1}\n\
             {\"time\":\"1970/01/01 00:03:20\",\"query\":\"q2\",\"y\":2}\n"
        );
        assert_eq!(service.calls.borrow().as_slice(), ["sweep g".to_string()]);
    }

    #[tokio::test]
    async fn default_group_is_requested_without_a_name() {
        let service = MockService::default();
        let mut out = Vec::new();

        assert_eq!(sweep(&service, None, &options(), &mut out).await.unwrap(), 0);
        assert_eq!(service.calls.borrow().as_slice(), ["sweep -".to_string()]);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn rejected_sweep_writes_nothing() {
        let service = MockService {
            reject_with: Some("query group not found".into()),
            ..Default::default()
        };
        let mut out = Vec::new();

        let err = sweep(&service, Some("missing"), &options(), &mut out)
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Rpc(RpcError::Client(_))));
        assert!(out.is_empty());
    }
}
