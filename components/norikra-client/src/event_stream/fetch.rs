// Local crates
use crate::event_stream::enrich::render_event;
use crate::helpers::load_config::FormatOptions;
use crate::rpc::service::EventService;
use crate::runtime::errors::CommandError;

// External crates
use futures::{Stream, StreamExt};
use std::pin::pin;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::instrument;

/// Output lines of a single query.
///
/// Each event is pulled, enriched with its rendered time and encoded only when
/// the returned stream is polled, so at most one event is held at a time.
pub fn fetch_lines<'a, S: EventService>(
    service: &'a S,
    query_name: &'a str,
    options: &'a FormatOptions,
) -> impl Stream<Item = Result<String, CommandError>> {
    service
        .event(query_name)
        .map(move |item| render_event(options, item?, None))
}

/// Write the output events of `query_name` to `out`, one line per event,
/// flushing after every line.
///
/// Returns the number of events written. A failure stops the command, lines
/// already written stay written.
#[instrument(
    name = "norikra_client_fetch::fetch",
    target = "event_stream::fetch",
    skip(service, options, out),
    level = "debug"
)]
pub async fn fetch<S, W>(
    service: &S,
    query_name: &str,
    options: &FormatOptions,
    out: &mut W,
) -> Result<usize, CommandError>
where
    S: EventService,
    W: AsyncWrite + Unpin,
{
    let mut lines = pin!(fetch_lines(service, query_name, options));
    let mut written = 0usize;

    while let Some(line) = lines.next().await {
        let line = line?;
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await?;
        written += 1;
    }

    tracing::debug!(query_name, written, "Finished fetching query output events");
    Ok(written)
}
