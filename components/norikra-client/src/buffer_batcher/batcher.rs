// Components
// 1. Buffer
// Collects decoded records in memory until the configured batch size is
// reached. Nothing is persisted, a record exists only between being read from
// stdin and being handed to the server.
//
// 2. Batcher
// Drives the buffer from an input line stream. Control flow:
// 1. Line arrives -> decode with the selected format, any failure aborts
// 2. Push record to buffer -> buffer full: take the batch, send it
// 3. Input exhausted -> send whatever is left as a final, smaller batch
// 4. Send failure -> abort, batches already sent stay sent
//

// Local crates
use crate::models::models::{Batch, Record};
use crate::parser::parser::{CodecError, Format};
use crate::rpc::service::EventService;
use crate::runtime::errors::CommandError;

// External crates
use std::io;
use std::mem;
use std::num::NonZeroUsize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::instrument;

const MAX_PREALLOCATED: usize = 1024;

/// Fixed-size accumulator of decoded records.
#[derive(Debug)]
pub struct EventBuffer {
    queue: Batch,
    batch_size: NonZeroUsize,
}

impl EventBuffer {
    /// Empty buffer handing out batches of `batch_size` records.
    pub fn new(batch_size: NonZeroUsize) -> Self {
        Self {
            queue: Vec::with_capacity(batch_size.get().min(MAX_PREALLOCATED)),
            batch_size,
        }
    }

    /// Push a record, returning the full batch once `batch_size` is reached.
    /// The buffer is empty again afterwards.
    pub fn push(&mut self, record: Record) -> Option<Batch> {
        self.queue.push(record);
        if self.queue.len() >= self.batch_size.get() {
            Some(mem::take(&mut self.queue))
        } else {
            None
        }
    }

    /// Take the remaining records, if any.
    pub fn flush(&mut self) -> Option<Batch> {
        if self.queue.is_empty() {
            None
        } else {
            Some(mem::take(&mut self.queue))
        }
    }

    /// Records waiting for the next batch.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// `true` when no record is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Read `input` line by line and submit the decoded records to `target`
/// in batches of `batch_size`.
///
/// Returns the number of records sent. Empty input sends nothing.
#[instrument(
    name = "norikra_client_batcher::send_events",
    target = "buffer_batcher::batcher",
    skip(service, input, target),
    fields(target_name = %target),
    level = "debug"
)]
pub async fn send_events<S, R>(
    service: &S,
    input: R,
    target: &str,
    format: Format,
    batch_size: NonZeroUsize,
) -> Result<usize, CommandError>
where
    S: EventService,
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut buffer = EventBuffer::new(batch_size);
    let mut line_no = 0usize;
    let mut sent = 0usize;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                tracing::debug!(line = line_no + 1, error = %e, "Input line is not valid UTF-8");
                return Err(CommandError::Decode {
                    line: line_no + 1,
                    source: CodecError::InvalidUtf8,
                });
            }
            Err(e) => return Err(e.into()),
        };
        line_no += 1;
        let record = match format.decode(&line) {
            Ok(record) => record,
            Err(source) => {
                tracing::debug!(
                    line = line_no,
                    error = %source,
                    buffered = buffer.len(),
                    "Failed to decode input line, aborting send"
                );
                return Err(CommandError::Decode {
                    line: line_no,
                    source,
                });
            }
        };

        if let Some(batch) = buffer.push(record) {
            sent += ship(service, target, batch).await?;
        }
    }

    if let Some(batch) = buffer.flush() {
        tracing::debug!(remaining = batch.len(), "Input exhausted, sending final batch");
        sent += ship(service, target, batch).await?;
    }

    tracing::debug!(target_name = %target, sent, lines = line_no, "Finished sending events");
    Ok(sent)
}

async fn ship<S: EventService>(
    service: &S,
    target: &str,
    batch: Batch,
) -> Result<usize, CommandError> {
    let len = batch.len();
    tracing::debug!(batch_len = len, target_name = %target, "Sending batch to norikra server");

    if let Err(e) = service.send(target, batch).await {
        tracing::debug!(error = %e, batch_len = len, "Failed to send batch");
        return Err(e.into());
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::service::RpcError;
    use crate::testing::MockService;
    use proptest::prelude::*;
    use serde_json::json;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn json_lines(n: usize) -> String {
        (0..n).map(|i| format!("{{\"seq\":{i}}}\n")).collect()
    }

    #[tokio::test]
    async fn five_lines_in_batches_of_two() {
        let service = MockService::default();
        let input = json_lines(5);

        let sent = send_events(&service, input.as_bytes(), "www", Format::Json, size(2))
            .await
            .unwrap();

        assert_eq!(sent, 5);
        assert_eq!(service.batch_sizes(), vec![2, 2, 1]);
        assert!(service.sent.borrow().iter().all(|(t, _)| t == "www"));
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let service = MockService::default();

        let sent = send_events(&service, &b""[..], "www", Format::Json, size(10))
            .await
            .unwrap();

        assert_eq!(sent, 0);
        assert!(service.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn decode_failure_aborts_before_any_call() {
        let service = MockService::default();
        let input = "{\"a\":1}\n{\"a\":2}\nnot json\n{\"a\":4}\n{\"a\":5}\n";

        let err = send_events(&service, input.as_bytes(), "www", Format::Json, size(10))
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Decode { line: 3, .. }));
        assert!(service.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_a_decode_error_with_its_line_number() {
        let service = MockService::default();
        let input: &[u8] = b"{\"a\":1}\n\xff\xfe\n{\"a\":3}\n";

        let err = send_events(&service, input, "www", Format::Json, size(10))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CommandError::Decode {
                line: 2,
                source: CodecError::InvalidUtf8
            }
        ));
        assert!(service.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn decode_failure_keeps_already_sent_batches() {
        let service = MockService::default();
        let input = "{\"a\":1}\n{\"a\":2}\n{\"a\":3}\n[]\n";

        let err = send_events(&service, input.as_bytes(), "www", Format::Json, size(2))
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Decode { line: 4, .. }));
        assert_eq!(service.batch_sizes(), vec![2]);
    }

    #[tokio::test]
    async fn send_failure_stops_reading() {
        let service = MockService {
            fail_send_at: Some(1),
            ..Default::default()
        };
        let input = json_lines(7);

        let err = send_events(&service, input.as_bytes(), "www", Format::Json, size(2))
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Rpc(RpcError::Server(_))));
        assert_eq!(service.batch_sizes(), vec![2]);
    }

    #[tokio::test]
    async fn ltsv_input_is_decoded_per_line() {
        let service = MockService::default();
        let input = "host:a\tstatus:200\r\nhost:b\tstatus:404\n";

        send_events(&service, input.as_bytes(), "access", Format::Ltsv, size(10))
            .await
            .unwrap();

        let sent = service.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1[1].get("status"), Some(&json!("404")));
    }

    #[test]
    fn buffer_hands_out_full_batches_only() {
        let mut buffer = EventBuffer::new(size(2));
        assert!(buffer.push(Record::new()).is_none());
        assert_eq!(buffer.push(Record::new()).map(|b| b.len()), Some(2));
        assert!(buffer.is_empty());
        assert!(buffer.flush().is_none());
    }

    proptest! {
        #[test]
        fn batches_partition_input_in_order(n in 0usize..60, b in 1usize..12) {
            let service = MockService::default();
            let input = json_lines(n);
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

            let sent = runtime
                .block_on(send_events(&service, input.as_bytes(), "t", Format::Json, size(b)))
                .unwrap();
            prop_assert_eq!(sent, n);

            let sizes = service.batch_sizes();
            prop_assert_eq!(sizes.len(), n.div_ceil(b));
            if let Some((last, full)) = sizes.split_last() {
                prop_assert!(full.iter().all(|s| *s == b));
                let expected_last = if n % b == 0 { b } else { n % b };
                prop_assert_eq!(*last, expected_last);
            }

            let seqs: Vec<u64> = service
                .sent
                .borrow()
                .iter()
                .flat_map(|(_, batch)| batch.iter().map(|r| r["seq"].as_u64().unwrap()))
                .collect();
            prop_assert_eq!(seqs, (0..n as u64).collect::<Vec<_>>());
        }
    }
}
