//! In-memory [`EventService`] used by unit tests.

// Local crates
use crate::models::models::{
    Batch, FieldDefinition, FieldInfo, QueryInfo, QueryResultSet, TargetInfo, TimedRecord,
};
use crate::rpc::service::{EventService, RpcError};

// External crates
use futures::{Stream, StreamExt, stream};
use std::cell::{Cell, RefCell};

/// Records every call and answers from canned data.
#[derive(Debug, Default)]
pub(crate) struct MockService {
    pub targets: Vec<TargetInfo>,
    pub fields: Vec<FieldInfo>,
    pub queries: Vec<QueryInfo>,
    pub events: Vec<TimedRecord>,
    pub result_set: QueryResultSet,
    /// 0-based index of the `send` call that fails with a server error.
    pub fail_send_at: Option<usize>,
    /// 0-based index of the event whose pull fails with a server error.
    pub fail_event_at: Option<usize>,
    /// Reject every admin call with this client error.
    pub reject_with: Option<String>,

    pub sent: RefCell<Vec<(String, Batch)>>,
    pub calls: RefCell<Vec<String>>,
    pub pulled: Cell<usize>,
}

impl MockService {
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.sent.borrow().iter().map(|(_, b)| b.len()).collect()
    }

    fn record(&self, call: String) -> Result<(), RpcError> {
        self.calls.borrow_mut().push(call);
        match &self.reject_with {
            Some(message) => Err(RpcError::Client(message.clone())),
            None => Ok(()),
        }
    }
}

impl EventService for MockService {
    async fn targets(&self) -> Result<Vec<TargetInfo>, RpcError> {
        self.record("targets".into())?;
        Ok(self.targets.clone())
    }

    async fn open(&self, target: &str, fields: &[FieldDefinition]) -> Result<(), RpcError> {
        let defs: Vec<String> = fields
            .iter()
            .map(|f| format!("{}:{}", f.name, f.field_type))
            .collect();
        self.record(format!("open {target} [{}]", defs.join(",")))
    }

    async fn close(&self, target: &str) -> Result<(), RpcError> {
        self.record(format!("close {target}"))
    }

    async fn fields(&self, target: &str) -> Result<Vec<FieldInfo>, RpcError> {
        self.record(format!("fields {target}"))?;
        Ok(self.fields.clone())
    }

    async fn reserve(&self, target: &str, field: &str, field_type: &str) -> Result<(), RpcError> {
        self.record(format!("reserve {target} {field} {field_type}"))
    }

    async fn queries(&self) -> Result<Vec<QueryInfo>, RpcError> {
        self.record("queries".into())?;
        Ok(self.queries.clone())
    }

    async fn register(
        &self,
        query_name: &str,
        group: Option<&str>,
        expression: &str,
    ) -> Result<(), RpcError> {
        self.record(format!(
            "register {query_name} {} {expression}",
            group.unwrap_or("-")
        ))
    }

    async fn deregister(&self, query_name: &str) -> Result<(), RpcError> {
        self.record(format!("deregister {query_name}"))
    }

    async fn send(&self, target: &str, events: Batch) -> Result<(), RpcError> {
        let index = self.sent.borrow().len();
        if self.fail_send_at == Some(index) {
            return Err(RpcError::Server("send failed".into()));
        }
        self.sent.borrow_mut().push((target.to_string(), events));
        Ok(())
    }

    fn event(&self, query_name: &str) -> impl Stream<Item = Result<TimedRecord, RpcError>> {
        self.calls.borrow_mut().push(format!("event {query_name}"));
        stream::iter(self.events.clone().into_iter().enumerate()).map(move |(index, timed)| {
            self.pulled.set(self.pulled.get() + 1);
            if self.fail_event_at == Some(index) {
                return Err(RpcError::Server("event stream broken".into()));
            }
            Ok(timed)
        })
    }

    async fn sweep(&self, group: Option<&str>) -> Result<QueryResultSet, RpcError> {
        self.record(format!("sweep {}", group.unwrap_or("-")))?;
        Ok(self.result_set.clone())
    }
}
