//! Remote service handle.
//!
//! [`EventService`] is the seam between the command logic and the Norikra
//! server. Commands only ever talk to the trait, the MessagePack-RPC
//! implementation lives in [`crate::rpc::client`].

// Local crates
use crate::models::models::{
    Batch, FieldDefinition, FieldInfo, QueryInfo, QueryResultSet, TargetInfo, TimedRecord,
};

// External crates
use futures::Stream;
use std::time::Duration;

/// Failures surfaced by the remote service handle.
/// - `Client`: the server rejected the request (unknown target, duplicate query name, ...).
/// - `Server`: the server failed while handling the request.
/// - `ConnectionFailed`, `Timeout` and `Protocol`: the server could not be
///   reached or answered with something that is not a MessagePack-RPC response.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("{0}")]
    Client(String),
    #[error("{0}")]
    Server(String),
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid response: {0}")]
    Protocol(String),
}

/// Operations offered by a Norikra server.
///
/// Every call is a single request/response exchange, no call is retried.
#[allow(async_fn_in_trait)]
pub trait EventService {
    /// Names of all opened targets.
    async fn targets(&self) -> Result<Vec<TargetInfo>, RpcError>;

    /// Open a target, optionally declaring some of its fields up front.
    async fn open(&self, target: &str, fields: &[FieldDefinition]) -> Result<(), RpcError>;

    /// Close a target and every query reading from it.
    async fn close(&self, target: &str) -> Result<(), RpcError>;

    /// Field definitions known for a target.
    async fn fields(&self, target: &str) -> Result<Vec<FieldInfo>, RpcError>;

    /// Reserve a field name and its type on a target.
    async fn reserve(&self, target: &str, field: &str, field_type: &str) -> Result<(), RpcError>;

    /// Every registered query.
    async fn queries(&self) -> Result<Vec<QueryInfo>, RpcError>;

    /// Register a query, in `group` or the default group when `None`.
    async fn register(
        &self,
        query_name: &str,
        group: Option<&str>,
        expression: &str,
    ) -> Result<(), RpcError>;

    /// Remove a registered query.
    async fn deregister(&self, query_name: &str) -> Result<(), RpcError>;

    /// Submit one batch of events to a target. The batch is consumed by the call.
    async fn send(&self, target: &str, events: Batch) -> Result<(), RpcError>;

    /// Output events of a single query, pulled one at a time.
    fn event(&self, query_name: &str) -> impl Stream<Item = Result<TimedRecord, RpcError>>;

    /// Output events of every query in a group, `None` meaning the default group.
    async fn sweep(&self, group: Option<&str>) -> Result<QueryResultSet, RpcError>;
}
