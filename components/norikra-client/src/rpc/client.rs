//! MessagePack-RPC over HTTP client for the Norikra server.
//!
//! Every call is one `POST /` carrying `[0, msgid, method, params]` and
//! answered with `[1, msgid, error, result]`, both MessagePack encoded.
//! Rejected requests come back as HTTP 4xx or with an error naming
//! `ClientError`, anything else carrying an error is a server failure.

// Local crates
use crate::helpers::converters::{field_definitions_to_value, value_to_list, value_to_result_set};
use crate::helpers::load_config::Endpoint;
use crate::models::models::{
    Batch, FieldDefinition, FieldInfo, QueryInfo, QueryResultSet, TargetInfo, TimedRecord,
};
use crate::rpc::service::{EventService, RpcError};

// External crates
use bytes::Bytes;
use futures::Stream;
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::instrument;

const MSGPACK_CONTENT_TYPE: &str = "application/x-msgpack";
const REQUEST: u8 = 0;
const RESPONSE: u64 = 1;

/// HTTP handle to a single Norikra server.
#[derive(Debug)]
pub struct RpcClient {
    http: Client<HttpConnector, Full<Bytes>>,
    url: String,
    timeout: Duration,
    next_msgid: AtomicU32,
}

impl RpcClient {
    /// Build a client for `endpoint`. No connection is made until the first call.
    pub fn new(endpoint: &Endpoint) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(endpoint.timeout));

        tracing::debug!(
            norikra_url = %endpoint.url(),
            timeout = ?endpoint.timeout,
            "Creating MessagePack-RPC client for norikra server"
        );

        Self {
            http: Client::builder(TokioExecutor::new()).build(connector),
            url: endpoint.url(),
            timeout: endpoint.timeout,
            next_msgid: AtomicU32::new(0),
        }
    }

    /// Perform one MessagePack-RPC call and return its result value.
    #[instrument(
        name = "norikra_client_rpc::call",
        target = "rpc::client::RpcClient",
        skip(self, params),
        level = "debug"
    )]
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let msgid = self.next_msgid.fetch_add(1, Ordering::Relaxed);
        let payload = rmp_serde::to_vec(&(REQUEST, msgid, method, params))
            .map_err(|e| RpcError::Protocol(format!("failed to encode request: {e}")))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.url.as_str())
            .header(CONTENT_TYPE, MSGPACK_CONTENT_TYPE)
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| RpcError::Protocol(format!("failed to build request: {e}")))?;

        tracing::debug!(msgid, url = %self.url, "Sending request to norikra server");
        let exchange = async {
            let response = self
                .http
                .request(request)
                .await
                .map_err(|e| RpcError::ConnectionFailed(e.to_string()))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| RpcError::ConnectionFailed(e.to_string()))?
                .to_bytes();
            Ok::<_, RpcError>((status, body))
        };

        let (status, body) = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::debug!(msgid, timeout = ?self.timeout, "Norikra server did not answer in time");
                return Err(RpcError::Timeout(self.timeout));
            }
        };

        tracing::debug!(
            msgid,
            status = %status,
            response_bytes = body.len(),
            "Received response from norikra server"
        );
        decode_response(status, &body, msgid)
    }
}

/// Turn an HTTP response into the call result, or the matching [`RpcError`].
pub(crate) fn decode_response(
    status: StatusCode,
    body: &[u8],
    msgid: u32,
) -> Result<Value, RpcError> {
    let decoded = rmp_serde::from_slice::<Vec<Value>>(body);

    let mut parts = match decoded {
        Ok(parts) if parts.len() == 4 => parts,
        Ok(parts) if !status.is_success() => {
            return Err(classify_error(status, Some(&Value::Array(parts))));
        }
        Ok(parts) => {
            return Err(RpcError::Protocol(format!(
                "response has {} elements, expected 4",
                parts.len()
            )));
        }
        Err(e) if !status.is_success() => {
            tracing::debug!(error = %e, "Error response body is not MessagePack");
            let text = String::from_utf8_lossy(body).trim().to_string();
            let error = (!text.is_empty()).then_some(Value::String(text));
            return Err(classify_error(status, error.as_ref()));
        }
        Err(e) => return Err(RpcError::Protocol(e.to_string())),
    };

    let result = parts.pop().unwrap_or(Value::Null);
    let error = parts.pop().unwrap_or(Value::Null);

    if parts[0].as_u64() != Some(RESPONSE) {
        return Err(RpcError::Protocol(format!(
            "unexpected message type {}",
            parts[0]
        )));
    }
    if parts[1].as_u64() != Some(u64::from(msgid)) {
        return Err(RpcError::Protocol(format!(
            "response msgid {} does not match request msgid {msgid}",
            parts[1]
        )));
    }

    if !error.is_null() || !status.is_success() {
        let detail = match (error, &result) {
            // error class in `error`, reason in `result`
            (Value::String(class), Value::String(message)) if !message.is_empty() => {
                json!([class, message])
            }
            (error, _) => error,
        };
        return Err(classify_error(status, (!detail.is_null()).then_some(&detail)));
    }

    Ok(result)
}

fn classify_error(status: StatusCode, error: Option<&Value>) -> RpcError {
    let (class, message) = match error {
        Some(value) => describe_error(value),
        None => (None, status.to_string()),
    };

    let named_client_error = class
        .as_deref()
        .is_some_and(|c| c.contains("ClientError"))
        || message.contains("ClientError");

    if status.is_client_error() || named_client_error {
        tracing::debug!(status = %status, error = %message, "Norikra server rejected the request");
        RpcError::Client(message)
    } else {
        tracing::debug!(status = %status, error = %message, "Norikra server failed to handle the request");
        RpcError::Server(message)
    }
}

/// Extract `(error class, message)` from the error shapes servers send back:
/// a plain string, `[class, message]` (also built from an error class paired
/// with a string result), or `{"class": ..., "message": ...}`.
fn describe_error(value: &Value) -> (Option<String>, String) {
    match value {
        Value::String(message) => (None, message.clone()),
        Value::Array(items) => match items.as_slice() {
            [Value::String(class), Value::String(message)] => {
                (Some(class.clone()), message.clone())
            }
            _ => (None, value.to_string()),
        },
        Value::Object(map) => {
            let class = map
                .get("class")
                .or_else(|| map.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            (class, message)
        }
        other => (None, other.to_string()),
    }
}

impl EventService for RpcClient {
    async fn targets(&self) -> Result<Vec<TargetInfo>, RpcError> {
        value_to_list(self.call("targets", vec![]).await?)
    }

    async fn open(&self, target: &str, fields: &[FieldDefinition]) -> Result<(), RpcError> {
        self.call("open", vec![json!(target), field_definitions_to_value(fields)])
            .await
            .map(drop)
    }

    async fn close(&self, target: &str) -> Result<(), RpcError> {
        self.call("close", vec![json!(target)]).await.map(drop)
    }

    async fn fields(&self, target: &str) -> Result<Vec<FieldInfo>, RpcError> {
        value_to_list(self.call("fields", vec![json!(target)]).await?)
    }

    async fn reserve(&self, target: &str, field: &str, field_type: &str) -> Result<(), RpcError> {
        self.call(
            "reserve",
            vec![json!(target), json!(field), json!(field_type)],
        )
        .await
        .map(drop)
    }

    async fn queries(&self) -> Result<Vec<QueryInfo>, RpcError> {
        value_to_list(self.call("queries", vec![]).await?)
    }

    async fn register(
        &self,
        query_name: &str,
        group: Option<&str>,
        expression: &str,
    ) -> Result<(), RpcError> {
        self.call(
            "register",
            vec![json!(query_name), json!(group), json!(expression)],
        )
        .await
        .map(drop)
    }

    async fn deregister(&self, query_name: &str) -> Result<(), RpcError> {
        self.call("deregister", vec![json!(query_name)])
            .await
            .map(drop)
    }

    #[instrument(
        name = "norikra_client_rpc::send",
        target = "rpc::client::RpcClient",
        skip(self, target, events),
        fields(target_name = %target, batch_len = events.len()),
        level = "debug"
    )]
    async fn send(&self, target: &str, events: Batch) -> Result<(), RpcError> {
        let events = Value::Array(events.into_iter().map(Value::Object).collect());
        self.call("send", vec![json!(target), events])
            .await
            .map(drop)
    }

    fn event(&self, query_name: &str) -> impl Stream<Item = Result<TimedRecord, RpcError>> {
        let query_name = query_name.to_string();
        async_stream::try_stream! {
            let result = self.call("event", vec![json!(query_name)]).await?;
            for entry in value_list(result)? {
                yield TimedRecord::try_from(entry)?;
            }
        }
    }

    async fn sweep(&self, group: Option<&str>) -> Result<QueryResultSet, RpcError> {
        let params = match group {
            Some(group) => vec![json!(group)],
            None => vec![Value::Null],
        };
        value_to_result_set(self.call("sweep", params).await?)
    }
}

/// Entries of an `event` result, converted one by one while streaming.
fn value_list(value: Value) -> Result<Vec<Value>, RpcError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(entries) => Ok(entries),
        _ => Err(RpcError::Protocol("event list is not an array".to_string())),
    }
}
