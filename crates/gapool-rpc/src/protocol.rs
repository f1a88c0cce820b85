// crates/gapool-rpc/src/protocol.rs
//
// Wire protocol: one JSON object per line in each direction.
//
// Requests carry an opaque `id`, a `method`, and optional `params`.
// Responses echo the `id` and carry exactly one of `result` / `error`
// (the other is serialized as null). Notifications are pushed with a null
// `id` and a `method` + `params` body.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use gapool_core::{GapoolError, JobTemplate, JobWork};

// ---------------------------------------------------------------------------
// Methods
// ---------------------------------------------------------------------------

/// Method names spoken by current clients.
pub const METHOD_JOB_REQUEST: &str = "job.request";
pub const METHOD_JOB_SUBMIT: &str = "job.submit";
pub const METHOD_JOB_NEW: &str = "job.new";

/// Method names spoken by older Gapcoin mining clients.
pub const LEGACY_JOB_REQUEST: &str = "blockchain.block.request";
pub const LEGACY_JOB_SUBMIT: &str = "blockchain.block.submit";
pub const LEGACY_JOB_NEW: &str = "blockchain.block.new";

/// Which family of method names a client speaks.
///
/// Legacy clients get `blockchain.block.new` pushes and a bare boolean as
/// the submit result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Current,
    Legacy,
}

/// The fixed set of client-initiated methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    JobRequest,
    JobSubmit,
}

impl Method {
    /// Resolve a method name, reporting which dialect it belongs to.
    pub fn parse(name: &str) -> Option<(Method, Dialect)> {
        match name {
            METHOD_JOB_REQUEST => Some((Method::JobRequest, Dialect::Current)),
            METHOD_JOB_SUBMIT => Some((Method::JobSubmit, Dialect::Current)),
            LEGACY_JOB_REQUEST => Some((Method::JobRequest, Dialect::Legacy)),
            LEGACY_JOB_SUBMIT => Some((Method::JobSubmit, Dialect::Legacy)),
            _ => None,
        }
    }
}

impl Dialect {
    /// Method name used for new-job pushes in this dialect.
    pub fn notification_method(self) -> &'static str {
        match self {
            Dialect::Current => METHOD_JOB_NEW,
            Dialect::Legacy => LEGACY_JOB_NEW,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Opaque token echoed back in the response.
    pub id: Value,
    pub method: Method,
    pub dialect: Dialect,
    /// Method-specific payload; `Value::Null` when absent.
    pub params: Value,
}

/// A request that could not be turned into a [`Request`].
///
/// Always recovered locally: the offending session gets an error response
/// and the connection stays open.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("{reason}")]
    InvalidRequest { id: Value, reason: String },

    #[error("Unknown method: {method}")]
    UnknownMethod { id: Value, method: String },
}

impl ProtocolError {
    pub fn invalid(id: Value, reason: impl Into<String>) -> Self {
        ProtocolError::InvalidRequest {
            id,
            reason: reason.into(),
        }
    }

    /// The request id to echo, or null if none could be recovered.
    pub fn id(&self) -> &Value {
        match self {
            ProtocolError::InvalidRequest { id, .. } | ProtocolError::UnknownMethod { id, .. } => id,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ProtocolError::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            ProtocolError::UnknownMethod { .. } => ErrorCode::UnknownMethod,
        }
    }

    /// Build the error response sent back to the client.
    pub fn to_response(&self) -> Response {
        Response::failure(self.id().clone(), self.code(), self.to_string())
    }
}

/// Decode one line of input into a request.
pub fn parse_request(line: &str) -> Result<Request, ProtocolError> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| ProtocolError::invalid(Value::Null, format!("Invalid JSON: {}", e)))?;

    let Value::Object(mut obj) = value else {
        return Err(ProtocolError::invalid(
            Value::Null,
            "Request must be a JSON object",
        ));
    };

    let id = obj
        .remove("id")
        .ok_or_else(|| ProtocolError::invalid(Value::Null, "Missing field: id"))?;

    let method = match obj.remove("method") {
        Some(Value::String(m)) => m,
        Some(_) => return Err(ProtocolError::invalid(id, "Field `method` must be a string")),
        None => return Err(ProtocolError::invalid(id, "Missing field: method")),
    };

    let (method, dialect) = match Method::parse(&method) {
        Some(parsed) => parsed,
        None => return Err(ProtocolError::UnknownMethod { id, method }),
    };

    Ok(Request {
        id,
        method,
        dialect,
        params: obj.remove("params").unwrap_or(Value::Null),
    })
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Error codes carried in `error.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidRequest,
    UnknownMethod,
    NotReady,
    UpstreamUnavailable,
    UpstreamMalformedResponse,
}

impl ErrorCode {
    /// Map a dispatch error onto the code reported to the client.
    pub fn for_error(err: &GapoolError) -> ErrorCode {
        match err {
            GapoolError::NoJobAvailable => ErrorCode::NotReady,
            GapoolError::UpstreamMalformedResponse(_) | GapoolError::Serialization(_) => {
                ErrorCode::UpstreamMalformedResponse
            }
            GapoolError::UpstreamUnavailable(_)
            | GapoolError::Transport(_)
            | GapoolError::ListenerFatal(_) => ErrorCode::UpstreamUnavailable,
        }
    }
}

/// The `error` object of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,
}

/// Response to a client request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: Value,
    pub result: Option<Value>,
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Error response for a dispatch error.
    pub fn from_error(id: Value, err: &GapoolError) -> Self {
        Self::failure(id, ErrorCode::for_error(err), err.to_string())
    }

    /// Serialize as a single newline-terminated line.
    pub fn to_line(&self) -> Result<String, GapoolError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// A server-initiated push. `id` is always null.
#[derive(Debug, Serialize)]
struct Notification<'a> {
    id: (),
    method: &'static str,
    params: JobWork<'a>,
}

/// Render the new-job push for `job` in the given dialect.
pub fn job_notification_line(job: &JobTemplate, dialect: Dialect) -> Result<String, GapoolError> {
    let notification = Notification {
        id: (),
        method: dialect.notification_method(),
        params: job.work(),
    };
    let mut line = serde_json::to_string(&notification)?;
    line.push('\n');
    Ok(line)
}
