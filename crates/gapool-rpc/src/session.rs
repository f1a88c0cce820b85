// crates/gapool-rpc/src/session.rs
//
// Per-connection session: the request state machine and the writer task.
//
// Valid transitions:
//   Connected -> Idle -> AwaitingUpstream -> Idle
//   Any state -> Closed
//
// The handler reads one line at a time, so a session has at most one
// request in flight. Everything it writes goes through the session's
// Outbox; only the writer task touches the transport's write half.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use gapool_core::GapoolError;

use crate::broadcast::SessionId;
use crate::framing::{Frame, LineReader, MAX_LINE_BYTES};
use crate::handlers;
use crate::outbox::{Outbound, Outbox, PushOutcome};
use crate::protocol::{self, Method, ProtocolError, Response};
use crate::shared::DispatchState;

/// Lifecycle states of one client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, not yet reading.
    Connected,
    /// Waiting for the next request line.
    Idle,
    /// Waiting on the chain node for a share verdict.
    AwaitingUpstream,
    /// Transport gone; the session is deregistered.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connected => write!(f, "Connected"),
            SessionState::Idle => write!(f, "Idle"),
            SessionState::AwaitingUpstream => write!(f, "AwaitingUpstream"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Drives one client connection from accept to teardown.
pub struct SessionHandler {
    id: SessionId,
    peer: String,
    dispatch: Arc<DispatchState>,
    outbox: Arc<Outbox>,
    state: SessionState,
    /// Requests handled so far; diagnostics only.
    requests: u64,
}

impl SessionHandler {
    /// Create a handler for an accepted connection. The caller registers
    /// `outbox` with the broadcaster under `id`.
    pub fn new(
        id: SessionId,
        peer: impl Into<String>,
        dispatch: Arc<DispatchState>,
        outbox: Arc<Outbox>,
    ) -> Self {
        Self {
            id,
            peer: peer.into(),
            dispatch,
            outbox,
            state: SessionState::Connected,
            requests: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn requests_handled(&self) -> u64 {
        self.requests
    }

    /// Move to `next`, rejecting transitions the state machine does not
    /// allow.
    fn transition(&mut self, next: SessionState) {
        let valid = match (self.state, next) {
            (_, SessionState::Closed) => true,
            (SessionState::Connected, SessionState::Idle) => true,
            (SessionState::Idle, SessionState::AwaitingUpstream) => true,
            (SessionState::AwaitingUpstream, SessionState::Idle) => true,
            _ => false,
        };

        if valid {
            tracing::trace!(session = %self.id, "Session state: {} -> {}", self.state, next);
            self.state = next;
        } else {
            tracing::error!(
                session = %self.id,
                "Invalid session transition: {} -> {}",
                self.state,
                next
            );
        }
    }

    /// Read requests until the peer goes away or the outbox is closed, then
    /// tear the session down.
    ///
    /// Returns the transport error that ended the session, if any.
    pub async fn run<R>(mut self, reader: R) -> Result<(), GapoolError>
    where
        R: AsyncBufRead + Unpin,
    {
        self.transition(SessionState::Idle);

        let outbox = self.outbox.clone();
        let mut frames = LineReader::new(reader);
        let result = loop {
            let frame = tokio::select! {
                frame = frames.next_frame() => frame,
                _ = outbox.closed() => break Ok(()),
            };

            match frame {
                Ok(Frame::Eof) => break Ok(()),
                Ok(Frame::Line(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    self.handle_line(trimmed).await;
                }
                Ok(Frame::InvalidUtf8) => self.reject_frame("Request is not valid UTF-8"),
                Ok(Frame::TooLong) => self.reject_frame(format!(
                    "Request line exceeds {} bytes",
                    MAX_LINE_BYTES
                )),
                Err(e) => break Err(GapoolError::from(e)),
            }
        };

        self.close().await;
        result
    }

    /// Answer a line that could not be decoded at all. The session stays
    /// Idle.
    fn reject_frame(&mut self, reason: impl Into<String>) {
        self.requests += 1;
        let err = ProtocolError::invalid(Value::Null, reason);
        tracing::debug!(session = %self.id, "Rejected request: {}", err);
        self.respond(err.to_response());
    }

    /// Handle one request line from the Idle state.
    pub async fn handle_line(&mut self, line: &str) {
        self.requests += 1;
        tracing::debug!(session = %self.id, request = self.requests, "Received: {}", line);

        let request = match protocol::parse_request(line) {
            Ok(r) => r,
            Err(err) => {
                tracing::debug!(session = %self.id, "Rejected request: {}", err);
                self.respond(err.to_response());
                return;
            }
        };

        self.outbox.set_dialect(request.dialect);

        match request.method {
            Method::JobRequest => {
                let response = handlers::job::handle_job_request(&self.dispatch, &request).await;
                self.respond(response);
            }
            Method::JobSubmit => {
                self.transition(SessionState::AwaitingUpstream);
                let outcome = handlers::job::handle_job_submit(&self.dispatch, &request).await;
                // The submitter sees its verdict before the resulting push.
                self.respond(outcome.response);
                if outcome.advanced_chain {
                    handlers::job::handle_chain_advanced(&self.dispatch).await;
                }
                self.transition(SessionState::Idle);
            }
        }
    }

    fn respond(&self, response: Response) {
        let line = match response.to_line() {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(session = %self.id, "Failed to serialize response: {}", e);
                return;
            }
        };
        if self.outbox.push_response(line) == PushOutcome::Closed {
            tracing::debug!(session = %self.id, "Dropping response for closed session");
        }
    }

    async fn close(&mut self) {
        self.transition(SessionState::Closed);
        self.outbox.close();
        self.dispatch.broadcaster().deregister(&self.id).await;
        tracing::info!(
            session = %self.id,
            peer = %self.peer,
            requests = self.requests,
            "Session closed"
        );
    }
}

/// Drain `outbox` into `writer` until the outbox closes.
///
/// A failed write closes the outbox, which in turn stops the session's
/// reader. A write stuck on a stalled peer is abandoned as soon as the
/// outbox closes.
pub async fn run_writer<W>(outbox: Arc<Outbox>, mut writer: W) -> Result<(), GapoolError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = outbox.next().await {
        let line = match item {
            Outbound::Response(line) => line,
            Outbound::Job(job) => match protocol::job_notification_line(&job, outbox.dialect()) {
                Ok(l) => l,
                Err(e) => {
                    tracing::warn!("Failed to serialize job notification: {}", e);
                    continue;
                }
            },
        };

        let written = tokio::select! {
            written = write_line(&mut writer, &line) => written,
            _ = outbox.closed() => return Ok(()),
        };

        if let Err(e) = written {
            outbox.close();
            return Err(GapoolError::from(e));
        }
    }
    Ok(())
}

async fn write_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}
