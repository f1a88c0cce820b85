// crates/gapool-rpc/src/handlers/job.rs
//
// Job handlers: JobRequest (hand out the cached job) and JobSubmit
// (forward a share to the chain node).

use serde_json::Value;

use gapool_core::{GapoolError, SolutionPayload};

use crate::protocol::{Dialect, ProtocolError, Request, Response};
use crate::shared::DispatchState;

// ---------------------------------------------------------------------------
// JobRequest
// ---------------------------------------------------------------------------

/// Handle a JobRequest: answer with the cached `{data, difficulty}`, or
/// `NotReady` if nothing has been fetched yet.
pub async fn handle_job_request(state: &DispatchState, request: &Request) -> Response {
    match state.cache().get().await {
        Ok(job) => match serde_json::to_value(job.work()) {
            Ok(work) => Response::success(request.id.clone(), work),
            Err(e) => Response::from_error(request.id.clone(), &GapoolError::from(e)),
        },
        Err(e) => Response::from_error(request.id.clone(), &e),
    }
}

// ---------------------------------------------------------------------------
// JobSubmit
// ---------------------------------------------------------------------------

/// What a submit produced: the response for the submitter, and whether the
/// share moved the chain forward.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub response: Response,
    pub advanced_chain: bool,
}

impl SubmitOutcome {
    fn no_change(response: Response) -> Self {
        Self {
            response,
            advanced_chain: false,
        }
    }
}

/// Handle a JobSubmit: decode the share, hand it to the chain node, and
/// report the verdict.
///
/// Legacy clients get the bare `accepted` flag as their result.
pub async fn handle_job_submit(state: &DispatchState, request: &Request) -> SubmitOutcome {
    let solution: SolutionPayload = match serde_json::from_value(request.params.clone()) {
        Ok(s) => s,
        Err(e) => {
            let err = ProtocolError::invalid(request.id.clone(), format!("Invalid params: {}", e));
            return SubmitOutcome::no_change(err.to_response());
        }
    };

    let verdict = match state.submit(&solution).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Share submission failed upstream: {}", e);
            return SubmitOutcome::no_change(Response::from_error(request.id.clone(), &e));
        }
    };

    tracing::info!(
        accepted = verdict.accepted,
        advanced_chain = verdict.advanced_chain,
        "Share verdict from chain node"
    );

    let result = match request.dialect {
        Dialect::Legacy => Value::Bool(verdict.accepted),
        Dialect::Current => match serde_json::to_value(&verdict) {
            Ok(v) => v,
            Err(e) => {
                return SubmitOutcome::no_change(Response::from_error(
                    request.id.clone(),
                    &GapoolError::from(e),
                ))
            }
        },
    };

    SubmitOutcome {
        response: Response::success(request.id.clone(), result),
        advanced_chain: verdict.advanced_chain,
    }
}

/// Follow-up to a share that advanced the chain: refresh the cached job and
/// broadcast it. Failures are logged; the poll loop retries on its next tick.
pub async fn handle_chain_advanced(state: &DispatchState) {
    match state.refresh().await {
        Ok(true) => {}
        Ok(false) => tracing::debug!("Chain advanced but job unchanged; nothing to broadcast"),
        Err(e) => tracing::warn!("Could not refresh job after accepted block: {}", e),
    }
}
