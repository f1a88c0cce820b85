// crates/gapool-core/src/traits.rs

use async_trait::async_trait;

use crate::error::GapoolError;
use crate::job::{JobTemplate, SolutionPayload, SubmitVerdict};

/// Narrow view of the authoritative chain node.
///
/// Implemented by gapool-daemon (HTTP JSON-RPC `getwork`). Implementations
/// report failures only as `UpstreamUnavailable` or
/// `UpstreamMalformedResponse`; how the node's wire format is adapted is
/// their own concern.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetch the job template miners should currently work on.
    async fn fetch_job(&self) -> Result<JobTemplate, GapoolError>;

    /// Submit a solved share and return the node's verdict.
    async fn submit(&self, solution: &SolutionPayload) -> Result<SubmitVerdict, GapoolError>;
}
