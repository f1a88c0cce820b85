// crates/gapool-rpc/src/shared.rs
//
// DispatchState: state shared by the server, every session, and the poll
// loop.
//
// Constructed once by the daemon and handed out as Arc<DispatchState>.
// Wraps the chain client in the upstream timeout and owns the only path by
// which a new job reaches the cache and the broadcaster.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use gapool_core::{ChainClient, GapoolError, JobTemplate, SolutionPayload, SubmitVerdict};

use crate::broadcast::Broadcaster;
use crate::cache::JobCache;

/// Default bound on a single chain node call.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DispatchState {
    chain: Arc<dyn ChainClient>,
    cache: JobCache,
    broadcaster: Broadcaster,
    upstream_timeout: Duration,
    /// Serializes fetch + replace + notify, so an older template can never
    /// be broadcast after a newer one.
    publish_lock: Mutex<()>,
    start_time: Instant,
}

impl std::fmt::Debug for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchState")
            .field("upstream_timeout", &self.upstream_timeout)
            .field("sessions", &self.broadcaster.session_count())
            .finish()
    }
}

impl DispatchState {
    /// Create the shared state with an empty job cache.
    pub fn new(chain: Arc<dyn ChainClient>, upstream_timeout: Duration) -> Self {
        Self {
            chain,
            cache: JobCache::new(),
            broadcaster: Broadcaster::new(),
            upstream_timeout,
            publish_lock: Mutex::new(()),
            start_time: Instant::now(),
        }
    }

    pub fn cache(&self) -> &JobCache {
        &self.cache
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn upstream_timeout(&self) -> Duration {
        self.upstream_timeout
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Fetch the current job from the chain node, bounded by the upstream
    /// timeout.
    pub async fn fetch_job(&self) -> Result<JobTemplate, GapoolError> {
        self.bounded("fetch job", self.chain.fetch_job()).await
    }

    /// Submit a share to the chain node, bounded by the upstream timeout.
    pub async fn submit(&self, solution: &SolutionPayload) -> Result<SubmitVerdict, GapoolError> {
        self.bounded("submit share", self.chain.submit(solution)).await
    }

    /// Fetch the current job, store it, and broadcast it if it changed.
    ///
    /// Returns whether a new job was broadcast.
    pub async fn refresh(&self) -> Result<bool, GapoolError> {
        let _guard = self.publish_lock.lock().await;
        let job = self.fetch_job().await?;
        Ok(self.store_and_notify(job).await)
    }

    async fn store_and_notify(&self, job: JobTemplate) -> bool {
        let job = Arc::new(job);
        if !self.cache.replace(job.clone()).await {
            tracing::trace!(fingerprint = job.fingerprint().short(), "Job unchanged");
            return false;
        }

        let recipients = self.broadcaster.notify_all(job.clone()).await;
        tracing::info!(
            fingerprint = job.fingerprint().short(),
            difficulty = job.difficulty(),
            recipients,
            "Published new job"
        );
        true
    }

    async fn bounded<T>(
        &self,
        what: &str,
        call: impl Future<Output = Result<T, GapoolError>>,
    ) -> Result<T, GapoolError> {
        match tokio::time::timeout(self.upstream_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GapoolError::UpstreamUnavailable(format!(
                "{} timed out after {:?}",
                what, self.upstream_timeout
            ))),
        }
    }
}
