// crates/gapool-rpc/src/testutil.rs
//
// Scripted chain client for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use gapool_core::{ChainClient, GapoolError, JobTemplate, SolutionPayload, SubmitVerdict};

/// A chain node whose answers are set by the test.
pub struct ScriptedChain {
    job: Mutex<Result<(String, u64), String>>,
    verdict: Mutex<Result<SubmitVerdict, String>>,
    delay: Duration,
    pub fetches: AtomicUsize,
    pub submits: AtomicUsize,
}

impl ScriptedChain {
    pub fn with_job(data: &str, difficulty: u64) -> Self {
        Self {
            job: Mutex::new(Ok((data.to_string(), difficulty))),
            verdict: Mutex::new(Ok(SubmitVerdict::rejected("no verdict scripted"))),
            delay: Duration::ZERO,
            fetches: AtomicUsize::new(0),
            submits: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        let chain = Self::with_job("", 0);
        chain.fail_fetch("connection refused");
        chain
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_job(&self, data: &str, difficulty: u64) {
        *self.job.lock().unwrap() = Ok((data.to_string(), difficulty));
    }

    pub fn fail_fetch(&self, reason: &str) {
        *self.job.lock().unwrap() = Err(reason.to_string());
    }

    pub fn set_verdict(&self, accepted: bool, advanced_chain: bool) {
        *self.verdict.lock().unwrap() = Ok(SubmitVerdict {
            accepted,
            advanced_chain,
            detail: None,
        });
    }

    pub fn fail_submit(&self, reason: &str) {
        *self.verdict.lock().unwrap() = Err(reason.to_string());
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn fetch_job(&self) -> Result<JobTemplate, GapoolError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let job = self.job.lock().unwrap().clone();
        job.map(|(data, difficulty)| JobTemplate::new(data, difficulty))
            .map_err(GapoolError::UpstreamUnavailable)
    }

    async fn submit(&self, _solution: &SolutionPayload) -> Result<SubmitVerdict, GapoolError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.verdict
            .lock()
            .unwrap()
            .clone()
            .map_err(GapoolError::UpstreamMalformedResponse)
    }
}
