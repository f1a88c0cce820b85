// crates/gapool-rpc/src/broadcast.rs
//
// Broadcaster: registry of live sessions and new-job fan-out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use gapool_core::JobTemplate;

use crate::outbox::{Outbox, PushOutcome};

/// Identity of one connected session.
pub type SessionId = Uuid;

/// Registry of live sessions, keyed by session id.
///
/// `notify_all` only queues into each session's outbox; it never waits on
/// a peer, so one stalled client cannot hold up the others.
#[derive(Debug, Default)]
pub struct Broadcaster {
    sessions: RwLock<HashMap<SessionId, Arc<Outbox>>>,
    /// Mirrors the registry size so counting needs no lock.
    active_count: AtomicUsize,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. Registering the same id again replaces its outbox.
    pub async fn register(&self, id: SessionId, outbox: Arc<Outbox>) {
        let mut sessions = self.sessions.write().await;
        if sessions.insert(id, outbox).is_none() {
            self.active_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a session. A no-op if it is not registered.
    pub async fn deregister(&self, id: &SessionId) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(id).is_some() {
            self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Queue a new-job notification for every registered session.
    ///
    /// Returns the number of sessions it was queued for. Sessions whose
    /// outbox is already closed are being torn down and are skipped.
    pub async fn notify_all(&self, job: Arc<JobTemplate>) -> usize {
        let sessions = self.sessions.read().await;
        let mut delivered = 0;
        for (id, outbox) in sessions.iter() {
            match outbox.push_job(job.clone()) {
                PushOutcome::Queued => delivered += 1,
                PushOutcome::Superseded => {
                    delivered += 1;
                    tracing::warn!(
                        session = %id,
                        "Outbound queue full, superseded an older job notification"
                    );
                }
                PushOutcome::Closed => {
                    tracing::debug!(session = %id, "Skipping notification for closing session");
                }
            }
        }
        tracing::debug!(
            fingerprint = job.fingerprint().short(),
            recipients = delivered,
            "Broadcast new job"
        );
        delivered
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}
