// crates/gapool-rpc/src/outbox.rs
//
// Outbox: the bounded outbound queue of one session.
//
// Responses and new-job notifications are both pushed here and drained by
// the session's single writer task, so writes to one transport never
// interleave. Pushing never blocks: when the queue is full, the oldest
// pending notification is dropped in favour of the newest job.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{watch, Notify};

use gapool_core::JobTemplate;

use crate::protocol::Dialect;

/// An item waiting to be written to the peer.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A serialized response line (newline-terminated).
    Response(String),
    /// A new-job push, rendered in the session's dialect at write time.
    Job(Arc<JobTemplate>),
}

/// Result of queueing an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after dropping an older pending notification.
    Superseded,
    /// The session is being torn down; nothing was queued.
    Closed,
}

#[derive(Debug)]
pub struct Outbox {
    queue: Mutex<VecDeque<Outbound>>,
    capacity: usize,
    ready: Notify,
    closed: watch::Sender<bool>,
    legacy: AtomicBool,
}

impl Outbox {
    /// Create an outbox holding at most `capacity` pending items
    /// (at least one).
    pub fn new(capacity: usize) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            ready: Notify::new(),
            closed,
            legacy: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Outbound>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a response line. Responses are never dropped, even past
    /// capacity; a session has at most one request in flight.
    pub fn push_response(&self, line: String) -> PushOutcome {
        if self.is_closed() {
            return PushOutcome::Closed;
        }
        self.lock().push_back(Outbound::Response(line));
        self.ready.notify_one();
        PushOutcome::Queued
    }

    /// Queue a new-job notification, superseding the oldest pending one if
    /// the queue is full.
    pub fn push_job(&self, job: Arc<JobTemplate>) -> PushOutcome {
        if self.is_closed() {
            return PushOutcome::Closed;
        }
        let outcome = {
            let mut queue = self.lock();
            let mut outcome = PushOutcome::Queued;
            if queue.len() >= self.capacity {
                if let Some(pos) = queue.iter().position(|i| matches!(i, Outbound::Job(_))) {
                    queue.remove(pos);
                    outcome = PushOutcome::Superseded;
                }
            }
            queue.push_back(Outbound::Job(job));
            outcome
        };
        self.ready.notify_one();
        outcome
    }

    /// Pop the next pending item without waiting.
    pub fn try_next(&self) -> Option<Outbound> {
        self.lock().pop_front()
    }

    /// Wait for the next item. Returns `None` once the outbox is closed.
    pub async fn next(&self) -> Option<Outbound> {
        let mut closed = self.closed.subscribe();
        loop {
            if *closed.borrow_and_update() {
                return None;
            }
            if let Some(item) = self.try_next() {
                return Some(item);
            }
            tokio::select! {
                _ = self.ready.notified() => {}
                _ = closed.changed() => {}
            }
        }
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the outbox: pending items are discarded, pushes are refused,
    /// and every waiter in `next` / `closed` wakes up.
    pub fn close(&self) {
        self.closed.send_replace(true);
        self.lock().clear();
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolve once the outbox is closed.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe it dropped.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    pub fn set_dialect(&self, dialect: Dialect) {
        self.legacy
            .store(dialect == Dialect::Legacy, Ordering::Relaxed);
    }

    pub fn dialect(&self) -> Dialect {
        if self.legacy.load(Ordering::Relaxed) {
            Dialect::Legacy
        } else {
            Dialect::Current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn job(data: &str) -> Arc<JobTemplate> {
        Arc::new(JobTemplate::new(data, 1))
    }

    fn job_data(item: Option<Outbound>) -> String {
        match item {
            Some(Outbound::Job(job)) => job.data().to_string(),
            other => panic!("expected a job, got {:?}", other),
        }
    }

    #[test]
    fn full_queue_supersedes_oldest_notification() {
        let outbox = Outbox::new(2);
        assert_eq!(outbox.push_job(job("a")), PushOutcome::Queued);
        assert_eq!(outbox.push_job(job("b")), PushOutcome::Queued);
        assert_eq!(outbox.push_job(job("c")), PushOutcome::Superseded);

        assert_eq!(outbox.len(), 2);
        assert_eq!(job_data(outbox.try_next()), "b");
        assert_eq!(job_data(outbox.try_next()), "c");
        assert!(outbox.try_next().is_none());
    }

    #[test]
    fn responses_are_never_superseded() {
        let outbox = Outbox::new(1);
        outbox.push_response("r1\n".to_string());
        outbox.push_job(job("a"));
        outbox.push_job(job("b"));

        match outbox.try_next() {
            Some(Outbound::Response(line)) => assert_eq!(line, "r1\n"),
            other => panic!("expected the response first, got {:?}", other),
        }
        assert_eq!(job_data(outbox.try_next()), "b");
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let outbox = Outbox::new(0);
        outbox.push_job(job("a"));
        assert_eq!(outbox.push_job(job("b")), PushOutcome::Superseded);
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn closed_outbox_refuses_pushes() {
        let outbox = Outbox::new(4);
        outbox.push_job(job("a"));
        outbox.close();
        assert!(outbox.is_closed());
        assert!(outbox.is_empty());
        assert_eq!(outbox.push_job(job("b")), PushOutcome::Closed);
        assert_eq!(outbox.push_response("x\n".into()), PushOutcome::Closed);
    }

    #[tokio::test]
    async fn next_waits_for_a_push() {
        let outbox = Arc::new(Outbox::new(4));
        let waiter = {
            let outbox = outbox.clone();
            tokio::spawn(async move { outbox.next().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        outbox.push_job(job("late"));

        let item = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("next() did not wake")
            .unwrap();
        assert_eq!(job_data(item), "late");
    }

    #[tokio::test]
    async fn close_wakes_pending_next() {
        let outbox = Arc::new(Outbox::new(4));
        let waiter = {
            let outbox = outbox.clone();
            tokio::spawn(async move { outbox.next().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        outbox.close();

        let item = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("next() did not wake on close")
            .unwrap();
        assert!(item.is_none());
        tokio::time::timeout(Duration::from_secs(1), outbox.closed())
            .await
            .expect("closed() did not resolve");
    }

    #[test]
    fn dialect_defaults_to_current() {
        let outbox = Outbox::new(1);
        assert_eq!(outbox.dialect(), Dialect::Current);
        outbox.set_dialect(Dialect::Legacy);
        assert_eq!(outbox.dialect(), Dialect::Legacy);
    }
}
