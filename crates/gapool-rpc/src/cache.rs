// crates/gapool-rpc/src/cache.rs
//
// JobCache: the single current job template shared by every session.

use std::sync::Arc;

use tokio::sync::RwLock;

use gapool_core::{Fingerprint, GapoolError, JobTemplate};

/// Holds the current job template, if one has been fetched.
///
/// The compare-and-swap in [`JobCache::replace`] happens under one write
/// lock, so among concurrent replacements carrying the same fingerprint
/// exactly one observes a change.
#[derive(Debug, Default)]
pub struct JobCache {
    current: RwLock<Option<Arc<JobTemplate>>>,
}

impl JobCache {
    /// Create an empty cache. `get` fails until the first `replace`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current template.
    pub async fn get(&self) -> Result<Arc<JobTemplate>, GapoolError> {
        self.current
            .read()
            .await
            .clone()
            .ok_or(GapoolError::NoJobAvailable)
    }

    /// Swap in a new template.
    ///
    /// Returns `true` if its fingerprint differs from the one previously
    /// stored (or the cache was empty). The cache never broadcasts; callers
    /// hand a changed template to the broadcaster themselves.
    pub async fn replace(&self, job: Arc<JobTemplate>) -> bool {
        let mut current = self.current.write().await;
        let changed = current
            .as_ref()
            .map_or(true, |prev| prev.fingerprint() != job.fingerprint());
        *current = Some(job);
        changed
    }

    /// Fingerprint of the current template.
    pub async fn fingerprint(&self) -> Option<Fingerprint> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|job| job.fingerprint().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(data: &str, difficulty: u64) -> Arc<JobTemplate> {
        Arc::new(JobTemplate::new(data, difficulty))
    }

    #[tokio::test]
    async fn empty_cache_is_not_ready() {
        let cache = JobCache::new();
        assert!(matches!(cache.get().await, Err(GapoolError::NoJobAvailable)));
        assert!(cache.fingerprint().await.is_none());
    }

    #[tokio::test]
    async fn first_replace_is_a_change() {
        let cache = JobCache::new();
        assert!(cache.replace(job("abc", 5)).await);
        let current = cache.get().await.unwrap();
        assert_eq!(current.data(), "abc");
        assert_eq!(current.difficulty(), 5);
    }

    #[tokio::test]
    async fn changes_counted_once_per_fingerprint_transition() {
        let cache = JobCache::new();
        let sequence = ["a", "a", "b", "b", "b", "a", "c", "c"];
        let mut changes = 0;
        for data in sequence {
            if cache.replace(job(data, 1)).await {
                changes += 1;
            }
        }
        // a, b, a, c
        assert_eq!(changes, 4);
    }

    #[tokio::test]
    async fn same_fingerprint_still_replaces_template() {
        let cache = JobCache::new();
        cache.replace(job("abc", 5)).await;
        assert!(!cache.replace(job("abc", 7)).await);
        assert_eq!(cache.get().await.unwrap().difficulty(), 7);
    }

    #[tokio::test]
    async fn concurrent_identical_replacements_report_one_change() {
        let cache = Arc::new(JobCache::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.replace(job("same", 3)).await }));
        }

        let mut changes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                changes += 1;
            }
        }
        assert_eq!(changes, 1);
    }
}
