use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::types::job::BaculaJob;

#[derive(Clone)]
struct CacheEntry {
    stored_at: Instant,
    strategy: &'static str,
    jobs: Arc<Vec<BaculaJob>>,
}

/// Fetched job lists keyed by report window, kept for `ttl`.
///
/// Process-local only: separate processes each keep their own copy.
#[derive(Clone)]
pub struct JobCache {
    ttl: Duration,
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl JobCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Cached jobs and the strategy that produced them, if still fresh.
    /// Expired entries are dropped on lookup.
    pub fn get(&self, key: &str) -> Option<(&'static str, Arc<Vec<BaculaJob>>)> {
        let fresh = self.entries.get(key).and_then(|entry| {
            (entry.stored_at.elapsed() < self.ttl)
                .then(|| (entry.strategy, Arc::clone(&entry.jobs)))
        });
        if fresh.is_none() {
            self.entries
                .remove_if(key, |_, entry| entry.stored_at.elapsed() >= self.ttl);
        }
        fresh
    }

    pub fn insert(
        &self,
        key: String,
        strategy: &'static str,
        jobs: Vec<BaculaJob>,
    ) -> Arc<Vec<BaculaJob>> {
        let jobs = Arc::new(jobs);
        self.entries.insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                strategy,
                jobs: Arc::clone(&jobs),
            },
        );
        jobs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
