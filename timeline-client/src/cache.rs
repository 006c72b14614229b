//! Local post cache.
//!
//! The cache only ever paints an empty feed while the first page is in
//! flight, and is written after a first load or a merging catch-up.
//! Failures in either direction are logged and otherwise ignored.

use crate::error::CollaboratorError;
use crate::gate::{Gate, HeldCall};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use timeline_types::{CacheSnapshot, FeedKind, Post};

/// Best-effort per-account, per-kind post store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the stored snapshot, if any.
    async fn get(
        &self,
        account_id: &str,
        kind: FeedKind,
    ) -> Result<Option<CacheSnapshot>, CollaboratorError>;

    /// Replace the stored snapshot.
    async fn put(
        &self,
        account_id: &str,
        kind: FeedKind,
        posts: Vec<Post>,
    ) -> Result<(), CollaboratorError>;
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Cache held in process memory.
///
/// Clones share state.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCache {
    inner: Arc<Mutex<InMemoryCacheInner>>,
}

#[derive(Debug, Default)]
struct InMemoryCacheInner {
    entries: HashMap<(String, FeedKind), CacheSnapshot>,
    puts: usize,
    fail_next_get: Option<CollaboratorError>,
    fail_next_put: Option<CollaboratorError>,
    held_gets: VecDeque<HeldCall>,
    held_puts: VecDeque<HeldCall>,
}

impl InMemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryCacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a snapshot directly.
    pub fn seed(&self, snapshot: CacheSnapshot) {
        let key = (snapshot.account_id.clone(), snapshot.feed_kind);
        self.lock().entries.insert(key, snapshot);
    }

    /// The stored snapshot for `account_id` and `kind`.
    pub fn snapshot(&self, account_id: &str, kind: FeedKind) -> Option<CacheSnapshot> {
        self.lock()
            .entries
            .get(&(account_id.to_string(), kind))
            .cloned()
    }

    /// Number of successful writes.
    pub fn put_count(&self) -> usize {
        self.lock().puts
    }

    /// Cause the next read to fail.
    pub fn fail_next_get(&self, error: CollaboratorError) {
        self.lock().fail_next_get = Some(error);
    }

    /// Cause the next write to fail.
    pub fn fail_next_put(&self, error: CollaboratorError) {
        self.lock().fail_next_put = Some(error);
    }

    /// Hold the next read until the returned gate is released.
    pub fn hold_next_get(&self) -> Gate {
        let (gate, held) = Gate::pair();
        self.lock().held_gets.push_back(held);
        gate
    }

    /// Hold the next write until the returned gate is released.
    pub fn hold_next_put(&self) -> Gate {
        let (gate, held) = Gate::pair();
        self.lock().held_puts.push_back(held);
        gate
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(
        &self,
        account_id: &str,
        kind: FeedKind,
    ) -> Result<Option<CacheSnapshot>, CollaboratorError> {
        let held = self.lock().held_gets.pop_front();
        if let Some(held) = held {
            held.wait().await;
        }

        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_get.take() {
            return Err(error);
        }
        Ok(inner.entries.get(&(account_id.to_string(), kind)).cloned())
    }

    async fn put(
        &self,
        account_id: &str,
        kind: FeedKind,
        posts: Vec<Post>,
    ) -> Result<(), CollaboratorError> {
        let held = self.lock().held_puts.pop_front();
        if let Some(held) = held {
            held.wait().await;
        }

        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_put.take() {
            return Err(error);
        }
        let snapshot = CacheSnapshot {
            account_id: account_id.to_string(),
            feed_kind: kind,
            posts,
            stored_at: now_millis(),
        };
        inner.entries.insert((account_id.to_string(), kind), snapshot);
        inner.puts += 1;
        Ok(())
    }
}
