//! Remote read-marker service.
//!
//! Reads back the last-read position for resume; writes happen
//! fire-and-forget when the user leaves the live feed.

use crate::cache::now_millis;
use crate::error::CollaboratorError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use timeline_types::{FeedKind, Marker, PostId};

/// Best-effort server-side last-read pointer per feed kind.
#[async_trait]
pub trait MarkerService: Send + Sync {
    /// Read the marker for `kind`.
    async fn get_marker(&self, kind: FeedKind) -> Result<Option<Marker>, CollaboratorError>;

    /// Move the marker for `kind` to `last_read_id`.
    async fn set_marker(&self, kind: FeedKind, last_read_id: &PostId)
        -> Result<(), CollaboratorError>;
}

/// Marker service held in process memory.
///
/// Clones share state.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMarkers {
    inner: Arc<Mutex<InMemoryMarkersInner>>,
}

#[derive(Debug, Default)]
struct InMemoryMarkersInner {
    markers: HashMap<FeedKind, Marker>,
    writes: Vec<(FeedKind, PostId)>,
    fail_next_get: Option<CollaboratorError>,
    fail_next_set: Option<CollaboratorError>,
}

impl InMemoryMarkers {
    /// Create a service without markers.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryMarkersInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a marker directly.
    pub fn seed(&self, marker: Marker) {
        self.lock().markers.insert(marker.feed_kind, marker);
    }

    /// The stored marker for `kind`.
    pub fn marker(&self, kind: FeedKind) -> Option<Marker> {
        self.lock().markers.get(&kind).cloned()
    }

    /// Every attempted write, including failed ones.
    pub fn writes(&self) -> Vec<(FeedKind, PostId)> {
        self.lock().writes.clone()
    }

    /// Wait until at least `count` writes were attempted.
    ///
    /// Writes are spawned; this yields to the runtime until they ran.
    /// Returns `false` if they did not show up.
    pub async fn wait_for_writes(&self, count: usize) -> bool {
        for _ in 0..100 {
            if self.lock().writes.len() >= count {
                return true;
            }
            tokio::task::yield_now().await;
        }
        false
    }

    /// Cause the next read to fail.
    pub fn fail_next_get(&self, error: CollaboratorError) {
        self.lock().fail_next_get = Some(error);
    }

    /// Cause the next write to fail.
    pub fn fail_next_set(&self, error: CollaboratorError) {
        self.lock().fail_next_set = Some(error);
    }
}

#[async_trait]
impl MarkerService for InMemoryMarkers {
    async fn get_marker(&self, kind: FeedKind) -> Result<Option<Marker>, CollaboratorError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_get.take() {
            return Err(error);
        }
        Ok(inner.markers.get(&kind).cloned())
    }

    async fn set_marker(
        &self,
        kind: FeedKind,
        last_read_id: &PostId,
    ) -> Result<(), CollaboratorError> {
        let mut inner = self.lock();
        inner.writes.push((kind, last_read_id.clone()));
        if let Some(error) = inner.fail_next_set.take() {
            return Err(error);
        }

        let version = inner.markers.get(&kind).map_or(0, |m| m.version + 1);
        inner.markers.insert(
            kind,
            Marker {
                feed_kind: kind,
                last_read_id: last_read_id.clone(),
                version,
                updated_at: now_millis(),
            },
        );
        Ok(())
    }
}
