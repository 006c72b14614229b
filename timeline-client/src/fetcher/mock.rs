//! Mock status fetcher for testing.
//!
//! Serves pages from scripted per-kind server timelines and records the
//! request each call would have issued.

use super::StatusFetcher;
use crate::gate::{Gate, HeldCall};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use timeline_core::{resolve, FetchDescriptor};
use timeline_types::{Cursor, FeedKind, Post, PostId, TimelineError};

/// Mock fetcher backed by in-memory server timelines.
///
/// Clones share state, so a test can keep a handle while the controller
/// owns another.
#[derive(Debug, Default, Clone)]
pub struct MockStatusFetcher {
    inner: Arc<Mutex<MockFetcherInner>>,
}

#[derive(Debug, Default)]
struct MockFetcherInner {
    page_size: usize,
    /// Server timelines, newest first.
    timelines: HashMap<FeedKind, Vec<Post>>,
    requests: Vec<FetchDescriptor>,
    fail_next: Option<TimelineError>,
    holds: VecDeque<HeldCall>,
}

impl MockStatusFetcher {
    /// Create a fetcher serving pages of `page_size` posts.
    pub fn new(page_size: usize) -> Self {
        let fetcher = Self::default();
        fetcher.lock().page_size = page_size;
        fetcher
    }

    fn lock(&self) -> MutexGuard<'_, MockFetcherInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the server timeline of `kind`.
    pub fn set_timeline(&self, kind: FeedKind, posts: Vec<Post>) {
        let mut inner = self.lock();
        inner.timelines.insert(kind, Vec::new());
        Self::merge(&mut inner, kind, posts);
    }

    /// Add posts to the server timeline of `kind` (new arrivals).
    pub fn publish(&self, kind: FeedKind, posts: Vec<Post>) {
        let mut inner = self.lock();
        Self::merge(&mut inner, kind, posts);
    }

    fn merge(inner: &mut MockFetcherInner, kind: FeedKind, posts: Vec<Post>) {
        let timeline = inner.timelines.entry(kind).or_default();
        for post in posts {
            if !timeline.iter().any(|existing| existing.id == post.id) {
                timeline.push(post);
            }
        }
        timeline.sort_by(|a, b| b.id.cmp(&a.id));
    }

    /// Current server timeline of `kind`, newest first.
    pub fn timeline(&self, kind: FeedKind) -> Vec<Post> {
        self.lock().timelines.get(&kind).cloned().unwrap_or_default()
    }

    /// Every request issued so far.
    pub fn requests(&self) -> Vec<FetchDescriptor> {
        self.lock().requests.clone()
    }

    /// Number of requests issued so far.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<FetchDescriptor> {
        self.lock().requests.last().cloned()
    }

    /// Forget recorded requests.
    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    /// Cause the next request to fail with `error`.
    pub fn fail_next(&self, error: TimelineError) {
        self.lock().fail_next = Some(error);
    }

    /// Hold the next request until the returned gate is released.
    ///
    /// The page is computed after release, so posts published meanwhile
    /// are visible to it.
    pub fn hold_next(&self) -> Gate {
        let (gate, held) = Gate::pair();
        self.lock().holds.push_back(held);
        gate
    }

    /// Record one request and apply any injected failure or hold.
    ///
    /// Returns the page size and the request as the server would see it.
    async fn issue(
        &self,
        kind: FeedKind,
        cursor: Cursor,
    ) -> Result<(usize, FetchDescriptor), TimelineError> {
        let (page_size, descriptor, failure, held) = {
            let mut inner = self.lock();
            let descriptor =
                resolve(kind, &cursor).map_err(|e| TimelineError::Transport(e.to_string()))?;
            inner.requests.push(descriptor.clone());
            (
                inner.page_size,
                descriptor,
                inner.fail_next.take(),
                inner.holds.pop_front(),
            )
        };

        if let Some(held) = held {
            held.wait().await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok((page_size, descriptor)),
        }
    }

    fn page_limit(&self) -> u32 {
        u32::try_from(self.lock().page_size).unwrap_or(u32::MAX)
    }
}

#[async_trait]
impl StatusFetcher for MockStatusFetcher {
    async fn fetch_first_page(&self, kind: FeedKind) -> Result<Vec<Post>, TimelineError> {
        let cursor = Cursor::first_page().with_limit(self.page_limit());
        let (page_size, _) = self.issue(kind, cursor).await?;

        Ok(self.timeline(kind).into_iter().take(page_size).collect())
    }

    async fn fetch_next_page(
        &self,
        kind: FeedKind,
        last_id: &PostId,
        offset: usize,
    ) -> Result<Vec<Post>, TimelineError> {
        let cursor = if kind == FeedKind::Trending {
            Cursor::first_page().with_offset(u32::try_from(offset).unwrap_or(u32::MAX))
        } else {
            Cursor::older_than(last_id.clone())
        };
        let (page_size, _) = self.issue(kind, cursor.with_limit(self.page_limit())).await?;

        let timeline = self.timeline(kind);
        let page = if kind == FeedKind::Trending {
            timeline.into_iter().skip(offset).take(page_size).collect()
        } else {
            timeline
                .into_iter()
                .filter(|post| post.id < *last_id)
                .take(page_size)
                .collect()
        };
        Ok(page)
    }

    async fn fetch_new_pages(
        &self,
        kind: FeedKind,
        min_id: &PostId,
        max_pages: usize,
    ) -> Result<Vec<Post>, TimelineError> {
        let mut collected: Vec<Post> = Vec::new();
        let mut min_id = min_id.clone();

        for _ in 0..max_pages {
            let cursor = Cursor::newer_than(min_id.clone()).with_limit(self.page_limit());
            let (page_size, request) = self.issue(kind, cursor).await?;

            // Served from the request: without a bound the server answers
            // with its newest page
            let timeline = self.timeline(kind);
            let page: Vec<Post> = match request.param("min_id").map(PostId::new) {
                Some(bound) => {
                    // The page immediately above the bound: the oldest of the newer posts
                    let newer: Vec<Post> =
                        timeline.into_iter().filter(|post| post.id > bound).collect();
                    let start = newer.len().saturating_sub(page_size);
                    newer[start..].to_vec()
                }
                None => timeline.into_iter().take(page_size).collect(),
            };

            let Some(head) = page.first() else {
                break;
            };
            min_id = head.id.clone();
            let short = page.len() < page_size;

            collected.splice(0..0, page);
            if short {
                break;
            }
        }
        Ok(collected)
    }
}
