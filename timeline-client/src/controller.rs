//! Timeline sync controller.
//!
//! The controller owns every [`FeedState`], the pending set and the resume
//! marker behind one `tokio::sync::Mutex`. User intents (`select_kind`,
//! `pull_to_refresh`, ...) feed events to the pure phase machine and spawn a
//! task that interprets the returned [`PhaseAction`]s.
//!
//! # Cancellation
//!
//! Each spawned task carries a [`Ticket`]: the kind it works for, its lane
//! (sync or older-page paging) and a generation. Starting new work for a
//! kind aborts the tasks already running for it, and every task re-checks
//! its ticket under the lock before each mutation. A late result from a
//! superseded task is dropped, never applied to a newer cursor.

use crate::cache::{CacheStore, InMemoryCache};
use crate::config::TimelineConfig;
use crate::fetcher::StatusFetcher;
use crate::marker::{InMemoryMarkers, MarkerService};
use crate::snapshot::{FeedSnapshot, TimelineSnapshot};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use timeline_core::{
    classify_failure, FailureOutcome, FeedState, PendingStatusTracker, PhaseAction, PhaseEvent,
    PostFilter, RouteOutcome, ShowAll, StreamEventRouter,
};
use timeline_types::{FeedKind, Marker, Post, PostId, StreamEvent, TimelineError};
use tokio::sync::{watch, Mutex};
use tokio::task::{AbortHandle, JoinHandle};

/// Account id used until [`TimelineSyncController::switch_account`] is called.
pub const DEFAULT_ACCOUNT: &str = "default";

/// Which kind of work a task does for its feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Lane {
    /// First load, catch-up, resume.
    Sync,
    /// Older-page loads.
    Paging,
}

/// Identity of one spawned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    kind: FeedKind,
    lane: Lane,
    generation: u64,
}

#[derive(Debug)]
struct TaskSlot {
    generation: u64,
    abort: AbortHandle,
}

/// Handle to the work an operation started.
///
/// Dropping it detaches the task; it keeps running.
#[derive(Debug)]
pub struct SyncTask {
    handle: Option<JoinHandle<()>>,
}

impl SyncTask {
    fn done() -> Self {
        Self { handle: None }
    }

    fn spawned(handle: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Whether the operation had nothing to do.
    pub fn is_noop(&self) -> bool {
        self.handle.is_none()
    }

    /// Wait for the task.
    ///
    /// Returns `false` if it was cancelled by newer work.
    pub async fn wait(self) -> bool {
        match self.handle {
            Some(handle) => handle.await.is_ok(),
            None => true,
        }
    }
}

struct ControllerState {
    account_id: String,
    active_kind: FeedKind,
    feeds: HashMap<FeedKind, FeedState>,
    /// Unseen ids of the live feed.
    pending: PendingStatusTracker,
    /// Marker a resume is anchoring on, cleared once the anchor is loaded.
    marker: Option<Marker>,
    tasks: HashMap<(FeedKind, Lane), TaskSlot>,
    /// The sync task that has not reached the head yet; live events wait for it.
    catching_up: Option<Ticket>,
    /// Last read id of a resume; posts up to it are not pending.
    read_anchor: Option<PostId>,
    next_generation: u64,
}

impl ControllerState {
    fn new(account_id: String, active_kind: FeedKind) -> Self {
        Self {
            account_id,
            active_kind,
            feeds: HashMap::new(),
            pending: PendingStatusTracker::new(),
            marker: None,
            tasks: HashMap::new(),
            catching_up: None,
            read_anchor: None,
            next_generation: 0,
        }
    }

    fn feed(&self, kind: FeedKind) -> Option<&FeedState> {
        self.feeds.get(&kind)
    }

    fn feed_mut(&mut self, kind: FeedKind) -> &mut FeedState {
        self.feeds
            .entry(kind)
            .or_insert_with(|| FeedState::new(kind))
    }

    fn issue(&mut self, kind: FeedKind, lane: Lane) -> Ticket {
        self.next_generation += 1;
        Ticket {
            kind,
            lane,
            generation: self.next_generation,
        }
    }

    fn register(&mut self, ticket: Ticket, handle: &JoinHandle<()>) {
        self.tasks.insert(
            (ticket.kind, ticket.lane),
            TaskSlot {
                generation: ticket.generation,
                abort: handle.abort_handle(),
            },
        );
    }

    /// Whether `ticket` may still mutate state.
    fn is_current(&self, ticket: Ticket) -> bool {
        self.active_kind == ticket.kind
            && self
                .tasks
                .get(&(ticket.kind, ticket.lane))
                .is_some_and(|slot| slot.generation == ticket.generation)
    }

    fn is_busy(&self, kind: FeedKind, lane: Lane) -> bool {
        self.tasks.contains_key(&(kind, lane))
    }

    /// Abort every task of `kind` and settle its phase.
    fn supersede(&mut self, kind: FeedKind) {
        for lane in [Lane::Sync, Lane::Paging] {
            let Some(slot) = self.tasks.remove(&(kind, lane)) else {
                continue;
            };
            slot.abort.abort();
            tracing::debug!("Cancelled {:?} task for {} feed", lane, kind);

            let feed = self.feed_mut(kind);
            match lane {
                Lane::Sync => {
                    let event = feed.interrupt_event();
                    feed.apply(event);
                }
                Lane::Paging => feed.is_loading_older = false,
            }
        }
        if self.catching_up.is_some_and(|ticket| ticket.kind == kind) {
            self.catching_up = None;
            self.read_anchor = None;
        }
    }

    fn snapshot(&self, filter: &dyn PostFilter) -> TimelineSnapshot {
        let feed = match self.feed(self.active_kind) {
            Some(feed) => FeedSnapshot::capture(feed, filter),
            None => FeedSnapshot::capture(&FeedState::new(self.active_kind), filter),
        };
        TimelineSnapshot {
            account_id: self.account_id.clone(),
            active_kind: self.active_kind,
            feed,
            pending_count: self.pending.pending_count(),
            pending_ids: self.pending.pending_ids(),
            can_stream_events: self.catching_up.is_none(),
            resume_marker: self.marker.clone(),
        }
    }
}

/// Outcome of applying a first page.
enum FirstPage {
    Loaded {
        actions: Vec<PhaseAction>,
        to_cache: Vec<Post>,
    },
    Failed(TimelineError),
    Superseded,
}

struct Shared<F> {
    config: TimelineConfig,
    fetcher: F,
    cache: Arc<dyn CacheStore>,
    markers: Arc<dyn MarkerService>,
    filter: Arc<dyn PostFilter>,
    router: StreamEventRouter,
    state: Mutex<ControllerState>,
    snapshots: watch::Sender<TimelineSnapshot>,
}

/// Builder for [`TimelineSyncController`].
pub struct ControllerBuilder<F> {
    config: TimelineConfig,
    fetcher: F,
    cache: Arc<dyn CacheStore>,
    markers: Arc<dyn MarkerService>,
    filter: Arc<dyn PostFilter>,
    account_id: String,
}

impl<F: StatusFetcher + 'static> ControllerBuilder<F> {
    /// Use `cache` for first-load painting and write-through.
    pub fn with_cache<C: CacheStore + 'static>(mut self, cache: C) -> Self {
        self.cache = Arc::new(cache);
        self
    }

    /// Use `markers` for resume and read-position writes.
    pub fn with_markers<M: MarkerService + 'static>(mut self, markers: M) -> Self {
        self.markers = Arc::new(markers);
        self
    }

    /// Filter posts before they reach snapshots.
    pub fn with_filter<P: PostFilter + 'static>(mut self, filter: P) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    /// Start signed in as `account_id`.
    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    /// Build the controller.
    pub fn build(self) -> TimelineSyncController<F> {
        let live_kind = self.config.live_kind;
        let state = ControllerState::new(self.account_id, live_kind);
        let (snapshots, _) = watch::channel(state.snapshot(self.filter.as_ref()));

        TimelineSyncController {
            shared: Arc::new(Shared {
                router: StreamEventRouter::new(live_kind),
                config: self.config,
                fetcher: self.fetcher,
                cache: self.cache,
                markers: self.markers,
                filter: self.filter,
                state: Mutex::new(state),
                snapshots,
            }),
        }
    }
}

/// Orchestrates fetching, caching, markers and live events for every feed
/// of one account.
///
/// Clones share state.
pub struct TimelineSyncController<F: StatusFetcher + 'static> {
    shared: Arc<Shared<F>>,
}

impl<F: StatusFetcher + 'static> Clone for TimelineSyncController<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: StatusFetcher + 'static> TimelineSyncController<F> {
    /// Create a controller with in-memory cache and markers.
    pub fn new(config: TimelineConfig, fetcher: F) -> Self {
        Self::builder(config, fetcher).build()
    }

    /// Start building a controller.
    pub fn builder(config: TimelineConfig, fetcher: F) -> ControllerBuilder<F> {
        ControllerBuilder {
            config,
            fetcher,
            cache: Arc::new(InMemoryCache::new()),
            markers: Arc::new(InMemoryMarkers::new()),
            filter: Arc::new(ShowAll),
            account_id: DEFAULT_ACCOUNT.to_string(),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &TimelineConfig {
        &self.shared.config
    }

    /// Select a feed kind.
    ///
    /// `Resume` and `Latest` resolve to the live kind. A kind with posts
    /// catches up (or is restored as-is if refreshed recently); an empty
    /// kind loads its first page.
    pub async fn select_kind(&self, kind: FeedKind) -> SyncTask {
        match kind {
            FeedKind::Resume => self.resume().await,
            FeedKind::Latest => self.jump_to_latest().await,
            kind => self.activate(kind).await,
        }
    }

    async fn activate(&self, kind: FeedKind) -> SyncTask {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        shared.enter(&mut state, kind);

        let feed = state.feed_mut(kind);
        let event = feed.activation_event(Instant::now(), shared.config.refresh_ttl());
        let actions = feed.apply(event);
        if actions.is_empty() {
            tracing::info!("Restored {} feed without fetching", kind);
        }

        shared.publish(&state);
        shared.start(&mut state, kind, actions)
    }

    /// Continue the live feed from the remote read marker.
    pub async fn resume(&self) -> SyncTask {
        let shared = &self.shared;
        let kind = shared.config.live_kind;
        let mut state = shared.state.lock().await;
        shared.enter(&mut state, kind);

        let actions = state.feed_mut(kind).apply(PhaseEvent::ResumeRequested);
        shared.publish(&state);
        shared.start(&mut state, kind, actions)
    }

    /// Drop the live feed and its pending set, then load the newest page.
    pub async fn jump_to_latest(&self) -> SyncTask {
        let shared = &self.shared;
        let kind = shared.config.live_kind;
        let mut state = shared.state.lock().await;
        shared.enter(&mut state, kind);
        tracing::info!("Jumping to latest on {} feed", kind);

        let actions = state.feed_mut(kind).apply(PhaseEvent::JumpToLatest);
        shared.publish(&state);
        shared.start(&mut state, kind, actions)
    }

    /// Pull-to-refresh on the selected kind.
    pub async fn pull_to_refresh(&self) -> SyncTask {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        let kind = state.active_kind;
        if !state.feed(kind).is_some_and(|feed| feed.is_active) {
            return SyncTask::done();
        }
        state.supersede(kind);

        let feed = state.feed_mut(kind);
        let event = feed.refresh_event();
        let actions = feed.apply(event);
        shared.publish(&state);
        shared.start(&mut state, kind, actions)
    }

    /// Retry the selected kind after a failure.
    pub async fn retry(&self) -> SyncTask {
        let kind = self.shared.state.lock().await.active_kind;
        self.activate(kind).await
    }

    /// Scheduled catch-up of the selected kind.
    ///
    /// Only runs when the feed is `Ready` and nothing is in flight for it.
    pub async fn poll(&self) -> SyncTask {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        let kind = state.active_kind;
        if state.is_busy(kind, Lane::Sync) || !state.feed(kind).is_some_and(|feed| feed.is_active)
        {
            return SyncTask::done();
        }

        let actions = state.feed_mut(kind).apply(PhaseEvent::PollRequested);
        if actions.is_empty() {
            return SyncTask::done();
        }
        tracing::debug!("Polling {} feed", kind);
        shared.publish(&state);
        shared.start(&mut state, kind, actions)
    }

    /// Load the page below the current tail of the selected kind.
    pub async fn load_older(&self) -> SyncTask {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        let kind = state.active_kind;
        if state.is_busy(kind, Lane::Paging) {
            return SyncTask::done();
        }
        let Some(feed) = state.feeds.get_mut(&kind) else {
            return SyncTask::done();
        };
        if !feed.is_active || feed.posts.is_empty() || !feed.has_more {
            return SyncTask::done();
        }
        feed.is_loading_older = true;

        let ticket = state.issue(kind, Lane::Paging);
        let worker = Arc::clone(shared);
        let handle = tokio::spawn(async move {
            worker.load_older(ticket).await;
            worker.finish(ticket).await;
        });
        state.register(ticket, &handle);
        shared.publish(&state);
        SyncTask::spawned(handle)
    }

    /// A post scrolled into view on the selected kind.
    ///
    /// On the live kind this also marks it and every older pending post
    /// as seen.
    pub async fn post_did_appear(&self, id: &PostId) {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        let kind = state.active_kind;
        state.feed_mut(kind).mark_visible(id.clone());

        if kind == shared.config.live_kind && state.pending.remove_status(id) > 0 {
            shared.publish(&state);
        }
    }

    /// A post scrolled out of view on the selected kind.
    pub async fn post_did_disappear(&self, id: &PostId) {
        let mut state = self.shared.state.lock().await;
        let kind = state.active_kind;
        state.feed_mut(kind).mark_hidden(id);
    }

    /// Apply one live push event.
    pub async fn handle_stream_event(&self, event: StreamEvent) -> RouteOutcome {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        let live_kind = shared.router.live_kind();
        let can_stream_events = state.catching_up.is_none();

        let ControllerState { feeds, pending, .. } = &mut *state;
        let feed = feeds
            .entry(live_kind)
            .or_insert_with(|| FeedState::new(live_kind));
        let outcome = shared.router.route(event, feed, pending, can_stream_events);

        match &outcome {
            RouteOutcome::Ignored(reason) => {
                tracing::debug!("Stream event ignored: {:?}", reason);
            }
            outcome if outcome.is_mutation() => shared.publish(&state),
            _ => {}
        }
        outcome
    }

    /// Sign in as another account: cancel everything and reset every feed.
    pub async fn switch_account(&self, account_id: impl Into<String>) {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;

        let kinds: Vec<FeedKind> = state.feeds.keys().copied().collect();
        for kind in kinds {
            state.supersede(kind);
            state.feed_mut(kind).reset();
        }
        state.pending.clear();
        state.marker = None;
        state.catching_up = None;
        state.read_anchor = None;
        state.account_id = account_id.into();
        tracing::info!("Switched to account {}", state.account_id);

        shared.publish(&state);
    }

    /// Current state of the selected kind.
    pub async fn snapshot(&self) -> TimelineSnapshot {
        let state = self.shared.state.lock().await;
        state.snapshot(self.shared.filter.as_ref())
    }

    /// Current state of any kind that was ever touched.
    pub async fn feed_snapshot(&self, kind: FeedKind) -> Option<FeedSnapshot> {
        let state = self.shared.state.lock().await;
        state
            .feed(kind)
            .map(|feed| FeedSnapshot::capture(feed, self.shared.filter.as_ref()))
    }

    /// Receive a new snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<TimelineSnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Whether live events are applied right now.
    pub async fn can_stream_events(&self) -> bool {
        self.shared.state.lock().await.catching_up.is_none()
    }
}

impl<F: StatusFetcher + 'static> Shared<F> {
    fn publish(&self, state: &ControllerState) {
        self.snapshots
            .send_replace(state.snapshot(self.filter.as_ref()));
    }

    /// Make `kind` the selected kind and cancel its running work.
    fn enter(&self, state: &mut ControllerState, kind: FeedKind) {
        let previous = state.active_kind;
        if previous != kind {
            if previous == self.config.live_kind && kind != FeedKind::Following {
                self.write_marker(state, previous);
            }
            if let Some(feed) = state.feeds.get_mut(&previous) {
                feed.is_active = false;
            }
            state.supersede(previous);
            state.active_kind = kind;
            tracing::info!("Selected {} feed (was {})", kind, previous);
        }
        state.supersede(kind);
        state.feed_mut(kind).is_active = true;
    }

    /// Fire-and-forget write of the top visible post of `kind`.
    fn write_marker(&self, state: &ControllerState, kind: FeedKind) {
        let Some(id) = state.feed(kind).and_then(FeedState::top_visible) else {
            return;
        };
        let markers = Arc::clone(&self.markers);
        tokio::spawn(async move {
            match markers.set_marker(kind, &id).await {
                Ok(()) => tracing::debug!("Read marker for {} set to {}", kind, id),
                Err(e) => tracing::warn!("Read marker write for {} failed: {}", kind, e),
            }
        });
    }

    fn discard(&self, state: &mut ControllerState, kind: FeedKind) {
        state.feed_mut(kind).discard();
        if kind == self.config.live_kind {
            state.pending.clear();
            state.read_anchor = None;
        }
    }

    /// Run the synchronous actions now and spawn a task for the rest.
    fn start(
        self: &Arc<Self>,
        state: &mut ControllerState,
        kind: FeedKind,
        actions: Vec<PhaseAction>,
    ) -> SyncTask {
        let mut work = Vec::new();
        for action in actions {
            match action {
                PhaseAction::Discard => self.discard(state, kind),
                PhaseAction::Surface(_) | PhaseAction::LogStale(_) => log_failure(kind, &action),
                action => work.push(action),
            }
        }
        if work.is_empty() {
            self.publish(state);
            return SyncTask::done();
        }

        let ticket = state.issue(kind, Lane::Sync);
        // Every sync task ends in a catch-up or settles without one
        state.catching_up = Some(ticket);
        let worker = Arc::clone(self);
        let handle = tokio::spawn(async move {
            worker.drive(ticket, work).await;
            worker.finish(ticket).await;
        });
        state.register(ticket, &handle);
        self.publish(state);
        SyncTask::spawned(handle)
    }

    /// Interpret actions until the phase machine asks for nothing more.
    async fn drive(&self, ticket: Ticket, actions: Vec<PhaseAction>) {
        let mut queue: VecDeque<PhaseAction> = actions.into();
        while let Some(action) = queue.pop_front() {
            let next = match action {
                PhaseAction::FirstLoad { use_cache } => self.first_load(ticket, use_cache).await,
                PhaseAction::CatchUp { pull_to_refresh } => {
                    self.catch_up(ticket, pull_to_refresh).await
                }
                PhaseAction::Resume => self.resume_from_marker(ticket).await,
                PhaseAction::Discard => {
                    let mut state = self.state.lock().await;
                    if state.is_current(ticket) {
                        self.discard(&mut state, ticket.kind);
                        self.publish(&state);
                    }
                    Vec::new()
                }
                action => {
                    log_failure(ticket.kind, &action);
                    Vec::new()
                }
            };
            queue.extend(next);
        }
    }

    /// Release the task slot once the task is done.
    async fn finish(&self, ticket: Ticket) {
        let mut state = self.state.lock().await;
        let key = (ticket.kind, ticket.lane);
        if state
            .tasks
            .get(&key)
            .is_some_and(|slot| slot.generation == ticket.generation)
        {
            state.tasks.remove(&key);
        }
        if state.catching_up == Some(ticket) {
            state.catching_up = None;
            self.publish(&state);
        }
    }

    /// Feed a fetch failure to the phase machine.
    async fn fail(&self, ticket: Ticket, error: TimelineError) -> Vec<PhaseAction> {
        let mut state = self.state.lock().await;
        if !state.is_current(ticket) {
            return Vec::new();
        }
        if state.catching_up == Some(ticket) {
            state.catching_up = None;
            state.read_anchor = None;
        }

        let feed = state.feed_mut(ticket.kind);
        let event = feed.failure_event(error);
        let actions = feed.apply(event);
        self.publish(&state);
        actions
    }

    fn cache_slice(&self, feed: &FeedState) -> Vec<Post> {
        feed.posts
            .as_slice()
            .iter()
            .take(self.config.cache_limit)
            .cloned()
            .collect()
    }

    async fn write_cache(&self, account_id: &str, kind: FeedKind, posts: Vec<Post>) {
        let count = posts.len();
        match self.cache.put(account_id, kind, posts).await {
            Ok(()) => tracing::debug!("Cached {} posts of {} feed", count, kind),
            Err(e) => tracing::warn!("Cache write for {} feed failed: {}", kind, e),
        }
    }

    /// Cache paint and first-page fetch, side by side.
    async fn first_load(&self, ticket: Ticket, use_cache: bool) -> Vec<PhaseAction> {
        let kind = ticket.kind;
        let account_id = {
            let state = self.state.lock().await;
            if !state.is_current(ticket) {
                return Vec::new();
            }
            state.account_id.clone()
        };
        tracing::info!("Loading first page of {} feed", kind);

        let paint = async {
            if use_cache {
                self.paint_from_cache(ticket, &account_id).await;
            }
        };
        let fetch = async {
            let result = self.fetcher.fetch_first_page(kind).await;
            self.apply_first_page(ticket, result).await
        };
        let ((), outcome) = tokio::join!(paint, fetch);

        match outcome {
            FirstPage::Loaded { actions, to_cache } => {
                self.write_cache(&account_id, kind, to_cache).await;
                actions
            }
            FirstPage::Failed(error) => self.fail(ticket, error).await,
            FirstPage::Superseded => Vec::new(),
        }
    }

    async fn paint_from_cache(&self, ticket: Ticket, account_id: &str) {
        let kind = ticket.kind;
        let snapshot = match self.cache.get(account_id, kind).await {
            Ok(Some(snapshot)) if !snapshot.posts.is_empty() => snapshot,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!("Cache read for {} feed failed: {}", kind, e);
                return;
            }
        };

        let mut state = self.state.lock().await;
        if !state.is_current(ticket) {
            return;
        }
        let feed = state.feed_mut(kind);
        if !feed.posts.is_empty() {
            tracing::debug!("Cache for {} feed arrived after the network, ignored", kind);
            return;
        }
        let count = snapshot.posts.len();
        feed.posts.set(snapshot.posts);
        feed.sync_max_id();
        self.publish(&state);
        tracing::debug!("Painted {} cached posts on {} feed", count, kind);
    }

    async fn apply_first_page(
        &self,
        ticket: Ticket,
        result: Result<Vec<Post>, TimelineError>,
    ) -> FirstPage {
        let posts = match result {
            Ok(posts) => posts,
            Err(error) => return FirstPage::Failed(error),
        };
        let mut state = self.state.lock().await;
        if !state.is_current(ticket) {
            return FirstPage::Superseded;
        }

        let kind = ticket.kind;
        let feed = state.feed_mut(kind);
        let len = posts.len();
        feed.posts.set(posts);
        feed.update_paging(Some(len), self.config.page_size);
        feed.last_refresh = Some(Instant::now());
        let actions = feed.apply(PhaseEvent::FirstPageLoaded {
            supports_newest: kind.supports_newest_pagination(),
        });
        let to_cache = self.cache_slice(feed);
        if kind == self.config.live_kind {
            state.pending.clear();
        }
        self.publish(&state);
        tracing::info!("Loaded {} posts on {} feed", len, kind);

        FirstPage::Loaded { actions, to_cache }
    }

    /// Bounded loop fetching newer pages until the head is reached.
    async fn catch_up(&self, ticket: Ticket, pull_to_refresh: bool) -> Vec<PhaseAction> {
        let kind = ticket.kind;
        {
            let mut state = self.state.lock().await;
            if !state.is_current(ticket) {
                return Vec::new();
            }
            let feed = state.feed_mut(kind);
            if feed.posts.is_empty() {
                let actions = feed.apply(PhaseEvent::CatchUpFinished);
                self.publish(&state);
                return actions;
            }
        }
        tracing::debug!(
            "Catching up {} feed (pull to refresh: {})",
            kind,
            pull_to_refresh
        );

        let mut merged = false;
        for round in 0..self.config.catch_up_rounds {
            let head = {
                let state = self.state.lock().await;
                if !state.is_current(ticket) {
                    return Vec::new();
                }
                match state.feed(kind).and_then(|feed| feed.posts.first()) {
                    Some(post) => post.id.clone(),
                    None => break,
                }
            };

            let result = self
                .fetcher
                .fetch_new_pages(kind, &head, self.config.max_pages)
                .await;
            let batch = match result {
                Ok(batch) => batch,
                Err(error) => return self.fail(ticket, error).await,
            };

            let mut state = self.state.lock().await;
            if !state.is_current(ticket) {
                return Vec::new();
            }
            let inserted = self.merge_newer(&mut state, kind, batch);
            tracing::debug!(
                "Catch-up round {} on {} feed: {} new posts above {}",
                round + 1,
                kind,
                inserted,
                head
            );
            if inserted == 0 {
                break;
            }
            merged = true;
            self.publish(&state);
        }

        let (actions, to_cache, account_id) = {
            let mut state = self.state.lock().await;
            if !state.is_current(ticket) {
                return Vec::new();
            }
            state.catching_up = None;
            state.read_anchor = None;
            let feed = state.feed_mut(kind);
            feed.last_refresh = Some(Instant::now());
            let actions = feed.apply(PhaseEvent::CatchUpFinished);
            let to_cache = merged.then(|| self.cache_slice(feed));
            let account_id = state.account_id.clone();
            self.publish(&state);
            (actions, to_cache, account_id)
        };
        if let Some(posts) = to_cache {
            self.write_cache(&account_id, kind, posts).await;
        }
        actions
    }

    /// Prepend the new part of `batch` and return how many posts it added.
    fn merge_newer(&self, state: &mut ControllerState, kind: FeedKind, batch: Vec<Post>) -> usize {
        let feed = state.feed_mut(kind);
        let inserted = feed.posts.insert_contents(batch, 0);
        if inserted.is_empty() {
            return 0;
        }

        if let Some(anchor) = feed.last_visible() {
            let trimmed = feed.posts.remove_after(&anchor, self.config.safe_offset);
            if trimmed > 0 {
                feed.has_more = true;
                tracing::debug!("Trimmed {} posts below {} on {} feed", trimmed, anchor, kind);
            }
        }
        feed.sync_max_id();

        let count = inserted.len();
        if kind == self.config.live_kind {
            let anchor = state.read_anchor.clone();
            state.pending.add_newest(
                inserted
                    .into_iter()
                    .filter(|id| anchor.as_ref().map_or(true, |anchor| id > anchor)),
            );
        }
        count
    }

    /// Anchor the live feed on the read marker, or fall back to activation.
    async fn resume_from_marker(&self, ticket: Ticket) -> Vec<PhaseAction> {
        let kind = ticket.kind;
        let marker = match self.markers.get_marker(kind).await {
            Ok(marker) => marker,
            Err(e) => {
                tracing::warn!("Read marker for {} unavailable: {}", kind, e);
                None
            }
        };

        let mut state = self.state.lock().await;
        if !state.is_current(ticket) {
            return Vec::new();
        }
        let Some(marker) = marker else {
            tracing::info!("No read marker for {}, activating normally", kind);
            let feed = state.feed_mut(kind);
            // Settle the resume first so a fresh feed is kept as is
            let interrupted = feed.interrupt_event();
            feed.apply(interrupted);
            let event = feed.activation_event(Instant::now(), self.config.refresh_ttl());
            let actions = feed.apply(event);
            self.publish(&state);
            return actions;
        };
        tracing::info!("Resuming {} feed at {}", kind, marker.last_read_id);
        let anchor = marker.last_read_id.clone();
        state.marker = Some(marker);
        self.publish(&state);
        drop(state);

        let result = self.fetcher.fetch_next_page(kind, &anchor, 0).await;

        let mut state = self.state.lock().await;
        if !state.is_current(ticket) {
            return Vec::new();
        }
        state.marker = None;
        let posts = match result {
            Ok(posts) => posts,
            Err(error) => {
                drop(state);
                return self.fail(ticket, error).await;
            }
        };
        if kind == self.config.live_kind {
            state.pending.clear();
        }

        let supports_newest = kind.supports_newest_pagination();
        let feed = state.feed_mut(kind);
        let event = if posts.is_empty() {
            // Nothing below the marker: start from the head
            feed.discard();
            PhaseEvent::Activated {
                has_posts: false,
                fresh: false,
                supports_newest,
            }
        } else {
            let len = posts.len();
            feed.posts.set(posts);
            feed.update_paging(Some(len), self.config.page_size);
            PhaseEvent::FirstPageLoaded { supports_newest }
        };
        let anchored = !feed.posts.is_empty();
        let actions = feed.apply(event);
        if anchored {
            state.read_anchor = Some(anchor);
        }
        self.publish(&state);
        actions
    }

    async fn load_older(&self, ticket: Ticket) {
        let kind = ticket.kind;
        let (last_id, offset) = {
            let state = self.state.lock().await;
            if !state.is_current(ticket) {
                return;
            }
            let Some(feed) = state.feed(kind) else {
                return;
            };
            let Some(tail) = feed.posts.last() else {
                return;
            };
            (tail.id.clone(), feed.posts.len())
        };
        tracing::debug!("Loading posts older than {} on {} feed", last_id, kind);

        let result = self.fetcher.fetch_next_page(kind, &last_id, offset).await;

        let mut state = self.state.lock().await;
        if !state.is_current(ticket) {
            return;
        }
        let feed = state.feed_mut(kind);
        feed.is_loading_older = false;
        match result {
            Ok(page) => {
                if feed.posts.last().map(|post| &post.id) != Some(&last_id) {
                    tracing::debug!("Tail of {} feed moved during load, page dropped", kind);
                } else {
                    let len = page.len();
                    let added = feed.posts.append(page);
                    feed.update_paging(Some(len), self.config.page_size);
                    tracing::debug!("Appended {} older posts to {} feed", added, kind);
                }
            }
            Err(error) => match classify_failure(&error, !feed.posts.is_empty()) {
                FailureOutcome::Swallow => {}
                FailureOutcome::KeepStale => {
                    tracing::warn!("Older page of {} feed failed: {}", kind, error);
                }
                FailureOutcome::Surface => {
                    let event = feed.failure_event(error);
                    for action in feed.apply(event) {
                        log_failure(kind, &action);
                    }
                }
            },
        }
        self.publish(&state);
    }
}

fn log_failure(kind: FeedKind, action: &PhaseAction) {
    match action {
        PhaseAction::Surface(error) => tracing::warn!("{} feed failed: {}", kind, error),
        PhaseAction::LogStale(error) => {
            tracing::warn!("{} feed sync failed, keeping stale posts: {}", kind, error)
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorError;
    use crate::fetcher::MockStatusFetcher;
    use timeline_core::{FeedPhase, IgnoreReason};
    use timeline_types::CacheSnapshot;

    struct Harness {
        controller: TimelineSyncController<MockStatusFetcher>,
        fetcher: MockStatusFetcher,
        cache: InMemoryCache,
        markers: InMemoryMarkers,
    }

    fn harness(config: TimelineConfig) -> Harness {
        let fetcher = MockStatusFetcher::new(config.page_size);
        let cache = InMemoryCache::new();
        let markers = InMemoryMarkers::new();
        let controller = TimelineSyncController::builder(config, fetcher.clone())
            .with_cache(cache.clone())
            .with_markers(markers.clone())
            .with_account("alice")
            .build();
        Harness {
            controller,
            fetcher,
            cache,
            markers,
        }
    }

    fn posts(ids: std::ops::RangeInclusive<u32>) -> Vec<Post> {
        ids.map(|id| Post::new(id.to_string())).collect()
    }

    fn id(value: u32) -> PostId {
        PostId::new(value.to_string())
    }

    fn ids(feed: &FeedSnapshot) -> Vec<u32> {
        feed.posts
            .iter()
            .map(|post| post.id.as_str().parse().unwrap())
            .collect()
    }

    fn desc(high: u32, low: u32) -> Vec<u32> {
        (low..=high).rev().collect()
    }

    fn update(kind: FeedKind, post_id: u32) -> StreamEvent {
        StreamEvent::Update {
            kind,
            post: Post::new(post_id.to_string()),
        }
    }

    // ===========================================
    // First Load and Catch-up Tests
    // ===========================================

    #[tokio::test]
    async fn first_load_with_nothing_newer_settles_ready() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=30));

        assert!(h.controller.select_kind(FeedKind::Local).await.wait().await);

        let snapshot = h.controller.snapshot().await;
        assert_eq!(snapshot.active_kind, FeedKind::Local);
        assert_eq!(snapshot.feed.phase, FeedPhase::Ready);
        assert_eq!(ids(&snapshot.feed), desc(30, 11));
        assert!(snapshot.feed.has_more, "full first page");
        assert_eq!(snapshot.feed.max_id, Some(id(11)));
        assert_eq!(snapshot.pending_count, 0);
        assert!(snapshot.can_stream_events);

        // First page, then one catch-up request from the head
        let requests = h.fetcher.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].param("min_id"), None);
        assert_eq!(requests[1].param("min_id"), Some("30"));

        let cached = h.cache.snapshot("alice", FeedKind::Local).unwrap();
        assert_eq!(cached.posts.len(), 20);
        assert_eq!(h.cache.put_count(), 1);
    }

    #[tokio::test]
    async fn short_first_page_means_no_more() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Federated, posts(1..=7));

        h.controller.select_kind(FeedKind::Federated).await.wait().await;

        let feed = h.controller.snapshot().await.feed;
        assert_eq!(ids(&feed), desc(7, 1));
        assert!(!feed.has_more);
    }

    #[tokio::test]
    async fn catch_up_merges_new_posts_into_pending() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=30));
        h.controller.select_kind(FeedKind::Local).await.wait().await;

        h.fetcher.publish(FeedKind::Local, posts(31..=37));
        assert!(h.controller.poll().await.wait().await);

        let snapshot = h.controller.snapshot().await;
        assert_eq!(snapshot.feed.phase, FeedPhase::Ready);
        assert_eq!(ids(&snapshot.feed), desc(37, 11));
        assert_eq!(snapshot.pending_count, 7);
        assert_eq!(
            snapshot.pending_ids,
            desc(37, 31).into_iter().map(id).collect::<Vec<_>>()
        );
        assert_eq!(h.cache.put_count(), 2, "merge writes through");

        // Seeing 34 implies everything older was seen too
        h.controller.post_did_appear(&id(34)).await;
        let snapshot = h.controller.snapshot().await;
        assert_eq!(snapshot.pending_count, 3);
        assert_eq!(snapshot.pending_ids, vec![id(37), id(36), id(35)]);
    }

    #[tokio::test]
    async fn catch_up_trims_tail_below_last_visible() {
        let config = TimelineConfig::default()
            .with_page_size(10)
            .with_safe_offset(2);
        let h = harness(config);
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=20));
        h.controller.select_kind(FeedKind::Local).await.wait().await;
        h.controller.post_did_appear(&id(15)).await;

        h.fetcher.publish(FeedKind::Local, posts(21..=22));
        h.controller.poll().await.wait().await;

        let feed = h.controller.snapshot().await.feed;
        assert_eq!(ids(&feed), desc(22, 13));
        assert_eq!(feed.max_id, Some(id(13)));
        assert!(feed.has_more);
    }

    #[tokio::test]
    async fn catch_up_stops_after_configured_rounds() {
        let config = TimelineConfig::default()
            .with_page_size(2)
            .with_max_pages(1)
            .with_catch_up_rounds(2);
        let h = harness(config);
        h.fetcher.set_timeline(FeedKind::Federated, posts(1..=2));
        h.controller.select_kind(FeedKind::Federated).await.wait().await;

        h.fetcher.publish(FeedKind::Federated, posts(3..=10));
        h.fetcher.clear_requests();
        h.controller.poll().await.wait().await;

        let feed = h.controller.snapshot().await.feed;
        assert_eq!(ids(&feed), desc(6, 1));
        assert_eq!(feed.phase, FeedPhase::Ready);
        assert_eq!(h.fetcher.request_count(), 2);
    }

    // ===========================================
    // Live Event Tests
    // ===========================================

    #[tokio::test]
    async fn live_update_for_present_post_changes_nothing() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));
        h.controller.select_kind(FeedKind::Local).await.wait().await;

        let outcome = h.controller.handle_stream_event(update(FeedKind::Local, 5)).await;
        assert_eq!(outcome, RouteOutcome::Unchanged);
        let snapshot = h.controller.snapshot().await;
        assert_eq!(ids(&snapshot.feed), desc(5, 1));
        assert_eq!(snapshot.pending_count, 0);

        let outcome = h.controller.handle_stream_event(update(FeedKind::Local, 6)).await;
        assert_eq!(outcome, RouteOutcome::Inserted(id(6)));
        let snapshot = h.controller.snapshot().await;
        assert_eq!(ids(&snapshot.feed), desc(6, 1));
        assert_eq!(snapshot.pending_ids, vec![id(6)]);
    }

    #[tokio::test]
    async fn delete_of_absent_post_is_noop() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));
        h.controller.select_kind(FeedKind::Local).await.wait().await;

        let absent = StreamEvent::Delete {
            kind: FeedKind::Local,
            id: id(99),
        };
        assert_eq!(
            h.controller.handle_stream_event(absent).await,
            RouteOutcome::Unchanged
        );
        assert_eq!(ids(&h.controller.snapshot().await.feed), desc(5, 1));

        let present = StreamEvent::Delete {
            kind: FeedKind::Local,
            id: id(3),
        };
        assert_eq!(
            h.controller.handle_stream_event(present).await,
            RouteOutcome::Deleted(id(3))
        );
        assert_eq!(ids(&h.controller.snapshot().await.feed), vec![5, 4, 2, 1]);
    }

    #[tokio::test]
    async fn live_edit_replaces_in_place_once_per_revision() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));
        h.controller.select_kind(FeedKind::Local).await.wait().await;

        let edit = StreamEvent::Edit {
            kind: FeedKind::Local,
            post: Post::new("3").edited(1_000),
        };
        assert_eq!(
            h.controller.handle_stream_event(edit.clone()).await,
            RouteOutcome::Edited(id(3))
        );
        assert_eq!(
            h.controller.handle_stream_event(edit).await,
            RouteOutcome::Unchanged
        );

        let feed = h.controller.snapshot().await.feed;
        assert_eq!(ids(&feed), desc(5, 1));
        assert_eq!(feed.posts[2].edited_at, Some(1_000));
    }

    #[tokio::test]
    async fn events_outside_the_active_live_feed_are_ignored() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));
        h.fetcher.set_timeline(FeedKind::Federated, posts(1..=5));

        // Live kind never selected
        assert_eq!(
            h.controller.handle_stream_event(update(FeedKind::Local, 6)).await,
            RouteOutcome::Ignored(IgnoreReason::Inactive)
        );

        h.controller.select_kind(FeedKind::Federated).await.wait().await;
        assert_eq!(
            h.controller
                .handle_stream_event(update(FeedKind::Federated, 6))
                .await,
            RouteOutcome::Ignored(IgnoreReason::NotLiveKind)
        );
        assert_eq!(ids(&h.controller.snapshot().await.feed), desc(5, 1));
    }

    #[tokio::test]
    async fn events_wait_for_catch_up() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));
        h.controller.select_kind(FeedKind::Local).await.wait().await;

        let mut gate = h.fetcher.hold_next();
        let task = h.controller.poll().await;
        assert!(gate.entered().await);

        assert!(!h.controller.can_stream_events().await);
        assert!(!h.controller.snapshot().await.can_stream_events);
        assert_eq!(
            h.controller.handle_stream_event(update(FeedKind::Local, 6)).await,
            RouteOutcome::Ignored(IgnoreReason::CatchUpInFlight)
        );

        gate.release();
        assert!(task.wait().await);
        assert!(h.controller.can_stream_events().await);
    }

    #[tokio::test]
    async fn events_wait_for_first_load() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));

        let mut gate = h.fetcher.hold_next();
        let task = h.controller.select_kind(FeedKind::Local).await;
        assert!(gate.entered().await);

        assert!(!h.controller.snapshot().await.can_stream_events);
        h.fetcher.publish(FeedKind::Local, posts(6..=6));
        assert_eq!(
            h.controller.handle_stream_event(update(FeedKind::Local, 6)).await,
            RouteOutcome::Ignored(IgnoreReason::CatchUpInFlight)
        );

        gate.release();
        assert!(task.wait().await);

        let snapshot = h.controller.snapshot().await;
        assert!(snapshot.can_stream_events);
        assert_eq!(ids(&snapshot.feed), desc(6, 1));
    }

    #[tokio::test]
    async fn events_wait_between_first_page_and_catch_up() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=30));

        // First page 30..11 is applied, the cache write stalls before catch-up
        let mut gate = h.cache.hold_next_put();
        let task = h.controller.select_kind(FeedKind::Local).await;
        assert!(gate.entered().await);
        assert_eq!(ids(&h.controller.snapshot().await.feed), desc(30, 11));

        h.fetcher.publish(FeedKind::Local, posts(31..=36));
        assert_eq!(
            h.controller.handle_stream_event(update(FeedKind::Local, 36)).await,
            RouteOutcome::Ignored(IgnoreReason::CatchUpInFlight)
        );

        gate.release();
        assert!(task.wait().await);

        let snapshot = h.controller.snapshot().await;
        assert_eq!(snapshot.feed.phase, FeedPhase::Ready);
        assert_eq!(ids(&snapshot.feed), desc(36, 11), "no gap below the head");
        assert_eq!(snapshot.pending_count, 6);
        assert!(snapshot.can_stream_events);
    }

    #[tokio::test]
    async fn events_wait_for_resume() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=130));
        h.markers.seed(Marker::new(FeedKind::Local, "100"));

        let mut gate = h.fetcher.hold_next();
        let task = h.controller.resume().await;
        assert!(gate.entered().await);

        h.fetcher.publish(FeedKind::Local, posts(131..=131));
        assert_eq!(
            h.controller.handle_stream_event(update(FeedKind::Local, 131)).await,
            RouteOutcome::Ignored(IgnoreReason::CatchUpInFlight)
        );

        gate.release();
        assert!(task.wait().await);

        let snapshot = h.controller.snapshot().await;
        assert_eq!(ids(&snapshot.feed), desc(131, 80));
        assert_eq!(snapshot.pending_count, 31);
        assert!(snapshot.can_stream_events);
    }

    // ===========================================
    // Cancellation Tests
    // ===========================================

    #[tokio::test]
    async fn switching_kind_drops_the_superseded_load() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));
        h.fetcher.set_timeline(FeedKind::Federated, posts(101..=105));

        let mut gate = h.fetcher.hold_next();
        let local = h.controller.select_kind(FeedKind::Local).await;
        assert!(gate.entered().await);

        assert!(h.controller.select_kind(FeedKind::Federated).await.wait().await);
        gate.release();
        assert!(!local.wait().await, "superseded task is cancelled");

        let local_feed = h.controller.feed_snapshot(FeedKind::Local).await.unwrap();
        assert!(local_feed.posts.is_empty());
        assert_eq!(local_feed.phase, FeedPhase::Idle);
        assert!(!local_feed.is_active);

        let snapshot = h.controller.snapshot().await;
        assert_eq!(snapshot.active_kind, FeedKind::Federated);
        assert_eq!(ids(&snapshot.feed), desc(105, 101));
    }

    #[tokio::test]
    async fn late_result_after_refresh_is_dropped() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));

        let mut gate = h.fetcher.hold_next();
        let first = h.controller.select_kind(FeedKind::Local).await;
        assert!(gate.entered().await);

        // The refresh starts after the first load was issued and finishes first
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=8));
        assert!(h.controller.pull_to_refresh().await.wait().await);

        gate.release();
        assert!(!first.wait().await);

        let feed = h.controller.snapshot().await.feed;
        assert_eq!(ids(&feed), desc(8, 1));
        assert_eq!(feed.phase, FeedPhase::Ready);
    }

    #[tokio::test]
    async fn switch_account_resets_everything() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));
        h.controller.select_kind(FeedKind::Local).await.wait().await;
        h.controller.handle_stream_event(update(FeedKind::Local, 6)).await;

        h.controller.switch_account("bob").await;

        let snapshot = h.controller.snapshot().await;
        assert_eq!(snapshot.account_id, "bob");
        assert!(snapshot.feed.posts.is_empty());
        assert_eq!(snapshot.feed.phase, FeedPhase::Idle);
        assert_eq!(snapshot.pending_count, 0);

        // Reloads instead of restoring, writing to bob's cache
        let task = h.controller.select_kind(FeedKind::Local).await;
        assert!(!task.is_noop());
        task.wait().await;
        assert!(h.cache.snapshot("bob", FeedKind::Local).is_some());
        assert_eq!(ids(&h.controller.snapshot().await.feed), desc(5, 1));
    }

    // ===========================================
    // Resume and Latest Tests
    // ===========================================

    #[tokio::test]
    async fn resume_anchors_on_marker_then_reaches_head() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=130));
        h.markers.seed(Marker::new(FeedKind::Local, "100"));

        assert!(h.controller.select_kind(FeedKind::Resume).await.wait().await);

        let requests = h.fetcher.requests();
        assert_eq!(requests[0].param("max_id"), Some("100"));

        let snapshot = h.controller.snapshot().await;
        assert_eq!(snapshot.active_kind, FeedKind::Local);
        assert_eq!(snapshot.feed.phase, FeedPhase::Ready);
        assert_eq!(ids(&snapshot.feed), desc(130, 80));
        assert_eq!(snapshot.pending_count, 30, "everything above the marker is unseen");
        assert!(!snapshot.pending_ids.contains(&id(100)), "the marker post was read");
        assert_eq!(snapshot.resume_marker, None);
    }

    #[tokio::test]
    async fn resume_without_marker_is_plain_activation() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=3));

        h.controller.resume().await.wait().await;

        assert_eq!(h.fetcher.requests()[0].param("max_id"), None);
        let feed = h.controller.snapshot().await.feed;
        assert_eq!(ids(&feed), desc(3, 1));
        assert_eq!(feed.phase, FeedPhase::Ready);
    }

    #[tokio::test]
    async fn resume_without_marker_restores_fresh_feed() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));
        h.controller.select_kind(FeedKind::Local).await.wait().await;
        let issued = h.fetcher.request_count();

        assert!(h.controller.resume().await.wait().await);

        assert_eq!(h.fetcher.request_count(), issued);
        let snapshot = h.controller.snapshot().await;
        assert_eq!(snapshot.feed.phase, FeedPhase::Ready);
        assert_eq!(ids(&snapshot.feed), desc(5, 1));
        assert!(snapshot.can_stream_events);
    }

    #[tokio::test]
    async fn unreadable_marker_falls_back_to_activation() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=3));
        h.markers.seed(Marker::new(FeedKind::Local, "2"));
        h.markers
            .fail_next_get(CollaboratorError::Unavailable("offline".into()));

        h.controller.resume().await.wait().await;

        assert_eq!(ids(&h.controller.snapshot().await.feed), desc(3, 1));
    }

    #[tokio::test]
    async fn latest_discards_posts_and_pending() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));
        h.controller.select_kind(FeedKind::Local).await.wait().await;
        h.controller.handle_stream_event(update(FeedKind::Local, 42)).await;
        assert_eq!(h.controller.snapshot().await.pending_count, 1);

        assert!(h.controller.select_kind(FeedKind::Latest).await.wait().await);

        let snapshot = h.controller.snapshot().await;
        assert_eq!(snapshot.active_kind, FeedKind::Local);
        assert_eq!(ids(&snapshot.feed), desc(5, 1));
        assert_eq!(snapshot.pending_count, 0);
    }

    // ===========================================
    // Tab Switch and Marker Tests
    // ===========================================

    #[tokio::test]
    async fn fresh_feed_is_restored_without_fetching() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));
        h.fetcher.set_timeline(FeedKind::Federated, posts(1..=5));
        h.controller.select_kind(FeedKind::Local).await.wait().await;
        h.controller.select_kind(FeedKind::Federated).await.wait().await;
        let issued = h.fetcher.request_count();

        let task = h.controller.select_kind(FeedKind::Local).await;
        assert!(task.is_noop());
        assert_eq!(h.fetcher.request_count(), issued);

        let feed = h.controller.snapshot().await.feed;
        assert_eq!(feed.phase, FeedPhase::Ready);
        assert!(feed.is_active);
        assert_eq!(ids(&feed), desc(5, 1));
    }

    #[tokio::test]
    async fn stale_feed_catches_up_on_reactivation() {
        let h = harness(TimelineConfig::default().with_refresh_ttl_secs(0));
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));
        h.fetcher.set_timeline(FeedKind::Federated, posts(1..=5));
        h.controller.select_kind(FeedKind::Local).await.wait().await;
        h.controller.select_kind(FeedKind::Federated).await.wait().await;
        h.fetcher.publish(FeedKind::Local, posts(6..=6));
        h.fetcher.clear_requests();

        h.controller.select_kind(FeedKind::Local).await.wait().await;

        let requests = h.fetcher.requests();
        assert!(requests.iter().all(|r| r.param("min_id").is_some()));
        assert_eq!(ids(&h.controller.snapshot().await.feed), desc(6, 1));
    }

    #[tokio::test]
    async fn leaving_live_feed_writes_marker() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=30));
        h.fetcher.set_timeline(FeedKind::Federated, posts(1..=3));
        h.fetcher.set_timeline(FeedKind::Following, posts(1..=3));
        h.controller.select_kind(FeedKind::Local).await.wait().await;
        h.controller.post_did_appear(&id(25)).await;
        h.controller.post_did_appear(&id(27)).await;
        h.controller.post_did_disappear(&id(27)).await;
        h.controller.post_did_appear(&id(26)).await;

        h.controller.select_kind(FeedKind::Federated).await.wait().await;
        assert!(h.markers.wait_for_writes(1).await);
        assert_eq!(h.markers.writes(), vec![(FeedKind::Local, id(26))]);

        // Following is exempt
        h.controller.select_kind(FeedKind::Local).await.wait().await;
        h.controller.select_kind(FeedKind::Following).await.wait().await;
        assert!(!h.markers.wait_for_writes(2).await);
    }

    #[tokio::test]
    async fn marker_write_failure_is_swallowed() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=3));
        h.fetcher.set_timeline(FeedKind::Federated, posts(1..=3));
        h.controller.select_kind(FeedKind::Local).await.wait().await;
        h.controller.post_did_appear(&id(3)).await;
        h.markers
            .fail_next_set(CollaboratorError::Rejected("403".into()));

        h.controller.select_kind(FeedKind::Federated).await.wait().await;
        assert!(h.markers.wait_for_writes(1).await);

        let snapshot = h.controller.snapshot().await;
        assert_eq!(snapshot.feed.phase, FeedPhase::Ready);
        assert!(h.markers.marker(FeedKind::Local).is_none());
    }

    // ===========================================
    // Failure Policy Tests
    // ===========================================

    #[tokio::test]
    async fn auth_failure_surfaces_even_with_posts() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));
        h.controller.select_kind(FeedKind::Local).await.wait().await;

        let revoked = TimelineError::Auth("token revoked".into());
        h.fetcher.fail_next(revoked.clone());
        h.controller.pull_to_refresh().await.wait().await;

        let snapshot = h.controller.snapshot().await;
        assert_eq!(snapshot.feed.phase, FeedPhase::Failed(revoked.clone()));
        assert_eq!(snapshot.feed.error, Some(revoked));
        assert!(!snapshot.feed.is_loading);
        assert_eq!(ids(&snapshot.feed), desc(5, 1));
        assert!(snapshot.can_stream_events);
    }

    #[tokio::test]
    async fn transport_failure_keeps_stale_posts() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));
        h.controller.select_kind(FeedKind::Local).await.wait().await;

        h.fetcher
            .fail_next(TimelineError::Transport("timed out".into()));
        h.controller.poll().await.wait().await;

        let snapshot = h.controller.snapshot().await;
        assert_eq!(snapshot.feed.phase, FeedPhase::Ready);
        assert_eq!(snapshot.feed.error, None);
        assert_eq!(ids(&snapshot.feed), desc(5, 1));
        assert!(snapshot.can_stream_events);
    }

    #[tokio::test]
    async fn failure_on_empty_feed_surfaces_and_retry_recovers() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));
        let offline = TimelineError::Transport("offline".into());
        h.fetcher.fail_next(offline.clone());

        h.controller.select_kind(FeedKind::Local).await.wait().await;
        let feed = h.controller.snapshot().await.feed;
        assert_eq!(feed.error, Some(offline));
        assert!(feed.posts.is_empty());

        h.controller.retry().await.wait().await;
        let feed = h.controller.snapshot().await.feed;
        assert_eq!(feed.error, None);
        assert_eq!(feed.phase, FeedPhase::Ready);
        assert_eq!(ids(&feed), desc(5, 1));
    }

    #[tokio::test]
    async fn cancelled_fetch_is_never_shown() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=5));
        h.fetcher.fail_next(TimelineError::Cancelled);

        h.controller.select_kind(FeedKind::Local).await.wait().await;

        let feed = h.controller.snapshot().await.feed;
        assert_eq!(feed.error, None);
        assert_eq!(feed.phase, FeedPhase::Idle);
    }

    // ===========================================
    // Cache Tests
    // ===========================================

    fn seed_cache(cache: &InMemoryCache, ids: std::ops::RangeInclusive<u32>) {
        cache.seed(CacheSnapshot {
            account_id: "alice".into(),
            feed_kind: FeedKind::Local,
            posts: posts(ids).into_iter().rev().collect(),
            stored_at: 1,
        });
    }

    #[tokio::test]
    async fn cache_paints_while_first_page_is_in_flight() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=10));
        seed_cache(&h.cache, 1..=3);
        let mut rx = h.controller.subscribe();

        let mut gate = h.fetcher.hold_next();
        let task = h.controller.select_kind(FeedKind::Local).await;
        assert!(gate.entered().await);
        rx.wait_for(|s| !s.feed.posts.is_empty()).await.unwrap();

        let feed = h.controller.snapshot().await.feed;
        assert_eq!(ids(&feed), desc(3, 1));
        assert!(feed.is_loading);

        gate.release();
        task.wait().await;

        let feed = h.controller.snapshot().await.feed;
        assert_eq!(ids(&feed), desc(10, 1), "network supersedes the cache");
        let cached = h.cache.snapshot("alice", FeedKind::Local).unwrap();
        assert_eq!(cached.posts.len(), 10);
    }

    #[tokio::test]
    async fn late_cache_read_never_overwrites_network() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=10));
        seed_cache(&h.cache, 1..=3);
        let mut rx = h.controller.subscribe();

        let mut cache_gate = h.cache.hold_next_get();
        let task = h.controller.select_kind(FeedKind::Local).await;
        assert!(cache_gate.entered().await);
        rx.wait_for(|s| s.feed.posts.len() == 10).await.unwrap();

        cache_gate.release();
        task.wait().await;

        let feed = h.controller.snapshot().await.feed;
        assert_eq!(ids(&feed), desc(10, 1));
        assert_eq!(feed.phase, FeedPhase::Ready);
    }

    #[tokio::test]
    async fn cache_failures_do_not_affect_the_feed() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=4));
        h.cache
            .fail_next_get(CollaboratorError::Unavailable("corrupt".into()));
        h.cache
            .fail_next_put(CollaboratorError::Unavailable("disk full".into()));

        h.controller.select_kind(FeedKind::Local).await.wait().await;

        let feed = h.controller.snapshot().await.feed;
        assert_eq!(feed.phase, FeedPhase::Ready);
        assert_eq!(ids(&feed), desc(4, 1));
        assert!(h.cache.snapshot("alice", FeedKind::Local).is_none());
    }

    #[tokio::test]
    async fn jump_to_latest_never_paints_from_cache() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=4));
        h.controller.select_kind(FeedKind::Local).await.wait().await;
        seed_cache(&h.cache, 1..=2);

        let mut gate = h.fetcher.hold_next();
        let task = h.controller.jump_to_latest().await;
        assert!(gate.entered().await);

        let feed = h.controller.snapshot().await.feed;
        assert!(feed.posts.is_empty());
        assert!(feed.is_loading);

        gate.release();
        task.wait().await;
        assert_eq!(ids(&h.controller.snapshot().await.feed), desc(4, 1));
    }

    // ===========================================
    // Paging Tests
    // ===========================================

    #[tokio::test]
    async fn load_older_appends_until_the_tail() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Federated, posts(1..=50));
        h.controller.select_kind(FeedKind::Federated).await.wait().await;

        assert!(h.controller.load_older().await.wait().await);
        assert_eq!(h.fetcher.last_request().unwrap().param("max_id"), Some("31"));
        let feed = h.controller.snapshot().await.feed;
        assert_eq!(ids(&feed), desc(50, 11));
        assert!(feed.has_more);
        assert!(!feed.is_loading_older);

        h.controller.load_older().await.wait().await;
        let feed = h.controller.snapshot().await.feed;
        assert_eq!(ids(&feed), desc(50, 1));
        assert!(!feed.has_more);

        assert!(h.controller.load_older().await.is_noop());
    }

    #[tokio::test]
    async fn trending_pages_by_offset() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Trending, posts(1..=30));
        h.controller.select_kind(FeedKind::Trending).await.wait().await;

        h.controller.load_older().await.wait().await;

        let request = h.fetcher.last_request().unwrap();
        assert_eq!(request.path, "trends/statuses");
        assert_eq!(request.param("offset"), Some("20"));
        assert_eq!(ids(&h.controller.snapshot().await.feed), desc(30, 1));
    }

    #[tokio::test]
    async fn trending_catches_up_above_the_head() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Trending, posts(1..=30));
        h.controller.select_kind(FeedKind::Trending).await.wait().await;
        h.fetcher.clear_requests();

        h.fetcher.publish(FeedKind::Trending, posts(31..=33));
        h.controller.poll().await.wait().await;

        assert_eq!(h.fetcher.requests()[0].param("min_id"), Some("30"));
        assert_eq!(ids(&h.controller.snapshot().await.feed), desc(33, 11));
    }

    #[tokio::test]
    async fn older_page_failure_keeps_posts() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Federated, posts(1..=30));
        h.controller.select_kind(FeedKind::Federated).await.wait().await;

        h.fetcher
            .fail_next(TimelineError::Decode("unexpected token".into()));
        h.controller.load_older().await.wait().await;

        let feed = h.controller.snapshot().await.feed;
        assert_eq!(feed.phase, FeedPhase::Ready);
        assert!(!feed.is_loading_older);
        assert!(feed.has_more);
        assert_eq!(ids(&feed), desc(30, 11));
    }

    #[tokio::test]
    async fn nothing_runs_before_a_kind_is_selected() {
        let h = harness(TimelineConfig::default());
        assert!(h.controller.poll().await.is_noop());
        assert!(h.controller.load_older().await.is_noop());
        assert!(h.controller.pull_to_refresh().await.is_noop());
        assert_eq!(h.fetcher.request_count(), 0);
    }

    // ===========================================
    // Snapshot Tests
    // ===========================================

    #[tokio::test]
    async fn snapshots_follow_every_mutation() {
        let h = harness(TimelineConfig::default());
        h.fetcher.set_timeline(FeedKind::Local, posts(1..=3));
        let mut rx = h.controller.subscribe();
        assert_eq!(rx.borrow_and_update().feed.phase, FeedPhase::Idle);

        h.controller.select_kind(FeedKind::Local).await.wait().await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().feed.phase, FeedPhase::Ready);

        h.controller.handle_stream_event(update(FeedKind::Local, 4)).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().pending_count, 1);
    }

    #[tokio::test]
    async fn filter_hides_posts_from_snapshots_only() {
        let fetcher = MockStatusFetcher::new(20);
        fetcher.set_timeline(FeedKind::Local, posts(1..=4));
        let controller = TimelineSyncController::builder(TimelineConfig::default(), fetcher)
            .with_filter(|post: &Post| post.id.as_str() != "3")
            .build();

        controller.select_kind(FeedKind::Local).await.wait().await;

        assert_eq!(ids(&controller.snapshot().await.feed), vec![4, 2, 1]);
        // Still stored, so a duplicate push is not re-inserted
        assert_eq!(
            controller
                .handle_stream_event(update(FeedKind::Local, 3))
                .await,
            RouteOutcome::Unchanged
        );
    }
}
