//! Background tasks feeding the controller.
//!
//! The poller drives a scheduled catch-up of the selected feed; the stream
//! listener applies live push events as they arrive.

use crate::controller::TimelineSyncController;
use crate::fetcher::StatusFetcher;
use std::time::Duration;
use timeline_types::StreamEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Spawn the scheduled poller.
///
/// Every `poll_interval_secs` the selected feed catches up if it is idle.
/// An interval of 0 disables polling. Returns a handle that can be used to
/// abort the task.
pub fn spawn_poller<F: StatusFetcher + 'static>(
    controller: TimelineSyncController<F>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval_secs = controller.config().poll_interval_secs;
        if interval_secs == 0 {
            tracing::info!("Poller disabled");
            return;
        }
        tracing::info!("Poller started (interval: {}s)", interval_secs);

        let mut timer = interval(Duration::from_secs(interval_secs));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        timer.tick().await;

        loop {
            timer.tick().await;
            let task = controller.poll().await;
            if task.is_noop() {
                tracing::debug!("Poll skipped: feed busy or not ready");
                continue;
            }
            task.wait().await;
        }
    })
}

/// Spawn a listener applying every event from `events`.
///
/// The task ends when the sending side of the subscription is dropped.
pub fn spawn_stream_listener<F: StatusFetcher + 'static>(
    controller: TimelineSyncController<F>,
    mut events: mpsc::Receiver<StreamEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Stream listener attached");
        while let Some(event) = events.recv().await {
            let outcome = controller.handle_stream_event(event).await;
            tracing::trace!("Stream event routed: {:?}", outcome);
        }
        tracing::info!("Stream closed");
    })
}

impl<F: StatusFetcher + 'static> TimelineSyncController<F> {
    /// Start polling the selected feed on the configured interval.
    pub fn spawn_poller(&self) -> JoinHandle<()> {
        spawn_poller(self.clone())
    }

    /// Attach a live event subscription.
    pub fn spawn_stream_listener(&self, events: mpsc::Receiver<StreamEvent>) -> JoinHandle<()> {
        spawn_stream_listener(self.clone(), events)
    }
}
