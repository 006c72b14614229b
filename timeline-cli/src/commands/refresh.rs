//! Load a feed, let the incoming posts arrive, then catch up.

use anyhow::Result;
use timeline_types::FeedKind;

use super::{print_snapshot, Session};

/// Run the refresh command.
///
/// With `poll` set the catch-up is the background poll instead of a
/// pull-to-refresh.
pub async fn run(session: &Session, kind: FeedKind, poll: bool, json: bool) -> Result<()> {
    session.select(kind).await?;

    let published = session.fixture.publish_incoming(&session.fetcher)?;
    tracing::info!("Published {} incoming posts", published);

    let task = if poll {
        session.controller.poll().await
    } else {
        session.controller.pull_to_refresh().await
    };
    if task.is_noop() {
        tracing::warn!("Feed was not ready, nothing to catch up");
    }
    task.wait().await;

    print_snapshot(session, json).await
}
