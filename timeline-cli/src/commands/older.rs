//! Scroll back through older pages.

use anyhow::Result;
use timeline_types::FeedKind;

use super::{print_snapshot, Session};

/// Run the older command, loading up to `pages` older pages.
pub async fn run(session: &Session, kind: FeedKind, pages: usize, json: bool) -> Result<()> {
    session.select(kind).await?;

    for page in 1..=pages {
        let task = session.controller.load_older().await;
        if task.is_noop() {
            tracing::info!("No older page after {} loads", page - 1);
            break;
        }
        task.wait().await;
    }

    print_snapshot(session, json).await
}
