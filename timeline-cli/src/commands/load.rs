//! Select a feed and show what the first load produced.

use anyhow::Result;
use timeline_types::FeedKind;

use super::{print_snapshot, Session};

/// Run the load command.
pub async fn run(session: &Session, kind: FeedKind, json: bool) -> Result<()> {
    session.select(kind).await?;
    print_snapshot(session, json).await
}
