//! Replay the fixture's live events against the live feed.

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use super::{print_snapshot, Session};

/// Run the stream command.
pub async fn run(session: &Session, json: bool) -> Result<()> {
    let live_kind = session.controller.config().live_kind;
    session.select(live_kind).await?;

    let (tx, rx) = mpsc::channel(session.fixture.events.len().max(1));
    let listener = session.controller.spawn_stream_listener(rx);

    for event in &session.fixture.events {
        tx.send(event.clone())
            .await
            .context("Stream listener stopped early")?;
    }
    drop(tx);
    listener.await.context("Stream listener panicked")?;

    print_snapshot(session, json).await
}
