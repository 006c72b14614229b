//! Continue the live feed from the stored read marker.

use anyhow::Result;
use timeline_types::{FeedKind, Marker};

use super::{print_snapshot, Session};

/// Run the resume command.
///
/// `marker` overrides whatever read marker the fixture stored.
pub async fn run(session: &Session, marker: Option<&str>, json: bool) -> Result<()> {
    let live_kind = session.controller.config().live_kind;
    if let Some(id) = marker {
        session.markers.seed(Marker::new(live_kind, id));
    }
    match session.markers.marker(live_kind) {
        Some(marker) => tracing::info!("Resuming {} from {}", live_kind, marker.last_read_id),
        None => tracing::info!("No marker stored for {}", live_kind),
    }

    session.select(FeedKind::Resume).await?;
    print_snapshot(session, json).await
}
