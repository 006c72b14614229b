//! CLI command implementations.

pub mod load;
pub mod older;
pub mod refresh;
pub mod resume;
pub mod show_config;
pub mod stream;

use anyhow::{Context, Result};
use std::path::Path;
use timeline_client::{
    InMemoryMarkers, MockStatusFetcher, TimelineConfig, TimelineSnapshot, TimelineSyncController,
};
use timeline_types::FeedKind;

use crate::fixture::Fixture;

/// A controller wired to a fixture-scripted server.
pub struct Session {
    /// The controller under test.
    pub controller: TimelineSyncController<MockStatusFetcher>,
    /// Scripted server, shared with the controller.
    pub fetcher: MockStatusFetcher,
    /// Read markers, shared with the controller.
    pub markers: InMemoryMarkers,
    /// The loaded fixture.
    pub fixture: Fixture,
}

impl Session {
    /// Load the fixture and optional config file, then build a controller.
    pub async fn open(fixture_path: &Path, config_path: Option<&Path>) -> Result<Self> {
        let config = load_config(config_path)?;
        let fixture = Fixture::load(fixture_path).await?;
        Self::with_fixture(config, fixture)
    }

    /// Build a controller around an already loaded fixture.
    pub fn with_fixture(config: TimelineConfig, fixture: Fixture) -> Result<Self> {
        let fetcher = MockStatusFetcher::new(config.page_size);
        fixture.install(&fetcher)?;

        let markers = InMemoryMarkers::new();
        fixture.seed_markers(&markers);

        let mut builder = TimelineSyncController::builder(config, fetcher.clone())
            .with_markers(markers.clone());
        if let Some(account) = &fixture.account {
            builder = builder.with_account(account.clone());
        }

        Ok(Self {
            controller: builder.build(),
            fetcher,
            markers,
            fixture,
        })
    }

    /// Select `kind` and wait for its load to settle.
    pub async fn select(&self, kind: FeedKind) -> Result<()> {
        tracing::info!("Selecting {}", kind);
        if !self.controller.select_kind(kind).await.wait().await {
            anyhow::bail!("Load of {} was cancelled", kind);
        }
        Ok(())
    }
}

/// Load the config file, or defaults when none was given.
pub fn load_config(path: Option<&Path>) -> Result<TimelineConfig> {
    match path {
        Some(path) => TimelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(TimelineConfig::default()),
    }
}

/// Render a snapshot as pretty JSON or as a short text summary.
pub fn render(snapshot: &TimelineSnapshot, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(snapshot).context("Failed to encode snapshot");
    }

    let feed = &snapshot.feed;
    let mut out = String::new();
    out.push_str(&format!("=== {} ({}) ===\n", snapshot.active_kind, snapshot.account_id));
    out.push_str(&format!("Phase:    {:?}\n", feed.phase));
    out.push_str(&format!("Posts:    {}\n", feed.posts.len()));
    out.push_str(&format!("Has more: {}\n", feed.has_more));
    out.push_str(&format!("Pending:  {}\n", snapshot.pending_count));
    if let Some(error) = &feed.error {
        out.push_str(&format!("Error:    {}\n", error));
    }
    out.push('\n');
    for post in &feed.posts {
        let marker = if snapshot.pending_ids.contains(&post.id) {
            "*"
        } else {
            " "
        };
        out.push_str(&format!("{} {}\n", marker, post.id));
    }
    Ok(out)
}

/// Print the current snapshot.
pub async fn print_snapshot(session: &Session, json: bool) -> Result<()> {
    let snapshot = session.controller.snapshot().await;
    print!("{}", render(&snapshot, json)?);
    Ok(())
}
