//! Fixture files describing a scripted server.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use timeline_client::{InMemoryMarkers, MockStatusFetcher};
use timeline_types::{FeedKind, Marker, Post, StreamEvent};

/// A scripted server: what each timeline holds, what arrives later, the
/// stored read markers and the live events to replay.
///
/// ```json
/// {
///   "account": "alice",
///   "timelines": { "local": [{ "id": "3" }, { "id": "2" }] },
///   "incoming": { "local": [{ "id": "4" }] },
///   "markers": [{ "feed_kind": "local", "last_read_id": "2" }],
///   "events": [{ "event": "delete", "kind": "local", "id": "3" }]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    /// Account the session runs as.
    #[serde(default)]
    pub account: Option<String>,
    /// Server timelines before the first load, keyed by kind name.
    #[serde(default)]
    pub timelines: BTreeMap<String, Vec<Post>>,
    /// Posts published after the first load, keyed by kind name.
    #[serde(default)]
    pub incoming: BTreeMap<String, Vec<Post>>,
    /// Stored read markers.
    #[serde(default)]
    pub markers: Vec<Marker>,
    /// Live events to replay.
    #[serde(default)]
    pub events: Vec<StreamEvent>,
}

impl Fixture {
    /// Load a fixture file.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        Self::from_json(&contents)
    }

    /// Parse a fixture from JSON.
    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Invalid fixture")
    }

    /// Install the initial timelines into `fetcher`.
    pub fn install(&self, fetcher: &MockStatusFetcher) -> Result<()> {
        for (kind, posts) in parse_keys(&self.timelines)? {
            fetcher.set_timeline(kind, posts);
        }
        Ok(())
    }

    /// Seed the stored read markers.
    pub fn seed_markers(&self, markers: &InMemoryMarkers) {
        for marker in &self.markers {
            markers.seed(marker.clone());
        }
    }

    /// Publish the incoming posts into `fetcher`. Returns how many were published.
    pub fn publish_incoming(&self, fetcher: &MockStatusFetcher) -> Result<usize> {
        let mut published = 0;
        for (kind, posts) in parse_keys(&self.incoming)? {
            published += posts.len();
            fetcher.publish(kind, posts);
        }
        Ok(published)
    }
}

fn parse_keys(map: &BTreeMap<String, Vec<Post>>) -> Result<Vec<(FeedKind, Vec<Post>)>> {
    map.iter()
        .map(|(name, posts)| {
            let kind: FeedKind = name
                .parse()
                .with_context(|| format!("Invalid timeline key '{}'", name))?;
            if kind.is_alias() {
                anyhow::bail!("Timeline key '{}' is not a concrete kind", name);
            }
            Ok((kind, posts.clone()))
        })
        .collect()
}
