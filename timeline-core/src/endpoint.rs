//! Endpoint resolution: which request a feed kind and cursor map to.
//!
//! This is a pure function so that fetchers, tests and tooling all agree
//! on the request a given page corresponds to.

use serde::Serialize;
use thiserror::Error;
use timeline_types::{Cursor, FeedKind};

/// Errors from endpoint resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// Aliases resolve to a concrete kind before any fetch is issued.
    #[error("feed kind {0} is an alias and has no endpoint")]
    AliasKind(FeedKind),
}

/// A resolved fetch request: API path plus query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchDescriptor {
    /// Feed the request belongs to.
    pub kind: FeedKind,
    /// API path relative to the server's `/api/v1/`.
    pub path: &'static str,
    /// Query parameters in a stable order.
    pub query: Vec<(&'static str, String)>,
}

impl FetchDescriptor {
    /// Look up a query parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Resolve a feed kind and cursor into a fetch descriptor.
///
/// Trending pages older posts by position, so it carries `offset` instead
/// of `max_id`. Newer pages go by `min_id` on every kind.
pub fn resolve(kind: FeedKind, cursor: &Cursor) -> Result<FetchDescriptor, EndpointError> {
    let (path, mut query): (&'static str, Vec<(&'static str, String)>) = match kind {
        FeedKind::Following => ("timelines/home", Vec::new()),
        FeedKind::Local => ("timelines/public", vec![("local", "true".to_string())]),
        FeedKind::Federated => ("timelines/public", Vec::new()),
        FeedKind::Trending => ("trends/statuses", Vec::new()),
        FeedKind::Latest | FeedKind::Resume => return Err(EndpointError::AliasKind(kind)),
    };

    if kind == FeedKind::Trending {
        if let Some(offset) = cursor.offset {
            query.push(("offset", offset.to_string()));
        }
        if let Some(min_id) = &cursor.min_id {
            query.push(("min_id", min_id.to_string()));
        }
    } else {
        if let Some(max_id) = &cursor.max_id {
            query.push(("max_id", max_id.to_string()));
        }
        if let Some(min_id) = &cursor.min_id {
            query.push(("min_id", min_id.to_string()));
        }
        if let Some(since_id) = &cursor.since_id {
            query.push(("since_id", since_id.to_string()));
        }
    }
    if let Some(limit) = cursor.limit {
        query.push(("limit", limit.to_string()));
    }

    Ok(FetchDescriptor { kind, path, query })
}
