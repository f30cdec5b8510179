pub mod youtube;

#[cfg(test)]
pub(crate) mod mock;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One loosely-typed record as returned by the catalog's search.
///
/// Nothing about its shape is guaranteed; the normalizer probes every field.
pub type RawItem = serde_json::Value;

/// A provider-defined playlist document, passed through to clients untouched.
pub type PlaylistDocument = serde_json::Value;

/// The kind of entity a canonical search result describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Song,
    Album,
    Playlist,
    Video,
    Podcast,
    Episode,
}

impl ResultType {
    /// Every result type, in the priority order used when matching category hints.
    pub const PRIORITY: [ResultType; 6] = [
        ResultType::Song,
        ResultType::Album,
        ResultType::Playlist,
        ResultType::Podcast,
        ResultType::Episode,
        ResultType::Video,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Song => "song",
            ResultType::Album => "album",
            ResultType::Playlist => "playlist",
            ResultType::Video => "video",
            ResultType::Podcast => "podcast",
            ResultType::Episode => "episode",
        }
    }

    /// Name of the response bucket holding results of this type
    pub fn plural(&self) -> &'static str {
        match self {
            ResultType::Song => "songs",
            ResultType::Album => "albums",
            ResultType::Playlist => "playlists",
            ResultType::Video => "videos",
            ResultType::Podcast => "podcasts",
            ResultType::Episode => "episodes",
        }
    }
}

impl std::fmt::Display for ResultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalResult {
    /// Provider-unique identifier, never empty
    pub id: String,
    /// Whitespace-trimmed title, never empty
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(rename = "type")]
    pub result_type: ResultType,
    /// Display duration such as "3:45", empty when unknown
    #[serde(default)]
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
}

/// Results grouped by the plural of their type ("songs", "albums", ...)
pub type Categories = BTreeMap<String, Vec<CanonicalResult>>;

/// A categorized search response as served over HTTP and WebSocket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub categories: Categories,
    /// Whether this response was served from the search cache
    pub cached: bool,
    pub total: usize,
}

impl SearchResponse {
    /// Build a fresh (uncached) response; `total` is derived from the buckets.
    pub fn new(categories: Categories) -> Self {
        let total = categories.values().map(Vec::len).sum();
        Self {
            categories,
            cached: false,
            total,
        }
    }

    pub fn category(&self, result_type: ResultType) -> &[CanonicalResult] {
        self.categories
            .get(result_type.plural())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// The external music catalog.
///
/// Implementations own their query and auth mechanics; the relay only ever
/// sees loosely-typed items and documents.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Human-readable backend name (e.g., "yt-dlp")
    fn name(&self) -> &str;

    /// Search the catalog, returning at most roughly `limit` raw items in relevance order
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawItem>>;

    /// Fetch a playlist document by its bare collection id
    async fn get_playlist(&self, playlist_id: &str) -> Result<PlaylistDocument>;
}

pub use youtube::YtDlpCatalog;
