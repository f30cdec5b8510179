use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::TtlCache;
use crate::error::{RelayError, Result};
use crate::normalize::{strip_collection_prefix, UNKNOWN_ARTIST};
use crate::service::{CatalogProvider, PlaylistDocument};

/// The first track of a playlist that can actually be played
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayableTrack {
    pub video_id: String,
    pub title: String,
    pub artist: String,
}

/// Cache-or-fetch access to playlist documents
pub struct PlaylistService {
    catalog: Arc<dyn CatalogProvider>,
    cache: TtlCache<String, PlaylistDocument>,
}

impl PlaylistService {
    pub fn new(catalog: Arc<dyn CatalogProvider>, ttl: Duration) -> Self {
        Self {
            catalog,
            cache: TtlCache::new(ttl),
        }
    }

    /// Strip the collection prefix clients sometimes send along with the id
    pub fn normalize_id(playlist_id: &str) -> Result<String> {
        let id = strip_collection_prefix(playlist_id.trim());
        if id.is_empty() {
            return Err(RelayError::validation("Playlist id must not be empty"));
        }
        Ok(id.to_string())
    }

    /// Return the provider's playlist document, from cache when fresh.
    pub async fn get_playlist(&self, playlist_id: &str) -> Result<PlaylistDocument> {
        let id = Self::normalize_id(playlist_id)?;

        if let Some(doc) = self.cache.get(&id) {
            tracing::info!(playlist = %id, "Playlist cache hit");
            return Ok(doc);
        }

        let doc = self.fetch(&id).await?;
        self.cache.put(id, doc.clone());
        Ok(doc)
    }

    /// Drop the cached document and replace it with a fresh fetch.
    pub async fn refresh_playlist(&self, playlist_id: &str) -> Result<()> {
        let id = Self::normalize_id(playlist_id)?;

        self.cache.delete(&id);
        let doc = self.fetch(&id).await?;
        self.cache.put(id, doc);
        Ok(())
    }

    /// Scan the playlist in order for the first track with an id that is not
    /// flagged unavailable.
    pub async fn first_playable_track(&self, playlist_id: &str) -> Result<PlayableTrack> {
        let doc = self.get_playlist(playlist_id).await?;

        let track = doc
            .get("tracks")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find_map(playable_track)
            .ok_or_else(|| RelayError::not_found("No playable songs found in playlist"))?;

        tracing::info!(playlist = %playlist_id, video_id = %track.video_id, "Found first playable track");
        Ok(track)
    }

    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }

    async fn fetch(&self, id: &str) -> Result<PlaylistDocument> {
        tracing::info!(playlist = %id, catalog = self.catalog.name(), "Fetching playlist");
        self.catalog.get_playlist(id).await.map_err(|e| {
            tracing::error!(playlist = %id, error = %e, "Playlist fetch failed");
            RelayError::upstream(e.context(format!("Failed to get playlist {}", id)))
        })
    }
}

fn playable_track(track: &Value) -> Option<PlayableTrack> {
    let video_id = track
        .get("videoId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())?;

    // Only an explicit `false` marks a track unavailable
    if track.get("isAvailable").and_then(Value::as_bool) == Some(false) {
        return None;
    }

    let title = track
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let artist = track
        .get("artists")
        .and_then(Value::as_array)
        .and_then(|artists| artists.first())
        .and_then(|a| a.get("name"))
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_ARTIST)
        .to_string();

    Some(PlayableTrack {
        video_id: video_id.to_string(),
        title,
        artist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::mock::MockCatalog;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(300);

    fn playlist_doc() -> PlaylistDocument {
        json!({
            "id": "PL1",
            "title": "Road Trip",
            "tracks": [
                {"videoId": null, "title": "Removed"},
                {"videoId": "gone", "title": "Blocked", "isAvailable": false},
                {"videoId": "ok1", "title": "Drive", "artists": [{"name": "A"}, {"name": "B"}], "isAvailable": true},
                {"videoId": "ok2", "title": "Later"}
            ]
        })
    }

    fn setup() -> (Arc<MockCatalog>, PlaylistService) {
        let catalog = Arc::new(MockCatalog::default());
        catalog.set_playlist("PL1", playlist_doc());
        let service = PlaylistService::new(catalog.clone(), TTL);
        (catalog, service)
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(PlaylistService::normalize_id("VLPL1").unwrap(), "PL1");
        assert_eq!(PlaylistService::normalize_id(" PL1 ").unwrap(), "PL1");
        assert!(matches!(
            PlaylistService::normalize_id("VL"),
            Err(RelayError::Validation(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_playlist_caches_by_bare_id() {
        let (catalog, service) = setup();

        let first = service.get_playlist("VLPL1").await.unwrap();
        let second = service.get_playlist("PL1").await.unwrap();

        assert_eq!(catalog.playlist_fetches(), 1);
        assert_eq!(first, second);
        assert_eq!(first["title"], "Road Trip");
    }

    #[tokio::test(start_paused = true)]
    async fn test_playlist_cache_expires() {
        let (catalog, service) = setup();

        service.get_playlist("PL1").await.unwrap();
        tokio::time::advance(TTL).await;
        let doc = service.get_playlist("PL1").await.unwrap();

        assert_eq!(catalog.playlist_fetches(), 2);
        assert_eq!(doc["fetch"], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_replaces_cached_document() {
        let (catalog, service) = setup();

        let before = service.get_playlist("PL1").await.unwrap();
        service.refresh_playlist("VLPL1").await.unwrap();
        let after = service.get_playlist("PL1").await.unwrap();

        assert_eq!(before["fetch"], 1);
        assert_eq!(after["fetch"], 2);
        assert_eq!(catalog.playlist_fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_propagates_and_clears_cache() {
        let (catalog, service) = setup();
        service.get_playlist("PL1").await.unwrap();

        catalog.set_failing(true);
        let err = service.refresh_playlist("PL1").await.unwrap_err();
        assert!(matches!(err, RelayError::Upstream(_)));

        // The stale document is gone, so the next read goes upstream again
        catalog.set_failing(false);
        let doc = service.get_playlist("PL1").await.unwrap();
        assert_eq!(doc["fetch"], 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_playable_track_skips_unavailable() {
        let (_catalog, service) = setup();

        let track = service.first_playable_track("VLPL1").await.unwrap();
        assert_eq!(
            track,
            PlayableTrack {
                video_id: "ok1".to_string(),
                title: "Drive".to_string(),
                artist: "A".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_playable_track_not_found() {
        let (catalog, service) = setup();
        catalog.set_playlist(
            "PL2",
            json!({"tracks": [{"videoId": "x", "isAvailable": false}, {"title": "no id"}]}),
        );
        catalog.set_playlist("PL3", json!({"title": "no tracks at all"}));

        assert!(matches!(
            service.first_playable_track("PL2").await,
            Err(RelayError::NotFound(_))
        ));
        assert!(matches!(
            service.first_playable_track("PL3").await,
            Err(RelayError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_playable_track_defaults() {
        let (catalog, service) = setup();
        catalog.set_playlist("PL4", json!({"tracks": [{"videoId": "bare"}]}));

        let track = service.first_playable_track("PL4").await.unwrap();
        assert_eq!(track.title, "");
        assert_eq!(track.artist, UNKNOWN_ARTIST);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_playlist_is_upstream_error() {
        let (_catalog, service) = setup();
        let err = service.get_playlist("PLmissing").await.unwrap_err();
        assert!(matches!(err, RelayError::Upstream(_)));
        assert!(err.to_string().contains("PLmissing"));
    }
}
