//! In-memory catalog used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use super::{CatalogProvider, PlaylistDocument, RawItem};

#[derive(Default)]
pub struct MockCatalog {
    items: Mutex<Vec<RawItem>>,
    playlists: Mutex<HashMap<String, PlaylistDocument>>,
    fail: AtomicBool,
    pub search_calls: AtomicUsize,
    pub playlist_calls: AtomicUsize,
    pub last_search_limit: AtomicUsize,
}

impl MockCatalog {
    pub fn with_items(items: Vec<RawItem>) -> Self {
        let catalog = Self::default();
        *catalog.items.lock() = items;
        catalog
    }

    pub fn set_items(&self, items: Vec<RawItem>) {
        *self.items.lock() = items;
    }

    pub fn set_playlist(&self, id: &str, doc: PlaylistDocument) {
        self.playlists.lock().insert(id.to_string(), doc);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn playlist_fetches(&self) -> usize {
        self.playlist_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogProvider for MockCatalog {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<RawItem>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.last_search_limit.store(limit, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("catalog unavailable"));
        }
        Ok(self.items.lock().clone())
    }

    async fn get_playlist(&self, playlist_id: &str) -> Result<PlaylistDocument> {
        let fetch = self.playlist_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("catalog unavailable"));
        }
        let mut doc = self
            .playlists
            .lock()
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| anyhow!("playlist {} does not exist", playlist_id))?;
        // Stamp each fetch so tests can tell fresh documents from cached ones
        doc["fetch"] = json!(fetch);
        Ok(doc)
    }
}
