//! Cached catalog search: cache lookup, catalog query, aggregation, cache store

use std::sync::Arc;
use std::time::Duration;

use crate::aggregate::ResultAggregator;
use crate::cache::TtlCache;
use crate::config::SearchConfig;
use crate::error::{RelayError, Result};
use crate::service::{CatalogProvider, SearchResponse};

/// Search cache key; queries differing only in case or surrounding whitespace share an entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    query: String,
    limit: usize,
}

impl SearchKey {
    pub fn new(query: &str, limit: usize) -> Self {
        Self {
            query: query.trim().to_lowercase(),
            limit,
        }
    }
}

pub struct SearchService {
    catalog: Arc<dyn CatalogProvider>,
    cache: TtlCache<SearchKey, SearchResponse>,
    overfetch_limit: usize,
    max_limit: usize,
}

impl SearchService {
    pub fn new(catalog: Arc<dyn CatalogProvider>, config: &SearchConfig, ttl: Duration) -> Self {
        Self {
            catalog,
            cache: TtlCache::new(ttl),
            overfetch_limit: config.overfetch_limit,
            max_limit: config.max_limit,
        }
    }

    /// Search the catalog, returning at most `limit` results per category.
    ///
    /// Responses are cached per (query, limit). A cache hit returns the stored
    /// categories unchanged with `cached` set.
    pub async fn search(&self, query: &str, limit: usize) -> Result<SearchResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RelayError::validation("Search query must not be empty"));
        }
        if limit == 0 || limit > self.max_limit {
            return Err(RelayError::validation(format!(
                "limit must be between 1 and {}",
                self.max_limit
            )));
        }

        let key = SearchKey::new(query, limit);
        if let Some(mut response) = self.cache.get(&key) {
            tracing::info!(query, limit, "Search cache hit");
            response.cached = true;
            return Ok(response);
        }

        // Ask for more than we keep; rejected and duplicate items eat into the count
        let fetch_limit = limit.max(self.overfetch_limit);
        tracing::info!(query, limit, fetch_limit, catalog = self.catalog.name(), "Searching catalog");

        let items = self.catalog.search(query, fetch_limit).await.map_err(|e| {
            tracing::error!(query, error = %e, "Catalog search failed");
            RelayError::upstream(e.context("Search failed"))
        })?;

        let response = ResultAggregator::new(limit).aggregate(&items);
        tracing::info!(
            query,
            raw = items.len(),
            total = response.total,
            "Search completed"
        );

        self.cache.put(key, response.clone());
        Ok(response)
    }

    /// Drop expired search entries
    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}
