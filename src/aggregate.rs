//! Folds a provider result list into categorized, deduplicated buckets.

use std::collections::HashSet;

use crate::normalize::normalize;
use crate::service::{Categories, RawItem, ResultType, SearchResponse};

pub const DEFAULT_CATEGORY_CAP: usize = 5;

/// Groups normalized results by type, first occurrence of an id wins
#[derive(Debug, Clone, Copy)]
pub struct ResultAggregator {
    cap: usize,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORY_CAP)
    }
}

impl ResultAggregator {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    /// Empty buckets for every result type
    pub fn empty_categories() -> Categories {
        ResultType::PRIORITY
            .iter()
            .map(|t| (t.plural().to_string(), Vec::new()))
            .collect()
    }

    /// Bucket raw items in provider order.
    ///
    /// Rejected items and repeated ids are skipped. Once a bucket holds `cap`
    /// results, further results of that type are dropped, never moved elsewhere.
    pub fn categorize<'a, I>(&self, items: I) -> Categories
    where
        I: IntoIterator<Item = &'a RawItem>,
    {
        let mut seen: HashSet<String> = HashSet::new();

        items
            .into_iter()
            .filter_map(|item| match normalize(item) {
                Ok(result) => Some(result),
                Err(reason) => {
                    tracing::debug!(%reason, "Skipping catalog item");
                    None
                }
            })
            .filter(|result| {
                let fresh = seen.insert(result.id.clone());
                if !fresh {
                    tracing::debug!(id = %result.id, "Skipping duplicate result");
                }
                fresh
            })
            .fold(Self::empty_categories(), |mut categories, result| {
                let bucket = categories
                    .entry(result.result_type.plural().to_string())
                    .or_default();
                if bucket.len() < self.cap {
                    bucket.push(result);
                }
                categories
            })
    }

    /// Bucket raw items and wrap them in an uncached response.
    pub fn aggregate<'a, I>(&self, items: I) -> SearchResponse
    where
        I: IntoIterator<Item = &'a RawItem>,
    {
        SearchResponse::new(self.categorize(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn song(id: &str, title: &str) -> RawItem {
        json!({"videoId": id, "title": title, "resultType": "song"})
    }

    #[test]
    fn test_all_categories_present_when_empty() {
        let items: Vec<RawItem> = Vec::new();
        let response = ResultAggregator::default().aggregate(&items);

        assert_eq!(response.total, 0);
        assert!(!response.cached);
        for name in ["songs", "albums", "playlists", "videos", "podcasts", "episodes"] {
            assert!(response.categories[name].is_empty(), "missing {}", name);
        }
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let items = vec![
            song("a", "First"),
            song("b", "Other"),
            song("a", "Second"),
        ];

        let response = ResultAggregator::new(10).aggregate(&items);
        let songs = response.category(ResultType::Song);

        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].id, "a");
        assert_eq!(songs[0].title, "First");
        assert_eq!(songs[1].id, "b");
    }

    #[test]
    fn test_duplicate_ids_across_types_are_deduplicated() {
        let items = vec![
            json!({"videoId": "x", "title": "As Video", "resultType": "video"}),
            json!({"videoId": "x", "title": "As Song", "resultType": "song"}),
        ];

        let response = ResultAggregator::new(10).aggregate(&items);
        assert_eq!(response.category(ResultType::Video).len(), 1);
        assert!(response.category(ResultType::Song).is_empty());
        assert_eq!(response.total, 1);
    }

    #[test]
    fn test_cap_drops_overflow_in_order() {
        let items: Vec<RawItem> = (0..8).map(|i| song(&format!("s{}", i), "t")).collect();

        let response = ResultAggregator::new(3).aggregate(&items);
        let ids: Vec<&str> = response
            .category(ResultType::Song)
            .iter()
            .map(|r| r.id.as_str())
            .collect();

        assert_eq!(ids, vec!["s0", "s1", "s2"]);
        assert_eq!(response.total, 3);
        // Overflow is not moved into another bucket
        assert!(response.category(ResultType::Video).is_empty());
    }

    #[test]
    fn test_rejections_are_skipped() {
        let items = vec![
            json!({"title": "no id"}),
            json!({"videoId": "c", "title": "Chan", "resultType": "channel"}),
            json!({"videoId": "e", "title": "  "}),
            song("ok", "Keeper"),
            json!(42),
        ];

        let response = ResultAggregator::default().aggregate(&items);
        assert_eq!(response.total, 1);
        assert_eq!(response.category(ResultType::Song)[0].id, "ok");
    }

    #[test]
    fn test_rejected_item_does_not_reserve_its_id() {
        let items = vec![
            json!({"videoId": "dup", "title": ""}),
            song("dup", "Valid"),
        ];

        let response = ResultAggregator::default().aggregate(&items);
        assert_eq!(response.category(ResultType::Song)[0].title, "Valid");
    }

    #[test]
    fn test_total_matches_bucket_sizes() {
        let items = vec![
            song("1", "a"),
            json!({"browseId": "MPRE1", "title": "Album", "resultType": "album"}),
            json!({"playlistId": "PL1", "title": "Mix", "resultType": "playlist"}),
            json!({"videoId": "v", "title": "Clip", "resultType": "video"}),
            json!({"browseId": "MPSP1", "title": "Show", "resultType": "podcast"}),
            json!({"videoId": "ep", "title": "Ep 1", "resultType": "episode"}),
        ];

        let response = ResultAggregator::new(2).aggregate(&items);
        let sum: usize = response.categories.values().map(Vec::len).sum();
        assert_eq!(response.total, sum);
        assert_eq!(response.total, 6);
    }
}
