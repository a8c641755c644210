//! Product search for the header widget.
//!
//! Queries go to the backend's ranked search procedure. The "see all" link
//! under the dropdown is a best-effort guess: when one vertical clearly
//! dominates the results it points at that vertical's listing page, and
//! otherwise at the generic search page with the raw query. Ties are an
//! accepted fallback, not an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::domain::aggregates::{Product, ProductCategory, Vertical};
use crate::ports::CatalogGateway;
use crate::{Result, StorefrontError};

pub const MIN_QUERY_CHARS: usize = 2;
pub const DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeeAllTarget {
    Listing { vertical: Vertical },
    SearchPage { query: String },
}

impl SeeAllTarget {
    pub fn href(&self) -> String {
        match self {
            Self::Listing { vertical } => vertical.listing_path().to_string(),
            Self::SearchPage { query } => format!("/search?q={}", utf8_percent_encode(query, NON_ALPHANUMERIC)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub products: Vec<Product>,
    /// `None` when the query was too short to run.
    pub see_all: Option<SeeAllTarget>,
}

impl SearchResults {
    fn skipped(query: String) -> Self { Self { query, products: Vec::new(), see_all: None } }
}

const SLUG_HINTS: &[(&str, Vertical)] = &[
    ("kukl", Vertical::Dolls),
    ("doll", Vertical::Dolls),
    ("vazglav", Vertical::Dolls),
    ("pillow", Vertical::Dolls),
    ("audio", Vertical::AudioStories),
    ("spektak", Vertical::PuppetShows),
    ("spectacle", Vertical::PuppetShows),
    ("teatar", Vertical::PuppetShows),
    ("puppet", Vertical::PuppetShows),
    ("kniga", Vertical::Books),
    ("book", Vertical::Books),
    ("komplekt", Vertical::Books),
];

/// Vertical of a search hit, from its category or, for unknown categories,
/// from words in its slug.
pub fn classify(product: &Product) -> Option<Vertical> {
    if let Some(vertical) = product.category.vertical() {
        return Some(vertical);
    }
    let haystack = match &product.category {
        ProductCategory::Other(raw) => format!("{raw} {}", product.slug),
        _ => product.slug.clone(),
    };
    let haystack = haystack.to_lowercase();
    SLUG_HINTS.iter().find(|(hint, _)| haystack.contains(hint)).map(|(_, vertical)| *vertical)
}

/// Picks where "see all results" should lead.
///
/// A vertical wins only with a unique top count that either covers at least
/// half of all results or outnumbers every other classified result combined.
pub fn see_all_target(query: &str, products: &[Product]) -> SeeAllTarget {
    let fallback = || SeeAllTarget::SearchPage { query: query.to_string() };
    let mut counts: HashMap<Vertical, usize> = HashMap::new();
    for vertical in products.iter().filter_map(classify) {
        *counts.entry(vertical).or_default() += 1;
    }
    let Some(top) = counts.values().copied().max() else { return fallback() };
    let leaders: Vec<Vertical> = counts.iter().filter(|(_, n)| **n == top).map(|(v, _)| *v).collect();
    let [leader] = leaders.as_slice() else { return fallback() };

    let classified: usize = counts.values().sum();
    let covers_half = top * 2 >= products.len();
    let dominates = top > classified - top;
    if covers_half || dominates {
        SeeAllTarget::Listing { vertical: *leader }
    } else {
        fallback()
    }
}

/// Lets only the most recent call through once the delay has passed quietly.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    generation: AtomicU64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self { Self { delay, generation: AtomicU64::new(0) } }

    /// Waits out the delay; `true` if no newer call arrived meanwhile.
    pub async fn settle(&self) -> bool {
        let mine = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        self.generation.load(Ordering::SeqCst) == mine
    }
}

pub struct SearchService {
    catalog: Arc<dyn CatalogGateway>,
    limit: u32,
    debouncer: Debouncer,
}

impl SearchService {
    pub fn new(catalog: Arc<dyn CatalogGateway>, limit: u32) -> Self {
        Self { catalog, limit: limit.max(1), debouncer: Debouncer::new(DEBOUNCE) }
    }

    pub fn limit(&self) -> u32 { self.limit }

    pub async fn search(&self, raw_query: &str) -> Result<SearchResults> {
        let query = raw_query.trim().to_string();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(SearchResults::skipped(query));
        }
        let rows = self
            .catalog
            .search_products(&query, self.limit)
            .await
            .map_err(StorefrontError::fetch("search results"))?;
        let products: Vec<Product> = rows.into_iter().map(Product::from).collect();
        let see_all = see_all_target(&query, &products);
        tracing::debug!(%query, hits = products.len(), href = %see_all.href(), "search");
        Ok(SearchResults { query, products, see_all: Some(see_all) })
    }

    /// As-you-type search: `None` when a newer keystroke superseded this one.
    pub async fn search_debounced(&self, raw_query: &str) -> Result<Option<SearchResults>> {
        if !self.debouncer.settle().await {
            return Ok(None);
        }
        self.search(raw_query).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryBackend;
    use crate::domain::aggregates::ProductRow;

    fn product(slug: &str, category: &str) -> Product {
        Product::from(ProductRow {
            id: slug.into(),
            slug: slug.into(),
            title_bg: Some(slug.into()),
            category: Some(category.into()),
            price: Some(10.0),
            ..ProductRow::default()
        })
    }

    #[test]
    fn doll_and_pillow_count_together() {
        let hits = [product("kukla-1", "doll"), product("vazglavnitsa", "pillow"), product("kniga", "book")];
        assert_eq!(see_all_target("мека", &hits), SeeAllTarget::Listing { vertical: Vertical::Dolls });
    }

    #[test]
    fn ties_fall_back_to_search_page() {
        let hits = [product("a", "book"), product("b", "doll")];
        let target = see_all_target("баба", &hits);
        assert_eq!(target, SeeAllTarget::SearchPage { query: "баба".into() });
        assert_eq!(target.href(), "/search?q=%D0%B1%D0%B0%D0%B1%D0%B0");
    }

    #[test]
    fn minority_leader_without_dominance_falls_back() {
        let hits = [
            product("a", "book"),
            product("b", "book"),
            product("c", "doll"),
            product("d", "audio-story"),
            product("e", "spectacle"),
        ];
        assert!(matches!(see_all_target("x", &hits), SeeAllTarget::SearchPage { .. }));
    }

    #[test]
    fn unknown_category_uses_slug_hints() {
        let hit = product("spektakal-chervena-shapchitsa", "gift");
        assert_eq!(classify(&hit), Some(Vertical::PuppetShows));
        assert_eq!(classify(&product("mystery", "gift")), None);
        assert!(matches!(see_all_target("x", &[]), SeeAllTarget::SearchPage { .. }));
    }

    #[tokio::test]
    async fn short_queries_do_not_call_the_backend() {
        let backend = Arc::new(MemoryBackend::new().with_products([ProductRow {
            id: "1".into(),
            slug: "babo".into(),
            title_bg: Some("Бабо".into()),
            category: Some("book".into()),
            ..ProductRow::default()
        }]));
        backend.fail(crate::adapters::memory::FailPoint::Search, None).await;
        let search = SearchService::new(backend.clone(), 8);
        let skipped = search.search("  б ").await.unwrap();
        assert!(skipped.products.is_empty());
        assert_eq!(skipped.see_all, None);

        backend.clear_failures().await;
        let found = search.search("бабо").await.unwrap();
        assert_eq!(found.products.len(), 1);
        assert_eq!(found.see_all, Some(SeeAllTarget::Listing { vertical: Vertical::Books }));
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_lets_only_the_last_call_through() {
        let debouncer = Arc::new(Debouncer::new(DEBOUNCE));
        let first = tokio::spawn({
            let d = debouncer.clone();
            async move { d.settle().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = tokio::spawn({
            let d = debouncer.clone();
            async move { d.settle().await }
        });
        assert!(!first.await.unwrap());
        assert!(second.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_keystrokes_yield_nothing() {
        let backend = Arc::new(MemoryBackend::new().with_products([ProductRow {
            id: "1".into(),
            slug: "babo".into(),
            title_bg: Some("Бабо".into()),
            category: Some("book".into()),
            ..ProductRow::default()
        }]));
        let search = Arc::new(SearchService::new(backend, 8));
        let typing = tokio::spawn({
            let s = search.clone();
            async move { s.search_debounced("баб").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let settled = tokio::spawn({
            let s = search.clone();
            async move { s.search_debounced("бабо").await }
        });
        assert!(typing.await.unwrap().unwrap().is_none());
        let results = settled.await.unwrap().unwrap().unwrap();
        assert_eq!(results.query, "бабо");
        assert_eq!(results.products.len(), 1);
    }
}
