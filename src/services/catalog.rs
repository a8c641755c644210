//! Catalog reads: listing pages, detail pages and the home page's featured
//! sections.
//!
//! Each page does one (or a fixed handful of) reads, maps rows into
//! [`Product`] view models and reports the outcome as a [`PageState`]. A fetch
//! failure and a missing row are kept apart: the first is `Failed`, the second
//! `NotFound`. Nothing is retried.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::domain::aggregates::{Product, ProductCertificate, Vertical};
use crate::ports::{CatalogGateway, ProductQuery};
use crate::{Result, StorefrontError};

/// What a page shows between mount and the end of its fetch.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum PageState<T> {
    Loading,
    Ready(T),
    NotFound,
    Failed(String),
}

impl<T> PageState<T> {
    /// Maps a single-row lookup onto the page states.
    pub fn from_lookup(result: Result<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => Self::Ready(value),
            Ok(None) => Self::NotFound,
            Err(err) => Self::failed(&err),
        }
    }

    /// Maps a listing read onto the page states; an empty list is still `Ready`.
    pub fn from_listing(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Ready(value),
            Err(err) => Self::failed(&err),
        }
    }

    fn failed(err: &StorefrontError) -> Self {
        tracing::warn!(error = %err, "page fetch failed");
        Self::Failed("Неуспешно зареждане. Моля, опитайте отново.".to_string())
    }

    pub fn is_loading(&self) -> bool { matches!(self, Self::Loading) }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PageState<U> {
        match self {
            Self::Loading => PageState::Loading,
            Self::Ready(value) => PageState::Ready(f(value)),
            Self::NotFound => PageState::NotFound,
            Self::Failed(message) => PageState::Failed(message),
        }
    }
}

/// A product with its certificates, as the detail page renders it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub certificates: Vec<ProductCertificate>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeaturedSection {
    pub vertical: Vertical,
    pub products: PageState<Vec<Product>>,
}

#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn CatalogGateway>,
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn CatalogGateway>) -> Self { Self { catalog } }

    /// Products for one vertical (or every category), newest first.
    pub async fn listing(&self, vertical: Option<Vertical>, featured_only: bool, limit: Option<u32>) -> Result<Vec<Product>> {
        let query = ProductQuery {
            categories: vertical.map(|v| v.categories().iter().map(|c| (*c).to_string()).collect()).unwrap_or_default(),
            featured_only,
            limit,
        };
        let rows = self.catalog.list_products(&query).await.map_err(StorefrontError::fetch("products"))?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Product plus certificates. A certificate failure degrades to an empty list.
    pub async fn detail(&self, slug: &str) -> Result<Option<ProductDetail>> {
        let Some(row) = self.catalog.product_by_slug(slug).await.map_err(StorefrontError::fetch("product"))? else {
            tracing::debug!(slug, "no product with this slug");
            return Ok(None);
        };
        let product = Product::from(row);
        let certificates = self.certificates(&product.id).await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, product_id = %product.id, "certificates unavailable");
            Vec::new()
        });
        Ok(Some(ProductDetail { product, certificates }))
    }

    pub async fn certificates(&self, product_id: &str) -> Result<Vec<ProductCertificate>> {
        self.catalog.certificates_for(product_id).await.map_err(StorefrontError::fetch("certificates"))
    }

    /// Featured products for every vertical. Sections load independently; one
    /// failing section does not affect the others.
    pub async fn home(&self, per_section: u32) -> Vec<FeaturedSection> {
        let section = move |vertical: Vertical| async move {
            FeaturedSection {
                vertical,
                products: PageState::from_listing(self.listing(Some(vertical), true, Some(per_section)).await),
            }
        };
        let (books, dolls, audio, shows) = tokio::join!(
            section(Vertical::Books),
            section(Vertical::Dolls),
            section(Vertical::AudioStories),
            section(Vertical::PuppetShows),
        );
        vec![books, dolls, audio, shows]
    }

    /// Runs a detail fetch through `loader`, dropping the result if the route
    /// moved on to another slug meanwhile. Returns whether it was applied.
    pub async fn load_detail(&self, loader: &DetailLoader<ProductDetail>, slug: &str) -> bool {
        let ticket = loader.begin(slug);
        let state = PageState::from_lookup(self.detail(slug).await);
        loader.complete(ticket, state)
    }
}

/// Identifies one fetch started by [`DetailLoader::begin`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    key: String,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u64,
    key: Option<String>,
    state: PageState<T>,
}

/// Page state keyed by route parameter. Starting a load for a new key resets
/// to `Loading`, and results for a key that is no longer current (or for an
/// unmounted page) are discarded.
#[derive(Debug)]
pub struct DetailLoader<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> Default for DetailLoader<T> {
    fn default() -> Self { Self::new() }
}

impl<T> DetailLoader<T> {
    pub fn new() -> Self {
        Self { slot: Mutex::new(Slot { generation: 0, key: None, state: PageState::Loading }) }
    }

    pub fn begin(&self, key: &str) -> LoadTicket {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        slot.key = Some(key.to_string());
        slot.state = PageState::Loading;
        LoadTicket { generation: slot.generation, key: key.to_string() }
    }

    pub fn complete(&self, ticket: LoadTicket, state: PageState<T>) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.generation != ticket.generation || slot.key.as_deref() != Some(ticket.key.as_str()) {
            tracing::debug!(key = %ticket.key, "discarding stale page result");
            return false;
        }
        slot.state = state;
        true
    }

    pub fn unmount(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        slot.key = None;
        slot.state = PageState::Loading;
    }

    pub fn current_key(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).key.clone()
    }
}

impl<T: Clone> DetailLoader<T> {
    pub fn state(&self) -> PageState<T> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).state.clone()
    }
}
