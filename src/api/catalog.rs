use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResult, AppState};
use crate::domain::aggregates::{ProductCertificate, Vertical};
use crate::services::{PageState, SeeAllTarget};
use crate::views::{ProductCard, ProductDetailView};

const MAX_LISTING: u32 = 100;
const HOME_SECTION_SIZE: u32 = 8;

#[derive(Debug, Deserialize)]
pub(super) struct ListParams {
    category: Option<String>,
    #[serde(default)]
    featured: bool,
    limit: Option<u32>,
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<ProductCard>>> {
    let vertical = match params.category.as_deref().filter(|c| !c.is_empty()) {
        Some(raw) => Some(Vertical::parse(raw).ok_or_else(|| ApiError::bad_request(format!("unknown category '{raw}'")))?),
        None => None,
    };
    let limit = params.limit.map(|l| l.clamp(1, MAX_LISTING));
    let products = state.catalog.listing(vertical, params.featured, limit).await?;
    Ok(Json(products.iter().map(ProductCard::from).collect()))
}

pub(super) async fn get_product(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Json<ProductDetailView>> {
    match PageState::from_lookup(state.catalog.detail(&slug).await) {
        PageState::Ready(detail) => Ok(Json(ProductDetailView::from(&detail))),
        PageState::NotFound => Err(ApiError::not_found(format!("Продуктът „{slug}“ не е намерен."))),
        PageState::Failed(message) => Err(ApiError::new(axum::http::StatusCode::BAD_GATEWAY, "upstream_error", message)),
        PageState::Loading => Err(ApiError::not_found(slug)),
    }
}

/// The path segment is the product id; it shares the `:slug` position with the detail route.
pub(super) async fn list_certificates(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<Json<Vec<ProductCertificate>>> {
    Ok(Json(state.catalog.certificates(&product_id).await?))
}

#[derive(Debug, Serialize)]
pub(super) struct HomeSection {
    vertical: Vertical,
    href: &'static str,
    products: PageState<Vec<ProductCard>>,
}

pub(super) async fn home(State(state): State<AppState>) -> Json<Vec<HomeSection>> {
    let sections = state.catalog.home(HOME_SECTION_SIZE).await;
    Json(
        sections
            .into_iter()
            .map(|section| HomeSection {
                vertical: section.vertical,
                href: section.vertical.listing_path(),
                products: section.products.map(|products| products.iter().map(ProductCard::from).collect()),
            })
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SeeAllLink {
    #[serde(flatten)]
    target: SeeAllTarget,
    href: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SearchResponse {
    query: String,
    results: Vec<ProductCard>,
    see_all: Option<SeeAllLink>,
}

pub(super) async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> ApiResult<Json<SearchResponse>> {
    let results = state.search.search(&params.q).await?;
    Ok(Json(SearchResponse {
        results: results.products.iter().map(ProductCard::from).collect(),
        see_all: results.see_all.map(|target| SeeAllLink { href: target.href(), target }),
        query: results.query,
    }))
}
