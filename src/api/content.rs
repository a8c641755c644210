use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;

use super::{ApiError, ApiResult, AppState};
use crate::domain::aggregates::{BlogPost, ContactInquiry, NewInquiry};
use crate::StorefrontError;

pub(super) async fn list_posts(State(state): State<AppState>) -> ApiResult<Json<Vec<BlogPost>>> {
    let posts = state.gateway.blog.list_posts(true).await.map_err(StorefrontError::fetch("blog posts"))?;
    Ok(Json(posts))
}

pub(super) async fn get_post(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Json<BlogPost>> {
    state
        .gateway
        .blog
        .post_by_slug(&slug, true)
        .await
        .map_err(StorefrontError::fetch("blog post"))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Статията „{slug}“ не е намерена.")))
}

pub(super) async fn submit_inquiry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut form): Json<NewInquiry>,
) -> ApiResult<(StatusCode, Json<ContactInquiry>)> {
    if form.user_agent.is_none() {
        form.user_agent = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()).map(ToOwned::to_owned);
    }
    let stored = state.contact.submit(form).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}
