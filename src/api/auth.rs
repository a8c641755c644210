use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResult, AppState};
use crate::ports::{Gateway, GatewayError};
use crate::services::Access;
use crate::StorefrontError;

/// The admin who passed the guard, available to admin handlers. `gateway`
/// acts with the admin's own access token so backend policies apply to them.
#[derive(Clone, Debug)]
pub(super) struct AdminIdentity {
    pub email: Option<String>,
    pub gateway: Gateway,
}

pub(super) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub(super) async fn require_admin(State(state): State<AppState>, mut request: Request, next: Next) -> ApiResult<Response> {
    let token = bearer_token(request.headers()).map(ToOwned::to_owned);
    let email = state.guard.check(token.as_deref()).await?.into_result()?;
    let gateway = match token.as_deref() {
        Some(token) => state.gateway.for_user(token),
        None => state.gateway.clone(),
    };
    request.extensions_mut().insert(AdminIdentity { email, gateway });
    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
pub(super) struct SignInRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SignInResponse {
    access_token: String,
    email: Option<String>,
    expires_at: DateTime<Utc>,
    access: Access,
}

pub(super) async fn sign_in(State(state): State<AppState>, Json(request): Json<SignInRequest>) -> ApiResult<Json<SignInResponse>> {
    let session = match state.gateway.auth.sign_in_with_password(request.email.trim(), &request.password).await {
        Ok(session) => session,
        Err(GatewayError::Unauthorized) => {
            tracing::info!("sign-in rejected");
            return Err(StorefrontError::Unauthorized.into());
        }
        Err(err) => return Err(StorefrontError::fetch("auth session")(err).into()),
    };
    let access = state.guard.evaluate(Some(&session));
    Ok(Json(SignInResponse {
        access_token: session.access_token,
        email: session.email,
        expires_at: session.expires_at,
        access,
    }))
}

pub(super) async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<serde_json::Value>> {
    let token = bearer_token(&headers).ok_or(StorefrontError::Unauthorized)?;
    state.gateway.auth.sign_out(token).await.map_err(StorefrontError::write("signing out"))?;
    Ok(Json(serde_json::json!({ "signed_out": true })))
}

pub(super) async fn session(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Access>> {
    let access = state.guard.check(bearer_token(&headers)).await.map_err(ApiError::from)?;
    Ok(Json(access))
}
