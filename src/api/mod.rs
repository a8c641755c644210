//! HTTP surface.
//!
//! Public storefront routes (catalog, search, cart, blog, contact) plus the
//! admin console routes behind the session guard.

mod admin;
mod auth;
mod cart;
mod catalog;
mod content;

use std::any::Any;
use std::sync::Arc;

use axum::http::{header, Method, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ports::Gateway;
use crate::services::{
    AdminAccessPolicy, AdminConsole, CartSessions, CatalogService, ContactService, InFlightSaves, SearchService,
    SessionGuard,
};
use crate::{FieldError, StorefrontError};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
    pub catalog: CatalogService,
    pub search: Arc<SearchService>,
    pub carts: Arc<CartSessions>,
    pub contact: ContactService,
    pub guard: SessionGuard,
    pub admin: Arc<Mutex<AdminConsole>>,
    pub saves: InFlightSaves,
}

impl AppState {
    pub fn new(gateway: Gateway, admin_access: AdminAccessPolicy, search_limit: u32) -> Self {
        Self {
            catalog: CatalogService::new(gateway.catalog.clone()),
            search: Arc::new(SearchService::new(gateway.catalog.clone(), search_limit)),
            carts: Arc::new(CartSessions::new()),
            contact: ContactService::new(gateway.inquiries.clone()),
            guard: SessionGuard::new(gateway.auth.clone(), admin_access),
            admin: Arc::new(Mutex::new(AdminConsole::new(gateway.blog.clone(), gateway.inquiries.clone()))),
            saves: InFlightSaves::new(),
            gateway,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldError>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, body: ErrorBody { code, message: message.into(), fields: Vec::new() } }
    }

    pub fn bad_request(message: impl Into<String>) -> Self { Self::new(StatusCode::BAD_REQUEST, "bad_request", message) }

    pub fn not_found(what: impl Into<String>) -> Self { Self::new(StatusCode::NOT_FOUND, "not_found", what) }
}

impl From<StorefrontError> for ApiError {
    fn from(err: StorefrontError) -> Self {
        match err {
            StorefrontError::NotFound(what) => Self::not_found(format!("Не е намерено: {what}")),
            StorefrontError::Validation(failure) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                body: ErrorBody {
                    code: "validation_error",
                    message: "Моля, проверете полетата.".to_string(),
                    fields: failure.fields,
                },
            },
            StorefrontError::Unauthorized => Self::new(StatusCode::UNAUTHORIZED, "unauthorized", "Моля, влезте в профила си."),
            StorefrontError::Forbidden => Self::new(StatusCode::FORBIDDEN, "forbidden", "Нямате достъп до тази страница."),
            StorefrontError::SaveInProgress(_) => {
                Self::new(StatusCode::CONFLICT, "conflict", "Записът вече е в процес. Моля, изчакайте.")
            }
            err @ StorefrontError::Fetch { .. } => {
                tracing::error!(error = %err, "backend read failed");
                Self::new(StatusCode::BAD_GATEWAY, "upstream_error", "Неуспешно зареждане. Моля, опитайте отново.")
            }
            err @ StorefrontError::Write { .. } => {
                tracing::error!(error = %err, "backend write failed");
                Self::new(StatusCode::BAD_GATEWAY, "write_failed", "Промените не бяха запазени. Моля, опитайте отново.")
            }
            err @ StorefrontError::Config(_) => {
                tracing::error!(error = %err, "configuration error");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Нещо се обърка.")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.body }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Last-resort boundary: a panicking handler becomes a generic 500.
pub(crate) fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(details, "handler panicked");
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Нещо се обърка.").into_response()
}

// =============================================================================
// Router
// =============================================================================

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

fn admin_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/admin/posts", get(admin::list_posts).post(admin::create_post))
        .route(
            "/api/v1/admin/posts/:id",
            get(admin::get_post).put(admin::update_post).delete(admin::delete_post),
        )
        .route("/api/v1/admin/posts/:id/featured", post(admin::toggle_featured))
        .route("/api/v1/admin/posts/:id/unpublish", post(admin::unpublish))
        .route("/api/v1/admin/inquiries", get(admin::list_inquiries))
        .route("/api/v1/admin/inquiries/:id", axum::routing::delete(admin::delete_inquiry))
        .route("/api/v1/admin/inquiries/:id/status", post(admin::toggle_inquiry_status))
        .route_layer(from_fn_with_state(state.clone(), auth::require_admin))
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/home", get(catalog::home))
        .route("/api/v1/products", get(catalog::list_products))
        .route("/api/v1/products/:slug", get(catalog::get_product))
        .route("/api/v1/products/:slug/certificates", get(catalog::list_certificates))
        .route("/api/v1/search", get(catalog::search))
        .route("/api/v1/cart/:session", get(cart::get_cart).delete(cart::clear_cart))
        .route("/api/v1/cart/:session/items", post(cart::add_item))
        .route(
            "/api/v1/cart/:session/items/:id",
            axum::routing::patch(cart::update_quantity).delete(cart::remove_item),
        )
        .route("/api/v1/cart/:session/open", post(cart::open_cart))
        .route("/api/v1/cart/:session/close", post(cart::close_cart))
        .route("/api/v1/cart/:session/order", post(cart::order_now))
        .route("/api/v1/contact", post(content::submit_inquiry))
        .route("/api/v1/blog", get(content::list_posts))
        .route("/api/v1/blog/:slug", get(content::get_post))
        .route("/api/v1/auth/sign-in", post(auth::sign_in))
        .route("/api/v1/auth/sign-out", post(auth::sign_out))
        .route("/api/v1/auth/session", get(auth::session))
        .merge(admin_router(&state))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "skazka-storefront" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::adapters::memory::{FailPoint, MemoryBackend};
    use crate::domain::aggregates::{BlogPost, ProductRow};

    fn backend() -> Arc<MemoryBackend> {
        let mut published = BlogPost::default();
        published.title = "Как се пише семейна книга".into();
        published.slug = "kak-se-pishe-semeyna-kniga".into();
        published.is_published = true;
        let mut draft = BlogPost::default();
        draft.title = "Чернова".into();
        draft.slug = "chernova".into();

        Arc::new(
            MemoryBackend::new()
                .with_products([ProductRow {
                    id: "p1".into(),
                    slug: "babo-razkazhi-ni".into(),
                    title_bg: Some("Бабо, разкажи ни!".into()),
                    category: Some("book".into()),
                    price: Some(58.7),
                    compare_price: Some(69.9),
                    is_featured: Some(true),
                    ..ProductRow::default()
                }])
                .with_post(published)
                .with_post(draft)
                .with_user("admin@skazka.bg", "secret")
                .with_user("guest@skazka.bg", "secret"),
        )
    }

    fn app(backend: Arc<MemoryBackend>) -> Router {
        let policy = AdminAccessPolicy::allow_list(["admin@skazka.bg"]);
        build_app(AppState::new(Gateway::from_backend(backend), policy, 8))
    }

    async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn sign_in(app: &Router, email: &str) -> String {
        let (status, body) =
            send(app, "POST", "/api/v1/auth/sign-in", None, Some(json!({"email": email, "password": "secret"}))).await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let (status, body) = send(&app(backend()), "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn product_detail_and_not_found() {
        let app = app(backend());
        let (status, body) = send(&app, "GET", "/api/v1/products/babo-razkazhi-ni", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["href"], "/books/babo-razkazhi-ni");
        assert_eq!(body["percent_off"], 16);

        let (status, body) = send(&app, "GET", "/api/v1/products/does-not-exist", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn listing_rejects_unknown_vertical() {
        let app = app(backend());
        let (status, body) = send(&app, "GET", "/api/v1/products?category=books&featured=true", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        let (status, _) = send(&app, "GET", "/api/v1/products?category=toys", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cart_flow_merges_lines_and_totals() {
        let app = app(backend());
        let add = json!({"slug": "babo-razkazhi-ni", "quantity": 1});
        send(&app, "POST", "/api/v1/cart/s1/items", None, Some(add)).await;
        let add = json!({"slug": "babo-razkazhi-ni", "quantity": 2});
        let (status, body) = send(&app, "POST", "/api/v1/cart/s1/items", None, Some(add)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["badge_count"], 3);
        assert_eq!(body["lines"].as_array().unwrap().len(), 1);
        assert_eq!(body["total"]["primary"], "176.10 лв.");

        let (_, body) = send(&app, "PATCH", "/api/v1/cart/s1/items/p1", None, Some(json!({"quantity": 0}))).await;
        assert_eq!(body["badge_count"], 1);

        let (_, body) = send(&app, "POST", "/api/v1/cart/s1/order", None, None).await;
        assert_eq!(body["acknowledgement"]["accepted"], false);
        assert_eq!(body["cart"]["badge_count"], 1);

        let (_, body) = send(&app, "GET", "/api/v1/cart/other", None, None).await;
        assert_eq!(body["empty_message"], "Количката е празна");
    }

    #[tokio::test]
    async fn cart_mutations_do_not_register_unknown_sessions() {
        let policy = AdminAccessPolicy::allow_list(["admin@skazka.bg"]);
        let state = AppState::new(Gateway::from_backend(backend()), policy, 8);
        let app = build_app(state.clone());

        let (status, body) =
            send(&app, "PATCH", "/api/v1/cart/ghost-1/items/p1", None, Some(json!({"quantity": 3}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["badge_count"], 0);
        send(&app, "DELETE", "/api/v1/cart/ghost-2/items/p1", None, None).await;
        let (_, body) = send(&app, "POST", "/api/v1/cart/ghost-3/open", None, None).await;
        assert_eq!(body["is_open"], false);
        send(&app, "POST", "/api/v1/cart/ghost-4/close", None, None).await;
        assert!(state.carts.is_empty());

        send(&app, "POST", "/api/v1/cart/real/items", None, Some(json!({"slug": "babo-razkazhi-ni"}))).await;
        let (_, body) = send(&app, "POST", "/api/v1/cart/real/open", None, None).await;
        assert_eq!(body["is_open"], true);
        assert_eq!(state.carts.len(), 1);
    }

    #[tokio::test]
    async fn search_returns_see_all_target() {
        let app = app(backend());
        let (status, body) = send(&app, "GET", "/api/v1/search?q=%D0%B1%D0%B0%D0%B1%D0%BE", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"].as_array().unwrap().len(), 1);
        assert_eq!(body["see_all"]["href"], "/books");
    }

    #[tokio::test]
    async fn contact_validation_is_field_level() {
        let app = app(backend());
        let bad = json!({"name": "А", "email": "nope", "message": "кратко"});
        let (status, body) = send(&app, "POST", "/api/v1/contact", None, Some(bad)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["fields"].as_array().unwrap().len(), 3);

        let good = json!({"name": "Анна", "email": "anna@example.com", "message": "Искам книга за дядо."});
        let (status, body) = send(&app, "POST", "/api/v1/contact", None, Some(good)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "pending");
    }

    #[tokio::test]
    async fn public_blog_hides_drafts() {
        let app = app(backend());
        let (_, body) = send(&app, "GET", "/api/v1/blog", None, None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        let (status, _) = send(&app, "GET", "/api/v1/blog/chernova", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_routes_are_guarded() {
        let app = app(backend());
        let (status, _) = send(&app, "GET", "/api/v1/admin/posts", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let guest = sign_in(&app, "guest@skazka.bg").await;
        let (status, _) = send(&app, "GET", "/api/v1/admin/posts", Some(&guest), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = sign_in(&app, "admin@skazka.bg").await;
        let (status, body) = send(&app, "GET", "/api/v1/admin/posts", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        send(&app, "POST", "/api/v1/auth/sign-out", Some(&admin), None).await;
        let (status, _) = send(&app, "GET", "/api/v1/admin/posts", Some(&admin), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_saves_post_with_pending_image() {
        let backend = backend();
        let app = app(backend.clone());
        let admin = sign_in(&app, "admin@skazka.bg").await;
        let request = json!({
            "title": "Нова статия",
            "content": "<p><img src=\"blob:skazka/k1\"></p>",
            "publish": true,
            "images": [{
                "placeholder": "blob:skazka/k1",
                "file_name": "photo.png",
                "content_type": "image/png",
                "data": "iVBORw0KGgo="
            }]
        });
        let (status, body) = send(&app, "POST", "/api/v1/admin/posts", Some(&admin), Some(request)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["post"]["slug"], "nova-statiya");
        assert_eq!(body["navigate_to_listing"], true);
        assert_eq!(body["post"]["inside_images"].as_array().unwrap().len(), 1);
        assert_eq!(backend.upload_log().await.len(), 1);

        let id = body["post"]["id"].as_str().unwrap().to_string();
        let (status, body) =
            send(&app, "POST", &format!("/api/v1/admin/posts/{id}/featured"), Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_featured"], true);

        let scoped = backend.scoped_tokens();
        assert_eq!(scoped.len(), 2);
        assert!(scoped.iter().all(|token| *token == admin));
    }

    #[tokio::test]
    async fn retried_update_overwrites_the_same_cover() {
        let backend = backend();
        let app = app(backend.clone());
        let admin = sign_in(&app, "admin@skazka.bg").await;
        let (status, body) =
            send(&app, "POST", "/api/v1/admin/posts", Some(&admin), Some(json!({"title": "Корица"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["post"]["id"].as_str().unwrap().to_string();

        let update = json!({
            "title": "Корица",
            "cover": {"file_name": "cover.jpg", "content_type": "image/jpeg", "data": "AQIDBA=="}
        });
        backend.fail(FailPoint::UpdatePost, Some(1)).await;
        let uri = format!("/api/v1/admin/posts/{id}");
        let (status, _) = send(&app, "PUT", &uri, Some(&admin), Some(update.clone())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let (status, body) = send(&app, "PUT", &uri, Some(&admin), Some(update)).await;
        assert_eq!(status, StatusCode::OK);

        let log = backend.upload_log().await;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], log[1]);
        assert!(body["post"]["image_url"].as_str().unwrap().ends_with(&log[0]));
    }

    #[tokio::test]
    async fn bad_base64_is_a_bad_request() {
        let app = app(backend());
        let admin = sign_in(&app, "admin@skazka.bg").await;
        let request = json!({
            "title": "Х",
            "images": [{"placeholder": "blob:skazka/k1", "file_name": "a.png", "content_type": "image/png", "data": "***"}]
        });
        let (status, _) = send(&app, "POST", "/api/v1/admin/posts", Some(&admin), Some(request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn panics_become_generic_errors() {
        async fn boom() {
            panic!("boom")
        }
        let app: Router = Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(handle_panic));
        let (status, body) = send(&app, "GET", "/boom", None, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "internal_error");
    }
}
