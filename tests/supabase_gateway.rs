//! Integration tests for `SupabaseClient` against a local `wiremock` server.
//!
//! Each test mounts only the endpoints it needs, so an unexpected request
//! shows up as a 404 from the mock server rather than real network traffic.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skazka_storefront::adapters::SupabaseClient;
use skazka_storefront::config::SupabaseSettings;
use skazka_storefront::domain::aggregates::NewDraft;
use skazka_storefront::ports::{
    AuthGateway, BlogRepository, CatalogGateway, Gateway, GatewayError, ObjectStorage, ProductQuery, UploadFile,
};

fn client_for(server: &MockServer) -> SupabaseClient {
    SupabaseClient::new(&SupabaseSettings {
        url: server.uri(),
        anon_key: "anon-key".into(),
        storage_bucket: "blog-images".into(),
        request_timeout_secs: 5,
    })
    .expect("failed to build test client")
}

fn product_json(id: i64, slug: &str, category: &str) -> serde_json::Value {
    json!({
        "id": id,
        "slug": slug,
        "title_bg": "Бабо, разкажи ми",
        "category": category,
        "price": 58.7,
        "compare_price": 69.9,
        "images": null,
        "badges": ["Бестселър"],
        "is_featured": true
    })
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_products_sends_filters_as_postgrest_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/products"))
        .and(query_param("category", "in.(\"book\",\"bundle\")"))
        .and(query_param("is_featured", "eq.true"))
        .and(query_param("limit", "4"))
        .and(query_param("order", "created_at.desc"))
        .and(header("apikey", "anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([product_json(1, "babo", "book")])))
        .expect(1)
        .mount(&server)
        .await;

    let query = ProductQuery { categories: vec!["book".into(), "bundle".into()], featured_only: true, limit: Some(4) };
    let rows = client_for(&server).list_products(&query).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "1");
    assert_eq!(rows[0].slug, "babo");
}

#[tokio::test]
async fn product_by_slug_returns_none_for_empty_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/products"))
        .and(query_param("slug", "eq.nyama-go"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert!(client_for(&server).product_by_slug("nyama-go").await.unwrap().is_none());
}

#[tokio::test]
async fn search_calls_the_stored_procedure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/search_products"))
        .and(body_json(json!({ "search_query": "баба", "result_limit": 8 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            product_json(1, "babo", "book"),
            product_json(2, "kukla", "doll"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = client_for(&server).search_products("баба", 8).await.unwrap();
    assert_eq!(rows.iter().map(|r| r.slug.as_str()).collect::<Vec<_>>(), vec!["babo", "kukla"]);
}

#[tokio::test]
async fn server_error_surfaces_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/product_certificates"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client_for(&server).certificates_for("3").await.unwrap_err();
    match err {
        GatewayError::Status { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/products"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client_for(&server).list_products(&ProductQuery::default()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Decode { .. }), "got {err:?}");
}

// ---------------------------------------------------------------------------
// Blog and storage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn insert_draft_returns_the_new_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/blog_posts"))
        .and(header("Prefer", "return=representation"))
        .and(body_json(json!({
            "title": "Нова статия",
            "slug": "nova-statiya",
            "content": "",
            "is_published": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "id": 42 }])))
        .mount(&server)
        .await;

    let draft = NewDraft {
        title: "Нова статия".into(),
        slug: "nova-statiya".into(),
        content: String::new(),
        is_published: false,
    };
    assert_eq!(client_for(&server).insert_draft(&draft).await.unwrap(), "42");
}

#[tokio::test]
async fn slug_taken_excludes_the_current_post() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/blog_posts"))
        .and(query_param("slug", "eq.nova-statiya"))
        .and(query_param("id", "neq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    assert!(!client_for(&server).slug_taken("nova-statiya", Some("7")).await.unwrap());
}

#[tokio::test]
async fn upload_overwrites_and_public_url_points_at_the_bucket() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/blog-images/posts/7/inline-abc.png"))
        .and(header("x-upsert", "true"))
        .and(header("content-type", "image/png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "blog-images/posts/7/inline-abc.png" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let file = UploadFile::new("photo.png", "image/png", vec![1, 2, 3]);
    client.upload("posts/7/inline-abc.png", &file, true).await.unwrap();
    assert_eq!(
        client.public_url("posts/7/inline-abc.png"),
        format!("{}/storage/v1/object/public/blog-images/posts/7/inline-abc.png", server.uri())
    );
}

#[tokio::test]
async fn rejected_upload_is_a_storage_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/blog-images/posts/7/cover-x.jpg"))
        .respond_with(ResponseTemplate::new(413).set_body_string("too large"))
        .mount(&server)
        .await;

    let file = UploadFile::new("cover.jpg", "image/jpeg", vec![0; 16]);
    let err = client_for(&server).upload("posts/7/cover-x.jpg", &file, true).await.unwrap_err();
    assert!(matches!(err, GatewayError::Storage(_)), "got {err:?}");
}

#[tokio::test]
async fn anonymous_writes_use_the_project_key() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/blog_posts"))
        .and(query_param("id", "eq.7"))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).set_featured("7", true).await.unwrap();
}

#[tokio::test]
async fn user_scoped_writes_carry_the_admin_token() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/blog_posts"))
        .and(query_param("id", "eq.7"))
        .and(header("authorization", "Bearer admin-jwt"))
        .and(header("apikey", "anon-key"))
        .and(body_json(json!({ "is_featured": true })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/blog-images/posts/7/cover-a1.jpg"))
        .and(header("authorization", "Bearer admin-jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "blog-images/posts/7/cover-a1.jpg" })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::from_backend(Arc::new(client_for(&server)));
    let admin = gateway.for_user("admin-jwt");
    admin.blog.set_featured("7", true).await.unwrap();
    let file = UploadFile::new("cover.jpg", "image/jpeg", vec![9; 4]);
    admin.storage.upload("posts/7/cover-a1.jpg", &file, true).await.unwrap();
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sign_in_parses_the_token_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(body_json(json!({ "email": "admin@skazka.bg", "password": "secret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "jwt-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": { "email": "admin@skazka.bg" }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut events = client.subscribe();
    let session = client.sign_in_with_password("admin@skazka.bg", "secret").await.unwrap();

    assert_eq!(session.access_token, "jwt-token");
    assert_eq!(session.email.as_deref(), Some("admin@skazka.bg"));
    assert!(!session.is_expired(chrono::Utc::now()));
    assert!(events.try_recv().is_ok());
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
        .mount(&server)
        .await;

    let err = client_for(&server).sign_in_with_password("admin@skazka.bg", "nope").await.unwrap_err();
    assert!(matches!(err, GatewayError::Unauthorized), "got {err:?}");
}

#[tokio::test]
async fn expired_token_has_no_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    assert!(client_for(&server).session_for("stale").await.unwrap().is_none());
}

#[tokio::test]
async fn live_token_resolves_to_its_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "u1", "email": "admin@skazka.bg" })))
        .mount(&server)
        .await;

    let session = client_for(&server).session_for("live").await.unwrap().unwrap();
    assert_eq!(session.email.as_deref(), Some("admin@skazka.bg"));
}
