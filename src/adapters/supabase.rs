//! HTTP client for the hosted Supabase project.
//!
//! Tables go through PostgREST (`/rest/v1`), search through the
//! `search_products` procedure, images through Storage (`/storage/v1`) and
//! admin sign-in through GoTrue (`/auth/v1`). Non-2xx responses become
//! [`GatewayError::Status`]; nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;

use crate::config::SupabaseSettings;
use crate::domain::aggregates::{
    BlogPost, BlogPostUpdate, ContactInquiry, InquiryStatus, NewDraft, NewInquiry, ProductCertificate, ProductRow,
};
use crate::ports::{
    AuthEvent, AuthGateway, AuthSession, BlogRepository, CatalogGateway, GatewayError, GatewayResult,
    InquiryRepository, ObjectStorage, ProductQuery, UploadFile, UserScoped,
};

const PRODUCTS: &str = "products";
const CERTIFICATES: &str = "product_certificates";
const BLOG_POSTS: &str = "blog_posts";
const INQUIRIES: &str = "contact_inquiries";
const SEARCH_PROCEDURE: &str = "search_products";

#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    /// Bearer credential for PostgREST and Storage: the anon key, or a
    /// signed-in user's access token once scoped.
    bearer: String,
    bucket: String,
    auth_events: broadcast::Sender<AuthEvent>,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[serde(deserialize_with = "crate::domain::decode::string_or_number")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<UserResponse>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

impl SupabaseClient {
    /// Builds a client with the configured timeout and the project API key
    /// attached to every request.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(settings: &SupabaseSettings) -> GatewayResult<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&settings.anon_key)
            .map_err(|e| GatewayError::Unavailable(format!("invalid API key header: {e}")))?;
        headers.insert("apikey", key);

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()?;
        let (auth_events, _) = broadcast::channel(32);

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            bearer: settings.anon_key.clone(),
            bucket: settings.storage_bucket.clone(),
            auth_events,
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, format!("Bearer {}", self.bearer))
    }

    async fn check(response: Response) -> GatewayResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), %url, "backend request failed");
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GatewayError::Unauthorized);
        }
        Err(GatewayError::Status { status: status.as_u16(), url, body })
    }

    async fn decode<T: DeserializeOwned>(response: Response, context: &str) -> GatewayResult<T> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| GatewayError::Decode { context: context.to_string(), source })
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, params: &[(&str, String)]) -> GatewayResult<Vec<T>> {
        let request = self.with_key(self.client.get(self.rest_url(table))).query(params);
        let response = Self::check(request.send().await?).await?;
        Self::decode(response, table).await
    }

    async fn patch(&self, table: &str, id: &str, body: &serde_json::Value) -> GatewayResult<()> {
        let request = self
            .with_key(self.client.patch(self.rest_url(table)))
            .query(&[("id", format!("eq.{id}"))])
            .json(body);
        Self::check(request.send().await?).await?;
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> GatewayResult<()> {
        let request = self.with_key(self.client.delete(self.rest_url(table))).query(&[("id", format!("eq.{id}"))]);
        Self::check(request.send().await?).await?;
        Ok(())
    }

    async fn insert_returning<B: Serialize + Sync, T: DeserializeOwned>(&self, table: &str, body: &B) -> GatewayResult<T> {
        let request = self
            .with_key(self.client.post(self.rest_url(table)))
            .header("Prefer", "return=representation")
            .json(body);
        let response = Self::check(request.send().await?).await?;
        let rows: Vec<T> = Self::decode(response, table).await?;
        rows.into_iter().next().ok_or_else(|| GatewayError::NotFound(format!("{table}: insert returned no row")))
    }
}

fn in_list(values: &[String]) -> String {
    let quoted: Vec<String> = values.iter().map(|v| format!("\"{}\"", v.replace('"', ""))).collect();
    format!("in.({})", quoted.join(","))
}

/// The project key stays in the `apikey` header; row-level policies see the user's token.
impl UserScoped for SupabaseClient {
    fn for_user(self: Arc<Self>, access_token: &str) -> Arc<Self> {
        Arc::new(Self { bearer: access_token.to_string(), ..(*self).clone() })
    }
}

#[async_trait]
impl CatalogGateway for SupabaseClient {
    async fn list_products(&self, query: &ProductQuery) -> GatewayResult<Vec<ProductRow>> {
        let mut params = vec![("select", "*".to_string()), ("order", "created_at.desc".to_string())];
        if !query.categories.is_empty() {
            params.push(("category", in_list(&query.categories)));
        }
        if query.featured_only {
            params.push(("is_featured", "eq.true".to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        self.select(PRODUCTS, &params).await
    }

    async fn product_by_slug(&self, slug: &str) -> GatewayResult<Option<ProductRow>> {
        let params = [("select", "*".to_string()), ("slug", format!("eq.{slug}")), ("limit", "1".to_string())];
        let rows: Vec<ProductRow> = self.select(PRODUCTS, &params).await?;
        Ok(rows.into_iter().next())
    }

    async fn search_products(&self, query: &str, limit: u32) -> GatewayResult<Vec<ProductRow>> {
        let request = self
            .with_key(self.client.post(format!("{}/rest/v1/rpc/{SEARCH_PROCEDURE}", self.base_url)))
            .json(&json!({ "search_query": query, "result_limit": limit }));
        let response = Self::check(request.send().await?).await?;
        Self::decode(response, SEARCH_PROCEDURE).await
    }

    async fn certificates_for(&self, product_id: &str) -> GatewayResult<Vec<ProductCertificate>> {
        let params = [
            ("select", "*".to_string()),
            ("product_id", format!("eq.{product_id}")),
            ("order", "sort_order.asc".to_string()),
        ];
        self.select(CERTIFICATES, &params).await
    }
}

#[async_trait]
impl BlogRepository for SupabaseClient {
    async fn list_posts(&self, published_only: bool) -> GatewayResult<Vec<BlogPost>> {
        let mut params = vec![("select", "*".to_string()), ("order", "created_at.desc".to_string())];
        if published_only {
            params.push(("is_published", "eq.true".to_string()));
        }
        self.select(BLOG_POSTS, &params).await
    }

    async fn post_by_id(&self, id: &str) -> GatewayResult<Option<BlogPost>> {
        let params = [("select", "*".to_string()), ("id", format!("eq.{id}")), ("limit", "1".to_string())];
        let rows: Vec<BlogPost> = self.select(BLOG_POSTS, &params).await?;
        Ok(rows.into_iter().next())
    }

    async fn post_by_slug(&self, slug: &str, published_only: bool) -> GatewayResult<Option<BlogPost>> {
        let mut params = vec![("select", "*".to_string()), ("slug", format!("eq.{slug}")), ("limit", "1".to_string())];
        if published_only {
            params.push(("is_published", "eq.true".to_string()));
        }
        let rows: Vec<BlogPost> = self.select(BLOG_POSTS, &params).await?;
        Ok(rows.into_iter().next())
    }

    async fn slug_taken(&self, slug: &str, excluding: Option<&str>) -> GatewayResult<bool> {
        let mut params = vec![("select", "id".to_string()), ("slug", format!("eq.{slug}")), ("limit", "1".to_string())];
        if let Some(id) = excluding {
            params.push(("id", format!("neq.{id}")));
        }
        let rows: Vec<IdRow> = self.select(BLOG_POSTS, &params).await?;
        Ok(!rows.is_empty())
    }

    async fn insert_draft(&self, draft: &NewDraft) -> GatewayResult<String> {
        let row: IdRow = self.insert_returning(BLOG_POSTS, draft).await?;
        Ok(row.id)
    }

    async fn update_post(&self, id: &str, update: &BlogPostUpdate) -> GatewayResult<BlogPost> {
        let request = self
            .with_key(self.client.patch(self.rest_url(BLOG_POSTS)))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(update);
        let response = Self::check(request.send().await?).await?;
        let rows: Vec<BlogPost> = Self::decode(response, BLOG_POSTS).await?;
        rows.into_iter().next().ok_or_else(|| GatewayError::NotFound(format!("blog post {id}")))
    }

    async fn set_featured(&self, id: &str, featured: bool) -> GatewayResult<()> {
        self.patch(BLOG_POSTS, id, &json!({ "is_featured": featured })).await
    }

    async fn set_published(&self, id: &str, published: bool) -> GatewayResult<()> {
        self.patch(BLOG_POSTS, id, &json!({ "is_published": published })).await
    }

    async fn delete_post(&self, id: &str) -> GatewayResult<()> {
        self.delete(BLOG_POSTS, id).await
    }
}

#[async_trait]
impl ObjectStorage for SupabaseClient {
    async fn upload(&self, path: &str, file: &UploadFile, overwrite: bool) -> GatewayResult<()> {
        let url = format!("{}/storage/v1/object/{}/{path}", self.base_url, self.bucket);
        let request = self
            .with_key(self.client.post(&url))
            .header(CONTENT_TYPE, file.content_type.as_str())
            .header("x-upsert", if overwrite { "true" } else { "false" })
            .body(file.bytes.clone());
        match Self::check(request.send().await?).await {
            Ok(_) => Ok(()),
            Err(GatewayError::Status { status, body, .. }) => {
                Err(GatewayError::Storage(format!("upload of {path} failed with {status}: {body}")))
            }
            Err(other) => Err(other),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{path}", self.base_url, self.bucket)
    }
}

#[async_trait]
impl AuthGateway for SupabaseClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> GatewayResult<AuthSession> {
        let request = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .json(&PasswordGrant { email, password });
        let response = match Self::check(request.send().await?).await {
            Err(GatewayError::Status { status: 400, .. }) => return Err(GatewayError::Unauthorized),
            other => other?,
        };
        let token: TokenResponse = Self::decode(response, "auth token").await?;
        let session = AuthSession {
            access_token: token.access_token,
            email: token.user.and_then(|u| u.email).or_else(|| Some(email.to_string())),
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in.unwrap_or(3600)),
        };
        let _ = self.auth_events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self, access_token: &str) -> GatewayResult<()> {
        let request = self.client.post(format!("{}/auth/v1/logout", self.base_url)).bearer_auth(access_token);
        let result = Self::check(request.send().await?).await;
        let _ = self.auth_events.send(AuthEvent::SignedOut { access_token: access_token.to_string() });
        match result {
            Ok(_) | Err(GatewayError::Unauthorized) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn session_for(&self, access_token: &str) -> GatewayResult<Option<AuthSession>> {
        let request = self.client.get(format!("{}/auth/v1/user", self.base_url)).bearer_auth(access_token);
        let response = match Self::check(request.send().await?).await {
            Ok(response) => response,
            Err(GatewayError::Unauthorized | GatewayError::Status { status: 403, .. }) => {
                let _ = self.auth_events.send(AuthEvent::SessionExpired { access_token: access_token.to_string() });
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let user: UserResponse = Self::decode(response, "auth user").await?;
        Ok(Some(AuthSession {
            access_token: access_token.to_string(),
            email: user.email,
            // GoTrue validated the token just now; treat it as live for this request.
            expires_at: Utc::now() + chrono::Duration::minutes(1),
        }))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }
}

#[async_trait]
impl InquiryRepository for SupabaseClient {
    async fn insert_inquiry(&self, inquiry: &NewInquiry) -> GatewayResult<ContactInquiry> {
        let body = json!({
            "name": inquiry.name,
            "phone": inquiry.phone,
            "email": inquiry.email,
            "message": inquiry.message,
            "source_page": inquiry.source_page,
            "user_agent": inquiry.user_agent,
            "status": InquiryStatus::Pending,
        });
        self.insert_returning(INQUIRIES, &body).await
    }

    async fn list_inquiries(&self) -> GatewayResult<Vec<ContactInquiry>> {
        self.select(INQUIRIES, &[("select", "*".to_string()), ("order", "created_at.desc".to_string())]).await
    }

    async fn set_inquiry_status(&self, id: &str, status: InquiryStatus) -> GatewayResult<()> {
        self.patch(INQUIRIES, id, &json!({ "status": status })).await
    }

    async fn delete_inquiry(&self, id: &str) -> GatewayResult<()> {
        self.delete(INQUIRIES, id).await
    }
}
