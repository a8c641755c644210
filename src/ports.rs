//! Contracts for the hosted backend.
//!
//! The storefront never talks to tables, storage or auth directly; it goes
//! through these traits so the Supabase client and the in-memory backend are
//! interchangeable.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::aggregates::{
    BlogPost, BlogPostUpdate, ContactInquiry, InquiryStatus, NewDraft, NewInquiry, ProductCertificate, ProductRow,
};

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("row not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}: {body}")]
    Status { status: u16, url: String, body: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid credentials or expired session")]
    Unauthorized,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

//=========================================================================================
// Shared types
//=========================================================================================

/// Filters for a product listing read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProductQuery {
    /// Allowed `category` values; empty means every category.
    pub categories: Vec<String>,
    pub featured_only: bool,
    pub limit: Option<u32>,
}

/// A file selected in the editor, held in memory until it is uploaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), content_type: content_type.into(), bytes }
    }

    /// Lowercase extension from the file name, falling back to the MIME subtype.
    pub fn extension(&self) -> String {
        let from_name = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.bytes().all(|b| b.is_ascii_alphanumeric()));
        from_name.unwrap_or_else(|| match self.content_type.as_str() {
            "image/jpeg" => "jpg".to_string(),
            "image/png" => "png".to_string(),
            "image/webp" => "webp".to_string(),
            "image/gif" => "gif".to_string(),
            _ => "bin".to_string(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool { self.expires_at <= now }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    SignedOut { access_token: String },
    SessionExpired { access_token: String },
}

//=========================================================================================
// Ports
//=========================================================================================

#[async_trait]
pub trait CatalogGateway: Send + Sync {
    async fn list_products(&self, query: &ProductQuery) -> GatewayResult<Vec<ProductRow>>;

    async fn product_by_slug(&self, slug: &str) -> GatewayResult<Option<ProductRow>>;

    /// Ranked full-text search through the backend's search procedure.
    async fn search_products(&self, query: &str, limit: u32) -> GatewayResult<Vec<ProductRow>>;

    async fn certificates_for(&self, product_id: &str) -> GatewayResult<Vec<ProductCertificate>>;
}

#[async_trait]
pub trait BlogRepository: Send + Sync {
    /// Newest first.
    async fn list_posts(&self, published_only: bool) -> GatewayResult<Vec<BlogPost>>;

    async fn post_by_id(&self, id: &str) -> GatewayResult<Option<BlogPost>>;

    async fn post_by_slug(&self, slug: &str, published_only: bool) -> GatewayResult<Option<BlogPost>>;

    /// Whether any post other than `excluding` already uses `slug`.
    async fn slug_taken(&self, slug: &str, excluding: Option<&str>) -> GatewayResult<bool>;

    /// Inserts a minimal row and returns its id.
    async fn insert_draft(&self, draft: &NewDraft) -> GatewayResult<String>;

    async fn update_post(&self, id: &str, update: &BlogPostUpdate) -> GatewayResult<BlogPost>;

    async fn set_featured(&self, id: &str, featured: bool) -> GatewayResult<()>;

    async fn set_published(&self, id: &str, published: bool) -> GatewayResult<()>;

    async fn delete_post(&self, id: &str) -> GatewayResult<()>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, path: &str, file: &UploadFile, overwrite: bool) -> GatewayResult<()>;

    /// Deterministic public URL for an uploaded path.
    fn public_url(&self, path: &str) -> String;
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> GatewayResult<AuthSession>;

    async fn sign_out(&self, access_token: &str) -> GatewayResult<()>;

    /// Resolves an access token to its live session, `None` when it is unknown or expired.
    async fn session_for(&self, access_token: &str) -> GatewayResult<Option<AuthSession>>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

#[async_trait]
pub trait InquiryRepository: Send + Sync {
    async fn insert_inquiry(&self, inquiry: &NewInquiry) -> GatewayResult<ContactInquiry>;

    /// Newest first.
    async fn list_inquiries(&self) -> GatewayResult<Vec<ContactInquiry>>;

    async fn set_inquiry_status(&self, id: &str, status: InquiryStatus) -> GatewayResult<()>;

    async fn delete_inquiry(&self, id: &str) -> GatewayResult<()>;
}

/// Backends whose row-level policies depend on the caller hand out a copy
/// that authenticates as a signed-in user instead of the anonymous project.
pub trait UserScoped: Send + Sync {
    fn for_user(self: Arc<Self>, access_token: &str) -> Arc<Self>;
}

type UserScope = Arc<dyn Fn(&str) -> Gateway + Send + Sync>;

/// One configured handle to the backend, shared by every service.
#[derive(Clone)]
pub struct Gateway {
    pub catalog: Arc<dyn CatalogGateway>,
    pub blog: Arc<dyn BlogRepository>,
    pub storage: Arc<dyn ObjectStorage>,
    pub auth: Arc<dyn AuthGateway>,
    pub inquiries: Arc<dyn InquiryRepository>,
    scope: UserScope,
}

impl Gateway {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: CatalogGateway + BlogRepository + ObjectStorage + AuthGateway + InquiryRepository + UserScoped + 'static,
    {
        let scoped = backend.clone();
        Self {
            catalog: backend.clone(),
            blog: backend.clone(),
            storage: backend.clone(),
            auth: backend.clone(),
            inquiries: backend,
            scope: Arc::new(move |access_token: &str| Gateway::from_backend(scoped.clone().for_user(access_token))),
        }
    }

    /// The same backend acting as the holder of `access_token`; admin writes go through this.
    pub fn for_user(&self, access_token: &str) -> Gateway { (self.scope)(access_token) }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}
