//! In-memory backend implementing every port.
//!
//! Used by the test suites and by `STOREFRONT_BACKEND=memory` for local
//! development. Failure injection lets tests exercise the write-failure paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::domain::aggregates::{
    BlogPost, BlogPostUpdate, ContactInquiry, InquiryStatus, NewDraft, NewInquiry, ProductCertificate, ProductRow,
};
use crate::ports::{
    AuthEvent, AuthGateway, AuthSession, BlogRepository, CatalogGateway, GatewayError, GatewayResult,
    InquiryRepository, ObjectStorage, ProductQuery, UploadFile, UserScoped,
};

const PUBLIC_BASE: &str = "https://storage.memory.local/object/public";

/// Operations that can be told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailPoint {
    ReadProducts,
    Search,
    Upload,
    InsertDraft,
    UpdatePost,
    SetFeatured,
    SetInquiryStatus,
    InsertInquiry,
    ReadSession,
}

#[derive(Debug, Default)]
struct State {
    products: Vec<ProductRow>,
    certificates: Vec<ProductCertificate>,
    posts: BTreeMap<u64, BlogPost>,
    inquiries: BTreeMap<u64, ContactInquiry>,
    objects: HashMap<String, UploadFile>,
    upload_log: Vec<String>,
    users: HashMap<String, String>,
    sessions: HashMap<String, AuthSession>,
    /// Remaining failures per fail point; `None` fails until cleared.
    failures: HashMap<FailPoint, Option<usize>>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn trip(&mut self, point: FailPoint) -> GatewayResult<()> {
        let injected = || -> GatewayResult<()> { Err(GatewayError::Unavailable(format!("injected failure at {point:?}"))) };
        match self.failures.get(&point).copied() {
            None => Ok(()),
            Some(None) => injected(),
            Some(Some(n)) if n <= 1 => {
                self.failures.remove(&point);
                if n == 1 { injected() } else { Ok(()) }
            }
            Some(Some(n)) => {
                self.failures.insert(point, Some(n - 1));
                injected()
            }
        }
    }
}

fn parse_id(id: &str) -> GatewayResult<u64> {
    id.parse::<u64>().map_err(|_| GatewayError::NotFound(id.to_string()))
}

#[derive(Debug)]
pub struct MemoryBackend {
    bucket: String,
    state: Mutex<State>,
    auth_events: broadcast::Sender<AuthEvent>,
    scoped_tokens: std::sync::Mutex<Vec<String>>,
}

impl Default for MemoryBackend {
    fn default() -> Self { Self::new() }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (auth_events, _) = broadcast::channel(32);
        Self {
            bucket: "blog-images".to_string(),
            state: Mutex::new(State::default()),
            auth_events,
            scoped_tokens: std::sync::Mutex::default(),
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_products(mut self, products: impl IntoIterator<Item = ProductRow>) -> Self {
        self.state.get_mut().products.extend(products);
        self
    }

    pub fn with_certificates(mut self, certificates: impl IntoIterator<Item = ProductCertificate>) -> Self {
        self.state.get_mut().certificates.extend(certificates);
        self
    }

    pub fn with_user(mut self, email: &str, password: &str) -> Self {
        self.state.get_mut().users.insert(email.to_lowercase(), password.to_string());
        self
    }

    /// Stores `post` under a fresh id.
    pub fn with_post(mut self, mut post: BlogPost) -> Self {
        let state = self.state.get_mut();
        let id = state.next_id();
        post.id = Some(id.to_string());
        post.created_at.get_or_insert_with(Utc::now);
        state.posts.insert(id, post);
        self
    }

    /// Makes `point` fail the next `times` calls, or every call when `None`.
    pub async fn fail(&self, point: FailPoint, times: Option<usize>) {
        self.state.lock().await.failures.insert(point, times);
    }

    pub async fn clear_failures(&self) {
        self.state.lock().await.failures.clear();
    }

    /// Paths uploaded so far, in order, including overwrites.
    pub async fn upload_log(&self) -> Vec<String> {
        self.state.lock().await.upload_log.clone()
    }

    pub async fn stored_object(&self, path: &str) -> Option<UploadFile> {
        self.state.lock().await.objects.get(path).cloned()
    }

    pub async fn posts(&self) -> Vec<BlogPost> {
        self.state.lock().await.posts.values().cloned().collect()
    }

    /// Access tokens the backend has been scoped to, in order.
    pub fn scoped_tokens(&self) -> Vec<String> {
        self.scoped_tokens.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Ends a session as if its token expired and notifies subscribers.
    pub async fn expire_session(&self, access_token: &str) {
        self.state.lock().await.sessions.remove(access_token);
        let _ = self.auth_events.send(AuthEvent::SessionExpired { access_token: access_token.to_string() });
    }
}

fn matches_query(row: &ProductRow, query: &ProductQuery) -> bool {
    let category_ok = query.categories.is_empty()
        || row.category.as_deref().is_some_and(|c| query.categories.iter().any(|q| q == c));
    let featured_ok = !query.featured_only || row.is_featured.unwrap_or(false);
    category_ok && featured_ok
}

/// There are no row-level policies in memory, so every user shares one store.
impl UserScoped for MemoryBackend {
    fn for_user(self: Arc<Self>, access_token: &str) -> Arc<Self> {
        self.scoped_tokens.lock().unwrap_or_else(PoisonError::into_inner).push(access_token.to_string());
        self
    }
}

#[async_trait]
impl CatalogGateway for MemoryBackend {
    async fn list_products(&self, query: &ProductQuery) -> GatewayResult<Vec<ProductRow>> {
        let mut state = self.state.lock().await;
        state.trip(FailPoint::ReadProducts)?;
        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        Ok(state.products.iter().filter(|r| matches_query(r, query)).take(limit).cloned().collect())
    }

    async fn product_by_slug(&self, slug: &str) -> GatewayResult<Option<ProductRow>> {
        let mut state = self.state.lock().await;
        state.trip(FailPoint::ReadProducts)?;
        Ok(state.products.iter().find(|r| r.slug == slug).cloned())
    }

    async fn search_products(&self, query: &str, limit: u32) -> GatewayResult<Vec<ProductRow>> {
        let mut state = self.state.lock().await;
        state.trip(FailPoint::Search)?;
        let needle = query.to_lowercase();
        let hit = |row: &&ProductRow| {
            [row.title_bg.as_deref(), row.title.as_deref(), Some(row.slug.as_str()), row.description.as_deref()]
                .into_iter()
                .flatten()
                .any(|text| text.to_lowercase().contains(&needle))
        };
        Ok(state.products.iter().filter(hit).take(limit as usize).cloned().collect())
    }

    async fn certificates_for(&self, product_id: &str) -> GatewayResult<Vec<ProductCertificate>> {
        let state = self.state.lock().await;
        let mut certs: Vec<ProductCertificate> =
            state.certificates.iter().filter(|c| c.product_id == product_id).cloned().collect();
        certs.sort_by_key(|c| c.sort_order.unwrap_or(i32::MAX));
        Ok(certs)
    }
}

#[async_trait]
impl BlogRepository for MemoryBackend {
    async fn list_posts(&self, published_only: bool) -> GatewayResult<Vec<BlogPost>> {
        let state = self.state.lock().await;
        Ok(state.posts.values().rev().filter(|p| !published_only || p.is_published).cloned().collect())
    }

    async fn post_by_id(&self, id: &str) -> GatewayResult<Option<BlogPost>> {
        let Ok(key) = parse_id(id) else { return Ok(None) };
        Ok(self.state.lock().await.posts.get(&key).cloned())
    }

    async fn post_by_slug(&self, slug: &str, published_only: bool) -> GatewayResult<Option<BlogPost>> {
        let state = self.state.lock().await;
        Ok(state.posts.values().find(|p| p.slug == slug && (!published_only || p.is_published)).cloned())
    }

    async fn slug_taken(&self, slug: &str, excluding: Option<&str>) -> GatewayResult<bool> {
        let state = self.state.lock().await;
        Ok(state.posts.values().any(|p| p.slug == slug && p.id.as_deref() != excluding))
    }

    async fn insert_draft(&self, draft: &NewDraft) -> GatewayResult<String> {
        let mut state = self.state.lock().await;
        state.trip(FailPoint::InsertDraft)?;
        let id = state.next_id();
        let mut post = BlogPost::default();
        post.id = Some(id.to_string());
        post.title = draft.title.clone();
        post.slug = draft.slug.clone();
        post.content = draft.content.clone();
        post.is_published = draft.is_published;
        post.created_at = Some(Utc::now());
        state.posts.insert(id, post);
        Ok(id.to_string())
    }

    async fn update_post(&self, id: &str, update: &BlogPostUpdate) -> GatewayResult<BlogPost> {
        let key = parse_id(id)?;
        let mut state = self.state.lock().await;
        state.trip(FailPoint::UpdatePost)?;
        let post = state.posts.get_mut(&key).ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        post.title = update.title.clone();
        post.subtitle = update.subtitle.clone();
        post.slug = update.slug.clone();
        post.excerpt = update.excerpt.clone();
        post.content = update.content.clone();
        post.image_url = update.image_url.clone();
        post.inside_images = update.inside_images.clone();
        post.category = update.category.clone();
        post.keywords = update.keywords.clone();
        post.meta_title = update.meta_title.clone();
        post.meta_description = update.meta_description.clone();
        post.is_published = update.is_published;
        post.updated_at = Some(Utc::now());
        Ok(post.clone())
    }

    async fn set_featured(&self, id: &str, featured: bool) -> GatewayResult<()> {
        let key = parse_id(id)?;
        let mut state = self.state.lock().await;
        state.trip(FailPoint::SetFeatured)?;
        let post = state.posts.get_mut(&key).ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        post.is_featured = featured;
        Ok(())
    }

    async fn set_published(&self, id: &str, published: bool) -> GatewayResult<()> {
        let key = parse_id(id)?;
        let mut state = self.state.lock().await;
        let post = state.posts.get_mut(&key).ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        post.is_published = published;
        Ok(())
    }

    async fn delete_post(&self, id: &str) -> GatewayResult<()> {
        let key = parse_id(id)?;
        self.state.lock().await.posts.remove(&key);
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryBackend {
    async fn upload(&self, path: &str, file: &UploadFile, overwrite: bool) -> GatewayResult<()> {
        let mut state = self.state.lock().await;
        state.trip(FailPoint::Upload)?;
        if !overwrite && state.objects.contains_key(path) {
            return Err(GatewayError::Storage(format!("object already exists: {path}")));
        }
        state.objects.insert(path.to_string(), file.clone());
        state.upload_log.push(path.to_string());
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{PUBLIC_BASE}/{}/{path}", self.bucket)
    }
}

#[async_trait]
impl AuthGateway for MemoryBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> GatewayResult<AuthSession> {
        let email = email.trim().to_lowercase();
        let session = {
            let mut state = self.state.lock().await;
            if state.users.get(&email).map(String::as_str) != Some(password) {
                return Err(GatewayError::Unauthorized);
            }
            let session = AuthSession {
                access_token: Uuid::new_v4().to_string(),
                email: Some(email),
                expires_at: Utc::now() + Duration::hours(1),
            };
            state.sessions.insert(session.access_token.clone(), session.clone());
            session
        };
        let _ = self.auth_events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self, access_token: &str) -> GatewayResult<()> {
        self.state.lock().await.sessions.remove(access_token);
        let _ = self.auth_events.send(AuthEvent::SignedOut { access_token: access_token.to_string() });
        Ok(())
    }

    async fn session_for(&self, access_token: &str) -> GatewayResult<Option<AuthSession>> {
        let mut state = self.state.lock().await;
        state.trip(FailPoint::ReadSession)?;
        Ok(state.sessions.get(access_token).filter(|s| !s.is_expired(Utc::now())).cloned())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }
}

#[async_trait]
impl InquiryRepository for MemoryBackend {
    async fn insert_inquiry(&self, inquiry: &NewInquiry) -> GatewayResult<ContactInquiry> {
        let mut state = self.state.lock().await;
        state.trip(FailPoint::InsertInquiry)?;
        let id = state.next_id();
        let row = ContactInquiry {
            id: id.to_string(),
            name: inquiry.name.clone(),
            phone: inquiry.phone.clone(),
            email: inquiry.email.clone(),
            message: inquiry.message.clone(),
            source_page: inquiry.source_page.clone(),
            user_agent: inquiry.user_agent.clone(),
            status: InquiryStatus::Pending,
            created_at: Some(Utc::now()),
        };
        state.inquiries.insert(id, row.clone());
        Ok(row)
    }

    async fn list_inquiries(&self) -> GatewayResult<Vec<ContactInquiry>> {
        Ok(self.state.lock().await.inquiries.values().rev().cloned().collect())
    }

    async fn set_inquiry_status(&self, id: &str, status: InquiryStatus) -> GatewayResult<()> {
        let key = parse_id(id)?;
        let mut state = self.state.lock().await;
        state.trip(FailPoint::SetInquiryStatus)?;
        let row = state.inquiries.get_mut(&key).ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        row.status = status;
        Ok(())
    }

    async fn delete_inquiry(&self, id: &str) -> GatewayResult<()> {
        let key = parse_id(id)?;
        self.state.lock().await.inquiries.remove(&key);
        Ok(())
    }
}
