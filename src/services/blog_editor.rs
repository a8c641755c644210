//! Blog post editor with deferred image upload.
//!
//! Images added to the body while editing are embedded under a temporary
//! placeholder (`blob:skazka/<key>`) and queued. Saving runs one sequential
//! pipeline:
//!
//! 1. pick a unique slug for the title;
//! 2. create a minimal row if the post was never saved, so uploads have an id
//!    to live under;
//! 3. upload a newly chosen cover;
//! 4. upload each queued body image and swap its placeholder for the durable
//!    URL;
//! 5. collect every durable image URL left in the body;
//! 6. write all fields in one update;
//! 7. clear the queue.
//!
//! Any failure stops the pipeline before the update, keeps the queue and
//! returns one error, so the same save can be retried.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::aggregates::{BlogPost, BlogPostUpdate, NewDraft, PostStatus};
use crate::domain::slug::derive_slug;
use crate::domain::value_objects::Slug;
use crate::ports::{BlogRepository, GatewayResult, ObjectStorage, UploadFile};
use crate::{Result, StorefrontError, ValidationFailure};

pub const PLACEHOLDER_PREFIX: &str = "blob:skazka/";

const FALLBACK_SLUG: &str = "post";
const MAX_SLUG_ATTEMPTS: u32 = 500;
const MAX_SLUG_LEN: usize = 120;

/// A whole placeholder token; keys never contain quotes, spaces or `<`.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{}[A-Za-z0-9_-]+", regex::escape(PLACEHOLDER_PREFIX))).expect("placeholder pattern")
});

static IMG_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("image src pattern"));

/// Every durable (http/https) image URL in `content`, in order, without duplicates.
pub fn extract_image_urls(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    IMG_SRC
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|src| src.starts_with("https://") || src.starts_with("http://"))
        .filter(|src| seen.insert(src.to_string()))
        .map(ToOwned::to_owned)
        .collect()
}

/// Slug derived from a title, never empty.
/// Very long titles are cut at `MAX_SLUG_LEN`.
pub fn slug_base(title: &str) -> String {
    let mut slug = derive_slug(title);
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        slug.truncate(slug.trim_end_matches('-').len());
    }
    if slug.is_empty() { FALLBACK_SLUG.to_string() } else { slug }
}

/// Every distinct placeholder token embedded in `content`.
pub fn embedded_placeholders(content: &str) -> HashSet<String> {
    PLACEHOLDER.find_iter(content).map(|m| m.as_str().to_string()).collect()
}

/// `base` if no other post uses it, otherwise the first free `base-2`, `base-3`, ...
/// The post identified by `excluding` never counts as a collision.
pub async fn ensure_unique_slug(blog: &dyn BlogRepository, base: &Slug, excluding: Option<&str>) -> GatewayResult<String> {
    for n in 1..=MAX_SLUG_ATTEMPTS {
        let candidate = base.with_suffix(n);
        if !blog.slug_taken(candidate.as_str(), excluding).await? {
            return Ok(candidate.into());
        }
    }
    let candidate = format!("{base}-{}", &Uuid::new_v4().simple().to_string()[..8]);
    tracing::warn!(%base, %candidate, "slug counter exhausted");
    Ok(candidate)
}

/// Posts with a save currently running. Shared by every editor of the process.
#[derive(Clone, Debug, Default)]
pub struct InFlightSaves {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl InFlightSaves {
    pub fn new() -> Self { Self::default() }

    /// Claims `key` until the returned guard drops; `None` if already claimed.
    pub fn claim(&self, key: &str) -> Option<SaveClaim> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        keys.insert(key.to_string()).then(|| SaveClaim { keys: self.keys.clone(), key: key.to_string() })
    }

    pub fn is_saving(&self, key: &str) -> bool {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).contains(key)
    }
}

#[derive(Debug)]
pub struct SaveClaim {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for SaveClaim {
    fn drop(&mut self) {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.key);
    }
}

/// Free-text fields the author edits directly. The slug is not among them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EditableFields {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
}

#[derive(Clone, Debug)]
struct PendingImage {
    placeholder: String,
    key: String,
    file: UploadFile,
    uploaded_url: Option<String>,
}

#[derive(Clone, Debug)]
struct PendingCover {
    key: String,
    file: UploadFile,
    uploaded_url: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SaveOutcome {
    pub post: BlogPost,
    pub uploaded_images: usize,
    /// Publishing returns the author to the post list.
    pub navigate_to_listing: bool,
}

pub struct BlogEditor {
    blog: Arc<dyn BlogRepository>,
    storage: Arc<dyn ObjectStorage>,
    saves: InFlightSaves,
    editor_key: String,
    post: BlogPost,
    pending: Vec<PendingImage>,
    cover: Option<PendingCover>,
}

impl BlogEditor {
    /// Editor for a post that does not exist yet.
    pub fn new(blog: Arc<dyn BlogRepository>, storage: Arc<dyn ObjectStorage>, saves: InFlightSaves) -> Self {
        Self {
            blog,
            storage,
            saves,
            editor_key: format!("new:{}", Uuid::new_v4()),
            post: BlogPost::default(),
            pending: Vec::new(),
            cover: None,
        }
    }

    /// Editor for an existing post.
    pub async fn open(
        blog: Arc<dyn BlogRepository>,
        storage: Arc<dyn ObjectStorage>,
        saves: InFlightSaves,
        post_id: &str,
    ) -> Result<Self> {
        let post = blog
            .post_by_id(post_id)
            .await
            .map_err(StorefrontError::fetch("blog post"))?
            .ok_or_else(|| StorefrontError::NotFound(format!("blog post {post_id}")))?;
        Ok(Self { editor_key: post_id.to_string(), post, ..Self::new(blog, storage, saves) })
    }

    pub fn post(&self) -> &BlogPost { &self.post }

    pub fn status(&self) -> PostStatus { self.post.status() }

    pub fn pending_images(&self) -> usize { self.pending.len() }

    pub fn has_pending_cover(&self) -> bool { self.cover.is_some() }

    /// Slug the current title would get, before the collision check.
    pub fn slug_preview(&self) -> String { slug_base(&self.post.title) }

    pub fn fields(&self) -> EditableFields {
        EditableFields {
            title: self.post.title.clone(),
            subtitle: self.post.subtitle.clone(),
            excerpt: self.post.excerpt.clone(),
            content: self.post.content.clone(),
            category: self.post.category.clone(),
            keywords: self.post.keywords.clone(),
            meta_title: self.post.meta_title.clone(),
            meta_description: self.post.meta_description.clone(),
        }
    }

    pub fn set_fields(&mut self, fields: EditableFields) {
        self.post.title = fields.title;
        self.post.subtitle = fields.subtitle;
        self.post.excerpt = fields.excerpt;
        self.post.content = fields.content;
        self.post.category = fields.category;
        self.post.keywords = fields.keywords;
        self.post.meta_title = fields.meta_title;
        self.post.meta_description = fields.meta_description;
    }

    pub fn update(&mut self, edit: impl FnOnce(&mut EditableFields)) {
        let mut fields = self.fields();
        edit(&mut fields);
        self.set_fields(fields);
    }

    /// Queues `file` and returns the placeholder to embed in the body.
    pub fn insert_image(&mut self, file: UploadFile) -> String {
        let key = Uuid::new_v4().simple().to_string();
        let placeholder = format!("{PLACEHOLDER_PREFIX}{key}");
        self.pending.push(PendingImage { placeholder: placeholder.clone(), key, file, uploaded_url: None });
        placeholder
    }

    /// Queues `file` and appends it to the end of the body.
    pub fn append_image(&mut self, file: UploadFile) -> String {
        let placeholder = self.insert_image(file);
        self.post.content.push_str(&format!("<p><img src=\"{placeholder}\"></p>"));
        placeholder
    }

    /// Queues `file` under a placeholder the client already embedded.
    pub fn attach_image(&mut self, placeholder: &str, file: UploadFile) -> Result<()> {
        let Some(key) = placeholder.strip_prefix(PLACEHOLDER_PREFIX).filter(|k| valid_key(k)) else {
            return Err(StorefrontError::Validation(ValidationFailure::single(
                "images",
                format!("Невалиден временен адрес на изображение: {placeholder}"),
            )));
        };
        self.pending.retain(|p| p.placeholder != placeholder);
        self.pending.push(PendingImage {
            placeholder: placeholder.to_string(),
            key: key.to_string(),
            file,
            uploaded_url: None,
        });
        Ok(())
    }

    /// Queues a new cover. The storage key comes from the file contents, so
    /// resubmitting the same file after a failed save reuses the same object.
    pub fn set_cover(&mut self, file: UploadFile) {
        let key = content_key(&file.bytes);
        if self.cover.as_ref().is_some_and(|c| c.key == key) {
            return;
        }
        self.cover = Some(PendingCover { key, file, uploaded_url: None });
    }

    pub fn clear_cover(&mut self) {
        self.cover = None;
        self.post.image_url = None;
    }

    pub async fn save_draft(&mut self) -> Result<SaveOutcome> { self.save(false).await }

    pub async fn publish(&mut self) -> Result<SaveOutcome> { self.save(true).await }

    pub async fn save(&mut self, publish: bool) -> Result<SaveOutcome> {
        let claim_key = self.editor_key.clone();
        let Some(_claim) = self.saves.claim(&claim_key) else {
            tracing::warn!(post = %claim_key, "save rejected; another save is running");
            return Err(StorefrontError::SaveInProgress(claim_key));
        };

        let result = self.run_save(publish).await;
        match &result {
            Ok(outcome) => tracing::info!(
                post_id = outcome.post.id.as_deref().unwrap_or("-"),
                slug = %outcome.post.slug,
                uploaded = outcome.uploaded_images,
                publish,
                "blog post saved"
            ),
            Err(err) => tracing::error!(error = %err, post = %claim_key, "blog post save failed"),
        }
        result
    }

    async fn run_save(&mut self, publish: bool) -> Result<SaveOutcome> {
        let embedded = embedded_placeholders(&self.post.content);
        if let Some(missing) = embedded.iter().find(|p| !self.pending.iter().any(|i| &i.placeholder == *p)) {
            tracing::warn!(placeholder = %missing, "body references an image that was never queued");
            return Err(unresolved_image());
        }
        if PLACEHOLDER.replace_all(&self.post.content, "").contains(PLACEHOLDER_PREFIX) {
            tracing::warn!("body contains a malformed image placeholder");
            return Err(unresolved_image());
        }

        let base = Slug::parse(slug_base(&self.post.title))
            .map_err(|err| StorefrontError::Validation(ValidationFailure::single("title", err.to_string())))?;
        let slug = ensure_unique_slug(&*self.blog, &base, self.post.id.as_deref())
            .await
            .map_err(StorefrontError::fetch("existing slugs"))?;

        let post_id = match self.post.id.clone() {
            Some(id) => id,
            None => {
                let draft = NewDraft {
                    title: self.post.title.clone(),
                    slug: slug.clone(),
                    content: String::new(),
                    is_published: false,
                };
                let id = self.blog.insert_draft(&draft).await.map_err(StorefrontError::write("creating the draft"))?;
                // The row exists from here on; a failed save must not create a second one.
                self.post.mark_created(id.clone(), slug.clone());
                self.editor_key = id.clone();
                id
            }
        };

        let mut uploaded = 0;
        let mut image_url = self.post.image_url.clone();
        if let Some(cover) = self.cover.as_mut() {
            let url = match &cover.uploaded_url {
                Some(url) => url.clone(),
                None => {
                    let path = format!("posts/{post_id}/cover-{}.{}", cover.key, cover.file.extension());
                    let url = upload(&*self.storage, &path, &cover.file).await?;
                    cover.uploaded_url = Some(url.clone());
                    uploaded += 1;
                    url
                }
            };
            image_url = Some(url);
        }

        let mut resolved = HashMap::with_capacity(embedded.len());
        for image in &mut self.pending {
            if !embedded.contains(&image.placeholder) {
                tracing::debug!(placeholder = %image.placeholder, "queued image no longer in body; skipping");
                continue;
            }
            let url = match &image.uploaded_url {
                Some(url) => url.clone(),
                None => {
                    let path = format!("posts/{post_id}/inline-{}.{}", image.key, image.file.extension());
                    let url = upload(&*self.storage, &path, &image.file).await?;
                    image.uploaded_url = Some(url.clone());
                    uploaded += 1;
                    url
                }
            };
            resolved.insert(image.placeholder.clone(), url);
        }
        let content = PLACEHOLDER
            .replace_all(&self.post.content, |caps: &Captures| {
                resolved.get(&caps[0]).cloned().unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned();

        let update = BlogPostUpdate {
            title: self.post.title.clone(),
            subtitle: self.post.subtitle.clone(),
            slug,
            excerpt: self.post.excerpt.clone(),
            inside_images: extract_image_urls(&content),
            content,
            image_url,
            category: self.post.category.clone(),
            keywords: self.post.keywords.clone(),
            meta_title: self.post.meta_title.clone(),
            meta_description: self.post.meta_description.clone(),
            is_published: publish,
        };
        let saved = self.blog.update_post(&post_id, &update).await.map_err(StorefrontError::write("saving the post"))?;

        self.post.apply_saved(saved, uploaded);
        self.pending.clear();
        self.cover = None;
        for event in self.post.take_events() {
            tracing::debug!(?event, "blog event");
        }
        Ok(SaveOutcome { post: self.post.clone(), uploaded_images: uploaded, navigate_to_listing: publish })
    }

    /// Takes a published post back to draft.
    pub async fn unpublish(&mut self) -> Result<()> {
        let Some(id) = self.post.id.clone() else {
            return Err(StorefrontError::NotFound("unsaved blog post".to_string()));
        };
        let Some(_claim) = self.saves.claim(&self.editor_key) else {
            return Err(StorefrontError::SaveInProgress(self.editor_key.clone()));
        };
        self.blog.set_published(&id, false).await.map_err(StorefrontError::write("unpublishing the post"))?;
        if let Err(err) = self.post.unpublish() {
            tracing::debug!(%err, post_id = %id, "post was already a draft");
        }
        for event in self.post.take_events() {
            tracing::info!(?event, "blog event");
        }
        Ok(())
    }
}

fn valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= 64 && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn unresolved_image() -> StorefrontError {
    StorefrontError::Validation(ValidationFailure::single(
        "content",
        "Съдържанието съдържа изображение, което не е качено.",
    ))
}

/// First 128 bits of the SHA-256 of `bytes`, as lowercase hex.
fn content_key(bytes: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(bytes));
    digest[..32].to_string()
}

async fn upload(storage: &dyn ObjectStorage, path: &str, file: &UploadFile) -> Result<String> {
    storage.upload(path, file, true).await.map_err(StorefrontError::write("uploading an image"))?;
    Ok(storage.public_url(path))
}
