//! Blog Post Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::decode::{null_as_default, opt_string_or_number};
use crate::domain::events::{BlogEvent, DomainEvent};

/// Row of the `blog_posts` table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    #[serde(default, deserialize_with = "opt_string_or_number", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inside_images: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_published: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_featured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus { New, Draft, Published }

/// Minimal row inserted the first time a post is saved.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewDraft {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub is_published: bool,
}

/// Full update written by every save.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlogPostUpdate {
    pub title: String,
    pub subtitle: Option<String>,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub image_url: Option<String>,
    pub inside_images: Vec<String>,
    pub category: Option<String>,
    pub keywords: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub is_published: bool,
}

impl BlogPost {
    pub fn status(&self) -> PostStatus {
        match (&self.id, self.is_published) {
            (None, _) => PostStatus::New,
            (Some(_), false) => PostStatus::Draft,
            (Some(_), true) => PostStatus::Published,
        }
    }

    /// Records that a minimal row now backs this post.
    pub fn mark_created(&mut self, id: String, slug: String) {
        self.raise_event(BlogEvent::DraftCreated { post_id: id.clone(), slug: slug.clone() });
        self.id = Some(id);
        self.slug = slug;
    }

    /// Replaces local state with the row returned by a successful save.
    pub fn apply_saved(&mut self, saved: BlogPost, uploaded_images: usize) {
        let was_published = self.is_published;
        let events = std::mem::take(&mut self.events);
        *self = saved;
        self.events = events;
        let post_id = self.id.clone().unwrap_or_default();
        self.raise_event(BlogEvent::Saved { post_id: post_id.clone(), slug: self.slug.clone(), uploaded_images });
        match (was_published, self.is_published) {
            (false, true) => self.raise_event(BlogEvent::Published { post_id }),
            (true, false) => self.raise_event(BlogEvent::Unpublished { post_id }),
            _ => {}
        }
    }

    pub fn publish(&mut self) -> Result<(), BlogPostError> {
        let id = self.id.clone().ok_or(BlogPostError::NotPersisted)?;
        if self.is_published { return Err(BlogPostError::AlreadyPublished); }
        self.is_published = true;
        self.raise_event(BlogEvent::Published { post_id: id });
        Ok(())
    }

    pub fn unpublish(&mut self) -> Result<(), BlogPostError> {
        let id = self.id.clone().ok_or(BlogPostError::NotPersisted)?;
        if !self.is_published { return Err(BlogPostError::NotPublished); }
        self.is_published = false;
        self.raise_event(BlogEvent::Unpublished { post_id: id });
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: BlogEvent) { self.events.push(DomainEvent::Blog(e)); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum BlogPostError { NotPersisted, AlreadyPublished, NotPublished }
impl std::error::Error for BlogPostError {}
impl std::fmt::Display for BlogPostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPersisted => write!(f, "Post has not been saved yet"),
            Self::AlreadyPublished => write!(f, "Post is already published"),
            Self::NotPublished => write!(f, "Post is not published"),
        }
    }
}
