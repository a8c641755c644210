//! Admin console lists: blog posts and contact inquiries.
//!
//! Flag toggles are applied to the cached list first and rolled back if the
//! backend rejects them. Deletes go to the backend first and only then leave
//! the list.

use std::sync::Arc;

use crate::domain::aggregates::{BlogPost, ContactInquiry, InquiryStatus};
use crate::ports::{BlogRepository, InquiryRepository};
use crate::services::optimistic::optimistic_update;
use crate::{Result, StorefrontError};

pub struct AdminConsole {
    blog: Arc<dyn BlogRepository>,
    inquiry_repo: Arc<dyn InquiryRepository>,
    posts: Vec<BlogPost>,
    inquiries: Vec<ContactInquiry>,
}

impl AdminConsole {
    pub fn new(blog: Arc<dyn BlogRepository>, inquiry_repo: Arc<dyn InquiryRepository>) -> Self {
        Self { blog, inquiry_repo, posts: Vec::new(), inquiries: Vec::new() }
    }

    /// Points later calls at other repositories, keeping the cached lists.
    pub fn use_repositories(&mut self, blog: Arc<dyn BlogRepository>, inquiry_repo: Arc<dyn InquiryRepository>) {
        self.blog = blog;
        self.inquiry_repo = inquiry_repo;
    }

    pub fn posts(&self) -> &[BlogPost] { &self.posts }

    pub fn inquiries(&self) -> &[ContactInquiry] { &self.inquiries }

    /// Reloads every post, newest first.
    pub async fn refresh_posts(&mut self) -> Result<&[BlogPost]> {
        self.posts = self.blog.list_posts(false).await.map_err(StorefrontError::fetch("blog posts"))?;
        Ok(&self.posts)
    }

    pub async fn refresh_inquiries(&mut self) -> Result<&[ContactInquiry]> {
        self.inquiries = self.inquiry_repo.list_inquiries().await.map_err(StorefrontError::fetch("inquiries"))?;
        Ok(&self.inquiries)
    }

    async fn post_index(&mut self, id: &str) -> Result<usize> {
        if let Some(index) = find_post(&self.posts, id) {
            return Ok(index);
        }
        self.refresh_posts().await?;
        find_post(&self.posts, id).ok_or_else(|| StorefrontError::NotFound(format!("blog post {id}")))
    }

    async fn inquiry_index(&mut self, id: &str) -> Result<usize> {
        if let Some(index) = self.inquiries.iter().position(|i| i.id == id) {
            return Ok(index);
        }
        self.refresh_inquiries().await?;
        self.inquiries
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| StorefrontError::NotFound(format!("inquiry {id}")))
    }

    /// Flips the featured flag and returns the new value.
    pub async fn toggle_featured(&mut self, id: &str) -> Result<bool> {
        let index = self.post_index(id).await?;
        let next = !self.posts[index].is_featured;
        let blog = self.blog.clone();
        optimistic_update(&mut self.posts, |posts| posts[index].is_featured = next, async {
            blog.set_featured(id, next).await.map_err(StorefrontError::write("toggling featured"))
        })
        .await?;
        Ok(next)
    }

    /// Publishes or unpublishes a post straight from the list.
    pub async fn set_published(&mut self, id: &str, published: bool) -> Result<()> {
        let index = self.post_index(id).await?;
        if self.posts[index].is_published == published {
            return Ok(());
        }
        let blog = self.blog.clone();
        optimistic_update(
            &mut self.posts,
            |posts| {
                let post = &mut posts[index];
                let changed = if published { post.publish() } else { post.unpublish() };
                if let Err(err) = changed {
                    tracing::debug!(%err, "publish state already matched");
                }
                for event in post.take_events() {
                    tracing::info!(?event, "blog post visibility changed");
                }
            },
            async { blog.set_published(id, published).await.map_err(StorefrontError::write("changing visibility")) },
        )
        .await
    }

    pub async fn delete_post(&mut self, id: &str) -> Result<()> {
        self.blog.delete_post(id).await.map_err(StorefrontError::write("deleting the post"))?;
        self.posts.retain(|p| p.id.as_deref() != Some(id));
        tracing::info!(post_id = id, "blog post deleted");
        Ok(())
    }

    /// Flips pending/done and returns the new status.
    pub async fn toggle_inquiry_status(&mut self, id: &str) -> Result<InquiryStatus> {
        let index = self.inquiry_index(id).await?;
        let next = self.inquiries[index].status.toggled();
        let repo = self.inquiry_repo.clone();
        optimistic_update(
            &mut self.inquiries,
            |rows| {
                if let Some(event) = rows[index].set_status(next) {
                    tracing::info!(?event, "inquiry status changed");
                }
            },
            async { repo.set_inquiry_status(id, next).await.map_err(StorefrontError::write("updating the inquiry")) },
        )
        .await?;
        Ok(next)
    }

    pub async fn delete_inquiry(&mut self, id: &str) -> Result<()> {
        self.inquiry_repo.delete_inquiry(id).await.map_err(StorefrontError::write("deleting the inquiry"))?;
        self.inquiries.retain(|i| i.id != id);
        Ok(())
    }
}

fn find_post(posts: &[BlogPost], id: &str) -> Option<usize> {
    posts.iter().position(|p| p.id.as_deref() == Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{FailPoint, MemoryBackend};
    use crate::domain::aggregates::NewInquiry;

    fn post(title: &str, published: bool) -> BlogPost {
        let mut post = BlogPost::default();
        post.title = title.into();
        post.slug = crate::domain::slug::derive_slug(title);
        post.is_published = published;
        post
    }

    fn console(backend: &Arc<MemoryBackend>) -> AdminConsole {
        AdminConsole::new(backend.clone(), backend.clone())
    }

    #[tokio::test]
    async fn toggle_featured_persists() {
        let backend = Arc::new(MemoryBackend::new().with_post(post("Първи", true)));
        let mut admin = console(&backend);
        admin.refresh_posts().await.unwrap();
        assert!(admin.toggle_featured("1").await.unwrap());
        assert!(admin.posts()[0].is_featured);
        assert!(backend.posts().await[0].is_featured);
    }

    #[tokio::test]
    async fn rejected_toggle_rolls_back() {
        let backend = Arc::new(MemoryBackend::new().with_post(post("Първи", true)));
        backend.fail(FailPoint::SetFeatured, Some(1)).await;
        let mut admin = console(&backend);
        admin.refresh_posts().await.unwrap();
        let err = admin.toggle_featured("1").await.unwrap_err();
        assert!(matches!(err, StorefrontError::Write { .. }));
        assert!(!admin.posts()[0].is_featured);
        assert!(!backend.posts().await[0].is_featured);
    }

    #[tokio::test]
    async fn unpublish_and_delete_from_list() {
        let backend = Arc::new(MemoryBackend::new().with_post(post("Първи", true)).with_post(post("Втори", false)));
        let mut admin = console(&backend);
        admin.set_published("1", false).await.unwrap();
        assert!(!backend.posts().await[0].is_published);

        admin.delete_post("2").await.unwrap();
        assert_eq!(admin.posts().len(), 1);
        assert_eq!(backend.posts().await.len(), 1);
        assert!(matches!(admin.toggle_featured("2").await, Err(StorefrontError::NotFound(_))));
    }

    #[tokio::test]
    async fn inquiry_status_toggles_with_rollback() {
        let backend = Arc::new(MemoryBackend::new());
        let stored = backend
            .insert_inquiry(&NewInquiry {
                name: "Ана".into(),
                email: "ana@example.com".into(),
                message: "Здравейте, имам въпрос.".into(),
                ..NewInquiry::default()
            })
            .await
            .unwrap();
        let mut admin = console(&backend);
        assert_eq!(admin.toggle_inquiry_status(&stored.id).await.unwrap(), InquiryStatus::Done);

        backend.fail(FailPoint::SetInquiryStatus, Some(1)).await;
        assert!(admin.toggle_inquiry_status(&stored.id).await.is_err());
        assert_eq!(admin.inquiries()[0].status, InquiryStatus::Done);

        admin.delete_inquiry(&stored.id).await.unwrap();
        assert!(admin.refresh_inquiries().await.unwrap().is_empty());
    }
}
