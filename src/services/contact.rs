//! Contact form submissions.

use std::sync::Arc;

use crate::domain::aggregates::{ContactInquiry, NewInquiry};
use crate::domain::events::{DomainEvent, InquiryEvent};
use crate::ports::InquiryRepository;
use crate::{Result, StorefrontError};

#[derive(Clone)]
pub struct ContactService {
    inquiries: Arc<dyn InquiryRepository>,
}

impl ContactService {
    pub fn new(inquiries: Arc<dyn InquiryRepository>) -> Self { Self { inquiries } }

    /// Validates and stores a submission. Invalid forms never reach the backend.
    pub async fn submit(&self, form: NewInquiry) -> Result<ContactInquiry> {
        let form = form.normalized();
        form.check().map_err(StorefrontError::Validation)?;
        let stored = self.inquiries.insert_inquiry(&form).await.map_err(|err| {
            tracing::error!(error = %err, "could not store contact inquiry");
            StorefrontError::write("sending the inquiry")(err)
        })?;
        let event = DomainEvent::Inquiry(InquiryEvent::Received { inquiry_id: stored.id.clone() });
        tracing::info!(?event, source_page = stored.source_page.as_deref().unwrap_or("-"), "contact inquiry received");
        Ok(stored)
    }
}
