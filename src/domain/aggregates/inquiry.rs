//! Contact inquiries submitted from the storefront forms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::decode::string_or_number;
use crate::domain::events::{DomainEvent, InquiryEvent};
use crate::{FieldError, ValidationFailure};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InquiryStatus {
    #[default]
    Pending,
    Done,
}

impl InquiryStatus {
    pub fn toggled(self) -> Self {
        match self { Self::Pending => Self::Done, Self::Done => Self::Pending }
    }
}

/// Row of the `contact_inquiries` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContactInquiry {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub email: String,
    pub message: String,
    #[serde(default)]
    pub source_page: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub status: InquiryStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ContactInquiry {
    pub fn set_status(&mut self, status: InquiryStatus) -> Option<DomainEvent> {
        if self.status == status {
            return None;
        }
        self.status = status;
        Some(DomainEvent::Inquiry(InquiryEvent::StatusChanged { inquiry_id: self.id.clone(), status }))
    }
}

/// Form submission, validated before it is written.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewInquiry {
    #[validate(length(min = 2, max = 100, message = "Моля, въведете име."))]
    pub name: String,
    #[validate(length(min = 6, max = 20, message = "Невалиден телефонен номер."))]
    #[serde(default)]
    pub phone: Option<String>,
    #[validate(email(message = "Невалиден имейл адрес."))]
    pub email: String,
    #[validate(length(min = 10, max = 2000, message = "Съобщението трябва да е поне 10 символа."))]
    pub message: String,
    #[serde(default)]
    pub source_page: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl NewInquiry {
    /// Trims every field and drops a blank phone before validation.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_string();
        self.message = self.message.trim().to_string();
        self.phone = self.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
        self
    }

    pub fn check(&self) -> Result<(), ValidationFailure> {
        self.validate().map_err(|errors| {
            let mut fields: Vec<FieldError> = errors
                .field_errors()
                .into_iter()
                .flat_map(|(field, errs)| {
                    errs.iter().map(move |e| FieldError {
                        field: field.to_string(),
                        message: e.message.as_ref().map_or_else(|| e.code.to_string(), ToString::to_string),
                    })
                })
                .collect();
            fields.sort_by(|a, b| a.field.cmp(&b.field));
            ValidationFailure { fields }
        })
    }
}
