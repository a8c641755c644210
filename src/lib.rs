//! Skazka Storefront
//!
//! Storefront and admin console backend for a family memory-book shop
//! (books, audio stories, handmade dolls, puppet-show recordings).
//!
//! ## Features
//! - Catalog listing and detail pages over a hosted backend
//! - Session-scoped shopping cart with dual BGN/EUR totals
//! - Product search with "see all" routing
//! - Blog authoring with deferred image upload and unique slugs
//! - Contact inquiries and a guarded admin console

use serde::Serialize;
use thiserror::Error;

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;
pub mod views;

pub use config::{Config, ConfigError};
pub use ports::{Gateway, GatewayError};

// =============================================================================
// Error Types
// =============================================================================

/// A single inline form message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    pub fields: Vec<FieldError>,
}

impl ValidationFailure {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { fields: vec![FieldError { field: field.into(), message: message.into() }] }
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.fields.iter().map(|e| format!("{}: {}", e.field, e.message)).collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Could not load {what}: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: GatewayError,
    },

    #[error("Write failed while {action}: {source}")]
    Write {
        action: &'static str,
        #[source]
        source: GatewayError,
    },

    #[error("Validation failed: {0}")]
    Validation(ValidationFailure),

    #[error("Not signed in")]
    Unauthorized,

    #[error("Signed-in account is not allowed here")]
    Forbidden,

    #[error("A save is already in progress for {0}")]
    SaveInProgress(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl StorefrontError {
    pub fn fetch(what: &'static str) -> impl FnOnce(GatewayError) -> Self {
        move |source| Self::Fetch { what, source }
    }

    pub fn write(action: &'static str) -> impl FnOnce(GatewayError) -> Self {
        move |source| Self::Write { action, source }
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
