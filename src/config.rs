//! Service configuration loaded from the environment.
//!
//! The `.env` file is read by [`Config::from_env`]; parsing itself goes
//! through a lookup function so tests can feed a plain map instead of
//! touching the process environment.

use std::net::SocketAddr;

use crate::services::session_guard::AdminAccessPolicy;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for the environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Supabase,
    Memory,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupabaseSettings {
    pub url: String,
    pub anon_key: String,
    pub storage_bucket: String,
    pub request_timeout_secs: u64,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub backend: BackendKind,
    pub supabase: Option<SupabaseSettings>,
    pub storage_bucket: String,
    pub admin_access: AdminAccessPolicy,
    pub search_limit: u32,
    pub log_level: String,
}

impl Config {
    /// Loads `.env` (if present) and then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or_default = |var: &str, default: &str| -> String {
            lookup(var).filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
        };
        let require = |var: &str| -> Result<String, ConfigError> {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
        };
        let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar { var: var.to_string(), reason };

        let bind_addr = or_default("STOREFRONT_BIND_ADDR", "0.0.0.0:8083")
            .parse::<SocketAddr>()
            .map_err(|e| invalid("STOREFRONT_BIND_ADDR", e.to_string()))?;

        let backend = match or_default("STOREFRONT_BACKEND", "supabase").to_ascii_lowercase().as_str() {
            "supabase" => BackendKind::Supabase,
            "memory" => BackendKind::Memory,
            other => return Err(invalid("STOREFRONT_BACKEND", format!("'{other}' is not supabase or memory"))),
        };

        let storage_bucket = or_default("STOREFRONT_STORAGE_BUCKET", "blog-images");

        let request_timeout_secs = or_default("STOREFRONT_REQUEST_TIMEOUT_SECS", "15")
            .parse::<u64>()
            .map_err(|e| invalid("STOREFRONT_REQUEST_TIMEOUT_SECS", e.to_string()))?;

        let supabase = match backend {
            BackendKind::Supabase => Some(SupabaseSettings {
                url: require("SUPABASE_URL")?.trim_end_matches('/').to_string(),
                anon_key: require("SUPABASE_ANON_KEY")?,
                storage_bucket: storage_bucket.clone(),
                request_timeout_secs,
            }),
            BackendKind::Memory => None,
        };

        let admin_emails = or_default("STOREFRONT_ADMIN_EMAILS", "");
        let admin_access = match or_default("STOREFRONT_ADMIN_ACCESS", "allowlist").to_ascii_lowercase().as_str() {
            "allowlist" | "allow-list" => AdminAccessPolicy::allow_list(admin_emails.split(',')),
            "any-authenticated" => AdminAccessPolicy::AnyAuthenticated,
            other => {
                return Err(invalid(
                    "STOREFRONT_ADMIN_ACCESS",
                    format!("'{other}' is not allowlist or any-authenticated"),
                ))
            }
        };

        let search_limit = or_default("STOREFRONT_SEARCH_LIMIT", "8")
            .parse::<u32>()
            .map_err(|e| invalid("STOREFRONT_SEARCH_LIMIT", e.to_string()))?
            .clamp(1, 50);

        let log_level = or_default("RUST_LOG", "info");

        Ok(Self { bind_addr, backend, supabase, storage_bucket, admin_access, search_limit, log_level })
    }
}
