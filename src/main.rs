//! Skazka Storefront - HTTP service entry point

use std::sync::Arc;

use anyhow::{Context, Result};
use skazka_storefront::adapters::{MemoryBackend, SupabaseClient};
use skazka_storefront::api::{build_app, AppState};
use skazka_storefront::config::BackendKind;
use skazka_storefront::{Config, Gateway};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let gateway = match (config.backend, &config.supabase) {
        (BackendKind::Supabase, Some(settings)) => {
            tracing::info!(url = %settings.url, bucket = %settings.storage_bucket, "using hosted backend");
            Gateway::from_backend(Arc::new(SupabaseClient::new(settings)?))
        }
        (BackendKind::Supabase, None) => anyhow::bail!("hosted backend selected without credentials"),
        (BackendKind::Memory, _) => {
            tracing::warn!("using the in-memory backend; data is lost on restart");
            Gateway::from_backend(Arc::new(MemoryBackend::new().with_bucket(&config.storage_bucket)))
        }
    };

    let state = AppState::new(gateway, config.admin_access.clone(), config.search_limit);
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "storefront listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
