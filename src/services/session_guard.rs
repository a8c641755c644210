//! Admin session guard.
//!
//! Access is decided from the current auth session and an explicit
//! [`AdminAccessPolicy`]. [`SessionGuard::watch`] keeps re-deciding as auth
//! events arrive, so a sign-out or expiry revokes access for an admin view
//! that is already open.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::ports::{AuthEvent, AuthGateway, AuthSession};
use crate::{Result, StorefrontError};

/// Who may use the admin console once signed in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminAccessPolicy {
    /// Any account that can authenticate against the backend project.
    AnyAuthenticated,
    /// Only these emails (stored lowercase). An empty list admits nobody.
    AllowList(BTreeSet<String>),
}

impl AdminAccessPolicy {
    pub fn allow_list<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::AllowList(
            emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        )
    }

    pub fn permits(&self, email: Option<&str>) -> bool {
        match self {
            Self::AnyAuthenticated => true,
            Self::AllowList(emails) => email.is_some_and(|e| emails.contains(&e.trim().to_lowercase())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "access", rename_all = "snake_case")]
pub enum Access {
    Granted { email: Option<String> },
    Denied { reason: DenyReason },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NoSession,
    NotAllowed,
}

impl Access {
    pub fn is_granted(&self) -> bool { matches!(self, Self::Granted { .. }) }

    pub fn into_result(self) -> Result<Option<String>> {
        match self {
            Self::Granted { email } => Ok(email),
            Self::Denied { reason: DenyReason::NoSession } => Err(StorefrontError::Unauthorized),
            Self::Denied { reason: DenyReason::NotAllowed } => Err(StorefrontError::Forbidden),
        }
    }
}

#[derive(Clone)]
pub struct SessionGuard {
    auth: Arc<dyn AuthGateway>,
    policy: AdminAccessPolicy,
}

impl SessionGuard {
    pub fn new(auth: Arc<dyn AuthGateway>, policy: AdminAccessPolicy) -> Self {
        if policy == AdminAccessPolicy::AllowList(BTreeSet::new()) {
            tracing::warn!("admin allow-list is empty; nobody can reach the admin console");
        }
        Self { auth, policy }
    }

    pub fn policy(&self) -> &AdminAccessPolicy { &self.policy }

    pub fn evaluate(&self, session: Option<&AuthSession>) -> Access {
        match session {
            Some(session) if !session.is_expired(Utc::now()) => {
                if self.policy.permits(session.email.as_deref()) {
                    Access::Granted { email: session.email.clone() }
                } else {
                    Access::Denied { reason: DenyReason::NotAllowed }
                }
            }
            _ => Access::Denied { reason: DenyReason::NoSession },
        }
    }

    /// Resolves a bearer token and decides access for it.
    pub async fn check(&self, access_token: Option<&str>) -> Result<Access> {
        let Some(token) = access_token.filter(|t| !t.is_empty()) else {
            return Ok(Access::Denied { reason: DenyReason::NoSession });
        };
        let session = self.auth.session_for(token).await.map_err(StorefrontError::fetch("auth session"))?;
        let access = self.evaluate(session.as_ref());
        if !access.is_granted() {
            tracing::info!(?access, "admin access denied");
        }
        Ok(access)
    }

    /// Starts re-evaluating access for `access_token` on every auth event.
    pub fn watch(&self, access_token: impl Into<String>) -> AccessWatch {
        let token = access_token.into();
        let mut events = self.auth.subscribe();
        let (tx, rx) = watch::channel(Access::Denied { reason: DenyReason::NoSession });
        let guard = self.clone();

        let task = tokio::spawn(async move {
            let initial = guard.check(Some(&token)).await.unwrap_or_else(|err| {
                tracing::warn!(error = %err, "initial admin session check failed");
                Access::Denied { reason: DenyReason::NoSession }
            });
            tx.send_replace(initial);

            loop {
                let next = match events.recv().await {
                    Ok(AuthEvent::SignedIn(session)) if session.access_token == token => guard.evaluate(Some(&session)),
                    Ok(AuthEvent::SignedOut { access_token } | AuthEvent::SessionExpired { access_token })
                        if access_token == token =>
                    {
                        Access::Denied { reason: DenyReason::NoSession }
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "auth events lagged; re-checking session");
                        guard.check(Some(&token)).await.unwrap_or_else(|err| {
                            tracing::warn!(error = %err, "admin session re-check failed");
                            Access::Denied { reason: DenyReason::NoSession }
                        })
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if tx.send_replace(next.clone()) != next {
                    tracing::info!(access = ?next, "admin access changed");
                }
                if tx.is_closed() {
                    break;
                }
            }
        });

        AccessWatch { receiver: rx, task }
    }
}

/// Live access decision for one admin view; dropping it stops the watcher.
#[derive(Debug)]
pub struct AccessWatch {
    receiver: watch::Receiver<Access>,
    task: JoinHandle<()>,
}

impl AccessWatch {
    pub fn current(&self) -> Access { self.receiver.borrow().clone() }

    /// Waits for the next decision change.
    pub async fn changed(&mut self) -> Option<Access> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

impl Drop for AccessWatch {
    fn drop(&mut self) { self.task.abort(); }
}
