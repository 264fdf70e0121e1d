//! Database-backed sessions.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{ExternalProfile, IdentityProvider, SessionProvider};
use crate::accounts::{NewAccount, Session, User, UserRole};
use crate::error::{AuthError, DatabaseError};
use crate::store::Database;

/// Sessions stored in the `sessions` table.
pub struct DatabaseSessions {
    db: Arc<dyn Database>,
    max_age: chrono::Duration,
    identity: Option<Arc<dyn IdentityProvider>>,
}

impl DatabaseSessions {
    pub fn new(db: Arc<dyn Database>, max_age: chrono::Duration) -> Self {
        Self {
            db,
            max_age,
            identity: None,
        }
    }

    /// Attach the provider used for the sign-in redirect.
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn identity(&self) -> Option<&Arc<dyn IdentityProvider>> {
        self.identity.as_ref()
    }

    /// Find the account for an external profile, creating a patient account
    /// with an empty profile on first sign-in.
    pub async fn find_or_create_user(&self, profile: &ExternalProfile) -> Result<User, AuthError> {
        let email = profile.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AuthError::InvalidProfile {
                provider: profile.provider.clone(),
                reason: "profile has no email".into(),
            });
        }

        if let Some(user) = self.db.find_user_by_email(&email).await? {
            debug!(user_id = %user.id, provider = %profile.provider, "External sign-in for existing user");
            return Ok(user);
        }

        let created = self
            .db
            .create_account(&NewAccount {
                name: profile.name.clone(),
                email: email.clone(),
                phone: None,
                image: profile.image.clone(),
                role: UserRole::Patient,
            })
            .await;

        match created {
            Ok(account) => {
                info!(user_id = %account.user.id, provider = %profile.provider, "Account created from external sign-in");
                Ok(account.user)
            }
            // Another sign-in for the same email created the account first.
            Err(DatabaseError::Constraint(detail)) => {
                debug!(provider = %profile.provider, %detail, "Lost account creation race");
                self.db
                    .find_user_by_email(&email)
                    .await?
                    .ok_or(AuthError::Database(DatabaseError::Constraint(detail)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SessionProvider for DatabaseSessions {
    async fn session(&self, token: &str) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.db.get_session(token).await? else {
            return Ok(None);
        };
        if session.is_expired(Utc::now()) {
            debug!(user_id = %session.user_id, "Dropping expired session");
            self.db.delete_session(token).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn start_session(&self, user_id: Uuid) -> Result<Session, AuthError> {
        let session = Session::new(user_id, self.max_age);
        self.db.create_session(&session).await?;
        Ok(session)
    }

    async fn end_session(&self, token: &str) -> Result<(), AuthError> {
        self.db.delete_session(token).await?;
        Ok(())
    }

    fn sign_in_redirect(&self, state: &str) -> Result<String, AuthError> {
        match &self.identity {
            Some(identity) => identity.authorize_url(state),
            None => Err(AuthError::NotConfigured {
                provider: "any".into(),
            }),
        }
    }

    fn max_age(&self) -> chrono::Duration {
        self.max_age
    }
}

/// Spawn a background task that deletes expired sessions every `every`.
pub fn spawn_prune_task(
    db: Arc<dyn Database>,
    every: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = db.prune_expired_sessions().await {
                error!(error = %e, "Session prune failed");
            }
        }
    })
}
