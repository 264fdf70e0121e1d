//! Authentication — sessions and external sign-in.
//!
//! The service never sees credentials. An [`IdentityProvider`] turns an
//! OAuth authorization code into an [`ExternalProfile`], and a
//! [`SessionProvider`] answers whether a request carries a live session.
//! Both are built in `main` and handed to the router.

pub mod google;
pub mod session;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::accounts::Session;
use crate::error::AuthError;

pub use google::GoogleIdentity;
pub use session::{DatabaseSessions, spawn_prune_task};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "__Secure-auth.session-token";

/// Identity returned by an external provider after sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProfile {
    pub provider: String,
    pub subject: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// An OAuth identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short provider name used in routes and logs, e.g. `google`.
    fn name(&self) -> &str;

    /// Where to send the browser to start sign-in.
    fn authorize_url(&self, state: &str) -> Result<String, AuthError>;

    /// Exchange an authorization code for the signed-in user's profile.
    async fn exchange_code(&self, code: &str) -> Result<ExternalProfile, AuthError>;
}

/// Opaque session checks plus the sign-in redirect.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The live session for `token`, if any.
    async fn session(&self, token: &str) -> Result<Option<Session>, AuthError>;

    async fn has_session(&self, token: &str) -> Result<bool, AuthError> {
        Ok(self.session(token).await?.is_some())
    }

    /// Start a session for a signed-in user.
    async fn start_session(&self, user_id: uuid::Uuid) -> Result<Session, AuthError>;

    /// End a session. Unknown tokens are not an error.
    async fn end_session(&self, token: &str) -> Result<(), AuthError>;

    /// Address of the external sign-in page.
    fn sign_in_redirect(&self, state: &str) -> Result<String, AuthError>;

    /// Lifetime given to new sessions.
    fn max_age(&self) -> chrono::Duration;
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, max_age: chrono::Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age={}",
        max_age.num_seconds().max(0)
    )
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=0")
}

/// Value of the cookie `name` in a `Cookie` header. Empty values count as
/// absent.
pub fn cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Pull the session token out of a `Cookie` header.
pub fn token_from_cookies(header: &str) -> Option<&str> {
    cookie(header, SESSION_COOKIE)
}
