//! Google sign-in over OAuth 2.0 (authorization code flow).

use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{ExternalProfile, IdentityProvider};
use crate::error::AuthError;

const PROVIDER: &str = "google";

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Google identity provider.
pub struct GoogleIdentity {
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    authorize_url: String,
    token_url: String,
    userinfo_url: String,
    client: reqwest::Client,
}

impl GoogleIdentity {
    pub fn new(client_id: String, client_secret: SecretString, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            authorize_url: AUTHORIZE_URL.into(),
            token_url: TOKEN_URL.into(),
            userinfo_url: USERINFO_URL.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the token and userinfo calls at another host.
    pub fn with_endpoints(mut self, token_url: String, userinfo_url: String) -> Self {
        self.token_url = token_url;
        self.userinfo_url = userinfo_url;
        self
    }

    fn request_failed(reason: impl Into<String>) -> AuthError {
        AuthError::RequestFailed {
            provider: PROVIDER.into(),
            reason: reason.into(),
        }
    }

    async fn access_token(&self, code: &str) -> Result<String, AuthError> {
        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Self::request_failed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::request_failed(format!("token exchange returned {status}: {body}")));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| Self::request_failed(format!("token response: {e}")))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentity {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn authorize_url(&self, state: &str) -> Result<String, AuthError> {
        let url = Url::parse_with_params(
            &self.authorize_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
            ],
        )
        .map_err(|e| Self::request_failed(format!("authorize url: {e}")))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalProfile, AuthError> {
        let access_token = self.access_token(code).await?;

        let resp = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(|e| Self::request_failed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::request_failed(format!(
                "userinfo returned {}",
                resp.status()
            )));
        }

        let info: UserInfo = resp
            .json()
            .await
            .map_err(|e| Self::request_failed(format!("userinfo response: {e}")))?;

        let invalid = |reason: &str| AuthError::InvalidProfile {
            provider: PROVIDER.into(),
            reason: reason.into(),
        };
        let email = info.email.ok_or_else(|| invalid("no email in profile"))?;
        if info.email_verified == Some(false) {
            return Err(invalid("email is not verified"));
        }

        Ok(ExternalProfile {
            provider: PROVIDER.into(),
            name: info.name.unwrap_or_else(|| email.clone()),
            subject: info.sub,
            email,
            image: info.picture,
        })
    }
}
