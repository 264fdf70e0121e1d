//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::forms::SelectOption;

/// Physicians offered on the patient form when `INTAKE_PHYSICIANS` is unset.
const DEFAULT_PHYSICIANS: &str = "dr-amelia-hart=Dr. Amelia Hart,\
dr-budi-santoso=Dr. Budi Santoso,\
dr-citra-lestari=Dr. Citra Lestari,\
dr-daniel-tan=Dr. Daniel Tan";

/// Google OAuth client credentials.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// HTTP listen port.
    pub port: u16,
    /// Public base URL; OAuth redirects and CORS are derived from it.
    pub base_url: String,
    /// Lifetime of sign-in sessions.
    pub session_max_age: chrono::Duration,
    /// Options for the primary care physician select.
    pub physicians: Vec<SelectOption>,
    /// Google sign-in; disabled when `None`.
    pub google: Option<GoogleConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/patient-intake.db"),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            session_max_age: chrono::Duration::hours(1),
            physicians: parse_physicians("INTAKE_PHYSICIANS", DEFAULT_PHYSICIANS)
                .unwrap_or_default(),
            google: None,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_path = lookup("INTAKE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let port = match lookup("INTAKE_PORT") {
            Some(raw) => parse_number::<u16>("INTAKE_PORT", &raw)?,
            None => defaults.port,
        };

        let base_url = lookup("INTAKE_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);
        reqwest::Url::parse(&base_url).map_err(|e| ConfigError::InvalidValue {
            key: "INTAKE_BASE_URL".into(),
            message: e.to_string(),
        })?;

        let session_max_age = match lookup("INTAKE_SESSION_MAX_AGE_SECS") {
            Some(raw) => {
                let secs = parse_number::<i64>("INTAKE_SESSION_MAX_AGE_SECS", &raw)?;
                if secs <= 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "INTAKE_SESSION_MAX_AGE_SECS".into(),
                        message: "must be positive".into(),
                    });
                }
                chrono::Duration::seconds(secs)
            }
            None => defaults.session_max_age,
        };

        let physicians = match lookup("INTAKE_PHYSICIANS") {
            Some(raw) => parse_physicians("INTAKE_PHYSICIANS", &raw)?,
            None => defaults.physicians,
        };

        let google = match (lookup("GOOGLE_CLIENT_ID"), lookup("GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(secret)) if !client_id.is_empty() => Some(GoogleConfig {
                client_id,
                client_secret: SecretString::from(secret),
            }),
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar("GOOGLE_CLIENT_SECRET".into()));
            }
            _ => None,
        };

        Ok(Self {
            db_path,
            port,
            base_url,
            session_max_age,
            physicians,
            google,
        })
    }

    /// Address Google sends the browser back to.
    pub fn google_redirect_uri(&self) -> String {
        format!("{}/auth/callback/google", self.base_url)
    }

    /// Browser origin allowed to call the API.
    pub fn origin(&self) -> Option<String> {
        reqwest::Url::parse(&self.base_url)
            .ok()
            .map(|url| url.origin().ascii_serialization())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.into(),
        message: format!("'{raw}': {e}"),
    })
}

/// Parse a `value=Label,value=Label` list.
fn parse_physicians(key: &str, raw: &str) -> Result<Vec<SelectOption>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((value, label)) if !value.trim().is_empty() && !label.trim().is_empty() => {
                Ok(SelectOption::new(label.trim(), value.trim()))
            }
            _ => Err(ConfigError::InvalidValue {
                key: key.into(),
                message: format!("expected value=Label, got '{entry}'"),
            }),
        })
        .collect()
}
