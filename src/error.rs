//! Error types for Patient Intake.

use uuid::Uuid;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// A malformed form schema. Raised while schemas are built at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Form {form} declares field {field} more than once")]
    DuplicateField { form: String, field: String },

    #[error("Field {field} in form {form} is a {kind} field without options")]
    MissingOptions {
        form: String,
        field: String,
        kind: String,
    },

    #[error("Form {form} has no fields")]
    Empty { form: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A uniqueness constraint was violated (e.g. duplicate email).
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// The row was already moved past the state the write expects.
    #[error("{entity} {id} is already completed")]
    AlreadyCompleted { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DatabaseError {
    /// Classify a libSQL error raised by a write, separating uniqueness
    /// violations from other query failures.
    pub fn from_write(context: &str, err: libsql::Error) -> Self {
        let text = err.to_string();
        if text.contains("UNIQUE constraint failed") {
            Self::Constraint(format!("{context}: {text}"))
        } else {
            Self::Query(format!("{context}: {text}"))
        }
    }
}

/// Sign-in and session errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Identity provider {provider} is not configured")]
    NotConfigured { provider: String },

    #[error("Identity provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Identity provider {provider} returned an unusable profile: {reason}")]
    InvalidProfile { provider: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Onboarding orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("No account with id {id}")]
    UnknownUser { id: Uuid },

    #[error("Cannot move onboarding from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
