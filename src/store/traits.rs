//! Unified `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::accounts::{Account, NewAccount, PatientProfile, PatientUpdate, Session, User};
use crate::error::DatabaseError;

/// Backend-agnostic database trait covering accounts, profiles and sessions.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Accounts ────────────────────────────────────────────────────

    /// Look up a user by (normalized) email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    /// Get a user by ID.
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    /// Get the patient profile linked to a user.
    async fn get_patient_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PatientProfile>, DatabaseError>;

    /// Create a user and its empty patient profile in one transaction.
    ///
    /// Returns `DatabaseError::Constraint` when the email is already taken.
    /// Either both rows are written or neither is.
    async fn create_account(&self, account: &NewAccount) -> Result<Account, DatabaseError>;

    /// Write the onboarding step: the user's name and email, and the
    /// profile's phone, details and completion time, in one transaction.
    ///
    /// Returns `DatabaseError::NotFound` for an unknown user,
    /// `DatabaseError::Constraint` when the email belongs to someone else and
    /// `DatabaseError::AlreadyCompleted` when the profile was already
    /// completed. A failed call writes nothing.
    async fn complete_patient_profile(
        &self,
        user_id: Uuid,
        update: &PatientUpdate,
    ) -> Result<PatientProfile, DatabaseError>;

    // ── Sessions ────────────────────────────────────────────────────

    async fn create_session(&self, session: &Session) -> Result<(), DatabaseError>;

    /// Get a session by token, expired or not.
    async fn get_session(&self, token: &str) -> Result<Option<Session>, DatabaseError>;

    /// Delete a session. Returns whether it existed.
    async fn delete_session(&self, token: &str) -> Result<bool, DatabaseError>;

    /// Delete every expired session. Returns the number removed.
    async fn prune_expired_sessions(&self) -> Result<usize, DatabaseError>;
}
