//! Submission pipeline — turns a validated form payload into persisted state.
//!
//! Every pipeline re-checks the payload at the remote boundary, looks for a
//! conflicting record, then performs one atomic write through the store and
//! reports a typed [`SubmissionOutcome`]. Store failures never leak to the
//! caller; unexpected ones are logged here.

pub mod intake;
pub mod registration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::DatabaseError;
use crate::forms::{FieldRegistry, FormSchema, FormValues};

pub use intake::PatientIntakePipeline;
pub use registration::RegistrationPipeline;

/// Why a submission failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidInput,
    Conflict,
    Unknown,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidInput => "invalid_input",
            Self::Conflict => "conflict",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A failed submission, safe to show to the user.
///
/// `field` names the input the message belongs to; `None` means the message
/// is form-level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionFailure {
    pub reason: FailureReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl SubmissionFailure {
    pub const UNKNOWN_MESSAGE: &'static str = "Something went wrong. Please try again.";

    pub fn invalid_input(field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            reason: FailureReason::InvalidInput,
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn conflict(field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            reason: FailureReason::Conflict,
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    /// Generic failure. The detail goes to the log, not to the user.
    pub fn unknown() -> Self {
        Self {
            reason: FailureReason::Unknown,
            field: None,
            message: Self::UNKNOWN_MESSAGE.to_string(),
        }
    }
}

/// Result of one submit. Produced once per attempt and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome<E> {
    Success { entity: E },
    Failure(SubmissionFailure),
}

impl<E> SubmissionOutcome<E> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Persists one form's payload.
#[async_trait]
pub trait Submitter: Send + Sync {
    type Entity: Send;

    async fn submit(&self, payload: &FormValues) -> SubmissionOutcome<Self::Entity>;
}

/// Remote-boundary check shared by every pipeline: reject undeclared keys,
/// normalize declared values by kind and re-validate the whole form.
pub(crate) fn check_payload(
    schema: &FormSchema,
    payload: &FormValues,
) -> Result<FormValues, SubmissionFailure> {
    let unknown = schema.unknown_fields(payload);
    if let Some(first) = unknown.first() {
        warn!(form = schema.id(), fields = ?unknown, "Payload carries undeclared fields");
        return Err(SubmissionFailure::invalid_input(
            Some(*first),
            format!("Unknown field: {first}"),
        ));
    }

    let registry = FieldRegistry::shared();
    let mut values = FormValues::new();
    for (name, value) in payload.iter() {
        if let Some(spec) = schema.field(name) {
            values.insert(name, registry.normalize(spec.kind, &value.as_input()));
        }
    }

    let report = schema.validate_all(&values);
    if let Some(first) = report.errors().into_iter().next() {
        warn!(form = schema.id(), field = %first.field, "Payload failed validation");
        return Err(SubmissionFailure::invalid_input(
            Some(&first.field),
            first.message,
        ));
    }
    Ok(values)
}

/// Map a store error to a failure. Uniqueness violations become conflicts on
/// `conflict_field`; anything unexpected is logged and reported generically.
pub(crate) fn store_failure(
    form: &str,
    err: DatabaseError,
    conflict_field: &str,
    conflict_message: &str,
) -> SubmissionFailure {
    match err {
        DatabaseError::Constraint(detail) => {
            warn!(form, %detail, "Store rejected a duplicate identity");
            SubmissionFailure::conflict(Some(conflict_field), conflict_message)
        }
        other => {
            error!(form, error = %other, "Submission failed in the store");
            SubmissionFailure::unknown()
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use uuid::Uuid;

    use crate::accounts::{Account, NewAccount, PatientProfile, PatientUpdate, Session, User};
    use crate::error::DatabaseError;
    use crate::forms::{FieldValue, FormValues, IntakeForms, SelectOption};
    use crate::forms::intake::fields;
    use crate::store::Database;

    /// A store whose writes land after `delay`, so concurrent callers all
    /// finish their reads before the first write commits.
    pub struct SlowWrites {
        pub inner: Arc<dyn Database>,
        pub delay: Duration,
    }

    #[async_trait]
    impl Database for SlowWrites {
        async fn init_schema(&self) -> Result<(), DatabaseError> {
            self.inner.init_schema().await
        }

        async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
            self.inner.find_user_by_email(email).await
        }

        async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
            self.inner.get_user(id).await
        }

        async fn get_patient_profile(
            &self,
            user_id: Uuid,
        ) -> Result<Option<PatientProfile>, DatabaseError> {
            self.inner.get_patient_profile(user_id).await
        }

        async fn create_account(&self, account: &NewAccount) -> Result<Account, DatabaseError> {
            tokio::time::sleep(self.delay).await;
            self.inner.create_account(account).await
        }

        async fn complete_patient_profile(
            &self,
            user_id: Uuid,
            update: &PatientUpdate,
        ) -> Result<PatientProfile, DatabaseError> {
            tokio::time::sleep(self.delay).await;
            self.inner.complete_patient_profile(user_id, update).await
        }

        async fn create_session(&self, session: &Session) -> Result<(), DatabaseError> {
            self.inner.create_session(session).await
        }

        async fn get_session(&self, token: &str) -> Result<Option<Session>, DatabaseError> {
            self.inner.get_session(token).await
        }

        async fn delete_session(&self, token: &str) -> Result<bool, DatabaseError> {
            self.inner.delete_session(token).await
        }

        async fn prune_expired_sessions(&self) -> Result<usize, DatabaseError> {
            self.inner.prune_expired_sessions().await
        }
    }

    pub fn forms() -> IntakeForms {
        IntakeForms::new(vec![SelectOption::new("Dr. Amelia Hart", "dr-amelia-hart")]).unwrap()
    }

    pub fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    pub fn registration(name: &str, email: &str, phone: &str) -> FormValues {
        FormValues::new()
            .with(fields::NAME, text(name))
            .with(fields::EMAIL, text(email))
            .with(fields::PHONE, text(phone))
    }

    pub fn patient(email: &str) -> FormValues {
        registration("Jordan Lee", email, "+6281234567890")
            .with(fields::DATE_OF_BIRTH, text("1990-05-17"))
            .with(fields::GENDER, FieldValue::Choice("MALE".into()))
            .with(fields::ADDRESS, text("Jalan Karapitan No.9, Bandung"))
            .with(fields::OCCUPATION, text("Software Engineer"))
            .with(fields::EMERGENCY_CONTACT_NAME, text("Sam Lee"))
            .with(fields::EMERGENCY_CONTACT_PHONE, text("081298765432"))
            .with(fields::PRIMARY_PHYSICIAN, FieldValue::Choice("dr-amelia-hart".into()))
            .with(fields::INSURANCE_PROVIDER, text("BPJS Kesehatan"))
            .with(fields::INSURANCE_POLICY_NUMBER, text("ABC123456789"))
            .with(fields::IDENTIFICATION_TYPE, FieldValue::Choice("passport".into()))
            .with(fields::IDENTIFICATION_NUMBER, text("X1234567"))
    }
}
