//! Account creation — the first onboarding step.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::{SubmissionFailure, SubmissionOutcome, Submitter, check_payload, store_failure};
use crate::accounts::{Account, NewAccount};
use crate::forms::FormValues;
use crate::forms::FormSchema;
use crate::forms::intake::fields;
use crate::store::Database;

pub const EMAIL_TAKEN: &str = "An account with this email already exists. Please sign in instead.";

/// Creates a user and its empty patient profile from the register form.
pub struct RegistrationPipeline {
    db: Arc<dyn Database>,
    schema: Arc<FormSchema>,
}

impl RegistrationPipeline {
    pub fn new(db: Arc<dyn Database>, schema: Arc<FormSchema>) -> Self {
        Self { db, schema }
    }
}

#[async_trait]
impl Submitter for RegistrationPipeline {
    type Entity = Account;

    async fn submit(&self, payload: &FormValues) -> SubmissionOutcome<Account> {
        let form = self.schema.id();
        let values = match check_payload(&self.schema, payload) {
            Ok(values) => values,
            Err(failure) => return SubmissionOutcome::Failure(failure),
        };

        let Some(account) = NewAccount::from_values(&values) else {
            error!(form, "Validated payload is missing account fields");
            return SubmissionOutcome::Failure(SubmissionFailure::unknown());
        };

        match self.db.find_user_by_email(&account.email).await {
            Ok(Some(existing)) => {
                warn!(form, user_id = %existing.id, "Registration for an existing email");
                return SubmissionOutcome::Failure(SubmissionFailure::conflict(
                    Some(fields::EMAIL),
                    EMAIL_TAKEN,
                ));
            }
            Ok(None) => {}
            Err(e) => {
                return SubmissionOutcome::Failure(store_failure(form, e, fields::EMAIL, EMAIL_TAKEN));
            }
        }

        // The unique index still guards a registration racing this one.
        match self.db.create_account(&account).await {
            Ok(account) => {
                info!(form, user_id = %account.user.id, "Account registered");
                SubmissionOutcome::Success { entity: account }
            }
            Err(e) => SubmissionOutcome::Failure(store_failure(form, e, fields::EMAIL, EMAIL_TAKEN)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::{FormController, SubmitAttempt};
    use crate::store::LibSqlBackend;
    use crate::submission::FailureReason;
    use crate::submission::test_support::*;

    async fn pipeline() -> (RegistrationPipeline, Arc<dyn Database>) {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let forms = forms();
        (RegistrationPipeline::new(Arc::clone(&db), forms.register), db)
    }

    #[tokio::test]
    async fn registers_account_with_profile() {
        let (pipeline, db) = pipeline().await;
        let outcome = pipeline
            .submit(&registration("Jordan Lee", "jordan@example.com", "+6281234567890"))
            .await;

        let SubmissionOutcome::Success { entity } = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(entity.user.name, "Jordan Lee");
        assert_eq!(entity.profile.user_id, entity.user.id);
        assert_eq!(entity.profile.phone.as_deref(), Some("+6281234567890"));

        let stored = db.find_user_by_email("jordan@example.com").await.unwrap().unwrap();
        assert_eq!(stored.id, entity.user.id);
    }

    #[tokio::test]
    async fn same_identity_twice_is_a_conflict() {
        let (pipeline, db) = pipeline().await;
        let payload = registration("Jordan Lee", "jordan@example.com", "+6281234567890");

        assert!(pipeline.submit(&payload).await.is_success());
        let second = pipeline.submit(&payload).await;
        let SubmissionOutcome::Failure(failure) = second else {
            panic!("expected conflict, got {second:?}");
        };
        assert_eq!(failure.reason, FailureReason::Conflict);
        assert_eq!(failure.field.as_deref(), Some(fields::EMAIL));

        // differently-cased email is the same identity
        let shouted = registration("Jordan Lee", "JORDAN@example.com", "+6281234567890");
        assert!(!pipeline.submit(&shouted).await.is_success());

        let user = db.find_user_by_email("jordan@example.com").await.unwrap();
        assert!(user.is_some());
    }

    #[tokio::test]
    async fn invalid_payload_never_reaches_the_store() {
        let (pipeline, db) = pipeline().await;
        let outcome = pipeline
            .submit(&registration("Jo", "jo@example.com", "081234567890"))
            .await;
        assert!(matches!(
            outcome,
            SubmissionOutcome::Failure(SubmissionFailure { reason: FailureReason::InvalidInput, .. })
        ));
        assert!(db.find_user_by_email("jo@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn controller_drives_the_pipeline() {
        let (pipeline, _db) = pipeline().await;
        let forms = forms();

        let mut short = FormController::new(Arc::clone(&forms.register));
        short.on_field_change(fields::NAME, "Jo");
        short.on_field_change(fields::EMAIL, "jo@example.com");
        short.on_field_change(fields::PHONE, "081234567890");
        let SubmitAttempt::Rejected(errors) = short.on_submit(&pipeline).await else {
            panic!("short name must be rejected before submit");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, fields::NAME);

        let mut controller = FormController::new(Arc::clone(&forms.register));
        controller.on_field_change(fields::NAME, "Jordan Lee");
        controller.on_field_change(fields::EMAIL, "jordan@example.com");
        controller.on_field_change(fields::PHONE, "+6281234567890");
        let attempt = controller.on_submit(&pipeline).await;
        assert!(matches!(attempt, SubmitAttempt::Settled(SubmissionOutcome::Success { .. })));

        let mut again = FormController::new(forms.register);
        again.on_field_change(fields::NAME, "Jordan Lee");
        again.on_field_change(fields::EMAIL, "jordan@example.com");
        again.on_field_change(fields::PHONE, "+6281234567890");
        again.on_submit(&pipeline).await;
        assert_eq!(again.error(fields::EMAIL).unwrap().message, EMAIL_TAKEN);
    }
}
