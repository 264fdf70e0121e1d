//! Patient onboarding — the second step, bound to an existing account.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{SubmissionFailure, SubmissionOutcome, Submitter, check_payload, store_failure};
use crate::accounts::{PatientProfile, PatientUpdate};
use crate::error::DatabaseError;
use crate::forms::{FormSchema, FormValues};
use crate::forms::intake::fields;
use crate::store::Database;

pub const EMAIL_IN_USE: &str = "This email is already used by another account.";
pub const ALREADY_ONBOARDED: &str = "Your patient details have already been submitted.";
pub const UNKNOWN_ACCOUNT: &str = "We could not find your account. Please register first.";

/// Writes the patient form onto the account created in the first step.
pub struct PatientIntakePipeline {
    db: Arc<dyn Database>,
    schema: Arc<FormSchema>,
    user_id: Uuid,
}

impl PatientIntakePipeline {
    pub fn new(db: Arc<dyn Database>, schema: Arc<FormSchema>, user_id: Uuid) -> Self {
        Self {
            db,
            schema,
            user_id,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Conflicts that can be seen before writing: an already completed
    /// profile, or an email owned by someone else.
    async fn precheck(&self, email: &str) -> Result<(), SubmissionFailure> {
        let form = self.schema.id();
        let lookup = |e: DatabaseError| store_failure(form, e, fields::EMAIL, EMAIL_IN_USE);

        if self.db.get_user(self.user_id).await.map_err(lookup)?.is_none() {
            warn!(form, user_id = %self.user_id, "Onboarding submitted for an unknown account");
            return Err(SubmissionFailure::invalid_input(None, UNKNOWN_ACCOUNT));
        }

        let profile = self.db.get_patient_profile(self.user_id).await.map_err(lookup)?;
        if profile.is_some_and(|p| p.is_complete()) {
            warn!(form, user_id = %self.user_id, "Onboarding resubmitted after completion");
            return Err(SubmissionFailure::conflict(None, ALREADY_ONBOARDED));
        }

        if let Some(owner) = self.db.find_user_by_email(email).await.map_err(lookup)? {
            if owner.id != self.user_id {
                warn!(form, user_id = %self.user_id, "Onboarding email belongs to another account");
                return Err(SubmissionFailure::conflict(Some(fields::EMAIL), EMAIL_IN_USE));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Submitter for PatientIntakePipeline {
    type Entity = PatientProfile;

    async fn submit(&self, payload: &FormValues) -> SubmissionOutcome<PatientProfile> {
        let form = self.schema.id();
        let values = match check_payload(&self.schema, payload) {
            Ok(values) => values,
            Err(failure) => return SubmissionOutcome::Failure(failure),
        };

        let Some(update) = PatientUpdate::from_values(&values) else {
            error!(form, "Validated payload is missing patient fields");
            return SubmissionOutcome::Failure(SubmissionFailure::unknown());
        };

        if let Err(failure) = self.precheck(&update.email).await {
            return SubmissionOutcome::Failure(failure);
        }

        match self.db.complete_patient_profile(self.user_id, &update).await {
            Ok(profile) => {
                info!(form, user_id = %self.user_id, "Patient onboarding completed");
                SubmissionOutcome::Success { entity: profile }
            }
            Err(DatabaseError::AlreadyCompleted { .. }) => {
                warn!(form, user_id = %self.user_id, "Onboarding completed by a concurrent submission");
                SubmissionOutcome::Failure(SubmissionFailure::conflict(None, ALREADY_ONBOARDED))
            }
            Err(DatabaseError::NotFound { .. }) => {
                warn!(form, user_id = %self.user_id, "Account vanished before onboarding was written");
                SubmissionOutcome::Failure(SubmissionFailure::invalid_input(None, UNKNOWN_ACCOUNT))
            }
            Err(e) => SubmissionOutcome::Failure(store_failure(form, e, fields::EMAIL, EMAIL_IN_USE)),
        }
    }
}
