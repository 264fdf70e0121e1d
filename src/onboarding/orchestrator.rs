//! Orchestrator — sequences the wizard steps and carries the account id
//! from one step to the next.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::state::OnboardingStep;
use crate::error::OnboardingError;
use crate::forms::intake::{DEFAULT_GENDER, fields};
use crate::forms::{FieldValue, FormController, FormValues, IntakeForms};
use crate::submission::{PatientIntakePipeline, RegistrationPipeline};
use crate::store::Database;

/// A step change and where to navigate for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub step: OnboardingStep,
    pub address: String,
}

/// Hands out form controllers and pipelines for each step.
pub struct Orchestrator {
    db: Arc<dyn Database>,
    forms: IntakeForms,
}

impl Orchestrator {
    pub fn new(db: Arc<dyn Database>, forms: IntakeForms) -> Self {
        Self { db, forms }
    }

    pub fn forms(&self) -> &IntakeForms {
        &self.forms
    }

    /// A fresh controller for the account step.
    pub fn registration_form(&self) -> FormController {
        FormController::new(Arc::clone(&self.forms.register))
    }

    pub fn registration_pipeline(&self) -> RegistrationPipeline {
        RegistrationPipeline::new(Arc::clone(&self.db), Arc::clone(&self.forms.register))
    }

    pub fn patient_pipeline(&self, user_id: Uuid) -> PatientIntakePipeline {
        PatientIntakePipeline::new(
            Arc::clone(&self.db),
            Arc::clone(&self.forms.patient),
            user_id,
        )
    }

    /// Which step an existing account is on.
    pub async fn step_for(&self, user_id: Uuid) -> Result<OnboardingStep, OnboardingError> {
        if self.db.get_user(user_id).await?.is_none() {
            return Err(OnboardingError::UnknownUser { id: user_id });
        }
        let complete = self
            .db
            .get_patient_profile(user_id)
            .await?
            .is_some_and(|profile| profile.is_complete());

        Ok(if complete {
            OnboardingStep::Complete
        } else {
            OnboardingStep::PatientDetails
        })
    }

    /// Patient form for `user_id`, seeded with what the account step
    /// already knows. Gender starts at its default.
    pub async fn patient_form(&self, user_id: Uuid) -> Result<FormController, OnboardingError> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or(OnboardingError::UnknownUser { id: user_id })?;
        let profile = self.db.get_patient_profile(user_id).await?;

        let mut seed = FormValues::new()
            .with(fields::NAME, FieldValue::Text(user.name))
            .with(fields::EMAIL, FieldValue::Text(user.email))
            .with(fields::GENDER, FieldValue::Choice(DEFAULT_GENDER.to_string()));
        if let Some(phone) = profile.and_then(|p| p.phone) {
            seed.insert(fields::PHONE, FieldValue::Text(phone));
        }

        debug!(%user_id, "Seeding patient form from account");
        Ok(FormController::with_defaults(
            Arc::clone(&self.forms.patient),
            seed,
        ))
    }

    /// Move past `from` for `user_id`.
    pub fn advance(&self, from: OnboardingStep, user_id: Uuid) -> Result<Transition, OnboardingError> {
        let invalid = |to: String| OnboardingError::InvalidTransition {
            from: from.to_string(),
            to,
        };
        let next = from.next().ok_or_else(|| invalid("none".into()))?;
        if !from.can_transition_to(next) {
            return Err(invalid(next.to_string()));
        }

        let transition = Transition {
            step: next,
            address: next.address(user_id),
        };
        debug!(%user_id, %from, to = %next, address = %transition.address, "Onboarding advanced");
        Ok(transition)
    }

    /// Where a signed-in account should land.
    pub async fn resume_address(&self, user_id: Uuid) -> Result<String, OnboardingError> {
        Ok(self.step_for(user_id).await?.address(user_id))
    }
}
