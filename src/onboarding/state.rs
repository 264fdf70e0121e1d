//! Onboarding state machine — which wizard step an account is on.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Address of the home page, reached once onboarding is done.
pub const HOME_ADDRESS: &str = "/";
/// Address of the account step.
pub const REGISTER_ADDRESS: &str = "/register";

/// The steps of the onboarding wizard.
///
/// Progresses linearly: Account → PatientDetails → Complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    #[default]
    Account,
    PatientDetails,
    Complete,
}

impl OnboardingStep {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: OnboardingStep) -> bool {
        use OnboardingStep::*;
        matches!(
            (self, target),
            (Account, PatientDetails) | (PatientDetails, Complete)
        )
    }

    /// Whether this step is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Get the next step in the linear progression, if any.
    pub fn next(&self) -> Option<OnboardingStep> {
        use OnboardingStep::*;
        match self {
            Account => Some(PatientDetails),
            PatientDetails => Some(Complete),
            Complete => None,
        }
    }

    /// Navigation address of this step. Only the patient step is
    /// parameterized by the account id.
    pub fn address(&self, user_id: Uuid) -> String {
        match self {
            Self::Account => REGISTER_ADDRESS.to_string(),
            Self::PatientDetails => format!("/register/onboarding/patient/{user_id}"),
            Self::Complete => HOME_ADDRESS.to_string(),
        }
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Account => "account",
            Self::PatientDetails => "patient_details",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}
