//! Account and patient profile data models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::forms::FormValues;
use crate::forms::intake::fields;

/// Role of an account. Sign-ups are always patients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[default]
    Patient,
    Doctor,
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Patient => write!(f, "PATIENT"),
            Self::Doctor => write!(f, "DOCTOR"),
            Self::Admin => write!(f, "ADMIN"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PATIENT" => Ok(Self::Patient),
            "DOCTOR" => Ok(Self::Doctor),
            "ADMIN" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MALE" => Ok(Self::Male),
            "FEMALE" => Ok(Self::Female),
            other => Err(format!("unknown gender: {other}")),
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for creating an account together with its empty patient profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub image: Option<String>,
    pub role: UserRole,
}

impl NewAccount {
    /// Build from validated registration values.
    pub fn from_values(values: &FormValues) -> Option<Self> {
        Some(Self {
            name: values.text(fields::NAME)?.to_string(),
            email: values.text(fields::EMAIL)?.to_string(),
            phone: values.text(fields::PHONE).map(str::to_string),
            image: None,
            role: UserRole::Patient,
        })
    }
}

/// Personal, medical and identification details collected at onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientDetails {
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub address: String,
    pub occupation: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub primary_physician: String,
    pub insurance_provider: String,
    pub insurance_policy_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_medication: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_medical_history: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub past_medical_history: Option<String>,
    pub identification_type: String,
    pub identification_number: String,
}

impl PatientDetails {
    /// Build from validated onboarding values.
    pub fn from_values(values: &FormValues) -> Option<Self> {
        let owned = |name: &str| values.text(name).map(str::to_string);
        Some(Self {
            date_of_birth: values.date(fields::DATE_OF_BIRTH)?,
            gender: values.text(fields::GENDER)?.parse().ok()?,
            address: owned(fields::ADDRESS)?,
            occupation: owned(fields::OCCUPATION)?,
            emergency_contact_name: owned(fields::EMERGENCY_CONTACT_NAME)?,
            emergency_contact_phone: owned(fields::EMERGENCY_CONTACT_PHONE)?,
            primary_physician: owned(fields::PRIMARY_PHYSICIAN)?,
            insurance_provider: owned(fields::INSURANCE_PROVIDER)?,
            insurance_policy_number: owned(fields::INSURANCE_POLICY_NUMBER)?,
            allergies: owned(fields::ALLERGIES),
            current_medication: owned(fields::CURRENT_MEDICATION),
            family_medical_history: owned(fields::FAMILY_MEDICAL_HISTORY),
            past_medical_history: owned(fields::PAST_MEDICAL_HISTORY),
            identification_type: owned(fields::IDENTIFICATION_TYPE)?,
            identification_number: owned(fields::IDENTIFICATION_NUMBER)?,
        })
    }
}

/// Everything the onboarding step writes for an existing account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientUpdate {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub details: PatientDetails,
}

impl PatientUpdate {
    pub fn from_values(values: &FormValues) -> Option<Self> {
        Some(Self {
            name: values.text(fields::NAME)?.to_string(),
            email: values.text(fields::EMAIL)?.to_string(),
            phone: values.text(fields::PHONE)?.to_string(),
            details: PatientDetails::from_values(values)?,
        })
    }
}

/// A user together with its patient profile, created in one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user: User,
    pub profile: PatientProfile,
}

/// The patient profile linked one-to-one with a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<PatientDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PatientProfile {
    /// Whether the onboarding form has been submitted for this profile.
    pub fn is_complete(&self) -> bool {
        self.onboarding_completed_at.is_some()
    }
}

/// A database-backed sign-in session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session for `user_id` that lives for `max_age`.
    pub fn new(user_id: Uuid, max_age: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            token: format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
            user_id,
            expires_at: now + max_age,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
