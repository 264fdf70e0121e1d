//! The registration and patient onboarding forms.

use std::sync::Arc;

use super::field::{FieldSpec, SelectOption};
use super::schema::FormSchema;
use crate::error::SchemaError;

/// Field names shared by the forms and the models built from them.
pub mod fields {
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const PHONE: &str = "phone";
    pub const DATE_OF_BIRTH: &str = "date_of_birth";
    pub const GENDER: &str = "gender";
    pub const ADDRESS: &str = "address";
    pub const OCCUPATION: &str = "occupation";
    pub const EMERGENCY_CONTACT_NAME: &str = "emergency_contact_name";
    pub const EMERGENCY_CONTACT_PHONE: &str = "emergency_contact_phone";
    pub const PRIMARY_PHYSICIAN: &str = "primary_physician";
    pub const INSURANCE_PROVIDER: &str = "insurance_provider";
    pub const INSURANCE_POLICY_NUMBER: &str = "insurance_policy_number";
    pub const ALLERGIES: &str = "allergies";
    pub const CURRENT_MEDICATION: &str = "current_medication";
    pub const FAMILY_MEDICAL_HISTORY: &str = "family_medical_history";
    pub const PAST_MEDICAL_HISTORY: &str = "past_medical_history";
    pub const IDENTIFICATION_TYPE: &str = "identification_type";
    pub const IDENTIFICATION_NUMBER: &str = "identification_number";
}

pub const REGISTER_FORM: &str = "register";
pub const PATIENT_FORM: &str = "patient";

const HISTORY_MAX_LEN: usize = 1000;

/// Gender preselected on the onboarding form.
pub const DEFAULT_GENDER: &str = "MALE";

fn gender_options() -> Vec<SelectOption> {
    vec![
        SelectOption::new("Male", "MALE"),
        SelectOption::new("Female", "FEMALE"),
    ]
}

fn identification_options() -> Vec<SelectOption> {
    vec![
        SelectOption::new("Birth Certificate", "birth_certificate"),
        SelectOption::new("Driver's License", "drivers_license"),
        SelectOption::new("National Identity Card (KTP)", "national_id"),
        SelectOption::new("Passport", "passport"),
    ]
}

fn history(name: &str, label: &str, placeholder: &str) -> FieldSpec {
    FieldSpec::textarea(name, label)
        .placeholder(placeholder)
        .optional()
        .max_length(HISTORY_MAX_LEN, format!("Keep this under {HISTORY_MAX_LEN} characters"))
}

/// Both wizard forms, built once at startup.
#[derive(Debug, Clone)]
pub struct IntakeForms {
    pub register: Arc<FormSchema>,
    pub patient: Arc<FormSchema>,
}

impl IntakeForms {
    /// Build the forms. `physicians` feeds the primary care physician select;
    /// an empty list is a schema error.
    pub fn new(physicians: Vec<SelectOption>) -> Result<Self, SchemaError> {
        Ok(Self {
            register: Arc::new(register_schema()?),
            patient: Arc::new(patient_schema(physicians)?),
        })
    }
}

/// Account creation: name, email and phone.
pub fn register_schema() -> Result<FormSchema, SchemaError> {
    FormSchema::builder(REGISTER_FORM, "Schedule your first appointment")
        .field(
            FieldSpec::text(fields::NAME, "Full Name")
                .placeholder("Full Name")
                .min_length(3, "Name must be at least 3 characters."),
        )
        .field(FieldSpec::email(fields::EMAIL, "Email").placeholder("me@example.com"))
        .field(FieldSpec::phone(fields::PHONE, "Phone Number").placeholder("Enter phone number"))
        .build()
}

/// Patient onboarding: personal, medical and identification details.
pub fn patient_schema(physicians: Vec<SelectOption>) -> Result<FormSchema, SchemaError> {
    FormSchema::builder(PATIENT_FORM, "Let us know more about yourself")
        .section("Personal Information")
        .field(
            FieldSpec::text(fields::NAME, "Full Name")
                .placeholder("Full Name")
                .min_length(3, "Name must be at least 3 characters"),
        )
        .field(FieldSpec::email(fields::EMAIL, "Email").placeholder("me@example.com"))
        .field(FieldSpec::phone(fields::PHONE, "Phone Number").placeholder("Enter phone number"))
        .field(
            FieldSpec::date(fields::DATE_OF_BIRTH, "Date of birth")
                .not_in_future("Date of birth cannot be in the future"),
        )
        .field(FieldSpec::radio(fields::GENDER, "Gender").options(gender_options()))
        .field(
            FieldSpec::text(fields::ADDRESS, "Address")
                .placeholder("ex: Jalan Karapitan No.9, Bandung, Indonesia")
                .min_length(2, "Address must be at least 2 characters"),
        )
        .field(
            FieldSpec::text(fields::OCCUPATION, "Occupation")
                .placeholder("ex: Software Engineer")
                .min_length(2, "Occupation must be at least 2 characters"),
        )
        .field(
            FieldSpec::text(fields::EMERGENCY_CONTACT_NAME, "Emergency Contact Name")
                .placeholder("Guardian's Name")
                .min_length(3, "Name must be at least 3 characters"),
        )
        .field(
            FieldSpec::phone(fields::EMERGENCY_CONTACT_PHONE, "Emergency Phone Number")
                .placeholder("Guardian's Phone Number"),
        )
        .section("Medical Information")
        .field(
            FieldSpec::select(fields::PRIMARY_PHYSICIAN, "Primary care physician")
                .placeholder("Select a doctor")
                .options(physicians),
        )
        .field(
            FieldSpec::text(fields::INSURANCE_PROVIDER, "Insurance Provider")
                .placeholder("ex: BPJS Kesehatan")
                .min_length(2, "Insurance provider must be at least 2 characters"),
        )
        .field(
            FieldSpec::text(fields::INSURANCE_POLICY_NUMBER, "Insurance Policy Number")
                .placeholder("ex: ABC123456789")
                .min_length(2, "Policy number must be at least 2 characters"),
        )
        .field(history(
            fields::ALLERGIES,
            "Allergies (if any)",
            "ex: Peanuts, Penicillin, Pollen",
        ))
        .field(history(
            fields::CURRENT_MEDICATION,
            "Current Medication",
            "ex: Ibuprofen 200mg, Levothyroxine 50mcg",
        ))
        .field(history(
            fields::FAMILY_MEDICAL_HISTORY,
            "Family medical history (if relevant)",
            "ex: Mother had breast cancer",
        ))
        .field(history(
            fields::PAST_MEDICAL_HISTORY,
            "Past Medical History",
            "ex: Asthma diagnosis in childhood",
        ))
        .section("Identification and Verification")
        .field(
            FieldSpec::select(fields::IDENTIFICATION_TYPE, "Identification Type")
                .placeholder("Select an identification type")
                .options(identification_options()),
        )
        .field(
            FieldSpec::text(fields::IDENTIFICATION_NUMBER, "Identification Number")
                .placeholder("ex: 1234567")
                .min_length(4, "Identification number must be at least 4 characters"),
        )
        .build()
}
