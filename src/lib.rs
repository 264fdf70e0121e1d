//! Patient Intake — registration and patient onboarding forms.

pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod forms;
pub mod onboarding;
pub mod store;
pub mod submission;
