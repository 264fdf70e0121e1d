//! Forms — field registry, schemas and the per-form controller.
//!
//! A form is a [`FormSchema`] of [`FieldSpec`]s. The [`FieldRegistry`]
//! renders and validates each field by kind, and a [`FormController`] holds
//! one form instance's values and errors and drives its submission.

pub mod controller;
pub mod field;
pub mod intake;
pub mod registry;
pub mod schema;

pub use controller::{FormController, FormPhase, SubmitAttempt};
pub use field::{
    Field, FieldKind, FieldSpec, FieldValue, FormValues, Rule, SelectOption, ValidationError,
    ValidationResult,
};
pub use intake::IntakeForms;
pub use registry::{Control, FieldRegistry, Widget};
pub use schema::{
    FormSchema, RenderedSection, Section, ValidationReport, define_schema, validate_all,
};
