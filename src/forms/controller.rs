//! Form controller — per-instance field state and the submit state machine.
//!
//! Phases: Pristine → Editing → Submitting → (Editing | Done).
//! Submitting takes `&mut self`, so a second submit can never run against the
//! same state while one is in flight.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::field::{Field, FieldValue, FormValues, ValidationError, ValidationResult};
use super::registry::FieldRegistry;
use super::schema::{FormSchema, RenderedSection};
use crate::submission::{SubmissionOutcome, Submitter};

/// Where a controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormPhase {
    #[default]
    Pristine,
    Editing,
    Submitting,
    Done,
}

impl FormPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for FormPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pristine => "pristine",
            Self::Editing => "editing",
            Self::Submitting => "submitting",
            Self::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// Result of one `on_submit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitAttempt<E> {
    /// Client-side validation failed; the submitter was not called.
    Rejected(Vec<ValidationError>),
    /// The submitter ran and produced an outcome.
    Settled(SubmissionOutcome<E>),
    /// Submit arrived while already submitting or done.
    Ignored,
}

/// Holds one form's values and errors and drives its submission.
pub struct FormController {
    schema: Arc<FormSchema>,
    registry: &'static FieldRegistry,
    values: FormValues,
    errors: BTreeMap<String, ValidationError>,
    form_error: Option<String>,
    phase: FormPhase,
}

impl FormController {
    pub fn new(schema: Arc<FormSchema>) -> Self {
        Self {
            schema,
            registry: FieldRegistry::shared(),
            values: FormValues::new(),
            errors: BTreeMap::new(),
            form_error: None,
            phase: FormPhase::Pristine,
        }
    }

    /// Create a controller seeded with values known from earlier steps.
    /// Seeds for fields the schema does not declare are dropped.
    pub fn with_defaults(schema: Arc<FormSchema>, defaults: FormValues) -> Self {
        let mut controller = Self::new(schema);
        for (name, value) in defaults.iter() {
            if controller.schema.has_field(name) {
                controller.values.insert(name, value.clone());
            } else {
                warn!(form = controller.schema.id(), field = name, "Dropping seed for undeclared field");
            }
        }
        controller
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.values()
    }

    pub fn error(&self, name: &str) -> Option<&ValidationError> {
        self.errors.get(name)
    }

    /// A form-level error from the last failed submission, if any.
    pub fn form_error(&self) -> Option<&str> {
        self.form_error.as_deref()
    }

    /// Typed view of a declared field.
    pub fn field(&self, name: &str) -> Option<Field<FieldValue>> {
        self.schema.field(name).map(|spec| Field {
            name: spec.name.clone(),
            value: self.values.get(name).cloned(),
            error: self.errors.get(name).cloned(),
        })
    }

    /// Handle raw input for one field. Returns `None` when the event was
    /// ignored (unknown field, or the form is already done).
    pub fn on_field_change(&mut self, name: &str, raw: &str) -> Option<ValidationResult> {
        let Some(spec) = self.accepting(name) else {
            return None;
        };
        let mut changed = None;
        let (_, result) = self
            .registry
            .render_and_validate(spec, raw, |value| changed = Some(value));
        if let Some(value) = changed {
            self.apply(name, value, &result);
        }
        Some(result)
    }

    /// Set an already-typed value for one field.
    pub fn set_value(&mut self, name: &str, value: FieldValue) -> Option<ValidationResult> {
        let spec = self.accepting(name)?;
        let result = self.registry.validate(spec, Some(&value));
        self.apply(name, value, &result);
        Some(result)
    }

    fn accepting(&self, name: &str) -> Option<&super::field::FieldSpec> {
        if self.phase.is_terminal() {
            warn!(form = self.schema.id(), field = name, "Ignoring change on a submitted form");
            return None;
        }
        let spec = self.schema.field(name);
        if spec.is_none() {
            warn!(form = self.schema.id(), field = name, "Ignoring change for unknown field");
        }
        spec
    }

    fn apply(&mut self, name: &str, value: FieldValue, result: &ValidationResult) {
        self.values.insert(name, value);
        match result.message() {
            Some(message) => {
                self.errors.insert(
                    name.to_string(),
                    ValidationError {
                        field: name.to_string(),
                        message: message.to_string(),
                    },
                );
            }
            None => {
                self.errors.remove(name);
            }
        }
        self.phase = FormPhase::Editing;
    }

    /// Validate the whole form and, only if valid, hand it to `submitter`.
    pub async fn on_submit<S>(&mut self, submitter: &S) -> SubmitAttempt<S::Entity>
    where
        S: Submitter + ?Sized,
    {
        if matches!(self.phase, FormPhase::Submitting | FormPhase::Done) {
            debug!(form = self.schema.id(), phase = %self.phase, "Submit ignored");
            return SubmitAttempt::Ignored;
        }

        self.phase = FormPhase::Submitting;
        self.form_error = None;

        let report = self.schema.validate_all(&self.values);
        if !report.is_valid() {
            let errors = report.errors();
            self.errors = errors
                .iter()
                .map(|e| (e.field.clone(), e.clone()))
                .collect();
            self.phase = FormPhase::Editing;
            debug!(form = self.schema.id(), failing = errors.len(), "Submit rejected by validation");
            return SubmitAttempt::Rejected(errors);
        }
        self.errors.clear();

        let outcome = submitter.submit(&self.values).await;
        match &outcome {
            SubmissionOutcome::Success { .. } => {
                self.phase = FormPhase::Done;
            }
            SubmissionOutcome::Failure(failure) => {
                match failure.field.as_deref().filter(|f| self.schema.has_field(f)) {
                    Some(field) => {
                        self.errors.insert(
                            field.to_string(),
                            ValidationError {
                                field: field.to_string(),
                                message: failure.message.clone(),
                            },
                        );
                    }
                    None => self.form_error = Some(failure.message.clone()),
                }
                self.phase = FormPhase::Editing;
            }
        }
        SubmitAttempt::Settled(outcome)
    }

    /// Render every section's controls with current values and errors.
    pub fn controls(&self) -> Vec<RenderedSection> {
        self.schema
            .sections()
            .iter()
            .map(|section| RenderedSection {
                title: section.title.clone(),
                controls: section
                    .fields
                    .iter()
                    .filter_map(|name| {
                        let spec = self.schema.field(name)?;
                        let field = self.field(name)?;
                        Some(self.registry.render(spec, &field))
                    })
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::forms::field::FieldSpec;
    use crate::forms::schema::define_schema;
    use crate::submission::{FailureReason, SubmissionFailure};

    fn schema() -> Arc<FormSchema> {
        Arc::new(
            define_schema(
                "register",
                vec![
                    FieldSpec::text("name", "Full Name")
                        .min_length(3, "Name must be at least 3 characters."),
                    FieldSpec::email("email", "Email"),
                    FieldSpec::phone("phone", "Phone Number"),
                ],
            )
            .unwrap(),
        )
    }

    /// Counts calls and answers with a fixed outcome.
    struct Recorder {
        calls: AtomicUsize,
        outcome: SubmissionOutcome<String>,
    }

    impl Recorder {
        fn new(outcome: SubmissionOutcome<String>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcome,
            }
        }
    }

    #[async_trait]
    impl Submitter for Recorder {
        type Entity = String;

        async fn submit(&self, _payload: &FormValues) -> SubmissionOutcome<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn fill(controller: &mut FormController, name: &str, email: &str, phone: &str) {
        controller.on_field_change("name", name);
        controller.on_field_change("email", email);
        controller.on_field_change("phone", phone);
    }

    #[test]
    fn starts_pristine() {
        let controller = FormController::new(schema());
        assert_eq!(controller.phase(), FormPhase::Pristine);
        assert_eq!(controller.errors().count(), 0);
    }

    #[test]
    fn change_validates_only_that_field() {
        let mut controller = FormController::new(schema());
        let result = controller.on_field_change("name", "Jo").unwrap();
        assert!(!result.is_valid());
        assert_eq!(controller.phase(), FormPhase::Editing);
        assert!(controller.error("name").is_some());
        // untouched fields stay clean until submit
        assert!(controller.error("email").is_none());

        controller.on_field_change("name", "Jordan Lee");
        assert!(controller.error("name").is_none());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let mut controller = FormController::new(schema());
        assert!(controller.on_field_change("nickname", "JJ").is_none());
        assert!(!controller.values().contains("nickname"));
        assert_eq!(controller.phase(), FormPhase::Pristine);
    }

    #[test]
    fn seeds_drop_undeclared_fields() {
        let defaults = FormValues::new()
            .with("name", FieldValue::Text("Jordan Lee".into()))
            .with("role", FieldValue::Text("admin".into()));
        let controller = FormController::with_defaults(schema(), defaults);
        assert!(controller.values().contains("name"));
        assert!(!controller.values().contains("role"));
        assert_eq!(controller.phase(), FormPhase::Pristine);
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_submitter() {
        let mut controller = FormController::new(schema());
        fill(&mut controller, "Jo", "jo@example.com", "081234567890");
        let recorder = Recorder::new(SubmissionOutcome::Success {
            entity: "id".into(),
        });

        let attempt = controller.on_submit(&recorder).await;
        match attempt {
            SubmitAttempt::Rejected(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "name");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.phase(), FormPhase::Editing);
    }

    #[tokio::test]
    async fn submit_populates_errors_for_untouched_fields() {
        let mut controller = FormController::new(schema());
        let recorder = Recorder::new(SubmissionOutcome::Success {
            entity: "id".into(),
        });
        let attempt = controller.on_submit(&recorder).await;
        assert!(matches!(attempt, SubmitAttempt::Rejected(ref e) if e.len() == 3));
        assert_eq!(controller.errors().count(), 3);
        assert_eq!(controller.error("email").unwrap().message, "Required");
    }

    #[tokio::test]
    async fn success_is_terminal() {
        let mut controller = FormController::new(schema());
        fill(&mut controller, "Jordan Lee", "jordan@example.com", "+6281234567890");
        let recorder = Recorder::new(SubmissionOutcome::Success {
            entity: "user-1".into(),
        });

        let attempt = controller.on_submit(&recorder).await;
        assert_eq!(
            attempt,
            SubmitAttempt::Settled(SubmissionOutcome::Success {
                entity: "user-1".into()
            })
        );
        assert_eq!(controller.phase(), FormPhase::Done);

        // no more edits or submits after done
        assert!(controller.on_field_change("name", "Someone Else").is_none());
        assert_eq!(controller.on_submit(&recorder).await, SubmitAttempt::Ignored);
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn conflict_lands_on_its_field() {
        let mut controller = FormController::new(schema());
        fill(&mut controller, "Jordan Lee", "jordan@example.com", "+6281234567890");
        let recorder = Recorder::new(SubmissionOutcome::Failure(SubmissionFailure {
            reason: FailureReason::Conflict,
            field: Some("email".into()),
            message: "Email already registered".into(),
        }));

        let attempt = controller.on_submit(&recorder).await;
        assert!(matches!(attempt, SubmitAttempt::Settled(SubmissionOutcome::Failure(_))));
        assert_eq!(controller.phase(), FormPhase::Editing);
        assert_eq!(
            controller.error("email").unwrap().message,
            "Email already registered"
        );
        assert!(controller.form_error().is_none());
    }

    #[tokio::test]
    async fn unknown_failure_is_form_level_and_retryable() {
        let mut controller = FormController::new(schema());
        fill(&mut controller, "Jordan Lee", "jordan@example.com", "+6281234567890");
        let recorder = Recorder::new(SubmissionOutcome::Failure(SubmissionFailure::unknown()));

        controller.on_submit(&recorder).await;
        assert!(controller.form_error().is_some());
        assert_eq!(controller.phase(), FormPhase::Editing);

        // retry is allowed
        controller.on_submit(&recorder).await;
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn controls_follow_sections() {
        let mut controller = FormController::new(schema());
        controller.on_field_change("name", "Jo");
        let sections = controller.controls();
        assert_eq!(sections.len(), 1);
        let names: Vec<_> = sections[0].controls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["name", "email", "phone"]);
        assert_eq!(
            sections[0].controls[0].error.as_deref(),
            Some("Name must be at least 3 characters.")
        );
        assert_eq!(sections[0].controls[0].value.as_deref(), Some("Jo"));
    }
}
