//! Field registry — maps each field kind to its control and validator.
//!
//! Dispatch is a single exhaustive `match` over [`FieldKind`]; adding a kind
//! fails to compile until both the renderer and the validator handle it.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::field::{
    DATE_FORMAT, Field, FieldKind, FieldSpec, FieldValue, SelectOption, ValidationError,
    ValidationResult,
};

/// Country preselected on phone inputs.
pub const DEFAULT_PHONE_COUNTRY: &str = "ID";

const TEXTAREA_ROWS: u8 = 5;

static SHARED: LazyLock<FieldRegistry> = LazyLock::new(FieldRegistry::new);

/// The editable control a field renders as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum Widget {
    TextInput { input_type: &'static str },
    PhoneInput { default_country: &'static str },
    DatePicker { format: &'static str },
    RadioGroup { options: Vec<SelectOption> },
    Select { options: Vec<SelectOption> },
    Textarea { rows: u8 },
}

/// A rendered control: what a client needs to draw one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Control {
    pub name: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub widget: Widget,
}

/// Renderer/validator pairs for every [`FieldKind`].
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    email: Regex,
    phone: Regex,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self {
            email: Regex::new(
                r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@(?:[A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$",
            )
            .unwrap(),
            // +62 or a leading 0, then 9-13 digits starting with a non-zero digit
            phone: Regex::new(r"^(?:\+62|0)[1-9][0-9]{8,12}$").unwrap(),
        }
    }

    /// Process-wide registry; the compiled patterns are immutable.
    pub fn shared() -> &'static Self {
        &SHARED
    }

    /// Turn raw user input into the typed value for a kind.
    pub fn normalize(&self, kind: FieldKind, raw: &str) -> FieldValue {
        match kind {
            FieldKind::Text | FieldKind::Textarea => FieldValue::Text(raw.to_string()),
            FieldKind::Email => FieldValue::Text(raw.trim().to_lowercase()),
            FieldKind::Phone => FieldValue::Text(raw.trim().to_string()),
            FieldKind::Date => {
                let trimmed = raw.trim();
                match chrono::NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
                    Ok(date) => FieldValue::Date(date),
                    Err(_) => FieldValue::Text(trimmed.to_string()),
                }
            }
            FieldKind::Radio | FieldKind::Select => FieldValue::Choice(raw.trim().to_string()),
        }
    }

    /// Validate a value against the field's kind, then its rules.
    pub fn validate(&self, spec: &FieldSpec, value: Option<&FieldValue>) -> ValidationResult {
        let value = match value {
            Some(v) if !v.is_empty() => v,
            _ if spec.required => return ValidationResult::invalid("Required"),
            _ => return ValidationResult::Valid,
        };

        self.check_kind(spec, value).and_then(|| {
            spec.rules
                .iter()
                .map(|rule| rule.check(value))
                .find(|result| !result.is_valid())
                .unwrap_or(ValidationResult::Valid)
        })
    }

    fn check_kind(&self, spec: &FieldSpec, value: &FieldValue) -> ValidationResult {
        match spec.kind {
            FieldKind::Text | FieldKind::Textarea => ValidationResult::Valid,
            FieldKind::Email => {
                let input = value.as_input();
                if !input.starts_with('.') && !input.contains("..") && self.email.is_match(&input) {
                    ValidationResult::Valid
                } else {
                    ValidationResult::invalid("Invalid email")
                }
            }
            FieldKind::Phone => {
                if self.phone.is_match(&value.as_input()) {
                    ValidationResult::Valid
                } else {
                    ValidationResult::invalid("Invalid phone number")
                }
            }
            FieldKind::Date => {
                if value.as_date().is_some() {
                    ValidationResult::Valid
                } else {
                    ValidationResult::invalid("Invalid date")
                }
            }
            FieldKind::Radio | FieldKind::Select => match value {
                FieldValue::Choice(v) | FieldValue::Text(v) if spec.has_option(v) => {
                    ValidationResult::Valid
                }
                _ => ValidationResult::invalid("Select one of the available options"),
            },
        }
    }

    /// Render a field's control with its current value and error.
    pub fn render(&self, spec: &FieldSpec, field: &Field<FieldValue>) -> Control {
        let widget = match spec.kind {
            FieldKind::Text => Widget::TextInput { input_type: "text" },
            FieldKind::Email => Widget::TextInput {
                input_type: "email",
            },
            FieldKind::Phone => Widget::PhoneInput {
                default_country: DEFAULT_PHONE_COUNTRY,
            },
            FieldKind::Date => Widget::DatePicker {
                format: DATE_FORMAT,
            },
            FieldKind::Radio => Widget::RadioGroup {
                options: spec.options.clone(),
            },
            FieldKind::Select => Widget::Select {
                options: spec.options.clone(),
            },
            FieldKind::Textarea => Widget::Textarea {
                rows: TEXTAREA_ROWS,
            },
        };

        Control {
            name: spec.name.clone(),
            label: spec.label.clone(),
            placeholder: spec.placeholder.clone(),
            required: spec.required,
            value: field.value.as_ref().map(FieldValue::as_input),
            error: field.error.as_ref().map(|e| e.message.clone()),
            widget,
        }
    }

    /// Handle one input event: normalise `raw`, hand the typed value to
    /// `on_change`, and return the re-rendered control with its validity.
    pub fn render_and_validate(
        &self,
        spec: &FieldSpec,
        raw: &str,
        on_change: impl FnOnce(FieldValue),
    ) -> (Control, ValidationResult) {
        let value = self.normalize(spec.kind, raw);
        let result = self.validate(spec, Some(&value));
        let field = Field {
            name: spec.name.clone(),
            error: result.message().map(|message| ValidationError {
                field: spec.name.clone(),
                message: message.to_string(),
            }),
            value: Some(value.clone()),
        };
        let control = self.render(spec, &field);
        on_change(value);
        (control, result)
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> &'static FieldRegistry {
        FieldRegistry::shared()
    }

    fn check(spec: &FieldSpec, raw: &str) -> ValidationResult {
        let value = registry().normalize(spec.kind, raw);
        registry().validate(spec, Some(&value))
    }

    fn gender() -> FieldSpec {
        FieldSpec::radio("gender", "Gender").options(vec![
            SelectOption::new("Male", "MALE"),
            SelectOption::new("Female", "FEMALE"),
        ])
    }

    #[test]
    fn phone_accepts_both_prefixes() {
        let spec = FieldSpec::phone("phone", "Phone");
        assert!(check(&spec, "081234567890").is_valid());
        assert!(check(&spec, "+6281234567890").is_valid());
    }

    #[test]
    fn phone_digit_count_bounds() {
        let spec = FieldSpec::phone("phone", "Phone");
        // 9 digits after the prefix is the minimum, 13 the maximum
        assert!(check(&spec, "0812345678").is_valid());
        assert!(!check(&spec, "081234567").is_valid());
        assert!(check(&spec, "+628123456789012").is_valid());
        assert!(!check(&spec, "+6281234567890123").is_valid());
    }

    #[test]
    fn phone_rejects_bad_prefixes_and_zero_lead() {
        let spec = FieldSpec::phone("phone", "Phone");
        for raw in [
            "6281234567890",
            "+6181234567890",
            "0081234567890",
            "+62081234567890",
            "0812-3456-7890",
            "0812345678a0",
        ] {
            assert_eq!(
                check(&spec, raw).message(),
                Some("Invalid phone number"),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn phone_grammar_matches_digit_rule() {
        let spec = FieldSpec::phone("phone", "Phone");
        for prefix in ["+62", "0"] {
            for first in ['0', '1', '9'] {
                for rest in 6..=14 {
                    let raw = format!("{prefix}{first}{}", "5".repeat(rest));
                    let expected = first != '0' && (8..=12).contains(&rest);
                    assert_eq!(check(&spec, &raw).is_valid(), expected, "{raw}");
                }
            }
        }
    }

    #[test]
    fn email_grammar() {
        let spec = FieldSpec::email("email", "Email");
        for ok in ["jo@example.com", "first.last+tag@mail.example.co", "a_b@x-y.io"] {
            assert!(check(&spec, ok).is_valid(), "{ok}");
        }
        for bad in [
            "plainaddress",
            "@example.com",
            ".jo@example.com",
            "jo..lee@example.com",
            "jo@example",
            "jo@example.c",
            "jo@-example.com",
            "jo.@example.com",
        ] {
            assert_eq!(check(&spec, bad).message(), Some("Invalid email"), "{bad}");
        }
    }

    #[test]
    fn email_input_is_trimmed_and_lowercased() {
        let value = registry().normalize(FieldKind::Email, "  Jordan@Example.COM ");
        assert_eq!(value, FieldValue::Text("jordan@example.com".into()));
    }

    #[test]
    fn date_must_parse() {
        let spec = FieldSpec::date("dob", "Date of birth");
        assert!(check(&spec, "1990-05-17").is_valid());
        assert_eq!(check(&spec, "1990-02-30").message(), Some("Invalid date"));
        assert_eq!(check(&spec, "yesterday").message(), Some("Invalid date"));
    }

    #[test]
    fn choice_must_be_an_option() {
        let spec = gender();
        assert!(check(&spec, "FEMALE").is_valid());
        assert_eq!(
            check(&spec, "OTHER").message(),
            Some("Select one of the available options")
        );
    }

    #[test]
    fn required_and_optional_empty_values() {
        let required = FieldSpec::text("name", "Name");
        let optional = FieldSpec::textarea("allergies", "Allergies").optional();
        assert_eq!(registry().validate(&required, None).message(), Some("Required"));
        assert_eq!(check(&required, "").message(), Some("Required"));
        assert!(registry().validate(&optional, None).is_valid());
        assert!(check(&optional, "").is_valid());
    }

    #[test]
    fn rules_run_after_kind_check() {
        let spec = FieldSpec::text("name", "Name").min_length(3, "Name must be at least 3 characters");
        assert_eq!(
            check(&spec, "Jo").message(),
            Some("Name must be at least 3 characters")
        );
        assert!(check(&spec, "Jordan Lee").is_valid());
    }

    #[test]
    fn render_picks_widget_per_kind() {
        let field = |name: &str| Field {
            name: name.to_string(),
            value: None,
            error: None,
        };
        let phone = registry().render(&FieldSpec::phone("phone", "Phone"), &field("phone"));
        assert_eq!(
            phone.widget,
            Widget::PhoneInput {
                default_country: "ID"
            }
        );
        let spec = gender();
        let radio = registry().render(&spec, &field("gender"));
        assert_eq!(
            radio.widget,
            Widget::RadioGroup {
                options: spec.options.clone()
            }
        );
        let email = registry().render(&FieldSpec::email("email", "Email"), &field("email"));
        assert_eq!(
            email.widget,
            Widget::TextInput {
                input_type: "email"
            }
        );
    }

    #[test]
    fn render_and_validate_reports_through_callback() {
        let spec = FieldSpec::date("dob", "Date of birth");
        let mut seen = None;
        let (control, result) =
            registry().render_and_validate(&spec, "2000-01-31", |v| seen = Some(v));
        assert!(result.is_valid());
        assert_eq!(control.value.as_deref(), Some("2000-01-31"));
        assert!(control.error.is_none());
        assert_eq!(
            seen,
            Some(FieldValue::Date(
                chrono::NaiveDate::from_ymd_opt(2000, 1, 31).unwrap()
            ))
        );

        let (control, result) = registry().render_and_validate(&spec, "31/01/2000", |_| {});
        assert!(!result.is_valid());
        assert_eq!(control.error.as_deref(), Some("Invalid date"));
    }

    #[test]
    fn control_serializes_with_tag() {
        let spec = FieldSpec::textarea("notes", "Notes").placeholder("ex: none");
        let control = registry().render(
            &spec,
            &Field {
                name: "notes".into(),
                value: None,
                error: None,
            },
        );
        let json = serde_json::to_value(&control).unwrap();
        assert_eq!(json["control"], "textarea");
        assert_eq!(json["rows"], 5);
        assert_eq!(json["placeholder"], "ex: none");
        assert!(json.get("value").is_none());
    }
}
