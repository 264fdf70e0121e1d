//! Field declarations, values and validation results.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::registry::FieldRegistry;

/// Date format accepted from raw input and used when echoing dates back.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The closed set of field kinds a form can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Phone,
    Date,
    Radio,
    Select,
    Textarea,
}

impl FieldKind {
    /// Whether the kind picks from a fixed option list.
    pub fn has_options(&self) -> bool {
        matches!(self, Self::Radio | Self::Select)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Date => "date",
            Self::Radio => "radio",
            Self::Select => "select",
            Self::Textarea => "textarea",
        };
        write!(f, "{s}")
    }
}

/// One entry of a radio group or select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Choice(String),
}

impl FieldValue {
    /// Whether the value carries no content.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) | Self::Choice(s) => s.is_empty(),
            Self::Date(_) => false,
        }
    }

    /// Render the value the way a user would type it.
    pub fn as_input(&self) -> String {
        match self {
            Self::Text(s) | Self::Choice(s) => s.clone(),
            Self::Date(d) => d.format(DATE_FORMAT).to_string(),
        }
    }

    /// Interpret the value as a calendar date, parsing text input if needed.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok(),
            Self::Choice(_) => None,
        }
    }
}

/// Outcome of validating a single value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationResult {
    Valid,
    Invalid { message: String },
}

impl ValidationResult {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid { message } => Some(message),
        }
    }

    /// Chain another check, keeping the first failure.
    pub fn and_then(self, next: impl FnOnce() -> ValidationResult) -> Self {
        match self {
            Self::Valid => next(),
            invalid => invalid,
        }
    }
}

/// A field-level error shown next to its control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// An extra rule on top of the kind's own check.
#[derive(Debug, Clone)]
pub enum Rule {
    MinLength { min: usize, message: String },
    MaxLength { max: usize, message: String },
    Pattern { regex: Regex, message: String },
    NotInFuture { message: String },
}

impl Rule {
    /// Apply the rule to a non-empty value.
    pub fn check(&self, value: &FieldValue) -> ValidationResult {
        match self {
            Self::MinLength { min, message } => {
                if value.as_input().chars().count() < *min {
                    ValidationResult::invalid(message)
                } else {
                    ValidationResult::Valid
                }
            }
            Self::MaxLength { max, message } => {
                if value.as_input().chars().count() > *max {
                    ValidationResult::invalid(message)
                } else {
                    ValidationResult::Valid
                }
            }
            Self::Pattern { regex, message } => {
                if regex.is_match(&value.as_input()) {
                    ValidationResult::Valid
                } else {
                    ValidationResult::invalid(message)
                }
            }
            Self::NotInFuture { message } => match value.as_date() {
                Some(date) if date > chrono::Local::now().date_naive() => {
                    ValidationResult::invalid(message)
                }
                _ => ValidationResult::Valid,
            },
        }
    }
}

/// Declarative description of one form field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub label: String,
    pub placeholder: Option<String>,
    pub options: Vec<SelectOption>,
    pub required: bool,
    pub rules: Vec<Rule>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            label: label.into(),
            placeholder: None,
            options: Vec::new(),
            required: true,
            rules: Vec::new(),
        }
    }

    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text, label)
    }

    pub fn email(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Email, label)
    }

    pub fn phone(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Phone, label)
    }

    pub fn date(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date, label)
    }

    pub fn radio(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Radio, label)
    }

    pub fn select(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Select, label)
    }

    pub fn textarea(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Textarea, label)
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn options(mut self, options: Vec<SelectOption>) -> Self {
        self.options = options;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn min_length(mut self, min: usize, message: impl Into<String>) -> Self {
        self.rules.push(Rule::MinLength {
            min,
            message: message.into(),
        });
        self
    }

    pub fn max_length(mut self, max: usize, message: impl Into<String>) -> Self {
        self.rules.push(Rule::MaxLength {
            max,
            message: message.into(),
        });
        self
    }

    pub fn pattern(mut self, regex: Regex, message: impl Into<String>) -> Self {
        self.rules.push(Rule::Pattern {
            regex,
            message: message.into(),
        });
        self
    }

    pub fn not_in_future(mut self, message: impl Into<String>) -> Self {
        self.rules.push(Rule::NotInFuture {
            message: message.into(),
        });
        self
    }

    /// Whether `value` is one of this field's option values.
    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }

    /// Validate a value (absent means empty) against the kind and rules.
    pub fn validate(&self, value: Option<&FieldValue>) -> ValidationResult {
        FieldRegistry::shared().validate(self, value)
    }
}

/// Typed view of one field: its current value and error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field<T> {
    pub name: String,
    pub value: Option<T>,
    pub error: Option<ValidationError>,
}

impl<T> Field<T> {
    pub fn is_invalid(&self) -> bool {
        self.error.is_some()
    }
}

/// Field values keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormValues(BTreeMap<String, FieldValue>);

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.0.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.0.remove(name)
    }

    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Text or choice content of a field, `None` when absent or empty.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(FieldValue::Text(s)) | Some(FieldValue::Choice(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        self.0.get(name).and_then(FieldValue::as_date)
    }

    /// Values as raw input strings, the shape sent to and from clients.
    pub fn to_input_map(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.as_input()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_display_matches_serde() {
        let kinds = [
            FieldKind::Text,
            FieldKind::Email,
            FieldKind::Phone,
            FieldKind::Date,
            FieldKind::Radio,
            FieldKind::Select,
            FieldKind::Textarea,
        ];
        for kind in kinds {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(format!("\"{kind}\""), json);
        }
    }

    #[test]
    fn only_radio_and_select_have_options() {
        assert!(FieldKind::Radio.has_options());
        assert!(FieldKind::Select.has_options());
        assert!(!FieldKind::Text.has_options());
        assert!(!FieldKind::Date.has_options());
    }

    #[test]
    fn min_length_counts_characters() {
        let rule = Rule::MinLength {
            min: 3,
            message: "too short".into(),
        };
        assert!(rule.check(&FieldValue::Text("Édo".into())).is_valid());
        assert_eq!(
            rule.check(&FieldValue::Text("Jo".into())).message(),
            Some("too short")
        );
    }

    #[test]
    fn not_in_future_rejects_tomorrow() {
        let rule = Rule::NotInFuture {
            message: "future".into(),
        };
        let tomorrow = chrono::Local::now().date_naive() + chrono::Days::new(1);
        assert!(!rule.check(&FieldValue::Date(tomorrow)).is_valid());
        let past = NaiveDate::from_ymd_opt(1990, 5, 17).unwrap();
        assert!(rule.check(&FieldValue::Date(past)).is_valid());
    }

    #[test]
    fn text_dates_parse() {
        let value = FieldValue::Text("2001-02-03".into());
        assert_eq!(value.as_date(), NaiveDate::from_ymd_opt(2001, 2, 3));
        assert_eq!(FieldValue::Text("03/02/2001".into()).as_date(), None);
    }

    #[test]
    fn form_values_text_skips_empty() {
        let values = FormValues::new()
            .with("name", FieldValue::Text("Jordan".into()))
            .with("note", FieldValue::Text(String::new()));
        assert_eq!(values.text("name"), Some("Jordan"));
        assert_eq!(values.text("note"), None);
        assert_eq!(values.text("missing"), None);
    }

    #[test]
    fn validation_result_keeps_first_failure() {
        let result = ValidationResult::invalid("first").and_then(|| ValidationResult::invalid("second"));
        assert_eq!(result.message(), Some("first"));
        let result = ValidationResult::Valid.and_then(|| ValidationResult::invalid("second"));
        assert_eq!(result.message(), Some("second"));
    }
}
