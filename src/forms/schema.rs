//! Form schemas — ordered, sectioned field declarations.

use std::collections::HashSet;

use serde::Serialize;

use super::field::{FieldSpec, FormValues, ValidationError, ValidationResult};
use super::registry::Control;
use crate::error::SchemaError;

/// A display group of fields. Carries no validation semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub fields: Vec<String>,
}

/// A section with its rendered controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSection {
    pub title: String,
    pub controls: Vec<Control>,
}

/// An ordered, validated set of fields for one wizard step.
#[derive(Debug, Clone)]
pub struct FormSchema {
    id: String,
    title: String,
    fields: Vec<FieldSpec>,
    sections: Vec<Section>,
}

impl FormSchema {
    pub fn builder(id: impl Into<String>, title: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            id: id.into(),
            title: title.into(),
            fields: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Names in `values` that no field of this schema declares.
    pub fn unknown_fields<'a>(&self, values: &'a FormValues) -> Vec<&'a str> {
        values.names().filter(|name| !self.has_field(name)).collect()
    }

    /// Validate every field; absent values are validated as empty.
    pub fn validate_all(&self, values: &FormValues) -> ValidationReport {
        validate_all(self, values)
    }
}

/// Incrementally builds a [`FormSchema`], grouping fields into sections.
pub struct SchemaBuilder {
    id: String,
    title: String,
    fields: Vec<FieldSpec>,
    sections: Vec<Section>,
}

impl SchemaBuilder {
    /// Start a new section; subsequent fields are grouped under it.
    pub fn section(mut self, title: impl Into<String>) -> Self {
        self.sections.push(Section {
            title: title.into(),
            fields: Vec::new(),
        });
        self
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        if self.sections.is_empty() {
            self.sections.push(Section {
                title: self.title.clone(),
                fields: Vec::new(),
            });
        }
        if let Some(section) = self.sections.last_mut() {
            section.fields.push(spec.name.clone());
        }
        self.fields.push(spec);
        self
    }

    /// Check the declarations and freeze the schema.
    pub fn build(self) -> Result<FormSchema, SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::Empty { form: self.id });
        }

        let mut seen = HashSet::new();
        for spec in &self.fields {
            if !seen.insert(spec.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    form: self.id.clone(),
                    field: spec.name.clone(),
                });
            }
            if spec.kind.has_options() && spec.options.is_empty() {
                return Err(SchemaError::MissingOptions {
                    form: self.id.clone(),
                    field: spec.name.clone(),
                    kind: spec.kind.to_string(),
                });
            }
        }

        let sections = self
            .sections
            .into_iter()
            .filter(|s| !s.fields.is_empty())
            .collect();

        Ok(FormSchema {
            id: self.id.clone(),
            title: self.title,
            fields: self.fields,
            sections,
        })
    }
}

/// Build a single-section schema from a list of fields.
pub fn define_schema(
    id: impl Into<String>,
    fields: Vec<FieldSpec>,
) -> Result<FormSchema, SchemaError> {
    let id = id.into();
    fields
        .into_iter()
        .fold(FormSchema::builder(id.clone(), id), SchemaBuilder::field)
        .build()
}

/// Per-field results of validating a whole form, in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    results: Vec<(String, ValidationResult)>,
}

impl ValidationReport {
    /// Valid iff every field is valid.
    pub fn is_valid(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_valid())
    }

    pub fn get(&self, name: &str) -> Option<&ValidationResult> {
        self.results
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, r)| r)
    }

    pub fn results(&self) -> &[(String, ValidationResult)] {
        &self.results
    }

    /// Every failing field, in schema order.
    pub fn errors(&self) -> Vec<ValidationError> {
        self.results
            .iter()
            .filter_map(|(field, result)| {
                result.message().map(|message| ValidationError {
                    field: field.clone(),
                    message: message.to_string(),
                })
            })
            .collect()
    }
}

/// Apply each field's validator to its value without short-circuiting.
pub fn validate_all(schema: &FormSchema, values: &FormValues) -> ValidationReport {
    let results = schema
        .fields
        .iter()
        .map(|spec| (spec.name.clone(), spec.validate(values.get(&spec.name))))
        .collect();
    ValidationReport { results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::field::{FieldValue, SelectOption};

    fn contact_schema() -> FormSchema {
        FormSchema::builder("contact", "Contact")
            .section("Personal Information")
            .field(FieldSpec::text("name", "Full Name").min_length(3, "Name must be at least 3 characters"))
            .field(FieldSpec::email("email", "Email"))
            .section("Reachability")
            .field(FieldSpec::phone("phone", "Phone Number"))
            .build()
            .unwrap()
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = define_schema(
            "dup",
            vec![FieldSpec::text("name", "Name"), FieldSpec::email("name", "Email")],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateField {
                form: "dup".into(),
                field: "name".into()
            }
        );
    }

    #[test]
    fn choice_fields_need_options() {
        let err = define_schema("doctor", vec![FieldSpec::select("physician", "Physician")]).unwrap_err();
        assert!(matches!(err, SchemaError::MissingOptions { ref field, .. } if field == "physician"));

        let ok = define_schema(
            "doctor",
            vec![FieldSpec::select("physician", "Physician")
                .options(vec![SelectOption::new("Dr. Lee", "dr-lee")])],
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn empty_schema_is_rejected() {
        assert!(matches!(
            define_schema("empty", vec![]),
            Err(SchemaError::Empty { .. })
        ));
    }

    #[test]
    fn sections_keep_declaration_order() {
        let schema = contact_schema();
        let titles: Vec<_> = schema.sections().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Personal Information", "Reachability"]);
        assert_eq!(schema.sections()[0].fields, ["name", "email"]);
        let names: Vec<_> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["name", "email", "phone"]);
    }

    #[test]
    fn short_name_scenario() {
        let schema = contact_schema();
        let values = FormValues::new()
            .with("name", text("Jo"))
            .with("email", text("jo@example.com"))
            .with("phone", text("081234567890"));

        let report = schema.validate_all(&values);
        assert!(!report.is_valid());
        assert!(!report.get("name").unwrap().is_valid());
        assert!(report.get("email").unwrap().is_valid());
        assert!(report.get("phone").unwrap().is_valid());
        assert_eq!(report.errors().len(), 1);
    }

    #[test]
    fn reports_every_failure_at_once() {
        let schema = contact_schema();
        let values = FormValues::new().with("email", text("not-an-email"));

        let report = schema.validate_all(&values);
        let failing: Vec<_> = report.errors().into_iter().map(|e| e.field).collect();
        assert_eq!(failing, ["name", "email", "phone"]);
    }

    #[test]
    fn aggregate_is_conjunction_of_fields() {
        let schema = contact_schema();
        let names = ["Jo", "Jordan Lee"];
        let emails = ["jordan@example.com", "jordan@"];
        let phones = ["+6281234567890", "12345"];
        for name in names {
            for email in emails {
                for phone in phones {
                    let values = FormValues::new()
                        .with("name", text(name))
                        .with("email", text(email))
                        .with("phone", text(phone));
                    let report = schema.validate_all(&values);
                    let each = schema
                        .fields()
                        .iter()
                        .all(|f| f.validate(values.get(&f.name)).is_valid());
                    assert_eq!(report.is_valid(), each);
                }
            }
        }
    }

    #[test]
    fn unknown_fields_are_listed() {
        let schema = contact_schema();
        let values = FormValues::new()
            .with("name", text("Jordan"))
            .with("nickname", text("JJ"));
        assert_eq!(schema.unknown_fields(&values), ["nickname"]);
    }
}
