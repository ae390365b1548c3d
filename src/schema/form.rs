//! Form projection and server-side validation of submitted forms.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use validator::{ValidationError, ValidationErrors};

use super::{Field, FieldKind, ResourceSchema};
use crate::models::{FieldValue, Row, SelectOption, Values};
use crate::utils::validation::{error_messages, field_error};

/// Options per select field.
pub type Options = BTreeMap<&'static str, Vec<SelectOption>>;

pub const DATE_DISPLAY_FORMAT: &str = "d/m/Y";

#[derive(Debug, Serialize)]
pub struct FormView {
    pub resource: &'static str,
    pub sections: Vec<SectionView>,
}

#[derive(Debug, Serialize)]
pub struct SectionView {
    pub title: Option<&'static str>,
    pub description: Option<&'static str>,
    pub columns: u8,
    pub fields: Vec<FieldView>,
}

#[derive(Debug, Serialize)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub required: bool,
    #[serde(flatten)]
    pub widget: Widget,
    pub value: FieldValue,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum Widget {
    TextInput { max_length: usize, numeric: bool },
    DatePicker { display_format: &'static str },
    Select { searchable: bool, live: bool, options: Vec<SelectOption> },
}

pub fn project(
    schema: &ResourceSchema,
    values: &Values,
    options: &Options,
    errors: Option<&ValidationErrors>,
) -> FormView {
    let messages = errors.map(error_messages).unwrap_or_default();

    let field_view = |field: &Field| {
        let widget = match &field.kind {
            FieldKind::Text { max_length } => {
                Widget::TextInput { max_length: *max_length, numeric: false }
            }
            FieldKind::Integer { max_digits } => {
                Widget::TextInput { max_length: *max_digits, numeric: true }
            }
            FieldKind::Date => Widget::DatePicker { display_format: DATE_DISPLAY_FORMAT },
            FieldKind::BelongsTo { .. } => Widget::Select {
                searchable: true,
                live: !schema.dependents_of(field.name).is_empty() || field.depends_on.is_some(),
                options: options.get(field.name).cloned().unwrap_or_default(),
            },
        };
        FieldView {
            name: field.name,
            label: field.label,
            required: field.required,
            widget,
            value: values.get(field.name).cloned().unwrap_or(FieldValue::Null),
            errors: messages.get(field.name).cloned().unwrap_or_default(),
        }
    };

    let sections = if schema.form.is_empty() {
        vec![SectionView {
            title: None,
            description: None,
            columns: 1,
            fields: schema.fields.iter().map(&field_view).collect(),
        }]
    } else {
        schema
            .form
            .iter()
            .map(|section| SectionView {
                title: Some(section.title),
                description: section.description,
                columns: section.columns,
                fields: section
                    .fields
                    .iter()
                    .filter_map(|name| schema.field(name))
                    .map(&field_view)
                    .collect(),
            })
            .collect()
    };

    FormView { resource: schema.slug, sections }
}

/// Checks a submitted form against the schema and returns its typed values.
/// Keys the schema does not declare are dropped.
pub fn validate(
    schema: &ResourceSchema,
    payload: &Map<String, Value>,
) -> Result<Values, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut values = Values::new();

    for field in &schema.fields {
        match parse_field(field, payload.get(field.name)) {
            Ok(FieldValue::Null) if field.required => {
                errors.add(
                    field.name,
                    field_error("required", format!("The {} field is required.", attribute(field))),
                );
            }
            Ok(value) => {
                values.insert(field.name.to_string(), value);
            }
            Err(error) => errors.add(field.name, error),
        }
    }

    for key in payload.keys() {
        if schema.field(key).is_none() {
            log::debug!("Ignoring unknown field '{}' submitted to {}", key, schema.slug);
        }
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}

/// Parses one raw input. Missing, `null` and blank inputs become `Null`.
pub fn parse_field(field: &Field, raw: Option<&Value>) -> Result<FieldValue, ValidationError> {
    let raw = match raw {
        None | Some(Value::Null) => return Ok(FieldValue::Null),
        Some(Value::String(text)) if text.trim().is_empty() => return Ok(FieldValue::Null),
        Some(raw) => raw,
    };

    match &field.kind {
        FieldKind::Text { max_length } => {
            let text = match raw {
                Value::String(text) => text.trim().to_string(),
                Value::Number(number) => number.to_string(),
                _ => {
                    return Err(field_error(
                        "string",
                        format!("The {} field must be a string.", attribute(field)),
                    ))
                }
            };
            if text.chars().count() > *max_length {
                return Err(field_error(
                    "length",
                    format!(
                        "The {} field must not be greater than {} characters.",
                        attribute(field),
                        max_length
                    ),
                ));
            }
            Ok(FieldValue::Text(text))
        }
        FieldKind::Integer { max_digits } => {
            let number = as_integer(raw).ok_or_else(|| {
                field_error("numeric", format!("The {} field must be a number.", attribute(field)))
            })?;
            if number.unsigned_abs().to_string().len() > *max_digits {
                return Err(field_error(
                    "length",
                    format!(
                        "The {} field must not be greater than {} characters.",
                        attribute(field),
                        max_digits
                    ),
                ));
            }
            Ok(FieldValue::Integer(number))
        }
        FieldKind::Date => raw
            .as_str()
            .and_then(|text| NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok())
            .map(FieldValue::Date)
            .ok_or_else(|| {
                field_error("date", format!("The {} field must be a valid date.", attribute(field)))
            }),
        FieldKind::BelongsTo { .. } => as_integer(raw)
            .filter(|id| *id > 0)
            .map(FieldValue::Integer)
            .ok_or_else(|| {
                field_error("exists", format!("The selected {} is invalid.", attribute(field)))
            }),
    }
}

/// Overlays a partial update on top of the stored record, producing a full form payload.
pub fn merge(row: &Row, patch: &Map<String, Value>) -> Map<String, Value> {
    let mut merged: Map<String, Value> = row
        .values
        .iter()
        .map(|(key, value)| (key.clone(), serde_json::to_value(value).unwrap_or(Value::Null)))
        .collect();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

fn as_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => {
            let text = text.trim();
            let digits = text.strip_prefix('-').unwrap_or(text);
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                text.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

fn attribute(field: &Field) -> String {
    field.label.to_lowercase()
}
