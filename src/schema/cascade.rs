//! Dependent selects (country -> state -> city).
//!
//! The current selection is an explicit [`FormState`] handed in by the
//! caller; nothing here keeps state between requests.

use serde::Deserialize;
use serde_json::{Map, Value};
use validator::ValidationErrors;

use super::form::{parse_field, Options};
use super::{Field, FieldKind, ResourceSchema, UnsetParent};
use crate::db::Store;
use crate::errors::AppError;
use crate::models::{FieldValue, Values};
use crate::utils::validation::field_error;

/// Body of a live form update: the current values and the field the user just changed.
#[derive(Debug, Default, Deserialize)]
pub struct FormChange {
    #[serde(default)]
    pub values: Map<String, Value>,
    pub changed: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    pub values: Values,
}

impl FormState {
    pub fn new(values: Values) -> Self {
        FormState { values }
    }

    /// Reads a partially filled form. Required fields may be empty here.
    pub fn from_payload(
        schema: &ResourceSchema,
        payload: &Map<String, Value>,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut values = Values::new();
        for field in &schema.fields {
            match parse_field(field, payload.get(field.name)) {
                Ok(value) => {
                    values.insert(field.name.to_string(), value);
                }
                Err(error) => errors.add(field.name, error),
            }
        }
        if errors.is_empty() {
            Ok(FormState { values })
        } else {
            Err(errors)
        }
    }

    pub fn get(&self, name: &str) -> &FieldValue {
        self.values.get(name).unwrap_or(&FieldValue::Null)
    }
}

/// Which rows a select may offer given the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionScope {
    All,
    Nothing,
    Within { column: &'static str, parent_id: i64 },
}

/// Clears every field that depends on `changed`, returning the cleared names.
pub fn apply_change(
    schema: &ResourceSchema,
    state: &mut FormState,
    changed: &str,
) -> Vec<&'static str> {
    let dependents = schema.dependents_of(changed);
    for name in &dependents {
        state.values.insert(name.to_string(), FieldValue::Null);
    }
    dependents
}

pub fn option_scope(field: &Field, state: &FormState) -> OptionScope {
    match field.depends_on {
        None => OptionScope::All,
        Some(dependency) => match state.get(dependency.parent).as_id() {
            Some(parent_id) => OptionScope::Within { column: dependency.column, parent_id },
            None => match dependency.when_unset {
                UnsetParent::ShowAll => OptionScope::All,
                UnsetParent::ShowNone => OptionScope::Nothing,
            },
        },
    }
}

/// Options for every select of the form, ordered by name.
pub async fn resolve_options(
    store: &dyn Store,
    schema: &ResourceSchema,
    state: &FormState,
) -> Result<Options, AppError> {
    let mut options = Options::new();
    for field in &schema.fields {
        let FieldKind::BelongsTo { table, title } = field.kind else {
            continue;
        };
        let choices = match option_scope(field, state) {
            OptionScope::Nothing => Vec::new(),
            OptionScope::All => store.options(table, title, None).await?,
            OptionScope::Within { column, parent_id } => {
                store.options(table, title, Some((column, parent_id))).await?
            }
        };
        options.insert(field.name, choices);
    }
    Ok(options)
}

/// Server-side check of submitted keys: each must exist, and a dependent key
/// must belong to the selected parent.
pub async fn verify(
    store: &dyn Store,
    schema: &ResourceSchema,
    values: &Values,
) -> Result<(), AppError> {
    let mut errors = ValidationErrors::new();
    let state = FormState::new(values.clone());

    for field in &schema.fields {
        let FieldKind::BelongsTo { table, .. } = field.kind else {
            continue;
        };
        let Some(id) = state.get(field.name).as_id() else {
            continue;
        };

        let parent = field.depends_on.and_then(|dependency| {
            state.get(dependency.parent).as_id().map(|parent_id| (dependency, parent_id))
        });
        match parent {
            Some((dependency, parent_id)) => {
                if !store.matches(table, id, Some((dependency.column, parent_id))).await? {
                    let parent_label = schema
                        .field(dependency.parent)
                        .map(|parent| parent.label.to_lowercase())
                        .unwrap_or_else(|| dependency.parent.to_string());
                    errors.add(
                        field.name,
                        field_error(
                            "cascade",
                            format!(
                                "The selected {} does not belong to the selected {}.",
                                field.label.to_lowercase(),
                                parent_label
                            ),
                        ),
                    );
                }
            }
            None => {
                if !store.matches(table, id, None).await? {
                    errors.add(
                        field.name,
                        field_error(
                            "exists",
                            format!("The selected {} is invalid.", field.label.to_lowercase()),
                        ),
                    );
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}
