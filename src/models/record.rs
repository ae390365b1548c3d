use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A single typed cell. Belongs-to keys and counts are `Integer`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_id(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(id) => Some(*id),
            _ => None,
        }
    }

    /// Calendar date of a date or timestamp cell.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(date) => Some(*date),
            FieldValue::Timestamp(at) => Some(at.date_naive()),
            _ => None,
        }
    }

    /// Plain text form, used for searching and unformatted columns.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Integer(value) => value.to_string(),
            FieldValue::Text(value) => value.clone(),
            FieldValue::Date(date) => date.format("%Y-%m-%d").to_string(),
            FieldValue::Timestamp(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Ordering used by table sorting: nulls sort after every value.
    pub fn sort_cmp(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
            (FieldValue::Null, _) => Ordering::Greater,
            (_, FieldValue::Null) => Ordering::Less,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            (FieldValue::Date(a), FieldValue::Date(b)) => a.cmp(b),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => a.cmp(b),
            (a, b) => a.display().cmp(&b.display()),
        }
    }
}

pub type Values = BTreeMap<String, FieldValue>;

/// A persisted record plus the values derived from its relations
/// (`country.name`, `employees_count`, ...).
#[derive(Debug, Clone, Serialize)]
pub struct Row {
    pub id: i64,
    #[serde(flatten)]
    pub values: Values,
    #[serde(flatten)]
    pub related: Values,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Row {
    pub fn cell(&self, key: &str) -> FieldValue {
        match key {
            "id" => FieldValue::Integer(self.id),
            "created_at" => FieldValue::Timestamp(self.created_at),
            "updated_at" => FieldValue::Timestamp(self.updated_at),
            _ => self
                .values
                .get(key)
                .or_else(|| self.related.get(key))
                .cloned()
                .unwrap_or(FieldValue::Null),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SelectOption {
    pub id: i64,
    pub label: String,
}

/// One page of a list query along with the unpaginated match count.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub total: u64,
    pub rows: Vec<Row>,
}
