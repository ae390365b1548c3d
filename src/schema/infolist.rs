use serde::Serialize;

use super::form::DATE_DISPLAY_FORMAT;
use super::table::chrono_format;
use super::ResourceSchema;
use crate::models::{FieldValue, Row};

const EMPTY: &str = "-";

#[derive(Debug, Serialize)]
pub struct InfolistView {
    pub resource: &'static str,
    pub id: i64,
    pub title: String,
    pub sections: Vec<InfoSectionView>,
    pub relations: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct InfoSectionView {
    pub title: &'static str,
    pub columns: u8,
    pub entries: Vec<EntryView>,
}

#[derive(Debug, Serialize)]
pub struct EntryView {
    pub key: &'static str,
    pub label: &'static str,
    pub value: String,
}

pub fn project(schema: &ResourceSchema, row: &Row) -> InfolistView {
    let sections = schema
        .infolist
        .iter()
        .map(|section| InfoSectionView {
            title: section.title,
            columns: section.columns,
            entries: section
                .entries
                .iter()
                .map(|entry| EntryView {
                    key: entry.key,
                    label: entry.label,
                    value: format_entry(&row.cell(entry.key)),
                })
                .collect(),
        })
        .collect();

    InfolistView {
        resource: schema.slug,
        id: row.id,
        title: schema.record_title(row),
        sections,
        relations: schema
            .has_many
            .iter()
            .filter(|relation| relation.managed)
            .map(|relation| relation.name)
            .collect(),
    }
}

fn format_entry(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => EMPTY.to_string(),
        FieldValue::Date(date) => date.format(&chrono_format(DATE_DISPLAY_FORMAT)).to_string(),
        FieldValue::Timestamp(at) => at.format(&chrono_format("d/m/Y H:i")).to_string(),
        other => other.display(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Values;
    use crate::resources;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn employee_detail_shows_relation_names_and_blanks() {
        let schema = resources::employee::schema();
        let mut values = Values::new();
        values.insert("first_name".to_string(), FieldValue::Text("Ada".to_string()));
        values.insert("last_name".to_string(), FieldValue::Text("Lovelace".to_string()));
        values.insert("middle_name".to_string(), FieldValue::Null);
        values.insert(
            "date_hired".to_string(),
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()),
        );
        let mut related = Values::new();
        related.insert("country.name".to_string(), FieldValue::Text("Turkey".to_string()));
        let now = Utc::now();
        let row = Row { id: 7, values, related, created_at: now, updated_at: now };

        let view = project(&schema, &row);
        assert_eq!(view.title, "Ada Lovelace");

        let entries: Vec<(&str, &str)> = view
            .sections
            .iter()
            .flat_map(|section| section.entries.iter())
            .map(|entry| (entry.label, entry.value.as_str()))
            .collect();
        assert!(entries.contains(&("Country Name", "Turkey")));
        assert!(entries.contains(&("State Name", "-")));
        assert!(entries.contains(&("Middle Name", "-")));
        assert!(entries.contains(&("Date Hired", "09/03/2024")));
    }

    #[test]
    fn state_detail_lists_its_relation_managers() {
        let schema = resources::state::schema();
        let now = Utc::now();
        let row = Row {
            id: 1,
            values: Values::new(),
            related: Values::new(),
            created_at: now,
            updated_at: now,
        };

        let view = project(&schema, &row);
        assert_eq!(view.relations, vec!["cities", "employees"]);
        assert_eq!(view.title, "State #1");
    }
}
