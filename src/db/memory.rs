//! Process-local store with the same contract as the Postgres one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{still_has_children, Store};
use crate::errors::AppError;
use crate::models::{FieldValue, Page, Row, SelectOption, User, Values};
use crate::schema::table::{self, ListPlan, Predicate};
use crate::schema::{FieldKind, ResourceSchema};

#[derive(Debug, Clone)]
struct Stored {
    values: Values,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    records: BTreeMap<i64, Stored>,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, Table>,
    users: Vec<User>,
}

impl State {
    fn record(&self, table: &str, id: i64) -> Option<&Stored> {
        self.tables.get(table).and_then(|t| t.records.get(&id))
    }

    fn row(&self, schema: &ResourceSchema, id: i64, stored: &Stored) -> Row {
        let mut related = Values::new();
        for field in &schema.fields {
            let (FieldKind::BelongsTo { table, title }, Some(key)) =
                (&field.kind, field.relation_key())
            else {
                continue;
            };
            let name = stored
                .values
                .get(field.name)
                .and_then(FieldValue::as_id)
                .and_then(|parent| self.record(table, parent))
                .and_then(|parent| parent.values.get(*title).cloned())
                .unwrap_or(FieldValue::Null);
            related.insert(key, name);
        }
        for relation in &schema.has_many {
            let children = self.children(relation.resource, relation.foreign_key, &[id]);
            related.insert(relation.count_key(), FieldValue::Integer(children as i64));
        }
        Row {
            id,
            values: stored.values.clone(),
            related,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }

    fn rows(&self, schema: &ResourceSchema) -> Vec<Row> {
        self.tables
            .get(schema.table)
            .map(|t| t.records.iter().map(|(id, stored)| self.row(schema, *id, stored)).collect())
            .unwrap_or_default()
    }

    fn children(&self, table: &str, foreign_key: &str, parents: &[i64]) -> usize {
        self.tables.get(table).map_or(0, |t| {
            t.records
                .values()
                .filter(|child| {
                    child
                        .values
                        .get(foreign_key)
                        .and_then(FieldValue::as_id)
                        .map_or(false, |parent| parents.contains(&parent))
                })
                .count()
        })
    }

    /// Foreign keys must point at existing rows, as the database constraints enforce.
    fn check_references(&self, schema: &ResourceSchema, values: &Values) -> Result<(), AppError> {
        for field in &schema.fields {
            let FieldKind::BelongsTo { table, .. } = field.kind else {
                continue;
            };
            if let Some(id) = values.get(field.name).and_then(FieldValue::as_id) {
                if self.record(table, id).is_none() {
                    return Err(AppError::Conflict(format!(
                        "The selected {} does not exist",
                        field.label.to_lowercase()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::InternalServerError("Store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list(&self, schema: &ResourceSchema, plan: &ListPlan) -> Result<Page, AppError> {
        let state = self.lock()?;
        Ok(table::apply(state.rows(schema), plan))
    }

    async fn count(
        &self,
        schema: &ResourceSchema,
        predicates: &[Predicate],
    ) -> Result<u64, AppError> {
        let state = self.lock()?;
        let matching = state
            .rows(schema)
            .iter()
            .filter(|row| predicates.iter().all(|predicate| predicate.matches(row)))
            .count();
        Ok(matching as u64)
    }

    async fn find(&self, schema: &ResourceSchema, id: i64) -> Result<Option<Row>, AppError> {
        let state = self.lock()?;
        Ok(state.record(schema.table, id).map(|stored| state.row(schema, id, stored)))
    }

    async fn insert(&self, schema: &ResourceSchema, values: &Values) -> Result<Row, AppError> {
        let mut state = self.lock()?;
        state.check_references(schema, values)?;

        let now = Utc::now();
        let stored = Stored { values: values.clone(), created_at: now, updated_at: now };
        let table = state.tables.entry(schema.table.to_string()).or_default();
        table.next_id += 1;
        let id = table.next_id;
        table.records.insert(id, stored.clone());

        Ok(state.row(schema, id, &stored))
    }

    async fn update(
        &self,
        schema: &ResourceSchema,
        id: i64,
        values: &Values,
    ) -> Result<Option<Row>, AppError> {
        let mut state = self.lock()?;
        if state.record(schema.table, id).is_none() {
            return Ok(None);
        }
        state.check_references(schema, values)?;

        let Some(stored) = state
            .tables
            .get_mut(schema.table)
            .and_then(|table| table.records.get_mut(&id))
        else {
            return Ok(None);
        };
        stored.values = values.clone();
        stored.updated_at = Utc::now();
        let stored = stored.clone();

        Ok(Some(state.row(schema, id, &stored)))
    }

    async fn delete(&self, schema: &ResourceSchema, ids: &[i64]) -> Result<u64, AppError> {
        let mut state = self.lock()?;
        for relation in &schema.has_many {
            if state.children(relation.resource, relation.foreign_key, ids) > 0 {
                return Err(still_has_children(schema, relation.name));
            }
        }

        let Some(table) = state.tables.get_mut(schema.table) else {
            return Ok(0);
        };
        let removed = ids.iter().filter(|id| table.records.remove(id).is_some()).count();
        Ok(removed as u64)
    }

    async fn options(
        &self,
        table: &str,
        title: &str,
        parent: Option<(&str, i64)>,
    ) -> Result<Vec<SelectOption>, AppError> {
        let state = self.lock()?;
        let Some(table) = state.tables.get(table) else {
            return Ok(Vec::new());
        };
        let mut options: Vec<SelectOption> = table
            .records
            .iter()
            .filter(|(_, stored)| match parent {
                Some((column, parent_id)) => {
                    stored.values.get(column).and_then(FieldValue::as_id) == Some(parent_id)
                }
                None => true,
            })
            .map(|(id, stored)| SelectOption {
                id: *id,
                label: stored.values.get(title).map(FieldValue::display).unwrap_or_default(),
            })
            .collect();
        options.sort_by(|a, b| a.label.cmp(&b.label).then(a.id.cmp(&b.id)));
        Ok(options)
    }

    async fn matches(
        &self,
        table: &str,
        id: i64,
        parent: Option<(&str, i64)>,
    ) -> Result<bool, AppError> {
        let state = self.lock()?;
        let Some(stored) = state.record(table, id) else {
            return Ok(false);
        };
        Ok(match parent {
            Some((column, parent_id)) => {
                stored.values.get(column).and_then(FieldValue::as_id) == Some(parent_id)
            }
            None => true,
        })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.lock()?;
        Ok(state
            .users
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut state = self.lock()?;
        if state.users.iter().any(|existing| existing.email.eq_ignore_ascii_case(&user.email)) {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }
        state.users.push(user.clone());
        Ok(())
    }
}
