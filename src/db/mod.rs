pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use log::info;
use std::sync::Arc;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{Page, Row, SelectOption, User, Values};
use crate::schema::table::{ListPlan, Predicate};
use crate::schema::ResourceSchema;

/// Persistence for every resource. Queries are driven by the resource schema.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list(&self, schema: &ResourceSchema, plan: &ListPlan) -> Result<Page, AppError>;

    async fn count(
        &self,
        schema: &ResourceSchema,
        predicates: &[Predicate],
    ) -> Result<u64, AppError>;

    async fn find(&self, schema: &ResourceSchema, id: i64) -> Result<Option<Row>, AppError>;

    async fn insert(&self, schema: &ResourceSchema, values: &Values) -> Result<Row, AppError>;

    /// `Ok(None)` when the record does not exist.
    async fn update(
        &self,
        schema: &ResourceSchema,
        id: i64,
        values: &Values,
    ) -> Result<Option<Row>, AppError>;

    /// Deletes the given ids and returns how many existed. Refuses with a
    /// conflict while any of them still has children.
    async fn delete(&self, schema: &ResourceSchema, ids: &[i64]) -> Result<u64, AppError>;

    /// `(id, title)` pairs of `table` ordered by title, optionally narrowed
    /// to `column = parent_id`.
    async fn options(
        &self,
        table: &str,
        title: &str,
        parent: Option<(&str, i64)>,
    ) -> Result<Vec<SelectOption>, AppError>;

    /// Whether row `id` exists in `table` (and has `column = parent_id` when given).
    async fn matches(
        &self,
        table: &str,
        id: i64,
        parent: Option<(&str, i64)>,
    ) -> Result<bool, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn insert_user(&self, user: &User) -> Result<(), AppError>;
}

pub async fn create_store(config: &Config) -> Result<Arc<dyn Store>, AppError> {
    if config.database_url.starts_with("memory:") {
        info!("Using the in-memory store; data is lost on shutdown");
        return Ok(Arc::new(memory::MemoryStore::new()));
    }
    let store = postgres::PgStore::connect(&config.database_url, config.max_connections).await?;
    Ok(Arc::new(store))
}

/// Conflict raised when a parent still has children.
pub(crate) fn still_has_children(schema: &ResourceSchema, relation: &str) -> AppError {
    AppError::Conflict(format!("{} still contains {}", schema.navigation.label, relation))
}
