//! Postgres store. Every statement is assembled from the resource schema with
//! [`QueryBuilder`]; identifiers come from the static schema and all values are bound.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row as _};

use super::{still_has_children, Store};
use crate::errors::AppError;
use crate::models::{FieldValue, Page, Row, SelectOption, User, Values};
use crate::schema::table::{ListPlan, Predicate};
use crate::schema::{Field, FieldKind, ResourceSchema, SortDirection};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            error!("Migration failed: {}", e);
            AppError::InternalServerError("Failed to run migrations".to_string())
        })?;
        info!("Database migrations applied");

        Ok(PgStore { pool })
    }
}

/// SQL expression producing the cell `key` of a row aliased `t`.
fn expression(schema: &ResourceSchema, key: &str) -> Result<String, AppError> {
    if matches!(key, "id" | "created_at" | "updated_at") {
        return Ok(format!("t.{}", key));
    }
    for field in &schema.fields {
        if field.name == key {
            return Ok(format!("t.{}", field.name));
        }
        let FieldKind::BelongsTo { table, title } = &field.kind else {
            continue;
        };
        if field.relation_key().as_deref() == Some(key) {
            return Ok(format!(
                "(SELECT r.{} FROM {} r WHERE r.id = t.{})",
                title, table, field.name
            ));
        }
    }
    for relation in &schema.has_many {
        if relation.count_key() == key {
            return Ok(format!(
                "(SELECT COUNT(*) FROM {} c WHERE c.{} = t.id)",
                relation.resource, relation.foreign_key
            ));
        }
    }
    Err(AppError::InternalServerError(format!("No column for '{}'", key)))
}

/// Calendar date of the cell `key`. Timestamps are read in UTC, like
/// [`FieldValue::as_date`].
fn date_expression(schema: &ResourceSchema, key: &str) -> Result<String, AppError> {
    let expression = expression(schema, key)?;
    Ok(if matches!(key, "created_at" | "updated_at") {
        format!("CAST(({} AT TIME ZONE 'UTC') AS DATE)", expression)
    } else {
        format!("CAST({} AS DATE)", expression)
    })
}

fn select_list(schema: &ResourceSchema) -> Result<String, AppError> {
    let mut columns: Vec<String> =
        ["t.id", "t.created_at", "t.updated_at"].iter().map(|c| c.to_string()).collect();
    for field in &schema.fields {
        columns.push(format!("t.{}", field.name));
    }
    for key in schema.fields.iter().filter_map(Field::relation_key) {
        columns.push(format!("{} AS \"{}\"", expression(schema, &key)?, key));
    }
    for relation in &schema.has_many {
        let key = relation.count_key();
        columns.push(format!("{} AS \"{}\"", expression(schema, &key)?, key));
    }
    Ok(format!("SELECT {} FROM {} t", columns.join(", "), schema.table))
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_predicates(
    builder: &mut QueryBuilder<'_, Postgres>,
    schema: &ResourceSchema,
    predicates: &[Predicate],
) -> Result<(), AppError> {
    for (i, predicate) in predicates.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        match predicate {
            Predicate::Contains { keys, needle } => {
                builder.push("(");
                for (j, key) in keys.iter().enumerate() {
                    if j > 0 {
                        builder.push(" OR ");
                    }
                    builder.push(format!("CAST({} AS TEXT) ILIKE ", expression(schema, key)?));
                    builder.push_bind(escape_like(needle));
                }
                builder.push(")");
            }
            Predicate::Equals { key, id } => {
                builder.push(format!("{} = ", expression(schema, key)?));
                builder.push_bind(*id);
            }
            Predicate::OnOrAfter { key, date } => {
                builder.push(format!("{} >= ", date_expression(schema, key)?));
                builder.push_bind(*date);
            }
            Predicate::OnOrBefore { key, date } => {
                builder.push(format!("{} <= ", date_expression(schema, key)?));
                builder.push_bind(*date);
            }
        }
    }
    Ok(())
}

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, field: &Field, value: Option<&FieldValue>) {
    match (value, &field.kind) {
        (Some(FieldValue::Integer(number)), _) => builder.push_bind(*number),
        (Some(FieldValue::Text(text)), _) => builder.push_bind(text.clone()),
        (Some(FieldValue::Date(date)), _) => builder.push_bind(*date),
        (Some(FieldValue::Timestamp(at)), _) => builder.push_bind(*at),
        (_, FieldKind::Text { .. }) => builder.push_bind(None::<String>),
        (_, FieldKind::Date) => builder.push_bind(None::<NaiveDate>),
        (_, FieldKind::Integer { .. } | FieldKind::BelongsTo { .. }) => {
            builder.push_bind(None::<i64>)
        }
    };
}

fn decode(schema: &ResourceSchema, row: &PgRow) -> Result<Row, sqlx::Error> {
    let mut values = Values::new();
    for field in &schema.fields {
        let value = match field.kind {
            FieldKind::Text { .. } => {
                row.try_get::<Option<String>, _>(field.name)?.map(FieldValue::Text)
            }
            FieldKind::Date => {
                row.try_get::<Option<NaiveDate>, _>(field.name)?.map(FieldValue::Date)
            }
            FieldKind::Integer { .. } | FieldKind::BelongsTo { .. } => {
                row.try_get::<Option<i64>, _>(field.name)?.map(FieldValue::Integer)
            }
        };
        values.insert(field.name.to_string(), value.unwrap_or(FieldValue::Null));
    }

    let mut related = Values::new();
    for key in schema.fields.iter().filter_map(Field::relation_key) {
        let title = row.try_get::<Option<String>, _>(key.as_str())?;
        related.insert(key, title.map(FieldValue::Text).unwrap_or(FieldValue::Null));
    }
    for relation in &schema.has_many {
        let key = relation.count_key();
        let count = row.try_get::<i64, _>(key.as_str())?;
        related.insert(key, FieldValue::Integer(count));
    }

    Ok(Row {
        id: row.try_get("id")?,
        values,
        related,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn list(&self, schema: &ResourceSchema, plan: &ListPlan) -> Result<Page, AppError> {
        let total = self.count(schema, &plan.predicates).await?;

        let mut builder = QueryBuilder::new(select_list(schema)?);
        push_predicates(&mut builder, schema, &plan.predicates)?;
        match plan.sort {
            Some(sort) => {
                let direction = match sort.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                builder.push(format!(
                    " ORDER BY {} {} NULLS LAST, t.id ASC",
                    expression(schema, sort.key)?,
                    direction
                ));
            }
            None => {
                builder.push(" ORDER BY t.id ASC");
            }
        }
        builder.push(" LIMIT ");
        builder.push_bind(plan.limit as i64);
        builder.push(" OFFSET ");
        builder.push_bind(plan.offset as i64);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| decode(schema, row))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page { total, rows })
    }

    async fn count(
        &self,
        schema: &ResourceSchema,
        predicates: &[Predicate],
    ) -> Result<u64, AppError> {
        let mut builder = QueryBuilder::new(format!("SELECT COUNT(*) FROM {} t", schema.table));
        push_predicates(&mut builder, schema, predicates)?;
        let total: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }

    async fn find(&self, schema: &ResourceSchema, id: i64) -> Result<Option<Row>, AppError> {
        let mut builder = QueryBuilder::new(select_list(schema)?);
        builder.push(" WHERE t.id = ");
        builder.push_bind(id);
        let row = builder.build().fetch_optional(&self.pool).await?;
        Ok(row.map(|row| decode(schema, &row)).transpose()?)
    }

    async fn insert(&self, schema: &ResourceSchema, values: &Values) -> Result<Row, AppError> {
        let names: Vec<&str> = schema.fields.iter().map(|field| field.name).collect();
        let mut builder = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) VALUES (",
            schema.table,
            names.join(", ")
        ));
        for (i, field) in schema.fields.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            push_value(&mut builder, field, values.get(field.name));
        }
        builder.push(") RETURNING id");

        let id: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        self.find(schema, id)
            .await?
            .ok_or_else(|| AppError::InternalServerError("Inserted record vanished".to_string()))
    }

    async fn update(
        &self,
        schema: &ResourceSchema,
        id: i64,
        values: &Values,
    ) -> Result<Option<Row>, AppError> {
        let mut builder = QueryBuilder::new(format!("UPDATE {} SET ", schema.table));
        for field in &schema.fields {
            builder.push(format!("{} = ", field.name));
            push_value(&mut builder, field, values.get(field.name));
            builder.push(", ");
        }
        builder.push("updated_at = NOW() WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING id");

        let updated: Option<i64> = builder.build_query_scalar().fetch_optional(&self.pool).await?;
        match updated {
            Some(id) => self.find(schema, id).await,
            None => Ok(None),
        }
    }

    async fn delete(&self, schema: &ResourceSchema, ids: &[i64]) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        for relation in &schema.has_many {
            let children: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(*) FROM {} WHERE {} = ANY($1)",
                relation.resource, relation.foreign_key
            ))
            .bind(ids.to_vec())
            .fetch_one(&mut *tx)
            .await?;
            if children > 0 {
                return Err(still_has_children(schema, relation.name));
            }
        }

        let deleted = sqlx::query(&format!("DELETE FROM {} WHERE id = ANY($1)", schema.table))
            .bind(ids.to_vec())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        Ok(deleted)
    }

    async fn options(
        &self,
        table: &str,
        title: &str,
        parent: Option<(&str, i64)>,
    ) -> Result<Vec<SelectOption>, AppError> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT id, CAST({} AS TEXT) AS label FROM {}",
            title, table
        ));
        if let Some((column, parent_id)) = parent {
            builder.push(format!(" WHERE {} = ", column));
            builder.push_bind(parent_id);
        }
        builder.push(" ORDER BY label, id");
        Ok(builder.build_query_as::<SelectOption>().fetch_all(&self.pool).await?)
    }

    async fn matches(
        &self,
        table: &str,
        id: i64,
        parent: Option<(&str, i64)>,
    ) -> Result<bool, AppError> {
        let mut builder =
            QueryBuilder::new(format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ", table));
        builder.push_bind(id);
        if let Some((column, parent_id)) = parent {
            builder.push(format!(" AND {} = ", column));
            builder.push_bind(parent_id);
        }
        builder.push(")");
        Ok(builder.build_query_scalar::<bool>().fetch_one(&self.pool).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, email, password, created_at, updated_at \
             FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO users (user_id, email, password, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
