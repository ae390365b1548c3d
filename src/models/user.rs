use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::Utc;

/// Admin panel account. `password` holds the argon2 PHC string, never the plain text.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}
