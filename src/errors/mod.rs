use actix_web::{HttpResponse, ResponseError};
use actix_web::http::StatusCode;
use log::error;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use validator::ValidationErrors;

use crate::schema::Notification;
use crate::utils::validation::error_messages;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Validation(ValidationErrors),
    NotFound(String),
    Unauthorized(String),
    Conflict(String),
    InternalServerError(String),
    DatabaseError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification: Option<Notification>,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::Validation(errors) => write!(f, "Validation failed: {}", errors),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Validation(errors) => ErrorResponse {
                error: "The given data was invalid".to_string(),
                errors: Some(error_messages(errors)),
                notification: None,
            },
            // Persistence failures are shown to the admin as a failure toast.
            AppError::Conflict(msg) => ErrorResponse {
                error: msg.clone(),
                errors: None,
                notification: Some(Notification::danger("Action failed").body(msg.clone())),
            },
            AppError::DatabaseError(_) => ErrorResponse {
                error: "Database error".to_string(),
                errors: None,
                notification: Some(
                    Notification::danger("Action failed")
                        .body("The database could not complete the request."),
                ),
            },
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::InternalServerError(msg) => ErrorResponse {
                error: msg.clone(),
                errors: None,
                notification: None,
            },
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::Conflict("The record is still referenced by other records".to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("A record with the same value already exists".to_string())
            }
            _ => {
                error!("Database error: {:?}", err);
                AppError::DatabaseError(err.to_string())
            }
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn validation_errors_render_field_messages() {
        let mut errors = ValidationErrors::new();
        let required = "The name field is required.".to_string();
        errors.add("name", crate::utils::validation::field_error("required", required));

        let response = AppError::Validation(errors).error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["errors"]["name"][0], "The name field is required.");
    }

    #[actix_web::test]
    async fn conflicts_carry_a_failure_notification() {
        let response = AppError::Conflict("Department still contains employees".to_string())
            .error_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["notification"]["status"], "danger");
        assert_eq!(json["notification"]["body"], "Department still contains employees");
    }
}
