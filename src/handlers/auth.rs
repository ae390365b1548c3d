use actix_web::{web, HttpResponse};
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::db::Store;
use crate::errors::AppError;
use crate::models::User;
use crate::utils::jwt::generate_token;
use crate::utils::validation::validate_payload;

#[derive(Deserialize, Validate)]
pub struct AuthRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 8, max = 32))]
    password: String,
    #[validate(custom = "validate_action")]
    action: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    email: String,
    token: String,
}

fn validate_action(action: &str) -> Result<(), validator::ValidationError> {
    if action != "create" && action != "login" {
        return Err(validator::ValidationError::new("Invalid action"));
    }
    Ok(())
}

/// Registers an admin (`action: create`) or logs one in (`action: login`).
pub async fn auth_handler(
    req: web::Json<AuthRequest>,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&req.0)?;

    match req.action.as_str() {
        "create" => {
            if store.find_user_by_email(&req.email).await?.is_some() {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }

            let salt = SaltString::generate(&mut rand::thread_rng());
            let password_hash = Argon2::default()
                .hash_password(req.password.as_bytes(), &salt)
                .map_err(|_| AppError::InternalServerError("Hashing error".to_string()))?
                .to_string();

            let now = Utc::now();
            let user = User {
                user_id: Uuid::new_v4(),
                email: req.email.clone(),
                password: password_hash,
                created_at: now,
                updated_at: now,
            };
            store.insert_user(&user).await?;
            info!("Admin account created for {}", user.email);

            let token = generate_token(
                &user.user_id.to_string(),
                &config.jwt_secret,
                config.token_ttl_days,
            )?;
            Ok(HttpResponse::Created().json(AuthResponse { email: user.email, token }))
        }
        _ => {
            let user = store
                .find_user_by_email(&req.email)
                .await?
                .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

            let parsed_hash = PasswordHash::new(&user.password)
                .map_err(|_| AppError::InternalServerError("Invalid password hash".to_string()))?;
            Argon2::default()
                .verify_password(req.password.as_bytes(), &parsed_hash)
                .map_err(|_| AppError::Unauthorized("Invalid password".to_string()))?;

            let token = generate_token(
                &user.user_id.to_string(),
                &config.jwt_secret,
                config.token_ttl_days,
            )?;
            Ok(HttpResponse::Ok().json(AuthResponse { email: user.email, token }))
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, web, App};
    use serde_json::{json, Value};
    use std::sync::Arc;

    use crate::config::Config;
    use crate::db::memory::MemoryStore;
    use crate::db::Store;

    fn config() -> Config {
        Config {
            database_url: "memory://".to_string(),
            jwt_secret: "test-secret".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            default_page_size: 10,
            token_ttl_days: 1,
            max_connections: 1,
        }
    }

    macro_rules! post_auth {
        ($app:expr, $payload:expr) => {
            test::call_service(
                &$app,
                test::TestRequest::post().uri("/v1/auth").set_json($payload).to_request(),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn register_then_login_issues_working_tokens() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::from(store))
                .app_data(web::Data::new(crate::resources::registry()))
                .app_data(web::Data::new(config()))
                .configure(crate::handlers::configure),
        )
        .await;

        let credentials =
            json!({"email": "admin@example.com", "password": "secret-pass", "action": "create"});
        let resp = post_auth!(app, &credentials);
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = post_auth!(app, &credentials);
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let login =
            json!({"email": "ADMIN@example.com", "password": "secret-pass", "action": "login"});
        let resp = post_auth!(app, &login);
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        let token = body["token"].as_str().unwrap().to_string();

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/v1/navigation")
                .insert_header(("Authorization", format!("Bearer {}", token)))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let wrong =
            json!({"email": "admin@example.com", "password": "wrong-pass", "action": "login"});
        let resp = post_auth!(app, &wrong);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn invalid_actions_are_rejected() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::from(store))
                .app_data(web::Data::new(config()))
                .configure(crate::handlers::configure),
        )
        .await;

        let payload =
            json!({"email": "admin@example.com", "password": "secret-pass", "action": "delete"});
        let resp = post_auth!(app, &payload);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
