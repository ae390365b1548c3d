use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Admin user id
    pub exp: usize,
}

pub fn generate_token(user_id: &str, secret: &str, ttl_days: i64) -> Result<String, AppError> {
    let expiration = chrono::Duration::try_days(ttl_days)
        .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| AppError::InternalServerError("Invalid token lifetime".to_string()))?
        .timestamp() as usize;

    let claims = Claims { sub: user_id.to_string(), exp: expiration };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|_| AppError::InternalServerError("Token generation error".to_string()))
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(jsonwebtoken::Algorithm::HS256),
    )
    .map(|data| data.claims)
}

/// Claims of the signed-in admin. Extracting it rejects requests without a
/// valid `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct AdminClaims(pub Claims);

impl FromRequest for AdminClaims {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AdminClaims, AppError> {
    let config = req
        .app_data::<web::Data<Config>>()
        .ok_or_else(|| AppError::InternalServerError("Configuration missing".to_string()))?;

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|auth| auth.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing token".to_string()))?;

    validate_token(token, &config.jwt_secret).map(AdminClaims).map_err(|err| {
        debug!("Rejected token: {}", err);
        AppError::Unauthorized("Invalid token".to_string())
    })
}
