use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::error::AppError;
use crate::models::user::Role;
use crate::services::Caller;

const TOKEN_LIFETIME_HOURS: i64 = 72;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(
    user_id: Uuid,
    role: Role,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

fn caller_from_token(token: &str, secret: &str) -> Result<Caller, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthenticated)?;

    let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::Unauthenticated)?;
    // An unknown role claim degrades to the least-privileged one.
    let role = data.claims.role.parse().unwrap_or(Role::User);

    Ok(Caller::new(Some(user_id), role))
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Requires a valid bearer token and stores the resulting [`Caller`] in the
/// request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or(AppError::Unauthenticated)?;
    let caller = caller_from_token(token, state.config.jwt_secret.expose_secret())?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Like [`require_auth`] but tolerates missing credentials: anonymous
/// requests proceed with an empty caller. Used on the hold path, where an
/// identity is optional.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let caller = match bearer_token(&request) {
        Some(token) => caller_from_token(token, state.config.jwt_secret.expose_secret())?,
        None => Caller::new(None, Role::User),
    };
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Requires that [`require_auth`] ran earlier and produced an admin caller.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let caller = request
        .extensions()
        .get::<Caller>()
        .copied()
        .ok_or(AppError::Unauthenticated)?;
    if !caller.is_admin() {
        return Err(AppError::Forbidden("admin only".into()));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_to_caller() {
        let uid = Uuid::new_v4();
        let token = issue_token(uid, Role::Admin, "test-secret").unwrap();
        let caller = caller_from_token(&token, "test-secret").unwrap();
        assert_eq!(caller.user_id, Some(uid));
        assert_eq!(caller.role, Role::Admin);
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let token = issue_token(Uuid::new_v4(), Role::User, "secret-a").unwrap();
        assert!(matches!(
            caller_from_token(&token, "secret-b"),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(matches!(
            caller_from_token("not-a-jwt", "secret"),
            Err(AppError::Unauthenticated)
        ));
    }
}
