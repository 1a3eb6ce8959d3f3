use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::middleware::auth::issue_token;
use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::user::{Role, User};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn auth_response(user: User, token: String) -> AuthResponse {
    AuthResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
        token,
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    if req.name.trim().is_empty() {
        return Err(AppError::InvalidRequest("name is required".into()));
    }
    if !req.email.contains('@') {
        return Err(AppError::InvalidRequest("invalid email".into()));
    }
    if req.password.len() < 6 {
        return Err(AppError::InvalidRequest(
            "password must be at least 6 characters".into(),
        ));
    }

    if User::find_by_email(&state.pool, &req.email).await?.is_some() {
        return Err(AppError::Conflict(
            "a user with this email already exists".into(),
        ));
    }

    // bcrypt is deliberately slow; keep it off the runtime threads.
    let password = req.password;
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Internal(e.into()))?;

    let user = User::create(&state.pool, &req.name, &req.email, &hash, req.role).await?;
    let token = issue_token(user.id, user.role, state.config.jwt_secret.expose_secret())
        .map_err(|e| AppError::Internal(e.into()))?;

    tracing::info!(user_id = %user.id, role = %user.role, "user registered");

    Ok((StatusCode::CREATED, Json(auth_response(user, token))))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    // A missing user and a bad password answer identically.
    let user = User::find_by_email(&state.pool, &req.email)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let (password, stored) = (req.password, user.password.clone());
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &stored))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Internal(e.into()))?;
    if !valid {
        return Err(AppError::Unauthenticated);
    }

    let token = issue_token(user.id, user.role, state.config.jwt_secret.expose_secret())
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Json(auth_response(user, token)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
}
