use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::Session;
use crate::store::NewUser;
use crate::AppState;

use super::{AppError, BearerToken};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// ─── POST /api/auth ──────────────────────────────────────────────

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Session>, AppError> {
    if req.name.is_empty() || req.email.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "name, email, and password are required".into(),
        ));
    }

    // self-registration never grants elevated roles
    let session = state
        .authority
        .register(NewUser {
            name: req.name,
            email: req.email,
            password: req.password,
            roles: Vec::new(),
        })
        .await?;
    Ok(Json(session))
}

// ─── PUT /api/auth ───────────────────────────────────────────────

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Session>, AppError> {
    let session = state.authority.login(&req.email, &req.password).await?;
    Ok(Json(session))
}

// ─── DELETE /api/auth ────────────────────────────────────────────

pub async fn logout(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Result<Json<Value>, AppError> {
    state.authority.logout(&token)?;
    Ok(Json(json!({ "message": "logout successful" })))
}
