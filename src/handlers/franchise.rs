use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::{Capability, Principal};
use crate::store::{Franchise, FranchiseId, FranchiseStore, StoreId, UserId};
use crate::AppState;

use super::{AppError, BearerToken};

#[derive(Debug, Deserialize)]
pub struct CreateFranchiseRequest {
    pub name: String,
    #[serde(default)]
    pub admins: Vec<AdminRef>,
}

#[derive(Debug, Deserialize)]
pub struct AdminRef {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    pub name: String,
}

/// Admin, franchisee of `franchise_id`, or one of its listed admins.
async fn authorize_manage(
    state: &AppState,
    token: &str,
    franchise_id: FranchiseId,
) -> Result<Principal, AppError> {
    // bad tokens are rejected before the franchise lookup
    state.authority.authorize(token, &Capability::Authenticated)?;

    let franchise = state.store.franchise(franchise_id).await?;
    let cap = Capability::ManageFranchise {
        franchise_id,
        admin_emails: franchise.admin_emails(),
    };
    Ok(state.authority.authorize(token, &cap)?)
}

// ─── GET /api/franchise ──────────────────────────────────────────

pub async fn list_franchises(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Franchise>>, AppError> {
    Ok(Json(state.store.franchises().await?))
}

// ─── GET /api/franchise/:id  (id = user id) ─────────────────────

pub async fn user_franchises(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<Franchise>>, AppError> {
    state
        .authority
        .authorize(&token, &Capability::SelfOrAdmin(user_id))?;
    Ok(Json(state.store.user_franchises(user_id).await?))
}

// ─── POST /api/franchise ─────────────────────────────────────────

pub async fn create_franchise(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    Json(req): Json<CreateFranchiseRequest>,
) -> Result<Json<Franchise>, AppError> {
    state.authority.authorize(&token, &Capability::Admin)?;

    let emails = req.admins.into_iter().map(|a| a.email).collect();
    Ok(Json(state.store.create_franchise(req.name, emails).await?))
}

// ─── DELETE /api/franchise/:id ───────────────────────────────────

pub async fn delete_franchise(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    Path(franchise_id): Path<FranchiseId>,
) -> Result<Json<Value>, AppError> {
    state.authority.authorize(&token, &Capability::Admin)?;
    state.store.delete_franchise(franchise_id).await?;
    Ok(Json(json!({ "message": "franchise deleted" })))
}

// ─── POST /api/franchise/:id/store ───────────────────────────────

pub async fn create_store(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    Path(franchise_id): Path<FranchiseId>,
    Json(req): Json<CreateStoreRequest>,
) -> Result<Json<FranchiseStore>, AppError> {
    authorize_manage(&state, &token, franchise_id).await?;
    Ok(Json(state.store.create_store(franchise_id, req.name).await?))
}

// ─── DELETE /api/franchise/:id/store/:store_id ───────────────────

pub async fn delete_store(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    Path((franchise_id, store_id)): Path<(FranchiseId, StoreId)>,
) -> Result<Json<Value>, AppError> {
    authorize_manage(&state, &token, franchise_id).await?;
    state.store.delete_store(franchise_id, store_id).await?;
    Ok(Json(json!({ "message": "store deleted" })))
}
