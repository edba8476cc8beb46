use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::auth::Capability;
use crate::factory::FactoryError;
use crate::metrics::LatencyKind;
use crate::store::{MenuItem, NewMenuItem, NewOrder, Order, UserId};
use crate::AppState;

use super::{AppError, BearerToken};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DinerOrders {
    pub diner_id: UserId,
    pub orders: Vec<Order>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order: Order,
    pub jwt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
}

// ─── GET /api/order/menu ─────────────────────────────────────────

pub async fn get_menu(State(state): State<Arc<AppState>>) -> Result<Json<Vec<MenuItem>>, AppError> {
    Ok(Json(state.store.menu().await?))
}

// ─── PUT /api/order/menu ─────────────────────────────────────────

pub async fn add_menu_item(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    Json(item): Json<NewMenuItem>,
) -> Result<Json<Vec<MenuItem>>, AppError> {
    state.authority.authorize(&token, &Capability::Admin)?;
    Ok(Json(state.store.add_menu_item(item).await?))
}

// ─── GET /api/order ──────────────────────────────────────────────

pub async fn get_orders(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Result<Json<DinerOrders>, AppError> {
    let diner = state.authority.authorize(&token, &Capability::Authenticated)?;
    let orders = state.store.orders(diner.user_id).await?;
    Ok(Json(DinerOrders {
        diner_id: diner.user_id,
        orders,
    }))
}

// ─── POST /api/order ─────────────────────────────────────────────

/// Record the order, then have the factory make it. Factory latency is
/// recorded either way; sales and revenue only on success.
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    Json(req): Json<NewOrder>,
) -> Result<Json<PlacedOrder>, AppError> {
    let diner = state.authority.authorize(&token, &Capability::Authenticated)?;
    if req.items.is_empty() {
        return Err(AppError::BadRequest("order must contain at least one item".into()));
    }

    let order = state.store.add_order(diner.user_id, req).await?;

    let t_factory = Instant::now();
    let result = state.factory.make_pizzas(&diner, &order).await;
    state
        .counters
        .record_latency(LatencyKind::Factory, t_factory.elapsed().as_millis() as u64);

    match result {
        Ok(receipt) => {
            state.counters.add_pizzas_sold(order.items.len() as u64);
            state.counters.add_revenue(order.total_price());
            info!(order_id = order.id, pizzas = order.items.len(), "order fulfilled");
            Ok(Json(PlacedOrder {
                order,
                jwt: receipt.jwt,
                report_url: receipt.report_url,
            }))
        }
        Err(e) => {
            state.counters.add_creation_failure();
            warn!(order_id = order.id, error = %e, "factory failed order");
            let report_url = match e {
                FactoryError::Rejected { report_url, .. } => report_url,
                FactoryError::Transport(_) => None,
            };
            Err(AppError::Factory { report_url })
        }
    }
}
