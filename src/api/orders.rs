use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::identity::Identity;
use crate::error::AppError;
use crate::ledger::{self, NewLineItem};
use crate::models::agent::{DeliveryAgent, GeoPoint};
use crate::models::order::{DeliveryAddress, Order, OrderStatus, PaymentStatus};
use crate::state::AppState;
use crate::tracking::{self, Role};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/status", post(advance_status))
        .route("/orders/:id/assign", post(assign_agent))
        .route("/orders/:id/rating", post(rate_order))
        .route("/orders/:id/payment", patch(set_payment_status))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub restaurant_id: Uuid,
    pub items: Vec<NewLineItem>,
    pub delivery_address: DeliveryAddress,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    if !matches!(identity.role, Role::Customer | Role::Admin) {
        return Err(AppError::Forbidden(
            "only customers can place orders".to_string(),
        ));
    }

    let order = ledger::create_order(
        &state,
        identity.user_id,
        payload.restaurant_id,
        &payload.items,
        payload.delivery_address,
    )?;

    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    identity: Identity,
) -> Result<Json<Order>, AppError> {
    tracking::authorize(&state, id, identity.user_id, identity.role)?;

    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?
        .clone();

    Ok(Json(order))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    identity: Identity,
) -> Result<Json<Order>, AppError> {
    let customer_id = {
        let order = state
            .orders
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
        order.customer_id
    };

    if identity.role != Role::Admin && customer_id != identity.user_id {
        return Err(AppError::Forbidden(
            "only the ordering customer can cancel".to_string(),
        ));
    }

    Ok(Json(ledger::cancel(&state, id)?))
}

#[derive(Deserialize)]
pub struct AdvanceStatusRequest {
    pub status: OrderStatus,
    pub location: Option<GeoPoint>,
    pub description: Option<String>,
}

async fn advance_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    identity: Identity,
    Json(payload): Json<AdvanceStatusRequest>,
) -> Result<Json<Order>, AppError> {
    require_manager(&state, id, &identity)?;

    if let Some(point) = &payload.location {
        if !point.in_bounds() {
            return Err(AppError::InvalidInput(
                "location coordinates out of range".to_string(),
            ));
        }
    }

    let order = ledger::advance_status(
        &state,
        id,
        payload.status,
        payload.location,
        payload.description,
    )?;

    Ok(Json(order))
}

#[derive(Serialize)]
pub struct AssignResponse {
    pub agent: Option<DeliveryAgent>,
}

async fn assign_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    identity: Identity,
) -> Result<Json<AssignResponse>, AppError> {
    let restaurant_id = {
        let order = state
            .orders
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
        order.restaurant_id
    };

    let owns_restaurant = state
        .restaurants
        .get(&restaurant_id)
        .is_some_and(|restaurant| restaurant.owner_id == identity.user_id);
    if identity.role != Role::Admin && !(identity.role == Role::Restaurant && owns_restaurant) {
        return Err(AppError::Forbidden(
            "only the restaurant or an admin can trigger assignment".to_string(),
        ));
    }

    let agent = ledger::ensure_assigned(&state, id)?;
    if agent.is_some() {
        ledger::optimize_route(&state, id)?;
    }

    Ok(Json(AssignResponse { agent }))
}

#[derive(Deserialize)]
pub struct RateOrderRequest {
    pub rating: u8,
    pub feedback: Option<String>,
}

async fn rate_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    identity: Identity,
    Json(payload): Json<RateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let customer_id = {
        let order = state
            .orders
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
        order.customer_id
    };

    if identity.role != Role::Admin && customer_id != identity.user_id {
        return Err(AppError::Forbidden(
            "only the ordering customer can rate".to_string(),
        ));
    }

    Ok(Json(ledger::rate(
        &state,
        id,
        payload.rating,
        payload.feedback,
    )?))
}

#[derive(Deserialize)]
pub struct PaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

async fn set_payment_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    identity: Identity,
    Json(payload): Json<PaymentStatusRequest>,
) -> Result<Json<Order>, AppError> {
    if identity.role != Role::Admin {
        return Err(AppError::Forbidden(
            "payment status is written by the payment processor".to_string(),
        ));
    }

    Ok(Json(ledger::set_payment_status(
        &state,
        id,
        payload.payment_status,
    )?))
}

/// Status moves come from the kitchen, the assigned courier, or an admin;
/// customers only observe.
fn require_manager(state: &AppState, order_id: Uuid, identity: &Identity) -> Result<(), AppError> {
    let (agent_id, restaurant_id) = {
        let order = state
            .orders
            .get(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        (order.delivery_agent, order.restaurant_id)
    };

    match identity.role {
        Role::Admin => Ok(()),
        Role::Restaurant => {
            let owns = state
                .restaurants
                .get(&restaurant_id)
                .is_some_and(|restaurant| restaurant.owner_id == identity.user_id);
            if owns {
                Ok(())
            } else {
                Err(AppError::Forbidden(
                    "not the restaurant for this order".to_string(),
                ))
            }
        }
        Role::Delivery => {
            let assigned = agent_id
                .and_then(|agent_id| state.agents.get(&agent_id))
                .is_some_and(|agent| agent.user_id == identity.user_id);
            if assigned {
                Ok(())
            } else {
                Err(AppError::Forbidden(
                    "not the agent assigned to this order".to_string(),
                ))
            }
        }
        Role::Customer => Err(AppError::Forbidden(
            "customers cannot change order status".to_string(),
        )),
    }
}
