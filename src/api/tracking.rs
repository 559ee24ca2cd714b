use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::identity::Identity;
use crate::error::AppError;
use crate::ledger;
use crate::models::agent::GeoPoint;
use crate::models::order::{Notification, RoutePlan};
use crate::state::AppState;
use crate::tracking::{self, Role, TrackingView};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/track/:order_id", get(track_order))
        .route("/track/:order_id/location", post(report_location))
        .route("/orders/:id/notifications", get(get_notifications))
        .route("/orders/:id/notifications/read", post(mark_notifications_read))
}

async fn track_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    identity: Identity,
) -> Result<Json<TrackingView>, AppError> {
    let view = tracking::tracking_view(&state, order_id, identity.user_id, identity.role)?;
    Ok(Json(view))
}

#[derive(Deserialize)]
pub struct ReportLocationRequest {
    pub location: GeoPoint,
}

#[derive(Serialize)]
pub struct ReportLocationResponse {
    pub route: Option<RoutePlan>,
}

async fn report_location(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    identity: Identity,
    Json(payload): Json<ReportLocationRequest>,
) -> Result<Json<ReportLocationResponse>, AppError> {
    let route = tracking::report_location(&state, order_id, identity.user_id, &payload.location)?;
    Ok(Json(ReportLocationResponse { route }))
}

#[derive(Serialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

async fn get_notifications(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    identity: Identity,
) -> Result<Json<NotificationsResponse>, AppError> {
    require_notification_party(&state, id, &identity)?;

    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    let notifications = order.notifications.clone();
    let unread_count = notifications.iter().filter(|note| !note.read).count();

    Ok(Json(NotificationsResponse {
        notifications,
        unread_count,
    }))
}

#[derive(Deserialize)]
pub struct MarkReadRequest {
    pub notification_ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    pub marked: usize,
}

async fn mark_notifications_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    identity: Identity,
    Json(payload): Json<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>, AppError> {
    require_notification_party(&state, id, &identity)?;

    let marked = ledger::mark_notifications_read(&state, id, &payload.notification_ids)?;
    Ok(Json(MarkReadResponse { marked }))
}

/// Notifications are addressed to the customer and the assigned courier.
fn require_notification_party(
    state: &AppState,
    order_id: Uuid,
    identity: &Identity,
) -> Result<(), AppError> {
    let (customer_id, agent_id) = {
        let order = state
            .orders
            .get(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        (order.customer_id, order.delivery_agent)
    };

    if identity.role == Role::Admin || customer_id == identity.user_id {
        return Ok(());
    }

    let assigned = agent_id
        .and_then(|agent_id| state.agents.get(&agent_id))
        .is_some_and(|agent| agent.user_id == identity.user_id);
    if assigned {
        return Ok(());
    }

    Err(AppError::Forbidden(
        "not a notification recipient for this order".to_string(),
    ))
}
