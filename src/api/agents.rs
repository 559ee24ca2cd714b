use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::identity::Identity;
use crate::directory;
use crate::error::AppError;
use crate::models::agent::{AgentStatus, DeliveryAgent, GeoPoint, VehicleClass};
use crate::state::AppState;
use crate::tracking::Role;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/agents", post(register_agent).get(list_agents))
        .route("/agents/:id/status", patch(update_agent_status))
        .route("/agents/:id/location", patch(update_agent_location))
}

#[derive(Deserialize)]
pub struct RegisterAgentRequest {
    pub name: String,
    pub phone: String,
    pub vehicle: VehicleClass,
    pub location: GeoPoint,
    pub rating: f64,
}

async fn register_agent(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(payload): Json<RegisterAgentRequest>,
) -> Result<Json<DeliveryAgent>, AppError> {
    if !matches!(identity.role, Role::Delivery | Role::Admin) {
        return Err(AppError::Forbidden(
            "only delivery accounts can register as agents".to_string(),
        ));
    }

    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name cannot be empty".to_string()));
    }

    if payload.phone.trim().is_empty() {
        return Err(AppError::InvalidInput("phone cannot be empty".to_string()));
    }

    if !payload.location.in_bounds() {
        return Err(AppError::InvalidInput(
            "location coordinates out of range".to_string(),
        ));
    }

    // New agents come up offline and flip themselves to available.
    let agent = DeliveryAgent {
        id: Uuid::new_v4(),
        user_id: identity.user_id,
        name: payload.name,
        phone: payload.phone,
        vehicle: payload.vehicle,
        status: AgentStatus::Offline,
        location: payload.location,
        current_order: None,
        rating: payload.rating.clamp(0.0, 5.0),
        total_deliveries: 0,
        average_delivery_minutes: 0.0,
        last_active: Utc::now(),
    };

    state.agents.insert(agent.id, agent.clone());
    Ok(Json(agent))
}

async fn list_agents(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<DeliveryAgent>>, AppError> {
    if identity.role != Role::Admin {
        return Err(AppError::Forbidden(
            "only admins can list agents".to_string(),
        ));
    }

    let agents = state
        .agents
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Ok(Json(agents))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AgentStatus,
}

async fn update_agent_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    identity: Identity,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<DeliveryAgent>, AppError> {
    if payload.status == AgentStatus::Busy {
        return Err(AppError::InvalidInput(
            "busy is set by assignment, not manually".to_string(),
        ));
    }

    let mut agent = state
        .agents
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("agent {id} not found")))?;

    if identity.role != Role::Admin && agent.user_id != identity.user_id {
        return Err(AppError::Forbidden(
            "agents can only update their own status".to_string(),
        ));
    }

    if agent.current_order.is_some() {
        return Err(AppError::Conflict(
            "agent has an active delivery".to_string(),
        ));
    }

    agent.status = payload.status;
    agent.last_active = Utc::now();

    Ok(Json(agent.clone()))
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

async fn update_agent_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    identity: Identity,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<DeliveryAgent>, AppError> {
    if !payload.location.in_bounds() {
        return Err(AppError::InvalidInput(
            "location coordinates out of range".to_string(),
        ));
    }

    let agent_user_id = state
        .agents
        .get(&id)
        .map(|agent| agent.user_id)
        .ok_or_else(|| AppError::NotFound(format!("agent {id} not found")))?;

    if identity.role != Role::Admin && agent_user_id != identity.user_id {
        return Err(AppError::Forbidden(
            "agents can only update their own location".to_string(),
        ));
    }

    let agent = directory::update_location(&state, id, &payload.location)?;
    Ok(Json(agent))
}
