use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::agent::{AgentStatus, DeliveryAgent, GeoPoint};
use crate::state::AppState;

/// Available agents within `max_distance_km` of `origin`, best candidate
/// first. Rating ranks, delivery count breaks ties; distance only gates
/// inclusion. An empty result is a valid outcome, not an error.
pub fn find_nearest_available(
    state: &AppState,
    origin: &GeoPoint,
    max_distance_km: f64,
) -> Vec<DeliveryAgent> {
    let mut candidates: Vec<DeliveryAgent> = state
        .agents
        .iter()
        .filter_map(|entry| {
            let agent = entry.value();
            let eligible = agent.status == AgentStatus::Available
                && haversine_km(&agent.location, origin) <= max_distance_km;

            if eligible {
                Some(agent.clone())
            } else {
                None
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.rating
            .total_cmp(&a.rating)
            .then(a.total_deliveries.cmp(&b.total_deliveries))
    });

    candidates
}

/// Compare-and-set under the agent's entry guard: the status read and the
/// `busy` write happen atomically, so concurrent callers cannot both win
/// the same agent.
pub fn assign(state: &AppState, agent_id: Uuid, order_id: Uuid) -> Result<DeliveryAgent, AppError> {
    let mut agent = state
        .agents
        .get_mut(&agent_id)
        .ok_or_else(|| AppError::NotFound(format!("agent {agent_id} not found")))?;

    if agent.status != AgentStatus::Available {
        return Err(AppError::AgentUnavailable(format!(
            "agent {agent_id} is not available"
        )));
    }

    agent.status = AgentStatus::Busy;
    agent.current_order = Some(order_id);
    agent.last_active = Utc::now();

    Ok(agent.clone())
}

/// Undo a successful `assign` whose order-side write lost a race.
pub fn unassign(state: &AppState, agent_id: Uuid) {
    if let Some(mut agent) = state.agents.get_mut(&agent_id) {
        agent.status = AgentStatus::Available;
        agent.current_order = None;
    }
}

/// Delivery completed: free the agent and fold the duration into its
/// aggregates. The average is a two-term blend, not a cumulative mean over
/// `total_deliveries`; existing agent records were built with this formula.
pub fn release(
    state: &AppState,
    agent_id: Uuid,
    delivery_duration_minutes: f64,
) -> Result<DeliveryAgent, AppError> {
    let mut agent = state
        .agents
        .get_mut(&agent_id)
        .ok_or_else(|| AppError::NotFound(format!("agent {agent_id} not found")))?;

    agent.current_order = None;
    agent.status = AgentStatus::Available;
    agent.total_deliveries += 1;

    if agent.average_delivery_minutes == 0.0 {
        agent.average_delivery_minutes = delivery_duration_minutes;
    } else {
        agent.average_delivery_minutes =
            (agent.average_delivery_minutes + delivery_duration_minutes) / 2.0;
    }

    agent.last_active = Utc::now();

    Ok(agent.clone())
}

/// Unconditional position overwrite plus a liveness refresh.
pub fn update_location(
    state: &AppState,
    agent_id: Uuid,
    point: &GeoPoint,
) -> Result<DeliveryAgent, AppError> {
    let mut agent = state
        .agents
        .get_mut(&agent_id)
        .ok_or_else(|| AppError::NotFound(format!("agent {agent_id} not found")))?;

    agent.location = point.clone();
    agent.last_active = Utc::now();

    Ok(agent.clone())
}
