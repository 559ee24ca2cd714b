use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn in_bounds(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Available,
    Busy,
    Offline,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Bicycle,
    Motorcycle,
    Car,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAgent {
    pub id: Uuid,
    /// Account id in the upstream identity provider.
    pub user_id: Uuid,
    pub name: String,
    pub phone: String,
    pub vehicle: VehicleClass,
    pub status: AgentStatus,
    pub location: GeoPoint,
    /// Non-null exactly while the agent is busy with a delivery.
    pub current_order: Option<Uuid>,
    pub rating: f64,
    pub total_deliveries: u32,
    pub average_delivery_minutes: f64,
    pub last_active: DateTime<Utc>,
}
