use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::agent::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Position along the forward delivery chain. `Cancelled` sits outside
    /// the chain and is only reachable through `ledger::cancel`.
    pub fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Preparing => Some(2),
            OrderStatus::Ready => Some(3),
            OrderStatus::PickedUp => Some(4),
            OrderStatus::InTransit => Some(5),
            OrderStatus::Delivered => Some(6),
            OrderStatus::Cancelled => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub menu_item_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEntry {
    pub status: OrderStatus,
    pub location: Option<GeoPoint>,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    StatusUpdate,
    LocationUpdate,
    Delay,
    Arrival,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    pub location: GeoPoint,
    pub name: String,
    pub position: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePlan {
    pub distance_km: f64,
    pub eta_minutes: f64,
    pub waypoints: Vec<Waypoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub delivery_agent: Option<Uuid>,
    pub items: Vec<LineItem>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub delivery_address: DeliveryAddress,
    /// Append-only; every status transition and location report adds one entry.
    pub tracking_history: Vec<TrackingEntry>,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    /// Set exactly once, on the transition to `delivered`.
    pub actual_delivery_time: Option<DateTime<Utc>>,
    pub route: Option<RoutePlan>,
    pub notifications: Vec<Notification>,
    pub rating: Option<u8>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn unread_notifications(&self) -> Vec<Notification> {
        self.notifications
            .iter()
            .filter(|note| !note.read)
            .cloned()
            .collect()
    }

    /// Most recent reported courier position, if any entry carries one.
    pub fn last_known_location(&self) -> Option<GeoPoint> {
        self.tracking_history
            .iter()
            .rev()
            .find_map(|entry| entry.location.clone())
    }
}
