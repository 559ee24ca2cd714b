use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::NotificationKind;

/// Real-time event fanned out to subscribers; `room` is the order id the
/// event belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub room: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
