use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::agent::DeliveryAgent;
use crate::models::catalog::{MenuItem, Restaurant};
use crate::models::event::OrderEvent;
use crate::models::order::Order;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub orders: DashMap<Uuid, Order>,
    pub agents: DashMap<Uuid, DeliveryAgent>,
    pub restaurants: DashMap<Uuid, Restaurant>,
    pub menu_items: DashMap<Uuid, MenuItem>,
    pub events_tx: broadcast::Sender<OrderEvent>,
    pub metrics: Metrics,
    pub search_radius_km: f64,
}

impl AppState {
    pub fn new(event_buffer_size: usize, search_radius_km: f64) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            orders: DashMap::new(),
            agents: DashMap::new(),
            restaurants: DashMap::new(),
            menu_items: DashMap::new(),
            events_tx,
            metrics: Metrics::new(),
            search_radius_km,
        }
    }
}
