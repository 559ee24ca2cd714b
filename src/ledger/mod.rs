use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::directory;
use crate::error::AppError;
use crate::geo;
use crate::models::agent::{DeliveryAgent, GeoPoint};
use crate::models::event::OrderEvent;
use crate::models::order::{
    DeliveryAddress, LineItem, Notification, NotificationKind, Order, OrderStatus, PaymentStatus,
    RoutePlan, TrackingEntry, Waypoint,
};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewLineItem {
    pub menu_item_id: Uuid,
    pub quantity: u32,
}

pub fn create_order(
    state: &AppState,
    customer_id: Uuid,
    restaurant_id: Uuid,
    items: &[NewLineItem],
    delivery_address: DeliveryAddress,
) -> Result<Order, AppError> {
    if !delivery_address.location.in_bounds() {
        return Err(AppError::InvalidInput(
            "delivery coordinates out of range".to_string(),
        ));
    }

    if items.is_empty() {
        return Err(AppError::InvalidInput(
            "order must contain at least one item".to_string(),
        ));
    }

    if !state.restaurants.contains_key(&restaurant_id) {
        return Err(AppError::NotFound(format!(
            "restaurant {restaurant_id} not found"
        )));
    }

    let mut line_items = Vec::with_capacity(items.len());
    let mut total_amount = 0.0;

    for item in items {
        if item.quantity < 1 {
            return Err(AppError::InvalidInput(
                "item quantity must be at least 1".to_string(),
            ));
        }

        let menu_item = state
            .menu_items
            .get(&item.menu_item_id)
            .filter(|menu_item| menu_item.restaurant_id == restaurant_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("menu item {} not found", item.menu_item_id))
            })?;

        total_amount += menu_item.price * f64::from(item.quantity);
        line_items.push(LineItem {
            menu_item_id: menu_item.id,
            name: menu_item.name.clone(),
            quantity: item.quantity,
            unit_price: menu_item.price,
        });
    }

    let order = Order {
        id: Uuid::new_v4(),
        customer_id,
        restaurant_id,
        delivery_agent: None,
        items: line_items,
        total_amount,
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        delivery_address,
        tracking_history: Vec::new(),
        estimated_delivery_time: None,
        actual_delivery_time: None,
        route: None,
        notifications: Vec::new(),
        rating: None,
        feedback: None,
        created_at: Utc::now(),
        assigned_at: None,
    };

    state.orders.insert(order.id, order.clone());
    state.metrics.orders_created_total.inc();
    info!(order_id = %order.id, total_amount, "order created");

    Ok(order)
}

/// Moves the order strictly forward along the delivery chain (skipping
/// intermediate stops is allowed, going back or standing still is not) and
/// appends exactly one tracking entry. The transition to `delivered` also
/// stamps `actual_delivery_time` and frees the agent.
pub fn advance_status(
    state: &AppState,
    order_id: Uuid,
    new_status: OrderStatus,
    location: Option<GeoPoint>,
    description: Option<String>,
) -> Result<Order, AppError> {
    let now = Utc::now();
    let mut completed: Option<(Uuid, f64)> = None;

    let snapshot = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        let from_rank = order.status.rank().ok_or_else(|| {
            AppError::InvalidTransition("cancelled orders cannot advance".to_string())
        })?;
        let to_rank = new_status.rank().ok_or_else(|| {
            AppError::InvalidTransition("cancellation is a separate operation".to_string())
        })?;

        if to_rank <= from_rank {
            return Err(AppError::InvalidTransition(format!(
                "cannot move from {} to {}",
                order.status, new_status
            )));
        }

        order.status = new_status;
        order.tracking_history.push(TrackingEntry {
            status: new_status,
            location,
            timestamp: now,
            description: description
                .unwrap_or_else(|| format!("Order status changed to {new_status}")),
        });

        if new_status == OrderStatus::Delivered {
            order.actual_delivery_time = Some(now);
            if let Some(agent_id) = order.delivery_agent {
                let since = order.assigned_at.unwrap_or(order.created_at);
                let minutes = (now - since).num_milliseconds() as f64 / 60_000.0;
                completed = Some((agent_id, minutes));
            }
        }

        order.clone()
    };

    // The order guard is dropped before touching the agent map.
    if let Some((agent_id, minutes)) = completed {
        directory::release(state, agent_id, minutes)?;
        state.metrics.deliveries_total.inc();
        state.metrics.delivery_duration_minutes.observe(minutes);
    }

    let _ = state.events_tx.send(OrderEvent {
        room: order_id,
        kind: NotificationKind::StatusUpdate,
        message: format!("Order status changed to {new_status}"),
        timestamp: now,
    });
    info!(order_id = %order_id, status = %new_status, "order status advanced");

    Ok(snapshot)
}

/// Lazy assignment: a no-op unless the order is still `pending` with no
/// agent. Searches the configured radius around the delivery address and
/// binds the top candidate. `None` (no agent found, or a concurrent caller
/// won the order or the agent) is a valid outcome, not an error.
pub fn ensure_assigned(state: &AppState, order_id: Uuid) -> Result<Option<DeliveryAgent>, AppError> {
    let origin = {
        let order = state
            .orders
            .get(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.status != OrderStatus::Pending || order.delivery_agent.is_some() {
            return Ok(None);
        }

        order.delivery_address.location.clone()
    };

    let candidates = directory::find_nearest_available(state, &origin, state.search_radius_km);
    let Some(best) = candidates.into_iter().next() else {
        state
            .metrics
            .assignments_total
            .with_label_values(&["no_agent"])
            .inc();
        return Ok(None);
    };

    let agent = match directory::assign(state, best.id, order_id) {
        Ok(agent) => agent,
        // Lost the agent between the search and the CAS; the caller may retry.
        Err(AppError::AgentUnavailable(_)) => {
            state
                .metrics
                .assignments_total
                .with_label_values(&["lost_race"])
                .inc();
            return Ok(None);
        }
        Err(err) => return Err(err),
    };

    let now = Utc::now();
    {
        let Some(mut order) = state.orders.get_mut(&order_id) else {
            directory::unassign(state, agent.id);
            return Err(AppError::NotFound(format!("order {order_id} not found")));
        };

        if order.status != OrderStatus::Pending || order.delivery_agent.is_some() {
            drop(order);
            directory::unassign(state, agent.id);
            return Ok(None);
        }

        order.delivery_agent = Some(agent.id);
        order.assigned_at = Some(now);
        order.status = OrderStatus::Confirmed;
        order.tracking_history.push(TrackingEntry {
            status: OrderStatus::Confirmed,
            location: None,
            timestamp: now,
            description: "Delivery agent assigned".to_string(),
        });
    }

    push_notification(
        state,
        order_id,
        NotificationKind::StatusUpdate,
        format!("Delivery agent {} assigned to your order", agent.name),
    )?;

    state
        .metrics
        .assignments_total
        .with_label_values(&["assigned"])
        .inc();
    info!(order_id = %order_id, agent_id = %agent.id, "delivery agent assigned");

    Ok(Some(agent))
}

/// Rebuilds the two-waypoint route from the agent's current position to the
/// delivery address and refreshes the ETA. Idempotent; a no-op without an
/// assigned agent.
pub fn optimize_route(state: &AppState, order_id: Uuid) -> Result<Option<RoutePlan>, AppError> {
    let (agent_id, destination) = {
        let order = state
            .orders
            .get(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        match order.delivery_agent {
            Some(agent_id) => (agent_id, order.delivery_address.location.clone()),
            None => return Ok(None),
        }
    };

    let (agent_location, vehicle) = {
        let agent = state
            .agents
            .get(&agent_id)
            .ok_or_else(|| AppError::NotFound(format!("agent {agent_id} not found")))?;
        (agent.location.clone(), agent.vehicle)
    };

    let distance_km = geo::haversine_km(&agent_location, &destination);
    let eta_minutes = geo::eta_minutes(distance_km, &vehicle);

    let plan = RoutePlan {
        distance_km,
        eta_minutes,
        waypoints: vec![
            Waypoint {
                location: agent_location,
                name: "Agent location".to_string(),
                position: 0,
            },
            Waypoint {
                location: destination,
                name: "Delivery address".to_string(),
                position: 1,
            },
        ],
    };

    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
    order.route = Some(plan.clone());
    order.estimated_delivery_time =
        Some(Utc::now() + Duration::milliseconds((eta_minutes * 60_000.0) as i64));

    Ok(Some(plan))
}

/// The sole path by which agent movement becomes visible to the customer:
/// one tracking entry at the current status, a `location_update`
/// notification, then a route refresh.
pub fn update_agent_location(
    state: &AppState,
    order_id: Uuid,
    point: &GeoPoint,
) -> Result<Order, AppError> {
    if !point.in_bounds() {
        return Err(AppError::InvalidInput(
            "location coordinates out of range".to_string(),
        ));
    }

    {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        let status = order.status;
        order.tracking_history.push(TrackingEntry {
            status,
            location: Some(point.clone()),
            timestamp: Utc::now(),
            description: "Location updated".to_string(),
        });
    }

    push_notification(
        state,
        order_id,
        NotificationKind::LocationUpdate,
        format!(
            "Your order is on the way! Current location: {:.5}, {:.5}",
            point.lat, point.lng
        ),
    )?;
    state.metrics.location_updates_total.inc();

    optimize_route(state, order_id)?;

    let order = state
        .orders
        .get(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
    Ok(order.clone())
}

/// Appends a notification; every call appends a distinct entry, there is no
/// deduplication. The event channel mirrors the append for live subscribers.
pub fn push_notification(
    state: &AppState,
    order_id: Uuid,
    kind: NotificationKind,
    message: String,
) -> Result<Notification, AppError> {
    let note = Notification {
        id: Uuid::new_v4(),
        kind,
        message,
        timestamp: Utc::now(),
        read: false,
    };

    {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        order.notifications.push(note.clone());
    }

    let _ = state.events_tx.send(OrderEvent {
        room: order_id,
        kind,
        message: note.message.clone(),
        timestamp: note.timestamp,
    });

    Ok(note)
}

/// Ids that match nothing are silently ignored. Returns how many entries
/// were newly marked.
pub fn mark_notifications_read(
    state: &AppState,
    order_id: Uuid,
    notification_ids: &[Uuid],
) -> Result<usize, AppError> {
    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    let mut marked = 0;
    for note in order.notifications.iter_mut() {
        if !note.read && notification_ids.contains(&note.id) {
            note.read = true;
            marked += 1;
        }
    }

    Ok(marked)
}

/// Cancellation is a status, not a deletion, and is only permitted while the
/// order is still `pending`. An already-assigned agent keeps the reference.
pub fn cancel(state: &AppState, order_id: Uuid) -> Result<Order, AppError> {
    let now = Utc::now();
    let snapshot = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.status != OrderStatus::Pending {
            return Err(AppError::InvalidTransition(format!(
                "cannot cancel order in status {}",
                order.status
            )));
        }

        order.status = OrderStatus::Cancelled;
        order.tracking_history.push(TrackingEntry {
            status: OrderStatus::Cancelled,
            location: None,
            timestamp: now,
            description: "Order cancelled".to_string(),
        });

        order.clone()
    };

    let _ = state.events_tx.send(OrderEvent {
        room: order_id,
        kind: NotificationKind::StatusUpdate,
        message: "Order cancelled".to_string(),
        timestamp: now,
    });
    info!(order_id = %order_id, "order cancelled");

    Ok(snapshot)
}

/// Post-delivery feedback, settable at most once.
pub fn rate(
    state: &AppState,
    order_id: Uuid,
    rating: u8,
    feedback: Option<String>,
) -> Result<Order, AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::InvalidInput(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    if order.status != OrderStatus::Delivered {
        return Err(AppError::InvalidTransition(
            "only delivered orders can be rated".to_string(),
        ));
    }

    if order.rating.is_some() {
        return Err(AppError::Conflict("order has already been rated".to_string()));
    }

    order.rating = Some(rating);
    order.feedback = feedback;

    Ok(order.clone())
}

/// Payment-processor write-through; the ledger keeps no gateway logic.
pub fn set_payment_status(
    state: &AppState,
    order_id: Uuid,
    payment_status: PaymentStatus,
) -> Result<Order, AppError> {
    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    order.payment_status = payment_status;

    Ok(order.clone())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::agent::{AgentStatus, DeliveryAgent, VehicleClass};
    use crate::models::catalog::{MenuItem, Restaurant};

    fn test_state() -> AppState {
        AppState::new(16, 5.0)
    }

    fn seed_restaurant(state: &AppState) -> Restaurant {
        let restaurant = Restaurant {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Pizza Nord".to_string(),
            address: "Hauptstr. 1".to_string(),
            location: GeoPoint {
                lat: 52.52,
                lng: 13.405,
            },
        };
        state.restaurants.insert(restaurant.id, restaurant.clone());
        restaurant
    }

    fn seed_menu_item(state: &AppState, restaurant_id: Uuid, price: f64) -> MenuItem {
        let item = MenuItem {
            id: Uuid::new_v4(),
            restaurant_id,
            name: "Margherita".to_string(),
            price,
        };
        state.menu_items.insert(item.id, item.clone());
        item
    }

    fn seed_agent(state: &AppState, lat: f64, lng: f64) -> DeliveryAgent {
        let agent = DeliveryAgent {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Dana".to_string(),
            phone: "555-0101".to_string(),
            vehicle: VehicleClass::Motorcycle,
            status: AgentStatus::Available,
            location: GeoPoint { lat, lng },
            current_order: None,
            rating: 4.5,
            total_deliveries: 0,
            average_delivery_minutes: 0.0,
            last_active: Utc::now(),
        };
        state.agents.insert(agent.id, agent.clone());
        agent
    }

    fn address() -> DeliveryAddress {
        DeliveryAddress {
            street: "Nebenstr. 2".to_string(),
            city: "Berlin".to_string(),
            state: "BE".to_string(),
            zip_code: "10115".to_string(),
            location: GeoPoint {
                lat: 52.53,
                lng: 13.41,
            },
        }
    }

    fn seeded_order(state: &AppState) -> Order {
        let restaurant = seed_restaurant(state);
        let pizza = seed_menu_item(state, restaurant.id, 10.0);
        let cola = seed_menu_item(state, restaurant.id, 5.0);

        create_order(
            state,
            Uuid::new_v4(),
            restaurant.id,
            &[
                NewLineItem {
                    menu_item_id: pizza.id,
                    quantity: 2,
                },
                NewLineItem {
                    menu_item_id: cola.id,
                    quantity: 1,
                },
            ],
            address(),
        )
        .unwrap()
    }

    #[test]
    fn total_amount_is_the_sum_of_line_subtotals() {
        let state = test_state();
        let order = seeded_order(&state);
        assert!((order.total_amount - 25.0).abs() < 1e-9);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.tracking_history.is_empty());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let state = test_state();
        let restaurant = seed_restaurant(&state);
        let item = seed_menu_item(&state, restaurant.id, 10.0);

        let result = create_order(
            &state,
            Uuid::new_v4(),
            restaurant.id,
            &[NewLineItem {
                menu_item_id: item.id,
                quantity: 0,
            }],
            address(),
        );
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn unknown_restaurant_and_foreign_menu_item_are_not_found() {
        let state = test_state();
        let restaurant = seed_restaurant(&state);
        let other = seed_restaurant(&state);
        let foreign_item = seed_menu_item(&state, other.id, 8.0);

        let missing_restaurant = create_order(
            &state,
            Uuid::new_v4(),
            Uuid::new_v4(),
            &[NewLineItem {
                menu_item_id: foreign_item.id,
                quantity: 1,
            }],
            address(),
        );
        assert!(matches!(missing_restaurant, Err(AppError::NotFound(_))));

        let foreign = create_order(
            &state,
            Uuid::new_v4(),
            restaurant.id,
            &[NewLineItem {
                menu_item_id: foreign_item.id,
                quantity: 1,
            }],
            address(),
        );
        assert!(matches!(foreign, Err(AppError::NotFound(_))));
    }

    #[test]
    fn advance_appends_exactly_one_entry_and_may_skip_forward() {
        let state = test_state();
        let order = seeded_order(&state);

        let updated =
            advance_status(&state, order.id, OrderStatus::Preparing, None, None).unwrap();
        assert_eq!(updated.status, OrderStatus::Preparing);
        assert_eq!(updated.tracking_history.len(), 1);
        assert_eq!(
            updated.tracking_history[0].description,
            "Order status changed to preparing"
        );

        let updated =
            advance_status(&state, order.id, OrderStatus::InTransit, None, None).unwrap();
        assert_eq!(updated.tracking_history.len(), 2);
    }

    #[test]
    fn backward_and_repeated_moves_are_rejected() {
        let state = test_state();
        let order = seeded_order(&state);
        advance_status(&state, order.id, OrderStatus::Preparing, None, None).unwrap();

        let backward = advance_status(&state, order.id, OrderStatus::Confirmed, None, None);
        assert!(matches!(backward, Err(AppError::InvalidTransition(_))));

        let repeated = advance_status(&state, order.id, OrderStatus::Preparing, None, None);
        assert!(matches!(repeated, Err(AppError::InvalidTransition(_))));
    }

    #[test]
    fn cancel_is_only_valid_while_pending() {
        let state = test_state();
        let order = seeded_order(&state);

        let cancelled = cancel(&state, order.id).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.tracking_history.len(), 1);

        let advanced = advance_status(&state, order.id, OrderStatus::Confirmed, None, None);
        assert!(matches!(advanced, Err(AppError::InvalidTransition(_))));

        let other = seeded_order(&state);
        advance_status(&state, other.id, OrderStatus::Confirmed, None, None).unwrap();
        let late_cancel = cancel(&state, other.id);
        assert!(matches!(late_cancel, Err(AppError::InvalidTransition(_))));
    }

    #[test]
    fn ensure_assigned_binds_the_best_candidate() {
        let state = test_state();
        let order = seeded_order(&state);
        let mut stronger = seed_agent(&state, 52.531, 13.411);
        stronger.rating = 4.9;
        state.agents.insert(stronger.id, stronger.clone());
        seed_agent(&state, 52.532, 13.412);

        let assigned = ensure_assigned(&state, order.id).unwrap().unwrap();
        assert_eq!(assigned.id, stronger.id);

        let order = state.orders.get(&order.id).unwrap().clone();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.delivery_agent, Some(stronger.id));
        assert!(order.assigned_at.is_some());
        assert_eq!(order.tracking_history.len(), 1);
        assert_eq!(order.notifications.len(), 1);
        assert_eq!(order.notifications[0].kind, NotificationKind::StatusUpdate);

        let agent = state.agents.get(&stronger.id).unwrap().clone();
        assert_eq!(agent.status, AgentStatus::Busy);
        assert_eq!(agent.current_order, Some(order.id));

        // Already assigned: nothing further happens.
        assert!(ensure_assigned(&state, order.id).unwrap().is_none());
    }

    #[test]
    fn ensure_assigned_without_candidates_is_not_an_error() {
        let state = test_state();
        let order = seeded_order(&state);

        assert!(ensure_assigned(&state, order.id).unwrap().is_none());

        let order = state.orders.get(&order.id).unwrap().clone();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.delivery_agent.is_none());
    }

    #[test]
    fn delivery_stamps_actual_time_once_and_frees_the_agent() {
        let state = test_state();
        let order = seeded_order(&state);
        let agent = seed_agent(&state, 52.531, 13.411);

        ensure_assigned(&state, order.id).unwrap().unwrap();
        let delivered =
            advance_status(&state, order.id, OrderStatus::Delivered, None, None).unwrap();
        assert!(delivered.actual_delivery_time.is_some());

        let freed = state.agents.get(&agent.id).unwrap().clone();
        assert_eq!(freed.status, AgentStatus::Available);
        assert_eq!(freed.current_order, None);
        assert_eq!(freed.total_deliveries, 1);

        let again = advance_status(&state, order.id, OrderStatus::Delivered, None, None);
        assert!(matches!(again, Err(AppError::InvalidTransition(_))));
        let unchanged = state.orders.get(&order.id).unwrap().clone();
        assert_eq!(unchanged.actual_delivery_time, delivered.actual_delivery_time);
    }

    #[test]
    fn optimize_route_is_a_noop_without_an_agent() {
        let state = test_state();
        let order = seeded_order(&state);
        assert!(optimize_route(&state, order.id).unwrap().is_none());
    }

    #[test]
    fn optimize_route_reflects_the_latest_agent_position() {
        let state = test_state();
        let order = seeded_order(&state);
        let agent = seed_agent(&state, 52.531, 13.411);
        ensure_assigned(&state, order.id).unwrap().unwrap();

        let first = optimize_route(&state, order.id).unwrap().unwrap();
        assert_eq!(first.waypoints.len(), 2);
        assert!(first.distance_km > 0.0);
        assert!(first.eta_minutes > 0.0);

        directory::update_location(
            &state,
            agent.id,
            &GeoPoint {
                lat: 52.5301,
                lng: 13.4099,
            },
        )
        .unwrap();
        let second = optimize_route(&state, order.id).unwrap().unwrap();
        assert!(second.distance_km < first.distance_km);

        let order = state.orders.get(&order.id).unwrap().clone();
        assert!(order.estimated_delivery_time.is_some());
    }

    #[test]
    fn location_update_appends_history_and_notifies() {
        let state = test_state();
        let order = seeded_order(&state);
        seed_agent(&state, 52.531, 13.411);
        ensure_assigned(&state, order.id).unwrap().unwrap();

        let before = state.orders.get(&order.id).unwrap().tracking_history.len();
        let updated = update_agent_location(
            &state,
            order.id,
            &GeoPoint {
                lat: 52.5305,
                lng: 13.4102,
            },
        )
        .unwrap();

        assert_eq!(updated.tracking_history.len(), before + 1);
        assert_eq!(updated.status, OrderStatus::Confirmed);
        let latest = updated.tracking_history.last().unwrap();
        assert_eq!(latest.status, OrderStatus::Confirmed);
        assert!(latest.location.is_some());
        assert!(updated
            .notifications
            .iter()
            .any(|note| note.kind == NotificationKind::LocationUpdate));
        assert!(updated.route.is_some());
    }

    #[test]
    fn unknown_notification_ids_are_ignored() {
        let state = test_state();
        let order = seeded_order(&state);
        let note = push_notification(
            &state,
            order.id,
            NotificationKind::Delay,
            "Running late".to_string(),
        )
        .unwrap();

        let marked =
            mark_notifications_read(&state, order.id, &[Uuid::new_v4()]).unwrap();
        assert_eq!(marked, 0);
        let order_state = state.orders.get(&order.id).unwrap().clone();
        assert!(!order_state.notifications[0].read);

        let marked = mark_notifications_read(&state, order.id, &[note.id]).unwrap();
        assert_eq!(marked, 1);
        let order_state = state.orders.get(&order.id).unwrap().clone();
        assert!(order_state.notifications[0].read);
        assert!(order_state.unread_notifications().is_empty());
    }

    #[test]
    fn rating_requires_delivery_and_is_set_once() {
        let state = test_state();
        let order = seeded_order(&state);

        let early = rate(&state, order.id, 5, None);
        assert!(matches!(early, Err(AppError::InvalidTransition(_))));

        advance_status(&state, order.id, OrderStatus::Delivered, None, None).unwrap();

        let out_of_range = rate(&state, order.id, 6, None);
        assert!(matches!(out_of_range, Err(AppError::InvalidInput(_))));

        let rated = rate(&state, order.id, 4, Some("quick".to_string())).unwrap();
        assert_eq!(rated.rating, Some(4));

        let twice = rate(&state, order.id, 5, None);
        assert!(matches!(twice, Err(AppError::Conflict(_))));
    }

    #[test]
    fn payment_status_is_a_plain_field_write() {
        let state = test_state();
        let order = seeded_order(&state);

        let updated = set_payment_status(&state, order.id, PaymentStatus::Paid).unwrap();
        assert_eq!(updated.payment_status, PaymentStatus::Paid);
    }
}
