use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directory;
use crate::error::AppError;
use crate::ledger;
use crate::models::agent::{AgentStatus, GeoPoint, VehicleClass};
use crate::models::order::{
    DeliveryAddress, LineItem, Notification, OrderStatus, PaymentStatus, RoutePlan, TrackingEntry,
};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Delivery,
    Restaurant,
    Admin,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestaurantSummary {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentContact {
    pub name: String,
    pub phone: String,
    pub vehicle: VehicleClass,
    pub status: AgentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerSummary {
    pub customer_id: Uuid,
    pub delivery_address: DeliveryAddress,
}

/// Role-filtered projection of one order. The common block is shared by
/// every role; the optional blocks are shaped per requester.
#[derive(Debug, Serialize)]
pub struct TrackingView {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    pub tracking_history: Vec<TrackingEntry>,
    pub route: Option<RoutePlan>,
    pub unread_notifications: Vec<Notification>,
    pub restaurant: RestaurantSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_agent: Option<AgentContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_value: Option<f64>,
}

/// Allows the order's customer, its assigned agent, the restaurant owner,
/// and admins; everyone else is rejected.
pub fn authorize(
    state: &AppState,
    order_id: Uuid,
    user_id: Uuid,
    role: Role,
) -> Result<(), AppError> {
    let (customer_id, agent_id, restaurant_id) = {
        let order = state
            .orders
            .get(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        (order.customer_id, order.delivery_agent, order.restaurant_id)
    };

    if role == Role::Admin || customer_id == user_id {
        return Ok(());
    }

    if let Some(agent_id) = agent_id {
        if let Some(agent) = state.agents.get(&agent_id) {
            if agent.user_id == user_id {
                return Ok(());
            }
        }
    }

    if let Some(restaurant) = state.restaurants.get(&restaurant_id) {
        if restaurant.owner_id == user_id {
            return Ok(());
        }
    }

    Err(AppError::Forbidden(
        "not allowed to view this order".to_string(),
    ))
}

/// Assembles the tracking projection. This read path opportunistically
/// assigns an agent to a still-pending order (`ledger::ensure_assigned`)
/// and, when that succeeds, computes the first route.
pub fn tracking_view(
    state: &AppState,
    order_id: Uuid,
    user_id: Uuid,
    role: Role,
) -> Result<TrackingView, AppError> {
    authorize(state, order_id, user_id, role)?;

    if ledger::ensure_assigned(state, order_id)?.is_some() {
        ledger::optimize_route(state, order_id)?;
    }

    let order = state
        .orders
        .get(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?
        .clone();

    let restaurant = state
        .restaurants
        .get(&order.restaurant_id)
        .map(|restaurant| RestaurantSummary {
            name: restaurant.name.clone(),
            address: restaurant.address.clone(),
        })
        .ok_or_else(|| {
            AppError::NotFound(format!("restaurant {} not found", order.restaurant_id))
        })?;

    let agent_contact = order.delivery_agent.and_then(|agent_id| {
        state.agents.get(&agent_id).map(|agent| AgentContact {
            name: agent.name.clone(),
            phone: agent.phone.clone(),
            vehicle: agent.vehicle,
            status: agent.status,
        })
    });

    let mut view = TrackingView {
        order_id: order.id,
        status: order.status,
        items: order.items.clone(),
        created_at: order.created_at,
        estimated_delivery_time: order.estimated_delivery_time,
        tracking_history: order.tracking_history.clone(),
        route: order.route.clone(),
        unread_notifications: order.unread_notifications(),
        restaurant,
        delivery_agent: None,
        current_location: None,
        customer: None,
        payment_status: None,
        order_value: None,
    };

    if matches!(role, Role::Customer | Role::Admin) {
        view.delivery_agent = agent_contact;
        view.current_location = order.last_known_location();
    }

    if matches!(role, Role::Delivery | Role::Admin) {
        view.customer = Some(CustomerSummary {
            customer_id: order.customer_id,
            delivery_address: order.delivery_address.clone(),
        });
        view.payment_status = Some(order.payment_status);
    }

    if matches!(role, Role::Restaurant | Role::Admin) {
        view.order_value = Some(order.total_amount);
        view.payment_status = Some(order.payment_status);
    }

    Ok(view)
}

/// Accepts a position report from the order's assigned agent only, moves
/// both the order-side and directory-side locations, and returns the
/// refreshed route.
pub fn report_location(
    state: &AppState,
    order_id: Uuid,
    user_id: Uuid,
    point: &GeoPoint,
) -> Result<Option<RoutePlan>, AppError> {
    if !point.in_bounds() {
        return Err(AppError::InvalidInput(
            "location coordinates out of range".to_string(),
        ));
    }

    let agent_id = {
        let order = state
            .orders
            .get(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        order.delivery_agent
    };

    let Some(agent_id) = agent_id else {
        return Err(AppError::Forbidden(
            "no delivery agent is assigned to this order".to_string(),
        ));
    };

    let agent_user_id = state
        .agents
        .get(&agent_id)
        .map(|agent| agent.user_id)
        .ok_or_else(|| AppError::NotFound(format!("agent {agent_id} not found")))?;

    if agent_user_id != user_id {
        return Err(AppError::Forbidden(
            "only the assigned agent can report this order's location".to_string(),
        ));
    }

    // Directory first so the route refresh sees the new position.
    directory::update_location(state, agent_id, point)?;
    let order = ledger::update_agent_location(state, order_id, point)?;

    Ok(order.route)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{report_location, tracking_view, Role};
    use crate::error::AppError;
    use crate::ledger::{self, NewLineItem};
    use crate::models::agent::{AgentStatus, DeliveryAgent, GeoPoint, VehicleClass};
    use crate::models::catalog::{MenuItem, Restaurant};
    use crate::models::order::{DeliveryAddress, Order, OrderStatus};
    use crate::state::AppState;

    struct Fixture {
        state: AppState,
        order: Order,
        customer_id: Uuid,
        owner_id: Uuid,
        agent_user_id: Uuid,
    }

    fn fixture(with_agent: bool) -> Fixture {
        let state = AppState::new(16, 5.0);

        let owner_id = Uuid::new_v4();
        let restaurant = Restaurant {
            id: Uuid::new_v4(),
            owner_id,
            name: "Pizza Nord".to_string(),
            address: "Hauptstr. 1".to_string(),
            location: GeoPoint {
                lat: 52.52,
                lng: 13.405,
            },
        };
        state.restaurants.insert(restaurant.id, restaurant.clone());

        let item = MenuItem {
            id: Uuid::new_v4(),
            restaurant_id: restaurant.id,
            name: "Margherita".to_string(),
            price: 12.5,
        };
        state.menu_items.insert(item.id, item.clone());

        let agent_user_id = Uuid::new_v4();
        if with_agent {
            let agent = DeliveryAgent {
                id: Uuid::new_v4(),
                user_id: agent_user_id,
                name: "Dana".to_string(),
                phone: "555-0101".to_string(),
                vehicle: VehicleClass::Bicycle,
                status: AgentStatus::Available,
                location: GeoPoint {
                    lat: 52.531,
                    lng: 13.411,
                },
                current_order: None,
                rating: 4.7,
                total_deliveries: 12,
                average_delivery_minutes: 22.0,
                last_active: Utc::now(),
            };
            state.agents.insert(agent.id, agent);
        }

        let customer_id = Uuid::new_v4();
        let order = ledger::create_order(
            &state,
            customer_id,
            restaurant.id,
            &[NewLineItem {
                menu_item_id: item.id,
                quantity: 2,
            }],
            DeliveryAddress {
                street: "Nebenstr. 2".to_string(),
                city: "Berlin".to_string(),
                state: "BE".to_string(),
                zip_code: "10115".to_string(),
                location: GeoPoint {
                    lat: 52.53,
                    lng: 13.41,
                },
            },
        )
        .unwrap();

        Fixture {
            state,
            order,
            customer_id,
            owner_id,
            agent_user_id,
        }
    }

    #[test]
    fn strangers_are_forbidden() {
        let f = fixture(false);
        let result = tracking_view(&f.state, f.order.id, Uuid::new_v4(), Role::Customer);
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn unknown_orders_are_not_found() {
        let f = fixture(false);
        let result = tracking_view(&f.state, Uuid::new_v4(), f.customer_id, Role::Customer);
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn pending_read_triggers_assignment_and_route() {
        let f = fixture(true);

        let view = tracking_view(&f.state, f.order.id, f.customer_id, Role::Customer).unwrap();

        assert_eq!(view.status, OrderStatus::Confirmed);
        assert!(view.delivery_agent.is_some());
        assert!(view.route.is_some());
        assert!(view.estimated_delivery_time.is_some());
        assert_eq!(view.unread_notifications.len(), 1);
    }

    #[test]
    fn pending_read_without_agents_stays_pending() {
        let f = fixture(false);

        let view = tracking_view(&f.state, f.order.id, f.customer_id, Role::Customer).unwrap();

        assert_eq!(view.status, OrderStatus::Pending);
        assert!(view.delivery_agent.is_none());
        assert!(view.route.is_none());
    }

    #[test]
    fn customer_view_hides_payment_and_order_value() {
        let f = fixture(true);

        let view = tracking_view(&f.state, f.order.id, f.customer_id, Role::Customer).unwrap();

        assert!(view.payment_status.is_none());
        assert!(view.order_value.is_none());
        assert!(view.customer.is_none());
    }

    #[test]
    fn delivery_view_carries_customer_and_payment() {
        let f = fixture(true);
        tracking_view(&f.state, f.order.id, f.customer_id, Role::Customer).unwrap();

        let view =
            tracking_view(&f.state, f.order.id, f.agent_user_id, Role::Delivery).unwrap();

        let customer = view.customer.expect("customer block for delivery role");
        assert_eq!(customer.customer_id, f.customer_id);
        assert!(view.payment_status.is_some());
        assert!(view.order_value.is_none());
        assert!(view.delivery_agent.is_none());
    }

    #[test]
    fn restaurant_view_carries_order_value() {
        let f = fixture(true);

        let view = tracking_view(&f.state, f.order.id, f.owner_id, Role::Restaurant).unwrap();

        assert_eq!(view.order_value, Some(25.0));
        assert!(view.payment_status.is_some());
        assert!(view.customer.is_none());
    }

    #[test]
    fn admin_view_carries_every_block() {
        let f = fixture(true);
        tracking_view(&f.state, f.order.id, f.customer_id, Role::Customer).unwrap();

        let view = tracking_view(&f.state, f.order.id, Uuid::new_v4(), Role::Admin).unwrap();

        assert!(view.delivery_agent.is_some());
        assert!(view.customer.is_some());
        assert!(view.payment_status.is_some());
        assert!(view.order_value.is_some());
    }

    #[test]
    fn only_the_assigned_agent_may_report_location() {
        let f = fixture(true);
        tracking_view(&f.state, f.order.id, f.customer_id, Role::Customer).unwrap();

        let point = GeoPoint {
            lat: 52.5305,
            lng: 13.4102,
        };

        let stranger = report_location(&f.state, f.order.id, Uuid::new_v4(), &point);
        assert!(matches!(stranger, Err(AppError::Forbidden(_))));

        let route = report_location(&f.state, f.order.id, f.agent_user_id, &point)
            .unwrap()
            .expect("route after location report");
        assert_eq!(route.waypoints.len(), 2);
        assert_eq!(route.waypoints[0].location, point);
    }

    #[test]
    fn reports_against_unassigned_orders_are_forbidden() {
        let f = fixture(false);
        let point = GeoPoint {
            lat: 52.5305,
            lng: 13.4102,
        };
        let result = report_location(&f.state, f.order.id, f.agent_user_id, &point);
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
