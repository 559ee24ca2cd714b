use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::identity::Identity;
use crate::error::AppError;
use crate::models::agent::GeoPoint;
use crate::models::catalog::{MenuItem, Restaurant};
use crate::state::AppState;
use crate::tracking::Role;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/restaurants", post(register_restaurant).get(list_restaurants))
        .route("/restaurants/:id/menu", post(add_menu_item).get(list_menu))
}

#[derive(Deserialize)]
pub struct RegisterRestaurantRequest {
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
}

async fn register_restaurant(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(payload): Json<RegisterRestaurantRequest>,
) -> Result<Json<Restaurant>, AppError> {
    if !matches!(identity.role, Role::Restaurant | Role::Admin) {
        return Err(AppError::Forbidden(
            "only restaurant accounts can register restaurants".to_string(),
        ));
    }

    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name cannot be empty".to_string()));
    }

    if !payload.location.in_bounds() {
        return Err(AppError::InvalidInput(
            "location coordinates out of range".to_string(),
        ));
    }

    let restaurant = Restaurant {
        id: Uuid::new_v4(),
        owner_id: identity.user_id,
        name: payload.name,
        address: payload.address,
        location: payload.location,
    };

    state.restaurants.insert(restaurant.id, restaurant.clone());
    Ok(Json(restaurant))
}

async fn list_restaurants(State(state): State<Arc<AppState>>) -> Json<Vec<Restaurant>> {
    let restaurants = state
        .restaurants
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(restaurants)
}

#[derive(Deserialize)]
pub struct AddMenuItemRequest {
    pub name: String,
    pub price: f64,
}

async fn add_menu_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    identity: Identity,
    Json(payload): Json<AddMenuItemRequest>,
) -> Result<Json<MenuItem>, AppError> {
    let owner_id = state
        .restaurants
        .get(&id)
        .map(|restaurant| restaurant.owner_id)
        .ok_or_else(|| AppError::NotFound(format!("restaurant {id} not found")))?;

    if identity.role != Role::Admin && owner_id != identity.user_id {
        return Err(AppError::Forbidden(
            "only the restaurant owner can edit the menu".to_string(),
        ));
    }

    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name cannot be empty".to_string()));
    }

    if payload.price <= 0.0 {
        return Err(AppError::InvalidInput("price must be positive".to_string()));
    }

    let item = MenuItem {
        id: Uuid::new_v4(),
        restaurant_id: id,
        name: payload.name,
        price: payload.price,
    };

    state.menu_items.insert(item.id, item.clone());
    Ok(Json(item))
}

async fn list_menu(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MenuItem>>, AppError> {
    if !state.restaurants.contains_key(&id) {
        return Err(AppError::NotFound(format!("restaurant {id} not found")));
    }

    let items = state
        .menu_items
        .iter()
        .filter(|entry| entry.value().restaurant_id == id)
        .map(|entry| entry.value().clone())
        .collect();
    Ok(Json(items))
}
