use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::CartEntry;
use crate::services::cart::{AddOutcome, CartStore};
use crate::state::AppState;

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartEntry>,
    pub total: f64,
    pub count: usize,
}

impl CartResponse {
    fn from_store(cart: &CartStore) -> Self {
        Self {
            items: cart.entries().to_vec(),
            total: cart.total(),
            count: cart.count(),
        }
    }
}

fn owner(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    let db = state.db.lock().unwrap();
    let user = super::resolve_user(&db, headers);
    super::cart_owner(headers, user.as_ref()).ok_or(AppError::Unauthorized)
}

// GET /api/cart
pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<CartResponse>, AppError> {
    let owner = owner(&state, &headers)?;
    let db = state.db.lock().unwrap();
    let cart = CartStore::load(&db, &owner);
    Ok(Json(CartResponse::from_store(&cart)))
}

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub class_id: String,
}

// POST /api/cart
pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AddToCartRequest>,
) -> Result<Json<CartResponse>, AppError> {
    let owner = owner(&state, &headers)?;
    let db = state.db.lock().unwrap();

    let class = queries::get_class(&db, &req.class_id)?
        .ok_or_else(|| AppError::NotFound(format!("class {}", req.class_id)))?;

    let mut cart = CartStore::load(&db, &owner);
    match cart.add_to_cart(&db, &class)? {
        AddOutcome::Added => Ok(Json(CartResponse::from_store(&cart))),
        AddOutcome::Duplicate => Err(AppError::Conflict(
            "this class is already in your cart".to_string(),
        )),
    }
}

// DELETE /api/cart/:class_id
pub async fn remove_from_cart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(class_id): Path<String>,
) -> Result<Json<CartResponse>, AppError> {
    let owner = owner(&state, &headers)?;
    let db = state.db.lock().unwrap();

    let mut cart = CartStore::load(&db, &owner);
    cart.remove_from_cart(&db, &class_id);
    Ok(Json(CartResponse::from_store(&cart)))
}

// DELETE /api/cart
pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<CartResponse>, AppError> {
    let owner = owner(&state, &headers)?;
    let db = state.db.lock().unwrap();

    let mut cart = CartStore::load(&db, &owner);
    cart.clear(&db);
    Ok(Json(CartResponse::from_store(&cart)))
}
