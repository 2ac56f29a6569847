use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;

use crate::services::cart::CartStore;
use crate::services::checkout::{self, CheckoutError};
use crate::services::validation::CartIssue;
use crate::state::AppState;

// POST /api/checkout
pub async fn post_checkout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, Response> {
    let mut db = state.db.lock().unwrap();
    let user = super::resolve_user(&db, &headers);
    let owner = super::cart_owner(&headers, user.as_ref()).ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "you must be signed in to complete your booking"})),
        )
            .into_response()
    })?;

    let mut cart = CartStore::load(&db, &owner);
    let now = Utc::now().naive_utc();

    match checkout::checkout(&mut db, &mut cart, user.as_ref().map(|u| u.id.as_str()), now) {
        Ok(booking_ids) => {
            let noun = if booking_ids.len() == 1 { "class" } else { "classes" };
            Ok(Json(serde_json::json!({
                "message": format!("Successfully booked {} {noun}!", booking_ids.len()),
                "booking_ids": booking_ids,
            })))
        }
        Err(CheckoutError::Validation(issues)) => {
            let status = if issues.contains(&CartIssue::NotAuthenticated) {
                StatusCode::UNAUTHORIZED
            } else {
                StatusCode::UNPROCESSABLE_ENTITY
            };
            let messages: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
            Err((
                status,
                Json(serde_json::json!({
                    "error": CheckoutError::Validation(issues).to_string(),
                    "issues": messages,
                })),
            )
                .into_response())
        }
        Err(err @ CheckoutError::Failed) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": err.to_string()})),
        )
            .into_response()),
    }
}
