use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;

use crate::errors::AppError;
use crate::services::bookings::{self, BookingView, CancelError};
use crate::state::AppState;

// GET /api/bookings
pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<BookingView>>, AppError> {
    let db = state.db.lock().unwrap();
    let user = super::resolve_user(&db, &headers).ok_or(AppError::Unauthorized)?;

    let views = bookings::get_user_bookings(&db, &user.id, Utc::now().naive_utc())?;
    Ok(Json(views))
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> Result<Json<serde_json::Value>, Response> {
    let mut db = state.db.lock().unwrap();
    let user = super::resolve_user(&db, &headers)
        .ok_or_else(|| AppError::Unauthorized.into_response())?;

    match bookings::cancel_booking(&mut db, &booking_id, &user.id, Utc::now().naive_utc()) {
        Ok(()) => Ok(Json(serde_json::json!({
            "message": "Your booking has been cancelled."
        }))),
        Err(err) => {
            let status = match err {
                CancelError::BookingNotFound | CancelError::ClassNotFound => StatusCode::NOT_FOUND,
                CancelError::WindowClosed => StatusCode::CONFLICT,
                CancelError::Failed => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((
                status,
                Json(serde_json::json!({"error": err.to_string()})),
            )
                .into_response())
        }
    }
}
