pub mod bookings;
pub mod cart;
pub mod checkout;
pub mod classes;
pub mod health;

use axum::http::HeaderMap;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::User;

/// Resolves the signed-in user from a bearer token, if any. The booking
/// services receive the result explicitly; nothing reads auth state
/// ambiently.
pub(crate) fn resolve_user(conn: &Connection, headers: &HeaderMap) -> Option<User> {
    let auth = headers.get("authorization")?.to_str().ok()?;
    let token = auth.strip_prefix("Bearer ")?;
    match queries::find_user_by_token(conn, token) {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("token lookup failed: {e:?}");
            None
        }
    }
}

/// The durable-storage key for this session's cart: the device id when
/// the client sends one, otherwise the signed-in user. Carts built
/// before sign-in stay reachable after it as long as the device id is
/// stable.
pub(crate) fn cart_owner(headers: &HeaderMap, user: Option<&User>) -> Option<String> {
    if let Some(device) = headers.get("x-device-id").and_then(|v| v.to_str().ok()) {
        if !device.trim().is_empty() {
            return Some(device.trim().to_string());
        }
    }
    user.map(|u| u.id.clone())
}
