use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{delete, get, post};
use axum::Router;
use chrono::{Duration, Utc};
use tower::ServiceExt;

use classbook::config::AppConfig;
use classbook::db::{self, queries};
use classbook::handlers;
use classbook::models::{ClassInstance, Course, User};
use classbook::state::AppState;

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
    }
}

fn test_state() -> Arc<AppState> {
    let conn = db::init_db(":memory:").unwrap();
    seed(&conn);
    Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
    })
}

fn seed(conn: &rusqlite::Connection) {
    queries::create_user(
        conn,
        &User {
            id: "user-1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            token: "token-ada".to_string(),
        },
    )
    .unwrap();

    queries::create_course(
        conn,
        &Course {
            id: "course-flow".to_string(),
            name: "Morning Flow".to_string(),
            course_type: "flow".to_string(),
            price: 12.0,
            duration: "60".to_string(),
            description: "Gentle start to the day".to_string(),
            time: None,
        },
    )
    .unwrap();

    // A class comfortably outside the cancellation window
    seed_class(conn, "class-far", 5, 7);
    // A class later today: bookable, but inside the window
    seed_class(conn, "class-today", 5, 0);
    // A class with no free slots
    seed_class(conn, "class-full", 0, 7);
}

fn seed_class(conn: &rusqlite::Connection, id: &str, slots: i64, days_ahead: i64) {
    queries::create_class(
        conn,
        &ClassInstance {
            id: id.to_string(),
            course_id: "course-flow".to_string(),
            date: (Utc::now() + Duration::days(days_ahead)).date_naive(),
            time: Some("10:00".to_string()),
            start_time: None,
            teacher: "Maya".to_string(),
            room: "Studio A".to_string(),
            capacity: slots.max(1),
            available_slots: slots,
            comments: None,
        },
    )
    .unwrap();
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/classes", get(handlers::classes::list_classes))
        .route("/api/classes/:id", get(handlers::classes::get_class))
        .route(
            "/api/cart",
            get(handlers::cart::get_cart)
                .post(handlers::cart::add_to_cart)
                .delete(handlers::cart::clear_cart),
        )
        .route(
            "/api/cart/:class_id",
            delete(handlers::cart::remove_from_cart),
        )
        .route("/api/checkout", post(handlers::checkout::post_checkout))
        .route("/api/bookings", get(handlers::bookings::get_bookings))
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .with_state(state)
}

fn request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Device-Id", "device-1")
        .header("Authorization", "Bearer token-ada");
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(res: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    (status, json_body(res).await)
}

async fn add_to_cart(app: &Router, class_id: &str) -> (StatusCode, serde_json::Value) {
    send(
        app,
        request(
            "POST",
            "/api/cart",
            Some(serde_json::json!({ "class_id": class_id })),
        ),
    )
    .await
}

// ── Health & classes ──

#[tokio::test]
async fn test_health() {
    let app = test_app(test_state());
    let res = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_classes_includes_course_info() {
    let app = test_app(test_state());
    let (status, body) = send(&app, request("GET", "/api/classes", None)).await;

    assert_eq!(status, StatusCode::OK);
    let classes = body.as_array().unwrap();
    assert_eq!(classes.len(), 3);
    assert_eq!(classes[0]["course_info"]["name"], "Morning Flow");
    assert_eq!(classes[0]["course_info"]["price"], 12.0);
}

#[tokio::test]
async fn test_get_unknown_class_is_404() {
    let app = test_app(test_state());
    let (status, _) = send(&app, request("GET", "/api/classes/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Cart ──

#[tokio::test]
async fn test_cart_add_and_get() {
    let app = test_app(test_state());

    let (status, body) = add_to_cart(&app, "class-far").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["total"], 12.0);

    let (status, body) = send(&app, request("GET", "/api/cart", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["class_id"], "class-far");
    assert_eq!(body["items"][0]["title"], "Morning Flow");
}

#[tokio::test]
async fn test_cart_rejects_duplicate() {
    let app = test_app(test_state());

    add_to_cart(&app, "class-far").await;
    let (status, _) = add_to_cart(&app, "class-far").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send(&app, request("GET", "/api/cart", None)).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_cart_remove_and_clear() {
    let app = test_app(test_state());

    add_to_cart(&app, "class-far").await;
    add_to_cart(&app, "class-today").await;

    let (status, body) = send(&app, request("DELETE", "/api/cart/class-far", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = send(&app, request("DELETE", "/api/cart", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_cart_requires_session() {
    let app = test_app(test_state());
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/cart")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

// ── Checkout ──

#[tokio::test]
async fn test_checkout_without_auth_is_401() {
    let app = test_app(test_state());

    add_to_cart(&app, "class-far").await;

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/checkout")
                .header("X-Device-Id", "device-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_checkout_empty_cart_is_422() {
    let app = test_app(test_state());
    let (status, body) = send(&app, request("POST", "/api/checkout", None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["issues"][0]
        .as_str()
        .unwrap()
        .contains("cart is empty"));
}

#[tokio::test]
async fn test_checkout_books_and_decrements() {
    let app = test_app(test_state());

    add_to_cart(&app, "class-far").await;
    let (status, body) = send(&app, request("POST", "/api/checkout", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking_ids"].as_array().unwrap().len(), 1);

    let (_, class) = send(&app, request("GET", "/api/classes/class-far", None)).await;
    assert_eq!(class["available_slots"], 4);

    let (_, cart) = send(&app, request("GET", "/api/cart", None)).await;
    assert_eq!(cart["count"], 0);

    let (status, bookings) = send(&app, request("GET", "/api/bookings", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bookings.as_array().unwrap().len(), 1);
    assert_eq!(bookings[0]["status"], "confirmed");
    assert_eq!(bookings[0]["course_info"]["price"], 12.0);
    assert_eq!(bookings[0]["can_cancel"], true);
}

#[tokio::test]
async fn test_checkout_full_class_fails_atomically() {
    let app = test_app(test_state());

    add_to_cart(&app, "class-far").await;
    add_to_cart(&app, "class-full").await;

    let (status, body) = send(&app, request("POST", "/api/checkout", None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["issues"][0].as_str().unwrap().contains("fully booked"));

    // Nothing booked, the valid class untouched, the cart intact
    let (_, bookings) = send(&app, request("GET", "/api/bookings", None)).await;
    assert_eq!(bookings.as_array().unwrap().len(), 0);

    let (_, class) = send(&app, request("GET", "/api/classes/class-far", None)).await;
    assert_eq!(class["available_slots"], 5);

    let (_, cart) = send(&app, request("GET", "/api/cart", None)).await;
    assert_eq!(cart["count"], 2);
}

#[tokio::test]
async fn test_checkout_twice_reports_already_booked() {
    let app = test_app(test_state());

    add_to_cart(&app, "class-far").await;
    send(&app, request("POST", "/api/checkout", None)).await;

    add_to_cart(&app, "class-far").await;
    let (status, body) = send(&app, request("POST", "/api/checkout", None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["issues"][0]
        .as_str()
        .unwrap()
        .contains("already booked"));
}

// ── Cancellation ──

#[tokio::test]
async fn test_cancel_restores_slot_and_is_idempotent() {
    let app = test_app(test_state());

    add_to_cart(&app, "class-far").await;
    let (_, body) = send(&app, request("POST", "/api/checkout", None)).await;
    let booking_id = body["booking_ids"][0].as_str().unwrap().to_string();

    let uri = format!("/api/bookings/{booking_id}/cancel");
    let (status, _) = send(&app, request("POST", &uri, None)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, class) = send(&app, request("GET", "/api/classes/class-far", None)).await;
    assert_eq!(class["available_slots"], 5);

    // Second cancel finds nothing in the active partition
    let (status, _) = send(&app, request("POST", &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, class) = send(&app, request("GET", "/api/classes/class-far", None)).await;
    assert_eq!(class["available_slots"], 5);

    // The cancelled booking is still reported, with its timestamp
    let (_, bookings) = send(&app, request("GET", "/api/bookings", None)).await;
    assert_eq!(bookings.as_array().unwrap().len(), 1);
    assert_eq!(bookings[0]["status"], "cancelled");
    assert!(bookings[0]["cancelled_at"].is_string());
    assert_eq!(bookings[0]["can_cancel"], false);
}

#[tokio::test]
async fn test_cancel_within_window_is_409() {
    let app = test_app(test_state());

    add_to_cart(&app, "class-today").await;
    let (_, body) = send(&app, request("POST", "/api/checkout", None)).await;
    let booking_id = body["booking_ids"][0].as_str().unwrap().to_string();

    let uri = format!("/api/bookings/{booking_id}/cancel");
    let (status, body) = send(&app, request("POST", &uri, None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("24 hours"));

    let (_, class) = send(&app, request("GET", "/api/classes/class-today", None)).await;
    assert_eq!(class["available_slots"], 4);
}

#[tokio::test]
async fn test_bookings_require_auth() {
    let app = test_app(test_state());
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/bookings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
