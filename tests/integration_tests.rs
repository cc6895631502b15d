use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use coolfix::config::AppConfig;
use coolfix::db::{self, queries};
use coolfix::handlers;
use coolfix::models::{Account, NotificationEvent, Role, ServiceItem, Technician};
use coolfix::services::action_token::ActionScope;
use coolfix::services::email::EmailProvider;
use coolfix::state::AppState;

// ── Mock Providers ──

#[derive(Debug, Clone)]
struct SentEmail {
    to: String,
    event: NotificationEvent,
    data: Value,
}

type Outbox = Arc<Mutex<Vec<SentEmail>>>;

struct MockEmail {
    sent: Outbox,
}

#[async_trait]
impl EmailProvider for MockEmail {
    async fn send(&self, to: &str, event: NotificationEvent, data: &Value) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            event,
            data: data.clone(),
        });
        Ok(())
    }
}

struct FailingEmail;

#[async_trait]
impl EmailProvider for FailingEmail {
    async fn send(&self, _to: &str, _event: NotificationEvent, _data: &Value) -> anyhow::Result<()> {
        anyhow::bail!("smtp relay unreachable")
    }
}

// ── Helpers ──

const BASE_URL: &str = "http://localhost:5000";
const ADMIN_EMAIL: &str = "admin@coolfix.test";

fn test_config() -> AppConfig {
    AppConfig {
        port: 5000,
        database_url: ":memory:".to_string(),
        action_token_secret: "test-action-secret".to_string(),
        session_secret: "test-session-secret".to_string(),
        action_token_ttl_hours: 168,
        public_base_url: BASE_URL.to_string(),
        admin_email: ADMIN_EMAIL.to_string(),
        brevo_api_key: String::new(),
        email_sender_name: "CoolFix".to_string(),
        email_sender_address: "noreply@coolfix.test".to_string(),
        visit_charge: 200,
    }
}

fn test_state() -> (Arc<AppState>, Outbox) {
    let conn = db::init_db(":memory:").unwrap();
    let sent: Outbox = Arc::new(Mutex::new(vec![]));
    let email = MockEmail {
        sent: Arc::clone(&sent),
    };
    let state = Arc::new(AppState::new(conn, test_config(), Box::new(email)).unwrap());
    (state, sent)
}

fn seed_account(state: &AppState, id: &str, name: &str, email: &str, role: Role) -> String {
    let conn = state.db.lock().unwrap();
    queries::insert_account(
        &conn,
        &Account {
            id: id.to_string(),
            full_name: name.to_string(),
            email: email.to_string(),
            phone: "+923001234567".to_string(),
            role,
        },
    )
    .unwrap();
    drop(conn);
    state
        .sessions
        .issue(id, role, chrono::Duration::hours(1), Utc::now().naive_utc())
        .unwrap()
}

fn seed_technician(state: &AppState, id: &str) -> String {
    let token = seed_account(state, id, "Imran Tech", "imran@coolfix.test", Role::Technician);
    let conn = state.db.lock().unwrap();
    queries::upsert_technician(
        &conn,
        &Technician {
            user_id: id.to_string(),
            available: true,
            rating: 0.0,
            total_ratings: 0,
            completed_jobs: 0,
            location: None,
        },
    )
    .unwrap();
    token
}

async fn call(
    state: &Arc<AppState>,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = handlers::router(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn call_html(state: &Arc<AppState>, uri: &str) -> (StatusCode, String) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let res = handlers::router(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Waits for the background dispatcher to deliver `event` `count` times.
async fn wait_for_sent(sent: &Outbox, event: NotificationEvent, count: usize) -> Vec<SentEmail> {
    for _ in 0..100 {
        let matching: Vec<SentEmail> = sent
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event == event)
            .cloned()
            .collect();
        if matching.len() >= count {
            return matching;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {count} x {event}");
}

/// Lets pending dispatch tasks run, then counts `event`.
async fn settled_count(sent: &Outbox, event: NotificationEvent) -> usize {
    tokio::time::sleep(Duration::from_millis(50)).await;
    sent.lock()
        .unwrap()
        .iter()
        .filter(|e| e.event == event)
        .count()
}

fn booking_body(phone: &str, base_price: i64) -> Value {
    json!({
        "customerName": "Sana Khan",
        "phone": phone,
        "email": "sana@example.com",
        "service": {
            "name": "Split AC Repair",
            "icon": "❄️",
            "basePrice": base_price,
            "category": "ac"
        },
        "date": "2026-03-01",
        "time": "10:30 AM",
        "address": "House 12, Street 4, DHA Phase 5",
        "comments": "Call before arriving"
    })
}

async fn create_public(state: &Arc<AppState>, body: Value) -> Value {
    let (status, json) = call(state, "POST", "/bookings/public", None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["data"]["booking"].clone()
}

/// Path and query of an action link from the admin alert.
fn link_path(alert: &SentEmail, key: &str) -> String {
    alert.data[key]
        .as_str()
        .unwrap()
        .strip_prefix(BASE_URL)
        .unwrap()
        .to_string()
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let (state, _) = test_state();
    let (status, json) = call(&state, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["status"], "OK");
    assert!(json["timestamp"].is_string());
}

// ── Public gateway ──

#[tokio::test]
async fn test_public_booking_prices_and_notifies() {
    let (state, sent) = test_state();
    let booking = create_public(&state, booking_body("+92 300 1234567", 3000)).await;

    assert_eq!(booking["status"], "pending");
    assert_eq!(booking["pricing"]["servicePrice"], 3000);
    assert_eq!(booking["pricing"]["visitCharge"], 200);
    assert_eq!(booking["pricing"]["totalAmount"], 3200);
    assert_eq!(booking["contact"]["phone"], "+923001234567");
    assert_eq!(booking["statusHistory"].as_array().unwrap().len(), 1);
    assert_eq!(booking["statusHistory"][0]["note"], "Booking created by guest");
    assert!(booking["publicId"].as_str().unwrap().starts_with("BK"));
    assert!(booking["orderNumber"].as_str().unwrap().starts_with("ORD-"));

    let received = wait_for_sent(&sent, NotificationEvent::Received, 1).await;
    assert_eq!(received[0].to, "sana@example.com");

    let alerts = wait_for_sent(&sent, NotificationEvent::NewBookingAlert, 1).await;
    assert_eq!(alerts[0].to, ADMIN_EMAIL);
    let public_id = booking["publicId"].as_str().unwrap();
    assert!(link_path(&alerts[0], "confirmUrl")
        .starts_with(&format!("/bookings/admin/confirm/{public_id}?token=")));
    assert!(link_path(&alerts[0], "cancelUrl")
        .starts_with(&format!("/bookings/admin/cancel/{public_id}?token=")));
}

#[tokio::test]
async fn test_public_booking_validation_collects_errors() {
    let (state, sent) = test_state();
    let (status, json) = call(
        &state,
        "POST",
        "/bookings/public",
        None,
        Some(json!({ "phone": "03001234567", "email": "nope" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Customer name is required");
    let fields: Vec<&str> = json["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(
        fields,
        vec!["customerName", "phone", "email", "service", "date", "time", "address"]
    );
    assert_eq!(settled_count(&sent, NotificationEvent::NewBookingAlert).await, 0);
}

#[tokio::test]
async fn test_public_booking_rejects_out_of_range_price() {
    let (state, sent) = test_state();
    for price in [i64::MAX, -1] {
        let (status, json) = call(
            &state,
            "POST",
            "/bookings/public",
            None,
            Some(booking_body("+923001234567", price)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");
        assert_eq!(json["errors"][0]["field"], "service.basePrice");
    }
    assert_eq!(settled_count(&sent, NotificationEvent::NewBookingAlert).await, 0);
}

#[tokio::test]
async fn test_public_booking_links_known_account_only() {
    let (state, _) = test_state();
    seed_account(&state, "acc-1", "Ali Raza", "ali@example.com", Role::Customer);

    let mut body = booking_body("+923001234567", 1500);
    body["userId"] = json!("acc-1");
    body["email"] = json!("");
    let linked = create_public(&state, body).await;
    assert_eq!(linked["ownerRef"], "acc-1");
    assert_eq!(linked["contact"]["email"], "ali@example.com");
    assert_eq!(
        linked["statusHistory"][0]["note"],
        "Booking created by logged-in user: Ali Raza"
    );

    let mut body = booking_body("+923001234567", 1500);
    body["userId"] = json!("ghost");
    let guest = create_public(&state, body).await;
    assert!(guest["ownerRef"].is_null());
}

#[tokio::test]
async fn test_guest_booking_without_email_only_alerts_admin() {
    let (state, sent) = test_state();
    let mut body = booking_body("+923001234567", 1000);
    body.as_object_mut().unwrap().remove("email");
    create_public(&state, body).await;

    wait_for_sent(&sent, NotificationEvent::NewBookingAlert, 1).await;
    assert_eq!(settled_count(&sent, NotificationEvent::Received).await, 0);
}

#[tokio::test]
async fn test_lookup_by_public_id_and_phone() {
    let (state, _) = test_state();
    let booking = create_public(&state, booking_body("+923001234567", 2000)).await;
    create_public(&state, booking_body("+923001234567", 2500)).await;
    create_public(&state, booking_body("+923009999999", 2500)).await;

    let public_id = booking["publicId"].as_str().unwrap();
    let (status, json) = call(&state, "GET", &format!("/bookings/public/{public_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["booking"]["id"], booking["id"]);

    let (status, json) = call(&state, "GET", "/bookings/phone/+923001234567", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["bookings"].as_array().unwrap().len(), 2);

    let (status, _) = call(&state, "GET", "/bookings/public/BK0", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_guest_cancel_with_wrong_phone_is_forbidden() {
    let (state, sent) = test_state();
    let booking = create_public(&state, booking_body("+923001234567", 3000)).await;
    let public_id = booking["publicId"].as_str().unwrap();

    let (status, json) = call(
        &state,
        "PUT",
        &format!("/bookings/public/cancel/{public_id}"),
        None,
        Some(json!({ "phone": "+923009999999", "reason": "Changed my mind" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{json}");

    let (_, json) = call(&state, "GET", &format!("/bookings/public/{public_id}"), None, None).await;
    assert_eq!(json["data"]["booking"]["status"], "pending");
    assert_eq!(settled_count(&sent, NotificationEvent::Cancelled).await, 0);
    assert_eq!(settled_count(&sent, NotificationEvent::CancellationAlert).await, 0);
}

#[tokio::test]
async fn test_guest_cancel_requires_phone() {
    let (state, _) = test_state();
    let booking = create_public(&state, booking_body("+923001234567", 3000)).await;
    let public_id = booking["publicId"].as_str().unwrap();

    let (status, json) = call(
        &state,
        "PUT",
        &format!("/bookings/public/cancel/{public_id}"),
        None,
        Some(json!({ "reason": "no phone" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Phone number is required");
}

#[tokio::test]
async fn test_guest_cancel_with_matching_phone() {
    let (state, sent) = test_state();
    let booking = create_public(&state, booking_body("+923001234567", 3000)).await;
    let public_id = booking["publicId"].as_str().unwrap();

    let (status, json) = call(
        &state,
        "PUT",
        &format!("/bookings/public/cancel/{public_id}"),
        None,
        Some(json!({ "phone": "+92 300 1234567" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["status"], "cancelled");
    assert!(json["data"]["cancelledAt"].is_string());

    let cancelled = wait_for_sent(&sent, NotificationEvent::Cancelled, 1).await;
    assert_eq!(cancelled[0].data["cancellationReason"], "Cancelled by customer");
    let alerts = wait_for_sent(&sent, NotificationEvent::CancellationAlert, 1).await;
    assert_eq!(alerts[0].to, ADMIN_EMAIL);

    // Terminal now.
    let (status, _) = call(
        &state,
        "PUT",
        &format!("/bookings/public/cancel/{public_id}"),
        None,
        Some(json!({ "phone": "+923001234567" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Admin email links ──

#[tokio::test]
async fn test_full_lifecycle_through_links_and_staff() {
    let (state, sent) = test_state();
    let customer = seed_account(&state, "cust-1", "Sana Khan", "sana@example.com", Role::Customer);
    let technician = seed_technician(&state, "tech-1");

    let mut body = booking_body("+923001234567", 3000);
    body["userId"] = json!("cust-1");
    let booking = create_public(&state, body).await;
    assert_eq!(booking["pricing"]["totalAmount"], 3200);
    let id = booking["id"].as_str().unwrap().to_string();

    // Admin confirms from the email.
    let alert = wait_for_sent(&sent, NotificationEvent::NewBookingAlert, 1).await.remove(0);
    let (status, html) = call_html(&state, &link_path(&alert, "confirmUrl")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Booking Confirmed"), "{html}");
    wait_for_sent(&sent, NotificationEvent::Confirmed, 1).await;

    let (_, json) = call(&state, "GET", &format!("/bookings/{id}"), Some(&customer), None).await;
    let history = json["booking"]["statusHistory"].as_array().unwrap();
    assert_eq!(json["booking"]["status"], "confirmed");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["status"], "pending");
    assert_eq!(history[1]["status"], "confirmed");

    // Customers cannot drive the lifecycle.
    let (status, _) = call(
        &state,
        "PUT",
        &format!("/bookings/{id}/status"),
        Some(&customer),
        Some(json!({ "status": "on_the_way" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for target in ["in_progress", "completed"] {
        let (status, json) = call(
            &state,
            "PUT",
            &format!("/bookings/{id}/status"),
            Some(&technician),
            Some(json!({ "status": target })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["booking"]["status"], target);
    }

    let (_, json) = call(&state, "GET", &format!("/bookings/{id}"), Some(&customer), None).await;
    assert!(json["booking"]["completedAt"].is_string());
    assert_eq!(json["booking"]["technicianRef"], "tech-1");
    assert_eq!(json["booking"]["statusHistory"].as_array().unwrap().len(), 4);

    wait_for_sent(&sent, NotificationEvent::Completed, 1).await;
    wait_for_sent(&sent, NotificationEvent::CompletionSummary, 1).await;
    assert_eq!(settled_count(&sent, NotificationEvent::Completed).await, 1);
    assert_eq!(settled_count(&sent, NotificationEvent::CompletionSummary).await, 1);

    // The in_progress step is in-app only.
    let notifications = {
        let conn = state.db.lock().unwrap();
        queries::get_notifications_for_account(&conn, "cust-1", 10).unwrap()
    };
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].message.contains("in progress"));
}

#[tokio::test]
async fn test_confirm_link_twice_is_idempotent() {
    let (state, sent) = test_state();
    let booking = create_public(&state, booking_body("+923001234567", 3000)).await;
    let public_id = booking["publicId"].as_str().unwrap();
    let alert = wait_for_sent(&sent, NotificationEvent::NewBookingAlert, 1).await.remove(0);
    let confirm = link_path(&alert, "confirmUrl");

    let (_, first) = call_html(&state, &confirm).await;
    assert!(first.contains("Booking Confirmed"));
    assert!(first.contains("The customer has been notified by email."), "{first}");
    let (status, second) = call_html(&state, &confirm).await;
    assert_eq!(status, StatusCode::OK);
    assert!(second.contains("Already Confirmed"), "{second}");

    let (_, json) = call(&state, "GET", &format!("/bookings/public/{public_id}"), None, None).await;
    assert_eq!(json["data"]["booking"]["statusHistory"].as_array().unwrap().len(), 2);
    assert_eq!(settled_count(&sent, NotificationEvent::Confirmed).await, 1);
}

#[tokio::test]
async fn test_confirm_page_for_guest_without_email() {
    let (state, sent) = test_state();
    let mut body = booking_body("+923001234567", 3000);
    body.as_object_mut().unwrap().remove("email");
    create_public(&state, body).await;
    let alert = wait_for_sent(&sent, NotificationEvent::NewBookingAlert, 1).await.remove(0);

    let (status, html) = call_html(&state, &link_path(&alert, "confirmUrl")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Booking Confirmed"), "{html}");
    assert!(html.contains("No customer email is on file"), "{html}");
    assert!(!html.contains("has been notified"));
    assert_eq!(settled_count(&sent, NotificationEvent::Confirmed).await, 0);
}

#[tokio::test]
async fn test_cancel_link_on_completed_booking_is_informational() {
    let (state, sent) = test_state();
    let technician = seed_technician(&state, "tech-1");
    let booking = create_public(&state, booking_body("+923001234567", 3000)).await;
    let id = booking["id"].as_str().unwrap();
    let public_id = booking["publicId"].as_str().unwrap();
    let alert = wait_for_sent(&sent, NotificationEvent::NewBookingAlert, 1).await.remove(0);

    let (status, _) = call(
        &state,
        "PUT",
        &format!("/bookings/{id}/status"),
        Some(&technician),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, html) = call_html(&state, &link_path(&alert, "cancelUrl")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Cannot Cancel"), "{html}");

    let (_, json) = call(&state, "GET", &format!("/bookings/public/{public_id}"), None, None).await;
    assert_eq!(json["data"]["booking"]["status"], "completed");
    assert_eq!(settled_count(&sent, NotificationEvent::CancellationAlert).await, 0);
}

#[tokio::test]
async fn test_cancel_link_cancels_pending_booking() {
    let (state, sent) = test_state();
    let booking = create_public(&state, booking_body("+923001234567", 3000)).await;
    let public_id = booking["publicId"].as_str().unwrap();
    let alert = wait_for_sent(&sent, NotificationEvent::NewBookingAlert, 1).await.remove(0);

    let (status, html) = call_html(&state, &link_path(&alert, "cancelUrl")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Booking Cancelled"), "{html}");

    let (_, json) = call(&state, "GET", &format!("/bookings/public/{public_id}"), None, None).await;
    assert_eq!(json["data"]["booking"]["status"], "cancelled");
    assert_eq!(
        json["data"]["booking"]["cancellationReason"],
        "Cancelled by admin via email"
    );
    wait_for_sent(&sent, NotificationEvent::Cancelled, 1).await;
    wait_for_sent(&sent, NotificationEvent::CancellationAlert, 1).await;
}

#[tokio::test]
async fn test_expired_and_foreign_tokens_render_explanations() {
    let (state, _) = test_state();
    let first = create_public(&state, booking_body("+923001234567", 3000)).await;
    let second = create_public(&state, booking_body("+923001234567", 3000)).await;
    let first_id = first["publicId"].as_str().unwrap();
    let second_id = second["publicId"].as_str().unwrap();

    let stale = state
        .action_tokens
        .issue(
            first_id,
            ActionScope::AdminConfirm,
            Utc::now().naive_utc() - chrono::Duration::days(8),
        )
        .unwrap();
    let (status, html) =
        call_html(&state, &format!("/bookings/admin/confirm/{first_id}?token={stale}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Link Expired"), "{html}");

    let foreign = state
        .action_tokens
        .issue(first_id, ActionScope::AdminConfirm, Utc::now().naive_utc())
        .unwrap();
    let (status, html) =
        call_html(&state, &format!("/bookings/admin/confirm/{second_id}?token={foreign}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Invalid Link"), "{html}");

    // A confirm token cannot cancel.
    let (_, html) =
        call_html(&state, &format!("/bookings/admin/cancel/{first_id}?token={foreign}")).await;
    assert!(html.contains("Invalid Link"), "{html}");

    let (_, html) = call_html(&state, &format!("/bookings/admin/confirm/{first_id}")).await;
    assert!(html.contains("Invalid Link"), "{html}");

    let (_, json) = call(&state, "GET", &format!("/bookings/public/{second_id}"), None, None).await;
    assert_eq!(json["data"]["booking"]["status"], "pending");
}

#[tokio::test]
async fn test_link_for_unknown_booking() {
    let (state, _) = test_state();
    let token = state
        .action_tokens
        .issue("BK404", ActionScope::AdminConfirm, Utc::now().naive_utc())
        .unwrap();
    let (status, html) =
        call_html(&state, &format!("/bookings/admin/confirm/BK404?token={token}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Booking Not Found"));
}

#[tokio::test]
async fn test_email_failure_does_not_undo_transition() {
    let conn = db::init_db(":memory:").unwrap();
    let state = Arc::new(AppState::new(conn, test_config(), Box::new(FailingEmail)).unwrap());

    let booking = create_public(&state, booking_body("+923001234567", 3000)).await;
    let public_id = booking["publicId"].as_str().unwrap();
    let token = state
        .action_tokens
        .issue(public_id, ActionScope::AdminConfirm, Utc::now().naive_utc())
        .unwrap();

    let (_, html) = call_html(&state, &format!("/bookings/admin/confirm/{public_id}?token={token}")).await;
    assert!(html.contains("Booking Confirmed"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (_, json) = call(&state, "GET", &format!("/bookings/public/{public_id}"), None, None).await;
    assert_eq!(json["data"]["booking"]["status"], "confirmed");
}

#[test]
fn test_state_rejects_unrepresentable_token_ttl() {
    for hours in [i64::MAX, 0, -1] {
        let conn = db::init_db(":memory:").unwrap();
        let mut config = test_config();
        config.action_token_ttl_hours = hours;
        let err = AppState::new(conn, config, Box::new(FailingEmail)).err().unwrap();
        assert!(err.to_string().contains("ACTION_TOKEN_TTL_HOURS"), "{err}");
    }
}

// ── Authenticated gateway ──

#[tokio::test]
async fn test_authenticated_routes_require_session() {
    let (state, _) = test_state();
    let (status, _) = call(&state, "GET", "/bookings/mine", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&state, "GET", "/bookings/mine", Some("garbage.token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_from_catalog_and_list_mine() {
    let (state, sent) = test_state();
    let customer = seed_account(&state, "cust-1", "Sana Khan", "sana@example.com", Role::Customer);
    seed_technician(&state, "tech-1");
    {
        let conn = state.db.lock().unwrap();
        queries::insert_service(
            &conn,
            &ServiceItem {
                id: "svc-ac".to_string(),
                name: "AC Gas Refill".to_string(),
                icon: "❄️".to_string(),
                base_price: 4500,
                category: "ac".to_string(),
                active: true,
            },
        )
        .unwrap();
    }

    let (status, json) = call(
        &state,
        "POST",
        "/bookings",
        Some(&customer),
        Some(json!({
            "serviceId": "svc-ac",
            "scheduledDate": "2026-03-02",
            "scheduledTime": "14:00",
            "address": "Gulberg III",
            "phone": "+923001234567",
            "technicianId": "tech-1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["booking"]["status"], "pending");
    assert_eq!(json["booking"]["service"]["name"], "AC Gas Refill");
    assert_eq!(json["booking"]["pricing"]["totalAmount"], 4700);
    assert_eq!(json["booking"]["technicianRef"], "tech-1");
    assert_eq!(json["booking"]["schedule"]["scheduledAt"], "2026-03-02T14:00:00");
    wait_for_sent(&sent, NotificationEvent::NewBookingAlert, 1).await;

    let (status, _) = call(
        &state,
        "POST",
        "/bookings",
        Some(&customer),
        Some(json!({
            "serviceId": "svc-missing",
            "scheduledDate": "2026-03-02",
            "scheduledTime": "14:00",
            "address": "Gulberg III",
            "phone": "+923001234567"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = call(&state, "GET", "/bookings/mine?limit=5", Some(&customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["bookings"].as_array().unwrap().len(), 1);
    assert_eq!(json["pagination"]["total"], 1);
    assert_eq!(json["pagination"]["pages"], 1);

    let (_, json) = call(
        &state,
        "GET",
        "/bookings/mine?status=completed",
        Some(&customer),
        None,
    )
    .await;
    assert_eq!(json["bookings"].as_array().unwrap().len(), 0);

    let (status, json) = call(
        &state,
        "GET",
        &format!("/bookings/mine?page={}&limit=100", i64::MAX),
        Some(&customer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["bookings"].as_array().unwrap().len(), 0);
    assert_eq!(json["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_other_customers_cannot_see_booking() {
    let (state, _) = test_state();
    seed_account(&state, "cust-1", "Sana Khan", "sana@example.com", Role::Customer);
    let stranger = seed_account(&state, "cust-2", "Omar", "omar@example.com", Role::Customer);

    let mut body = booking_body("+923001234567", 3000);
    body["userId"] = json!("cust-1");
    let booking = create_public(&state, body).await;
    let id = booking["id"].as_str().unwrap();

    let (status, _) = call(&state, "GET", &format!("/bookings/{id}"), Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(
        &state,
        "PUT",
        &format!("/bookings/{id}/cancel"),
        Some(&stranger),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_rules() {
    let (state, _) = test_state();
    let customer = seed_account(&state, "cust-1", "Sana Khan", "sana@example.com", Role::Customer);
    let admin = seed_account(&state, "admin-1", "Admin", "admin@coolfix.test", Role::Admin);

    let mut body = booking_body("+923001234567", 3000);
    body["userId"] = json!("cust-1");
    let booking = create_public(&state, body).await;
    let id = booking["id"].as_str().unwrap();
    let uri = format!("/bookings/{id}");

    let (status, json) = call(
        &state,
        "PUT",
        &uri,
        Some(&customer),
        Some(json!({ "address": "New address", "date": "2026-03-05", "time": "09:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["booking"]["address"], "New address");
    assert_eq!(json["booking"]["schedule"]["scheduledAt"], "2026-03-05T09:00:00");

    let (status, _) = call(&state, "PUT", &uri, Some(&customer), Some(json!({ "servicePrice": 1 }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = call(&state, "PUT", &uri, Some(&admin), Some(json!({ "servicePrice": 4000 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["booking"]["pricing"]["totalAmount"], 4200);

    let (status, json) = call(
        &state,
        "PUT",
        &uri,
        Some(&admin),
        Some(json!({ "servicePrice": i64::MAX })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errors"][0]["field"], "servicePrice");
    let (_, json) = call(&state, "GET", &uri, Some(&admin), None).await;
    assert_eq!(json["booking"]["pricing"]["totalAmount"], 4200);

    let (status, _) = call(
        &state,
        "PUT",
        &format!("{uri}/status"),
        Some(&admin),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = call(&state, "PUT", &uri, Some(&customer), Some(json!({ "date": "2026-03-09" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errors"][0]["field"], "date");
}

#[tokio::test]
async fn test_invalid_staff_transition_is_rejected() {
    let (state, _) = test_state();
    let technician = seed_technician(&state, "tech-1");
    let booking = create_public(&state, booking_body("+923001234567", 3000)).await;
    let id = booking["id"].as_str().unwrap();

    let (status, json) = call(
        &state,
        "PUT",
        &format!("/bookings/{id}/status"),
        Some(&technician),
        Some(json!({ "status": "on_the_way" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid status transition from pending to on_the_way");

    let (status, _) = call(
        &state,
        "PUT",
        &format!("/bookings/{id}/status"),
        Some(&technician),
        Some(json!({ "status": "teleported" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feedback_updates_technician_rating_once() {
    let (state, _) = test_state();
    let customer = seed_account(&state, "cust-1", "Sana Khan", "sana@example.com", Role::Customer);
    let technician = seed_technician(&state, "tech-1");

    let mut body = booking_body("+923001234567", 3000);
    body["userId"] = json!("cust-1");
    let booking = create_public(&state, body).await;
    let id = booking["id"].as_str().unwrap();

    let (status, _) = call(
        &state,
        "POST",
        &format!("/bookings/{id}/feedback"),
        Some(&customer),
        Some(json!({ "rating": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    call(
        &state,
        "PUT",
        &format!("/bookings/{id}/status"),
        Some(&technician),
        Some(json!({ "status": "completed", "notes": "Replaced capacitor" })),
    )
    .await;

    let (status, json) = call(
        &state,
        "POST",
        &format!("/bookings/{id}/feedback"),
        Some(&customer),
        Some(json!({ "rating": 5, "comment": "Quick and tidy" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["booking"]["customerFeedback"]["rating"], 5);
    assert_eq!(json["booking"]["technicianNotes"], "Replaced capacitor");

    let (status, _) = call(
        &state,
        "POST",
        &format!("/bookings/{id}/feedback"),
        Some(&customer),
        Some(json!({ "rating": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let tech = {
        let conn = state.db.lock().unwrap();
        queries::get_technician(&conn, "tech-1").unwrap().unwrap()
    };
    assert_eq!(tech.rating, 5.0);
    assert_eq!(tech.total_ratings, 1);
    assert_eq!(tech.completed_jobs, 1);
}

#[tokio::test]
async fn test_track_reports_eta_while_on_the_way() {
    let (state, _) = test_state();
    let customer = seed_account(&state, "cust-1", "Sana Khan", "sana@example.com", Role::Customer);
    let technician = seed_technician(&state, "tech-1");

    let mut body = booking_body("+923001234567", 3000);
    body["userId"] = json!("cust-1");
    let booking = create_public(&state, body).await;
    let id = booking["id"].as_str().unwrap();

    let (_, json) = call(&state, "GET", &format!("/bookings/{id}/track"), Some(&customer), None).await;
    assert!(json["estimatedArrival"].is_null());
    assert!(json["location"].is_null());

    for target in ["confirmed", "assigned", "on_the_way"] {
        let (status, json) = call(
            &state,
            "PUT",
            &format!("/bookings/{id}/status"),
            Some(&technician),
            Some(json!({ "status": target })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{json}");
    }

    let (status, json) = call(&state, "GET", &format!("/bookings/{id}/track"), Some(&customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "on_the_way");
    assert_eq!(json["estimatedArrival"], "15-20 minutes");
}
