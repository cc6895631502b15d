use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingDraft, Contact, ServiceSnapshot};
use crate::services::bookings;
use crate::services::lifecycle::Actor;
use crate::services::validation::{normalize_phone, Validator};
use crate::state::AppState;

// POST /bookings/public
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicBookingRequest {
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub service: Option<ServiceInput>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub address: Option<String>,
    pub comments: Option<String>,
    pub problem_description: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

/// Service as picked in the client. Priced from `basePrice`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInput {
    pub title_key: Option<String>,
    pub name: Option<String>,
    pub icon: Option<String>,
    pub base_price: Option<i64>,
    pub category: Option<String>,
}

impl ServiceInput {
    fn snapshot(self) -> ServiceSnapshot {
        let name = self
            .name
            .or(self.title_key)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "AC Service".to_string());
        ServiceSnapshot {
            name,
            icon: self.icon.unwrap_or_else(|| "❄️".to_string()),
            price: self.base_price.unwrap_or(0),
            category: self.category.unwrap_or_else(|| "general".to_string()),
        }
    }
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PublicBookingRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let mut v = Validator::new();
    let name = v.required(
        "customerName",
        req.customer_name.as_deref(),
        "Customer name is required",
    );
    if let Some(n) = &name {
        if n.chars().count() < 2 {
            v.error("customerName", "Name must be at least 2 characters");
        }
    }
    let phone = v.phone("phone", req.phone.as_deref());
    let email = v.optional_email("email", req.email.as_deref());
    match &req.service {
        Some(service) => {
            v.price("service.basePrice", service.base_price);
        }
        None => v.error("service", "Service is required"),
    }
    let date = v.required("date", req.date.as_deref(), "Date is required");
    let time = v.required("time", req.time.as_deref(), "Time is required");
    let address = v.required("address", req.address.as_deref(), "Address is required");
    v.finish()?;

    let (Some(name), Some(phone), Some(service), Some(address)) = (name, phone, req.service, address)
    else {
        return Err(AppError::Internal("validated fields missing".to_string()));
    };

    // A claimed account id is only trusted if the account exists.
    let account = match req.user_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => {
            let conn = state.conn()?;
            let account = queries::get_account(&conn, id)?;
            if account.is_none() {
                tracing::info!(user_id = id, "unknown userId on public booking, creating guest booking");
            }
            account
        }
        None => None,
    };

    let created_note = match &account {
        Some(a) => format!(
            "Booking created by logged-in user: {}",
            req.user_name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(&a.full_name)
        ),
        None => "Booking created by guest".to_string(),
    };
    let email = email.or_else(|| {
        account
            .as_ref()
            .map(|a| a.email.clone())
            .filter(|e| !e.is_empty())
    });

    let draft = BookingDraft {
        owner_ref: account.as_ref().map(|a| a.id.clone()),
        contact: Contact { name, phone, email },
        service: service.snapshot(),
        date,
        time,
        address,
        comments: req.comments.unwrap_or_default().trim().to_string(),
        problem_description: req.problem_description.unwrap_or_default().trim().to_string(),
        technician_ref: None,
        created_note,
    };
    let booking = bookings::create(&state, draft)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "Booking created successfully",
            "data": {
                "bookingId": booking.public_id,
                "isLinkedToUser": booking.owner_ref.is_some(),
                "booking": booking,
            },
        })),
    ))
}

// GET /bookings/public/:public_id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(public_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let booking = bookings::load_by_public_id(&state, &public_id)?;
    Ok(Json(serde_json::json!({ "success": true, "data": { "booking": booking } })))
}

// GET /bookings/phone/:phone
pub async fn bookings_by_phone(
    State(state): State<Arc<AppState>>,
    Path(phone): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let phone = normalize_phone(&phone).unwrap_or(phone);
    let bookings = {
        let conn = state.conn()?;
        queries::get_bookings_for_phone(&conn, &phone)?
    };
    Ok(Json(serde_json::json!({ "success": true, "data": { "bookings": bookings } })))
}

// PUT /bookings/public/cancel/:public_id
#[derive(Debug, Default, Deserialize)]
pub struct PublicCancelRequest {
    pub reason: Option<String>,
    pub phone: Option<String>,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(public_id): Path<String>,
    Json(req): Json<PublicCancelRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut v = Validator::new();
    let phone = v.phone("phone", req.phone.as_deref());
    v.finish()?;

    let booking = bookings::load_by_public_id(&state, &public_id)?;
    if phone.as_deref() != Some(booking.contact.phone.as_str()) {
        tracing::warn!(booking_id = %public_id, "guest cancel with mismatched phone");
        return Err(AppError::Forbidden(
            "Phone number does not match booking".to_string(),
        ));
    }

    let booking = bookings::cancel_before_service(&state, booking, &Actor::Guest, req.reason)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Booking cancelled successfully",
        "data": {
            "bookingId": booking.public_id,
            "status": booking.status,
            "cancelledAt": booking.cancelled_at,
        },
    })))
}
