use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::auth::{actor, authenticate};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingDraft, BookingStatus, Contact, Role};
use crate::services::bookings::{self, BookingChanges};
use crate::services::lifecycle::TransitionRequest;
use crate::services::session::SessionClaims;
use crate::services::validation::Validator;
use crate::state::AppState;

fn is_owner(booking: &Booking, claims: &SessionClaims) -> bool {
    booking.owner_ref.as_deref() == Some(claims.sub.as_str())
}

fn require_owner_or(booking: &Booking, claims: &SessionClaims, roles: &[Role]) -> Result<(), AppError> {
    if is_owner(booking, claims) || roles.contains(&claims.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Access denied".to_string()))
    }
}

const STAFF: &[Role] = &[Role::Admin, Role::Technician];
const ADMIN: &[Role] = &[Role::Admin];

// POST /bookings
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub service_id: Option<String>,
    #[serde(alias = "date")]
    pub scheduled_date: Option<String>,
    #[serde(alias = "time")]
    pub scheduled_time: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub problem_description: Option<String>,
    pub technician_id: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let claims = authenticate(&headers, &state)?;

    let mut v = Validator::new();
    let service_id = v.required("serviceId", req.service_id.as_deref(), "Service ID is required");
    let date = v.required(
        "scheduledDate",
        req.scheduled_date.as_deref(),
        "Scheduled date is required",
    );
    let time = v.required(
        "scheduledTime",
        req.scheduled_time.as_deref(),
        "Scheduled time is required",
    );
    let address = v.required("address", req.address.as_deref(), "Address is required");
    let phone = v.phone("phone", req.phone.as_deref());
    v.finish()?;

    let (Some(service_id), Some(address), Some(phone)) = (service_id, address, phone) else {
        return Err(AppError::Internal("validated fields missing".to_string()));
    };

    let (service, account, technician) = {
        let conn = state.conn()?;
        let service = queries::get_service(&conn, &service_id)?
            .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;
        let account = queries::get_account(&conn, &claims.sub)?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let technician = match req.technician_id.as_deref().filter(|t| !t.is_empty()) {
            Some(id) => queries::get_technician(&conn, id)?.filter(|t| t.available),
            None => None,
        };
        (service, account, technician)
    };

    let draft = BookingDraft {
        owner_ref: Some(account.id.clone()),
        contact: Contact {
            name: account.full_name.clone(),
            phone,
            email: Some(account.email.clone()).filter(|e| !e.is_empty()),
        },
        service: service.snapshot(),
        date,
        time,
        address,
        comments: String::new(),
        problem_description: req.problem_description.unwrap_or_default().trim().to_string(),
        technician_ref: technician.map(|t| t.user_id),
        created_note: format!("Booking created by logged-in user: {}", account.full_name),
    };
    let booking = bookings::create(&state, draft)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "Booking created successfully",
            "booking": booking,
        })),
    ))
}

// GET /bookings/mine
#[derive(Debug, Default, Deserialize)]
pub struct MyBookingsQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<MyBookingsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = authenticate(&headers, &state)?;

    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(BookingStatus::parse(s).ok_or_else(|| {
            AppError::Validation(vec![crate::errors::FieldError::new(
                "status",
                format!("Unknown status: {s}"),
            )])
        })?),
        None => None,
    };
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1).saturating_mul(limit);

    let (bookings, total) = {
        let conn = state.conn()?;
        let bookings =
            queries::get_bookings_for_owner(&conn, &claims.sub, status, limit, offset)?;
        let total = queries::count_bookings_for_owner(&conn, &claims.sub, status)?;
        (bookings, total)
    };

    Ok(Json(serde_json::json!({
        "success": true,
        "bookings": bookings,
        "pagination": {
            "total": total,
            "page": page,
            "limit": limit,
            "pages": (total + limit - 1) / limit,
        },
    })))
}

// GET /bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = authenticate(&headers, &state)?;
    let booking = bookings::load_by_id(&state, &id)?;
    require_owner_or(&booking, &claims, STAFF)?;
    Ok(Json(serde_json::json!({ "success": true, "booking": booking })))
}

// PUT /bookings/:id
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingRequest {
    pub address: Option<String>,
    pub phone: Option<String>,
    pub problem_description: Option<String>,
    #[serde(alias = "date")]
    pub scheduled_date: Option<String>,
    #[serde(alias = "time")]
    pub scheduled_time: Option<String>,
    pub service_price: Option<i64>,
}

pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateBookingRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = authenticate(&headers, &state)?;

    let mut v = Validator::new();
    let phone = match req.phone.as_deref() {
        Some(p) => v.phone("phone", Some(p)),
        None => None,
    };
    let address = match req.address.as_deref() {
        Some(a) => v.required("address", Some(a), "Address is required"),
        None => None,
    };
    let service_price = v.price("servicePrice", req.service_price);
    v.finish()?;

    let booking = bookings::load_by_id(&state, &id)?;
    require_owner_or(&booking, &claims, ADMIN)?;

    let changes = BookingChanges {
        address,
        phone,
        problem_description: req.problem_description.map(|p| p.trim().to_string()),
        date: req.scheduled_date,
        time: req.scheduled_time,
        service_price,
    };
    let booking = bookings::update_details(&state, booking, changes, claims.role == Role::Admin)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Booking updated successfully",
        "booking": booking,
    })))
}

// PUT /bookings/:id/cancel
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = authenticate(&headers, &state)?;
    let booking = bookings::load_by_id(&state, &id)?;
    require_owner_or(&booking, &claims, ADMIN)?;

    let booking = bookings::cancel_before_service(&state, booking, &actor(&claims), req.reason)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Booking cancelled successfully",
        "booking": booking,
    })))
}

// PUT /bookings/:id/status
#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
    pub notes: Option<String>,
    pub reason: Option<String>,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = authenticate(&headers, &state)?;
    if !claims.role.is_staff() {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let mut v = Validator::new();
    let raw = v.required("status", req.status.as_deref(), "Status is required");
    let target = raw.as_deref().and_then(BookingStatus::parse);
    if raw.is_some() && target.is_none() {
        v.error("status", "Unknown status");
    }
    v.finish()?;
    let Some(target) = target else {
        return Err(AppError::Internal("validated status missing".to_string()));
    };

    let booking = bookings::load_by_id(&state, &id)?;
    let booking = bookings::transition(
        &state,
        booking,
        target,
        &actor(&claims),
        TransitionRequest {
            note: req.notes,
            cancellation_reason: req.reason,
        },
    )?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Booking status updated to {}", booking.status),
        "booking": booking,
    })))
}

// POST /bookings/:id/feedback
#[derive(Debug, Default, Deserialize)]
pub struct FeedbackRequest {
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = authenticate(&headers, &state)?;

    let rating = match req.rating {
        Some(r @ 1..=5) => r as u8,
        _ => {
            return Err(AppError::Validation(vec![crate::errors::FieldError::new(
                "rating",
                "Rating must be between 1 and 5",
            )]))
        }
    };

    let booking = bookings::load_by_id(&state, &id)?;
    if !is_owner(&booking, &claims) {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let comment = req.comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    let booking = bookings::submit_feedback(&state, booking, rating, comment)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Feedback submitted successfully",
        "booking": booking,
    })))
}

// GET /bookings/:id/track
pub async fn track_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = authenticate(&headers, &state)?;
    let booking = bookings::load_by_id(&state, &id)?;
    require_owner_or(&booking, &claims, STAFF)?;

    let location = match booking.technician_ref.as_deref() {
        Some(technician) => {
            let conn = state.conn()?;
            queries::get_technician(&conn, technician)?.and_then(|t| t.location)
        }
        None => None,
    };

    let estimated_arrival =
        (booking.status == BookingStatus::OnTheWay).then_some("15-20 minutes");

    Ok(Json(serde_json::json!({
        "success": true,
        "location": location,
        "status": booking.status,
        "estimatedArrival": estimated_arrival,
    })))
}
