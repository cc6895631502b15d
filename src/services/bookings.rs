//! Booking operations shared by the public, authenticated and admin-link
//! gateways. Every status change follows the same path: read, apply the
//! transition, conditional write, then dispatch.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};

use crate::db::queries;
use crate::errors::{AppError, FieldError, LifecycleError};
use crate::models::{Booking, BookingDraft, BookingStatus, Schedule};
use crate::services::action_token::ActionScope;
use crate::services::lifecycle::{self, Actor, TransitionRequest};
use crate::services::signing::TokenError;
use crate::services::{notifier, policy};
use crate::state::AppState;

fn price_out_of_range(field: &'static str) -> AppError {
    AppError::Validation(vec![FieldError::new(field, "Service price is out of range")])
}

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub fn load_by_id(state: &AppState, id: &str) -> Result<Booking, AppError> {
    let conn = state.conn()?;
    queries::get_booking_by_id(&conn, id)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

pub fn load_by_public_id(state: &AppState, public_id: &str) -> Result<Booking, AppError> {
    let conn = state.conn()?;
    queries::get_booking_by_public_id(&conn, public_id)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

/// Persists a new pending booking and raises the creation notifications.
pub fn create(state: &Arc<AppState>, draft: BookingDraft) -> Result<Booking, AppError> {
    let mut booking = Booking::open(draft, state.config.visit_charge, now())
        .map_err(|_| price_out_of_range("service.basePrice"))?;
    {
        let conn = state.conn()?;
        let mut attempts = 0;
        loop {
            match queries::insert_booking(&conn, &booking) {
                Ok(()) => break,
                Err(e) if attempts < 3 && queries::is_unique_violation(&e) => {
                    attempts += 1;
                    booking.reissue_identifiers(now());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    tracing::info!(
        booking_id = %booking.public_id,
        order_number = %booking.order_number,
        guest = booking.owner_ref.is_none(),
        "booking created"
    );

    notifier::dispatch(state, &booking, policy::on_created());
    Ok(booking)
}

/// Applies `target` to a freshly loaded booking and writes it back only if
/// nobody changed the status in between.
pub fn transition(
    state: &Arc<AppState>,
    mut booking: Booking,
    target: BookingStatus,
    actor: &Actor,
    request: TransitionRequest,
) -> Result<Booking, AppError> {
    let transition = lifecycle::apply_transition(&mut booking, target, actor, request, now())?;

    let written = {
        let conn = state.conn()?;
        queries::persist_transition(&conn, &booking, transition.from)?
    };
    if !written {
        tracing::warn!(
            booking_id = %booking.public_id,
            from = %transition.from,
            to = %transition.to,
            "lost status update race"
        );
        return Err(AppError::Conflict);
    }

    notifier::dispatch(state, &booking, &transition.intents);
    Ok(booking)
}

/// Cancellation by the customer or on their behalf. Only allowed before
/// work has started.
pub fn cancel_before_service(
    state: &Arc<AppState>,
    booking: Booking,
    actor: &Actor,
    reason: Option<String>,
) -> Result<Booking, AppError> {
    if !lifecycle::customer_can_cancel(booking.status) {
        return Err(LifecycleError::InvalidTransition {
            from: booking.status,
            to: BookingStatus::Cancelled,
        }
        .into());
    }
    transition(
        state,
        booking,
        BookingStatus::Cancelled,
        actor,
        TransitionRequest {
            note: None,
            cancellation_reason: reason,
        },
    )
}

#[derive(Debug, Default, Clone)]
pub struct BookingChanges {
    pub address: Option<String>,
    pub phone: Option<String>,
    pub problem_description: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub service_price: Option<i64>,
}

/// Edits the non-lifecycle fields. Schedule changes are only accepted while
/// the booking is pending, and only admins may reprice.
pub fn update_details(
    state: &Arc<AppState>,
    mut booking: Booking,
    changes: BookingChanges,
    is_admin: bool,
) -> Result<Booking, AppError> {
    if changes.service_price.is_some() && !is_admin {
        return Err(AppError::Forbidden(
            "Only admins can change the service price".to_string(),
        ));
    }
    if (changes.date.is_some() || changes.time.is_some())
        && booking.status != BookingStatus::Pending
    {
        return Err(AppError::Validation(vec![FieldError::new(
            "date",
            "Date and time can only be changed while the booking is pending",
        )]));
    }

    if let Some(address) = changes.address {
        booking.address = address;
    }
    if let Some(phone) = changes.phone {
        booking.contact.phone = phone;
    }
    if let Some(problem) = changes.problem_description {
        booking.problem_description = problem;
    }
    if changes.date.is_some() || changes.time.is_some() {
        booking.schedule = Schedule::new(
            changes.date.or(booking.schedule.date.take()),
            changes.time.or(booking.schedule.time.take()),
        );
    }
    if let Some(price) = changes.service_price {
        booking
            .pricing
            .set_service_price(price)
            .map_err(|_| price_out_of_range("servicePrice"))?;
    }
    booking.updated_at = now();

    let written = {
        let conn = state.conn()?;
        queries::update_booking_details(&conn, &booking, booking.status)?
    };
    if !written {
        return Err(AppError::Conflict);
    }
    tracing::info!(booking_id = %booking.public_id, "booking details updated");
    Ok(booking)
}

/// Stores the customer's rating and folds it into the technician's stats.
pub fn submit_feedback(
    state: &Arc<AppState>,
    mut booking: Booking,
    rating: u8,
    comment: Option<String>,
) -> Result<Booking, AppError> {
    lifecycle::submit_feedback(&mut booking, rating, comment, now())?;
    let Some(feedback) = booking.customer_feedback.as_ref() else {
        return Err(AppError::Internal("feedback missing after submit".to_string()));
    };

    let conn = state.conn()?;
    if !queries::save_feedback(&conn, &booking.id, feedback)? {
        return Err(LifecycleError::FeedbackAlreadySubmitted.into());
    }
    if let Some(technician) = booking.technician_ref.as_deref() {
        queries::record_technician_rating(&conn, technician, rating)?;
    }
    tracing::info!(booking_id = %booking.public_id, rating, "feedback recorded");
    Ok(booking)
}

/// What happened when an admin opened an email action link.
#[derive(Debug)]
pub enum LinkOutcome {
    Applied(Booking),
    /// The booking already has the status the link asks for.
    AlreadyDone(Booking),
    /// The booking moved on and the action no longer applies.
    NotApplicable(Booking),
    UnknownBooking,
    Rejected(TokenError),
    /// Someone else changed the booking while the link was processed.
    Superseded,
}

pub fn follow_admin_link(
    state: &Arc<AppState>,
    public_id: &str,
    token: &str,
    scope: ActionScope,
) -> Result<LinkOutcome, AppError> {
    if let Err(e) = state.action_tokens.verify_for(token, public_id, scope, now()) {
        tracing::warn!(booking_id = %public_id, scope = scope.as_str(), error = %e, "admin link rejected");
        return Ok(LinkOutcome::Rejected(e));
    }

    let booking = {
        let conn = state.conn()?;
        queries::get_booking_by_public_id(&conn, public_id)?
    };
    let Some(booking) = booking else {
        return Ok(LinkOutcome::UnknownBooking);
    };

    let target = match scope {
        ActionScope::AdminConfirm => BookingStatus::Confirmed,
        ActionScope::AdminCancel => BookingStatus::Cancelled,
    };
    if booking.status == target {
        return Ok(LinkOutcome::AlreadyDone(booking));
    }
    if !lifecycle::can_transition(booking.status, target) {
        return Ok(LinkOutcome::NotApplicable(booking));
    }

    let request = match scope {
        ActionScope::AdminConfirm => TransitionRequest {
            note: Some("Booking confirmed by admin via email".to_string()),
            cancellation_reason: None,
        },
        ActionScope::AdminCancel => TransitionRequest {
            note: Some("Booking cancelled by admin via email".to_string()),
            cancellation_reason: None,
        },
    };

    match transition(state, booking, target, &Actor::AdminLink, request) {
        Ok(booking) => Ok(LinkOutcome::Applied(booking)),
        Err(AppError::Conflict) => Ok(LinkOutcome::Superseded),
        Err(e) => Err(e),
    }
}
