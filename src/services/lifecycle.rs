use chrono::NaiveDateTime;

use crate::errors::LifecycleError;
use crate::models::{Booking, BookingStatus, Feedback, NotificationIntent, Role, StatusHistoryEntry};
use crate::services::policy::{self, TransitionSource};

/// Legal destinations per source status. Every status change goes through
/// this lookup; terminal statuses have none.
pub fn allowed_destinations(from: BookingStatus) -> &'static [BookingStatus] {
    use BookingStatus::*;

    match from {
        Pending => &[Confirmed, Completed, Cancelled],
        Confirmed => &[Assigned, InProgress, Completed, Cancelled],
        Assigned => &[OnTheWay, InProgress, Completed, Cancelled],
        OnTheWay => &[InProgress, Completed, Cancelled],
        InProgress => &[Completed, Cancelled],
        Completed | Cancelled => &[],
    }
}

pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    allowed_destinations(from).contains(&to)
}

/// Statuses from which a customer (or the phone holder of a guest booking)
/// may still cancel.
pub fn customer_can_cancel(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::Pending | BookingStatus::Confirmed)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Actor {
    /// Anonymous holder of the booking's phone number.
    Guest,
    Account { id: String, role: Role },
    /// Admin acting through a signed email link.
    AdminLink,
}

impl Actor {
    pub fn label(&self) -> &'static str {
        match self {
            Actor::Guest => "customer",
            Actor::Account { role, .. } => role.as_str(),
            Actor::AdminLink => "admin via email link",
        }
    }

    pub fn is_staff(&self) -> bool {
        match self {
            Actor::Guest => false,
            Actor::Account { role, .. } => role.is_staff(),
            Actor::AdminLink => true,
        }
    }

    fn source(&self) -> TransitionSource {
        match self {
            Actor::AdminLink => TransitionSource::AdminLink,
            actor if actor.is_staff() => TransitionSource::Staff,
            _ => TransitionSource::Customer,
        }
    }

    fn default_cancellation_reason(&self) -> &'static str {
        match self {
            Actor::Guest => "Cancelled by customer",
            Actor::Account { role, .. } => match role {
                Role::Customer => "Cancelled by customer",
                Role::Technician => "Cancelled by technician",
                Role::Admin => "Cancelled by admin",
            },
            Actor::AdminLink => "Cancelled by admin via email",
        }
    }

    fn technician_id(&self) -> Option<&str> {
        match self {
            Actor::Account {
                id,
                role: Role::Technician,
            } => Some(id.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransitionRequest {
    pub note: Option<String>,
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub intents: Vec<NotificationIntent>,
}

/// Moves `booking` to `target`, or leaves it untouched and fails.
///
/// Returns the notifications the change calls for. Nothing is sent from
/// here; callers dispatch after the new state is persisted.
pub fn apply_transition(
    booking: &mut Booking,
    target: BookingStatus,
    actor: &Actor,
    request: TransitionRequest,
    now: NaiveDateTime,
) -> Result<Transition, LifecycleError> {
    let from = booking.status;
    if !can_transition(from, target) {
        return Err(LifecycleError::InvalidTransition { from, to: target });
    }

    let note = request
        .note
        .filter(|n| !n.trim().is_empty())
        .map(|n| n.trim().to_string());

    booking.status = target;
    booking.updated_at = now;
    booking.status_history.push(StatusHistoryEntry {
        status: target,
        timestamp: now,
        note: note
            .clone()
            .unwrap_or_else(|| format!("Status changed from {from} to {target} by {}", actor.label())),
    });

    match target {
        BookingStatus::Completed => booking.completed_at = Some(now),
        BookingStatus::Cancelled => {
            booking.cancelled_at = Some(now);
            booking.cancellation_reason = Some(
                request
                    .cancellation_reason
                    .filter(|r| !r.trim().is_empty())
                    .map(|r| r.trim().to_string())
                    .unwrap_or_else(|| actor.default_cancellation_reason().to_string()),
            );
        }
        _ => {}
    }

    if actor.is_staff() {
        if let Some(note) = note {
            booking.technician_notes = Some(note);
        }
    }

    if booking.technician_ref.is_none() {
        if let Some(technician) = actor.technician_id() {
            booking.technician_ref = Some(technician.to_string());
        }
    }

    tracing::info!(
        booking_id = %booking.public_id,
        from = %from,
        to = %target,
        actor = actor.label(),
        "booking status changed"
    );

    Ok(Transition {
        from,
        to: target,
        intents: policy::on_transition(from, target, actor.source()).to_vec(),
    })
}

/// Records the customer's rating. Only once, and only after completion.
pub fn submit_feedback(
    booking: &mut Booking,
    rating: u8,
    comment: Option<String>,
    now: NaiveDateTime,
) -> Result<(), LifecycleError> {
    if booking.status != BookingStatus::Completed {
        return Err(LifecycleError::FeedbackNotAllowed);
    }
    if booking.customer_feedback.is_some() {
        return Err(LifecycleError::FeedbackAlreadySubmitted);
    }
    booking.customer_feedback = Some(Feedback {
        rating,
        comment,
        date: now,
    });
    booking.updated_at = now;
    Ok(())
}
