//! Which notifications a booking event raises. Pure lookups; delivery is the
//! dispatcher's job.

use crate::models::{BookingStatus, NotificationEvent, NotificationIntent, Recipient};

/// Who drove a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionSource {
    Customer,
    Staff,
    AdminLink,
}

const CREATED: &[NotificationIntent] = &[
    NotificationIntent::new(Recipient::Customer, NotificationEvent::Received),
    NotificationIntent::new(Recipient::Admin, NotificationEvent::NewBookingAlert),
];

const CANCELLED: &[NotificationIntent] = &[
    NotificationIntent::new(Recipient::Customer, NotificationEvent::Cancelled),
    NotificationIntent::new(Recipient::Admin, NotificationEvent::CancellationAlert),
];

const CONFIRMED_BY_LINK: &[NotificationIntent] = &[NotificationIntent::new(
    Recipient::Customer,
    NotificationEvent::Confirmed,
)];

const COMPLETED: &[NotificationIntent] = &[
    NotificationIntent::new(Recipient::Customer, NotificationEvent::Completed),
    NotificationIntent::new(Recipient::Admin, NotificationEvent::CompletionSummary),
];

const STATUS_CHANGED: &[NotificationIntent] = &[NotificationIntent::new(
    Recipient::Customer,
    NotificationEvent::StatusChanged,
)];

pub fn on_created() -> &'static [NotificationIntent] {
    CREATED
}

pub fn on_transition(
    from: BookingStatus,
    to: BookingStatus,
    source: TransitionSource,
) -> &'static [NotificationIntent] {
    use BookingStatus::*;

    match (from, to, source) {
        (_, Completed, _) => COMPLETED,
        (Pending | Confirmed, Cancelled, _) => CANCELLED,
        (_, Confirmed, TransitionSource::AdminLink) => CONFIRMED_BY_LINK,
        _ => STATUS_CHANGED,
    }
}
