use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Customer,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Email,
    InApp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationEvent {
    Received,
    NewBookingAlert,
    Cancelled,
    CancellationAlert,
    Confirmed,
    Completed,
    CompletionSummary,
    StatusChanged,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::Received => "received",
            NotificationEvent::NewBookingAlert => "new-booking-alert",
            NotificationEvent::Cancelled => "cancelled",
            NotificationEvent::CancellationAlert => "cancellation-alert",
            NotificationEvent::Confirmed => "confirmed",
            NotificationEvent::Completed => "completed",
            NotificationEvent::CompletionSummary => "completion-summary",
            NotificationEvent::StatusChanged => "status-changed",
        }
    }

    pub fn delivery(&self) -> Delivery {
        match self {
            NotificationEvent::StatusChanged => Delivery::InApp,
            _ => Delivery::Email,
        }
    }

    /// Whether a customer email may be looked up on the linked account when
    /// the booking itself carries none.
    pub fn falls_back_to_account_email(&self) -> bool {
        matches!(self, NotificationEvent::Completed)
    }
}

impl std::fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationIntent {
    pub recipient: Recipient,
    pub event: NotificationEvent,
}

impl NotificationIntent {
    pub const fn new(recipient: Recipient, event: NotificationEvent) -> Self {
        Self { recipient, event }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InAppNotification {
    pub id: i64,
    pub account_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}
