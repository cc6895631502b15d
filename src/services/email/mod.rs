pub mod brevo;
pub mod console;

use async_trait::async_trait;

use crate::models::NotificationEvent;

/// Outbound transactional email. Callers never rely on the result beyond
/// logging it.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(
        &self,
        to: &str,
        event: NotificationEvent,
        data: &serde_json::Value,
    ) -> anyhow::Result<()>;
}

pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

fn field<'a>(data: &'a serde_json::Value, key: &str) -> &'a str {
    data.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// Escapes text for HTML bodies and quoted attribute values.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Bare-bones rendering used by the transports. Layout is not a concern of
/// this service.
pub fn render(event: NotificationEvent, data: &serde_json::Value) -> RenderedEmail {
    let booking_id = field(data, "bookingId");
    let name = field(data, "customerName");
    let service = field(data, "serviceName");

    let subject = match event {
        NotificationEvent::Received => format!("Booking received - {booking_id}"),
        NotificationEvent::NewBookingAlert => format!("New booking {booking_id} from {name}"),
        NotificationEvent::Cancelled => format!("Booking cancelled - {booking_id}"),
        NotificationEvent::CancellationAlert => format!("Booking {booking_id} was cancelled"),
        NotificationEvent::Confirmed => format!("Booking confirmed - {booking_id}"),
        NotificationEvent::Completed => format!("Service completed - {booking_id}"),
        NotificationEvent::CompletionSummary => format!("Booking {booking_id} completed"),
        NotificationEvent::StatusChanged => format!("Booking {booking_id} updated"),
    };

    let mut lines = vec![
        format!("<p>Booking: <strong>{}</strong></p>", escape_html(booking_id)),
        format!("<p>Customer: {}</p>", escape_html(name)),
        format!("<p>Service: {}</p>", escape_html(service)),
    ];
    if let Some(total) = data.get("totalAmount").and_then(|v| v.as_i64()) {
        lines.push(format!("<p>Total: Rs. {total}</p>"));
    }
    let reason = field(data, "cancellationReason");
    if !reason.is_empty() {
        lines.push(format!("<p>Reason: {}</p>", escape_html(reason)));
    }
    if event == NotificationEvent::NewBookingAlert {
        lines.push(format!(
            "<p><a href=\"{}\">Confirm booking</a> | <a href=\"{}\">Cancel booking</a></p>",
            escape_html(field(data, "confirmUrl")),
            escape_html(field(data, "cancelUrl")),
        ));
    }

    RenderedEmail {
        subject,
        html: lines.join("\n"),
    }
}
