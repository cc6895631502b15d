//! Best-effort delivery of notification intents. Runs after the booking
//! change is persisted; nothing here can fail the request that caused it.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::task::JoinHandle;

use crate::db::queries;
use crate::models::{Booking, Delivery, NotificationEvent, NotificationIntent, Recipient};
use crate::services::action_token::ActionScope;
use crate::state::AppState;

/// Hands `intents` to a background task and returns immediately. Each
/// failure is logged and dropped; later intents are still attempted.
pub fn dispatch(
    state: &Arc<AppState>,
    booking: &Booking,
    intents: &[NotificationIntent],
) -> JoinHandle<()> {
    let state = Arc::clone(state);
    let booking = booking.clone();
    let intents = intents.to_vec();

    tokio::spawn(async move {
        for intent in intents {
            if let Err(e) = deliver(&state, &booking, intent).await {
                tracing::warn!(
                    booking_id = %booking.public_id,
                    event = %intent.event,
                    error = %e,
                    "notification failed"
                );
            }
        }
    })
}

async fn deliver(
    state: &AppState,
    booking: &Booking,
    intent: NotificationIntent,
) -> anyhow::Result<()> {
    match intent.event.delivery() {
        Delivery::InApp => store_in_app(state, booking, intent.event),
        Delivery::Email => {
            let Some(to) = resolve_address(state, booking, intent)? else {
                tracing::debug!(
                    booking_id = %booking.public_id,
                    event = %intent.event,
                    "no email address on file, skipping"
                );
                return Ok(());
            };
            let data = email_data(state, booking, intent.event)?;
            state.email.send(&to, intent.event, &data).await?;
            tracing::info!(
                booking_id = %booking.public_id,
                event = %intent.event,
                to = %to,
                "notification sent"
            );
            Ok(())
        }
    }
}

fn resolve_address(
    state: &AppState,
    booking: &Booking,
    intent: NotificationIntent,
) -> anyhow::Result<Option<String>> {
    match intent.recipient {
        Recipient::Admin => {
            let admin = state.config.admin_email.trim();
            Ok((!admin.is_empty()).then(|| admin.to_string()))
        }
        Recipient::Customer => {
            if let Some(email) = booking.contact.email.as_ref().filter(|e| !e.is_empty()) {
                return Ok(Some(email.clone()));
            }
            if !intent.event.falls_back_to_account_email() {
                return Ok(None);
            }
            let Some(owner) = booking.owner_ref.as_deref() else {
                return Ok(None);
            };
            let conn = state.conn()?;
            let account = queries::get_account(&conn, owner)?;
            Ok(account.map(|a| a.email).filter(|e| !e.is_empty()))
        }
    }
}

pub fn template_data(booking: &Booking) -> serde_json::Value {
    json!({
        "bookingId": booking.public_id,
        "orderNumber": booking.order_number,
        "customerName": booking.contact.name,
        "phone": booking.contact.phone,
        "serviceName": booking.service.name,
        "serviceIcon": booking.service.icon,
        "date": booking.schedule.date,
        "time": booking.schedule.time,
        "address": booking.address,
        "status": booking.status,
        "servicePrice": booking.pricing.service_price(),
        "visitCharge": booking.pricing.visit_charge(),
        "totalAmount": booking.pricing.total_amount(),
        "cancellationReason": booking.cancellation_reason,
    })
}

fn email_data(
    state: &AppState,
    booking: &Booking,
    event: NotificationEvent,
) -> anyhow::Result<serde_json::Value> {
    let mut data = template_data(booking);
    if event == NotificationEvent::NewBookingAlert {
        data["confirmUrl"] = json!(action_url(state, booking, ActionScope::AdminConfirm)?);
        data["cancelUrl"] = json!(action_url(state, booking, ActionScope::AdminCancel)?);
    }
    Ok(data)
}

fn action_url(state: &AppState, booking: &Booking, scope: ActionScope) -> anyhow::Result<String> {
    let token = state
        .action_tokens
        .issue(&booking.public_id, scope, Utc::now().naive_utc())?;
    let action = match scope {
        ActionScope::AdminConfirm => "confirm",
        ActionScope::AdminCancel => "cancel",
    };
    Ok(format!(
        "{}/bookings/admin/{action}/{}?token={token}",
        state.config.public_base_url, booking.public_id
    ))
}

fn store_in_app(state: &AppState, booking: &Booking, event: NotificationEvent) -> anyhow::Result<()> {
    // Guest bookings have no inbox.
    let Some(owner) = booking.owner_ref.as_deref() else {
        return Ok(());
    };
    let conn = state.conn()?;
    queries::insert_notification(
        &conn,
        owner,
        "booking",
        "Booking Status Updated",
        &format!(
            "Your booking {} is now {}",
            booking.public_id,
            booking.status.describe()
        ),
        &json!({ "bookingId": booking.public_id, "status": booking.status, "event": event }),
    )?;
    tracing::info!(booking_id = %booking.public_id, account_id = owner, "in-app notification stored");
    Ok(())
}
