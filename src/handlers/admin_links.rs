//! Confirm/cancel links from the admin notification email. These are opened
//! by a mail client, so every outcome is a 200 with a readable page.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Html;
use serde::Deserialize;

use crate::services::action_token::ActionScope;
use crate::services::bookings::{self, LinkOutcome};
use crate::services::email::escape_html;
use crate::services::signing::TokenError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LinkQuery {
    pub token: Option<String>,
}

// GET /bookings/admin/confirm/:public_id
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Path(public_id): Path<String>,
    Query(query): Query<LinkQuery>,
) -> Html<String> {
    follow(&state, &public_id, query, ActionScope::AdminConfirm)
}

// GET /bookings/admin/cancel/:public_id
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(public_id): Path<String>,
    Query(query): Query<LinkQuery>,
) -> Html<String> {
    follow(&state, &public_id, query, ActionScope::AdminCancel)
}

fn follow(state: &Arc<AppState>, public_id: &str, query: LinkQuery, scope: ActionScope) -> Html<String> {
    let outcome = match query.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => bookings::follow_admin_link(state, public_id, token, scope),
        None => Ok(LinkOutcome::Rejected(TokenError::Malformed)),
    };

    let id = escape_html(public_id);
    let (verb, done) = match scope {
        ActionScope::AdminConfirm => ("confirm", "confirmed"),
        ActionScope::AdminCancel => ("cancel", "cancelled"),
    };

    let (title, message) = match outcome {
        Ok(LinkOutcome::Applied(booking)) => (
            format!("Booking {}", capitalize(done)),
            if booking.contact.email.is_some() {
                format!("Booking {id} has been {done}. The customer has been notified by email.")
            } else {
                format!("Booking {id} has been {done}. No customer email is on file, so no email was sent.")
            },
        ),
        Ok(LinkOutcome::AlreadyDone(_)) => (
            format!("Already {}", capitalize(done)),
            format!("Booking {id} is already {done}. No further action was taken."),
        ),
        Ok(LinkOutcome::NotApplicable(booking)) => (
            format!("Cannot {}", capitalize(verb)),
            format!(
                "Booking {id} is {} and can no longer be {done}.",
                booking.status.describe()
            ),
        ),
        Ok(LinkOutcome::UnknownBooking) => (
            "Booking Not Found".to_string(),
            format!("No booking with id {id} exists."),
        ),
        Ok(LinkOutcome::Rejected(TokenError::Expired)) => (
            "Link Expired".to_string(),
            "This link has expired. Please manage the booking from the admin dashboard."
                .to_string(),
        ),
        Ok(LinkOutcome::Rejected(TokenError::Malformed)) => (
            "Invalid Link".to_string(),
            "This link is not valid for this booking.".to_string(),
        ),
        Ok(LinkOutcome::Superseded) => (
            "Booking Changed".to_string(),
            format!("Booking {id} was updated while this link was being processed. Please check it again."),
        ),
        Err(e) => {
            tracing::error!(booking_id = %public_id, error = %e, "admin link failed");
            (
                "Something Went Wrong".to_string(),
                "The action could not be completed. Please try again later.".to_string(),
            )
        }
    };

    Html(page(&title, &message))
}

fn page(title: &str, message: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body style=\"font-family: Arial, sans-serif; max-width: 480px; margin: 40px auto;\">\
         <h2>{title}</h2><p>{message}</p></body></html>"
    )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
