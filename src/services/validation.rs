use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{AppError, FieldError};
use crate::models::MAX_SERVICE_PRICE;

pub const PHONE_MESSAGE: &str =
    "Please enter a valid international phone number (e.g., +923001234567)";

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+[1-9]\d{6,14}$").expect("phone pattern compiles"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$").expect("email pattern compiles"))
}

/// Strips formatting and returns the E.164 form, or `None` if the number is
/// not a valid international number.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let clean: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    phone_regex().is_match(&clean).then_some(clean)
}

pub fn is_valid_email(raw: &str) -> bool {
    email_regex().is_match(raw.trim())
}

/// Collects field errors in request order.
#[derive(Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Trimmed, non-empty value or an error under `field`.
    pub fn required(
        &mut self,
        field: &'static str,
        value: Option<&str>,
        message: &str,
    ) -> Option<String> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => Some(v.to_string()),
            None => {
                self.error(field, message);
                None
            }
        }
    }

    pub fn phone(&mut self, field: &'static str, value: Option<&str>) -> Option<String> {
        let raw = self.required(field, value, "Phone number is required")?;
        match normalize_phone(&raw) {
            Some(phone) => Some(phone),
            None => {
                self.error(field, PHONE_MESSAGE);
                None
            }
        }
    }

    /// Optional email; blank counts as absent.
    pub fn optional_email(&mut self, field: &'static str, value: Option<&str>) -> Option<String> {
        let email = value.map(str::trim).filter(|v| !v.is_empty())?;
        if is_valid_email(email) {
            Some(email.to_lowercase())
        } else {
            self.error(field, "Please enter a valid email");
            None
        }
    }

    /// Absent prices pass; present ones must lie in `0..=MAX_SERVICE_PRICE`.
    pub fn price(&mut self, field: &'static str, value: Option<i64>) -> Option<i64> {
        let price = value?;
        if price < 0 {
            self.error(field, "Price cannot be negative");
            None
        } else if price > MAX_SERVICE_PRICE {
            self.error(field, format!("Price cannot exceed {MAX_SERVICE_PRICE}"));
            None
        } else {
            Some(price)
        }
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}
