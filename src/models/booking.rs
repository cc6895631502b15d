use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub public_id: String,
    pub order_number: String,
    pub owner_ref: Option<String>,
    pub contact: Contact,
    pub service: ServiceSnapshot,
    pub schedule: Schedule,
    pub address: String,
    pub comments: String,
    pub problem_description: String,
    pub pricing: Pricing,
    pub status: BookingStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    pub technician_ref: Option<String>,
    pub technician_notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub customer_feedback: Option<Feedback>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Assigned,
    OnTheWay,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 7] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Assigned,
        BookingStatus::OnTheWay,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Assigned => "assigned",
            BookingStatus::OnTheWay => "on_the_way",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        BookingStatus::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Customer-facing phrase, as in "your booking is now ...".
    pub fn describe(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Assigned => "assigned to a technician",
            BookingStatus::OnTheWay => "technician is on the way",
            BookingStatus::InProgress => "in progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusHistoryEntry {
    pub status: BookingStatus,
    pub timestamp: NaiveDateTime,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

/// Copy of the catalog entry taken at booking time. Later catalog edits
/// never reach existing bookings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSnapshot {
    pub name: String,
    pub icon: String,
    pub price: i64,
    pub category: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub date: Option<String>,
    pub time: Option<String>,
    pub scheduled_at: Option<NaiveDateTime>,
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];
const TIME_FORMATS: &[&str] = &["%I:%M %p", "%I:%M%p", "%H:%M", "%H:%M:%S"];

impl Schedule {
    pub fn new(date: Option<String>, time: Option<String>) -> Self {
        let scheduled_at = match (&date, &time) {
            (Some(d), Some(t)) => normalize_datetime(d, t),
            _ => None,
        };
        Self {
            date,
            time,
            scheduled_at,
        }
    }
}

fn normalize_datetime(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(date.trim(), f).ok())?;
    let time = TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(time.trim(), f).ok())?;
    Some(date.and_time(time))
}

/// Highest service price a booking accepts, in rupees.
pub const MAX_SERVICE_PRICE: i64 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("price out of range")]
pub struct PriceOutOfRange;

/// Booking price. The total is always derived; there is no way to set it.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    service_price: i64,
    visit_charge: i64,
    total_amount: i64,
}

impl Pricing {
    pub fn new(service_price: i64, visit_charge: i64) -> Result<Self, PriceOutOfRange> {
        if !(0..=MAX_SERVICE_PRICE).contains(&service_price) || visit_charge < 0 {
            return Err(PriceOutOfRange);
        }
        let total_amount = service_price
            .checked_add(visit_charge)
            .ok_or(PriceOutOfRange)?;
        Ok(Self {
            service_price,
            visit_charge,
            total_amount,
        })
    }

    pub fn service_price(&self) -> i64 {
        self.service_price
    }

    pub fn visit_charge(&self) -> i64 {
        self.visit_charge
    }

    pub fn total_amount(&self) -> i64 {
        self.total_amount
    }

    /// Leaves the price untouched when the new one is out of range.
    pub fn set_service_price(&mut self, service_price: i64) -> Result<(), PriceOutOfRange> {
        *self = Pricing::new(service_price, self.visit_charge)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feedback {
    pub rating: u8,
    pub comment: Option<String>,
    pub date: NaiveDateTime,
}

/// Everything a gateway supplies to open a new booking.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub owner_ref: Option<String>,
    pub contact: Contact,
    pub service: ServiceSnapshot,
    pub date: Option<String>,
    pub time: Option<String>,
    pub address: String,
    pub comments: String,
    pub problem_description: String,
    pub technician_ref: Option<String>,
    pub created_note: String,
}

impl Booking {
    pub fn open(
        draft: BookingDraft,
        visit_charge: i64,
        now: NaiveDateTime,
    ) -> Result<Self, PriceOutOfRange> {
        let pricing = Pricing::new(draft.service.price, visit_charge)?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            public_id: generate_public_id(now),
            order_number: generate_order_number(now),
            owner_ref: draft.owner_ref,
            contact: draft.contact,
            service: draft.service,
            schedule: Schedule::new(draft.date, draft.time),
            address: draft.address,
            comments: draft.comments,
            problem_description: draft.problem_description,
            pricing,
            status: BookingStatus::Pending,
            status_history: vec![StatusHistoryEntry {
                status: BookingStatus::Pending,
                timestamp: now,
                note: draft.created_note,
            }],
            technician_ref: draft.technician_ref,
            technician_notes: None,
            cancellation_reason: None,
            cancelled_at: None,
            completed_at: None,
            customer_feedback: None,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Booking {
    /// Draws fresh public identifiers, for retrying after a uniqueness clash.
    pub fn reissue_identifiers(&mut self, now: NaiveDateTime) {
        self.public_id = generate_public_id(now);
        self.order_number = generate_order_number(now);
    }
}

fn generate_public_id(now: NaiveDateTime) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("BK{}{:03}", now.and_utc().timestamp_millis(), suffix)
}

fn generate_order_number(now: NaiveDateTime) -> String {
    let random: u16 = rand::thread_rng().gen_range(1000..10000);
    format!("ORD-{}-{}", now.format("%Y%m%d"), random)
}
