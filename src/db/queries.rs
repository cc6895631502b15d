use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Account, Booking, BookingStatus, Contact, Feedback, InAppNotification, Pricing, Role, Schedule,
    ServiceItem, ServiceSnapshot, StatusHistoryEntry, Technician, TechnicianLocation,
};
use crate::models::technician::next_rating;

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn fmt_opt_ts(ts: &Option<NaiveDateTime>) -> Option<String> {
    ts.as_ref().map(fmt_ts)
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, public_id, order_number, owner_ref, customer_name, phone, email, \
     service_snapshot, date, time, scheduled_at, address, comments, problem_description, \
     service_price, visit_charge, total_amount, status, status_history, technician_ref, \
     technician_notes, cancellation_reason, cancelled_at, completed_at, customer_feedback, \
     created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    let sql = format!(
        "INSERT INTO bookings ({BOOKING_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
                 ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)"
    );
    conn.execute(
        &sql,
        params![
            booking.id,
            booking.public_id,
            booking.order_number,
            booking.owner_ref,
            booking.contact.name,
            booking.contact.phone,
            booking.contact.email,
            serde_json::to_string(&booking.service)?,
            booking.schedule.date,
            booking.schedule.time,
            fmt_opt_ts(&booking.schedule.scheduled_at),
            booking.address,
            booking.comments,
            booking.problem_description,
            booking.pricing.service_price(),
            booking.pricing.visit_charge(),
            booking.pricing.total_amount(),
            booking.status.as_str(),
            serde_json::to_string(&booking.status_history)?,
            booking.technician_ref,
            booking.technician_notes,
            booking.cancellation_reason,
            fmt_opt_ts(&booking.cancelled_at),
            fmt_opt_ts(&booking.completed_at),
            booking
                .customer_feedback
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

/// True when `e` is a UNIQUE/PRIMARY KEY clash reported by SQLite.
pub fn is_unique_violation(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    get_booking_where(conn, "id", id)
}

pub fn get_booking_by_public_id(
    conn: &Connection,
    public_id: &str,
) -> anyhow::Result<Option<Booking>> {
    get_booking_where(conn, "public_id", public_id)
}

fn get_booking_where(
    conn: &Connection,
    column: &str,
    value: &str,
) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE {column} = ?1");
    let result = conn
        .query_row(&sql, params![value], |row| Ok(parse_booking_row(row)))
        .optional()?;

    match result {
        Some(booking) => Ok(Some(booking?)),
        None => Ok(None),
    }
}

pub fn get_bookings_for_phone(conn: &Connection, phone: &str) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE phone = ?1 ORDER BY created_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![phone], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_bookings_for_owner(
    conn: &Connection,
    owner: &str,
    status: Option<BookingStatus>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE owner_ref = ?1 AND (?2 IS NULL OR status = ?2)
         ORDER BY created_at DESC, rowid DESC LIMIT ?3 OFFSET ?4"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![owner, status.map(|s| s.as_str()), limit, offset],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn count_bookings_for_owner(
    conn: &Connection,
    owner: &str,
    status: Option<BookingStatus>,
) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE owner_ref = ?1 AND (?2 IS NULL OR status = ?2)",
        params![owner, status.map(|s| s.as_str())],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Writes the lifecycle fields of `booking`, but only if the stored status is
/// still `expected`. Returns `false` when another writer got there first.
pub fn persist_transition(
    conn: &Connection,
    booking: &Booking,
    expected: BookingStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET
           status = ?1,
           status_history = ?2,
           technician_ref = ?3,
           technician_notes = ?4,
           cancellation_reason = ?5,
           cancelled_at = ?6,
           completed_at = ?7,
           updated_at = ?8
         WHERE id = ?9 AND status = ?10",
        params![
            booking.status.as_str(),
            serde_json::to_string(&booking.status_history)?,
            booking.technician_ref,
            booking.technician_notes,
            booking.cancellation_reason,
            fmt_opt_ts(&booking.cancelled_at),
            fmt_opt_ts(&booking.completed_at),
            fmt_ts(&booking.updated_at),
            booking.id,
            expected.as_str(),
        ],
    )?;
    Ok(count > 0)
}

/// Writes the editable contact, schedule and pricing fields, guarded by the
/// status the edit was validated against.
pub fn update_booking_details(
    conn: &Connection,
    booking: &Booking,
    expected: BookingStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET
           phone = ?1,
           address = ?2,
           problem_description = ?3,
           date = ?4,
           time = ?5,
           scheduled_at = ?6,
           service_price = ?7,
           visit_charge = ?8,
           total_amount = ?9,
           updated_at = ?10
         WHERE id = ?11 AND status = ?12",
        params![
            booking.contact.phone,
            booking.address,
            booking.problem_description,
            booking.schedule.date,
            booking.schedule.time,
            fmt_opt_ts(&booking.schedule.scheduled_at),
            booking.pricing.service_price(),
            booking.pricing.visit_charge(),
            booking.pricing.total_amount(),
            fmt_ts(&booking.updated_at),
            booking.id,
            expected.as_str(),
        ],
    )?;
    Ok(count > 0)
}

/// Stores feedback if none exists yet and the booking is completed.
pub fn save_feedback(conn: &Connection, id: &str, feedback: &Feedback) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET customer_feedback = ?1, updated_at = ?2
         WHERE id = ?3 AND status = 'completed' AND customer_feedback IS NULL",
        params![serde_json::to_string(feedback)?, fmt_ts(&feedback.date), id],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let service_json: String = row.get(7)?;
    let status_str: String = row.get(17)?;
    let history_json: String = row.get(18)?;
    let feedback_json: Option<String> = row.get(24)?;
    let scheduled_at: Option<String> = row.get(10)?;
    let cancelled_at: Option<String> = row.get(22)?;
    let completed_at: Option<String> = row.get(23)?;
    let created_at: String = row.get(25)?;
    let updated_at: String = row.get(26)?;

    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown booking status in database: {status_str}"))?;
    let service: ServiceSnapshot = serde_json::from_str(&service_json)?;
    let status_history: Vec<StatusHistoryEntry> = serde_json::from_str(&history_json)?;
    let customer_feedback: Option<Feedback> =
        feedback_json.map(|f| serde_json::from_str(&f)).transpose()?;

    Ok(Booking {
        id: row.get(0)?,
        public_id: row.get(1)?,
        order_number: row.get(2)?,
        owner_ref: row.get(3)?,
        contact: Contact {
            name: row.get(4)?,
            phone: row.get(5)?,
            email: row.get(6)?,
        },
        service,
        schedule: Schedule {
            date: row.get(8)?,
            time: row.get(9)?,
            scheduled_at: scheduled_at.as_deref().map(parse_ts),
        },
        address: row.get(11)?,
        comments: row.get(12)?,
        problem_description: row.get(13)?,
        pricing: Pricing::new(row.get(14)?, row.get(15)?)?,
        status,
        status_history,
        technician_ref: row.get(19)?,
        technician_notes: row.get(20)?,
        cancellation_reason: row.get(21)?,
        cancelled_at: cancelled_at.as_deref().map(parse_ts),
        completed_at: completed_at.as_deref().map(parse_ts),
        customer_feedback,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

// ── Accounts ──

pub fn insert_account(conn: &Connection, account: &Account) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO accounts (id, full_name, email, phone, role) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            account.id,
            account.full_name,
            account.email,
            account.phone,
            account.role.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get_account(conn: &Connection, id: &str) -> anyhow::Result<Option<Account>> {
    let account = conn
        .query_row(
            "SELECT id, full_name, email, phone, role FROM accounts WHERE id = ?1",
            params![id],
            |row| {
                let role: String = row.get(4)?;
                Ok(Account {
                    id: row.get(0)?,
                    full_name: row.get(1)?,
                    email: row.get(2)?,
                    phone: row.get(3)?,
                    role: Role::parse(&role),
                })
            },
        )
        .optional()?;
    Ok(account)
}

// ── Services ──

pub fn insert_service(conn: &Connection, service: &ServiceItem) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, name, icon, base_price, category, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            service.id,
            service.name,
            service.icon,
            service.base_price,
            service.category,
            service.active as i32,
        ],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<ServiceItem>> {
    let service = conn
        .query_row(
            "SELECT id, name, icon, base_price, category, active FROM services WHERE id = ?1",
            params![id],
            |row| {
                Ok(ServiceItem {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    icon: row.get(2)?,
                    base_price: row.get(3)?,
                    category: row.get(4)?,
                    active: row.get::<_, i32>(5)? != 0,
                })
            },
        )
        .optional()?;
    Ok(service)
}

// ── Technicians ──

pub fn upsert_technician(conn: &Connection, technician: &Technician) -> anyhow::Result<()> {
    let location = technician.location.as_ref();
    conn.execute(
        "INSERT INTO technicians (user_id, available, rating, total_ratings, completed_jobs, latitude, longitude, location_updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(user_id) DO UPDATE SET
           available = excluded.available,
           rating = excluded.rating,
           total_ratings = excluded.total_ratings,
           completed_jobs = excluded.completed_jobs,
           latitude = excluded.latitude,
           longitude = excluded.longitude,
           location_updated_at = excluded.location_updated_at",
        params![
            technician.user_id,
            technician.available as i32,
            technician.rating,
            technician.total_ratings,
            technician.completed_jobs,
            location.map(|l| l.latitude),
            location.map(|l| l.longitude),
            location.map(|l| fmt_ts(&l.last_updated)),
        ],
    )?;
    Ok(())
}

pub fn get_technician(conn: &Connection, user_id: &str) -> anyhow::Result<Option<Technician>> {
    let technician = conn
        .query_row(
            "SELECT user_id, available, rating, total_ratings, completed_jobs, latitude, longitude, location_updated_at
             FROM technicians WHERE user_id = ?1",
            params![user_id],
            |row| {
                let latitude: Option<f64> = row.get(5)?;
                let longitude: Option<f64> = row.get(6)?;
                let updated: Option<String> = row.get(7)?;
                let location = match (latitude, longitude, updated) {
                    (Some(latitude), Some(longitude), Some(updated)) => Some(TechnicianLocation {
                        latitude,
                        longitude,
                        last_updated: parse_ts(&updated),
                    }),
                    _ => None,
                };
                Ok(Technician {
                    user_id: row.get(0)?,
                    available: row.get::<_, i32>(1)? != 0,
                    rating: row.get(2)?,
                    total_ratings: row.get(3)?,
                    completed_jobs: row.get(4)?,
                    location,
                })
            },
        )
        .optional()?;
    Ok(technician)
}

/// Folds one customer rating into the technician's running average and
/// counts the job as completed. No-op for unknown technicians.
pub fn record_technician_rating(
    conn: &Connection,
    user_id: &str,
    rating: u8,
) -> anyhow::Result<bool> {
    let Some(technician) = get_technician(conn, user_id)? else {
        return Ok(false);
    };
    let updated = next_rating(technician.rating, technician.total_ratings, rating);
    conn.execute(
        "UPDATE technicians SET rating = ?1, total_ratings = total_ratings + 1, completed_jobs = completed_jobs + 1
         WHERE user_id = ?2",
        params![updated, user_id],
    )?;
    Ok(true)
}

// ── In-app notifications ──

pub fn insert_notification(
    conn: &Connection,
    account_id: &str,
    kind: &str,
    title: &str,
    message: &str,
    data: &serde_json::Value,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO notifications (account_id, kind, title, message, data) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![account_id, kind, title, message, data.to_string()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_notifications_for_account(
    conn: &Connection,
    account_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<InAppNotification>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, kind, title, message, is_read, created_at
         FROM notifications WHERE account_id = ?1
         ORDER BY id ASC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![account_id, limit], |row| {
        Ok(InAppNotification {
            id: row.get(0)?,
            account_id: row.get(1)?,
            kind: row.get(2)?,
            title: row.get(3)?,
            message: row.get(4)?,
            is_read: row.get::<_, i32>(5)? != 0,
            created_at: row.get(6)?,
        })
    })?;

    let mut notifications = vec![];
    for row in rows {
        notifications.push(row?);
    }
    Ok(notifications)
}
