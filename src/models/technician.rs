use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Technician {
    pub user_id: String,
    pub available: bool,
    pub rating: f64,
    pub total_ratings: i64,
    pub completed_jobs: i64,
    pub location: Option<TechnicianLocation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub last_updated: NaiveDateTime,
}

/// Running mean rounded to one decimal place.
pub fn next_rating(current: f64, total_ratings: i64, new_rating: u8) -> f64 {
    let total = total_ratings as f64;
    let mean = (current * total + f64::from(new_rating)) / (total + 1.0);
    (mean * 10.0).round() / 10.0
}
