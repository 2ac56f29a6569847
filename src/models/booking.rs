use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::CourseSnapshot;

/// A durable record of a committed reservation. Bookings are never
/// physically deleted: cancellation moves them to the cancelled partition
/// with status and timestamp set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub class_id: String,
    pub user_id: String,
    pub status: BookingStatus,
    pub booked_at: NaiveDateTime,
    pub cancelled_at: Option<NaiveDateTime>,
    pub class_name: String,
    pub class_date: NaiveDate,
    pub start_time: Option<String>,
    pub teacher: String,
    pub room: String,
    pub course_info: CourseSnapshot,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
    Waitlisted,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::Waitlisted => "waitlisted",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "cancelled" => BookingStatus::Cancelled,
            "completed" => BookingStatus::Completed,
            "waitlisted" => BookingStatus::Waitlisted,
            _ => BookingStatus::Confirmed,
        }
    }
}
