use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::CourseSnapshot;

/// A pending, not-yet-committed selection of one class instance.
///
/// Class and course fields are copied in at add time: the snapshot is for
/// display and for add-time pricing, never for authorization — checkout
/// re-reads the authoritative class record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartEntry {
    pub class_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub time: String,
    pub teacher: String,
    pub room: String,
    pub available_slots: i64,
    pub course_id: String,
    pub course_info: CourseSnapshot,
}

impl CartEntry {
    /// Comparison key for duplicate detection.
    pub fn matches(&self, class_id: &str) -> bool {
        self.class_id.trim() == class_id.trim()
    }
}
