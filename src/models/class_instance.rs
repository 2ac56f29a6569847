use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

pub const TIME_TBA: &str = "TBA";

/// Structured start time some class records carry instead of (or in
/// addition to) a plain "HH:MM" string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StartTime {
    pub hour: u32,
    pub minute: u32,
}

impl std::fmt::Display for StartTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:02}", self.hour, self.minute)
    }
}

/// A scheduled occurrence of a course, with its own date and capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassInstance {
    pub id: String,
    pub course_id: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub start_time: Option<StartTime>,
    pub teacher: String,
    pub room: String,
    pub capacity: i64,
    pub available_slots: i64,
    pub comments: Option<String>,
}

impl ClassInstance {
    pub fn is_bookable(&self) -> bool {
        self.available_slots > 0
    }
}

/// Resolves the display start time from its possible sources, in order:
/// the class-level time string, the structured start time, the
/// course-level time string. Empty or "TBA" strings do not count as
/// present. Terminal default is "TBA".
pub fn resolve_start_time(
    class_time: Option<&str>,
    start_time: Option<StartTime>,
    course_time: Option<&str>,
) -> String {
    let present = |s: &&str| {
        let t = s.trim();
        !t.is_empty() && t != TIME_TBA
    };

    if let Some(t) = class_time.filter(present) {
        return t.trim().to_string();
    }
    if let Some(st) = start_time {
        return st.to_string();
    }
    if let Some(t) = course_time.filter(present) {
        return t.trim().to_string();
    }
    TIME_TBA.to_string()
}

/// The instant a class starts, for cancellation-window checks. A class
/// with no parseable time counts from midnight of its date.
pub fn class_start(date: NaiveDate, time: Option<&str>) -> NaiveDateTime {
    let parsed = time.and_then(|t| {
        NaiveTime::parse_from_str(t.trim(), "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(t.trim(), "%H:%M:%S"))
            .ok()
    });
    date.and_time(parsed.unwrap_or(NaiveTime::MIN))
}
