use serde::{Deserialize, Serialize};

/// Static course metadata. Read-only from the booking flows; class
/// instances reference a course by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub course_type: String,
    pub price: f64,
    pub duration: String,
    pub description: String,
    pub time: Option<String>,
}

/// Denormalized course fields captured at add-to-cart / booking time.
/// Later edits to the course must not alter what an existing cart entry
/// or booking displays, so this is copied by value, never re-resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub course_type: String,
    pub price: f64,
    pub duration: String,
    pub description: String,
    pub time: String,
}

impl CourseSnapshot {
    pub fn from_course(course: &Course) -> Self {
        Self {
            name: course.name.clone(),
            course_type: course.course_type.clone(),
            price: course.price,
            duration: course.duration.clone(),
            description: course.description.clone(),
            time: course.time.clone().unwrap_or_default(),
        }
    }

    /// A snapshot is considered missing when it carries no course name;
    /// reporting then falls back to a live course lookup.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}
