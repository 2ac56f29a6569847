use rusqlite::Connection;

use crate::db::queries;
use crate::models::{resolve_start_time, CartEntry, ClassInstance, CourseSnapshot};

/// Outcome of an add-to-cart attempt that did not hit a storage error.
#[derive(Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Duplicate,
}

/// The session's pending class selections, persisted as one serialized
/// blob under the owner's key. The full list is loaded before any
/// mutation and rewritten after every mutation (last-write-wins).
pub struct CartStore {
    key: String,
    entries: Vec<CartEntry>,
}

impl CartStore {
    /// One-time load from durable storage. A missing or unreadable blob
    /// is logged and treated as an empty cart, never as a fatal error.
    pub fn load(conn: &Connection, owner: &str) -> Self {
        let key = format!("cart:{owner}");
        let entries = match queries::cart_blob_get(conn, &key) {
            Ok(Some(blob)) => serde_json::from_str(&blob).unwrap_or_else(|e| {
                tracing::warn!("discarding unreadable cart blob for {key}: {e}");
                vec![]
            }),
            Ok(None) => vec![],
            Err(e) => {
                tracing::warn!("failed to load cart for {key}: {e}");
                vec![]
            }
        };
        Self { key, entries }
    }

    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Sum of add-time prices across the cart.
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.course_info.price).sum()
    }

    /// Builds a cart entry from the class and a fresh course snapshot and
    /// appends it. Rejects duplicates by class id. A missing course
    /// record yields an empty snapshot; a storage error adds nothing.
    pub fn add_to_cart(
        &mut self,
        conn: &Connection,
        class: &ClassInstance,
    ) -> anyhow::Result<AddOutcome> {
        if self.entries.iter().any(|e| e.matches(&class.id)) {
            return Ok(AddOutcome::Duplicate);
        }

        let course_info = match queries::get_course(conn, &class.course_id)? {
            Some(course) => CourseSnapshot::from_course(&course),
            None => CourseSnapshot::default(),
        };

        let time = resolve_start_time(
            class.time.as_deref(),
            class.start_time,
            Some(course_info.time.as_str()),
        );

        let title = if course_info.name.is_empty() {
            "Class".to_string()
        } else {
            course_info.name.clone()
        };

        self.entries.push(CartEntry {
            class_id: class.id.clone(),
            title,
            date: class.date,
            time,
            teacher: class.teacher.clone(),
            room: class.room.clone(),
            available_slots: class.available_slots,
            course_id: class.course_id.clone(),
            course_info,
        });
        self.persist(conn);

        Ok(AddOutcome::Added)
    }

    /// Removes every entry for the class id. Removing an absent id is a
    /// no-op.
    pub fn remove_from_cart(&mut self, conn: &Connection, class_id: &str) {
        let before = self.entries.len();
        self.entries.retain(|e| !e.matches(class_id));
        if self.entries.len() != before {
            self.persist(conn);
        }
    }

    pub fn clear(&mut self, conn: &Connection) {
        self.entries.clear();
        self.persist(conn);
    }

    /// Best-effort full-list write-back; failures are logged, not raised.
    fn persist(&self, conn: &Connection) {
        let blob = match serde_json::to_string(&self.entries) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::error!("failed to serialize cart for {}: {e}", self.key);
                return;
            }
        };
        if let Err(e) = queries::cart_blob_set(conn, &self.key, &blob) {
            tracing::warn!("failed to persist cart for {}: {e}", self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::Course;
    use chrono::NaiveDate;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn make_course(id: &str, price: f64) -> Course {
        Course {
            id: id.to_string(),
            name: format!("Course {id}"),
            course_type: "flow".to_string(),
            price,
            duration: "60".to_string(),
            description: "".to_string(),
            time: None,
        }
    }

    fn make_class(id: &str, course_id: &str, slots: i64) -> ClassInstance {
        ClassInstance {
            id: id.to_string(),
            course_id: course_id.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            time: Some("18:30".to_string()),
            start_time: None,
            teacher: "Maya".to_string(),
            room: "Studio A".to_string(),
            capacity: slots,
            available_slots: slots,
            comments: None,
        }
    }

    #[test]
    fn test_add_enriches_with_course_snapshot() {
        let conn = setup_db();
        queries::create_course(&conn, &make_course("c1", 12.0)).unwrap();
        let class = make_class("k1", "c1", 5);
        queries::create_class(&conn, &class).unwrap();

        let mut cart = CartStore::load(&conn, "dev-1");
        assert_eq!(cart.add_to_cart(&conn, &class).unwrap(), AddOutcome::Added);

        let entry = &cart.entries()[0];
        assert_eq!(entry.title, "Course c1");
        assert_eq!(entry.course_info.price, 12.0);
        assert_eq!(entry.time, "18:30");
    }

    #[test]
    fn test_duplicate_add_is_rejected() {
        let conn = setup_db();
        queries::create_course(&conn, &make_course("c1", 12.0)).unwrap();
        let class = make_class("k1", "c1", 5);

        let mut cart = CartStore::load(&conn, "dev-1");
        assert_eq!(cart.add_to_cart(&conn, &class).unwrap(), AddOutcome::Added);
        assert_eq!(
            cart.add_to_cart(&conn, &class).unwrap(),
            AddOutcome::Duplicate
        );
        assert_eq!(cart.count(), 1);
    }

    #[test]
    fn test_missing_course_yields_empty_snapshot() {
        let conn = setup_db();
        let class = make_class("k1", "nope", 5);

        let mut cart = CartStore::load(&conn, "dev-1");
        assert_eq!(cart.add_to_cart(&conn, &class).unwrap(), AddOutcome::Added);

        let entry = &cart.entries()[0];
        assert_eq!(entry.title, "Class");
        assert_eq!(entry.course_info.price, 0.0);
        assert_eq!(cart.total(), 0.0);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let conn = setup_db();
        queries::create_course(&conn, &make_course("c1", 12.0)).unwrap();
        let class = make_class("k1", "c1", 5);

        let mut cart = CartStore::load(&conn, "dev-1");
        cart.add_to_cart(&conn, &class).unwrap();

        cart.remove_from_cart(&conn, "k1");
        assert_eq!(cart.count(), 0);
        cart.remove_from_cart(&conn, "k1");
        assert_eq!(cart.count(), 0);
    }

    #[test]
    fn test_total_and_count() {
        let conn = setup_db();
        queries::create_course(&conn, &make_course("c1", 12.0)).unwrap();
        queries::create_course(&conn, &make_course("c2", 8.5)).unwrap();

        let mut cart = CartStore::load(&conn, "dev-1");
        cart.add_to_cart(&conn, &make_class("k1", "c1", 5)).unwrap();
        cart.add_to_cart(&conn, &make_class("k2", "c2", 5)).unwrap();

        assert_eq!(cart.count(), 2);
        assert!((cart.total() - 20.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cart_survives_reload() {
        let conn = setup_db();
        queries::create_course(&conn, &make_course("c1", 12.0)).unwrap();

        let mut cart = CartStore::load(&conn, "dev-1");
        cart.add_to_cart(&conn, &make_class("k1", "c1", 5)).unwrap();

        let reloaded = CartStore::load(&conn, "dev-1");
        assert_eq!(reloaded.count(), 1);
        assert_eq!(reloaded.entries()[0].class_id, "k1");

        // Other owners see their own cart only
        assert_eq!(CartStore::load(&conn, "dev-2").count(), 0);
    }

    #[test]
    fn test_unreadable_blob_treated_as_empty_cart() {
        let conn = setup_db();
        queries::create_course(&conn, &make_course("c1", 12.0)).unwrap();
        queries::cart_blob_set(&conn, "cart:dev-1", "not json").unwrap();

        let mut cart = CartStore::load(&conn, "dev-1");
        assert_eq!(cart.count(), 0);

        // Mutations still persist over the bad blob
        cart.add_to_cart(&conn, &make_class("k1", "c1", 5)).unwrap();
        let reloaded = CartStore::load(&conn, "dev-1");
        assert_eq!(reloaded.count(), 1);
        assert_eq!(reloaded.entries()[0].class_id, "k1");
    }

    #[test]
    fn test_clear_empties_persisted_cart() {
        let conn = setup_db();
        queries::create_course(&conn, &make_course("c1", 12.0)).unwrap();

        let mut cart = CartStore::load(&conn, "dev-1");
        cart.add_to_cart(&conn, &make_class("k1", "c1", 5)).unwrap();
        cart.clear(&conn);

        assert_eq!(cart.count(), 0);
        assert_eq!(CartStore::load(&conn, "dev-1").count(), 0);
    }
}
