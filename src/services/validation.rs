use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::services::cart::CartStore;

/// One problem found while re-checking a cart against authoritative
/// state. Every variant maps to its own user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartIssue {
    #[error("you must be signed in to complete your booking")]
    NotAuthenticated,

    #[error("your cart is empty, add classes to book")]
    EmptyCart,

    #[error("{title} does not exist anymore")]
    ClassGone { title: String },

    #[error("{title} is fully booked")]
    ClassFull { title: String },

    #[error("{title} is in the past")]
    ClassInPast { title: String },

    #[error("you have already booked {title}")]
    AlreadyBooked { title: String },
}

/// Re-checks every cart entry against current server state, accumulating
/// all failures so the caller can report every problem at once. The
/// cart's cached snapshot is for display only and is never trusted here;
/// each entry gets a fresh class read and a fresh duplicate probe.
///
/// Returns the (possibly empty) issue list; a storage failure is the
/// caller's to translate.
pub fn validate_cart(
    conn: &Connection,
    cart: &CartStore,
    user_id: Option<&str>,
    today: NaiveDate,
) -> anyhow::Result<Vec<CartIssue>> {
    let Some(user_id) = user_id else {
        return Ok(vec![CartIssue::NotAuthenticated]);
    };

    if cart.count() == 0 {
        return Ok(vec![CartIssue::EmptyCart]);
    }

    let mut issues = vec![];

    for entry in cart.entries() {
        let title = entry.title.clone();

        let Some(class) = queries::get_class(conn, &entry.class_id)? else {
            issues.push(CartIssue::ClassGone { title });
            continue;
        };

        if !class.is_bookable() {
            issues.push(CartIssue::ClassFull { title });
            continue;
        }

        // Date-only comparison: a class later today is still bookable.
        if class.date < today {
            issues.push(CartIssue::ClassInPast { title });
            continue;
        }

        if queries::has_active_booking(conn, user_id, &entry.class_id)? {
            issues.push(CartIssue::AlreadyBooked { title });
        }
    }

    Ok(issues)
}
