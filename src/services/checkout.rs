use chrono::NaiveDateTime;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::models::{resolve_start_time, Booking, BookingStatus};
use crate::services::cart::CartStore;
use crate::services::validation::{self, CartIssue};

#[derive(Debug)]
pub enum CheckoutError {
    /// One or more cart entries failed re-validation; nothing was written.
    Validation(Vec<CartIssue>),
    /// The commit batch itself failed; the cart is left untouched so the
    /// user can retry.
    Failed,
}

impl std::fmt::Display for CheckoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckoutError::Validation(issues) => {
                write!(f, "the following issues were found:")?;
                for issue in issues {
                    write!(f, "\n- {issue}")?;
                }
                Ok(())
            }
            CheckoutError::Failed => {
                write!(f, "failed to complete booking, please try again")
            }
        }
    }
}

/// Converts the cart into confirmed bookings, decrementing each class's
/// available slots, as one SQLite transaction. Re-validates immediately
/// before writing to narrow the window between adding to cart and
/// checkout. The decrement is conditional on `available_slots > 0`, so a
/// slot lost to a concurrent commit aborts the whole batch rather than
/// taking the counter negative.
///
/// On success the cart is cleared and the new booking ids returned. On
/// any failure nothing is written and the cart is unchanged.
pub fn checkout(
    conn: &mut Connection,
    cart: &mut CartStore,
    user_id: Option<&str>,
    now: NaiveDateTime,
) -> Result<Vec<String>, CheckoutError> {
    let issues = validation::validate_cart(conn, cart, user_id, now.date()).map_err(|e| {
        tracing::error!("cart validation failed: {e:?}");
        CheckoutError::Failed
    })?;
    if !issues.is_empty() {
        return Err(CheckoutError::Validation(issues));
    }

    // validate_cart only passes with a signed-in user
    let Some(user_id) = user_id else {
        return Err(CheckoutError::Validation(vec![CartIssue::NotAuthenticated]));
    };

    let tx = conn.transaction().map_err(|e| {
        tracing::error!("failed to begin checkout transaction: {e}");
        CheckoutError::Failed
    })?;

    let mut booking_ids = vec![];

    for entry in cart.entries() {
        // Authoritative re-read; the cart's cached slot count is ignored.
        let class = match queries::get_class(&tx, &entry.class_id) {
            Ok(Some(class)) => class,
            Ok(None) => {
                return Err(CheckoutError::Validation(vec![CartIssue::ClassGone {
                    title: entry.title.clone(),
                }]))
            }
            Err(e) => {
                tracing::error!("checkout read failed for {}: {e:?}", entry.class_id);
                return Err(CheckoutError::Failed);
            }
        };

        match queries::decrement_available_slots(&tx, &class.id) {
            Ok(true) => {}
            // Raced with another commit since validation; abort everything.
            Ok(false) => {
                return Err(CheckoutError::Validation(vec![CartIssue::ClassFull {
                    title: entry.title.clone(),
                }]))
            }
            Err(e) => {
                tracing::error!("slot decrement failed for {}: {e:?}", class.id);
                return Err(CheckoutError::Failed);
            }
        }

        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            class_id: class.id.clone(),
            user_id: user_id.to_string(),
            status: BookingStatus::Confirmed,
            booked_at: now,
            cancelled_at: None,
            class_name: entry.title.clone(),
            class_date: class.date,
            start_time: Some(resolve_start_time(
                class.time.as_deref(),
                class.start_time,
                Some(entry.course_info.time.as_str()),
            )),
            teacher: class.teacher.clone(),
            room: class.room.clone(),
            course_info: entry.course_info.clone(),
        };

        if let Err(e) = queries::insert_booking(&tx, &booking) {
            tracing::error!("booking insert failed for {}: {e:?}", class.id);
            return Err(CheckoutError::Failed);
        }
        booking_ids.push(booking.id);
    }

    tx.commit().map_err(|e| {
        tracing::error!("checkout commit failed: {e}");
        CheckoutError::Failed
    })?;

    tracing::info!(
        "user {user_id} booked {} class(es): {booking_ids:?}",
        booking_ids.len()
    );
    cart.clear(conn);

    Ok(booking_ids)
}
