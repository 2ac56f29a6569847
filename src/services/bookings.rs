use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::models::{class_start, Booking, BookingStatus, CourseSnapshot};

/// Cancellations are refused this close to class start.
pub const CANCELLATION_CUTOFF_HOURS: i64 = 24;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CancelError {
    #[error("booking not found")]
    BookingNotFound,

    #[error("class not found for this booking")]
    ClassNotFound,

    #[error("bookings must be cancelled at least 24 hours before the class starts")]
    WindowClosed,

    #[error("failed to cancel booking, please try again")]
    Failed,
}

/// A booking annotated for display: cancellability is recomputed on every
/// read, never stored on the record.
#[derive(Debug, Clone, Serialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub can_cancel: bool,
}

/// Only a confirmed booking more than 24 hours before class start may be
/// cancelled. Terminal statuses (cancelled, completed) never transition.
pub fn can_cancel(booking: &Booking, now: NaiveDateTime) -> bool {
    if booking.status != BookingStatus::Confirmed {
        return false;
    }
    let start = class_start(booking.class_date, booking.start_time.as_deref());
    start - now > Duration::hours(CANCELLATION_CUTOFF_HOURS)
}

/// Cancels a confirmed booking owned by `user_id`: restores one slot to
/// the class, stamps the booking cancelled, and moves it to the cancelled
/// partition, all in one transaction.
///
/// A booking that is already cancelled lives outside the active
/// partition, so a second cancel attempt reports `BookingNotFound` and
/// never touches capacity again. Non-confirmed records in the active
/// partition (completed, waitlisted) are likewise not cancellable.
pub fn cancel_booking(
    conn: &mut Connection,
    booking_id: &str,
    user_id: &str,
    now: NaiveDateTime,
) -> Result<(), CancelError> {
    let booking = match queries::get_active_booking(conn, booking_id) {
        Ok(Some(b)) => b,
        Ok(None) => return Err(CancelError::BookingNotFound),
        Err(e) => {
            tracing::error!("failed to read booking {booking_id}: {e:?}");
            return Err(CancelError::Failed);
        }
    };

    if booking.user_id != user_id || booking.status != BookingStatus::Confirmed {
        return Err(CancelError::BookingNotFound);
    }

    if !can_cancel(&booking, now) {
        return Err(CancelError::WindowClosed);
    }

    let tx = conn.transaction().map_err(|e| {
        tracing::error!("failed to begin cancellation transaction: {e}");
        CancelError::Failed
    })?;

    match queries::increment_available_slots(&tx, &booking.class_id) {
        Ok(true) => {}
        Ok(false) => return Err(CancelError::ClassNotFound),
        Err(e) => {
            tracing::error!("slot restore failed for {}: {e:?}", booking.class_id);
            return Err(CancelError::Failed);
        }
    }

    let cancelled = Booking {
        status: BookingStatus::Cancelled,
        cancelled_at: Some(now),
        ..booking
    };

    if let Err(e) = queries::move_booking_to_cancelled(&tx, &cancelled) {
        tracing::error!("failed to move booking {booking_id} to cancelled: {e:?}");
        return Err(CancelError::Failed);
    }

    tx.commit().map_err(|e| {
        tracing::error!("cancellation commit failed: {e}");
        CancelError::Failed
    })?;

    tracing::info!("booking {booking_id} cancelled, slot restored to {}", cancelled.class_id);
    Ok(())
}

/// All of a user's bookings, active and cancelled, in chronological order
/// of class date, each annotated with its resolved snapshot and current
/// cancellability.
pub fn get_user_bookings(
    conn: &Connection,
    user_id: &str,
    now: NaiveDateTime,
) -> anyhow::Result<Vec<BookingView>> {
    let mut bookings = queries::get_bookings_for_user(conn, user_id)?;
    bookings.extend(queries::get_cancelled_bookings_for_user(conn, user_id)?);

    for booking in &mut bookings {
        resolve_snapshot(conn, booking);
    }

    bookings.sort_by(|a, b| {
        class_start(a.class_date, a.start_time.as_deref())
            .cmp(&class_start(b.class_date, b.start_time.as_deref()))
    });

    Ok(bookings
        .into_iter()
        .map(|booking| {
            let can_cancel = can_cancel(&booking, now);
            BookingView { booking, can_cancel }
        })
        .collect())
}

/// Fills gaps in a booking's denormalized snapshot from a live class and
/// course lookup. Fields already present on the booking are never
/// overwritten; what was captured at booking time stays authoritative for
/// display. Lookup failures leave the booking as stored.
fn resolve_snapshot(conn: &Connection, booking: &mut Booking) {
    let needs_class = booking.teacher.is_empty()
        || booking.room.is_empty()
        || booking.start_time.is_none();
    let needs_course = booking.course_info.is_empty() || booking.class_name.is_empty();

    if !needs_class && !needs_course {
        return;
    }

    let class = match queries::get_class(conn, &booking.class_id) {
        Ok(class) => class,
        Err(e) => {
            tracing::warn!("snapshot lookup failed for class {}: {e:?}", booking.class_id);
            return;
        }
    };
    let Some(class) = class else { return };

    if booking.teacher.is_empty() {
        booking.teacher = class.teacher.clone();
    }
    if booking.room.is_empty() {
        booking.room = class.room.clone();
    }
    if booking.start_time.is_none() {
        booking.start_time = class.time.clone();
    }

    if needs_course {
        match queries::get_course(conn, &class.course_id) {
            Ok(Some(course)) => {
                if booking.course_info.is_empty() {
                    booking.course_info = CourseSnapshot::from_course(&course);
                }
                if booking.class_name.is_empty() {
                    booking.class_name = course.name;
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("snapshot lookup failed for course {}: {e:?}", class.course_id);
            }
        }
    }
}
