use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, Row};

use crate::models::{Booking, BookingStatus, ClassInstance, Course, CourseSnapshot, StartTime, User};

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT)
        .map_err(|e| anyhow::anyhow!("bad date {s:?}: {e}"))
}

fn parse_datetime(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT)
        .map_err(|e| anyhow::anyhow!("bad timestamp {s:?}: {e}"))
}

// ── Courses ──

pub fn create_course(conn: &Connection, course: &Course) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO courses (id, name, course_type, price, duration, description, time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            course.id,
            course.name,
            course.course_type,
            course.price,
            course.duration,
            course.description,
            course.time,
        ],
    )?;
    Ok(())
}

pub fn update_course_price(conn: &Connection, id: &str, price: f64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE courses SET price = ?1 WHERE id = ?2",
        params![price, id],
    )?;
    Ok(count > 0)
}

pub fn get_course(conn: &Connection, id: &str) -> anyhow::Result<Option<Course>> {
    let result = conn.query_row(
        "SELECT id, name, course_type, price, duration, description, time
         FROM courses WHERE id = ?1",
        params![id],
        |row| {
            Ok(Course {
                id: row.get(0)?,
                name: row.get(1)?,
                course_type: row.get(2)?,
                price: row.get(3)?,
                duration: row.get(4)?,
                description: row.get(5)?,
                time: row.get(6)?,
            })
        },
    );

    match result {
        Ok(course) => Ok(Some(course)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Classes ──

fn parse_class_row(row: &Row) -> anyhow::Result<ClassInstance> {
    let date_str: String = row.get(2)?;
    let start_hour: Option<u32> = row.get(4)?;
    let start_minute: Option<u32> = row.get(5)?;

    Ok(ClassInstance {
        id: row.get(0)?,
        course_id: row.get(1)?,
        date: parse_date(&date_str)?,
        time: row.get(3)?,
        start_time: start_hour.map(|hour| StartTime {
            hour,
            minute: start_minute.unwrap_or(0),
        }),
        teacher: row.get(6)?,
        room: row.get(7)?,
        capacity: row.get(8)?,
        available_slots: row.get(9)?,
        comments: row.get(10)?,
    })
}

const CLASS_COLUMNS: &str = "id, course_id, date, time, start_hour, start_minute, teacher, room, capacity, available_slots, comments";

pub fn create_class(conn: &Connection, class: &ClassInstance) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO classes (id, course_id, date, time, start_hour, start_minute, teacher, room, capacity, available_slots, comments)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            class.id,
            class.course_id,
            class.date.format(DATE_FMT).to_string(),
            class.time,
            class.start_time.map(|st| st.hour),
            class.start_time.map(|st| st.minute),
            class.teacher,
            class.room,
            class.capacity,
            class.available_slots,
            class.comments,
        ],
    )?;
    Ok(())
}

pub fn get_class(conn: &Connection, id: &str) -> anyhow::Result<Option<ClassInstance>> {
    let sql = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_class_row(row)));

    match result {
        Ok(class) => Ok(Some(class?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_classes(conn: &Connection) -> anyhow::Result<Vec<ClassInstance>> {
    let sql = format!("SELECT {CLASS_COLUMNS} FROM classes ORDER BY date ASC, time ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(parse_class_row(row)))?;

    let mut classes = vec![];
    for row in rows {
        classes.push(row??);
    }
    Ok(classes)
}

/// Conditional decrement: refuses to take the counter below zero. Returns
/// false when no slot was available, which aborts the surrounding
/// checkout transaction instead of overbooking.
pub fn decrement_available_slots(conn: &Connection, class_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE classes SET available_slots = available_slots - 1
         WHERE id = ?1 AND available_slots > 0",
        params![class_id],
    )?;
    Ok(count > 0)
}

pub fn increment_available_slots(conn: &Connection, class_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE classes SET available_slots = available_slots + 1 WHERE id = ?1",
        params![class_id],
    )?;
    Ok(count > 0)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, class_id, user_id, status, booked_at, cancelled_at, class_name, class_date, start_time, teacher, room, course_info";

fn parse_booking_row(row: &Row) -> anyhow::Result<Booking> {
    let status_str: String = row.get(3)?;
    let booked_at_str: String = row.get(4)?;
    let cancelled_at_str: Option<String> = row.get(5)?;
    let class_date_str: String = row.get(7)?;
    let course_info_json: String = row.get(11)?;

    let course_info: CourseSnapshot =
        serde_json::from_str(&course_info_json).unwrap_or_default();

    Ok(Booking {
        id: row.get(0)?,
        class_id: row.get(1)?,
        user_id: row.get(2)?,
        status: BookingStatus::from_str(&status_str),
        booked_at: parse_datetime(&booked_at_str)?,
        cancelled_at: cancelled_at_str.as_deref().map(parse_datetime).transpose()?,
        class_name: row.get(6)?,
        class_date: parse_date(&class_date_str)?,
        start_time: row.get(8)?,
        teacher: row.get(9)?,
        room: row.get(10)?,
        course_info,
    })
}

fn booking_params(booking: &Booking) -> anyhow::Result<[Box<dyn rusqlite::types::ToSql>; 12]> {
    Ok([
        Box::new(booking.id.clone()),
        Box::new(booking.class_id.clone()),
        Box::new(booking.user_id.clone()),
        Box::new(booking.status.as_str()),
        Box::new(booking.booked_at.format(DATETIME_FMT).to_string()),
        Box::new(
            booking
                .cancelled_at
                .map(|t| t.format(DATETIME_FMT).to_string()),
        ),
        Box::new(booking.class_name.clone()),
        Box::new(booking.class_date.format(DATE_FMT).to_string()),
        Box::new(booking.start_time.clone()),
        Box::new(booking.teacher.clone()),
        Box::new(booking.room.clone()),
        Box::new(serde_json::to_string(&booking.course_info)?),
    ])
}

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    let values = booking_params(booking)?;
    let refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|p| p.as_ref()).collect();
    conn.execute(
        "INSERT INTO bookings (id, class_id, user_id, status, booked_at, cancelled_at, class_name, class_date, start_time, teacher, room, course_info)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        refs.as_slice(),
    )?;
    Ok(())
}

/// Point read against the active partition only; cancelled bookings are
/// not visible here.
pub fn get_active_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_booking_row(row)));

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_bookings_for_user(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ?1 ORDER BY class_date ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_cancelled_bookings_for_user(
    conn: &Connection,
    user_id: &str,
) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM cancelled_bookings WHERE user_id = ?1 ORDER BY class_date ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Duplicate-booking probe: any non-cancelled booking in the active
/// partition for this user and class.
pub fn has_active_booking(
    conn: &Connection,
    user_id: &str,
    class_id: &str,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE user_id = ?1 AND class_id = ?2 AND status != 'cancelled'",
        params![user_id, class_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Relocates a booking into the cancelled partition and removes it from
/// the active one. Callers run this inside the same transaction as the
/// capacity increment so no partial state is observable.
pub fn move_booking_to_cancelled(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    let values = booking_params(booking)?;
    let refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|p| p.as_ref()).collect();
    conn.execute(
        "INSERT INTO cancelled_bookings (id, class_id, user_id, status, booked_at, cancelled_at, class_name, class_date, start_time, teacher, room, course_info)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        refs.as_slice(),
    )?;
    conn.execute("DELETE FROM bookings WHERE id = ?1", params![booking.id])?;
    Ok(())
}

// ── Cart storage ──

pub fn cart_blob_get(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let result = conn.query_row(
        "SELECT value FROM cart_storage WHERE key = ?1",
        params![key],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn cart_blob_set(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO cart_storage (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value],
    )?;
    Ok(())
}

// ── Users ──

pub fn create_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, token) VALUES (?1, ?2, ?3, ?4)",
        params![user.id, user.name, user.email, user.token],
    )?;
    Ok(())
}

pub fn find_user_by_token(conn: &Connection, token: &str) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        "SELECT id, name, email, token FROM users WHERE token = ?1",
        params![token],
        |row| {
            Ok(User {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                token: row.get(3)?,
            })
        },
    );

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
