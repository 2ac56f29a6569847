pub mod booking;
pub mod cart;
pub mod class_instance;
pub mod course;
pub mod user;

pub use booking::{Booking, BookingStatus};
pub use cart::CartEntry;
pub use class_instance::{class_start, resolve_start_time, ClassInstance, StartTime, TIME_TBA};
pub use course::{Course, CourseSnapshot};
pub use user::User;
