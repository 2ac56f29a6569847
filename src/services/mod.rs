pub mod bookings;
pub mod cart;
pub mod checkout;
pub mod validation;
