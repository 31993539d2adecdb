pub mod bookings;
pub mod consumers;
pub mod fare;
pub mod scoring;
pub mod timeout;
