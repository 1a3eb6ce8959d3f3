// Models module - database entity representations

pub mod analytics;
pub mod booking;
pub mod event;
pub mod hold;
pub mod seat;
pub mod user;
pub mod waitlist;

pub use booking::Booking;
pub use event::Event;
pub use hold::SeatHold;
pub use seat::Seat;
pub use user::User;
pub use waitlist::WaitlistEntry;
