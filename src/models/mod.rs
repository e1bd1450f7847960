pub mod availability;
pub mod booking;
pub mod loyalty;
pub mod service;
pub mod user;

pub use availability::{BusinessHours, OpeningSlot};
pub use booking::{Booking, BookingEvent, BookingStatus};
pub use loyalty::{LedgerDirection, LedgerEntry, LedgerKind, LoyaltyStatus};
pub use service::{Service, ServiceOption};
pub use user::User;
