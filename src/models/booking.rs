use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::availability::{hhmm, minute_of_day};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub service_id: String,
    pub option_ids: Vec<String>,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub car_model: String,
    pub car_number: String,
    pub status: BookingStatus,
    pub total_price: i64,
    pub estimated_duration: i32,
    pub points_used: i64,
    pub progress: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    /// Price before loyalty points were applied.
    pub fn subtotal(&self) -> i64 {
        self.total_price + self.points_used
    }

    /// Occupied interval in minutes since midnight, half-open.
    pub fn interval(&self) -> (i64, i64) {
        let start = minute_of_day(self.time);
        (start, start + i64::from(self.estimated_duration))
    }

    pub fn blocks_calendar(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in-progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "in-progress" => Some(BookingStatus::InProgress),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Linear lifecycle: pending -> confirmed -> in-progress -> completed,
    /// with cancellation possible before work starts.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Confirmed, BookingStatus::InProgress)
                | (BookingStatus::InProgress, BookingStatus::Completed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }

    pub fn is_cancellable(&self) -> bool {
        self.can_transition_to(BookingStatus::Cancelled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Ordering used by the live queue: cars being worked on first.
    pub fn queue_rank(&self) -> u8 {
        match self {
            BookingStatus::InProgress => 0,
            BookingStatus::Confirmed => 1,
            BookingStatus::Pending => 2,
            BookingStatus::Completed => 3,
            BookingStatus::Cancelled => 4,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pushed to live-queue subscribers whenever a booking is created or changes state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingEvent {
    pub kind: String,
    pub booking_id: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub status: BookingStatus,
    pub progress: i32,
}

impl BookingEvent {
    pub fn from_booking(kind: &str, booking: &Booking) -> Self {
        Self {
            kind: kind.to_string(),
            booking_id: booking.id.clone(),
            date: booking.date,
            time: booking.time,
            status: booking.status,
            progress: booking.progress,
        }
    }
}
