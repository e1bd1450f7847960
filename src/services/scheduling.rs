use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::errors::ValidationError;
use crate::models::availability::{minute_of_day, time_from_minutes};
use crate::models::{Booking, BusinessHours};

#[derive(Debug, PartialEq)]
pub enum SchedulingError {
    PastDate,
    OutsideBusinessHours { hours: String },
    OffGrid { granularity: u32 },
    Conflict,
}

impl std::fmt::Display for SchedulingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulingError::PastDate => {
                write!(f, "That time has already passed. Please pick a later slot.")
            }
            SchedulingError::OutsideBusinessHours { hours } => {
                write!(
                    f,
                    "That time is outside our business hours. We're open: {hours}"
                )
            }
            SchedulingError::OffGrid { granularity } => {
                write!(
                    f,
                    "Bookings start every {granularity} minutes from opening. Please pick one of the offered slots."
                )
            }
            SchedulingError::Conflict => {
                write!(
                    f,
                    "Sorry, that time slot has just been booked. Please pick a different time."
                )
            }
        }
    }
}

impl std::error::Error for SchedulingError {}

/// Display buckets for a day's slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DayPeriod {
    Morning,
    Afternoon,
    Evening,
}

impl DayPeriod {
    pub fn of(start: NaiveTime) -> Self {
        match minute_of_day(start) {
            m if m < 12 * 60 => DayPeriod::Morning,
            m if m < 17 * 60 => DayPeriod::Afternoon,
            _ => DayPeriod::Evening,
        }
    }
}

fn overlaps(a: (i64, i64), b: (i64, i64)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

fn conflicts_with(date: NaiveDate, interval: (i64, i64), existing: &[Booking]) -> bool {
    existing
        .iter()
        .filter(|b| b.date == date && b.blocks_calendar())
        .any(|b| overlaps(interval, b.interval()))
}

/// Bookable start times for `date`, ascending.
///
/// Candidates step through every opening window of the weekday by
/// `granularity_minutes`; a candidate survives if its whole interval stays in
/// the window, it does not overlap a live booking of that date, and (for
/// today) it starts strictly after `now`. Past dates yield no slots.
///
/// The result is advisory: booking creation re-checks with
/// [`validate_booking_time`].
pub fn compute_available_slots(
    date: NaiveDate,
    required_duration_minutes: i32,
    existing: &[Booking],
    hours: &BusinessHours,
    granularity_minutes: u32,
    now: NaiveDateTime,
) -> Result<Vec<NaiveTime>, ValidationError> {
    if required_duration_minutes <= 0 {
        return Err(ValidationError::field("duration", "must be positive"));
    }
    if granularity_minutes == 0 {
        return Err(ValidationError::field("granularity", "must be positive"));
    }
    if date < now.date() {
        return Ok(vec![]);
    }

    let duration = i64::from(required_duration_minutes);
    let step = i64::from(granularity_minutes);
    let now_time = (date == now.date()).then(|| now.time());

    let mut slots = vec![];
    for (open, close) in hours.windows_for(date.weekday()) {
        let close = minute_of_day(close);
        let mut start = minute_of_day(open);
        while start + duration <= close {
            let candidate = (start, start + duration);
            start += step;

            if conflicts_with(date, candidate, existing) {
                continue;
            }
            let Some(slot) = time_from_minutes(candidate.0) else {
                continue;
            };
            if now_time.is_some_and(|now| slot <= now) {
                continue;
            }
            slots.push(slot);
        }
    }

    slots.sort();
    slots.dedup();
    Ok(slots)
}

/// Splits sorted slots into morning (< 12:00), afternoon (< 17:00) and
/// evening. Empty periods are left out.
pub fn bucket_slots(slots: &[NaiveTime]) -> BTreeMap<DayPeriod, Vec<NaiveTime>> {
    let mut buckets: BTreeMap<DayPeriod, Vec<NaiveTime>> = BTreeMap::new();
    for slot in slots {
        buckets.entry(DayPeriod::of(*slot)).or_default().push(*slot);
    }
    buckets
}

/// Authoritative check run while committing a booking. The start must be one
/// of the grid points [`compute_available_slots`] steps through.
pub fn validate_booking_time(
    date: NaiveDate,
    time: NaiveTime,
    duration_minutes: i32,
    existing: &[Booking],
    hours: &BusinessHours,
    granularity_minutes: u32,
    now: NaiveDateTime,
) -> Result<(), SchedulingError> {
    if date.and_time(time) <= now {
        return Err(SchedulingError::PastDate);
    }

    let Some((open, _)) = hours.window_containing(date, time, duration_minutes) else {
        return Err(SchedulingError::OutsideBusinessHours {
            hours: hours.to_human_readable(),
        });
    };

    let start = minute_of_day(time);
    let step = i64::from(granularity_minutes.max(1));
    if (start - minute_of_day(open)) % step != 0 {
        return Err(SchedulingError::OffGrid {
            granularity: granularity_minutes,
        });
    }

    if conflicts_with(date, (start, start + i64::from(duration_minutes)), existing) {
        return Err(SchedulingError::Conflict);
    }

    Ok(())
}
