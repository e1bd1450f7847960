use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

const DAY_ORDER: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// One opening window of the shop on a weekday, e.g. `mon 09:00-19:00`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpeningSlot {
    pub day: String,
    pub start: String,
    pub end: String,
}

/// Weekly business hours. A weekday may have several windows (lunch breaks)
/// or none at all (closed).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessHours {
    pub slots: Vec<OpeningSlot>,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            slots: DAY_ORDER
                .iter()
                .map(|day| OpeningSlot {
                    day: day.to_string(),
                    start: "09:00".to_string(),
                    end: "19:00".to_string(),
                })
                .collect(),
        }
    }
}

impl BusinessHours {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let hours: BusinessHours = serde_json::from_str(s)?;
        for slot in &hours.slots {
            parse_weekday(&slot.day)?;
            let start = parse_time(&slot.start)?;
            let end = parse_time(&slot.end)?;
            if start >= end {
                anyhow::bail!("opening window {} {}-{} ends before it starts", slot.day, slot.start, slot.end);
            }
        }
        Ok(hours)
    }

    /// Opening windows for a weekday, sorted by opening time.
    pub fn windows_for(&self, weekday: Weekday) -> Vec<(NaiveTime, NaiveTime)> {
        let key = weekday_key(weekday);
        let mut windows: Vec<(NaiveTime, NaiveTime)> = self
            .slots
            .iter()
            .filter(|slot| slot.day.eq_ignore_ascii_case(key))
            .filter_map(|slot| Some((parse_time(&slot.start).ok()?, parse_time(&slot.end).ok()?)))
            .collect();
        windows.sort();
        windows
    }

    /// The opening window of that date holding all of `[start, start + duration)`.
    pub fn window_containing(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        duration_minutes: i32,
    ) -> Option<(NaiveTime, NaiveTime)> {
        let begin = minute_of_day(start);
        let end = begin + i64::from(duration_minutes);
        self.windows_for(date.weekday())
            .into_iter()
            .find(|(open, close)| begin >= minute_of_day(*open) && end <= minute_of_day(*close))
    }

    pub fn to_human_readable(&self) -> String {
        if self.slots.is_empty() {
            return String::new();
        }

        let mut sorted_slots = self.slots.clone();
        sorted_slots.sort_by_key(|s| {
            let idx = DAY_ORDER
                .iter()
                .position(|d| *d == s.day.to_lowercase())
                .unwrap_or(7);
            (idx, s.start.clone())
        });

        sorted_slots
            .iter()
            .map(|s| {
                let day = capitalize(&s.day);
                format!("{day}: {}-{}", s.start, s.end)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Minutes elapsed since midnight.
pub fn minute_of_day(t: NaiveTime) -> i64 {
    i64::from(t.num_seconds_from_midnight() / 60)
}

pub fn time_from_minutes(minutes: i64) -> Option<NaiveTime> {
    if !(0..24 * 60).contains(&minutes) {
        return None;
    }
    NaiveTime::from_hms_opt((minutes / 60) as u32, (minutes % 60) as u32, 0)
}

pub fn format_time(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Parses a wall-clock `HH:MM` value.
pub fn parse_time(s: &str) -> Result<NaiveTime, ValidationError> {
    let invalid = |reason: &str| ValidationError::field("time", format!("{reason}: {s}"));

    let (hour, minute) = s.trim().split_once(':').ok_or_else(|| invalid("expected HH:MM"))?;
    let hour: u32 = hour.parse().map_err(|_| invalid("invalid hour"))?;
    let minute: u32 = minute.parse().map_err(|_| invalid("invalid minute"))?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| invalid("out of range"))
}

pub fn weekday_key(weekday: Weekday) -> &'static str {
    DAY_ORDER[weekday.num_days_from_monday() as usize]
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + &c.as_str().to_lowercase(),
    }
}

fn parse_weekday(s: &str) -> anyhow::Result<()> {
    if DAY_ORDER.contains(&s.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(anyhow::anyhow!("invalid weekday: {s}"))
    }
}

/// Serde adapter writing `NaiveTime` as `HH:MM`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_time(*t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        parse_time(s).unwrap()
    }

    #[test]
    fn test_parse_valid_json() {
        let json = r#"{"slots":[{"day":"mon","start":"09:00","end":"17:00"},{"day":"tue","start":"09:00","end":"17:00"}]}"#;
        let hours = BusinessHours::from_json(json).unwrap();
        assert_eq!(hours.slots.len(), 2);
        assert_eq!(hours.slots[0].day, "mon");
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(BusinessHours::from_json("not json").is_err());
    }

    #[test]
    fn test_parse_invalid_day() {
        let json = r#"{"slots":[{"day":"xyz","start":"09:00","end":"17:00"}]}"#;
        assert!(BusinessHours::from_json(json).is_err());
    }

    #[test]
    fn test_parse_invalid_time() {
        let json = r#"{"slots":[{"day":"mon","start":"25:00","end":"17:00"}]}"#;
        assert!(BusinessHours::from_json(json).is_err());
    }

    #[test]
    fn test_parse_inverted_window() {
        let json = r#"{"slots":[{"day":"mon","start":"17:00","end":"09:00"}]}"#;
        assert!(BusinessHours::from_json(json).is_err());
    }

    #[test]
    fn test_default_is_open_every_day() {
        let hours = BusinessHours::default();
        for day in [Weekday::Mon, Weekday::Wed, Weekday::Sun] {
            assert_eq!(hours.windows_for(day), vec![(t("09:00"), t("19:00"))]);
        }
    }

    #[test]
    fn test_windows_sorted_and_case_insensitive() {
        let json = r#"{"slots":[{"day":"Mon","start":"14:00","end":"18:00"},{"day":"mon","start":"09:00","end":"13:00"}]}"#;
        let hours = BusinessHours::from_json(json).unwrap();
        assert_eq!(
            hours.windows_for(Weekday::Mon),
            vec![(t("09:00"), t("13:00")), (t("14:00"), t("18:00"))]
        );
        assert!(hours.windows_for(Weekday::Tue).is_empty());
    }

    #[test]
    fn test_window_containing_start() {
        let json = r#"{"slots":[{"day":"mon","start":"09:00","end":"17:00"}]}"#;
        let hours = BusinessHours::from_json(json).unwrap();
        // 2025-06-16 is a Monday
        assert!(hours.window_containing(date("2025-06-16"), t("09:00"), 60).is_some());
        assert!(hours.window_containing(date("2025-06-16"), t("16:00"), 60).is_some());
        assert!(hours.window_containing(date("2025-06-16"), t("16:30"), 60).is_none());
        assert!(hours.window_containing(date("2025-06-16"), t("08:30"), 60).is_none());
        // 2025-06-17 is a Tuesday
        assert!(hours.window_containing(date("2025-06-17"), t("10:00"), 60).is_none());
    }

    #[test]
    fn test_window_containing_does_not_span_lunch_break() {
        let json = r#"{"slots":[{"day":"mon","start":"09:00","end":"13:00"},{"day":"mon","start":"14:00","end":"18:00"}]}"#;
        let hours = BusinessHours::from_json(json).unwrap();
        assert!(hours.window_containing(date("2025-06-16"), t("12:30"), 60).is_none());
        assert!(hours.window_containing(date("2025-06-16"), t("14:00"), 60).is_some());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(format_time(t("9:05")), "09:05");
        assert!(parse_time("24:00").is_err());
        assert!(parse_time("12").is_err());
        assert!(parse_time("ab:cd").is_err());
    }

    #[test]
    fn test_minutes_round_trip_bounds() {
        assert_eq!(minute_of_day(t("13:30")), 810);
        assert_eq!(time_from_minutes(810), Some(t("13:30")));
        assert_eq!(time_from_minutes(24 * 60), None);
        assert_eq!(time_from_minutes(-1), None);
    }

    #[test]
    fn test_to_human_readable() {
        let json = r#"{"slots":[{"day":"fri","start":"10:00","end":"16:00"},{"day":"mon","start":"09:00","end":"17:00"}]}"#;
        let hours = BusinessHours::from_json(json).unwrap();
        assert_eq!(hours.to_human_readable(), "Mon: 09:00-17:00, Fri: 10:00-16:00");
    }

    #[test]
    fn test_to_human_readable_empty() {
        let hours = BusinessHours::from_json(r#"{"slots":[]}"#).unwrap();
        assert_eq!(hours.to_human_readable(), "");
    }
}
