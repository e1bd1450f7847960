use std::collections::HashMap;

use chrono::NaiveTime;
use serde::Serialize;

use crate::models::availability::hhmm;
use crate::models::{Booking, BookingStatus};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub position: usize,
    pub booking_id: String,
    pub service_name: String,
    pub car_model: String,
    pub car_number: String,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub estimated_duration: i32,
    pub status: BookingStatus,
    pub progress: i32,
}

/// Orders a day's live bookings for the public queue board: cars in the bay
/// first, then confirmed, pending and finished ones, each by start time.
pub fn build_queue(bookings: &[Booking], service_names: &HashMap<String, String>) -> Vec<QueueEntry> {
    let mut live: Vec<&Booking> = bookings.iter().filter(|b| b.blocks_calendar()).collect();
    live.sort_by_key(|b| (b.status.queue_rank(), b.time));

    live.into_iter()
        .enumerate()
        .map(|(i, b)| QueueEntry {
            position: i + 1,
            booking_id: b.id.clone(),
            service_name: service_names
                .get(&b.service_id)
                .cloned()
                .unwrap_or_default(),
            car_model: b.car_model.clone(),
            car_number: b.car_number.clone(),
            time: b.time,
            estimated_duration: b.estimated_duration,
            status: b.status,
            progress: b.progress,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn booking(id: &str, time: &str, status: BookingStatus) -> Booking {
        let created = NaiveDateTime::parse_from_str("2025-06-01 08:00", "%Y-%m-%d %H:%M").unwrap();
        Booking {
            id: id.to_string(),
            user_id: "u1".to_string(),
            service_id: "svc".to_string(),
            option_ids: vec![],
            date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            car_model: "Skoda Octavia".to_string(),
            car_number: "B777OP".to_string(),
            status,
            total_price: 1500,
            estimated_duration: 60,
            points_used: 0,
            progress: if status == BookingStatus::InProgress { 40 } else { 0 },
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_queue_order_and_positions() {
        let bookings = vec![
            booking("p", "09:00", BookingStatus::Pending),
            booking("c2", "13:00", BookingStatus::Confirmed),
            booking("x", "08:00", BookingStatus::Cancelled),
            booking("done", "07:00", BookingStatus::Completed),
            booking("c1", "11:00", BookingStatus::Confirmed),
            booking("w", "10:00", BookingStatus::InProgress),
        ];
        let names = HashMap::from([("svc".to_string(), "Full wash".to_string())]);

        let queue = build_queue(&bookings, &names);
        let ids: Vec<&str> = queue.iter().map(|e| e.booking_id.as_str()).collect();
        assert_eq!(ids, vec!["w", "c1", "c2", "p", "done"]);
        assert_eq!(queue[0].position, 1);
        assert_eq!(queue[0].progress, 40);
        assert_eq!(queue[4].position, 5);
        assert_eq!(queue[0].service_name, "Full wash");
    }

    #[test]
    fn test_unknown_service_has_blank_name() {
        let queue = build_queue(&[booking("p", "09:00", BookingStatus::Pending)], &HashMap::new());
        assert_eq!(queue[0].service_name, "");
    }
}
