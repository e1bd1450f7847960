//! Booking mutations: checkout, status changes and point redemption.
//!
//! Each operation runs in one SQLite transaction on a connection the caller
//! holds exclusively, so the final overlap check and the insert cannot
//! interleave with another checkout.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::{AppError, ValidationError};
use crate::models::availability::parse_time;
use crate::models::{Booking, BookingStatus, LedgerKind, User};
use crate::services::loyalty::points_earned;
use crate::services::quote::{compose_quote, max_redeemable};
use crate::services::scheduling::{validate_booking_time, SchedulingError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub service_id: String,
    #[serde(default)]
    pub option_ids: Vec<String>,
    pub date: NaiveDate,
    pub time: String,
    pub car_model: String,
    pub car_number: String,
    #[serde(default)]
    pub points_to_use: i64,
}

impl NewBooking {
    /// Checks the free-form fields and returns the parsed start time.
    pub fn validate(&self) -> Result<NaiveTime, ValidationError> {
        if self.car_model.trim().is_empty() {
            return Err(ValidationError::field("carModel", "must not be empty"));
        }
        if self.car_number.trim().is_empty() {
            return Err(ValidationError::field("carNumber", "must not be empty"));
        }
        parse_time(&self.time)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub booking: Booking,
    pub points_applied: i64,
    pub balance: i64,
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("booking {id}"))
}

pub fn create_booking(
    conn: &mut Connection,
    user: &User,
    request: &NewBooking,
    config: &AppConfig,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let time = request.validate()?;

    let tx = conn.transaction()?;

    let service = queries::get_service(&tx, &request.service_id)?
        .filter(|s| s.active)
        .ok_or_else(|| AppError::NotFound(format!("service {}", request.service_id)))?;
    let options = queries::get_options_by_ids(&tx, &request.option_ids)?;
    let balance = queries::get_points_balance(&tx, &user.id)?;

    let quote = compose_quote(
        &service,
        request.option_ids.iter().map(String::as_str),
        &options,
        request.points_to_use,
        balance,
    )?;

    let existing = queries::get_bookings_for_date(&tx, request.date)?;
    if let Err(e) = validate_booking_time(
        request.date,
        time,
        quote.total_duration,
        &existing,
        &config.business_hours,
        config.slot_granularity_minutes,
        now,
    ) {
        return Err(match e {
            SchedulingError::Conflict => {
                tracing::warn!(date = %request.date, time = %request.time, user_id = %user.id, "slot taken at checkout");
                AppError::Conflict(e.to_string())
            }
            other => ValidationError::field("time", other.to_string()).into(),
        });
    }

    let applied_options: BTreeSet<String> = options.into_iter().map(|o| o.id).collect();
    let created = Utc::now().naive_utc();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        service_id: service.id.clone(),
        option_ids: applied_options.into_iter().collect(),
        date: request.date,
        time,
        car_model: request.car_model.trim().to_string(),
        car_number: request.car_number.trim().to_uppercase(),
        status: BookingStatus::Pending,
        total_price: quote.final_price,
        estimated_duration: quote.total_duration,
        points_used: quote.effective_points_used,
        progress: 0,
        created_at: created,
        updated_at: created,
    };

    queries::create_booking(&tx, &booking)?;
    if booking.points_used > 0 {
        queries::add_ledger_entry(
            &tx,
            &user.id,
            LedgerKind::Redeem,
            booking.points_used,
            &format!("Paid part of {} with points", service.name),
            Some(&booking.id),
        )?;
    }
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        user_id = %user.id,
        date = %booking.date,
        total_price = booking.total_price,
        points_used = booking.points_used,
        "booking created"
    );
    Ok(booking)
}

fn refund_points(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    if booking.points_used > 0 {
        queries::add_ledger_entry(
            conn,
            &booking.user_id,
            LedgerKind::Refund,
            booking.points_used,
            "Points returned for cancelled booking",
            Some(&booking.id),
        )?;
    }
    Ok(())
}

fn apply_transition(
    conn: &Connection,
    booking: &Booking,
    next: BookingStatus,
    progress: Option<i32>,
    earn_percent: i64,
) -> Result<Booking, AppError> {
    if let Some(p) = progress {
        if !(0..=100).contains(&p) {
            return Err(ValidationError::field("progress", "must be between 0 and 100").into());
        }
    }

    let current = booking.status;
    let invalid = || AppError::InvalidTransition {
        from: current.to_string(),
        to: next.to_string(),
    };

    if current.is_terminal() {
        tracing::warn!(booking_id = %booking.id, status = %current, requested = %next, "booking is already closed");
        return Err(invalid());
    }

    let new_progress = if next == current {
        // Only the progress bar of a car in the bay may be nudged in place
        if current != BookingStatus::InProgress {
            return Err(invalid());
        }
        progress.ok_or_else(|| ValidationError::field("progress", "required when status is unchanged"))?
    } else {
        if !current.can_transition_to(next) {
            return Err(invalid());
        }
        match next {
            BookingStatus::InProgress => progress.unwrap_or(0),
            BookingStatus::Completed => 100,
            _ => booking.progress,
        }
    };

    queries::update_booking_status(conn, &booking.id, next, new_progress)?;

    if next != current {
        match next {
            BookingStatus::Completed => {
                let earned = points_earned(booking.total_price, earn_percent);
                if earned > 0 {
                    queries::add_ledger_entry(
                        conn,
                        &booking.user_id,
                        LedgerKind::Earn,
                        earned,
                        "Points earned for completed booking",
                        Some(&booking.id),
                    )?;
                    tracing::info!(booking_id = %booking.id, user_id = %booking.user_id, earned, "loyalty points credited");
                }
            }
            BookingStatus::Cancelled => refund_points(conn, booking)?,
            _ => {}
        }
    }

    queries::get_booking_by_id(conn, &booking.id)?.ok_or_else(|| not_found(&booking.id))
}

/// Staff-driven status change.
pub fn change_status(
    conn: &mut Connection,
    booking_id: &str,
    next: BookingStatus,
    progress: Option<i32>,
    earn_percent: i64,
) -> Result<Booking, AppError> {
    let tx = conn.transaction()?;
    let booking = queries::get_booking_by_id(&tx, booking_id)?.ok_or_else(|| not_found(booking_id))?;
    let updated = apply_transition(&tx, &booking, next, progress, earn_percent)?;
    tx.commit()?;

    tracing::info!(
        booking_id,
        from = %booking.status,
        to = %updated.status,
        progress = updated.progress,
        "booking status updated"
    );
    Ok(updated)
}

/// Customer cancelling their own booking.
pub fn cancel_by_customer(conn: &mut Connection, user: &User, booking_id: &str) -> Result<Booking, AppError> {
    let tx = conn.transaction()?;
    let booking = queries::get_booking_by_id(&tx, booking_id)?.ok_or_else(|| not_found(booking_id))?;
    if booking.user_id != user.id {
        return Err(AppError::Forbidden);
    }
    let updated = apply_transition(&tx, &booking, BookingStatus::Cancelled, None, 0)?;
    tx.commit()?;

    tracing::info!(booking_id, user_id = %user.id, refunded = booking.points_used, "booking cancelled by customer");
    Ok(updated)
}

/// Spends more points on an open booking. The request is clamped so that the
/// booking never has more than half its subtotal covered by points and the
/// customer never goes below zero.
pub fn redeem_points(
    conn: &mut Connection,
    user: &User,
    booking_id: &str,
    points: i64,
) -> Result<Redemption, AppError> {
    if points < 0 {
        return Err(ValidationError::NegativePoints(points).into());
    }

    let tx = conn.transaction()?;
    let booking = queries::get_booking_by_id(&tx, booking_id)?.ok_or_else(|| not_found(booking_id))?;
    if booking.user_id != user.id {
        return Err(AppError::Forbidden);
    }
    if !booking.status.is_cancellable() {
        return Err(AppError::Conflict(format!(
            "points can only be applied to pending or confirmed bookings (booking is {})",
            booking.status
        )));
    }

    let balance = queries::get_points_balance(&tx, &user.id)?;
    let subtotal = booking.subtotal();
    let ceiling = max_redeemable(subtotal, booking.points_used.saturating_add(balance));
    let new_total = booking
        .points_used
        .saturating_add(points)
        .min(ceiling)
        .max(booking.points_used);
    let applied = new_total - booking.points_used;

    if applied > 0 {
        queries::update_booking_points(&tx, &booking.id, new_total, subtotal - new_total)?;
        queries::add_ledger_entry(
            &tx,
            &user.id,
            LedgerKind::Redeem,
            applied,
            "Paid part of booking with points",
            Some(&booking.id),
        )?;
    }

    let updated = queries::get_booking_by_id(&tx, &booking.id)?.ok_or_else(|| not_found(booking_id))?;
    let balance = queries::get_points_balance(&tx, &user.id)?;
    tx.commit()?;

    tracing::info!(booking_id, user_id = %user.id, requested = points, applied, "points redeemed");
    Ok(Redemption {
        booking: updated,
        points_applied: applied,
        balance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{BusinessHours, Service, ServiceOption};

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn config() -> AppConfig {
        AppConfig {
            port: 0,
            database_url: ":memory:".to_string(),
            admin_token: "admin".to_string(),
            slot_granularity_minutes: 30,
            business_hours: BusinessHours::default(),
            loyalty_earn_percent: 5,
        }
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: format!("Customer {id}"),
            phone: None,
            api_token: format!("tok-{id}"),
            created_at: dt("2025-06-01 08:00"),
        }
    }

    fn setup() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::create_user(&conn, &user("u1")).unwrap();
        queries::create_user(&conn, &user("u2")).unwrap();
        queries::create_service(
            &conn,
            &Service {
                id: "svc".to_string(),
                name: "Full wash".to_string(),
                description: String::new(),
                price: 1500,
                duration: 60,
                category: "wash".to_string(),
                active: true,
            },
        )
        .unwrap();
        for (id, price, duration) in [("a", 300, 10), ("b", 450, 15)] {
            queries::create_service_option(
                &conn,
                &ServiceOption {
                    id: id.to_string(),
                    service_id: "svc".to_string(),
                    name: format!("Option {id}"),
                    price,
                    duration,
                },
            )
            .unwrap();
        }
        conn
    }

    fn request(time: &str, points: i64) -> NewBooking {
        NewBooking {
            service_id: "svc".to_string(),
            option_ids: vec!["a".to_string(), "b".to_string()],
            date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            time: time.to_string(),
            car_model: "Toyota Camry".to_string(),
            car_number: "a123bc".to_string(),
            points_to_use: points,
        }
    }

    const NOW: &str = "2025-06-10 12:00";

    #[test]
    fn test_checkout_applies_quote_and_debits_points() {
        let mut conn = setup();
        queries::add_ledger_entry(&conn, "u1", LedgerKind::Earn, 320, "seed", None).unwrap();

        let booking = create_booking(&mut conn, &user("u1"), &request("10:00", 500), &config(), dt(NOW)).unwrap();
        assert_eq!(booking.total_price, 1930);
        assert_eq!(booking.points_used, 320);
        assert_eq!(booking.estimated_duration, 85);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.car_number, "A123BC");
        assert_eq!(booking.option_ids, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(queries::get_points_balance(&conn, "u1").unwrap(), 0);
    }

    #[test]
    fn test_checkout_conflict_first_committer_wins() {
        let mut conn = setup();
        create_booking(&mut conn, &user("u1"), &request("10:00", 0), &config(), dt(NOW)).unwrap();

        let err = create_booking(&mut conn, &user("u2"), &request("11:00", 0), &config(), dt(NOW)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // 10:00 + 85 minutes ends at 11:25
        let later = create_booking(&mut conn, &user("u2"), &request("11:30", 0), &config(), dt(NOW));
        assert!(later.is_ok());
    }

    #[test]
    fn test_checkout_rejects_past_and_closed_times() {
        let mut conn = setup();
        let err = create_booking(&mut conn, &user("u1"), &request("10:00", 0), &config(), dt("2025-06-16 10:30"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = create_booking(&mut conn, &user("u1"), &request("18:30", 0), &config(), dt(NOW)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_checkout_rejects_foreign_option() {
        let mut conn = setup();
        queries::create_service(
            &conn,
            &Service {
                id: "polish".to_string(),
                name: "Polish".to_string(),
                description: String::new(),
                price: 5000,
                duration: 120,
                category: "polish".to_string(),
                active: true,
            },
        )
        .unwrap();
        queries::create_service_option(
            &conn,
            &ServiceOption {
                id: "ceramic".to_string(),
                service_id: "polish".to_string(),
                name: "Ceramic".to_string(),
                price: 9000,
                duration: 60,
            },
        )
        .unwrap();

        let mut req = request("10:00", 0);
        req.option_ids.push("ceramic".to_string());
        let err = create_booking(&mut conn, &user("u1"), &req, &config(), dt(NOW)).unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::ForeignOption { .. })));
        assert!(queries::get_bookings_for_date(&conn, req.date).unwrap().is_empty());
    }

    #[test]
    fn test_checkout_requires_car_details() {
        let mut conn = setup();
        let mut req = request("10:00", 0);
        req.car_number = " ".to_string();
        let err = create_booking(&mut conn, &user("u1"), &req, &config(), dt(NOW)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_full_lifecycle_credits_points() {
        let mut conn = setup();
        let booking = create_booking(&mut conn, &user("u1"), &request("10:00", 0), &config(), dt(NOW)).unwrap();

        change_status(&mut conn, &booking.id, BookingStatus::Confirmed, None, 5).unwrap();
        let b = change_status(&mut conn, &booking.id, BookingStatus::InProgress, None, 5).unwrap();
        assert_eq!(b.progress, 0);
        let b = change_status(&mut conn, &booking.id, BookingStatus::InProgress, Some(60), 5).unwrap();
        assert_eq!(b.progress, 60);
        let b = change_status(&mut conn, &booking.id, BookingStatus::Completed, None, 5).unwrap();
        assert_eq!(b.progress, 100);

        // 5% of 2250
        assert_eq!(queries::get_lifetime_points(&conn, "u1").unwrap(), 112);
        assert_eq!(queries::get_points_balance(&conn, "u1").unwrap(), 112);

        let err = change_status(&mut conn, &booking.id, BookingStatus::Cancelled, None, 5).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn test_skipping_steps_is_rejected() {
        let mut conn = setup();
        let booking = create_booking(&mut conn, &user("u1"), &request("10:00", 0), &config(), dt(NOW)).unwrap();
        let err = change_status(&mut conn, &booking.id, BookingStatus::Completed, None, 5).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        let err = change_status(&mut conn, &booking.id, BookingStatus::Pending, Some(10), 5).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn test_progress_out_of_range() {
        let mut conn = setup();
        let booking = create_booking(&mut conn, &user("u1"), &request("10:00", 0), &config(), dt(NOW)).unwrap();
        change_status(&mut conn, &booking.id, BookingStatus::Confirmed, None, 5).unwrap();
        let err = change_status(&mut conn, &booking.id, BookingStatus::InProgress, Some(101), 5).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_customer_cancel_refunds_and_frees_slot() {
        let mut conn = setup();
        queries::add_ledger_entry(&conn, "u1", LedgerKind::Earn, 300, "seed", None).unwrap();
        let booking = create_booking(&mut conn, &user("u1"), &request("10:00", 300), &config(), dt(NOW)).unwrap();
        assert_eq!(queries::get_points_balance(&conn, "u1").unwrap(), 0);

        let err = cancel_by_customer(&mut conn, &user("u2"), &booking.id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let cancelled = cancel_by_customer(&mut conn, &user("u1"), &booking.id).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(queries::get_points_balance(&conn, "u1").unwrap(), 300);
        // refunds do not count toward the tier
        assert_eq!(queries::get_lifetime_points(&conn, "u1").unwrap(), 300);

        assert!(create_booking(&mut conn, &user("u2"), &request("10:00", 0), &config(), dt(NOW)).is_ok());

        let err = cancel_by_customer(&mut conn, &user("u1"), &booking.id).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn test_redeem_points_is_clamped() {
        let mut conn = setup();
        queries::add_ledger_entry(&conn, "u1", LedgerKind::Earn, 5000, "seed", None).unwrap();
        let booking = create_booking(&mut conn, &user("u1"), &request("10:00", 100), &config(), dt(NOW)).unwrap();
        assert_eq!(booking.points_used, 100);

        let r = redeem_points(&mut conn, &user("u1"), &booking.id, 4000).unwrap();
        // half of 2250, floor
        assert_eq!(r.booking.points_used, 1125);
        assert_eq!(r.points_applied, 1025);
        assert_eq!(r.booking.total_price, 1125);
        assert_eq!(r.balance, 5000 - 1125);

        let again = redeem_points(&mut conn, &user("u1"), &booking.id, 10).unwrap();
        assert_eq!(again.points_applied, 0);
        assert_eq!(again.booking.points_used, 1125);
    }

    #[test]
    fn test_redeem_points_limited_by_balance() {
        let mut conn = setup();
        queries::add_ledger_entry(&conn, "u1", LedgerKind::Earn, 200, "seed", None).unwrap();
        let booking = create_booking(&mut conn, &user("u1"), &request("10:00", 0), &config(), dt(NOW)).unwrap();

        let r = redeem_points(&mut conn, &user("u1"), &booking.id, 1000).unwrap();
        assert_eq!(r.points_applied, 200);
        assert_eq!(r.balance, 0);

        assert!(matches!(
            redeem_points(&mut conn, &user("u1"), &booking.id, -5),
            Err(AppError::Validation(ValidationError::NegativePoints(-5)))
        ));
        assert!(matches!(
            redeem_points(&mut conn, &user("u2"), &booking.id, 5),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn test_checkout_rejects_off_grid_start() {
        let mut conn = setup();
        let err = create_booking(&mut conn, &user("u1"), &request("10:07", 0), &config(), dt(NOW)).unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::InvalidField { field: "time", .. })));
        assert!(queries::get_bookings_for_date(&conn, request("10:00", 0).date).unwrap().is_empty());
    }

    #[test]
    fn test_redeem_huge_request_is_clamped() {
        let mut conn = setup();
        queries::add_ledger_entry(&conn, "u1", LedgerKind::Earn, 5000, "seed", None).unwrap();
        let booking = create_booking(&mut conn, &user("u1"), &request("10:00", 100), &config(), dt(NOW)).unwrap();

        let r = redeem_points(&mut conn, &user("u1"), &booking.id, i64::MAX).unwrap();
        assert_eq!(r.booking.points_used, 1125);
        assert_eq!(r.points_applied, 1025);
        assert_eq!(r.balance, 5000 - 1125);
    }

    #[test]
    fn test_closed_booking_cannot_move() {
        let mut conn = setup();
        let booking = create_booking(&mut conn, &user("u1"), &request("10:00", 0), &config(), dt(NOW)).unwrap();
        cancel_by_customer(&mut conn, &user("u1"), &booking.id).unwrap();

        for next in [BookingStatus::Confirmed, BookingStatus::Cancelled] {
            let err = change_status(&mut conn, &booking.id, next, None, 5).unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition { .. }));
        }
    }
}
