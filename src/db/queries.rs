use std::collections::{BTreeMap, HashMap};

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::availability::format_time;
use crate::models::{
    Booking, BookingStatus, LedgerEntry, LedgerKind, Service, ServiceOption, User,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn now_ts() -> String {
    Utc::now().naive_utc().format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Users ──

pub fn create_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, phone, api_token, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user.id,
            user.name,
            user.phone,
            user.api_token,
            user.created_at.format(TS_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_user_by_token(conn: &Connection, token: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, name, phone, api_token, created_at FROM users WHERE api_token = ?1",
            params![token],
            |row| {
                let created_at: String = row.get(4)?;
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    phone: row.get(2)?,
                    api_token: row.get(3)?,
                    created_at: parse_ts(&created_at),
                })
            },
        )
        .optional()?;
    Ok(user)
}

// ── Services ──

const SERVICE_COLUMNS: &str = "id, name, description, price, duration, category, active";

fn parse_service_row(row: &rusqlite::Row) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        duration: row.get(4)?,
        category: row.get(5)?,
        active: row.get::<_, i32>(6)? != 0,
    })
}

pub fn create_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, name, description, price, duration, category, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            service.id,
            service.name,
            service.description,
            service.price,
            service.duration,
            service.category,
            service.active as i32,
        ],
    )?;
    Ok(())
}

pub fn update_service(conn: &Connection, service: &Service) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE services SET name = ?1, description = ?2, price = ?3, duration = ?4, category = ?5, active = ?6
         WHERE id = ?7",
        params![
            service.name,
            service.description,
            service.price,
            service.duration,
            service.category,
            service.active as i32,
            service.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let service = conn
        .query_row(
            &format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"),
            params![id],
            parse_service_row,
        )
        .optional()?;
    Ok(service)
}

pub fn list_services(conn: &Connection, active_only: bool) -> anyhow::Result<Vec<Service>> {
    let sql = if active_only {
        format!("SELECT {SERVICE_COLUMNS} FROM services WHERE active = 1 ORDER BY category, name")
    } else {
        format!("SELECT {SERVICE_COLUMNS} FROM services ORDER BY category, name")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], parse_service_row)?;

    let mut services = vec![];
    for row in rows {
        services.push(row?);
    }
    Ok(services)
}

pub fn list_categories(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT category FROM services WHERE active = 1 AND category != '' ORDER BY category",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut categories = vec![];
    for row in rows {
        categories.push(row?);
    }
    Ok(categories)
}

pub fn get_service_names(conn: &Connection) -> anyhow::Result<HashMap<String, String>> {
    let mut stmt = conn.prepare("SELECT id, name FROM services")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut names = HashMap::new();
    for row in rows {
        let (id, name) = row?;
        names.insert(id, name);
    }
    Ok(names)
}

// ── Service Options ──

fn parse_option_row(row: &rusqlite::Row) -> rusqlite::Result<ServiceOption> {
    Ok(ServiceOption {
        id: row.get(0)?,
        service_id: row.get(1)?,
        name: row.get(2)?,
        price: row.get(3)?,
        duration: row.get(4)?,
    })
}

pub fn create_service_option(conn: &Connection, option: &ServiceOption) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO service_options (id, service_id, name, price, duration) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            option.id,
            option.service_id,
            option.name,
            option.price,
            option.duration,
        ],
    )?;
    Ok(())
}

pub fn get_options_for_service(
    conn: &Connection,
    service_id: &str,
) -> anyhow::Result<Vec<ServiceOption>> {
    let mut stmt = conn.prepare(
        "SELECT id, service_id, name, price, duration FROM service_options
         WHERE service_id = ?1 ORDER BY price ASC, name ASC",
    )?;
    let rows = stmt.query_map(params![service_id], parse_option_row)?;

    let mut options = vec![];
    for row in rows {
        options.push(row?);
    }
    Ok(options)
}

/// Looks options up by id regardless of service; ids that do not exist are
/// simply absent from the result.
pub fn get_options_by_ids(conn: &Connection, ids: &[String]) -> anyhow::Result<Vec<ServiceOption>> {
    let mut stmt = conn.prepare(
        "SELECT id, service_id, name, price, duration FROM service_options WHERE id = ?1",
    )?;

    let mut options = vec![];
    for id in ids {
        if let Some(option) = stmt.query_row(params![id], parse_option_row).optional()? {
            options.push(option);
        }
    }
    Ok(options)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "b.id, b.user_id, b.service_id, b.date, b.time, b.car_model, b.car_number, \
     b.status, b.total_price, b.estimated_duration, b.points_used, b.progress, b.created_at, b.updated_at, \
     (SELECT GROUP_CONCAT(o.option_id) FROM booking_options o WHERE o.booking_id = b.id)";

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let date_str: String = row.get(3)?;
    let time_str: String = row.get(4)?;
    let status_str: String = row.get(7)?;
    let created_at_str: String = row.get(12)?;
    let updated_at_str: String = row.get(13)?;
    let option_ids: Option<String> = row.get(14)?;

    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .with_context(|| format!("bad booking date: {date_str}"))?;
    let time = NaiveTime::parse_from_str(&time_str, "%H:%M")
        .with_context(|| format!("bad booking time: {time_str}"))?;
    let status = BookingStatus::parse(&status_str)
        .with_context(|| format!("unknown booking status: {status_str}"))?;

    let mut option_ids: Vec<String> = option_ids
        .map(|ids| ids.split(',').map(str::to_string).collect())
        .unwrap_or_default();
    option_ids.sort();

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        service_id: row.get(2)?,
        option_ids,
        date,
        time,
        car_model: row.get(5)?,
        car_number: row.get(6)?,
        status,
        total_price: row.get(8)?,
        estimated_duration: row.get(9)?,
        points_used: row.get(10)?,
        progress: row.get(11)?,
        created_at: parse_ts(&created_at_str),
        updated_at: parse_ts(&updated_at_str),
    })
}

fn collect_bookings(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, service_id, date, time, car_model, car_number, status,
                               total_price, estimated_duration, points_used, progress, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            booking.id,
            booking.user_id,
            booking.service_id,
            booking.date.format(DATE_FORMAT).to_string(),
            format_time(booking.time),
            booking.car_model,
            booking.car_number,
            booking.status.as_str(),
            booking.total_price,
            booking.estimated_duration,
            booking.points_used,
            booking.progress,
            booking.created_at.format(TS_FORMAT).to_string(),
            booking.updated_at.format(TS_FORMAT).to_string(),
        ],
    )?;

    for option_id in &booking.option_ids {
        conn.execute(
            "INSERT OR IGNORE INTO booking_options (booking_id, option_id) VALUES (?1, ?2)",
            params![booking.id, option_id],
        )?;
    }
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let mut bookings = collect_bookings(
        conn,
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1"),
        &[&id],
    )?;
    Ok(bookings.pop())
}

/// Live (non-cancelled) bookings on a calendar day, by start time.
pub fn get_bookings_for_date(conn: &Connection, date: NaiveDate) -> anyhow::Result<Vec<Booking>> {
    let date = date.format(DATE_FORMAT).to_string();
    collect_bookings(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings b
             WHERE b.date = ?1 AND b.status != 'cancelled' ORDER BY b.time ASC"
        ),
        &[&date],
    )
}

pub fn get_bookings_for_user(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<Booking>> {
    collect_bookings(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings b
             WHERE b.user_id = ?1 ORDER BY b.date DESC, b.time DESC"
        ),
        &[&user_id],
    )
}

pub fn get_all_bookings(
    conn: &Connection,
    status_filter: Option<&str>,
    date_filter: Option<NaiveDate>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let mut conditions = vec![];
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(status) = status_filter {
        values.push(Box::new(status.to_string()));
        conditions.push(format!("b.status = ?{}", values.len()));
    }
    if let Some(date) = date_filter {
        values.push(Box::new(date.format(DATE_FORMAT).to_string()));
        conditions.push(format!("b.date = ?{}", values.len()));
    }
    values.push(Box::new(limit));
    let limit_param = values.len();

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b {where_clause}
         ORDER BY b.date DESC, b.time DESC LIMIT ?{limit_param}"
    );

    let params_refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|p| p.as_ref()).collect();
    collect_bookings(conn, &sql, &params_refs)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    progress: i32,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, progress = ?2, updated_at = ?3 WHERE id = ?4",
        params![status.as_str(), progress, now_ts(), id],
    )?;
    Ok(count > 0)
}

pub fn update_booking_points(
    conn: &Connection,
    id: &str,
    points_used: i64,
    total_price: i64,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET points_used = ?1, total_price = ?2, updated_at = ?3 WHERE id = ?4",
        params![points_used, total_price, now_ts(), id],
    )?;
    Ok(count > 0)
}

// ── Loyalty Ledger ──

pub fn add_ledger_entry(
    conn: &Connection,
    user_id: &str,
    kind: LedgerKind,
    amount: i64,
    description: &str,
    booking_id: Option<&str>,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO loyalty_ledger (user_id, kind, amount, description, booking_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![user_id, kind.as_str(), amount, description, booking_id, now_ts()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Spendable balance: credits minus debits.
pub fn get_points_balance(conn: &Connection, user_id: &str) -> anyhow::Result<i64> {
    let balance: i64 = conn.query_row(
        "SELECT COALESCE(SUM(CASE WHEN kind = 'redeem' THEN -amount ELSE amount END), 0)
         FROM loyalty_ledger WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(balance)
}

/// Points ever earned from completed bookings; drives the loyalty tier.
pub fn get_lifetime_points(conn: &Connection, user_id: &str) -> anyhow::Result<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM loyalty_ledger WHERE user_id = ?1 AND kind = 'earn'",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub fn get_ledger(conn: &Connection, user_id: &str, limit: i64) -> anyhow::Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, kind, amount, description, booking_id, created_at
         FROM loyalty_ledger WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![user_id, limit], |row| {
        let kind: String = row.get(2)?;
        let created_at: String = row.get(6)?;
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            kind,
            row.get::<_, i64>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
            created_at,
        ))
    })?;

    let mut entries = vec![];
    for row in rows {
        let (id, user_id, kind, amount, description, booking_id, created_at) = row?;
        let kind = LedgerKind::parse(&kind).with_context(|| format!("unknown ledger kind: {kind}"))?;
        entries.push(LedgerEntry {
            id,
            user_id,
            kind,
            direction: kind.direction(),
            amount,
            description,
            booking_id,
            created_at: parse_ts(&created_at),
        });
    }
    Ok(entries)
}

// ── Dashboard ──

pub struct DashboardStats {
    pub bookings_by_status: BTreeMap<String, i64>,
    pub completed_revenue: i64,
    pub points_redeemed: i64,
    pub today_bookings: i64,
    pub active_services: i64,
}

pub fn get_dashboard_stats(conn: &Connection, today: NaiveDate) -> anyhow::Result<DashboardStats> {
    let mut bookings_by_status = BTreeMap::new();
    {
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM bookings GROUP BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (status, count) = row?;
            bookings_by_status.insert(status, count);
        }
    }

    let (completed_revenue, points_redeemed): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(total_price), 0), COALESCE(SUM(points_used), 0)
         FROM bookings WHERE status = 'completed'",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let today_bookings: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE date = ?1 AND status != 'cancelled'",
        params![today.format(DATE_FORMAT).to_string()],
        |row| row.get(0),
    )?;

    let active_services: i64 =
        conn.query_row("SELECT COUNT(*) FROM services WHERE active = 1", [], |row| row.get(0))?;

    Ok(DashboardStats {
        bookings_by_status,
        completed_revenue,
        points_redeemed,
        today_bookings,
        active_services,
    })
}
