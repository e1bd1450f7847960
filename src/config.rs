use std::env;

use crate::models::BusinessHours;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub slot_granularity_minutes: u32,
    pub business_hours: BusinessHours,
    pub loyalty_earn_percent: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let business_hours = match env::var("BUSINESS_HOURS") {
            Ok(raw) => BusinessHours::from_json(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "invalid BUSINESS_HOURS, using default schedule");
                BusinessHours::default()
            }),
            Err(_) => BusinessHours::default(),
        };

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "detailing.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            slot_granularity_minutes: env::var("SLOT_GRANULARITY_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(30),
            business_hours,
            loyalty_earn_percent: env::var("LOYALTY_EARN_PERCENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| (0..=100).contains(v))
                .unwrap_or(5),
        }
    }
}
