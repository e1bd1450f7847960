use crate::models::LoyaltyStatus;

/// Tier ladder keyed by lifetime earned points.
pub const TIERS: [(&str, i64); 6] = [
    ("Новичок", 0),
    ("Bronze", 10_000),
    ("Silver", 25_000),
    ("Gold", 50_000),
    ("Platinum", 100_000),
    ("Diamond", 250_000),
];

pub fn resolve_status(lifetime_points: i64) -> LoyaltyStatus {
    let points = lifetime_points.max(0);

    let idx = TIERS
        .iter()
        .rposition(|(_, threshold)| *threshold <= points)
        .unwrap_or(0);
    let (current, current_threshold) = TIERS[idx];

    match TIERS.get(idx + 1) {
        Some((next, next_threshold)) => {
            let span = (next_threshold - current_threshold) as f64;
            let progress = ((points - current_threshold) as f64 / span * 100.0).clamp(0.0, 100.0);
            LoyaltyStatus {
                lifetime_points: points,
                current_level: current.to_string(),
                next_level: Some(next.to_string()),
                points_to_next_level: Some(next_threshold - points),
                progress: Some(progress),
            }
        }
        None => LoyaltyStatus {
            lifetime_points: points,
            current_level: current.to_string(),
            next_level: None,
            points_to_next_level: None,
            progress: None,
        },
    }
}

/// Points credited when a booking with `final_price` is completed.
pub fn points_earned(final_price: i64, earn_percent: i64) -> i64 {
    final_price.max(0) * earn_percent.clamp(0, 100) / 100
}
