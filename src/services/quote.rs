use std::collections::BTreeSet;

use serde::Serialize;

use crate::errors::ValidationError;
use crate::models::{Service, ServiceOption};

/// At most this share of a subtotal may be paid with loyalty points.
pub const MAX_POINTS_SHARE_PERCENT: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub subtotal: i64,
    pub total_duration: i32,
    pub max_redeemable: i64,
    pub effective_points_used: i64,
    pub final_price: i64,
}

/// Largest number of points that may be spent against `subtotal` by a
/// customer holding `available_points`.
pub fn max_redeemable(subtotal: i64, available_points: i64) -> i64 {
    let cap = i128::from(subtotal.max(0)) * i128::from(MAX_POINTS_SHARE_PERCENT) / 100;
    i64::try_from(cap).unwrap_or(i64::MAX).min(available_points.max(0))
}

/// Prices a booking selection: base service plus add-ons, minus the points
/// the customer wants to spend.
///
/// Selected ids are treated as a set. Ids missing from `all_options` are
/// skipped (stale references from an old catalog page); ids that resolve to
/// an option of another service are rejected. Requested points above the
/// ceiling are clamped down to it.
pub fn compose_quote<'a, I>(
    service: &Service,
    selected_option_ids: I,
    all_options: &[ServiceOption],
    points_to_use: i64,
    available_points: i64,
) -> Result<Quote, ValidationError>
where
    I: IntoIterator<Item = &'a str>,
{
    service.validate()?;
    if points_to_use < 0 {
        return Err(ValidationError::NegativePoints(points_to_use));
    }

    let mut subtotal = service.price;
    let mut total_duration = service.duration;

    let selected: BTreeSet<&str> = selected_option_ids.into_iter().collect();
    for id in selected {
        let Some(option) = all_options.iter().find(|o| o.id == id) else {
            tracing::debug!(option_id = %id, service_id = %service.id, "skipping unknown option");
            continue;
        };
        if option.service_id != service.id {
            return Err(ValidationError::ForeignOption {
                option_id: option.id.clone(),
                service_id: service.id.clone(),
            });
        }
        option.validate()?;
        subtotal = subtotal
            .checked_add(option.price)
            .ok_or_else(|| ValidationError::field("price", "total is out of range"))?;
        total_duration = total_duration
            .checked_add(option.duration)
            .ok_or_else(|| ValidationError::field("duration", "total is out of range"))?;
    }

    let max_redeemable = max_redeemable(subtotal, available_points);
    let effective_points_used = points_to_use.clamp(0, max_redeemable);

    Ok(Quote {
        subtotal,
        total_duration,
        max_redeemable,
        effective_points_used,
        final_price: subtotal - effective_points_used,
    })
}
