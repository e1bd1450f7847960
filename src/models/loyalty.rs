use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Why points moved. Earned points count toward the lifetime tier total,
/// refunds only restore the spendable balance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    Earn,
    Redeem,
    Refund,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Earn => "earn",
            LedgerKind::Redeem => "redeem",
            LedgerKind::Refund => "refund",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "earn" => Some(LedgerKind::Earn),
            "redeem" => Some(LedgerKind::Redeem),
            "refund" => Some(LedgerKind::Refund),
            _ => None,
        }
    }

    pub fn direction(&self) -> LedgerDirection {
        match self {
            LedgerKind::Earn | LedgerKind::Refund => LedgerDirection::Credit,
            LedgerKind::Redeem => LedgerDirection::Debit,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerDirection {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: String,
    pub kind: LedgerKind,
    #[serde(rename = "type")]
    pub direction: LedgerDirection,
    /// Always positive; the direction carries the sign.
    pub amount: i64,
    pub description: String,
    pub booking_id: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyStatus {
    pub lifetime_points: i64,
    pub current_level: String,
    pub next_level: Option<String>,
    pub points_to_next_level: Option<i64>,
    pub progress: Option<f64>,
}
