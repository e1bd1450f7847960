use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// A bookable detailing service. Prices are in the smallest currency unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub duration: i32,
    pub category: String,
    pub active: bool,
}

impl Service {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::field("name", "must not be empty"));
        }
        if self.price < 0 {
            return Err(ValidationError::field("price", "must not be negative"));
        }
        if self.duration <= 0 {
            return Err(ValidationError::field("duration", "must be positive"));
        }
        Ok(())
    }
}

/// An add-on that extends one service (e.g. interior dry cleaning).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOption {
    pub id: String,
    pub service_id: String,
    pub name: String,
    pub price: i64,
    pub duration: i32,
}

impl ServiceOption {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::field("name", "must not be empty"));
        }
        if self.price < 0 {
            return Err(ValidationError::field("price", "must not be negative"));
        }
        if self.duration < 0 {
            return Err(ValidationError::field("duration", "must not be negative"));
        }
        Ok(())
    }
}
