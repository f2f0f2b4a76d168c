use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foodflow_core::{AggregateId, DomainError, DomainResult, Entity, Quantity, UserId};

use crate::ledger::StockKey;

/// Append-only record of stock written off as spoiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoilageLog {
    pub id: AggregateId,
    pub key: StockKey,
    pub quantity: Quantity,
    pub reason: String,
    pub reported_by: UserId,
    pub reported_at: DateTime<Utc>,
}

impl Entity for SpoilageLog {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl SpoilageLog {
    pub fn new(
        key: StockKey,
        quantity: Quantity,
        reason: impl Into<String>,
        reported_by: UserId,
        reported_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(DomainError::validation("spoilage reason is required"));
        }
        quantity.ensure_positive(&key.to_string())?;

        Ok(Self {
            id: AggregateId::new(),
            key,
            quantity,
            reason,
            reported_by,
            reported_at,
        })
    }
}
