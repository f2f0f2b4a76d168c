//! Domain error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quantity::Quantity;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Coarse failure taxonomy shared by every layer.
///
/// Callers branch on the kind; the concrete [`DomainError`] variant carries the
/// item-scoped detail (which ingredient, which recipe) for user-facing messages.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    PreconditionFailed,
    InsufficientStock,
    InsufficientKitchenStock,
    NotFound,
    ConcurrencyConflict,
    Unauthorized,
    /// Storage or serialization failure outside the domain's control.
    Internal,
}

/// Domain-level error.
///
/// Deterministic business failures only; storage failures live in the infra layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input (e.g. non-positive quantity, empty name).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A forecast already exists for the (submitter, week) pair.
    #[error("forecast already submitted by {submitter} for week {week}")]
    DuplicateSubmission { submitter: String, week: String },

    /// A workflow transition is not allowed from the current state.
    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// The requested daily target is larger than what is left of the weekly forecast.
    #[error("{recipe}: requested {requested} exceeds remaining forecast {remaining}")]
    ExceedsForecast {
        recipe: String,
        requested: Quantity,
        remaining: Quantity,
    },

    /// Kitchen allocations do not add up to the aggregated daily target.
    #[error("{item}: allocated {allocated} but the aggregated target is {expected}")]
    AllocationMismatch {
        item: String,
        expected: Quantity,
        allocated: Quantity,
    },

    /// Any other state precondition (wrong actor for a step, frozen document, ...).
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// A central ledger row would go negative.
    #[error("insufficient {namespace} for {key}: available {available}, requested {requested}")]
    InsufficientStock {
        namespace: String,
        key: String,
        available: Quantity,
        requested: Quantity,
    },

    /// A kitchen ledger row would go negative.
    #[error("kitchen {kitchen} lacks {ingredient}: available {available}, requested {requested}")]
    InsufficientKitchenStock {
        kitchen: String,
        ingredient: String,
        available: Quantity,
        requested: Quantity,
    },

    /// A referenced recipe, profile or document is missing.
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// Stale version / lost optimistic race.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The actor may not perform the requested step.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn invalid_transition(
        entity: &'static str,
        from: impl core::fmt::Debug,
        to: impl core::fmt::Debug,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_) | DomainError::InvalidId(_) => ErrorKind::Validation,
            DomainError::DuplicateSubmission { .. }
            | DomainError::InvalidTransition { .. }
            | DomainError::ExceedsForecast { .. }
            | DomainError::AllocationMismatch { .. }
            | DomainError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            DomainError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            DomainError::InsufficientKitchenStock { .. } => ErrorKind::InsufficientKitchenStock,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Conflict(_) => ErrorKind::ConcurrencyConflict,
            DomainError::Unauthorized(_) => ErrorKind::Unauthorized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_rejections_are_precondition_failures() {
        let dup = DomainError::DuplicateSubmission {
            submitter: "s".into(),
            week: "06-01-2024".into(),
        };
        assert_eq!(dup.kind(), ErrorKind::PreconditionFailed);

        let mismatch = DomainError::AllocationMismatch {
            item: "biryani".into(),
            expected: Quantity::from(100),
            allocated: Quantity::from(101),
        };
        assert_eq!(mismatch.kind(), ErrorKind::PreconditionFailed);
        assert!(mismatch.to_string().contains("biryani"));
    }

    #[test]
    fn stock_failures_keep_their_own_kind() {
        let err = DomainError::InsufficientKitchenStock {
            kitchen: "k1".into(),
            ingredient: "rice".into(),
            available: Quantity::ZERO,
            requested: Quantity::from(2),
        };
        assert_eq!(err.kind(), ErrorKind::InsufficientKitchenStock);
        assert_eq!(DomainError::conflict("x").kind(), ErrorKind::ConcurrencyConflict);
    }
}
