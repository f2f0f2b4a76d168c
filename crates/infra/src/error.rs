//! Errors surfaced by the orchestration layer.

use thiserror::Error;

use foodflow_auth::AuthzError;
use foodflow_core::{DomainError, ErrorKind};

use crate::document_store::StoreError;

/// Error returned by every [`SupplyChain`](crate::SupplyChain) operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Authorization(#[from] AuthzError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Every attempt lost an optimistic race.
    #[error("gave up after {attempts} conflicting attempts: {last}")]
    ConcurrencyConflict { attempts: u32, last: String },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Domain(e) => e.kind(),
            ServiceError::Authorization(_) => ErrorKind::Unauthorized,
            ServiceError::Store(StoreError::Conflict(_))
            | ServiceError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            ServiceError::Store(_) | ServiceError::Config(_) => ErrorKind::Internal,
        }
    }

    /// The domain error, if this failure is a business rule violation.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodflow_core::{Quantity, UserId};

    #[test]
    fn kinds_follow_the_shared_taxonomy() {
        let stock: ServiceError = DomainError::InsufficientStock {
            namespace: "stock".into(),
            key: "rice".into(),
            available: Quantity::ZERO,
            requested: Quantity::from(1),
        }
        .into();
        assert_eq!(stock.kind(), ErrorKind::InsufficientStock);
        assert!(stock.as_domain().is_some());

        let denied: ServiceError = AuthzError::NotDesignated {
            expected: UserId::new(),
            actor: UserId::new(),
        }
        .into();
        assert_eq!(denied.kind(), ErrorKind::Unauthorized);

        let raced: ServiceError = StoreError::Conflict("stock/rice".into()).into();
        assert_eq!(raced.kind(), ErrorKind::ConcurrencyConflict);
        assert_eq!(
            ServiceError::from(StoreError::Unavailable("lock".into())).kind(),
            ErrorKind::Internal
        );
    }
}
