use thiserror::Error;

use foodflow_core::{DomainError, UserId};

use crate::{Action, Profile};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("profile {actor} may not perform '{action}'")]
    Forbidden { actor: UserId, action: Action },

    #[error("step is reserved for profile {expected}, not {actor}")]
    NotDesignated { expected: UserId, actor: UserId },
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::unauthorized(value.to_string())
    }
}

/// Check that `profile` holds a role allowed for `action`.
///
/// Pure policy check: no IO, no business state.
pub fn authorize(profile: &Profile, action: Action) -> Result<(), AuthzError> {
    if profile.is_admin() || action.allowed_roles().iter().any(|r| profile.has_role(*r)) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            actor: profile.id,
            action,
        })
    }
}

/// When a step names a specific approver, only that profile (or an admin) may act.
pub fn ensure_designated(profile: &Profile, designated: Option<UserId>) -> Result<(), AuthzError> {
    match designated {
        Some(expected) if expected != profile.id && !profile.is_admin() => {
            Err(AuthzError::NotDesignated {
                expected,
                actor: profile.id,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    #[test]
    fn role_table_gates_actions() {
        let sales = Profile::new(UserId::new(), "rep", vec![Role::Sales]);
        assert!(authorize(&sales, Action::SubmitForecast).is_ok());
        assert_eq!(
            authorize(&sales, Action::Disperse),
            Err(AuthzError::Forbidden {
                actor: sales.id,
                action: Action::Disperse
            })
        );
    }

    #[test]
    fn admin_is_allowed_everything() {
        let admin = Profile::new(UserId::new(), "root", vec![Role::Admin]);
        assert!(authorize(&admin, Action::ApproveBulkBuy).is_ok());
        assert!(ensure_designated(&admin, Some(UserId::new())).is_ok());
    }

    #[test]
    fn designated_approver_is_enforced() {
        let stock = Profile::new(UserId::new(), "sm", vec![Role::StockManager]);
        assert!(ensure_designated(&stock, Some(stock.id)).is_ok());
        assert!(ensure_designated(&stock, None).is_ok());
        let err = ensure_designated(&stock, Some(UserId::new())).unwrap_err();
        assert!(matches!(err, AuthzError::NotDesignated { .. }));
        assert!(matches!(DomainError::from(err), DomainError::Unauthorized(_)));
    }
}
