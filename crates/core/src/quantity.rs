//! Exact decimal quantities (kilograms, litres, portions).

use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// An exact decimal amount.
///
/// Ledger rows and workflow lines never hold negative quantities, but
/// intermediate deltas may be negative, so the type itself is signed.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl ValueObject for Quantity {}

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// `max(0, self - other)`.
    pub fn saturating_sub(self, other: Quantity) -> Quantity {
        if other >= self {
            Quantity::ZERO
        } else {
            Quantity(self.0 - other.0)
        }
    }

    /// `self - other`, or `None` when the result would be negative.
    pub fn checked_sub(self, other: Quantity) -> Option<Quantity> {
        let result = self.0 - other.0;
        (result >= Decimal::ZERO).then_some(Quantity(result))
    }

    /// Reject zero and negative amounts with a message naming the field.
    pub fn ensure_positive(self, what: &str) -> Result<Quantity, DomainError> {
        if self.is_positive() {
            Ok(self)
        } else {
            Err(DomainError::validation(format!(
                "{what}: quantity must be positive (got {self})"
            )))
        }
    }
}

impl From<i64> for Quantity {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl From<Decimal> for Quantity {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl FromStr for Quantity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Quantity)
            .map_err(|e| DomainError::validation(format!("invalid quantity '{s}': {e}")))
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0.normalize(), f)
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 + rhs.0)
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        self.0 += rhs.0;
    }
}

impl Sub for Quantity {
    type Output = Quantity;

    fn sub(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 - rhs.0)
    }
}

impl SubAssign for Quantity {
    fn sub_assign(&mut self, rhs: Quantity) {
        self.0 -= rhs.0;
    }
}

impl Neg for Quantity {
    type Output = Quantity;

    fn neg(self) -> Quantity {
        Quantity(-self.0)
    }
}

impl Mul for Quantity {
    type Output = Quantity;

    fn mul(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 * rhs.0)
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Quantity {
        iter.fold(Quantity::ZERO, |acc, q| acc + q)
    }
}

impl<'a> Sum<&'a Quantity> for Quantity {
    fn sum<I: Iterator<Item = &'a Quantity>>(iter: I) -> Quantity {
        iter.fold(Quantity::ZERO, |acc, q| acc + *q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    #[test]
    fn decimal_bom_math_is_exact() {
        assert_eq!(Quantity::from(80) * q("0.2"), Quantity::from(16));
        assert_eq!((Quantity::from(80) * q("0.2")).to_string(), "16");
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        assert_eq!(Quantity::from(20).saturating_sub(Quantity::from(100)), Quantity::ZERO);
        assert_eq!(Quantity::from(100).saturating_sub(Quantity::from(20)), Quantity::from(80));
        assert_eq!(Quantity::from(1).checked_sub(Quantity::from(2)), None);
    }

    #[test]
    fn ensure_positive_rejects_zero() {
        assert!(Quantity::ZERO.ensure_positive("rice").is_err());
        assert!(q("0.001").ensure_positive("rice").is_ok());
    }

    proptest! {
        #[test]
        fn saturating_sub_is_never_negative(a in 0i64..1_000_000, b in 0i64..1_000_000) {
            let r = Quantity::from(a).saturating_sub(Quantity::from(b));
            prop_assert!(!r.is_negative());
            prop_assert_eq!(r, Quantity::from((a - b).max(0)));
        }
    }
}
