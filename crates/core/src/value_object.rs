//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity: a `Quantity` of 16 is the same as any other
/// `Quantity` of 16, and an ingredient line is defined entirely by its name,
/// amount and unit. They are immutable; "changing" one means building a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
