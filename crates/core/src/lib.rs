//! `foodflow-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by every supply-chain
//! module (no storage, no IO).

pub mod aggregate;
pub mod calendar;
pub mod entity;
pub mod error;
pub mod id;
pub mod quantity;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use calendar::{Clock, FixedClock, SystemClock, Week};
pub use entity::Entity;
pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{AggregateId, KitchenId, OutletId, UserId};
pub use quantity::Quantity;
pub use value_object::ValueObject;
