//! Workflow events and the change feed.
//!
//! Domain and ledger events are published as [`EventEnvelope`]s on an
//! [`EventBus`] once the transaction that produced them commits. Rolled-back
//! work publishes nothing. This is how external collaborators subscribe to
//! state changes.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
