use chrono::{DateTime, Utc};

/// A fact emitted by a workflow aggregate or the ledger.
///
/// Published on the change feed only after the transaction that produced it
/// commits.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name, `<area>.<document>.<change>` (e.g. "kitchen.assignment.dispersed").
    fn event_type(&self) -> &'static str;

    /// Payload schema version.
    fn version(&self) -> u32;

    /// Business time of the change, taken from the engine clock.
    fn occurred_at(&self) -> DateTime<Utc>;
}
