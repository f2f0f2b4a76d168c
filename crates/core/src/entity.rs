//! Identified records that are not workflow aggregates.

/// A record with a stable identity but no command/event lifecycle of its own:
/// profiles, recipes, daily targets, assignment batches, spoilage logs.
///
/// Such records are written as plain documents, replaced wholesale when they
/// change.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
