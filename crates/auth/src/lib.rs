//! `foodflow-auth`: profiles, roles and the per-step authorization policy.
//!
//! Authentication mechanics are out of scope: callers hand in an already
//! resolved [`Profile`] and this crate answers "may this profile perform this
//! workflow step".

pub mod authorize;
pub mod hierarchy;
pub mod permissions;
pub mod profile;
pub mod roles;

pub use authorize::{AuthzError, authorize, ensure_designated};
pub use hierarchy::OrgTree;
pub use permissions::Action;
pub use profile::{InMemoryProfileDirectory, Profile, ProfileDirectory};
pub use roles::Role;
