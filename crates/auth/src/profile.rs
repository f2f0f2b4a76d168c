//! Profiles and the directory collaborator that resolves them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use foodflow_core::{Entity, KitchenId, UserId};

use crate::Role;

/// A person (or station) acting in the supply chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub name: String,
    pub roles: Vec<Role>,
    /// Direct manager in the reporting hierarchy.
    pub reports_to: Option<UserId>,
    /// Kitchen operated by this profile (kitchen staff only).
    pub kitchen_id: Option<KitchenId>,
}

impl Profile {
    pub fn new(id: UserId, name: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            id,
            name: name.into(),
            roles,
            reports_to: None,
            kitchen_id: None,
        }
    }

    pub fn reporting_to(mut self, manager: UserId) -> Self {
        self.reports_to = Some(manager);
        self
    }

    pub fn operating(mut self, kitchen: KitchenId) -> Self {
        self.kitchen_id = Some(kitchen);
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

impl Entity for Profile {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Profile/role lookup consumed by the workflow engine.
pub trait ProfileDirectory: Send + Sync {
    fn profile(&self, id: UserId) -> Option<Profile>;

    /// Every known profile (hierarchy queries build an index from this).
    fn profiles(&self) -> Vec<Profile>;
}

impl<S> ProfileDirectory for Arc<S>
where
    S: ProfileDirectory + ?Sized,
{
    fn profile(&self, id: UserId) -> Option<Profile> {
        (**self).profile(id)
    }

    fn profiles(&self) -> Vec<Profile> {
        (**self).profiles()
    }
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProfileDirectory {
    inner: RwLock<HashMap<UserId, Profile>>,
}

impl InMemoryProfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, profile: Profile) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(profile.id, profile);
        }
    }
}

impl ProfileDirectory for InMemoryProfileDirectory {
    fn profile(&self, id: UserId) -> Option<Profile> {
        self.inner.read().ok()?.get(&id).cloned()
    }

    fn profiles(&self) -> Vec<Profile> {
        match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        }
    }
}
