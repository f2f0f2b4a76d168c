//! Reporting hierarchy index.
//!
//! Profiles only store their direct manager. Hierarchy-scoped queries build an
//! [`OrgTree`] once (a `children_of` index over the flat list) and then walk it,
//! instead of rescanning the profile list per level.

use std::collections::{HashMap, HashSet, VecDeque};

use foodflow_core::UserId;

use crate::{Profile, ProfileDirectory, Role};

#[derive(Debug, Clone, Default)]
pub struct OrgTree {
    profiles: HashMap<UserId, Profile>,
    children_of: HashMap<UserId, Vec<UserId>>,
}

impl OrgTree {
    pub fn build(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let profiles: HashMap<UserId, Profile> =
            profiles.into_iter().map(|p| (p.id, p)).collect();

        let mut children_of: HashMap<UserId, Vec<UserId>> = HashMap::new();
        for profile in profiles.values() {
            if let Some(manager) = profile.reports_to {
                children_of.entry(manager).or_default().push(profile.id);
            }
        }
        for children in children_of.values_mut() {
            children.sort();
        }

        Self {
            profiles,
            children_of,
        }
    }

    pub fn from_directory(directory: &dyn ProfileDirectory) -> Self {
        Self::build(directory.profiles())
    }

    pub fn profile(&self, id: UserId) -> Option<&Profile> {
        self.profiles.get(&id)
    }

    pub fn children(&self, id: UserId) -> &[UserId] {
        self.children_of.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every direct and indirect report of `id`, breadth-first.
    pub fn subordinates(&self, id: UserId) -> Vec<UserId> {
        let mut seen = HashSet::from([id]);
        let mut queue: VecDeque<UserId> = self.children(id).iter().copied().collect();
        let mut out = Vec::new();

        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next);
            queue.extend(self.children(next).iter().copied());
        }
        out
    }

    /// Managers of `id`, nearest first. Cycles in bad data terminate the walk.
    pub fn ancestors(&self, id: UserId) -> Vec<UserId> {
        let mut seen = HashSet::from([id]);
        let mut out = Vec::new();
        let mut current = self.profiles.get(&id).and_then(|p| p.reports_to);

        while let Some(manager) = current {
            if !seen.insert(manager) {
                break;
            }
            out.push(manager);
            current = self.profiles.get(&manager).and_then(|p| p.reports_to);
        }
        out
    }

    /// Nearest manager of `id` holding `role`.
    pub fn nearest_with_role(&self, id: UserId, role: Role) -> Option<UserId> {
        self.ancestors(id)
            .into_iter()
            .find(|m| self.profiles.get(m).is_some_and(|p| p.has_role(role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, roles: Vec<Role>, manager: Option<UserId>) -> Profile {
        let mut p = Profile::new(UserId::new(), name, roles);
        p.reports_to = manager;
        p
    }

    #[test]
    fn subordinates_are_found_transitively() {
        let finance = profile("fin", vec![Role::Finance], None);
        let stock = profile("stock", vec![Role::StockManager], Some(finance.id));
        let zonal = profile("zonal", vec![Role::ZonalManager], Some(stock.id));
        let rep_a = profile("a", vec![Role::Sales], Some(zonal.id));
        let rep_b = profile("b", vec![Role::Sales], Some(zonal.id));
        let outsider = profile("x", vec![Role::Sales], None);

        let tree = OrgTree::build(vec![
            finance.clone(),
            stock.clone(),
            zonal.clone(),
            rep_a.clone(),
            rep_b.clone(),
            outsider.clone(),
        ]);

        let subs: HashSet<_> = tree.subordinates(stock.id).into_iter().collect();
        assert_eq!(subs, HashSet::from([zonal.id, rep_a.id, rep_b.id]));
        assert!(tree.subordinates(rep_a.id).is_empty());

        assert_eq!(tree.nearest_with_role(rep_a.id, Role::StockManager), Some(stock.id));
        assert_eq!(tree.nearest_with_role(rep_a.id, Role::Finance), Some(finance.id));
        assert_eq!(tree.nearest_with_role(outsider.id, Role::Finance), None);
    }

    #[test]
    fn cycles_do_not_loop_forever() {
        let a_id = UserId::new();
        let b = profile("b", vec![Role::Sales], Some(a_id));
        let mut a = profile("a", vec![Role::Sales], Some(b.id));
        a.id = a_id;

        let tree = OrgTree::build(vec![a.clone(), b.clone()]);
        assert_eq!(tree.ancestors(a.id), vec![b.id]);
        assert_eq!(tree.subordinates(a.id), vec![b.id]);
    }
}
