//! Role and permission lookups for principals.
//!
//! Roles and permissions live outside this crate; the resolver only needs
//! their id sets. [`AuthorityDirectory`] is the seam an application plugs its
//! own user/role store into.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// Supplies `principal.roles` and `role.permissions` as id sets.
#[async_trait]
pub trait AuthorityDirectory: Send + Sync {
    /// Roles currently held by the principal.
    async fn role_ids(&self, principal: Uuid) -> Result<Vec<Uuid>>;

    /// Permissions granted through any of the given roles.
    async fn permission_ids(&self, role_ids: &[Uuid]) -> Result<Vec<Uuid>>;
}

/// Directory backed by in-memory maps.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    roles: HashMap<Uuid, BTreeSet<Uuid>>,
    permissions: HashMap<Uuid, BTreeSet<Uuid>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `principal` the role `role_id`.
    pub fn with_role(mut self, principal: Uuid, role_id: Uuid) -> Self {
        self.grant_role(principal, role_id);
        self
    }

    /// Attach permission `permission_id` to `role_id`.
    pub fn with_permission(mut self, role_id: Uuid, permission_id: Uuid) -> Self {
        self.grant_permission(role_id, permission_id);
        self
    }

    pub fn grant_role(&mut self, principal: Uuid, role_id: Uuid) {
        self.roles.entry(principal).or_default().insert(role_id);
    }

    pub fn grant_permission(&mut self, role_id: Uuid, permission_id: Uuid) {
        self.permissions
            .entry(role_id)
            .or_default()
            .insert(permission_id);
    }
}

#[async_trait]
impl AuthorityDirectory for InMemoryDirectory {
    async fn role_ids(&self, principal: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .roles
            .get(&principal)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn permission_ids(&self, role_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let merged: BTreeSet<Uuid> = role_ids
            .iter()
            .filter_map(|role| self.permissions.get(role))
            .flatten()
            .copied()
            .collect();
        Ok(merged.into_iter().collect())
    }
}
