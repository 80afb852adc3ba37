//! Membership Directory
//!
//! Maps (identity, organization) pairs to assignments. Owns nothing from
//! the guild tree: the two stores are correlated only through ids passed
//! by value, so a seat may outlive or predate its node — the
//! authorization engine treats a dangling seat as a deny.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::permissions::TierPermissions;

use super::types::Assignment;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AssignmentKey {
    identity: String,
    org_id: Uuid,
}

/// Shared assignment store. Cheap to clone; all clones observe the same
/// directory.
#[derive(Debug, Clone, Default)]
pub struct MembershipDirectory {
    state: Arc<RwLock<HashMap<AssignmentKey, Assignment>>>,
}

impl MembershipDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_assignments(assignments: Vec<Assignment>) -> Self {
        let map = assignments
            .into_iter()
            .map(|a| {
                (
                    AssignmentKey {
                        identity: a.identity.clone(),
                        org_id: a.org_id,
                    },
                    a,
                )
            })
            .collect();
        Self {
            state: Arc::new(RwLock::new(map)),
        }
    }

    /// Seat an identity in an organization.
    ///
    /// At most one assignment exists per (identity, organization) pair.
    #[tracing::instrument(skip(self))]
    pub async fn assign(
        &self,
        identity: &str,
        org_id: Uuid,
        node_id: Uuid,
        permissions: TierPermissions,
    ) -> CoreResult<Assignment> {
        let key = AssignmentKey {
            identity: identity.to_string(),
            org_id,
        };

        let mut state = self.state.write().await;
        if state.contains_key(&key) {
            return Err(CoreError::AlreadyAssigned);
        }

        let now = Utc::now();
        let assignment = Assignment {
            identity: identity.to_string(),
            org_id,
            node_id,
            permissions,
            created_at: now,
            updated_at: now,
        };
        state.insert(key, assignment.clone());

        info!(org_id = %org_id, node_id = %node_id, "identity assigned");
        Ok(assignment)
    }

    /// Fetch an identity's assignment in an organization.
    pub async fn get(&self, identity: &str, org_id: Uuid) -> CoreResult<Assignment> {
        let key = AssignmentKey {
            identity: identity.to_string(),
            org_id,
        };
        let state = self.state.read().await;
        state.get(&key).cloned().ok_or(CoreError::NotFound)
    }

    /// All assignments under an organization, any node, sorted by identity.
    pub async fn list_by_org(&self, org_id: Uuid) -> Vec<Assignment> {
        let state = self.state.read().await;
        let mut out: Vec<Assignment> = state
            .values()
            .filter(|a| a.org_id == org_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.identity.cmp(&b.identity));
        out
    }

    /// Replace an assignment's permission set.
    #[tracing::instrument(skip(self))]
    pub async fn set_permissions(
        &self,
        identity: &str,
        org_id: Uuid,
        permissions: TierPermissions,
    ) -> CoreResult<Assignment> {
        self.update(identity, org_id, |a| a.permissions = permissions)
            .await
    }

    /// Reseat an assignment at a different node.
    #[tracing::instrument(skip(self))]
    pub async fn set_node(
        &self,
        identity: &str,
        org_id: Uuid,
        node_id: Uuid,
    ) -> CoreResult<Assignment> {
        self.update(identity, org_id, |a| a.node_id = node_id).await
    }

    /// Remove an identity's assignment from an organization.
    #[tracing::instrument(skip(self))]
    pub async fn unassign(&self, identity: &str, org_id: Uuid) -> CoreResult<Assignment> {
        let key = AssignmentKey {
            identity: identity.to_string(),
            org_id,
        };
        let mut state = self.state.write().await;
        let removed = state.remove(&key).ok_or(CoreError::NotFound)?;
        info!(org_id = %org_id, "identity unassigned");
        Ok(removed)
    }

    /// Remove every assignment for an identity across all organizations.
    ///
    /// Returns the removed assignments; an unknown identity yields an
    /// empty list, not an error.
    #[tracing::instrument(skip(self))]
    pub async fn erase_identity(&self, identity: &str) -> Vec<Assignment> {
        let mut state = self.state.write().await;
        let keys: Vec<AssignmentKey> = state
            .keys()
            .filter(|k| k.identity == identity)
            .cloned()
            .collect();
        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(assignment) = state.remove(&key) {
                removed.push(assignment);
            }
        }
        if !removed.is_empty() {
            info!(orgs = removed.len(), "identity erased from directory");
        }
        removed
    }

    pub(crate) async fn export_assignments(&self) -> Vec<Assignment> {
        let state = self.state.read().await;
        let mut out: Vec<Assignment> = state.values().cloned().collect();
        out.sort_by(|a, b| (&a.identity, a.org_id).cmp(&(&b.identity, b.org_id)));
        out
    }

    async fn update(
        &self,
        identity: &str,
        org_id: Uuid,
        apply: impl FnOnce(&mut Assignment),
    ) -> CoreResult<Assignment> {
        let key = AssignmentKey {
            identity: identity.to_string(),
            org_id,
        };
        let mut state = self.state.write().await;
        let assignment = state.get_mut(&key).ok_or(CoreError::NotFound)?;
        apply(assignment);
        assignment.updated_at = Utc::now();
        Ok(assignment.clone())
    }
}
