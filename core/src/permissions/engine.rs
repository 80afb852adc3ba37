//! Authorization engine.
//!
//! Wires the membership directory and the guild tree to the pure
//! resolver: resolve the actor's assignment, compute the topological
//! relation between seat and target, and decide the capability bit.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::membership::MembershipDirectory;
use crate::tree::GuildTree;

use super::resolver;
use super::tiers::Capability;

/// Shared authorization engine over one tree and one directory.
#[derive(Debug, Clone)]
pub struct Authorizer {
    tree: GuildTree,
    directory: MembershipDirectory,
}

impl Authorizer {
    pub const fn new(tree: GuildTree, directory: MembershipDirectory) -> Self {
        Self { tree, directory }
    }

    /// Decide whether `identity` may exercise `capability` at `target_id`
    /// within the organization rooted at `org_id`.
    ///
    /// A missing target node is `NotFound`; a missing assignment is a
    /// plain deny — a non-member holds no capabilities.
    #[tracing::instrument(skip(self))]
    pub async fn check(
        &self,
        identity: &str,
        org_id: Uuid,
        target_id: Uuid,
        capability: Capability,
    ) -> CoreResult<bool> {
        // Surface "does not exist" before any membership question.
        self.tree.lookup(target_id).await?;

        let assignment = match self.directory.get(identity, org_id).await {
            Ok(assignment) => assignment,
            Err(CoreError::NotFound) => {
                debug!(org_id = %org_id, "no assignment for identity, denying");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let relation = match self.tree.relation(assignment.node_id, target_id).await {
            Ok(relation) => relation,
            Err(CoreError::NotFound) => {
                // The seat was removed while the assignment survived; the
                // stores are only correlated by id, so deny rather than fail.
                warn!(
                    org_id = %org_id,
                    node_id = %assignment.node_id,
                    "assignment seat no longer exists, denying"
                );
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let allowed = resolver::is_authorized(assignment.permissions, relation, capability);
        debug!(
            org_id = %org_id,
            target_id = %target_id,
            ?relation,
            allowed,
            "authorization decision"
        );
        Ok(allowed)
    }
}
