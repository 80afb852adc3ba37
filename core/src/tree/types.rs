//! Guild Tree Type Definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A guild node, as handed out to callers.
///
/// This is a value copy: mutating it never affects stored state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guild {
    pub id: Uuid,
    /// Immediate parent; `None` for a top-level (root) guild.
    pub parent_id: Option<Uuid>,
    /// Root of this node's tree; equals `id` for a root itself.
    pub top_ancestor_id: Uuid,
    /// External lookup key (e.g. the chat-server identifier).
    /// Present only on root nodes; globally unique across all trees.
    pub external_key: Option<String>,
    /// Unique within the flat namespace of the owning tree, not merely
    /// among siblings.
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl Guild {
    /// Whether this node is a top-level guild.
    pub const fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Topological relation between a seated node and a target node.
///
/// Computed by [`crate::tree::GuildTree::relation`] and consumed by the
/// permission resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRelation {
    /// Target is the seated node itself or one of its descendants.
    Beneath,
    /// Target is inside the subtree of the seat's immediate parent but
    /// not beneath the seat (the parent itself, siblings, and their
    /// descendants).
    ParentSubtree,
    /// Target is elsewhere in the same tree.
    SameTree,
    /// Target belongs to a different tree.
    Unrelated,
}
