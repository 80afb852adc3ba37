//! State Snapshot Export/Import
//!
//! Produces a versioned, serde-serializable capture of the whole forest
//! and directory — every guild node, each root's name index and attribute
//! registry, and every assignment — sufficient to fully reconstruct core
//! state in a fresh process. Import validates the incoming data against
//! every structural invariant and rejects the snapshot wholesale on any
//! violation; nothing is ever partially applied.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::membership::{Assignment, MembershipDirectory};
use crate::tree::store::{GuildNode, TreeState};
use crate::tree::{AttributeDef, Guild, GuildTree};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: &str = "1";

/// One captured guild node. Roots carry their tree's name index and
/// attribute registry; for other nodes both are empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotNode {
    #[serde(flatten)]
    pub guild: Guild,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub name_index: HashMap<String, Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeDef>,
}

/// A full capture of tree + directory state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub guilds: Vec<SnapshotNode>,
    pub assignments: Vec<Assignment>,
}

/// Reasons an incoming snapshot is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(String),

    #[error("Duplicate node id {0}")]
    DuplicateNode(Uuid),

    #[error("Node {node} references missing parent {parent}")]
    MissingParent { node: Uuid, parent: Uuid },

    #[error("Parent chain of node {0} does not terminate")]
    ParentCycle(Uuid),

    #[error("Cached top ancestor of node {0} does not match its parent chain")]
    TopAncestorMismatch(Uuid),

    #[error("Root node {0} has no external key")]
    RootWithoutKey(Uuid),

    #[error("Non-root node {0} carries an external key")]
    KeyOnNonRoot(Uuid),

    #[error("External key {0:?} registered to more than one root")]
    DuplicateExternalKey(String),

    #[error("Display name {name:?} used twice in the tree rooted at {root}")]
    DuplicateName { root: Uuid, name: String },

    #[error("Recorded name index of node {0} does not match its tree")]
    IndexMismatch(Uuid),

    #[error("Attribute {name:?} defined twice on root {root}")]
    DuplicateAttribute { root: Uuid, name: String },

    #[error("Duplicate assignment for identity {identity:?} in organization {org}")]
    DuplicateAssignment { identity: String, org: Uuid },
}

/// Capture the current tree + directory state.
pub async fn export(tree: &GuildTree, directory: &MembershipDirectory) -> Snapshot {
    let state = tree.export_state().await;

    let mut guilds: Vec<SnapshotNode> = state
        .nodes
        .values()
        .map(|node| {
            let mut attributes: Vec<AttributeDef> = node.attributes.values().cloned().collect();
            attributes.sort_by(|a, b| a.name.cmp(&b.name));
            SnapshotNode {
                guild: node.record(),
                name_index: node.name_index.clone(),
                attributes,
            }
        })
        .collect();
    guilds.sort_by_key(|n| n.guild.id);

    let assignments = directory.export_assignments().await;

    info!(
        guilds = guilds.len(),
        assignments = assignments.len(),
        "state snapshot exported"
    );

    Snapshot {
        version: SNAPSHOT_VERSION.to_string(),
        exported_at: Utc::now(),
        guilds,
        assignments,
    }
}

/// Reconstruct fresh stores from a snapshot.
///
/// Validates every structural invariant before anything is built; on any
/// violation the whole snapshot is rejected and no store is returned.
pub fn import(
    config: CoreConfig,
    snapshot: &Snapshot,
) -> Result<(GuildTree, MembershipDirectory), SnapshotError> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(snapshot.version.clone()));
    }

    // Node ids must be unique.
    let mut by_id: HashMap<Uuid, &SnapshotNode> = HashMap::new();
    for node in &snapshot.guilds {
        if by_id.insert(node.guild.id, node).is_some() {
            return Err(SnapshotError::DuplicateNode(node.guild.id));
        }
    }

    // Parent pointers resolve, root/key placement is correct, and every
    // cached top ancestor matches the actual parent chain.
    let mut external_keys: HashMap<String, Uuid> = HashMap::new();
    for node in &snapshot.guilds {
        let id = node.guild.id;
        match node.guild.parent_id {
            None => {
                if node.guild.top_ancestor_id != id {
                    return Err(SnapshotError::TopAncestorMismatch(id));
                }
                let Some(key) = &node.guild.external_key else {
                    return Err(SnapshotError::RootWithoutKey(id));
                };
                if external_keys.insert(key.clone(), id).is_some() {
                    return Err(SnapshotError::DuplicateExternalKey(key.clone()));
                }
            }
            Some(parent) => {
                if !by_id.contains_key(&parent) {
                    return Err(SnapshotError::MissingParent { node: id, parent });
                }
                if node.guild.external_key.is_some() {
                    return Err(SnapshotError::KeyOnNonRoot(id));
                }
                if walk_to_root(&by_id, id)? != node.guild.top_ancestor_id {
                    return Err(SnapshotError::TopAncestorMismatch(id));
                }
            }
        }
    }

    // Flat-namespace uniqueness per tree, and recorded indexes match.
    let mut recomputed: HashMap<Uuid, HashMap<String, Uuid>> = HashMap::new();
    for node in &snapshot.guilds {
        let index = recomputed.entry(node.guild.top_ancestor_id).or_default();
        if index
            .insert(node.guild.display_name.clone(), node.guild.id)
            .is_some()
        {
            return Err(SnapshotError::DuplicateName {
                root: node.guild.top_ancestor_id,
                name: node.guild.display_name.clone(),
            });
        }
    }
    for node in &snapshot.guilds {
        let expected: &HashMap<String, Uuid> = if node.guild.parent_id.is_none() {
            recomputed
                .get(&node.guild.id)
                .ok_or(SnapshotError::IndexMismatch(node.guild.id))?
        } else {
            // Only roots carry an index.
            if !node.name_index.is_empty() || !node.attributes.is_empty() {
                return Err(SnapshotError::IndexMismatch(node.guild.id));
            }
            continue;
        };
        if &node.name_index != expected {
            return Err(SnapshotError::IndexMismatch(node.guild.id));
        }
    }

    // At most one assignment per (identity, organization). The seat and
    // org ids are not checked against the tree: the two stores are only
    // correlated by id, a seat may legitimately outlive its node, and the
    // authorization engine denies on a dangling seat.
    let mut seen: HashSet<(&str, Uuid)> = HashSet::new();
    for assignment in &snapshot.assignments {
        if !seen.insert((assignment.identity.as_str(), assignment.org_id)) {
            return Err(SnapshotError::DuplicateAssignment {
                identity: assignment.identity.clone(),
                org: assignment.org_id,
            });
        }
    }

    // Everything checks out; build the stores.
    let mut state = TreeState {
        nodes: HashMap::new(),
        external_keys,
    };
    for node in &snapshot.guilds {
        let mut attributes = HashMap::new();
        for def in &node.attributes {
            if attributes.insert(def.name.clone(), def.clone()).is_some() {
                return Err(SnapshotError::DuplicateAttribute {
                    root: node.guild.id,
                    name: def.name.clone(),
                });
            }
        }
        state.nodes.insert(
            node.guild.id,
            GuildNode {
                id: node.guild.id,
                parent_id: node.guild.parent_id,
                top_ancestor_id: node.guild.top_ancestor_id,
                external_key: node.guild.external_key.clone(),
                display_name: node.guild.display_name.clone(),
                created_at: node.guild.created_at,
                children: HashSet::new(),
                name_index: node.name_index.clone(),
                attributes,
            },
        );
    }
    let links: Vec<(Uuid, Uuid)> = snapshot
        .guilds
        .iter()
        .filter_map(|n| n.guild.parent_id.map(|p| (p, n.guild.id)))
        .collect();
    for (parent, child) in links {
        if let Some(parent_node) = state.nodes.get_mut(&parent) {
            parent_node.children.insert(child);
        }
    }

    info!(
        guilds = snapshot.guilds.len(),
        assignments = snapshot.assignments.len(),
        "state snapshot imported"
    );

    Ok((
        GuildTree::from_state(config, state),
        MembershipDirectory::from_assignments(snapshot.assignments.clone()),
    ))
}

/// Follow parent pointers to the root, rejecting unterminated chains.
fn walk_to_root(
    by_id: &HashMap<Uuid, &SnapshotNode>,
    start: Uuid,
) -> Result<Uuid, SnapshotError> {
    let mut current = start;
    for _ in 0..=by_id.len() {
        match by_id.get(&current).and_then(|n| n.guild.parent_id) {
            Some(parent) => current = parent,
            None => return Ok(current),
        }
    }
    Err(SnapshotError::ParentCycle(start))
}
