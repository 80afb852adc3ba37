//! Guild Tree Store
//!
//! Owns every guild node in the process and enforces the structural
//! invariants: cached top-ancestor pointers, flat-namespace display-name
//! uniqueness per tree, globally unique external keys on roots, and
//! cascading subtree removal. All multi-step mutations run inside one
//! exclusive write guard so no reader ever observes a half-applied change.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};

use super::attributes::{AttributeDef, AttributeKind, AttributeValue};
use super::types::{Guild, NodeRelation};

/// A stored guild node. Internal representation; callers only ever see
/// [`Guild`] value copies.
#[derive(Debug, Clone)]
pub(crate) struct GuildNode {
    pub(crate) id: Uuid,
    pub(crate) parent_id: Option<Uuid>,
    pub(crate) top_ancestor_id: Uuid,
    pub(crate) external_key: Option<String>,
    pub(crate) display_name: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) children: HashSet<Uuid>,
    /// Roots only: every display name in use anywhere in this tree,
    /// mapped to its node. The root's own name is included.
    pub(crate) name_index: HashMap<String, Uuid>,
    /// Roots only: the organization's attribute registry.
    pub(crate) attributes: HashMap<String, AttributeDef>,
}

impl GuildNode {
    pub(crate) fn record(&self) -> Guild {
        Guild {
            id: self.id,
            parent_id: self.parent_id,
            top_ancestor_id: self.top_ancestor_id,
            external_key: self.external_key.clone(),
            display_name: self.display_name.clone(),
            created_at: self.created_at,
        }
    }
}

/// Whole-forest state behind the store lock.
#[derive(Debug, Clone, Default)]
pub(crate) struct TreeState {
    pub(crate) nodes: HashMap<Uuid, GuildNode>,
    /// External key -> root node id, unique across all trees.
    pub(crate) external_keys: HashMap<String, Uuid>,
}

impl TreeState {
    /// Whether `node_id` is `ancestor_id` itself or one of its
    /// descendants, by walking the parent chain upward.
    fn is_beneath(&self, ancestor_id: Uuid, node_id: Uuid) -> bool {
        let mut current = Some(node_id);
        while let Some(id) = current {
            if id == ancestor_id {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent_id);
        }
        false
    }

    /// Collect `node_id` and all of its descendants, parents before
    /// children. Walks a consistent view; nothing is mutated mid-walk.
    fn collect_subtree(&self, node_id: Uuid) -> Vec<Uuid> {
        let mut ids = vec![node_id];
        let mut i = 0;
        while i < ids.len() {
            if let Some(node) = self.nodes.get(&ids[i]) {
                ids.extend(node.children.iter().copied());
            }
            i += 1;
        }
        ids
    }

    /// Resolve a node's cached top ancestor, reporting a broken invariant
    /// if the root has gone missing.
    fn root_id_of(&self, node_id: Uuid) -> CoreResult<Uuid> {
        let node = self.nodes.get(&node_id).ok_or(CoreError::NotFound)?;
        let top = node.top_ancestor_id;
        if self.nodes.contains_key(&top) {
            Ok(top)
        } else {
            error!(node_id = %node_id, top_ancestor_id = %top, "cached top ancestor does not resolve");
            Err(CoreError::InvalidState(format!(
                "top ancestor {top} missing for node {node_id}"
            )))
        }
    }

    fn detach_child(&mut self, parent_id: Uuid, child_id: Uuid) -> CoreResult<()> {
        match self.nodes.get_mut(&parent_id) {
            Some(parent) => {
                parent.children.remove(&child_id);
                Ok(())
            }
            None => {
                error!(parent_id = %parent_id, child_id = %child_id, "parent missing from node map");
                Err(CoreError::InvalidState(format!(
                    "parent {parent_id} missing for node {child_id}"
                )))
            }
        }
    }
}

/// Shared guild tree store.
///
/// Cheap to clone; all clones observe the same forest. Mutations take the
/// exclusive write guard, reads share the read guard.
#[derive(Debug, Clone)]
pub struct GuildTree {
    state: Arc<RwLock<TreeState>>,
    config: Arc<CoreConfig>,
}

impl GuildTree {
    /// Create an empty forest.
    pub fn new(config: CoreConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(TreeState::default())),
            config: Arc::new(config),
        }
    }

    pub(crate) fn from_state(config: CoreConfig, state: TreeState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            config: Arc::new(config),
        }
    }

    pub(crate) async fn export_state(&self) -> TreeState {
        self.state.read().await.clone()
    }

    fn validate_name(&self, name: &str) -> CoreResult<()> {
        if name.is_empty() {
            return Err(CoreError::NameRequired);
        }
        if name.chars().count() > self.config.max_name_length {
            return Err(CoreError::NameTooLong);
        }
        Ok(())
    }

    // ========================================================================
    // Structural mutations
    // ========================================================================

    /// Register a new top-level guild under a globally unique external key.
    #[tracing::instrument(skip(self))]
    pub async fn add_root(&self, external_key: &str, display_name: &str) -> CoreResult<Guild> {
        self.validate_name(display_name)?;
        if external_key.is_empty() {
            return Err(CoreError::NameRequired);
        }

        let mut state = self.state.write().await;
        if state.external_keys.contains_key(external_key) {
            return Err(CoreError::AlreadyRegistered);
        }

        let id = Uuid::new_v4();
        let mut name_index = HashMap::new();
        name_index.insert(display_name.to_string(), id);

        let node = GuildNode {
            id,
            parent_id: None,
            top_ancestor_id: id,
            external_key: Some(external_key.to_string()),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
            children: HashSet::new(),
            name_index,
            attributes: HashMap::new(),
        };
        let record = node.record();

        state.external_keys.insert(external_key.to_string(), id);
        state.nodes.insert(id, node);

        info!(guild_id = %id, external_key = %external_key, "top-level guild registered");
        Ok(record)
    }

    /// Create a sub-guild under an existing node.
    ///
    /// The display name must be unused anywhere in the owning tree.
    #[tracing::instrument(skip(self))]
    pub async fn add_child(&self, parent_id: Uuid, display_name: &str) -> CoreResult<Guild> {
        self.validate_name(display_name)?;

        let mut state = self.state.write().await;
        if !state.nodes.contains_key(&parent_id) {
            return Err(CoreError::InvalidParent);
        }
        let root_id = state.root_id_of(parent_id)?;

        {
            let root = state
                .nodes
                .get(&root_id)
                .ok_or_else(|| CoreError::InvalidState(format!("root {root_id} missing")))?;
            if root.name_index.contains_key(display_name) {
                return Err(CoreError::NameTaken);
            }
            if root.name_index.len() >= self.config.max_nodes_per_tree {
                return Err(CoreError::LimitExceeded);
            }
        }

        let id = Uuid::new_v4();
        let node = GuildNode {
            id,
            parent_id: Some(parent_id),
            top_ancestor_id: root_id,
            external_key: None,
            display_name: display_name.to_string(),
            created_at: Utc::now(),
            children: HashSet::new(),
            name_index: HashMap::new(),
            attributes: HashMap::new(),
        };
        let record = node.record();
        state.nodes.insert(id, node);

        if let Some(root) = state.nodes.get_mut(&root_id) {
            root.name_index.insert(display_name.to_string(), id);
        }
        if let Some(parent) = state.nodes.get_mut(&parent_id) {
            parent.children.insert(id);
        }

        info!(guild_id = %id, parent_id = %parent_id, "sub-guild created");
        Ok(record)
    }

    /// Rename a node, keeping the tree's flat namespace unique.
    ///
    /// Renaming to the current name is a no-op success.
    #[tracing::instrument(skip(self))]
    pub async fn rename(&self, node_id: Uuid, new_name: &str) -> CoreResult<Guild> {
        self.validate_name(new_name)?;

        let mut state = self.state.write().await;
        let node = state.nodes.get(&node_id).ok_or(CoreError::NotFound)?;
        let old_name = node.display_name.clone();
        if old_name == new_name {
            return Ok(node.record());
        }
        let root_id = state.root_id_of(node_id)?;

        {
            let root = state
                .nodes
                .get(&root_id)
                .ok_or_else(|| CoreError::InvalidState(format!("root {root_id} missing")))?;
            // The node's own entry is still under its old name, so any hit
            // here is a different node.
            if root.name_index.contains_key(new_name) {
                return Err(CoreError::NameTaken);
            }
        }

        if let Some(root) = state.nodes.get_mut(&root_id) {
            root.name_index.remove(&old_name);
            root.name_index.insert(new_name.to_string(), node_id);
        }
        let node = state
            .nodes
            .get_mut(&node_id)
            .ok_or(CoreError::NotFound)?;
        node.display_name = new_name.to_string();
        let record = node.record();

        info!(guild_id = %node_id, old_name = %old_name, "guild renamed");
        Ok(record)
    }

    /// Move a node (and its whole subtree) under a new parent.
    ///
    /// Within the same tree only the parent pointer changes; across trees
    /// every moved display name must be free in the destination tree and
    /// every moved node's top ancestor is rewritten. Moving a node to its
    /// current parent is a no-op success. Root nodes cannot be moved.
    #[tracing::instrument(skip(self))]
    pub async fn reparent(&self, node_id: Uuid, new_parent_id: Uuid) -> CoreResult<Guild> {
        let mut state = self.state.write().await;
        let node = state.nodes.get(&node_id).ok_or(CoreError::NotFound)?;
        let Some(old_parent_id) = node.parent_id else {
            return Err(CoreError::WrongLevel);
        };
        let src_root_id = node.top_ancestor_id;

        if !state.nodes.contains_key(&new_parent_id) {
            return Err(CoreError::InvalidParent);
        }
        if new_parent_id == old_parent_id {
            return state
                .nodes
                .get(&node_id)
                .map(GuildNode::record)
                .ok_or(CoreError::NotFound);
        }
        // A node cannot be moved beneath itself.
        if state.is_beneath(node_id, new_parent_id) {
            return Err(CoreError::InvalidParent);
        }

        let dest_root_id = state.root_id_of(new_parent_id)?;

        if dest_root_id == src_root_id {
            // Same tree: the name is already reserved here.
            state.detach_child(old_parent_id, node_id)?;
            if let Some(new_parent) = state.nodes.get_mut(&new_parent_id) {
                new_parent.children.insert(node_id);
            }
            let node = state
                .nodes
                .get_mut(&node_id)
                .ok_or(CoreError::NotFound)?;
            node.parent_id = Some(new_parent_id);
            let record = node.record();
            info!(guild_id = %node_id, new_parent_id = %new_parent_id, "guild moved within tree");
            return Ok(record);
        }

        // Cross-tree move: every name in the moved subtree must be free in
        // the destination's flat namespace.
        let moved_ids = state.collect_subtree(node_id);
        let moved_names: Vec<(Uuid, String)> = moved_ids
            .iter()
            .filter_map(|id| {
                state
                    .nodes
                    .get(id)
                    .map(|n| (*id, n.display_name.clone()))
            })
            .collect();

        {
            let dest_root = state
                .nodes
                .get(&dest_root_id)
                .ok_or_else(|| CoreError::InvalidState(format!("root {dest_root_id} missing")))?;
            for (_, name) in &moved_names {
                if dest_root.name_index.contains_key(name) {
                    return Err(CoreError::NameTaken);
                }
            }
            if dest_root.name_index.len() + moved_names.len() > self.config.max_nodes_per_tree {
                return Err(CoreError::LimitExceeded);
            }
        }

        if let Some(src_root) = state.nodes.get_mut(&src_root_id) {
            for (_, name) in &moved_names {
                src_root.name_index.remove(name);
            }
        }
        if let Some(dest_root) = state.nodes.get_mut(&dest_root_id) {
            for (id, name) in &moved_names {
                dest_root.name_index.insert(name.clone(), *id);
            }
        }
        for id in &moved_ids {
            if let Some(moved) = state.nodes.get_mut(id) {
                moved.top_ancestor_id = dest_root_id;
            }
        }
        state.detach_child(old_parent_id, node_id)?;
        if let Some(new_parent) = state.nodes.get_mut(&new_parent_id) {
            new_parent.children.insert(node_id);
        }
        let node = state
            .nodes
            .get_mut(&node_id)
            .ok_or(CoreError::NotFound)?;
        node.parent_id = Some(new_parent_id);
        let record = node.record();

        info!(
            guild_id = %node_id,
            new_parent_id = %new_parent_id,
            moved = moved_ids.len(),
            "guild subtree moved across trees"
        );
        Ok(record)
    }

    /// Remove a node and its entire subtree, freeing every removed display
    /// name. Removing a root drops its external key registration along
    /// with the whole tree.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, node_id: Uuid) -> CoreResult<Guild> {
        let mut state = self.state.write().await;
        let node = state.nodes.get(&node_id).ok_or(CoreError::NotFound)?;
        let record = node.record();
        let parent_id = node.parent_id;
        let root_id = node.top_ancestor_id;
        let external_key = node.external_key.clone();

        let ids = state.collect_subtree(node_id);
        let names: Vec<String> = ids
            .iter()
            .filter_map(|id| state.nodes.get(id).map(|n| n.display_name.clone()))
            .collect();

        if let Some(parent_id) = parent_id {
            if let Some(root) = state.nodes.get_mut(&root_id) {
                for name in &names {
                    root.name_index.remove(name);
                }
            }
            state.detach_child(parent_id, node_id)?;
        } else if let Some(key) = external_key {
            // The whole tree goes away; the index dies with the root.
            state.external_keys.remove(&key);
        }

        // Children before parents so the map is consistent at every step.
        for id in ids.iter().rev() {
            state.nodes.remove(id);
        }

        info!(guild_id = %node_id, removed = ids.len(), "guild subtree removed");
        Ok(record)
    }

    // ========================================================================
    // Read accessors
    // ========================================================================

    /// Fetch a node by id.
    pub async fn lookup(&self, node_id: Uuid) -> CoreResult<Guild> {
        let state = self.state.read().await;
        state
            .nodes
            .get(&node_id)
            .map(GuildNode::record)
            .ok_or(CoreError::NotFound)
    }

    /// Fetch a root node by its external key.
    pub async fn lookup_by_external_key(&self, key: &str) -> CoreResult<Guild> {
        let state = self.state.read().await;
        let id = state.external_keys.get(key).ok_or(CoreError::NotFound)?;
        state
            .nodes
            .get(id)
            .map(GuildNode::record)
            .ok_or(CoreError::NotFound)
    }

    /// Resolve a display name anywhere in a tree, without a path.
    pub async fn lookup_by_name(&self, top_guild_id: Uuid, name: &str) -> CoreResult<Guild> {
        let state = self.state.read().await;
        let root = state.nodes.get(&top_guild_id).ok_or(CoreError::NotFound)?;
        if root.parent_id.is_some() {
            return Err(CoreError::NotFound);
        }
        let id = root.name_index.get(name).ok_or(CoreError::NotFound)?;
        state
            .nodes
            .get(id)
            .map(GuildNode::record)
            .ok_or(CoreError::NotFound)
    }

    /// All transitive descendants of a node, excluding the node itself.
    pub async fn descendants(&self, node_id: Uuid) -> CoreResult<Vec<Guild>> {
        let state = self.state.read().await;
        if !state.nodes.contains_key(&node_id) {
            return Err(CoreError::NotFound);
        }
        let ids = state.collect_subtree(node_id);
        Ok(ids
            .iter()
            .skip(1)
            .filter_map(|id| state.nodes.get(id).map(GuildNode::record))
            .collect())
    }

    /// Immediate children of a node, sorted by display name.
    pub async fn children(&self, node_id: Uuid) -> CoreResult<Vec<Guild>> {
        let state = self.state.read().await;
        let node = state.nodes.get(&node_id).ok_or(CoreError::NotFound)?;
        let mut out: Vec<Guild> = node
            .children
            .iter()
            .filter_map(|id| state.nodes.get(id).map(GuildNode::record))
            .collect();
        out.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(out)
    }

    /// All registered top-level guilds.
    pub async fn roots(&self) -> Vec<Guild> {
        let state = self.state.read().await;
        let mut out: Vec<Guild> = state
            .external_keys
            .values()
            .filter_map(|id| state.nodes.get(id).map(GuildNode::record))
            .collect();
        out.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        out
    }

    /// Topological relation between a seated node and a target node, for
    /// tier classification.
    pub async fn relation(&self, seat_id: Uuid, target_id: Uuid) -> CoreResult<NodeRelation> {
        let state = self.state.read().await;
        let seat = state.nodes.get(&seat_id).ok_or(CoreError::NotFound)?;
        let target = state.nodes.get(&target_id).ok_or(CoreError::NotFound)?;

        if seat.top_ancestor_id != target.top_ancestor_id {
            return Ok(NodeRelation::Unrelated);
        }
        if state.is_beneath(seat_id, target_id) {
            return Ok(NodeRelation::Beneath);
        }
        if let Some(parent_id) = seat.parent_id {
            if state.is_beneath(parent_id, target_id) {
                return Ok(NodeRelation::ParentSubtree);
            }
        }
        Ok(NodeRelation::SameTree)
    }

    // ========================================================================
    // Attribute registry (root nodes only)
    // ========================================================================

    /// Register an attribute on a root's registry.
    ///
    /// Idempotent if the name already exists with the same kind; a kind
    /// change is a `TypeConflict`. The kind is fixed at first registration.
    #[tracing::instrument(skip(self, description))]
    pub async fn add_attribute(
        &self,
        root_id: Uuid,
        name: &str,
        kind: AttributeKind,
        description: Option<String>,
    ) -> CoreResult<AttributeDef> {
        if name.is_empty() {
            return Err(CoreError::NameRequired);
        }

        let mut state = self.state.write().await;
        let node = state.nodes.get_mut(&root_id).ok_or(CoreError::NotFound)?;
        if node.parent_id.is_some() {
            return Err(CoreError::WrongLevel);
        }

        if let Some(existing) = node.attributes.get(name) {
            if existing.kind == kind {
                return Ok(existing.clone());
            }
            debug!(guild_id = %root_id, attribute = %name, "attribute kind conflict");
            return Err(CoreError::TypeConflict);
        }

        let def = AttributeDef {
            name: name.to_string(),
            kind,
            description,
            created_at: Utc::now(),
        };
        node.attributes.insert(name.to_string(), def.clone());
        info!(guild_id = %root_id, attribute = %name, "attribute registered");
        Ok(def)
    }

    /// Remove an attribute from a root's registry.
    #[tracing::instrument(skip(self))]
    pub async fn remove_attribute(&self, root_id: Uuid, name: &str) -> CoreResult<AttributeDef> {
        let mut state = self.state.write().await;
        let node = state.nodes.get_mut(&root_id).ok_or(CoreError::NotFound)?;
        if node.parent_id.is_some() {
            return Err(CoreError::WrongLevel);
        }
        node.attributes.remove(name).ok_or(CoreError::NotFound)
    }

    /// Fetch a single attribute definition.
    pub async fn attribute(&self, root_id: Uuid, name: &str) -> CoreResult<AttributeDef> {
        let state = self.state.read().await;
        let node = state.nodes.get(&root_id).ok_or(CoreError::NotFound)?;
        if node.parent_id.is_some() {
            return Err(CoreError::WrongLevel);
        }
        node.attributes.get(name).cloned().ok_or(CoreError::NotFound)
    }

    /// All attribute definitions on a root, sorted by name.
    pub async fn attributes(&self, root_id: Uuid) -> CoreResult<Vec<AttributeDef>> {
        let state = self.state.read().await;
        let node = state.nodes.get(&root_id).ok_or(CoreError::NotFound)?;
        if node.parent_id.is_some() {
            return Err(CoreError::WrongLevel);
        }
        let mut out: Vec<AttributeDef> = node.attributes.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Validate a character-field value against a root's registry before a
    /// write. Unknown names are `NotFound`, kind mismatches `TypeConflict`.
    pub async fn validate_attribute_value(
        &self,
        root_id: Uuid,
        name: &str,
        value: &AttributeValue,
    ) -> CoreResult<()> {
        let def = self.attribute(root_id, name).await?;
        value.check_against(&def)
    }
}
