//! Integration tests for snapshot export/import.

use muster_core::{
    snapshot, AttributeKind, CoreConfig, GuildTree, MembershipDirectory, SnapshotError,
    TierPermissions,
};
use uuid::Uuid;

async fn populated() -> (GuildTree, MembershipDirectory) {
    let tree = GuildTree::new(CoreConfig::default_for_test());
    let directory = MembershipDirectory::new();

    let a = tree.add_root("d1", "A").await.unwrap();
    let s1 = tree.add_child(a.id, "s1").await.unwrap();
    let s2 = tree.add_child(s1.id, "s2").await.unwrap();
    let b = tree.add_root("d2", "B").await.unwrap();
    tree.add_child(b.id, "s1").await.unwrap();
    tree.add_attribute(a.id, "level", AttributeKind::Numeric, Some("level".into()))
        .await
        .unwrap();
    tree.add_attribute(a.id, "class", AttributeKind::Text, None)
        .await
        .unwrap();

    directory
        .assign("user#1", a.id, s1.id, TierPermissions::OFFICER_DEFAULT)
        .await
        .unwrap();
    directory
        .assign("user#2", a.id, s2.id, TierPermissions::MEMBER_DEFAULT)
        .await
        .unwrap();
    directory
        .assign("user#1", b.id, b.id, TierPermissions::STEWARD_DEFAULT)
        .await
        .unwrap();

    (tree, directory)
}

// ============================================================================
// Round-trip
// ============================================================================

#[tokio::test]
async fn test_roundtrip_preserves_lookups() {
    let (tree, directory) = populated().await;
    let snapshot = snapshot::export(&tree, &directory).await;

    let (tree2, directory2) =
        snapshot::import(CoreConfig::default_for_test(), &snapshot).unwrap();

    let a = tree.lookup_by_external_key("d1").await.unwrap();
    let a2 = tree2.lookup_by_external_key("d1").await.unwrap();
    assert_eq!(a.id, a2.id);

    // Every node resolves identically by id and by name.
    for root_key in ["d1", "d2"] {
        let root = tree.lookup_by_external_key(root_key).await.unwrap();
        let mut nodes = tree.descendants(root.id).await.unwrap();
        nodes.push(root.clone());
        for node in nodes {
            let copy = tree2.lookup(node.id).await.unwrap();
            assert_eq!(copy.display_name, node.display_name);
            assert_eq!(copy.parent_id, node.parent_id);
            assert_eq!(copy.top_ancestor_id, node.top_ancestor_id);
            assert_eq!(
                tree2
                    .lookup_by_name(root.id, &node.display_name)
                    .await
                    .unwrap()
                    .id,
                node.id
            );
        }
    }

    // Attribute registry survives.
    let attrs = tree2.attributes(a.id).await.unwrap();
    assert_eq!(attrs.len(), 2);
    assert_eq!(attrs[0].name, "class");
    assert_eq!(attrs[1].kind, AttributeKind::Numeric);

    // Assignments survive.
    let original = directory.list_by_org(a.id).await;
    let restored = directory2.list_by_org(a.id).await;
    assert_eq!(original.len(), restored.len());
    for (orig, rest) in original.iter().zip(&restored) {
        assert_eq!(orig.identity, rest.identity);
        assert_eq!(orig.node_id, rest.node_id);
        assert_eq!(orig.permissions, rest.permissions);
    }
}

#[tokio::test]
async fn test_snapshot_survives_json() {
    let (tree, directory) = populated().await;
    let snapshot = snapshot::export(&tree, &directory).await;

    let json = serde_json::to_string(&snapshot).unwrap();
    let parsed: muster_core::Snapshot = serde_json::from_str(&json).unwrap();

    assert!(snapshot::import(CoreConfig::default_for_test(), &parsed).is_ok());
}

// ============================================================================
// Rejection: invalid snapshots are refused wholesale
// ============================================================================

#[tokio::test]
async fn test_import_rejects_unsupported_version() {
    let (tree, directory) = populated().await;
    let mut snapshot = snapshot::export(&tree, &directory).await;
    snapshot.version = "99".to_string();

    let result = snapshot::import(CoreConfig::default_for_test(), &snapshot);
    assert!(matches!(
        result.unwrap_err(),
        SnapshotError::UnsupportedVersion(_)
    ));
}

#[tokio::test]
async fn test_import_rejects_duplicate_name_in_tree() {
    let (tree, directory) = populated().await;
    let mut snapshot = snapshot::export(&tree, &directory).await;

    // Forge a second "s2" in A's tree.
    let a = tree.lookup_by_external_key("d1").await.unwrap();
    let node = snapshot
        .guilds
        .iter_mut()
        .find(|n| n.guild.display_name == "s1" && n.guild.top_ancestor_id == a.id)
        .unwrap();
    node.guild.display_name = "s2".to_string();

    let result = snapshot::import(CoreConfig::default_for_test(), &snapshot);
    assert!(matches!(
        result.unwrap_err(),
        SnapshotError::DuplicateName { .. }
    ));
}

#[tokio::test]
async fn test_import_rejects_dangling_parent() {
    let (tree, directory) = populated().await;
    let mut snapshot = snapshot::export(&tree, &directory).await;

    let node = snapshot
        .guilds
        .iter_mut()
        .find(|n| n.guild.display_name == "s2")
        .unwrap();
    node.guild.parent_id = Some(Uuid::new_v4());

    let result = snapshot::import(CoreConfig::default_for_test(), &snapshot);
    assert!(matches!(
        result.unwrap_err(),
        SnapshotError::MissingParent { .. }
    ));
}

#[tokio::test]
async fn test_import_rejects_stale_top_ancestor() {
    let (tree, directory) = populated().await;
    let mut snapshot = snapshot::export(&tree, &directory).await;

    let b = tree.lookup_by_external_key("d2").await.unwrap();
    let node = snapshot
        .guilds
        .iter_mut()
        .find(|n| n.guild.display_name == "s2")
        .unwrap();
    node.guild.top_ancestor_id = b.id;

    let result = snapshot::import(CoreConfig::default_for_test(), &snapshot);
    assert!(matches!(
        result.unwrap_err(),
        SnapshotError::TopAncestorMismatch(_) | SnapshotError::IndexMismatch(_)
    ));
}

#[tokio::test]
async fn test_import_rejects_duplicate_external_key() {
    let (tree, directory) = populated().await;
    let mut snapshot = snapshot::export(&tree, &directory).await;

    for node in &mut snapshot.guilds {
        if node.guild.external_key.is_some() {
            node.guild.external_key = Some("same".to_string());
        }
    }

    let result = snapshot::import(CoreConfig::default_for_test(), &snapshot);
    assert_eq!(
        result.unwrap_err(),
        SnapshotError::DuplicateExternalKey("same".to_string())
    );
}

#[tokio::test]
async fn test_import_rejects_duplicate_assignment() {
    let (tree, directory) = populated().await;
    let mut snapshot = snapshot::export(&tree, &directory).await;

    let copy = snapshot.assignments[0].clone();
    snapshot.assignments.push(copy);

    let result = snapshot::import(CoreConfig::default_for_test(), &snapshot);
    assert!(matches!(
        result.unwrap_err(),
        SnapshotError::DuplicateAssignment { .. }
    ));
}

// ============================================================================
// Dangling seats survive the round trip
// ============================================================================

#[tokio::test]
async fn test_roundtrip_preserves_assignment_with_removed_seat() {
    let (tree, directory) = populated().await;

    // Removing the seat leaves the assignment behind; the stores are only
    // correlated by id.
    let a = tree.lookup_by_external_key("d1").await.unwrap();
    let s1 = tree.lookup_by_name(a.id, "s1").await.unwrap();
    tree.remove(s1.id).await.unwrap();

    let snapshot = snapshot::export(&tree, &directory).await;
    let (tree2, directory2) =
        snapshot::import(CoreConfig::default_for_test(), &snapshot).unwrap();

    // The dangling assignment is preserved as data.
    let restored = directory2.get("user#1", a.id).await.unwrap();
    assert_eq!(restored.node_id, s1.id);
    assert_eq!(
        tree2.lookup(s1.id).await.unwrap_err(),
        muster_core::CoreError::NotFound
    );

    // And the engine treats it exactly as before export: deny, not error.
    let authorizer = muster_core::Authorizer::new(tree2, directory2);
    assert!(!authorizer
        .check("user#1", a.id, a.id, muster_core::Capability::Membership)
        .await
        .unwrap());
}
