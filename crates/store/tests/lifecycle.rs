//! Document lifecycle and persistence flows through the graph store.

use pretty_assertions::assert_eq;
use relgraph_store::{
    Edge, EdgeKind, FileSnapshotStore, GatePolicy, GraphStore, Node, NodeId, ProposalOutcome,
    StoreError,
};
use tempfile::TempDir;

/// Simulates the parser emitting a two-document corpus.
fn parse_corpus(store: &mut GraphStore) {
    store.upsert_node(Node::document(NodeId(1), 400));
    store.upsert_node(Node::section(NodeId(2), NodeId(1), 1, 150));
    store.upsert_node(Node::section(NodeId(3), NodeId(2), 2, 90));
    store.upsert_node(Node::document(NodeId(20), 300));
    store.upsert_node(Node::section(NodeId(21), NodeId(20), 1, 120));

    store
        .upsert_edge(NodeId(1), NodeId(2), Edge::structural(1.0))
        .unwrap();
    store
        .upsert_edge(NodeId(2), NodeId(3), Edge::structural(1.0))
        .unwrap();
    store
        .upsert_edge(NodeId(20), NodeId(21), Edge::structural(1.0))
        .unwrap();
    store
        .upsert_edge(NodeId(3), NodeId(21), Edge::semantic(0.8))
        .unwrap();
}

#[test]
fn document_deletion_takes_sections_and_cross_links() {
    let mut store = GraphStore::default();
    parse_corpus(&mut store);
    assert_eq!(store.graph().node_count(), 5);
    assert_eq!(store.graph().edge_count(), 4);

    let dropped = store.remove_document(NodeId(1)).unwrap();
    assert_eq!(dropped, 3);

    // The other document keeps its own structure; the inbound semantic link
    // from the deleted corpus is gone.
    let snapshot = store.rebuild_snapshot(0);
    assert_eq!(snapshot.node_count(), 2);
    assert_eq!(snapshot.edge_count(), 1);
}

#[test]
fn neighbors_walk_is_bounded_and_typed() {
    let mut store = GraphStore::default();
    parse_corpus(&mut store);

    let structural = store
        .get_neighbors(NodeId(1), &[EdgeKind::Structural], 2)
        .unwrap();
    assert_eq!(structural, vec![NodeId(2), NodeId(3)]);

    let everything = store.get_neighbors(NodeId(1), &EdgeKind::ALL, 4).unwrap();
    assert_eq!(
        everything,
        vec![NodeId(2), NodeId(3), NodeId(20), NodeId(21)]
    );

    let err = store
        .get_neighbors(NodeId(99), &EdgeKind::ALL, 1)
        .unwrap_err();
    assert!(matches!(err, StoreError::NodeNotFound(_)));
}

#[tokio::test]
async fn persistence_roundtrip_preserves_provisional_state() {
    let dir = TempDir::new().unwrap();
    let cache = FileSnapshotStore::new(dir.path().join("cache.json"));
    let durable = FileSnapshotStore::new(dir.path().join("durable.json"));

    let mut store = GraphStore::new(GatePolicy {
        ttl_ms: 1_000,
        ..GatePolicy::default()
    });
    parse_corpus(&mut store);
    assert_eq!(
        store.propose_edge(NodeId(21), NodeId(3), 0.5, 100).unwrap(),
        ProposalOutcome::Accepted
    );
    store.save_snapshot(&durable).await.unwrap();

    // A fresh store restored before the TTL still carries the proposal.
    let mut restored = GraphStore::new(GatePolicy {
        ttl_ms: 1_000,
        ..GatePolicy::default()
    });
    let snapshot = restored.load_snapshot(&cache, &durable, 500).await.unwrap();
    assert_eq!(snapshot.node_count(), 5);
    assert_eq!(snapshot.edge_count(), 5);

    // Restoring after the TTL sweeps the proposal during the rebuild.
    let mut late = GraphStore::new(GatePolicy {
        ttl_ms: 1_000,
        ..GatePolicy::default()
    });
    let snapshot = late.load_snapshot(&cache, &durable, 5_000).await.unwrap();
    assert_eq!(snapshot.edge_count(), 4);
}

#[tokio::test]
async fn cold_start_without_durable_data_fails_fast() {
    let dir = TempDir::new().unwrap();
    let cache = FileSnapshotStore::new(dir.path().join("cache.json"));
    let durable = FileSnapshotStore::new(dir.path().join("durable.json"));

    let mut store = GraphStore::default();
    let err = store.load_snapshot(&cache, &durable, 0).await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
    // The store did not silently substitute an empty graph.
    assert_eq!(store.snapshot().version(), 0);
}

#[test]
fn reparse_updates_nodes_in_place() {
    let mut store = GraphStore::default();
    parse_corpus(&mut store);

    // Reparse shrinks a section; edges survive.
    store.upsert_node(Node::section(NodeId(2), NodeId(1), 1, 75));
    assert_eq!(store.graph().edge_count(), 4);
    assert_eq!(store.graph().node(NodeId(2)).unwrap().word_count, 75);
}
