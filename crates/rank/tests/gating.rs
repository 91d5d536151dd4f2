//! Provisional-edge lifecycle and quota behavior as seen through ranking.

use relgraph_rank::{RankConfig, RankRequest, RelatedRanker, ScopeFilter, SeedHit};
use relgraph_store::{Edge, GatePolicy, GraphStore, Node, NodeId, ProposalOutcome};

fn request(hits: Vec<SeedHit>) -> RankRequest {
    RankRequest {
        hits,
        filter: ScopeFilter::default(),
        config: RankConfig::default(),
    }
}

async fn ranked_ids(store: &mut GraphStore, now_ms: u64, seed: NodeId) -> Vec<NodeId> {
    let snapshot = store.rebuild_snapshot(now_ms);
    let result = RelatedRanker::new()
        .rank(snapshot, request(vec![SeedHit::new(seed, 1.0)]))
        .await
        .unwrap();
    result.nodes.iter().map(|n| n.id).collect()
}

#[tokio::test]
async fn provisional_influence_disappears_at_expiry() {
    let mut store = GraphStore::new(GatePolicy {
        ttl_ms: 1_000,
        ..GatePolicy::default()
    });
    store.upsert_node(Node::document(NodeId(1), 50));
    store.upsert_node(Node::document(NodeId(2), 50));
    store.upsert_node(Node::document(NodeId(3), 50));
    store
        .upsert_edge(NodeId(1), NodeId(2), Edge::semantic(1.0))
        .unwrap();
    assert_eq!(
        store.propose_edge(NodeId(1), NodeId(3), 1.0, 0).unwrap(),
        ProposalOutcome::Accepted
    );

    // Before expiry the proposal may influence ranking.
    let before = ranked_ids(&mut store, 500, NodeId(1)).await;
    assert!(before.contains(&NodeId(3)));

    // After expiry no trace of the edge remains.
    let after = ranked_ids(&mut store, 2_000, NodeId(1)).await;
    assert!(!after.contains(&NodeId(3)));
    assert!(after.contains(&NodeId(2)));
}

#[tokio::test]
async fn pending_proposals_can_be_excluded_by_policy() {
    let mut store = GraphStore::new(GatePolicy {
        include_proposed: false,
        ..GatePolicy::default()
    });
    store.upsert_node(Node::document(NodeId(1), 50));
    store.upsert_node(Node::document(NodeId(2), 50));
    store.propose_edge(NodeId(1), NodeId(2), 1.0, 0).unwrap();

    let ids = ranked_ids(&mut store, 10, NodeId(1)).await;
    assert!(ids.is_empty());

    // Promotion makes the edge eligible regardless of the flag.
    store.promote_edge(NodeId(1), NodeId(2), 20).unwrap();
    let ids = ranked_ids(&mut store, 30, NodeId(1)).await;
    assert_eq!(ids, vec![NodeId(2)]);
}

#[tokio::test]
async fn quota_rejected_edges_never_rank() {
    let mut store = GraphStore::new(GatePolicy {
        per_source_cap: 1,
        ..GatePolicy::default()
    });
    store.upsert_node(Node::document(NodeId(1), 50));
    store.upsert_node(Node::document(NodeId(2), 50));
    store.upsert_node(Node::document(NodeId(3), 50));

    assert_eq!(
        store.propose_edge(NodeId(1), NodeId(2), 1.0, 0).unwrap(),
        ProposalOutcome::Accepted
    );
    assert_eq!(
        store.propose_edge(NodeId(1), NodeId(3), 1.0, 0).unwrap(),
        ProposalOutcome::RejectedSourceQuota
    );

    let ids = ranked_ids(&mut store, 10, NodeId(1)).await;
    assert!(ids.contains(&NodeId(2)));
    assert!(!ids.contains(&NodeId(3)));
}

#[tokio::test]
async fn per_doc_section_cap_limits_ranked_sections() {
    let mut store = GraphStore::default();
    store.upsert_node(Node::document(NodeId(1), 500));
    // Five sections in the same document, all reachable from the seed.
    for i in 2..=6u64 {
        store.upsert_node(Node::section(NodeId(i), NodeId(1), 1, 60));
        store
            .upsert_edge(NodeId(1), NodeId(i), Edge::structural(1.0))
            .unwrap();
    }
    let snapshot = store.rebuild_snapshot(0);

    let mut req = request(vec![SeedHit::new(NodeId(1), 1.0)]);
    req.filter.per_doc_section_cap = Some(2);

    let result = RelatedRanker::new().rank(snapshot, req).await.unwrap();
    let sections = result
        .nodes
        .iter()
        .filter(|n| n.id != NodeId(1))
        .count();
    assert!(sections <= 2, "got {} sections from one document", sections);
    assert!(!result.nodes.is_empty());
}
