use crate::cache::{load_graph, CachedGraph, SnapshotStore};
use crate::error::Result;
use crate::gate::{EdgeGate, GatePolicy, ProposalOutcome};
use crate::graph::DocGraph;
use crate::snapshot::{GraphSnapshot, SnapshotHandle};
use crate::types::{Edge, EdgeKind, Node, NodeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Owner of the document/section graph.
///
/// All mutation funnels through this type; ranking only ever sees the
/// compiled snapshots it hands out. A rebuild produces a new snapshot version
/// and swaps the current pointer, leaving in-flight queries on the version
/// they acquired.
pub struct GraphStore {
    graph: DocGraph,
    gate: EdgeGate,
    handle: SnapshotHandle,
    version: AtomicU64,
}

impl GraphStore {
    pub fn new(policy: GatePolicy) -> Self {
        Self {
            graph: DocGraph::new(),
            gate: EdgeGate::new(policy),
            handle: SnapshotHandle::new(Arc::new(GraphSnapshot::empty(0))),
            version: AtomicU64::new(0),
        }
    }

    pub fn upsert_node(&mut self, node: Node) {
        self.graph.upsert_node(node);
    }

    pub fn upsert_edge(&mut self, from: NodeId, to: NodeId, edge: Edge) -> Result<()> {
        self.graph.upsert_edge(from, to, edge)
    }

    pub fn remove_document(&mut self, doc: NodeId) -> Result<usize> {
        self.graph.remove_document(doc)
    }

    pub fn get_neighbors(
        &self,
        node: NodeId,
        edge_kinds: &[EdgeKind],
        max_hops: usize,
    ) -> Result<Vec<NodeId>> {
        self.graph.get_neighbors(node, edge_kinds, max_hops)
    }

    /// Propose a provisional edge through the gate.
    pub fn propose_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        weight: f64,
        now_ms: u64,
    ) -> Result<ProposalOutcome> {
        self.gate.propose(&mut self.graph, from, to, weight, now_ms)
    }

    /// Promote a proposed edge to verified; idempotent for verified edges.
    pub fn promote_edge(&mut self, from: NodeId, to: NodeId, now_ms: u64) -> Result<bool> {
        self.gate.promote(&mut self.graph, from, to, now_ms)
    }

    /// Current snapshot without rebuilding. Callers keep the returned `Arc`
    /// for the duration of a query.
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.handle.current()
    }

    /// Sweep expired proposals, compile a fresh snapshot and swap it in.
    pub fn rebuild_snapshot(&mut self, now_ms: u64) -> Arc<GraphSnapshot> {
        self.gate.sweep_expired(&mut self.graph, now_ms);
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(GraphSnapshot::compile(
            &self.graph,
            &self.gate,
            now_ms,
            version,
        ));
        self.handle.swap(snapshot.clone());
        snapshot
    }

    /// Restore the graph from durable storage and swap in a fresh snapshot.
    ///
    /// Cache-tier failures fall back to the durable tier; a dead durable tier
    /// fails fast rather than presenting an empty graph.
    pub async fn load_snapshot(
        &mut self,
        cache: &dyn SnapshotStore,
        durable: &dyn SnapshotStore,
        now_ms: u64,
    ) -> Result<Arc<GraphSnapshot>> {
        self.graph = load_graph(cache, durable).await?;
        log::info!(
            "Loaded graph from durable storage: {} nodes, {} edges",
            self.graph.node_count(),
            self.graph.edge_count()
        );
        Ok(self.rebuild_snapshot(now_ms))
    }

    /// Persist the current graph to a snapshot store.
    pub async fn save_snapshot(&self, store: &dyn SnapshotStore) -> Result<()> {
        let bytes = CachedGraph::from_graph(&self.graph).encode()?;
        store.put(&bytes).await
    }

    pub fn graph(&self) -> &DocGraph {
        &self.graph
    }

    pub fn gate(&self) -> &EdgeGate {
        &self.gate
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new(GatePolicy::default())
    }
}
