use crate::gate::EdgeGate;
use crate::graph::DocGraph;
use crate::types::{EdgeKind, NodeId, NodeKind};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Node entry in a compiled snapshot.
///
/// The owning document is resolved at compile time so query paths never walk
/// parent chains against the mutable graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub depth: Option<u8>,
    pub word_count: usize,
    pub parent: Option<NodeId>,
    pub doc: NodeId,
}

/// Edge entry in a compiled snapshot; `peer` is a dense index into the node
/// table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotEdge {
    pub peer: usize,
    pub kind: EdgeKind,
    pub weight: f64,
}

/// Immutable, versioned view of the graph used by every query path.
///
/// Nodes are sorted by id and adjacency lists by (peer, kind), so any
/// iteration over a snapshot is deterministic. Gate-ineligible edges are
/// excluded at compile time and leave no trace here.
#[derive(Debug)]
pub struct GraphSnapshot {
    version: u64,
    nodes: Vec<SnapshotNode>,
    out: Vec<Vec<SnapshotEdge>>,
    inc: Vec<Vec<SnapshotEdge>>,
    index: HashMap<NodeId, usize>,
}

impl GraphSnapshot {
    pub fn empty(version: u64) -> Self {
        Self {
            version,
            nodes: Vec::new(),
            out: Vec::new(),
            inc: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Compile a snapshot from the mutable graph, dropping edges the gate
    /// rules out at `now_ms`.
    pub fn compile(graph: &DocGraph, gate: &EdgeGate, now_ms: u64, version: u64) -> Self {
        let node_list = graph.nodes();
        let mut nodes = Vec::with_capacity(node_list.len());
        let mut index = HashMap::with_capacity(node_list.len());

        for node in &node_list {
            index.insert(node.id, nodes.len());
            nodes.push(SnapshotNode {
                id: node.id,
                kind: node.kind,
                depth: node.depth,
                word_count: node.word_count,
                parent: node.parent,
                doc: graph.document_of(node.id).unwrap_or(node.id),
            });
        }

        let mut out: Vec<Vec<SnapshotEdge>> = vec![Vec::new(); nodes.len()];
        let mut inc: Vec<Vec<SnapshotEdge>> = vec![Vec::new(); nodes.len()];
        let mut kept = 0usize;
        let mut dropped = 0usize;

        for (from, to, edge) in graph.edges() {
            if !gate.eligible(edge, now_ms) {
                dropped += 1;
                continue;
            }
            let (Some(&f), Some(&t)) = (index.get(&from), index.get(&to)) else {
                continue;
            };
            out[f].push(SnapshotEdge {
                peer: t,
                kind: edge.kind,
                weight: edge.weight,
            });
            inc[t].push(SnapshotEdge {
                peer: f,
                kind: edge.kind,
                weight: edge.weight,
            });
            kept += 1;
        }

        // graph.edges() is already ordered, but sort per adjacency list so the
        // invariant holds independent of the source ordering.
        for list in out.iter_mut().chain(inc.iter_mut()) {
            list.sort_unstable_by_key(|e| (e.peer, e.kind));
        }

        log::debug!(
            "Compiled snapshot v{version}: {} nodes, {kept} edges ({dropped} gated out)",
            nodes.len()
        );

        Self {
            version,
            nodes,
            out,
            inc,
            index,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.out.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node table, ascending by id.
    pub fn nodes(&self) -> &[SnapshotNode] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> &SnapshotNode {
        &self.nodes[idx]
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Outgoing edges of the node at `idx`, sorted by (peer, kind).
    pub fn out_edges(&self, idx: usize) -> &[SnapshotEdge] {
        &self.out[idx]
    }

    /// Incoming edges of the node at `idx`, sorted by (peer, kind).
    pub fn in_edges(&self, idx: usize) -> &[SnapshotEdge] {
        &self.inc[idx]
    }
}

/// Atomically swapped handle to the current snapshot.
///
/// Readers clone the `Arc` and keep that exact version for the whole query;
/// a background rebuild swaps the pointer without touching in-flight readers.
pub struct SnapshotHandle {
    inner: RwLock<Arc<GraphSnapshot>>,
}

impl SnapshotHandle {
    pub fn new(snapshot: Arc<GraphSnapshot>) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    pub fn current(&self) -> Arc<GraphSnapshot> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn swap(&self, snapshot: Arc<GraphSnapshot>) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{EdgeGate, GatePolicy};
    use crate::types::{Edge, Node};

    fn sample_graph() -> DocGraph {
        let mut g = DocGraph::new();
        g.upsert_node(Node::document(NodeId(1), 100));
        g.upsert_node(Node::section(NodeId(2), NodeId(1), 1, 50));
        g.upsert_node(Node::document(NodeId(3), 80));
        g.upsert_edge(NodeId(1), NodeId(2), Edge::structural(1.0))
            .unwrap();
        g.upsert_edge(NodeId(2), NodeId(3), Edge::semantic(1.0))
            .unwrap();
        g
    }

    #[test]
    fn compile_resolves_owning_documents() {
        let g = sample_graph();
        let snap = GraphSnapshot::compile(&g, &EdgeGate::default(), 0, 1);
        let idx = snap.index_of(NodeId(2)).unwrap();
        assert_eq!(snap.node(idx).doc, NodeId(1));
        assert_eq!(snap.node_count(), 3);
        assert_eq!(snap.edge_count(), 2);
    }

    #[test]
    fn compile_excludes_expired_proposals() {
        let mut g = sample_graph();
        let gate = EdgeGate::new(GatePolicy {
            ttl_ms: 100,
            ..GatePolicy::default()
        });
        gate.propose(&mut g, NodeId(3), NodeId(1), 1.0, 0).unwrap();

        let fresh = GraphSnapshot::compile(&g, &gate, 50, 1);
        assert_eq!(fresh.edge_count(), 3);

        let stale = GraphSnapshot::compile(&g, &gate, 200, 2);
        assert_eq!(stale.edge_count(), 2);
    }

    #[test]
    fn handle_swap_leaves_old_readers_untouched() {
        let g = sample_graph();
        let gate = EdgeGate::default();
        let v1 = Arc::new(GraphSnapshot::compile(&g, &gate, 0, 1));
        let handle = SnapshotHandle::new(v1);

        let held = handle.current();
        handle.swap(Arc::new(GraphSnapshot::empty(2)));

        assert_eq!(held.version(), 1);
        assert_eq!(held.node_count(), 3);
        assert_eq!(handle.current().version(), 2);
    }
}
