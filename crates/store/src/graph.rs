use crate::error::{Result, StoreError};
use crate::types::{Edge, EdgeKind, Node, NodeId, NodeKind};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};

/// Mutable document/section graph.
///
/// Nodes live in a stable arena indexed by integer id; edges are adjacency
/// entries between indices, so there is no ownership cycle to manage. All
/// mutation goes through this type — query paths only ever see compiled
/// snapshots.
#[derive(Debug)]
pub struct DocGraph {
    graph: StableDiGraph<Node, Edge>,

    /// NodeId -> arena index for fast lookup.
    ids: HashMap<NodeId, NodeIndex>,
}

impl DocGraph {
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::new(),
            ids: HashMap::new(),
        }
    }

    /// Insert a node or replace the payload of an existing one.
    ///
    /// Replacing keeps incident edges, matching parser reparse behavior where
    /// ids are stable across runs.
    pub fn upsert_node(&mut self, node: Node) -> NodeIndex {
        match self.ids.get(&node.id) {
            Some(&idx) => {
                self.graph[idx] = node;
                idx
            }
            None => {
                let id = node.id;
                let idx = self.graph.add_node(node);
                self.ids.insert(id, idx);
                idx
            }
        }
    }

    /// Insert or replace a structural/semantic edge.
    ///
    /// Verified edges cannot be created here (promotion only) and provisional
    /// edges must go through the gate's proposal path.
    pub fn upsert_edge(&mut self, from: NodeId, to: NodeId, edge: Edge) -> Result<()> {
        match edge.kind {
            EdgeKind::Structural | EdgeKind::Semantic => {}
            EdgeKind::Verified => return Err(StoreError::DirectVerifiedEdge),
            EdgeKind::Provisional => return Err(StoreError::UngatedProvisionalEdge),
        }
        self.insert_edge(from, to, edge)
    }

    /// Raw edge insertion shared with the gate's proposal path.
    pub(crate) fn insert_edge(&mut self, from: NodeId, to: NodeId, edge: Edge) -> Result<()> {
        let (from_idx, to_idx) = match (self.ids.get(&from), self.ids.get(&to)) {
            (Some(&f), Some(&t)) => (f, t),
            _ => return Err(StoreError::MissingEndpoint(from, to)),
        };

        // Replace an existing edge of the same kind rather than duplicating.
        let existing = self
            .graph
            .edges(from_idx)
            .find(|e| e.target() == to_idx && e.weight().kind == edge.kind)
            .map(|e| e.id());
        match existing {
            Some(edge_idx) => self.graph[edge_idx] = edge,
            None => {
                self.graph.add_edge(from_idx, to_idx, edge);
            }
        }
        Ok(())
    }

    /// Remove a document and every section resolving to it, with incident edges.
    pub fn remove_document(&mut self, doc: NodeId) -> Result<usize> {
        if !self.ids.contains_key(&doc) {
            return Err(StoreError::NodeNotFound(doc));
        }

        let doomed: Vec<NodeId> = self
            .ids
            .keys()
            .copied()
            .filter(|&id| self.document_of(id) == Some(doc))
            .collect();

        for id in &doomed {
            if let Some(idx) = self.ids.remove(id) {
                self.graph.remove_node(idx);
            }
        }

        log::debug!("Removed document {doc}: {} nodes dropped", doomed.len());
        Ok(doomed.len())
    }

    /// Resolve the owning document of a node by walking parent links.
    ///
    /// A document resolves to itself. A section with a broken parent chain
    /// resolves to the last reachable ancestor.
    pub fn document_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = *self.ids.get(&id)?;
        let mut hops = 0usize;
        loop {
            let node = &self.graph[current];
            if node.kind == NodeKind::Document {
                return Some(node.id);
            }
            // Parent chains are shallow; the hop cap only guards malformed input.
            hops += 1;
            if hops > 64 {
                log::warn!("Parent chain for {id} exceeds depth cap, treating as root");
                return Some(node.id);
            }
            match node.parent.and_then(|p| self.ids.get(&p)) {
                Some(&parent_idx) => current = parent_idx,
                None => return Some(node.id),
            }
        }
    }

    /// Breadth-first neighbors within `max_hops`, restricted to `edge_kinds`.
    ///
    /// Follows edges in both directions and returns ids in ascending order.
    pub fn get_neighbors(
        &self,
        node: NodeId,
        edge_kinds: &[EdgeKind],
        max_hops: usize,
    ) -> Result<Vec<NodeId>> {
        let start = *self
            .ids
            .get(&node)
            .ok_or(StoreError::NodeNotFound(node))?;

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();
        visited.insert(start);
        queue.push_back((start, 0));

        while let Some((current, hops)) = queue.pop_front() {
            if hops >= max_hops {
                continue;
            }
            for direction in [Direction::Outgoing, Direction::Incoming] {
                for edge in self.graph.edges_directed(current, direction) {
                    if !edge_kinds.contains(&edge.weight().kind) {
                        continue;
                    }
                    let next = match direction {
                        Direction::Outgoing => edge.target(),
                        Direction::Incoming => edge.source(),
                    };
                    if visited.insert(next) {
                        queue.push_back((next, hops + 1));
                    }
                }
            }
        }

        visited.remove(&start);
        let mut result: Vec<NodeId> = visited.into_iter().map(|idx| self.graph[idx].id).collect();
        result.sort_unstable();
        Ok(result)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.ids.get(&id).map(|&idx| &self.graph[idx])
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All nodes, ascending by id.
    pub fn nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.graph.node_weights().collect();
        nodes.sort_unstable_by_key(|n| n.id);
        nodes
    }

    /// All edges as (from, to, payload) triples, ascending by (from, to, kind).
    pub fn edges(&self) -> Vec<(NodeId, NodeId, &Edge)> {
        let mut edges: Vec<(NodeId, NodeId, &Edge)> = self
            .graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].id,
                    self.graph[e.target()].id,
                    e.weight(),
                )
            })
            .collect();
        edges.sort_unstable_by_key(|(f, t, e)| (*f, *t, e.kind));
        edges
    }

    /// Outgoing edges of `from`, with payload access for lifecycle updates.
    pub(crate) fn edge_mut(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) -> Option<&mut Edge> {
        let from_idx = *self.ids.get(&from)?;
        let to_idx = *self.ids.get(&to)?;
        let edge_idx = self
            .graph
            .edges(from_idx)
            .find(|e| e.target() == to_idx && e.weight().kind == kind)
            .map(|e| e.id())?;
        Some(&mut self.graph[edge_idx])
    }

    pub(crate) fn edge(&self, from: NodeId, to: NodeId, kind: EdgeKind) -> Option<&Edge> {
        let from_idx = *self.ids.get(&from)?;
        let to_idx = *self.ids.get(&to)?;
        self.graph
            .edges(from_idx)
            .find(|e| e.target() == to_idx && e.weight().kind == kind)
            .map(|e| e.weight())
    }

    pub(crate) fn remove_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) -> bool {
        let (Some(&from_idx), Some(&to_idx)) = (self.ids.get(&from), self.ids.get(&to)) else {
            return false;
        };
        let edge_idx = self
            .graph
            .edges(from_idx)
            .find(|e| e.target() == to_idx && e.weight().kind == kind)
            .map(|e| e.id());
        match edge_idx {
            Some(idx) => {
                self.graph.remove_edge(idx);
                true
            }
            None => false,
        }
    }
}

impl Default for DocGraph {
    fn default() -> Self {
        Self::new()
    }
}
