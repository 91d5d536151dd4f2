use crate::error::{Result, StoreError};
use crate::graph::DocGraph;
use crate::types::{Edge, EdgeKind, NodeId, ProvisionalState};
use serde::{Deserialize, Serialize};

/// Gate configuration for provisional edges.
///
/// Structural and semantic edges are trusted by construction and never pass
/// through the gate; verified edges only exist as promotion results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatePolicy {
    /// Maximum live proposals per source node.
    pub per_source_cap: usize,

    /// Maximum live proposals per source document.
    pub per_doc_cap: usize,

    /// Proposal time-to-live in milliseconds.
    pub ttl_ms: u64,

    /// Whether still-pending proposals may influence ranking before a
    /// promotion decision arrives.
    pub include_proposed: bool,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            per_source_cap: 8,
            per_doc_cap: 32,
            ttl_ms: 7 * 24 * 60 * 60 * 1000,
            include_proposed: true,
        }
    }
}

/// Outcome of an edge proposal. Quota rejections are expected behavior, not
/// errors, so callers can report them without failing the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalOutcome {
    Accepted,
    RejectedSourceQuota,
    RejectedDocQuota,
}

/// Lifecycle gate for provisional edges.
pub struct EdgeGate {
    policy: GatePolicy,
}

impl EdgeGate {
    pub fn new(policy: GatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Propose a provisional edge. Quotas are checked before the edge can
    /// enter `Proposed` state; a rejected proposal leaves no trace.
    pub fn propose(
        &self,
        graph: &mut DocGraph,
        from: NodeId,
        to: NodeId,
        weight: f64,
        now_ms: u64,
    ) -> Result<ProposalOutcome> {
        if !graph.contains(from) || !graph.contains(to) {
            return Err(StoreError::MissingEndpoint(from, to));
        }

        let live = self.live_proposals(graph, now_ms);
        let from_source = live.iter().filter(|(f, _)| *f == from).count();
        if from_source >= self.policy.per_source_cap {
            log::debug!("Proposal {from} -> {to} rejected: source quota");
            return Ok(ProposalOutcome::RejectedSourceQuota);
        }

        let source_doc = graph.document_of(from);
        let from_doc = live
            .iter()
            .filter(|(f, _)| graph.document_of(*f) == source_doc)
            .count();
        if from_doc >= self.policy.per_doc_cap {
            log::debug!("Proposal {from} -> {to} rejected: document quota");
            return Ok(ProposalOutcome::RejectedDocQuota);
        }

        graph.insert_edge(from, to, Edge::provisional(weight, now_ms))?;
        Ok(ProposalOutcome::Accepted)
    }

    /// Promote a proposed edge to verified.
    ///
    /// Promoting an already-verified edge is an idempotent no-op (`Ok(false)`).
    /// The promotion decision itself is made by an external evaluator; the
    /// gate only exposes the transition.
    pub fn promote(
        &self,
        graph: &mut DocGraph,
        from: NodeId,
        to: NodeId,
        now_ms: u64,
    ) -> Result<bool> {
        if graph.edge(from, to, EdgeKind::Verified).is_some() {
            return Ok(false);
        }

        let expired = match graph.edge(from, to, EdgeKind::Provisional) {
            Some(edge) => self.is_expired(edge, now_ms),
            None => return Err(StoreError::EdgeNotFound(from, to)),
        };
        if expired {
            // Past-TTL proposals are gone for all purposes, swept or not.
            graph.remove_edge(from, to, EdgeKind::Provisional);
            return Err(StoreError::EdgeNotFound(from, to));
        }

        let edge = graph
            .edge_mut(from, to, EdgeKind::Provisional)
            .ok_or(StoreError::EdgeNotFound(from, to))?;
        if let Some(mark) = &mut edge.provisional {
            mark.state = ProvisionalState::Promoted;
        }
        edge.kind = EdgeKind::Verified;
        edge.provisional = None;

        log::info!("Promoted provisional edge {from} -> {to}");
        Ok(true)
    }

    /// Remove every proposal past its TTL. Returns the number removed.
    pub fn sweep_expired(&self, graph: &mut DocGraph, now_ms: u64) -> usize {
        let doomed: Vec<(NodeId, NodeId)> = graph
            .edges()
            .iter()
            .filter(|(_, _, e)| e.kind == EdgeKind::Provisional && self.is_expired(e, now_ms))
            .map(|(f, t, _)| (*f, *t))
            .collect();

        for (from, to) in &doomed {
            graph.remove_edge(*from, *to, EdgeKind::Provisional);
        }
        if !doomed.is_empty() {
            log::info!("Expired {} provisional edges", doomed.len());
        }
        doomed.len()
    }

    /// Whether an edge may participate in ranking at `now_ms`.
    pub fn eligible(&self, edge: &Edge, now_ms: u64) -> bool {
        match edge.kind {
            EdgeKind::Structural | EdgeKind::Semantic | EdgeKind::Verified => true,
            EdgeKind::Provisional => self.policy.include_proposed && !self.is_expired(edge, now_ms),
        }
    }

    fn is_expired(&self, edge: &Edge, now_ms: u64) -> bool {
        edge.provisional
            .map(|mark| now_ms.saturating_sub(mark.proposed_at_ms) >= self.policy.ttl_ms)
            .unwrap_or(false)
    }

    fn live_proposals(&self, graph: &DocGraph, now_ms: u64) -> Vec<(NodeId, NodeId)> {
        graph
            .edges()
            .iter()
            .filter(|(_, _, e)| e.kind == EdgeKind::Provisional && !self.is_expired(e, now_ms))
            .map(|(f, t, _)| (*f, *t))
            .collect()
    }
}

impl Default for EdgeGate {
    fn default() -> Self {
        Self::new(GatePolicy::default())
    }
}
