use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable node identifier assigned by the upstream parser.
///
/// The store never mints ids of its own; reparses of the same document reuse
/// the same ids so edges survive a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Kind of graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Document,
    Section,
}

/// Node in the document/section graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,

    pub kind: NodeKind,

    /// Heading depth; sections only (1 = top-level heading).
    pub depth: Option<u8>,

    /// Word count of the body under this node.
    pub word_count: usize,

    /// Parent section or document; sections only.
    pub parent: Option<NodeId>,
}

impl Node {
    pub fn document(id: NodeId, word_count: usize) -> Self {
        Self {
            id,
            kind: NodeKind::Document,
            depth: None,
            word_count,
            parent: None,
        }
    }

    pub fn section(id: NodeId, parent: NodeId, depth: u8, word_count: usize) -> Self {
        Self {
            id,
            kind: NodeKind::Section,
            depth: Some(depth),
            word_count,
            parent: Some(parent),
        }
    }
}

/// Trust level of an edge, from most to least evidenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Promoted from a provisional edge by an external evaluator.
    Verified,

    /// Author-authored link between documents or sections.
    Semantic,

    /// Containment/hierarchy edge emitted deterministically by the parser.
    Structural,

    /// Speculative, quota/TTL-bounded edge pending a promotion decision.
    Provisional,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 4] = [
        EdgeKind::Verified,
        EdgeKind::Semantic,
        EdgeKind::Structural,
        EdgeKind::Provisional,
    ];
}

/// Lifecycle state of a provisional edge.
///
/// The only transitions are `Proposed -> Promoted` and `Proposed -> Expired`;
/// expired edges are removed from the graph at the next sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionalState {
    Proposed,
    Promoted,
    Expired,
}

/// Lifecycle marker carried by provisional edges only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProvisionalMark {
    /// Proposal time, unix milliseconds.
    pub proposed_at_ms: u64,

    pub state: ProvisionalState,
}

/// Edge payload stored in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub kind: EdgeKind,

    pub weight: f64,

    /// Present iff `kind == Provisional`.
    pub provisional: Option<ProvisionalMark>,
}

impl Edge {
    pub fn structural(weight: f64) -> Self {
        Self {
            kind: EdgeKind::Structural,
            weight,
            provisional: None,
        }
    }

    pub fn semantic(weight: f64) -> Self {
        Self {
            kind: EdgeKind::Semantic,
            weight,
            provisional: None,
        }
    }

    pub(crate) fn provisional(weight: f64, proposed_at_ms: u64) -> Self {
        Self {
            kind: EdgeKind::Provisional,
            weight,
            provisional: Some(ProvisionalMark {
                proposed_at_ms,
                state: ProvisionalState::Proposed,
            }),
        }
    }
}
