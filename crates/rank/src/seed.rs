use relgraph_store::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A candidate hit from the upstream search stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedHit {
    pub node: NodeId,

    /// Upstream relevance score; `None` when the upstream stage reports none.
    pub score: Option<f64>,
}

impl SeedHit {
    pub fn new(node: NodeId, score: f64) -> Self {
        Self {
            node,
            score: Some(score),
        }
    }

    pub fn unscored(node: NodeId) -> Self {
        Self { node, score: None }
    }
}

/// Normalized restart distribution for the diffusion.
///
/// Entries are sorted by node id and sum to 1.0. Built once per query and
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedVector {
    entries: Vec<(NodeId, f64)>,
}

impl SeedVector {
    /// Build from upstream hits.
    ///
    /// Each hit contributes mass proportional to its score. When every hit
    /// reports a zero or missing score, mass falls back to a uniform
    /// distribution over the hit set. Hits are consumed in upstream order
    /// (stable for ties) and duplicate node references accumulate.
    pub fn from_hits(hits: &[SeedHit]) -> Self {
        if hits.is_empty() {
            return Self {
                entries: Vec::new(),
            };
        }

        let total: f64 = hits
            .iter()
            .map(|h| h.score.unwrap_or(0.0).max(0.0))
            .sum();

        let mut mass: HashMap<NodeId, f64> = HashMap::new();
        if total > 0.0 {
            for hit in hits {
                let share = hit.score.unwrap_or(0.0).max(0.0) / total;
                if share > 0.0 {
                    *mass.entry(hit.node).or_insert(0.0) += share;
                }
            }
        } else {
            let share = 1.0 / hits.len() as f64;
            for hit in hits {
                *mass.entry(hit.node).or_insert(0.0) += share;
            }
        }

        let mut entries: Vec<(NodeId, f64)> = mass.into_iter().collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        Self { entries }
    }

    pub fn entries(&self) -> &[(NodeId, f64)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.binary_search_by_key(&id, |(n, _)| *n).is_ok()
    }

    pub fn total_mass(&self) -> f64 {
        self.entries.iter().map(|(_, m)| m).sum()
    }
}
