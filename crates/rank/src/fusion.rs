use crate::kernel::KernelOutcome;
use relgraph_store::NodeId;
use std::collections::BTreeMap;

/// Per-subgraph result waiting to be fused.
#[derive(Debug, Clone)]
pub struct SubgraphOutcome {
    pub outcome: KernelOutcome,

    /// Fraction of the query's total seed mass contained in the subgraph;
    /// used as the confidence weight during fusion.
    pub seed_mass: f64,
}

/// Fuse per-subgraph rankings into one global ranking.
///
/// Each subgraph's scores are L1-normalized, weighted by its seed-mass
/// confidence, and summed per node. Accumulation goes through an id-ordered
/// map, so the merge is commutative: the fused result does not depend on
/// which subgraph finished first. The caller truncates to top-k.
pub fn fuse_subgraphs(completed: &[SubgraphOutcome]) -> Vec<(NodeId, f64)> {
    let mut fused: BTreeMap<NodeId, f64> = BTreeMap::new();

    for subgraph in completed {
        let total: f64 = subgraph.outcome.scores.iter().map(|(_, s)| s).sum();
        if total <= 0.0 {
            continue;
        }
        for (id, score) in &subgraph.outcome.scores {
            *fused.entry(*id).or_insert(0.0) += subgraph.seed_mass * score / total;
        }
    }

    let mut merged: Vec<(NodeId, f64)> = fused.into_iter().collect();
    merged.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    merged
}
