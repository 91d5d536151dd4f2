use crate::config::{EdgePriors, RankConfig};
use relgraph_store::{EdgeKind, GraphSnapshot, NodeId};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Which condition ended the iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Converged,
    IterationCap,
}

/// Result of one kernel run.
#[derive(Debug, Clone)]
pub struct KernelOutcome {
    /// Non-zero scores, sorted (score desc, id asc).
    pub scores: Vec<(NodeId, f64)>,

    pub iterations: usize,

    /// L1 residual of the final iteration.
    pub residual: f64,

    pub stop: StopReason,
}

impl KernelOutcome {
    fn empty() -> Self {
        Self {
            scores: Vec::new(),
            iterations: 0,
            residual: 0.0,
            stop: StopReason::Converged,
        }
    }
}

/// Personalized-PageRank power iteration over a node subset of a snapshot.
///
/// Iterates `r = (1 - alpha) * s + alpha * P^T * r` with edge-kind priors
/// applied before row normalization and dangling mass restarting at the seed
/// distribution, so total mass stays 1 every iteration. The loop is pure and
/// single-threaded; `deadline` is checked between iterations and a missed
/// deadline discards the computation entirely (`None`), never a partial
/// result.
///
/// Determinism: `nodes` is ascending, the local iteration order is fixed, and
/// exact score ties break by ascending node id, so identical inputs produce
/// byte-identical output.
pub fn rank_nodes(
    snapshot: &GraphSnapshot,
    nodes: &[usize],
    edge_kinds: &[EdgeKind],
    priors: &EdgePriors,
    seeds: &[(usize, f64)],
    cfg: &RankConfig,
    deadline: Option<Instant>,
) -> Option<KernelOutcome> {
    let n = nodes.len();
    if n == 0 {
        return Some(KernelOutcome::empty());
    }

    let local_of = |snapshot_idx: usize| nodes.binary_search(&snapshot_idx).ok();

    // Restart distribution, renormalized over the seeds inside this subset.
    let mut restart = vec![0.0f64; n];
    let mut seed_total = 0.0f64;
    for (idx, mass) in seeds {
        if let Some(local) = local_of(*idx) {
            restart[local] += mass;
            seed_total += mass;
        }
    }
    if seed_total <= 0.0 {
        return Some(KernelOutcome::empty());
    }
    for value in &mut restart {
        *value /= seed_total;
    }

    // Row-normalized transition rows in CSR form. Priors scale edge weights
    // before normalization so low-trust kinds contribute less transition mass.
    let mut row_offsets = Vec::with_capacity(n + 1);
    let mut row_entries: Vec<(usize, f64)> = Vec::new();
    row_offsets.push(0);
    for &snapshot_idx in nodes {
        let start = row_entries.len();
        for edge in snapshot.out_edges(snapshot_idx) {
            if !edge_kinds.contains(&edge.kind) {
                continue;
            }
            let Some(local_target) = local_of(edge.peer) else {
                continue;
            };
            let mass = edge.weight * priors.get(edge.kind);
            if mass > 0.0 {
                row_entries.push((local_target, mass));
            }
        }
        let row_sum: f64 = row_entries[start..].iter().map(|(_, w)| w).sum();
        if row_sum > 0.0 {
            for entry in &mut row_entries[start..] {
                entry.1 /= row_sum;
            }
        }
        row_offsets.push(row_entries.len());
    }

    let alpha = cfg.alpha;
    let mut rank = restart.clone();
    let mut next = vec![0.0f64; n];
    let mut iterations = 0usize;
    let mut residual = f64::MAX;
    let mut stop = StopReason::IterationCap;

    while iterations < cfg.max_iter {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                log::debug!("Kernel cancelled at iteration {iterations} (deadline)");
                return None;
            }
        }

        for (j, value) in next.iter_mut().enumerate() {
            *value = (1.0 - alpha) * restart[j];
        }
        let mut dangling = 0.0f64;
        for i in 0..n {
            let row = &row_entries[row_offsets[i]..row_offsets[i + 1]];
            if row.is_empty() {
                dangling += rank[i];
            } else {
                let push = alpha * rank[i];
                for (target, prob) in row {
                    next[*target] += push * prob;
                }
            }
        }
        if dangling > 0.0 {
            let push = alpha * dangling;
            for (j, value) in next.iter_mut().enumerate() {
                *value += push * restart[j];
            }
        }

        residual = rank
            .iter()
            .zip(next.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        std::mem::swap(&mut rank, &mut next);
        iterations += 1;

        if residual < cfg.tol {
            stop = StopReason::Converged;
            break;
        }
    }

    let mut scores: Vec<(NodeId, f64)> = rank
        .iter()
        .enumerate()
        .filter(|(_, score)| **score > 0.0)
        .map(|(local, score)| (snapshot.node(nodes[local]).id, *score))
        .collect();
    scores.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Some(KernelOutcome {
        scores,
        iterations,
        residual,
        stop,
    })
}
