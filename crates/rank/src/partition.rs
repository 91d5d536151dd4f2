use crate::config::{PartitionLimits, RankConfig};
use crate::filter::ActiveView;
use crate::fusion::SubgraphOutcome;
use crate::kernel::{rank_nodes, StopReason};
use relgraph_store::{EdgeKind, GraphSnapshot};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// A bounded subgraph scheduled for one kernel run.
#[derive(Debug, Clone)]
pub struct SubgraphSpec {
    /// Snapshot indices, ascending.
    pub nodes: Vec<usize>,

    /// Seed entries (snapshot index, mass) claimed by this subgraph.
    pub seeds: Vec<(usize, f64)>,

    /// Fraction of total seed mass claimed; the fusion confidence weight.
    pub seed_mass: f64,
}

/// Grow bounded subgraphs around the seeds.
///
/// Seeds are taken in (mass desc, index asc) order; each unclaimed seed grows
/// a breadth-first neighborhood over the view's permitted edges and claims
/// every seed it absorbs. The `max_hops` radius only binds when the active
/// view is larger than `max_candidates`; a smaller view is covered
/// exhaustively (component by component), so partitioned execution ranks the
/// same nodes as the direct kernel would. The ordering makes partitioning
/// deterministic and keeps the subgraph count at most the seed count.
pub fn build_subgraphs(
    snapshot: &GraphSnapshot,
    view: &ActiveView,
    seeds: &[(usize, f64)],
    limits: &PartitionLimits,
) -> Vec<SubgraphSpec> {
    let mut ordered: Vec<(usize, f64)> = seeds.to_vec();
    ordered.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let hop_bounded = view.len() > limits.max_candidates;
    let mut claimed = vec![false; snapshot.node_count()];
    let mut specs = Vec::new();

    for &(seed_idx, _) in &ordered {
        if claimed[seed_idx] {
            continue;
        }

        let mut in_subgraph = vec![false; snapshot.node_count()];
        let mut nodes = Vec::new();
        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
        in_subgraph[seed_idx] = true;
        nodes.push(seed_idx);
        queue.push_back((seed_idx, 0));

        while let Some((idx, hops)) = queue.pop_front() {
            if (hop_bounded && hops >= limits.max_hops) || nodes.len() >= limits.max_candidates
            {
                continue;
            }
            let step = snapshot
                .out_edges(idx)
                .iter()
                .chain(snapshot.in_edges(idx));
            for edge in step {
                if nodes.len() >= limits.max_candidates {
                    break;
                }
                if !view.edge_kinds().contains(&edge.kind) || !view.contains(edge.peer) {
                    continue;
                }
                if !in_subgraph[edge.peer] {
                    in_subgraph[edge.peer] = true;
                    nodes.push(edge.peer);
                    queue.push_back((edge.peer, hops + 1));
                }
            }
        }

        let sub_seeds: Vec<(usize, f64)> = ordered
            .iter()
            .filter(|(idx, _)| in_subgraph[*idx] && !claimed[*idx])
            .copied()
            .collect();
        let seed_mass: f64 = sub_seeds.iter().map(|(_, m)| m).sum();
        for (idx, _) in &sub_seeds {
            claimed[*idx] = true;
        }

        nodes.sort_unstable();
        specs.push(SubgraphSpec {
            nodes,
            seeds: sub_seeds,
            seed_mass,
        });
    }

    log::debug!(
        "Partitioned view into {} subgraphs (sizes: {:?})",
        specs.len(),
        specs.iter().map(|s| s.nodes.len()).collect::<Vec<_>>()
    );
    specs
}

/// Joined outcome of the parallel subgraph fan-out.
pub struct PartitionRun {
    pub completed: Vec<SubgraphOutcome>,

    /// Subgraph computations cancelled by timeout or query deadline.
    pub cancelled: usize,

    /// Max iterations across completed subgraphs.
    pub iterations: usize,

    /// Max final residual across completed subgraphs.
    pub residual: f64,

    pub stop: Option<StopReason>,
}

/// Run the kernel over every subgraph on a bounded blocking pool and join at
/// the fusion barrier.
///
/// Each task owns its spec and returns an owned outcome; no state is shared
/// between computations. A subgraph that misses its per-task timeout or the
/// query deadline is discarded entirely, never partially incorporated.
pub async fn run_partitioned(
    snapshot: Arc<GraphSnapshot>,
    edge_kinds: Arc<Vec<EdgeKind>>,
    specs: Vec<SubgraphSpec>,
    config: Arc<RankConfig>,
    query_deadline: Option<Instant>,
) -> PartitionRun {
    let semaphore = Arc::new(Semaphore::new(config.limits.max_concurrency));
    let mut tasks: JoinSet<Option<SubgraphOutcome>> = JoinSet::new();

    for spec in specs {
        let snapshot = snapshot.clone();
        let edge_kinds = edge_kinds.clone();
        let config = config.clone();
        let semaphore = semaphore.clone();

        tasks.spawn(async move {
            // The semaphore is never closed; acquire failures are not expected.
            let _permit = semaphore
                .acquire_owned()
                .await
                .unwrap_or_else(|_| unreachable!("subgraph semaphore closed"));

            tokio::task::spawn_blocking(move || {
                let per_task = Instant::now() + config.limits.subgraph_timeout;
                let deadline = match query_deadline {
                    Some(query) => Some(query.min(per_task)),
                    None => Some(per_task),
                };
                rank_nodes(
                    &snapshot,
                    &spec.nodes,
                    &edge_kinds,
                    &config.priors,
                    &spec.seeds,
                    &config,
                    deadline,
                )
                .map(|outcome| SubgraphOutcome {
                    outcome,
                    seed_mass: spec.seed_mass,
                })
            })
            .await
            .ok()
            .flatten()
        });
    }

    let mut run = PartitionRun {
        completed: Vec::new(),
        cancelled: 0,
        iterations: 0,
        residual: 0.0,
        stop: None,
    };

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(subgraph)) => {
                run.iterations = run.iterations.max(subgraph.outcome.iterations);
                run.residual = run.residual.max(subgraph.outcome.residual);
                // IterationCap dominates so the caller sees the weaker stop.
                run.stop = match (run.stop, subgraph.outcome.stop) {
                    (Some(StopReason::IterationCap), _) | (_, StopReason::IterationCap) => {
                        Some(StopReason::IterationCap)
                    }
                    _ => Some(StopReason::Converged),
                };
                run.completed.push(subgraph);
            }
            Ok(None) => run.cancelled += 1,
            Err(err) => {
                log::warn!("Subgraph task failed: {err}");
                run.cancelled += 1;
            }
        }
    }

    if run.cancelled > 0 {
        log::info!(
            "Partitioned run horizon-restricted: {} of {} subgraphs cancelled",
            run.cancelled,
            run.cancelled + run.completed.len()
        );
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{build_view, ScopeFilter};
    use relgraph_store::{DocGraph, Edge, EdgeGate, Node, NodeId};

    /// Two disconnected clusters of documents joined internally by semantic
    /// edges.
    fn clustered_snapshot() -> GraphSnapshot {
        let mut g = DocGraph::new();
        for i in 1..=4u64 {
            g.upsert_node(Node::document(NodeId(i), 10));
        }
        for i in 11..=14u64 {
            g.upsert_node(Node::document(NodeId(i), 10));
        }
        g.upsert_edge(NodeId(1), NodeId(2), Edge::semantic(1.0))
            .unwrap();
        g.upsert_edge(NodeId(2), NodeId(3), Edge::semantic(1.0))
            .unwrap();
        g.upsert_edge(NodeId(3), NodeId(4), Edge::semantic(1.0))
            .unwrap();
        g.upsert_edge(NodeId(11), NodeId(12), Edge::semantic(1.0))
            .unwrap();
        g.upsert_edge(NodeId(12), NodeId(13), Edge::semantic(1.0))
            .unwrap();
        g.upsert_edge(NodeId(13), NodeId(14), Edge::semantic(1.0))
            .unwrap();
        GraphSnapshot::compile(&g, &EdgeGate::default(), 0, 1)
    }

    #[test]
    fn disconnected_seeds_get_separate_subgraphs() {
        let snap = clustered_snapshot();
        let view = build_view(&snap, &ScopeFilter::default(), &[NodeId(1), NodeId(11)]);
        let seeds = vec![
            (snap.index_of(NodeId(1)).unwrap(), 0.6),
            (snap.index_of(NodeId(11)).unwrap(), 0.4),
        ];

        let specs = build_subgraphs(&snap, &view, &seeds, &PartitionLimits::default());
        assert_eq!(specs.len(), 2);
        // Highest-mass seed grows first.
        assert!((specs[0].seed_mass - 0.6).abs() < 1e-12);
        assert_eq!(specs[0].nodes.len(), 4);
        assert!((specs[1].seed_mass - 0.4).abs() < 1e-12);
    }

    #[test]
    fn nearby_seeds_share_one_subgraph() {
        let snap = clustered_snapshot();
        let view = build_view(&snap, &ScopeFilter::default(), &[NodeId(1), NodeId(2)]);
        let seeds = vec![
            (snap.index_of(NodeId(1)).unwrap(), 0.5),
            (snap.index_of(NodeId(2)).unwrap(), 0.5),
        ];

        let specs = build_subgraphs(&snap, &view, &seeds, &PartitionLimits::default());
        assert_eq!(specs.len(), 1);
        assert!((specs[0].seed_mass - 1.0).abs() < 1e-12);
        assert_eq!(specs[0].seeds.len(), 2);
    }

    #[test]
    fn small_views_are_covered_past_the_hop_radius() {
        // A chain deeper than the default hop radius still fits well under the
        // candidate cap, so the subgraph grown from the head covers all of it.
        let mut g = DocGraph::new();
        for i in 1..=7u64 {
            g.upsert_node(Node::document(NodeId(i), 10));
        }
        for i in 1..7u64 {
            g.upsert_edge(NodeId(i), NodeId(i + 1), Edge::semantic(1.0))
                .unwrap();
        }
        let snap = GraphSnapshot::compile(&g, &EdgeGate::default(), 0, 1);
        let view = build_view(&snap, &ScopeFilter::default(), &[NodeId(1)]);
        let seeds = vec![(snap.index_of(NodeId(1)).unwrap(), 1.0)];

        let specs = build_subgraphs(&snap, &view, &seeds, &PartitionLimits::default());
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].nodes.len(), 7);
    }

    #[test]
    fn candidate_cap_bounds_subgraph_size() {
        let snap = clustered_snapshot();
        let view = build_view(&snap, &ScopeFilter::default(), &[NodeId(1)]);
        let seeds = vec![(snap.index_of(NodeId(1)).unwrap(), 1.0)];
        let limits = PartitionLimits {
            max_candidates: 2,
            ..PartitionLimits::default()
        };

        let specs = build_subgraphs(&snap, &view, &seeds, &limits);
        assert_eq!(specs[0].nodes.len(), 2);
    }

    #[tokio::test]
    async fn orchestrator_joins_all_subgraphs() {
        let snap = Arc::new(clustered_snapshot());
        let view = build_view(&snap, &ScopeFilter::default(), &[NodeId(1), NodeId(11)]);
        let seeds = vec![
            (snap.index_of(NodeId(1)).unwrap(), 0.5),
            (snap.index_of(NodeId(11)).unwrap(), 0.5),
        ];
        let config = Arc::new(RankConfig {
            max_iter: 200,
            ..RankConfig::default()
        });
        let specs = build_subgraphs(&snap, &view, &seeds, &config.limits);

        let run = run_partitioned(
            snap.clone(),
            Arc::new(EdgeKind::ALL.to_vec()),
            specs,
            config,
            None,
        )
        .await;

        assert_eq!(run.completed.len(), 2);
        assert_eq!(run.cancelled, 0);
        assert_eq!(run.stop, Some(StopReason::Converged));
        assert!(run.iterations > 0);
    }

    #[tokio::test]
    async fn expired_deadline_cancels_everything() {
        let snap = Arc::new(clustered_snapshot());
        let view = build_view(&snap, &ScopeFilter::default(), &[NodeId(1)]);
        let seeds = vec![(snap.index_of(NodeId(1)).unwrap(), 1.0)];
        let config = Arc::new(RankConfig::default());
        let specs = build_subgraphs(&snap, &view, &seeds, &config.limits);

        let run = run_partitioned(
            snap.clone(),
            Arc::new(EdgeKind::ALL.to_vec()),
            specs,
            config,
            Some(Instant::now() - std::time::Duration::from_millis(1)),
        )
        .await;

        assert!(run.completed.is_empty());
        assert_eq!(run.cancelled, 1);
    }
}
