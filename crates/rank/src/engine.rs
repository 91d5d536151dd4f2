use crate::config::{RankConfig, SubgraphMode};
use crate::diagnostics::{PhaseTimer, QueryDiagnostics, RankMode};
use crate::error::Result;
use crate::filter::{
    apply_section_cap, build_view, collapse_to_docs, ActiveView, ScopeFilter,
};
use crate::fusion::{fuse_subgraphs, SubgraphOutcome};
use crate::kernel::rank_nodes;
use crate::partition::{build_subgraphs, run_partitioned};
use crate::seed::{SeedHit, SeedVector};
use relgraph_store::{GraphSnapshot, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// One "find related items" query.
#[derive(Debug, Clone)]
pub struct RankRequest {
    /// Candidate hits from the upstream search stage.
    pub hits: Vec<SeedHit>,

    pub filter: ScopeFilter,

    pub config: RankConfig,
}

/// Ranked entry in the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedNode {
    pub id: NodeId,
    pub score: f64,
}

/// Response: ranked list plus per-query diagnostics.
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub nodes: Vec<RankedNode>,
    pub diagnostics: QueryDiagnostics,
}

/// The graph retrieval engine.
///
/// Stateless: every query runs against the snapshot the caller acquired, so
/// concurrent queries never contend and a background rebuild cannot change a
/// query mid-flight.
pub struct RelatedRanker;

impl RelatedRanker {
    pub fn new() -> Self {
        Self
    }

    /// Rank related nodes for `request` against `snapshot`.
    ///
    /// Pipeline: validate config -> narrow the view -> build seeds -> route to
    /// the direct kernel or the partition/fusion orchestrator -> assemble
    /// (suppression, caps, collapse, top-k) -> attach diagnostics.
    pub async fn rank(
        &self,
        snapshot: Arc<GraphSnapshot>,
        request: RankRequest,
    ) -> Result<RankedResult> {
        request.config.validate()?;
        let total_timer = Instant::now();
        let config = request.config;
        let filter = request.filter;
        let query_deadline = config.deadline.map(|budget| total_timer + budget);

        // 1. Narrow the active graph view.
        let partition_timer = PhaseTimer::start("partition");
        let seed_ids: Vec<NodeId> = request.hits.iter().map(|h| h.node).collect();
        let view = build_view(&snapshot, &filter, &seed_ids);

        // 2. Seed distribution from the hits that survived filtering.
        let surviving: Vec<SeedHit> = request
            .hits
            .into_iter()
            .filter(|hit| {
                snapshot
                    .index_of(hit.node)
                    .map(|idx| view.contains(idx))
                    .unwrap_or(false)
            })
            .collect();
        let seeds = SeedVector::from_hits(&surviving);

        if view.is_empty() || seeds.is_empty() {
            let reason = if seed_ids.is_empty() {
                "no seed hits supplied"
            } else if view.is_empty() {
                "active view empty after filtering"
            } else {
                "no seed hits inside the active view"
            };
            log::debug!("Query produced no candidates: {reason}");
            let mut diagnostics = QueryDiagnostics::new(RankMode::Direct);
            diagnostics.graph_node_count = snapshot.node_count();
            diagnostics.candidate_count = view.len();
            diagnostics.partition_ms = partition_timer.finish();
            diagnostics.empty_reason = Some(reason.to_string());
            diagnostics.total_ms = total_timer.elapsed().as_millis() as u64;
            return Ok(RankedResult {
                nodes: Vec::new(),
                diagnostics,
            });
        }

        let seed_indices: Vec<(usize, f64)> = seeds
            .entries()
            .iter()
            .filter_map(|(id, mass)| snapshot.index_of(*id).map(|idx| (idx, *mass)))
            .collect();

        // 3. Route by size.
        let partitioned = match config.subgraph_mode {
            SubgraphMode::Direct => false,
            SubgraphMode::Partitioned => true,
            SubgraphMode::Auto => view.len() > config.limits.node_threshold,
        };

        let mut diagnostics = QueryDiagnostics::new(if partitioned {
            RankMode::Partitioned
        } else {
            RankMode::Direct
        });
        diagnostics.graph_node_count = snapshot.node_count();
        diagnostics.candidate_count = view.len();

        let ranked = if partitioned {
            self.rank_partitioned(
                &snapshot,
                &view,
                seed_indices,
                &config,
                query_deadline,
                partition_timer,
                &mut diagnostics,
            )
            .await
        } else {
            self.rank_direct(
                &snapshot,
                &view,
                &seed_indices,
                &config,
                query_deadline,
                partition_timer,
                &mut diagnostics,
            )
        };

        // 4. Assemble the response.
        let fusion_timer = PhaseTimer::start("assemble");
        let nodes = assemble(ranked, &snapshot, &seeds, &filter, &config);
        diagnostics.fusion_ms += fusion_timer.finish();
        if nodes.is_empty() && diagnostics.empty_reason.is_none() && !diagnostics.horizon_restricted
        {
            diagnostics.empty_reason = Some("no reachable candidates beyond seeds".to_string());
        }
        diagnostics.total_ms = total_timer.elapsed().as_millis() as u64;

        log::debug!(
            "Ranked {} nodes in {}ms (mode {:?}, {} candidates)",
            nodes.len(),
            diagnostics.total_ms,
            diagnostics.mode,
            diagnostics.candidate_count
        );

        Ok(RankedResult { nodes, diagnostics })
    }

    #[allow(clippy::too_many_arguments)]
    fn rank_direct(
        &self,
        snapshot: &GraphSnapshot,
        view: &ActiveView,
        seed_indices: &[(usize, f64)],
        config: &RankConfig,
        query_deadline: Option<Instant>,
        partition_timer: PhaseTimer,
        diagnostics: &mut QueryDiagnostics,
    ) -> Vec<(NodeId, f64)> {
        diagnostics.partition_ms = partition_timer.finish();
        diagnostics.record_subgraph_sizes(&[view.len()]);

        let kernel_timer = PhaseTimer::start("kernel");
        let outcome = rank_nodes(
            snapshot,
            view.members(),
            view.edge_kinds(),
            &config.priors,
            seed_indices,
            config,
            query_deadline,
        );
        diagnostics.kernel_ms = kernel_timer.finish();

        match outcome {
            Some(outcome) => {
                diagnostics.iterations = outcome.iterations;
                diagnostics.residual = outcome.residual;
                diagnostics.stop = Some(outcome.stop);
                outcome.scores
            }
            None => {
                // Deadline hit mid-kernel: the partial run is discarded.
                diagnostics.horizon_restricted = true;
                diagnostics.empty_reason = Some("query deadline reached".to_string());
                Vec::new()
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn rank_partitioned(
        &self,
        snapshot: &Arc<GraphSnapshot>,
        view: &ActiveView,
        seed_indices: Vec<(usize, f64)>,
        config: &RankConfig,
        query_deadline: Option<Instant>,
        partition_timer: PhaseTimer,
        diagnostics: &mut QueryDiagnostics,
    ) -> Vec<(NodeId, f64)> {
        let specs = build_subgraphs(snapshot, view, &seed_indices, &config.limits);
        let sizes: Vec<usize> = specs.iter().map(|s| s.nodes.len()).collect();
        diagnostics.record_subgraph_sizes(&sizes);
        diagnostics.partition_ms = partition_timer.finish();

        let kernel_timer = PhaseTimer::start("kernel");
        let run = run_partitioned(
            snapshot.clone(),
            Arc::new(view.edge_kinds().to_vec()),
            specs,
            Arc::new(config.clone()),
            query_deadline,
        )
        .await;
        diagnostics.kernel_ms = kernel_timer.finish();
        diagnostics.iterations = run.iterations;
        diagnostics.residual = run.residual;
        diagnostics.stop = run.stop;
        diagnostics.horizon_restricted = run.cancelled > 0;

        let fusion_timer = PhaseTimer::start("fusion");
        let completed: Vec<SubgraphOutcome> = run.completed;
        let fused = fuse_subgraphs(&completed);
        diagnostics.fusion_ms = fusion_timer.finish();
        fused
    }
}

impl Default for RelatedRanker {
    fn default() -> Self {
        Self::new()
    }
}

/// Final shaping of the ranked list: echo suppression, per-document caps,
/// document collapse and top-k truncation.
///
/// Caps and collapse run over the full candidate ranking before truncation,
/// so they can never shrink the returned set below `top_k` while better
/// candidates exist.
fn assemble(
    ranked: Vec<(NodeId, f64)>,
    snapshot: &GraphSnapshot,
    seeds: &SeedVector,
    filter: &ScopeFilter,
    config: &RankConfig,
) -> Vec<RankedNode> {
    let mut ranked = ranked;

    if config.suppress_seeds {
        let seed_set: HashSet<NodeId> = seeds.entries().iter().map(|(id, _)| *id).collect();
        ranked.retain(|(id, _)| !seed_set.contains(id));
    }

    if filter.collapse_to_doc {
        ranked = collapse_to_docs(&ranked, snapshot, filter.collapse_beta, filter.collapse_top_m);
    } else if let Some(cap) = filter.per_doc_section_cap {
        ranked = apply_section_cap(ranked, snapshot, cap);
    }

    ranked.truncate(config.top_k);
    ranked
        .into_iter()
        .map(|(id, score)| RankedNode { id, score })
        .collect()
}
