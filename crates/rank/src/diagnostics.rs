use crate::kernel::StopReason;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Execution path a query took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMode {
    Direct,
    Partitioned,
}

/// Per-query diagnostics returned alongside the ranked list and discarded with
/// it; nothing here is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDiagnostics {
    /// Kernel iterations (the maximum across subgraphs when partitioned).
    pub iterations: usize,

    /// Final L1 residual (the maximum across subgraphs when partitioned).
    pub residual: f64,

    /// What ended the iteration, when at least one kernel run completed.
    pub stop: Option<StopReason>,

    /// Nodes in the active view after filtering.
    pub candidate_count: usize,

    /// Nodes in the whole snapshot.
    pub graph_node_count: usize,

    pub subgraph_count: usize,
    pub subgraph_nodes_min: usize,
    pub subgraph_nodes_max: usize,
    pub subgraph_nodes_avg: f64,

    pub partition_ms: u64,
    pub kernel_ms: u64,
    pub fusion_ms: u64,
    pub total_ms: u64,

    pub mode: RankMode,

    /// Set when subgraph computations were cancelled or timed out and the
    /// result is a best-effort fusion of what completed.
    pub horizon_restricted: bool,

    /// Why the candidate set came out empty, when it did.
    pub empty_reason: Option<String>,
}

impl QueryDiagnostics {
    pub fn new(mode: RankMode) -> Self {
        Self {
            iterations: 0,
            residual: 0.0,
            stop: None,
            candidate_count: 0,
            graph_node_count: 0,
            subgraph_count: 0,
            subgraph_nodes_min: 0,
            subgraph_nodes_max: 0,
            subgraph_nodes_avg: 0.0,
            partition_ms: 0,
            kernel_ms: 0,
            fusion_ms: 0,
            total_ms: 0,
            mode,
            horizon_restricted: false,
            empty_reason: None,
        }
    }

    pub fn record_subgraph_sizes(&mut self, sizes: &[usize]) {
        self.subgraph_count = sizes.len();
        self.subgraph_nodes_min = sizes.iter().copied().min().unwrap_or(0);
        self.subgraph_nodes_max = sizes.iter().copied().max().unwrap_or(0);
        self.subgraph_nodes_avg = if sizes.is_empty() {
            0.0
        } else {
            sizes.iter().sum::<usize>() as f64 / sizes.len() as f64
        };
    }
}

/// Phase timer that logs its duration when finished.
pub(crate) struct PhaseTimer {
    phase: &'static str,
    start: Instant,
}

impl PhaseTimer {
    pub(crate) fn start(phase: &'static str) -> Self {
        Self {
            phase,
            start: Instant::now(),
        }
    }

    pub(crate) fn finish(self) -> u64 {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        log::debug!("Phase {} completed in {elapsed_ms}ms", self.phase);
        elapsed_ms
    }
}
