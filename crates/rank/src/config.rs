use crate::error::{RankError, Result};
use relgraph_store::EdgeKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transition-mass priors per edge kind, applied before row normalization.
///
/// Kept as a data table rather than branching logic so a new edge kind only
/// needs a new entry. Defaults order trust as
/// verified > semantic > structural > provisional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgePriors {
    pub verified: f64,
    pub semantic: f64,
    pub structural: f64,
    pub provisional: f64,
}

impl EdgePriors {
    pub fn get(&self, kind: EdgeKind) -> f64 {
        match kind {
            EdgeKind::Verified => self.verified,
            EdgeKind::Semantic => self.semantic,
            EdgeKind::Structural => self.structural,
            EdgeKind::Provisional => self.provisional,
        }
    }
}

impl Default for EdgePriors {
    fn default() -> Self {
        Self {
            verified: 1.5,
            semantic: 1.2,
            structural: 1.0,
            provisional: 0.5,
        }
    }
}

/// How the engine decides between direct and partitioned execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubgraphMode {
    /// Partition when the active view exceeds `node_threshold`.
    Auto,

    /// Always run the kernel on the whole active view.
    Direct,

    /// Always partition, regardless of size.
    Partitioned,
}

/// Hard guards for the partition/fusion path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionLimits {
    /// Active-view node count above which auto mode partitions.
    pub node_threshold: usize,

    /// BFS radius when growing a subgraph around its seeds.
    pub max_hops: usize,

    /// Candidate cap per subgraph.
    pub max_candidates: usize,

    /// Wall-clock budget per subgraph computation.
    pub subgraph_timeout: Duration,

    /// Maximum concurrent subgraph computations.
    pub max_concurrency: usize,
}

impl Default for PartitionLimits {
    fn default() -> Self {
        Self {
            node_threshold: 2_000,
            max_hops: 3,
            max_candidates: 1_500,
            subgraph_timeout: Duration::from_millis(250),
            max_concurrency: 4,
        }
    }
}

/// Per-query ranking configuration. Validated once up front and immutable for
/// the duration of the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankConfig {
    /// Damping factor: probability of continuing the walk vs. restarting at a
    /// seed.
    pub alpha: f64,

    /// L1 residual convergence threshold.
    pub tol: f64,

    /// Iteration cap.
    pub max_iter: usize,

    /// Size of the returned ranked list.
    pub top_k: usize,

    pub subgraph_mode: SubgraphMode,

    pub priors: EdgePriors,

    pub limits: PartitionLimits,

    /// Echo suppression: drop seed nodes from the ranked output.
    pub suppress_seeds: bool,

    /// Optional query-level deadline. Subgraph computations still running at
    /// the deadline are cancelled cooperatively and discarded.
    pub deadline: Option<Duration>,
}

impl RankConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 || self.alpha >= 1.0 {
            return Err(RankError::Config(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if !self.tol.is_finite() || self.tol <= 0.0 {
            return Err(RankError::Config(format!(
                "tol must be positive, got {}",
                self.tol
            )));
        }
        if self.max_iter == 0 {
            return Err(RankError::Config("max_iter must be at least 1".to_string()));
        }
        if self.top_k == 0 {
            return Err(RankError::Config("top_k must be at least 1".to_string()));
        }
        let priors = [
            self.priors.verified,
            self.priors.semantic,
            self.priors.structural,
            self.priors.provisional,
        ];
        if priors.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(RankError::Config(
                "edge priors must be non-negative".to_string(),
            ));
        }
        if self.limits.max_candidates == 0 || self.limits.max_concurrency == 0 {
            return Err(RankError::Config(
                "partition limits must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            alpha: 0.85,
            tol: 1e-6,
            max_iter: 50,
            top_k: 10,
            subgraph_mode: SubgraphMode::Auto,
            priors: EdgePriors::default(),
            limits: PartitionLimits::default(),
            suppress_seeds: true,
            deadline: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RankConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut cfg = RankConfig::default();
        cfg.alpha = 1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = RankConfig::default();
        cfg.tol = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = RankConfig::default();
        cfg.max_iter = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = RankConfig::default();
        cfg.top_k = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = RankConfig::default();
        cfg.priors.provisional = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn priors_table_covers_every_kind() {
        let priors = EdgePriors::default();
        assert!(priors.get(EdgeKind::Verified) > priors.get(EdgeKind::Semantic));
        assert!(priors.get(EdgeKind::Semantic) > priors.get(EdgeKind::Structural));
        assert!(priors.get(EdgeKind::Structural) > priors.get(EdgeKind::Provisional));
    }
}
