//! # Relgraph Rank
//!
//! Personalized-PageRank ranking over a document/section graph, seeded from
//! upstream search hits.
//!
//! ## Architecture
//!
//! ```text
//! SeedHit[] + ScopeFilter + RankConfig
//!     │
//!     ├──> Filter/Scope Engine (narrow the active view)
//!     │
//!     ├──> Seed Builder (normalized restart distribution)
//!     │
//!     ├──> size check
//!     │      ├─ small: PPR Kernel over the whole view
//!     │      └─ large: Partition & Fusion Orchestrator
//!     │             ├─ bounded k-hop subgraphs around the seeds
//!     │             ├─ kernel per subgraph, bounded parallelism
//!     │             └─ seed-mass weighted fusion
//!     │
//!     └──> assembly (echo suppression, caps, doc collapse, top-k)
//!            └─ RankedResult + QueryDiagnostics
//! ```

mod config;
mod diagnostics;
mod engine;
mod error;
mod filter;
mod fusion;
mod kernel;
mod partition;
mod seed;

pub use config::{EdgePriors, PartitionLimits, RankConfig, SubgraphMode};
pub use diagnostics::{QueryDiagnostics, RankMode};
pub use engine::{RankRequest, RankedNode, RankedResult, RelatedRanker};
pub use error::{RankError, Result};
pub use filter::{ActiveView, Scope, ScopeFilter};
pub use fusion::{fuse_subgraphs, SubgraphOutcome};
pub use kernel::{rank_nodes, KernelOutcome, StopReason};
pub use partition::{build_subgraphs, run_partitioned, PartitionRun, SubgraphSpec};
pub use seed::{SeedHit, SeedVector};
