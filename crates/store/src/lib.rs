//! # Relgraph Store
//!
//! Document/section graph storage for related-item ranking.
//!
//! ## Features
//!
//! - **Arena-backed graph** - nodes in an integer-indexed arena, edges as
//!   adjacency entries, no ownership cycles
//! - **Versioned snapshots** - immutable compiled views, atomically swapped so
//!   rebuilds never disturb in-flight queries
//! - **Edge gating** - quota/TTL lifecycle for speculative edges proposed by
//!   agents, with promotion to verified status
//! - **Durable persistence** - cache + durable snapshot tiers with fail-fast
//!   semantics when the durable tier is unreachable
//!
//! ## Architecture
//!
//! ```text
//! parser updates ──> DocGraph (mutable, single owner)
//!                       │
//!                       ├─ EdgeGate (propose / promote / expire)
//!                       │
//!                       └─ GraphSnapshot::compile (gate-filtered, sorted)
//!                              │
//!                              └─ SnapshotHandle (atomic swap, versioned)
//!                                     │
//!                                     └─ ranking queries (read-only Arc)
//! ```

mod cache;
mod error;
mod gate;
mod graph;
mod snapshot;
mod store;
mod types;

pub use cache::{FileSnapshotStore, SnapshotStore};
pub use error::{Result, StoreError};
pub use gate::{EdgeGate, GatePolicy, ProposalOutcome};
pub use graph::DocGraph;
pub use snapshot::{GraphSnapshot, SnapshotEdge, SnapshotHandle, SnapshotNode};
pub use store::GraphStore;
pub use types::{Edge, EdgeKind, Node, NodeId, NodeKind, ProvisionalMark, ProvisionalState};
