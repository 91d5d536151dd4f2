use crate::error::{Result, StoreError};
use crate::graph::DocGraph;
use crate::types::{Edge, EdgeKind, Node, NodeId, ProvisionalMark, ProvisionalState};
use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const FORMAT_VERSION: u32 = 1;

/// Durable storage for serialized graph snapshots.
///
/// Two instances back the store: a fast cache tier and the authoritative
/// durable tier. The store survives a broken cache but fails fast when the
/// durable tier is unreachable.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Fetch the serialized graph, `None` when nothing is stored.
    async fn get(&self) -> Result<Option<Vec<u8>>>;

    async fn put(&self, bytes: &[u8]) -> Result<()>;

    async fn invalidate(&self) -> Result<()>;
}

/// File-backed snapshot store (JSON document on disk).
#[derive(Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn get(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Unavailable(format!(
                "{}: {err}",
                self.path.display()
            ))),
        }
    }

    async fn put(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, bytes).await?;
        Ok(())
    }

    async fn invalidate(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Serialized form of the graph, node-id based so it survives arena reindexing.
#[derive(Serialize, Deserialize)]
pub(crate) struct CachedGraph {
    format_version: u32,
    nodes: Vec<Node>,
    edges: Vec<CachedEdge>,
}

#[derive(Serialize, Deserialize)]
struct CachedEdge {
    from: NodeId,
    to: NodeId,
    kind: EdgeKind,
    weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    proposed_at_ms: Option<u64>,
}

impl CachedGraph {
    pub(crate) fn from_graph(graph: &DocGraph) -> Self {
        let nodes = graph.nodes().into_iter().cloned().collect();
        let edges = graph
            .edges()
            .into_iter()
            .map(|(from, to, edge)| CachedEdge {
                from,
                to,
                kind: edge.kind,
                weight: edge.weight,
                proposed_at_ms: edge.provisional.map(|m| m.proposed_at_ms),
            })
            .collect();
        Self {
            format_version: FORMAT_VERSION,
            nodes,
            edges,
        }
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        let cached: CachedGraph = serde_json::from_slice(bytes)
            .map_err(|err| StoreError::CorruptSnapshot(err.to_string()))?;
        if cached.format_version != FORMAT_VERSION {
            return Err(StoreError::CorruptSnapshot(format!(
                "unsupported format version {}",
                cached.format_version
            )));
        }
        Ok(cached)
    }

    pub(crate) fn into_graph(self) -> Result<DocGraph> {
        let mut graph = DocGraph::new();
        for node in self.nodes {
            graph.upsert_node(node);
        }
        for edge in self.edges {
            let payload = Edge {
                kind: edge.kind,
                weight: edge.weight,
                provisional: edge.proposed_at_ms.map(|proposed_at_ms| ProvisionalMark {
                    proposed_at_ms,
                    state: ProvisionalState::Proposed,
                }),
            };
            graph
                .insert_edge(edge.from, edge.to, payload)
                .map_err(|err| StoreError::CorruptSnapshot(err.to_string()))?;
        }
        Ok(graph)
    }
}

/// Load the graph, preferring `cache` and falling back to `durable`.
///
/// A missing or corrupt cache entry is invalidated and the durable tier is
/// read instead; a bad durable tier surfaces as `Unavailable` — the caller
/// never gets a silently empty graph.
pub(crate) async fn load_graph(
    cache: &dyn SnapshotStore,
    durable: &dyn SnapshotStore,
) -> Result<DocGraph> {
    match try_load(cache).await {
        Ok(Some(graph)) => return Ok(graph),
        Ok(None) => {}
        Err(err) => {
            warn!("Snapshot cache unreadable, rebuilding from durable store: {err}");
            if let Err(err) = cache.invalidate().await {
                warn!("Failed to invalidate snapshot cache: {err}");
            }
        }
    }

    match try_load(durable).await {
        Ok(Some(graph)) => {
            // Refresh the cache tier; failure here is not fatal.
            if let Ok(bytes) = CachedGraph::from_graph(&graph).encode() {
                if let Err(err) = cache.put(&bytes).await {
                    warn!("Failed to refresh snapshot cache: {err}");
                }
            }
            Ok(graph)
        }
        Ok(None) => Err(StoreError::Unavailable(
            "durable store holds no graph snapshot".to_string(),
        )),
        Err(StoreError::CorruptSnapshot(msg)) => Err(StoreError::Unavailable(format!(
            "durable snapshot corrupt: {msg}"
        ))),
        Err(err) => Err(err),
    }
}

async fn try_load(store: &dyn SnapshotStore) -> Result<Option<DocGraph>> {
    match store.get().await? {
        Some(bytes) => {
            let graph = CachedGraph::decode(&bytes)?.into_graph()?;
            Ok(Some(graph))
        }
        None => Ok(None),
    }
}
