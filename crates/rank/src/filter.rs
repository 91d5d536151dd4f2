use relgraph_store::{EdgeKind, GraphSnapshot, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Which node kinds may appear as ranking candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    DocOnly,
    SectionOnly,
    Mixed,
}

/// Candidate-space restriction applied before ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeFilter {
    pub scope: Scope,

    /// Sections deeper than this heading level are dropped.
    pub max_heading_level: Option<u8>,

    /// Bound on structural traversal distance from the seeds.
    pub max_tree_hops: Option<usize>,

    /// Edge kinds that participate in ranking.
    pub edge_types: Vec<EdgeKind>,

    /// At most this many sections per document in the ranked output.
    pub per_doc_section_cap: Option<usize>,

    /// Sections below this word count are dropped as low-information.
    pub min_section_words: Option<usize>,

    /// Aggregate section scores into document scores.
    pub collapse_to_doc: bool,

    /// β in `score_doc = max(sections) + β · Σ(top-m sections)`.
    pub collapse_beta: f64,

    /// m in the collapse formula.
    pub collapse_top_m: usize,
}

impl Default for ScopeFilter {
    fn default() -> Self {
        Self {
            scope: Scope::Mixed,
            max_heading_level: None,
            max_tree_hops: None,
            edge_types: EdgeKind::ALL.to_vec(),
            per_doc_section_cap: None,
            min_section_words: None,
            collapse_to_doc: false,
            collapse_beta: 0.3,
            collapse_top_m: 3,
        }
    }
}

/// The narrowed graph view a query ranks over: candidate snapshot indices plus
/// the permitted edge kinds.
#[derive(Debug, Clone)]
pub struct ActiveView {
    members: Vec<usize>,
    member_set: Vec<bool>,
    edge_kinds: Vec<EdgeKind>,
}

impl ActiveView {
    /// Snapshot indices in the view, ascending.
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.member_set.get(idx).copied().unwrap_or(false)
    }

    pub fn edge_kinds(&self) -> &[EdgeKind] {
        &self.edge_kinds
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Narrow the snapshot to the candidates permitted by `filter`.
///
/// `seed_ids` anchor the `max_tree_hops` bound; the hop walk runs over
/// structural edges of the full snapshot so that filtered-out intermediate
/// sections still connect their children.
pub fn build_view(snapshot: &GraphSnapshot, filter: &ScopeFilter, seed_ids: &[NodeId]) -> ActiveView {
    let n = snapshot.node_count();
    let mut eligible = vec![false; n];

    for (idx, node) in snapshot.nodes().iter().enumerate() {
        let kind_ok = match (filter.scope, node.kind) {
            (Scope::Mixed, _) => true,
            (Scope::DocOnly, NodeKind::Document) => true,
            (Scope::SectionOnly, NodeKind::Section) => true,
            _ => false,
        };
        if !kind_ok {
            continue;
        }
        if node.kind == NodeKind::Section {
            if let (Some(max_level), Some(depth)) = (filter.max_heading_level, node.depth) {
                if depth > max_level {
                    continue;
                }
            }
            if let Some(min_words) = filter.min_section_words {
                if node.word_count < min_words {
                    continue;
                }
            }
        }
        eligible[idx] = true;
    }

    if let Some(max_hops) = filter.max_tree_hops {
        let reachable = structural_reach(snapshot, seed_ids, max_hops);
        for idx in 0..n {
            eligible[idx] = eligible[idx] && reachable[idx];
        }
    }

    let members: Vec<usize> = (0..n).filter(|&idx| eligible[idx]).collect();
    log::debug!(
        "Active view: {} of {} nodes, {} edge kinds",
        members.len(),
        n,
        filter.edge_types.len()
    );

    ActiveView {
        members,
        member_set: eligible,
        edge_kinds: filter.edge_types.clone(),
    }
}

/// Nodes within `max_hops` structural steps (either direction) of any seed.
fn structural_reach(snapshot: &GraphSnapshot, seed_ids: &[NodeId], max_hops: usize) -> Vec<bool> {
    let n = snapshot.node_count();
    let mut reachable = vec![false; n];
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

    for id in seed_ids {
        if let Some(idx) = snapshot.index_of(*id) {
            if !reachable[idx] {
                reachable[idx] = true;
                queue.push_back((idx, 0));
            }
        }
    }

    while let Some((idx, hops)) = queue.pop_front() {
        if hops >= max_hops {
            continue;
        }
        let step = snapshot
            .out_edges(idx)
            .iter()
            .chain(snapshot.in_edges(idx));
        for edge in step {
            if edge.kind != EdgeKind::Structural {
                continue;
            }
            if !reachable[edge.peer] {
                reachable[edge.peer] = true;
                queue.push_back((edge.peer, hops + 1));
            }
        }
    }

    reachable
}

/// Keep at most `cap` sections per document, preserving rank order. Documents
/// are unaffected.
pub fn apply_section_cap(
    ranked: Vec<(NodeId, f64)>,
    snapshot: &GraphSnapshot,
    cap: usize,
) -> Vec<(NodeId, f64)> {
    let mut kept_per_doc: std::collections::HashMap<NodeId, usize> =
        std::collections::HashMap::new();
    ranked
        .into_iter()
        .filter(|(id, _)| {
            let Some(idx) = snapshot.index_of(*id) else {
                return false;
            };
            let node = snapshot.node(idx);
            if node.kind != NodeKind::Section {
                return true;
            }
            let count = kept_per_doc.entry(node.doc).or_insert(0);
            if *count < cap {
                *count += 1;
                true
            } else {
                false
            }
        })
        .collect()
}

/// Aggregate section scores into per-document scores:
/// `score_doc = max(section_scores) + β · Σ(top-m section_scores)`.
///
/// The aggregate runs over section scores only. A document node's own
/// diffusion score is kept as a floor, so a document ranked directly (with no
/// ranked sections) still appears. Output is sorted (score desc, id asc); the
/// caller truncates to top-k afterwards, so a large section pool cannot
/// shrink the result below the requested size.
pub fn collapse_to_docs(
    ranked: &[(NodeId, f64)],
    snapshot: &GraphSnapshot,
    beta: f64,
    top_m: usize,
) -> Vec<(NodeId, f64)> {
    let mut sections: std::collections::BTreeMap<NodeId, Vec<f64>> =
        std::collections::BTreeMap::new();
    let mut own_scores: std::collections::BTreeMap<NodeId, f64> =
        std::collections::BTreeMap::new();
    for (id, score) in ranked {
        let Some(idx) = snapshot.index_of(*id) else {
            continue;
        };
        let node = snapshot.node(idx);
        if node.kind == NodeKind::Section {
            sections.entry(node.doc).or_default().push(*score);
        } else {
            own_scores.insert(node.doc, *score);
        }
    }

    let mut per_doc: std::collections::BTreeMap<NodeId, f64> = sections
        .into_iter()
        .map(|(doc, mut scores)| {
            scores.sort_unstable_by(|a, b| b.total_cmp(a));
            let max = scores[0];
            let tail: f64 = scores.iter().take(top_m).sum();
            (doc, max + beta * tail)
        })
        .collect();
    for (doc, own) in own_scores {
        let aggregate = per_doc.entry(doc).or_insert(0.0);
        if own > *aggregate {
            *aggregate = own;
        }
    }

    let mut collapsed: Vec<(NodeId, f64)> = per_doc.into_iter().collect();
    collapsed.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use relgraph_store::{DocGraph, Edge, EdgeGate, Node};

    fn snapshot() -> GraphSnapshot {
        let mut g = DocGraph::new();
        g.upsert_node(Node::document(NodeId(1), 500));
        g.upsert_node(Node::section(NodeId(2), NodeId(1), 1, 200));
        g.upsert_node(Node::section(NodeId(3), NodeId(2), 2, 8));
        g.upsert_node(Node::section(NodeId(4), NodeId(2), 3, 90));
        g.upsert_node(Node::document(NodeId(10), 300));
        g.upsert_edge(NodeId(1), NodeId(2), Edge::structural(1.0))
            .unwrap();
        g.upsert_edge(NodeId(2), NodeId(3), Edge::structural(1.0))
            .unwrap();
        g.upsert_edge(NodeId(2), NodeId(4), Edge::structural(1.0))
            .unwrap();
        g.upsert_edge(NodeId(4), NodeId(10), Edge::semantic(1.0))
            .unwrap();
        GraphSnapshot::compile(&g, &EdgeGate::default(), 0, 1)
    }

    fn ids(snapshot: &GraphSnapshot, view: &ActiveView) -> Vec<NodeId> {
        view.members()
            .iter()
            .map(|&idx| snapshot.node(idx).id)
            .collect()
    }

    #[test]
    fn scope_restricts_node_kinds() {
        let snap = snapshot();
        let docs = build_view(
            &snap,
            &ScopeFilter {
                scope: Scope::DocOnly,
                ..ScopeFilter::default()
            },
            &[NodeId(1)],
        );
        assert_eq!(ids(&snap, &docs), vec![NodeId(1), NodeId(10)]);
    }

    #[test]
    fn word_and_depth_filters_drop_sections() {
        let snap = snapshot();
        let view = build_view(
            &snap,
            &ScopeFilter {
                min_section_words: Some(50),
                max_heading_level: Some(2),
                ..ScopeFilter::default()
            },
            &[NodeId(1)],
        );
        // Section 3 is too short, section 4 too deep.
        assert_eq!(ids(&snap, &view), vec![NodeId(1), NodeId(2), NodeId(10)]);
    }

    #[test]
    fn tree_hops_bound_distance_from_seeds() {
        let snap = snapshot();
        let view = build_view(
            &snap,
            &ScopeFilter {
                max_tree_hops: Some(1),
                ..ScopeFilter::default()
            },
            &[NodeId(1)],
        );
        // One structural hop from doc 1 reaches only section 2; doc 10 hangs
        // off a semantic edge and is out of structural reach.
        assert_eq!(ids(&snap, &view), vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn section_cap_limits_per_document() {
        let snap = snapshot();
        let ranked = vec![
            (NodeId(2), 0.5),
            (NodeId(4), 0.3),
            (NodeId(3), 0.2),
            (NodeId(10), 0.1),
        ];
        let capped = apply_section_cap(ranked, &snap, 2);
        assert_eq!(
            capped,
            vec![(NodeId(2), 0.5), (NodeId(4), 0.3), (NodeId(10), 0.1)]
        );
    }

    #[test]
    fn collapse_applies_formula_and_orders() {
        let snap = snapshot();
        let ranked = vec![(NodeId(2), 0.4), (NodeId(4), 0.2), (NodeId(10), 0.5)];
        let collapsed = collapse_to_docs(&ranked, &snap, 0.5, 3);

        // Doc 1 aggregates its sections: max 0.4 + 0.5 * (0.4 + 0.2) = 0.7.
        // Doc 10 has no ranked sections and keeps its own score untouched.
        assert_eq!(collapsed[0].0, NodeId(1));
        assert!((collapsed[0].1 - 0.7).abs() < 1e-12);
        assert_eq!(collapsed[1].0, NodeId(10));
        assert!((collapsed[1].1 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn collapse_ignores_doc_score_when_sections_dominate() {
        let snap = snapshot();
        // Doc 1 ranks both directly and through a section; only the section
        // aggregate counts once it exceeds the document's own score.
        let ranked = vec![(NodeId(1), 0.1), (NodeId(2), 0.4)];
        let collapsed = collapse_to_docs(&ranked, &snap, 0.5, 3);

        assert_eq!(collapsed, vec![(NodeId(1), 0.4 + 0.5 * 0.4)]);
    }
}
