//! Graph node and edge types for the three views.
//!
//! A build produces a [`Graph`] whose edges only reference node ids present
//! in the same node list. [`GraphAssembler`] enforces node and edge
//! de-duplication while keeping first-insertion order, which keeps output
//! deterministic for identical input.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::taxonomy::Container;

/// Anything with a stable node id.
pub trait GraphNode {
    fn id(&self) -> &str;
}

/// A directed edge between two nodes of the same build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub source_node_id: String,
    pub target_node_id: String,
    /// Owning patient; `None` for structural edges shared by many patients
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub relationship_kind: String,
}

impl GraphEdge {
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relationship_kind: impl Into<String>,
    ) -> Self {
        Self {
            source_node_id: source.into(),
            target_node_id: target.into(),
            patient_id: None,
            relationship_kind: relationship_kind.into(),
        }
    }

    #[must_use]
    pub fn for_patient(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }
}

/// Node/edge collection produced by one build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Graph<N> {
    pub nodes: Vec<N>,
    pub edges: Vec<GraphEdge>,
}

impl<N> Default for Graph<N> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }
}

impl<N: GraphNode> Graph<N> {
    /// Find a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&N> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    /// All node ids.
    #[must_use]
    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(GraphNode::id).collect()
    }

    /// Edges whose source or target is not a node of this graph.
    #[must_use]
    pub fn dangling_edges(&self) -> Vec<&GraphEdge> {
        let ids = self.node_ids();
        self.edges
            .iter()
            .filter(|e| {
                !ids.contains(e.source_node_id.as_str()) || !ids.contains(e.target_node_id.as_str())
            })
            .collect()
    }

    /// Edges leaving `id`.
    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.source_node_id == id)
    }

    /// Edges entering `id`.
    pub fn edges_to<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.target_node_id == id)
    }
}

/// Insertion-ordered, de-duplicating graph builder.
#[derive(Debug)]
pub struct GraphAssembler<N> {
    nodes: Vec<N>,
    index: HashMap<String, usize>,
    edges: Vec<GraphEdge>,
    seen_edges: HashSet<GraphEdge>,
}

impl<N> Default for GraphAssembler<N> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            seen_edges: HashSet::new(),
        }
    }
}

impl<N: GraphNode> GraphAssembler<N> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the node unless one with the same id exists. Returns a handle to
    /// the stored node either way.
    pub fn ensure_node(&mut self, node: N) -> &mut N {
        let pos = match self.index.get(node.id()) {
            Some(&pos) => pos,
            None => {
                let pos = self.nodes.len();
                self.index.insert(node.id().to_string(), pos);
                self.nodes.push(node);
                pos
            }
        };
        &mut self.nodes[pos]
    }

    /// Mutable access to an existing node.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut N> {
        let pos = *self.index.get(id)?;
        self.nodes.get_mut(pos)
    }

    /// Add the edge unless an identical one exists. Returns whether it was new.
    pub fn add_edge(&mut self, edge: GraphEdge) -> bool {
        if self.seen_edges.contains(&edge) {
            return false;
        }
        self.seen_edges.insert(edge.clone());
        self.edges.push(edge);
        true
    }

    #[must_use]
    pub fn finish(self) -> Graph<N> {
        Graph {
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlatNodeKind {
    Patient,
    Value,
}

/// Node of the flat (bipartite) view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatNode {
    pub id: String,
    pub display_name: String,
    pub kind: FlatNodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
    /// Degree of the node
    pub size: usize,
}

impl GraphNode for FlatNode {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TreeNodeKind {
    Root,
    Gender,
    AgeGroup,
    Attribute,
    Patient,
}

/// Node of the hierarchy view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: String,
    pub display_name: String,
    pub kind: TreeNodeKind,
    /// Single parent for every structural node except the root. Patient
    /// leaves hang off several attribute nodes and carry no parent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
}

impl GraphNode for TreeNode {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChainNodeKind {
    Root,
    Attribute,
}

/// Node of the chain view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainNode {
    pub id: String,
    pub kind: ChainNodeKind,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
}

impl GraphNode for ChainNode {
    fn id(&self) -> &str {
        &self.id
    }
}
