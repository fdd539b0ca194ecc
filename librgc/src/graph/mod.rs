//! Layer graph storage.
//!
//! The registry's image layers form a directed acyclic graph: one node per
//! layer, one edge from each layer to its parent. Nodes carry the tag and
//! repository annotations plus the reachability count the sweep engine
//! works from. The graph persists as node-link JSON so a scan can be
//! saved once and swept or queried many times.

use crate::error::{Result, RgcError};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::path::Path;


/// A single image layer with its annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerNode {
    /// Content-addressed layer id.
    pub id: String,
    /// `"<repo>:<tag>"` pairs whose head layer this is.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Repositories whose index includes this layer.
    #[serde(default)]
    pub repos: Vec<String>,
    /// Number of (repository, tag) pairs that can reach this layer.
    #[serde(rename = "ref", default)]
    pub refs: u64,
}

impl LayerNode {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            tags: Vec::new(),
            repos: Vec::new(),
            refs: 0,
        }
    }
}

/// Node-link serialization of the graph.
#[derive(Serialize, Deserialize)]
struct NodeLink {
    directed: bool,
    nodes: Vec<LayerNode>,
    links: Vec<Link>,
}

#[derive(Serialize, Deserialize)]
struct Link {
    source: String,
    target: String,
}

/// The layer graph: a directed graph of [`LayerNode`]s with parent edges.
#[derive(Debug, Default)]
pub struct LayerGraph {
    graph: DiGraph<LayerNode, ()>,
    indices: HashMap<String, NodeIndex>,
}

impl LayerGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node with default annotations.
    ///
    /// Inserting an id that already exists is a no-op: existing
    /// annotations are preserved.
    pub fn add_node(&mut self, id: &str) {
        if !self.indices.contains_key(id) {
            let idx = self.graph.add_node(LayerNode::new(id));
            self.indices.insert(id.to_string(), idx);
        }
    }

    /// Inserts an ancestry path: missing nodes get default annotations and
    /// every consecutive pair becomes a child-to-parent edge.
    ///
    /// Duplicate edges collapse.
    pub fn add_path(&mut self, ids: &[String]) {
        for id in ids {
            self.add_node(id);
        }
        for pair in ids.windows(2) {
            let child = self.indices[&pair[0]];
            let parent = self.indices[&pair[1]];
            self.graph.update_edge(child, parent, ());
        }
    }

    /// Returns the node for `id`, if present.
    pub fn node(&self, id: &str) -> Option<&LayerNode> {
        self.indices.get(id).map(|&idx| &self.graph[idx])
    }

    /// Returns a mutable reference to the node for `id`, if present.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut LayerNode> {
        match self.indices.get(id).copied() {
            Some(idx) => Some(&mut self.graph[idx]),
            None => None,
        }
    }

    /// Whether `id` exists in the graph.
    pub fn contains(&self, id: &str) -> bool {
        self.indices.contains_key(id)
    }

    /// Iterates all nodes in arbitrary order.
    pub fn nodes(&self) -> impl Iterator<Item = &LayerNode> {
        self.graph.node_weights()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether a child-to-parent edge exists.
    pub fn has_edge(&self, child: &str, parent: &str) -> bool {
        match (self.indices.get(child), self.indices.get(parent)) {
            (Some(&c), Some(&p)) => self.graph.find_edge(c, p).is_some(),
            _ => false,
        }
    }

    /// Preorder depth-first traversal from `source` along parent edges.
    ///
    /// Returns an empty list when `source` is unknown.
    pub fn dfs(&self, source: &str) -> Vec<String> {
        let Some(&start) = self.indices.get(source) else {
            return Vec::new();
        };

        let mut visited = HashSet::new();
        let mut stack = vec![start];
        let mut order = Vec::new();

        while let Some(idx) = stack.pop() {
            if !visited.insert(idx) {
                continue;
            }
            order.push(self.graph[idx].id.clone());
            // Reverse push keeps neighbor visit order equal to edge
            // insertion order.
            let mut parents: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .collect();
            parents.reverse();
            for parent in parents {
                if !visited.contains(&parent) {
                    stack.push(parent);
                }
            }
        }

        order
    }

    /// Returns the subgraph reachable from `source`, annotations included.
    pub fn dfs_tree(&self, source: &str) -> LayerGraph {
        let reachable = self.dfs(source);
        let mut sub = LayerGraph::new();

        for id in &reachable {
            let node = self.node(id).expect("dfs returned unknown node");
            let idx = sub.graph.add_node(node.clone());
            sub.indices.insert(id.clone(), idx);
        }
        for id in &reachable {
            let from = self.indices[id];
            for parent in self.graph.neighbors_directed(from, Direction::Outgoing) {
                let parent_id = &self.graph[parent].id;
                if let Some(&target) = sub.indices.get(parent_id) {
                    sub.graph.update_edge(sub.indices[id], target, ());
                }
            }
        }

        sub
    }

    /// Topologically sorts the graph, descendants before ancestors.
    ///
    /// With a subset, the result is the restriction of the full-graph
    /// order to that subset. Ties break lexicographically by id, so the
    /// order is stable across runs of the same graph. Fails with a graph
    /// error if the graph contains a cycle.
    pub fn topo_sort(&self, subset: Option<&HashSet<String>>) -> Result<Vec<String>> {
        let mut in_degree: HashMap<NodeIndex, usize> = HashMap::new();
        for idx in self.graph.node_indices() {
            in_degree.insert(
                idx,
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .count(),
            );
        }

        let mut ready: BinaryHeap<Reverse<(String, NodeIndex)>> = in_degree
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&idx, _)| Reverse((self.graph[idx].id.clone(), idx)))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((id, idx))) = ready.pop() {
            order.push(id);
            for parent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let deg = in_degree.get_mut(&parent).expect("unknown node");
                *deg -= 1;
                if *deg == 0 {
                    ready.push(Reverse((self.graph[parent].id.clone(), parent)));
                }
            }
        }

        if order.len() != self.graph.node_count() {
            return Err(RgcError::graph(
                "Layer graph contains a cycle; the registry ancestry is inconsistent",
            ));
        }

        match subset {
            Some(keep) => Ok(order.into_iter().filter(|id| keep.contains(id)).collect()),
            None => Ok(order),
        }
    }

    /// Serializes the graph to pretty-printed node-link JSON.
    pub fn to_json(&self) -> Result<String> {
        let mut nodes: Vec<LayerNode> = self.graph.node_weights().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut links: Vec<Link> = self
            .graph
            .edge_indices()
            .map(|e| {
                let (from, to) = self.graph.edge_endpoints(e).expect("edge without endpoints");
                Link {
                    source: self.graph[from].id.clone(),
                    target: self.graph[to].id.clone(),
                }
            })
            .collect();
        links.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));

        let doc = NodeLink {
            directed: true,
            nodes,
            links,
        };
        serde_json::to_string_pretty(&doc)
            .map_err(|e| RgcError::parse_with_source("Failed to serialize graph", e))
    }

    /// Deserializes a graph from node-link JSON.
    pub fn from_json(s: &str) -> Result<Self> {
        let doc: NodeLink = serde_json::from_str(s)
            .map_err(|e| RgcError::parse_with_source("Failed to parse graph JSON", e))?;

        let mut graph = LayerGraph::new();
        for node in doc.nodes {
            if graph.indices.contains_key(&node.id) {
                return Err(RgcError::parse(format!(
                    "Duplicate node id in graph JSON: {}",
                    node.id
                )));
            }
            let id = node.id.clone();
            let idx = graph.graph.add_node(node);
            graph.indices.insert(id, idx);
        }
        for link in doc.links {
            let (Some(&from), Some(&to)) = (
                graph.indices.get(&link.source),
                graph.indices.get(&link.target),
            ) else {
                return Err(RgcError::parse(format!(
                    "Graph JSON link references unknown node: {} -> {}",
                    link.source, link.target
                )));
            };
            graph.graph.update_edge(from, to, ());
        }

        Ok(graph)
    }

    /// Loads a graph from a node-link JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RgcError::state_with_source(
                format!("Failed to read graph file {}", path.display()),
                e,
            )
        })?;
        Self::from_json(&contents)
    }

    /// Saves the graph to a node-link JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| {
            RgcError::state_with_source(
                format!("Failed to write graph file {}", path.display()),
                e,
            )
        })
    }
}

impl PartialEq for LayerGraph {
    /// Labeled-graph equality: same nodes with the same annotations and
    /// the same edge set.
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() || self.edge_count() != other.edge_count() {
            return false;
        }
        for node in self.nodes() {
            if other.node(&node.id) != Some(node) {
                return false;
            }
        }
        self.graph.edge_indices().all(|e| {
            let (from, to) = self.graph.edge_endpoints(e).expect("edge without endpoints");
            other.has_edge(&self.graph[from].id, &self.graph[to].id)
        })
    }
}
