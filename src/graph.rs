//! In-memory graph model
//!
//! Nodes live in one owned `Vec` addressed by dense index (insertion order).
//! External identifiers are mapped to dense indices through a lookup table,
//! and adjacency is stored as external identifiers so edges may name nodes
//! that are added later, or never. The layout compiler resolves them.

use std::collections::HashMap;

use tracing::debug;

use crate::types::Vec3;

/// Weight recorded for an unweighted edge
pub const DEFAULT_EDGE_WEIGHT: f32 = 1.0;

/// One entry of a node's adjacency list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// External identifier of the neighbor
    pub id: u32,
    /// Accumulated edge strength (always positive)
    pub weight: f32,
}

/// A graph vertex
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// External identifier
    pub id: u32,
    pub position: Vec3,
    pub neighbors: Vec<Neighbor>,
    /// Neighbor id -> index into `neighbors`
    slots: HashMap<u32, usize>,
}

impl Node {
    fn new(id: u32, position: Vec3) -> Self {
        Self {
            id,
            position,
            neighbors: Vec::new(),
            slots: HashMap::new(),
        }
    }

    fn link(&mut self, neighbor: u32, weight: f32) {
        match self.slots.get(&neighbor) {
            // Repeated references strengthen the existing edge
            Some(&slot) => self.neighbors[slot].weight += weight,
            None => {
                self.slots.insert(neighbor, self.neighbors.len());
                self.neighbors.push(Neighbor {
                    id: neighbor,
                    weight,
                });
            }
        }
    }
}

/// An ordered collection of nodes with undirected, optionally weighted edges
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    index: HashMap<u32, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
            index: HashMap::with_capacity(nodes),
        }
    }

    /// Add a node and return its dense index.
    ///
    /// Adding an identifier that already exists moves that node to `position`
    /// and keeps its dense index and edges.
    pub fn add_node(&mut self, id: u32, position: Vec3) -> usize {
        if let Some(&dense) = self.index.get(&id) {
            debug!(id, "node already present, updating position");
            self.nodes[dense].position = position;
            return dense;
        }
        let dense = self.nodes.len();
        self.nodes.push(Node::new(id, position));
        self.index.insert(id, dense);
        dense
    }

    /// Add an undirected edge of unit weight
    pub fn add_edge(&mut self, a: u32, b: u32) -> bool {
        self.add_weighted_edge(a, b, DEFAULT_EDGE_WEIGHT)
    }

    /// Add an undirected edge with the given strength.
    ///
    /// The edge is recorded on every endpoint present in the graph; an
    /// endpoint that is missing leaves a dangling reference on the other one,
    /// which the layout compiler drops. Self-loops and non-positive or
    /// non-finite weights are ignored. Returns whether anything was recorded.
    pub fn add_weighted_edge(&mut self, a: u32, b: u32, weight: f32) -> bool {
        if a == b {
            debug!(node = a, "ignoring self-loop");
            return false;
        }
        if !(weight > 0.0 && weight.is_finite()) {
            debug!(a, b, weight, "ignoring edge with invalid weight");
            return false;
        }

        let mut recorded = false;
        if let Some(&ia) = self.index.get(&a) {
            self.nodes[ia].link(b, weight);
            recorded = true;
        }
        if let Some(&ib) = self.index.get(&b) {
            self.nodes[ib].link(a, weight);
            recorded = true;
        }
        if !recorded {
            debug!(a, b, "ignoring edge between unknown nodes");
        }
        recorded
    }

    /// Dense index of an external identifier
    pub fn dense_index(&self, id: u32) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn node(&self, id: u32) -> Option<&Node> {
        self.dense_index(id).map(|i| &self.nodes[i])
    }

    /// Nodes in dense-index order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// External identifiers in dense-index order
    pub fn node_ids(&self) -> Vec<u32> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    /// Positions in dense-index order
    pub fn positions(&self) -> Vec<Vec3> {
        self.nodes.iter().map(|n| n.position).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total adjacency entries, counting each undirected edge from both ends
    pub fn neighbor_entries(&self) -> usize {
        self.nodes.iter().map(|n| n.neighbors.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Graph {
        let mut graph = Graph::new();
        graph.add_node(10, Vec3::new(0.0, 0.0, 0.0));
        graph.add_node(20, Vec3::new(1.0, 0.0, 0.0));
        graph.add_node(30, Vec3::new(0.0, 1.0, 0.0));
        graph.add_edge(10, 20);
        graph.add_edge(20, 30);
        graph.add_edge(30, 10);
        graph
    }

    #[test]
    fn dense_indices_follow_insertion_order() {
        let graph = triangle();
        assert_eq!(graph.dense_index(10), Some(0));
        assert_eq!(graph.dense_index(20), Some(1));
        assert_eq!(graph.dense_index(30), Some(2));
        assert_eq!(graph.node_ids(), vec![10, 20, 30]);
    }

    #[test]
    fn edges_are_recorded_on_both_endpoints() {
        let graph = triangle();
        let ids: Vec<u32> = graph
            .node(20)
            .unwrap()
            .neighbors
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![10, 30]);
        assert_eq!(graph.neighbor_entries(), 6);
    }

    #[test]
    fn repeated_edges_accumulate_weight() {
        let mut graph = triangle();
        graph.add_edge(10, 20);
        graph.add_weighted_edge(20, 10, 0.5);

        let a = graph.node(10).unwrap();
        assert_eq!(a.neighbors.len(), 2);
        assert_eq!(a.neighbors[0], Neighbor { id: 20, weight: 2.5 });
        assert_eq!(graph.node(20).unwrap().neighbors[0].weight, 2.5);
    }

    #[test]
    fn self_loops_and_bad_weights_are_ignored() {
        let mut graph = triangle();
        assert!(!graph.add_edge(10, 10));
        assert!(!graph.add_weighted_edge(10, 20, 0.0));
        assert!(!graph.add_weighted_edge(10, 20, -1.0));
        assert!(!graph.add_weighted_edge(10, 20, f32::NAN));
        assert_eq!(graph.neighbor_entries(), 6);
    }

    #[test]
    fn edge_to_missing_node_leaves_dangling_reference() {
        let mut graph = triangle();
        assert!(graph.add_edge(10, 99));
        assert!(!graph.add_edge(98, 99));
        assert_eq!(graph.node(10).unwrap().neighbors.len(), 3);
    }

    #[test]
    fn re_adding_node_updates_position_only() {
        let mut graph = triangle();
        let dense = graph.add_node(20, Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(dense, 1);
        assert_eq!(graph.len(), 3);
        let node = graph.node(20).unwrap();
        assert_eq!(node.position, Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(node.neighbors.len(), 2);
    }

    #[test]
    fn hub_with_repeated_edges_keeps_one_entry_per_leaf() {
        let leaves = 5_000;
        let mut graph = Graph::with_capacity(leaves as usize + 1);
        graph.add_node(0, Vec3::ZERO);
        for leaf in 1..=leaves {
            graph.add_node(leaf, Vec3::new(leaf as f32, 0.0, 0.0));
        }
        for _ in 0..2 {
            for leaf in 1..=leaves {
                graph.add_edge(0, leaf);
            }
        }

        let hub = graph.node(0).unwrap();
        assert_eq!(hub.neighbors.len(), leaves as usize);
        assert!(hub.neighbors.iter().all(|n| n.weight == 2.0));
        assert_eq!(hub.neighbors[41], Neighbor { id: 42, weight: 2.0 });
        assert_eq!(graph.node(42).unwrap().neighbors, vec![Neighbor { id: 0, weight: 2.0 }]);
    }
}
