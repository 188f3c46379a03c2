//! Layout compiler: graph → flat CSR-style buffers
//!
//! Node adjacency is flattened into one contiguous index array so a kernel
//! lane for node `i` can walk its neighbors without chasing pointers:
//!
//! ```text
//! node | neighbors          edge_block_length = [3, 5, 2]
//!  0   | 12 13 17           edge_block_start  = [0, 3, 8]
//!  1   | 2 5 6 8 20         edge_indices      = [12 13 17 2 5 6 8 20 0 1]
//!  2   | 0 1
//! ```
//!
//! All arrays use `u32`/`f32` so they can be uploaded to a GPU as-is.

use std::ops::Range;

use tracing::debug;

use crate::config::WeightNormalization;
use crate::graph::Graph;
use crate::types::Vec3;

/// Flattened, kernel-ready form of a [`Graph`]
#[derive(Debug, Clone, PartialEq)]
pub struct FlatLayout {
    /// One position per node, by dense index
    pub positions: Vec<Vec3>,
    /// Offset of each node's block in `edge_indices`
    pub edge_block_start: Vec<u32>,
    /// Number of neighbors in each node's block
    pub edge_block_length: Vec<u32>,
    /// Neighbor dense indices, concatenated in node order
    pub edge_indices: Vec<u32>,
    /// Normalized strength of each entry in `edge_indices`
    pub edge_weights: Vec<f32>,
}

impl FlatLayout {
    pub fn node_count(&self) -> usize {
        self.positions.len()
    }

    pub fn edge_entry_count(&self) -> usize {
        self.edge_indices.len()
    }

    /// Range of node `i`'s block in `edge_indices`
    pub fn block_range(&self, i: usize) -> Range<usize> {
        let start = self.edge_block_start[i] as usize;
        start..start + self.edge_block_length[i] as usize
    }

    /// Neighbor dense indices of node `i`
    pub fn neighbors(&self, i: usize) -> &[u32] {
        &self.edge_indices[self.block_range(i)]
    }

    /// Edge weights of node `i`, parallel to [`neighbors`](Self::neighbors)
    pub fn weights(&self, i: usize) -> &[f32] {
        &self.edge_weights[self.block_range(i)]
    }
}

/// Flatten `graph` into a [`FlatLayout`].
///
/// Dense indices are insertion order. Neighbor references to identifiers not
/// in the graph are skipped. The result depends only on graph content and
/// insertion order.
pub fn compile(graph: &Graph, normalization: WeightNormalization) -> FlatLayout {
    let n = graph.len();
    let mut layout = FlatLayout {
        positions: Vec::with_capacity(n),
        edge_block_start: Vec::with_capacity(n),
        edge_block_length: Vec::with_capacity(n),
        edge_indices: Vec::with_capacity(graph.neighbor_entries()),
        edge_weights: Vec::with_capacity(graph.neighbor_entries()),
    };

    let mut dropped = 0usize;
    for node in graph.nodes() {
        let start = layout.edge_indices.len();
        for neighbor in &node.neighbors {
            let Some(j) = graph.dense_index(neighbor.id) else {
                dropped += 1;
                continue;
            };
            layout.edge_indices.push(j as u32);
            layout.edge_weights.push(normalization.apply(neighbor.weight));
        }
        layout.positions.push(node.position);
        layout.edge_block_start.push(start as u32);
        layout
            .edge_block_length
            .push((layout.edge_indices.len() - start) as u32);
    }

    if dropped > 0 {
        debug!(dropped, "skipped dangling edge references");
    }
    debug!(
        nodes = layout.node_count(),
        edge_entries = layout.edge_entry_count(),
        "compiled layout"
    );
    layout
}
