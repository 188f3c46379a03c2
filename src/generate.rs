//! Random graph synthesis
//!
//! Node 0 sits at the origin; every other node is placed uniformly in an
//! axis-aligned cube centered on the origin whose side grows with the node
//! count. Candidate edges pick two distinct endpoints at random and are
//! deduplicated as unordered pairs through [`combine_unordered`].

use std::collections::HashSet;

use rand::Rng;
use tracing::debug;

use crate::graph::Graph;
use crate::pairing::{combine_unordered, reverse};
use crate::types::Vec3;

/// Smallest cube side used for placement
pub const MIN_CUBE_SIDE: f32 = 10.0;

/// Nodes per unit of cube side once the graph outgrows [`MIN_CUBE_SIDE`]
pub const NODES_PER_SIDE_UNIT: f32 = 100.0;

/// A synthesized graph and the distinct edges it was built from
#[derive(Debug, Clone)]
pub struct RandomGraph {
    pub graph: Graph,
    /// Distinct undirected edges as `(min, max)` node ids, in first-draw order
    pub edges: Vec<(u32, u32)>,
}

/// Side of the placement cube for `nodes` nodes
pub fn cube_side(nodes: u32) -> f32 {
    (nodes as f32 / NODES_PER_SIDE_UNIT).max(MIN_CUBE_SIDE)
}

/// Build a graph of `nodes` nodes from `candidate_edges` random draws.
///
/// Draws that pick the same endpoint twice or repeat an earlier pair are
/// discarded, so the result may hold fewer than `candidate_edges` edges.
/// With fewer than two nodes no edge can be drawn.
pub fn generate<R: Rng + ?Sized>(nodes: u32, candidate_edges: u32, rng: &mut R) -> RandomGraph {
    let side = cube_side(nodes);
    let mut graph = Graph::with_capacity(nodes as usize);
    for id in 0..nodes {
        let position = if id == 0 {
            Vec3::ZERO
        } else {
            Vec3::new(
                rng.r#gen::<f32>() * side - side * 0.5,
                rng.r#gen::<f32>() * side - side * 0.5,
                rng.r#gen::<f32>() * side - side * 0.5,
            )
        };
        graph.add_node(id, position);
    }

    let mut seen = HashSet::new();
    let mut order = Vec::new();
    if nodes >= 2 {
        for _ in 0..candidate_edges {
            let a = rng.gen_range(0..nodes);
            let b = rng.gen_range(0..nodes);
            if a == b {
                continue;
            }
            let code = combine_unordered(a, b);
            if seen.insert(code) {
                order.push(code);
            }
        }
    }

    let edges: Vec<(u32, u32)> = order.into_iter().map(reverse).collect();
    for &(a, b) in &edges {
        graph.add_edge(a, b);
    }

    debug!(
        nodes,
        candidate_edges,
        distinct_edges = edges.len(),
        side,
        "generated random graph"
    );
    RandomGraph { graph, edges }
}
