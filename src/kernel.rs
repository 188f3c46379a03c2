//! Per-node force kernel
//!
//! One evaluation per node per iteration. Every evaluation reads the same
//! position snapshot and writes only its own node's next position, so all
//! nodes can be evaluated in parallel.
//!
//! The GPU backend runs the same computation in WGSL (see `gpu::shaders`);
//! the two must stay in sync.

use crate::config::SimulationConfig;
use crate::layout::FlatLayout;
use crate::types::Vec3;

/// Physical constants consumed by the kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceParams {
    /// Hooke's-law constant (< 1)
    pub spring_constant: f32,
    /// Coulomb's-law constant
    pub repulsive_constant: f32,
    /// Optional cap on displacement magnitude per iteration
    pub max_displacement: Option<f32>,
}

impl From<&SimulationConfig> for ForceParams {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            spring_constant: config.spring_constant,
            repulsive_constant: config.repulsive_constant,
            max_displacement: config.max_displacement,
        }
    }
}

/// Net displacement of node `i` for one iteration.
///
/// Sums a spring pull `-k * w * d * dir` over the node's edges and an
/// inverse-square push `e / d² * dir` from every other node. Coincident
/// nodes make `dir` NaN; the whole displacement is then zero for this step.
pub fn node_displacement(
    i: usize,
    layout: &FlatLayout,
    positions: &[Vec3],
    params: &ForceParams,
) -> Vec3 {
    let p_i = positions[i];
    let mut displacement = Vec3::ZERO;

    // Hooke's law: pull along each edge, proportional to its length
    for (&j, &weight) in layout.neighbors(i).iter().zip(layout.weights(i)) {
        let v = p_i - positions[j as usize];
        let distance = v.length();
        let direction = v * (1.0 / distance);
        displacement -= direction * (params.spring_constant * weight * distance);
    }

    // Coulomb's law: every other node pushes away, O(n) per node
    for (j, &p_j) in positions.iter().enumerate() {
        if j == i {
            continue;
        }
        let v = p_i - p_j;
        let distance = v.length();
        let direction = v * (1.0 / distance);
        displacement += direction * (params.repulsive_constant / (distance * distance));
    }

    if displacement.is_nan() {
        return Vec3::ZERO;
    }

    match params.max_displacement {
        Some(max) => {
            let length = displacement.length();
            if length > max {
                displacement * (max / length)
            } else {
                displacement
            }
        }
        None => displacement,
    }
}

/// Position of node `i` after one iteration
pub fn next_position(
    i: usize,
    layout: &FlatLayout,
    positions: &[Vec3],
    params: &ForceParams,
) -> Vec3 {
    positions[i] + node_displacement(i, layout, positions, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeightNormalization;
    use crate::graph::Graph;
    use crate::layout::compile;

    fn params(spring: f32, repulsive: f32) -> ForceParams {
        ForceParams {
            spring_constant: spring,
            repulsive_constant: repulsive,
            max_displacement: None,
        }
    }

    fn pair(a: Vec3, b: Vec3, linked: bool) -> FlatLayout {
        let mut graph = Graph::new();
        graph.add_node(0, a);
        graph.add_node(1, b);
        if linked {
            graph.add_edge(0, 1);
        }
        compile(&graph, WeightNormalization::Raw)
    }

    #[test]
    fn spring_pulls_linked_nodes_together() {
        let layout = pair(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), true);
        let d = node_displacement(0, &layout, &layout.positions, &params(0.1, 0.0));
        // -k * d * dir where dir points from node 1 to node 0
        assert!((d.x - 1.0).abs() < 1e-6);
        assert_eq!(d.y, 0.0);
        assert_eq!(d.z, 0.0);
    }

    #[test]
    fn repulsion_follows_inverse_square() {
        let layout = pair(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), false);
        let d = node_displacement(0, &layout, &layout.positions, &params(0.0, 4.0));
        // e / d² = 4 / 4 = 1, pointing away from node 1
        assert!((d.x + 1.0).abs() < 1e-6);
    }

    #[test]
    fn forces_are_symmetric_for_a_pair() {
        let layout = pair(Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, -1.0, 0.5), true);
        let p = params(0.2, 3.0);
        let d0 = node_displacement(0, &layout, &layout.positions, &p);
        let d1 = node_displacement(1, &layout, &layout.positions, &p);
        let sum = d0 + d1;
        assert!(sum.length() < 1e-5, "net force should cancel: {sum:?}");
    }

    #[test]
    fn coincident_nodes_get_zero_displacement() {
        let at = Vec3::new(1.0, 1.0, 1.0);
        let layout = pair(at, at, true);
        let p = params(0.15, 1.0);
        assert_eq!(node_displacement(0, &layout, &layout.positions, &p), Vec3::ZERO);
        assert_eq!(node_displacement(1, &layout, &layout.positions, &p), Vec3::ZERO);
        assert_eq!(next_position(0, &layout, &layout.positions, &p), at);
    }

    #[test]
    fn edge_weight_scales_attraction() {
        let mut graph = Graph::new();
        graph.add_node(0, Vec3::ZERO);
        graph.add_node(1, Vec3::new(10.0, 0.0, 0.0));
        graph.add_weighted_edge(0, 1, 2.0);
        let layout = compile(&graph, WeightNormalization::Raw);

        let d = node_displacement(0, &layout, &layout.positions, &params(0.1, 0.0));
        assert!((d.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn displacement_is_capped() {
        let layout = pair(Vec3::ZERO, Vec3::new(0.1, 0.0, 0.0), false);
        let p = ForceParams {
            max_displacement: Some(0.5),
            ..params(0.0, 1.0)
        };
        let d = node_displacement(0, &layout, &layout.positions, &p);
        assert!((d.length() - 0.5).abs() < 1e-6);
        assert!(d.x < 0.0);
    }

    #[test]
    fn single_node_stays_put() {
        let mut graph = Graph::new();
        graph.add_node(0, Vec3::new(3.0, 3.0, 3.0));
        let layout = compile(&graph, WeightNormalization::Raw);
        assert_eq!(
            next_position(0, &layout, &layout.positions, &params(0.15, 1.0)),
            Vec3::new(3.0, 3.0, 3.0)
        );
    }
}
