//! Compute backend trait and the rayon CPU implementation
//!
//! A backend executes one kernel dispatch per iteration: a parallel-for over
//! `[0, N)` with an implicit join. Backends double-buffer positions so every
//! lane of an iteration reads the same snapshot.
//!
//! # Implementations
//! - [`CpuBackend`]: rayon thread pool (always available)
//! - `gpu::GpuBackend`: wgpu compute shader (feature `gpu`)

use rayon::prelude::*;
use tracing::debug;

use crate::error::{DispatchError, DispatchResult};
use crate::kernel::{ForceParams, next_position};
use crate::layout::FlatLayout;
use crate::types::Vec3;

/// A data-parallel executor for the force kernel.
///
/// The driver calls `prepare` once per run, `step` once per iteration and
/// `read_positions` at the end. A failed `step` must leave the current
/// positions untouched.
pub trait ComputeBackend {
    /// Backend name for logs (e.g. "cpu", "wgpu:Vulkan")
    fn name(&self) -> &str;

    /// Allocate per-run buffers and load the initial positions
    fn prepare(&mut self, layout: &FlatLayout, params: &ForceParams) -> DispatchResult<()>;

    /// Run the kernel once over every node
    fn step(&mut self, layout: &FlatLayout) -> DispatchResult<()>;

    /// Copy the current positions out of the backend
    fn read_positions(&mut self) -> DispatchResult<Vec<Vec3>>;
}

impl<B: ComputeBackend + ?Sized> ComputeBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn prepare(&mut self, layout: &FlatLayout, params: &ForceParams) -> DispatchResult<()> {
        (**self).prepare(layout, params)
    }

    fn step(&mut self, layout: &FlatLayout) -> DispatchResult<()> {
        (**self).step(layout)
    }

    fn read_positions(&mut self) -> DispatchResult<Vec<Vec3>> {
        (**self).read_positions()
    }
}

/// CPU backend running one rayon task per node
#[derive(Debug, Default)]
pub struct CpuBackend {
    pool: Option<rayon::ThreadPool>,
    params: Option<ForceParams>,
    current: Vec<Vec3>,
    next: Vec<Vec3>,
}

impl CpuBackend {
    /// Backend on rayon's global thread pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend on a dedicated pool with `threads` workers
    pub fn with_threads(threads: usize) -> DispatchResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("fdgraph-kernel-{i}"))
            .build()
            .map_err(|e| DispatchError::Unavailable(e.to_string()))?;
        Ok(Self {
            pool: Some(pool),
            ..Self::default()
        })
    }

    fn dispatch(layout: &FlatLayout, params: &ForceParams, current: &[Vec3], next: &mut [Vec3]) {
        next.par_iter_mut()
            .enumerate()
            .for_each(|(i, out)| *out = next_position(i, layout, current, params));
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn prepare(&mut self, layout: &FlatLayout, params: &ForceParams) -> DispatchResult<()> {
        self.params = Some(*params);
        self.current = layout.positions.clone();
        self.next = vec![Vec3::ZERO; layout.node_count()];
        debug!(
            nodes = layout.node_count(),
            threads = self
                .pool
                .as_ref()
                .map_or_else(rayon::current_num_threads, |p| p.current_num_threads()),
            "prepared cpu backend"
        );
        Ok(())
    }

    fn step(&mut self, layout: &FlatLayout) -> DispatchResult<()> {
        let Self {
            pool,
            params,
            current,
            next,
        } = self;
        let params = params.as_ref().ok_or(DispatchError::NotPrepared)?;
        if current.len() != layout.node_count() {
            return Err(DispatchError::NotPrepared);
        }

        match pool {
            Some(pool) => pool.install(|| {
                Self::dispatch(layout, params, current.as_slice(), next.as_mut_slice())
            }),
            None => Self::dispatch(layout, params, current.as_slice(), next.as_mut_slice()),
        }
        // The join above is the iteration barrier; publish the new snapshot
        std::mem::swap(current, next);
        Ok(())
    }

    fn read_positions(&mut self) -> DispatchResult<Vec<Vec3>> {
        if self.params.is_none() {
            return Err(DispatchError::NotPrepared);
        }
        Ok(self.current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeightNormalization;
    use crate::graph::Graph;
    use crate::kernel::node_displacement;
    use crate::layout::compile;

    fn params() -> ForceParams {
        ForceParams {
            spring_constant: 0.15,
            repulsive_constant: 1.0,
            max_displacement: None,
        }
    }

    fn ring(n: u32) -> FlatLayout {
        let mut graph = Graph::new();
        for id in 0..n {
            let angle = id as f32 / n as f32 * std::f32::consts::TAU;
            graph.add_node(id, Vec3::new(angle.cos() * 5.0, angle.sin() * 5.0, id as f32 * 0.1));
        }
        for id in 0..n {
            graph.add_edge(id, (id + 1) % n);
        }
        compile(&graph, WeightNormalization::Raw)
    }

    #[test]
    fn step_before_prepare_fails() {
        let layout = ring(4);
        let mut backend = CpuBackend::new();
        assert_eq!(backend.step(&layout), Err(DispatchError::NotPrepared));
        assert_eq!(backend.read_positions(), Err(DispatchError::NotPrepared));
    }

    #[test]
    fn step_reads_a_single_snapshot() {
        let layout = ring(16);
        let p = params();

        let expected: Vec<Vec3> = (0..layout.node_count())
            .map(|i| layout.positions[i] + node_displacement(i, &layout, &layout.positions, &p))
            .collect();

        let mut backend = CpuBackend::new();
        backend.prepare(&layout, &p).unwrap();
        backend.step(&layout).unwrap();
        assert_eq!(backend.read_positions().unwrap(), expected);
    }

    #[test]
    fn dedicated_pool_matches_global_pool() {
        let layout = ring(32);
        let p = params();

        let mut global = CpuBackend::new();
        let mut dedicated = CpuBackend::with_threads(2).unwrap();
        for backend in [&mut global, &mut dedicated] {
            backend.prepare(&layout, &p).unwrap();
            for _ in 0..5 {
                backend.step(&layout).unwrap();
            }
        }
        assert_eq!(
            global.read_positions().unwrap(),
            dedicated.read_positions().unwrap()
        );
    }

    #[test]
    fn boxed_backend_delegates() {
        let layout = ring(3);
        let mut backend: Box<dyn ComputeBackend> = Box::new(CpuBackend::new());
        assert_eq!(backend.name(), "cpu");
        backend.prepare(&layout, &params()).unwrap();
        backend.step(&layout).unwrap();
        assert_eq!(backend.read_positions().unwrap().len(), 3);
    }
}
