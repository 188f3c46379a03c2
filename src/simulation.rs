//! Simulation driver
//!
//! Validates the configuration, compiles the graph once, then dispatches the
//! force kernel through a [`ComputeBackend`] for the requested number of
//! iterations. The driver never fails: configuration violations, backend
//! errors and cancellation all resolve to a [`RunOutcome`].

use tracing::{debug, error, info, warn};

use crate::backend::{ComputeBackend, CpuBackend};
use crate::cancel::CancelFlag;
use crate::config::SimulationConfig;
use crate::error::{ConfigError, DispatchError};
use crate::graph::Graph;
use crate::kernel::ForceParams;
use crate::layout::compile;
use crate::types::Vec3;

/// Reported to the observer after every attempted iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationProgress {
    /// 1-based iteration number
    pub iteration: u32,
    /// Requested iteration count
    pub total: u32,
    /// True if the backend rejected this iteration's dispatch
    pub skipped: bool,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// Every requested iteration was attempted
    Completed,
    /// Stopped early at an iteration boundary
    Cancelled,
    /// Refused before any work; positions are empty
    Rejected(ConfigError),
    /// The backend could not be prepared or read back
    BackendFailed(DispatchError),
}

/// Result of one layout run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Final positions by dense index (empty if rejected)
    pub positions: Vec<Vec3>,
    /// Iterations whose dispatch succeeded
    pub iterations_completed: u32,
    /// Iterations whose dispatch failed and were skipped
    pub iterations_skipped: u32,
    pub status: RunStatus,
}

impl RunOutcome {
    fn rejected(err: ConfigError) -> Self {
        Self {
            positions: Vec::new(),
            iterations_completed: 0,
            iterations_skipped: 0,
            status: RunStatus::Rejected(err),
        }
    }

    /// Iterations dispatched, successful or not
    pub fn iterations_attempted(&self) -> u32 {
        self.iterations_completed + self.iterations_skipped
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.status, RunStatus::Rejected(_))
    }
}

/// Force-directed layout driver over a compute backend
pub struct Simulation<B = CpuBackend> {
    config: SimulationConfig,
    backend: B,
}

impl Simulation<CpuBackend> {
    /// Driver on the rayon CPU backend
    pub fn new(config: SimulationConfig) -> Self {
        Self::with_backend(config, CpuBackend::new())
    }
}

impl<B: ComputeBackend> Simulation<B> {
    pub fn with_backend(config: SimulationConfig, backend: B) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Lay out `graph`, stopping early if `cancel` is set
    pub fn run(&mut self, graph: &Graph, cancel: &CancelFlag) -> RunOutcome {
        self.run_observed(graph, cancel, |_| {})
    }

    /// Like [`run`](Self::run), calling `observer` after each iteration
    pub fn run_observed<F>(&mut self, graph: &Graph, cancel: &CancelFlag, mut observer: F) -> RunOutcome
    where
        F: FnMut(&IterationProgress),
    {
        if let Err(err) = self.config.validate() {
            error!(error = %err, "refusing to run simulation");
            return RunOutcome::rejected(err);
        }

        let layout = compile(graph, self.config.weight_normalization);
        let params = ForceParams::from(&self.config);
        let total = self.config.iterations;

        info!(
            backend = self.backend.name(),
            nodes = layout.node_count(),
            edge_entries = layout.edge_entry_count(),
            iterations = total,
            "starting layout"
        );

        if let Err(err) = self.backend.prepare(&layout, &params) {
            error!(error = %err, "failed to prepare backend");
            return RunOutcome {
                positions: layout.positions,
                iterations_completed: 0,
                iterations_skipped: 0,
                status: RunStatus::BackendFailed(err),
            };
        }

        let mut status = RunStatus::Completed;
        let mut completed = 0;
        let mut skipped = 0;
        for iteration in 1..=total {
            if cancel.is_cancelled() {
                info!(iteration = iteration - 1, total, "cancelled, keeping positions so far");
                status = RunStatus::Cancelled;
                break;
            }

            let failed = match self.backend.step(&layout) {
                Ok(()) => {
                    completed += 1;
                    false
                }
                Err(err) => {
                    warn!(iteration, error = %err, "dispatch failed, skipping iteration");
                    skipped += 1;
                    true
                }
            };
            debug!("{iteration}/{total}");
            observer(&IterationProgress {
                iteration,
                total,
                skipped: failed,
            });
        }

        let positions = match self.backend.read_positions() {
            Ok(positions) => positions,
            Err(err) => {
                error!(error = %err, "failed to read back positions");
                status = RunStatus::BackendFailed(err);
                layout.positions
            }
        };

        info!(completed, skipped, ?status, "layout finished");
        RunOutcome {
            positions,
            iterations_completed: completed,
            iterations_skipped: skipped,
            status,
        }
    }
}

/// Run `iterations` steps on the CPU backend and return the final positions.
///
/// Returns an empty vector if `spring_constant >= 1`.
pub fn run(graph: &Graph, iterations: u32, spring_constant: f32, repulsive_constant: f32) -> Vec<Vec3> {
    let config = SimulationConfig::default()
        .with_iterations(iterations)
        .with_spring_constant(spring_constant)
        .with_repulsive_constant(repulsive_constant);
    Simulation::new(config)
        .run(graph, &CancelFlag::new())
        .positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchResult;
    use crate::layout::FlatLayout;

    fn line(n: u32) -> Graph {
        let mut graph = Graph::new();
        for id in 0..n {
            graph.add_node(id, Vec3::new(id as f32 * 2.0, 0.0, 0.0));
        }
        for id in 1..n {
            graph.add_edge(id - 1, id);
        }
        graph
    }

    /// Wraps the CPU backend and rejects chosen iterations
    struct FlakyBackend {
        inner: CpuBackend,
        fail_on: Vec<u32>,
        calls: u32,
        fail_prepare: bool,
    }

    impl FlakyBackend {
        fn failing_on(fail_on: Vec<u32>) -> Self {
            Self {
                inner: CpuBackend::new(),
                fail_on,
                calls: 0,
                fail_prepare: false,
            }
        }
    }

    impl ComputeBackend for FlakyBackend {
        fn name(&self) -> &str {
            "flaky"
        }

        fn prepare(&mut self, layout: &FlatLayout, params: &ForceParams) -> DispatchResult<()> {
            if self.fail_prepare {
                return Err(DispatchError::Unavailable("no device".into()));
            }
            self.inner.prepare(layout, params)
        }

        fn step(&mut self, layout: &FlatLayout) -> DispatchResult<()> {
            self.calls += 1;
            if self.fail_on.contains(&self.calls) {
                return Err(DispatchError::Rejected("device lost".into()));
            }
            self.inner.step(layout)
        }

        fn read_positions(&mut self) -> DispatchResult<Vec<Vec3>> {
            self.inner.read_positions()
        }
    }

    #[test]
    fn rejects_spring_constant_of_one() {
        let config = SimulationConfig::default().with_spring_constant(1.0);
        let mut sim = Simulation::new(config);
        let mut calls = 0;
        let outcome = sim.run_observed(&line(3), &CancelFlag::new(), |_| calls += 1);

        assert!(outcome.is_rejected());
        assert!(outcome.positions.is_empty());
        assert_eq!(outcome.iterations_attempted(), 0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn free_run_returns_empty_for_unstable_spring() {
        assert!(run(&line(4), 10, 1.5, 1.0).is_empty());
        assert_eq!(run(&line(4), 10, 0.15, 1.0).len(), 4);
    }

    #[test]
    fn observer_sees_every_iteration() {
        let config = SimulationConfig::default().with_iterations(7);
        let mut seen = Vec::new();
        let outcome =
            Simulation::new(config).run_observed(&line(3), &CancelFlag::new(), |p| seen.push(p.iteration));

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.iterations_completed, 7);
        assert_eq!(seen, (1..=7).collect::<Vec<_>>());
    }

    #[test]
    fn zero_iterations_returns_input_positions() {
        let graph = line(3);
        let config = SimulationConfig::default().with_iterations(0);
        let outcome = Simulation::new(config).run(&graph, &CancelFlag::new());
        assert_eq!(outcome.positions, graph.positions());
        assert_eq!(outcome.status, RunStatus::Completed);
    }

    #[test]
    fn failed_dispatch_skips_only_that_iteration() {
        let graph = line(5);
        let config = SimulationConfig::default().with_iterations(6);

        let mut flaky = Simulation::with_backend(config.clone(), FlakyBackend::failing_on(vec![2, 5]));
        let mut skipped = Vec::new();
        let outcome = flaky.run_observed(&graph, &CancelFlag::new(), |p| {
            if p.skipped {
                skipped.push(p.iteration);
            }
        });

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.iterations_completed, 4);
        assert_eq!(outcome.iterations_skipped, 2);
        assert_eq!(skipped, vec![2, 5]);

        // A skipped iteration leaves positions untouched, so the result equals
        // a clean run with fewer iterations
        let clean = Simulation::new(config.with_iterations(4)).run(&graph, &CancelFlag::new());
        assert_eq!(outcome.positions, clean.positions);
    }

    #[test]
    fn unavailable_backend_returns_initial_positions() {
        let graph = line(3);
        let mut backend = FlakyBackend::failing_on(vec![]);
        backend.fail_prepare = true;
        let outcome =
            Simulation::with_backend(SimulationConfig::default(), backend).run(&graph, &CancelFlag::new());

        assert!(matches!(outcome.status, RunStatus::BackendFailed(_)));
        assert_eq!(outcome.positions, graph.positions());
        assert_eq!(outcome.iterations_attempted(), 0);
    }

    #[test]
    fn cancelled_before_start_runs_nothing() {
        let graph = line(3);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let outcome = Simulation::new(SimulationConfig::default()).run(&graph, &cancel);

        assert!(outcome.is_cancelled());
        assert_eq!(outcome.iterations_attempted(), 0);
        assert_eq!(outcome.positions, graph.positions());
    }

    #[test]
    fn empty_graph_runs_cleanly() {
        let outcome = Simulation::new(SimulationConfig::default()).run(&Graph::new(), &CancelFlag::new());
        assert_eq!(outcome.status, RunStatus::Completed);
        assert!(outcome.positions.is_empty());
    }
}
