//! Load → simulate → persist
//!
//! Glue between a store and the simulation driver. A rejected run persists
//! nothing; every other outcome (including cancellation and backend
//! failures) writes the positions the driver returned.

use std::path::Path;

use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::backend::ComputeBackend;
use crate::cancel::CancelFlag;
use crate::generate::generate;
use crate::simulation::{RunOutcome, Simulation};
use crate::store::{self, GraphSource, GraphStore, PersistReport, ResultSink};

/// What a pipeline run did
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub outcome: RunOutcome,
    /// `None` when the run was rejected and nothing was written
    pub persisted: Option<PersistReport>,
}

/// Lay out the graph stored at `path` and write the positions back in place
pub fn layout_store<B: ComputeBackend>(
    path: &Path,
    simulation: &mut Simulation<B>,
    cancel: &CancelFlag,
) -> anyhow::Result<PipelineReport> {
    let store = store::open(path)?;
    let graph = store
        .load()
        .with_context(|| format!("failed to load graph from {}", path.display()))?;
    info!(format = store.format_id(), nodes = graph.len(), "loaded graph");

    let outcome = simulation.run(&graph, cancel);
    if outcome.is_rejected() {
        return Ok(PipelineReport {
            outcome,
            persisted: None,
        });
    }

    let persisted = store
        .update_positions(&graph.node_ids(), &outcome.positions)
        .with_context(|| format!("failed to write positions to {}", path.display()))?;
    Ok(PipelineReport {
        outcome,
        persisted: Some(persisted),
    })
}

/// Synthesize a random graph, lay it out, and store it as a fresh graph at
/// `path`, replacing whatever was there.
///
/// `seed` makes generation reproducible; without it the RNG is seeded from
/// the OS.
pub fn layout_random<B: ComputeBackend>(
    path: &Path,
    nodes: u32,
    candidate_edges: u32,
    seed: Option<u64>,
    simulation: &mut Simulation<B>,
    cancel: &CancelFlag,
) -> anyhow::Result<PipelineReport> {
    let store = store::open(path)?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let generated = generate(nodes, candidate_edges, &mut rng);
    info!(
        nodes,
        edges = generated.edges.len(),
        seeded = seed.is_some(),
        "generated graph"
    );

    let outcome = simulation.run(&generated.graph, cancel);
    if outcome.is_rejected() {
        warn!("run rejected, store left untouched");
        return Ok(PipelineReport {
            outcome,
            persisted: None,
        });
    }

    let persisted = store
        .create(&outcome.positions, &generated.edges)
        .with_context(|| format!("failed to create store at {}", path.display()))?;
    Ok(PipelineReport {
        outcome,
        persisted: Some(persisted),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::simulation::RunStatus;
    use tempfile::TempDir;

    fn simulation(iterations: u32) -> Simulation {
        Simulation::new(SimulationConfig::default().with_iterations(iterations))
    }

    #[test]
    fn random_then_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("random.db");

        let report =
            layout_random(&path, 30, 60, Some(9), &mut simulation(5), &CancelFlag::new()).unwrap();
        assert_eq!(report.outcome.status, RunStatus::Completed);
        assert_eq!(report.persisted.as_ref().unwrap().written, 30);

        let report = layout_store(&path, &mut simulation(5), &CancelFlag::new()).unwrap();
        assert_eq!(report.outcome.positions.len(), 30);
        assert_eq!(report.persisted.unwrap().written, 30);
    }

    #[test]
    fn rejected_run_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.json");
        layout_random(&path, 5, 5, Some(1), &mut simulation(0), &CancelFlag::new()).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let mut unstable = Simulation::new(SimulationConfig::default().with_spring_constant(1.0));
        let report = layout_store(&path, &mut unstable, &CancelFlag::new()).unwrap();

        assert!(report.outcome.is_rejected());
        assert!(report.persisted.is_none());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn rejected_random_run_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("never.db");
        let mut unstable = Simulation::new(SimulationConfig::default().with_spring_constant(2.0));
        let report = layout_random(&path, 5, 5, None, &mut unstable, &CancelFlag::new()).unwrap();

        assert!(report.persisted.is_none());
        assert!(!path.exists());
    }

    #[test]
    fn zero_iterations_persist_generated_positions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seeded.json");
        layout_random(&path, 12, 20, Some(77), &mut simulation(0), &CancelFlag::new()).unwrap();

        let expected = generate(12, 20, &mut StdRng::seed_from_u64(77));
        let stored = crate::store::JsonStore::new(&path).load().unwrap();
        for (a, b) in stored.positions().iter().zip(expected.graph.positions()) {
            assert!(a.distance(b) < 1e-5);
        }
    }

    #[test]
    fn missing_store_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = layout_store(&dir.path().join("absent.db"), &mut simulation(1), &CancelFlag::new())
            .unwrap_err();
        assert!(err.to_string().contains("failed to load graph"));
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(layout_store(&dir.path().join("graph.csv"), &mut simulation(1), &CancelFlag::new()).is_err());
    }
}
