use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use fdgraph::config::{DEFAULT_ITERATIONS, DEFAULT_REPULSIVE_CONSTANT, DEFAULT_SPRING_CONSTANT};
use fdgraph::pipeline::PipelineReport;
use fdgraph::{RunStatus, SimulationConfig, WeightNormalization};

/// Lay out a graph in 3D with a Hooke/Coulomb force simulation.
///
/// Reads nodes and edges from DB_PATH and writes the final positions back.
/// With both --num-rand-nodes and --num-rand-connections set, a random graph
/// is generated instead and DB_PATH is replaced by it.
#[derive(Parser, Debug)]
#[command(name = "fdgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Graph store (.db/.sqlite for SQLite, .json for JSON)
    pub db_path: PathBuf,

    /// Number of simulation iterations
    #[arg(short, long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: u32,

    /// Hooke's-law spring constant (must be < 1)
    #[arg(short = 'k', long = "spring-force", default_value_t = DEFAULT_SPRING_CONSTANT)]
    pub spring_constant: f32,

    /// Coulomb's-law repulsive constant
    #[arg(short = 'e', long = "repulsive-force", default_value_t = DEFAULT_REPULSIVE_CONSTANT)]
    pub repulsive_constant: f32,

    /// Generate a random graph with this many nodes
    #[arg(short = 'n', long = "num-rand-nodes", default_value_t = 0)]
    pub random_nodes: u32,

    /// Candidate edges to draw for the random graph
    #[arg(short = 'c', long = "num-rand-connections", default_value_t = 0)]
    pub random_connections: u32,

    /// Cap on how far a node may move in one iteration
    #[arg(long)]
    pub max_displacement: Option<f32>,

    /// Edge weight policy: raw, clamp or scale:<divisor>
    #[arg(long, default_value_t = WeightNormalization::Raw)]
    pub weight_normalization: WeightNormalization,

    /// Seed for random graph generation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Compute backend for the force kernel
    #[arg(long, value_enum, default_value_t = BackendKind::Cpu)]
    pub backend: BackendKind,

    /// Worker threads for the CPU backend (default: one per core)
    #[arg(long)]
    pub threads: Option<usize>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// rayon thread pool
    Cpu,
    /// wgpu compute shader (requires the `gpu` feature)
    Gpu,
}

impl Cli {
    pub fn simulation_config(&self) -> SimulationConfig {
        let config = SimulationConfig::default()
            .with_iterations(self.iterations)
            .with_spring_constant(self.spring_constant)
            .with_repulsive_constant(self.repulsive_constant)
            .with_weight_normalization(self.weight_normalization);
        match self.max_displacement {
            Some(max) => config.with_max_displacement(max),
            None => config,
        }
    }

    /// Node and edge counts when a random graph was requested
    pub fn random_graph(&self) -> Option<(u32, u32)> {
        (self.random_nodes > 0 && self.random_connections > 0)
            .then_some((self.random_nodes, self.random_connections))
    }
}

/// Human-readable report printed after a run
pub fn summary(report: &PipelineReport, path: &Path) -> String {
    let outcome = &report.outcome;
    let mut out = String::new();
    let _ = match &outcome.status {
        RunStatus::Completed => write!(out, "completed {} iterations", outcome.iterations_completed),
        RunStatus::Cancelled => write!(out, "cancelled after {} iterations", outcome.iterations_attempted()),
        RunStatus::BackendFailed(err) => write!(
            out,
            "backend failed after {} iterations: {err}",
            outcome.iterations_attempted()
        ),
        RunStatus::Rejected(err) => write!(out, "rejected: {err}"),
    };
    if outcome.iterations_skipped > 0 {
        let _ = write!(out, " ({} skipped)", outcome.iterations_skipped);
    }
    out.push('\n');

    match &report.persisted {
        Some(persisted) => {
            let _ = write!(out, "wrote {} positions to {}", persisted.written, path.display());
            if !persisted.skipped_nan.is_empty() {
                let _ = write!(out, " ({} NaN positions not written)", persisted.skipped_nan.len());
            }
        }
        None => out.push_str("nothing written"),
    }
    out
}
