//! fdgraph - 3D force-directed graph layout.
//!
//! Edges pull connected nodes together (Hooke's law) while every pair of
//! nodes pushes apart (Coulomb's law). A graph is compiled once into a flat
//! CSR layout, then the force kernel runs data-parallel over all nodes for a
//! fixed number of iterations on a [`ComputeBackend`].
//!
//! ```rust
//! use fdgraph::{CancelFlag, Graph, Simulation, SimulationConfig, Vec3};
//!
//! let mut graph = Graph::new();
//! graph.add_node(0, Vec3::new(0.0, 0.0, 0.0));
//! graph.add_node(1, Vec3::new(4.0, 0.0, 0.0));
//! graph.add_edge(0, 1);
//!
//! let mut sim = Simulation::new(SimulationConfig::default().with_iterations(10));
//! let outcome = sim.run(&graph, &CancelFlag::new());
//! assert_eq!(outcome.positions.len(), 2);
//! ```

pub mod backend;
pub mod cancel;
pub mod config;
pub mod error;
pub mod generate;
pub mod graph;
pub mod kernel;
pub mod layout;
pub mod pairing;
pub mod pipeline;
pub mod simulation;
pub mod store;
pub mod types;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use backend::{ComputeBackend, CpuBackend};
pub use cancel::CancelFlag;
pub use config::{SimulationConfig, WeightNormalization};
pub use error::{ConfigError, DispatchError};
pub use graph::Graph;
pub use layout::{FlatLayout, compile};
pub use simulation::{IterationProgress, RunOutcome, RunStatus, Simulation, run};
pub use types::Vec3;
