//! GPU compute backend (feature `gpu`)
//!
//! Runs the force kernel as a wgpu compute shader, one invocation per node.
//! Results match [`CpuBackend`](crate::backend::CpuBackend) up to floating
//! point reassociation.
//!
//! # Example
//!
//! ```rust,ignore
//! use fdgraph::gpu::GpuBackend;
//! use fdgraph::{Simulation, SimulationConfig};
//!
//! let backend = GpuBackend::new()?;
//! let mut sim = Simulation::with_backend(SimulationConfig::default(), backend);
//! let outcome = sim.run(&graph, &cancel);
//! ```

mod backend;
mod shaders;
mod types;

pub use backend::GpuBackend;
pub use shaders::{FORCE_KERNEL, FORCE_KERNEL_ENTRY};
pub use types::{GpuPosition, KernelUniforms, NO_DISPLACEMENT_CAP, WORKGROUP_SIZE};
