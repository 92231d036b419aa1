//! Generalized multiscale finite element simulation of acoustic waves
//!
//! This crate simulates transient acoustic wave propagation in heterogeneous
//! media with GMsFEM: per-block multiscale basis functions computed from the
//! fine-scale material data reduce a large fine DG system to a small coarse
//! system that is stepped explicitly in time.
//!
//! # Features
//!
//! - **Fine discretization**: first-order DG on structured quads with
//!   interior-penalty stiffness and weighted mass forms
//! - **Multiscale basis**: per-block boundary cosine modes (harmonically
//!   extended) plus interior eigenmodes
//! - **Galerkin reduction**: restriction `R`, coarse operators `R·M·Rᵗ`,
//!   `R·S·Rᵗ`
//! - **Distributed DOF reconciliation**: serial or in-process cluster of
//!   workers over one all-gather collective
//! - **Leapfrog time loop**: Ricker source, warm-started PCG mass solves,
//!   VTK snapshots
//!
//! # Example
//!
//! ```no_run
//! use gmsfem::config::SimulationConfig;
//! use gmsfem::simulation;
//!
//! let mut config = SimulationConfig::default();
//! config.grid.nx = 16;
//! config.grid.ny = 16;
//! config.time.t_end = 0.1;
//!
//! let summary = simulation::run(&config, 1)?;
//! println!("{} steps, {} snapshots", summary.steps, summary.snapshots);
//! # Ok::<(), gmsfem::SimulationError>(())
//! ```

pub mod assembly;
pub mod basis;
pub mod comm;
pub mod config;
pub mod error;
pub mod media;
pub mod mesh;
pub mod msoperator;
pub mod output;
pub mod partition;
pub mod quadrature;
pub mod reconcile;
pub mod shape;
pub mod simulation;
pub mod source;
pub mod timestep;

// Re-export the main entry points
pub use config::SimulationConfig;
pub use error::SimulationError;
pub use simulation::{run, run_with_observer, CoarseSystem, RunSummary};

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
