//! Iterative solvers for linear systems
//!
//! - [`cg`]: Conjugate Gradient for symmetric positive definite systems
//! - [`cg_preconditioned`] / [`cg_preconditioned_with_guess`]: preconditioned
//!   variants; the `_with_guess` form warm-starts from a previous solution

mod cg;

pub use cg::{CgConfig, CgSolution, cg, cg_preconditioned, cg_preconditioned_with_guess};
