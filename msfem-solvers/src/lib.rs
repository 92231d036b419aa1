//! Linear algebra kernels for multiscale finite element simulation
//!
//! This crate collects the solver-side building blocks the wave simulator
//! needs: sparse matrices, Krylov iterations and a small dense eigensolver.
//!
//! # Features
//!
//! - **Sparse Matrices**: CSR storage with triplet assembly, transposition,
//!   sparse products and a row-block builder
//! - **Iterative Solvers**: CG and preconditioned CG with warm starts
//! - **Preconditioners**: Jacobi (diagonal), identity
//! - **Dense Eigensolver**: cyclic Jacobi for small symmetric matrices
//! - **Generic Scalar Types**: f64 throughout the simulator, Complex64 kept
//!   for frequency-domain use of the same kernels
//!
//! # Example
//!
//! ```
//! use solvers::{CgConfig, CsrMatrix, cg};
//!
//! let a = CsrMatrix::from_triplets(2, 2, vec![(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)]);
//! let b = ndarray::array![1.0, 2.0];
//!
//! let solution = cg(&a, &b, &CgConfig::default());
//! assert!(solution.converged);
//! ```

pub mod dense;
pub mod iterative;
pub mod preconditioners;
pub mod sparse;
pub mod traits;

// Re-export main types
pub use sparse::{CsrBuilder, CsrMatrix};
pub use traits::{ComplexField, LinearOperator, Preconditioner};

// Re-export iterative solvers
pub use iterative::{CgConfig, CgSolution, cg, cg_preconditioned, cg_preconditioned_with_guess};

// Re-export dense kernels
pub use dense::{EigenError, SymmetricEigen, symmetric_eigen};

// Re-export preconditioners
pub use preconditioners::{DiagonalPreconditioner, IdentityPreconditioner};
