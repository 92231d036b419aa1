//! Dense kernels for small local problems
//!
//! - [`symmetric_eigen`]: full eigendecomposition by cyclic Jacobi rotations

mod eigen;

pub use eigen::{EigenError, SymmetricEigen, symmetric_eigen};
