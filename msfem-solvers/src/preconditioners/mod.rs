//! Preconditioners for iterative solvers
//!
//! - [`DiagonalPreconditioner`] (Jacobi): diagonal scaling, fully parallel
//! - [`IdentityPreconditioner`]: no-op, for plain Krylov iterations

mod diagonal;

pub use diagonal::DiagonalPreconditioner;

// Re-export IdentityPreconditioner from traits
pub use crate::traits::IdentityPreconditioner;
