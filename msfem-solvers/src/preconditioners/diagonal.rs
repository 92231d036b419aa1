//! Diagonal (Jacobi) preconditioner
//!
//! Scales the residual by the inverse diagonal of A. For DG mass matrices,
//! whose blocks are small and diagonally dominant, this is enough to keep
//! PCG iteration counts low; it is also embarrassingly parallel.

use crate::sparse::CsrMatrix;
use crate::traits::{ComplexField, Preconditioner};
use ndarray::Array1;
use num_traits::FromPrimitive;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Diagonal (Jacobi) preconditioner
///
/// M = diag(A), so M⁻¹ scales component i by 1/A_ii
#[derive(Debug, Clone)]
pub struct DiagonalPreconditioner<T: ComplexField> {
    /// Inverse diagonal elements
    inv_diag: Array1<T>,
}

impl<T: ComplexField> DiagonalPreconditioner<T> {
    /// Create a diagonal preconditioner from a CSR matrix
    ///
    /// Entries with magnitude below 1e-30 are replaced by 1 so a structurally
    /// zero diagonal cannot poison the solve.
    pub fn from_csr(matrix: &CsrMatrix<T>) -> Self {
        Self::from_diagonal(&matrix.diagonal())
    }

    /// Create from a diagonal vector directly
    pub fn from_diagonal(diag: &Array1<T>) -> Self {
        let floor = T::Real::from_f64(1e-30).unwrap_or_else(num_traits::Zero::zero);
        let inv_diag = diag.mapv(|d| if d.norm() > floor { d.inv() } else { T::one() });
        Self { inv_diag }
    }
}

impl<T: ComplexField> Preconditioner<T> for DiagonalPreconditioner<T> {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        #[cfg(feature = "rayon")]
        {
            if r.len() >= 1000 {
                return self.apply_parallel(r);
            }
        }
        self.apply_sequential(r)
    }
}

impl<T: ComplexField> DiagonalPreconditioner<T> {
    fn apply_sequential(&self, r: &Array1<T>) -> Array1<T> {
        r.iter()
            .zip(self.inv_diag.iter())
            .map(|(&ri, &di)| ri * di)
            .collect()
    }

    #[cfg(feature = "rayon")]
    fn apply_parallel(&self, r: &Array1<T>) -> Array1<T>
    where
        T: Send + Sync,
    {
        let r_slice = r.as_slice().expect("Array should be contiguous");
        let inv_slice = self
            .inv_diag
            .as_slice()
            .expect("Array should be contiguous");

        let results: Vec<T> = r_slice
            .par_iter()
            .zip(inv_slice.par_iter())
            .map(|(&ri, &di)| ri * di)
            .collect();

        Array1::from_vec(results)
    }
}
