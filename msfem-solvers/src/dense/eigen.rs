//! Dense symmetric eigensolver
//!
//! Cyclic Jacobi rotations for small dense symmetric matrices. The spectral
//! problems this serves are a few dozen rows each, a regime where Jacobi is
//! robust and accurate to machine precision without any LAPACK dependency.

use ndarray::{Array1, Array2};
use thiserror::Error;

/// Errors that can occur during the eigendecomposition
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EigenError {
    /// Input matrix is not square
    #[error("Matrix is not square: {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    /// Input matrix is not symmetric
    #[error("Matrix is not symmetric at ({i},{j}): asymmetry {delta:.3e}")]
    NotSymmetric { i: usize, j: usize, delta: f64 },

    /// Sweep limit reached before the off-diagonal vanished
    #[error("Jacobi did not converge after {sweeps} sweeps: off-diagonal norm {off_norm:.3e}")]
    NotConverged { sweeps: usize, off_norm: f64 },
}

/// Eigendecomposition of a symmetric matrix
///
/// Eigenvalues come out sorted ascending; column k of `eigenvectors` is the
/// unit eigenvector paired with `eigenvalues[k]`.
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    /// Eigenvalues in ascending order
    pub eigenvalues: Array1<f64>,
    /// Orthonormal eigenvectors, one per column
    pub eigenvectors: Array2<f64>,
    /// Number of sweeps performed
    pub sweeps: usize,
}

const MAX_SWEEPS: usize = 64;
const SYMMETRY_TOL: f64 = 1e-8;

/// Compute all eigenpairs of a symmetric matrix by cyclic Jacobi rotations
///
/// The iteration stops once the off-diagonal Frobenius norm falls below
/// 1e-12 times the largest entry magnitude.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> Result<SymmetricEigen, EigenError> {
    let n = matrix.nrows();
    if matrix.ncols() != n {
        return Err(EigenError::NotSquare {
            rows: n,
            cols: matrix.ncols(),
        });
    }

    // One scale for both the symmetry check and the convergence threshold
    let scale = matrix
        .iter()
        .fold(0.0_f64, |acc, &v| acc.max(v.abs()))
        .max(1.0);

    for i in 0..n {
        for j in (i + 1)..n {
            let delta = (matrix[[i, j]] - matrix[[j, i]]).abs();
            if delta > SYMMETRY_TOL * scale {
                return Err(EigenError::NotSymmetric { i, j, delta });
            }
        }
    }

    let mut a = matrix.clone();
    let mut v: Array2<f64> = Array2::eye(n);

    if n <= 1 {
        return Ok(SymmetricEigen {
            eigenvalues: a.diag().to_owned(),
            eigenvectors: v,
            sweeps: 0,
        });
    }

    let tol = 1e-12 * scale;

    for sweep in 0..MAX_SWEEPS {
        if off_diagonal_norm(&a) <= tol {
            return Ok(sort_ascending(a, v, sweep));
        }

        for p in 0..n - 1 {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }

                // Rotation angle that annihilates a[p,q]
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = if theta >= 0.0 {
                    1.0 / (theta + (1.0 + theta * theta).sqrt())
                } else {
                    1.0 / (theta - (1.0 + theta * theta).sqrt())
                };
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = t * c;

                // A <- J^T A J, applied as column then row updates
                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                a[[p, q]] = 0.0;
                a[[q, p]] = 0.0;

                // Accumulate V <- V J
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    if off_diagonal_norm(&a) <= tol {
        return Ok(sort_ascending(a, v, MAX_SWEEPS));
    }

    Err(EigenError::NotConverged {
        sweeps: MAX_SWEEPS,
        off_norm: off_diagonal_norm(&a),
    })
}

fn off_diagonal_norm(a: &Array2<f64>) -> f64 {
    let n = a.nrows();
    let mut sum = 0.0;
    for i in 0..n {
        for j in 0..n {
            if i != j {
                sum += a[[i, j]] * a[[i, j]];
            }
        }
    }
    sum.sqrt()
}

fn sort_ascending(a: Array2<f64>, v: Array2<f64>, sweeps: usize) -> SymmetricEigen {
    let n = a.nrows();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[i, i]].total_cmp(&a[[j, j]]));

    let eigenvalues = Array1::from_iter(order.iter().map(|&k| a[[k, k]]));
    let mut eigenvectors = Array2::zeros((n, n));
    for (dst, &src) in order.iter().enumerate() {
        eigenvectors.column_mut(dst).assign(&v.column(src));
    }

    SymmetricEigen {
        eigenvalues,
        eigenvectors,
        sweeps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_eigen_2x2() {
        let a = array![[2.0_f64, 1.0], [1.0, 2.0]];
        let eig = symmetric_eigen(&a).unwrap();

        assert_relative_eq!(eig.eigenvalues[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(eig.eigenvalues[1], 3.0, epsilon = 1e-12);

        // Eigenvector for lambda = 1 is (1, -1)/sqrt(2) up to sign
        let v0 = eig.eigenvectors.column(0);
        assert_relative_eq!((v0[0] + v0[1]).abs(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_eigen_diagonal_matrix() {
        let a = array![[3.0_f64, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 2.0]];
        let eig = symmetric_eigen(&a).unwrap();

        assert_relative_eq!(eig.eigenvalues[0], 1.0, epsilon = 1e-14);
        assert_relative_eq!(eig.eigenvalues[1], 2.0, epsilon = 1e-14);
        assert_relative_eq!(eig.eigenvalues[2], 3.0, epsilon = 1e-14);
        assert_eq!(eig.sweeps, 0);
    }

    #[test]
    fn test_eigen_reconstruction() {
        let a = array![
            [4.0_f64, 1.0, 0.5, 0.0, 0.2],
            [1.0, 3.0, 1.0, 0.1, 0.0],
            [0.5, 1.0, 5.0, 1.0, 0.3],
            [0.0, 0.1, 1.0, 2.0, 1.0],
            [0.2, 0.0, 0.3, 1.0, 6.0],
        ];
        let eig = symmetric_eigen(&a).unwrap();
        let n = 5;

        // A v_k = lambda_k v_k
        for k in 0..n {
            let vk = eig.eigenvectors.column(k);
            let av = a.dot(&vk);
            for i in 0..n {
                assert_relative_eq!(av[i], eig.eigenvalues[k] * vk[i], epsilon = 1e-9);
            }
        }

        // Columns are orthonormal
        for k in 0..n {
            for l in 0..n {
                let dot = eig.eigenvectors.column(k).dot(&eig.eigenvectors.column(l));
                let expected = if k == l { 1.0 } else { 0.0 };
                assert_relative_eq!(dot, expected, epsilon = 1e-10);
            }
        }

        // Ascending order
        for k in 1..n {
            assert!(eig.eigenvalues[k] >= eig.eigenvalues[k - 1]);
        }
    }

    #[test]
    fn test_eigen_rejects_non_square() {
        let a = Array2::<f64>::zeros((2, 3));
        let err = symmetric_eigen(&a).unwrap_err();
        assert_eq!(err, EigenError::NotSquare { rows: 2, cols: 3 });
    }

    #[test]
    fn test_eigen_rejects_asymmetric() {
        let a = array![[1.0_f64, 2.0], [0.0, 1.0]];
        assert!(matches!(
            symmetric_eigen(&a),
            Err(EigenError::NotSymmetric { .. })
        ));
    }

    #[test]
    fn test_eigen_trivial_sizes() {
        let a0 = Array2::<f64>::zeros((0, 0));
        let eig0 = symmetric_eigen(&a0).unwrap();
        assert_eq!(eig0.eigenvalues.len(), 0);

        let a1 = array![[7.0_f64]];
        let eig1 = symmetric_eigen(&a1).unwrap();
        assert_relative_eq!(eig1.eigenvalues[0], 7.0);
        assert_relative_eq!(eig1.eigenvectors[[0, 0]], 1.0);
    }
}
