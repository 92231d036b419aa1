//! Global restriction operator and Galerkin reduction to the coarse scale.
//!
//! The restriction `R` is (coarse DOFs x fine DOFs): every local basis
//! vector becomes one coarse row, with its entries scattered into the fine
//! columns named by the reconciled cell-to-DOF map. Rows are grouped by
//! block in block order, so the coarse numbering is reproducible across
//! worker counts. The coarse operators are the congruent transforms
//! `R·M·Rᵗ` and `R·S·Rᵗ`, and the coarse load vector is `R·b`.

use ndarray::Array1;
use solvers::{CsrBuilder, CsrMatrix};

use crate::basis::LocalBasis;
use crate::comm::Communicator;
use crate::error::SimulationError;
use crate::mesh::DOFS_PER_ELEMENT;

/// Coarse row range owned by this worker, agreed across all ranks before
/// the global operator is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPartition {
    pub offset: usize,
    pub local_rows: usize,
    pub total_rows: usize,
}

/// All-gather the per-worker coarse row counts and derive this worker's
/// row range.
pub fn agree_row_partition(
    comm: &dyn Communicator,
    local_rows: usize,
) -> Result<RowPartition, SimulationError> {
    let counts = comm.all_gather_counts(local_rows)?;
    let offset = counts[..comm.rank()].iter().sum();
    Ok(RowPartition {
        offset,
        local_rows,
        total_rows: counts.iter().sum(),
    })
}

/// Assemble the global restriction from all local bases, in block order.
///
/// `cell_dofs` is the reconciled map from global fine cell to its global
/// DOF indices; every basis row is scattered through it.
pub fn assemble_restriction(
    bases: &[LocalBasis],
    cell_dofs: &[Vec<i64>],
    num_fine_dofs: usize,
) -> Result<CsrMatrix<f64>, SimulationError> {
    let num_coarse_dofs: usize = bases.iter().map(|b| b.num_basis()).sum();
    let nnz_estimate: usize = bases
        .iter()
        .map(|b| b.num_basis() * b.num_local_dofs())
        .sum();
    let mut builder = CsrBuilder::with_capacity(num_coarse_dofs, num_fine_dofs, nnz_estimate);

    for (index, basis) in bases.iter().enumerate() {
        if basis.block != index {
            return Err(SimulationError::consistency(format!(
                "basis for block {} arrived at position {}",
                basis.block, index
            )));
        }

        let columns = scatter_columns(basis, cell_dofs, num_fine_dofs)?;
        if columns.len() != basis.num_local_dofs() {
            return Err(SimulationError::DimensionMismatch {
                expected: columns.len(),
                actual: basis.num_local_dofs(),
            });
        }
        builder.add_dense_block(&columns, &basis.vectors);
    }

    let restriction = builder.finish();
    log::info!(
        "restriction operator: {} x {}, {} nonzeros",
        restriction.num_rows,
        restriction.num_cols,
        restriction.nnz()
    );
    Ok(restriction)
}

/// Fine columns of one block's rows, in local DOF order.
fn scatter_columns(
    basis: &LocalBasis,
    cell_dofs: &[Vec<i64>],
    num_fine_dofs: usize,
) -> Result<Vec<usize>, SimulationError> {
    let mut columns = Vec::with_capacity(basis.cells.len() * DOFS_PER_ELEMENT);
    for &cell in &basis.cells {
        let dofs = cell_dofs.get(cell).ok_or_else(|| {
            SimulationError::consistency(format!(
                "block {} references fine cell {} outside the DOF map",
                basis.block, cell
            ))
        })?;
        if dofs.len() != DOFS_PER_ELEMENT {
            return Err(SimulationError::consistency(format!(
                "fine cell {} carries {} DOFs, expected {}",
                cell,
                dofs.len(),
                DOFS_PER_ELEMENT
            )));
        }
        for &dof in dofs {
            if dof < 0 || dof as usize >= num_fine_dofs {
                return Err(SimulationError::consistency(format!(
                    "fine cell {} maps to DOF {} outside 0..{}",
                    cell, dof, num_fine_dofs
                )));
            }
            columns.push(dof as usize);
        }
    }

    // The sparse builder needs each row's columns sorted; block cells are
    // enumerated in ascending global order, so any violation here means
    // the reconciled map is corrupt.
    if columns.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(SimulationError::consistency(format!(
            "scatter columns for block {} are not strictly increasing",
            basis.block
        )));
    }
    Ok(columns)
}

/// Fine operators reduced through the restriction.
pub struct CoarseOperators {
    pub mass: CsrMatrix<f64>,
    pub stiffness: CsrMatrix<f64>,
    pub rhs: Array1<f64>,
}

/// Galerkin-reduce the fine operators: `R·M·Rᵗ`, `R·S·Rᵗ`, `R·b`.
///
/// Both operators go through the same congruence, which preserves symmetry
/// and keeps coarse energies consistent with the fine forms.
pub fn project_to_coarse(
    restriction: &CsrMatrix<f64>,
    mass_fine: &CsrMatrix<f64>,
    stiffness_fine: &CsrMatrix<f64>,
    rhs_fine: &Array1<f64>,
) -> CoarseOperators {
    let prolongation = restriction.transpose();
    let mass = restriction.matmul(mass_fine).matmul(&prolongation);
    let stiffness = restriction.matmul(stiffness_fine).matmul(&prolongation);
    let rhs = restriction.matvec(rhs_fine);

    log::info!(
        "coarse operators: M {} x {} ({} nnz), S {} x {} ({} nnz)",
        mass.num_rows,
        mass.num_cols,
        mass.nnz(),
        stiffness.num_rows,
        stiffness.num_cols,
        stiffness.nnz()
    );

    CoarseOperators {
        mass,
        stiffness,
        rhs,
    }
}
