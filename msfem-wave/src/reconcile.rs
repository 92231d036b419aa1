//! Reconciliation of fine-cell DOF numbering across workers.
//!
//! Each worker announces, for every fine cell of its blocks, which global
//! DOFs that cell owns. The records travel as flat `i64` buffers
//! (`cell, dof_count, dofs...` per record) through one all-gather. Every
//! rank then rebuilds and verifies the full cell-to-DOF map: a cell claimed
//! twice, never claimed, or carrying a negative DOF id is a fatal
//! consistency error.

use crate::comm::Communicator;
use crate::error::SimulationError;

/// DOF ownership record of one fine cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellDofs {
    pub cell: usize,
    pub dofs: Vec<i64>,
}

/// Flatten records into the wire format.
pub fn encode_cell_dofs(records: &[CellDofs]) -> Vec<i64> {
    let payload: usize = records.iter().map(|r| 2 + r.dofs.len()).sum();
    let mut buffer = Vec::with_capacity(payload);
    for record in records {
        buffer.push(record.cell as i64);
        buffer.push(record.dofs.len() as i64);
        buffer.extend_from_slice(&record.dofs);
    }
    buffer
}

/// Parse a wire buffer back into records, validating the framing.
pub fn decode_cell_dofs(buffer: &[i64]) -> Result<Vec<CellDofs>, SimulationError> {
    let mut records = Vec::new();
    let mut cursor = 0;
    while cursor < buffer.len() {
        if cursor + 2 > buffer.len() {
            return Err(SimulationError::consistency(
                "truncated cell-DOF record header",
            ));
        }
        let cell = buffer[cursor];
        let count = buffer[cursor + 1];
        if cell < 0 || count < 0 {
            return Err(SimulationError::consistency(format!(
                "invalid cell-DOF record header: cell {}, count {}",
                cell, count
            )));
        }
        let count = count as usize;
        cursor += 2;
        if cursor + count > buffer.len() {
            return Err(SimulationError::consistency(format!(
                "cell {} record truncated: {} DOFs promised, {} left",
                cell,
                count,
                buffer.len() - cursor
            )));
        }
        records.push(CellDofs {
            cell: cell as usize,
            dofs: buffer[cursor..cursor + count].to_vec(),
        });
        cursor += count;
    }
    Ok(records)
}

/// Exchange local records and rebuild the verified global cell-to-DOF map.
///
/// Returns one DOF list per fine cell, indexed by cell id.
pub fn synchronize_cell_dofs(
    comm: &dyn Communicator,
    local: &[CellDofs],
    total_cells: usize,
) -> Result<Vec<Vec<i64>>, SimulationError> {
    let gathered = comm.all_gather_i64(&encode_cell_dofs(local))?;

    let mut cell_dofs: Vec<Option<Vec<i64>>> = vec![None; total_cells];
    for (rank, buffer) in gathered.iter().enumerate() {
        for record in decode_cell_dofs(buffer)? {
            if record.cell >= total_cells {
                return Err(SimulationError::consistency(format!(
                    "rank {} claims cell {} outside the grid of {} cells",
                    rank, record.cell, total_cells
                )));
            }
            if cell_dofs[record.cell].is_some() {
                return Err(SimulationError::consistency(format!(
                    "cell {} claimed by more than one block",
                    record.cell
                )));
            }
            cell_dofs[record.cell] = Some(record.dofs);
        }
    }

    let mut result = Vec::with_capacity(total_cells);
    for (cell, dofs) in cell_dofs.into_iter().enumerate() {
        let dofs = dofs.ok_or_else(|| {
            SimulationError::consistency(format!("cell {} claimed by no block", cell))
        })?;
        if let Some(&bad) = dofs.iter().find(|&&d| d < 0) {
            return Err(SimulationError::consistency(format!(
                "cell {} carries unassigned DOF {}",
                cell, bad
            )));
        }
        result.push(dofs);
    }
    Ok(result)
}
