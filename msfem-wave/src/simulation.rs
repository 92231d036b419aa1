//! End-to-end pipeline: fine assembly, distributed basis build, Galerkin
//! reduction and the leapfrog time loop.
//!
//! Every worker runs [`assemble_coarse_system`] against the communicator;
//! after the collectives each rank holds the same restriction operator and
//! coarse system, so the time loop itself is a plain sequential solve.

use ndarray::Array1;
use std::time::{Duration, Instant};

use solvers::CsrMatrix;

use crate::assembly::{assemble_mass, assemble_stiffness};
use crate::basis::{build_bases, decode_local_bases, encode_local_bases, LocalBasis};
use crate::comm::{Communicator, LocalCluster, SerialComm};
use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::mesh::{rectangular_mesh_quads, Mesh, DOFS_PER_ELEMENT};
use crate::msoperator::{
    agree_row_partition, assemble_restriction, project_to_coarse, CoarseOperators,
};
use crate::output::{dump_matrices, SnapshotWriter};
use crate::partition::{plan_blocks, worker_ranges};
use crate::reconcile::{synchronize_cell_dofs, CellDofs};
use crate::source::assemble_source;
use crate::timestep::{num_time_steps, PressureState, TimeStepper};

/// Everything the time loop needs, identical on every rank.
pub struct CoarseSystem {
    /// Global fine mesh, used for snapshot geometry.
    pub mesh: Mesh,
    /// Restriction operator, coarse rows over fine columns.
    pub restriction: CsrMatrix<f64>,
    /// Prolongation operator, the transpose of the restriction.
    pub prolongation: CsrMatrix<f64>,
    /// Galerkin-reduced mass, stiffness and load.
    pub operators: CoarseOperators,
}

/// Counters reported after a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub fine_dofs: usize,
    pub coarse_dofs: usize,
    pub steps: usize,
    pub snapshots: usize,
    pub non_converged: usize,
}

/// Build the coarse system on one rank of the communicator.
///
/// Collectives happen in a fixed order on every rank: DOF reconciliation,
/// row-partition agreement, basis exchange. After the basis exchange each
/// rank assembles the full restriction and reduces the fine operators, so
/// the returned system does not depend on the rank.
pub fn assemble_coarse_system(
    config: &SimulationConfig,
    comm: &dyn Communicator,
) -> Result<CoarseSystem, SimulationError> {
    let grid = config.fine_grid();
    let scheme = config.dg_scheme()?;
    let source = config.source.to_source()?;

    let fine_start = Instant::now();
    let mesh = rectangular_mesh_quads(grid.x0, grid.x1(), grid.y0, grid.y1(), grid.nx, grid.ny);
    let media = config.media.load(grid.num_cells())?;
    let mass_fine = assemble_mass(&mesh, &media);
    let stiffness_fine = assemble_stiffness(&mesh, &media, &scheme);
    let rhs_fine = assemble_source(&mesh, &source)?;
    log::info!(
        "fine system: {} DOFs, M {} nnz, S {} nnz ({:.3} s)",
        mesh.num_dofs(),
        mass_fine.nnz(),
        stiffness_fine.nnz(),
        fine_start.elapsed().as_secs_f64()
    );

    let blocks = plan_blocks(grid.nx, grid.ny, config.method.coarse_nx, config.method.coarse_ny);
    let ranges = worker_ranges(blocks.len(), comm.size());
    let owned = &blocks[ranges[comm.rank()].clone()];

    let basis_start = Instant::now();
    let local_bases = build_bases(&grid, owned, &media, &config.basis_params())?;
    log::info!(
        "rank {}: {} block bases built ({:.3} s)",
        comm.rank(),
        local_bases.len(),
        basis_start.elapsed().as_secs_f64()
    );

    // Announce the DOFs of every owned fine cell, then rebuild the complete
    // map from all ranks' records.
    let records: Vec<CellDofs> = owned
        .iter()
        .flat_map(|block| block.global_cells(grid.nx))
        .map(|cell| CellDofs {
            cell,
            dofs: (0..DOFS_PER_ELEMENT)
                .map(|k| Mesh::dof(cell, k) as i64)
                .collect(),
        })
        .collect();
    let cell_dofs = synchronize_cell_dofs(comm, &records, grid.num_cells())?;

    let local_rows: usize = local_bases.iter().map(LocalBasis::num_basis).sum();
    let partition = agree_row_partition(comm, local_rows)?;
    log::info!(
        "rank {} owns coarse rows {}..{} of {}",
        comm.rank(),
        partition.offset,
        partition.offset + partition.local_rows,
        partition.total_rows
    );

    let all_bases = exchange_bases(comm, &local_bases)?;
    let total_rows: usize = all_bases.iter().map(LocalBasis::num_basis).sum();
    if total_rows != partition.total_rows {
        return Err(SimulationError::consistency(format!(
            "basis exchange delivered {} coarse rows, partition agreed on {}",
            total_rows, partition.total_rows
        )));
    }

    let restriction = assemble_restriction(&all_bases, &cell_dofs, mesh.num_dofs())?;
    let prolongation = restriction.transpose();
    let operators = project_to_coarse(&restriction, &mass_fine, &stiffness_fine, &rhs_fine);

    if config.output.print_matrices && comm.rank() == 0 {
        dump_matrices(
            &config.output.directory,
            &all_bases,
            &restriction,
            &mass_fine,
            &stiffness_fine,
            &operators.mass,
            &operators.stiffness,
        )?;
    }

    Ok(CoarseSystem {
        mesh,
        restriction,
        prolongation,
        operators,
    })
}

/// All-gather the locally built bases and reassemble them in block order.
///
/// Worker ranges are contiguous and ascending, so concatenating the decoded
/// buffers in rank order restores the global block order.
fn exchange_bases(
    comm: &dyn Communicator,
    local: &[LocalBasis],
) -> Result<Vec<LocalBasis>, SimulationError> {
    let gathered = comm.all_gather_i64(&encode_local_bases(local))?;
    let mut all = Vec::new();
    for buffer in &gathered {
        all.extend(decode_local_bases(buffer)?);
    }
    Ok(all)
}

/// Run the leapfrog loop on an assembled system.
///
/// The observer receives `(step, time, u0)` every `step_seis` steps;
/// snapshots of the prolongated field go out every `step_snap` steps and
/// once at cycle 0.
pub fn run_time_loop<F>(
    config: &SimulationConfig,
    system: &CoarseSystem,
    mut observer: F,
) -> Result<RunSummary, SimulationError>
where
    F: FnMut(usize, f64, &Array1<f64>),
{
    let dt = config.time.dt;
    let n_steps = num_time_steps(config.time.t_end, dt);
    let source = config.source.to_source()?;
    let series = source.time_series(dt, n_steps);

    let writer = SnapshotWriter::new(
        &system.mesh,
        &config.output.directory,
        &config.output.extra_string,
    )?;

    let mut state = PressureState::zero(system.operators.mass.num_rows);
    let mut stepper = TimeStepper::new(&system.operators, dt);

    let mut snapshot_time = Duration::ZERO;
    let snap_start = Instant::now();
    writer.write(0, 0.0, &system.prolongation.matvec(&state.u0))?;
    snapshot_time += snap_start.elapsed();
    let mut snapshots = 1;

    let tenth = (n_steps / 10).max(1);
    let loop_start = Instant::now();
    for step in 1..=n_steps {
        let time = step as f64 * dt;
        stepper.advance(&mut state, series[step - 1]);

        if step % config.time.step_snap == 0 {
            let snap_start = Instant::now();
            writer.write(step, time, &system.prolongation.matvec(&state.u0))?;
            snapshot_time += snap_start.elapsed();
            snapshots += 1;
        }
        if step % config.time.step_seis == 0 {
            observer(step, time, &state.u0);
        }
        if step % tenth == 0 {
            log::info!(
                "step {} / {}, t = {:.4}, |u| = {:.6e}",
                step,
                n_steps,
                time,
                state.u0.dot(&state.u0).sqrt()
            );
        }
        state.rotate();
    }
    let loop_time = loop_start.elapsed();

    if stepper.non_converged > 0 {
        log::warn!(
            "{} of {} coarse solves stopped at the iteration cap",
            stepper.non_converged,
            n_steps
        );
    }
    log::info!(
        "time loop: {} steps in {:.3} s, {} snapshots ({:.3} s writing)",
        n_steps,
        loop_time.as_secs_f64(),
        snapshots,
        snapshot_time.as_secs_f64()
    );

    Ok(RunSummary {
        fine_dofs: system.mesh.num_dofs(),
        coarse_dofs: system.operators.mass.num_rows,
        steps: n_steps,
        snapshots,
        non_converged: stepper.non_converged,
    })
}

/// Validate the configuration, build the coarse system and run the loop.
///
/// `workers > 1` builds the bases on an in-process cluster; every rank ends
/// up with the same system, so the loop runs once on rank 0's copy.
pub fn run_with_observer<F>(
    config: &SimulationConfig,
    workers: usize,
    observer: F,
) -> Result<RunSummary, SimulationError>
where
    F: FnMut(usize, f64, &Array1<f64>),
{
    config.check()?;

    let system = if workers <= 1 {
        assemble_coarse_system(config, &SerialComm)?
    } else {
        let mut systems = LocalCluster::run(workers, |comm| assemble_coarse_system(config, comm))?;
        systems.swap_remove(0)
    };

    run_time_loop(config, &system, observer)
}

/// [`run_with_observer`] without an observer.
pub fn run(config: &SimulationConfig, workers: usize) -> Result<RunSummary, SimulationError> {
    run_with_observer(config, workers, |_step, _time, _u| {})
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.grid.nx = 8;
        config.grid.ny = 8;
        config.method.dg_kappa = 4.0;
        config.time.t_end = 0.01;
        config.time.dt = 1e-3;
        config.time.step_snap = 5;
        config.output.directory = std::env::temp_dir().join("msfem_simulation_test");
        config
    }

    #[test]
    fn test_serial_system_dimensions() {
        let config = small_config();
        let system = assemble_coarse_system(&config, &SerialComm).unwrap();

        // 2x2 blocks, 8 modes each.
        assert_eq!(system.operators.mass.num_rows, 32);
        assert_eq!(system.restriction.num_rows, 32);
        assert_eq!(system.restriction.num_cols, 8 * 8 * 4);
        assert_eq!(system.prolongation.num_rows, 8 * 8 * 4);
        assert_eq!(system.operators.rhs.len(), 32);
    }

    #[test]
    fn test_cluster_matches_serial() {
        let config = small_config();
        let serial = assemble_coarse_system(&config, &SerialComm).unwrap();
        let clustered = LocalCluster::run(4, |comm| assemble_coarse_system(&config, comm)).unwrap();

        let x: Array1<f64> = (0..serial.operators.mass.num_rows)
            .map(|i| (i as f64 * 0.37).sin())
            .collect();
        let serial_mass = serial.operators.mass.matvec(&x);
        let serial_stiff = serial.operators.stiffness.matvec(&x);

        for system in &clustered {
            assert_eq!(system.operators.mass.num_rows, serial.operators.mass.num_rows);
            let mass = system.operators.mass.matvec(&x);
            let stiff = system.operators.stiffness.matvec(&x);
            for i in 0..x.len() {
                assert!((mass[i] - serial_mass[i]).abs() <= 1e-9 * serial_mass[i].abs().max(1.0));
                assert!((stiff[i] - serial_stiff[i]).abs() <= 1e-9 * serial_stiff[i].abs().max(1.0));
            }
        }
    }

    #[test]
    fn test_run_reports_steps_and_snapshots() {
        let mut config = small_config();
        config.output.directory = std::env::temp_dir().join("msfem_simulation_run_test");
        let mut observed = 0;
        let summary = run_with_observer(&config, 1, |_, _, u| {
            observed += 1;
            assert!(u.iter().all(|v| v.is_finite()));
        })
        .unwrap();

        assert_eq!(summary.steps, 10);
        assert_eq!(summary.coarse_dofs, 32);
        // Cycle 0 plus steps 5 and 10.
        assert_eq!(summary.snapshots, 3);
        assert_eq!(observed, 10);
    }
}
