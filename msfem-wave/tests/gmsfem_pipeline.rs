//! Scenario tests for the whole GMsFEM pipeline
//!
//! These run the complete chain (fine assembly, basis build, Galerkin
//! reduction, leapfrog loop) on small grids and check the structural and
//! physical properties the method guarantees.

use ndarray::Array1;
use std::path::PathBuf;

use gmsfem::assembly::assemble_mass;
use gmsfem::comm::SerialComm;
use gmsfem::config::SimulationConfig;
use gmsfem::media::MediaProperties;
use gmsfem::mesh::rectangular_mesh_quads;
use gmsfem::simulation::{assemble_coarse_system, run_with_observer};

/// 8x8 fine cells over 1 km x 1 km, 2x2 coarse blocks, uniform media.
fn uniform_config(test_name: &str) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.grid.nx = 8;
    config.grid.ny = 8;
    config.method.dg_kappa = 4.0;
    config.time.t_end = 0.01;
    config.time.dt = 1e-4;
    config.time.step_snap = 20;
    config.output.directory = std::env::temp_dir().join(test_name);
    config
}

fn snapshot_cycles(output_dir: &PathBuf) -> Vec<usize> {
    let mut cycles: Vec<usize> = std::fs::read_dir(output_dir.join("snapshots"))
        .unwrap()
        .map(|entry| {
            let name = entry.unwrap().file_name().into_string().unwrap();
            assert!(name.starts_with("GMsFEM_") && name.ends_with(".vtu"), "{}", name);
            name["GMsFEM_".len()..name.len() - ".vtu".len()]
                .parse()
                .unwrap()
        })
        .collect();
    cycles.sort_unstable();
    cycles
}

/// Point source at the domain center, 100 leapfrog steps: the field stays
/// finite, carries energy by mid-run and leaves snapshots at every
/// `step_snap` multiple plus cycle 0.
#[test]
fn test_end_to_end_wave_run() {
    let mut config = uniform_config("gmsfem_pipeline_end_to_end");
    config.source.spatial_function = "delta".to_string();
    let _ = std::fs::remove_dir_all(&config.output.directory);

    let mut norms = Vec::new();
    let summary = run_with_observer(&config, 1, |_step, _time, u| {
        assert!(u.iter().all(|v| v.is_finite()));
        norms.push(u.dot(u).sqrt());
    })
    .unwrap();

    assert_eq!(summary.steps, 100);
    assert_eq!(summary.fine_dofs, 8 * 8 * 4);
    assert_eq!(summary.coarse_dofs, 2 * 2 * 8);
    assert_eq!(norms.len(), 100);
    assert!(
        norms[49] > 0.0,
        "the source must have injected energy by step 50, |u| = {}",
        norms[49]
    );
    assert_eq!(summary.non_converged, 0);

    assert_eq!(
        snapshot_cycles(&config.output.directory),
        vec![0, 20, 40, 60, 80, 100]
    );
}

/// A zero-amplitude source on a zero initial state must keep every level
/// exactly zero, with no drift from the solver.
#[test]
fn test_zero_source_stays_exactly_zero() {
    let mut config = uniform_config("gmsfem_pipeline_zero_source");
    config.source.scale = 0.0;
    let _ = std::fs::remove_dir_all(&config.output.directory);

    let summary = run_with_observer(&config, 1, |step, _time, u| {
        assert!(
            u.iter().all(|&v| v == 0.0),
            "nonzero pressure at step {}",
            step
        );
    })
    .unwrap();
    assert_eq!(summary.non_converged, 0);
}

/// The serial path and a 4-worker cluster must produce the same coarse
/// system, hence the same trajectory.
#[test]
fn test_serial_and_cluster_runs_match() {
    let mut serial_config = uniform_config("gmsfem_pipeline_serial");
    serial_config.time.t_end = 5e-3;
    let mut cluster_config = serial_config.clone();
    cluster_config.output.directory = std::env::temp_dir().join("gmsfem_pipeline_cluster");
    let _ = std::fs::remove_dir_all(&serial_config.output.directory);
    let _ = std::fs::remove_dir_all(&cluster_config.output.directory);

    let mut last_serial = Array1::zeros(0);
    run_with_observer(&serial_config, 1, |_, _, u| last_serial = u.clone()).unwrap();

    let mut last_cluster = Array1::zeros(0);
    run_with_observer(&cluster_config, 4, |_, _, u| last_cluster = u.clone()).unwrap();

    assert_eq!(last_serial.len(), 32);
    assert_eq!(last_cluster.len(), 32);
    for i in 0..last_serial.len() {
        let scale = last_serial[i].abs().max(1.0);
        assert!(
            (last_serial[i] - last_cluster[i]).abs() <= 1e-10 * scale,
            "coarse DOF {} differs: {} vs {}",
            i,
            last_serial[i],
            last_cluster[i]
        );
    }
}

/// Structure of the restriction operator and the Galerkin congruence
/// `x'·M_coarse·x = (Rᵗx)'·M_fine·(Rᵗx)`.
#[test]
fn test_restriction_structure_and_galerkin_congruence() {
    let config = uniform_config("gmsfem_pipeline_structure");
    let system = assemble_coarse_system(&config, &SerialComm).unwrap();

    // 4 blocks of 8 modes over 256 fine DOFs.
    assert_eq!(system.restriction.num_rows, 32);
    assert_eq!(system.restriction.num_cols, 256);
    assert_eq!(system.prolongation.num_rows, 256);
    assert_eq!(system.prolongation.num_cols, 32);

    // Prolongation of the zero coarse vector is the zero fine vector.
    let zero = Array1::zeros(32);
    assert!(system.prolongation.matvec(&zero).iter().all(|&v| v == 0.0));

    // Congruence against an independently assembled fine mass operator.
    let mesh = rectangular_mesh_quads(0.0, 1000.0, 0.0, 1000.0, 8, 8);
    let media = MediaProperties::homogeneous(64, 2500.0, 3500.0).unwrap();
    let mass_fine = assemble_mass(&mesh, &media);

    for seed in [0.31, 0.77] {
        let x: Array1<f64> = (0..32).map(|i| (i as f64 * seed).cos()).collect();
        let coarse_energy = x.dot(&system.operators.mass.matvec(&x));
        let fine_x = system.prolongation.matvec(&x);
        let fine_energy = fine_x.dot(&mass_fine.matvec(&fine_x));
        assert!(
            (coarse_energy - fine_energy).abs() <= 1e-7 * fine_energy.abs().max(1e-30),
            "energies differ: {} vs {}",
            coarse_energy,
            fine_energy
        );
    }
}

/// With free outer boundaries the fine stiffness annihilates constants, so
/// the coarse stiffness must annihilate the coarse representation of the
/// constant field (one unit of mode 0 per block).
#[test]
fn test_free_boundary_stiffness_annihilates_constant_field() {
    let mut config = uniform_config("gmsfem_pipeline_constants");
    config.boundary = "free".to_string();
    let system = assemble_coarse_system(&config, &SerialComm).unwrap();

    let mut constant = Array1::zeros(32);
    for block in 0..4 {
        constant[block * 8] = 1.0;
    }

    // The prolongated field is the global constant up to solver tolerance.
    let fine = system.prolongation.matvec(&constant);
    for &v in fine.iter() {
        assert!((v - 1.0).abs() < 1e-8, "prolongated constant has value {}", v);
    }

    let reaction = system.operators.stiffness.matvec(&constant);
    let diagonal_scale = system
        .operators
        .stiffness
        .diagonal()
        .iter()
        .fold(0.0f64, |acc, &d| acc.max(d.abs()));
    // The bound absorbs the 1e-12 tolerance of the harmonic extensions.
    for &v in reaction.iter() {
        assert!(
            v.abs() <= 1e-5 * diagonal_scale.max(1e-30),
            "constant field produces stiffness reaction {}",
            v
        );
    }
}
