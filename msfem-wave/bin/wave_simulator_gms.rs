//! Acoustic Wave Simulator using GMsFEM
//!
//! Solves the transient acoustic wave equation on a heterogeneous medium
//! with a generalized multiscale finite element method: local basis
//! functions are built per coarse block from the fine-scale material data,
//! the fine DG system is Galerkin-reduced through their span, and the small
//! coarse system is stepped with an explicit leapfrog scheme.
//!
//! Usage:
//!   cargo run --release --bin wave_simulator_gms -- --config config.json
//!   cargo run --release --bin wave_simulator_gms -- --help

use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use gmsfem::{simulation, SimulationConfig};

#[derive(Parser, Debug)]
#[command(name = "wave_simulator_gms")]
#[command(about = "Acoustic wave simulator using the generalized multiscale FEM")]
struct Args {
    /// Path to JSON configuration file (defaults used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the output directory from the configuration
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Number of in-process workers for the basis build
    #[arg(short, long, default_value = "1")]
    workers: usize,

    /// Dump every assembled matrix as triplet files
    #[arg(long)]
    print_matrices: bool,

    /// Increase log verbosity (-v: info, -vv: debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let mut config = if let Some(config_path) = &args.config {
        println!("Loading configuration from: {}", config_path.display());
        SimulationConfig::from_file(config_path)?
    } else {
        println!("No configuration file specified, using defaults");
        SimulationConfig::default()
    };
    if let Some(output_dir) = args.output_dir {
        config.output.directory = output_dir;
    }
    if args.print_matrices {
        config.output.print_matrices = true;
    }

    println!(
        "Grid: {} x {} m, {} x {} fine cells, {} x {} coarse blocks",
        config.grid.sx,
        config.grid.sy,
        config.grid.nx,
        config.grid.ny,
        config.method.coarse_nx,
        config.method.coarse_ny
    );
    println!(
        "Basis: {} boundary + {} interior modes per block, {} worker(s)",
        config.method.n_boundary, config.method.n_interior, args.workers
    );
    println!(
        "Time: T = {} s, dt = {} s, snapshots every {} steps",
        config.time.t_end, config.time.dt, config.time.step_snap
    );

    let start = Instant::now();
    let summary = simulation::run(&config, args.workers)?;
    let elapsed = start.elapsed();

    println!(
        "\nDone: {} steps on {} coarse DOFs ({} fine) in {:.2} s",
        summary.steps,
        summary.coarse_dofs,
        summary.fine_dofs,
        elapsed.as_secs_f64()
    );
    println!(
        "Snapshots written: {} (under {})",
        summary.snapshots,
        config.output.directory.display()
    );
    if summary.non_converged > 0 {
        println!(
            "Warning: {} coarse solves stopped at the iteration cap",
            summary.non_converged
        );
    }

    Ok(())
}
