//! Material properties sampled per fine-grid cell.
//!
//! The acoustic operators use the reciprocals: the mass form carries `1/K`
//! with bulk modulus `K = rho * vp^2`, the stiffness form carries `1/rho`.
//! Properties are frozen after construction and shared read-only by every
//! local basis build.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::SimulationError;

/// Per-cell density and velocity with precomputed reciprocal coefficients.
#[derive(Debug, Clone)]
pub struct MediaProperties {
    rho: Vec<f64>,
    vp: Vec<f64>,
    inv_rho: Vec<f64>,
    inv_kappa: Vec<f64>,
}

impl MediaProperties {
    /// Uniform media over `n_cells` cells.
    pub fn homogeneous(n_cells: usize, rho: f64, vp: f64) -> Result<Self, SimulationError> {
        Self::build(vec![rho; n_cells], vec![vp; n_cells])
    }

    /// Load per-cell density and velocity from raw little-endian `f32` files.
    ///
    /// Each file must hold exactly `n_cells` values in fine-grid cell order.
    pub fn from_files(
        n_cells: usize,
        rho_path: &Path,
        vp_path: &Path,
    ) -> Result<Self, SimulationError> {
        let rho = read_f32_values(rho_path, n_cells)?;
        let vp = read_f32_values(vp_path, n_cells)?;
        Self::build(rho, vp)
    }

    fn build(rho: Vec<f64>, vp: Vec<f64>) -> Result<Self, SimulationError> {
        if rho.len() != vp.len() {
            return Err(SimulationError::DimensionMismatch {
                expected: rho.len(),
                actual: vp.len(),
            });
        }
        let mut inv_rho = Vec::with_capacity(rho.len());
        let mut inv_kappa = Vec::with_capacity(rho.len());
        let mut kappa_range = (f64::INFINITY, f64::NEG_INFINITY);
        for (cell, (&r, &v)) in rho.iter().zip(vp.iter()).enumerate() {
            if r <= 0.0 || v <= 0.0 {
                return Err(SimulationError::config(format!(
                    "non-positive media in cell {}: rho = {}, vp = {}",
                    cell, r, v
                )));
            }
            let kappa = r * v * v;
            kappa_range = (kappa_range.0.min(kappa), kappa_range.1.max(kappa));
            inv_rho.push(1.0 / r);
            inv_kappa.push(1.0 / kappa);
        }

        log::info!("Media rho: ({}, {})", min_max(&rho).0, min_max(&rho).1);
        log::info!("Media vp: ({}, {})", min_max(&vp).0, min_max(&vp).1);
        log::info!("Media kappa: ({}, {})", kappa_range.0, kappa_range.1);
        Ok(MediaProperties {
            rho,
            vp,
            inv_rho,
            inv_kappa,
        })
    }

    pub fn num_cells(&self) -> usize {
        self.rho.len()
    }

    pub fn rho(&self, cell: usize) -> f64 {
        self.rho[cell]
    }

    pub fn vp(&self, cell: usize) -> f64 {
        self.vp[cell]
    }

    /// Stiffness coefficient `1/rho` of a cell.
    pub fn inv_rho(&self, cell: usize) -> f64 {
        self.inv_rho[cell]
    }

    /// Mass coefficient `1/K = 1/(rho * vp^2)` of a cell.
    pub fn inv_kappa(&self, cell: usize) -> f64 {
        self.inv_kappa[cell]
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn read_f32_values(path: &Path, expected: usize) -> Result<Vec<f64>, SimulationError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    if bytes.len() != expected * 4 {
        return Err(SimulationError::config(format!(
            "media file {} holds {} bytes, expected {} ({} f32 values)",
            path.display(),
            bytes.len(),
            expected * 4,
            expected
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64)
        .collect())
}
