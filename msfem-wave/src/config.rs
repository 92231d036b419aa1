//! JSON configuration for the multiscale wave simulator.
//!
//! Every section and every field has a default, so a config file only needs
//! the values it overrides; an empty object is a complete (homogeneous,
//! 1 km x 1 km) setup. All cross-field validation lives in
//! [`SimulationConfig::check`], run once before anything is assembled.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::assembly::{BoundaryTreatment, DgScheme};
use crate::basis::BasisParams;
use crate::error::SimulationError;
use crate::media::MediaProperties;
use crate::partition::FineGrid;
use crate::source::{Source, SpatialKind};

/// Complete simulation setup loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Domain extent and fine grid resolution
    #[serde(default)]
    pub grid: GridConfig,
    /// Material model
    #[serde(default)]
    pub media: MediaConfig,
    /// Seismic source
    #[serde(default)]
    pub source: SourceConfig,
    /// Discretization and multiscale method parameters
    #[serde(default)]
    pub method: MethodConfig,
    /// Outer boundary treatment: "dirichlet" or "free"
    #[serde(default = "default_boundary")]
    pub boundary: String,
    /// Time loop parameters
    #[serde(default)]
    pub time: TimeConfig,
    /// Output locations and debug dumps
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_boundary() -> String {
    "dirichlet".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            media: MediaConfig::default(),
            source: SourceConfig::default(),
            method: MethodConfig::default(),
            boundary: default_boundary(),
            time: TimeConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Domain extent (meters) and fine-cell counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Size of the domain in x, m
    #[serde(default = "default_size")]
    pub sx: f64,
    /// Size of the domain in y, m
    #[serde(default = "default_size")]
    pub sy: f64,
    /// Number of fine cells in x
    #[serde(default = "default_cells")]
    pub nx: usize,
    /// Number of fine cells in y
    #[serde(default = "default_cells")]
    pub ny: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            sx: default_size(),
            sy: default_size(),
            nx: default_cells(),
            ny: default_cells(),
        }
    }
}

fn default_size() -> f64 {
    1000.0
}

fn default_cells() -> usize {
    32
}

/// Homogeneous material values, optionally overridden by per-cell binary
/// files (32-bit floats, row-major).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Density of homogeneous model, kg/m^3
    #[serde(default = "default_rho")]
    pub rho: f64,
    /// P-wave velocity of homogeneous model, m/s
    #[serde(default = "default_vp")]
    pub vp: f64,
    /// Density file, in kg/m^3
    #[serde(default)]
    pub rho_file: Option<PathBuf>,
    /// P-wave velocity file, in m/s
    #[serde(default)]
    pub vp_file: Option<PathBuf>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            rho: default_rho(),
            vp: default_vp(),
            rho_file: None,
            vp_file: None,
        }
    }
}

fn default_rho() -> f64 {
    2500.0
}

fn default_vp() -> f64 {
    3500.0
}

impl MediaConfig {
    /// Build the per-cell coefficient arrays for `n_cells` fine cells.
    pub fn load(&self, n_cells: usize) -> Result<MediaProperties, SimulationError> {
        match (&self.rho_file, &self.vp_file) {
            (Some(rho_file), Some(vp_file)) => {
                MediaProperties::from_files(n_cells, rho_file, vp_file)
            }
            (None, None) => MediaProperties::homogeneous(n_cells, self.rho, self.vp),
            _ => Err(SimulationError::config(
                "rho_file and vp_file must be given together",
            )),
        }
    }
}

/// Source location, wavelet and spatial shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// x-coord of the source location, m
    #[serde(default = "default_source_coord")]
    pub x: f64,
    /// y-coord of the source location, m
    #[serde(default = "default_source_coord")]
    pub y: f64,
    /// Central frequency of the Ricker wavelet, Hz
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    /// Scaling factor for the source
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Spatial function of the source: "delta" or "gauss"
    #[serde(default = "default_spatial")]
    pub spatial_function: String,
    /// Support of the "gauss" spatial function, in fine-cell diagonals
    #[serde(default = "default_gauss_support")]
    pub gauss_support: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            x: default_source_coord(),
            y: default_source_coord(),
            frequency: default_frequency(),
            scale: default_scale(),
            spatial_function: default_spatial(),
            gauss_support: default_gauss_support(),
        }
    }
}

fn default_source_coord() -> f64 {
    500.0
}

fn default_frequency() -> f64 {
    10.0
}

fn default_scale() -> f64 {
    1e6
}

fn default_spatial() -> String {
    "gauss".to_string()
}

fn default_gauss_support() -> f64 {
    10.0
}

impl SourceConfig {
    /// Convert to the runtime source description.
    pub fn to_source(&self) -> Result<Source, SimulationError> {
        let spatial = match self.spatial_function.as_str() {
            "delta" => SpatialKind::Delta,
            "gauss" => SpatialKind::Gauss,
            other => {
                return Err(SimulationError::config(format!(
                    "unknown spatial function of the source: {}",
                    other
                )))
            }
        };
        Ok(Source {
            x: self.x,
            y: self.y,
            frequency: self.frequency,
            scale: self.scale,
            spatial,
            gauss_support: self.gauss_support,
        })
    }
}

/// Fine-element order, interior penalty parameters and the multiscale
/// space sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodConfig {
    /// Finite element order (polynomial degree)
    #[serde(default = "default_order")]
    pub order: usize,
    /// Sigma in the DG method (-1: symmetric interior penalty)
    #[serde(default = "default_dg_sigma")]
    pub dg_sigma: f64,
    /// Kappa (penalty weight) in the DG method
    #[serde(default = "default_dg_kappa")]
    pub dg_kappa: f64,
    /// Number of coarse blocks in x
    #[serde(default = "default_coarse")]
    pub coarse_nx: usize,
    /// Number of coarse blocks in y
    #[serde(default = "default_coarse")]
    pub coarse_ny: usize,
    /// Boundary basis functions per coarse block
    #[serde(default = "default_modes")]
    pub n_boundary: usize,
    /// Interior basis functions per coarse block
    #[serde(default = "default_modes")]
    pub n_interior: usize,
}

impl Default for MethodConfig {
    fn default() -> Self {
        Self {
            order: default_order(),
            dg_sigma: default_dg_sigma(),
            dg_kappa: default_dg_kappa(),
            coarse_nx: default_coarse(),
            coarse_ny: default_coarse(),
            n_boundary: default_modes(),
            n_interior: default_modes(),
        }
    }
}

fn default_order() -> usize {
    1
}

fn default_dg_sigma() -> f64 {
    -1.0
}

fn default_dg_kappa() -> f64 {
    1.0
}

fn default_coarse() -> usize {
    2
}

fn default_modes() -> usize {
    4
}

/// Time loop length and output cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Simulation time, s
    #[serde(default = "default_t_end")]
    pub t_end: f64,
    /// Time step, s
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Steps between snapshots
    #[serde(default = "default_step_snap")]
    pub step_snap: usize,
    /// Steps between seismogram records
    #[serde(default = "default_step_seis")]
    pub step_seis: usize,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            t_end: default_t_end(),
            dt: default_dt(),
            step_snap: default_step_snap(),
            step_seis: default_step_seis(),
        }
    }
}

fn default_t_end() -> f64 {
    1.0
}

fn default_dt() -> f64 {
    1e-3
}

fn default_step_snap() -> usize {
    1000
}

fn default_step_seis() -> usize {
    1
}

/// Output directory and debug dumps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory to save results of computations
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
    /// Extra string for naming output files
    #[serde(default)]
    pub extra_string: String,
    /// Dump every assembled matrix as triplet files
    #[serde(default)]
    pub print_matrices: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            extra_string: String::new(),
            print_matrices: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl SimulationConfig {
    /// Load configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SimulationError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| {
            SimulationError::config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Validate everything that can be checked before assembly starts.
    ///
    /// Per-block mode-count limits depend on the partition and are checked
    /// by the basis builder; this only rejects what is globally wrong.
    pub fn check(&self) -> Result<(), SimulationError> {
        if self.grid.sx <= 0.0 || self.grid.sy <= 0.0 {
            return Err(SimulationError::config(format!(
                "size of the domain (sx={} m, sy={} m) must be >0",
                self.grid.sx, self.grid.sy
            )));
        }
        if self.grid.nx == 0 || self.grid.ny == 0 {
            return Err(SimulationError::config(
                "number of cells (nx, ny) must be >0",
            ));
        }
        if self.method.order != 1 {
            return Err(SimulationError::config(format!(
                "only bilinear elements are supported (order 1), got order {}",
                self.method.order
            )));
        }
        if self.method.coarse_nx == 0
            || self.method.coarse_ny == 0
            || self.method.coarse_nx > self.grid.nx
            || self.method.coarse_ny > self.grid.ny
        {
            return Err(SimulationError::config(format!(
                "coarse grid {}x{} must be between 1x1 and the fine grid {}x{}",
                self.method.coarse_nx, self.method.coarse_ny, self.grid.nx, self.grid.ny
            )));
        }
        if self.method.n_boundary == 0 {
            return Err(SimulationError::config(
                "at least one boundary basis function per block is required",
            ));
        }
        match self.boundary.as_str() {
            "dirichlet" | "free" => {}
            other => {
                return Err(SimulationError::config(format!(
                    "unknown boundary condition: {}",
                    other
                )))
            }
        }
        if self.time.t_end <= 0.0 {
            return Err(SimulationError::config(format!(
                "simulation time T={} must be >0",
                self.time.t_end
            )));
        }
        if self.time.dt <= 0.0 || self.time.dt >= self.time.t_end {
            return Err(SimulationError::config(format!(
                "time step dt={} must be positive and smaller than T={}",
                self.time.dt, self.time.t_end
            )));
        }
        if self.time.step_snap == 0 || self.time.step_seis == 0 {
            return Err(SimulationError::config(
                "step_snap and step_seis must be >0",
            ));
        }
        if self.media.rho_file.is_none() && (self.media.rho <= 0.0 || self.media.vp <= 0.0) {
            return Err(SimulationError::config(format!(
                "homogeneous media (rho={}, vp={}) must be >0",
                self.media.rho, self.media.vp
            )));
        }

        let source = self.source.to_source()?;
        source.validate((0.0, self.grid.sx, 0.0, self.grid.sy))?;
        Ok(())
    }

    /// Fine-grid descriptor with the domain anchored at the origin.
    pub fn fine_grid(&self) -> FineGrid {
        FineGrid::new(
            0.0,
            0.0,
            self.grid.sx,
            self.grid.sy,
            self.grid.nx,
            self.grid.ny,
        )
    }

    /// Penalty scheme of the global fine-scale forms.
    pub fn dg_scheme(&self) -> Result<DgScheme, SimulationError> {
        let boundary = match self.boundary.as_str() {
            "dirichlet" => BoundaryTreatment::WeakDirichlet,
            "free" => BoundaryTreatment::Free,
            other => {
                return Err(SimulationError::config(format!(
                    "unknown boundary condition: {}",
                    other
                )))
            }
        };
        Ok(DgScheme {
            sigma: self.method.dg_sigma,
            kappa: self.method.dg_kappa,
            boundary,
        })
    }

    /// Mode counts and penalties of the local basis problems.
    pub fn basis_params(&self) -> BasisParams {
        BasisParams {
            n_boundary: self.method.n_boundary,
            n_interior: self.method.n_interior,
            sigma: self.method.dg_sigma,
            kappa: self.method.dg_kappa,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config: SimulationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.grid.nx, 32);
        assert_eq!(config.grid.sy, 1000.0);
        assert_eq!(config.media.rho, 2500.0);
        assert_eq!(config.source.frequency, 10.0);
        assert_eq!(config.method.dg_kappa, 1.0);
        assert_eq!(config.method.coarse_nx, 2);
        assert_eq!(config.boundary, "dirichlet");
        assert_eq!(config.time.step_snap, 1000);
        assert!(!config.output.print_matrices);
        config.check().unwrap();
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let json = r#"{
            "grid": { "nx": 8, "ny": 8 },
            "method": { "n_interior": 0 },
            "time": { "t_end": 0.01, "dt": 1e-4 }
        }"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.grid.nx, 8);
        assert_eq!(config.grid.sx, 1000.0);
        assert_eq!(config.method.n_interior, 0);
        assert_eq!(config.method.n_boundary, 4);
        assert_eq!(config.time.step_seis, 1);
        config.check().unwrap();
    }

    #[test]
    fn test_check_rejects_bad_values() {
        let mut config = SimulationConfig::default();
        config.time.dt = 2.0;
        assert!(matches!(config.check(), Err(SimulationError::Config(_))));

        let mut config = SimulationConfig::default();
        config.boundary = "absorbing".to_string();
        assert!(matches!(config.check(), Err(SimulationError::Config(_))));

        let mut config = SimulationConfig::default();
        config.method.order = 2;
        assert!(matches!(config.check(), Err(SimulationError::Config(_))));

        let mut config = SimulationConfig::default();
        config.method.coarse_nx = 64;
        assert!(matches!(config.check(), Err(SimulationError::Config(_))));

        let mut config = SimulationConfig::default();
        config.source.frequency = -1.0;
        assert!(matches!(config.check(), Err(SimulationError::Config(_))));

        let mut config = SimulationConfig::default();
        config.source.x = 5000.0;
        assert!(matches!(config.check(), Err(SimulationError::Config(_))));
    }

    #[test]
    fn test_from_file_roundtrip() {
        let dir = std::env::temp_dir().join("msfem_config_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        fs::write(&path, r#"{ "source": { "spatial_function": "delta" } }"#).unwrap();

        let config = SimulationConfig::from_file(&path).unwrap();
        assert_eq!(config.source.spatial_function, "delta");
        assert_eq!(config.source.to_source().unwrap().spatial, SpatialKind::Delta);

        let err = SimulationConfig::from_file(dir.join("missing.json")).unwrap_err();
        assert!(matches!(err, SimulationError::Io(_)));
    }

    #[test]
    fn test_converters() {
        let mut config = SimulationConfig::default();
        config.boundary = "free".to_string();
        config.method.dg_kappa = 4.0;

        let scheme = config.dg_scheme().unwrap();
        assert_eq!(scheme.boundary, BoundaryTreatment::Free);
        assert_eq!(scheme.kappa, 4.0);

        let params = config.basis_params();
        assert_eq!(params.n_boundary, 4);
        assert_eq!(params.sigma, -1.0);

        let grid = config.fine_grid();
        assert_eq!(grid.nx, 32);
        assert!((grid.hx - 31.25).abs() < 1e-12);
    }
}
