//! Seismic source: Ricker wavelet in time, point load or Gaussian in space.

use ndarray::Array1;

use crate::error::SimulationError;
use crate::mesh::{Mesh, DOFS_PER_ELEMENT};
use crate::quadrature::gauss_quadrilateral;
use crate::shape::{q1_shape, reference_coords, Jacobian};

/// Spatial shape of the load vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialKind {
    /// Point load at the source location.
    Delta,
    /// Gaussian bump centered at the source location.
    Gauss,
}

/// Source description: location, wavelet parameters and spatial shape.
#[derive(Debug, Clone)]
pub struct Source {
    pub x: f64,
    pub y: f64,
    pub frequency: f64,
    pub scale: f64,
    pub spatial: SpatialKind,
    pub gauss_support: f64,
}

impl Source {
    /// Ricker wavelet at time `t`, delayed by one period and multiplied by
    /// the amplitude scale.
    pub fn ricker(&self, t: f64) -> f64 {
        let shifted = t - 1.0 / self.frequency;
        let arg = std::f64::consts::PI * self.frequency * shifted;
        let arg2 = arg * arg;
        self.scale * (1.0 - 2.0 * arg2) * (-arg2).exp()
    }

    /// Wavelet values for every step of the loop: entry `k` is the value at
    /// `k * dt`, matching a three-level scheme that applies the load of the
    /// previous time level.
    pub fn time_series(&self, dt: f64, n_steps: usize) -> Vec<f64> {
        (0..n_steps).map(|k| self.ricker(k as f64 * dt)).collect()
    }

    /// Early validation of the wavelet and spatial parameters.
    pub fn validate(&self, bounds: (f64, f64, f64, f64)) -> Result<(), SimulationError> {
        if self.frequency <= 0.0 {
            return Err(SimulationError::config(format!(
                "source frequency must be positive, got {}",
                self.frequency
            )));
        }
        if self.spatial == SpatialKind::Gauss && self.gauss_support <= 0.0 {
            return Err(SimulationError::config(format!(
                "gauss support must be positive, got {}",
                self.gauss_support
            )));
        }
        let (x0, x1, y0, y1) = bounds;
        if self.x < x0 || self.x > x1 || self.y < y0 || self.y > y1 {
            return Err(SimulationError::config(format!(
                "source location ({}, {}) lies outside the domain [{}, {}] x [{}, {}]",
                self.x, self.y, x0, x1, y0, y1
            )));
        }
        Ok(())
    }
}

const SOURCE_QUADRATURE_ORDER: usize = 3;

/// Assemble the fine-scale load vector of the spatial source part.
///
/// The time dependence is applied per step by the integrator, so this is
/// computed once before the loop.
pub fn assemble_source(mesh: &Mesh, source: &Source) -> Result<Array1<f64>, SimulationError> {
    let rhs = match source.spatial {
        SpatialKind::Delta => point_load(mesh, source)?,
        SpatialKind::Gauss => gaussian_load(mesh, source),
    };
    let norm: f64 = rhs.iter().map(|v| v * v).sum::<f64>().sqrt();
    log::info!("||b_h||_L2 = {:.6e}", norm);
    Ok(rhs)
}

fn point_load(mesh: &Mesh, source: &Source) -> Result<Array1<f64>, SimulationError> {
    let mut rhs = Array1::zeros(mesh.num_dofs());
    for e in 0..mesh.num_elements() {
        let (x0, x1, y0, y1) = mesh.element_bounds(e);
        if source.x < x0 || source.x > x1 || source.y < y0 || source.y > y1 {
            continue;
        }
        let (xi, eta) = reference_coords((x0, x1, y0, y1), source.x, source.y);
        let shape = q1_shape(xi, eta);
        for k in 0..DOFS_PER_ELEMENT {
            rhs[Mesh::dof(e, k)] = shape.values[k];
        }
        return Ok(rhs);
    }
    Err(SimulationError::config(format!(
        "source location ({}, {}) lies outside the mesh",
        source.x, source.y
    )))
}

fn gaussian_load(mesh: &Mesh, source: &Source) -> Array1<f64> {
    // Support scales with the fine cell diagonal, so refining the grid
    // sharpens the bump.
    let (x0, x1, y0, y1) = mesh.element_bounds(0);
    let diagonal = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
    let support = source.gauss_support * diagonal;
    let inv_support2 = 1.0 / (support * support);

    let points = gauss_quadrilateral(SOURCE_QUADRATURE_ORDER);
    let mut rhs = Array1::zeros(mesh.num_dofs());
    for e in 0..mesh.num_elements() {
        let coords = mesh.element_coords(e);
        for qp in &points {
            let shape = q1_shape(qp.xi(), qp.eta());
            let jac = Jacobian::from_quad(&shape, &coords);

            let mut x = 0.0;
            let mut y = 0.0;
            for k in 0..DOFS_PER_ELEMENT {
                x += shape.values[k] * coords[k].x;
                y += shape.values[k] * coords[k].y;
            }
            let r2 = (x - source.x).powi(2) + (y - source.y).powi(2);
            let weight = qp.weight * jac.det * (-r2 * inv_support2).exp();

            for k in 0..DOFS_PER_ELEMENT {
                rhs[Mesh::dof(e, k)] += weight * shape.values[k];
            }
        }
    }
    rhs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::rectangular_mesh_quads;
    use approx::assert_relative_eq;

    fn test_source(spatial: SpatialKind) -> Source {
        Source {
            x: 500.0,
            y: 500.0,
            frequency: 10.0,
            scale: 1e6,
            spatial,
            gauss_support: 10.0,
        }
    }

    #[test]
    fn test_ricker_peak_at_one_period() {
        let source = test_source(SpatialKind::Gauss);
        assert_relative_eq!(source.ricker(0.1), 1e6, epsilon = 1e-6);
        // Far from the delay the wavelet has decayed to nothing.
        assert!(source.ricker(1.0).abs() < 1e-3);
        // One half-period off the peak the wavelet is negative.
        assert!(source.ricker(0.15) < 0.0);
    }

    #[test]
    fn test_time_series_samples_at_step_times() {
        let source = test_source(SpatialKind::Gauss);
        let series = source.time_series(1e-3, 200);
        assert_eq!(series.len(), 200);
        assert_relative_eq!(series[0], source.ricker(0.0), epsilon = 1e-12);
        assert_relative_eq!(series[100], 1e6, epsilon = 1e-6);
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let bounds = (0.0, 1000.0, 0.0, 1000.0);
        let mut source = test_source(SpatialKind::Gauss);
        assert!(source.validate(bounds).is_ok());

        source.frequency = 0.0;
        assert!(matches!(
            source.validate(bounds),
            Err(SimulationError::Config(_))
        ));

        source.frequency = 10.0;
        source.gauss_support = -1.0;
        assert!(matches!(
            source.validate(bounds),
            Err(SimulationError::Config(_))
        ));

        source.gauss_support = 10.0;
        source.x = 1500.0;
        assert!(matches!(
            source.validate(bounds),
            Err(SimulationError::Config(_))
        ));
    }

    #[test]
    fn test_point_load_hits_one_element() {
        let mesh = rectangular_mesh_quads(0.0, 1000.0, 0.0, 1000.0, 4, 4);
        let mut source = test_source(SpatialKind::Delta);
        source.x = 300.0;
        source.y = 400.0;

        let rhs = assemble_source(&mesh, &source).unwrap();
        let nonzero: Vec<usize> = (0..rhs.len()).filter(|&i| rhs[i] != 0.0).collect();
        assert_eq!(nonzero.len(), 4);
        // All four weights belong to the same element and sum to one.
        assert!(nonzero.iter().all(|&i| i / 4 == nonzero[0] / 4));
        let total: f64 = nonzero.iter().map(|&i| rhs[i]).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_point_load_outside_mesh_fails() {
        let mesh = rectangular_mesh_quads(0.0, 1000.0, 0.0, 1000.0, 4, 4);
        let mut source = test_source(SpatialKind::Delta);
        source.x = -10.0;
        let err = assemble_source(&mesh, &source).unwrap_err();
        assert!(matches!(err, SimulationError::Config(_)));
    }

    #[test]
    fn test_gaussian_load_concentrates_near_source() {
        let mesh = rectangular_mesh_quads(0.0, 1000.0, 0.0, 1000.0, 8, 8);
        let source = Source {
            gauss_support: 1.0,
            ..test_source(SpatialKind::Gauss)
        };

        let rhs = assemble_source(&mesh, &source).unwrap();
        assert!(rhs.iter().all(|v| v.is_finite()));
        let total: f64 = rhs.iter().sum();
        assert!(total > 0.0);

        let peak = (0..rhs.len())
            .max_by(|&a, &b| rhs[a].abs().partial_cmp(&rhs[b].abs()).unwrap())
            .unwrap();
        let center = mesh.element_center(peak / 4);
        assert!(center.distance_to(&crate::mesh::Point::new(500.0, 500.0)) < 200.0);
    }
}
