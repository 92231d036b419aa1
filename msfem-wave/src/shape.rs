//! Bilinear (Q1) shape functions on the reference square and the element
//! mapping between reference and physical coordinates.

use crate::mesh::Point;

/// Shape function values and reference-space gradients at one point.
#[derive(Debug, Clone, Copy)]
pub struct ShapeValues {
    pub values: [f64; 4],
    pub gradients: [[f64; 2]; 4],
}

/// Q1 shapes at `(xi, eta)` on `[-1, 1]^2`, corner order CCW from
/// lower-left (matching the mesh element node ordering).
pub fn q1_shape(xi: f64, eta: f64) -> ShapeValues {
    let values = [
        0.25 * (1.0 - xi) * (1.0 - eta),
        0.25 * (1.0 + xi) * (1.0 - eta),
        0.25 * (1.0 + xi) * (1.0 + eta),
        0.25 * (1.0 - xi) * (1.0 + eta),
    ];
    let gradients = [
        [-0.25 * (1.0 - eta), -0.25 * (1.0 - xi)],
        [0.25 * (1.0 - eta), -0.25 * (1.0 + xi)],
        [0.25 * (1.0 + eta), 0.25 * (1.0 + xi)],
        [-0.25 * (1.0 + eta), 0.25 * (1.0 - xi)],
    ];
    ShapeValues { values, gradients }
}

/// Jacobian of the reference-to-physical map at one quadrature point.
///
/// Row `a`, column `b` holds `d x_b / d xi_a`.
#[derive(Debug, Clone, Copy)]
pub struct Jacobian {
    pub matrix: [[f64; 2]; 2],
    pub det: f64,
    pub inverse: [[f64; 2]; 2],
}

impl Jacobian {
    /// Build the Jacobian from shape gradients and element corner coordinates.
    pub fn from_quad(shape: &ShapeValues, coords: &[Point; 4]) -> Self {
        let mut matrix = [[0.0; 2]; 2];
        for i in 0..4 {
            matrix[0][0] += shape.gradients[i][0] * coords[i].x;
            matrix[0][1] += shape.gradients[i][0] * coords[i].y;
            matrix[1][0] += shape.gradients[i][1] * coords[i].x;
            matrix[1][1] += shape.gradients[i][1] * coords[i].y;
        }
        let det = matrix[0][0] * matrix[1][1] - matrix[0][1] * matrix[1][0];
        let inv_det = 1.0 / det;
        let inverse = [
            [matrix[1][1] * inv_det, -matrix[0][1] * inv_det],
            [-matrix[1][0] * inv_det, matrix[0][0] * inv_det],
        ];
        Jacobian {
            matrix,
            det,
            inverse,
        }
    }

    /// Push a reference-space gradient to physical space.
    pub fn transform_gradient(&self, grad_ref: [f64; 2]) -> [f64; 2] {
        [
            self.inverse[0][0] * grad_ref[0] + self.inverse[0][1] * grad_ref[1],
            self.inverse[1][0] * grad_ref[0] + self.inverse[1][1] * grad_ref[1],
        ]
    }
}

/// Reference coordinates of a physical point inside an axis-aligned
/// rectangular cell with bounds `(x0, x1, y0, y1)`.
pub fn reference_coords(bounds: (f64, f64, f64, f64), x: f64, y: f64) -> (f64, f64) {
    let (x0, x1, y0, y1) = bounds;
    ((2.0 * x - x0 - x1) / (x1 - x0), (2.0 * y - y0 - y1) / (y1 - y0))
}
