//! Structured mesh generation.

use super::types::{Mesh, Point};

/// Generate a structured quadrilateral mesh on `[x_min, x_max] x [y_min, y_max]`.
///
/// Nodes are laid out row by row (`j * (nx + 1) + i`), cells row-major
/// (`j * nx + i`), and every quad lists its corners counter-clockwise
/// starting at the lower-left. All cells are axis-aligned rectangles; the
/// assembly and source modules rely on that when mapping physical points to
/// reference coordinates.
pub fn rectangular_mesh_quads(
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    nx: usize,
    ny: usize,
) -> Mesh {
    assert!(nx > 0 && ny > 0, "mesh must have at least one cell per axis");
    assert!(x_max > x_min && y_max > y_min, "degenerate mesh extents");

    let mut mesh = Mesh::new();
    let dx = (x_max - x_min) / nx as f64;
    let dy = (y_max - y_min) / ny as f64;

    for j in 0..=ny {
        for i in 0..=nx {
            mesh.add_node(Point::new(x_min + i as f64 * dx, y_min + j as f64 * dy));
        }
    }

    let stride = nx + 1;
    for j in 0..ny {
        for i in 0..nx {
            let n00 = j * stride + i;
            let n10 = j * stride + i + 1;
            let n11 = (j + 1) * stride + i + 1;
            let n01 = (j + 1) * stride + i;
            mesh.add_element([n00, n10, n11, n01]);
        }
    }

    mesh.build_faces();
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_counts() {
        let mesh = rectangular_mesh_quads(0.0, 2.0, 0.0, 1.0, 4, 2);
        assert_eq!(mesh.num_nodes(), 5 * 3);
        assert_eq!(mesh.num_elements(), 8);
        // Interior faces: (nx-1)*ny vertical + nx*(ny-1) horizontal.
        assert_eq!(mesh.interior_faces.len(), 3 * 2 + 4 * 1);
        assert_eq!(mesh.boundary_faces.len(), 2 * 4 + 2 * 2);
    }

    #[test]
    fn test_total_measure() {
        let mesh = rectangular_mesh_quads(-1.0, 3.0, 0.0, 2.0, 5, 3);
        let total: f64 = (0..mesh.num_elements())
            .map(|e| mesh.element_measure(e))
            .sum();
        assert!((total - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_row_major_cells() {
        let mesh = rectangular_mesh_quads(0.0, 3.0, 0.0, 3.0, 3, 3);
        // Cell (i=1, j=2) has index 2*3+1 and center (1.5, 2.5).
        let center = mesh.element_center(7);
        assert!((center.x - 1.5).abs() < 1e-14);
        assert!((center.y - 2.5).abs() < 1e-14);
    }

    #[test]
    fn test_ccw_ordering() {
        let mesh = rectangular_mesh_quads(0.0, 1.0, 0.0, 1.0, 2, 2);
        for e in 0..mesh.num_elements() {
            let c = mesh.element_coords(e);
            let cross = (c[1].x - c[0].x) * (c[2].y - c[1].y)
                - (c[1].y - c[0].y) * (c[2].x - c[1].x);
            assert!(cross > 0.0, "element {} is not counter-clockwise", e);
        }
    }
}
