//! Acoustic mass matrix: `m(u, v) = integral (1/K) u v` with `K = rho vp^2`.
//!
//! DG Q1 makes the mass matrix block diagonal: each element contributes a
//! dense 4x4 block on its own DOFs and couples to nothing else.

use ndarray::Array1;
use solvers::CsrMatrix;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::media::MediaProperties;
use crate::mesh::{Mesh, Point, DOFS_PER_ELEMENT};
use crate::quadrature::gauss_quadrilateral;
use crate::shape::{q1_shape, Jacobian};

/// Entries below this are dropped before CSR conversion.
pub(crate) const TRIPLET_TOLERANCE: f64 = 1e-15;

/// Quadrature order for volume integrals of Q1 products.
pub(crate) const VOLUME_QUADRATURE_ORDER: usize = 2;

/// Dense 4x4 element mass block with a constant coefficient.
pub(crate) fn element_mass_q1(coords: &[Point; 4], coeff: f64) -> [[f64; 4]; 4] {
    let mut local = [[0.0; 4]; 4];
    for qp in gauss_quadrilateral(VOLUME_QUADRATURE_ORDER) {
        let shape = q1_shape(qp.xi(), qp.eta());
        let jac = Jacobian::from_quad(&shape, coords);
        let scale = coeff * jac.det.abs() * qp.weight;
        for i in 0..DOFS_PER_ELEMENT {
            for j in 0..DOFS_PER_ELEMENT {
                local[i][j] += scale * shape.values[i] * shape.values[j];
            }
        }
    }
    local
}

fn element_triplets(mesh: &Mesh, media: &MediaProperties, e: usize) -> Vec<(usize, usize, f64)> {
    let coords = mesh.element_coords(e);
    let local = element_mass_q1(&coords, media.inv_kappa(mesh.elements[e].cell));
    let mut triplets = Vec::with_capacity(DOFS_PER_ELEMENT * DOFS_PER_ELEMENT);
    for i in 0..DOFS_PER_ELEMENT {
        for j in 0..DOFS_PER_ELEMENT {
            if local[i][j].abs() > TRIPLET_TOLERANCE {
                triplets.push((Mesh::dof(e, i), Mesh::dof(e, j), local[i][j]));
            }
        }
    }
    triplets
}

/// Assemble the global mass matrix.
pub fn assemble_mass(mesh: &Mesh, media: &MediaProperties) -> CsrMatrix<f64> {
    #[cfg(feature = "rayon")]
    let per_element: Vec<Vec<(usize, usize, f64)>> = (0..mesh.num_elements())
        .into_par_iter()
        .map(|e| element_triplets(mesh, media, e))
        .collect();

    #[cfg(not(feature = "rayon"))]
    let per_element: Vec<Vec<(usize, usize, f64)>> = (0..mesh.num_elements())
        .map(|e| element_triplets(mesh, media, e))
        .collect();

    let triplets: Vec<(usize, usize, f64)> = per_element.into_iter().flatten().collect();
    CsrMatrix::from_triplets(mesh.num_dofs(), mesh.num_dofs(), triplets)
}

/// Row-sum lumped mass vector, used to scale local spectral problems.
pub fn assemble_lumped_mass(mesh: &Mesh, media: &MediaProperties) -> Array1<f64> {
    let mut lumped = Array1::zeros(mesh.num_dofs());
    for e in 0..mesh.num_elements() {
        let coords = mesh.element_coords(e);
        let local = element_mass_q1(&coords, media.inv_kappa(mesh.elements[e].cell));
        for i in 0..DOFS_PER_ELEMENT {
            let row_sum: f64 = local[i].iter().sum();
            lumped[Mesh::dof(e, i)] += row_sum;
        }
    }
    lumped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::rectangular_mesh_quads;

    #[test]
    fn test_element_mass_unit_square_unit_coeff() {
        let coords = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        let local = element_mass_q1(&coords, 1.0);
        // Q1 mass on the unit square: diagonal 1/9, adjacent 1/18, opposite 1/36.
        assert!((local[0][0] - 1.0 / 9.0).abs() < 1e-14);
        assert!((local[0][1] - 1.0 / 18.0).abs() < 1e-14);
        assert!((local[0][2] - 1.0 / 36.0).abs() < 1e-14);
        for i in 0..4 {
            for j in 0..4 {
                assert!((local[i][j] - local[j][i]).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn test_mass_total_integral() {
        // Summing all entries integrates 1/K over the whole domain.
        let mesh = rectangular_mesh_quads(0.0, 2.0, 0.0, 1.0, 4, 2);
        let media = MediaProperties::homogeneous(mesh.num_elements(), 2500.0, 3500.0).unwrap();
        let mass = assemble_mass(&mesh, &media);

        let total: f64 = (0..mass.num_rows)
            .flat_map(|i| mass.row_entries(i).map(|(_, v)| v).collect::<Vec<_>>())
            .sum();
        let expected = 2.0 * 1.0 / (2500.0 * 3500.0 * 3500.0);
        assert!(
            (total - expected).abs() < 1e-18,
            "total {} vs {}",
            total,
            expected
        );
    }

    #[test]
    fn test_mass_block_diagonal() {
        let mesh = rectangular_mesh_quads(0.0, 1.0, 0.0, 1.0, 2, 2);
        let media = MediaProperties::homogeneous(4, 1.0, 1.0).unwrap();
        let mass = assemble_mass(&mesh, &media);
        for row in 0..mass.num_rows {
            let block = row / DOFS_PER_ELEMENT;
            for (col, _) in mass.row_entries(row) {
                assert_eq!(col / DOFS_PER_ELEMENT, block);
            }
        }
    }

    #[test]
    fn test_lumped_matches_row_sums() {
        let mesh = rectangular_mesh_quads(0.0, 1.0, 0.0, 1.0, 3, 3);
        let media = MediaProperties::homogeneous(9, 1000.0, 2000.0).unwrap();
        let mass = assemble_mass(&mesh, &media);
        let lumped = assemble_lumped_mass(&mesh, &media);
        for row in 0..mass.num_rows {
            let sum: f64 = mass.row_entries(row).map(|(_, v)| v).sum();
            assert!((lumped[row] - sum).abs() < 1e-15);
        }
    }
}
