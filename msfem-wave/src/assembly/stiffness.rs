//! Acoustic stiffness matrix: volume term `integral (1/rho) grad u . grad v`
//! plus the interior-penalty face terms from [`super::faces`].

use solvers::CsrMatrix;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::media::MediaProperties;
use crate::mesh::{Mesh, Point, DOFS_PER_ELEMENT};
use crate::quadrature::gauss_quadrilateral;
use crate::shape::{q1_shape, Jacobian};

use super::faces::{boundary_face_triplets, interior_face_triplets, DgScheme};
use super::mass::{TRIPLET_TOLERANCE, VOLUME_QUADRATURE_ORDER};

/// Dense 4x4 element stiffness block with a constant coefficient.
pub(crate) fn element_stiffness_q1(coords: &[Point; 4], coeff: f64) -> [[f64; 4]; 4] {
    let mut local = [[0.0; 4]; 4];
    for qp in gauss_quadrilateral(VOLUME_QUADRATURE_ORDER) {
        let shape = q1_shape(qp.xi(), qp.eta());
        let jac = Jacobian::from_quad(&shape, coords);
        let scale = coeff * jac.det.abs() * qp.weight;

        let mut grads = [[0.0; 2]; 4];
        for (i, g) in grads.iter_mut().enumerate() {
            *g = jac.transform_gradient(shape.gradients[i]);
        }
        for i in 0..DOFS_PER_ELEMENT {
            for j in 0..DOFS_PER_ELEMENT {
                local[i][j] += scale * (grads[i][0] * grads[j][0] + grads[i][1] * grads[j][1]);
            }
        }
    }
    local
}

fn element_triplets(mesh: &Mesh, media: &MediaProperties, e: usize) -> Vec<(usize, usize, f64)> {
    let coords = mesh.element_coords(e);
    let local = element_stiffness_q1(&coords, media.inv_rho(mesh.elements[e].cell));
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

/// Assemble the global DG stiffness matrix.
pub fn assemble_stiffness(
    mesh: &Mesh,
    media: &MediaProperties,
    scheme: &DgScheme,
) -> CsrMatrix<f64> {
    #[cfg(feature = "rayon")]
    let per_element: Vec<Vec<(usize, usize, f64)>> = (0..mesh.num_elements())
        .into_par_iter()
        .map(|e| element_triplets(mesh, media, e))
        .collect();

    #[cfg(not(feature = "rayon"))]
    let per_element: Vec<Vec<(usize, usize, f64)>> = (0..mesh.num_elements())
        .map(|e| element_triplets(mesh, media, e))
        .collect();

    let mut triplets: Vec<(usize, usize, f64)> = per_element.into_iter().flatten().collect();
    triplets.extend(interior_face_triplets(mesh, media, scheme));
    triplets.extend(boundary_face_triplets(mesh, media, scheme));
    CsrMatrix::from_triplets(mesh.num_dofs(), mesh.num_dofs(), triplets)
}
