//! Interior-penalty face terms of the DG stiffness form.
//!
//! For a face F with sides m (minus) and p (plus), coefficient `q = 1/rho`
//! and normal pointing from m to p, the scheme adds
//!
//! ```text
//!   - <{q du/dn}, [v]>  +  sigma <[u], {q dv/dn}>  +  kappa <{q/h} [u], [v]>
//! ```
//!
//! with `[w] = w_m - w_p`, `{w} = (w_m + w_p) / 2` and `h` the adjacent cell
//! measure divided by the face length. `sigma = -1` gives the symmetric
//! interior penalty scheme. On boundary faces the one-sided value replaces
//! the average and the jump is the trace itself, which enforces `u = 0`
//! weakly.

use crate::media::MediaProperties;
use crate::mesh::{Mesh, DOFS_PER_ELEMENT};
use crate::quadrature::gauss_legendre_1d;
use crate::shape::{q1_shape, reference_coords, Jacobian};

use super::mass::TRIPLET_TOLERANCE;

/// Treatment of the outer boundary of the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryTreatment {
    /// Weak homogeneous Dirichlet via one-sided penalty terms.
    WeakDirichlet,
    /// No boundary face terms (natural, reflecting boundary).
    Free,
}

/// Interior-penalty parameters of the stiffness form.
#[derive(Debug, Clone, Copy)]
pub struct DgScheme {
    pub sigma: f64,
    pub kappa: f64,
    pub boundary: BoundaryTreatment,
}

impl Default for DgScheme {
    fn default() -> Self {
        DgScheme {
            sigma: -1.0,
            kappa: 1.0,
            boundary: BoundaryTreatment::WeakDirichlet,
        }
    }
}

/// Quadrature order for face integrals of Q1 traces.
const FACE_QUADRATURE_ORDER: usize = 2;

/// Shape data of one element evaluated at a physical point on a face.
struct SideEval {
    element: usize,
    values: [f64; 4],
    normal_derivatives: [f64; 4],
}

fn evaluate_side(mesh: &Mesh, element: usize, x: f64, y: f64, normal: [f64; 2]) -> SideEval {
    let (xi, eta) = reference_coords(mesh.element_bounds(element), x, y);
    let shape = q1_shape(xi, eta);
    let coords = mesh.element_coords(element);
    let jac = Jacobian::from_quad(&shape, &coords);
    let mut normal_derivatives = [0.0; 4];
    for i in 0..DOFS_PER_ELEMENT {
        let grad = jac.transform_gradient(shape.gradients[i]);
        normal_derivatives[i] = grad[0] * normal[0] + grad[1] * normal[1];
    }
    SideEval {
        element,
        values: shape.values,
        normal_derivatives,
    }
}

fn push_face_terms(
    triplets: &mut Vec<(usize, usize, f64)>,
    sides: &[(&SideEval, f64, f64)],
    sigma: f64,
    penalty: f64,
    ds: f64,
) {
    // Each entry of `sides` is (evaluation, jump sign, averaged coefficient
    // already scaled by the 1/2 for interior faces).
    for &(side_v, sign_v, coeff_v) in sides {
        for &(side_u, sign_u, coeff_u) in sides {
            for i in 0..DOFS_PER_ELEMENT {
                for j in 0..DOFS_PER_ELEMENT {
                    let jump_v = sign_v * side_v.values[i];
                    let jump_u = sign_u * side_u.values[j];
                    let flux_u = coeff_u * side_u.normal_derivatives[j];
                    let flux_v = coeff_v * side_v.normal_derivatives[i];
                    let value = ds
                        * (-flux_u * jump_v + sigma * jump_u * flux_v
                            + penalty * jump_u * jump_v);
                    if value.abs() > TRIPLET_TOLERANCE {
                        triplets.push((
                            Mesh::dof(side_v.element, i),
                            Mesh::dof(side_u.element, j),
                            value,
                        ));
                    }
                }
            }
        }
    }
}

/// Triplets of the interior-face part of the stiffness form.
pub fn interior_face_triplets(
    mesh: &Mesh,
    media: &MediaProperties,
    scheme: &DgScheme,
) -> Vec<(usize, usize, f64)> {
    let rule = gauss_legendre_1d(FACE_QUADRATURE_ORDER);
    let mut triplets = Vec::new();

    for face in &mesh.interior_faces {
        let (length, normal) = mesh.face_geometry(face.nodes);
        let q_minus = media.inv_rho(mesh.elements[face.elem_minus].cell);
        let q_plus = media.inv_rho(mesh.elements[face.elem_plus].cell);
        let h_minus = mesh.element_measure(face.elem_minus) / length;
        let h_plus = mesh.element_measure(face.elem_plus) / length;
        let penalty = scheme.kappa * 0.5 * (q_minus / h_minus + q_plus / h_plus);

        for &(t, w) in &rule {
            let point = mesh.face_point(face.nodes, t);
            let minus = evaluate_side(mesh, face.elem_minus, point.x, point.y, normal);
            let plus = evaluate_side(mesh, face.elem_plus, point.x, point.y, normal);
            let ds = 0.5 * length * w;
            push_face_terms(
                &mut triplets,
                &[(&minus, 1.0, 0.5 * q_minus), (&plus, -1.0, 0.5 * q_plus)],
                scheme.sigma,
                penalty,
                ds,
            );
        }
    }
    triplets
}

/// Triplets of the weak-Dirichlet boundary part of the stiffness form.
///
/// Returns nothing for [`BoundaryTreatment::Free`].
pub fn boundary_face_triplets(
    mesh: &Mesh,
    media: &MediaProperties,
    scheme: &DgScheme,
) -> Vec<(usize, usize, f64)> {
    if scheme.boundary == BoundaryTreatment::Free {
        return Vec::new();
    }

    let rule = gauss_legendre_1d(FACE_QUADRATURE_ORDER);
    let mut triplets = Vec::new();

    for face in &mesh.boundary_faces {
        let (length, normal) = mesh.face_geometry(face.nodes);
        let q = media.inv_rho(mesh.elements[face.element].cell);
        let h = mesh.element_measure(face.element) / length;
        let penalty = scheme.kappa * q / h;

        for &(t, w) in &rule {
            let point = mesh.face_point(face.nodes, t);
            let side = evaluate_side(mesh, face.element, point.x, point.y, normal);
            let ds = 0.5 * length * w;
            push_face_terms(&mut triplets, &[(&side, 1.0, q)], scheme.sigma, penalty, ds);
        }
    }
    triplets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::rectangular_mesh_quads;
    use ndarray::Array1;
    use solvers::CsrMatrix;

    fn face_matrix(
        mesh: &Mesh,
        media: &MediaProperties,
        scheme: &DgScheme,
        with_boundary: bool,
    ) -> CsrMatrix<f64> {
        let mut triplets = interior_face_triplets(mesh, media, scheme);
        if with_boundary {
            triplets.extend(boundary_face_triplets(mesh, media, scheme));
        }
        CsrMatrix::from_triplets(mesh.num_dofs(), mesh.num_dofs(), triplets)
    }

    #[test]
    fn test_interior_terms_annihilate_constants() {
        // A globally constant field has zero jumps and zero gradients, so
        // every interior face term vanishes.
        let mesh = rectangular_mesh_quads(0.0, 1.0, 0.0, 1.0, 3, 2);
        let media = MediaProperties::homogeneous(6, 2.0, 3.0).unwrap();
        let scheme = DgScheme::default();
        let matrix = face_matrix(&mesh, &media, &scheme, false);
        let ones = Array1::from_elem(mesh.num_dofs(), 1.0);
        let result = matrix.matvec(&ones);
        for &v in result.iter() {
            assert!(v.abs() < 1e-12, "constant not annihilated: {}", v);
        }
    }

    #[test]
    fn test_symmetry_for_sipg() {
        let mesh = rectangular_mesh_quads(0.0, 2.0, 0.0, 1.0, 2, 2);
        let media = MediaProperties::homogeneous(4, 1500.0, 2000.0).unwrap();
        let scheme = DgScheme {
            sigma: -1.0,
            kappa: 4.0,
            boundary: BoundaryTreatment::WeakDirichlet,
        };
        let matrix = face_matrix(&mesh, &media, &scheme, true);
        for i in 0..matrix.num_rows {
            for (j, v) in matrix.row_entries(i) {
                let vt = matrix.get(j, i);
                assert!(
                    (v - vt).abs() < 1e-12 * (1.0 + v.abs()),
                    "asymmetry at ({}, {}): {} vs {}",
                    i,
                    j,
                    v,
                    vt
                );
            }
        }
    }

    #[test]
    fn test_free_boundary_adds_nothing() {
        let mesh = rectangular_mesh_quads(0.0, 1.0, 0.0, 1.0, 2, 1);
        let media = MediaProperties::homogeneous(2, 1.0, 1.0).unwrap();
        let scheme = DgScheme {
            boundary: BoundaryTreatment::Free,
            ..DgScheme::default()
        };
        assert!(boundary_face_triplets(&mesh, &media, &scheme).is_empty());
    }

    #[test]
    fn test_boundary_terms_penalize_nonzero_trace() {
        // With weak Dirichlet terms, a constant field sees a positive energy
        // from the boundary penalty.
        let mesh = rectangular_mesh_quads(0.0, 1.0, 0.0, 1.0, 2, 2);
        let media = MediaProperties::homogeneous(4, 1.0, 1.0).unwrap();
        let scheme = DgScheme {
            sigma: -1.0,
            kappa: 4.0,
            boundary: BoundaryTreatment::WeakDirichlet,
        };
        let matrix = face_matrix(&mesh, &media, &scheme, true);
        let ones = Array1::from_elem(mesh.num_dofs(), 1.0);
        let energy = ones.dot(&matrix.matvec(&ones));
        assert!(energy > 0.0, "boundary energy {}", energy);
    }
}
