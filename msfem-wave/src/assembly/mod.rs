//! Fine-scale operator assembly.
//!
//! The mass form carries `1/K`, the stiffness form `1/rho` plus symmetric
//! interior-penalty face terms. Element loops run in parallel under the
//! `rayon` feature; face loops are sequential and deterministic.

mod faces;
mod mass;
mod stiffness;

pub use faces::{boundary_face_triplets, interior_face_triplets, BoundaryTreatment, DgScheme};
pub use mass::{assemble_lumped_mass, assemble_mass};
pub use stiffness::assemble_stiffness;
