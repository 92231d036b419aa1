//! Structured quadrilateral meshes and face connectivity.

mod generators;
mod types;

pub use generators::rectangular_mesh_quads;
pub use types::{BoundaryFace, Element, InteriorFace, Mesh, Point, DOFS_PER_ELEMENT};
