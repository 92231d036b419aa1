//! Core mesh data structures for the fine discretization.
//!
//! The solver works on structured quadrilateral meshes with a discontinuous
//! Galerkin (DG) Q1 field: every element owns four DOFs, one per corner, and
//! nothing is shared across element boundaries. DOF `k` of element `e` has
//! global index `4*e + k`.

use std::collections::HashMap;

/// Number of DOFs carried by each quadrilateral element (DG Q1).
pub const DOFS_PER_ELEMENT: usize = 4;

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A quadrilateral element with counter-clockwise node ordering.
///
/// `cell` is the fine-grid cell this element samples material properties
/// from. On the global mesh it equals the element index; on block-local
/// meshes it is remapped to the global cell id after generation.
#[derive(Debug, Clone)]
pub struct Element {
    pub nodes: [usize; 4],
    pub cell: usize,
}

impl Element {
    /// Directed edge `k` of the element, following the CCW node ordering.
    pub fn edge(&self, k: usize) -> (usize, usize) {
        (self.nodes[k], self.nodes[(k + 1) % 4])
    }
}

/// A face shared by two elements.
///
/// `nodes` follows the CCW direction of `elem_minus`, so the normal computed
/// from the directed edge points from `elem_minus` into `elem_plus`.
#[derive(Debug, Clone)]
pub struct InteriorFace {
    pub elem_minus: usize,
    pub elem_plus: usize,
    pub local_minus: usize,
    pub local_plus: usize,
    pub nodes: (usize, usize),
}

/// A face on the outer boundary of the mesh, owned by a single element.
///
/// `nodes` follows the element's CCW direction; the derived normal points
/// outward.
#[derive(Debug, Clone)]
pub struct BoundaryFace {
    pub element: usize,
    pub local_edge: usize,
    pub nodes: (usize, usize),
}

/// A quadrilateral mesh with precomputed face connectivity.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub nodes: Vec<Point>,
    pub elements: Vec<Element>,
    pub interior_faces: Vec<InteriorFace>,
    pub boundary_faces: Vec<BoundaryFace>,
}

impl Mesh {
    pub fn new() -> Self {
        Mesh::default()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// Total DOF count of the DG Q1 space on this mesh.
    pub fn num_dofs(&self) -> usize {
        self.elements.len() * DOFS_PER_ELEMENT
    }

    /// Global DOF index of local corner `k` in element `e`.
    pub fn dof(e: usize, k: usize) -> usize {
        e * DOFS_PER_ELEMENT + k
    }

    pub fn add_node(&mut self, point: Point) -> usize {
        self.nodes.push(point);
        self.nodes.len() - 1
    }

    pub fn add_element(&mut self, nodes: [usize; 4]) -> usize {
        let cell = self.elements.len();
        self.elements.push(Element { nodes, cell });
        cell
    }

    /// Corner coordinates of element `e` in CCW order.
    pub fn element_coords(&self, e: usize) -> [Point; 4] {
        let elem = &self.elements[e];
        [
            self.nodes[elem.nodes[0]],
            self.nodes[elem.nodes[1]],
            self.nodes[elem.nodes[2]],
            self.nodes[elem.nodes[3]],
        ]
    }

    /// Element area via the shoelace formula.
    pub fn element_measure(&self, e: usize) -> f64 {
        let c = self.element_coords(e);
        let mut twice_area = 0.0;
        for i in 0..4 {
            let j = (i + 1) % 4;
            twice_area += c[i].x * c[j].y - c[j].x * c[i].y;
        }
        0.5 * twice_area.abs()
    }

    pub fn element_center(&self, e: usize) -> Point {
        let c = self.element_coords(e);
        Point::new(
            0.25 * (c[0].x + c[1].x + c[2].x + c[3].x),
            0.25 * (c[0].y + c[1].y + c[2].y + c[3].y),
        )
    }

    /// Axis-aligned bounding box of element `e` as (x0, x1, y0, y1).
    pub fn element_bounds(&self, e: usize) -> (f64, f64, f64, f64) {
        let c = self.element_coords(e);
        let mut x0 = c[0].x;
        let mut x1 = c[0].x;
        let mut y0 = c[0].y;
        let mut y1 = c[0].y;
        for p in &c[1..] {
            x0 = x0.min(p.x);
            x1 = x1.max(p.x);
            y0 = y0.min(p.y);
            y1 = y1.max(p.y);
        }
        (x0, x1, y0, y1)
    }

    /// Length and unit outward normal of a directed face.
    ///
    /// For a CCW-ordered element the directed edge (a, b) has outward normal
    /// (dy, -dx) / |d|.
    pub fn face_geometry(&self, nodes: (usize, usize)) -> (f64, [f64; 2]) {
        let a = self.nodes[nodes.0];
        let b = self.nodes[nodes.1];
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let length = (dx * dx + dy * dy).sqrt();
        (length, [dy / length, -dx / length])
    }

    /// Midpoint-based parametrization of a directed face: physical point at
    /// parameter `t` in [-1, 1].
    pub fn face_point(&self, nodes: (usize, usize), t: f64) -> Point {
        let a = self.nodes[nodes.0];
        let b = self.nodes[nodes.1];
        Point::new(
            0.5 * (a.x + b.x) + 0.5 * t * (b.x - a.x),
            0.5 * (a.y + b.y) + 0.5 * t * (b.y - a.y),
        )
    }

    /// Build interior and boundary face lists from element connectivity.
    ///
    /// Both lists come out in a deterministic order that depends only on the
    /// element ordering, never on hash iteration order: interior faces are
    /// recorded when their second element is visited, boundary faces in a
    /// second sweep over elements.
    pub fn build_faces(&mut self) {
        self.interior_faces.clear();
        self.boundary_faces.clear();

        let mut first_touch: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
        let mut shared: Vec<[bool; 4]> = vec![[false; 4]; self.elements.len()];

        for (e, elem) in self.elements.iter().enumerate() {
            for k in 0..4 {
                let (a, b) = elem.edge(k);
                let key = (a.min(b), a.max(b));
                match first_touch.get(&key) {
                    None => {
                        first_touch.insert(key, (e, k));
                    }
                    Some(&(e_first, k_first)) => {
                        self.interior_faces.push(InteriorFace {
                            elem_minus: e_first,
                            elem_plus: e,
                            local_minus: k_first,
                            local_plus: k,
                            nodes: self.elements[e_first].edge(k_first),
                        });
                        shared[e_first][k_first] = true;
                        shared[e][k] = true;
                    }
                }
            }
        }

        for (e, elem) in self.elements.iter().enumerate() {
            for k in 0..4 {
                if !shared[e][k] {
                    self.boundary_faces.push(BoundaryFace {
                        element: e,
                        local_edge: k,
                        nodes: elem.edge(k),
                    });
                }
            }
        }
    }
}
