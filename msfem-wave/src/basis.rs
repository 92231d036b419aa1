//! Local multiscale basis construction, one coarse block at a time.
//!
//! Each block gets a temporary fine mesh over its own extent and local
//! mass/stiffness forms with the same volume and interior-penalty terms as
//! the global problem, but with a free outer boundary so constants stay in
//! the local kernel. From those operators the block derives
//! `n_boundary + n_interior` basis vectors:
//!
//! * boundary modes: cosine traces along the block perimeter, extended into
//!   the block interior by solving the local stiffness system (mode 0 is a
//!   constant trace, so its extension reproduces the constant function up to
//!   solver tolerance);
//! * interior modes: the smallest eigenpairs of the lumped-mass-scaled
//!   interior stiffness block, vanishing on the perimeter DOFs.
//!
//! The two groups are block triangular with respect to the
//! boundary/interior DOF split, which keeps the basis matrix full rank.

use ndarray::{Array1, Array2};
use solvers::{cg, symmetric_eigen, CgConfig, CsrMatrix};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::assembly::{assemble_lumped_mass, assemble_stiffness, BoundaryTreatment, DgScheme};
use crate::error::SimulationError;
use crate::media::MediaProperties;
use crate::mesh::{rectangular_mesh_quads, Mesh, DOFS_PER_ELEMENT};
use crate::partition::{CoarseBlock, FineGrid};

/// Mode counts and penalty parameters of the local problems.
#[derive(Debug, Clone, Copy)]
pub struct BasisParams {
    pub n_boundary: usize,
    pub n_interior: usize,
    pub sigma: f64,
    pub kappa: f64,
}

/// Basis vectors of one coarse block.
///
/// `vectors` has one row per basis function over the block's local DOFs in
/// local element order; `cells` maps local elements to global fine cells so
/// the rows can be scattered into the global restriction operator.
#[derive(Debug, Clone)]
pub struct LocalBasis {
    pub block: usize,
    pub cells: Vec<usize>,
    pub vectors: Array2<f64>,
}

impl LocalBasis {
    pub fn num_basis(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn num_local_dofs(&self) -> usize {
        self.vectors.ncols()
    }
}

const EXTENSION_TOLERANCE: f64 = 1e-12;
const EXTENSION_MAX_ITERATIONS: usize = 2000;

/// Build the basis of a single coarse block.
pub fn build_block_basis(
    grid: &FineGrid,
    block: &CoarseBlock,
    media: &MediaProperties,
    params: &BasisParams,
) -> Result<LocalBasis, SimulationError> {
    if block.nx == 0 || block.ny == 0 {
        return Err(SimulationError::consistency(format!(
            "coarse block {} has a degenerate extent {}x{}",
            block.index, block.nx, block.ny
        )));
    }

    let (x0, x1, y0, y1) = block.bounds(grid.x0, grid.y0, grid.hx, grid.hy);
    let mut mesh = rectangular_mesh_quads(x0, x1, y0, y1, block.nx, block.ny);
    let cells = block.global_cells(grid.nx);
    for (e, elem) in mesh.elements.iter_mut().enumerate() {
        elem.cell = cells[e];
    }

    // Free outer boundary: the local operator must not penalize nonzero
    // traces, otherwise boundary-driven modes would fight the scheme.
    let scheme = DgScheme {
        sigma: params.sigma,
        kappa: params.kappa,
        boundary: BoundaryTreatment::Free,
    };
    let stiffness = assemble_stiffness(&mesh, media, &scheme);
    let lumped = assemble_lumped_mass(&mesh, media);

    let split = split_dofs(&mesh);
    if params.n_boundary > split.boundary_nodes {
        return Err(SimulationError::config(format!(
            "block {}: {} boundary modes requested but the perimeter has only {} nodes",
            block.index, params.n_boundary, split.boundary_nodes
        )));
    }
    if params.n_interior > split.interior.len() {
        return Err(SimulationError::config(format!(
            "block {}: {} interior modes requested but the block has only {} interior DOFs",
            block.index,
            params.n_interior,
            split.interior.len()
        )));
    }

    let operators = split_stiffness(&stiffness, &split);
    let n_dofs = mesh.num_dofs();
    let n_basis = params.n_boundary + params.n_interior;
    let mut vectors = Array2::zeros((n_basis, n_dofs));

    let perimeter = (x1 - x0 + y1 - y0) * 2.0;
    for k in 0..params.n_boundary {
        let trace = boundary_trace(&mesh, &split, (x0, x1, y0, y1), perimeter, k);
        let extension = extend_into_interior(block.index, k, &operators, &trace)?;
        let mut row = vectors.row_mut(k);
        for (pos, &dof) in split.boundary.iter().enumerate() {
            row[dof] = trace[pos];
        }
        for (pos, &dof) in split.interior.iter().enumerate() {
            row[dof] = extension[pos];
        }
    }

    if params.n_interior > 0 {
        let modes = interior_modes(block.index, &operators, &lumped, &split, params.n_interior)?;
        for k in 0..params.n_interior {
            let mut row = vectors.row_mut(params.n_boundary + k);
            for (pos, &dof) in split.interior.iter().enumerate() {
                row[dof] = modes[[pos, k]];
            }
        }
    }

    Ok(LocalBasis {
        block: block.index,
        cells,
        vectors,
    })
}

/// Build the bases of a contiguous slice of blocks, in block order.
pub fn build_bases(
    grid: &FineGrid,
    blocks: &[CoarseBlock],
    media: &MediaProperties,
    params: &BasisParams,
) -> Result<Vec<LocalBasis>, SimulationError> {
    #[cfg(feature = "rayon")]
    {
        blocks
            .par_iter()
            .map(|block| build_block_basis(grid, block, media, params))
            .collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        blocks
            .iter()
            .map(|block| build_block_basis(grid, block, media, params))
            .collect()
    }
}

struct DofSplit {
    boundary: Vec<usize>,
    interior: Vec<usize>,
    boundary_nodes: usize,
    /// Per-DOF position in `boundary` (or usize::MAX).
    boundary_pos: Vec<usize>,
    /// Per-DOF position in `interior` (or usize::MAX).
    interior_pos: Vec<usize>,
    /// Node index behind each boundary DOF.
    boundary_node: Vec<usize>,
}

fn split_dofs(mesh: &Mesh) -> DofSplit {
    let mut on_boundary = vec![false; mesh.num_nodes()];
    for face in &mesh.boundary_faces {
        on_boundary[face.nodes.0] = true;
        on_boundary[face.nodes.1] = true;
    }
    let boundary_nodes = on_boundary.iter().filter(|&&b| b).count();

    let n_dofs = mesh.num_dofs();
    let mut boundary = Vec::new();
    let mut interior = Vec::new();
    let mut boundary_node = Vec::new();
    let mut boundary_pos = vec![usize::MAX; n_dofs];
    let mut interior_pos = vec![usize::MAX; n_dofs];

    for (e, elem) in mesh.elements.iter().enumerate() {
        for k in 0..DOFS_PER_ELEMENT {
            let dof = Mesh::dof(e, k);
            let node = elem.nodes[k];
            if on_boundary[node] {
                boundary_pos[dof] = boundary.len();
                boundary.push(dof);
                boundary_node.push(node);
            } else {
                interior_pos[dof] = interior.len();
                interior.push(dof);
            }
        }
    }

    DofSplit {
        boundary,
        interior,
        boundary_nodes,
        boundary_pos,
        interior_pos,
        boundary_node,
    }
}

struct SplitOperators {
    /// Interior-interior stiffness block.
    sii: CsrMatrix<f64>,
    /// Interior-boundary couplings as (interior row, boundary col, value).
    sib: Vec<(usize, usize, f64)>,
}

fn split_stiffness(stiffness: &CsrMatrix<f64>, split: &DofSplit) -> SplitOperators {
    let n_int = split.interior.len();
    let mut sii_triplets = Vec::new();
    let mut sib = Vec::new();

    for (pos, &row) in split.interior.iter().enumerate() {
        for (col, value) in stiffness.row_entries(row) {
            if split.interior_pos[col] != usize::MAX {
                sii_triplets.push((pos, split.interior_pos[col], value));
            } else {
                sib.push((pos, split.boundary_pos[col], value));
            }
        }
    }

    SplitOperators {
        sii: CsrMatrix::from_triplets(n_int, n_int, sii_triplets),
        sib,
    }
}

/// Arclength position of a perimeter point, measured counter-clockwise from
/// the lower-left corner.
fn perimeter_coordinate(bounds: (f64, f64, f64, f64), x: f64, y: f64) -> f64 {
    let (x0, x1, y0, y1) = bounds;
    let width = x1 - x0;
    let height = y1 - y0;

    let d_bottom = (y - y0).abs();
    let d_right = (x1 - x).abs();
    let d_top = (y1 - y).abs();
    let d_left = (x - x0).abs();

    let min = d_bottom.min(d_right).min(d_top).min(d_left);
    if d_bottom == min {
        x - x0
    } else if d_right == min {
        width + (y - y0)
    } else if d_top == min {
        width + height + (x1 - x)
    } else {
        2.0 * width + height + (y1 - y)
    }
}

fn boundary_trace(
    mesh: &Mesh,
    split: &DofSplit,
    bounds: (f64, f64, f64, f64),
    perimeter: f64,
    mode: usize,
) -> Vec<f64> {
    let omega = 2.0 * std::f64::consts::PI * mode as f64 / perimeter;
    split
        .boundary_node
        .iter()
        .map(|&node| {
            let p = mesh.nodes[node];
            (omega * perimeter_coordinate(bounds, p.x, p.y)).cos()
        })
        .collect()
}

fn extend_into_interior(
    block: usize,
    mode: usize,
    operators: &SplitOperators,
    trace: &[f64],
) -> Result<Array1<f64>, SimulationError> {
    let n_int = operators.sii.num_rows;
    if n_int == 0 {
        return Ok(Array1::zeros(0));
    }

    let mut rhs = Array1::zeros(n_int);
    for &(row, col, value) in &operators.sib {
        rhs[row] -= value * trace[col];
    }

    let config = CgConfig {
        max_iterations: EXTENSION_MAX_ITERATIONS,
        tolerance: EXTENSION_TOLERANCE,
        print_interval: 0,
    };
    let solution = cg(&operators.sii, &rhs, &config);
    if !solution.converged {
        log::warn!(
            "block {}: harmonic extension of boundary mode {} stopped at residual {:.3e}",
            block,
            mode,
            solution.residual
        );
    }
    Ok(solution.x)
}

/// Smallest eigenmodes of `D^(-1/2) S_ii D^(-1/2)` mapped back through
/// `D^(-1/2)`, with `D` the lumped local mass on interior DOFs. Returned as
/// an (interior DOFs x modes) matrix.
fn interior_modes(
    block: usize,
    operators: &SplitOperators,
    lumped: &Array1<f64>,
    split: &DofSplit,
    n_modes: usize,
) -> Result<Array2<f64>, SimulationError> {
    let n_int = split.interior.len();
    let mut inv_sqrt = Array1::zeros(n_int);
    for (pos, &dof) in split.interior.iter().enumerate() {
        let mass = lumped[dof];
        if mass <= 0.0 {
            return Err(SimulationError::consistency(format!(
                "block {}: non-positive lumped mass {} at local DOF {}",
                block, mass, dof
            )));
        }
        inv_sqrt[pos] = 1.0 / mass.sqrt();
    }

    let mut scaled = Array2::zeros((n_int, n_int));
    for row in 0..n_int {
        for (col, value) in operators.sii.row_entries(row) {
            scaled[[row, col]] = value * inv_sqrt[row] * inv_sqrt[col];
        }
    }

    let eigen = symmetric_eigen(&scaled)?;
    let mut modes = Array2::zeros((n_int, n_modes));
    for k in 0..n_modes {
        for pos in 0..n_int {
            modes[[pos, k]] = eigen.eigenvectors[[pos, k]] * inv_sqrt[pos];
        }
    }
    Ok(modes)
}

/// Flatten bases into the cluster wire format: one frame per basis holding
/// the block id, shape, cell list and the value bits.
pub fn encode_local_bases(bases: &[LocalBasis]) -> Vec<i64> {
    let mut buffer = Vec::new();
    for basis in bases {
        buffer.push(basis.block as i64);
        buffer.push(basis.num_basis() as i64);
        buffer.push(basis.cells.len() as i64);
        buffer.extend(basis.cells.iter().map(|&c| c as i64));
        buffer.extend(basis.vectors.iter().map(|&v| v.to_bits() as i64));
    }
    buffer
}

/// Parse the wire format back; the inverse of [`encode_local_bases`].
pub fn decode_local_bases(buffer: &[i64]) -> Result<Vec<LocalBasis>, SimulationError> {
    let mut bases = Vec::new();
    let mut cursor = 0;
    while cursor < buffer.len() {
        if cursor + 3 > buffer.len() {
            return Err(SimulationError::consistency("truncated basis frame header"));
        }
        let block = buffer[cursor];
        let n_basis = buffer[cursor + 1];
        let n_cells = buffer[cursor + 2];
        if block < 0 || n_basis < 0 || n_cells < 0 {
            return Err(SimulationError::consistency(format!(
                "invalid basis frame header: block {}, {} vectors, {} cells",
                block, n_basis, n_cells
            )));
        }
        cursor += 3;

        let (n_basis, n_cells) = (n_basis as usize, n_cells as usize);
        let n_values = n_basis * n_cells * DOFS_PER_ELEMENT;
        if cursor + n_cells + n_values > buffer.len() {
            return Err(SimulationError::consistency(format!(
                "basis frame for block {} truncated",
                block
            )));
        }

        let cells: Vec<usize> = buffer[cursor..cursor + n_cells]
            .iter()
            .map(|&c| c as usize)
            .collect();
        cursor += n_cells;

        let values: Vec<f64> = buffer[cursor..cursor + n_values]
            .iter()
            .map(|&bits| f64::from_bits(bits as u64))
            .collect();
        cursor += n_values;

        let vectors = Array2::from_shape_vec((n_basis, n_cells * DOFS_PER_ELEMENT), values)
            .map_err(|_| {
                SimulationError::consistency(format!(
                    "basis frame for block {} has inconsistent shape",
                    block
                ))
            })?;
        bases.push(LocalBasis {
            block: block as usize,
            cells,
            vectors,
        });
    }
    Ok(bases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::plan_blocks;

    fn test_grid(nx: usize, ny: usize) -> FineGrid {
        FineGrid::new(0.0, 0.0, 1000.0, 1000.0, nx, ny)
    }

    fn test_params(ni: usize, nb: usize) -> BasisParams {
        BasisParams {
            n_boundary: ni,
            n_interior: nb,
            sigma: -1.0,
            kappa: 4.0,
        }
    }

    #[test]
    fn test_basis_shape_and_cells() {
        let grid = test_grid(4, 4);
        let blocks = plan_blocks(4, 4, 2, 2);
        let media = MediaProperties::homogeneous(16, 2500.0, 3500.0).unwrap();
        let basis = build_block_basis(&grid, &blocks[1], &media, &test_params(4, 2)).unwrap();

        assert_eq!(basis.block, 1);
        assert_eq!(basis.cells, vec![2, 3, 6, 7]);
        assert_eq!(basis.vectors.nrows(), 6);
        assert_eq!(basis.vectors.ncols(), 16);
    }

    #[test]
    fn test_mode_zero_is_constant() {
        let grid = test_grid(6, 6);
        let blocks = plan_blocks(6, 6, 2, 2);
        let media = MediaProperties::homogeneous(36, 2500.0, 3500.0).unwrap();
        let basis = build_block_basis(&grid, &blocks[0], &media, &test_params(2, 1)).unwrap();

        for &v in basis.vectors.row(0).iter() {
            assert!((v - 1.0).abs() < 1e-8, "mode 0 entry {}", v);
        }
    }

    #[test]
    fn test_interior_modes_vanish_on_boundary() {
        let grid = test_grid(6, 6);
        let blocks = plan_blocks(6, 6, 2, 2);
        let media = MediaProperties::homogeneous(36, 2500.0, 3500.0).unwrap();
        let params = test_params(2, 2);
        let basis = build_block_basis(&grid, &blocks[0], &media, &params).unwrap();

        // Rebuild the split to know which DOFs are on the perimeter.
        let (x0, x1, y0, y1) = blocks[0].bounds(0.0, 0.0, grid.hx, grid.hy);
        let mesh = rectangular_mesh_quads(x0, x1, y0, y1, blocks[0].nx, blocks[0].ny);
        let split = split_dofs(&mesh);

        for k in 0..params.n_interior {
            let row = basis.vectors.row(params.n_boundary + k);
            for &dof in &split.boundary {
                assert_eq!(row[dof], 0.0);
            }
            let norm: f64 = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!(norm > 0.0, "interior mode {} is identically zero", k);
        }
    }

    #[test]
    fn test_basis_full_rank() {
        let grid = test_grid(6, 6);
        let blocks = plan_blocks(6, 6, 2, 2);
        let media = MediaProperties::homogeneous(36, 2500.0, 3500.0).unwrap();
        let basis = build_block_basis(&grid, &blocks[3], &media, &test_params(4, 3)).unwrap();

        let gram = basis.vectors.dot(&basis.vectors.t());
        let eigen = symmetric_eigen(&gram).unwrap();
        let max = eigen.eigenvalues[eigen.eigenvalues.len() - 1];
        assert!(
            eigen.eigenvalues[0] > 1e-10 * max,
            "rank-deficient basis: spectrum {:?}",
            eigen.eigenvalues
        );
    }

    #[test]
    fn test_mode_counts_must_fit_block() {
        let grid = test_grid(2, 2);
        let blocks = plan_blocks(2, 2, 2, 2);
        let media = MediaProperties::homogeneous(4, 2500.0, 3500.0).unwrap();

        // A 1x1 block has 4 perimeter nodes and no interior DOFs.
        let err =
            build_block_basis(&grid, &blocks[0], &media, &test_params(5, 0)).unwrap_err();
        assert!(matches!(err, SimulationError::Config(_)));

        let err =
            build_block_basis(&grid, &blocks[0], &media, &test_params(4, 1)).unwrap_err();
        assert!(matches!(err, SimulationError::Config(_)));

        assert!(build_block_basis(&grid, &blocks[0], &media, &test_params(4, 0)).is_ok());
    }

    #[test]
    fn test_wire_roundtrip_is_bit_exact() {
        let grid = test_grid(4, 4);
        let blocks = plan_blocks(4, 4, 2, 2);
        let media = MediaProperties::homogeneous(16, 2500.0, 3500.0).unwrap();
        let params = test_params(3, 1);
        let bases = build_bases(&grid, &blocks[2..4], &media, &params).unwrap();

        let decoded = decode_local_bases(&encode_local_bases(&bases)).unwrap();
        assert_eq!(decoded.len(), bases.len());
        for (a, b) in bases.iter().zip(decoded.iter()) {
            assert_eq!(a.block, b.block);
            assert_eq!(a.cells, b.cells);
            assert_eq!(a.vectors, b.vectors);
        }
    }

    #[test]
    fn test_decode_rejects_truncated_frame() {
        let grid = test_grid(4, 4);
        let blocks = plan_blocks(4, 4, 2, 2);
        let media = MediaProperties::homogeneous(16, 2500.0, 3500.0).unwrap();
        let bases = vec![build_block_basis(&grid, &blocks[0], &media, &test_params(2, 0)).unwrap()];

        let mut buffer = encode_local_bases(&bases);
        buffer.pop();
        assert!(decode_local_bases(&buffer).is_err());
    }
}
