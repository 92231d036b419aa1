//! Partition of the fine grid into coarse blocks and of blocks across
//! cluster workers.

use std::ops::Range;

/// Geometry of the uniform fine grid.
#[derive(Debug, Clone, Copy)]
pub struct FineGrid {
    pub x0: f64,
    pub y0: f64,
    pub hx: f64,
    pub hy: f64,
    pub nx: usize,
    pub ny: usize,
}

impl FineGrid {
    pub fn new(x0: f64, y0: f64, size_x: f64, size_y: f64, nx: usize, ny: usize) -> Self {
        FineGrid {
            x0,
            y0,
            hx: size_x / nx as f64,
            hy: size_y / ny as f64,
            nx,
            ny,
        }
    }

    pub fn num_cells(&self) -> usize {
        self.nx * self.ny
    }

    pub fn x1(&self) -> f64 {
        self.x0 + self.hx * self.nx as f64
    }

    pub fn y1(&self) -> f64 {
        self.y0 + self.hy * self.ny as f64
    }
}

/// Fine-cell counts per coarse block along one axis.
///
/// Every block gets `n_fine / n_coarse` cells; the first `n_fine % n_coarse`
/// blocks carry one extra cell.
pub fn split_axis(n_fine: usize, n_coarse: usize) -> Vec<usize> {
    assert!(n_coarse > 0 && n_coarse <= n_fine);
    let base = n_fine / n_coarse;
    let extra = n_fine % n_coarse;
    (0..n_coarse)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

/// One coarse block: a rectangular patch of fine cells.
#[derive(Debug, Clone)]
pub struct CoarseBlock {
    /// Row-major block index on the coarse grid.
    pub index: usize,
    /// Block position on the coarse grid.
    pub ix: usize,
    pub iy: usize,
    /// First fine cell of the patch along each axis.
    pub cell_x0: usize,
    pub cell_y0: usize,
    /// Patch extent in fine cells.
    pub nx: usize,
    pub ny: usize,
}

impl CoarseBlock {
    pub fn num_cells(&self) -> usize {
        self.nx * self.ny
    }

    /// Global fine-cell ids of the patch, in local row-major order.
    ///
    /// The map is strictly increasing, so local DOF numbering inherits the
    /// global ordering.
    pub fn global_cells(&self, grid_nx: usize) -> Vec<usize> {
        let mut cells = Vec::with_capacity(self.num_cells());
        for j in 0..self.ny {
            for i in 0..self.nx {
                cells.push((self.cell_y0 + j) * grid_nx + self.cell_x0 + i);
            }
        }
        cells
    }

    /// Physical bounds `(x0, x1, y0, y1)` of the patch on a uniform grid
    /// anchored at `(origin_x, origin_y)` with fine cell sizes `(hx, hy)`.
    pub fn bounds(&self, origin_x: f64, origin_y: f64, hx: f64, hy: f64) -> (f64, f64, f64, f64) {
        (
            origin_x + self.cell_x0 as f64 * hx,
            origin_x + (self.cell_x0 + self.nx) as f64 * hx,
            origin_y + self.cell_y0 as f64 * hy,
            origin_y + (self.cell_y0 + self.ny) as f64 * hy,
        )
    }
}

/// Plan the coarse partition of an `fine_nx x fine_ny` grid, blocks in
/// row-major order.
pub fn plan_blocks(
    fine_nx: usize,
    fine_ny: usize,
    coarse_nx: usize,
    coarse_ny: usize,
) -> Vec<CoarseBlock> {
    let counts_x = split_axis(fine_nx, coarse_nx);
    let counts_y = split_axis(fine_ny, coarse_ny);

    let mut blocks = Vec::with_capacity(coarse_nx * coarse_ny);
    let mut cell_y0 = 0;
    for (iy, &ny) in counts_y.iter().enumerate() {
        let mut cell_x0 = 0;
        for (ix, &nx) in counts_x.iter().enumerate() {
            blocks.push(CoarseBlock {
                index: iy * coarse_nx + ix,
                ix,
                iy,
                cell_x0,
                cell_y0,
                nx,
                ny,
            });
            cell_x0 += nx;
        }
        cell_y0 += ny;
    }
    blocks
}

/// Contiguous block ranges per worker, spread with the same remainder rule
/// as [`split_axis`].
pub fn worker_ranges(n_blocks: usize, n_workers: usize) -> Vec<Range<usize>> {
    assert!(n_workers > 0);
    let base = n_blocks / n_workers;
    let extra = n_blocks % n_workers;
    let mut ranges = Vec::with_capacity(n_workers);
    let mut start = 0;
    for rank in 0..n_workers {
        let count = if rank < extra { base + 1 } else { base };
        ranges.push(start..start + count);
        start += count;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_axis_even() {
        assert_eq!(split_axis(8, 2), vec![4, 4]);
        assert_eq!(split_axis(9, 3), vec![3, 3, 3]);
    }

    #[test]
    fn test_split_axis_remainder_goes_first() {
        assert_eq!(split_axis(10, 3), vec![4, 3, 3]);
        assert_eq!(split_axis(7, 4), vec![2, 2, 2, 1]);
    }

    #[test]
    fn test_blocks_tile_the_grid() {
        let blocks = plan_blocks(10, 7, 3, 2);
        assert_eq!(blocks.len(), 6);
        let total: usize = blocks.iter().map(|b| b.num_cells()).sum();
        assert_eq!(total, 70);

        // Every fine cell claimed exactly once.
        let mut seen = vec![false; 70];
        for block in &blocks {
            for cell in block.global_cells(10) {
                assert!(!seen[cell], "cell {} claimed twice", cell);
                seen[cell] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_block_cells_strictly_increasing() {
        for block in plan_blocks(9, 5, 2, 2) {
            let cells = block.global_cells(9);
            for pair in cells.windows(2) {
                assert!(pair[0] < pair[1]);
            }
        }
    }

    #[test]
    fn test_block_bounds() {
        let blocks = plan_blocks(4, 4, 2, 2);
        let (x0, x1, y0, y1) = blocks[3].bounds(0.0, 0.0, 0.25, 0.25);
        assert!((x0 - 0.5).abs() < 1e-15);
        assert!((x1 - 1.0).abs() < 1e-15);
        assert!((y0 - 0.5).abs() < 1e-15);
        assert!((y1 - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_worker_ranges_cover_all_blocks() {
        let ranges = worker_ranges(10, 4);
        assert_eq!(ranges, vec![0..3, 3..6, 6..8, 8..10]);
        let ranges = worker_ranges(3, 5);
        assert_eq!(ranges.iter().map(|r| r.len()).sum::<usize>(), 3);
    }
}
