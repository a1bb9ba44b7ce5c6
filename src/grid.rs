//! Coarse coverage history over the canvas.

pub const STAMP_WEIGHT: f32 = 0.01;

/// Accumulates how often each cell has been covered by a bubble.
///
/// Weights only grow; the grid is zeroed by [`OccupancyGrid::allocate`] on
/// resize or regeneration.
#[derive(Clone, Debug)]
pub struct OccupancyGrid {
    cell_size: f32,
    width: f32,
    height: f32,
    cols: usize,
    rows: usize,
    cells: Vec<f32>,
}

impl OccupancyGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: if cell_size > 0.0 { cell_size } else { 1.0 },
            width: 0.0,
            height: 0.0,
            cols: 0,
            rows: 0,
            cells: Vec::new(),
        }
    }

    pub fn allocate(&mut self, width: f32, height: f32) {
        let axis = |dim: f32| -> usize {
            if dim.is_finite() && dim > 0.0 {
                (dim / self.cell_size).ceil() as usize
            } else {
                0
            }
        };
        self.width = width.max(0.0);
        self.height = height.max(0.0);
        self.cols = axis(width);
        self.rows = axis(height);
        self.cells.clear();
        self.cells.resize(self.cols * self.rows, 0.0);
    }

    /// Adds [`STAMP_WEIGHT`] to every cell overlapping the box around `(x, y)`.
    pub fn stamp(&mut self, x: f32, y: f32, r: f32) {
        if self.cells.is_empty() {
            return;
        }
        let r = r.abs();
        let span = |lo: f32, hi: f32, n: usize| -> Option<(usize, usize)> {
            let a = (lo / self.cell_size).floor();
            let b = (hi / self.cell_size).floor();
            if b < 0.0 || a >= n as f32 {
                return None;
            }
            let a = a.max(0.0) as usize;
            let b = (b as usize).min(n - 1);
            Some((a, b))
        };

        let Some((c0, c1)) = span(x - r, x + r, self.cols) else {
            return;
        };
        let Some((r0, r1)) = span(y - r, y + r, self.rows) else {
            return;
        };

        for row in r0..=r1 {
            let base = row * self.cols;
            for cell in &mut self.cells[base + c0..=base + c1] {
                *cell += STAMP_WEIGHT;
            }
        }
    }

    /// Slow Lissajous drift around the canvas center, `t` in seconds.
    ///
    /// The target does not consult the cell weights.
    pub fn lowest_occupancy_target(&self, t: f32) -> (f32, f32) {
        (
            self.width * 0.5 + (t * 0.07).cos() * self.width * 0.25,
            self.height * 0.5 + (t * 0.05).sin() * self.height * 0.25,
        )
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn weight(&self, col: usize, row: usize) -> f32 {
        if col >= self.cols || row >= self.rows {
            return 0.0;
        }
        self.cells[row * self.cols + col]
    }

    pub fn total(&self) -> f32 {
        self.cells.iter().sum()
    }
}
