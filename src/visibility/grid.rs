use std::collections::HashMap;

use crate::math::Point2;

/// Axis-aligned bounds in the image plane, `(min, max)`.
pub type Bounds2 = (Point2, Point2);

/// Spatial hash of projected triangles.
///
/// Occluders are binned by their projected bounding boxes so each receiver
/// only clips against occluders sharing a cell with it.
pub struct ProjectedGrid {
    /// Inverse cell size (cached).
    inv_cell_size: f64,
    /// Cell key to the entries overlapping that cell.
    cells: HashMap<(i64, i64), Vec<u32>>,
}

impl ProjectedGrid {
    /// Creates an empty grid with square cells of side `cell_size`.
    #[must_use]
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() {
            cell_size.max(1e-12)
        } else {
            1.0
        };
        Self {
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::new(),
        }
    }

    /// Picks a cell size from the mean extent of `bounds`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn for_bounds(bounds: &[Bounds2]) -> Self {
        if bounds.is_empty() {
            return Self::new(1.0);
        }
        let total: f64 = bounds
            .iter()
            .map(|(lo, hi)| (hi.x - lo.x).max(hi.y - lo.y))
            .sum();
        Self::new(2.0 * total / bounds.len() as f64)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn cell(&self, v: f64) -> i64 {
        (v * self.inv_cell_size).floor() as i64
    }

    fn cell_range(&self, bounds: &Bounds2) -> ((i64, i64), (i64, i64)) {
        let (lo, hi) = bounds;
        (
            (self.cell(lo.x), self.cell(lo.y)),
            (self.cell(hi.x), self.cell(hi.y)),
        )
    }

    /// Adds `entry` to every cell its bounds overlap.
    pub fn insert(&mut self, entry: u32, bounds: &Bounds2) {
        let ((x0, y0), (x1, y1)) = self.cell_range(bounds);
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                self.cells.entry((cx, cy)).or_default().push(entry);
            }
        }
    }

    /// Entries whose cells overlap `bounds`, sorted and without repeats.
    #[must_use]
    pub fn query(&self, bounds: &Bounds2) -> Vec<u32> {
        let ((x0, y0), (x1, y1)) = self.cell_range(bounds);
        let mut out = Vec::new();
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                if let Some(entries) = self.cells.get(&(cx, cy)) {
                    out.extend_from_slice(entries);
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}
