use crate::grid::LambertGrid;

/// A decoded GRIB2 field: a Lambert conformal grid plus its values.
///
/// Values are stored row-major: `values[j * ni + i]`. Grid points masked
/// out by a bitmap carry quiet NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    grid: LambertGrid,
    values: Vec<f64>,
}

impl Field {
    pub(crate) fn new(grid: LambertGrid, values: Vec<f64>) -> Self {
        Self { grid, values }
    }

    pub fn grid(&self) -> &LambertGrid {
        &self.grid
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Nearest-neighbour value at (lat degrees N, lon degrees E signed).
    /// NaN for points outside the grid or masked out by the bitmap.
    pub fn lookup(&self, lat: f64, lon: f64) -> f64 {
        self.grid.lookup(lat, lon, &self.values)
    }
}
