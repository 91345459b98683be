//! Grid builder: rectangular cell footprints from evenly spaced coordinates.
//!
//! Cells are numbered row-major over `(y, x)`, so `CellId = row * ncols + col`.
//! That is the order a `(lat, lon)` matrix flattens to, which keeps cell ids
//! aligned with per-cell utilisation vectors derived from gridded output.

use geo::{coord, Coord, Polygon, Rect};
use serde::{Deserialize, Serialize};

use crate::error::{Axis, Result, WindClassError};

/// Maximum standard deviation of consecutive coordinate differences.
pub const SPACING_TOLERANCE: f64 = 1e-10;

/// Flat, row-major cell index.
pub type CellId = usize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub id: CellId,
    pub row: usize,
    pub col: usize,
    pub x: f64,
    pub y: f64,
}

/// Rows × columns of a grid. Cell ids are only meaningful relative to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    /// Length of the y (latitude) vector.
    pub nrows: usize,
    /// Length of the x (longitude) vector.
    pub ncols: usize,
}

impl GridShape {
    pub fn num_cells(&self) -> usize {
        self.nrows * self.ncols
    }
}

impl std::fmt::Display for GridShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} rows × {} cols", self.nrows, self.ncols)
    }
}

/// A uniform rectangular grid built from 1-D coordinate vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    pub cells: Vec<GridCell>,
    /// Number of columns (length of the x vector).
    pub ncols: usize,
    /// Number of rows (length of the y vector).
    pub nrows: usize,
    pub dx: f64,
    pub dy: f64,
}

impl Grid {
    #[inline]
    pub fn cell_id(&self, row: usize, col: usize) -> CellId {
        row * self.ncols + col
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn shape(&self) -> GridShape {
        GridShape {
            nrows: self.nrows,
            ncols: self.ncols,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Closed rectangle centred on the cell with half-widths `dx/2`, `dy/2`.
    pub fn polygon(&self, cell: &GridCell) -> Polygon<f64> {
        let hx = self.dx / 2.0;
        let hy = self.dy / 2.0;
        Rect::new(
            coord! { x: cell.x - hx, y: cell.y - hy },
            coord! { x: cell.x + hx, y: cell.y + hy },
        )
        .to_polygon()
    }

    /// All cell footprints paired with their ids, in id order.
    pub fn polygons(&self) -> Vec<(CellId, Polygon<f64>)> {
        self.cells.iter().map(|c| (c.id, self.polygon(c))).collect()
    }

    pub fn center(&self, id: CellId) -> Option<Coord<f64>> {
        self.cells.get(id).map(|c| coord! { x: c.x, y: c.y })
    }
}

/// Build N×M cells from strictly increasing `x` (length N) and `y` (length M).
pub fn build_grid(x: &[f64], y: &[f64]) -> Result<Grid> {
    let dx = uniform_spacing(x, Axis::X)?;
    let dy = uniform_spacing(y, Axis::Y)?;

    let mut cells = Vec::with_capacity(x.len() * y.len());
    for (row, &yc) in y.iter().enumerate() {
        for (col, &xc) in x.iter().enumerate() {
            cells.push(GridCell {
                id: row * x.len() + col,
                row,
                col,
                x: xc,
                y: yc,
            });
        }
    }

    tracing::debug!(ncols = x.len(), nrows = y.len(), dx, dy, "built grid");

    Ok(Grid {
        cells,
        ncols: x.len(),
        nrows: y.len(),
        dx,
        dy,
    })
}

/// Mean consecutive spacing, or an error if the axis is not uniform.
fn uniform_spacing(v: &[f64], axis: Axis) -> Result<f64> {
    if v.len() < 2 {
        return Err(WindClassError::InvalidSpacing {
            axis,
            reason: format!("need at least 2 coordinates, got {}", v.len()),
        });
    }

    let diffs: Vec<f64> = v.windows(2).map(|w| w[1] - w[0]).collect();
    if let Some(i) = diffs.iter().position(|&d| !(d > 0.0)) {
        return Err(WindClassError::InvalidSpacing {
            axis,
            reason: format!("coordinates not strictly increasing at index {}", i + 1),
        });
    }

    let n = diffs.len() as f64;
    let mean = diffs.iter().sum::<f64>() / n;
    let std = (diffs.iter().map(|&d| (d - mean).powi(2)).sum::<f64>() / n).sqrt();

    if std > SPACING_TOLERANCE {
        return Err(WindClassError::InvalidSpacing {
            axis,
            reason: format!("spacing std-dev {std:e} exceeds {SPACING_TOLERANCE:e}"),
        });
    }
    Ok(mean)
}
