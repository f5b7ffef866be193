//! Planetary grid: the fixed equal-area tiling of the sphere into bins
//!
//! The grid is the sinusoidal "SEA" layout used by SeaWiFS/SeaDAS Level-3
//! products. The sphere is cut into `num_rows` latitude bands of equal height;
//! band `r` (0 = northernmost) holds `round(2 * num_rows * cos(lat_r))` columns,
//! so every bin covers nearly the same area. Bins are numbered row-major from
//! the north pole, which makes ascending bin index identical to ascending
//! `(row, column)` order. The collector and temporal binner rely on that.

use crate::errors::{BinningError, Result};
use crate::geo::GeoPos;

/// Row count of the classic 9.28 km SeaWiFS grid
pub const DEFAULT_NUM_ROWS: usize = 2160;

/// Immutable SEA planetary grid
#[derive(Debug, Clone)]
pub struct PlanetaryGrid {
    num_rows: usize,
    lat_bin: Vec<f64>,
    base_bin: Vec<u64>,
    num_bin: Vec<u32>,
    num_bins: u64,
}

impl PlanetaryGrid {
    /// Build a grid with `num_rows` latitude bands
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `num_rows` is odd or smaller than 2.
    pub fn new(num_rows: usize) -> Result<Self> {
        if num_rows < 2 || num_rows % 2 != 0 {
            return Err(BinningError::config(format!(
                "number of grid rows must be even and at least 2, got {num_rows}"
            )));
        }

        let mut lat_bin = Vec::with_capacity(num_rows);
        let mut base_bin = Vec::with_capacity(num_rows);
        let mut num_bin = Vec::with_capacity(num_rows);

        let mut current_base = 0_u64;
        for row in 0..num_rows {
            let lat = 90.0 - (row as f64 + 0.5) * 180.0 / num_rows as f64;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let cols = ((2.0 * num_rows as f64 * lat.to_radians().cos()).round() as u32).max(1);
            lat_bin.push(lat);
            base_bin.push(current_base);
            num_bin.push(cols);
            current_base += u64::from(cols);
        }

        Ok(Self {
            num_rows,
            lat_bin,
            base_bin,
            num_bin,
            num_bins: current_base,
        })
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Total number of bins on the globe
    #[must_use]
    pub fn num_bins(&self) -> u64 {
        self.num_bins
    }

    /// Number of columns in `row`
    #[must_use]
    pub fn num_cols(&self, row: usize) -> u32 {
        self.num_bin[row]
    }

    /// Index of the first (westernmost) bin of `row`
    #[must_use]
    pub fn first_bin_index(&self, row: usize) -> u64 {
        self.base_bin[row]
    }

    /// Centre latitude of `row`
    #[must_use]
    pub fn center_lat(&self, row: usize) -> f64 {
        self.lat_bin[row]
    }

    /// Bin index for a geographic position. Total over all finite inputs:
    /// latitudes and longitudes outside the valid range are clamped.
    #[must_use]
    pub fn bin_index(&self, lat: f64, lon: f64) -> u64 {
        let row = self.row_index(lat);
        self.base_bin[row] + u64::from(self.col_index(lon, row))
    }

    /// Latitude band containing `lat`
    #[must_use]
    pub fn row_index(&self, lat: f64) -> usize {
        let rows = self.num_rows as f64;
        let row = ((90.0 - lat) * rows / 180.0).floor();
        if row.is_nan() || row <= 0.0 {
            0
        } else {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let row = row as usize;
            row.min(self.num_rows - 1)
        }
    }

    /// Column within `row` containing `lon`
    #[must_use]
    pub fn col_index(&self, lon: f64, row: usize) -> u32 {
        let cols = self.num_bin[row];
        if lon.is_nan() || lon <= -180.0 {
            return 0;
        }
        if lon >= 180.0 {
            return cols - 1;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let col = ((180.0 + lon) * f64::from(cols) / 360.0).floor() as u32;
        col.min(cols - 1)
    }

    /// Row containing the bin `bin_index`
    #[must_use]
    pub fn row_of_bin(&self, bin_index: u64) -> usize {
        // base_bin is strictly increasing, so the row is the last base <= index
        let pos = self.base_bin.partition_point(|&base| base <= bin_index);
        pos.saturating_sub(1).min(self.num_rows - 1)
    }

    /// `(row, column)` of a bin
    #[must_use]
    pub fn row_col(&self, bin_index: u64) -> (usize, u32) {
        let row = self.row_of_bin(bin_index);
        let col = bin_index.saturating_sub(self.base_bin[row]);
        #[allow(clippy::cast_possible_truncation)]
        let col = (col as u32).min(self.num_bin[row] - 1);
        (row, col)
    }

    /// Geographic centre of a bin as `(lat, lon)`
    #[must_use]
    pub fn center_of(&self, bin_index: u64) -> (f64, f64) {
        let (row, col) = self.row_col(bin_index);
        let lon = -180.0 + (f64::from(col) + 0.5) * 360.0 / f64::from(self.num_bin[row]);
        (self.lat_bin[row], lon)
    }

    /// Geographic centre of a bin as a [`GeoPos`]
    #[must_use]
    pub fn center_pos(&self, bin_index: u64) -> GeoPos {
        let (lat, lon) = self.center_of(bin_index);
        GeoPos::new(lat, lon)
    }
}
