//! Input products
//!
//! The binning engine never parses satellite file formats itself. It sees
//! every input through the [`Product`] trait (pixel geometry, geolocation,
//! samples, acquisition time) and every not-yet-opened input through
//! [`ProductSource`], whose `open` may fail per product.
//!
//! [`RasterProduct`] is an in-memory implementation backed by `ndarray`
//! rasters. It can be loaded from a simple JSON layout with
//! [`JsonProductSource`], which is what the command line tool reads.

use crate::errors::{BinningError, Result};
use crate::geo::{normalize_lon, GeoPos};
use crate::region::Polygon;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Number of geolocation samples taken along each edge for a footprint
const FOOTPRINT_STEPS_PER_EDGE: usize = 8;

/// A readable input product
pub trait Product: Send + Sync {
    fn name(&self) -> &str;

    /// Scene width in pixels
    fn width(&self) -> usize;

    /// Scene height in pixels (scan lines)
    fn height(&self) -> usize;

    /// `(width, height)` of every raster; more than one distinct entry means
    /// the product is multi-size
    fn raster_sizes(&self) -> Vec<(usize, usize)> {
        vec![(self.width(), self.height())]
    }

    fn has_geocoding(&self) -> bool {
        true
    }

    /// Geolocation at fractional pixel coordinates; pixel `(x, y)` spans
    /// `[x, x+1) × [y, y+1)` and its centre is `(x+0.5, y+0.5)`
    fn geo_pos(&self, x: f64, y: f64) -> Option<GeoPos>;

    /// Variables this product provides, in the order `sample` indexes them
    fn variable_names(&self) -> Vec<String>;

    /// Value of variable `var` at pixel `(x, y)`; `NaN` marks no-data
    fn sample(&self, var: usize, x: usize, y: usize) -> f64;

    fn start_time(&self) -> Option<DateTime<Utc>>;

    fn end_time(&self) -> Option<DateTime<Utc>>;

    /// Acquisition time of a pixel, interpolated by scan line by default
    fn pixel_time(&self, _x: usize, y: usize) -> Option<DateTime<Utc>> {
        let (start, end) = (self.start_time()?, self.end_time()?);
        let lines = self.height();
        if lines <= 1 {
            return Some(start);
        }
        let fraction = y as f64 / (lines - 1) as f64;
        let span_ms = (end - start).num_milliseconds() as f64;
        #[allow(clippy::cast_possible_truncation)]
        let offset = chrono::Duration::milliseconds((span_ms * fraction).round() as i64);
        Some(start + offset)
    }

    /// Outline of the scene in lon/lat, if known
    fn footprint(&self) -> Option<Polygon> {
        None
    }
}

/// A lazily opened product handle
pub trait ProductSource: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Returns [`BinningError::ProductRead`] when the product cannot be read.
    fn open(&self) -> Result<Arc<dyn Product>>;
}

/// Source around an already loaded product
#[derive(Clone)]
pub struct MemoryProductSource {
    name: String,
    product: Arc<dyn Product>,
}

impl MemoryProductSource {
    pub fn new(product: Arc<dyn Product>) -> Self {
        Self {
            name: product.name().to_string(),
            product,
        }
    }
}

impl ProductSource for MemoryProductSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<Arc<dyn Product>> {
        Ok(Arc::clone(&self.product))
    }
}

/// In-memory product with per-pixel-centre geolocation rasters
#[derive(Debug, Clone)]
pub struct RasterProduct {
    name: String,
    lat: Array2<f64>,
    lon: Array2<f64>,
    variables: Vec<(String, Array2<f64>)>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    geocoded: bool,
}

impl RasterProduct {
    /// Product geolocated by pixel-centre latitude/longitude rasters
    /// of shape `(height, width)`
    ///
    /// # Errors
    ///
    /// Fails when the rasters are empty or differ in shape.
    pub fn new(name: impl Into<String>, lat: Array2<f64>, lon: Array2<f64>) -> Result<Self> {
        let name = name.into();
        if lat.dim() != lon.dim() {
            return Err(BinningError::product_incompatible(
                name,
                format!("latitude raster {:?} and longitude raster {:?} differ in shape", lat.dim(), lon.dim()),
            ));
        }
        if lat.is_empty() {
            return Err(BinningError::product_incompatible(name, "empty geolocation rasters"));
        }
        Ok(Self {
            name,
            lat,
            lon,
            variables: Vec::new(),
            start_time: None,
            end_time: None,
            geocoded: true,
        })
    }

    /// Product on a regular lat/lon grid whose upper left corner is
    /// `(max_lat, min_lon)`
    #[must_use]
    pub fn regular(
        name: impl Into<String>,
        min_lon: f64,
        max_lat: f64,
        pixel_size: f64,
        width: usize,
        height: usize,
    ) -> Self {
        let lat = Array2::from_shape_fn((height, width), |(y, _)| max_lat - (y as f64 + 0.5) * pixel_size);
        let lon = Array2::from_shape_fn((height, width), |(_, x)| min_lon + (x as f64 + 0.5) * pixel_size);
        Self {
            name: name.into(),
            lat,
            lon,
            variables: Vec::new(),
            start_time: None,
            end_time: None,
            geocoded: true,
        }
    }

    /// Add a variable raster of shape `(height, width)`. A differently
    /// shaped raster makes the product multi-size.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, data: Array2<f64>) -> Self {
        self.variables.push((name.into(), data));
        self
    }

    #[must_use]
    pub fn with_time_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    /// Drop the geolocation; such products are rejected by the geo-coding filter
    #[must_use]
    pub fn without_geocoding(mut self) -> Self {
        self.geocoded = false;
        self
    }

    /// Bilinear blend of the four pixel centres around `(x, y)`. `unwrap`
    /// maps each corner value relative to the first one before blending.
    fn interpolate(grid: &Array2<f64>, x: f64, y: f64, unwrap: impl Fn(f64, f64) -> f64) -> Option<f64> {
        let (height, width) = grid.dim();
        if width == 0 || height == 0 {
            return None;
        }
        // positions relative to pixel centres; linear extrapolation past the edges
        let (i0, fu) = cell(x - 0.5, width);
        let (j0, fv) = cell(y - 0.5, height);
        let i1 = (i0 + 1).min(width - 1);
        let j1 = (j0 + 1).min(height - 1);
        let base = grid[[j0, i0]];
        let corner = |j: usize, i: usize| unwrap(base, grid[[j, i]]);
        let top = base + (corner(j0, i1) - base) * fu;
        let bottom = corner(j1, i0) + (corner(j1, i1) - corner(j1, i0)) * fu;
        Some(top + (bottom - top) * fv)
    }
}

/// `lon` shifted by a multiple of 360° to lie within 180° of `reference`
fn unwrap_lon(reference: f64, lon: f64) -> f64 {
    let delta = lon - reference;
    if delta > 180.0 {
        lon - 360.0
    } else if delta < -180.0 {
        lon + 360.0
    } else {
        lon
    }
}

/// Lower cell index and fractional offset for a centre-relative coordinate
fn cell(u: f64, size: usize) -> (usize, f64) {
    if size < 2 {
        return (0, 0.0);
    }
    let max_start = (size - 2) as f64;
    let start = u.floor().clamp(0.0, max_start);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = start as usize;
    (index, u - start)
}

impl Product for RasterProduct {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> usize {
        self.lat.dim().1
    }

    fn height(&self) -> usize {
        self.lat.dim().0
    }

    fn raster_sizes(&self) -> Vec<(usize, usize)> {
        let mut sizes = vec![(self.width(), self.height())];
        for (_, data) in &self.variables {
            let (h, w) = data.dim();
            if !sizes.contains(&(w, h)) {
                sizes.push((w, h));
            }
        }
        sizes
    }

    fn has_geocoding(&self) -> bool {
        self.geocoded
    }

    fn geo_pos(&self, x: f64, y: f64) -> Option<GeoPos> {
        if !self.geocoded || !x.is_finite() || !y.is_finite() {
            return None;
        }
        let lat = Self::interpolate(&self.lat, x, y, |_, v| v)?;
        let lon = Self::interpolate(&self.lon, x, y, unwrap_lon)?;
        let pos = GeoPos::new(lat, normalize_lon(lon));
        pos.is_valid().then_some(pos)
    }

    fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|(name, _)| name.clone()).collect()
    }

    fn sample(&self, var: usize, x: usize, y: usize) -> f64 {
        self.variables
            .get(var)
            .and_then(|(_, data)| data.get([y, x]).copied())
            .unwrap_or(f64::NAN)
    }

    fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    fn footprint(&self) -> Option<Polygon> {
        if !self.geocoded {
            return None;
        }
        let (w, h) = (self.width() as f64, self.height() as f64);
        let n = FOOTPRINT_STEPS_PER_EDGE;
        let t = |k: usize| k as f64 / n as f64;
        // clockwise walk along the outer pixel edges
        let outline = (0..n)
            .map(|k| (t(k) * w, 0.0))
            .chain((0..n).map(|k| (w, t(k) * h)))
            .chain((0..n).map(|k| (w - t(k) * w, h)))
            .chain((0..n).map(|k| (0.0, h - t(k) * h)));
        let mut vertices = outline
            .map(|(x, y)| self.geo_pos(x, y).map(|p| (p.lon, p.lat)))
            .collect::<Option<Vec<_>>>()?;
        for k in 1..vertices.len() {
            vertices[k].0 = unwrap_lon(vertices[k - 1].0, vertices[k].0);
        }
        // scenes across the date line have no single lon/lat outline
        if vertices.iter().any(|&(lon, _)| !(-180.0..=180.0).contains(&lon)) {
            return None;
        }
        Polygon::new(vertices).ok()
    }
}

/// Geolocation of a product file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeoCodingSpec {
    /// Regular lat/lon grid anchored at its upper left corner
    Regular {
        min_lon: f64,
        max_lat: f64,
        pixel_size: f64,
    },
    /// Row-major pixel-centre coordinates
    PixelCentres { lat: Vec<f64>, lon: Vec<f64> },
}

/// JSON layout of a raster product; `null` samples are no-data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterProductFile {
    pub name: String,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub geocoding: GeoCodingSpec,
    pub variables: BTreeMap<String, Vec<Option<f64>>>,
}

impl RasterProductFile {
    /// Build the in-memory product
    ///
    /// # Errors
    ///
    /// Returns a product read error for an empty raster or when array
    /// lengths do not match the declared dimensions.
    pub fn into_product(self) -> Result<RasterProduct> {
        let shape = (self.height, self.width);
        let name = self.name;
        if self.width == 0 || self.height == 0 {
            return Err(BinningError::product_read(
                name,
                format!("empty raster ({}x{})", self.width, self.height),
            ));
        }
        let to_array = |what: &str, values: Vec<f64>| {
            Array2::from_shape_vec(shape, values).map_err(|e| {
                BinningError::product_read(name.clone(), format!("{what} does not match {}x{}: {e}", shape.1, shape.0))
            })
        };
        let mut product = match self.geocoding {
            GeoCodingSpec::Regular {
                min_lon,
                max_lat,
                pixel_size,
            } => RasterProduct::regular(name.clone(), min_lon, max_lat, pixel_size, self.width, self.height),
            GeoCodingSpec::PixelCentres { lat, lon } => {
                RasterProduct::new(name.clone(), to_array("latitude", lat)?, to_array("longitude", lon)?)?
            }
        };
        for (var, values) in self.variables {
            let values = values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
            let data = to_array(&format!("variable '{var}'"), values)?;
            product = product.with_variable(var, data);
        }
        product.start_time = self.start_time;
        product.end_time = self.end_time;
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns I/O and JSON errors.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Product stored as a [`RasterProductFile`] JSON document
#[derive(Debug, Clone)]
pub struct JsonProductSource {
    path: PathBuf,
    name: String,
}

impl JsonProductSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self { path, name }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProductSource for JsonProductSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<Arc<dyn Product>> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| BinningError::product_read(&self.name, e.to_string()))?;
        let file: RasterProductFile =
            serde_json::from_str(&text).map_err(|e| BinningError::product_read(&self.name, e.to_string()))?;
        Ok(Arc::new(file.into_product()?))
    }
}
