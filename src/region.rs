//! Region geometry: WKT polygons and bounding boxes
//!
//! Coordinates are `(lon, lat)` in degrees, as in WKT. Only simple polygons
//! without holes are supported; that is all a binning region needs.

use crate::errors::{BinningError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned lon/lat box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    #[must_use]
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Box around `points`; `None` when there are no points
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        points.into_iter().fold(None, |bbox: Option<Self>, (lon, lat)| {
            Some(match bbox {
                None => Self::new(lon, lat, lon, lat),
                Some(b) => Self::new(b.min_lon.min(lon), b.min_lat.min(lat), b.max_lon.max(lon), b.max_lat.max(lat)),
            })
        })
    }

    #[must_use]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }

    /// Smallest box holding both boxes
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(
            self.min_lon.min(other.min_lon),
            self.min_lat.min(other.min_lat),
            self.max_lon.max(other.max_lon),
            self.max_lat.max(other.max_lat),
        )
    }
}

/// A closed lon/lat polygon
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    /// Ring vertices without the repeated closing point
    vertices: Vec<(f64, f64)>,
    bbox: BoundingBox,
}

impl Polygon {
    /// Build a polygon from a ring; a repeated closing vertex is dropped
    ///
    /// # Errors
    ///
    /// Returns a region error for rings with fewer than three distinct
    /// vertices or non-finite coordinates.
    pub fn new(mut vertices: Vec<(f64, f64)>) -> Result<Self> {
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.len() < 3 {
            return Err(BinningError::Region(format!(
                "polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        if vertices.iter().any(|(lon, lat)| !lon.is_finite() || !lat.is_finite()) {
            return Err(BinningError::Region("polygon has non-finite coordinates".to_string()));
        }
        let bbox = BoundingBox::from_points(vertices.iter().copied())
            .ok_or_else(|| BinningError::Region("empty polygon".to_string()))?;
        Ok(Self { vertices, bbox })
    }

    /// Rectangle spanning the given box
    #[must_use]
    pub fn rectangle(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            vertices: vec![
                (min_lon, min_lat),
                (max_lon, min_lat),
                (max_lon, max_lat),
                (min_lon, max_lat),
            ],
            bbox: BoundingBox::new(min_lon, min_lat, max_lon, max_lat),
        }
    }

    /// Parse `POLYGON((lon lat, lon lat, ...))`
    ///
    /// # Errors
    ///
    /// Returns a region error for anything else, including polygons with holes.
    pub fn from_wkt(wkt: &str) -> Result<Self> {
        let bad = |msg: &str| BinningError::Region(format!("{msg}: '{wkt}'"));
        let text = wkt.trim();
        let (keyword, body) = text.split_at(text.find('(').ok_or_else(|| bad("missing '('"))?);
        if !keyword.trim().eq_ignore_ascii_case("POLYGON") {
            return Err(bad("only POLYGON geometries are supported"));
        }
        let body = body
            .trim()
            .strip_prefix('(')
            .and_then(|b| b.strip_suffix(')'))
            .ok_or_else(|| bad("unbalanced parentheses"))?
            .trim();
        let ring = body
            .strip_prefix('(')
            .and_then(|b| b.strip_suffix(')'))
            .ok_or_else(|| bad("missing polygon ring"))?;
        if ring.contains('(') || ring.contains(')') {
            return Err(bad("polygons with holes are not supported"));
        }
        let vertices = ring
            .split(',')
            .map(|pair| {
                let mut coords = pair.split_whitespace().map(str::parse::<f64>);
                match (coords.next(), coords.next(), coords.next()) {
                    (Some(Ok(lon)), Some(Ok(lat)), None) => Ok((lon, lat)),
                    _ => Err(bad(&format!("bad coordinate pair '{}'", pair.trim()))),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(vertices)
    }

    #[must_use]
    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    fn edges(&self) -> impl Iterator<Item = ((f64, f64), (f64, f64))> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Even-odd point-in-polygon test
    #[must_use]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if !self.bbox.contains(lon, lat) {
            return false;
        }
        let mut inside = false;
        for ((x1, y1), (x2, y2)) in self.edges() {
            if (y1 > lat) != (y2 > lat) {
                let x_cross = x1 + (lat - y1) * (x2 - x1) / (y2 - y1);
                if lon < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Whether the polygons share any area or boundary point
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        if !self.bbox.intersects(&other.bbox) {
            return false;
        }
        if self.vertices.iter().any(|&(lon, lat)| other.contains(lon, lat))
            || other.vertices.iter().any(|&(lon, lat)| self.contains(lon, lat))
        {
            return true;
        }
        self.edges()
            .any(|(a, b)| other.edges().any(|(c, d)| segments_intersect(a, b, c, d)))
    }
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POLYGON((")?;
        for (lon, lat) in &self.vertices {
            write!(f, "{lon} {lat}, ")?;
        }
        let (lon, lat) = self.vertices[0];
        write!(f, "{lon} {lat}))")
    }
}

fn orientation(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> f64 {
    (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0)
}

fn on_segment(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> bool {
    r.0 >= p.0.min(q.0) && r.0 <= p.0.max(q.0) && r.1 >= p.1.min(q.1) && r.1 <= p.1.max(q.1)
}

fn segments_intersect(a: (f64, f64), b: (f64, f64), c: (f64, f64), d: (f64, f64)) -> bool {
    let d1 = orientation(c, d, a);
    let d2 = orientation(c, d, b);
    let d3 = orientation(a, b, c);
    let d4 = orientation(a, b, d);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0)) && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0)) {
        return true;
    }
    (d1 == 0.0 && on_segment(c, d, a))
        || (d2 == 0.0 && on_segment(c, d, b))
        || (d3 == 0.0 && on_segment(a, b, c))
        || (d4 == 0.0 && on_segment(a, b, d))
}
