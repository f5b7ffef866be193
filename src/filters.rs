//! Product eligibility filters
//!
//! Before a product is binned it passes a chain of filters. Each filter
//! either accepts the product or rejects it with a human readable reason; the
//! chain stops at the first rejection. Rejected products are skipped and the
//! reason ends up in the run statistics.

use crate::context::BinningContext;
use crate::period::{DataPeriod, Membership, TimeFilterMethod};
use crate::product::Product;
use crate::region::Polygon;
use std::fmt;

/// Why a filter refused a product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRejection {
    pub filter: &'static str,
    pub reason: String,
}

impl fmt::Display for FilterRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.filter, self.reason)
    }
}

pub trait ProductFilter: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(())` to accept, `Err(reason)` to reject
    fn accept(&self, product: &dyn Product) -> Result<(), String>;
}

/// Rejects products without geolocation or without any pixel
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoCodingFilter;

impl ProductFilter for GeoCodingFilter {
    fn name(&self) -> &'static str {
        "GeoCodingFilter"
    }

    fn accept(&self, product: &dyn Product) -> Result<(), String> {
        if !product.has_geocoding() {
            return Err("product has no geo-coding".to_string());
        }
        if product.width() == 0 || product.height() == 0 {
            return Err(format!("product raster is empty ({}x{})", product.width(), product.height()));
        }
        Ok(())
    }
}

/// Rejects products whose rasters differ in size
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiSizeFilter;

impl ProductFilter for MultiSizeFilter {
    fn name(&self) -> &'static str {
        "MultiSizeFilter"
    }

    fn accept(&self, product: &dyn Product) -> Result<(), String> {
        let sizes = product.raster_sizes();
        if sizes.len() <= 1 {
            return Ok(());
        }
        let listed = sizes
            .iter()
            .map(|(w, h)| format!("{w}x{h}"))
            .collect::<Vec<_>>()
            .join(", ");
        Err(format!("product contains rasters of different sizes ({listed})"))
    }
}

fn time_bounds(product: &dyn Product) -> Result<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>), String> {
    match (product.start_time(), product.end_time()) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err("product has no start or end time".to_string()),
    }
}

fn check_membership(product: &dyn Product, period: &DataPeriod) -> Result<(), String> {
    let (start, end) = time_bounds(product)?;
    match period.product_membership(start, end) {
        Membership::Current => Ok(()),
        membership => Err(format!(
            "product time range [{start}, {end}] is {} the binning period [{}, {})",
            if membership == Membership::Previous { "before" } else { "after" },
            period.start(),
            period.end()
        )),
    }
}

/// Accepts products overlapping `[start, end)`
#[derive(Debug, Clone)]
pub struct TimeRangeFilter {
    period: DataPeriod,
}

impl TimeRangeFilter {
    #[must_use]
    pub fn new(period: DataPeriod) -> Self {
        Self { period }
    }
}

impl ProductFilter for TimeRangeFilter {
    fn name(&self) -> &'static str {
        "TimeRangeFilter"
    }

    fn accept(&self, product: &dyn Product) -> Result<(), String> {
        check_membership(product, &self.period)
    }
}

/// Accepts products that may hold observations of the data day
#[derive(Debug, Clone)]
pub struct SpatialDataDayFilter {
    period: DataPeriod,
}

impl SpatialDataDayFilter {
    #[must_use]
    pub fn new(period: DataPeriod) -> Self {
        Self { period }
    }
}

impl ProductFilter for SpatialDataDayFilter {
    fn name(&self) -> &'static str {
        "SpatialDataDayFilter"
    }

    fn accept(&self, product: &dyn Product) -> Result<(), String> {
        check_membership(product, &self.period)
    }
}

/// Rejects products whose footprint misses the region. Products without a
/// footprint are left to the per-pixel region test.
#[derive(Debug, Clone)]
pub struct RegionFilter {
    region: Polygon,
}

impl RegionFilter {
    #[must_use]
    pub fn new(region: Polygon) -> Self {
        Self { region }
    }
}

impl ProductFilter for RegionFilter {
    fn name(&self) -> &'static str {
        "RegionFilter"
    }

    fn accept(&self, product: &dyn Product) -> Result<(), String> {
        match product.footprint() {
            Some(footprint) if !footprint.intersects(&self.region) => {
                Err("product does not intersect the binning region".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Filters applied in order; the first rejection wins
#[derive(Default)]
pub struct ProductFilterChain {
    filters: Vec<Box<dyn ProductFilter>>,
}

impl ProductFilterChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, filter: impl ProductFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    #[must_use]
    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// # Errors
    ///
    /// Returns the first rejecting filter and its reason.
    pub fn accept(&self, product: &dyn Product) -> Result<(), FilterRejection> {
        for filter in &self.filters {
            filter.accept(product).map_err(|reason| FilterRejection {
                filter: filter.name(),
                reason,
            })?;
        }
        Ok(())
    }
}

/// The filter chain of a binning run: geo-coding, multi-size, time, region
#[must_use]
pub fn create_source_product_filter(ctx: &BinningContext) -> ProductFilterChain {
    let mut chain = ProductFilterChain::new().with(GeoCodingFilter).with(MultiSizeFilter);
    if let Some(period) = ctx.data_period {
        chain = match ctx.time_filter_method {
            TimeFilterMethod::TimeRange => chain.with(TimeRangeFilter::new(period)),
            TimeFilterMethod::SpatiotemporalDataDay => chain.with(SpatialDataDayFilter::new(period)),
            TimeFilterMethod::None => chain,
        };
    }
    if let Some(region) = &ctx.region {
        chain = chain.with(RegionFilter::new(region.clone()));
    }
    chain
}
