//! Binning run configuration
//!
//! A [`BinningConfig`] is read from JSON, validated, and turned into an
//! immutable [`BinningContext`] that every worker of the run shares.
//! All configuration errors surface here, before any product is touched.
//!
//! ```json
//! {
//!   "num_rows": 2160,
//!   "aggregators": [{ "type": "AVG", "var_name": "chl", "output_counts": true }],
//!   "mask_expr": "chl > 0",
//!   "start_date_time": "2024-03-01",
//!   "period_duration": 1.0,
//!   "time_filter_method": "SPATIOTEMPORAL_DATA_DAY",
//!   "min_data_hour": 0.0
//! }
//! ```

use crate::aggregators::AggregatorConfig;
use crate::bin_manager::BinManager;
use crate::bins::VariableContext;
use crate::cell_processor::CellProcessorConfig;
use crate::context::BinningContext;
use crate::errors::{BinningError, Result};
use crate::expr::{self, CompiledExpression};
use crate::grid::{PlanetaryGrid, DEFAULT_NUM_ROWS};
use crate::period::{parse_start_date_utc, DataPeriod, TimeFilterMethod};
use crate::region::Polygon;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of bin groups completed per parallel batch
pub const DEFAULT_TEMPORAL_BATCH_SIZE: usize = 4096;

/// How spatial bins are held until temporal binning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorStrategy {
    /// Everything stays in memory
    #[default]
    InMemory,
    /// Shards over their memory share are spilled to temporary files
    DiskBacked,
}

/// Spatial bin collector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub strategy: CollectorStrategy,
    /// Memory budget in bins for the disk-backed strategy
    pub max_bins_in_memory: usize,
    /// Number of bin-index ranges locked independently
    pub num_shards: usize,
    /// Parent directory for spill files (system temp dir if unset)
    pub spill_dir: Option<PathBuf>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            strategy: CollectorStrategy::InMemory,
            max_bins_in_memory: 1_000_000,
            num_shards: 64,
            spill_dir: None,
        }
    }
}

impl CollectorConfig {
    /// Disk-backed collection with the given memory budget
    #[must_use]
    pub fn disk_backed(max_bins_in_memory: usize) -> Self {
        Self {
            strategy: CollectorStrategy::DiskBacked,
            max_bins_in_memory,
            ..Self::default()
        }
    }

    /// Overlay `RU_L3BIN_MAX_BINS_IN_MEMORY` and `RU_L3BIN_SPILL_DIR`;
    /// either one switches to disk-backed collection
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("RU_L3BIN_MAX_BINS_IN_MEMORY") {
            if let Ok(max_bins) = val.parse() {
                self.max_bins_in_memory = max_bins;
                self.strategy = CollectorStrategy::DiskBacked;
            }
        }
        if let Ok(val) = std::env::var("RU_L3BIN_SPILL_DIR") {
            self.spill_dir = Some(PathBuf::from(val));
            self.strategy = CollectorStrategy::DiskBacked;
        }
        self
    }

    /// # Errors
    ///
    /// Returns a configuration error for a zero shard count or memory budget.
    pub fn validate(&self) -> Result<()> {
        if self.num_shards == 0 {
            return Err(BinningError::config("collector 'num_shards' must be > 0"));
        }
        if self.strategy == CollectorStrategy::DiskBacked && self.max_bins_in_memory == 0 {
            return Err(BinningError::config("collector 'max_bins_in_memory' must be > 0"));
        }
        Ok(())
    }
}

/// User-facing binning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinningConfig {
    /// Rows of the planetary grid
    pub num_rows: usize,
    /// Variables to read in addition to those named by aggregators and the mask
    pub variables: Vec<String>,
    pub aggregators: Vec<AggregatorConfig>,
    pub post_processor: Option<CellProcessorConfig>,
    /// Pixels for which this evaluates to false are ignored
    pub mask_expr: Option<String>,
    /// WKT polygon limiting the binned area
    pub region: Option<String>,
    /// `yyyy-MM-dd` or `yyyy-MM-dd HH:mm:ss`, UTC
    pub start_date_time: Option<String>,
    /// Period length in days
    pub period_duration: Option<f64>,
    pub time_filter_method: TimeFilterMethod,
    /// UTC hour at which the data day starts on the date line
    pub min_data_hour: Option<f64>,
    /// Sub-pixels per pixel edge
    pub super_sampling: usize,
    /// Maximum sub-pixel distance from the pixel centre in metres; `<= 0` disables
    pub max_distance_on_earth: f64,
    pub collector: CollectorConfig,
    pub temporal_batch_size: usize,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            num_rows: DEFAULT_NUM_ROWS,
            variables: Vec::new(),
            aggregators: Vec::new(),
            post_processor: None,
            mask_expr: None,
            region: None,
            start_date_time: None,
            period_duration: None,
            time_filter_method: TimeFilterMethod::None,
            min_data_hour: None,
            super_sampling: 1,
            max_distance_on_earth: -1.0,
            collector: CollectorConfig::default(),
            temporal_batch_size: DEFAULT_TEMPORAL_BATCH_SIZE,
        }
    }
}

impl BinningConfig {
    /// Configuration with the given grid rows and aggregators, defaults otherwise
    #[must_use]
    pub fn new(num_rows: usize, aggregators: Vec<AggregatorConfig>) -> Self {
        Self {
            num_rows,
            aggregators,
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns JSON errors for malformed documents.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// # Errors
    ///
    /// Returns I/O errors for unreadable files and JSON errors for malformed documents.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check parameter combinations
    ///
    /// # Errors
    ///
    /// Returns [`BinningError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.time_filter_method != TimeFilterMethod::None
            && (self.start_date_time.is_none() || self.period_duration.is_none())
        {
            return Err(BinningError::config(
                "using a time filter requires the parameters 'start_date_time' and 'period_duration'",
            ));
        }
        if let Some(duration) = self.period_duration {
            if !(duration >= 0.0) {
                return Err(BinningError::config("the parameter 'period_duration' must be a positive value"));
            }
        }
        if self.time_filter_method == TimeFilterMethod::SpatiotemporalDataDay {
            match self.min_data_hour {
                None => {
                    return Err(BinningError::config(
                        "SPATIOTEMPORAL_DATA_DAY filtering requires the parameter 'min_data_hour'",
                    ))
                }
                Some(hour) if !(0.0..=24.0).contains(&hour) => {
                    return Err(BinningError::config(format!(
                        "'min_data_hour' must be within 0..=24, got {hour}"
                    )))
                }
                Some(_) => {}
            }
        }
        if self.num_rows == 0 || self.num_rows % 2 != 0 {
            return Err(BinningError::config(format!(
                "parameter 'num_rows' must be greater than 0 and even, got {}",
                self.num_rows
            )));
        }
        if self.aggregators.is_empty() {
            return Err(BinningError::config("no aggregators have been defined"));
        }
        if self.super_sampling == 0 {
            return Err(BinningError::config("parameter 'super_sampling' must be >= 1"));
        }
        if self.temporal_batch_size == 0 {
            return Err(BinningError::config("parameter 'temporal_batch_size' must be > 0"));
        }
        self.collector.validate()
    }

    /// Variables read from every product: explicit ones first, then those of
    /// the aggregators, then those of the mask
    ///
    /// # Errors
    ///
    /// Returns an expression error if the mask does not parse.
    pub fn variable_context(&self) -> Result<VariableContext> {
        let mut ctx = VariableContext::from_names(self.variables.iter().cloned());
        for aggregator in &self.aggregators {
            for name in aggregator.var_names() {
                ctx.add(name);
            }
        }
        if let Some(mask) = &self.mask_expr {
            for name in expr::identifiers(mask)? {
                ctx.add(name);
            }
        }
        Ok(ctx)
    }

    /// Validate and resolve into the immutable context of a run
    ///
    /// # Errors
    ///
    /// Returns configuration, expression or region errors.
    pub fn create_binning_context(&self) -> Result<BinningContext> {
        self.validate()?;
        let grid = PlanetaryGrid::new(self.num_rows)?;
        let variable_context = self.variable_context()?;
        let bin_manager = BinManager::new(&variable_context, &self.aggregators, self.post_processor.as_ref())?;
        let mask = self
            .mask_expr
            .as_deref()
            .map(|source| CompiledExpression::compile(source, variable_context.names()))
            .transpose()?;
        let region = self.region.as_deref().map(Polygon::from_wkt).transpose()?;

        let data_period = match (&self.start_date_time, self.period_duration) {
            (Some(start), Some(duration)) => {
                let start = parse_start_date_utc(start)?;
                Some(match (self.time_filter_method, self.min_data_hour) {
                    (TimeFilterMethod::SpatiotemporalDataDay, Some(hour)) => {
                        DataPeriod::spatiotemporal_data_day(start, duration, hour)
                    }
                    _ => DataPeriod::time_range(start, duration),
                })
            }
            _ => None,
        };

        Ok(BinningContext {
            grid,
            variable_context,
            bin_manager,
            mask,
            data_period,
            time_filter_method: self.time_filter_method,
            region,
            super_sampling: self.super_sampling,
            max_distance_on_earth: (self.max_distance_on_earth > 0.0).then_some(self.max_distance_on_earth),
            collector: self.collector.clone(),
            temporal_batch_size: self.temporal_batch_size,
        })
    }
}
