//! RuL3Bin: spatial and temporal Level-3 binning of satellite swath products
//!
//! A Rust library that aggregates pixel observations from many swath products
//! into a fixed global equal-area grid over a configurable time window. Every
//! cell ("bin") gets per-variable statistical summaries, streamed out in
//! ascending bin index order.
//!
//! ## Key Features
//!
//! - **Planetary Grid**: the SeaWiFS/SeaDAS sinusoidal equal-area layout
//! - **Mergeable Aggregators**: mean/sigma, min/max, sum, on-max set, percentiles
//! - **Parallel Processing**: products are binned on a bounded Rayon pool
//! - **Bounded Memory**: optional disk-backed collection with spill files
//! - **Product Filters**: geo-coding, multi-size, time range, data day, region
//! - **Band Maths**: pixel masks and derived bin features from expressions
//!
//! ## Module Organization
//!
//! - [`grid`]: planetary grid indexing
//! - [`aggregators`] and [`bin_manager`]: per-bin accumulator state
//! - [`spatial_binner`], [`collector`], [`temporal_binner`]: the binning stages
//! - [`cell_processor`] and [`expr`]: post-processing and expressions
//! - [`filters`], [`period`], [`region`]: product and observation eligibility
//! - [`product`]: input product interfaces and an in-memory raster product
//! - [`config`] and [`context`]: run configuration
//! - [`pipeline`]: run orchestration, sinks and statistics
//! - [`metadata`]: grid and run reporting
//! - [`parallel`]: parallel processing configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use ru_l3bin::prelude::*;
//! use std::sync::Arc;
//!
//! let config = BinningConfig::new(2160, vec![AggregatorConfig::average("chl")]);
//! let ctx = Arc::new(config.create_binning_context().unwrap());
//!
//! let sources: Vec<Box<dyn ProductSource>> = vec![Box::new(JsonProductSource::new("swath.json"))];
//! let mut sink = VecSink::new();
//! let stats = Binner::new(ctx, ParallelConfig::default())
//!     .run(&sources, &mut sink, &CancellationToken::new())
//!     .unwrap();
//! println!("{} bins from {} products", sink.bins.len(), stats.products_accepted);
//! ```

pub mod aggregators;
pub mod bin_manager;
pub mod bins;
pub mod cell_processor;
pub mod collector;
pub mod config;
pub mod context;
pub mod errors;
pub mod expr;
pub mod filters;
pub mod geo;
pub mod grid;
pub mod metadata;
pub mod parallel;
pub mod period;
pub mod pipeline;
pub mod product;
pub mod region;
pub mod spatial_binner;
pub mod temporal_binner;

// Direct re-exports for the public API
pub use errors::*;
pub use metadata::*;
pub use parallel::*;

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::aggregators::AggregatorConfig;
    pub use crate::bins::{Observation, SpatialBin, TemporalBin, VariableContext};
    pub use crate::cell_processor::CellProcessorConfig;
    pub use crate::config::{BinningConfig, CollectorConfig, CollectorStrategy};
    pub use crate::context::BinningContext;
    pub use crate::errors::{BinningError, Result};
    pub use crate::grid::PlanetaryGrid;
    pub use crate::parallel::ParallelConfig;
    pub use crate::period::{DataPeriod, Membership, TimeFilterMethod};
    pub use crate::pipeline::{
        Binner, CancellationToken, JsonLinesBinWriter, RunStatistics, TemporalBinSink, VecSink,
    };
    pub use crate::product::{JsonProductSource, MemoryProductSource, Product, ProductSource, RasterProduct};
    pub use crate::region::Polygon;
}
