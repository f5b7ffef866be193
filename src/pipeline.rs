//! Binning run orchestration
//!
//! A run has two phases. In the spatial phase a bounded worker pool opens
//! each product, runs it through the filter chain, bins it spatially and hands
//! the partial bins to the collector. In the temporal phase the collected
//! groups are completed in ascending bin order, in parallel batches, and
//! streamed to a [`TemporalBinSink`].
//!
//! Failed or rejected products only skip themselves; collector (spill) and
//! sink failures abort the run. Cancellation voids the run.

use crate::bins::TemporalBin;
use crate::collector::SpatialBinCollector;
use crate::context::BinningContext;
use crate::errors::{BinningError, Result};
use crate::filters::{create_source_product_filter, ProductFilterChain};
use crate::grid::PlanetaryGrid;
use crate::parallel::ParallelConfig;
use crate::product::ProductSource;
use crate::region::BoundingBox;
use crate::spatial_binner::SpatialBinner;
use crate::temporal_binner::TemporalBinner;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Run-level cancellation flag, cheap to clone across threads
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A product that did not contribute, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRejection {
    pub product: String,
    pub reason: String,
}

/// Summary of a finished run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStatistics {
    pub products_accepted: usize,
    pub products_rejected: Vec<ProductRejection>,
    pub observations: u64,
    pub spatial_bins_consumed: u64,
    pub temporal_bins_emitted: u64,
    pub spill_events: u64,
    /// Earliest start and latest end time of accepted products
    pub time_coverage: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Bounding box of accepted products' footprints
    pub coverage: Option<BoundingBox>,
    pub elapsed: Duration,
}

impl RunStatistics {
    fn record_accepted(&mut self, accepted: AcceptedProduct) {
        self.products_accepted += 1;
        if let Some((start, end)) = accepted.time_range {
            self.time_coverage = Some(match self.time_coverage {
                Some((s, e)) => (s.min(start), e.max(end)),
                None => (start, end),
            });
        }
        if let Some(bbox) = accepted.footprint {
            self.coverage = Some(self.coverage.map_or(bbox, |c| c.union(&bbox)));
        }
    }
}

/// Receiver of completed temporal bins, in ascending bin index order
pub trait TemporalBinSink {
    fn begin(&mut self, _feature_names: &[String]) -> Result<()> {
        Ok(())
    }

    fn consume(&mut self, bin: &TemporalBin) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Collects every bin in memory
#[derive(Debug, Default)]
pub struct VecSink {
    pub feature_names: Vec<String>,
    pub bins: Vec<TemporalBin>,
}

impl VecSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of feature `name` in `bin`
    #[must_use]
    pub fn feature(&self, bin: &TemporalBin, name: &str) -> Option<f64> {
        let position = self.feature_names.iter().position(|n| n == name)?;
        bin.features.get(position).copied()
    }
}

impl TemporalBinSink for VecSink {
    fn begin(&mut self, feature_names: &[String]) -> Result<()> {
        self.feature_names = feature_names.to_vec();
        Ok(())
    }

    fn consume(&mut self, bin: &TemporalBin) -> Result<()> {
        self.bins.push(bin.clone());
        Ok(())
    }
}

/// Writes one JSON object per bin and line; non-finite features become `null`
pub struct JsonLinesBinWriter<W: Write> {
    writer: W,
    grid: PlanetaryGrid,
    feature_names: Vec<String>,
}

impl<W: Write> JsonLinesBinWriter<W> {
    pub fn new(writer: W, grid: PlanetaryGrid) -> Self {
        Self {
            writer,
            grid,
            feature_names: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TemporalBinSink for JsonLinesBinWriter<W> {
    fn begin(&mut self, feature_names: &[String]) -> Result<()> {
        self.feature_names = feature_names.to_vec();
        Ok(())
    }

    fn consume(&mut self, bin: &TemporalBin) -> Result<()> {
        let (lat, lon) = self.grid.center_of(bin.index);
        let features: serde_json::Map<String, serde_json::Value> = self
            .feature_names
            .iter()
            .zip(&bin.features)
            .map(|(name, value)| (name.clone(), serde_json::json!(value)))
            .collect();
        let line = serde_json::json!({
            "index": bin.index,
            "lat": lat,
            "lon": lon,
            "num_obs": bin.num_obs,
            "num_passes": bin.num_passes,
            "features": features,
        });
        serde_json::to_writer(&mut self.writer, &line)
            .map_err(|e| BinningError::Sink(e.to_string()))?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| BinningError::Sink(e.to_string()))
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| BinningError::Sink(e.to_string()))
    }
}

struct AcceptedProduct {
    time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    footprint: Option<BoundingBox>,
}

enum ProductOutcome {
    Accepted(AcceptedProduct),
    Rejected(ProductRejection),
    Cancelled,
    Fatal(BinningError),
}

/// Drives a complete binning run
pub struct Binner {
    ctx: Arc<BinningContext>,
    parallel: ParallelConfig,
}

impl Binner {
    #[must_use]
    pub fn new(ctx: Arc<BinningContext>, parallel: ParallelConfig) -> Self {
        Self { ctx, parallel }
    }

    #[must_use]
    pub fn context(&self) -> &BinningContext {
        &self.ctx
    }

    fn process_source(
        source: &dyn ProductSource,
        filter: &ProductFilterChain,
        binner: &SpatialBinner,
        collector: &SpatialBinCollector,
        cancel: &CancellationToken,
    ) -> ProductOutcome {
        if cancel.is_cancelled() {
            return ProductOutcome::Cancelled;
        }
        let started = Instant::now();
        let rejected = |reason: String| {
            warn!(product = source.name(), %reason, "filtered out product");
            ProductOutcome::Rejected(ProductRejection {
                product: source.name().to_string(),
                reason,
            })
        };

        let product = match source.open() {
            Ok(product) => product,
            Err(e) => return rejected(e.to_string()),
        };
        if let Err(rejection) = filter.accept(&*product) {
            return rejected(rejection.to_string());
        }
        let product_bins = match binner.process_product(&*product) {
            Ok(bins) => bins,
            Err(e) if e.is_product_level() => return rejected(e.to_string()),
            Err(e) => {
                cancel.cancel();
                return ProductOutcome::Fatal(e);
            }
        };
        let num_bins = product_bins.bins.len();
        if let Err(e) = collector.consume(product_bins.bins) {
            cancel.cancel();
            return ProductOutcome::Fatal(e);
        }
        info!(
            product = source.name(),
            observations = product_bins.num_observations,
            bins = num_bins,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "processed product"
        );

        let time_range = product.start_time().zip(product.end_time());
        let footprint = product.footprint().map(|f| f.bounding_box());
        ProductOutcome::Accepted(AcceptedProduct {
            time_range,
            footprint,
        })
    }

    /// Bin `sources` and stream the completed bins to `sink`
    ///
    /// # Errors
    ///
    /// Returns [`BinningError::Cancelled`] when `cancel` fires, spill errors
    /// from the collector and errors raised by `sink`.
    pub fn run(
        &self,
        sources: &[Box<dyn ProductSource>],
        sink: &mut dyn TemporalBinSink,
        cancel: &CancellationToken,
    ) -> Result<RunStatistics> {
        let started = Instant::now();
        let ctx = &self.ctx;
        let pool = self.parallel.build_pool()?;
        let filter = create_source_product_filter(ctx);
        let binner = SpatialBinner::new(Arc::clone(ctx));
        let collector = SpatialBinCollector::new(ctx.bin_manager.clone(), ctx.grid.num_bins(), &ctx.collector)?;

        info!(
            products = sources.len(),
            threads = pool.current_num_threads(),
            filters = ?filter.filter_names(),
            "starting spatial binning"
        );
        let outcomes: Vec<ProductOutcome> = pool.install(|| {
            sources
                .par_iter()
                .map(|source| Self::process_source(source.as_ref(), &filter, &binner, &collector, cancel))
                .collect()
        });

        let mut stats = RunStatistics::default();
        let mut fatal = None;
        for outcome in outcomes {
            match outcome {
                ProductOutcome::Accepted(accepted) => stats.record_accepted(accepted),
                ProductOutcome::Rejected(rejection) => stats.products_rejected.push(rejection),
                ProductOutcome::Cancelled => {}
                ProductOutcome::Fatal(e) => {
                    fatal.get_or_insert(e);
                }
            }
        }
        if let Some(e) = fatal {
            return Err(e);
        }
        collector.consuming_completed()?;
        if cancel.is_cancelled() {
            return Err(BinningError::Cancelled);
        }
        stats.observations = binner.num_observations();
        stats.spatial_bins_consumed = collector.consumed_bins();
        stats.spill_events = collector.spill_events();
        info!(
            accepted = stats.products_accepted,
            rejected = stats.products_rejected.len(),
            observations = stats.observations,
            "spatial binning done"
        );

        if collector.is_empty() {
            warn!("no bins have been generated; nothing to write");
            stats.elapsed = started.elapsed();
            return Ok(stats);
        }

        let temporal = TemporalBinner::new(Arc::clone(ctx));
        let num_bins = ctx.grid.num_bins().max(1);
        let batch_size = ctx.temporal_batch_size.max(1);
        let mut collection = collector.into_bin_collection()?;
        let mut last_decile = 0;
        sink.begin(ctx.feature_names())?;
        loop {
            if cancel.is_cancelled() {
                return Err(BinningError::Cancelled);
            }
            let batch = collection.by_ref().take(batch_size).collect::<Result<Vec<_>>>()?;
            let Some(last_index) = batch.last().map(|(index, _)| *index) else {
                break;
            };
            let completed = pool.install(|| temporal.process_batch(batch));
            for bin in &completed {
                sink.consume(bin)?;
            }
            stats.temporal_bins_emitted += completed.len() as u64;

            let decile = (last_index * 10 / num_bins).min(10);
            if decile > last_decile {
                last_decile = decile;
                info!(progress = %format!("{}%", decile * 10), "temporal binning");
            }
        }
        sink.finish()?;

        stats.elapsed = started.elapsed();
        info!(
            bins = stats.temporal_bins_emitted,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "binning run finished"
        );
        Ok(stats)
    }
}
