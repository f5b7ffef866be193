//! Grid and run description
//!
//! This module provides structured descriptions of the planetary grid and the
//! feature layout of a run, and prints them together with run summaries.

use crate::context::BinningContext;
use crate::geo::MEAN_EARTH_RADIUS_M;
use crate::grid::PlanetaryGrid;
use crate::pipeline::RunStatistics;
use serde::Serialize;

/// Structured description of a planetary grid
#[derive(Debug, Clone, Serialize)]
pub struct GridDescription {
    pub num_rows: usize,
    pub num_bins: u64,
    /// Columns of the equator-adjacent row
    pub max_cols: u32,
    /// Height of a row in kilometres
    pub row_height_km: f64,
    /// Mean bin area in square kilometres
    pub mean_bin_area_km2: f64,
}

/// Describe `grid`
#[must_use]
pub fn describe_grid(grid: &PlanetaryGrid) -> GridDescription {
    let radius_km = MEAN_EARTH_RADIUS_M / 1000.0;
    let sphere_km2 = 4.0 * std::f64::consts::PI * radius_km * radius_km;
    GridDescription {
        num_rows: grid.num_rows(),
        num_bins: grid.num_bins(),
        max_cols: grid.num_cols(grid.num_rows() / 2),
        row_height_km: std::f64::consts::PI * radius_km / grid.num_rows() as f64,
        mean_bin_area_km2: sphere_km2 / grid.num_bins() as f64,
    }
}

/// Prints the grid layout.
pub fn print_grid_description(grid: &PlanetaryGrid) {
    let d = describe_grid(grid);
    println!("\n===== Planetary Grid =====");
    println!("- Rows: {}", d.num_rows);
    println!("- Bins: {}", d.num_bins);
    println!("- Columns at equator: {}", d.max_cols);
    println!("- Row height: {:.3} km", d.row_height_km);
    println!("- Mean bin area: {:.3} km²", d.mean_bin_area_km2);
}

/// Prints variables, aggregators and feature names of a run.
pub fn print_feature_layout(ctx: &BinningContext) {
    println!("\n===== Variables =====");
    for (i, name) in ctx.variable_context.names().iter().enumerate() {
        println!("- [{i}] {name}");
    }

    println!("\n===== Aggregators =====");
    for aggregator in ctx.bin_manager.aggregators() {
        println!(
            "- {} -> {}",
            aggregator.name(),
            aggregator.output_feature_names().join(", ")
        );
    }

    println!("\n===== Features =====");
    println!("   State ({}): {}", ctx.bin_manager.state_len(), ctx.bin_manager.state_feature_names().join(", "));
    println!("   Output: {}", ctx.feature_names().join(", "));
    if let Some(mask) = &ctx.mask {
        println!("   Mask: {}", mask.source());
    }
    if let Some(region) = &ctx.region {
        println!("   Region: {region}");
    }
    if let Some(period) = &ctx.data_period {
        println!(
            "   Period: {} .. {} ({:?})",
            period.start(),
            period.end(),
            ctx.time_filter_method
        );
    }
}

/// Prints a run summary.
pub fn print_run_summary(stats: &RunStatistics) {
    println!("\n===== Binning Summary =====");
    println!("   Products accepted: {}", stats.products_accepted);
    println!("   Products rejected: {}", stats.products_rejected.len());
    for rejection in &stats.products_rejected {
        println!("     - {}: {}", rejection.product, rejection.reason);
    }
    println!("   Observations: {}", stats.observations);
    println!("   Spatial bins consumed: {}", stats.spatial_bins_consumed);
    println!("   Temporal bins written: {}", stats.temporal_bins_emitted);
    if stats.spill_events > 0 {
        println!("   Spill events: {}", stats.spill_events);
    }
    if let Some((start, end)) = stats.time_coverage {
        println!("   Time coverage: {start} .. {end}");
    }
    if let Some(bbox) = stats.coverage {
        println!(
            "   Coverage: lon {:.3}..{:.3}, lat {:.3}..{:.3}",
            bbox.min_lon, bbox.max_lon, bbox.min_lat, bbox.max_lat
        );
    }
    println!("   Elapsed: {:.2?}", stats.elapsed);
}
