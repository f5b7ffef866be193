//! Bins synthetic swaths around the date line with spatiotemporal data-day
//! filtering and a deliberately tiny memory budget, so the disk-backed
//! collector has to spill.

use chrono::{Duration, TimeZone, Utc};
use ndarray::Array2;
use ru_l3bin::prelude::*;
use ru_l3bin::print_run_summary;
use std::sync::Arc;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let mut config = BinningConfig::new(
        1080,
        vec![
            AggregatorConfig::average_with_counts("sst"),
            AggregatorConfig::OnMaxSet {
                on_max_var_name: "sst".to_string(),
                target_name: None,
                set_var_names: vec!["wind".to_string()],
            },
        ],
    );
    config.start_date_time = Some("2024-06-10".to_string());
    config.period_duration = Some(1.0);
    config.time_filter_method = TimeFilterMethod::SpatiotemporalDataDay;
    config.min_data_hour = Some(0.0);
    config.super_sampling = 2;
    config.collector = CollectorConfig::disk_backed(2_000);
    let ctx = Arc::new(config.create_binning_context()?);

    // Swaths straddling the date line, acquired through the day
    let day = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).single().ok_or("bad date")?;
    let sources: Vec<Box<dyn ProductSource>> = (0..12)
        .map(|k| -> Result<Box<dyn ProductSource>> {
            let start = day + Duration::hours(2 * k);
            let min_lon = 170.0 - 20.0 * k as f64;
            let (w, h) = (120, 80);
            let sst = Array2::from_shape_fn((h, w), |(y, x)| 10.0 + 0.05 * x as f64 + 0.1 * y as f64);
            let wind = Array2::from_shape_fn((h, w), |(y, x)| ((x + y) % 13) as f64);
            let lon = Array2::from_shape_fn((h, w), |(_, x)| {
                let lon = min_lon + 0.1 * x as f64;
                if lon > 180.0 {
                    lon - 360.0
                } else {
                    lon
                }
            });
            let lat = Array2::from_shape_fn((h, w), |(y, _)| 20.0 - 0.1 * y as f64);
            let product = RasterProduct::new(format!("swath-{k:02}"), lat, lon)?
                .with_variable("sst", sst)
                .with_variable("wind", wind)
                .with_time_range(start, start + Duration::minutes(8));
            Ok(Box::new(MemoryProductSource::new(Arc::new(product))) as Box<dyn ProductSource>)
        })
        .collect::<Result<_>>()?;

    let mut sink = VecSink::new();
    let binner = Binner::new(Arc::clone(&ctx), ParallelConfig::default());
    let stats = binner.run(&sources, &mut sink, &CancellationToken::new())?;

    println!("Features: {}", sink.feature_names.join(", "));
    for bin in sink.bins.iter().step_by((sink.bins.len() / 5).max(1)).take(5) {
        let (lat, lon) = ctx.grid.center_of(bin.index);
        println!(
            "  bin {:>8} ({lat:7.3}, {lon:8.3}) passes={} sst_mean={:.3}",
            bin.index,
            bin.num_passes,
            sink.feature(bin, "sst_mean").unwrap_or(f64::NAN)
        );
    }
    print_run_summary(&stats);
    Ok(())
}
