//! End-to-end binning runs

use chrono::{DateTime, Duration, TimeZone, Utc};
use ndarray::Array2;
use ru_l3bin::geo::GeoPos;
use ru_l3bin::prelude::*;
use ru_l3bin::product::{GeoCodingSpec, RasterProductFile};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::tempdir;

fn utc(d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, h, min, 0).single().expect("valid date")
}

/// Single-pixel product centred on `(lat, lon)`
fn point_product(name: &str, lat: f64, lon: f64, value: f64) -> RasterProduct {
    RasterProduct::regular(name, lon - 0.5, lat + 0.5, 1.0, 1, 1).with_variable("v", Array2::from_elem((1, 1), value))
}

fn source(product: RasterProduct) -> Box<dyn ProductSource> {
    Box::new(MemoryProductSource::new(Arc::new(product)))
}

fn context(config: &BinningConfig) -> Arc<BinningContext> {
    Arc::new(config.create_binning_context().expect("binning context"))
}

fn run(ctx: &Arc<BinningContext>, sources: &[Box<dyn ProductSource>]) -> (RunStatistics, VecSink) {
    let mut sink = VecSink::new();
    let stats = Binner::new(Arc::clone(ctx), ParallelConfig::with_threads(2))
        .run(sources, &mut sink, &CancellationToken::new())
        .expect("binning run");
    (stats, sink)
}

#[test]
fn test_single_observation_on_four_row_grid() {
    let ctx = context(&BinningConfig::new(4, vec![AggregatorConfig::average_with_counts("v")]));
    let (stats, sink) = run(&ctx, &[source(point_product("p", 45.0, 0.0, 10.0))]);

    assert_eq!(stats.products_accepted, 1);
    assert_eq!(stats.observations, 1);
    assert_eq!(stats.temporal_bins_emitted, 1);
    assert_eq!(sink.feature_names, ["v_mean", "v_sigma", "v_counts"].map(String::from));
    assert_eq!(sink.bins.len(), 1);

    let bin = &sink.bins[0];
    assert_eq!(bin.index, 6);
    assert_eq!(bin.num_obs, 1);
    assert_eq!(bin.num_passes, 1);
    assert_eq!(sink.feature(bin, "v_mean"), Some(10.0));
    assert_eq!(sink.feature(bin, "v_counts"), Some(1.0));
}

#[test]
fn test_two_products_merge_independent_of_order() {
    let ctx = context(&BinningConfig::new(4, vec![AggregatorConfig::average_with_counts("v")]));
    let forward = [
        source(point_product("a", 45.0, 0.0, 4.0)),
        source(point_product("b", 45.0, 0.0, 6.0)),
    ];
    let backward = [
        source(point_product("b", 45.0, 0.0, 6.0)),
        source(point_product("a", 45.0, 0.0, 4.0)),
    ];
    let (stats, first) = run(&ctx, &forward);
    let (_, second) = run(&ctx, &backward);

    assert_eq!(stats.products_accepted, 2);
    assert_eq!(first.bins.len(), 1);
    let bin = &first.bins[0];
    assert_eq!(bin.num_obs, 2);
    assert_eq!(bin.num_passes, 2);
    assert_eq!(first.feature(bin, "v_mean"), Some(5.0));
    assert_eq!(first.feature(bin, "v_counts"), Some(2.0));
    assert_eq!(first.bins, second.bins);
}

#[test]
fn test_bins_are_emitted_in_ascending_order() {
    let config = BinningConfig {
        temporal_batch_size: 7,
        ..BinningConfig::new(180, vec![AggregatorConfig::average("v")])
    };
    let ctx = context(&config);
    let swath = RasterProduct::regular("swath", -40.0, 60.0, 1.5, 40, 50)
        .with_variable("v", Array2::from_shape_fn((50, 40), |(y, x)| (x + y) as f64));
    let (stats, sink) = run(&ctx, &[source(swath)]);

    assert_eq!(stats.observations, 2000);
    assert!(sink.bins.len() > 100);
    assert!(sink.bins.windows(2).all(|w| w[0].index < w[1].index));
    let total: u32 = sink.bins.iter().map(|b| b.num_obs).sum();
    assert_eq!(u64::from(total), stats.observations);
    assert_eq!(stats.temporal_bins_emitted, sink.bins.len() as u64);
}

#[test]
fn test_disk_backed_run_matches_in_memory() {
    let dir = tempdir().expect("temp dir");
    let aggregators = vec![AggregatorConfig::average_with_counts("v"), AggregatorConfig::min_max("v")];
    let sources: Vec<Box<dyn ProductSource>> = (0..6)
        .map(|k| {
            let product = RasterProduct::regular(format!("swath-{k}"), -30.0 + 4.0 * k as f64, 30.0, 0.5, 30, 30)
                .with_variable("v", Array2::from_shape_fn((30, 30), |(y, x)| (x * y + k) as f64));
            source(product)
        })
        .collect();

    let (_, in_memory) = run(&context(&BinningConfig::new(360, aggregators.clone())), &sources);

    let mut config = BinningConfig::new(360, aggregators);
    config.collector = CollectorConfig::disk_backed(64);
    config.collector.num_shards = 8;
    config.collector.spill_dir = Some(dir.path().to_path_buf());
    let (stats, spilled) = run(&context(&config), &sources);

    assert!(stats.spill_events > 0);
    assert_eq!(spilled.bins.len(), in_memory.bins.len());
    for (a, b) in spilled.bins.iter().zip(&in_memory.bins) {
        assert_eq!((a.index, a.num_obs, a.num_passes), (b.index, b.num_obs, b.num_passes));
        for (x, y) in a.features.iter().zip(&b.features) {
            assert!((x - y).abs() < 1e-9);
        }
    }
}

/// One pixel at the origin whose upper left sub-pixel geolocates ~5 km north
struct DistortedPixel;

impl Product for DistortedPixel {
    fn name(&self) -> &str {
        "distorted"
    }

    fn width(&self) -> usize {
        1
    }

    fn height(&self) -> usize {
        1
    }

    fn geo_pos(&self, x: f64, y: f64) -> Option<GeoPos> {
        if x < 0.5 && y < 0.5 {
            // 0.045° of latitude is about 5000 m
            Some(GeoPos::new(0.045, 0.0))
        } else {
            Some(GeoPos::new((0.5 - y) * 1e-4, (x - 0.5) * 1e-4))
        }
    }

    fn variable_names(&self) -> Vec<String> {
        vec!["v".to_string()]
    }

    fn sample(&self, _var: usize, _x: usize, _y: usize) -> f64 {
        2.0
    }

    fn start_time(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn end_time(&self) -> Option<DateTime<Utc>> {
        None
    }
}

#[test]
fn test_max_distance_on_earth_drops_distorted_sub_pixels() {
    let mut config = BinningConfig::new(2160, vec![AggregatorConfig::sum("v")]);
    config.super_sampling = 2;
    let sources: Vec<Box<dyn ProductSource>> = vec![Box::new(MemoryProductSource::new(Arc::new(DistortedPixel)))];

    let (unchecked, _) = run(&context(&config), &sources);
    assert_eq!(unchecked.observations, 4);

    config.max_distance_on_earth = 1000.0;
    let (checked, sink) = run(&context(&config), &sources);
    assert_eq!(checked.observations, 3);
    // each sub-pixel carries a quarter of the pixel's weight
    let total: f64 = sink.bins.iter().filter_map(|b| sink.feature(b, "v_sum")).sum();
    assert!((total - 1.5).abs() < 1e-12);
}

#[test]
fn test_supersampling_weights_sum_to_one_pixel() {
    let ctx = context(&BinningConfig {
        super_sampling: 3,
        ..BinningConfig::new(4, vec![AggregatorConfig::average_with_counts("v"), AggregatorConfig::sum("v")])
    });
    // away from row boundaries so all sub-pixels share one bin
    let (stats, sink) = run(&ctx, &[source(point_product("p", 30.0, 0.0, 8.0))]);
    assert_eq!(stats.observations, 9);
    assert_eq!(sink.bins.len(), 1);
    let bin = &sink.bins[0];
    assert_eq!(sink.feature(bin, "v_counts"), Some(9.0));
    assert_eq!(sink.feature(bin, "v_mean"), Some(8.0));
    assert!((sink.feature(bin, "v_sum").expect("sum") - 8.0).abs() < 1e-12);
}

#[test]
fn test_mask_and_invalid_pixels_are_skipped() {
    let mut config = BinningConfig::new(4, vec![AggregatorConfig::average_with_counts("v")]);
    config.mask_expr = Some("qa == 0".to_string());
    let ctx = context(&config);

    let v = Array2::from_shape_vec((1, 4), vec![1.0, 2.0, f64::NAN, 4.0]).expect("shape");
    let qa = Array2::from_shape_vec((1, 4), vec![0.0, 1.0, 0.0, 0.0]).expect("shape");
    let product = RasterProduct::regular("masked", 0.0, 46.0, 0.5, 4, 1)
        .with_variable("v", v)
        .with_variable("qa", qa);
    let (stats, sink) = run(&ctx, &[source(product)]);

    // pixel 1 fails the mask; pixel 2 still counts as an observation but adds no value
    assert_eq!(stats.observations, 3);
    let bin = &sink.bins[0];
    assert_eq!(sink.feature(bin, "v_counts"), Some(2.0));
    assert!((sink.feature(bin, "v_mean").expect("mean") - 2.5).abs() < 1e-12);
}

#[test]
fn test_region_limits_observations_and_rejects_products() {
    let mut config = BinningConfig::new(180, vec![AggregatorConfig::average("v")]);
    config.region = Some("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))".to_string());
    let ctx = context(&config);

    let overlapping = RasterProduct::regular("overlapping", 5.0, 15.0, 1.0, 10, 10)
        .with_variable("v", Array2::from_elem((10, 10), 1.0));
    let outside = RasterProduct::regular("outside", 100.0, 15.0, 1.0, 10, 10)
        .with_variable("v", Array2::from_elem((10, 10), 1.0));
    let (stats, sink) = run(&ctx, &[source(overlapping), source(outside)]);

    assert_eq!(stats.products_accepted, 1);
    assert_eq!(stats.products_rejected.len(), 1);
    assert_eq!(stats.products_rejected[0].product, "outside");
    assert!(stats.products_rejected[0].reason.contains("RegionFilter"));
    // only the 5 x 5 pixel quarter inside the region
    assert_eq!(stats.observations, 25);
    for bin in &sink.bins {
        let (lat, lon) = ctx.grid.center_of(bin.index);
        assert!((-1.0..=11.0).contains(&lat) && (-1.0..=11.0).contains(&lon));
    }
}

#[test]
fn test_time_range_filtering() {
    let mut config = BinningConfig::new(4, vec![AggregatorConfig::average_with_counts("v")]);
    config.start_date_time = Some("2024-03-01".to_string());
    config.period_duration = Some(1.0);
    config.time_filter_method = TimeFilterMethod::TimeRange;
    let ctx = context(&config);

    // a product straddling the period end: scan lines are timed 23:58, 23:59, 00:00, 00:01
    let straddling = RasterProduct::regular("straddling", 0.0, 46.0, 0.5, 1, 4)
        .with_variable("v", Array2::from_elem((4, 1), 1.0))
        .with_time_range(utc(1, 23, 58), utc(2, 0, 1));
    let next_day = point_product("next_day", 45.0, 0.0, 1.0).with_time_range(utc(2, 10, 0), utc(2, 10, 5));
    let untimed = point_product("untimed", 45.0, 0.0, 1.0);
    let (stats, sink) = run(&ctx, &[source(straddling), source(next_day), source(untimed)]);

    assert_eq!(stats.products_accepted, 1);
    let rejected: Vec<&str> = stats.products_rejected.iter().map(|r| r.product.as_str()).collect();
    assert_eq!(rejected, vec!["next_day", "untimed"]);
    assert_eq!(stats.observations, 2);
    assert_eq!(sink.bins.iter().map(|b| b.num_obs).sum::<u32>(), 2);
    assert_eq!(stats.time_coverage, Some((utc(1, 23, 58), utc(2, 0, 1))));
}

#[test]
fn test_data_day_run_across_date_line() {
    let mut config = BinningConfig::new(18, vec![AggregatorConfig::average_with_counts("v")]);
    config.start_date_time = Some("2024-03-01".to_string());
    config.period_duration = Some(1.0);
    config.time_filter_method = TimeFilterMethod::SpatiotemporalDataDay;
    config.min_data_hour = Some(0.0);
    let ctx = context(&config);

    let east = point_product("east", 10.0, 179.0, 1.0).with_time_range(utc(1, 12, 0), utc(1, 12, 0));
    let west = point_product("west", 10.0, -179.0, 3.0).with_time_range(utc(1, 12, 5), utc(1, 12, 5));
    // before the data day starts at this longitude
    let early = point_product("early", 10.0, 179.0, 100.0).with_time_range(utc(1, 0, 1), utc(1, 0, 1));
    let (stats, sink) = run(&ctx, &[source(east), source(west), source(early)]);

    assert_eq!(stats.products_accepted, 3);
    assert_eq!(stats.observations, 2);
    let values: Vec<f64> = sink.bins.iter().filter_map(|b| sink.feature(b, "v_mean")).collect();
    assert_eq!(values.len(), 2);
    assert!(values.contains(&1.0) && values.contains(&3.0));
}

#[test]
fn test_missing_variable_rejects_product() {
    let ctx = context(&BinningConfig::new(4, vec![AggregatorConfig::average("v")]));
    let wrong = RasterProduct::regular("wrong", 0.0, 46.0, 1.0, 1, 1).with_variable("sst", Array2::from_elem((1, 1), 1.0));
    let (stats, sink) = run(&ctx, &[source(wrong), source(point_product("ok", 45.0, 0.0, 1.0))]);
    assert_eq!(stats.products_accepted, 1);
    assert!(stats.products_rejected[0].reason.contains("missing variable 'v'"));
    assert_eq!(sink.bins.len(), 1);
}

#[test]
fn test_json_products_and_unreadable_files() {
    let dir = tempdir().expect("temp dir");
    let mut variables = BTreeMap::new();
    variables.insert("v".to_string(), vec![Some(4.0), None, Some(8.0), Some(6.0)]);
    let file = RasterProductFile {
        name: "from_json".to_string(),
        width: 2,
        height: 2,
        start_time: None,
        end_time: None,
        geocoding: GeoCodingSpec::Regular {
            min_lon: 0.0,
            max_lat: 46.0,
            pixel_size: 0.5,
        },
        variables,
    };
    let good = dir.path().join("good.json");
    file.write_to(&good).expect("write product");
    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{ not json").expect("write broken");
    let missing = dir.path().join("missing.json");

    let ctx = context(&BinningConfig::new(4, vec![AggregatorConfig::average_with_counts("v")]));
    let sources: Vec<Box<dyn ProductSource>> = vec![
        Box::new(JsonProductSource::new(&good)),
        Box::new(JsonProductSource::new(&broken)),
        Box::new(JsonProductSource::new(&missing)),
    ];
    let (stats, sink) = run(&ctx, &sources);

    assert_eq!(stats.products_accepted, 1);
    assert_eq!(stats.products_rejected.len(), 2);
    assert!(stats
        .products_rejected
        .iter()
        .all(|r| r.reason.contains("failed to read product")));
    let bin = &sink.bins[0];
    assert_eq!(sink.feature(bin, "v_counts"), Some(3.0));
    assert_eq!(sink.feature(bin, "v_mean"), Some(6.0));
}

#[test]
fn test_empty_result_does_not_touch_sink() {
    struct FailingSink;

    impl TemporalBinSink for FailingSink {
        fn begin(&mut self, _feature_names: &[String]) -> Result<()> {
            Err(BinningError::Sink("should not be opened".to_string()))
        }

        fn consume(&mut self, _bin: &TemporalBin) -> Result<()> {
            Err(BinningError::Sink("should not be called".to_string()))
        }
    }

    let ctx = context(&BinningConfig::new(4, vec![AggregatorConfig::average("v")]));
    let no_data = point_product("no_data", 45.0, 0.0, f64::NAN);
    let stats = Binner::new(ctx, ParallelConfig::with_threads(1))
        .run(&[source(no_data)], &mut FailingSink, &CancellationToken::new())
        .expect("empty run succeeds");
    assert_eq!(stats.products_accepted, 1);
    assert_eq!(stats.temporal_bins_emitted, 0);
}

#[test]
fn test_cancelled_run_is_void() {
    let ctx = context(&BinningConfig::new(4, vec![AggregatorConfig::average("v")]));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut sink = VecSink::new();
    let result = Binner::new(ctx, ParallelConfig::with_threads(2)).run(
        &[source(point_product("p", 45.0, 0.0, 1.0))],
        &mut sink,
        &cancel,
    );
    assert!(matches!(result, Err(BinningError::Cancelled)));
    assert!(sink.bins.is_empty());
}

#[test]
fn test_sink_errors_abort_the_run() {
    struct ClosedSink;

    impl TemporalBinSink for ClosedSink {
        fn consume(&mut self, _bin: &TemporalBin) -> Result<()> {
            Err(BinningError::Sink("disk full".to_string()))
        }
    }

    let ctx = context(&BinningConfig::new(4, vec![AggregatorConfig::average("v")]));
    let result = Binner::new(ctx, ParallelConfig::with_threads(1)).run(
        &[source(point_product("p", 45.0, 0.0, 1.0))],
        &mut ClosedSink,
        &CancellationToken::new(),
    );
    assert!(matches!(result, Err(BinningError::Sink(_))));
}

#[test]
fn test_post_processor_expression() {
    let mut config = BinningConfig::new(
        4,
        vec![AggregatorConfig::min_max("v")],
    );
    config.post_processor = Some(CellProcessorConfig::Chain {
        processors: vec![
            CellProcessorConfig::Expression {
                target: "range".to_string(),
                expression: "v_max - v_min".to_string(),
                keep_inputs: true,
            },
            CellProcessorConfig::Selection {
                features: vec!["spread=range".to_string(), "v_max".to_string()],
            },
        ],
    });
    let ctx = context(&config);
    let (_, sink) = run(
        &ctx,
        &[
            source(point_product("a", 45.0, 0.0, 2.0)),
            source(point_product("b", 45.0, 0.0, 9.5)),
        ],
    );
    assert_eq!(sink.feature_names, ["spread", "v_max"].map(String::from));
    assert_eq!(sink.bins[0].features, vec![7.5, 9.5]);
}

#[test]
fn test_json_lines_writer() {
    let ctx = context(&BinningConfig::new(4, vec![AggregatorConfig::average("v")]));
    let sources = [
        source(point_product("north", 45.0, 0.0, 1.0)),
        source(point_product("south", -45.0, 0.0, f64::NAN)),
        source(point_product("south_valid", -45.0, 100.0, 3.0)),
    ];
    let mut writer = JsonLinesBinWriter::new(Vec::new(), ctx.grid.clone());
    let stats = Binner::new(Arc::clone(&ctx), ParallelConfig::with_threads(2))
        .run(&sources, &mut writer, &CancellationToken::new())
        .expect("run");
    let text = String::from_utf8(writer.into_inner()).expect("utf8");
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();

    assert_eq!(lines.len() as u64, stats.temporal_bins_emitted);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["index"], 6);
    assert_eq!(lines[0]["num_obs"], 1);
    assert_eq!(lines[0]["features"]["v_mean"], 1.0);
    assert!(lines[0]["lat"].as_f64().expect("lat") > 0.0);
    // a single observation has zero spread
    assert_eq!(lines[1]["features"]["v_sigma"], 0.0);
}

#[test]
fn test_run_statistics_coverage() {
    let ctx = context(&BinningConfig::new(36, vec![AggregatorConfig::average("v")]));
    let a = RasterProduct::regular("a", 0.0, 10.0, 1.0, 5, 5)
        .with_variable("v", Array2::from_elem((5, 5), 1.0))
        .with_time_range(utc(1, 10, 0), utc(1, 10, 5));
    let b = RasterProduct::regular("b", 20.0, 30.0, 1.0, 5, 5)
        .with_variable("v", Array2::from_elem((5, 5), 1.0))
        .with_time_range(utc(3, 8, 0), utc(3, 8, 5));
    let (stats, _) = run(&ctx, &[source(a), source(b)]);

    let coverage = stats.coverage.expect("coverage");
    assert!((coverage.min_lon - 0.0).abs() < 1e-9 && (coverage.max_lon - 25.0).abs() < 1e-9);
    assert!((coverage.min_lat - 5.0).abs() < 1e-9 && (coverage.max_lat - 30.0).abs() < 1e-9);
    assert_eq!(stats.time_coverage, Some((utc(1, 10, 0), utc(3, 8, 5))));
    assert_eq!(stats.spatial_bins_consumed, stats.temporal_bins_emitted);
    assert!(stats.products_rejected.is_empty());

    let summary = serde_json::to_value(&stats).expect("serialize statistics");
    assert_eq!(summary["products_accepted"], 2);
}

#[test]
fn test_pixel_times_follow_scan_lines() {
    let start = utc(1, 12, 0);
    let product = point_product("p", 45.0, 0.0, 1.0).with_time_range(start, start + Duration::minutes(1));
    assert_eq!(product.pixel_time(0, 0), Some(start));
}

#[test]
fn test_empty_product_is_skipped() {
    let dir = tempdir().expect("temp dir");
    let empty = RasterProductFile {
        name: "empty".to_string(),
        width: 0,
        height: 0,
        start_time: None,
        end_time: None,
        geocoding: GeoCodingSpec::Regular {
            min_lon: 0.0,
            max_lat: 46.0,
            pixel_size: 0.5,
        },
        variables: BTreeMap::new(),
    };
    let empty_path = dir.path().join("empty.json");
    empty.write_to(&empty_path).expect("write product");

    let mut config = BinningConfig::new(4, vec![AggregatorConfig::average_with_counts("v")]);
    config.region = Some("POLYGON((-10 30, 10 30, 10 60, -10 60, -10 30))".to_string());
    let ctx = context(&config);
    let sources: Vec<Box<dyn ProductSource>> = vec![
        Box::new(JsonProductSource::new(&empty_path)),
        source(RasterProduct::regular("in_memory_empty", 0.0, 46.0, 0.5, 0, 3)),
        source(point_product("good", 45.0, 0.0, 2.0)),
    ];
    let (stats, sink) = run(&ctx, &sources);

    assert_eq!(stats.products_accepted, 1);
    assert_eq!(stats.products_rejected.len(), 2);
    assert!(stats.products_rejected[0].reason.contains("empty raster"));
    assert!(stats.products_rejected[1].reason.contains("GeoCodingFilter"));
    assert_eq!(sink.bins.len(), 1);
}

/// Two pixels at latitude 10 on either side of the date line
fn date_line_pair() -> RasterProduct {
    let lat = Array2::from_elem((1, 2), 10.0);
    let lon = Array2::from_shape_vec((1, 2), vec![179.75, -179.75]).expect("shape");
    RasterProduct::new("date_line", lat, lon)
        .expect("product")
        .with_variable("v", Array2::from_elem((1, 2), 1.0))
}

#[test]
fn test_geolocation_across_date_line() {
    let product = date_line_pair();
    let between = product.geo_pos(1.0, 0.5).expect("position");
    assert!((between.lon.abs() - 180.0).abs() < 1e-9, "{between:?}");
    let east = product.geo_pos(1.25, 0.5).expect("position");
    assert!((east.lon + 179.875).abs() < 1e-9, "{east:?}");
    let west = product.geo_pos(0.75, 0.5).expect("position");
    assert!((west.lon - 179.875).abs() < 1e-9, "{west:?}");
    // no single outline for a scene across the date line
    assert!(product.footprint().is_none());
}

#[test]
fn test_supersampled_bins_stay_at_date_line() {
    let ctx = context(&BinningConfig {
        super_sampling: 2,
        ..BinningConfig::new(2160, vec![AggregatorConfig::average_with_counts("v")])
    });
    let (stats, sink) = run(&ctx, &[source(date_line_pair())]);
    assert_eq!(stats.observations, 8);
    assert!(!sink.bins.is_empty());
    for bin in &sink.bins {
        let (lat, lon) = ctx.grid.center_of(bin.index);
        assert!((lat - 10.0).abs() < 0.5, "bin {} at lat {lat}", bin.index);
        assert!(lon.abs() > 179.0, "bin {} at lon {lon}", bin.index);
    }
    let counts: f64 = sink.bins.iter().filter_map(|b| sink.feature(b, "v_counts")).sum();
    assert_eq!(counts, 8.0);
}
