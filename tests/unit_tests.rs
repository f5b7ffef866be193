//! Unit tests for configuration, errors and parallel setup
//!
//! These tests cover the pre-run surface: everything that must fail before a
//! single product is touched, plus the helpers shared by the binaries.

use ru_l3bin::{
    aggregators::AggregatorConfig,
    cell_processor::CellProcessorConfig,
    config::{BinningConfig, CollectorConfig, CollectorStrategy},
    errors::{BinningError, Result},
    grid::PlanetaryGrid,
    metadata::describe_grid,
    parallel::{get_parallel_info, ParallelConfig},
    period::TimeFilterMethod,
};

fn base_config() -> BinningConfig {
    BinningConfig::new(4, vec![AggregatorConfig::average("chl")])
}

fn config_error_message(result: Result<impl std::fmt::Debug>) -> String {
    match result {
        Err(BinningError::Config(msg)) => msg,
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[test]
fn test_error_types() {
    let config_err = BinningError::config("no aggregators");
    assert_eq!(format!("{config_err}"), "configuration error: no aggregators");

    let read_err = BinningError::product_read("a.json", "file not found");
    assert!(format!("{read_err}").contains("failed to read product 'a.json'"));
    assert!(read_err.is_product_level());

    let incompatible = BinningError::product_incompatible("b.json", "missing variable 'chl'");
    assert!(format!("{incompatible}").contains("missing variable 'chl'"));
    assert!(incompatible.is_product_level());

    let spill = BinningError::spill(
        "writing shard-00001.bin",
        std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
    );
    assert!(format!("{spill}").contains("disk full"));
    assert!(!spill.is_product_level());

    assert!(!BinningError::Cancelled.is_product_level());
    assert!(!BinningError::CollectorClosed.is_product_level());
    assert!(!BinningError::Sink("closed".to_string()).is_product_level());
}

#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
    let err: BinningError = io_err.into();
    assert!(matches!(err, BinningError::Io(_)));
    assert!(format!("{err}").contains("I/O error"));
}

#[test]
fn test_parallel_config() {
    let default_config = ParallelConfig::default();
    assert!(default_config.num_threads.is_none());
    assert!(default_config.effective_threads() > 0);

    let config_4 = ParallelConfig::with_threads(4);
    assert_eq!(config_4.num_threads, Some(4));
    assert_eq!(config_4.effective_threads(), 4);

    let all_cores_config = ParallelConfig::all_cores();
    assert_eq!(all_cores_config.num_threads, Some(num_cpus::get()));

    // zero is clamped to a single worker
    assert_eq!(ParallelConfig::with_threads(0).effective_threads(), 1);
}

#[test]
fn test_build_pool() {
    let pool = ParallelConfig::with_threads(2).build_pool().expect("pool");
    assert_eq!(pool.current_num_threads(), 2);
    let sum: u64 = pool.install(|| {
        use rayon::prelude::*;
        (1..=100_u64).into_par_iter().sum()
    });
    assert_eq!(sum, 5050);
}

#[test]
fn test_parallel_info() {
    let info = get_parallel_info();
    assert!(info.current_threads > 0);
    assert!(info.available_cores > 0);
    assert!(info.available_parallelism > 0);

    // Test info printing (doesn't panic)
    info.print_info();
}

#[test]
fn test_valid_config_builds_context() {
    let ctx = base_config().create_binning_context().expect("valid config");
    assert_eq!(ctx.grid.num_bins(), 20);
    assert_eq!(ctx.variable_context.names(), ["chl".to_string()]);
    assert_eq!(ctx.feature_names(), ["chl_mean".to_string(), "chl_sigma".to_string()]);
    assert!(ctx.data_period.is_none());
    assert!(ctx.observation_period().is_none());
    assert!(ctx.max_distance_on_earth.is_none());
}

#[test]
fn test_odd_or_zero_rows_rejected() {
    let mut config = base_config();
    config.num_rows = 5;
    let msg = config_error_message(config.create_binning_context());
    assert!(msg.contains("num_rows"), "{msg}");

    config.num_rows = 0;
    assert!(matches!(config.validate(), Err(BinningError::Config(_))));
}

#[test]
fn test_missing_aggregators_rejected() {
    let config = BinningConfig::new(4, Vec::new());
    let msg = config_error_message(config.create_binning_context());
    assert!(msg.contains("aggregators"), "{msg}");
}

#[test]
fn test_data_day_requires_min_data_hour() {
    let mut config = base_config();
    config.start_date_time = Some("2024-03-01".to_string());
    config.period_duration = Some(1.0);
    config.time_filter_method = TimeFilterMethod::SpatiotemporalDataDay;
    let msg = config_error_message(config.create_binning_context());
    assert!(msg.contains("min_data_hour"), "{msg}");

    config.min_data_hour = Some(25.0);
    assert!(matches!(config.validate(), Err(BinningError::Config(_))));

    config.min_data_hour = Some(6.0);
    assert!(config.validate().is_ok());
}

#[test]
fn test_time_filter_requires_period() {
    let mut config = base_config();
    config.time_filter_method = TimeFilterMethod::TimeRange;
    let msg = config_error_message(config.create_binning_context());
    assert!(msg.contains("start_date_time"), "{msg}");
}

#[test]
fn test_negative_period_duration_rejected() {
    let mut config = base_config();
    config.start_date_time = Some("2024-03-01".to_string());
    config.period_duration = Some(-1.0);
    config.time_filter_method = TimeFilterMethod::TimeRange;
    let msg = config_error_message(config.create_binning_context());
    assert!(msg.contains("period_duration"), "{msg}");
}

#[test]
fn test_bad_start_date_rejected() {
    let mut config = base_config();
    config.start_date_time = Some("01/03/2024".to_string());
    config.period_duration = Some(1.0);
    config.time_filter_method = TimeFilterMethod::TimeRange;
    let msg = config_error_message(config.create_binning_context());
    assert!(msg.contains("start date"), "{msg}");
}

#[test]
fn test_bad_mask_and_region_rejected() {
    let mut config = base_config();
    config.mask_expr = Some("chl > ".to_string());
    assert!(matches!(
        config.create_binning_context(),
        Err(BinningError::Expression { .. })
    ));

    let mut config = base_config();
    config.region = Some("LINESTRING(0 0, 1 1)".to_string());
    assert!(matches!(config.create_binning_context(), Err(BinningError::Region(_))));
}

#[test]
fn test_invalid_percentile_rejected() {
    let config = BinningConfig::new(
        4,
        vec![AggregatorConfig::Percentile {
            var_name: "chl".to_string(),
            target_name: None,
            percentage: 150,
            min_value: 0.0,
            max_value: 1.0,
            num_buckets: 10,
        }],
    );
    let msg = config_error_message(config.create_binning_context());
    assert!(msg.contains("percentage"), "{msg}");
}

#[test]
fn test_post_processor_unknown_feature_rejected() {
    let mut config = base_config();
    config.post_processor = Some(CellProcessorConfig::Selection {
        features: vec!["chl_mean".to_string(), "chl_median".to_string()],
    });
    let msg = config_error_message(config.create_binning_context());
    assert!(msg.contains("chl_median"), "{msg}");
}

#[test]
fn test_collector_config_validation() {
    let mut collector = CollectorConfig::disk_backed(0);
    assert!(matches!(collector.validate(), Err(BinningError::Config(_))));
    collector.max_bins_in_memory = 10;
    assert!(collector.validate().is_ok());
    collector.num_shards = 0;
    assert!(matches!(collector.validate(), Err(BinningError::Config(_))));

    let default = CollectorConfig::default();
    assert_eq!(default.strategy, CollectorStrategy::InMemory);
    assert!(default.validate().is_ok());
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "num_rows": 2160,
        "variables": ["wind"],
        "aggregators": [
            { "type": "AVG", "var_name": "chl", "output_counts": true },
            { "type": "MIN_MAX", "var_name": "sst", "target_name": "temp" },
            { "type": "ON_MAX_SET", "on_max_var_name": "sst", "set_var_names": ["wind"] },
            { "type": "PERCENTILE", "var_name": "chl", "min_value": 0.0, "max_value": 10.0 }
        ],
        "post_processor": {
            "type": "Chain",
            "processors": [
                { "type": "Expression", "target": "chl_cv", "expression": "chl_sigma / chl_mean" },
                { "type": "Selection", "features": ["mean=chl_mean", "chl_cv", "chl_p90"] }
            ]
        },
        "mask_expr": "chl > 0 && qa == 0",
        "start_date_time": "2024-03-01 06:00:00",
        "period_duration": 2.0,
        "time_filter_method": "SPATIOTEMPORAL_DATA_DAY",
        "min_data_hour": 0.0,
        "super_sampling": 3,
        "collector": { "strategy": "disk_backed", "max_bins_in_memory": 5000 }
    }"#;
    let config = BinningConfig::from_json_str(json).expect("parse");
    assert_eq!(config.num_rows, 2160);
    assert_eq!(config.aggregators.len(), 4);
    assert_eq!(config.time_filter_method, TimeFilterMethod::SpatiotemporalDataDay);
    assert_eq!(config.collector.strategy, CollectorStrategy::DiskBacked);
    assert_eq!(config.collector.num_shards, CollectorConfig::default().num_shards);
    assert_eq!(config.max_distance_on_earth, -1.0);

    // explicit variables first, then aggregators, then the mask
    let variables = config.variable_context().expect("variables");
    assert_eq!(variables.names(), ["wind", "chl", "sst", "qa"].map(String::from));

    let ctx = config.create_binning_context().expect("context");
    assert_eq!(ctx.feature_names(), ["mean", "chl_cv", "chl_p90"].map(String::from));
    assert_eq!(ctx.super_sampling, 3);
    assert!(ctx.mask.is_some());
    assert!(ctx.observation_period().is_some());
}

#[test]
fn test_config_json_round_trip() {
    let mut config = base_config();
    config.region = Some("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))".to_string());
    let text = serde_json::to_string(&config).expect("serialize");
    let parsed = BinningConfig::from_json_str(&text).expect("parse");
    assert_eq!(parsed, config);
}

#[test]
fn test_config_from_missing_file() {
    let err = BinningConfig::from_json_file("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, BinningError::Io(_)));
}

#[test]
fn test_describe_grid() {
    let grid = PlanetaryGrid::new(2160).expect("grid");
    let description = describe_grid(&grid);
    assert_eq!(description.num_rows, 2160);
    assert_eq!(description.num_bins, 5_940_422);
    assert_eq!(description.max_cols, 4320);
    // the classic 9.28 km grid
    assert!((description.row_height_km - 9.26).abs() < 0.05);
}
