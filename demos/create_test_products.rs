//! Creates sample product files and a binning configuration for trying out ru-l3bin.
//!
//! Writes three small JSON raster products (two overlapping daytime passes and
//! one from the following day) plus `test_config.json` into `test_products/`.
//!
//! ```text
//! cargo run --example create_test_products
//! cargo run -- --config test_products/test_config.json --products test_products/*.json
//! ```

use chrono::{TimeZone, Utc};
use ru_l3bin::product::{GeoCodingSpec, RasterProductFile};
use std::collections::BTreeMap;
use std::path::Path;

fn product(name: &str, min_lon: f64, day: u32, hour: u32, bias: f64) -> RasterProductFile {
    let (width, height) = (60, 40);
    let chl = (0..width * height)
        .map(|i| {
            let (x, y) = (i % width, i / width);
            // a strip of missing values, like a cloud edge
            if (10..14).contains(&x) {
                None
            } else {
                Some(bias + 0.02 * x as f64 + 0.01 * y as f64)
            }
        })
        .collect();
    let sst = (0..width * height).map(|i| Some(15.0 + (i % 7) as f64)).collect();

    let mut variables = BTreeMap::new();
    variables.insert("chl".to_string(), chl);
    variables.insert("sst".to_string(), sst);

    RasterProductFile {
        name: name.to_string(),
        width,
        height,
        start_time: Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).single(),
        end_time: Utc.with_ymd_and_hms(2024, 3, day, hour, 5, 0).single(),
        geocoding: GeoCodingSpec::Regular {
            min_lon,
            max_lat: 45.0,
            pixel_size: 0.1,
        },
        variables,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = Path::new("test_products");
    std::fs::create_dir_all(dir)?;
    println!("🔨 Creating test products in: {}", dir.display());

    let products = [
        product("pass_a", 10.0, 1, 10, 0.5),
        product("pass_b", 12.5, 1, 11, 0.7),
        product("pass_next_day", 11.0, 2, 10, 2.0),
    ];
    for p in &products {
        let path = dir.join(format!("{}.json", p.name));
        p.write_to(&path)?;
        println!("   ✅ {}", path.display());
    }

    let config = serde_json::json!({
        "num_rows": 2160,
        "aggregators": [
            { "type": "AVG", "var_name": "chl", "output_counts": true },
            { "type": "MIN_MAX", "var_name": "sst" },
            { "type": "PERCENTILE", "var_name": "chl", "percentage": 90, "min_value": 0.0, "max_value": 5.0 }
        ],
        "post_processor": {
            "type": "Expression",
            "target": "chl_cv",
            "expression": "chl_sigma / max(chl_mean, 1e-6)"
        },
        "mask_expr": "chl > 0 && !nan(sst)",
        "start_date_time": "2024-03-01",
        "period_duration": 1.0,
        "time_filter_method": "TIME_RANGE"
    });
    let config_path = dir.join("test_config.json");
    std::fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;
    println!("   ✅ {}", config_path.display());

    println!("\n💡 pass_next_day lies outside the configured period and will be filtered out.");
    Ok(())
}
