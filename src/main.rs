//! Entry point for the ru-l3bin application.
//! Handles CLI parsing, configuration loading, and runs the binning pipeline.

use clap::Parser;
use ru_l3bin::prelude::*;
use ru_l3bin::{get_parallel_info, print_feature_layout, print_grid_description, print_run_summary};
use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Args;

const PREVIEW_BINS: usize = 10;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(args.verbose);

    println!(
        r#"
------------------------------------------------------------------
                 ____ ___         _ _____ _     _
                |  _ \_ _|_   _  | |___ /| |__ (_)_ __
                | |_) | || | | | | | |_ \| '_ \| | '_ \
                |  _ <| || |_| | | |___) | |_) | | | | |
                |_| \_\_| \__,_| |_|____/|_.__/|_|_| |_|
                  Rust-based Level-3 binning tool
------------------------------------------------------------------
                        "#
    );

    let mut config = BinningConfig::from_json_file(&args.config)?;
    println!("Successfully loaded configuration: {}", args.config.display());
    if let Some(num_rows) = args.num_rows {
        config.num_rows = num_rows;
    }
    config.collector = config.collector.with_env_overrides();
    if let Some(max_bins) = args.max_bins_in_memory {
        config.collector.strategy = CollectorStrategy::DiskBacked;
        config.collector.max_bins_in_memory = max_bins;
    }
    if let Some(dir) = args.spill_dir {
        config.collector.strategy = CollectorStrategy::DiskBacked;
        config.collector.spill_dir = Some(dir);
    }

    let ctx = Arc::new(config.create_binning_context()?);

    if args.describe {
        print_grid_description(&ctx.grid);
        print_feature_layout(&ctx);
        return Ok(());
    }

    let parallel = ParallelConfig::new(args.threads);
    if args.verbose {
        get_parallel_info().print_info();
    }

    let sources: Vec<Box<dyn ProductSource>> = args
        .products
        .iter()
        .map(|path| Box::new(JsonProductSource::new(path)) as Box<dyn ProductSource>)
        .collect();
    println!("Binning {} product(s) on a {}-row grid", sources.len(), ctx.grid.num_rows());

    let binner = Binner::new(Arc::clone(&ctx), parallel);
    let cancel = CancellationToken::new();

    let stats = if let Some(output_path) = &args.output {
        let file = BufWriter::new(File::create(output_path)?);
        let mut sink = JsonLinesBinWriter::new(file, ctx.grid.clone());
        let stats = binner.run(&sources, &mut sink, &cancel)?;
        println!("✅ Saved bins to {}", output_path.display());
        stats
    } else {
        let mut sink = VecSink::new();
        let stats = binner.run(&sources, &mut sink, &cancel)?;
        println!("\nFirst {PREVIEW_BINS} bins:");
        for bin in sink.bins.iter().take(PREVIEW_BINS) {
            let (lat, lon) = ctx.grid.center_of(bin.index);
            let features = sink
                .feature_names
                .iter()
                .zip(&bin.features)
                .map(|(name, value)| format!("{name}={value:.4}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("- bin {} ({lat:.3}, {lon:.3}) obs={} {features}", bin.index, bin.num_obs);
        }
        stats
    };

    print_run_summary(&stats);
    Ok(())
}
