//! Simple benchmark example showing the performance benefits of parallel binning.
//!
//! Bins the same set of synthetic swaths with one worker thread and with all
//! cores, and reports the speedup.

use ndarray::Array2;
use ru_l3bin::prelude::*;
use std::sync::Arc;
use std::time::Instant;

fn synthetic_sources(count: usize, width: usize, height: usize) -> Vec<Box<dyn ProductSource>> {
    (0..count)
        .map(|k| {
            let min_lon = -170.0 + (k as f64 * 13.0) % 300.0;
            let chl = Array2::from_shape_fn((height, width), |(y, x)| {
                0.1 + ((x as f64 * 0.05).sin() * (y as f64 * 0.03).cos()).abs()
            });
            let product = RasterProduct::regular(format!("swath-{k:03}"), min_lon, 60.0, 0.05, width, height)
                .with_variable("chl", chl);
            Box::new(MemoryProductSource::new(Arc::new(product))) as Box<dyn ProductSource>
        })
        .collect()
}

fn run_once(ctx: &Arc<BinningContext>, sources: &[Box<dyn ProductSource>], threads: usize) -> Result<f64> {
    let binner = Binner::new(Arc::clone(ctx), ParallelConfig::with_threads(threads));
    let mut sink = VecSink::new();
    let start = Instant::now();
    let stats = binner.run(sources, &mut sink, &CancellationToken::new())?;
    let duration = start.elapsed();
    println!(
        "   Observations: {}, bins: {}",
        stats.observations, stats.temporal_bins_emitted
    );
    Ok(duration.as_secs_f64())
}

fn main() -> Result<()> {
    println!("🔬 RuL3Bin Parallel Binning Benchmark");
    println!("==========================================\n");

    let available_threads = num_cpus::get();
    println!("System has {available_threads} logical CPU cores available\n");

    let config = BinningConfig::new(
        2160,
        vec![AggregatorConfig::average_with_counts("chl"), AggregatorConfig::min_max("chl")],
    );
    let ctx = Arc::new(config.create_binning_context()?);

    for (count, size) in [(8, 400), (16, 600), (32, 800)] {
        let sources = synthetic_sources(count, size, size);
        println!("📊 Testing with {count} swaths of {size}x{size} pixels:");
        println!("-------------------------------------------");

        println!("🐌 Single worker:");
        let seq_time = run_once(&ctx, &sources, 1)?;
        println!("   ⏱️  Duration: {seq_time:.3} seconds\n");

        println!("⚡ Parallel processing ({available_threads} threads):");
        let par_time = run_once(&ctx, &sources, available_threads)?;
        println!("   ⏱️  Duration: {par_time:.3} seconds");

        let speedup = seq_time / par_time;
        println!("   🚀 Speedup: {speedup:.2}x faster\n");
        println!("=========================================\n");
    }

    println!("💡 Key Takeaways:");
    println!("   - Products are binned independently, so throughput scales with workers");
    println!("   - Use --threads option in ru-l3bin to control parallelism");
    Ok(())
}
