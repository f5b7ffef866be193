//! Defines command-line interface options using `clap` for the ru-l3bin application.

use clap::Parser;
use std::path::PathBuf;

/// A CLI tool for Level-3 binning of satellite swath products
#[derive(Parser, Debug)]
#[command(
    version,
    name = "ru-l3bin",
    about = "Spatial and temporal binning of swath products onto an equal-area grid"
)]
pub struct Args {
    /// Path to the JSON binning configuration
    #[arg(short, long)]
    pub config: PathBuf,

    /// JSON raster product files to bin
    #[arg(short, long, num_args = 1..)]
    pub products: Vec<PathBuf>,

    /// Write temporal bins as JSON lines to this path. If not set, a preview is printed.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Override the number of grid rows from the configuration
    #[arg(long)]
    pub num_rows: Option<usize>,

    /// Memory budget in bins; switches to disk-backed collection
    #[arg(long)]
    pub max_bins_in_memory: Option<usize>,

    /// Directory for spill files of the disk-backed collector
    #[arg(long)]
    pub spill_dir: Option<PathBuf>,

    /// Print the grid and feature layout and exit
    #[arg(long)]
    pub describe: bool,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}
