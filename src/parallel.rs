//! Parallel processing configuration and management
//!
//! This module provides abstractions for configuring the Rayon thread pools
//! that run the spatial binning workers and the temporal batches.

use crate::errors::{BinningError, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

/// Configuration for parallel processing
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    /// Worker threads; `None` uses one per CPU core
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    #[must_use]
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Create a configuration that uses all available CPU cores
    #[must_use]
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    /// Create a configuration that uses a specific number of threads
    #[must_use]
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Number of worker threads a pool built from this configuration will have
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Build a dedicated, bounded pool for one binning run
    ///
    /// # Errors
    ///
    /// Returns [`BinningError::ThreadPool`] if the pool cannot be created.
    pub fn build_pool(&self) -> Result<ThreadPool> {
        let num_threads = self.effective_threads();
        debug!(threads = num_threads, "building worker pool");
        ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("ru-l3bin-worker-{i}"))
            .build()
            .map_err(|e| {
                BinningError::ThreadPool(format!(
                    "failed to initialize thread pool with {num_threads} threads: {e}"
                ))
            })
    }
}

/// Get information about the current parallel configuration
#[must_use]
pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
        available_parallelism: std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1),
    }
}

/// Information about the parallel processing environment
#[derive(Debug, Clone)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
    pub available_parallelism: usize,
}

impl ParallelInfo {
    /// Print parallel processing information
    pub fn print_info(&self) {
        println!("📊 Parallel Processing Information:");
        println!("   Current threads: {}", self.current_threads);
        println!("   Available CPU cores: {}", self.available_cores);
        println!("   Available parallelism: {}", self.available_parallelism);
    }
}
