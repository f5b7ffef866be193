//! Spatial bin collection
//!
//! Workers hand the partial bins of each product to a shared
//! [`SpatialBinCollector`]. The bin index space is split into contiguous
//! ranges ("shards"), each behind its own lock, so concurrent products only
//! contend when they touch the same range. Bins arriving for an index that is
//! already present are merged right away.
//!
//! With the disk-backed strategy a shard that outgrows its share of the memory
//! budget is appended to a per-shard spill file and cleared. When collection
//! is finished, [`SpatialBinCollector::into_bin_collection`] streams the groups
//! in ascending bin index, loading one shard at a time.

mod spill;

use crate::bin_manager::BinManager;
use crate::bins::SpatialBin;
use crate::config::{CollectorConfig, CollectorStrategy};
use crate::errors::{BinningError, Result};
use parking_lot::Mutex;
use spill::SpillFile;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tempfile::TempDir;
use tracing::debug;

#[derive(Debug, Default)]
struct Shard {
    bins: BTreeMap<u64, SpatialBin>,
    spill: Option<SpillFile>,
}

/// Thread-safe sink for spatial bins of many products
pub struct SpatialBinCollector {
    bin_manager: BinManager,
    shards: Vec<Mutex<Shard>>,
    shard_width: u64,
    max_bins_per_shard: Option<usize>,
    spill_dir: Option<TempDir>,
    completed: AtomicBool,
    consumed_bins: AtomicU64,
    spill_events: AtomicU64,
}

impl SpatialBinCollector {
    /// Collector for a grid with `num_bins` bins
    ///
    /// # Errors
    ///
    /// Returns a spill error when the disk-backed strategy cannot create its
    /// temporary directory.
    pub fn new(bin_manager: BinManager, num_bins: u64, config: &CollectorConfig) -> Result<Self> {
        let num_shards = config.num_shards.max(1);
        let shard_width = num_bins.div_ceil(num_shards as u64).max(1);
        let (max_bins_per_shard, spill_dir) = match config.strategy {
            CollectorStrategy::InMemory => (None, None),
            CollectorStrategy::DiskBacked => {
                let builder_result = match &config.spill_dir {
                    Some(parent) => tempfile::Builder::new().prefix("ru-l3bin-spill-").tempdir_in(parent),
                    None => tempfile::Builder::new().prefix("ru-l3bin-spill-").tempdir(),
                };
                let dir = builder_result.map_err(|e| BinningError::spill("creating spill directory", e))?;
                debug!(dir = %dir.path().display(), "created spill directory");
                (Some((config.max_bins_in_memory / num_shards).max(1)), Some(dir))
            }
        };
        Ok(Self {
            bin_manager,
            shards: (0..num_shards).map(|_| Mutex::new(Shard::default())).collect(),
            shard_width,
            max_bins_per_shard,
            spill_dir,
            completed: AtomicBool::new(false),
            consumed_bins: AtomicU64::new(0),
            spill_events: AtomicU64::new(0),
        })
    }

    fn shard_of(&self, index: u64) -> usize {
        #[allow(clippy::cast_possible_truncation)]
        let shard = (index / self.shard_width) as usize;
        shard.min(self.shards.len() - 1)
    }

    /// Merge the bins of one product into the collection
    ///
    /// # Errors
    ///
    /// Returns [`BinningError::CollectorClosed`] after
    /// [`consuming_completed`](Self::consuming_completed), and spill errors.
    pub fn consume(&self, bins: Vec<SpatialBin>) -> Result<()> {
        if self.completed.load(Ordering::Acquire) {
            return Err(BinningError::CollectorClosed);
        }
        let count = bins.len() as u64;
        let mut bins = bins.into_iter().peekable();
        while let Some(first) = bins.next() {
            let shard_index = self.shard_of(first.index);
            let mut shard = self.shards[shard_index].lock();
            self.merge_into(&mut shard, first);
            while let Some(bin) = bins.next_if(|b| self.shard_of(b.index) == shard_index) {
                self.merge_into(&mut shard, bin);
            }
            if let Some(limit) = self.max_bins_per_shard {
                if shard.bins.len() > limit {
                    self.spill(shard_index, &mut shard)?;
                }
            }
        }
        self.consumed_bins.fetch_add(count, Ordering::Relaxed);
        Ok(())
    }

    fn merge_into(&self, shard: &mut Shard, bin: SpatialBin) {
        match shard.bins.entry(bin.index) {
            Entry::Occupied(mut existing) => self.bin_manager.merge_spatial_bin(existing.get_mut(), &bin),
            Entry::Vacant(slot) => {
                slot.insert(bin);
            }
        }
    }

    fn spill(&self, shard_index: usize, shard: &mut Shard) -> Result<()> {
        let Some(dir) = &self.spill_dir else {
            return Ok(());
        };
        let file = shard
            .spill
            .get_or_insert_with(|| SpillFile::new(dir.path().join(format!("shard-{shard_index:05}.bin"))));
        file.append(shard.bins.values())?;
        debug!(
            shard = shard_index,
            bins = shard.bins.len(),
            file = %file.path().display(),
            "spilled shard to disk"
        );
        shard.bins.clear();
        self.spill_events.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Stop accepting bins and flush spill files
    ///
    /// # Errors
    ///
    /// Returns spill errors from flushing.
    pub fn consuming_completed(&self) -> Result<()> {
        self.completed.store(true, Ordering::Release);
        for shard in &self.shards {
            if let Some(file) = shard.lock().spill.as_mut() {
                file.flush()?;
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Spatial bins handed to `consume` so far
    #[must_use]
    pub fn consumed_bins(&self) -> u64 {
        self.consumed_bins.load(Ordering::Relaxed)
    }

    /// Number of times a shard was written to disk
    #[must_use]
    pub fn spill_events(&self) -> u64 {
        self.spill_events.load(Ordering::Relaxed)
    }

    /// Whether no bin was collected at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| {
            let shard = shard.lock();
            shard.bins.is_empty() && shard.spill.as_ref().map_or(true, |f| f.records() == 0)
        })
    }

    /// Hand over the collected bins, grouped by index in ascending order
    ///
    /// # Errors
    ///
    /// Returns [`BinningError::Config`] if called before
    /// [`consuming_completed`](Self::consuming_completed).
    pub fn into_bin_collection(self) -> Result<BinCollection> {
        if !self.is_completed() {
            return Err(BinningError::config("bin collection requested before consuming was completed"));
        }
        Ok(BinCollection {
            state_len: self.bin_manager.state_len(),
            shards: self.shards.into_iter().map(Mutex::into_inner).collect(),
            next_shard: 0,
            current: Vec::new().into_iter(),
            _spill_dir: self.spill_dir,
        })
    }
}

/// Ascending stream of `(bin index, partial bins)` groups
pub struct BinCollection {
    state_len: usize,
    shards: Vec<Shard>,
    next_shard: usize,
    current: std::vec::IntoIter<(u64, Vec<SpatialBin>)>,
    _spill_dir: Option<TempDir>,
}

impl BinCollection {
    fn load_shard(&mut self, shard_index: usize) -> Result<Vec<(u64, Vec<SpatialBin>)>> {
        let shard = &mut self.shards[shard_index];
        let mut groups: BTreeMap<u64, Vec<SpatialBin>> = BTreeMap::new();
        if let Some(file) = shard.spill.as_mut() {
            let spilled = file.read_all(self.state_len)?;
            debug!(shard = shard_index, records = spilled.len(), "loaded spilled bins");
            for bin in spilled {
                groups.entry(bin.index).or_default().push(bin);
            }
        }
        for (index, bin) in std::mem::take(&mut shard.bins) {
            groups.entry(index).or_default().push(bin);
        }
        shard.spill = None;
        Ok(groups.into_iter().collect())
    }
}

impl Iterator for BinCollection {
    type Item = Result<(u64, Vec<SpatialBin>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(group) = self.current.next() {
                return Some(Ok(group));
            }
            if self.next_shard >= self.shards.len() {
                return None;
            }
            let shard_index = self.next_shard;
            self.next_shard += 1;
            match self.load_shard(shard_index) {
                Ok(groups) => self.current = groups.into_iter(),
                Err(e) => {
                    self.next_shard = self.shards.len();
                    return Some(Err(e));
                }
            }
        }
    }
}
