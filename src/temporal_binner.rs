//! Temporal binning: merging all partial bins of a cell into its final value

use crate::bins::{SpatialBin, TemporalBin};
use crate::context::BinningContext;
use rayon::prelude::*;
use std::sync::Arc;

pub struct TemporalBinner {
    ctx: Arc<BinningContext>,
}

impl TemporalBinner {
    #[must_use]
    pub fn new(ctx: Arc<BinningContext>) -> Self {
        Self { ctx }
    }

    /// Merge every partial bin of cell `index` into a fresh temporal bin
    #[must_use]
    pub fn process_spatial_bins(&self, index: u64, spatial_bins: &[SpatialBin]) -> TemporalBin {
        let manager = &self.ctx.bin_manager;
        let mut temporal = manager.create_temporal_bin(index);
        for spatial in spatial_bins {
            manager.aggregate_temporal_bin(spatial, &mut temporal);
        }
        temporal
    }

    /// Complete the output features, post-processing included
    #[must_use]
    pub fn compute_output(&self, mut temporal: TemporalBin) -> TemporalBin {
        self.ctx.bin_manager.process(&mut temporal);
        temporal
    }

    /// Bin a batch of groups in parallel, keeping their order and dropping
    /// bins without observations
    #[must_use]
    pub fn process_batch(&self, groups: Vec<(u64, Vec<SpatialBin>)>) -> Vec<TemporalBin> {
        groups
            .into_par_iter()
            .map(|(index, bins)| self.process_spatial_bins(index, &bins))
            .filter(|temporal| temporal.num_obs > 0)
            .map(|temporal| self.compute_output(temporal))
            .collect()
    }
}
