//! Spatial binning of a single product
//!
//! Every valid pixel is split into `s × s` sub-pixels, each sub-pixel is
//! geolocated and, if it survives the distance, region and time tests,
//! accumulated into the bin that contains it. The result is one partial
//! [`SpatialBin`] per touched bin, ready for the collector.

use crate::bins::{Observation, SpatialBin};
use crate::context::BinningContext;
use crate::errors::{BinningError, Result};
use crate::period::Membership;
use crate::product::Product;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Partial bins produced from one product
#[derive(Debug, Clone)]
pub struct ProductBins {
    pub product: String,
    /// Ascending bin index, one entry per touched bin
    pub bins: Vec<SpatialBin>,
    pub num_observations: u64,
}

pub struct SpatialBinner {
    ctx: Arc<BinningContext>,
    observations: AtomicU64,
}

impl SpatialBinner {
    #[must_use]
    pub fn new(ctx: Arc<BinningContext>) -> Self {
        Self {
            ctx,
            observations: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn context(&self) -> &BinningContext {
        &self.ctx
    }

    /// Observations accumulated so far over all products
    #[must_use]
    pub fn num_observations(&self) -> u64 {
        self.observations.load(Ordering::Relaxed)
    }

    /// Position of every run variable in the product's variable list
    fn resolve_variables(&self, product: &dyn Product) -> Result<Vec<usize>> {
        let available = product.variable_names();
        self.ctx
            .variable_context
            .names()
            .iter()
            .map(|name| {
                available.iter().position(|n| n == name).ok_or_else(|| {
                    BinningError::product_incompatible(product.name(), format!("missing variable '{name}'"))
                })
            })
            .collect()
    }

    /// Bin all observations of `product`
    ///
    /// # Errors
    ///
    /// Returns [`BinningError::ProductIncompatible`] when the product lacks a
    /// variable the run reads.
    pub fn process_product(&self, product: &dyn Product) -> Result<ProductBins> {
        let started = Instant::now();
        let ctx = &*self.ctx;
        let manager = &ctx.bin_manager;
        let var_map = self.resolve_variables(product)?;
        let period = ctx.observation_period();

        let s = ctx.super_sampling.max(1);
        let step = 1.0 / s as f64;
        let weight = step * step;

        let mut bins: BTreeMap<u64, SpatialBin> = BTreeMap::new();
        let mut values = vec![f64::NAN; var_map.len()];
        let mut num_observations = 0_u64;

        for y in 0..product.height() {
            for x in 0..product.width() {
                for (slot, &var) in values.iter_mut().zip(&var_map) {
                    *slot = product.sample(var, x, y);
                }
                if !values.is_empty() && values.iter().all(|v| !v.is_finite()) {
                    continue;
                }
                if let Some(mask) = &ctx.mask {
                    if !mask.evaluate_bool(&values) {
                        continue;
                    }
                }
                let time = product.pixel_time(x, y);
                let centre = match ctx.max_distance_on_earth {
                    Some(_) => match product.geo_pos(x as f64 + 0.5, y as f64 + 0.5) {
                        Some(pos) => Some(pos),
                        None => continue,
                    },
                    None => None,
                };

                for j in 0..s {
                    for i in 0..s {
                        let sx = x as f64 + (i as f64 + 0.5) * step;
                        let sy = y as f64 + (j as f64 + 0.5) * step;
                        let Some(pos) = product.geo_pos(sx, sy) else {
                            continue;
                        };
                        if let (Some(max_distance), Some(centre)) = (ctx.max_distance_on_earth, centre) {
                            if centre.distance_to(&pos) > max_distance {
                                continue;
                            }
                        }
                        if let Some(region) = &ctx.region {
                            if !region.contains(pos.lon, pos.lat) {
                                continue;
                            }
                        }
                        if let Some(period) = period {
                            match time {
                                Some(t) if period.observation_membership(pos.lon, t) == Membership::Current => {}
                                _ => continue,
                            }
                        }

                        let index = ctx.grid.bin_index(pos.lat, pos.lon);
                        let bin = bins
                            .entry(index)
                            .or_insert_with(|| manager.create_spatial_bin(index));
                        let mut obs = Observation::new(pos.lat, pos.lon, &values).with_weight(weight);
                        obs.time = time;
                        manager.aggregate_spatial_bin(&obs, bin);
                        num_observations += 1;
                    }
                }
            }
        }

        self.observations.fetch_add(num_observations, Ordering::Relaxed);
        debug!(
            product = product.name(),
            observations = num_observations,
            bins = bins.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "spatially binned product"
        );

        Ok(ProductBins {
            product: product.name().to_string(),
            bins: bins.into_values().collect(),
            num_observations,
        })
    }
}
