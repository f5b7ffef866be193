//! Percentile from a fixed-range weighted histogram
//!
//! Keeping raw samples per bin is not an option for a streaming merge, so the
//! value range is split into `num_buckets` equal buckets. Histograms add up
//! bucket by bucket, which keeps the merge exact and order independent.

use crate::bins::Observation;
use crate::errors::{BinningError, Result};

#[derive(Debug, Clone)]
pub struct PercentileAggregator {
    var_index: usize,
    target_name: String,
    percentage: u32,
    min_value: f64,
    max_value: f64,
    num_buckets: usize,
}

impl PercentileAggregator {
    /// # Errors
    ///
    /// Returns a configuration error for an empty value range, zero buckets
    /// or a percentage above 100.
    pub fn new(
        var_index: usize,
        target_name: String,
        percentage: u32,
        min_value: f64,
        max_value: f64,
        num_buckets: usize,
    ) -> Result<Self> {
        if percentage > 100 {
            return Err(BinningError::config(format!(
                "percentile aggregator '{target_name}': percentage must be 0..=100, got {percentage}"
            )));
        }
        if !(min_value.is_finite() && max_value.is_finite() && min_value < max_value) {
            return Err(BinningError::config(format!(
                "percentile aggregator '{target_name}': invalid value range [{min_value}, {max_value}]"
            )));
        }
        if num_buckets == 0 {
            return Err(BinningError::config(format!(
                "percentile aggregator '{target_name}': num_buckets must be positive"
            )));
        }
        Ok(Self {
            var_index,
            target_name,
            percentage,
            min_value,
            max_value,
            num_buckets,
        })
    }

    fn bucket_width(&self) -> f64 {
        (self.max_value - self.min_value) / self.num_buckets as f64
    }

    fn bucket_of(&self, x: f64) -> usize {
        let pos = ((x - self.min_value) / self.bucket_width()).floor();
        if pos <= 0.0 {
            0
        } else {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let pos = pos as usize;
            pos.min(self.num_buckets - 1)
        }
    }

    /// Buckets followed by the total weight
    #[must_use]
    pub fn state_len(&self) -> usize {
        self.num_buckets + 1
    }

    #[must_use]
    pub fn state_feature_names(&self) -> Vec<String> {
        (0..self.num_buckets)
            .map(|b| format!("{}_hist_{b}", self.target_name))
            .chain(std::iter::once(format!("{}_hist_total", self.target_name)))
            .collect()
    }

    #[must_use]
    pub fn output_feature_names(&self) -> Vec<String> {
        vec![format!("{}_p{}", self.target_name, self.percentage)]
    }

    pub fn init(&self, state: &mut [f64]) {
        state.fill(0.0);
    }

    pub fn accumulate(&self, state: &mut [f64], obs: &Observation<'_>) {
        let x = obs.values[self.var_index];
        let w = obs.weight;
        if !x.is_finite() || !w.is_finite() || w <= 0.0 {
            return;
        }
        state[self.bucket_of(x)] += w;
        state[self.num_buckets] += w;
    }

    pub fn merge(&self, state: &mut [f64], other: &[f64]) {
        for (a, b) in state.iter_mut().zip(other) {
            *a += b;
        }
    }

    pub fn complete(&self, state: &[f64], output: &mut [f64]) {
        let total = state[self.num_buckets];
        if total <= 0.0 {
            output[0] = f64::NAN;
            return;
        }
        let rank = f64::from(self.percentage) / 100.0 * total;
        let width = self.bucket_width();
        let mut cumulative = 0.0;
        for (bucket, &weight) in state[..self.num_buckets].iter().enumerate() {
            if weight > 0.0 && cumulative + weight >= rank {
                let fraction = ((rank - cumulative) / weight).clamp(0.0, 1.0);
                output[0] = self.min_value + (bucket as f64 + fraction) * width;
                return;
            }
            cumulative += weight;
        }
        output[0] = self.max_value;
    }
}
