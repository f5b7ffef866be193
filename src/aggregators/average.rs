//! Weighted mean and standard deviation
//!
//! Accumulation uses West's weighted form of Welford's update and partial
//! states are combined with Chan's parallel formula, so large observation
//! counts do not suffer the cancellation of a sum / sum-of-squares scheme.

use crate::bins::Observation;

const SUM_W: usize = 0;
const MEAN: usize = 1;
const M2: usize = 2;
const COUNT: usize = 3;

#[derive(Debug, Clone)]
pub struct AverageAggregator {
    var_index: usize,
    target_name: String,
    output_counts: bool,
    output_sums: bool,
}

impl AverageAggregator {
    #[must_use]
    pub fn new(var_index: usize, target_name: String, output_counts: bool, output_sums: bool) -> Self {
        Self {
            var_index,
            target_name,
            output_counts,
            output_sums,
        }
    }

    #[must_use]
    pub const fn state_len(&self) -> usize {
        4
    }

    #[must_use]
    pub fn state_feature_names(&self) -> Vec<String> {
        let t = &self.target_name;
        vec![
            format!("{t}_sum_w"),
            format!("{t}_mean"),
            format!("{t}_m2"),
            format!("{t}_count"),
        ]
    }

    #[must_use]
    pub fn output_feature_names(&self) -> Vec<String> {
        let t = &self.target_name;
        let mut names = vec![format!("{t}_mean"), format!("{t}_sigma")];
        if self.output_counts {
            names.push(format!("{t}_counts"));
        }
        if self.output_sums {
            names.push(format!("{t}_sum"));
        }
        names
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
        let sum_w = state[SUM_W] + w;
        let delta = x - state[MEAN];
        state[MEAN] += delta * w / sum_w;
        state[M2] += w * delta * (x - state[MEAN]);
        state[SUM_W] = sum_w;
        state[COUNT] += 1.0;
    }

    pub fn merge(&self, state: &mut [f64], other: &[f64]) {
        let wb = other[SUM_W];
        if wb <= 0.0 {
            return;
        }
        let wa = state[SUM_W];
        if wa <= 0.0 {
            state.copy_from_slice(other);
            return;
        }
        let w = wa + wb;
        let delta = other[MEAN] - state[MEAN];
        state[MEAN] = (wa * state[MEAN] + wb * other[MEAN]) / w;
        state[M2] = state[M2] + other[M2] + delta * delta * (wa * wb) / w;
        state[SUM_W] = w;
        state[COUNT] += other[COUNT];
    }

    pub fn complete(&self, state: &[f64], output: &mut [f64]) {
        let sum_w = state[SUM_W];
        let (mean, sigma) = if sum_w > 0.0 {
            (state[MEAN], (state[M2] / sum_w).max(0.0).sqrt())
        } else {
            (f64::NAN, f64::NAN)
        };
        output[0] = mean;
        output[1] = sigma;
        let mut next = 2;
        if self.output_counts {
            output[next] = state[COUNT];
            next += 1;
        }
        if self.output_sums {
            output[next] = if sum_w > 0.0 { mean * sum_w } else { f64::NAN };
        }
    }
}
