//! Minimum and maximum

use crate::bins::Observation;

#[derive(Debug, Clone)]
pub struct MinMaxAggregator {
    var_index: usize,
    target_name: String,
}

impl MinMaxAggregator {
    #[must_use]
    pub fn new(var_index: usize, target_name: String) -> Self {
        Self {
            var_index,
            target_name,
        }
    }

    #[must_use]
    pub const fn state_len(&self) -> usize {
        2
    }

    #[must_use]
    pub fn state_feature_names(&self) -> Vec<String> {
        self.output_feature_names()
    }

    #[must_use]
    pub fn output_feature_names(&self) -> Vec<String> {
        vec![
            format!("{}_min", self.target_name),
            format!("{}_max", self.target_name),
        ]
    }

    pub fn init(&self, state: &mut [f64]) {
        state[0] = f64::INFINITY;
        state[1] = f64::NEG_INFINITY;
    }

    pub fn accumulate(&self, state: &mut [f64], obs: &Observation<'_>) {
        let x = obs.values[self.var_index];
        if x.is_finite() {
            state[0] = state[0].min(x);
            state[1] = state[1].max(x);
        }
    }

    pub fn merge(&self, state: &mut [f64], other: &[f64]) {
        state[0] = state[0].min(other[0]);
        state[1] = state[1].max(other[1]);
    }

    pub fn complete(&self, state: &[f64], output: &mut [f64]) {
        if state[0] > state[1] {
            // nothing finite was seen
            output[0] = f64::NAN;
            output[1] = f64::NAN;
        } else {
            output[0] = state[0];
            output[1] = state[1];
        }
    }
}
