//! Compensated weighted sum

use crate::bins::Observation;

const SUM: usize = 0;
const COMP: usize = 1;
const COUNT: usize = 2;

#[derive(Debug, Clone)]
pub struct SumAggregator {
    var_index: usize,
    target_name: String,
}

/// Neumaier's variant of Kahan summation
fn neumaier_add(sum: &mut f64, comp: &mut f64, value: f64) {
    let t = *sum + value;
    if sum.abs() >= value.abs() {
        *comp += (*sum - t) + value;
    } else {
        *comp += (value - t) + *sum;
    }
    *sum = t;
}

impl SumAggregator {
    #[must_use]
    pub fn new(var_index: usize, target_name: String) -> Self {
        Self {
            var_index,
            target_name,
        }
    }

    #[must_use]
    pub const fn state_len(&self) -> usize {
        3
    }

    #[must_use]
    pub fn state_feature_names(&self) -> Vec<String> {
        let t = &self.target_name;
        vec![format!("{t}_sum"), format!("{t}_comp"), format!("{t}_count")]
    }

    #[must_use]
    pub fn output_feature_names(&self) -> Vec<String> {
        vec![format!("{}_sum", self.target_name)]
    }

    pub fn init(&self, state: &mut [f64]) {
        state.fill(0.0);
    }

    pub fn accumulate(&self, state: &mut [f64], obs: &Observation<'_>) {
        let x = obs.values[self.var_index];
        if !x.is_finite() || !obs.weight.is_finite() || obs.weight <= 0.0 {
            return;
        }
        let (sum, rest) = state.split_at_mut(COMP);
        neumaier_add(&mut sum[SUM], &mut rest[0], x * obs.weight);
        state[COUNT] += 1.0;
    }

    pub fn merge(&self, state: &mut [f64], other: &[f64]) {
        let (sum, rest) = state.split_at_mut(COMP);
        neumaier_add(&mut sum[SUM], &mut rest[0], other[SUM]);
        state[COMP] += other[COMP];
        state[COUNT] += other[COUNT];
    }

    pub fn complete(&self, state: &[f64], output: &mut [f64]) {
        output[0] = if state[COUNT] > 0.0 {
            state[SUM] + state[COMP]
        } else {
            f64::NAN
        };
    }
}
