//! Values of a variable set observed together with the maximum of another variable

use crate::bins::Observation;
use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub struct OnMaxSetAggregator {
    on_max_index: usize,
    target_name: String,
    set_indices: Vec<usize>,
    set_names: Vec<String>,
}

/// Total order on `(max, set values)` candidates. Ties on the maximum fall back
/// to the set values so that merging stays commutative.
fn compare(max_a: f64, set_a: impl Iterator<Item = f64>, max_b: f64, set_b: impl Iterator<Item = f64>) -> Ordering {
    max_a
        .total_cmp(&max_b)
        .then_with(|| {
            set_a
                .zip(set_b)
                .map(|(a, b)| a.total_cmp(&b))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        })
}

impl OnMaxSetAggregator {
    #[must_use]
    pub fn new(on_max_index: usize, target_name: String, set_indices: Vec<usize>, set_names: Vec<String>) -> Self {
        Self {
            on_max_index,
            target_name,
            set_indices,
            set_names,
        }
    }

    #[must_use]
    pub fn state_len(&self) -> usize {
        1 + self.set_indices.len()
    }

    #[must_use]
    pub fn state_feature_names(&self) -> Vec<String> {
        self.output_feature_names()
    }

    #[must_use]
    pub fn output_feature_names(&self) -> Vec<String> {
        std::iter::once(format!("{}_max", self.target_name))
            .chain(self.set_names.iter().cloned())
            .collect()
    }

    pub fn init(&self, state: &mut [f64]) {
        state[0] = f64::NEG_INFINITY;
        state[1..].fill(f64::NAN);
    }

    pub fn accumulate(&self, state: &mut [f64], obs: &Observation<'_>) {
        let x = obs.values[self.on_max_index];
        if !x.is_finite() {
            return;
        }
        let candidate = self.set_indices.iter().map(|&i| obs.values[i]);
        if state[0] == f64::NEG_INFINITY
            || compare(x, candidate.clone(), state[0], state[1..].iter().copied()) == Ordering::Greater
        {
            state[0] = x;
            for (slot, value) in state[1..].iter_mut().zip(candidate) {
                *slot = value;
            }
        }
    }

    pub fn merge(&self, state: &mut [f64], other: &[f64]) {
        if other[0] == f64::NEG_INFINITY {
            return;
        }
        if state[0] == f64::NEG_INFINITY
            || compare(other[0], other[1..].iter().copied(), state[0], state[1..].iter().copied())
                == Ordering::Greater
        {
            state.copy_from_slice(other);
        }
    }

    pub fn complete(&self, state: &[f64], output: &mut [f64]) {
        if state[0] == f64::NEG_INFINITY {
            output.fill(f64::NAN);
        } else {
            output.copy_from_slice(state);
        }
    }
}
