//! Aggregators: per-variable accumulate / merge / complete functions
//!
//! Every aggregator kind works on a fixed-length slice of `f64` accumulator
//! state. The state of all aggregators of a run is concatenated into one vector
//! per bin by the [`BinManager`](crate::bin_manager::BinManager), which keeps
//! spatial bins cheap to merge and trivially serialisable.
//!
//! `merge` is associative and commutative for every kind, so partial states
//! computed per product, in any order or chunking, complete to the same
//! features as a single pass over all observations.
//!
//! # Organization
//!
//! - [`average`]: weighted mean and standard deviation (Welford / Chan)
//! - [`min_max`]: extrema
//! - [`sum`]: compensated weighted sum
//! - [`on_max_set`]: values observed together with a maximum
//! - [`percentile`]: fixed-range histogram percentile

pub mod average;
pub mod min_max;
pub mod on_max_set;
pub mod percentile;
pub mod sum;

pub use average::AverageAggregator;
pub use min_max::MinMaxAggregator;
pub use on_max_set::OnMaxSetAggregator;
pub use percentile::PercentileAggregator;
pub use sum::SumAggregator;

use crate::bins::{Observation, VariableContext};
use crate::errors::{BinningError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_percentage() -> u32 {
    90
}

fn default_num_buckets() -> usize {
    256
}

/// Aggregator definition as found in a binning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AggregatorConfig {
    #[serde(rename = "AVG")]
    Average {
        var_name: String,
        #[serde(default)]
        target_name: Option<String>,
        #[serde(default)]
        output_counts: bool,
        #[serde(default)]
        output_sums: bool,
    },
    #[serde(rename = "MIN_MAX")]
    MinMax {
        var_name: String,
        #[serde(default)]
        target_name: Option<String>,
    },
    #[serde(rename = "SUM")]
    Sum {
        var_name: String,
        #[serde(default)]
        target_name: Option<String>,
    },
    #[serde(rename = "ON_MAX_SET")]
    OnMaxSet {
        on_max_var_name: String,
        #[serde(default)]
        target_name: Option<String>,
        set_var_names: Vec<String>,
    },
    #[serde(rename = "PERCENTILE")]
    Percentile {
        var_name: String,
        #[serde(default)]
        target_name: Option<String>,
        #[serde(default = "default_percentage")]
        percentage: u32,
        min_value: f64,
        max_value: f64,
        #[serde(default = "default_num_buckets")]
        num_buckets: usize,
    },
}

impl AggregatorConfig {
    /// Plain `AVG` aggregator without counts or sums
    pub fn average(var_name: impl Into<String>) -> Self {
        Self::Average {
            var_name: var_name.into(),
            target_name: None,
            output_counts: false,
            output_sums: false,
        }
    }

    /// `AVG` aggregator that also outputs the observation count
    pub fn average_with_counts(var_name: impl Into<String>) -> Self {
        Self::Average {
            var_name: var_name.into(),
            target_name: None,
            output_counts: true,
            output_sums: false,
        }
    }

    pub fn min_max(var_name: impl Into<String>) -> Self {
        Self::MinMax {
            var_name: var_name.into(),
            target_name: None,
        }
    }

    pub fn sum(var_name: impl Into<String>) -> Self {
        Self::Sum {
            var_name: var_name.into(),
            target_name: None,
        }
    }

    /// Variable names this aggregator reads
    #[must_use]
    pub fn var_names(&self) -> Vec<&str> {
        match self {
            Self::Average { var_name, .. }
            | Self::MinMax { var_name, .. }
            | Self::Sum { var_name, .. }
            | Self::Percentile { var_name, .. } => vec![var_name.as_str()],
            Self::OnMaxSet {
                on_max_var_name,
                set_var_names,
                ..
            } => std::iter::once(on_max_var_name.as_str())
                .chain(set_var_names.iter().map(String::as_str))
                .collect(),
        }
    }
}

fn resolve(ctx: &VariableContext, name: &str) -> Result<usize> {
    ctx.index_of(name)
        .ok_or_else(|| BinningError::config(format!("unknown variable '{name}' in aggregator")))
}

fn target_or(target: Option<&String>, var_name: &str) -> String {
    target.cloned().unwrap_or_else(|| var_name.to_string())
}

/// The closed set of aggregator kinds
#[derive(Debug, Clone)]
pub enum Aggregator {
    Average(AverageAggregator),
    MinMax(MinMaxAggregator),
    Sum(SumAggregator),
    OnMaxSet(OnMaxSetAggregator),
    Percentile(PercentileAggregator),
}

impl Aggregator {
    /// Resolve a configuration against the run's variables
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown variables or invalid parameters.
    pub fn from_config(config: &AggregatorConfig, ctx: &VariableContext) -> Result<Self> {
        let aggregator = match config {
            AggregatorConfig::Average {
                var_name,
                target_name,
                output_counts,
                output_sums,
            } => Self::Average(AverageAggregator::new(
                resolve(ctx, var_name)?,
                target_or(target_name.as_ref(), var_name),
                *output_counts,
                *output_sums,
            )),
            AggregatorConfig::MinMax {
                var_name,
                target_name,
            } => Self::MinMax(MinMaxAggregator::new(
                resolve(ctx, var_name)?,
                target_or(target_name.as_ref(), var_name),
            )),
            AggregatorConfig::Sum {
                var_name,
                target_name,
            } => Self::Sum(SumAggregator::new(
                resolve(ctx, var_name)?,
                target_or(target_name.as_ref(), var_name),
            )),
            AggregatorConfig::OnMaxSet {
                on_max_var_name,
                target_name,
                set_var_names,
            } => {
                let set_indices = set_var_names
                    .iter()
                    .map(|name| resolve(ctx, name))
                    .collect::<Result<Vec<_>>>()?;
                Self::OnMaxSet(OnMaxSetAggregator::new(
                    resolve(ctx, on_max_var_name)?,
                    target_or(target_name.as_ref(), on_max_var_name),
                    set_indices,
                    set_var_names.clone(),
                ))
            }
            AggregatorConfig::Percentile {
                var_name,
                target_name,
                percentage,
                min_value,
                max_value,
                num_buckets,
            } => Self::Percentile(PercentileAggregator::new(
                resolve(ctx, var_name)?,
                target_or(target_name.as_ref(), var_name),
                *percentage,
                *min_value,
                *max_value,
                *num_buckets,
            )?),
        };
        Ok(aggregator)
    }

    /// Kind name as used in configurations
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Average(_) => "AVG",
            Self::MinMax(_) => "MIN_MAX",
            Self::Sum(_) => "SUM",
            Self::OnMaxSet(_) => "ON_MAX_SET",
            Self::Percentile(_) => "PERCENTILE",
        }
    }

    /// Length of this aggregator's state slice
    #[must_use]
    pub fn state_len(&self) -> usize {
        match self {
            Self::Average(a) => a.state_len(),
            Self::MinMax(a) => a.state_len(),
            Self::Sum(a) => a.state_len(),
            Self::OnMaxSet(a) => a.state_len(),
            Self::Percentile(a) => a.state_len(),
        }
    }

    #[must_use]
    pub fn state_feature_names(&self) -> Vec<String> {
        match self {
            Self::Average(a) => a.state_feature_names(),
            Self::MinMax(a) => a.state_feature_names(),
            Self::Sum(a) => a.state_feature_names(),
            Self::OnMaxSet(a) => a.state_feature_names(),
            Self::Percentile(a) => a.state_feature_names(),
        }
    }

    #[must_use]
    pub fn output_feature_names(&self) -> Vec<String> {
        match self {
            Self::Average(a) => a.output_feature_names(),
            Self::MinMax(a) => a.output_feature_names(),
            Self::Sum(a) => a.output_feature_names(),
            Self::OnMaxSet(a) => a.output_feature_names(),
            Self::Percentile(a) => a.output_feature_names(),
        }
    }

    /// Write the empty state into `state`
    pub fn init(&self, state: &mut [f64]) {
        match self {
            Self::Average(a) => a.init(state),
            Self::MinMax(a) => a.init(state),
            Self::Sum(a) => a.init(state),
            Self::OnMaxSet(a) => a.init(state),
            Self::Percentile(a) => a.init(state),
        }
    }

    /// Fold one observation into `state`
    pub fn accumulate(&self, state: &mut [f64], obs: &Observation<'_>) {
        match self {
            Self::Average(a) => a.accumulate(state, obs),
            Self::MinMax(a) => a.accumulate(state, obs),
            Self::Sum(a) => a.accumulate(state, obs),
            Self::OnMaxSet(a) => a.accumulate(state, obs),
            Self::Percentile(a) => a.accumulate(state, obs),
        }
    }

    /// Fold a partial state `other` into `state`
    pub fn merge(&self, state: &mut [f64], other: &[f64]) {
        match self {
            Self::Average(a) => a.merge(state, other),
            Self::MinMax(a) => a.merge(state, other),
            Self::Sum(a) => a.merge(state, other),
            Self::OnMaxSet(a) => a.merge(state, other),
            Self::Percentile(a) => a.merge(state, other),
        }
    }

    /// Produce output features from a final state
    pub fn complete(&self, state: &[f64], output: &mut [f64]) {
        match self {
            Self::Average(a) => a.complete(state, output),
            Self::MinMax(a) => a.complete(state, output),
            Self::Sum(a) => a.complete(state, output),
            Self::OnMaxSet(a) => a.complete(state, output),
            Self::Percentile(a) => a.complete(state, output),
        }
    }
}

/// Makes feature names unique by appending `_1`, `_2`, ... to repeats
#[derive(Debug, Default)]
pub struct NameUnifier {
    seen: HashMap<String, usize>,
}

impl NameUnifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unify_name(&mut self, name: &str) -> String {
        let count = self.seen.entry(name.to_string()).or_insert(0);
        let unified = if *count == 0 {
            name.to_string()
        } else {
            format!("{name}_{count}")
        };
        *count += 1;
        unified
    }
}
