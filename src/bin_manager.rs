//! Per-run aggregator layout
//!
//! The [`BinManager`] owns the run's aggregators and knows where each one's
//! state lives inside a bin's flat state vector. All bin-level operations of
//! the spatial and temporal binners go through it.

use crate::aggregators::{Aggregator, AggregatorConfig, NameUnifier};
use crate::bins::{Observation, SpatialBin, TemporalBin, VariableContext};
use crate::cell_processor::{CellProcessorChain, CellProcessorConfig};
use crate::errors::{BinningError, Result};
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct BinManager {
    aggregators: Vec<Aggregator>,
    state_offsets: Vec<usize>,
    output_offsets: Vec<usize>,
    state_feature_names: Vec<String>,
    output_feature_names: Vec<String>,
    post_processor: Option<CellProcessorChain>,
}

impl BinManager {
    /// Resolve aggregator configurations and an optional post-processor
    ///
    /// # Errors
    ///
    /// Fails when no aggregator is given, when an aggregator refers to a
    /// variable missing from `ctx`, or when the post-processor is invalid.
    pub fn new(
        ctx: &VariableContext,
        configs: &[AggregatorConfig],
        post_processor: Option<&CellProcessorConfig>,
    ) -> Result<Self> {
        if configs.is_empty() {
            return Err(BinningError::config("at least one aggregator must be configured"));
        }
        let aggregators = configs
            .iter()
            .map(|c| Aggregator::from_config(c, ctx))
            .collect::<Result<Vec<_>>>()?;

        let mut state_offsets = Vec::with_capacity(aggregators.len() + 1);
        let mut output_offsets = Vec::with_capacity(aggregators.len() + 1);
        let (mut state_len, mut output_len) = (0, 0);
        let mut state_names = NameUnifier::new();
        let mut output_names = NameUnifier::new();
        let mut state_feature_names = Vec::new();
        let mut output_feature_names = Vec::new();
        for aggregator in &aggregators {
            state_offsets.push(state_len);
            output_offsets.push(output_len);
            state_len += aggregator.state_len();
            let outputs = aggregator.output_feature_names();
            output_len += outputs.len();
            state_feature_names.extend(
                aggregator
                    .state_feature_names()
                    .iter()
                    .map(|n| state_names.unify_name(n)),
            );
            output_feature_names.extend(outputs.iter().map(|n| output_names.unify_name(n)));
        }
        state_offsets.push(state_len);
        output_offsets.push(output_len);

        let post_processor = post_processor
            .map(|config| CellProcessorChain::new(config, &output_feature_names))
            .transpose()?;

        Ok(Self {
            aggregators,
            state_offsets,
            output_offsets,
            state_feature_names,
            output_feature_names,
            post_processor,
        })
    }

    #[must_use]
    pub fn aggregators(&self) -> &[Aggregator] {
        &self.aggregators
    }

    #[must_use]
    pub fn state_len(&self) -> usize {
        self.state_offsets.last().copied().unwrap_or(0)
    }

    /// Names of the concatenated accumulator state entries
    #[must_use]
    pub fn state_feature_names(&self) -> &[String] {
        &self.state_feature_names
    }

    /// Names of the completed aggregator outputs, before post-processing
    #[must_use]
    pub fn output_feature_names(&self) -> &[String] {
        &self.output_feature_names
    }

    /// Names of the features emitted for every temporal bin
    #[must_use]
    pub fn result_feature_names(&self) -> &[String] {
        self.post_processor
            .as_ref()
            .map_or(self.output_feature_names.as_slice(), CellProcessorChain::output_names)
    }

    #[must_use]
    pub fn has_post_processor(&self) -> bool {
        self.post_processor.is_some()
    }

    fn state_range(&self, i: usize) -> Range<usize> {
        self.state_offsets[i]..self.state_offsets[i + 1]
    }

    fn output_range(&self, i: usize) -> Range<usize> {
        self.output_offsets[i]..self.output_offsets[i + 1]
    }

    fn empty_state(&self) -> Vec<f64> {
        let mut state = vec![0.0; self.state_len()];
        for (i, aggregator) in self.aggregators.iter().enumerate() {
            aggregator.init(&mut state[self.state_range(i)]);
        }
        state
    }

    fn merge_state(&self, state: &mut [f64], other: &[f64]) {
        for (i, aggregator) in self.aggregators.iter().enumerate() {
            let range = self.state_range(i);
            aggregator.merge(&mut state[range.clone()], &other[range]);
        }
    }

    #[must_use]
    pub fn create_spatial_bin(&self, index: u64) -> SpatialBin {
        SpatialBin::new(index, self.empty_state())
    }

    pub fn aggregate_spatial_bin(&self, obs: &Observation<'_>, bin: &mut SpatialBin) {
        for (i, aggregator) in self.aggregators.iter().enumerate() {
            aggregator.accumulate(&mut bin.state[self.state_range(i)], obs);
        }
        bin.num_obs += 1;
    }

    /// Fold the partial state of `other` into `bin`; both describe the same cell
    pub fn merge_spatial_bin(&self, bin: &mut SpatialBin, other: &SpatialBin) {
        self.merge_state(&mut bin.state, &other.state);
        bin.num_obs += other.num_obs;
        bin.num_passes += other.num_passes;
    }

    #[must_use]
    pub fn create_temporal_bin(&self, index: u64) -> TemporalBin {
        TemporalBin::new(index, self.empty_state())
    }

    pub fn aggregate_temporal_bin(&self, spatial: &SpatialBin, temporal: &mut TemporalBin) {
        self.merge_state(&mut temporal.state, &spatial.state);
        temporal.num_obs += spatial.num_obs;
        temporal.num_passes += spatial.num_passes;
    }

    /// Complete every aggregator's state into output features
    #[must_use]
    pub fn compute_output(&self, temporal: &TemporalBin) -> Vec<f64> {
        let mut output = vec![f64::NAN; self.output_offsets.last().copied().unwrap_or(0)];
        for (i, aggregator) in self.aggregators.iter().enumerate() {
            aggregator.complete(&temporal.state[self.state_range(i)], &mut output[self.output_range(i)]);
        }
        output
    }

    /// Compute output features and apply the post-processor, storing the
    /// result in `temporal.features`
    pub fn process(&self, temporal: &mut TemporalBin) {
        let output = self.compute_output(temporal);
        temporal.features = match &self.post_processor {
            Some(post) => post.process(&output),
            None => output,
        };
    }
}
