//! Observations, spatial bins and temporal bins

use chrono::{DateTime, Utc};

/// Ordered list of the variable names a run reads from every product.
/// Observation values are indexed by position in this list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableContext {
    names: Vec<String>,
}

impl VariableContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from names, dropping duplicates but keeping first-seen order
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ctx = Self::new();
        for name in names {
            ctx.add(name);
        }
        ctx
    }

    /// Add a variable, returning its index
    pub fn add(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        if let Some(index) = self.index_of(&name) {
            return index;
        }
        self.names.push(name);
        self.names.len() - 1
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One contributing sample, possibly a supersampled sub-pixel
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub lat: f64,
    pub lon: f64,
    pub time: Option<DateTime<Utc>>,
    /// Variable values, indexed by the run's [`VariableContext`]
    pub values: &'a [f64],
    pub weight: f64,
}

impl<'a> Observation<'a> {
    /// Unit-weight observation without a time stamp
    #[must_use]
    pub fn new(lat: f64, lon: f64, values: &'a [f64]) -> Self {
        Self {
            lat,
            lon,
            time: None,
            values,
            weight: 1.0,
        }
    }

    #[must_use]
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Partial aggregate of one product's observations in one bin.
///
/// `state` is the concatenation of every aggregator's accumulator state, laid
/// out by the run's `BinManager`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialBin {
    pub index: u64,
    pub num_obs: u32,
    /// Products contributing to this partial bin
    pub num_passes: u32,
    pub state: Vec<f64>,
}

impl SpatialBin {
    #[must_use]
    pub fn new(index: u64, state: Vec<f64>) -> Self {
        Self {
            index,
            num_obs: 0,
            num_passes: 1,
            state,
        }
    }
}

/// Fully merged aggregate of one bin over the whole binning period
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalBin {
    pub index: u64,
    pub num_obs: u32,
    /// Number of products that contributed to this bin
    pub num_passes: u32,
    pub state: Vec<f64>,
    /// Output features; empty until computed
    pub features: Vec<f64>,
}

impl TemporalBin {
    #[must_use]
    pub fn new(index: u64, state: Vec<f64>) -> Self {
        Self {
            index,
            num_obs: 0,
            num_passes: 0,
            state,
            features: Vec::new(),
        }
    }
}
