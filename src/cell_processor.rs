//! Post-processing of completed bin features
//!
//! A cell processor maps the completed feature vector of a temporal bin to a
//! new feature vector. Processors are configured as a tagged list and compiled
//! once against the feature names they receive, so per-bin work is plain index
//! lookups and expression evaluation.

use crate::errors::{BinningError, Result};
use crate::expr::CompiledExpression;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn default_true() -> bool {
    true
}

/// Cell processor definition as found in a binning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CellProcessorConfig {
    /// Keep (and optionally rename) features. Entries are `"name"` or `"new=old"`.
    Selection { features: Vec<String> },
    /// Append a feature derived from the incoming ones
    Expression {
        target: String,
        expression: String,
        #[serde(default = "default_true")]
        keep_inputs: bool,
    },
    /// Apply processors one after another
    Chain { processors: Vec<CellProcessorConfig> },
}

#[derive(Debug, Clone)]
enum Step {
    Select { sources: Vec<usize> },
    Derive { expression: CompiledExpression, keep_inputs: bool },
}

impl Step {
    fn apply(&self, features: &[f64]) -> Vec<f64> {
        match self {
            Self::Select { sources } => sources.iter().map(|&i| features[i]).collect(),
            Self::Derive {
                expression,
                keep_inputs,
            } => {
                let value = expression.evaluate(features);
                if *keep_inputs {
                    let mut out = Vec::with_capacity(features.len() + 1);
                    out.extend_from_slice(features);
                    out.push(value);
                    out
                } else {
                    vec![value]
                }
            }
        }
    }
}

/// Compiled sequence of cell processors
#[derive(Debug, Clone)]
pub struct CellProcessorChain {
    steps: Vec<Step>,
    output_names: Vec<String>,
}

impl CellProcessorChain {
    /// Compile `config` for features named `input_names`
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown or duplicate feature names,
    /// and an expression error for invalid expressions.
    pub fn new(config: &CellProcessorConfig, input_names: &[String]) -> Result<Self> {
        let mut chain = Self {
            steps: Vec::new(),
            output_names: input_names.to_vec(),
        };
        chain.push(config)?;
        Ok(chain)
    }

    fn push(&mut self, config: &CellProcessorConfig) -> Result<()> {
        match config {
            CellProcessorConfig::Chain { processors } => {
                for processor in processors {
                    self.push(processor)?;
                }
            }
            CellProcessorConfig::Selection { features } => {
                let mut sources = Vec::with_capacity(features.len());
                let mut names = Vec::with_capacity(features.len());
                for entry in features {
                    let (new_name, old_name) = match entry.split_once('=') {
                        Some((new_name, old_name)) => (new_name.trim(), old_name.trim()),
                        None => (entry.trim(), entry.trim()),
                    };
                    let source = self
                        .output_names
                        .iter()
                        .position(|n| n == old_name)
                        .ok_or_else(|| {
                            BinningError::config(format!(
                                "selection refers to unknown feature '{old_name}'"
                            ))
                        })?;
                    sources.push(source);
                    names.push(new_name.to_string());
                }
                check_unique(&names)?;
                self.steps.push(Step::Select { sources });
                self.output_names = names;
            }
            CellProcessorConfig::Expression {
                target,
                expression,
                keep_inputs,
            } => {
                let compiled = CompiledExpression::compile(expression, &self.output_names)?;
                let mut names = if *keep_inputs {
                    self.output_names.clone()
                } else {
                    Vec::new()
                };
                names.push(target.clone());
                check_unique(&names)?;
                self.steps.push(Step::Derive {
                    expression: compiled,
                    keep_inputs: *keep_inputs,
                });
                self.output_names = names;
            }
        }
        Ok(())
    }

    /// Feature names produced by the chain
    #[must_use]
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    #[must_use]
    pub fn process(&self, features: &[f64]) -> Vec<f64> {
        let mut current = features.to_vec();
        for step in &self.steps {
            current = step.apply(&current);
        }
        current
    }
}

fn check_unique(names: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(BinningError::config(format!("duplicate feature name '{name}'")));
        }
    }
    Ok(())
}
