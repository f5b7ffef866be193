//! Centralized error handling for RuL3Bin
//!
//! Errors fall into three classes that drive how a binning run reacts:
//! configuration errors abort before any product is touched, product-level
//! errors skip the offending product, and resource failures (spill storage,
//! output sink) abort the run.

use thiserror::Error;

/// Main error type for binning operations
#[derive(Error, Debug)]
pub enum BinningError {
    /// Invalid run configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Mask or derived-feature expression could not be parsed or resolved
    #[error("invalid expression '{expression}': {message}")]
    Expression { expression: String, message: String },

    /// Region geometry could not be parsed
    #[error("invalid region geometry: {0}")]
    Region(String),

    /// Product could not be opened or read
    #[error("failed to read product '{product}': {message}")]
    ProductRead { product: String, message: String },

    /// Product is readable but cannot be binned with this configuration
    #[error("product '{product}' is incompatible: {message}")]
    ProductIncompatible { product: String, message: String },

    /// Disk spill storage failure
    #[error("spill storage failure while {context}: {source}")]
    Spill {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// `consume` called after the collector was completed
    #[error("spatial bin collector no longer accepts bins")]
    CollectorClosed,

    /// The external formatter/writer rejected a bin
    #[error("output sink failure: {0}")]
    Sink(String),

    /// The run was cancelled; its partial results are void
    #[error("binning run was cancelled")]
    Cancelled,

    /// Thread pool configuration error
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON configuration or product file errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BinningError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an expression error
    pub fn expression(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Expression {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Create a product read error
    pub fn product_read(product: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProductRead {
            product: product.into(),
            message: message.into(),
        }
    }

    /// Create a product incompatibility error
    pub fn product_incompatible(product: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProductIncompatible {
            product: product.into(),
            message: message.into(),
        }
    }

    /// Create a spill storage error
    pub fn spill(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spill {
            context: context.into(),
            source,
        }
    }

    /// Whether the error only excludes a single product from the run
    #[must_use]
    pub fn is_product_level(&self) -> bool {
        matches!(
            self,
            Self::ProductRead { .. } | Self::ProductIncompatible { .. }
        )
    }
}

/// Result type alias for binning operations
pub type Result<T> = std::result::Result<T, BinningError>;
