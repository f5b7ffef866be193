//! Immutable per-run binning context

use crate::bin_manager::BinManager;
use crate::bins::VariableContext;
use crate::config::CollectorConfig;
use crate::expr::CompiledExpression;
use crate::grid::PlanetaryGrid;
use crate::period::{DataPeriod, TimeFilterMethod};
use crate::region::Polygon;

/// Everything a binning run needs to know, resolved and validated.
/// Built by [`BinningConfig::create_binning_context`](crate::config::BinningConfig::create_binning_context)
/// and shared read-only between workers.
#[derive(Debug, Clone)]
pub struct BinningContext {
    pub grid: PlanetaryGrid,
    pub variable_context: VariableContext,
    pub bin_manager: BinManager,
    pub mask: Option<CompiledExpression>,
    pub data_period: Option<DataPeriod>,
    pub time_filter_method: TimeFilterMethod,
    pub region: Option<Polygon>,
    pub super_sampling: usize,
    /// Metres; `None` disables the check
    pub max_distance_on_earth: Option<f64>,
    pub collector: CollectorConfig,
    pub temporal_batch_size: usize,
}

impl BinningContext {
    /// Period used to test individual observations, if time filtering is on
    #[must_use]
    pub fn observation_period(&self) -> Option<&DataPeriod> {
        match self.time_filter_method {
            TimeFilterMethod::None => None,
            _ => self.data_period.as_ref(),
        }
    }

    /// Feature names of emitted temporal bins
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        self.bin_manager.result_feature_names()
    }
}
