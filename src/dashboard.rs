//! The dashboard's process-wide state and the pure functions behind each
//! output group. The UI layer only translates control changes into calls
//! on [`DashboardContext`].

use anyhow::{Context, Result};

use crate::chart::{build_chart, Chart, NetworkView};
use crate::config::DashboardConfig;
use crate::data::filter::{filter, FilterSpec};
use crate::data::loader::load_dataset;
use crate::data::model::{Metric, MetricsDataset};
use crate::estimate::{EstimateError, Estimates, EstimationInputs, Estimator};

/// Control values feeding the four charts.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRequest {
    pub filters: FilterSpec,
    pub network: NetworkView,
}

/// One chart per tab.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPanels {
    pub cpu: Chart,
    pub disk: Chart,
    pub memory: Chart,
    pub network: Chart,
    /// Rows that passed the filters.
    pub matching_rows: usize,
}

impl Default for ChartPanels {
    fn default() -> Self {
        ChartPanels {
            cpu: Chart::NoData,
            disk: Chart::NoData,
            memory: Chart::NoData,
            network: Chart::NoData,
            matching_rows: 0,
        }
    }
}

/// Loaded dataset, its domains and the trained models. Built once, never
/// mutated afterwards.
pub struct DashboardContext {
    dataset: MetricsDataset,
    estimator: Estimator,
}

impl DashboardContext {
    pub fn new(dataset: MetricsDataset, estimator: Estimator) -> Self {
        DashboardContext { dataset, estimator }
    }

    /// Query the data source and load every model artifact.
    pub fn load(config: &DashboardConfig) -> Result<Self> {
        let dataset = load_dataset(&config.source, &config.query)
            .with_context(|| format!("loading data from {}", config.source.display()))?;
        let estimator = Estimator::load_dir(&config.models_dir)
            .with_context(|| format!("loading models from {}", config.models_dir.display()))?;
        Ok(Self::new(dataset, estimator))
    }

    pub fn dataset(&self) -> &MetricsDataset {
        &self.dataset
    }

    /// Filter once, then aggregate the subset for each chart.
    pub fn refresh_charts(&self, request: &ChartRequest) -> ChartPanels {
        let subset = filter(&self.dataset, &request.filters);
        let category = request.filters.active;
        log::debug!(
            "Refreshing charts by {}: {} of {} rows",
            category,
            subset.len(),
            self.dataset.len()
        );
        ChartPanels {
            cpu: build_chart(&subset, category, Metric::Cpu),
            disk: build_chart(&subset, category, Metric::DiskUsage),
            memory: build_chart(&subset, category, Metric::Memory),
            network: build_chart(&subset, category, request.network.metric()),
            matching_rows: subset.len(),
        }
    }

    pub fn estimate(&self, inputs: &EstimationInputs) -> Result<Estimates, EstimateError> {
        let result = self.estimator.estimate(inputs);
        if let Err(e) = &result {
            log::error!("Estimation failed: {e}");
        }
        result
    }
}
