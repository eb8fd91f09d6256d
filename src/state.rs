use std::collections::{BTreeMap, BTreeSet};

use footprint_dash::chart::NetworkView;
use footprint_dash::config::DefaultSelections;
use footprint_dash::dashboard::{ChartPanels, ChartRequest, DashboardContext};
use footprint_dash::data::filter::{Constraints, FilterSpec};
use footprint_dash::data::model::{DimValue, Dimension};
use footprint_dash::error::DashboardResult;
use footprint_dash::estimate::{Estimates, EstimationInputs, InputField};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Cpu,
    Disk,
    Memory,
    Network,
    Estimators,
}

impl Tab {
    pub const ALL: [Tab; 5] = [Tab::Cpu, Tab::Disk, Tab::Memory, Tab::Network, Tab::Estimators];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Cpu => "CPU",
            Tab::Disk => "Disk",
            Tab::Memory => "Memory",
            Tab::Network => "Network",
            Tab::Estimators => "Linear regression models",
        }
    }
}

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Per-dimension filter selections.
    pub filters: Constraints,

    /// Dimension drawn on the charts' category axis.
    pub category: Dimension,

    /// Measurement shown on the network tab.
    pub network: NetworkView,

    /// Charts for the current selections (cached).
    pub charts: ChartPanels,

    /// Raw text of each estimator input.
    pub input_text: BTreeMap<InputField, String>,

    /// Parsed estimator inputs.
    pub inputs: EstimationInputs,

    /// Estimates for the current inputs, or the error that stopped them.
    pub estimates: Result<Estimates, String>,

    pub tab: Tab,
}

impl AppState {
    /// Initial state from the configured defaults, with outputs computed.
    pub fn new(ctx: &DashboardContext, defaults: &DefaultSelections) -> DashboardResult<Self> {
        let input_text = InputField::ALL
            .into_iter()
            .map(|f| {
                let text = defaults.inputs.get(f).map(|v| v.to_string()).unwrap_or_default();
                (f, text)
            })
            .collect();

        let mut state = Self {
            filters: defaults.constraints()?,
            category: defaults.category,
            network: defaults.network,
            charts: ChartPanels::default(),
            input_text,
            inputs: defaults.inputs.clone(),
            estimates: Ok(Estimates::waiting()),
            tab: Tab::Cpu,
        };
        state.refresh_charts(ctx);
        state.refresh_estimates(ctx);
        Ok(state)
    }

    pub fn chart_request(&self) -> ChartRequest {
        ChartRequest {
            filters: FilterSpec {
                active: self.category,
                constraints: self.filters.clone(),
            },
            network: self.network,
        }
    }

    /// Recompute the charts after a filter, axis or network view change.
    pub fn refresh_charts(&mut self, ctx: &DashboardContext) {
        self.charts = ctx.refresh_charts(&self.chart_request());
    }

    /// Recompute the estimates after an input change.
    pub fn refresh_estimates(&mut self, ctx: &DashboardContext) {
        self.estimates = ctx.estimate(&self.inputs).map_err(|e| e.to_string());
    }

    /// Re-parse one input's text.
    pub fn set_input_text(&mut self, ctx: &DashboardContext, field: InputField, text: String) {
        self.inputs.set(field, field.parse(&text));
        self.input_text.insert(field, text);
        self.refresh_estimates(ctx);
    }

    pub fn set_category(&mut self, ctx: &DashboardContext, dim: Dimension) {
        self.category = dim;
        self.refresh_charts(ctx);
    }

    pub fn set_network(&mut self, ctx: &DashboardContext, view: NetworkView) {
        self.network = view;
        self.refresh_charts(ctx);
    }

    /// Toggle a single value in a dimension's filter.
    pub fn toggle_filter_value(&mut self, ctx: &DashboardContext, dim: Dimension, value: &DimValue) {
        let selected = self.filters.entry(dim).or_default();
        if !selected.remove(value) {
            selected.insert(value.clone());
        }
        self.refresh_charts(ctx);
    }

    /// Select every observed value of a dimension.
    pub fn select_all(&mut self, ctx: &DashboardContext, dim: Dimension) {
        let all = ctx.dataset().domain(dim).clone();
        self.filters.insert(dim, all);
        self.refresh_charts(ctx);
    }

    /// Clear a dimension's filter, which lets every value through.
    pub fn select_none(&mut self, ctx: &DashboardContext, dim: Dimension) {
        self.filters.insert(dim, BTreeSet::new());
        self.refresh_charts(ctx);
    }
}
