use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DashboardError;

/// Column holding the application group of every observation.
pub const GROUP_COLUMN: &str = "group_name";
/// Axis label for the group column.
pub const GROUP_LABEL: &str = "Application's group";

// ---------------------------------------------------------------------------
// DimValue – a single cell in a configuration column
// ---------------------------------------------------------------------------

/// A dynamically-typed configuration value as it comes out of the database.
/// Using `BTreeMap` / `BTreeSet` downstream so `DimValue` must be `Ord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DimValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

// -- Manual Eq/Ord so we can put DimValue in BTreeSet --
// Integers and floats share one numeric scale; equality follows `cmp`.

impl PartialEq for DimValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DimValue {}

impl PartialOrd for DimValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DimValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use DimValue::*;
        fn rank(v: &DimValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) | Float(_) => 2,
                String(_) => 3,
            }
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            // Equal magnitudes: the integer goes first.
            (Integer(a), Float(b)) => (*a as f64).total_cmp(b).then(Ordering::Less),
            (Float(a), Integer(b)) => a.total_cmp(&(*b as f64)).then(Ordering::Greater),
            (String(a), String(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl fmt::Display for DimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimValue::String(s) => write!(f, "{s}"),
            DimValue::Integer(i) => write!(f, "{i}"),
            DimValue::Float(v) => write!(f, "{v}"),
            DimValue::Bool(true) => write!(f, "True"),
            DimValue::Bool(false) => write!(f, "False"),
            DimValue::Null => write!(f, "<null>"),
        }
    }
}

impl From<&str> for DimValue {
    fn from(s: &str) -> Self {
        DimValue::String(s.to_string())
    }
}

impl From<i64> for DimValue {
    fn from(i: i64) -> Self {
        DimValue::Integer(i)
    }
}

impl From<bool> for DimValue {
    fn from(b: bool) -> Self {
        DimValue::Bool(b)
    }
}

impl DimValue {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DimValue::Float(v) => Some(*v),
            DimValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DimValue::Null)
    }

    /// Integral floats collapse to integers so `20.0` and `20` select the same bars.
    fn to_discrete(&self) -> Option<DimValue> {
        match self {
            DimValue::Null | DimValue::Integer(_) => Some(self.clone()),
            DimValue::Float(v) if v.is_finite() && v.fract() == 0.0 => {
                Some(DimValue::Integer(*v as i64))
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Dimension / Metric – the fixed column vocabulary
// ---------------------------------------------------------------------------

/// A configuration parameter of a measurement run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Dimension {
    Instances,
    Case,
    MetricCount,
    Labels,
    Nginx,
    Distributor,
    Ingester,
    BlockRangesPeriod,
    RetentionPeriod,
    WalCompression,
    CompactorBlocksRanges,
}

impl Dimension {
    pub const ALL: [Dimension; 11] = [
        Dimension::Instances,
        Dimension::Case,
        Dimension::MetricCount,
        Dimension::Labels,
        Dimension::Nginx,
        Dimension::Distributor,
        Dimension::Ingester,
        Dimension::BlockRangesPeriod,
        Dimension::RetentionPeriod,
        Dimension::WalCompression,
        Dimension::CompactorBlocksRanges,
    ];

    /// Dimensions offered as filters and as the chart's category axis,
    /// in the order the controls are laid out.
    pub const FILTERABLE: [Dimension; 10] = [
        Dimension::MetricCount,
        Dimension::Labels,
        Dimension::Case,
        Dimension::Nginx,
        Dimension::Distributor,
        Dimension::Ingester,
        Dimension::CompactorBlocksRanges,
        Dimension::RetentionPeriod,
        Dimension::WalCompression,
        Dimension::BlockRangesPeriod,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Dimension::Instances => "application_instances_value",
            Dimension::Case => "application_case_value",
            Dimension::MetricCount => "application_metric_count_value",
            Dimension::Labels => "application_labels_value",
            Dimension::Nginx => "cortex_number_of_nginx_value",
            Dimension::Distributor => "cortex_number_of_distributor_value",
            Dimension::Ingester => "cortex_number_of_ingester_value",
            Dimension::BlockRangesPeriod => "cortex_blocks_storage_tsdb_block_ranges_period_value",
            Dimension::RetentionPeriod => "cortex_blocks_storage_tsdb_retention_period_value",
            Dimension::WalCompression => "cortex_blocks_storage_tsdb_wal_compression_value",
            Dimension::CompactorBlocksRanges => "cortex_compactor_blocks_ranges_value",
        }
    }

    /// Human-readable axis label.
    pub fn label(self) -> &'static str {
        match self {
            Dimension::Instances => "Number of applications",
            Dimension::Case => "Type of metrics",
            Dimension::MetricCount => "Number of time series",
            Dimension::Labels => "Number of labels",
            Dimension::Nginx => "Number of Nginx",
            Dimension::Distributor => "Number of Distributors",
            Dimension::Ingester => "Number of Ingesters",
            Dimension::BlockRangesPeriod => "TSDB Block Ranges Period",
            Dimension::RetentionPeriod => "TSDB Retention Period",
            Dimension::WalCompression => "TSDB WAL compression",
            Dimension::CompactorBlocksRanges => "TSDB Compactor Block",
        }
    }

    pub fn from_column(name: &str) -> Result<Self, DashboardError> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.column() == name)
            .ok_or_else(|| DashboardError::UnknownColumn(name.to_string()))
    }

    pub fn is_filterable(self) -> bool {
        self != Dimension::Instances
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl TryFrom<String> for Dimension {
    type Error = DashboardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Dimension::from_column(&value)
    }
}

impl From<Dimension> for String {
    fn from(d: Dimension) -> Self {
        d.column().to_string()
    }
}

/// A resource-usage measurement averaged over the samples of one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    DiskUsage,
    Cpu,
    Memory,
    NetworkReceived,
    NetworkSent,
    NetworkTotal,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::DiskUsage,
        Metric::Cpu,
        Metric::Memory,
        Metric::NetworkReceived,
        Metric::NetworkSent,
        Metric::NetworkTotal,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Metric::DiskUsage => "du_disk_usage_value",
            Metric::Cpu => "nd_cg_cpu_visibletotal_value",
            Metric::Memory => "nd_cg_mem_visibletotal_value",
            Metric::NetworkReceived => "nd_cg_net_eth0_received_value",
            Metric::NetworkSent => "nd_cg_net_eth0_sent_value",
            Metric::NetworkTotal => "nd_cg_net_eth0_visibletotal_value",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::DiskUsage => "Disk Usage (MB)",
            Metric::Cpu => "CPU (%)",
            Metric::Memory => "Memory (MiB)",
            Metric::NetworkReceived => "Network - Received (kilobit/s)",
            Metric::NetworkSent => "Network - Sent (kilobit/s)",
            Metric::NetworkTotal => "Network - Total (kilobit/s)",
        }
    }

    pub fn from_column(name: &str) -> Result<Self, DashboardError> {
        Metric::ALL
            .into_iter()
            .find(|m| m.column() == name)
            .ok_or_else(|| DashboardError::UnknownColumn(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Observation – one row of the aggregated result set
// ---------------------------------------------------------------------------

/// Mean resource usage of one application group under one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub group: String,
    /// Configuration columns: dimension → value.
    pub config: BTreeMap<Dimension, DimValue>,
    /// Metric columns; `None` where the database average was NULL.
    pub metrics: BTreeMap<Metric, Option<f64>>,
}

impl Observation {
    pub fn new(group: impl Into<String>) -> Self {
        Observation {
            group: group.into(),
            config: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_dim(mut self, dim: Dimension, value: impl Into<DimValue>) -> Self {
        self.config.insert(dim, value.into());
        self
    }

    pub fn with_metric(mut self, metric: Metric, value: Option<f64>) -> Self {
        self.metrics.insert(metric, value);
        self
    }

    /// Value of a configuration column, `Null` when the column is absent.
    pub fn dim(&self, dim: Dimension) -> &DimValue {
        static NULL: DimValue = DimValue::Null;
        self.config.get(&dim).unwrap_or(&NULL)
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).copied().flatten()
    }
}

/// Assembles an [`Observation`] from `(column, value)` cells of a result row.
#[derive(Debug, Default)]
pub struct RowBuilder {
    group: Option<String>,
    config: BTreeMap<Dimension, DimValue>,
    metrics: BTreeMap<Metric, Option<f64>>,
}

impl RowBuilder {
    /// Route one cell to its slot. Returns `false` for columns outside the
    /// result-set vocabulary so callers can decide whether to warn.
    pub fn set(&mut self, row: usize, column: &str, value: DimValue) -> Result<bool, DashboardError> {
        if column == GROUP_COLUMN {
            match value {
                DimValue::String(s) => self.group = Some(s),
                other => {
                    return Err(DashboardError::MalformedRow {
                        row,
                        column: column.to_string(),
                        reason: format!("expected text, got {other}"),
                    })
                }
            }
            return Ok(true);
        }
        if let Ok(metric) = Metric::from_column(column) {
            let mean = match value {
                DimValue::Null => None,
                other => Some(other.as_f64().ok_or_else(|| DashboardError::MalformedRow {
                    row,
                    column: column.to_string(),
                    reason: format!("expected a number, got {other}"),
                })?),
            };
            self.metrics.insert(metric, mean);
            return Ok(true);
        }
        if let Ok(dim) = Dimension::from_column(column) {
            self.config.insert(dim, value);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn finish(self, row: usize) -> Result<Observation, DashboardError> {
        let group = self.group.ok_or_else(|| DashboardError::MalformedRow {
            row,
            column: GROUP_COLUMN.to_string(),
            reason: "missing".to_string(),
        })?;
        Ok(Observation {
            group,
            config: self.config,
            metrics: self.metrics,
        })
    }
}

// ---------------------------------------------------------------------------
// MetricsDataset – the prepared, immutable result set
// ---------------------------------------------------------------------------

/// The prepared dataset with pre-computed selection domains.
#[derive(Debug, Clone)]
pub struct MetricsDataset {
    rows: Vec<Observation>,
    domains: BTreeMap<Dimension, BTreeSet<DimValue>>,
}

impl MetricsDataset {
    /// Cast columns to their discrete forms, derive the domains of every
    /// filterable dimension and sort rows by group.
    pub fn prepare(mut rows: Vec<Observation>) -> Result<Self, DashboardError> {
        for (i, row) in rows.iter_mut().enumerate() {
            for (dim, value) in row.config.iter_mut() {
                *value = cast_dimension(*dim, value).ok_or_else(|| DashboardError::MalformedRow {
                    row: i,
                    column: dim.column().to_string(),
                    reason: format!("unexpected value {value}"),
                })?;
            }
        }

        let mut domains: BTreeMap<Dimension, BTreeSet<DimValue>> = Dimension::FILTERABLE
            .into_iter()
            .map(|d| (d, BTreeSet::new()))
            .collect();
        for row in &rows {
            for (dim, values) in domains.iter_mut() {
                let value = row.dim(*dim);
                if !value.is_null() {
                    values.insert(value.clone());
                }
            }
        }

        // Stable, so rows within a group keep their query order.
        rows.sort_by(|a, b| a.group.cmp(&b.group));

        Ok(MetricsDataset { rows, domains })
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    /// Sorted distinct values of a dimension (empty for non-filterable ones).
    pub fn domain(&self, dim: Dimension) -> &BTreeSet<DimValue> {
        static EMPTY: BTreeSet<DimValue> = BTreeSet::new();
        self.domains.get(&dim).unwrap_or(&EMPTY)
    }

    pub fn domains(&self) -> &BTreeMap<Dimension, BTreeSet<DimValue>> {
        &self.domains
    }

    /// Distinct group identifiers in ascending order.
    pub fn groups(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.group.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The canonical form of a value in `dim`'s column, or `None` when the value
/// does not belong there.
pub(crate) fn cast_dimension(dim: Dimension, value: &DimValue) -> Option<DimValue> {
    match dim {
        Dimension::Case => Some(match value {
            DimValue::Null | DimValue::String(_) => value.clone(),
            other => DimValue::String(other.to_string()),
        }),
        Dimension::WalCompression => match value {
            DimValue::Null | DimValue::Bool(_) => Some(value.clone()),
            DimValue::Integer(0) => Some(DimValue::Bool(false)),
            DimValue::Integer(1) => Some(DimValue::Bool(true)),
            DimValue::String(s) if s.eq_ignore_ascii_case("true") => Some(DimValue::Bool(true)),
            DimValue::String(s) if s.eq_ignore_ascii_case("false") => Some(DimValue::Bool(false)),
            _ => None,
        },
        Dimension::Labels | Dimension::MetricCount => value.to_discrete(),
        _ => match value {
            DimValue::Float(v) if v.is_finite() => value.to_discrete().or_else(|| Some(value.clone())),
            DimValue::Null | DimValue::Integer(_) => Some(value.clone()),
            _ => None,
        },
    }
}
