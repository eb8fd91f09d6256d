use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::chart::NetworkView;
use crate::data::filter::Constraints;
use crate::data::model::{cast_dimension, DimValue, Dimension};
use crate::error::{DashboardError, DashboardResult};
use crate::estimate::EstimationInputs;

/// Environment variable naming the config file when no CLI argument is given.
pub const CONFIG_ENV: &str = "FOOTPRINT_DASH_CONFIG";

/// Everything the dashboard needs to build its context at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Metrics database or exported snapshot.
    pub source: PathBuf,
    /// Directory holding the regression model artifacts.
    pub models_dir: PathBuf,
    pub query: QueryConfig,
    pub defaults: DefaultSelections,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("metrics.db"),
            models_dir: PathBuf::from("models"),
            query: QueryConfig::default(),
            defaults: DefaultSelections::default(),
        }
    }
}

/// Parameters bound into the aggregation query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Application groups allowed into the result set.
    pub groups: Vec<String>,
    /// Remote-write batch size the measurements were taken with; runs where it
    /// was unset are kept as well.
    pub max_samples_per_send: i64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            groups: [
                "cortex compactor",
                "cortex distributor",
                "cortex ingester",
                "cortex nginx",
                "minio",
                "prometheus server",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_samples_per_send: 100,
        }
    }
}

/// Initial state of the controls when the window opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultSelections {
    pub category: Dimension,
    pub network: NetworkView,
    pub filters: BTreeMap<Dimension, Vec<DimValue>>,
    pub inputs: EstimationInputs,
}

impl Default for DefaultSelections {
    fn default() -> Self {
        let filters = [
            (Dimension::MetricCount, vec![DimValue::Integer(30000)]),
            (Dimension::Labels, vec![DimValue::Integer(20)]),
            (Dimension::Case, vec![DimValue::from("quasi_real")]),
            (Dimension::Nginx, vec![DimValue::Integer(1)]),
            (Dimension::Distributor, vec![DimValue::Integer(1)]),
            (Dimension::Ingester, vec![DimValue::Integer(2)]),
            (Dimension::CompactorBlocksRanges, vec![]),
            (Dimension::RetentionPeriod, vec![DimValue::Integer(21600)]),
            (Dimension::WalCompression, vec![DimValue::Bool(false)]),
            (Dimension::BlockRangesPeriod, vec![DimValue::Integer(7200)]),
        ]
        .into_iter()
        .collect();

        Self {
            category: Dimension::WalCompression,
            network: NetworkView::Total,
            filters,
            inputs: EstimationInputs {
                prometheus_wal_compression: Some(0.0),
                metric_count: Some(300_000.0),
                labels: Some(20.0),
                nginx: Some(1.0),
                distributor: Some(1.0),
                ingester: Some(2.0),
                block_ranges_period: Some(7200.0),
                retention_period: Some(21600.0),
                tsdb_wal_compression: None,
            },
        }
    }
}

impl DefaultSelections {
    /// Configured filters in the same canonical form as the dataset's cells,
    /// so `20.0` selects labels stored as `20` and `0` selects `False`.
    pub fn constraints(&self) -> DashboardResult<Constraints> {
        self.filters
            .iter()
            .map(|(dim, values)| {
                let accepted = values
                    .iter()
                    .map(|v| {
                        cast_dimension(*dim, v).ok_or_else(|| DashboardError::InvalidFilter {
                            column: dim.column().to_string(),
                            value: v.to_string(),
                        })
                    })
                    .collect::<DashboardResult<BTreeSet<_>>>()?;
                Ok((*dim, accepted))
            })
            .collect()
    }
}

impl DashboardConfig {
    /// Read a JSON config file; absent fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config
            .defaults
            .constraints()
            .with_context(|| format!("checking filters in {}", path.display()))?;
        Ok(config)
    }

    /// Resolve the config from an explicit path, then `FOOTPRINT_DASH_CONFIG`,
    /// then the built-in defaults.
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match cli_path.map(Path::to_path_buf).or(env_path) {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                log::info!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: DashboardConfig = serde_json::from_str(
            r#"{
                "source": "snapshot.parquet",
                "query": { "max_samples_per_send": 500 },
                "defaults": { "category": "cortex_number_of_ingester_value" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.source, PathBuf::from("snapshot.parquet"));
        assert_eq!(config.models_dir, PathBuf::from("models"));
        assert_eq!(config.query.max_samples_per_send, 500);
        assert_eq!(config.query.groups.len(), 6);
        assert_eq!(config.defaults.category, Dimension::Ingester);
        assert_eq!(config.defaults.network, NetworkView::Total);
        assert_eq!(config.defaults.inputs.tsdb_wal_compression, None);
    }

    #[test]
    fn filters_parse_by_column_name() {
        let config: DashboardConfig = serde_json::from_str(
            r#"{ "defaults": { "filters": {
                "application_case_value": ["quasi_real", "real"],
                "cortex_blocks_storage_tsdb_wal_compression_value": [true]
            } } }"#,
        )
        .unwrap();
        let constraints = config.defaults.constraints().unwrap();
        assert_eq!(constraints[&Dimension::Case].len(), 2);
        assert!(constraints[&Dimension::WalCompression].contains(&DimValue::Bool(true)));
    }

    #[test]
    fn filter_values_take_the_dataset_form() {
        let config: DashboardConfig = serde_json::from_str(
            r#"{ "defaults": { "filters": {
                "application_labels_value": [20.0],
                "cortex_number_of_ingester_value": [2.0, 3],
                "cortex_blocks_storage_tsdb_wal_compression_value": [0, 1]
            } } }"#,
        )
        .unwrap();
        let constraints = config.defaults.constraints().unwrap();
        assert_eq!(
            constraints[&Dimension::Labels].iter().cloned().collect::<Vec<_>>(),
            vec![DimValue::Integer(20)]
        );
        assert_eq!(
            constraints[&Dimension::Ingester].iter().cloned().collect::<Vec<_>>(),
            vec![DimValue::Integer(2), DimValue::Integer(3)]
        );
        assert_eq!(
            constraints[&Dimension::WalCompression].iter().cloned().collect::<Vec<_>>(),
            vec![DimValue::Bool(false), DimValue::Bool(true)]
        );

        let row = crate::data::model::MetricsDataset::prepare(vec![
            crate::data::model::Observation::new("minio")
                .with_dim(Dimension::Labels, DimValue::Float(20.0))
                .with_dim(Dimension::Ingester, 2i64)
                .with_dim(Dimension::WalCompression, 0i64),
        ])
        .unwrap();
        let spec = crate::data::filter::FilterSpec {
            active: Dimension::Case,
            constraints,
        };
        assert_eq!(crate::data::filter::filter(&row, &spec).len(), 1);
    }

    #[test]
    fn filter_values_foreign_to_their_column_fail() {
        let config: DashboardConfig = serde_json::from_str(
            r#"{ "defaults": { "filters": {
                "cortex_blocks_storage_tsdb_wal_compression_value": [7]
            } } }"#,
        )
        .unwrap();
        assert!(matches!(
            config.defaults.constraints(),
            Err(DashboardError::InvalidFilter { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "defaults": { "filters": { "application_labels_value": [2.5] } } }"#)
            .unwrap();
        assert!(DashboardConfig::from_file(&path).is_err());
    }

    #[test]
    fn unknown_dimension_in_config_fails() {
        let result: Result<DashboardConfig, _> =
            serde_json::from_str(r#"{ "defaults": { "category": "application_colour" } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DashboardConfig::from_file(&dir.path().join("nope.json")).is_err());
    }
}
