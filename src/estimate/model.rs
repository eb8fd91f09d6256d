use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::EstimateError;
use crate::error::{DashboardError, DashboardResult};

/// A pre-fitted function from the fixed-order feature vector to a scalar.
pub trait Predictor: Send + Sync {
    /// Number of features the predictor was fitted on.
    fn feature_count(&self) -> usize;

    fn predict(&self, features: &[f64]) -> Result<f64, EstimateError>;
}

/// Ordinary least-squares model: `intercept + Σ coefficients[i] · x[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Self {
        LinearModel {
            intercept,
            coefficients,
        }
    }

    /// Read a JSON artifact. Missing, unparsable or non-finite models are
    /// rejected here so nothing broken reaches the estimator.
    pub fn from_file(path: &Path) -> DashboardResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DashboardError::ModelMissing {
                path: path.to_path_buf(),
            },
            _ => DashboardError::Io(e),
        })?;
        let model: LinearModel =
            serde_json::from_str(&text).map_err(|e| DashboardError::ModelCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if !model.intercept.is_finite() || model.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(DashboardError::ModelCorrupt {
                path: path.to_path_buf(),
                reason: "non-finite parameter".to_string(),
            });
        }
        Ok(model)
    }

    pub fn to_file(&self, path: &Path) -> DashboardResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

impl Predictor for LinearModel {
    fn feature_count(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, features: &[f64]) -> Result<f64, EstimateError> {
        if features.len() != self.coefficients.len() {
            return Err(EstimateError::FeatureMismatch {
                expected: self.coefficients.len(),
                actual: features.len(),
            });
        }
        let y = self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, x)| c * x)
                .sum::<f64>();
        Ok(y)
    }
}

// ---------------------------------------------------------------------------
// Model identity
// ---------------------------------------------------------------------------

/// Resource a model predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Cpu,
    Disk,
    Memory,
    Network,
}

impl Section {
    pub fn title(self) -> &'static str {
        match self {
            Section::Cpu => "CPU",
            Section::Disk => "Disk",
            Section::Memory => "Memory",
            Section::Network => "Network",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Section::Cpu => "%",
            Section::Disk => "MB",
            Section::Memory => "MiB",
            Section::Network => "kilobit/s",
        }
    }

    /// Metric part of the artifact name.
    fn artifact_metric(self) -> &'static str {
        match self {
            Section::Cpu => "nd_cg_cpu_visibletotal_value",
            Section::Disk => "du_disk_usage_value",
            Section::Memory => "nd_cg_mem_usage_visibletotal_value",
            Section::Network => "nd_cg_net_eth0_visibletotal_value",
        }
    }
}

/// Application group an estimate is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    Distributor,
    Ingester,
    Prometheus,
    Minio,
}

impl Target {
    pub fn label(self) -> &'static str {
        match self {
            Target::Distributor => "Distributor",
            Target::Ingester => "Ingester",
            Target::Prometheus => "Prometheus",
            Target::Minio => "Minio",
        }
    }

    fn artifact_group(self) -> &'static str {
        match self {
            Target::Distributor => "cortex_distributor",
            Target::Ingester => "cortex_ingester",
            Target::Prometheus => "prometheus_server",
            Target::Minio => "minio",
        }
    }
}

/// Identifies one trained model: what it predicts, and for whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelKey {
    pub section: Section,
    pub target: Target,
}

impl ModelKey {
    pub const fn new(section: Section, target: Target) -> Self {
        ModelKey { section, target }
    }

    /// File stem of the artifact, e.g.
    /// `linear_regression_nd_cg_cpu_visibletotal_value_cortex_distributor`.
    pub fn artifact_name(self) -> String {
        format!(
            "linear_regression_{}_{}",
            self.section.artifact_metric(),
            self.target.artifact_group()
        )
    }

    pub fn artifact_path(self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", self.artifact_name()))
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.artifact_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_model_is_a_dot_product() {
        let m = LinearModel::new(1.0, vec![2.0, 0.5, -1.0]);
        assert_eq!(m.predict(&[1.0, 4.0, 3.0]).unwrap(), 1.0 + 2.0 + 2.0 - 3.0);
    }

    #[test]
    fn wrong_dimensionality_is_rejected() {
        let m = LinearModel::new(0.0, vec![1.0; 9]);
        let err = m.predict(&[1.0; 8]).unwrap_err();
        assert_eq!(err, EstimateError::FeatureMismatch { expected: 9, actual: 8 });
    }

    #[test]
    fn artifact_names_follow_metric_and_group() {
        let key = ModelKey::new(Section::Memory, Target::Prometheus);
        assert_eq!(
            key.artifact_name(),
            "linear_regression_nd_cg_mem_usage_visibletotal_value_prometheus_server"
        );
    }

    #[test]
    fn artifacts_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        let m = LinearModel::new(3.5, vec![0.25; 9]);
        m.to_file(&path).unwrap();
        assert_eq!(LinearModel::from_file(&path).unwrap(), m);
    }

    #[test]
    fn missing_and_corrupt_artifacts_are_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        let missing = LinearModel::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, DashboardError::ModelMissing { .. }));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ \"intercept\": 1.0 }").unwrap();
        let corrupt = LinearModel::from_file(&path).unwrap_err();
        assert!(matches!(corrupt, DashboardError::ModelCorrupt { .. }));
    }
}
