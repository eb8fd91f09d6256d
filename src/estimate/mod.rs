//! Point estimates of resource usage for a planned configuration.
//!
//! CPU, memory and network come from linear regression models fitted on the
//! measurements; disk usage comes from closed-form fits over the number of
//! time series alone.

mod model;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{DashboardError, DashboardResult};

pub use model::{LinearModel, ModelKey, Predictor, Section, Target};

/// Shown in the first slot of every section while an input is unset.
pub const WAITING_TEXT: &str = "Waiting for user input";

/// Length of the feature vector every model is fitted on.
pub const FEATURE_COUNT: usize = 9;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimateError {
    #[error("model expects {expected} features, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("model {model} produced a non-finite estimate")]
    InvalidPrediction { model: ModelKey },

    #[error("no predictor loaded for {0}")]
    MissingPredictor(ModelKey),
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Planned configuration. `None` means the field has not been filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationInputs {
    pub prometheus_wal_compression: Option<f64>,
    pub metric_count: Option<f64>,
    pub labels: Option<f64>,
    pub nginx: Option<f64>,
    pub distributor: Option<f64>,
    pub ingester: Option<f64>,
    pub block_ranges_period: Option<f64>,
    pub retention_period: Option<f64>,
    pub tsdb_wal_compression: Option<f64>,
}

/// One input control of the estimator form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InputField {
    MetricCount,
    Labels,
    PrometheusWalCompression,
    Nginx,
    Distributor,
    Ingester,
    RetentionPeriod,
    TsdbWalCompression,
    BlockRangesPeriod,
}

impl InputField {
    /// Form order.
    pub const ALL: [InputField; 9] = [
        InputField::MetricCount,
        InputField::Labels,
        InputField::PrometheusWalCompression,
        InputField::Nginx,
        InputField::Distributor,
        InputField::Ingester,
        InputField::RetentionPeriod,
        InputField::TsdbWalCompression,
        InputField::BlockRangesPeriod,
    ];

    pub fn label(self) -> &'static str {
        match self {
            InputField::MetricCount => "Number of time series",
            InputField::Labels => "Number of labels",
            InputField::PrometheusWalCompression => "Prometheus WAL Compression",
            InputField::Nginx => "Number of Nginx",
            InputField::Distributor => "Number of Distributors",
            InputField::Ingester => "Number of Ingesters",
            InputField::RetentionPeriod => "TSDB Retention Period",
            InputField::TsdbWalCompression => "TSDB WAL compression",
            InputField::BlockRangesPeriod => "TSDB Block Ranges Period",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            InputField::MetricCount => "Range: 3,000-200,000",
            InputField::Labels => "Range: 5-30",
            InputField::PrometheusWalCompression | InputField::TsdbWalCompression => {
                "True - 1 or False - 0"
            }
            InputField::Nginx | InputField::Distributor => "Range: 0-5",
            InputField::Ingester => "Range: 0-10",
            InputField::RetentionPeriod => "Range: 3600-216,000",
            InputField::BlockRangesPeriod => "Range: 1,000-72,000",
        }
    }

    /// Inclusive bounds accepted by the control, if any.
    pub fn bounds(self) -> (f64, Option<f64>) {
        match self {
            InputField::MetricCount => (0.0, None),
            InputField::Labels => (5.0, Some(30.0)),
            InputField::PrometheusWalCompression | InputField::TsdbWalCompression => {
                (0.0, Some(1.0))
            }
            InputField::Nginx | InputField::Distributor => (0.0, Some(5.0)),
            InputField::Ingester => (0.0, Some(10.0)),
            InputField::RetentionPeriod => (3600.0, Some(216_000.0)),
            InputField::BlockRangesPeriod => (1500.0, Some(72_000.0)),
        }
    }

    /// Parse the text of the control. Empty, non-numeric or out-of-range text
    /// leaves the field unset.
    pub fn parse(self, text: &str) -> Option<f64> {
        let v: f64 = text.trim().replace(',', "").parse().ok()?;
        let (min, max) = self.bounds();
        let in_range = v.is_finite() && v >= min && max.map_or(true, |m| v <= m);
        in_range.then_some(v)
    }
}

impl EstimationInputs {
    pub fn get(&self, field: InputField) -> Option<f64> {
        match field {
            InputField::MetricCount => self.metric_count,
            InputField::Labels => self.labels,
            InputField::PrometheusWalCompression => self.prometheus_wal_compression,
            InputField::Nginx => self.nginx,
            InputField::Distributor => self.distributor,
            InputField::Ingester => self.ingester,
            InputField::RetentionPeriod => self.retention_period,
            InputField::TsdbWalCompression => self.tsdb_wal_compression,
            InputField::BlockRangesPeriod => self.block_ranges_period,
        }
    }

    pub fn set(&mut self, field: InputField, value: Option<f64>) {
        let slot = match field {
            InputField::MetricCount => &mut self.metric_count,
            InputField::Labels => &mut self.labels,
            InputField::PrometheusWalCompression => &mut self.prometheus_wal_compression,
            InputField::Nginx => &mut self.nginx,
            InputField::Distributor => &mut self.distributor,
            InputField::Ingester => &mut self.ingester,
            InputField::RetentionPeriod => &mut self.retention_period,
            InputField::TsdbWalCompression => &mut self.tsdb_wal_compression,
            InputField::BlockRangesPeriod => &mut self.block_ranges_period,
        };
        *slot = value;
    }

    /// The model input vector, in the order the models were fitted with.
    /// `None` while any field is unset.
    pub fn feature_vector(&self) -> Option<[f64; FEATURE_COUNT]> {
        Some([
            self.prometheus_wal_compression?,
            self.metric_count?,
            self.labels?,
            self.nginx?,
            self.distributor?,
            self.ingester?,
            self.block_ranges_period?,
            self.retention_period?,
            self.tsdb_wal_compression?,
        ])
    }
}

// ---------------------------------------------------------------------------
// Output slots
// ---------------------------------------------------------------------------

/// Where the number for one output slot comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Source {
    Model(ModelKey),
    /// `slope · time_series + intercept`.
    Linear { slope: f64, intercept: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub section: Section,
    pub target: Target,
    pub source: Source,
}

const fn fitted(section: Section, target: Target) -> Slot {
    Slot {
        section,
        target,
        source: Source::Model(ModelKey::new(section, target)),
    }
}

const fn disk(target: Target, slope: f64, intercept: f64) -> Slot {
    Slot {
        section: Section::Disk,
        target,
        source: Source::Linear { slope, intercept },
    }
}

/// Output slots in display order.
pub static SLOTS: [Slot; 11] = [
    fitted(Section::Cpu, Target::Distributor),
    fitted(Section::Cpu, Target::Ingester),
    fitted(Section::Cpu, Target::Prometheus),
    // Disk figures are cumulative over eight hours of ingestion.
    disk(Target::Ingester, 0.0032, 385.74207),
    disk(Target::Minio, 0.003528, 251.671882),
    disk(Target::Prometheus, 0.00496, -220.372656),
    fitted(Section::Memory, Target::Ingester),
    fitted(Section::Memory, Target::Prometheus),
    fitted(Section::Network, Target::Distributor),
    fitted(Section::Network, Target::Ingester),
    fitted(Section::Network, Target::Prometheus),
];

/// Keys of every model the estimator needs.
pub fn required_models() -> impl Iterator<Item = ModelKey> {
    SLOTS.iter().filter_map(|slot| match slot.source {
        Source::Model(key) => Some(key),
        Source::Linear { .. } => None,
    })
}

/// Text for one output slot; `None` renders as an empty line.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateLine {
    pub section: Section,
    pub target: Target,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Estimates {
    pub lines: Vec<EstimateLine>,
}

impl Estimates {
    /// First slot of each section says "waiting", the rest stay empty.
    pub fn waiting() -> Self {
        let mut seen = Vec::new();
        let lines = SLOTS
            .iter()
            .map(|slot| {
                let first = !seen.contains(&slot.section);
                seen.push(slot.section);
                EstimateLine {
                    section: slot.section,
                    target: slot.target,
                    text: first.then(|| WAITING_TEXT.to_string()),
                }
            })
            .collect();
        Estimates { lines }
    }

    pub fn texts(&self) -> Vec<Option<&str>> {
        self.lines.iter().map(|l| l.text.as_deref()).collect()
    }

    pub fn section(&self, section: Section) -> impl Iterator<Item = &EstimateLine> {
        self.lines.iter().filter(move |l| l.section == section)
    }
}

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

/// Holds every trained model for the lifetime of the process.
pub struct Estimator {
    predictors: BTreeMap<ModelKey, Box<dyn Predictor>>,
}

impl Estimator {
    /// Build from injected predictors. Every model slot must be covered and
    /// fitted on [`FEATURE_COUNT`] features.
    pub fn new(predictors: BTreeMap<ModelKey, Box<dyn Predictor>>) -> Result<Self, EstimateError> {
        for key in required_models() {
            let predictor = predictors.get(&key).ok_or(EstimateError::MissingPredictor(key))?;
            if predictor.feature_count() != FEATURE_COUNT {
                return Err(EstimateError::FeatureMismatch {
                    expected: FEATURE_COUNT,
                    actual: predictor.feature_count(),
                });
            }
        }
        Ok(Estimator { predictors })
    }

    /// Load every required artifact from `dir`.
    pub fn load_dir(dir: &Path) -> DashboardResult<Self> {
        let mut predictors: BTreeMap<ModelKey, Box<dyn Predictor>> = BTreeMap::new();
        for key in required_models() {
            let path = key.artifact_path(dir);
            let model = LinearModel::from_file(&path)?;
            if model.coefficients.len() != FEATURE_COUNT {
                return Err(DashboardError::ModelCorrupt {
                    path,
                    reason: format!(
                        "fitted on {} features, expected {FEATURE_COUNT}",
                        model.coefficients.len()
                    ),
                });
            }
            log::debug!("Loaded model {key}");
            predictors.insert(key, Box::new(model));
        }
        log::info!("Loaded {} regression models from {}", predictors.len(), dir.display());
        Ok(Estimator { predictors })
    }

    /// Evaluate every slot. Unset inputs give [`Estimates::waiting`]; a
    /// predictor rejecting the vector fails the whole computation.
    pub fn estimate(&self, inputs: &EstimationInputs) -> Result<Estimates, EstimateError> {
        let Some(features) = inputs.feature_vector() else {
            return Ok(Estimates::waiting());
        };
        let time_series = features[1];

        let lines = SLOTS
            .iter()
            .map(|slot| {
                let value = match slot.source {
                    Source::Linear { slope, intercept } => slope * time_series + intercept,
                    Source::Model(key) => {
                        let predictor = self
                            .predictors
                            .get(&key)
                            .ok_or(EstimateError::MissingPredictor(key))?;
                        let y = predictor.predict(&features)?;
                        if !y.is_finite() {
                            return Err(EstimateError::InvalidPrediction { model: key });
                        }
                        y
                    }
                };
                Ok(EstimateLine {
                    section: slot.section,
                    target: slot.target,
                    text: Some(format_estimate(slot.target, value, slot.section)),
                })
            })
            .collect::<Result<Vec<_>, EstimateError>>()?;

        Ok(Estimates { lines })
    }
}

/// `"<Target>: <value> <unit>"`, the value rounded half to even.
pub fn format_estimate(target: Target, value: f64, section: Section) -> String {
    format!(
        "{}: {} {}",
        target.label(),
        value.round_ties_even() as i64,
        section.unit()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns a fixed value regardless of input.
    struct Fixed(f64);

    impl Predictor for Fixed {
        fn feature_count(&self) -> usize {
            FEATURE_COUNT
        }

        fn predict(&self, features: &[f64]) -> Result<f64, EstimateError> {
            if features.len() != FEATURE_COUNT {
                return Err(EstimateError::FeatureMismatch {
                    expected: FEATURE_COUNT,
                    actual: features.len(),
                });
            }
            Ok(self.0)
        }
    }

    fn estimator_with(value: f64) -> Estimator {
        let predictors = required_models()
            .map(|k| (k, Box::new(Fixed(value)) as Box<dyn Predictor>))
            .collect();
        Estimator::new(predictors).unwrap()
    }

    fn scenario_inputs() -> EstimationInputs {
        EstimationInputs {
            prometheus_wal_compression: Some(0.0),
            metric_count: Some(300_000.0),
            labels: Some(20.0),
            nginx: Some(1.0),
            distributor: Some(1.0),
            ingester: Some(2.0),
            block_ranges_period: Some(7200.0),
            retention_period: Some(21600.0),
            tsdb_wal_compression: Some(0.0),
        }
    }

    #[test]
    fn any_unset_input_waits() {
        let estimator = estimator_with(1.0);
        for field in InputField::ALL {
            let mut inputs = scenario_inputs();
            inputs.set(field, None);
            let out = estimator.estimate(&inputs).unwrap();
            assert_eq!(
                out.texts(),
                vec![
                    Some(WAITING_TEXT),
                    None,
                    None,
                    Some(WAITING_TEXT),
                    None,
                    None,
                    Some(WAITING_TEXT),
                    None,
                    Some(WAITING_TEXT),
                    None,
                    None,
                ],
                "field {field:?}"
            );
        }
    }

    #[test]
    fn scenario_formats_every_slot() {
        let out = estimator_with(12.4).estimate(&scenario_inputs()).unwrap();
        assert_eq!(
            out.texts(),
            vec![
                Some("Distributor: 12 %"),
                Some("Ingester: 12 %"),
                Some("Prometheus: 12 %"),
                Some("Ingester: 1346 MB"),
                Some("Minio: 1310 MB"),
                Some("Prometheus: 1268 MB"),
                Some("Ingester: 12 MiB"),
                Some("Prometheus: 12 MiB"),
                Some("Distributor: 12 kilobit/s"),
                Some("Ingester: 12 kilobit/s"),
                Some("Prometheus: 12 kilobit/s"),
            ]
        );
    }

    #[test]
    fn disk_depends_only_on_time_series() {
        let base = estimator_with(5.0).estimate(&scenario_inputs()).unwrap();
        let mut other = scenario_inputs();
        other.labels = Some(5.0);
        other.ingester = Some(9.0);
        other.tsdb_wal_compression = Some(1.0);
        let changed = estimator_with(70.0).estimate(&other).unwrap();

        let disk = |e: &Estimates| e.section(Section::Disk).cloned().collect::<Vec<_>>();
        assert_eq!(disk(&base), disk(&changed));
    }

    #[test]
    fn linear_models_see_the_fixed_feature_order() {
        // Picks out the ingester count (position 5).
        let mut coefficients = vec![0.0; FEATURE_COUNT];
        coefficients[5] = 10.0;
        let predictors = required_models()
            .map(|k| {
                let m: Box<dyn Predictor> = Box::new(LinearModel::new(1.0, coefficients.clone()));
                (k, m)
            })
            .collect();
        let out = Estimator::new(predictors).unwrap().estimate(&scenario_inputs()).unwrap();
        assert_eq!(out.lines[0].text.as_deref(), Some("Distributor: 21 %"));
    }

    #[test]
    fn rounding_is_half_to_even() {
        assert_eq!(format_estimate(Target::Minio, 2.5, Section::Disk), "Minio: 2 MB");
        assert_eq!(format_estimate(Target::Minio, 3.5, Section::Disk), "Minio: 4 MB");
        assert_eq!(format_estimate(Target::Minio, -0.4, Section::Disk), "Minio: 0 MB");
    }

    #[test]
    fn non_finite_prediction_is_an_error() {
        let err = estimator_with(f64::NAN).estimate(&scenario_inputs()).unwrap_err();
        assert!(matches!(err, EstimateError::InvalidPrediction { .. }));
    }

    #[test]
    fn construction_requires_every_model() {
        let mut predictors: BTreeMap<ModelKey, Box<dyn Predictor>> = required_models()
            .map(|k| (k, Box::new(Fixed(1.0)) as Box<dyn Predictor>))
            .collect();
        predictors.remove(&ModelKey::new(Section::Network, Target::Ingester));
        assert!(matches!(
            Estimator::new(predictors),
            Err(EstimateError::MissingPredictor(_))
        ));
    }

    #[test]
    fn construction_rejects_mis_sized_models() {
        let predictors = required_models()
            .map(|k| {
                let m: Box<dyn Predictor> = Box::new(LinearModel::new(0.0, vec![1.0; 8]));
                (k, m)
            })
            .collect();
        assert!(matches!(
            Estimator::new(predictors),
            Err(EstimateError::FeatureMismatch { expected: 9, actual: 8 })
        ));
    }

    #[test]
    fn load_dir_reads_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        for key in required_models() {
            LinearModel::new(2.0, vec![0.0; FEATURE_COUNT])
                .to_file(&key.artifact_path(dir.path()))
                .unwrap();
        }
        let out = Estimator::load_dir(dir.path())
            .unwrap()
            .estimate(&scenario_inputs())
            .unwrap();
        assert_eq!(out.lines[7].text.as_deref(), Some("Prometheus: 2 MiB"));

        std::fs::remove_file(
            ModelKey::new(Section::Cpu, Target::Prometheus).artifact_path(dir.path()),
        )
        .unwrap();
        assert!(matches!(
            Estimator::load_dir(dir.path()),
            Err(DashboardError::ModelMissing { .. })
        ));
    }

    #[test]
    fn input_text_parsing_respects_bounds() {
        assert_eq!(InputField::MetricCount.parse("300,000"), Some(300_000.0));
        assert_eq!(InputField::Labels.parse("31"), None);
        assert_eq!(InputField::Labels.parse(""), None);
        assert_eq!(InputField::TsdbWalCompression.parse(" 1 "), Some(1.0));
        assert_eq!(InputField::Nginx.parse("two"), None);
    }
}
