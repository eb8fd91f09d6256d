//! Writes a synthetic metrics database, the matching regression model
//! artifacts and a Parquet snapshot of the aggregated result set.
//!
//! Usage: `generate_sample [output_dir]` (default `sample`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rusqlite::{params, Connection};

use footprint_dash::config::QueryConfig;
use footprint_dash::data::model::{DimValue, Dimension, Metric, Observation, GROUP_COLUMN};
use footprint_dash::data::store::{load_observations, SCHEMA};
use footprint_dash::estimate::{
    required_models, LinearModel, ModelKey, Section, Target, FEATURE_COUNT, SLOTS, Source,
};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// One configuration under test.
struct Run {
    case: &'static str,
    series: i64,
    labels: i64,
    nginx: i64,
    distributor: i64,
    ingester: i64,
    block_range: i64,
    retention: i64,
    wal: bool,
    compactor: Option<i64>,
    batch: Option<i64>,
}

impl Run {
    fn features(&self) -> [f64; FEATURE_COUNT] {
        [
            0.0,
            self.series as f64,
            self.labels as f64,
            self.nginx as f64,
            self.distributor as f64,
            self.ingester as f64,
            self.block_range as f64,
            self.retention as f64,
            if self.wal { 1.0 } else { 0.0 },
        ]
    }
}

/// The "true" linear relationship the samples are drawn around; it is also
/// what gets written out as the fitted model.
fn true_model(key: ModelKey) -> LinearModel {
    let per_target = match key.target {
        Target::Distributor => 0.6,
        Target::Ingester => 1.0,
        Target::Prometheus => 1.4,
        Target::Minio => 0.3,
    };
    let (intercept, series, labels) = match key.section {
        Section::Cpu => (2.0, 0.00012, 0.15),
        Section::Memory => (60.0, 0.0021, 2.5),
        Section::Network => (25.0, 0.0045, 1.2),
        Section::Disk => (0.0, 0.0, 0.0),
    };
    let coefficients = vec![
        -0.5 * per_target,
        series * per_target,
        labels * per_target,
        0.3,
        -0.2,
        if key.target == Target::Ingester { -1.5 } else { 0.4 },
        0.000_05,
        0.000_01,
        0.8 * per_target,
    ];
    LinearModel::new(intercept * per_target, coefficients)
}

fn target_of(group: &str) -> Option<Target> {
    match group {
        "cortex distributor" => Some(Target::Distributor),
        "cortex ingester" => Some(Target::Ingester),
        "prometheus server" => Some(Target::Prometheus),
        "minio" => Some(Target::Minio),
        _ => None,
    }
}

fn sample_metrics(rng: &mut SimpleRng, group: &str, run: &Run) -> [f64; 6] {
    let features = run.features();
    let eval = |section: Section| -> f64 {
        match target_of(group) {
            Some(target) => {
                let m = true_model(ModelKey::new(section, target));
                m.intercept
                    + m.coefficients
                        .iter()
                        .zip(features.iter())
                        .map(|(c, x)| c * x)
                        .sum::<f64>()
            }
            None => match section {
                Section::Cpu => 1.5,
                Section::Memory => 40.0,
                _ => 8.0,
            },
        }
    };

    let disk = SLOTS
        .iter()
        .find_map(|slot| match slot.source {
            Source::Linear { slope, intercept } if Some(slot.target) == target_of(group) => {
                Some(slope * run.series as f64 + intercept)
            }
            _ => None,
        })
        .unwrap_or(50.0);

    let cpu = eval(Section::Cpu);
    let mem = eval(Section::Memory);
    let net = eval(Section::Network);
    let received = net * 0.55;
    [
        rng.gauss(disk, disk.abs() * 0.02).max(0.0),
        rng.gauss(cpu, cpu.abs() * 0.05).max(0.0),
        rng.gauss(mem, mem.abs() * 0.03).max(0.0),
        rng.gauss(received, received.abs() * 0.05).max(0.0),
        rng.gauss(net - received, (net - received).abs() * 0.05).max(0.0),
        rng.gauss(net, net.abs() * 0.05).max(0.0),
    ]
}

fn runs() -> Vec<Run> {
    let mut runs = Vec::new();
    for &case in &["quasi_real", "random"] {
        for &series in &[3_000, 30_000, 100_000, 200_000] {
            for &labels in &[5, 20] {
                for &ingester in &[1, 2, 3] {
                    for &wal in &[false, true] {
                        runs.push(Run {
                            case,
                            series,
                            labels,
                            nginx: 1,
                            distributor: if ingester == 3 { 2 } else { 1 },
                            ingester,
                            block_range: 7200,
                            retention: if wal { 43200 } else { 21600 },
                            wal,
                            compactor: (ingester > 1).then_some(7200),
                            batch: if series == 200_000 && labels == 5 { Some(500) } else { Some(100) },
                        });
                    }
                }
            }
        }
    }
    runs
}

fn write_database(path: &Path, rng: &mut SimpleRng) -> Result<usize> {
    if path.exists() {
        std::fs::remove_file(path).context("removing old database")?;
    }
    let mut conn = Connection::open(path).context("creating database")?;
    conn.execute_batch(SCHEMA).context("creating schema")?;

    let groups = QueryConfig::default().groups;
    let tx = conn.transaction()?;
    let mut ts: i64 = 1_600_000_000;
    let mut samples = 0;
    for run in runs() {
        // Several scrapes per run, one timestamp each.
        for _ in 0..4 {
            ts += 15;
            tx.execute(
                "INSERT INTO parameters VALUES (?1, 1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    ts,
                    run.case,
                    run.series,
                    run.labels as f64,
                    run.nginx,
                    run.distributor,
                    run.ingester,
                    run.block_range,
                    run.retention,
                    run.wal as i64,
                    run.compactor,
                    run.batch,
                ],
            )?;
            for group in groups.iter().map(String::as_str).chain(["grafana"]) {
                let m = sample_metrics(rng, group, &run);
                tx.execute(
                    "INSERT INTO metrics VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![ts, group, m[0], m[1], m[2], m[3], m[4], m[5]],
                )?;
                samples += 1;
            }
        }
    }
    tx.commit()?;
    Ok(samples)
}

fn write_models(dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(dir).context("creating models directory")?;
    let mut n = 0;
    for key in required_models() {
        true_model(key)
            .to_file(&key.artifact_path(dir))
            .with_context(|| format!("writing {key}"))?;
        n += 1;
    }
    Ok(n)
}

/// Export the aggregated rows, the way the dashboard would see them.
fn write_snapshot(db: &Path, out: &Path) -> Result<usize> {
    let rows: Vec<Observation> = load_observations(db, &QueryConfig::default())?;

    let mut fields = vec![Field::new(GROUP_COLUMN, DataType::Utf8, false)];
    let mut columns: Vec<ArrayRef> = vec![Arc::new(StringArray::from(
        rows.iter().map(|r| r.group.as_str()).collect::<Vec<_>>(),
    ))];

    for metric in Metric::ALL {
        fields.push(Field::new(metric.column(), DataType::Float64, true));
        columns.push(Arc::new(Float64Array::from(
            rows.iter().map(|r| r.metric(metric)).collect::<Vec<_>>(),
        )));
    }

    for dim in Dimension::ALL {
        let values: Vec<&DimValue> = rows.iter().map(|r| r.dim(dim)).collect();
        let (data_type, array): (DataType, ArrayRef) = match dim {
            Dimension::Case => (
                DataType::Utf8,
                Arc::new(StringArray::from(
                    values
                        .iter()
                        .map(|v| match v {
                            DimValue::String(s) => Some(s.as_str()),
                            _ => None,
                        })
                        .collect::<Vec<_>>(),
                )),
            ),
            Dimension::WalCompression => (
                DataType::Boolean,
                Arc::new(BooleanArray::from(
                    values
                        .iter()
                        .map(|v| v.as_f64().map(|f| f != 0.0))
                        .collect::<Vec<_>>(),
                )),
            ),
            _ => (
                DataType::Int64,
                Arc::new(Int64Array::from(
                    values
                        .iter()
                        .map(|v| v.as_f64().map(|f| f as i64))
                        .collect::<Vec<_>>(),
                )),
            ),
        };
        fields.push(Field::new(dim.column(), data_type, true));
        columns.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(out).context("creating snapshot file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing snapshot")?;
    writer.close().context("closing snapshot")?;
    Ok(rows.len())
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample"));
    std::fs::create_dir_all(&out_dir).context("creating output directory")?;

    let mut rng = SimpleRng::new(42);
    let db = out_dir.join("metrics.db");
    let samples = write_database(&db, &mut rng)?;
    let models = write_models(&out_dir.join("models"))?;
    let snapshot = out_dir.join("metrics.parquet");
    let rows = write_snapshot(&db, &snapshot)?;

    println!("Wrote {samples} samples to {}", db.display());
    println!("Wrote {models} models to {}", out_dir.join("models").display());
    println!("Wrote {rows} aggregated rows to {}", snapshot.display());
    Ok(())
}
