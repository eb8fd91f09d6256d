use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{DimValue, MetricsDataset, Observation, RowBuilder};
use super::store;
use crate::config::QueryConfig;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load and prepare the dataset from its source.  Dispatch by extension.
///
/// Supported sources:
/// * `.db` / `.sqlite` / `.sqlite3` – metrics database, aggregated by SQL
/// * `.parquet` – exported result set, one column per query column
/// * `.json`    – `[{ "group_name": "...", "nd_cg_cpu_visibletotal_value": 1.2, ... }, ...]`
/// * `.csv`     – header row with the query's column names
pub fn load_dataset(path: &Path, query: &QueryConfig) -> Result<MetricsDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let rows = match ext.as_str() {
        "db" | "sqlite" | "sqlite3" => store::load_observations(path, query)
            .with_context(|| format!("querying {}", path.display()))?,
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        "csv" => load_csv(path)?,
        other => bail!("Unsupported data source extension: .{other}"),
    };

    let dataset = MetricsDataset::prepare(rows).context("preparing dataset")?;
    log::info!(
        "Prepared {} rows across {} groups",
        dataset.len(),
        dataset.groups().len()
    );
    for (dim, values) in dataset.domains() {
        log::debug!("{dim}: {} distinct values", values.len());
    }
    Ok(dataset)
}

/// Feed one cell into the builder, warning once per unknown column.
fn route_cell(
    builder: &mut RowBuilder,
    row: usize,
    column: &str,
    value: DimValue,
    warned: &mut Vec<String>,
) -> Result<()> {
    if !builder.set(row, column, value)? && !warned.iter().any(|c| c == column) {
        log::warn!("Ignoring unknown snapshot column '{column}'");
        warned.push(column.to_string());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, one object per result row):
///
/// ```json
/// [
///   {
///     "group_name": "cortex ingester",
///     "nd_cg_cpu_visibletotal_value": 12.5,
///     "cortex_number_of_ingester_value": 2
///   },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Vec<Observation>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut rows = Vec::with_capacity(records.len());
    let mut warned = Vec::new();

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let mut builder = RowBuilder::default();
        for (key, val) in obj {
            route_cell(&mut builder, i, key, json_to_value(val), &mut warned)?;
        }
        rows.push(builder.finish(i)?);
    }

    Ok(rows)
}

fn json_to_value(val: &JsonValue) -> DimValue {
    match val {
        JsonValue::String(s) => DimValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                DimValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                DimValue::Float(f)
            } else {
                DimValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => DimValue::Bool(*b),
        JsonValue::Null => DimValue::Null,
        other => DimValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with the query's column names, one result row per
/// line. Empty cells are NULL.
fn load_csv(path: &Path) -> Result<Vec<Observation>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    let mut warned = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let mut builder = RowBuilder::default();
        for (col_idx, value) in record.iter().enumerate() {
            let col_name = headers
                .get(col_idx)
                .with_context(|| format!("CSV row {row_no}: more cells than headers"))?;
            route_cell(&mut builder, row_no, col_name, guess_value_type(value), &mut warned)?;
        }
        rows.push(builder.finish(row_no)?);
    }

    Ok(rows)
}

fn guess_value_type(s: &str) -> DimValue {
    if s.is_empty() {
        return DimValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return DimValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return DimValue::Float(f);
    }
    match s {
        "true" | "True" => DimValue::Bool(true),
        "false" | "False" => DimValue::Bool(false),
        _ => DimValue::String(s.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet export of the aggregated result set.
///
/// Every column is a scalar (strings, ints, floats, bools); names follow the
/// query's column names. Works with files written by both **Pandas**
/// (`df.to_parquet()`) and **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Vec<Observation>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    let mut warned = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        for row in 0..batch.num_rows() {
            let row_no = rows.len();
            let mut builder = RowBuilder::default();
            for (col_idx, field) in schema.fields().iter().enumerate() {
                let value = extract_value(batch.column(col_idx), row)
                    .with_context(|| format!("Row {row_no}: failed to read '{}'", field.name()))?;
                route_cell(&mut builder, row_no, field.name(), value, &mut warned)?;
            }
            rows.push(builder.finish(row_no)?);
        }
    }

    Ok(rows)
}

// -- Parquet / Arrow helpers --

/// Extract a single scalar value from an Arrow column at a given row.
fn extract_value(col: &Arc<dyn Array>, row: usize) -> Result<DimValue> {
    if col.is_null(row) {
        return Ok(DimValue::Null);
    }
    let value = match col.data_type() {
        DataType::Utf8 => {
            let arr = downcast::<StringArray>(col)?;
            DimValue::String(arr.value(row).to_string())
        }
        DataType::LargeUtf8 => DimValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => DimValue::Integer(downcast::<Int32Array>(col)?.value(row) as i64),
        DataType::Int64 => DimValue::Integer(downcast::<Int64Array>(col)?.value(row)),
        DataType::Float32 => DimValue::Float(downcast::<Float32Array>(col)?.value(row) as f64),
        DataType::Float64 => DimValue::Float(downcast::<Float64Array>(col)?.value(row)),
        DataType::Boolean => DimValue::Bool(downcast::<BooleanArray>(col)?.value(row)),
        other => bail!("unsupported column type {other:?}"),
    };
    Ok(value)
}

fn downcast<T: Array + 'static>(col: &Arc<dyn Array>) -> Result<&T> {
    col.as_any()
        .downcast_ref::<T>()
        .with_context(|| format!("unexpected array for {:?}", col.data_type()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::data::model::{Dimension, Metric};

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn csv_snapshot_loads_and_prepares() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "snapshot.csv",
            "group_name,nd_cg_cpu_visibletotal_value,application_labels_value,cortex_blocks_storage_tsdb_wal_compression_value,extra\n\
             prometheus server,12.5,20.0,False,x\n\
             cortex ingester,,5,True,y\n",
        );

        let ds = load_dataset(&path, &QueryConfig::default()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows()[0].group, "cortex ingester");
        assert_eq!(ds.rows()[0].metric(Metric::Cpu), None);
        assert_eq!(ds.rows()[1].metric(Metric::Cpu), Some(12.5));
        assert_eq!(ds.rows()[1].dim(Dimension::Labels), &DimValue::Integer(20));
        assert_eq!(
            ds.rows()[0].dim(Dimension::WalCompression),
            &DimValue::Bool(true)
        );
    }

    #[test]
    fn json_snapshot_requires_numeric_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "snapshot.json",
            r#"[{"group_name": "minio", "du_disk_usage_value": "lots"}]"#,
        );
        assert!(load_dataset(&path, &QueryConfig::default()).is_err());
    }

    #[test]
    fn json_snapshot_requires_group() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "snapshot.json", r#"[{"du_disk_usage_value": 1.0}]"#);
        assert!(load_dataset(&path, &QueryConfig::default()).is_err());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "snapshot.xlsx", "");
        let err = load_dataset(&path, &QueryConfig::default()).unwrap_err();
        assert!(err.to_string().contains("xlsx"));
    }
}
