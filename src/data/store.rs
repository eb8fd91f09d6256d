//! SQLite access for the metrics database.
//!
//! Only this module talks to the database. It runs the aggregation query
//! exactly once per process and hands back plain [`Observation`]s.

use std::path::Path;

use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OpenFlags};

use super::model::{DimValue, Dimension, Metric, Observation, RowBuilder, GROUP_COLUMN};
use crate::config::QueryConfig;
use crate::error::{DashboardError, DashboardResult};

/// Schema of the `metrics` / `parameters` tables, used by the sample
/// generator and by tests that build throwaway databases.
pub const SCHEMA: &str = include_str!("../../migrations/001_metrics.sql");

/// Build the aggregation query: per (group, configuration) means of every
/// metric, restricted to `group_count` allowed groups (`?1..?n`) and to runs
/// whose remote-write batch size is unset or equal to `?{n+1}`.
pub fn aggregation_sql(group_count: usize) -> String {
    let averages: Vec<String> = Metric::ALL
        .iter()
        .map(|m| format!("AVG(metrics.{c}) AS {c}", c = m.column()))
        .collect();
    let params: Vec<String> = Dimension::ALL
        .iter()
        .map(|d| format!("parameters.{}", d.column()))
        .collect();
    let placeholders: Vec<String> = (1..=group_count).map(|i| format!("?{i}")).collect();
    let batch = group_count + 1;

    format!(
        "SELECT metrics.{GROUP_COLUMN} AS {GROUP_COLUMN}, {averages}, {params}\n\
         FROM metrics INNER JOIN parameters ON metrics.timestamp = parameters.timestamp\n\
         WHERE (parameters.prometheus_remote_write_max_samples_per_send_value IS NULL\n\
                OR parameters.prometheus_remote_write_max_samples_per_send_value = ?{batch})\n\
           AND metrics.{GROUP_COLUMN} IN ({placeholders})\n\
         GROUP BY metrics.{GROUP_COLUMN}, {params}",
        averages = averages.join(", "),
        params = params.join(", "),
        placeholders = placeholders.join(", "),
    )
}

/// Read-only handle on a metrics database file.
pub struct MetricsStore {
    conn: Connection,
}

impl MetricsStore {
    pub fn open(path: &Path) -> DashboardResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
        )?;
        Ok(Self { conn })
    }

    /// Run the aggregation query and convert every result row.
    pub fn fetch_observations(&self, query: &QueryConfig) -> DashboardResult<Vec<Observation>> {
        let sql = aggregation_sql(query.groups.len());
        let mut stmt = self.conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut params: Vec<Value> = query.groups.iter().map(|g| Value::Text(g.clone())).collect();
        params.push(Value::Integer(query.max_samples_per_send));

        let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
        let mut observations = Vec::new();
        while let Some(row) = rows.next()? {
            let row_no = observations.len();
            let mut builder = RowBuilder::default();
            for (i, column) in columns.iter().enumerate() {
                let value = cell_value(row_no, column, row.get_ref(i)?)?;
                builder.set(row_no, column, value)?;
            }
            observations.push(builder.finish(row_no)?);
        }
        Ok(observations)
    }

    pub fn close(self) -> DashboardResult<()> {
        self.conn.close().map_err(|(_, e)| DashboardError::Database(e))
    }
}

/// Open the database, run the query once and close the connection again.
pub fn load_observations(path: &Path, query: &QueryConfig) -> DashboardResult<Vec<Observation>> {
    let store = MetricsStore::open(path)?;
    let rows = store.fetch_observations(query)?;
    store.close()?;
    log::info!(
        "Fetched {} aggregated rows from {} ({} groups allowed)",
        rows.len(),
        path.display(),
        query.groups.len()
    );
    Ok(rows)
}

fn cell_value(row: usize, column: &str, value: ValueRef<'_>) -> DashboardResult<DimValue> {
    Ok(match value {
        ValueRef::Null => DimValue::Null,
        ValueRef::Integer(i) => DimValue::Integer(i),
        ValueRef::Real(f) => DimValue::Float(f),
        ValueRef::Text(t) => match std::str::from_utf8(t) {
            Ok(s) => DimValue::String(s.to_string()),
            Err(e) => {
                return Err(DashboardError::MalformedRow {
                    row,
                    column: column.to_string(),
                    reason: format!("invalid UTF-8: {e}"),
                })
            }
        },
        ValueRef::Blob(_) => {
            return Err(DashboardError::MalformedRow {
                row,
                column: column.to_string(),
                reason: "unexpected blob".to_string(),
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn seed(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        let runs: [(i64, Option<i64>, i64); 3] = [(1, None, 1), (2, Some(100), 2), (3, Some(500), 1)];
        for (ts, batch, ingester) in runs {
            conn.execute(
                "INSERT INTO parameters (timestamp, application_instances_value, application_case_value,
                    application_metric_count_value, application_labels_value, cortex_number_of_nginx_value,
                    cortex_number_of_distributor_value, cortex_number_of_ingester_value,
                    cortex_blocks_storage_tsdb_block_ranges_period_value,
                    cortex_blocks_storage_tsdb_retention_period_value,
                    cortex_blocks_storage_tsdb_wal_compression_value, cortex_compactor_blocks_ranges_value,
                    prometheus_remote_write_max_samples_per_send_value)
                 VALUES (?1, 1, 'quasi_real', 30000, 20.0, 1, 1, ?2, 7200, 21600, 0, NULL, ?3)",
                params![ts, ingester, batch],
            )
            .unwrap();
        }
        let samples = [
            (1, "cortex ingester", 10.0),
            (1, "cortex ingester", 20.0),
            (2, "cortex ingester", 30.0),
            (1, "grafana", 99.0),
            (3, "cortex ingester", 500.0),
        ];
        for (ts, group, cpu) in samples {
            conn.execute(
                "INSERT INTO metrics (timestamp, group_name, nd_cg_cpu_visibletotal_value) VALUES (?1, ?2, ?3)",
                params![ts, group, cpu],
            )
            .unwrap();
        }
    }

    fn query() -> QueryConfig {
        QueryConfig {
            groups: vec!["cortex ingester".into(), "minio".into()],
            max_samples_per_send: 100,
        }
    }

    #[test]
    fn aggregates_allowed_groups_per_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.db");
        seed(&path);

        let mut rows = load_observations(&path, &query()).unwrap();
        rows.sort_by_key(|r| r.dim(Dimension::Ingester).clone());

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.group == "cortex ingester"));
        assert_eq!(rows[0].dim(Dimension::Ingester), &DimValue::Integer(1));
        assert_eq!(rows[0].metric(Metric::Cpu), Some(15.0));
        assert_eq!(rows[1].metric(Metric::Cpu), Some(30.0));
        assert_eq!(rows[0].metric(Metric::DiskUsage), None);
        assert_eq!(rows[0].dim(Dimension::CompactorBlocksRanges), &DimValue::Null);
        assert_eq!(rows[0].dim(Dimension::Case), &DimValue::String("quasi_real".into()));
    }

    #[test]
    fn missing_database_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_observations(&dir.path().join("absent.db"), &query()).unwrap_err();
        assert!(matches!(err, DashboardError::Database(_)));
    }

    #[test]
    fn query_binds_one_placeholder_per_group() {
        let sql = aggregation_sql(3);
        assert!(sql.contains("IN (?1, ?2, ?3)"));
        assert!(sql.contains("= ?4"));
        assert!(sql.contains("AVG(metrics.du_disk_usage_value) AS du_disk_usage_value"));
    }
}
