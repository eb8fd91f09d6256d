/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///  metrics.db (SQLite)      .parquet / .json / .csv snapshot
///        │                          │
///        ▼                          ▼
///   ┌──────────┐              ┌──────────┐
///   │  store   │  AVG query   │  loader  │  parse export
///   └──────────┘              └──────────┘
///        └────────────┬─────────────┘
///                     ▼
///            ┌────────────────┐
///            │ MetricsDataset │  Vec<Observation>, domains
///            └────────────────┘
///                     │
///                     ▼
///               ┌──────────┐
///               │  filter  │  constraints → subset
///               └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod store;
