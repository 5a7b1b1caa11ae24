/// Data layer: core types, table reading and writing.
///
/// Architecture:
/// ```text
///  .dat / .csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Trace, or branch CSV → Branch
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  model    │  Sample, Branch, LoopParameters
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  writer   │  branch / summary CSV, scientific text tables
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod writer;
