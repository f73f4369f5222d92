/// Data layer: core types, decoding, extraction, loading and export.
///
/// Architecture:
/// ```text
///  save file text / path
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  text or path → decode
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  decoder  │  lines → Record (METADATA first)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  extract  │  DFS for the P_<n> section → SpectrumSeries
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  .parquet / .json / .csv
///   └──────────┘
/// ```

pub mod decoder;
pub mod export;
pub mod extract;
pub mod loader;
pub mod model;
