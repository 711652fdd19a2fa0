//! # purchase-pipeline - customer purchase ETL and analysis
//!
//! Loads a raw customer purchase export, cleans it, derives a log-amount
//! feature, then fans the cleaned table out to three independent outputs:
//! the cleaned CSV, a per-dimension sales workbook and a baseline
//! regression of amount on row ordinal.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │  CSV File   │────▶│   Loader    │────▶│   Cleaner   │────▶│ Feature Engineer │
//! │ (ISO/UTF8)  │     │ (auto-enc)  │     │ (drop rows) │     │   (log amount)   │
//! └─────────────┘     └──────┬──────┘     └─────────────┘     └────────┬─────────┘
//!                            │                                          │
//!                            ▼                    ┌─────────────────────┼─────────────────────┐
//!                     ┌─────────────┐             ▼                     ▼                     ▼
//!                     │ SQLite sink │      ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//!                     │ (raw, opt.) │      │  Persister  │      │ Aggregator  │      │  Regressor  │
//!                     └─────────────┘      │ (clean CSV) │      │   (.xlsx)   │      │ (preds CSV) │
//!                                          └─────────────┘      └─────────────┘      └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use purchase_pipeline::{Pipeline, PipelineConfig, RunLog};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = Pipeline::new(PipelineConfig::default(), RunLog::new());
//!     let report = pipeline.run().await.unwrap();
//!     println!("Cleaned {} rows", report.clean.output_rows);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Table, schema and aggregate models
//! - [`parser`] - CSV loading with auto-detection
//! - [`transform`] - Cleaning, features, grouping, and pipeline
//! - [`export`] - Atomic CSV, workbook and JSON writers
//! - [`regression`] - Seeded split and least-squares baseline
//! - [`sink`] - Optional SQLite load of the raw table
//! - [`summary`] - Descriptive overview of a run's data
//! - [`validation`] - Config schema validation
//! - [`config`] - Run configuration
//! - [`logs`] - Stage-tagged run log

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Loading
pub mod parser;

// Transformation
pub mod transform;

// Outputs
pub mod export;
pub mod regression;
pub mod sink;
pub mod summary;

// Configuration
pub mod config;
pub mod validation;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    DomainError,
    ExportError,
    LoadError,
    ParseError,
    PipelineError,
    PipelineResult,
    RegressionError,
    RegressionFailure,
    RegressionStage,
    SinkError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    AggregateRow,
    AggregateTable,
    Cell,
    Column,
    ColumnKind,
    ColumnNames,
    Dimension,
    Schema,
    Table,
};

// =============================================================================
// Re-exports - Loading
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    load,
    parse_bytes,
    parse_str,
    SourceInfo,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    add_log_feature,
    aggregate,
    aggregate_all,
    clean,
    clean_with_stats,
    sort_by_amount,
    CleanStats,
    SortOrder,
};

// =============================================================================
// Re-exports - Outputs
// =============================================================================

pub use export::{export_aggregates, persist_json, persist_predictions, persist_table};
pub use regression::{LinearModel, Prediction, RegressionConfig, RegressionReport};
pub use sink::{ingest_raw, SinkConfig};
pub use summary::{overview, Describe, Overview};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use config::PipelineConfig;
pub use logs::{LogEntry, LogLevel, RunLog};
pub use transform::pipeline::{Pipeline, Prepared, RunReport, StageOutcome};
