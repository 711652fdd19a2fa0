//! Error types for the purchase analysis pipeline.
//!
//! Every stage reports its own failure kind:
//!
//! - [`LoadError`] - input missing or not parseable as a table
//! - [`ParseError`] - the underlying cause of a load failure
//! - [`DomainError`] - data violates a stage precondition (e.g. negative amount)
//! - [`ExportError`] - writing an output artifact failed
//! - [`RegressionError`] - modeling failure, tagged with the failing stage
//! - [`SinkError`] - relational sink failure
//! - [`ConfigError`] - configuration could not be read or is invalid
//! - [`PipelineError`] - top-level, stage-tagged orchestration errors
//!
//! Conversion into [`PipelineError`] is automatic via `From`,
//! so `?` works across stage boundaries.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Loading
// =============================================================================

/// Errors returned by the loader.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The input resource does not exist.
    #[error("Input not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The input exists but is not a valid table.
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

/// Why an input could not be read as a table.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Failed to read bytes.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed delimited text (including inconsistent column counts).
    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    /// Bytes could not be decoded.
    #[error("Failed to decode content as {0}")]
    Encoding(String),

    /// Nothing to read, not even a header row.
    #[error("Input is empty")]
    EmptyFile,

    /// A column required by the schema is absent.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// The header names the same column twice.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// A row does not have one cell per column.
    #[error("Row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

// =============================================================================
// Domain
// =============================================================================

/// Data violates a precondition of the stage it was handed to.
#[derive(Debug, Error, PartialEq)]
pub enum DomainError {
    /// `ln(x + 1)` is undefined for negative purchase amounts.
    #[error("Negative purchase amount {value} at row {row}")]
    NegativeAmount { row: usize, value: f64 },

    /// Amount is missing, infinite or NaN where a finite number is required.
    #[error("Non-finite purchase amount at row {row}")]
    NonFiniteAmount { row: usize },

    /// A cell of a numeric column holds text.
    #[error("Column '{column}' is not numeric at row {row} (value '{value}')")]
    NotNumeric {
        column: String,
        row: usize,
        value: String,
    },
}

// =============================================================================
// Export
// =============================================================================

/// Failure writing an output artifact. Always names the destination.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Filesystem failure.
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Delimited text serialization failure.
    #[error("Failed to write CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Workbook serialization failure.
    #[error("Failed to build workbook {}: {source}", path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },
}

impl ExportError {
    /// Destination the failed write was aimed at.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Io { path, .. } | Self::Csv { path, .. } | Self::Workbook { path, .. } => path,
        }
    }
}

// =============================================================================
// Regression
// =============================================================================

/// Stages of one regression run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegressionStage {
    Loaded,
    Split,
    Fit,
    Scored,
    Persisted,
}

impl fmt::Display for RegressionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loaded => "LOADED",
            Self::Split => "SPLIT",
            Self::Fit => "FIT",
            Self::Scored => "SCORED",
            Self::Persisted => "PERSISTED",
        };
        f.write_str(name)
    }
}

/// What went wrong inside a regression stage.
#[derive(Debug, Error)]
pub enum RegressionFailure {
    /// No rows at all.
    #[error("Dataset is empty")]
    EmptyDataset,

    /// Too few rows to form a train/test split.
    #[error("Insufficient data: {rows} row(s), need at least 2")]
    InsufficientData { rows: usize },

    /// The target column has not been derived.
    #[error("Missing feature column: {0}")]
    MissingFeature(String),

    /// Target values are not usable.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Prediction table could not be written.
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Regression failure tagged with the stage it happened in.
#[derive(Debug, Error)]
#[error("Regression failed at {stage}: {kind}")]
pub struct RegressionError {
    pub stage: RegressionStage,
    #[source]
    pub kind: RegressionFailure,
}

impl RegressionError {
    pub fn new(stage: RegressionStage, kind: impl Into<RegressionFailure>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }
}

// =============================================================================
// Sink
// =============================================================================

/// Errors from the optional relational sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Table name is not a plain SQL identifier.
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    /// Database failure.
    #[error("Database error: {0}")]
    Sql(#[from] rusqlite::Error),
}

// =============================================================================
// Configuration
// =============================================================================

/// Errors reading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not JSON.
    #[error("Config JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config does not match the schema.
    #[error("Invalid config: {}", errors.join("; "))]
    Invalid { errors: Vec<String> },
}

// =============================================================================
// Pipeline (top-level)
// =============================================================================

/// Top-level, stage-tagged pipeline errors.
///
/// Returned by [`crate::transform::pipeline::Pipeline::run`] for stages whose
/// output is a precondition of later stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("[config] {0}")]
    Config(#[from] ConfigError),

    /// Loading the input failed.
    #[error("[load] {0}")]
    Load(#[from] LoadError),

    /// Feature derivation rejected the cleaned data.
    #[error("[features] {0}")]
    Features(#[from] DomainError),

    /// Aggregation failed.
    #[error("[aggregate] {0}")]
    Aggregate(DomainError),

    /// An export failed.
    #[error("[export] {0}")]
    Export(#[from] ExportError),

    /// Regression failed.
    #[error("[regression] {0}")]
    Regression(#[from] RegressionError),

    /// Sink failed.
    #[error("[sink] {0}")]
    Sink(#[from] SinkError),

    /// A fan-out task could not be joined.
    #[error("[{stage}] task aborted: {message}")]
    Task { stage: &'static str, message: String },
}

impl PipelineError {
    /// Short tag naming the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Load(_) => "load",
            Self::Features(_) => "features",
            Self::Aggregate(_) => "aggregate",
            Self::Export(_) => "export",
            Self::Regression(_) => "regression",
            Self::Sink(_) => "sink",
            Self::Task { stage, .. } => stage,
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for loading.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for domain-checked transformations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for exports.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for regression runs.
pub type RegressionResult<T> = Result<T, RegressionError>;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type for pipeline runs.
pub type PipelineResult<T> = Result<T, PipelineError>;
