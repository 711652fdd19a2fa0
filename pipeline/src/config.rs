//! Pipeline configuration.
//!
//! Nothing is hard-coded beyond the defaults below: paths, column names, the
//! split and the optional sink come from a JSON file (validated against the
//! embedded schema), the environment, or CLI flags, in increasing priority.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::models::{ColumnNames, Schema};
use crate::regression::RegressionConfig;
use crate::sink::SinkConfig;
use crate::transform::features::SortOrder;
use crate::validation::validate_config;

/// Environment variable naming the sink database when the config has none.
pub const SINK_DATABASE_ENV: &str = "PURCHASE_SINK_DATABASE";

/// Everything a run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw purchase export.
    pub input: PathBuf,
    /// Cleaned, feature-engineered table.
    pub cleaned_output: PathBuf,
    /// Aggregate workbook.
    pub workbook_output: PathBuf,
    /// Regression `(Actual, Predicted)` table.
    pub predictions_output: PathBuf,
    /// Optional JSON run report.
    pub report_output: Option<PathBuf>,
    pub columns: ColumnNames,
    pub sort: SortOrder,
    pub regression: RegressionConfig,
    /// Raw-table sink; disabled when absent.
    pub sink: Option<SinkConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/customer_data.csv"),
            cleaned_output: PathBuf::from("data/customer_data_clean.csv"),
            workbook_output: PathBuf::from("data/aggregated_data.xlsx"),
            predictions_output: PathBuf::from("data/regression_results.csv"),
            report_output: None,
            columns: ColumnNames::default(),
            sort: SortOrder::default(),
            regression: RegressionConfig::default(),
            sink: None,
        }
    }
}

impl PipelineConfig {
    /// Read and validate a JSON config file. Missing keys take defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(content)?;
        validate_config(&value).map_err(|errors| ConfigError::Invalid { errors })?;
        Ok(serde_json::from_value(value)?)
    }

    /// Fill the sink from [`SINK_DATABASE_ENV`] if none is configured.
    pub fn with_env(mut self) -> Self {
        if self.sink.is_none() {
            if let Ok(db) = std::env::var(SINK_DATABASE_ENV) {
                if !db.is_empty() {
                    self.sink = Some(SinkConfig::new(db));
                }
            }
        }
        self
    }

    /// Schema the loader validates the input against.
    pub fn schema(&self) -> Schema {
        Schema::new(&self.columns)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.input, PathBuf::from("data/customer_data.csv"));
        assert_eq!(config.regression.test_fraction, 0.2);
        assert_eq!(config.regression.seed, 42);
        assert_eq!(config.sort, SortOrder::Descending);
        assert!(config.sink.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "input": "in.csv", "regression": {{ "seed": 7 }}, "sort": "none" }}"#
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.input, PathBuf::from("in.csv"));
        assert_eq!(config.regression.seed, 7);
        assert_eq!(config.regression.test_fraction, 0.2);
        assert_eq!(config.sort, SortOrder::None);
        assert_eq!(config.cleaned_output, PathBuf::from("data/customer_data_clean.csv"));
    }

    #[test]
    fn test_sink_table_defaults() {
        let config = PipelineConfig::from_json(r#"{ "sink": { "database": "p.db" } }"#).unwrap();
        let sink = config.sink.unwrap();
        assert_eq!(sink.table, "customer_purchases");
    }

    #[test]
    fn test_invalid_config() {
        let err = PipelineConfig::from_json(r#"{ "regression": { "test_fraction": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = PipelineConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_default_round_trips_through_schema() {
        let json = PipelineConfig::default().to_json().unwrap();
        assert_eq!(PipelineConfig::from_json(&json).unwrap(), PipelineConfig::default());
    }
}
