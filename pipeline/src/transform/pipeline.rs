//! Run orchestration.
//!
//! ```text
//! load ─▶ clean ─▶ features ─▶ sort ─┬─▶ persist cleaned table
//!   │                                ├─▶ aggregate ─▶ export workbook
//!   └─▶ sink (raw, optional)         └─▶ regression
//! ```
//!
//! Load, clean and features are preconditions for the fan-out: a failure
//! there stops the run with a stage-tagged [`PipelineError`]. The sink only
//! needs the loaded table and runs before cleaning.
//! The three fan-out consumers share one immutable table and run
//! concurrently on the blocking pool; each records its own outcome in the
//! [`RunReport`], so a failed workbook export does not touch the cleaned
//! table export. The sink is a side channel and never stops the run.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinError;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::export::{export_aggregates, persist_json, persist_table};
use crate::logs::RunLog;
use crate::models::Table;
use crate::parser::load;
use crate::regression::{self, RegressionReport};
use crate::sink::{ingest_raw, SinkConfig};
use crate::summary::{overview, Overview};

use super::clean::{clean_with_stats, CleanStats};
use super::features::{add_log_feature, sort_by_amount};
use super::grouper::aggregate_all;

/// Result of one independent stage.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum StageOutcome<T> {
    Completed(T),
    Failed(String),
}

impl<T> StageOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed(_))
    }
}

/// One exported sheet.
#[derive(Debug, Clone, Serialize)]
pub struct SheetSummary {
    pub sheet: String,
    pub groups: usize,
    pub total_sales: f64,
}

/// Aggregate workbook outcome.
#[derive(Debug, Clone, Serialize)]
pub struct WorkbookSummary {
    pub destination: PathBuf,
    pub sheets: Vec<SheetSummary>,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub input: PathBuf,
    pub clean: CleanStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sink: Option<StageOutcome<usize>>,
    pub cleaned_export: StageOutcome<PathBuf>,
    pub aggregates: StageOutcome<WorkbookSummary>,
    pub regression: StageOutcome<RegressionReport>,
}

impl RunReport {
    /// True when no stage failed.
    pub fn is_success(&self) -> bool {
        self.sink.as_ref().map_or(true, StageOutcome::is_completed)
            && self.cleaned_export.is_completed()
            && self.aggregates.is_completed()
            && self.regression.is_completed()
    }
}

/// Raw and cleaned+engineered tables of one input.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub raw: Table,
    pub table: Table,
    pub clean: CleanStats,
}

impl Prepared {
    pub fn overview(&self) -> Overview {
        overview(&self.raw, &self.table)
    }
}

/// A configured pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    log: RunLog,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, log: RunLog) -> Self {
        Self { config, log }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Read the input as-is.
    pub fn load_raw(&self) -> PipelineResult<Table> {
        Ok(load(
            &self.config.input,
            &self.config.schema(),
            &self.log.for_stage("load"),
        )?)
    }

    /// Load, clean, derive features and sort.
    pub fn prepare(&self) -> PipelineResult<Prepared> {
        self.prepare_from(self.load_raw()?)
    }

    /// Clean, derive features and sort an already loaded table.
    pub fn prepare_from(&self, raw: Table) -> PipelineResult<Prepared> {
        let (cleaned, clean) = clean_with_stats(raw.clone(), &self.log.for_stage("clean"));

        let features_log = self.log.for_stage("features");
        let table = add_log_feature(cleaned, &features_log)?;
        let table = sort_by_amount(table, self.config.sort, &features_log)?;

        Ok(Prepared { raw, table, clean })
    }

    /// Load the input and replace the sink table with it.
    pub fn ingest(&self, sink: &SinkConfig) -> PipelineResult<usize> {
        let raw = self.load_raw()?;
        Ok(ingest_raw(&raw, sink, &self.log.for_stage("sink"))?)
    }

    /// Full run.
    pub async fn run(&self) -> PipelineResult<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.log.info(format!("🚀 Run {} on {}", run_id, self.config.input.display()));

        let raw = self.load_raw()?;

        let sink = self.config.sink.as_ref().map(|sink| {
            let log = self.log.for_stage("sink");
            match ingest_raw(&raw, sink, &log) {
                Ok(rows) => StageOutcome::Completed(rows),
                Err(e) => {
                    let e = PipelineError::from(e);
                    log.warning(format!("Sink skipped: {}", e));
                    StageOutcome::Failed(e.to_string())
                }
            }
        });

        let prepared = self.prepare_from(raw)?;
        let table = Arc::new(prepared.table);
        let (cleaned_export, aggregates, regression) = self.fan_out(table).await;

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            input: self.config.input.clone(),
            clean: prepared.clean,
            sink,
            cleaned_export,
            aggregates,
            regression,
        };

        if let Some(ref path) = self.config.report_output {
            match persist_json(&report, path) {
                Ok(()) => self.log.info(format!("Run report saved: {}", path.display())),
                Err(e) => self.log.warning(format!("Run report not saved: {}", e)),
            }
        }

        if report.is_success() {
            self.log.success(format!("✨ Run {} complete", run_id));
        } else {
            self.log.error(format!("Run {} finished with failed stages", run_id));
        }
        Ok(report)
    }

    async fn fan_out(
        &self,
        table: Arc<Table>,
    ) -> (
        StageOutcome<PathBuf>,
        StageOutcome<WorkbookSummary>,
        StageOutcome<RegressionReport>,
    ) {
        let persist = {
            let table = Arc::clone(&table);
            let destination = self.config.cleaned_output.clone();
            let log = self.log.for_stage("persist");
            tokio::task::spawn_blocking(move || -> PipelineResult<PathBuf> {
                persist_table(&table, &destination)?;
                log.success(format!("Cleaned data saved: {}", destination.display()));
                Ok(destination)
            })
        };

        let aggregate = {
            let table = Arc::clone(&table);
            let destination = self.config.workbook_output.clone();
            let log = self.log.for_stage("aggregate");
            tokio::task::spawn_blocking(move || -> PipelineResult<WorkbookSummary> {
                let tables = aggregate_all(&table).map_err(PipelineError::Aggregate)?;
                export_aggregates(&tables, &destination)?;
                log.success(format!(
                    "Aggregated data exported successfully: {}",
                    destination.display()
                ));
                Ok(WorkbookSummary {
                    destination,
                    sheets: tables
                        .iter()
                        .map(|t| SheetSummary {
                            sheet: t.sheet_name().to_string(),
                            groups: t.rows.len(),
                            total_sales: t.total(),
                        })
                        .collect(),
                })
            })
        };

        let regress = {
            let table = Arc::clone(&table);
            let destination = self.config.predictions_output.clone();
            let config = self.config.regression;
            let log = self.log.for_stage("regression");
            tokio::task::spawn_blocking(move || -> PipelineResult<RegressionReport> {
                Ok(regression::run(&table, &config, &destination, &log)?)
            })
        };

        let (persisted, aggregated, regressed) = tokio::join!(persist, aggregate, regress);
        (
            self.outcome("persist", persisted),
            self.outcome("aggregate", aggregated),
            self.outcome("regression", regressed),
        )
    }

    fn outcome<T>(
        &self,
        stage: &'static str,
        joined: Result<PipelineResult<T>, JoinError>,
    ) -> StageOutcome<T> {
        let result = joined.unwrap_or_else(|e| {
            Err(PipelineError::Task {
                stage,
                message: e.to_string(),
            })
        });
        match result {
            Ok(value) => StageOutcome::Completed(value),
            Err(e) => {
                self.log.for_stage(stage).error(e.to_string());
                StageOutcome::Failed(e.to_string())
            }
        }
    }
}
