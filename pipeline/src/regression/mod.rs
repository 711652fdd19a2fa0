//! Ordinal baseline regressor.
//!
//! One run walks `LOADED → SPLIT → FIT → SCORED → PERSISTED`:
//!
//! - **SPLIT**: every row gets the feature `x = 1-based row position`; row
//!   indices are shuffled with a seeded ChaCha8 generator, the first
//!   `ceil(n · test_fraction)` become TEST and the rest TRAIN.
//! - **FIT**: ordinary least squares `log_amount ≈ slope · x + intercept`
//!   over TRAIN.
//! - **SCORED**: predictions over TEST, mean squared error.
//! - **PERSISTED**: `(Actual, Predicted)` for TEST rows in TEST order.
//!
//! The feature is the row position, not anything about the customer: the
//! model is a trend baseline over table order and is kept that way.
//!
//! A failure at any stage ends the run with a [`RegressionError`] naming
//! the stage. There are no retries; the same input and seed fail the same way.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, RegressionError, RegressionFailure, RegressionResult, RegressionStage};
use crate::export::persist_predictions;
use crate::logs::RunLog;
use crate::models::Table;

/// Split parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Share of rows held out for scoring.
    pub test_fraction: f64,
    /// Seed for the split shuffle.
    pub seed: u64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

/// Disjoint train/test row indices (0-based positions in the table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Fitted line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearModel {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearModel {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// One scored TEST row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    #[serde(rename = "Actual")]
    pub actual: f64,
    #[serde(rename = "Predicted")]
    pub predicted: f64,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RegressionReport {
    pub train_rows: usize,
    pub test_rows: usize,
    pub slope: f64,
    pub intercept: f64,
    pub mse: f64,
    pub destination: PathBuf,
}

/// Ordinal feature of the row at 0-based position `idx`.
pub fn ordinal(idx: usize) -> f64 {
    (idx + 1) as f64
}

/// Partition `0..n` into TRAIN and TEST.
///
/// TEST holds `ceil(n · test_fraction)` rows, clamped so both sides keep at
/// least one row. Same `n`, fraction and seed always give the same split.
pub fn split_indices(n: usize, config: &RegressionConfig) -> RegressionResult<Split> {
    let fail = |kind: RegressionFailure| RegressionError::new(RegressionStage::Split, kind);
    if n == 0 {
        return Err(fail(RegressionFailure::EmptyDataset));
    }
    if n < 2 {
        return Err(fail(RegressionFailure::InsufficientData { rows: n }));
    }

    let fraction = config.test_fraction.clamp(0.0, 1.0);
    let n_test = ((n as f64 * fraction).ceil() as usize).clamp(1, n - 1);

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    order.shuffle(&mut rng);

    let train = order.split_off(n_test);
    Ok(Split { train, test: order })
}

/// Least-squares line through `(x, y)` pairs.
///
/// With no spread in `x` (a single training row) the slope is 0 and the
/// intercept is the mean of `y`.
pub fn fit_ols(points: &[(f64, f64)]) -> LinearModel {
    let n = points.len() as f64;
    if points.is_empty() {
        return LinearModel {
            slope: 0.0,
            intercept: 0.0,
        };
    }
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
        let dx = x - mean_x;
        (sxy + dx * (y - mean_y), sxx + dx * dx)
    });

    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    LinearModel {
        slope,
        intercept: mean_y - slope * mean_x,
    }
}

/// Mean of squared residuals. Zero for an empty slice.
pub fn mean_squared_error(predictions: &[Prediction]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    predictions
        .iter()
        .map(|p| (p.actual - p.predicted).powi(2))
        .sum::<f64>()
        / predictions.len() as f64
}

/// Run all stages against a cleaned, feature-engineered table.
pub fn run(
    table: &Table,
    config: &RegressionConfig,
    destination: &Path,
    log: &RunLog,
) -> RegressionResult<RegressionReport> {
    // LOADED
    let targets = load_targets(table).map_err(|kind| {
        log.error(format!("{} ({} rows)", kind, table.len()));
        RegressionError::new(RegressionStage::Loaded, kind)
    })?;
    log.info(format!("Loaded {} rows", targets.len()));

    // SPLIT
    let split = split_indices(targets.len(), config)?;
    log.info(format!(
        "Split {} train / {} test (seed {})",
        split.train.len(),
        split.test.len(),
        config.seed
    ));

    // FIT
    let train_points: Vec<(f64, f64)> = split
        .train
        .iter()
        .map(|&i| (ordinal(i), targets[i]))
        .collect();
    let model = fit_ols(&train_points);
    log.info(format!(
        "Fitted slope {:.6}, intercept {:.6}",
        model.slope, model.intercept
    ));

    // SCORED
    let predictions: Vec<Prediction> = split
        .test
        .iter()
        .map(|&i| Prediction {
            actual: targets[i],
            predicted: model.predict(ordinal(i)),
        })
        .collect();
    let mse = mean_squared_error(&predictions);
    log.success(format!("Model trained successfully. Mean Squared Error: {}", mse));

    // PERSISTED
    persist_predictions(&predictions, destination)
        .map_err(|e| RegressionError::new(RegressionStage::Persisted, e))?;
    log.success(format!("Regression results saved: {}", destination.display()));

    Ok(RegressionReport {
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        slope: model.slope,
        intercept: model.intercept,
        mse,
        destination: destination.to_path_buf(),
    })
}

/// Target column as finite numbers, after the size preconditions.
fn load_targets(table: &Table) -> Result<Vec<f64>, RegressionFailure> {
    if table.is_empty() {
        return Err(RegressionFailure::EmptyDataset);
    }
    if table.len() < 2 {
        return Err(RegressionFailure::InsufficientData { rows: table.len() });
    }
    let idx = table
        .log_amount_index()
        .ok_or_else(|| RegressionFailure::MissingFeature(table.log_amount_name().to_string()))?;

    table
        .numeric_values(idx)?
        .into_iter()
        .enumerate()
        .map(|(i, v)| match v {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(DomainError::NonFiniteAmount { row: i + 1 }.into()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Schema;
    use crate::parser::parse_str;
    use crate::transform::clean::clean;
    use crate::transform::features::add_log_feature;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn engineered(amounts: &[f64]) -> Table {
        let mut csv = String::from("purchase_amount,region,product_category,purchase_frequency\n");
        for a in amounts {
            csv.push_str(&format!("{},A,B,C\n", a));
        }
        let log = RunLog::silent();
        let t = parse_str(&csv, ',', &Schema::default()).unwrap();
        add_log_feature(clean(t, &log), &log).unwrap()
    }

    #[test]
    fn test_split_disjoint_and_complete() {
        let config = RegressionConfig::default();
        for n in [2, 3, 5, 10, 11, 99, 1000] {
            let split = split_indices(n, &config).unwrap();
            let train: HashSet<_> = split.train.iter().copied().collect();
            let test: HashSet<_> = split.test.iter().copied().collect();

            assert!(train.is_disjoint(&test));
            let all: HashSet<_> = train.union(&test).copied().collect();
            assert_eq!(all, (0..n).collect::<HashSet<_>>());
            assert_eq!(split.train.len() + split.test.len(), n);
        }
    }

    #[test]
    fn test_split_proportion() {
        let split = split_indices(1000, &RegressionConfig::default()).unwrap();
        assert_eq!(split.test.len(), 200);

        let split = split_indices(11, &RegressionConfig::default()).unwrap();
        assert_eq!(split.test.len(), 3); // ceil(2.2)

        let split = split_indices(2, &RegressionConfig::default()).unwrap();
        assert_eq!((split.train.len(), split.test.len()), (1, 1));
    }

    #[test]
    fn test_split_reproducible() {
        let config = RegressionConfig {
            test_fraction: 0.2,
            seed: 7,
        };
        assert_eq!(split_indices(50, &config).unwrap(), split_indices(50, &config).unwrap());

        let other = RegressionConfig { seed: 8, ..config };
        assert_ne!(split_indices(50, &config).unwrap(), split_indices(50, &other).unwrap());
    }

    #[test]
    fn test_split_rejects_small_inputs() {
        let config = RegressionConfig::default();
        let err = split_indices(0, &config).unwrap_err();
        assert!(matches!(err.kind, RegressionFailure::EmptyDataset));

        let err = split_indices(1, &config).unwrap_err();
        assert!(matches!(err.kind, RegressionFailure::InsufficientData { rows: 1 }));
    }

    #[test]
    fn test_fit_exact_line() {
        let points: Vec<(f64, f64)> = (1..=5).map(|x| (x as f64, 2.0 * x as f64 + 1.0)).collect();
        let model = fit_ols(&points);
        assert!((model.slope - 2.0).abs() < 1e-12);
        assert!((model.intercept - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_single_point() {
        let model = fit_ols(&[(3.0, 4.5)]);
        assert_eq!(model.slope, 0.0);
        assert_eq!(model.intercept, 4.5);
    }

    #[test]
    fn test_mse() {
        let preds = [
            Prediction {
                actual: 1.0,
                predicted: 2.0,
            },
            Prediction {
                actual: 3.0,
                predicted: 1.0,
            },
        ];
        assert_eq!(mean_squared_error(&preds), 2.5);
    }

    #[test]
    fn test_run_writes_test_rows_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("regression_results.csv");
        let amounts: Vec<f64> = (0..20).map(|i| (i * 7 % 13) as f64 * 10.0).collect();
        let table = engineered(&amounts);
        let config = RegressionConfig::default();

        let report = run(&table, &config, &path, &RunLog::silent()).unwrap();
        assert_eq!(report.test_rows, 4);
        assert_eq!(report.train_rows, 16);
        assert!(report.mse.is_finite());

        let split = split_indices(20, &config).unwrap();
        let idx = table.log_amount_index().unwrap();
        let expected_actuals: Vec<f64> = split
            .test
            .iter()
            .map(|&i| table.rows()[i][idx].as_number().unwrap())
            .collect();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, vec!["Actual", "Predicted"]);
        let actuals: Vec<f64> = reader
            .records()
            .map(|r| r.unwrap()[0].parse().unwrap())
            .collect();
        assert_eq!(actuals, expected_actuals);
    }

    #[test]
    fn test_run_fails_on_empty_and_single_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let log = RunLog::silent();

        let err = run(&engineered(&[]), &RegressionConfig::default(), &path, &log).unwrap_err();
        assert_eq!(err.stage, RegressionStage::Loaded);
        assert!(matches!(err.kind, RegressionFailure::EmptyDataset));

        let err = run(&engineered(&[5.0]), &RegressionConfig::default(), &path, &log).unwrap_err();
        assert!(matches!(err.kind, RegressionFailure::InsufficientData { rows: 1 }));
        assert!(!path.exists());
    }

    #[test]
    fn test_run_requires_log_feature() {
        let dir = tempdir().unwrap();
        let csv = "purchase_amount,region,product_category,purchase_frequency\n1,A,B,C\n2,A,B,C\n";
        let table = parse_str(csv, ',', &Schema::default()).unwrap();

        let err = run(&table, &RegressionConfig::default(), &dir.path().join("o.csv"), &RunLog::silent())
            .unwrap_err();
        assert_eq!(err.stage, RegressionStage::Loaded);
        assert!(matches!(err.kind, RegressionFailure::MissingFeature(ref c) if c == "purchase_amount_log"));
    }

    #[test]
    fn test_run_persist_failure_tagged() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let err = run(
            &engineered(&[1.0, 2.0, 3.0]),
            &RegressionConfig::default(),
            &blocker.join("out.csv"),
            &RunLog::silent(),
        )
        .unwrap_err();
        assert_eq!(err.stage, RegressionStage::Persisted);
    }
}
