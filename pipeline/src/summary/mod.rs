//! Data overview: the numbers an analyst looks at before plotting.
//!
//! Missing-value counts come from the raw table; everything else from the
//! cleaned one. Nothing here is rendered; callers print or serialize the
//! [`Overview`].

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::models::{Dimension, Table};

/// `describe()`-style statistics of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1); NaN below two values.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl Describe {
    /// `None` when there are no values.
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let std = if sorted.len() > 1 {
            (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            f64::NAN
        };

        Some(Self {
            count: sorted.len(),
            mean,
            std,
            min: sorted[0],
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Linear interpolation between closest ranks; `sorted` must be non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Summary of one pipeline input.
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub raw_rows: usize,
    pub clean_rows: usize,
    pub columns: Vec<String>,
    /// Missing cells per column in the raw table.
    pub missing: BTreeMap<String, usize>,
    pub amount: Option<Describe>,
    pub log_amount: Option<Describe>,
    /// Mean amount per region of the cleaned table.
    pub mean_by_region: BTreeMap<String, f64>,
    /// Row count per purchase frequency of the cleaned table.
    pub frequency_counts: BTreeMap<String, usize>,
}

/// Build the overview of a run's raw and cleaned tables.
pub fn overview(raw: &Table, cleaned: &Table) -> Overview {
    let missing = raw
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let n = raw.rows().iter().filter(|r| r[i].is_missing()).count();
            (c.name.clone(), n)
        })
        .collect();

    let numbers = |idx: usize| -> Vec<f64> {
        cleaned
            .rows()
            .iter()
            .filter_map(|r| r[idx].as_number())
            .collect()
    };

    let amount_idx = cleaned.amount_index();
    let region_idx = cleaned.dimension_index(Dimension::Region);
    let mut region_sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for row in cleaned.rows() {
        if let Some(v) = row[amount_idx].as_number() {
            let entry = region_sums.entry(row[region_idx].render()).or_insert((0.0, 0));
            entry.0 += v;
            entry.1 += 1;
        }
    }

    let freq_idx = cleaned.dimension_index(Dimension::PurchaseFrequency);
    let mut frequency_counts = BTreeMap::new();
    for row in cleaned.rows() {
        *frequency_counts.entry(row[freq_idx].render()).or_insert(0) += 1;
    }

    Overview {
        raw_rows: raw.len(),
        clean_rows: cleaned.len(),
        columns: raw.column_names().iter().map(|s| s.to_string()).collect(),
        missing,
        amount: Describe::of(&numbers(amount_idx)),
        log_amount: cleaned
            .log_amount_index()
            .and_then(|idx| Describe::of(&numbers(idx))),
        mean_by_region: region_sums
            .into_iter()
            .map(|(k, (sum, n))| (k, sum / n as f64))
            .collect(),
        frequency_counts,
    }
}

impl fmt::Display for Overview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Data Info ---")?;
        writeln!(f, "Rows: {} raw, {} clean", self.raw_rows, self.clean_rows)?;
        writeln!(f, "Columns: {}", self.columns.join(", "))?;

        writeln!(f, "\n--- Missing Values ---")?;
        for (col, n) in &self.missing {
            writeln!(f, "{:<24} {}", col, n)?;
        }

        for (label, stats) in [("purchase amount", &self.amount), ("log purchase amount", &self.log_amount)] {
            if let Some(d) = stats {
                writeln!(f, "\n--- Description ({}) ---", label)?;
                writeln!(f, "count {:>14}", d.count)?;
                for (name, v) in [
                    ("mean", d.mean),
                    ("std", d.std),
                    ("min", d.min),
                    ("25%", d.q25),
                    ("50%", d.median),
                    ("75%", d.q75),
                    ("max", d.max),
                ] {
                    writeln!(f, "{:<5} {:>14.4}", name, v)?;
                }
            }
        }

        writeln!(f, "\n--- Average Spending by Region ---")?;
        for (region, mean) in &self.mean_by_region {
            writeln!(f, "{:<24} {:.2}", region, mean)?;
        }

        writeln!(f, "\n--- Purchase Frequency ---")?;
        for (freq, n) in &self.frequency_counts {
            writeln!(f, "{:<24} {}", freq, n)?;
        }
        Ok(())
    }
}
