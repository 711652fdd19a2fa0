//! Record cleaning.
//!
//! Two passes, always in this order:
//!
//! 1. drop every row that has a missing value in any column (no imputation);
//! 2. coerce the amount column to a finite number, treating anything that
//!    fails coercion as missing, and drop those rows too.
//!
//! Cleaning an already clean table returns it unchanged.

use serde::Serialize;

use crate::logs::RunLog;
use crate::models::{Cell, ColumnKind, Table};
use crate::parser::parse_number;

/// Row counts observed while cleaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanStats {
    pub input_rows: usize,
    pub dropped_missing: usize,
    pub dropped_unparseable: usize,
    pub output_rows: usize,
}

impl CleanStats {
    pub fn dropped(&self) -> usize {
        self.dropped_missing + self.dropped_unparseable
    }
}

/// Clean a table. See [`clean_with_stats`].
pub fn clean(table: Table, log: &RunLog) -> Table {
    clean_with_stats(table, log).0
}

/// Clean a table and report how many rows each pass removed.
pub fn clean_with_stats(mut table: Table, log: &RunLog) -> (Table, CleanStats) {
    let input_rows = table.len();

    table.retain_rows(|row| !row.iter().any(Cell::is_missing));
    let dropped_missing = input_rows - table.len();
    log.info(format!(
        "Dropped {} of {} rows with missing values",
        dropped_missing, input_rows
    ));

    let amount = table.amount_index();
    for row in table.rows_mut().iter_mut() {
        row[amount] = coerce_amount(&row[amount]);
    }
    table.set_kind(amount, ColumnKind::Numeric);

    let before_second_pass = table.len();
    table.retain_rows(|row| !row[amount].is_missing());
    let dropped_unparseable = before_second_pass - table.len();
    if dropped_unparseable > 0 {
        log.warning(format!(
            "Dropped {} rows with non-numeric '{}'",
            dropped_unparseable,
            table.amount_name()
        ));
    } else {
        log.info(format!("All '{}' values numeric", table.amount_name()));
    }

    let stats = CleanStats {
        input_rows,
        dropped_missing,
        dropped_unparseable,
        output_rows: table.len(),
    };
    log.success(format!("{} clean rows", stats.output_rows));
    (table, stats)
}

/// Strict numeric coercion: finite numbers survive, everything else is missing.
fn coerce_amount(cell: &Cell) -> Cell {
    let value = match cell {
        Cell::Number(v) => Some(*v),
        Cell::Text(s) => parse_number(s),
        Cell::Missing => None,
    };
    match value {
        Some(v) if v.is_finite() => Cell::Number(v),
        _ => Cell::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::{drain, LogLevel};
    use crate::models::Schema;
    use crate::parser::parse_str;

    const HEADER: &str = "purchase_amount,region,product_category,purchase_frequency";

    fn table(body: &str) -> Table {
        parse_str(&format!("{HEADER}\n{body}"), ',', &Schema::default()).unwrap()
    }

    #[test]
    fn test_drops_missing_then_unparseable() {
        let t = table("10,A,Books,Weekly\n,B,Toys,Monthly\nabc,C,Toys,Weekly\n5,D,,Weekly\ninf,E,Toys,Daily\n");
        let log = RunLog::silent();
        let (cleaned, stats) = clean_with_stats(t, &log);

        assert_eq!(cleaned.len(), 1);
        assert_eq!(
            stats,
            CleanStats {
                input_rows: 5,
                dropped_missing: 2,
                dropped_unparseable: 2,
                output_rows: 1,
            }
        );
        assert_eq!(cleaned.rows()[0][0], Cell::Number(10.0));
        assert_eq!(cleaned.columns()[0].kind, ColumnKind::Numeric);
    }

    #[test]
    fn test_idempotent() {
        let t = table("10,A,Books,Weekly\n,B,Toys,Monthly\nx,C,Toys,Weekly\n7.25,D,Toys,Daily\n");
        let log = RunLog::silent();
        let once = clean(t, &log);
        let twice = clean(once.clone(), &log);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_row_count_never_grows() {
        let clean_input = table("1,A,B,C\n2,A,B,C\n");
        let log = RunLog::silent();
        let (out, stats) = clean_with_stats(clean_input, &log);
        assert_eq!(out.len(), 2);
        assert_eq!(stats.dropped(), 0);

        let dirty = table("1,A,B,C\n,A,B,C\n");
        let (out, stats) = clean_with_stats(dirty, &log);
        assert!(out.len() < stats.input_rows);
    }

    #[test]
    fn test_keeps_source_order() {
        let t = table("3,A,B,C\n1,A,B,C\n2,A,B,C\n");
        let log = RunLog::silent();
        let out = clean(t, &log);
        let amounts: Vec<_> = out.rows().iter().map(|r| r[0].as_number().unwrap()).collect();
        assert_eq!(amounts, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_reports_counts() {
        let t = table("1,A,B,C\nbad,A,B,C\n");
        let log = RunLog::silent();
        let mut rx = log.subscribe();
        clean(t, &log.for_stage("clean"));

        let entries = drain(&mut rx);
        assert!(entries.iter().all(|e| e.stage == "clean"));
        assert!(entries
            .iter()
            .any(|e| e.level == LogLevel::Warning && e.message.contains("Dropped 1 rows")));
    }
}
