//! Derived features and ordering.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::logs::RunLog;
use crate::models::Table;

/// Add `<amount>_log = ln(amount + 1)` to every row.
///
/// Requires a cleaned table: every amount must be a finite, non-negative
/// number. A negative amount fails with [`DomainError::NegativeAmount`]
/// instead of producing NaN. If the column already exists it is recomputed.
pub fn add_log_feature(mut table: Table, log: &RunLog) -> DomainResult<Table> {
    let amounts = table.numeric_values(table.amount_index())?;

    let mut values = Vec::with_capacity(amounts.len());
    for (i, amount) in amounts.into_iter().enumerate() {
        let row = i + 1;
        let value = match amount {
            Some(v) if !v.is_finite() => return Err(DomainError::NonFiniteAmount { row }),
            Some(v) if v < 0.0 => {
                log.error(format!("Negative purchase amount {} at row {}", v, row));
                return Err(DomainError::NegativeAmount { row, value: v });
            }
            Some(v) => v.ln_1p(),
            None => return Err(DomainError::NonFiniteAmount { row }),
        };
        values.push(value);
    }

    table.put_log_amount(values);
    log.success(format!(
        "Derived '{}' for {} rows",
        table.log_amount_name(),
        table.len()
    ));
    Ok(table)
}

/// Ordering applied to the cleaned table before it is handed downstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Keep source order.
    None,
    Ascending,
    /// Largest purchases first; the cleaned export and the regressor's
    /// ordinal feature both follow this order unless configured otherwise.
    #[default]
    Descending,
}

/// Stable sort by amount. Rows with equal amounts keep their relative order.
///
/// The ordinal feature used by the regressor is the row position after
/// this step, so any order other than [`SortOrder::None`] changes it.
pub fn sort_by_amount(mut table: Table, order: SortOrder, log: &RunLog) -> DomainResult<Table> {
    if order == SortOrder::None {
        return Ok(table);
    }

    let amount = table.amount_index();
    // Validates the column before reordering.
    table.numeric_values(amount)?;

    let key = |row: &Vec<crate::models::Cell>| row[amount].as_number().unwrap_or(f64::NAN);
    match order {
        SortOrder::Ascending => table
            .rows_mut()
            .sort_by(|a, b| key(a).total_cmp(&key(b))),
        SortOrder::Descending => table
            .rows_mut()
            .sort_by(|a, b| key(b).total_cmp(&key(a))),
        SortOrder::None => {}
    }
    log.info(format!("Sorted {} rows by amount ({:?})", table.len(), order));
    Ok(table)
}
