//! Sales totals per dimension.
//!
//! ```text
//! Cleaned rows                          Aggregate (by region)
//! ┌──────────────────────────┐         ┌──────────────────────┐
//! │ amount: 10, region: A    │         │ region: A  total: 30 │
//! │ amount: 20, region: A    │    →    │ region: B  total:  5 │
//! │ amount:  5, region: B    │         └──────────────────────┘
//! └──────────────────────────┘
//! ```
//!
//! Keys are grouped exactly as they appear: no case folding or whitespace
//! normalization, so `"North"` and `"north"` are separate groups. Output rows
//! are sorted by key.

use std::collections::BTreeMap;

use crate::error::DomainResult;
use crate::models::{AggregateRow, AggregateTable, Cell, Dimension, Table};

/// Sum the amount column per distinct value of `dimension`.
///
/// Each call owns its accumulator; calls for different dimensions over the
/// same table are independent. Rows whose key or amount is missing are
/// skipped (a cleaned table has none).
pub fn aggregate(table: &Table, dimension: Dimension) -> DomainResult<AggregateTable> {
    let amounts = table.numeric_values(table.amount_index())?;
    let key_idx = table.dimension_index(dimension);

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for (row, amount) in table.rows().iter().zip(amounts) {
        let key = &row[key_idx];
        if let (false, Some(amount)) = (key.is_missing(), amount) {
            *totals.entry(group_key(key)).or_insert(0.0) += amount;
        }
    }

    Ok(AggregateTable {
        dimension,
        key_column: table.dimension_name(dimension).to_string(),
        rows: totals
            .into_iter()
            .map(|(key, total_sales)| AggregateRow { key, total_sales })
            .collect(),
    })
}

/// Aggregate every dimension, in sheet order.
pub fn aggregate_all(table: &Table) -> DomainResult<Vec<AggregateTable>> {
    Dimension::ALL
        .iter()
        .map(|d| aggregate(table, *d))
        .collect()
}

fn group_key(cell: &Cell) -> String {
    cell.render()
}
