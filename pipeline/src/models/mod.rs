//! Domain models for the purchase analysis pipeline.
//!
//! - [`Cell`] - a single typed value, possibly missing
//! - [`Column`] / [`ColumnKind`] - named, typed columns
//! - [`Schema`] - expected column names and their semantic roles
//! - [`Table`] - rows of cells with a layout resolved against a schema
//! - [`Dimension`] - categorical grouping columns
//! - [`AggregateTable`] - per-dimension sales totals

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::ParseError;

// =============================================================================
// Cells and columns
// =============================================================================

/// A single table value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Numeric value, if the cell holds one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Text form used for grouping keys and delimited output.
    /// Missing cells render as the empty string.
    pub fn render(&self) -> String {
        match self {
            Cell::Missing => String::new(),
            Cell::Number(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

// =============================================================================
// Dimensions
// =============================================================================

/// Categorical column used as a grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Region,
    ProductCategory,
    PurchaseFrequency,
}

impl Dimension {
    /// All dimensions, in workbook sheet order.
    pub const ALL: [Dimension; 3] = [
        Dimension::Region,
        Dimension::ProductCategory,
        Dimension::PurchaseFrequency,
    ];

    /// Workbook sheet holding this dimension's totals.
    pub fn sheet_name(&self) -> &'static str {
        match self {
            Self::Region => "Region Sales",
            Self::ProductCategory => "Category Sales",
            Self::PurchaseFrequency => "Frequency Sales",
        }
    }

    fn slot(&self) -> usize {
        match self {
            Self::Region => 0,
            Self::ProductCategory => 1,
            Self::PurchaseFrequency => 2,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Region => "region",
            Self::ProductCategory => "product_category",
            Self::PurchaseFrequency => "purchase_frequency",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Source column names for the columns the pipeline relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub amount: String,
    pub region: String,
    pub product_category: String,
    pub purchase_frequency: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            amount: "purchase_amount".to_string(),
            region: "region".to_string(),
            product_category: "product_category".to_string(),
            purchase_frequency: "purchase_frequency".to_string(),
        }
    }
}

/// Semantic role of a schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Amount,
    Dimension(Dimension),
}

/// Expected columns of the purchase table, checked once when a table is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Vec<(String, Role)>,
}

impl Schema {
    pub fn new(names: &ColumnNames) -> Self {
        Self {
            fields: vec![
                (names.amount.clone(), Role::Amount),
                (names.region.clone(), Role::Dimension(Dimension::Region)),
                (
                    names.product_category.clone(),
                    Role::Dimension(Dimension::ProductCategory),
                ),
                (
                    names.purchase_frequency.clone(),
                    Role::Dimension(Dimension::PurchaseFrequency),
                ),
            ],
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, Role)> {
        self.fields.iter().map(|(name, role)| (name.as_str(), *role))
    }

    /// Name of the derived log column for this schema's amount column.
    pub fn log_amount_name(&self) -> String {
        let amount = self
            .fields
            .iter()
            .find(|(_, role)| *role == Role::Amount)
            .map(|(name, _)| name.as_str())
            .unwrap_or("purchase_amount");
        format!("{}_log", amount)
    }

    /// Resolve column positions, rejecting duplicate or absent columns.
    fn resolve(&self, columns: &[Column]) -> Result<Layout, ParseError> {
        let mut seen = HashSet::new();
        for column in columns {
            if !seen.insert(column.name.as_str()) {
                return Err(ParseError::DuplicateColumn(column.name.clone()));
            }
        }

        let position = |name: &str| {
            columns
                .iter()
                .position(|c| c.name == name)
                .ok_or_else(|| ParseError::MissingColumn(name.to_string()))
        };

        let mut amount = 0;
        let mut dimensions = [0usize; 3];
        for (name, role) in self.fields() {
            let idx = position(name)?;
            match role {
                Role::Amount => amount = idx,
                Role::Dimension(d) => dimensions[d.slot()] = idx,
            }
        }

        let log_name = self.log_amount_name();
        let log_amount = columns.iter().position(|c| c.name == log_name);

        Ok(Layout {
            amount,
            dimensions,
            log_amount,
        })
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new(&ColumnNames::default())
    }
}

/// Column positions resolved against a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq)]
struct Layout {
    amount: usize,
    dimensions: [usize; 3],
    log_amount: Option<usize>,
}

// =============================================================================
// Table
// =============================================================================

/// Ordered rows with named, typed columns.
///
/// A table can only be built through [`Table::new`], which validates the
/// column set against a [`Schema`]; stages use the resolved positions
/// instead of looking columns up by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
    layout: Layout,
    log_name: String,
}

impl Table {
    pub fn new(
        columns: Vec<Column>,
        rows: Vec<Vec<Cell>>,
        schema: &Schema,
    ) -> Result<Self, ParseError> {
        let layout = schema.resolve(&columns)?;
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ParseError::RaggedRow {
                    row: i + 1,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self {
            columns,
            rows,
            layout,
            log_name: schema.log_amount_name(),
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn amount_index(&self) -> usize {
        self.layout.amount
    }

    pub fn amount_name(&self) -> &str {
        &self.columns[self.layout.amount].name
    }

    pub fn dimension_index(&self, dimension: Dimension) -> usize {
        self.layout.dimensions[dimension.slot()]
    }

    pub fn dimension_name(&self, dimension: Dimension) -> &str {
        &self.columns[self.dimension_index(dimension)].name
    }

    /// Position of the derived log column, once it exists.
    pub fn log_amount_index(&self) -> Option<usize> {
        self.layout.log_amount
    }

    pub fn log_amount_name(&self) -> &str {
        &self.log_name
    }

    /// Values of a column, `None` for missing cells.
    ///
    /// Fails on the first text cell: the column is expected to be numeric.
    pub fn numeric_values(&self, column: usize) -> Result<Vec<Option<f64>>, crate::error::DomainError> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| match &row[column] {
                Cell::Missing => Ok(None),
                Cell::Number(v) => Ok(Some(*v)),
                Cell::Text(s) => Err(crate::error::DomainError::NotNumeric {
                    column: self.columns[column].name.clone(),
                    row: i + 1,
                    value: s.clone(),
                }),
            })
            .collect()
    }

    pub(crate) fn retain_rows(&mut self, keep: impl FnMut(&Vec<Cell>) -> bool) {
        self.rows.retain(keep);
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Vec<Cell>> {
        &mut self.rows
    }

    pub(crate) fn set_kind(&mut self, column: usize, kind: ColumnKind) {
        self.columns[column].kind = kind;
    }

    /// Overwrite the derived log column, appending it if absent.
    pub(crate) fn put_log_amount(&mut self, values: Vec<f64>) {
        let idx = match self.layout.log_amount {
            Some(idx) => {
                self.columns[idx].kind = ColumnKind::Numeric;
                idx
            }
            None => {
                self.columns
                    .push(Column::new(self.log_name.clone(), ColumnKind::Numeric));
                for row in &mut self.rows {
                    row.push(Cell::Missing);
                }
                self.columns.len() - 1
            }
        };
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = Cell::Number(value);
        }
        self.layout.log_amount = Some(idx);
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// One group of an aggregate table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: String,
    pub total_sales: f64,
}

/// Sum of purchase amounts per distinct value of one dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateTable {
    pub dimension: Dimension,
    /// Header of the key column (the dimension's source column name).
    pub key_column: String,
    pub rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn sheet_name(&self) -> &'static str {
        self.dimension.sheet_name()
    }

    pub fn total(&self) -> f64 {
        self.rows.iter().map(|r| r.total_sales).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<Column> {
        names
            .iter()
            .map(|n| Column::new(*n, ColumnKind::Text))
            .collect()
    }

    #[test]
    fn test_layout_resolves_any_column_order() {
        let cols = columns(&[
            "customer",
            "region",
            "purchase_frequency",
            "purchase_amount",
            "product_category",
        ]);
        let table = Table::new(cols, vec![], &Schema::default()).unwrap();

        assert_eq!(table.amount_index(), 3);
        assert_eq!(table.dimension_index(Dimension::Region), 1);
        assert_eq!(table.dimension_index(Dimension::ProductCategory), 4);
        assert_eq!(table.dimension_index(Dimension::PurchaseFrequency), 2);
        assert_eq!(table.log_amount_index(), None);
    }

    #[test]
    fn test_missing_column_rejected() {
        let cols = columns(&["purchase_amount", "region", "product_category"]);
        let err = Table::new(cols, vec![], &Schema::default()).unwrap_err();
        assert!(matches!(err, ParseError::MissingColumn(c) if c == "purchase_frequency"));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let cols = columns(&[
            "purchase_amount",
            "region",
            "region",
            "product_category",
            "purchase_frequency",
        ]);
        let err = Table::new(cols, vec![], &Schema::default()).unwrap_err();
        assert!(matches!(err, ParseError::DuplicateColumn(c) if c == "region"));
    }

    #[test]
    fn test_ragged_row_rejected() {
        let cols = columns(&["purchase_amount", "region", "product_category", "purchase_frequency"]);
        let rows = vec![vec![Cell::Number(1.0), Cell::Text("A".into())]];
        let err = Table::new(cols, rows, &Schema::default()).unwrap_err();
        assert!(matches!(err, ParseError::RaggedRow { row: 1, expected: 4, found: 2 }));
    }

    #[test]
    fn test_custom_column_names() {
        let names = ColumnNames {
            amount: "amount".into(),
            ..ColumnNames::default()
        };
        let schema = Schema::new(&names);
        assert_eq!(schema.log_amount_name(), "amount_log");

        let cols = columns(&["amount", "region", "product_category", "purchase_frequency"]);
        let table = Table::new(cols, vec![], &schema).unwrap();
        assert_eq!(table.amount_name(), "amount");
    }

    #[test]
    fn test_sheet_names() {
        let sheets: Vec<_> = Dimension::ALL.iter().map(|d| d.sheet_name()).collect();
        assert_eq!(sheets, vec!["Region Sales", "Category Sales", "Frequency Sales"]);
    }
}
