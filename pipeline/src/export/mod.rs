//! Output artifacts: cleaned table, aggregate workbook, prediction table.
//!
//! Every writer renders into a temporary file next to the destination and
//! renames it into place only once the content is complete. A failed export
//! therefore never leaves something at the destination that looks like a
//! finished output; an existing file is replaced only on success.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use rust_xlsxwriter::Workbook;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{ExportError, ExportResult};
use crate::models::{AggregateTable, Table};
use crate::regression::Prediction;

/// Header of the total column in every aggregate sheet.
pub const TOTAL_SALES_COLUMN: &str = "total_sales";

/// Write the table as delimited text: header row in column order, no index
/// column. Overwrites `destination`.
pub fn persist_table(table: &Table, destination: &Path) -> ExportResult<()> {
    write_atomic(destination, |file| {
        let mut writer = csv::Writer::from_writer(file);
        let csv_err = |source| ExportError::Csv {
            path: destination.to_path_buf(),
            source,
        };

        writer.write_record(table.column_names()).map_err(csv_err)?;
        for row in table.rows() {
            writer
                .write_record(row.iter().map(|cell| cell.render()))
                .map_err(csv_err)?;
        }
        writer.flush().map_err(|source| ExportError::Io {
            path: destination.to_path_buf(),
            source,
        })
    })
}

/// Write one sheet per aggregate table, named by its dimension
/// (`Region Sales`, `Category Sales`, `Frequency Sales`), each with its own
/// `(<dimension>, total_sales)` header. Overwrites `destination`.
///
/// On failure nothing is left at the destination; callers retry the whole
/// export, there is no partial resume.
pub fn export_aggregates(tables: &[AggregateTable], destination: &Path) -> ExportResult<()> {
    let xlsx_err = |source| ExportError::Workbook {
        path: destination.to_path_buf(),
        source,
    };

    let mut workbook = Workbook::new();
    for table in tables {
        let sheet = workbook.add_worksheet();
        sheet.set_name(table.sheet_name()).map_err(xlsx_err)?;
        sheet.write_string(0, 0, table.key_column.as_str()).map_err(xlsx_err)?;
        sheet.write_string(0, 1, TOTAL_SALES_COLUMN).map_err(xlsx_err)?;

        for (i, row) in table.rows.iter().enumerate() {
            let r = (i + 1) as u32;
            sheet.write_string(r, 0, row.key.as_str()).map_err(xlsx_err)?;
            sheet.write_number(r, 1, row.total_sales).map_err(xlsx_err)?;
        }
    }
    let bytes = workbook.save_to_buffer().map_err(xlsx_err)?;

    write_atomic(destination, |file| {
        file.write_all(&bytes).map_err(|source| ExportError::Io {
            path: destination.to_path_buf(),
            source,
        })
    })
}

/// Write `(Actual, Predicted)` pairs in the order given. Overwrites `destination`.
pub fn persist_predictions(predictions: &[Prediction], destination: &Path) -> ExportResult<()> {
    write_atomic(destination, |file| {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        let csv_err = |source| ExportError::Csv {
            path: destination.to_path_buf(),
            source,
        };

        writer.write_record(["Actual", "Predicted"]).map_err(csv_err)?;
        for prediction in predictions {
            writer.serialize(prediction).map_err(csv_err)?;
        }
        writer.flush().map_err(|source| ExportError::Io {
            path: destination.to_path_buf(),
            source,
        })
    })
}

/// Pretty-printed JSON, e.g. the run report.
pub fn persist_json<T: Serialize>(value: &T, destination: &Path) -> ExportResult<()> {
    write_atomic(destination, |file| {
        serde_json::to_writer_pretty(&mut *file, value)
            .map_err(std::io::Error::from)
            .and_then(|()| file.write_all(b"\n"))
            .map_err(|source| ExportError::Io {
                path: destination.to_path_buf(),
                source,
            })
    })
}

/// Render into a sibling temp file, then rename over `destination`.
fn write_atomic(
    destination: &Path,
    render: impl FnOnce(&mut File) -> ExportResult<()>,
) -> ExportResult<()> {
    let io_err = |source| ExportError::Io {
        path: destination.to_path_buf(),
        source,
    };

    let dir = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    render(tmp.as_file_mut())?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(destination).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::RunLog;
    use crate::models::{AggregateRow, Dimension, Schema};
    use crate::parser::parse_str;
    use crate::transform::clean::clean;
    use crate::transform::features::add_log_feature;
    use crate::transform::grouper::aggregate_all;
    use tempfile::tempdir;

    fn sample_table() -> Table {
        let csv = "customer_id,purchase_amount,region,product_category,purchase_frequency\n\
                   1,10,North,Books,Weekly\n2,,South,Toys,Daily\n3,0,South,\"Home, Garden\",Monthly\n";
        let t = parse_str(csv, ',', &Schema::default()).unwrap();
        let log = RunLog::silent();
        add_log_feature(clean(t, &log), &log).unwrap()
    }

    #[test]
    fn test_persist_table_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clean.csv");

        persist_table(&sample_table(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "customer_id,purchase_amount,region,product_category,purchase_frequency,purchase_amount_log"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1,10,North,Books,Weekly,"));
        assert_eq!(lines[2], "3,0,South,\"Home, Garden\",Monthly,0");
    }

    #[test]
    fn test_persist_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clean.csv");
        std::fs::write(&path, "stale content that is much longer than the new file\n".repeat(50))
            .unwrap();

        persist_table(&sample_table(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("stale"));
    }

    #[test]
    fn test_persisted_table_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/out/clean.csv");
        let table = sample_table();
        persist_table(&table, &path).unwrap();

        let log = RunLog::silent();
        let reloaded = crate::parser::load(&path, &Schema::default(), &log).unwrap();
        assert_eq!(reloaded.len(), table.len());
        assert_eq!(reloaded.column_names(), table.column_names());
    }

    /// Read back cell text and numbers of one sheet from the written xlsx.
    struct SheetReader {
        archive: zip::ZipArchive<std::fs::File>,
        shared: Vec<String>,
    }

    impl SheetReader {
        fn open(path: &Path) -> Self {
            let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
            let strings = Self::entry(&mut archive, "xl/sharedStrings.xml");
            let si = regex::Regex::new(r"<si><t[^>]*>([^<]*)</t></si>").unwrap();
            let shared = si.captures_iter(&strings).map(|c| c[1].to_string()).collect();
            Self { archive, shared }
        }

        fn entry(archive: &mut zip::ZipArchive<std::fs::File>, name: &str) -> String {
            use std::io::Read;
            let mut content = String::new();
            archive.by_name(name).unwrap().read_to_string(&mut content).unwrap();
            content
        }

        fn workbook(&mut self) -> String {
            Self::entry(&mut self.archive, "xl/workbook.xml")
        }

        fn text(&mut self, sheet: usize, cell: &str) -> String {
            let xml = Self::entry(&mut self.archive, &format!("xl/worksheets/sheet{}.xml", sheet));
            let re = regex::Regex::new(&format!(r#"<c r="{}"[^>]*t="s"[^>]*><v>(\d+)</v>"#, cell)).unwrap();
            let idx: usize = re.captures(&xml).unwrap()[1].parse().unwrap();
            self.shared[idx].clone()
        }

        fn number(&mut self, sheet: usize, cell: &str) -> f64 {
            let xml = Self::entry(&mut self.archive, &format!("xl/worksheets/sheet{}.xml", sheet));
            let re = regex::Regex::new(&format!(r#"<c r="{}"[^>]*><v>([^<]+)</v>"#, cell)).unwrap();
            re.captures(&xml).unwrap()[1].parse().unwrap()
        }
    }

    #[test]
    fn test_export_workbook() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aggregated_data.xlsx");
        let tables = aggregate_all(&sample_table()).unwrap();

        export_aggregates(&tables, &path).unwrap();

        let mut book = SheetReader::open(&path);
        let workbook = book.workbook();
        let positions: Vec<usize> = ["Region Sales", "Category Sales", "Frequency Sales"]
            .iter()
            .map(|name| workbook.find(&format!(r#"name="{}""#, name)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "sheet order");

        for (sheet, key_column) in [(1, "region"), (2, "product_category"), (3, "purchase_frequency")] {
            assert_eq!(book.text(sheet, "A1"), key_column);
            assert_eq!(book.text(sheet, "B1"), TOTAL_SALES_COLUMN);
        }

        assert_eq!(book.text(1, "A2"), "North");
        assert_eq!(book.number(1, "B2"), 10.0);
        assert_eq!(book.text(1, "A3"), "South");
        assert_eq!(book.number(1, "B3"), 0.0);
        assert_eq!(book.text(2, "A2"), "Books");
        assert_eq!(book.text(2, "A3"), "Home, Garden");
    }

    #[test]
    fn test_failed_export_leaves_no_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        // Two sheets with the same name cannot be saved.
        let table = AggregateTable {
            dimension: Dimension::Region,
            key_column: "region".into(),
            rows: vec![AggregateRow {
                key: "A".into(),
                total_sales: 1.0,
            }],
        };

        let err = export_aggregates(&[table.clone(), table], &path).unwrap_err();
        assert_eq!(err.path(), path.as_path());
        assert!(!path.exists());
    }

    #[test]
    fn test_export_failure_isolated_from_clean_export() {
        let dir = tempdir().unwrap();
        let clean_path = dir.path().join("clean.csv");
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "file").unwrap();
        let book_path = blocker.join("aggregated_data.xlsx");

        let table = sample_table();
        let clean_result = persist_table(&table, &clean_path);
        let book_result = export_aggregates(&aggregate_all(&table).unwrap(), &book_path);

        assert!(clean_result.is_ok());
        assert!(matches!(book_result, Err(ExportError::Io { .. })));
        assert!(clean_path.exists());
    }

    #[test]
    fn test_predictions_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("regression_results.csv");
        let predictions = vec![
            Prediction {
                actual: 1.5,
                predicted: 1.25,
            },
            Prediction {
                actual: 2.0,
                predicted: 2.5,
            },
        ];

        persist_predictions(&predictions, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Actual,Predicted\n1.5,1.25\n2.0,2.5\n");
    }

    #[test]
    fn test_persist_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");

        persist_json(&serde_json::json!({ "rows": 3 }), &path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["rows"], 3);
    }
}
