//! Delimited-text loader with encoding and delimiter auto-detection.
//!
//! Reads a purchase export into a [`Table`], preserving source row order.
//! Column types are inferred conservatively: a column is numeric only when
//! every non-missing value in it parses as a number. Only header names are
//! trimmed; field text is kept exactly as written.

use std::path::Path;

use crate::error::{LoadError, LoadResult, ParseError};
use crate::logs::RunLog;
use crate::models::{Cell, Column, ColumnKind, Schema, Table};

/// Tokens read as a missing value (the usual spreadsheet/pandas set).
const NA_VALUES: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "#N/A",
    "#N/A N/A", "#NA", "<NA>", "1.#IND", "-1.#IND", "1.#QNAN", "-1.#QNAN",
];

/// Encoding and delimiter the input was read with.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub encoding: String,
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// UTF-8 is decoded strictly; invalid sequences are a parse failure rather
/// than silently replaced.
pub fn decode_content(bytes: &[u8], encoding: &str) -> Result<String, ParseError> {
    let text = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8(bytes.to_vec())
            .map_err(|_| ParseError::Encoding(encoding.to_string()))?,
    };
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// Detect the delimiter by counting occurrences in the first line.
/// Defaults to a comma.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ',';
    let mut best_count = 0;
    for sep in [',', ';', '\t', '|'] {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }
    best_sep
}

fn is_missing(raw: &str) -> bool {
    NA_VALUES.contains(&raw)
}

/// Parse a raw field as a number, as the loader and cleaner both do.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

/// Parse decoded text with an explicit delimiter.
pub fn parse_str(content: &str, delimiter: char, schema: &Schema) -> Result<Table, ParseError> {
    if content.trim().is_empty() {
        return Err(ParseError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .trim(csv::Trim::Headers)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(String::is_empty) {
        return Err(ParseError::EmptyFile);
    }

    let mut raw_rows: Vec<Vec<Option<String>>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        raw_rows.push(
            record
                .iter()
                .map(|field| (!is_missing(field)).then(|| field.to_string()))
                .collect(),
        );
    }

    let kinds: Vec<ColumnKind> = (0..headers.len())
        .map(|col| {
            let numeric = raw_rows
                .iter()
                .filter_map(|row| row[col].as_deref())
                .all(|v| parse_number(v).is_some());
            if numeric {
                ColumnKind::Numeric
            } else {
                ColumnKind::Text
            }
        })
        .collect();

    let rows = raw_rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&kinds)
                .map(|(value, kind)| match (value, kind) {
                    (None, _) => Cell::Missing,
                    (Some(v), ColumnKind::Numeric) => {
                        parse_number(&v).map(Cell::Number).unwrap_or(Cell::Text(v))
                    }
                    (Some(v), ColumnKind::Text) => Cell::Text(v),
                })
                .collect()
        })
        .collect();

    let columns = headers
        .into_iter()
        .zip(kinds)
        .map(|(name, kind)| Column::new(name, kind))
        .collect();

    Table::new(columns, rows, schema)
}

/// Parse bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes(bytes: &[u8], schema: &Schema) -> Result<(Table, SourceInfo), ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::EmptyFile);
    }
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    let table = parse_str(&content, delimiter, schema)?;
    Ok((table, SourceInfo { encoding, delimiter }))
}

/// Load a table from a file.
///
/// Absence is reported as [`LoadError::NotFound`]; anything else that stops
/// the file from being read as a table is [`LoadError::Parse`] carrying the
/// cause. Never panics on bad input.
pub fn load(path: &Path, schema: &Schema, log: &RunLog) -> LoadResult<Table> {
    log.info(format!("📖 Reading {}", path.display()));

    if !path.exists() {
        log.error(format!("File not found: {}", path.display()));
        return Err(LoadError::NotFound(path.to_path_buf()));
    }

    let parse_err = |source: ParseError| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let bytes = std::fs::read(path).map_err(|e| parse_err(e.into()))?;
    let (table, info) = parse_bytes(&bytes, schema).map_err(|e| {
        log.error(format!("Error loading data: {}", e));
        parse_err(e)
    })?;

    log.success(format!(
        "Loaded {} rows x {} columns (encoding {}, delimiter '{}')",
        table.len(),
        table.columns().len(),
        info.encoding,
        format_delimiter(info.delimiter)
    ));
    Ok(table)
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
