//! File decoding for roster imports.
//!
//! A roster file arrives as a byte stream plus the name the user picked it
//! under. The extension selects the strategy; both strategies produce the same
//! [`RawRow`] shape, keyed by the header row.

use std::fmt;
use std::io::{Cursor, Read};
use std::sync::Arc;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use tracing::{debug, warn};

const CSV_MISSING_HEADER: &str = "CSV file must have a header row. Please check your file format.";
const EMPTY_SPREADSHEET: &str = "Excel file is empty or contains no data.";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Unsupported file format. Please use CSV (.csv) or Excel (.xlsx, .xls) files.")]
    UnsupportedFormat,

    #[error("{0}")]
    MissingHeader(&'static str),

    #[error("Error parsing {format} file: {message}")]
    Malformed {
        format: SourceFormat,
        message: String,
    },

    #[error("Error reading file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Spreadsheet,
}

impl SourceFormat {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let lower = file_name.trim().to_ascii_lowercase();
        if lower.ends_with(".csv") {
            Some(Self::Csv)
        } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
            Some(Self::Spreadsheet)
        } else {
            None
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => f.write_str("CSV"),
            Self::Spreadsheet => f.write_str("Excel"),
        }
    }
}

/// One source row: header name to trimmed cell text, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    line: usize,
    headers: Arc<[String]>,
    values: Vec<String>,
}

impl RawRow {
    pub fn new(line: usize, headers: Arc<[String]>, values: Vec<String>) -> Self {
        Self {
            line,
            headers,
            values,
        }
    }

    /// 1-based line (CSV) or sheet row number the row came from.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Cell under `column` (case-insensitive). `None` when the column is
    /// unknown or the row is too short to reach it.
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = self
            .headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(column))?;
        self.values.get(idx).map(String::as_str)
    }

    /// Like [`RawRow::get`], but blank cells read as absent.
    pub fn non_blank(&self, column: &str) -> Option<&str> {
        self.get(column).map(str::trim).filter(|v| !v.is_empty())
    }
}

/// A row the decoder could not turn into a [`RawRow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDecodeIssue {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub format: SourceFormat,
    pub headers: Arc<[String]>,
    pub rows: Vec<RawRow>,
    pub failures: Vec<RowDecodeIssue>,
}

/// Decode a roster file.
///
/// The reader is consumed; it is dropped before this returns on every path,
/// including the unsupported-format one where it is never read.
pub fn decode<R: Read>(mut reader: R, file_name: &str) -> Result<Decoded, DecodeError> {
    let Some(format) = SourceFormat::from_file_name(file_name) else {
        warn!(file_name, "unsupported roster file type");
        return Err(DecodeError::UnsupportedFormat);
    };
    debug!(file_name, %format, "decoding roster file");

    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    drop(reader);

    let decoded = match format {
        SourceFormat::Csv => decode_csv(&bytes)?,
        SourceFormat::Spreadsheet => decode_spreadsheet(bytes)?,
    };
    debug!(
        format = %decoded.format,
        columns = ?decoded.headers,
        rows = decoded.rows.len(),
        failures = decoded.failures.len(),
        "decoded roster file"
    );
    Ok(decoded)
}

fn decode_csv(bytes: &[u8]) -> Result<Decoded, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| DecodeError::Malformed {
            format: SourceFormat::Csv,
            message: e.to_string(),
        })?
        .iter()
        .map(clean_header)
        .collect::<Vec<_>>();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(DecodeError::MissingHeader(CSV_MISSING_HEADER));
    }
    let headers: Arc<[String]> = headers.into();

    let mut rows = Vec::new();
    let mut failures = Vec::new();
    for (i, record) in reader.records().enumerate() {
        match record {
            Ok(record) => {
                // Header is line 1; fall back to counting when positions are absent.
                let line = record
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(i + 2);
                let cells = record.iter().map(str::to_string).collect::<Vec<_>>();
                match shape_row(line, &headers, cells) {
                    Ok(row) => rows.push(row),
                    Err(issue) => failures.push(issue),
                }
            }
            Err(e) => {
                let line = e.position().map(|p| p.line() as usize).unwrap_or(i + 2);
                warn!(line, error = %e, "undecodable csv record");
                failures.push(RowDecodeIssue {
                    line,
                    message: format!("Row {line}: Error parsing row - {e}"),
                });
            }
        }
    }

    Ok(Decoded {
        format: SourceFormat::Csv,
        headers,
        rows,
        failures,
    })
}

fn decode_spreadsheet(bytes: Vec<u8>) -> Result<Decoded, DecodeError> {
    let malformed = |message: String| DecodeError::Malformed {
        format: SourceFormat::Spreadsheet,
        message,
    };

    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| malformed(e.to_string()))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => return Err(malformed(e.to_string())),
        None => return Err(DecodeError::MissingHeader(EMPTY_SPREADSHEET)),
    };
    let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);

    let mut sheet_rows = range
        .rows()
        .enumerate()
        .map(|(i, cells)| (first_row + i + 1, cells.iter().map(cell_text).collect::<Vec<_>>()))
        .filter(|(_, cells)| cells.iter().any(|c| !c.is_empty()));

    let Some((_, header_cells)) = sheet_rows.next() else {
        return Err(DecodeError::MissingHeader(EMPTY_SPREADSHEET));
    };
    let mut headers = header_cells
        .iter()
        .map(|h| clean_header(h))
        .collect::<Vec<_>>();
    while headers.last().is_some_and(|h| h.is_empty()) {
        headers.pop();
    }
    let headers: Arc<[String]> = headers.into();

    let mut rows = Vec::new();
    let mut failures = Vec::new();
    for (line, cells) in sheet_rows {
        match shape_row(line, &headers, cells) {
            Ok(row) => rows.push(row),
            Err(issue) => failures.push(issue),
        }
    }

    Ok(Decoded {
        format: SourceFormat::Spreadsheet,
        headers,
        rows,
        failures,
    })
}

fn clean_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

/// Ragged-row policy: short rows are kept (missing cells read as absent),
/// surplus cells are tolerated only while they are blank.
fn shape_row(
    line: usize,
    headers: &Arc<[String]>,
    mut cells: Vec<String>,
) -> Result<RawRow, RowDecodeIssue> {
    let width = headers.len();
    if cells.len() > width {
        if cells[width..].iter().any(|c| !c.trim().is_empty()) {
            return Err(RowDecodeIssue {
                line,
                message: format!(
                    "Row {line}: expected at most {width} cells, found {}",
                    cells.len()
                ),
            });
        }
        cells.truncate(width);
    }
    Ok(RawRow::new(line, Arc::clone(headers), cells))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => float_text(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) if ndt.time() == chrono::NaiveTime::MIN => {
                ndt.format("%Y-%m-%d").to_string()
            }
            Some(ndt) => ndt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => float_text(dt.as_f64()),
        },
    }
}

/// Spreadsheets store every number as a float; whole values read back as
/// integers so year levels and ids survive the round trip.
fn float_text(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}
