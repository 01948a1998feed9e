//! Tabular file ingest.
//!
//! Turns an uploaded CSV or spreadsheet into a plain `TabularInput` (header
//! row + string cells). No interpretation happens here; column resolution and
//! row parsing live in `batch`.
//!
//! Limits are enforced before any row is processed:
//! - the byte limit before the parser even starts
//! - the row limit while reading, aborting as soon as it is crossed

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto_from_rs};

use crate::error::AppError;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_MAX_ROWS: usize = 100_000;

/// Size limits for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_bytes: usize,
    pub max_rows: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    /// `.xlsx`, `.xlsm` or legacy `.xls`; the first sheet is read.
    Spreadsheet,
}

impl TableFormat {
    /// Format implied by a file name's extension, if supported.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name.trim())
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(TableFormat::Csv),
            "xlsx" | "xlsm" | "xls" => Some(TableFormat::Spreadsheet),
            _ => None,
        }
    }
}

/// One data row with its 1-based line (or sheet row) in the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub line: usize,
    pub cells: Vec<String>,
}

/// Parsed table: headers as written in the file, rows in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularInput {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

/// Read CSV from any reader, buffering at most `max_bytes`.
pub fn read_table<R: Read>(reader: R, limits: &BatchLimits) -> Result<TabularInput, AppError> {
    let mut bytes = Vec::new();
    reader
        .take(limits.max_bytes as u64 + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| AppError::io(format!("Failed to read input: {e}")))?;
    read_table_bytes(&bytes, TableFormat::Csv, limits)
}

/// Parse an in-memory upload, checking the byte limit first.
pub fn read_table_bytes(
    bytes: &[u8],
    format: TableFormat,
    limits: &BatchLimits,
) -> Result<TabularInput, AppError> {
    check_size(bytes.len() as u64, limits)?;
    match format {
        TableFormat::Csv => parse_csv(bytes, limits),
        TableFormat::Spreadsheet => read_table_xlsx(bytes, limits),
    }
}

/// Parse a file from disk, checking the byte limit first.
///
/// The format follows the extension; anything unrecognised is read as CSV.
pub fn read_table_path(path: &Path, limits: &BatchLimits) -> Result<TabularInput, AppError> {
    let mut file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open '{}': {e}", path.display())))?;
    let len = file
        .metadata()
        .map_err(|e| AppError::io(format!("Failed to stat '{}': {e}", path.display())))?
        .len();
    check_size(len, limits)?;

    let mut bytes = Vec::with_capacity(len as usize);
    file.read_to_end(&mut bytes)
        .map_err(|e| AppError::io(format!("Failed to read '{}': {e}", path.display())))?;

    let format = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(TableFormat::from_file_name)
        .unwrap_or(TableFormat::Csv);
    read_table_bytes(&bytes, format, limits)
}

/// Read the first worksheet of an Excel workbook.
pub fn read_table_xlsx(bytes: &[u8], limits: &BatchLimits) -> Result<TabularInput, AppError> {
    check_size(bytes.len() as u64, limits)?;

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| AppError::schema(format!("Failed to open spreadsheet: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::schema("Spreadsheet has no worksheets."))?
        .map_err(|e| AppError::schema(format!("Failed to read first worksheet: {e}")))?;

    // Ranges skip leading empty rows; keep sheet row numbers for traceability.
    let first_row = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);
    let mut sheet_rows = range.rows().enumerate();

    let headers: Vec<String> = match sheet_rows.next() {
        Some((_, row)) => row.iter().map(cell_text).collect(),
        None => Vec::new(),
    };
    if headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::schema("File has no header row."));
    }

    let mut rows = Vec::new();
    for (offset, row) in sheet_rows {
        let cells: Vec<String> = row.iter().map(cell_text).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        push_row(&mut rows, first_row + offset, cells, limits)?;
    }

    finish(headers, rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

fn parse_csv(bytes: &[u8], limits: &BatchLimits) -> Result<TabularInput, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    // Byte records + lossy decoding: a stray non-UTF-8 byte in one cell
    // should not sink the whole upload.
    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(|e| AppError::schema(format!("Failed to read CSV headers: {e}")))?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(AppError::schema("File has no header row."));
    }

    let mut lines = LineTracker::new(bytes);
    lines.advance_to(reader.position().byte() as usize);

    let mut rows = Vec::new();
    let mut record = csv::ByteRecord::new();
    loop {
        let line = lines.next_content_line();
        let more = reader
            .read_byte_record(&mut record)
            .map_err(|e| AppError::schema(format!("Malformed CSV near line {line}: {e}")))?;
        if !more {
            break;
        }
        lines.advance_to(reader.position().byte() as usize);

        let cells: Vec<String> = record
            .iter()
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect();

        // Spreadsheet exports often end with delimiter-only lines.
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        push_row(&mut rows, line, cells, limits)?;
    }

    finish(headers, rows)
}

/// Physical line numbers for CSV records.
///
/// The csv reader silently skips empty lines, so its record positions drift
/// after a blank line. This walks the same bytes and counts every newline.
struct LineTracker<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineTracker<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            line: 1,
        }
    }

    /// Consume bytes up to `end` (exclusive), counting newlines.
    fn advance_to(&mut self, end: usize) {
        let end = end.min(self.bytes.len());
        if end <= self.offset {
            return;
        }
        self.line += self.bytes[self.offset..end].iter().filter(|&&b| b == b'\n').count();
        self.offset = end;
    }

    /// Skip blank lines and return the line the next record starts on.
    fn next_content_line(&mut self) -> usize {
        while let Some(&b) = self.bytes.get(self.offset) {
            match b {
                b'\n' => self.line += 1,
                b'\r' => {}
                _ => break,
            }
            self.offset += 1;
        }
        self.line
    }
}

fn push_row(
    rows: &mut Vec<TableRow>,
    line: usize,
    cells: Vec<String>,
    limits: &BatchLimits,
) -> Result<(), AppError> {
    if rows.len() >= limits.max_rows {
        return Err(AppError::limit_exceeded(format!(
            "File has more than the maximum of {} rows.",
            limits.max_rows
        )));
    }
    rows.push(TableRow { line, cells });
    Ok(())
}

fn finish(headers: Vec<String>, rows: Vec<TableRow>) -> Result<TabularInput, AppError> {
    if rows.is_empty() {
        return Err(AppError::schema("File contains no data rows."));
    }
    Ok(TabularInput { headers, rows })
}

fn check_size(len: u64, limits: &BatchLimits) -> Result<(), AppError> {
    if len > limits.max_bytes as u64 {
        return Err(AppError::limit_exceeded(format!(
            "File size {len} bytes exceeds the maximum of {} bytes.",
            limits.max_bytes
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn csv(text: &str, limits: &BatchLimits) -> Result<TabularInput, AppError> {
        read_table_bytes(text.as_bytes(), TableFormat::Csv, limits)
    }

    #[test]
    fn reads_headers_and_rows_with_line_numbers() {
        let table = csv("Employee Count,companyAge\n10, 2\n\n20,3\n", &BatchLimits::default()).unwrap();
        assert_eq!(table.headers, ["Employee Count", "companyAge"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].cells, ["10", "2"]);
        assert_eq!(table.rows[0].line, 2);
        assert_eq!(table.rows[1].line, 4);
    }

    #[test]
    fn line_numbers_survive_blank_lines_crlf_and_quoted_newlines() {
        let text = "a,b\r\n\r\n\r\n1,\"two\nlines\"\r\n\n3,4";
        let table = csv(text, &BatchLimits::default()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].line, 4);
        assert_eq!(table.rows[0].cells[1], "two\nlines");
        assert_eq!(table.rows[1].line, 7);
    }

    #[test]
    fn skips_delimiter_only_lines() {
        let table = csv("a,b\n1,2\n,\n5,6\n", &BatchLimits::default()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].line, 4);
    }

    #[test]
    fn rejects_files_over_the_byte_limit() {
        let limits = BatchLimits { max_bytes: 8, max_rows: 10 };
        let err = csv("a,b\n1,2\n3,4\n", &limits).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);

        let err = read_table(&b"a,b\n1,2\n3,4\n"[..], &limits).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    }

    #[test]
    fn rejects_files_over_the_row_limit() {
        let limits = BatchLimits { max_bytes: 1024, max_rows: 2 };
        let err = csv("a\n1\n2\n3\n", &limits).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);

        assert!(csv("a\n1\n2\n", &limits).is_ok());
    }

    #[test]
    fn empty_files_are_schema_errors() {
        let limits = BatchLimits::default();
        assert_eq!(csv("", &limits).unwrap_err().kind(), ErrorKind::Schema);
        assert_eq!(csv("a,b\n", &limits).unwrap_err().kind(), ErrorKind::Schema);
    }

    #[test]
    fn tolerates_invalid_utf8_cells() {
        let table = read_table_bytes(b"city\nPun\xffe\n", TableFormat::Csv, &BatchLimits::default()).unwrap();
        assert!(table.rows[0].cells[0].starts_with("Pun"));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(TableFormat::from_file_name("companies.CSV"), Some(TableFormat::Csv));
        assert_eq!(TableFormat::from_file_name("companies.xlsx"), Some(TableFormat::Spreadsheet));
        assert_eq!(TableFormat::from_file_name("legacy.xls"), Some(TableFormat::Spreadsheet));
        assert_eq!(TableFormat::from_file_name("notes.txt"), None);
        assert_eq!(TableFormat::from_file_name("no_extension"), None);
    }

    #[test]
    fn garbage_spreadsheet_is_schema_error() {
        let err = read_table_xlsx(b"definitely not a zip", &BatchLimits::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn spreadsheet_byte_limit_applies_before_parsing() {
        let limits = BatchLimits { max_bytes: 4, max_rows: 10 };
        let err = read_table_xlsx(b"definitely not a zip", &limits).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    }
}
