//! Row-by-row batch prediction.
//!
//! A `BatchJob` is built once per uploaded table (column resolution happens
//! there) and then consumed either lazily through [`BatchJob::rows`] or in
//! parallel through [`BatchJob::run_parallel`]. Both paths share `process_row`
//! so they cannot drift apart.
//!
//! Failure policy per row:
//! - parse/derivation failures become a [`RowError`] and the batch continues
//! - a non-finite model output also becomes a [`RowError`]
//! - a missing model aborts the batch

use std::collections::HashSet;
use std::iter::Enumerate;
use std::vec::IntoIter;

use rayon::prelude::*;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::batch::columns::{ColumnMap, Field};
use crate::domain::{CompanyType, PredictionResult, RawInput};
use crate::error::{AppError, ErrorKind};
use crate::features::derive;
use crate::io::{TableRow, TabularInput};
use crate::model::PredictionEngine;

/// Why one row was excluded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    /// 0-based data row index.
    pub row: usize,
    /// 1-based line in the source file.
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

/// A successfully predicted row.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPrediction {
    pub row: usize,
    pub line: usize,
    /// The uploaded cells keyed by their echo name (see [`BatchJob::headers`]).
    pub cells: Map<String, Value>,
    pub result: PredictionResult,
}

impl BatchPrediction {
    /// Row object as returned to callers: original cells + `predicted_revenue`.
    pub fn to_row_object(&self) -> Value {
        let mut object = self.cells.clone();
        object.insert(
            "predicted_revenue".to_string(),
            Number::from_f64(self.result.predicted_revenue).map_or(Value::Null, Value::Number),
        );
        Value::Object(object)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Predicted(BatchPrediction),
    Rejected(RowError),
}

pub struct BatchJob {
    /// Echo name per uploaded column; `None` for blank headers.
    keys: Vec<Option<String>>,
    headers: Vec<String>,
    columns: ColumnMap,
    rows: Vec<TableRow>,
}

impl BatchJob {
    /// Resolve columns for `table`. Fails for the whole batch on a bad header.
    pub fn new(table: TabularInput) -> Result<Self, AppError> {
        let columns = ColumnMap::resolve(&table.headers)?;
        let keys = echo_keys(&table.headers);
        let headers = keys.iter().flatten().cloned().collect();
        Ok(Self {
            keys,
            headers,
            columns,
            rows: table.rows,
        })
    }

    /// Names of the echoed columns in file order, unique within the job.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Lazy single pass over the rows in file order.
    pub fn rows(self, engine: &PredictionEngine) -> BatchRows<'_> {
        BatchRows {
            keys: self.keys,
            columns: self.columns,
            rows: self.rows.into_iter().enumerate(),
            engine,
        }
    }

    /// Process all rows on the rayon pool; outcomes come back in file order.
    pub fn run_parallel(self, engine: &PredictionEngine) -> Result<Vec<RowOutcome>, AppError> {
        let keys = &self.keys;
        let columns = &self.columns;
        self.rows
            .par_iter()
            .enumerate()
            .map(|(idx, row)| process_row(idx, row, keys, columns, engine))
            .collect()
    }
}

/// Echo names for the uploaded headers.
///
/// BOM and surrounding whitespace are dropped. Repeated names get `_2`, `_3`,
/// ... so no column overwrites another in a row object; `predicted_revenue`
/// is reserved for the model output.
fn echo_keys(headers: &[String]) -> Vec<Option<String>> {
    let mut used: HashSet<String> = HashSet::from(["predicted_revenue".to_string()]);
    headers
        .iter()
        .map(|header| {
            let base = header.trim_start_matches('\u{feff}').trim();
            if base.is_empty() {
                return None;
            }
            let mut key = base.to_string();
            let mut n = 1;
            while !used.insert(key.clone()) {
                n += 1;
                key = format!("{base}_{n}");
            }
            Some(key)
        })
        .collect()
}

pub struct BatchRows<'e> {
    keys: Vec<Option<String>>,
    columns: ColumnMap,
    rows: Enumerate<IntoIter<TableRow>>,
    engine: &'e PredictionEngine,
}

impl Iterator for BatchRows<'_> {
    type Item = Result<RowOutcome, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (idx, row) = self.rows.next()?;
        Some(process_row(idx, &row, &self.keys, &self.columns, self.engine))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

fn process_row(
    idx: usize,
    row: &TableRow,
    keys: &[Option<String>],
    columns: &ColumnMap,
    engine: &PredictionEngine,
) -> Result<RowOutcome, AppError> {
    let reject = |err: AppError| {
        RowOutcome::Rejected(RowError {
            row: idx,
            line: row.line,
            field: err.field().map(str::to_string),
            message: err.message().to_string(),
        })
    };

    let raw = match parse_raw_input(&row.cells, columns) {
        Ok(raw) => raw,
        Err(err) => return Ok(reject(err)),
    };
    let record = match derive(&raw) {
        Ok(record) => record,
        Err(err) => return Ok(reject(err)),
    };
    let predicted_revenue = match engine.predict(&record) {
        Ok(value) => value,
        Err(err) if err.kind() == ErrorKind::Prediction => return Ok(reject(err)),
        Err(err) => return Err(err),
    };

    Ok(RowOutcome::Predicted(BatchPrediction {
        row: idx,
        line: row.line,
        cells: row_cells(keys, &row.cells),
        result: PredictionResult {
            predicted_revenue,
            input: raw.normalized(),
        },
    }))
}

/// Build a `RawInput` from resolved cells.
fn parse_raw_input(cells: &[String], columns: &ColumnMap) -> Result<RawInput, AppError> {
    let employee_count = required_number(cells, columns, Field::EmployeeCount)?;
    let company_age = required_number(cells, columns, Field::CompanyAge)?;

    let company_type = match columns.get(Field::CompanyType) {
        None => CompanyType::PrivateCompany.as_str().to_string(),
        Some(_) => cell(cells, columns, Field::CompanyType)
            .ok_or_else(|| AppError::invalid_input(Field::CompanyType.input_name(), "missing value"))?
            .to_string(),
    };

    let revenue = match cell(cells, columns, Field::Revenue) {
        Some(text) => Some(parse_number(text, Field::Revenue)?),
        None => None,
    };

    Ok(RawInput {
        employee_count,
        company_age,
        company_type,
        category: cell(cells, columns, Field::Category).map(str::to_string),
        city: cell(cells, columns, Field::City).map(str::to_string),
        state: cell(cells, columns, Field::State).unwrap_or_default().to_string(),
        revenue,
    })
}

/// Non-blank cell for `field`, if the column exists and the row reaches it.
fn cell<'a>(cells: &'a [String], columns: &ColumnMap, field: Field) -> Option<&'a str> {
    let idx = columns.get(field)?;
    cells
        .get(idx)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

fn required_number(cells: &[String], columns: &ColumnMap, field: Field) -> Result<f64, AppError> {
    let text = cell(cells, columns, field)
        .ok_or_else(|| AppError::invalid_input(field.input_name(), "missing value"))?;
    parse_number(text, field)
}

/// Parse a numeric cell, tolerating thousands separators (`1,200`).
fn parse_number(text: &str, field: Field) -> Result<f64, AppError> {
    let not_a_number =
        || AppError::invalid_input(field.input_name(), format!("'{text}' is not a number"));
    let cleaned = if text.contains(',') {
        strip_thousands(text).ok_or_else(not_a_number)?
    } else {
        text.to_string()
    };
    cleaned.parse::<f64>().map_err(|_| not_a_number())
}

/// `-1,234,567.5` to `-1234567.5`.
///
/// `None` unless every comma sits between well-formed digit groups of the
/// integer part, so a decimal comma (`1,5`) is never read as `15`.
fn strip_thousands(text: &str) -> Option<String> {
    let unsigned = text.trim_start_matches(['-', '+']);
    let sign = &text[..text.len() - unsigned.len()];
    let (int_part, fraction) = match unsigned.split_once('.') {
        Some((int_part, fraction)) => (int_part, Some(fraction)),
        None => (unsigned, None),
    };
    if fraction.is_some_and(|f| f.contains(',')) {
        return None;
    }

    let all_digits = |g: &str| g.bytes().all(|b| b.is_ascii_digit());
    let mut groups = int_part.split(',');
    let lead = groups.next()?;
    if !(1..=3).contains(&lead.len()) || !all_digits(lead) {
        return None;
    }
    if !groups.all(|g| g.len() == 3 && all_digits(g)) {
        return None;
    }

    let mut cleaned = format!("{sign}{}", int_part.replace(',', ""));
    if let Some(fraction) = fraction {
        cleaned.push('.');
        cleaned.push_str(fraction);
    }
    Some(cleaned)
}

/// Echo the uploaded row, typing numbers as numbers and blanks as null.
fn row_cells(keys: &[Option<String>], cells: &[String]) -> Map<String, Value> {
    keys.iter()
        .enumerate()
        .filter_map(|(idx, key)| {
            let key = key.as_ref()?;
            let value = cells.get(idx).map_or(Value::Null, |c| cell_value(c));
            Some((key.clone(), value))
        })
        .collect()
}

fn cell_value(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = text.parse::<i64>() {
        return Value::from(int);
    }
    match text.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(number) => Value::Number(number),
        None => Value::String(text.to_string()),
    }
}
