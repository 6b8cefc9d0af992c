use std::path::PathBuf;

use thiserror::Error;

use crate::coerce::{Coercion, RawValue};
use crate::grading::Grade;
use crate::history::HistoryWrite;
use crate::model::{MeasurementField, NewHistoryRecord, file_source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xlsx,
    Xls,
}

impl SheetFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        let normalized = extension.trim_start_matches('.');
        if normalized.eq_ignore_ascii_case("xlsx") {
            Some(Self::Xlsx)
        } else if normalized.eq_ignore_ascii_case("xls") {
            Some(Self::Xls)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SheetCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Other { kind: &'static str, text: String },
}

impl SheetCell {
    pub fn to_raw(&self) -> RawValue {
        match self {
            Self::Empty => RawValue::Missing,
            Self::Text(text) => RawValue::Text(text.clone()),
            Self::Number(value) => RawValue::Number(*value),
            Self::Bool(_) => RawValue::Unsupported("boolean".to_string()),
            Self::Other { kind, .. } => RawValue::Unsupported((*kind).to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    indices: [usize; 4],
}

impl ColumnMap {
    pub fn resolve(headers: &[String]) -> Result<Self, Vec<String>> {
        let mut indices = [0_usize; 4];
        let mut missing = Vec::new();

        for (slot, field) in MeasurementField::ALL.into_iter().enumerate() {
            match headers.iter().position(|header| header == field.column_name()) {
                Some(index) => indices[slot] = index,
                None => missing.push(field.column_name().to_string()),
            }
        }

        if missing.is_empty() {
            Ok(Self { indices })
        } else {
            Err(missing)
        }
    }

    pub fn index_of(&self, field: MeasurementField) -> usize {
        let slot = MeasurementField::ALL
            .iter()
            .position(|candidate| *candidate == field)
            .unwrap_or_default();
        self.indices[slot]
    }

    pub fn field_at(&self, column: usize) -> Option<MeasurementField> {
        MeasurementField::ALL
            .into_iter()
            .find(|field| self.index_of(*field) == column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradedRow {
    pub row_index: usize,
    pub cells: Vec<SheetCell>,
    pub coercion: Coercion,
    pub grade: Grade,
}

impl GradedRow {
    pub fn sheet_row_number(&self) -> usize {
        self.row_index + 2
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestedBatch {
    pub source_name: String,
    pub headers: Vec<String>,
    pub columns: ColumnMap,
    pub rows: Vec<GradedRow>,
}

impl IngestedBatch {
    pub fn history_records(&self) -> Vec<NewHistoryRecord> {
        let source = file_source(&self.source_name);
        self.rows
            .iter()
            .map(|row| NewHistoryRecord {
                source: source.clone(),
                measurement: row.coercion.partial(),
                grade: row.grade,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub dataset: IngestedBatch,
    pub artifact_path: PathBuf,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub result: BatchResult,
    pub history: HistoryWrite,
}

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("unsupported file format {extension:?} for {file}; expected .xls or .xlsx")]
    UnsupportedFormat { file: String, extension: String },

    #[error("{file} is missing required columns: {}", .columns.join(", "))]
    MissingColumns { file: String, columns: Vec<String> },

    #[error("{file} has no worksheet with a header row")]
    EmptyWorkbook { file: String },

    #[error("failed to read spreadsheet {file}")]
    Read {
        file: String,
        #[source]
        source: calamine::Error,
    },

    #[error("reading {file} took {elapsed_ms} ms, over the {timeout_ms} ms budget")]
    Timeout {
        file: String,
        elapsed_ms: u64,
        timeout_ms: u64,
    },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to create report directory {path}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("report {path} cannot hold {rows} rows x {columns} columns")]
    TooLarge {
        path: String,
        rows: usize,
        columns: usize,
    },

    #[error("failed to write report {path}")]
    Write {
        path: String,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error("graded {file} but could not write its report")]
    Report {
        file: String,
        history: HistoryWrite,
        #[source]
        source: ReportError,
    },
}
