use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use calamine::{Data, Range, Reader, Xls, Xlsx, open_workbook};
use tracing::{debug, info, warn};

use super::types::{ColumnMap, GradedRow, IngestedBatch, IngestionError, SheetCell, SheetFormat};
use crate::coerce::{self, Coercion, RawRecord};
use crate::model::MeasurementField;
use crate::util::TimeoutBudget;

pub fn ingest(
    path: &Path,
    declared_extension: &str,
    budget: Option<TimeoutBudget>,
) -> Result<IngestedBatch, IngestionError> {
    let source_name = source_name_of(path);

    let Some(format) = SheetFormat::from_extension(declared_extension) else {
        return Err(IngestionError::UnsupportedFormat {
            file: source_name,
            extension: declared_extension.to_string(),
        });
    };

    let range = read_first_sheet(path, format).map_err(|source| IngestionError::Read {
        file: source_name.clone(),
        source,
    })?;
    let Some(range) = range else {
        return Err(IngestionError::EmptyWorkbook { file: source_name });
    };

    if let Some(budget) = budget {
        if budget.exceeded() {
            return Err(IngestionError::Timeout {
                file: source_name,
                elapsed_ms: budget.elapsed_ms(),
                timeout_ms: budget.timeout_ms(),
            });
        }
    }

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Err(IngestionError::EmptyWorkbook { file: source_name });
    };
    let headers: Vec<String> = header_row.iter().map(header_text).collect();

    let columns =
        ColumnMap::resolve(&headers).map_err(|missing| IngestionError::MissingColumns {
            file: source_name.clone(),
            columns: missing,
        })?;
    debug!(file = %source_name, headers = headers.len(), "mapped measurement columns");

    let width = headers.len();
    let rows: Vec<GradedRow> = sheet_rows
        .enumerate()
        .map(|(row_index, cells)| grade_row(&source_name, row_index, cells, width, &columns))
        .collect();

    let incomplete = rows.iter().filter(|row| !row.coercion.is_success()).count();
    info!(
        file = %source_name,
        rows = rows.len(),
        incomplete,
        "graded spreadsheet rows"
    );

    Ok(IngestedBatch {
        source_name,
        headers,
        columns,
        rows,
    })
}

pub fn source_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default()
}

type SheetReader = BufReader<File>;

fn read_first_sheet(
    path: &Path,
    format: SheetFormat,
) -> Result<Option<Range<Data>>, calamine::Error> {
    match format {
        SheetFormat::Xlsx => {
            first_sheet::<SheetReader, _>(open_workbook::<Xlsx<SheetReader>, _>(path)?)
        }
        SheetFormat::Xls => {
            first_sheet::<SheetReader, _>(open_workbook::<Xls<SheetReader>, _>(path)?)
        }
    }
}

fn first_sheet<RS, R>(mut workbook: R) -> Result<Option<Range<Data>>, calamine::Error>
where
    RS: Read + Seek,
    R: Reader<RS>,
    calamine::Error: From<R::Error>,
{
    match workbook.worksheet_range_at(0) {
        Some(range) => Ok(Some(range?)),
        None => Ok(None),
    }
}

fn grade_row(
    source_name: &str,
    row_index: usize,
    cells: &[Data],
    width: usize,
    columns: &ColumnMap,
) -> GradedRow {
    let mut cells: Vec<SheetCell> = cells.iter().map(sheet_cell).collect();
    if cells.len() < width {
        cells.resize(width, SheetCell::Empty);
    }

    let raw_at = |field: MeasurementField| cells[columns.index_of(field)].to_raw();
    let record = RawRecord {
        polish: raw_at(MeasurementField::PolishDegree),
        moisture: raw_at(MeasurementField::MoistureContent),
        broken: raw_at(MeasurementField::BrokenGrain),
        chalky: raw_at(MeasurementField::ChalkyGrain),
    };
    let (coercion, grade) = coerce::classify(&record);

    if let Coercion::Failure(failure) = &coercion {
        warn!(
            file = %source_name,
            row = row_index + 2,
            issues = %failure.describe(),
            "row could not be graded"
        );
    }

    GradedRow {
        row_index,
        cells,
        coercion,
        grade,
    }
}

fn sheet_cell(data: &Data) -> SheetCell {
    match data {
        Data::Empty => SheetCell::Empty,
        Data::String(text) => SheetCell::Text(text.clone()),
        Data::Float(value) => SheetCell::Number(*value),
        Data::Int(value) => SheetCell::Number(*value as f64),
        Data::Bool(value) => SheetCell::Bool(*value),
        Data::DateTime(_) | Data::DateTimeIso(_) => SheetCell::Other {
            kind: "date",
            text: data.to_string(),
        },
        Data::DurationIso(_) => SheetCell::Other {
            kind: "duration",
            text: data.to_string(),
        },
        Data::Error(_) => SheetCell::Other {
            kind: "error",
            text: data.to_string(),
        },
    }
}

fn header_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        other => other.to_string(),
    }
}
