use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use tracing::info;

use super::types::{GradedRow, IngestedBatch, ReportError, SheetCell};

pub const REPORT_SUFFIX: &str = "_laporan_hasil_klasifikasi_mutu";
pub const REPORT_EXTENSION: &str = "xlsx";
pub const GRADE_COLUMN: &str = "Kelas Mutu";

pub fn report_file_name(original_filename: &str) -> String {
    let stem = Path::new(original_filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(original_filename);
    format!("{stem}{REPORT_SUFFIX}.{REPORT_EXTENSION}")
}

pub fn emit(report_dir: &Path, dataset: &IngestedBatch) -> Result<PathBuf, ReportError> {
    fs::create_dir_all(report_dir).map_err(|source| ReportError::Directory {
        path: report_dir.display().to_string(),
        source,
    })?;

    let report_path = report_dir.join(report_file_name(&dataset.source_name));
    let path_label = report_path.display().to_string();

    let grade_column = grade_column_index(&dataset.headers);
    let too_large = || ReportError::TooLarge {
        path: path_label.clone(),
        rows: dataset.rows.len() + 1,
        columns: dataset.headers.len().max(grade_column + 1),
    };
    let grade_column = u16::try_from(grade_column).map_err(|_| too_large())?;
    u32::try_from(dataset.rows.len()).map_err(|_| too_large())?;

    let write_error = |source| ReportError::Write {
        path: path_label.clone(),
        source,
    };

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    write_header(worksheet, &dataset.headers, grade_column).map_err(write_error)?;
    for (offset, row) in dataset.rows.iter().enumerate() {
        let sheet_row = offset as u32 + 1;
        write_row(worksheet, sheet_row, dataset, row, grade_column).map_err(write_error)?;
    }
    workbook.save(&report_path).map_err(write_error)?;

    info!(
        path = %report_path.display(),
        rows = dataset.rows.len(),
        "wrote classification report"
    );
    Ok(report_path)
}

fn grade_column_index(headers: &[String]) -> usize {
    headers
        .iter()
        .position(|header| header == GRADE_COLUMN)
        .unwrap_or(headers.len())
}

fn write_header(
    worksheet: &mut Worksheet,
    headers: &[String],
    grade_column: u16,
) -> Result<(), XlsxError> {
    let bold = Format::new().set_bold();
    for (column, header) in (0_u16..).zip(headers) {
        if column != grade_column {
            worksheet.write_string_with_format(0, column, header, &bold)?;
        }
    }
    worksheet.write_string_with_format(0, grade_column, GRADE_COLUMN, &bold)?;
    Ok(())
}

fn write_row(
    worksheet: &mut Worksheet,
    sheet_row: u32,
    dataset: &IngestedBatch,
    row: &GradedRow,
    grade_column: u16,
) -> Result<(), XlsxError> {
    let coerced = row.coercion.partial();

    for (column, cell) in (0_u16..).zip(&row.cells) {
        if column == grade_column {
            continue;
        }
        if let Some(field) = dataset.columns.field_at(usize::from(column)) {
            if let Some(value) = coerced.get(field) {
                worksheet.write_number(sheet_row, column, value)?;
            }
            continue;
        }

        match cell {
            SheetCell::Empty => {}
            SheetCell::Text(text) => {
                worksheet.write_string(sheet_row, column, text)?;
            }
            SheetCell::Number(value) => {
                worksheet.write_number(sheet_row, column, *value)?;
            }
            SheetCell::Bool(value) => {
                worksheet.write_boolean(sheet_row, column, *value)?;
            }
            SheetCell::Other { text, .. } => {
                worksheet.write_string(sheet_row, column, text)?;
            }
        }
    }

    worksheet.write_string(sheet_row, grade_column, row.grade.as_str())?;
    Ok(())
}
