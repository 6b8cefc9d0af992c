use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto};
use rust_xlsxwriter::Workbook;

use super::ingest::ingest;
use super::report::{GRADE_COLUMN, emit, report_file_name};
use super::run::{BatchRequest, classify_batch};
use super::types::{BatchError, ColumnMap, IngestionError, SheetCell, SheetFormat};
use crate::coerce::Coercion;
use crate::grading::Grade;
use crate::history::{HistoryStore, HistoryWrite, SqliteHistoryStore, UnavailableStore};

#[derive(Clone)]
enum Fixture {
    Text(&'static str),
    Number(f64),
    Blank,
}

use Fixture::{Blank, Number, Text};

const HEADERS: [&str; 5] = [
    "Sampel",
    "Derajat Sosoh",
    "Kadar Air",
    "Butir Patah",
    "Butir Menir",
];

fn write_fixture(path: &Path, headers: &[&str], rows: &[Vec<Fixture>]) {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (column, header) in (0_u16..).zip(headers) {
        worksheet
            .write_string(0, column, *header)
            .expect("write header");
    }
    for (row_number, row) in (1_u32..).zip(rows) {
        for (column, cell) in (0_u16..).zip(row) {
            match cell {
                Text(text) => {
                    worksheet
                        .write_string(row_number, column, *text)
                        .expect("write text cell");
                }
                Number(value) => {
                    worksheet
                        .write_number(row_number, column, *value)
                        .expect("write number cell");
                }
                Blank => {}
            }
        }
    }
    workbook.save(path).expect("save fixture workbook");
}

fn scenario_rows() -> Vec<Vec<Fixture>> {
    vec![
        vec![Text("A"), Number(96.0), Number(13.0), Number(10.0), Number(0.3)],
        vec![Text("B"), Number(96.0), Number(13.0), Number(20.0), Number(1.5)],
        vec![Text("C"), Number(96.0), Number(13.0), Number(35.0), Number(3.0)],
        vec![Text("D"), Number(80.0), Number(13.0), Number(5.0), Number(0.1)],
        vec![Text("E"), Number(96.0), Blank, Number(10.0), Number(0.3)],
        vec![Text("F"), Text("96,5"), Text("13,2"), Text("10"), Text("0,4")],
        vec![Text("G"), Text("tinggi"), Number(13.0), Number(10.0), Number(0.3)],
    ]
}

fn expected_scenario_grades() -> Vec<Grade> {
    vec![
        Grade::Premium,
        Grade::Medium,
        Grade::Submedium,
        Grade::Broken,
        Grade::Incomplete,
        Grade::Premium,
        Grade::Incomplete,
    ]
}

fn fixture_path(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    write_fixture(&path, &HEADERS, &scenario_rows());
    path
}

fn read_sheet(path: &Path) -> Vec<Vec<Data>> {
    let mut workbook = open_workbook_auto(path).expect("open report");
    let range = workbook
        .worksheet_range_at(0)
        .expect("report has a worksheet")
        .expect("read report worksheet");
    range.rows().map(|row| row.to_vec()).collect()
}

#[test]
fn sheet_format_matches_extension_case_insensitively() {
    assert_eq!(SheetFormat::from_extension("xlsx"), Some(SheetFormat::Xlsx));
    assert_eq!(SheetFormat::from_extension(".XLS"), Some(SheetFormat::Xls));
    assert_eq!(SheetFormat::from_extension("csv"), None);
    assert_eq!(SheetFormat::from_extension(""), None);
}

#[test]
fn column_map_requires_exact_header_names() {
    let headers: Vec<String> = ["Kadar Air", "derajat sosoh", "Butir Patah ", "Butir Menir"]
        .iter()
        .map(|header| header.to_string())
        .collect();
    let missing = ColumnMap::resolve(&headers).expect_err("headers differ in case and spacing");
    assert_eq!(missing, vec!["Derajat Sosoh".to_string(), "Butir Patah".to_string()]);
}

#[test]
fn ingest_grades_every_row_in_source_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = fixture_path(dir.path(), "sampel.xlsx");

    let batch = ingest(&path, "xlsx", None).expect("ingest fixture");
    assert_eq!(batch.source_name, "sampel.xlsx");
    assert_eq!(batch.headers, HEADERS.map(String::from).to_vec());
    assert_eq!(batch.rows.len(), scenario_rows().len());

    let grades: Vec<Grade> = batch.rows.iter().map(|row| row.grade).collect();
    assert_eq!(grades, expected_scenario_grades());

    let indices: Vec<usize> = batch.rows.iter().map(|row| row.row_index).collect();
    assert_eq!(indices, (0..scenario_rows().len()).collect::<Vec<_>>());
    assert_eq!(batch.rows[0].cells[0], SheetCell::Text("A".to_string()));
    assert_eq!(batch.rows[4].sheet_row_number(), 6);
}

#[test]
fn failed_rows_keep_partial_measurements_for_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = fixture_path(dir.path(), "sampel.xlsx");

    let batch = ingest(&path, "xlsx", None).expect("ingest fixture");
    let records = batch.history_records();
    assert_eq!(records.len(), batch.rows.len());
    assert!(records.iter().all(|record| record.source == "File: sampel.xlsx"));

    let incomplete = &records[4];
    assert_eq!(incomplete.grade, Grade::Incomplete);
    assert_eq!(incomplete.measurement.polish_degree, Some(96.0));
    assert_eq!(incomplete.measurement.moisture_content, None);

    assert!(matches!(batch.rows[6].coercion, Coercion::Failure(_)));
}

#[test]
fn missing_columns_fail_the_whole_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("kurang.xlsx");
    write_fixture(
        &path,
        &["Derajat Sosoh", "Kadar Air"],
        &[vec![Number(96.0), Number(13.0)]],
    );

    let err = ingest(&path, "xlsx", None).expect_err("columns are missing");
    match err {
        IngestionError::MissingColumns { file, columns } => {
            assert_eq!(file, "kurang.xlsx");
            assert_eq!(columns, vec!["Butir Patah".to_string(), "Butir Menir".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn short_rows_are_padded_and_graded_incomplete() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("pendek.xlsx");
    write_fixture(
        &path,
        &[
            "Derajat Sosoh",
            "Kadar Air",
            "Butir Patah",
            "Butir Menir",
            "Catatan",
        ],
        &[
            vec![Number(96.0), Number(13.0)],
            vec![
                Number(96.0),
                Number(13.0),
                Number(10.0),
                Number(0.3),
                Text("ok"),
            ],
        ],
    );

    let batch = ingest(&path, "xlsx", None).expect("ingest fixture");
    assert_eq!(batch.rows.len(), 2);
    assert_eq!(batch.rows[0].cells.len(), 5);
    assert_eq!(batch.rows[0].grade, Grade::Incomplete);
    assert_eq!(batch.rows[1].grade, Grade::Premium);
}

#[test]
fn legacy_xls_workbook_is_read_and_graded() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sampel.xls");

    let batch = ingest(&path, "xls", None).expect("ingest xls fixture");
    assert_eq!(batch.source_name, "sampel.xls");
    assert_eq!(batch.headers, HEADERS.map(String::from).to_vec());

    let grades: Vec<Grade> = batch.rows.iter().map(|row| row.grade).collect();
    assert_eq!(
        grades,
        vec![Grade::Premium, Grade::Premium, Grade::Broken, Grade::Incomplete]
    );
    assert_eq!(batch.rows[1].cells[1], SheetCell::Text("96,5".to_string()));
}

#[test]
fn xlsx_content_declared_as_xls_is_a_read_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = fixture_path(dir.path(), "sampel.xlsx");

    let err = ingest(&path, "xls", None).expect_err("not a legacy workbook");
    assert!(matches!(err, IngestionError::Read { .. }));
}

#[test]
fn header_only_sheet_yields_no_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("kosong.xlsx");
    write_fixture(&path, &HEADERS, &[]);

    let batch = ingest(&path, "xlsx", None).expect("ingest header-only sheet");
    assert!(batch.rows.is_empty());
}

#[test]
fn report_name_strips_extension_and_adds_suffix() {
    assert_eq!(
        report_file_name("sampel.xls"),
        "sampel_laporan_hasil_klasifikasi_mutu.xlsx"
    );
    assert_eq!(
        report_file_name("panen.2024.xlsx"),
        "panen.2024_laporan_hasil_klasifikasi_mutu.xlsx"
    );
}

#[test]
fn report_round_trips_grade_column_and_original_columns() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = fixture_path(dir.path(), "sampel.xlsx");
    let batch = ingest(&path, "xlsx", None).expect("ingest fixture");

    let report_dir = dir.path().join("reports");
    let report_path = emit(&report_dir, &batch).expect("emit report");
    assert_eq!(
        report_path,
        report_dir.join("sampel_laporan_hasil_klasifikasi_mutu.xlsx")
    );

    let rows = read_sheet(&report_path);
    let header: Vec<String> = rows[0].iter().map(|cell| cell.to_string()).collect();
    let mut expected_header: Vec<String> = HEADERS.map(String::from).to_vec();
    expected_header.push(GRADE_COLUMN.to_string());
    assert_eq!(header, expected_header);

    let grade_column = HEADERS.len();
    let reparsed: Vec<Grade> = rows[1..]
        .iter()
        .map(|row| {
            row[grade_column]
                .to_string()
                .parse::<Grade>()
                .expect("grade label")
        })
        .collect();
    let in_memory: Vec<Grade> = batch.rows.iter().map(|row| row.grade).collect();
    assert_eq!(reparsed, in_memory);

    assert_eq!(rows[6][0], Data::String("F".to_string()));
    assert_eq!(rows[6][1], Data::Float(96.5));
    assert_eq!(rows[5][2], Data::Empty);
}

#[test]
fn existing_grade_column_is_overwritten_in_place() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ulang.xlsx");
    let mut headers = HEADERS.to_vec();
    headers.insert(1, GRADE_COLUMN);
    write_fixture(
        &path,
        &headers,
        &[vec![
            Text("A"),
            Text("Pecah"),
            Number(96.0),
            Number(13.0),
            Number(10.0),
            Number(0.3),
        ]],
    );

    let batch = ingest(&path, "xlsx", None).expect("ingest fixture");
    assert_eq!(batch.rows[0].grade, Grade::Premium);

    let report_path = emit(&dir.path().join("reports"), &batch).expect("emit report");
    let rows = read_sheet(&report_path);
    let header: Vec<String> = rows[0].iter().map(|cell| cell.to_string()).collect();
    assert_eq!(header, headers.iter().map(|h| h.to_string()).collect::<Vec<_>>());
    assert_eq!(rows[1][1], Data::String("Premium".to_string()));
    assert_eq!(rows[1][2], Data::Float(96.0));
}

#[test]
fn reemitting_the_same_input_overwrites_the_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = fixture_path(dir.path(), "sampel.xlsx");
    let batch = ingest(&path, "xlsx", None).expect("ingest fixture");
    let report_dir = dir.path().join("reports");

    let first = emit(&report_dir, &batch).expect("first emit");
    let first_rows = read_sheet(&first);
    let second = emit(&report_dir, &batch).expect("second emit");

    assert_eq!(first, second);
    assert_eq!(read_sheet(&second), first_rows);
}

#[test]
fn classify_batch_appends_history_then_writes_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = fixture_path(dir.path(), "sampel.xlsx");
    let report_dir = dir.path().join("reports");
    let mut store = SqliteHistoryStore::open_in_memory().expect("store");

    let request = BatchRequest {
        path: &path,
        extension: None,
        report_dir: &report_dir,
        budget: None,
    };
    let outcome = classify_batch(&mut store, &request).expect("batch succeeds");

    assert_eq!(
        outcome.history,
        HistoryWrite::Appended {
            records: scenario_rows().len()
        }
    );
    assert!(outcome.result.artifact_path.exists());

    let records = store.list_all().expect("list");
    assert_eq!(records.len(), scenario_rows().len());
    let mut grades: Vec<Grade> = records.iter().map(|record| record.grade).collect();
    grades.reverse();
    assert_eq!(grades, expected_scenario_grades());
}

#[test]
fn unsupported_extension_appends_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sampel.csv");
    std::fs::write(&path, "Derajat Sosoh,Kadar Air,Butir Patah,Butir Menir\n96,13,10,0.3\n")
        .expect("write csv");
    let report_dir = dir.path().join("reports");
    let mut store = SqliteHistoryStore::open_in_memory().expect("store");

    let request = BatchRequest {
        path: &path,
        extension: None,
        report_dir: &report_dir,
        budget: None,
    };
    let err = classify_batch(&mut store, &request).expect_err("csv is rejected");
    assert!(matches!(
        err,
        BatchError::Ingestion(IngestionError::UnsupportedFormat { .. })
    ));
    assert!(store.list_all().expect("list").is_empty());
    assert!(!report_dir.exists());
}

#[test]
fn missing_columns_append_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("kurang.xlsx");
    write_fixture(&path, &["Derajat Sosoh"], &[vec![Number(96.0)]]);
    let mut store = SqliteHistoryStore::open_in_memory().expect("store");

    let request = BatchRequest {
        path: &path,
        extension: None,
        report_dir: &dir.path().join("reports"),
        budget: None,
    };
    let err = classify_batch(&mut store, &request).expect_err("columns missing");
    assert!(matches!(
        err,
        BatchError::Ingestion(IngestionError::MissingColumns { .. })
    ));
    assert!(store.list_all().expect("list").is_empty());
}

#[test]
fn report_failure_keeps_appended_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = fixture_path(dir.path(), "sampel.xlsx");
    // A plain file where the report directory should be.
    let blocked = dir.path().join("reports");
    std::fs::write(&blocked, b"not a directory").expect("write blocker");
    let mut store = SqliteHistoryStore::open_in_memory().expect("store");

    let request = BatchRequest {
        path: &path,
        extension: None,
        report_dir: &blocked,
        budget: None,
    };
    let err = classify_batch(&mut store, &request).expect_err("report cannot be written");
    match err {
        BatchError::Report { file, history, .. } => {
            assert_eq!(file, "sampel.xlsx");
            assert_eq!(
                history,
                HistoryWrite::Appended {
                    records: scenario_rows().len()
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.list_all().expect("list").len(), scenario_rows().len());
}

#[test]
fn storage_outage_does_not_block_grading() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = fixture_path(dir.path(), "sampel.xlsx");
    let report_dir = dir.path().join("reports");
    let mut store = UnavailableStore::new("disk full");

    let request = BatchRequest {
        path: &path,
        extension: Some("XLSX"),
        report_dir: &report_dir,
        budget: None,
    };
    let outcome = classify_batch(&mut store, &request).expect("grading still succeeds");
    assert!(outcome.history.warning().is_some());
    assert_eq!(outcome.result.dataset.rows.len(), scenario_rows().len());
    assert!(outcome.result.artifact_path.exists());
}

#[test]
fn exhausted_budget_stops_before_grading() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = fixture_path(dir.path(), "sampel.xlsx");
    let budget = crate::util::TimeoutBudget::new(1).expect("non-zero budget");
    std::thread::sleep(std::time::Duration::from_millis(20));

    let err = ingest(&path, "xlsx", Some(budget)).expect_err("budget is spent");
    assert!(matches!(err, IngestionError::Timeout { timeout_ms: 1, .. }));
}
