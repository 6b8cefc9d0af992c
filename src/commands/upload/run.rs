use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use super::ingest::{extension_of, ingest, source_name_of};
use super::report;
use super::types::{BatchError, BatchOutcome, BatchResult, IngestedBatch};
use crate::cli::{GlobalArgs, UploadArgs};
use crate::coerce::Coercion;
use crate::commands::open_store_or_unavailable;
use crate::grading::Grade;
use crate::history::{HistoryStore, HistoryWrite, append_or_warn};
use crate::model::{UploadCounts, UploadPaths, UploadRunManifest};
use crate::util::{
    TimeoutBudget, now_utc_string, sha256_file, utc_compact_string, write_json_pretty,
};

pub struct BatchRequest<'a> {
    pub path: &'a Path,
    pub extension: Option<&'a str>,
    pub report_dir: &'a Path,
    pub budget: Option<TimeoutBudget>,
}

pub fn classify_batch(
    store: &mut dyn HistoryStore,
    request: &BatchRequest<'_>,
) -> Result<BatchOutcome, BatchError> {
    let extension = request
        .extension
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| extension_of(request.path));

    let dataset = ingest(request.path, &extension, request.budget)?;
    let history = append_or_warn(store, &dataset.history_records());

    match report::emit(request.report_dir, &dataset) {
        Ok(artifact_path) => Ok(BatchOutcome {
            result: BatchResult {
                dataset,
                artifact_path,
            },
            history,
        }),
        Err(source) => {
            error!(file = %dataset.source_name, error = %source, "report generation failed");
            Err(BatchError::Report {
                file: dataset.source_name,
                history,
                source,
            })
        }
    }
}

pub fn run(args: UploadArgs, global: &GlobalArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("upload-{}", utc_compact_string(started_ts));

    let report_dir = args
        .report_dir
        .clone()
        .unwrap_or_else(|| global.data_dir.join("reports"));
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        global
            .data_dir
            .join("manifests")
            .join(format!("upload_run_{}.json", utc_compact_string(started_ts)))
    });
    let db_path = global.db_path();

    info!(file = %args.file.display(), run_id = %run_id, "starting upload");

    let mut store = open_store_or_unavailable(global);
    let request = BatchRequest {
        path: &args.file,
        extension: args.extension.as_deref(),
        report_dir: &report_dir,
        budget: TimeoutBudget::new(global.timeout_ms),
    };

    let manifest_base = ManifestBase {
        run_id: &run_id,
        started_at: &started_at,
        source_path: &args.file,
        db_path: &db_path,
    };

    match classify_batch(store.as_mut(), &request) {
        Ok(outcome) => {
            write_manifest(
                &manifest_path,
                manifest_base.build(
                    "completed",
                    &outcome.result.dataset,
                    Some(outcome.result.artifact_path.as_path()),
                    &outcome.history,
                ),
            );
            if args.json {
                write_json_response(&outcome)
            } else {
                write_text_response(&outcome)
            }
        }
        Err(BatchError::Report {
            file,
            history,
            source,
        }) => {
            let mut manifest = manifest_base.empty("report_failed", &history);
            manifest.warnings.push(format!("{source}"));
            write_manifest(&manifest_path, manifest);
            Err(source).with_context(|| {
                format!("report for {file} failed; history status: {}", history.describe())
            })
        }
        Err(BatchError::Ingestion(err)) => {
            Err(err).with_context(|| format!("failed to ingest {}", args.file.display()))
        }
    }
}

struct ManifestBase<'a> {
    run_id: &'a str,
    started_at: &'a str,
    source_path: &'a Path,
    db_path: &'a Path,
}

impl ManifestBase<'_> {
    fn empty(&self, status: &str, history: &HistoryWrite) -> UploadRunManifest {
        let mut warnings = Vec::new();
        if let Some(warning) = history.warning() {
            warnings.push(warning.to_string());
        }

        let source_sha256 = match sha256_file(self.source_path) {
            Ok(digest) => digest,
            Err(err) => {
                warnings.push(format!("{err:#}"));
                String::new()
            }
        };

        UploadRunManifest {
            manifest_version: 1,
            run_id: self.run_id.to_string(),
            status: status.to_string(),
            started_at: self.started_at.to_string(),
            updated_at: now_utc_string(),
            source_name: source_name_of(self.source_path),
            source_sha256,
            paths: UploadPaths {
                source_path: self.source_path.display().to_string(),
                db_path: self.db_path.display().to_string(),
                report_path: None,
            },
            counts: UploadCounts {
                history_appended: history.appended(),
                ..UploadCounts::default()
            },
            warnings,
        }
    }

    fn build(
        &self,
        status: &str,
        dataset: &IngestedBatch,
        report_path: Option<&Path>,
        history: &HistoryWrite,
    ) -> UploadRunManifest {
        let mut manifest = self.empty(status, history);
        manifest.paths.report_path = report_path.map(|path| path.display().to_string());
        for row in &dataset.rows {
            manifest.counts.tally(row.grade);
            if let Coercion::Failure(failure) = &row.coercion {
                manifest.warnings.push(format!(
                    "row {}: {}",
                    row.sheet_row_number(),
                    failure.describe()
                ));
            }
        }
        manifest
    }
}

fn write_manifest(path: &Path, manifest: UploadRunManifest) {
    match write_json_pretty(path, &manifest) {
        Ok(()) => info!(path = %path.display(), "wrote upload run manifest"),
        Err(err) => warn!(
            path = %path.display(),
            error = %format!("{err:#}"),
            "failed to write upload run manifest"
        ),
    }
}

#[derive(Serialize)]
struct UploadResponse<'a> {
    source_name: &'a str,
    report_path: String,
    rows: Vec<UploadRowView<'a>>,
    history: &'a HistoryWrite,
}

#[derive(Serialize)]
struct UploadRowView<'a> {
    row: usize,
    grade: Grade,
    coercion: &'a Coercion,
}

fn write_json_response(outcome: &BatchOutcome) -> Result<()> {
    let dataset = &outcome.result.dataset;
    let response = UploadResponse {
        source_name: &dataset.source_name,
        report_path: outcome.result.artifact_path.display().to_string(),
        rows: dataset
            .rows
            .iter()
            .map(|row| UploadRowView {
                row: row.sheet_row_number(),
                grade: row.grade,
                coercion: &row.coercion,
            })
            .collect(),
        history: &outcome.history,
    };

    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, &response)
        .context("failed to serialize upload json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_response(outcome: &BatchOutcome) -> Result<()> {
    let dataset = &outcome.result.dataset;
    let mut counts = UploadCounts::default();
    for row in &dataset.rows {
        counts.tally(row.grade);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "File: {}", dataset.source_name)?;
    writeln!(
        output,
        "Rows: {} premium={} medium={} submedium={} pecah={} incomplete={}",
        counts.rows_total,
        counts.premium,
        counts.medium,
        counts.submedium,
        counts.broken,
        counts.incomplete,
    )?;

    for row in &dataset.rows {
        match &row.coercion {
            Coercion::Success(_) => {
                writeln!(output, "{}.\t{}", row.sheet_row_number(), row.grade)?
            }
            Coercion::Failure(failure) => writeln!(
                output,
                "{}.\t{}\t{}",
                row.sheet_row_number(),
                row.grade,
                failure.describe()
            )?,
        }
    }

    writeln!(output, "Report: {}", outcome.result.artifact_path.display())?;
    writeln!(output, "History: {}", outcome.history.describe())?;
    output.flush()?;
    Ok(())
}
