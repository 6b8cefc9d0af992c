use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::{ClassifyArgs, GlobalArgs};
use crate::coerce::{self, Coercion, RawRecord, RawValue};
use crate::commands::open_store_or_unavailable;
use crate::grading::Grade;
use crate::history::{HistoryStore, HistoryWrite, append_or_warn};
use crate::model::{MeasurementField, NewHistoryRecord, PartialMeasurement, SOURCE_MANUAL};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManualOutcome {
    pub grade: Grade,
    pub coercion: Coercion,
    pub history: HistoryWrite,
}

pub fn classify_manual(store: &mut dyn HistoryStore, raw: &RawRecord) -> ManualOutcome {
    let (coercion, grade) = coerce::classify(raw);

    let history = match &coercion {
        Coercion::Success(measurement) => append_or_warn(
            store,
            &[NewHistoryRecord {
                source: SOURCE_MANUAL.to_string(),
                measurement: PartialMeasurement::from(*measurement),
                grade,
            }],
        ),
        Coercion::Failure(failure) => {
            info!(issues = %failure.describe(), "manual entry incomplete; not recorded");
            HistoryWrite::Skipped
        }
    };

    ManualOutcome {
        grade,
        coercion,
        history,
    }
}

pub fn run(args: ClassifyArgs, global: &GlobalArgs) -> Result<()> {
    let raw = RawRecord {
        polish: RawValue::from_form(args.polish.as_deref()),
        moisture: RawValue::from_form(args.moisture.as_deref()),
        broken: RawValue::from_form(args.broken.as_deref()),
        chalky: RawValue::from_form(args.chalky.as_deref()),
    };

    let mut store = open_store_or_unavailable(global);
    let outcome = classify_manual(store.as_mut(), &raw);
    info!(grade = %outcome.grade, "manual classification complete");

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &outcome)
            .context("failed to serialize classification json output")?;
        writeln!(output)?;
    } else {
        write_text_response(&mut output, &outcome)?;
    }
    output.flush()?;
    Ok(())
}

fn write_text_response(output: &mut impl Write, outcome: &ManualOutcome) -> Result<()> {
    match &outcome.coercion {
        Coercion::Success(measurement) => {
            for field in MeasurementField::ALL {
                writeln!(output, "{}: {}", field.column_name(), measurement.value(field))?;
            }
        }
        Coercion::Failure(failure) => {
            for issue in &failure.issues {
                writeln!(
                    output,
                    "{} ({}): {}",
                    issue.field.column_name(),
                    issue.field.form_name(),
                    issue.reason
                )?;
            }
        }
    }
    writeln!(output, "Kelas Mutu: {}", outcome.grade)?;
    writeln!(output, "History: {}", outcome.history.describe())?;
    Ok(())
}
