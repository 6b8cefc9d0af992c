use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::{GlobalArgs, HistoryArgs};
use crate::commands::{open_store, open_store_or_unavailable};
use crate::history::HistoryStore;
use crate::model::HistoryRecord;

pub fn run(args: HistoryArgs, global: &GlobalArgs) -> Result<()> {
    let store = open_store_or_unavailable(global);
    let (records, total) = load_history(store.as_ref(), args.limit);

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &records)
            .context("failed to serialize history json output")?;
        writeln!(output)?;
    } else {
        write_text_response(&mut output, &records, total)?;
    }
    output.flush()?;
    Ok(())
}

pub fn clear(global: &GlobalArgs) -> Result<()> {
    let mut store = open_store(global)?;
    store.clear().context("failed to clear history")?;
    info!(path = %global.db_path().display(), "history cleared");
    Ok(())
}

fn load_history(store: &dyn HistoryStore, limit: Option<usize>) -> (Vec<HistoryRecord>, usize) {
    let mut records = match store.list_all() {
        Ok(records) => records,
        Err(err) => {
            warn!(error = %err, "failed to list history; showing no records");
            Vec::new()
        }
    };
    let total = records.len();
    if let Some(limit) = limit {
        records.truncate(limit);
    }
    info!(total, shown = records.len(), "loaded history");
    (records, total)
}

fn write_text_response(
    output: &mut impl Write,
    records: &[HistoryRecord],
    total: usize,
) -> Result<()> {
    writeln!(output, "Records: {} of {}", records.len(), total)?;

    for record in records {
        writeln!(
            output,
            "{}\t{}\t{}\tsosoh={} air={} patah={} menir={}\t{}",
            record.id,
            record.timestamp,
            record.source,
            format_value(record.polish_degree),
            format_value(record.moisture_content),
            format_value(record.broken_grain_pct),
            format_value(record.chalky_grain_pct),
            record.grade,
        )?;
    }

    Ok(())
}

fn format_value(value: Option<f64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::Grade;
    use crate::history::{SqliteHistoryStore, UnavailableStore};
    use crate::model::{NewHistoryRecord, PartialMeasurement, SOURCE_MANUAL};

    #[test]
    fn unreadable_history_is_listed_as_empty() {
        let store = UnavailableStore::new("database is locked");
        let (records, total) = load_history(&store, None);
        assert!(records.is_empty());
        assert_eq!(total, 0);

        let mut buffer = Vec::new();
        write_text_response(&mut buffer, &records, total).expect("render");
        assert_eq!(String::from_utf8(buffer).expect("utf8"), "Records: 0 of 0\n");
    }

    #[test]
    fn limit_keeps_the_newest_records() {
        let mut store = SqliteHistoryStore::open_in_memory().expect("store");
        let batch: Vec<_> = [Grade::Premium, Grade::Medium, Grade::Broken]
            .into_iter()
            .map(|grade| NewHistoryRecord {
                source: SOURCE_MANUAL.to_string(),
                measurement: PartialMeasurement::default(),
                grade,
            })
            .collect();
        store.append(&batch).expect("append");

        let (records, total) = load_history(&store, Some(2));
        assert_eq!(total, 3);
        let grades: Vec<Grade> = records.iter().map(|record| record.grade).collect();
        assert_eq!(grades, vec![Grade::Broken, Grade::Medium]);
    }

    #[test]
    fn text_response_marks_missing_measurements() {
        let records = vec![HistoryRecord {
            id: 7,
            timestamp: "2026-10-18T08:00:00.000Z".to_string(),
            source: "File: sampel.xlsx".to_string(),
            polish_degree: Some(96.0),
            moisture_content: None,
            broken_grain_pct: Some(10.0),
            chalky_grain_pct: Some(0.3),
            grade: Grade::Incomplete,
        }];

        let mut buffer = Vec::new();
        write_text_response(&mut buffer, &records, 3).expect("render");
        let text = String::from_utf8(buffer).expect("utf8");

        assert!(text.starts_with("Records: 1 of 3\n"));
        assert!(text.contains("7\t2026-10-18T08:00:00.000Z\tFile: sampel.xlsx"));
        assert!(text.contains("sosoh=96 air=- patah=10 menir=0.3"));
        assert!(text.trim_end().ends_with("Data Tidak Lengkap"));
    }

    #[test]
    fn history_records_serialize_with_grade_labels() {
        let record = HistoryRecord {
            id: 1,
            timestamp: "2026-10-18T08:00:00.000Z".to_string(),
            source: "Manual".to_string(),
            polish_degree: Some(96.0),
            moisture_content: Some(13.0),
            broken_grain_pct: Some(35.0),
            chalky_grain_pct: Some(3.0),
            grade: Grade::Broken,
        };
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["grade"], "Pecah");
        assert_eq!(json["moisture_content"], 13.0);
    }
}
