use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::GlobalArgs;
use crate::commands::open_store;
use crate::grading::Grade;
use crate::history::HistoryStore;

pub fn run(global: &GlobalArgs) -> Result<()> {
    let db_path = global.db_path();
    info!(data_dir = %global.data_dir.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "history database missing");
        return Ok(());
    }

    let store = open_store(global)?;
    let counts = store
        .count_by_grade()
        .context("failed to count history records")?;
    let count_of = |grade: Grade| {
        counts
            .iter()
            .find(|(candidate, _)| *candidate == grade)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    };
    let total: i64 = counts.iter().map(|(_, count)| count).sum();

    info!(
        path = %db_path.display(),
        schema_version = %store.schema_version()?.unwrap_or_default(),
        records = total,
        premium = count_of(Grade::Premium),
        medium = count_of(Grade::Medium),
        submedium = count_of(Grade::Submedium),
        pecah = count_of(Grade::Broken),
        incomplete = count_of(Grade::Incomplete),
        latest = %store.latest_timestamp()?.unwrap_or_default(),
        "database status"
    );

    let reports_dir = global.data_dir.join("reports");
    if reports_dir.exists() {
        info!(path = %reports_dir.display(), "report directory present");
    } else {
        warn!(path = %reports_dir.display(), "report directory missing");
    }

    Ok(())
}
