pub mod classify;
pub mod history;
pub mod status;
pub mod upload;

use anyhow::{Context, Result};
use tracing::warn;

use crate::cli::GlobalArgs;
use crate::history::{HistoryStore, SqliteHistoryStore, UnavailableStore};
use crate::util::ensure_directory;

pub(crate) fn open_store(global: &GlobalArgs) -> Result<SqliteHistoryStore> {
    let db_path = global.db_path();
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }

    SqliteHistoryStore::open(&db_path, global.busy_timeout())
        .with_context(|| format!("failed to open history database {}", db_path.display()))
}

pub(crate) fn open_store_or_unavailable(global: &GlobalArgs) -> Box<dyn HistoryStore> {
    match open_store(global) {
        Ok(store) => Box::new(store),
        Err(err) => {
            let reason = format!("{err:#}");
            warn!(error = %reason, "history store unavailable; results will not be recorded");
            Box::new(UnavailableStore::new(reason))
        }
    }
}
