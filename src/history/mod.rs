use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::grading::{Grade, UnknownGrade};
use crate::model::{HistoryRecord, NewHistoryRecord};

mod sqlite;

pub use sqlite::SqliteHistoryStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("history database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("history store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("history record {id} has an invalid grade")]
    InvalidGrade {
        id: i64,
        #[source]
        source: UnknownGrade,
    },
}

pub trait HistoryStore {
    fn append(&mut self, records: &[NewHistoryRecord]) -> Result<usize, StorageError>;

    fn list_all(&self) -> Result<Vec<HistoryRecord>, StorageError>;

    fn clear(&mut self) -> Result<(), StorageError>;

    fn count_by_grade(&self) -> Result<Vec<(Grade, i64)>, StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HistoryWrite {
    Appended { records: usize },
    Skipped,
    Failed { warning: String },
}

impl HistoryWrite {
    pub fn appended(&self) -> usize {
        match self {
            Self::Appended { records } => *records,
            Self::Skipped | Self::Failed { .. } => 0,
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            Self::Failed { warning } => Some(warning),
            Self::Appended { .. } | Self::Skipped => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Appended { records } => format!("{records} record(s) appended"),
            Self::Skipped => "not recorded".to_string(),
            Self::Failed { warning } => format!("not recorded ({warning})"),
        }
    }
}

pub fn append_or_warn(
    store: &mut dyn HistoryStore,
    records: &[NewHistoryRecord],
) -> HistoryWrite {
    match store.append(records) {
        Ok(records) => HistoryWrite::Appended { records },
        Err(err) => {
            warn!(error = %err, records = records.len(), "failed to append history");
            HistoryWrite::Failed {
                warning: err.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> StorageError {
        StorageError::Unavailable {
            reason: self.reason.clone(),
        }
    }
}

impl HistoryStore for UnavailableStore {
    fn append(&mut self, _records: &[NewHistoryRecord]) -> Result<usize, StorageError> {
        Err(self.error())
    }

    fn list_all(&self) -> Result<Vec<HistoryRecord>, StorageError> {
        Err(self.error())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        Err(self.error())
    }

    fn count_by_grade(&self) -> Result<Vec<(Grade, i64)>, StorageError> {
        Err(self.error())
    }
}
