use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, TransactionBehavior, params};
use tracing::{debug, info};

use super::{HistoryStore, StorageError};
use crate::grading::Grade;
use crate::model::{HistoryRecord, NewHistoryRecord};
use crate::util::now_utc_millis_string;

pub const DB_SCHEMA_VERSION: &str = "0.1.0";

pub struct SqliteHistoryStore {
    connection: Connection,
}

impl SqliteHistoryStore {
    pub fn open(db_path: &Path, busy_timeout: Duration) -> Result<Self, StorageError> {
        let connection = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        configure_connection(&connection, busy_timeout)?;
        ensure_schema(&connection)?;
        debug!(path = %db_path.display(), "opened history store");
        Ok(Self { connection })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let connection = Connection::open_in_memory()?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    pub fn latest_timestamp(&self) -> Result<Option<String>, StorageError> {
        let timestamp = self.connection.query_row(
            "SELECT MAX(timestamp) FROM riwayat",
            [],
            |row| row.get::<_, Option<String>>(0),
        )?;
        Ok(timestamp)
    }

    pub fn schema_version(&self) -> Result<Option<String>, StorageError> {
        let mut statement = self
            .connection
            .prepare("SELECT value FROM metadata WHERE key = 'db_schema_version'")?;
        let mut rows = statement.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

fn configure_connection(
    connection: &Connection,
    busy_timeout: Duration,
) -> Result<(), StorageError> {
    connection.pragma_update(None, "journal_mode", "WAL")?;
    connection.pragma_update(None, "synchronous", "NORMAL")?;
    connection.busy_timeout(busy_timeout)?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<(), StorageError> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS riwayat (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          timestamp TEXT NOT NULL,
          sumber TEXT NOT NULL,
          derajat_sosoh REAL,
          kadar_air REAL,
          butir_patah REAL,
          butir_menir REAL,
          kelas_mutu TEXT NOT NULL
        );
        ",
    )?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;

    Ok(())
}

fn touch_updated_at(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_millis_string()],
    )?;
    Ok(())
}

impl HistoryStore for SqliteHistoryStore {
    fn append(&mut self, records: &[NewHistoryRecord]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        {
            let mut statement = tx.prepare(
                "
                INSERT INTO riwayat(timestamp, sumber, derajat_sosoh, kadar_air, butir_patah, butir_menir, kelas_mutu)
                VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )?;

            for record in records {
                let measurement = &record.measurement;
                statement.execute(params![
                    now_utc_millis_string(),
                    &record.source,
                    measurement.polish_degree,
                    measurement.moisture_content,
                    measurement.broken_grain_pct,
                    measurement.chalky_grain_pct,
                    record.grade.as_str(),
                ])?;
            }
        }

        touch_updated_at(&tx)?;
        tx.commit()?;

        info!(
            records = records.len(),
            source = %records[0].source,
            "appended history records"
        );
        Ok(records.len())
    }

    fn list_all(&self) -> Result<Vec<HistoryRecord>, StorageError> {
        let mut statement = self.connection.prepare(
            "
            SELECT id, timestamp, sumber, derajat_sosoh, kadar_air, butir_patah, butir_menir, kelas_mutu
            FROM riwayat
            ORDER BY id DESC
            ",
        )?;

        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, Option<f64>>(4)?,
                row.get::<_, Option<f64>>(5)?,
                row.get::<_, Option<f64>>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, timestamp, source, polish, moisture, broken, chalky, label) = row?;
            let grade = label
                .parse::<Grade>()
                .map_err(|source| StorageError::InvalidGrade { id, source })?;

            records.push(HistoryRecord {
                id,
                timestamp,
                source,
                polish_degree: polish,
                moisture_content: moisture,
                broken_grain_pct: broken,
                chalky_grain_pct: chalky,
                grade,
            });
        }

        Ok(records)
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = tx.execute("DELETE FROM riwayat", [])?;
        tx.execute("DELETE FROM sqlite_sequence WHERE name = 'riwayat'", [])?;
        touch_updated_at(&tx)?;
        tx.commit()?;

        info!(removed, "cleared history");
        Ok(())
    }

    fn count_by_grade(&self) -> Result<Vec<(Grade, i64)>, StorageError> {
        let mut counts = Vec::with_capacity(Grade::ALL.len());
        for grade in Grade::ALL {
            let count: i64 = self.connection.query_row(
                "SELECT COUNT(*) FROM riwayat WHERE kelas_mutu = ?1",
                [grade.as_str()],
                |row| row.get(0),
            )?;
            counts.push((grade, count));
        }
        Ok(counts)
    }
}
