//! Persisted power/temperature time series backed by SQLite.
//!
//! Records are append-only: an id and timestamp are assigned on insert and
//! rows only leave the table through [`MetricsStore::prune`]. All access goes
//! through an internal mutex, so one store can be shared through an `Arc`
//! between the sampler thread and any number of readers.

pub mod aggregate;
pub mod clock;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use tracing::{debug, info, info_span};

pub use aggregate::{DailyAverage, HourlyAverage, PowerTempRecord, Stats};
pub use clock::{Clock, ManualClock, SystemClock};

use crate::error::StoreError;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS power_readings (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp_ms  INTEGER NOT NULL,
    power_watts   REAL NOT NULL,
    cpu_temp      REAL NOT NULL,
    gpu_temp      REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS power_readings_timestamp ON power_readings (timestamp_ms);
";

pub struct MetricsStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn timestamp_from_ms(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms).ok_or(StoreError::InvalidTimestamp(ms))
}

impl MetricsStore {
    /// Open or create the store at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let _span = info_span!("store_open", path = %path.display()).entered();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(SCHEMA)?;
        info!("metrics store ready");

        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        MetricsStore {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn cutoff_ms(&self, before_now: Duration) -> i64 {
        self.now()
            .timestamp_millis()
            .saturating_sub(duration_ms(before_now))
    }

    /// Append one record stamped with the current time.
    pub fn insert(
        &self,
        power_watts: f64,
        cpu_temp_c: f64,
        gpu_temp_c: f64,
    ) -> Result<PowerTempRecord, StoreError> {
        // Stamped under the lock so id order and timestamp order agree.
        let conn = self.conn.lock();
        let timestamp_ms = self.now().timestamp_millis();
        conn.execute(
            "INSERT INTO power_readings (timestamp_ms, power_watts, cpu_temp, gpu_temp) \
             VALUES (?1, ?2, ?3, ?4)",
            params![timestamp_ms, power_watts, cpu_temp_c, gpu_temp_c],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        debug!(id, power_watts, cpu_temp_c, gpu_temp_c, "power reading stored");
        Ok(PowerTempRecord {
            id,
            timestamp: timestamp_from_ms(timestamp_ms)?,
            power_watts,
            cpu_temp_c,
            gpu_temp_c,
        })
    }

    /// Records newer than `now - since`, oldest first.
    pub fn query_range(&self, since: Duration) -> Result<Vec<PowerTempRecord>, StoreError> {
        let cutoff = self.cutoff_ms(since);
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, timestamp_ms, power_watts, cpu_temp, gpu_temp \
             FROM power_readings \
             WHERE timestamp_ms > ?1 \
             ORDER BY timestamp_ms, id",
        )?;
        let rows = stmt.query_map(params![cutoff], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, timestamp_ms, power_watts, cpu_temp_c, gpu_temp_c) = row?;
            records.push(PowerTempRecord {
                id,
                timestamp: timestamp_from_ms(timestamp_ms)?,
                power_watts,
                cpu_temp_c,
                gpu_temp_c,
            });
        }
        Ok(records)
    }

    pub fn summarize(&self, since: Duration) -> Result<Stats, StoreError> {
        let cutoff = self.cutoff_ms(since);
        let conn = self.conn.lock();
        let (count, avg, max, min) = conn.query_row(
            "SELECT COUNT(*), AVG(power_watts), MAX(power_watts), MIN(power_watts) \
             FROM power_readings \
             WHERE timestamp_ms > ?1",
            params![cutoff],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            },
        )?;
        Ok(Stats::from_aggregates(
            u64::try_from(count).unwrap_or(0),
            avg.unwrap_or(0.0),
            max.unwrap_or(0.0),
            min.unwrap_or(0.0),
        ))
    }

    /// Mean power per local calendar hour over the window, oldest first.
    pub fn hourly_average(&self, since: Duration) -> Result<Vec<HourlyAverage>, StoreError> {
        let records = self.query_range(since)?;
        Ok(aggregate::hourly_buckets(&records, &Local))
    }

    /// Mean power and energy per local calendar day over the last `since_days`.
    pub fn daily_average(&self, since_days: u32) -> Result<Vec<DailyAverage>, StoreError> {
        let since = Duration::from_secs(u64::from(since_days) * 24 * 3600);
        let records = self.query_range(since)?;
        Ok(aggregate::daily_buckets(&records, &Local))
    }

    /// Delete records strictly older than `now - older_than`.
    pub fn prune(&self, older_than: Duration) -> Result<usize, StoreError> {
        let cutoff = self.cutoff_ms(older_than);
        let deleted = self.conn.lock().execute(
            "DELETE FROM power_readings WHERE timestamp_ms < ?1",
            params![cutoff],
        )?;
        if deleted > 0 {
            info!(deleted, "pruned old power readings");
        }
        Ok(deleted)
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let count: i64 =
            self.conn
                .lock()
                .query_row("SELECT COUNT(*) FROM power_readings", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    pub fn close(self) -> Result<(), StoreError> {
        self.conn
            .into_inner()
            .close()
            .map_err(|(_, err)| StoreError::Sqlite(err))
    }
}

impl std::fmt::Debug for MetricsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsStore").finish_non_exhaustive()
    }
}
