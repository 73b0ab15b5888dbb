//! SQLite implementation of PersistenceGateway
//!
//! Instants are stored as INTEGER unix microseconds so range scans on
//! `ship_position.ts` use the index and compare numerically.

use super::{
    CountAggregate, GatewayError, IngestionLogEntry, PersistenceGateway, PositionRecord,
    StaticRecord,
};
use crate::sqlite_pragma::apply_optimized_pragmas;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Schema files, applied in order. Each uses IF NOT EXISTS.
const MIGRATIONS: &[(&str, &str)] = &[
    ("01_ship_position.sql", include_str!("../../sql/01_ship_position.sql")),
    ("02_ship_static.sql", include_str!("../../sql/02_ship_static.sql")),
    ("03_ingestion_log.sql", include_str!("../../sql/03_ingestion_log.sql")),
    ("04_ship_count_agg.sql", include_str!("../../sql/04_ship_count_agg.sql")),
];

/// Keeps `IN (...)` lists well under SQLITE_MAX_VARIABLE_NUMBER
const STATIC_LOOKUP_CHUNK: usize = 500;

pub struct SqliteGateway {
    conn: Mutex<Connection>,
}

impl SqliteGateway {
    /// Open (or create) the database file and apply connection PRAGMAs
    ///
    /// Does NOT create the schema; call `ensure_schema` first.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    GatewayError::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to create database directory {}: {}", parent.display(), e),
                    ))
                })?;
            }
        }

        let conn = Connection::open(db_path.as_ref())?;
        apply_optimized_pragmas(&conn)?;

        log::info!("✅ SQLite gateway opened: {}", db_path.as_ref().display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, GatewayError> {
        self.conn.lock().map_err(|_| GatewayError::Poisoned)
    }
}

fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>, GatewayError> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| GatewayError::Corrupt(format!("timestamp out of range: {}", micros)))
}

fn count_to_sql(count: u64) -> Result<i64, GatewayError> {
    i64::try_from(count).map_err(|_| GatewayError::Corrupt(format!("count too large: {}", count)))
}

fn count_from_sql(value: i64) -> Result<u64, GatewayError> {
    u64::try_from(value).map_err(|_| GatewayError::Corrupt(format!("negative count: {}", value)))
}

#[async_trait]
impl PersistenceGateway for SqliteGateway {
    async fn ensure_schema(&self) -> Result<(), GatewayError> {
        let conn = self.lock()?;

        log::info!("🔧 Ensuring schema ({} files)", MIGRATIONS.len());
        for (name, sql) in MIGRATIONS {
            conn.execute_batch(sql)?;
            log::debug!("   ├─ ✅ {}", name);
        }
        log::info!("✅ Schema ready");

        Ok(())
    }

    async fn upsert_static(&self, record: &StaticRecord) -> Result<(), GatewayError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO ship_static
                (ship_id, ship_type, destination, last_update, dim_a, dim_b, dim_c, dim_d)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(ship_id) DO UPDATE SET
                ship_type   = excluded.ship_type,
                destination = excluded.destination,
                last_update = excluded.last_update,
                dim_a       = excluded.dim_a,
                dim_b       = excluded.dim_b,
                dim_c       = excluded.dim_c,
                dim_d       = excluded.dim_d
            "#,
            params![
                record.ship_id,
                record.ship_type,
                record.destination,
                to_micros(record.last_update),
                record.dim_a,
                record.dim_b,
                record.dim_c,
                record.dim_d,
            ],
        )?;
        Ok(())
    }

    async fn append_position(&self, record: &PositionRecord) -> Result<(), GatewayError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO ship_position (ship_id, ts, latitude, longitude) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.ship_id,
                to_micros(record.observed_at),
                record.latitude,
                record.longitude,
            ],
        )?;
        Ok(())
    }

    async fn append_ingestion_log(&self, entry: &IngestionLogEntry) -> Result<(), GatewayError> {
        let records = count_to_sql(entry.records_received)?;
        let errors = count_to_sql(entry.errors_encountered)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO ingestion_log
                (window_start, window_end, records_received, errors_encountered)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                to_micros(entry.window_start),
                to_micros(entry.window_end),
                records,
                errors,
            ],
        )?;
        Ok(())
    }

    async fn read_positions_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PositionRecord>, GatewayError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT ship_id, ts, latitude, longitude
             FROM ship_position
             WHERE ts >= ?1 AND ts < ?2
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![to_micros(start), to_micros(end)], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;

        let mut positions = Vec::new();
        for row in rows {
            let (ship_id, ts, latitude, longitude) = row?;
            positions.push(PositionRecord {
                ship_id,
                observed_at: from_micros(ts)?,
                latitude,
                longitude,
            });
        }
        Ok(positions)
    }

    async fn read_static_by_ship_ids(&self, ids: &[i64]) -> Result<Vec<StaticRecord>, GatewayError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut records = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(STATIC_LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT ship_id, ship_type, destination, last_update, dim_a, dim_b, dim_c, dim_d
                 FROM ship_static
                 WHERE ship_id IN ({})
                 ORDER BY ship_id ASC",
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, Option<f64>>(6)?,
                    row.get::<_, Option<f64>>(7)?,
                ))
            })?;

            for row in rows {
                let (ship_id, ship_type, destination, last_update, dim_a, dim_b, dim_c, dim_d) = row?;
                records.push(StaticRecord {
                    ship_id,
                    ship_type,
                    destination,
                    last_update: from_micros(last_update)?,
                    dim_a,
                    dim_b,
                    dim_c,
                    dim_d,
                });
            }
        }

        Ok(records)
    }

    async fn upsert_count_aggregate(&self, record: &CountAggregate) -> Result<(), GatewayError> {
        let total = count_to_sql(record.total)?;
        let cargo = count_to_sql(record.cargo)?;
        let tanker = count_to_sql(record.tanker)?;
        let passenger = count_to_sql(record.passenger)?;

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO ship_count_agg
                (batch_start, total_vessel_count, cargo_count, tanker_count, passenger_count)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(batch_start) DO UPDATE SET
                total_vessel_count = excluded.total_vessel_count,
                cargo_count        = excluded.cargo_count,
                tanker_count       = excluded.tanker_count,
                passenger_count    = excluded.passenger_count
            "#,
            params![to_micros(record.batch_start), total, cargo, tanker, passenger],
        )?;
        Ok(())
    }

    async fn read_count_aggregate(
        &self,
        batch_start: DateTime<Utc>,
    ) -> Result<Option<CountAggregate>, GatewayError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT total_vessel_count, cargo_count, tanker_count, passenger_count
                 FROM ship_count_agg
                 WHERE batch_start = ?1",
                params![to_micros(batch_start)],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((total, cargo, tanker, passenger)) => Ok(Some(CountAggregate {
                batch_start,
                total: count_from_sql(total)?,
                cargo: count_from_sql(cargo)?,
                tanker: count_from_sql(tanker)?,
                passenger: count_from_sql(passenger)?,
            })),
            None => Ok(None),
        }
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
