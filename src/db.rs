//! Postgres-backed implementation of the store contract.
//!
//! Synchronous `postgres::Client`, SQL strings in the methods. Bulk status
//! changes are single UPDATE statements, so demotion is atomic with respect
//! to concurrent dashboard reads. Connect failures surface immediately —
//! evaluation must fail fast rather than hang its trigger.

use chrono::{DateTime, Utc};
use postgres::{Client, NoTls, Row};

use crate::model::{Alert, AlertLevel, AlertStatus, NewAlert, NewReading, Reading, StoreError};
use crate::store::Store;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS readings (
        id                  BIGSERIAL PRIMARY KEY,
        distance_cm         DOUBLE PRECISION NOT NULL,
        flood_level_cm      DOUBLE PRECISION NOT NULL,
        status_tag          TEXT NOT NULL,
        reading_time        TIMESTAMPTZ NOT NULL,
        received_at         TIMESTAMPTZ NOT NULL
    );
    CREATE INDEX IF NOT EXISTS readings_latest
        ON readings (reading_time DESC, id DESC);

    CREATE TABLE IF NOT EXISTS alerts (
        id                      BIGSERIAL PRIMARY KEY,
        level                   TEXT NOT NULL,
        message                 TEXT NOT NULL,
        status                  TEXT NOT NULL,
        source_distance_cm      DOUBLE PRECISION NOT NULL,
        source_flood_level_cm   DOUBLE PRECISION NOT NULL,
        reading_time            TIMESTAMPTZ NOT NULL,
        created_at              TIMESTAMPTZ NOT NULL,
        updated_at              TIMESTAMPTZ NOT NULL
    );
    CREATE INDEX IF NOT EXISTS alerts_newest
        ON alerts (created_at DESC, id DESC);
    CREATE INDEX IF NOT EXISTS alerts_dedup_key
        ON alerts (reading_time, level);
";

const ALERT_COLUMNS: &str =
    "id, level, message, status, source_distance_cm, source_flood_level_cm, \
     reading_time, created_at, updated_at";

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

pub struct PgStore {
    client: Client,
}

impl PgStore {
    /// Connect without touching the schema.
    pub fn connect(url: &str) -> Result<PgStore, StoreError> {
        let client = Client::connect(url, NoTls)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(PgStore { client })
    }

    /// Connect, create any missing tables, and verify both are queryable.
    /// Call this once at startup so a misconfigured database fails the
    /// process instead of the first evaluation cycle.
    pub fn connect_and_verify(url: &str) -> Result<PgStore, StoreError> {
        let mut store = PgStore::connect(url)?;
        store.client.batch_execute(SCHEMA)?;
        store.client.query("SELECT 1 FROM readings LIMIT 1", &[])?;
        store.client.query("SELECT 1 FROM alerts LIMIT 1", &[])?;
        Ok(store)
    }

    fn row_to_reading(row: &Row) -> Reading {
        Reading {
            id: row.get(0),
            distance_cm: row.get(1),
            flood_level_cm: row.get(2),
            status_tag: row.get(3),
            reading_time: row.get(4),
            received_at: row.get(5),
        }
    }

    fn row_to_alert(row: &Row) -> Result<Alert, StoreError> {
        let level_str: String = row.get(1);
        let status_str: String = row.get(3);
        let level = AlertLevel::from_str(&level_str)
            .ok_or_else(|| StoreError::Query(format!("unknown alert level '{}'", level_str)))?;
        let status = AlertStatus::from_str(&status_str)
            .ok_or_else(|| StoreError::Query(format!("unknown alert status '{}'", status_str)))?;

        Ok(Alert {
            id: row.get(0),
            level,
            message: row.get(2),
            status,
            source_distance_cm: row.get(4),
            source_flood_level_cm: row.get(5),
            reading_time: row.get(6),
            created_at: row.get(7),
            updated_at: row.get(8),
        })
    }

    fn rows_to_alerts(rows: Vec<Row>) -> Result<Vec<Alert>, StoreError> {
        rows.iter().map(Self::row_to_alert).collect()
    }
}

impl Store for PgStore {
    fn insert_reading(&mut self, reading: NewReading) -> Result<Reading, StoreError> {
        let row = self.client.query_one(
            "INSERT INTO readings
                 (distance_cm, flood_level_cm, status_tag, reading_time, received_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
            &[
                &reading.distance_cm,
                &reading.flood_level_cm,
                &reading.status_tag,
                &reading.reading_time,
                &reading.received_at,
            ],
        )?;

        Ok(Reading {
            id: row.get(0),
            distance_cm: reading.distance_cm,
            flood_level_cm: reading.flood_level_cm,
            status_tag: reading.status_tag,
            reading_time: reading.reading_time,
            received_at: reading.received_at,
        })
    }

    fn latest_reading(&mut self) -> Result<Option<Reading>, StoreError> {
        let rows = self.client.query(
            "SELECT id, distance_cm, flood_level_cm, status_tag, reading_time, received_at
             FROM readings
             ORDER BY reading_time DESC, id DESC
             LIMIT 1",
            &[],
        )?;

        Ok(rows.first().map(Self::row_to_reading))
    }

    fn insert_alert(&mut self, alert: NewAlert) -> Result<Alert, StoreError> {
        let row = self.client.query_one(
            "INSERT INTO alerts
                 (level, message, status, source_distance_cm, source_flood_level_cm,
                  reading_time, created_at, updated_at)
             VALUES ($1, $2, 'active', $3, $4, $5, $6, $6)
             RETURNING id",
            &[
                &alert.level.as_str(),
                &alert.message,
                &alert.source_distance_cm,
                &alert.source_flood_level_cm,
                &alert.reading_time,
                &alert.created_at,
            ],
        )?;

        Ok(Alert {
            id: row.get(0),
            level: alert.level,
            message: alert.message,
            status: AlertStatus::Active,
            source_distance_cm: alert.source_distance_cm,
            source_flood_level_cm: alert.source_flood_level_cm,
            reading_time: alert.reading_time,
            created_at: alert.created_at,
            updated_at: alert.created_at,
        })
    }

    fn find_by_reading_and_level(
        &mut self,
        reading_time: DateTime<Utc>,
        level: AlertLevel,
    ) -> Result<Option<Alert>, StoreError> {
        let rows = self.client.query(
            &format!(
                "SELECT {} FROM alerts
                 WHERE reading_time = $1 AND level = $2
                 LIMIT 1",
                ALERT_COLUMNS
            ),
            &[&reading_time, &level.as_str()],
        )?;

        rows.first().map(Self::row_to_alert).transpose()
    }

    fn list_active(&mut self) -> Result<Vec<Alert>, StoreError> {
        let rows = self.client.query(
            &format!(
                "SELECT {} FROM alerts
                 WHERE status = 'active'
                 ORDER BY created_at DESC, id DESC",
                ALERT_COLUMNS
            ),
            &[],
        )?;

        Self::rows_to_alerts(rows)
    }

    fn set_status(
        &mut self,
        ids: &[i64],
        status: AlertStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let id_vec: Vec<i64> = ids.to_vec();
        let changed = self.client.execute(
            "UPDATE alerts
             SET status = $1, updated_at = $2
             WHERE id = ANY($3) AND status <> $1",
            &[&status.as_str(), &updated_at, &id_vec],
        )?;
        Ok(changed as usize)
    }

    fn close_all_active(&mut self, updated_at: DateTime<Utc>) -> Result<usize, StoreError> {
        let closed = self.client.execute(
            "UPDATE alerts
             SET status = 'past', updated_at = $1
             WHERE status = 'active'",
            &[&updated_at],
        )?;
        Ok(closed as usize)
    }

    fn list_alerts(
        &mut self,
        since: Option<DateTime<Utc>>,
        status: Option<AlertStatus>,
    ) -> Result<Vec<Alert>, StoreError> {
        let rows = match (since, status) {
            (None, None) => self.client.query(
                &format!(
                    "SELECT {} FROM alerts ORDER BY created_at DESC, id DESC",
                    ALERT_COLUMNS
                ),
                &[],
            )?,
            (Some(since), None) => self.client.query(
                &format!(
                    "SELECT {} FROM alerts
                     WHERE created_at > $1
                     ORDER BY created_at DESC, id DESC",
                    ALERT_COLUMNS
                ),
                &[&since],
            )?,
            (None, Some(status)) => self.client.query(
                &format!(
                    "SELECT {} FROM alerts
                     WHERE status = $1
                     ORDER BY created_at DESC, id DESC",
                    ALERT_COLUMNS
                ),
                &[&status.as_str()],
            )?,
            (Some(since), Some(status)) => self.client.query(
                &format!(
                    "SELECT {} FROM alerts
                     WHERE created_at > $1 AND status = $2
                     ORDER BY created_at DESC, id DESC",
                    ALERT_COLUMNS
                ),
                &[&since, &status.as_str()],
            )?,
        };

        Self::rows_to_alerts(rows)
    }
}
