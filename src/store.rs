//! Storage contract for readings and alerts.
//!
//! The evaluation engine and the API layer talk to storage only through the
//! [`Store`] trait, so the engine's semantics can be exercised against the
//! in-memory [`MemoryStore`] while production runs on `db::PgStore`.
//!
//! Ordering contract: every listing returns rows newest-first by
//! `created_at`, ties broken by `id` descending — cap eviction depends on
//! this ordering being stable.

use chrono::{DateTime, Utc};

use crate::model::{Alert, AlertLevel, AlertStatus, NewAlert, NewReading, Reading, StoreError};

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

pub trait Store: Send {
    // --- readings ---

    /// Append one immutable reading; the store assigns the id.
    fn insert_reading(&mut self, reading: NewReading) -> Result<Reading, StoreError>;

    /// The most recent reading by `reading_time`, if any exist.
    fn latest_reading(&mut self) -> Result<Option<Reading>, StoreError>;

    // --- alerts ---

    /// Insert a new alert with status Active. The store assigns the id and
    /// stamps `updated_at = created_at`.
    fn insert_alert(&mut self, alert: NewAlert) -> Result<Alert, StoreError>;

    /// Duplicate lookup on the exact key `(reading_time, level)`.
    fn find_by_reading_and_level(
        &mut self,
        reading_time: DateTime<Utc>,
        level: AlertLevel,
    ) -> Result<Option<Alert>, StoreError>;

    /// All Active alerts, newest first.
    fn list_active(&mut self) -> Result<Vec<Alert>, StoreError>;

    /// Bulk status change for the given ids. Atomic per call with respect
    /// to concurrent readers.
    fn set_status(
        &mut self,
        ids: &[i64],
        status: AlertStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    /// Demote every Active alert to Past in one atomic operation, returning
    /// how many were demoted. The sustained-safe confirmation path.
    fn close_all_active(&mut self, updated_at: DateTime<Utc>) -> Result<usize, StoreError>;

    /// All alerts newest-first, optionally restricted to rows created
    /// after `since` and/or to a single status.
    fn list_alerts(
        &mut self,
        since: Option<DateTime<Utc>>,
        status: Option<AlertStatus>,
    ) -> Result<Vec<Alert>, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Vec-backed store used by unit and scenario tests. Mirrors the ordering
/// and status semantics of the Postgres implementation exactly.
#[derive(Debug)]
pub struct MemoryStore {
    readings: Vec<Reading>,
    alerts: Vec<Alert>,
    next_reading_id: i64,
    next_alert_id: i64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            readings: Vec::new(),
            alerts: Vec::new(),
            next_reading_id: 1,
            next_alert_id: 1,
        }
    }

    fn newest_first(mut alerts: Vec<Alert>) -> Vec<Alert> {
        alerts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        alerts
    }
}

impl Store for MemoryStore {
    fn insert_reading(&mut self, reading: NewReading) -> Result<Reading, StoreError> {
        let stored = Reading {
            id: self.next_reading_id,
            distance_cm: reading.distance_cm,
            flood_level_cm: reading.flood_level_cm,
            status_tag: reading.status_tag,
            reading_time: reading.reading_time,
            received_at: reading.received_at,
        };
        self.next_reading_id += 1;
        self.readings.push(stored.clone());
        Ok(stored)
    }

    fn latest_reading(&mut self) -> Result<Option<Reading>, StoreError> {
        Ok(self
            .readings
            .iter()
            .max_by(|a, b| {
                a.reading_time
                    .cmp(&b.reading_time)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .cloned())
    }

    fn insert_alert(&mut self, alert: NewAlert) -> Result<Alert, StoreError> {
        let stored = Alert {
            id: self.next_alert_id,
            level: alert.level,
            message: alert.message,
            status: AlertStatus::Active,
            source_distance_cm: alert.source_distance_cm,
            source_flood_level_cm: alert.source_flood_level_cm,
            reading_time: alert.reading_time,
            created_at: alert.created_at,
            updated_at: alert.created_at,
        };
        self.next_alert_id += 1;
        self.alerts.push(stored.clone());
        Ok(stored)
    }

    fn find_by_reading_and_level(
        &mut self,
        reading_time: DateTime<Utc>,
        level: AlertLevel,
    ) -> Result<Option<Alert>, StoreError> {
        Ok(self
            .alerts
            .iter()
            .find(|a| a.reading_time == reading_time && a.level == level)
            .cloned())
    }

    fn list_active(&mut self) -> Result<Vec<Alert>, StoreError> {
        let active: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Active)
            .cloned()
            .collect();
        Ok(Self::newest_first(active))
    }

    fn set_status(
        &mut self,
        ids: &[i64],
        status: AlertStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut changed = 0;
        for alert in &mut self.alerts {
            if ids.contains(&alert.id) && alert.status != status {
                alert.status = status;
                alert.updated_at = updated_at;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn close_all_active(&mut self, updated_at: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut closed = 0;
        for alert in &mut self.alerts {
            if alert.status == AlertStatus::Active {
                alert.status = AlertStatus::Past;
                alert.updated_at = updated_at;
                closed += 1;
            }
        }
        Ok(closed)
    }

    fn list_alerts(
        &mut self,
        since: Option<DateTime<Utc>>,
        status: Option<AlertStatus>,
    ) -> Result<Vec<Alert>, StoreError> {
        let filtered: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| since.map_or(true, |s| a.created_at > s))
            .filter(|a| status.map_or(true, |st| a.status == st))
            .cloned()
            .collect();
        Ok(Self::newest_first(filtered))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs as i64)
    }

    fn new_alert(level: AlertLevel, reading_time: DateTime<Utc>, created_at: DateTime<Utc>) -> NewAlert {
        NewAlert {
            level,
            message: level.message().to_string(),
            source_distance_cm: 50.0,
            source_flood_level_cm: 20.0,
            reading_time,
            created_at,
        }
    }

    #[test]
    fn test_latest_reading_is_by_reading_time_not_insert_order() {
        let mut store = MemoryStore::new();
        store
            .insert_reading(NewReading {
                distance_cm: 90.0,
                flood_level_cm: 5.0,
                status_tag: "normal".to_string(),
                reading_time: ts(100),
                received_at: ts(100),
            })
            .unwrap();
        // Older sample arriving late must not become "latest".
        store
            .insert_reading(NewReading {
                distance_cm: 40.0,
                flood_level_cm: 30.0,
                status_tag: "warning".to_string(),
                reading_time: ts(50),
                received_at: ts(101),
            })
            .unwrap();

        let latest = store.latest_reading().unwrap().expect("two readings stored");
        assert_eq!(latest.reading_time, ts(100));
        assert_eq!(latest.distance_cm, 90.0);
    }

    #[test]
    fn test_empty_store_has_no_latest_reading() {
        let mut store = MemoryStore::new();
        assert_eq!(store.latest_reading().unwrap(), None);
    }

    #[test]
    fn test_insert_alert_starts_active_with_updated_eq_created() {
        let mut store = MemoryStore::new();
        let alert = store
            .insert_alert(new_alert(AlertLevel::Danger, ts(0), ts(0)))
            .unwrap();
        assert_eq!(alert.status, AlertStatus::Active);
        assert_eq!(alert.updated_at, alert.created_at);
    }

    #[test]
    fn test_duplicate_lookup_matches_on_both_key_halves() {
        let mut store = MemoryStore::new();
        store
            .insert_alert(new_alert(AlertLevel::Danger, ts(0), ts(0)))
            .unwrap();

        assert!(store
            .find_by_reading_and_level(ts(0), AlertLevel::Danger)
            .unwrap()
            .is_some());
        // Same reading, different level: not a duplicate.
        assert!(store
            .find_by_reading_and_level(ts(0), AlertLevel::Critical)
            .unwrap()
            .is_none());
        // Same level, different reading: not a duplicate.
        assert!(store
            .find_by_reading_and_level(ts(1), AlertLevel::Danger)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_list_active_is_newest_first() {
        let mut store = MemoryStore::new();
        store
            .insert_alert(new_alert(AlertLevel::Warning, ts(0), ts(0)))
            .unwrap();
        store
            .insert_alert(new_alert(AlertLevel::Danger, ts(60), ts(60)))
            .unwrap();

        let active = store.list_active().unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].level, AlertLevel::Danger);
        assert_eq!(active[1].level, AlertLevel::Warning);
    }

    #[test]
    fn test_close_all_active_demotes_everything_once() {
        let mut store = MemoryStore::new();
        store
            .insert_alert(new_alert(AlertLevel::Warning, ts(0), ts(0)))
            .unwrap();
        store
            .insert_alert(new_alert(AlertLevel::Danger, ts(60), ts(60)))
            .unwrap();

        assert_eq!(store.close_all_active(ts(500)).unwrap(), 2);
        assert!(store.list_active().unwrap().is_empty());
        // Second close is a no-op, not an error.
        assert_eq!(store.close_all_active(ts(501)).unwrap(), 0);

        let all = store.list_alerts(None, None).unwrap();
        assert!(all.iter().all(|a| a.status == AlertStatus::Past));
        assert!(all.iter().all(|a| a.updated_at == ts(500)));
    }

    #[test]
    fn test_list_alerts_since_filter_is_strictly_after() {
        let mut store = MemoryStore::new();
        store
            .insert_alert(new_alert(AlertLevel::Warning, ts(0), ts(0)))
            .unwrap();
        store
            .insert_alert(new_alert(AlertLevel::Danger, ts(60), ts(60)))
            .unwrap();

        let newer = store.list_alerts(Some(ts(0)), None).unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].level, AlertLevel::Danger);
    }

    #[test]
    fn test_list_alerts_status_filter() {
        let mut store = MemoryStore::new();
        let first = store
            .insert_alert(new_alert(AlertLevel::Warning, ts(0), ts(0)))
            .unwrap();
        store
            .insert_alert(new_alert(AlertLevel::Danger, ts(60), ts(60)))
            .unwrap();
        store
            .set_status(&[first.id], AlertStatus::Past, ts(120))
            .unwrap();

        let past = store.list_alerts(None, Some(AlertStatus::Past)).unwrap();
        assert_eq!(past.len(), 1);
        assert_eq!(past[0].id, first.id);

        let active = store.list_alerts(None, Some(AlertStatus::Active)).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].level, AlertLevel::Danger);
    }
}
