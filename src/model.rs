//! Core data types for the floodwatch admin service.
//!
//! This module defines the shared domain model imported by all other modules.
//! It contains no logic beyond enum/string mapping and no I/O — only types.
//!
//! All lengths are canonical centimeters (the sensor reports distance from a
//! fixed mount point down to the water surface, so a larger distance means a
//! lower, safer water level). See `units` for display conversions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Alert level and status
// ---------------------------------------------------------------------------

/// Severity recorded on a persisted alert, in ascending order.
///
/// The Safe classification never produces an alert, so it has no
/// representation here — see `alert::thresholds::Severity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Danger,
    Critical,
}

impl AlertLevel {
    /// Fixed operator-facing message template for this level.
    pub fn message(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "Warning: Rising Water Level.",
            AlertLevel::Danger => "Danger: High Water Level!",
            AlertLevel::Critical => "Critical Flood Level! Immediate action required.",
        }
    }

    /// Stable lowercase identifier used in the database `level` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "warning",
            AlertLevel::Danger => "danger",
            AlertLevel::Critical => "critical",
        }
    }

    /// Inverse of `as_str`. Unknown strings come back as `None` so a
    /// corrupted row surfaces as a query error instead of a panic.
    pub fn from_str(s: &str) -> Option<AlertLevel> {
        match s {
            "warning" => Some(AlertLevel::Warning),
            "danger" => Some(AlertLevel::Danger),
            "critical" => Some(AlertLevel::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert lifecycle state. `Active` transitions to `Past` exactly once,
/// either by sustained-safe confirmation or by cap eviction; `Past` is
/// terminal. Alerts are never physically deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Past,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Past => "past",
        }
    }

    pub fn from_str(s: &str) -> Option<AlertStatus> {
        match s {
            "active" => Some(AlertStatus::Active),
            "past" => Some(AlertStatus::Past),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// One timestamped sensor sample, immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub id: i64,
    /// Distance from the sensor mount down to the water surface, in cm.
    pub distance_cm: f64,
    /// Water depth reported by the sensor, in cm.
    pub flood_level_cm: f64,
    /// Free-form tag from the upstream sensor firmware ("normal",
    /// "warning", ...). Advisory only — alert decisions are derived from
    /// the distance, never from this string.
    pub status_tag: String,
    /// When the sensor took the sample.
    pub reading_time: DateTime<Utc>,
    /// When this service accepted it.
    pub received_at: DateTime<Utc>,
}

/// A reading as handed to the store for insertion; the store assigns `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub distance_cm: f64,
    pub flood_level_cm: f64,
    pub status_tag: String,
    pub reading_time: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Alert types
// ---------------------------------------------------------------------------

/// A recorded flood-severity event with a lifecycle status.
///
/// `reading_time` is a soft reference to the triggering `Reading` — it is
/// also one half of the duplicate-detection key `(reading_time, level)`,
/// which keeps evaluation idempotent under repeated polling of the same
/// unchanged reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: i64,
    pub level: AlertLevel,
    pub message: String,
    pub status: AlertStatus,
    pub source_distance_cm: f64,
    pub source_flood_level_cm: f64,
    pub reading_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An alert as handed to the store for insertion. The store assigns `id`,
/// sets `status` to `Active` and stamps `updated_at = created_at`.
/// `created_at` is provided by the engine so tests can pin the clock.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub level: AlertLevel,
    pub message: String,
    pub source_distance_cm: f64,
    pub source_flood_level_cm: f64,
    pub reading_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by the reading/alert store.
///
/// Any store error aborts the in-flight evaluation cycle with the engine
/// state untouched, so the next cycle retries cleanly.
#[derive(Debug)]
pub enum StoreError {
    /// The store is unreachable (connect failure, dropped connection).
    Unavailable(String),
    /// A statement failed or returned rows we could not interpret.
    Query(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
            StoreError::Query(msg) => write!(f, "store query failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<postgres::Error> for StoreError {
    fn from(e: postgres::Error) -> Self {
        // A closed connection is the retryable "unreachable" case; anything
        // else is a statement-level failure.
        if e.is_closed() {
            StoreError::Unavailable(e.to_string())
        } else {
            StoreError::Query(e.to_string())
        }
    }
}

/// A sensor submission that failed field validation. Rejected with no
/// state mutation anywhere.
#[derive(Debug, PartialEq)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError { message: message.into() }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid reading: {}", self.message)
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trips_through_db_string() {
        for level in [AlertLevel::Warning, AlertLevel::Danger, AlertLevel::Critical] {
            assert_eq!(AlertLevel::from_str(level.as_str()), Some(level));
        }
        assert_eq!(AlertLevel::from_str("safe"), None);
    }

    #[test]
    fn test_status_round_trips_through_db_string() {
        for status in [AlertStatus::Active, AlertStatus::Past] {
            assert_eq!(AlertStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(AlertStatus::from_str("archived"), None);
    }

    #[test]
    fn test_messages_name_their_level() {
        assert!(AlertLevel::Warning.message().contains("Warning"));
        assert!(AlertLevel::Danger.message().contains("Danger"));
        assert!(AlertLevel::Critical.message().contains("Critical"));
    }
}
