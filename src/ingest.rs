//! Sensor reading ingest.
//!
//! Validates a raw sensor submission and appends it to the readings log.
//! This is the *only* ingest path: alert decisions are never made here.
//! The upstream firmware's status tag historically drove a second, inline
//! alert-insertion path that could disagree with the distance-derived
//! severity for the same reading; that path is gone. The tag is stored
//! verbatim as advisory context and a disagreement with the derived
//! severity is logged, nothing more. The service layer runs one engine
//! cycle immediately after a successful ingest.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::alert::thresholds::{classify, Severity};
use crate::logging;
use crate::model::{NewReading, Reading, StoreError, ValidationError};
use crate::store::Store;

// ---------------------------------------------------------------------------
// Raw submission
// ---------------------------------------------------------------------------

/// The sensor POST body, before validation. All three fields are required;
/// they are optional here so a missing field produces our own validation
/// message instead of a framework rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReading {
    pub distance: Option<f64>,
    #[serde(rename = "floodLevel")]
    pub flood_level: Option<f64>,
    pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum IngestError {
    /// Malformed or missing fields; nothing was stored.
    Validation(ValidationError),
    /// The readings log was unreachable or the insert failed.
    Store(StoreError),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Validation(e) => write!(f, "{}", e),
            IngestError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<ValidationError> for IngestError {
    fn from(e: ValidationError) -> Self {
        IngestError::Validation(e)
    }
}

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        IngestError::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check the three required fields: present, finite, non-negative lengths,
/// non-empty tag.
pub fn validate(raw: &RawReading) -> Result<(f64, f64, String), ValidationError> {
    let distance = raw
        .distance
        .ok_or_else(|| ValidationError::new("'distance' is required"))?;
    let flood_level = raw
        .flood_level
        .ok_or_else(|| ValidationError::new("'floodLevel' is required"))?;
    let status = raw
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ValidationError::new("'status' is required"))?;

    if !distance.is_finite() || distance < 0.0 {
        return Err(ValidationError::new(
            "'distance' must be a finite non-negative number of centimeters",
        ));
    }
    if !flood_level.is_finite() || flood_level < 0.0 {
        return Err(ValidationError::new(
            "'floodLevel' must be a finite non-negative number of centimeters",
        ));
    }

    Ok((distance, flood_level, status.to_string()))
}

/// The severity a well-known tag claims, for the advisory disagreement log.
fn tag_severity(tag: &str) -> Option<Severity> {
    match tag.to_ascii_lowercase().as_str() {
        "safe" | "normal" => Some(Severity::Safe),
        "warning" => Some(Severity::Warning),
        "danger" => Some(Severity::Danger),
        "critical" => Some(Severity::Critical),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

/// Validate and persist one sensor submission with an injected clock.
/// Both `reading_time` and `received_at` are stamped with `now` — the
/// sensor payload carries no timestamp of its own.
pub fn ingest_at(
    store: &mut dyn Store,
    raw: &RawReading,
    now: DateTime<Utc>,
) -> Result<Reading, IngestError> {
    let (distance_cm, flood_level_cm, status_tag) = validate(raw)?;

    let derived = classify(distance_cm);
    if let Some(claimed) = tag_severity(&status_tag) {
        if claimed != derived {
            logging::log_tag_mismatch(&status_tag, &format!("{:?}", derived));
        }
    }

    let reading = store.insert_reading(NewReading {
        distance_cm,
        flood_level_cm,
        status_tag,
        reading_time: now,
        received_at: now,
    })?;

    Ok(reading)
}

/// Validate and persist with the real clock.
pub fn ingest(store: &mut dyn Store, raw: &RawReading) -> Result<Reading, IngestError> {
    ingest_at(store, raw, Utc::now())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn raw(distance: f64, flood_level: f64, status: &str) -> RawReading {
        RawReading {
            distance: Some(distance),
            flood_level: Some(flood_level),
            status: Some(status.to_string()),
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    #[test]
    fn test_valid_submission_is_stored_with_both_timestamps() {
        let mut store = MemoryStore::new();
        let reading = ingest_at(&mut store, &raw(82.5, 10.0, "normal"), fixed_now()).unwrap();

        assert_eq!(reading.distance_cm, 82.5);
        assert_eq!(reading.flood_level_cm, 10.0);
        assert_eq!(reading.status_tag, "normal");
        assert_eq!(reading.reading_time, fixed_now());
        assert_eq!(reading.received_at, fixed_now());
        assert_eq!(store.latest_reading().unwrap(), Some(reading));
    }

    #[test]
    fn test_missing_fields_are_rejected_without_storing() {
        let mut store = MemoryStore::new();
        let cases = [
            RawReading { distance: None, flood_level: Some(1.0), status: Some("normal".into()) },
            RawReading { distance: Some(80.0), flood_level: None, status: Some("normal".into()) },
            RawReading { distance: Some(80.0), flood_level: Some(1.0), status: None },
            RawReading { distance: Some(80.0), flood_level: Some(1.0), status: Some("  ".into()) },
        ];

        for case in cases {
            let result = ingest_at(&mut store, &case, fixed_now());
            assert!(
                matches!(result, Err(IngestError::Validation(_))),
                "expected validation rejection for {:?}",
                case
            );
        }
        assert_eq!(store.latest_reading().unwrap(), None);
    }

    #[test]
    fn test_non_finite_and_negative_lengths_are_rejected() {
        let mut store = MemoryStore::new();
        for bad in [f64::NAN, f64::INFINITY, -1.0] {
            let result = ingest_at(&mut store, &raw(bad, 5.0, "normal"), fixed_now());
            assert!(matches!(result, Err(IngestError::Validation(_))));
            let result = ingest_at(&mut store, &raw(80.0, bad, "normal"), fixed_now());
            assert!(matches!(result, Err(IngestError::Validation(_))));
        }
        assert_eq!(store.latest_reading().unwrap(), None);
    }

    #[test]
    fn test_unknown_status_tag_is_stored_verbatim() {
        // The tag is advisory: anything the firmware sends gets stored.
        let mut store = MemoryStore::new();
        let reading =
            ingest_at(&mut store, &raw(82.5, 10.0, "SENSOR_OK_V2"), fixed_now()).unwrap();
        assert_eq!(reading.status_tag, "SENSOR_OK_V2");
    }

    #[test]
    fn test_mismatched_tag_does_not_block_ingest() {
        // Distance says Safe, tag says critical: stored anyway, decision
        // authority stays with the distance-driven engine.
        let mut store = MemoryStore::new();
        let reading = ingest_at(&mut store, &raw(90.0, 2.0, "critical"), fixed_now()).unwrap();
        assert_eq!(reading.status_tag, "critical");
    }
}
