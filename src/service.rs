//! Composition root: the one object the API surface and the scheduler share.
//!
//! Owns the store handle, the single [`Evaluator`] instance and the optional
//! push notifier. Every trigger path — internal scheduler tick, dashboard
//! evaluate call, ingest follow-up — funnels through this object, so
//! evaluation cycles serialize on one store handle and one engine state.
//!
//! Notification fan-out happens *after* the store lock is released and
//! strictly after alert persistence; a delivery failure is logged and
//! swallowed, never surfaced as an evaluation failure.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::alert::engine::{EvaluationOutcome, Evaluator};
use crate::ingest::{self, IngestError, RawReading};
use crate::logging::{self, Source};
use crate::model::{Alert, AlertStatus, Reading, StoreError};
use crate::notify::Notifier;
use crate::store::Store;

pub struct FloodService {
    store: Mutex<Box<dyn Store>>,
    evaluator: Evaluator,
    notifier: Option<Notifier>,
    recipients: Vec<String>,
}

impl FloodService {
    pub fn new(store: Box<dyn Store>, notifier: Option<Notifier>, recipients: Vec<String>) -> Self {
        FloodService {
            store: Mutex::new(store),
            evaluator: Evaluator::new(),
            notifier,
            recipients,
        }
    }

    // --- ingest --------------------------------------------------------------

    /// Store one sensor submission, then immediately run one evaluation
    /// cycle against it — the single decision path for alert creation.
    pub fn ingest_reading(
        &self,
        raw: &RawReading,
    ) -> Result<(Reading, EvaluationOutcome), IngestError> {
        self.ingest_reading_at(raw, Utc::now())
    }

    /// Clock-injected variant of [`ingest_reading`](Self::ingest_reading).
    pub fn ingest_reading_at(
        &self,
        raw: &RawReading,
        now: DateTime<Utc>,
    ) -> Result<(Reading, EvaluationOutcome), IngestError> {
        let outcome;
        let reading;
        {
            let mut store = self.store.lock().unwrap();
            reading = ingest::ingest_at(store.as_mut(), raw, now)?;
            outcome = self
                .evaluator
                .evaluate_at(store.as_mut(), now)
                .map_err(IngestError::Store)?;
        }
        self.dispatch_notifications(&outcome);
        Ok((reading, outcome))
    }

    // --- evaluation ----------------------------------------------------------

    /// Run one evaluation cycle against the latest persisted reading.
    pub fn evaluate_once(&self) -> Result<EvaluationOutcome, StoreError> {
        self.evaluate_once_at(Utc::now())
    }

    /// Clock-injected variant of [`evaluate_once`](Self::evaluate_once).
    pub fn evaluate_once_at(&self, now: DateTime<Utc>) -> Result<EvaluationOutcome, StoreError> {
        let outcome = {
            let mut store = self.store.lock().unwrap();
            self.evaluator.evaluate_at(store.as_mut(), now)?
        };
        self.dispatch_notifications(&outcome);
        Ok(outcome)
    }

    // --- read paths ----------------------------------------------------------

    pub fn latest_reading(&self) -> Result<Option<Reading>, StoreError> {
        self.store.lock().unwrap().latest_reading()
    }

    pub fn list_alerts(
        &self,
        since: Option<DateTime<Utc>>,
        status: Option<AlertStatus>,
    ) -> Result<Vec<Alert>, StoreError> {
        self.store.lock().unwrap().list_alerts(since, status)
    }

    // --- notification fan-out ------------------------------------------------

    fn dispatch_notifications(&self, outcome: &EvaluationOutcome) {
        let alert: &Alert = match outcome {
            EvaluationOutcome::AlertRecorded { alert, .. } => alert,
            _ => return,
        };

        let notifier = match &self.notifier {
            Some(n) => n,
            None => return,
        };

        if self.recipients.is_empty() {
            logging::debug(Source::Notify, "no recipients configured; skipping fan-out");
            return;
        }

        match notifier.send_alert(&self.recipients, &alert.message) {
            Ok(()) => logging::info(
                Source::Notify,
                &format!(
                    "pushed '{}' to {} recipient(s)",
                    alert.message,
                    self.recipients.len()
                ),
            ),
            Err(e) => logging::log_notify_failure(self.recipients.len(), &e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AlertLevel;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn service() -> FloodService {
        FloodService::new(Box::new(MemoryStore::new()), None, Vec::new())
    }

    fn raw(distance: f64, status: &str) -> RawReading {
        RawReading {
            distance: Some(distance),
            flood_level: Some((100.0 - distance).max(0.0)),
            status: Some(status.to_string()),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_adverse_ingest_records_an_alert_in_one_step() {
        let svc = service();
        let (reading, outcome) = svc.ingest_reading_at(&raw(25.0, "critical"), t0()).unwrap();

        assert_eq!(reading.distance_cm, 25.0);
        match outcome {
            EvaluationOutcome::AlertRecorded { alert, .. } => {
                assert_eq!(alert.level, AlertLevel::Critical);
                assert_eq!(alert.reading_time, reading.reading_time);
            }
            other => panic!("expected AlertRecorded, got {:?}", other),
        }

        let active = svc.list_alerts(None, Some(AlertStatus::Active)).unwrap();
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn test_tag_never_creates_an_alert_on_its_own() {
        // Safe distance with an adverse tag: exactly zero alerts. The old
        // inline tag-driven insertion path must not exist.
        let svc = service();
        let (_, outcome) = svc.ingest_reading_at(&raw(90.0, "danger"), t0()).unwrap();

        assert!(matches!(
            outcome,
            EvaluationOutcome::AwaitingConfirmation { .. }
        ));
        assert!(svc.list_alerts(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_evaluate_endpoint_path_is_idempotent_against_unchanged_reading() {
        let svc = service();
        svc.ingest_reading_at(&raw(45.0, "danger"), t0()).unwrap();

        let again = svc
            .evaluate_once_at(t0() + chrono::Duration::seconds(1))
            .unwrap();
        assert_eq!(again, EvaluationOutcome::DuplicateSkipped);
        assert_eq!(svc.list_alerts(None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_validation_failure_stores_nothing() {
        let svc = service();
        let result = svc.ingest_reading_at(
            &RawReading {
                distance: None,
                flood_level: Some(1.0),
                status: Some("normal".to_string()),
            },
            t0(),
        );

        assert!(matches!(result, Err(IngestError::Validation(_))));
        assert_eq!(svc.latest_reading().unwrap(), None);
    }
}
