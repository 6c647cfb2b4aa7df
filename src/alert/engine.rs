//! Alert evaluation and deduplication engine.
//!
//! Converts the stream of raw distance readings into a bounded, deduplicated
//! set of active/past alerts. One evaluation cycle runs per trigger (the
//! internal scheduler tick, a dashboard evaluate call, or ingest follow-up);
//! all triggers share a single [`Evaluator`] so cycles serialize.
//!
//! # Hysteresis
//!
//! Clearing is guarded by a 300 s sustained-safe window:
//!
//! ```text
//!                 safe reading              elapsed >= 300 s
//!  (no streak) ──────────────► (streak t0) ─────────────────► all active
//!      ▲                          │   ▲                        alerts -> past,
//!      │      adverse reading     │   │ safe reading,          streak cleared
//!      └──────────────────────────┘   │ elapsed < 300 s
//!                                     └─┘  (AwaitingConfirmation)
//! ```
//!
//! A single adverse reading between two safe ones restarts the window from
//! scratch — the streak start is cleared the moment an adverse reading is
//! observed.
//!
//! # Clock injection
//!
//! `evaluate_at` takes `now` as a parameter so every timing property is
//! deterministic in tests; `evaluate` wraps it with `Utc::now()`.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::alert::thresholds::classify;
use crate::model::{Alert, AlertStatus, NewAlert, StoreError};
use crate::store::Store;

/// Sustained-safe window required before clearing active alerts, seconds.
pub const GRACE_PERIOD_SECS: i64 = 300;

/// Upper bound on concurrently active alerts; older ones are evicted.
pub const MAX_ACTIVE_ALERTS: usize = 2;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What one evaluation cycle decided.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    /// No reading exists yet; nothing to evaluate, nothing changed.
    NoData,
    /// Latest reading is safe, but the sustained-safe window has not
    /// elapsed. No alert mutation.
    AwaitingConfirmation { seconds_remaining: i64 },
    /// The window elapsed: every active alert was demoted to past.
    AllAlertsCleared { cleared: usize },
    /// An alert for this exact (reading_time, level) already exists.
    /// The idempotent no-op outcome, not an error.
    DuplicateSkipped,
    /// A new active alert was recorded; `evicted` counts older active
    /// alerts demoted by cap enforcement.
    AlertRecorded { alert: Alert, evicted: usize },
}

impl EvaluationOutcome {
    /// Operator-facing summary, returned verbatim by the evaluate endpoint.
    pub fn message(&self) -> String {
        match self {
            EvaluationOutcome::NoData => "No readings available to evaluate.".to_string(),
            EvaluationOutcome::AwaitingConfirmation { seconds_remaining } => format!(
                "Water level safe. Awaiting confirmation: {}s of sustained safe readings remaining.",
                seconds_remaining
            ),
            EvaluationOutcome::AllAlertsCleared { cleared } => format!(
                "Safe water level confirmed. Cleared {} active alert(s).",
                cleared
            ),
            EvaluationOutcome::DuplicateSkipped => {
                "Alert already recorded for this reading; duplicate skipped.".to_string()
            }
            EvaluationOutcome::AlertRecorded { alert, evicted } => {
                if *evicted > 0 {
                    format!("{} ({} older active alert(s) demoted)", alert.message, evicted)
                } else {
                    alert.message.clone()
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Start of the current unbroken safe streak, if one is in progress.
///
/// Process-scoped: a restart forgets an in-flight streak, so the window
/// restarts and alerts stay active longer — never the other way around.
#[derive(Debug, Default)]
struct EvaluationState {
    first_safe_detected_at: Option<DateTime<Utc>>,
}

/// The single evaluation engine instance.
///
/// The mutex serializes the whole read-state → decide → mutate-store →
/// mutate-state cycle, so two near-simultaneous triggers cannot both start
/// independent grace-period timers or both insert an alert for the same
/// reading. State is only committed after the cycle's store operations
/// succeed; a store failure aborts the cycle untouched and the next trigger
/// retries cleanly.
#[derive(Debug, Default)]
pub struct Evaluator {
    state: Mutex<EvaluationState>,
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator {
            state: Mutex::new(EvaluationState::default()),
        }
    }

    /// Run one evaluation cycle against the latest persisted reading,
    /// using the real clock.
    pub fn evaluate(&self, store: &mut dyn Store) -> Result<EvaluationOutcome, StoreError> {
        self.evaluate_at(store, Utc::now())
    }

    /// Run one evaluation cycle with an injected clock.
    pub fn evaluate_at(
        &self,
        store: &mut dyn Store,
        now: DateTime<Utc>,
    ) -> Result<EvaluationOutcome, StoreError> {
        let mut state = self.state.lock().unwrap();

        let reading = match store.latest_reading()? {
            Some(r) => r,
            None => return Ok(EvaluationOutcome::NoData),
        };

        let severity = classify(reading.distance_cm);
        let level = match severity.alert_level() {
            // Safe branch: track the streak, clear after the window.
            None => {
                return match state.first_safe_detected_at {
                    None => {
                        state.first_safe_detected_at = Some(now);
                        Ok(EvaluationOutcome::AwaitingConfirmation {
                            seconds_remaining: GRACE_PERIOD_SECS,
                        })
                    }
                    Some(first_safe) => {
                        let elapsed = (now - first_safe).num_seconds();
                        if elapsed >= GRACE_PERIOD_SECS {
                            let cleared = store.close_all_active(now)?;
                            state.first_safe_detected_at = None;
                            Ok(EvaluationOutcome::AllAlertsCleared { cleared })
                        } else {
                            Ok(EvaluationOutcome::AwaitingConfirmation {
                                seconds_remaining: GRACE_PERIOD_SECS - elapsed,
                            })
                        }
                    }
                };
            }
            Some(level) => level,
        };

        // Adverse branch. The safe streak is broken; the reset is committed
        // below, only once this cycle's store operations have succeeded.
        let existing = store.find_by_reading_and_level(reading.reading_time, level)?;
        if existing.is_some() {
            state.first_safe_detected_at = None;
            return Ok(EvaluationOutcome::DuplicateSkipped);
        }

        let alert = store.insert_alert(NewAlert {
            level,
            message: level.message().to_string(),
            source_distance_cm: reading.distance_cm,
            source_flood_level_cm: reading.flood_level_cm,
            reading_time: reading.reading_time,
            created_at: now,
        })?;

        // Cap enforcement: keep the newest MAX_ACTIVE_ALERTS, demote the rest.
        let active = store.list_active()?;
        let evicted = if active.len() > MAX_ACTIVE_ALERTS {
            let excess: Vec<i64> = active[MAX_ACTIVE_ALERTS..].iter().map(|a| a.id).collect();
            store.set_status(&excess, AlertStatus::Past, now)?
        } else {
            0
        };

        state.first_safe_detected_at = None;
        Ok(EvaluationOutcome::AlertRecorded { alert, evicted })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
