//! Floodwatch admin service.
//!
//! Ingests periodic distance-to-water-surface readings from a flood sensor,
//! derives a severity level, maintains a bounded, deduplicated set of
//! active/past alerts with a sustained-safe grace period, and exposes both
//! readings and alerts to an operator dashboard and a push-notification
//! relay.
//!
//! Pipeline: sensor → `ingest` → `alert::thresholds` → `alert::engine` →
//! store (`db` in production, `store::MemoryStore` in tests) → dashboard
//! (`api`) / push fan-out (`notify`).

pub mod alert;
pub mod api;
pub mod config;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod notify;
pub mod service;
pub mod store;
pub mod units;
