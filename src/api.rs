//! HTTP API surface.
//!
//! Thin adapters between the wire envelopes and the synchronous service
//! core; no decisions are made here. Handlers hop onto the blocking pool
//! because the store underneath is a synchronous Postgres client.
//!
//! | Method | Path               | Description                              |
//! |--------|--------------------|------------------------------------------|
//! | `POST` | `/readings`        | Ingest one sensor sample, then evaluate  |
//! | `GET`  | `/readings/latest` | Most recent reading (or the No Data row) |
//! | `POST` | `/alerts/evaluate` | Run one evaluation cycle                 |
//! | `GET`  | `/alerts`          | All alerts, newest first; `since`/`status` filters |
//!
//! Every response is `{success, ...}`; failures carry a `message`. The
//! dashboard polls from a browser, hence the permissive CORS layer.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::ingest::{IngestError, RawReading};
use crate::logging::{self, Source};
use crate::model::AlertStatus;
use crate::service::FloodService;
use crate::units;

pub type AppState = Arc<FloodService>;

pub fn router(service: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/readings", post(post_reading))
        .route("/readings/latest", get(latest_reading))
        .route("/alerts/evaluate", post(evaluate))
        .route("/alerts", get(list_alerts))
        .layer(cors)
        .with_state(service)
}

// ---------------------------------------------------------------------------
// Envelope helpers
// ---------------------------------------------------------------------------

fn ok(body: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(body))
}

fn fail(status: StatusCode, message: String) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "success": false, "message": message })))
}

fn task_failed(err: tokio::task::JoinError) -> (StatusCode, Json<Value>) {
    logging::error(Source::Api, &format!("blocking task failed: {}", err));
    fail(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal error".to_string(),
    )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn post_reading(
    State(service): State<AppState>,
    body: String,
) -> (StatusCode, Json<Value>) {
    // Deserialize by hand so a malformed payload gets our envelope, not a
    // framework rejection.
    let raw: RawReading = match serde_json::from_str(&body) {
        Ok(raw) => raw,
        Err(e) => {
            return fail(
                StatusCode::BAD_REQUEST,
                format!("invalid reading payload: {}", e),
            )
        }
    };

    let result = tokio::task::spawn_blocking(move || service.ingest_reading(&raw)).await;
    match result {
        Ok(Ok((reading, outcome))) => {
            logging::debug(Source::Api, &outcome.message());
            ok(json!({
                "success": true,
                "receivedData": {
                    "id": reading.id,
                    "distance": reading.distance_cm,
                    "floodLevel": reading.flood_level_cm,
                    "status": reading.status_tag,
                    "timestamp": reading.received_at,
                },
            }))
        }
        Ok(Err(IngestError::Validation(e))) => fail(StatusCode::BAD_REQUEST, e.to_string()),
        Ok(Err(IngestError::Store(e))) => {
            fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => task_failed(e),
    }
}

async fn latest_reading(State(service): State<AppState>) -> (StatusCode, Json<Value>) {
    let result = tokio::task::spawn_blocking(move || service.latest_reading()).await;
    match result {
        Ok(Ok(Some(reading))) => ok(json!({
            "success": true,
            "data": {
                "distance": reading.distance_cm,
                "flood_level": reading.flood_level_cm,
                "distance_in": units::cm_to_inches(reading.distance_cm),
                "flood_level_in": units::cm_to_inches(reading.flood_level_cm),
                "status": reading.status_tag,
                "reading_time": reading.reading_time,
            },
        })),
        // An empty store is a valid state, not an error.
        Ok(Ok(None)) => ok(json!({
            "success": true,
            "data": {
                "distance": 0.0,
                "flood_level": 0.0,
                "status": "No Data",
                "reading_time": Value::Null,
            },
        })),
        Ok(Err(e)) => fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        Err(e) => task_failed(e),
    }
}

async fn evaluate(State(service): State<AppState>) -> (StatusCode, Json<Value>) {
    let result = tokio::task::spawn_blocking(move || service.evaluate_once()).await;
    match result {
        Ok(Ok(outcome)) => ok(json!({
            "success": true,
            "message": outcome.message(),
        })),
        Ok(Err(e)) => fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        Err(e) => task_failed(e),
    }
}

#[derive(Debug, Deserialize)]
struct AlertsQuery {
    /// RFC 3339 timestamp; only alerts created strictly after it.
    since: Option<String>,
    /// "active" or "past".
    status: Option<String>,
}

async fn list_alerts(
    State(service): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> (StatusCode, Json<Value>) {
    let since = match &query.since {
        None => None,
        Some(text) => match DateTime::parse_from_rfc3339(text) {
            Ok(dt) => Some(dt.with_timezone(&chrono::Utc)),
            Err(e) => {
                return fail(
                    StatusCode::BAD_REQUEST,
                    format!("invalid 'since' timestamp: {}", e),
                )
            }
        },
    };

    let status = match &query.status {
        None => None,
        Some(text) => match AlertStatus::from_str(text) {
            Some(status) => Some(status),
            None => {
                return fail(
                    StatusCode::BAD_REQUEST,
                    format!("invalid 'status' filter '{}': expected active or past", text),
                )
            }
        },
    };

    let result = tokio::task::spawn_blocking(move || service.list_alerts(since, status)).await;
    match result {
        Ok(Ok(alerts)) => ok(json!({
            "success": true,
            "count": alerts.len(),
            "alerts": alerts,
        })),
        Ok(Err(e)) => fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        Err(e) => task_failed(e),
    }
}
