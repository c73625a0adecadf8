//! REST API route handlers.
//!
//! All handlers work on the in-memory tracker. Locks are taken per request
//! and never held across an await.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use traffic_core::{unix_now, BuoyRequest, OwnshipReference, Outcome, Target, TrackerConfig};

use crate::web::AppState;

// ---------------------------------------------------------------------------
// Query param / body types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RangeParams {
    max_mi: Option<f64>,
}

/// Batch from a decoder, optionally labelled with its source.
#[derive(Deserialize)]
pub struct IngestRequest {
    source: Option<String>,
    source_alt_ft: Option<i32>,
    targets: Vec<Target>,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub enum IngestBody {
    Batch(IngestRequest),
    Many(Vec<Target>),
    One(Target),
}

#[derive(Deserialize)]
pub struct ConfigBody {
    ignore_beyond_distance_mi: Option<f64>,
    max_age_sec: Option<f64>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Serialize a target with its age computed against `now`.
fn target_json(target: &Target, now: f64) -> Value {
    let mut value = serde_json::to_value(target).unwrap_or(json!({}));
    value["age"] = json!(target.age_at(now));
    value
}

fn config_json(config: &TrackerConfig) -> Value {
    json!({
        "ignore_beyond_distance_mi": config.ignore_beyond_distance_mi,
        "max_age_sec": config.max_age_sec,
    })
}

fn not_found(message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({"error": message})))
}

// ---------------------------------------------------------------------------
// Traffic
// ---------------------------------------------------------------------------

/// GET /api/traffic: all targets nearest first, or only those within `max_mi`.
pub async fn api_traffic(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> impl IntoResponse {
    let now = unix_now();
    let tracker = state.tracker.read().unwrap();
    let listing = match params.max_mi {
        Some(max) => tracker.within(max),
        None => tracker.sorted_by_distance(),
    };
    let targets: Vec<Value> = listing.into_iter().map(|t| target_json(t, now)).collect();
    Json(Value::Array(targets))
}

/// GET /api/traffic/nearest: closest resolved target, optionally bounded.
pub async fn api_traffic_nearest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> impl IntoResponse {
    let max = params.max_mi.unwrap_or(f64::INFINITY);
    let tracker = state.tracker.read().unwrap();
    match tracker.nearest(max) {
        Some(t) => (StatusCode::OK, Json(target_json(t, unix_now()))),
        None => not_found("No traffic in range"),
    }
}

/// GET /api/traffic/:identity
pub async fn api_target_detail(
    State(state): State<Arc<AppState>>,
    Path(identity): Path<String>,
) -> impl IntoResponse {
    let tracker = state.tracker.read().unwrap();
    match tracker.get(&identity) {
        Some(t) => (StatusCode::OK, Json(target_json(t, unix_now()))),
        None => not_found("Target not found"),
    }
}

/// DELETE /api/traffic/:identity: operator removal.
pub async fn api_target_remove(
    State(state): State<Arc<AppState>>,
    Path(identity): Path<String>,
) -> impl IntoResponse {
    match state.tracker.write().unwrap().remove(&identity) {
        Some(_) => (StatusCode::OK, Json(json!({"removed": identity}))),
        None => not_found("Target not found"),
    }
}

/// POST /api/targets: one target, an array, or a labelled batch.
pub async fn api_targets_ingest(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IngestBody>,
) -> impl IntoResponse {
    let (source, source_alt, targets) = match body {
        IngestBody::Batch(req) => (req.source, req.source_alt_ft, req.targets),
        IngestBody::Many(targets) => (None, None, targets),
        IngestBody::One(target) => (None, None, vec![target]),
    };

    let own = state.ownship();
    let mut tracker = state.tracker.write().unwrap();
    if source_alt.is_some() {
        tracker.set_source_altitude(source_alt);
    }

    let (mut upserted, mut filtered, mut invalid) = (0u64, 0u64, 0u64);
    for mut target in targets {
        if target.source.is_none() {
            target.source = source.clone();
        }
        match tracker.update(&own, target) {
            Outcome::Upserted => upserted += 1,
            Outcome::Filtered => filtered += 1,
            Outcome::InvalidIdentity => invalid += 1,
        }
    }

    Json(json!({
        "upserted": upserted,
        "filtered": filtered,
        "invalid": invalid,
        "count": tracker.count(),
    }))
}

// ---------------------------------------------------------------------------
// Ownship
// ---------------------------------------------------------------------------

/// GET /api/ownship
pub async fn api_ownship_get(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::to_value(state.ownship()).unwrap_or(json!({})))
}

/// POST /api/ownship: replace the snapshot used by updates and sweeps.
pub async fn api_ownship_set(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OwnshipReference>,
) -> impl IntoResponse {
    *state.ownship.write().unwrap() = body;
    Json(serde_json::to_value(body).unwrap_or(json!({})))
}

// ---------------------------------------------------------------------------
// Buoys
// ---------------------------------------------------------------------------

/// GET /api/buoys: buoys in drop order.
pub async fn api_buoys_list(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = unix_now();
    let tracker = state.tracker.read().unwrap();
    let buoys: Vec<Value> = tracker.buoys().into_iter().map(|t| target_json(t, now)).collect();
    Json(Value::Array(buoys))
}

/// POST /api/buoys: drop a buoy. An empty body takes every default; a body
/// that does not parse is rejected.
pub async fn api_buoys_drop(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        BuoyRequest::default()
    } else {
        match serde_json::from_slice::<BuoyRequest>(&body) {
            Ok(r) => r,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": format!("invalid buoy request: {e}")})),
                );
            }
        }
    };
    let own = state.ownship();
    let buoy = state.tracker.write().unwrap().drop_buoy(&own, request);
    (StatusCode::CREATED, Json(target_json(&buoy, unix_now())))
}

/// DELETE /api/buoys: remove every buoy.
pub async fn api_buoys_clear(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cleared = state.tracker.write().unwrap().clear_all_buoys();
    Json(json!({"cleared": cleared}))
}

// ---------------------------------------------------------------------------
// Config + stats
// ---------------------------------------------------------------------------

/// GET /api/config
pub async fn api_config_get(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tracker = state.tracker.read().unwrap();
    Json(config_json(tracker.config()))
}

/// PUT /api/config: change thresholds at runtime.
pub async fn api_config_set(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ConfigBody>,
) -> impl IntoResponse {
    let mut tracker = state.tracker.write().unwrap();
    let mut candidate = *tracker.config();
    if let Some(d) = body.ignore_beyond_distance_mi {
        candidate.ignore_beyond_distance_mi = d;
    }
    if let Some(a) = body.max_age_sec {
        candidate.max_age_sec = a;
    }
    if let Err(e) = candidate.validate() {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()})));
    }

    tracker.set_ignore_beyond_distance(candidate.ignore_beyond_distance_mi);
    tracker.set_max_age(candidate.max_age_sec);
    info!(
        ignore_beyond_distance_mi = candidate.ignore_beyond_distance_mi,
        max_age_sec = candidate.max_age_sec,
        "tracker config updated"
    );
    (StatusCode::OK, Json(config_json(&candidate)))
}

/// GET /api/stats: counters plus current population.
pub async fn api_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tracker = state.tracker.read().unwrap();
    let mut stats = serde_json::to_value(tracker.stats()).unwrap_or(json!({}));
    stats["count"] = json!(tracker.count());
    stats["buoys"] = json!(tracker.buoys().len());
    Json(stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
