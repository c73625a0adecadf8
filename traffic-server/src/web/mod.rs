//! Web server: axum REST API over the live traffic picture.
//!
//! Shared state is the tracker behind a lock plus the latest ownship
//! snapshot. A heartbeat task sweeps the tracker on a fixed interval, and an
//! optional feed task streams a JSON-lines file into it.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::Router;
use tokio::io::AsyncBufReadExt;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use traffic_core::{
    unix_now, OwnshipReference, Result, SharedTracker, SweepReport, TrafficTracker,
};

use crate::feed::{self, Applied, FeedRecord};

pub mod routes;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub tracker: SharedTracker,
    pub ownship: RwLock<OwnshipReference>,
}

impl AppState {
    pub fn new(tracker: TrafficTracker, ownship: OwnshipReference) -> Self {
        AppState {
            tracker: Arc::new(RwLock::new(tracker)),
            ownship: RwLock::new(ownship),
        }
    }

    /// Copy of the current ownship snapshot.
    pub fn ownship(&self) -> OwnshipReference {
        *self.ownship.read().unwrap()
    }

    /// One heartbeat: refresh buoys and evict stale targets.
    pub fn sweep(&self) -> SweepReport {
        let own = self.ownship();
        self.tracker.write().unwrap().sweep(&own)
    }

    /// Apply a feed record at wall-clock time.
    pub fn apply(&self, record: FeedRecord) -> Applied {
        let mut own = self.ownship();
        let applied = {
            let mut tracker = self.tracker.write().unwrap();
            feed::apply_record(&mut *tracker, &mut own, record, unix_now())
        };
        if applied == Applied::Ownship {
            *self.ownship.write().unwrap() = own;
        }
        applied
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/traffic", axum::routing::get(routes::api_traffic))
        .route(
            "/api/traffic/nearest",
            axum::routing::get(routes::api_traffic_nearest),
        )
        .route(
            "/api/traffic/:identity",
            axum::routing::get(routes::api_target_detail).delete(routes::api_target_remove),
        )
        .route(
            "/api/ownship",
            axum::routing::get(routes::api_ownship_get).post(routes::api_ownship_set),
        )
        .route("/api/targets", axum::routing::post(routes::api_targets_ingest))
        .route(
            "/api/buoys",
            axum::routing::get(routes::api_buoys_list)
                .post(routes::api_buoys_drop)
                .delete(routes::api_buoys_clear),
        )
        .route(
            "/api/config",
            axum::routing::get(routes::api_config_get).put(routes::api_config_set),
        )
        .route("/api/stats", axum::routing::get(routes::api_stats))
        .with_state(state)
        .layer(cors)
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Sweep the tracker every `period`.
pub fn spawn_heartbeat(state: Arc<AppState>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = state.sweep();
            if !report.removed.is_empty() {
                info!(
                    removed = report.removed.len(),
                    buoys = report.refreshed_buoys,
                    "heartbeat sweep"
                );
            }
        }
    })
}

/// Stream a JSON-lines feed into the live tracker, pausing `pace` after
/// each target line. Feed timestamps are ignored in favour of wall clock.
pub fn spawn_feed(state: Arc<AppState>, path: PathBuf, pace: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), "cannot open feed: {e}");
                return;
            }
        };

        let mut lines = tokio::io::BufReader::new(file).lines();
        let mut line_no = 0usize;
        let mut applied = 0usize;
        loop {
            let line = match lines.next_line().await {
                Ok(Some(l)) => l,
                Ok(None) => break,
                Err(e) => {
                    warn!(path = %path.display(), "feed read failed: {e}");
                    break;
                }
            };
            line_no += 1;

            let record = match feed::parse_line(&line, line_no) {
                Ok(Some(r)) => r,
                Ok(None) => continue,
                Err(e) => {
                    warn!("{e}");
                    continue;
                }
            };

            let paced = matches!(record, FeedRecord::Target { .. });
            state.apply(record);
            applied += 1;
            if paced && !pace.is_zero() {
                tokio::time::sleep(pace).await;
            }
        }
        info!(path = %path.display(), records = applied, "feed finished");
    })
}

/// Bind and serve until the listener fails.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("traffic server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use traffic_core::{Target, TrackerConfig};

    fn state() -> Arc<AppState> {
        let own = OwnshipReference {
            lat: Some(35.5),
            lon: Some(-82.5),
            ..Default::default()
        };
        Arc::new(AppState::new(TrafficTracker::new(TrackerConfig::default()), own))
    }

    #[test]
    fn test_apply_ownship_updates_snapshot() {
        let state = state();
        let own = OwnshipReference {
            lat: Some(40.0),
            lon: Some(-80.0),
            ..Default::default()
        };
        assert_eq!(state.apply(FeedRecord::Ownship(own)), Applied::Ownship);
        assert_eq!(state.ownship().lat, Some(40.0));
    }

    #[test]
    fn test_sweep_evicts_stale() {
        let state = state();
        {
            let own = state.ownship();
            let mut tracker = state.tracker.write().unwrap();
            tracker.update_at(&own, Target::new("OLD", 35.6, -82.4), unix_now() - 500.0);
            tracker.update(&own, Target::new("NEW", 35.6, -82.4));
        }
        let report = state.sweep();
        assert_eq!(report.removed, vec!["OLD".to_string()]);
        assert_eq!(state.tracker.read().unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_feed_task_populates_tracker() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"ownship": {{"lat": 35.5, "lon": -82.5}}}}"#).unwrap();
        writeln!(file, r#"{{"target": {{"identity": "A1", "lat": 35.6, "lon": -82.4}}}}"#).unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file, r#"{{"buoy": {{}}}}"#).unwrap();

        let state = state();
        spawn_feed(state.clone(), file.path().to_path_buf(), Duration::ZERO)
            .await
            .unwrap();

        let tracker = state.tracker.read().unwrap();
        assert_eq!(tracker.count(), 2);
        assert!(tracker.get("A1").unwrap().distance_mi.is_some());
        assert!(tracker.get("Buoy1").is_some());
    }

    #[tokio::test]
    async fn test_feed_task_missing_file() {
        let state = state();
        spawn_feed(state.clone(), PathBuf::from("/nonexistent/feed.jsonl"), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(state.tracker.read().unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_heartbeat_sweeps() {
        let state = state();
        {
            let own = state.ownship();
            state
                .tracker
                .write()
                .unwrap()
                .update_at(&own, Target::new("OLD", 35.6, -82.4), unix_now() - 500.0);
        }
        let handle = spawn_heartbeat(state.clone(), Duration::from_secs(1));
        // The first tick fires immediately.
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();
        assert_eq!(state.tracker.read().unwrap().count(), 0);
    }
}
