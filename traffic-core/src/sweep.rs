//! Periodic eviction sweep.
//!
//! Runs once per heartbeat, independent of the update rate. Buoys are
//! earth-fixed, so each sweep pushes them back through `update` to refresh
//! `last_seen` and recompute their geometry against the current ownship.
//! Everything else is evicted once it has been silent past `max_age_sec`.

use serde::Serialize;
use tracing::debug;

use crate::geodesy::GeodeticSolver;
use crate::tracker::{Outcome, TrafficTracker};
use crate::types::{unix_now, OwnshipReference};

/// What a sweep did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    /// Identities removed, stale or filtered buoys alike.
    pub removed: Vec<String>,
    pub refreshed_buoys: usize,
}

impl<S: GeodeticSolver> TrafficTracker<S> {
    pub fn sweep(&mut self, ownship: &OwnshipReference) -> SweepReport {
        self.sweep_at(ownship, unix_now())
    }

    pub fn sweep_at(&mut self, ownship: &OwnshipReference, now: f64) -> SweepReport {
        let mut report = SweepReport::default();
        let mut stale = Vec::new();

        // Snapshot first: refreshing and evicting both mutate the set.
        for identity in self.traffic.identities() {
            let buoy = match self.traffic.get(&identity) {
                Some(t) if t.is_buoy() => Some(t.clone()),
                Some(_) => None,
                None => continue,
            };

            if let Some(buoy) = buoy {
                match self.reconcile(ownship, buoy, now) {
                    Outcome::Upserted => {
                        report.refreshed_buoys += 1;
                        self.stats.buoy_refreshes += 1;
                    }
                    Outcome::Filtered | Outcome::InvalidIdentity => {
                        report.removed.push(identity);
                        continue;
                    }
                }
            }

            let max_age = self.config.max_age_sec;
            if let Some(target) = self.traffic.get_mut(&identity) {
                target.age = target.age_at(now);
                if target.age > max_age {
                    stale.push(identity);
                }
            }
        }

        for identity in stale {
            self.traffic.remove(&identity);
            self.stats.evicted += 1;
            report.removed.push(identity);
        }

        if !report.removed.is_empty() {
            debug!(
                removed = report.removed.len(),
                remaining = self.traffic.len(),
                "sweep removed targets"
            );
        }
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
