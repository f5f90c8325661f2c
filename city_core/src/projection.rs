//! Client-side extrapolation of resource totals between server fetches.
//!
//! The server reports totals and per-second rates once per fetch. Between
//! fetches the dashboard shows `floor(base + rate * elapsed)` for every key,
//! where `elapsed` runs from the instant the current snapshot was captured.
//! A new snapshot resets that baseline, so stale rates never compound.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::schedule::Ticker;
use crate::snapshot::{Snapshot, SnapshotStore};

/// Resource identifier to whole units shown on screen.
pub type DisplayMapping = BTreeMap<String, i64>;

pub const DEFAULT_PROJECTION_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionPhase {
    /// No snapshot has arrived yet.
    Idle,
    Projecting,
}

/// Signed seconds from `captured_at` to `now`. Negative when `now` precedes
/// the capture instant.
pub fn elapsed_seconds(captured_at: Instant, now: Instant) -> f64 {
    match now.checked_duration_since(captured_at) {
        Some(elapsed) => elapsed.as_secs_f64(),
        None => -captured_at.duration_since(now).as_secs_f64(),
    }
}

pub fn project_resource(base: f64, rate: f64, elapsed_seconds: f64) -> i64 {
    (base + rate * elapsed_seconds).floor() as i64
}

/// Projects every key present in either the resources or the rates.
pub fn project(snapshot: &Snapshot, now: Instant) -> DisplayMapping {
    let elapsed = elapsed_seconds(snapshot.captured_at, now);
    let keys: BTreeSet<&String> = snapshot
        .resources
        .keys()
        .chain(snapshot.rates.keys())
        .collect();

    keys.into_iter()
        .map(|key| {
            let base = snapshot.resources.get(key).copied().unwrap_or(0.0);
            let rate = snapshot.rates.get(key).copied().unwrap_or(0.0);
            (key.clone(), project_resource(base, rate, elapsed))
        })
        .collect()
}

/// Republishes a [`DisplayMapping`] once per interval from the latest snapshot
/// in a [`SnapshotStore`].
#[derive(Debug, Clone)]
pub struct Projector {
    ticker: Ticker,
    display: Option<DisplayMapping>,
    baseline_generation: u64,
}

impl Default for Projector {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECTION_INTERVAL)
    }
}

impl Projector {
    pub fn new(interval: Duration) -> Self {
        Self {
            ticker: Ticker::new(interval),
            display: None,
            baseline_generation: 0,
        }
    }

    pub fn phase(&self) -> ProjectionPhase {
        if self.display.is_some() {
            ProjectionPhase::Projecting
        } else {
            ProjectionPhase::Idle
        }
    }

    pub fn display(&self) -> Option<&DisplayMapping> {
        self.display.as_ref()
    }

    /// Recomputes immediately from the store and restarts the tick interval.
    pub fn rebase(&mut self, store: &SnapshotStore, now: Instant) {
        let Some(snapshot) = store.get_snapshot() else {
            return;
        };
        self.display = Some(project(snapshot, now));
        self.baseline_generation = store.generation();
        self.ticker.rebase(now);
        trace!(generation = self.baseline_generation, "projection.rebased");
    }

    /// Returns `true` when a new mapping was published. A snapshot that landed
    /// since the last publish forces a rebase on this call.
    pub fn tick(&mut self, store: &SnapshotStore, now: Instant) -> bool {
        let Some(snapshot) = store.get_snapshot() else {
            return false;
        };
        if store.generation() != self.baseline_generation {
            self.rebase(store, now);
            return true;
        }
        if self.ticker.poll(now) {
            self.display = Some(project(snapshot, now));
            return true;
        }
        false
    }

    pub fn stop(&mut self) {
        self.ticker.stop();
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_armed()
    }
}
