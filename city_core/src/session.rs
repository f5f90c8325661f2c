//! Session-scoped dashboard state.
//!
//! [`Session`] is owned by the top-level view and is the only place the
//! snapshot, the staged training quantities and the error/busy flags live.
//! Remote calls go out as [`Dispatch`] values and come back as
//! [`Completion`]s; the session never performs I/O itself.

use std::time::Instant;

use city_proto::{DecodedState, StatePayload};
use tracing::{debug, info, warn};

use crate::client::StateQuery;
use crate::config::DashboardConfig;
use crate::error::ValidationError;
use crate::projection::{DisplayMapping, ProjectionPhase, Projector};
use crate::pump::{ApiCall, Completion, Dispatch};
use crate::schedule::Ticker;
use crate::snapshot::SnapshotStore;
use crate::training::{TrainingKey, TrainingQuantities};

/// Issues increasing request numbers and tells whether a response is still the
/// newest one asked for.
#[derive(Debug, Clone, Default)]
pub struct RequestSequencer {
    latest: u64,
}

impl RequestSequencer {
    pub fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn latest(&self) -> u64 {
        self.latest
    }

    pub fn is_latest(&self, seq: u64) -> bool {
        seq == self.latest
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The payload became the current state. `rebased` is set when it also
    /// carried a full snapshot.
    Applied { rebased: bool },
    /// The server accepted the call but a newer request was issued since.
    Superseded,
    Failed,
}

#[derive(Debug)]
pub struct Session {
    configured_city: Option<String>,
    configured_player: Option<String>,
    latest: Option<DecodedState>,
    store: SnapshotStore,
    projector: Projector,
    training: TrainingQuantities,
    last_error: Option<String>,
    in_flight: usize,
    sequencer: RequestSequencer,
    auto_refresh: Ticker,
    shut_down: bool,
}

impl Session {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            configured_city: non_blank(config.city_id()),
            configured_player: non_blank(config.player_id()),
            latest: None,
            store: SnapshotStore::new(),
            projector: Projector::new(config.projection_interval()),
            training: TrainingQuantities::new(config.train_max_per_level()),
            last_error: None,
            in_flight: 0,
            sequencer: RequestSequencer::default(),
            auto_refresh: Ticker::new(config.refresh_interval()),
            shut_down: false,
        }
    }

    pub fn payload(&self) -> Option<&StatePayload> {
        self.latest.as_ref().map(|decoded| &decoded.payload)
    }

    pub fn raw_state(&self) -> Option<&serde_json::Value> {
        self.latest.as_ref().map(|decoded| &decoded.raw)
    }

    pub fn snapshot_store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn projection_phase(&self) -> ProjectionPhase {
        self.projector.phase()
    }

    pub fn training(&self) -> &TrainingQuantities {
        &self.training
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn auto_refresh_armed(&self) -> bool {
        self.auto_refresh.is_armed()
    }

    /// City of the last applied payload, falling back to the configured one.
    pub fn city_id(&self) -> Option<&str> {
        self.payload()
            .and_then(|payload| payload.city_id.as_deref())
            .or(self.configured_city.as_deref())
            .filter(|id| !id.trim().is_empty())
    }

    pub fn state_query(&self) -> Option<StateQuery> {
        if let Some(city) = self.configured_city.as_deref().filter(|id| !id.trim().is_empty()) {
            return Some(StateQuery::City(city.to_string()));
        }
        if let Some(city) = self.city_id() {
            return Some(StateQuery::City(city.to_string()));
        }
        self.configured_player
            .as_deref()
            .or_else(|| self.payload().and_then(|payload| payload.player_id.as_deref()))
            .filter(|id| !id.trim().is_empty())
            .map(|id| StateQuery::Player(id.to_string()))
    }

    /// Projected resources while projecting, otherwise the raw last-known
    /// totals floored to whole units.
    pub fn displayed_resources(&self) -> Option<DisplayMapping> {
        if let Some(display) = self.projector.display() {
            return Some(display.clone());
        }
        self.payload()
            .and_then(|payload| payload.resources())
            .map(|resources| {
                resources
                    .iter()
                    .map(|(key, value)| (key.clone(), value.floor() as i64))
                    .collect()
            })
    }

    pub fn set_quantity(&mut self, troop_type: &str, level: u32, value: f64) -> u32 {
        self.training.set_quantity(troop_type, level, value)
    }

    pub fn adjust_quantity(&mut self, key: &TrainingKey, delta: i64) -> u32 {
        self.training.adjust(key, delta)
    }

    /// Manual or timed refresh. Never refused for being busy.
    pub fn begin_refresh(&mut self) -> Result<Dispatch, ValidationError> {
        self.last_error = None;
        let query = match self.state_query() {
            Some(query) => query,
            None => return Err(self.reject(ValidationError::MissingCityId)),
        };
        Ok(self.issue(ApiCall::FetchState(query)))
    }

    pub fn begin_upgrade(&mut self, building_code: &str) -> Result<Dispatch, ValidationError> {
        self.last_error = None;
        if self.is_busy() {
            return Err(self.reject(ValidationError::Busy));
        }
        let city_id = match self.city_id() {
            Some(city) => city.to_string(),
            None => return Err(self.reject(ValidationError::MissingCityId)),
        };
        if building_code.trim().is_empty() {
            return Err(self.reject(ValidationError::MissingBuildingCode));
        }
        Ok(self.issue(ApiCall::UpgradeBuilding {
            city_id,
            building_code: building_code.to_string(),
        }))
    }

    pub fn begin_train(&mut self, troop_type: &str, level: u32) -> Result<Dispatch, ValidationError> {
        self.last_error = None;
        if self.is_busy() {
            return Err(self.reject(ValidationError::Busy));
        }
        let city_id = match self.city_id() {
            Some(city) => city.to_string(),
            None => return Err(self.reject(ValidationError::MissingCityId)),
        };
        let order = match self.training.consume(troop_type, level) {
            Ok(order) => order,
            Err(err) => return Err(self.reject(err)),
        };
        Ok(self.issue(ApiCall::TrainTroops { city_id, order }))
    }

    pub fn complete(&mut self, completion: Completion, now: Instant) -> CompletionOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Completion { seq, call, result } = completion;

        let decoded = match result {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(seq, call = call.label(), error = %err, "session.request_failed");
                self.last_error = Some(err.to_string());
                return CompletionOutcome::Failed;
            }
        };

        if let ApiCall::TrainTroops { order, .. } = &call {
            self.training.confirm(order);
        }

        if self.shut_down {
            debug!(seq, call = call.label(), "session.response_after_shutdown");
            return CompletionOutcome::Superseded;
        }

        if !self.sequencer.is_latest(seq) {
            debug!(
                seq,
                latest = self.sequencer.latest(),
                call = call.label(),
                "session.response_superseded"
            );
            return CompletionOutcome::Superseded;
        }

        let rebased = self.store.ingest(&decoded.payload, now);
        self.latest = Some(decoded);
        if rebased {
            self.projector.rebase(&self.store, now);
        }
        if self.city_id().is_some() {
            self.auto_refresh.start(now);
        }
        info!(
            seq,
            call = call.label(),
            rebased,
            generation = self.store.generation(),
            "session.state_applied"
        );
        CompletionOutcome::Applied { rebased }
    }

    /// Advances the projection and auto-refresh timers. Returns a refresh
    /// dispatch when the auto-refresh interval elapsed.
    pub fn poll_timers(&mut self, now: Instant) -> Option<Dispatch> {
        if self.shut_down {
            return None;
        }
        self.projector.tick(&self.store, now);
        if self.auto_refresh.poll(now) {
            match self.begin_refresh() {
                Ok(dispatch) => return Some(dispatch),
                Err(err) => warn!(error = %err, "session.auto_refresh_skipped"),
            }
        }
        None
    }

    /// Stops both timers. Nothing fires after this, and late responses no
    /// longer change the displayed state.
    pub fn shutdown(&mut self) {
        self.shut_down = true;
        self.projector.stop();
        self.auto_refresh.stop();
    }

    fn issue(&mut self, call: ApiCall) -> Dispatch {
        let seq = self.sequencer.issue();
        self.in_flight += 1;
        debug!(seq, call = call.label(), in_flight = self.in_flight, "session.request_issued");
        Dispatch { seq, call }
    }

    fn reject(&mut self, err: ValidationError) -> ValidationError {
        self.last_error = Some(err.to_string());
        err
    }
}

fn non_blank(id: Option<&str>) -> Option<String> {
    id.map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}
