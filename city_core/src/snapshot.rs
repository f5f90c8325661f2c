use std::time::Instant;

use city_proto::{RateMapping, ResourceMapping, StatePayload};
use tracing::{debug, trace};

/// Server-confirmed resource totals and rates from a single response.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub resources: ResourceMapping,
    pub rates: RateMapping,
    pub captured_at: Instant,
}

/// Holds the latest [`Snapshot`]. Each set replaces the previous one whole.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    current: Option<Snapshot>,
    generation: u64,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_snapshot(&mut self, resources: ResourceMapping, rates: RateMapping, now: Instant) {
        self.current = Some(Snapshot {
            resources,
            rates,
            captured_at: now,
        });
        self.generation += 1;
        trace!(generation = self.generation, "snapshot.replaced");
    }

    pub fn get_snapshot(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Number of snapshots set so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replaces the snapshot from a response payload. A payload lacking either
    /// resources or rates leaves the store untouched and returns `false`.
    pub fn ingest(&mut self, payload: &StatePayload, now: Instant) -> bool {
        match (payload.resources(), payload.rates_per_second.as_ref()) {
            (Some(resources), Some(rates)) => {
                self.set_snapshot(resources.clone(), rates.clone(), now);
                true
            }
            (resources, rates) => {
                debug!(
                    has_resources = resources.is_some(),
                    has_rates = rates.is_some(),
                    "snapshot.skipped=incomplete_payload"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use city_proto::CityState;

    use super::*;

    fn mapping(entries: &[(&str, f64)]) -> ResourceMapping {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect()
    }

    fn payload(resources: Option<ResourceMapping>, rates: Option<RateMapping>) -> StatePayload {
        StatePayload {
            city_id: Some("c1".to_string()),
            state: Some(CityState {
                resources,
                ..CityState::default()
            }),
            rates_per_second: rates,
            ..StatePayload::default()
        }
    }

    #[test]
    fn empty_until_first_set() {
        let store = SnapshotStore::new();
        assert!(store.get_snapshot().is_none());
        assert!(store.is_empty());
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn set_replaces_wholesale() {
        let t0 = Instant::now();
        let mut store = SnapshotStore::new();
        store.set_snapshot(
            mapping(&[("wood", 100.0), ("stone", 5.0)]),
            mapping(&[("wood", 2.0)]),
            t0,
        );
        let t1 = t0 + Duration::from_secs(3);
        store.set_snapshot(mapping(&[("wood", 50.0)]), mapping(&[]), t1);

        let snapshot = store.get_snapshot().unwrap();
        assert_eq!(snapshot.resources, mapping(&[("wood", 50.0)]));
        assert!(snapshot.rates.is_empty());
        assert_eq!(snapshot.captured_at, t1);
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn ingest_requires_resources_and_rates_together() {
        let t0 = Instant::now();
        let mut store = SnapshotStore::new();
        assert!(store.ingest(
            &payload(Some(mapping(&[("wood", 10.0)])), Some(mapping(&[("wood", 1.0)]))),
            t0
        ));

        let later = t0 + Duration::from_secs(1);
        assert!(!store.ingest(&payload(Some(mapping(&[("wood", 99.0)])), None), later));
        assert!(!store.ingest(&payload(None, Some(mapping(&[("wood", 9.0)]))), later));

        let snapshot = store.get_snapshot().unwrap();
        assert_eq!(snapshot.resources.get("wood"), Some(&10.0));
        assert_eq!(snapshot.captured_at, t0);
        assert_eq!(store.generation(), 1);
    }
}
