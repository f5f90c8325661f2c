//! Wire contracts for the city game-state HTTP API.
//!
//! Every mutation endpoint answers with the same [`StatePayload`] shape as the
//! state fetch, so a single decoder covers all three calls.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Resource identifier to amount, as reported by the server.
pub type ResourceMapping = BTreeMap<String, f64>;

/// Resource identifier to production rate in units per second. Rates may be negative.
pub type RateMapping = BTreeMap<String, f64>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatePayload {
    #[serde(default)]
    pub player_id: Option<String>,
    #[serde(default)]
    pub city_id: Option<String>,
    #[serde(default)]
    pub server_time: Option<String>,
    #[serde(default)]
    pub tick: Option<u64>,
    #[serde(default)]
    pub state: Option<CityState>,
    #[serde(default)]
    pub rates_per_second: Option<RateMapping>,
}

impl StatePayload {
    pub fn resources(&self) -> Option<&ResourceMapping> {
        self.state.as_ref().and_then(|state| state.resources.as_ref())
    }

    pub fn buildings(&self) -> &[Building] {
        self.state
            .as_ref()
            .map(|state| state.buildings.as_slice())
            .unwrap_or(&[])
    }

    pub fn troops(&self) -> &[Troop] {
        self.state
            .as_ref()
            .map(|state| state.troops.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CityState {
    #[serde(default)]
    pub resources: Option<ResourceMapping>,
    #[serde(default)]
    pub buildings: Vec<Building>,
    #[serde(default)]
    pub troops: Vec<Troop>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    #[serde(default)]
    pub building_type: BuildingType,
    #[serde(default)]
    pub level: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildingType {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub production_resource: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Troop {
    #[serde(default)]
    pub troop_type: TroopType,
    #[serde(default)]
    pub quantity: u64,
}

impl Troop {
    pub fn category(&self) -> Option<TroopCategory> {
        TroopCategory::from_code(&self.troop_type.category.code)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TroopType {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub category: CategoryRef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoryRef {
    #[serde(default)]
    pub code: String,
}

/// Body of `POST /cities/{cityId}/troops/{troopType}/train`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainRequest {
    pub quantity: u32,
    pub level: u32,
}

/// Troop categories the training view groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TroopCategory {
    Infantry,
    Archers,
    Cavalry,
}

impl TroopCategory {
    /// Display order of the training sections.
    pub const ALL: [TroopCategory; 3] = [
        TroopCategory::Infantry,
        TroopCategory::Archers,
        TroopCategory::Cavalry,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "infantry" => Some(TroopCategory::Infantry),
            "archers" => Some(TroopCategory::Archers),
            "cavalry" => Some(TroopCategory::Cavalry),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            TroopCategory::Infantry => "infantry",
            TroopCategory::Archers => "archers",
            TroopCategory::Cavalry => "cavalry",
        }
    }

    /// Name of the building that trains this category.
    pub fn section_title(self) -> &'static str {
        match self {
            TroopCategory::Infantry => "Barracks",
            TroopCategory::Archers => "Range",
            TroopCategory::Cavalry => "Stables",
        }
    }
}

impl fmt::Display for TroopCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Troops split by category. Entries whose category code is not one of the
/// known variants land in `unrecognized` instead of being dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TroopGroups {
    pub infantry: Vec<Troop>,
    pub archers: Vec<Troop>,
    pub cavalry: Vec<Troop>,
    pub unrecognized: Vec<Troop>,
}

impl TroopGroups {
    pub fn get(&self, category: TroopCategory) -> &[Troop] {
        match category {
            TroopCategory::Infantry => &self.infantry,
            TroopCategory::Archers => &self.archers,
            TroopCategory::Cavalry => &self.cavalry,
        }
    }
}

pub fn group_troops(troops: &[Troop]) -> TroopGroups {
    let mut groups = TroopGroups::default();
    for troop in troops {
        let bucket = match troop.category() {
            Some(TroopCategory::Infantry) => &mut groups.infantry,
            Some(TroopCategory::Archers) => &mut groups.archers,
            Some(TroopCategory::Cavalry) => &mut groups.cavalry,
            None => &mut groups.unrecognized,
        };
        bucket.push(troop.clone());
    }
    groups
}

/// A decoded response body together with the raw JSON it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedState {
    pub payload: StatePayload,
    pub raw: serde_json::Value,
}

pub fn decode_state_json(data: &str) -> serde_json::Result<DecodedState> {
    let raw: serde_json::Value = serde_json::from_str(data)?;
    let payload = StatePayload::deserialize(&raw)?;
    Ok(DecodedState { payload, raw })
}

pub fn encode_train_request_json(request: &TrainRequest) -> serde_json::Result<String> {
    serde_json::to_string(request)
}
