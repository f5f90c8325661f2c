use std::collections::HashMap;
use std::fmt;

use city_proto::TrainRequest;
use tracing::trace;

use crate::error::ValidationError;

pub const DEFAULT_TRAIN_MAX_PER_LEVEL: u32 = 100;

/// Troop type plus level; one staged quantity per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrainingKey {
    pub troop_type: String,
    pub level: u32,
}

impl TrainingKey {
    pub fn new(troop_type: impl Into<String>, level: u32) -> Self {
        Self {
            troop_type: troop_type.into(),
            level,
        }
    }
}

impl fmt::Display for TrainingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.troop_type, self.level)
    }
}

/// A validated quantity ready to be sent. The staged value is only reset once
/// the caller passes this back to [`TrainingQuantities::confirm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainOrder {
    pub key: TrainingKey,
    pub quantity: u32,
}

impl TrainOrder {
    pub fn request(&self) -> TrainRequest {
        TrainRequest {
            quantity: self.quantity,
            level: self.key.level,
        }
    }
}

/// Rounds to an integer and clamps into `[0, max]`. Non-finite input reads as 0.
pub fn clamp_quantity(value: f64, max: u32) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, f64::from(max)) as u32
}

/// Staged training quantities. Keys never touched read as 0 and are not stored.
#[derive(Debug, Clone)]
pub struct TrainingQuantities {
    staged: HashMap<TrainingKey, u32>,
    max_per_level: u32,
}

impl Default for TrainingQuantities {
    fn default() -> Self {
        Self::new(DEFAULT_TRAIN_MAX_PER_LEVEL)
    }
}

impl TrainingQuantities {
    pub fn new(max_per_level: u32) -> Self {
        Self {
            staged: HashMap::new(),
            max_per_level,
        }
    }

    pub fn max_per_level(&self) -> u32 {
        self.max_per_level
    }

    pub fn quantity(&self, key: &TrainingKey) -> u32 {
        self.staged.get(key).copied().unwrap_or(0)
    }

    /// Stores the clamped value and returns it.
    pub fn set_quantity(&mut self, troop_type: &str, level: u32, value: f64) -> u32 {
        let key = TrainingKey::new(troop_type, level);
        let clamped = clamp_quantity(value, self.max_per_level);
        self.store(key, clamped);
        clamped
    }

    pub fn adjust(&mut self, key: &TrainingKey, delta: i64) -> u32 {
        let next = i64::from(self.quantity(key)) + delta;
        let clamped = clamp_quantity(next as f64, self.max_per_level);
        self.store(key.clone(), clamped);
        clamped
    }

    /// Validates the staged quantity for a train request without resetting it.
    pub fn consume(&self, troop_type: &str, level: u32) -> Result<TrainOrder, ValidationError> {
        if troop_type.trim().is_empty() {
            return Err(ValidationError::MissingTroopType);
        }
        if level < 1 {
            return Err(ValidationError::InvalidLevel { level });
        }
        let key = TrainingKey::new(troop_type, level);
        let quantity = self.quantity(&key);
        if quantity < 1 {
            return Err(ValidationError::InvalidQuantity {
                troop_type: key.troop_type,
                level,
                quantity,
            });
        }
        Ok(TrainOrder { key, quantity })
    }

    /// Resets the order's key to 0 after the server accepted the request.
    pub fn confirm(&mut self, order: &TrainOrder) {
        self.staged.remove(&order.key);
        trace!(key = %order.key, quantity = order.quantity, "training.quantity_reset");
    }

    fn store(&mut self, key: TrainingKey, value: u32) {
        if value == 0 {
            self.staged.remove(&key);
        } else {
            self.staged.insert(key, value);
        }
    }
}
