use thiserror::Error;

/// Failure of a remote call against the game-state service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request was rejected before any response arrived.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    /// Non-2xx status. The body is kept verbatim.
    #[error("API error: {status} {status_text} - {body}")]
    Api {
        status: u16,
        status_text: String,
        body: String,
    },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("request pump stopped")]
    PumpStopped,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Client-side precondition failures. These never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("city id is not available in the current state")]
    MissingCityId,
    #[error("building code is missing")]
    MissingBuildingCode,
    #[error("troop type is missing")]
    MissingTroopType,
    #[error("level must be an integer >= 1 (got {level})")]
    InvalidLevel { level: u32 },
    #[error("quantity must be an integer >= 1 (got {quantity} for {troop_type} level {level})")]
    InvalidQuantity {
        troop_type: String,
        level: u32,
        quantity: u32,
    },
    #[error("another request is still in flight")]
    Busy,
}
