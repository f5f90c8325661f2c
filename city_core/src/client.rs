use std::fmt;

use city_proto::{decode_state_json, DecodedState, TrainRequest};
use reqwest::{Response, Url};
use tracing::trace;

use crate::config::DashboardConfig;
use crate::error::ClientError;

/// Selects whose state `GET /state` returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateQuery {
    City(String),
    Player(String),
}

impl fmt::Display for StateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateQuery::City(id) => write!(f, "cityId={}", id),
            StateQuery::Player(id) => write!(f, "playerId={}", id),
        }
    }
}

/// HTTP client for the game-state service.
#[derive(Debug, Clone)]
pub struct StateClient {
    http: reqwest::Client,
    base_url: Url,
}

impl StateClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| ClientError::InvalidBaseUrl(format!("{}: {}", base_url, err)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(ClientError::Network)?;
        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &DashboardConfig) -> Result<Self, ClientError> {
        Self::new(config.api_base_url())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn state_url(&self, query: &StateQuery) -> Url {
        let mut url = self.endpoint(&["state"]);
        let (name, value) = match query {
            StateQuery::City(id) => ("cityId", id),
            StateQuery::Player(id) => ("playerId", id),
        };
        url.query_pairs_mut().append_pair(name, value);
        url
    }

    pub fn upgrade_url(&self, city_id: &str, building_code: &str) -> Url {
        self.endpoint(&["cities", city_id, "buildings", building_code, "upgrade"])
    }

    pub fn train_url(&self, city_id: &str, troop_type: &str) -> Url {
        self.endpoint(&["cities", city_id, "troops", troop_type, "train"])
    }

    /// `GET /state?cityId=..` or `?playerId=..`.
    pub async fn fetch_state(&self, query: &StateQuery) -> Result<DecodedState, ClientError> {
        let url = self.state_url(query);
        trace!(%url, "http.get");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(ClientError::Network)?;
        read_state(response).await
    }

    /// `POST /cities/{cityId}/buildings/{buildingCode}/upgrade`.
    pub async fn upgrade_building(
        &self,
        city_id: &str,
        building_code: &str,
    ) -> Result<DecodedState, ClientError> {
        let url = self.upgrade_url(city_id, building_code);
        trace!(%url, "http.post");
        let response = self
            .http
            .post(url)
            .send()
            .await
            .map_err(ClientError::Network)?;
        read_state(response).await
    }

    /// `POST /cities/{cityId}/troops/{troopType}/train` with `{quantity, level}`.
    pub async fn train_troops(
        &self,
        city_id: &str,
        troop_type: &str,
        request: TrainRequest,
    ) -> Result<DecodedState, ClientError> {
        let url = self.train_url(city_id, troop_type);
        trace!(%url, quantity = request.quantity, level = request.level, "http.post");
        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(ClientError::Network)?;
        read_state(response).await
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

async fn read_state(response: Response) -> Result<DecodedState, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "No response body".to_string());
        return Err(ClientError::Api {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            body,
        });
    }
    let body = response.text().await.map_err(ClientError::Network)?;
    Ok(decode_state_json(&body)?)
}
