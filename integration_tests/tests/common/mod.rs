#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use city_core::StateClient;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const CITY_ID: &str = "5ad357d7-1f9f-49f9-8e42-1f9b4834dcaa";

pub fn city_state_fixture() -> &'static str {
    include_str!("../fixtures/city_state.json")
}

/// A state body with a single `wood` resource.
pub fn wood_state(wood: f64, rate: f64) -> String {
    serde_json::json!({
        "cityId": CITY_ID,
        "playerId": "p1",
        "state": { "resources": { "wood": wood }, "buildings": [], "troops": [] },
        "ratesPerSecond": { "wood": rate }
    })
    .to_string()
}

#[derive(Debug, Clone)]
pub struct Scripted {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl Scripted {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub state_queries: Vec<HashMap<String, String>>,
    pub upgrades: Vec<(String, String)>,
    pub trains: Vec<(String, String, Value)>,
}

impl Recorded {
    pub fn total(&self) -> usize {
        self.state_queries.len() + self.upgrades.len() + self.trains.len()
    }
}

#[derive(Default)]
struct Shared {
    script: Mutex<VecDeque<Scripted>>,
    recorded: Mutex<Recorded>,
}

impl Shared {
    /// Pops the next scripted reply, or the fixture state when none is queued.
    fn next_reply(&self) -> Scripted {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Scripted::ok(city_state_fixture()))
    }
}

/// In-process stand-in for the game-state API.
pub struct FakeGameServer {
    base_url: String,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl FakeGameServer {
    pub async fn start() -> anyhow::Result<Self> {
        let shared = Arc::new(Shared::default());
        let app = Router::new()
            .route("/state", get(state))
            .route(
                "/cities/{city_id}/buildings/{building_code}/upgrade",
                post(upgrade),
            )
            .route("/cities/{city_id}/troops/{troop_type}/train", post(train))
            .with_state(shared.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            shared,
            handle,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn client(&self) -> StateClient {
        StateClient::new(&self.base_url).expect("fake server url is valid")
    }

    pub fn push(&self, reply: Scripted) {
        self.shared.script.lock().unwrap().push_back(reply);
    }

    pub fn recorded(&self) -> Recorded {
        self.shared.recorded.lock().unwrap().clone()
    }

    /// Waits until at least `count` requests have reached a handler.
    pub async fn wait_for_requests(&self, count: usize) {
        for _ in 0..200 {
            if self.recorded().total() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("fake server saw fewer than {count} requests");
    }
}

impl Drop for FakeGameServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn reply(reply: Scripted) -> Response {
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, reply.body).into_response()
}

async fn state(
    State(shared): State<Arc<Shared>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    shared.recorded.lock().unwrap().state_queries.push(params);
    let next = shared.next_reply();
    reply(next).await
}

async fn upgrade(
    State(shared): State<Arc<Shared>>,
    Path((city_id, building_code)): Path<(String, String)>,
) -> Response {
    shared
        .recorded
        .lock()
        .unwrap()
        .upgrades
        .push((city_id, building_code));
    let next = shared.next_reply();
    reply(next).await
}

async fn train(
    State(shared): State<Arc<Shared>>,
    Path((city_id, troop_type)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    shared
        .recorded
        .lock()
        .unwrap()
        .trains
        .push((city_id, troop_type, body));
    let next = shared.next_reply();
    reply(next).await
}
