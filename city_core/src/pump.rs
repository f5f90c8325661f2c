use std::time::Instant;

use city_proto::DecodedState;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{info, trace, warn};

use crate::client::{StateClient, StateQuery};
use crate::error::ClientError;
use crate::training::TrainOrder;

/// One remote call, fully validated.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    FetchState(StateQuery),
    UpgradeBuilding {
        city_id: String,
        building_code: String,
    },
    TrainTroops {
        city_id: String,
        order: TrainOrder,
    },
}

impl ApiCall {
    pub fn label(&self) -> &'static str {
        match self {
            ApiCall::FetchState(_) => "fetch_state",
            ApiCall::UpgradeBuilding { .. } => "upgrade_building",
            ApiCall::TrainTroops { .. } => "train_troops",
        }
    }
}

/// A call tagged with the sequence number it was issued under.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub seq: u64,
    pub call: ApiCall,
}

#[derive(Debug)]
pub struct Completion {
    pub seq: u64,
    pub call: ApiCall,
    pub result: Result<DecodedState, ClientError>,
}

pub fn dispatch_channel() -> (UnboundedSender<Dispatch>, UnboundedReceiver<Dispatch>) {
    unbounded_channel()
}

pub fn completion_channel() -> (UnboundedSender<Completion>, UnboundedReceiver<Completion>) {
    unbounded_channel()
}

pub async fn execute(client: &StateClient, call: &ApiCall) -> Result<DecodedState, ClientError> {
    match call {
        ApiCall::FetchState(query) => client.fetch_state(query).await,
        ApiCall::UpgradeBuilding {
            city_id,
            building_code,
        } => client.upgrade_building(city_id, building_code).await,
        ApiCall::TrainTroops { city_id, order } => {
            client
                .train_troops(city_id, &order.key.troop_type, order.request())
                .await
        }
    }
}

/// Runs every dispatch as its own task until the dispatch sender is dropped.
///
/// Calls are not deduplicated, so completions may arrive in any order; the
/// receiver decides which ones still apply by sequence number.
pub async fn run_request_pump(
    client: StateClient,
    mut dispatches: UnboundedReceiver<Dispatch>,
    completions: UnboundedSender<Completion>,
) {
    while let Some(dispatch) = dispatches.recv().await {
        let client = client.clone();
        let completions = completions.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let result = execute(&client, &dispatch.call).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(_) => info!(
                    seq = dispatch.seq,
                    call = dispatch.call.label(),
                    elapsed_ms,
                    "request.completed"
                ),
                Err(err) => warn!(
                    seq = dispatch.seq,
                    call = dispatch.call.label(),
                    elapsed_ms,
                    error = %err,
                    "request.failed"
                ),
            }
            let completion = Completion {
                seq: dispatch.seq,
                call: dispatch.call,
                result,
            };
            if completions.send(completion).is_err() {
                trace!("request.completion_dropped");
            }
        });
    }
    info!("request_pump.stopped");
}
