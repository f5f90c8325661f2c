//! Core of the city dashboard.
//!
//! Holds the session state for one dashboard view: the latest server
//! snapshot, the projection of resource totals between fetches, staged
//! training quantities, and the HTTP plumbing that feeds them.

pub mod client;
pub mod config;
mod error;
pub mod projection;
pub mod pump;
mod schedule;
pub mod session;
mod snapshot;
pub mod training;

pub use client::{StateClient, StateQuery};
pub use config::{ConfigError, DashboardConfig, DashboardConfigMetadata};
pub use error::{ClientError, ValidationError};
pub use projection::{
    elapsed_seconds, project, project_resource, DisplayMapping, ProjectionPhase, Projector,
};
pub use pump::{
    completion_channel, dispatch_channel, run_request_pump, ApiCall, Completion, Dispatch,
};
pub use schedule::Ticker;
pub use session::{CompletionOutcome, RequestSequencer, Session};
pub use snapshot::{Snapshot, SnapshotStore};
pub use training::{TrainOrder, TrainingKey, TrainingQuantities};
