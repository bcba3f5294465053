//! Application layer of the spreadsheet visualizer.
//!
//! Turns a stream of `StateRequest`s into a stream of `StateSnapshot`s:
//! diffs each request against the last one processed, fetches only what
//! changed, and publishes the resolved state to every subscriber. Both the
//! CLI and any interactive front end drive the same `StateService`.

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod hub;
pub mod service;

pub use config::{AppConfig, ServiceConfig, load_config, save_config};
pub use diff::{RequestDelta, SheetDelta};
pub use engine::{EngineOutcome, SessionEngine};
pub use error::{AppError, AppResult};
pub use hub::{FailureNotice, SnapshotHub, SnapshotStream, StateUpdate};
pub use service::StateService;
