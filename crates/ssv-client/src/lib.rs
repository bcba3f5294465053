//! Server boundary for the spreadsheet visualizer.
//!
//! This crate owns the wire contract: the `_items` envelope, the records the
//! server returns, and the `DataSource` trait the state engine consumes.
//! Two sources are provided: a blocking HTTP client and an in-memory source
//! backed by a fixture file.
//!
//! No retries. Authentication failures are reported, never handled.

mod error;
mod http;
mod memory;
mod source;
pub mod wire;

pub use error::{ClientError, ClientResult};
pub use http::{ClientConfig, HttpSource};
pub use memory::{
    CallLog, FixtureCorrelation, FixtureJob, FixtureRow, FixtureSheet, FixtureSurvival,
    MemoryFixture, MemorySource,
};
pub use source::{DataSource, SurvivalQuery};
pub use wire::{IdRecord, Items, PValueRecord, RowRecord, ScoreRecord, SpreadsheetRecord};
