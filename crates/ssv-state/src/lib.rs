//! ssv-state: visualization requests and the snapshots derived from them.

pub mod ordering;
pub mod ranking;
pub mod request;
pub mod snapshot;

pub use ordering::{order_samples, sample_union};
pub use ranking::{effective_score_type, rank_rows};
pub use request::{MainSpreadsheetRequest, RowRef, StateRequest, SurvivalRequest};
pub use snapshot::{GroupSpan, PValueResult, StateSnapshot, SurvivalRows};
