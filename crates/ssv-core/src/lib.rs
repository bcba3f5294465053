//! ssv-core: data model for the spreadsheet visualizer.
//!
//! Contains:
//! - ids (spreadsheet, job and file identifiers)
//! - row (numeric and categoric rows fetched from the server)
//! - spreadsheet (row metadata, score arrays, sparse row cache)
//! - score (filter/sort score types and p-value transforms)
//! - numeric (variance and min/max helpers)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod row;
pub mod score;
pub mod spreadsheet;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
pub use row::{CategoricValues, NumericValues, Row, RowType, RowValues};
pub use score::{
    DEFAULT_SCORE_CAP, SELF_CORRELATION_SCORE, ScoreType, cmp_scores_desc, pvalue_to_score,
};
pub use spreadsheet::{Spreadsheet, SpreadsheetMeta};
