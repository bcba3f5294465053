use ssv_core::{JobId, SpreadsheetId};
use ssv_state::RowRef;

use crate::error::ClientResult;
use crate::wire::{RowRecord, ScoreRecord, SpreadsheetRecord};

/// Parameters of one survival-analysis p-value computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurvivalQuery {
    pub duration: RowRef,
    pub group: RowRef,
    pub event: RowRef,
    pub event_value: String,
}

/// Everything the state engine needs from the server, one method per endpoint.
///
/// Implementations must be callable from several threads at once; survival
/// p-values are fetched in parallel.
pub trait DataSource: Send + Sync {
    fn spreadsheet_ids_for_job(&self, job: JobId) -> ClientResult<Vec<SpreadsheetId>>;

    fn spreadsheets(&self, ids: &[SpreadsheetId]) -> ClientResult<Vec<SpreadsheetRecord>>;

    fn variances(&self, ids: &[SpreadsheetId]) -> ClientResult<Vec<ScoreRecord>>;

    /// Raw correlation p-values of every row against `group`.
    fn correlations(&self, ids: &[SpreadsheetId], group: RowRef)
        -> ClientResult<Vec<ScoreRecord>>;

    fn rows(&self, sheet: SpreadsheetId, indices: &[usize]) -> ClientResult<Vec<RowRecord>>;

    fn survival_pvalue(&self, query: &SurvivalQuery) -> ClientResult<f64>;
}
