//! Desired visualization state, as issued by view components.

use std::fmt;

use serde::{Deserialize, Serialize};
use ssv_core::{Row, ScoreType, SpreadsheetId};

/// Reference to one row of one spreadsheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowRef {
    pub spreadsheet_id: SpreadsheetId,
    pub row_idx: usize,
}

impl RowRef {
    pub fn new(spreadsheet_id: SpreadsheetId, row_idx: usize) -> Self {
        Self {
            spreadsheet_id,
            row_idx,
        }
    }
}

impl From<&Row> for RowRef {
    fn from(row: &Row) -> Self {
        let (spreadsheet_id, row_idx) = row.row_ref();
        Self::new(spreadsheet_id, row_idx)
    }
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.spreadsheet_id, self.row_idx)
    }
}

/// Main-heatmap configuration for one spreadsheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainSpreadsheetRequest {
    pub spreadsheet_id: SpreadsheetId,
    #[serde(default)]
    pub filter_type: ScoreType,
    pub filter_limit: usize,
    #[serde(default)]
    pub sort_type: ScoreType,
}

/// Survival-analysis context shared by every requested p-value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurvivalRequest {
    pub time_row: RowRef,
    pub event_row: RowRef,
    pub event_value: String,
}

/// Immutable description of the desired visualization state.
///
/// Equality is structural; two requests that compare equal describe the same
/// view and must not cause any new network traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping: Option<RowRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorting: Option<RowRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub main_spreadsheets: Vec<MainSpreadsheetRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_rows: Vec<RowRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survival: Option<SurvivalRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pvalue_rows: Vec<RowRef>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub end_of_session: bool,
}

impl StateRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that terminates the session.
    pub fn end_session() -> Self {
        Self {
            end_of_session: true,
            ..Self::default()
        }
    }

    pub fn with_grouping(mut self, row: Option<RowRef>) -> Self {
        self.grouping = row;
        self
    }

    pub fn with_sorting(mut self, row: Option<RowRef>) -> Self {
        self.sorting = row;
        self
    }

    /// Add or replace the main-heatmap configuration of a spreadsheet.
    pub fn with_main(mut self, main: MainSpreadsheetRequest) -> Self {
        self.main_spreadsheets
            .retain(|m| m.spreadsheet_id != main.spreadsheet_id);
        self.main_spreadsheets.push(main);
        self
    }

    pub fn with_other_row(mut self, row: RowRef) -> Self {
        if !self.other_rows.contains(&row) {
            self.other_rows.push(row);
        }
        self
    }

    pub fn with_survival(mut self, survival: Option<SurvivalRequest>) -> Self {
        self.survival = survival;
        self
    }

    pub fn with_pvalue_row(mut self, row: RowRef) -> Self {
        if !self.pvalue_rows.contains(&row) {
            self.pvalue_rows.push(row);
        }
        self
    }

    pub fn main_request(&self, sheet: SpreadsheetId) -> Option<&MainSpreadsheetRequest> {
        self.main_spreadsheets
            .iter()
            .find(|m| m.spreadsheet_id == sheet)
    }

    /// Individually displayed rows on `sheet`, in request order.
    pub fn single_rows_for(&self, sheet: SpreadsheetId) -> Vec<usize> {
        self.other_rows
            .iter()
            .filter(|r| r.spreadsheet_id == sheet)
            .map(|r| r.row_idx)
            .collect()
    }

    /// Every row on `sheet` that a snapshot of this request must resolve.
    pub fn referenced_rows_for(&self, sheet: SpreadsheetId) -> Vec<usize> {
        let survival_rows = self
            .survival
            .iter()
            .flat_map(|s| [s.time_row, s.event_row]);
        let mut rows: Vec<usize> = self
            .grouping
            .into_iter()
            .chain(self.sorting)
            .chain(self.other_rows.iter().copied())
            .chain(survival_rows)
            .filter(|r| r.spreadsheet_id == sheet)
            .map(|r| r.row_idx)
            .collect();
        rows.sort_unstable();
        rows.dedup();
        rows
    }
}
