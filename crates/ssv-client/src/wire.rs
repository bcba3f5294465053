//! JSON records exchanged with the data server.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ssv_core::{FileId, Row, RowType, SpreadsheetId, SpreadsheetMeta};

/// Response envelope: every endpoint returns its records under `_items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Items<T> {
    #[serde(rename = "_items")]
    pub items: Vec<T>,
}

impl<T> Items<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IdRecord {
    #[serde(rename = "_id")]
    pub id: SpreadsheetId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadsheetRecord {
    #[serde(rename = "_id")]
    pub id: SpreadsheetId,
    pub file_id: FileId,
    pub row_names: Vec<String>,
    pub row_types: Vec<RowType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_nan_counts: Option<Vec<u64>>,
    pub sample_names: Vec<String>,
    #[serde(default)]
    pub is_transposed: bool,
}

impl SpreadsheetRecord {
    pub fn into_meta(self) -> SpreadsheetMeta {
        SpreadsheetMeta {
            id: self.id,
            file_id: self.file_id,
            row_names: self.row_names,
            row_types: self.row_types,
            row_nan_counts: self.row_nan_counts,
            sample_names: self.sample_names,
            is_transposed: self.is_transposed,
        }
    }
}

/// Per-row scores (variances, or raw correlation p-values) of one spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub spreadsheet_id: SpreadsheetId,
    pub scores: Vec<Option<f64>>,
}

impl ScoreRecord {
    /// Scores with missing entries as NaN.
    pub fn dense(&self) -> Vec<f64> {
        self.scores.iter().map(|s| s.unwrap_or(f64::NAN)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRecord {
    pub row_idx: usize,
    pub values: Vec<Value>,
}

impl RowRecord {
    pub fn into_row(self, sheet: SpreadsheetId, row_type: RowType) -> Row {
        Row::from_raw(sheet, self.row_idx, row_type, &self.values)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PValueRecord {
    pub pvalue: Option<f64>,
}
