//! Rows: one feature's values across every sample of a spreadsheet.
//!
//! Rows are immutable once built and shared through `Arc` between the
//! spreadsheet row cache and the snapshots that reference them. A row keeps
//! only the id of its spreadsheet; names, types and scores are looked up in
//! the spreadsheet's parallel arrays by row index.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::SpreadsheetId;
use crate::numeric::finite_min_max;
use crate::spreadsheet::Spreadsheet;

/// Declared type of a spreadsheet row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowType {
    Numeric,
    Categoric,
    Other,
}

/// Values of a numeric row plus their finite range.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericValues {
    values: Vec<Option<f64>>,
    min: Option<f64>,
    max: Option<f64>,
}

impl NumericValues {
    pub fn new(values: Vec<Option<f64>>) -> Self {
        let values: Vec<Option<f64>> = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        let range = finite_min_max(&values);
        Self {
            values,
            min: range.map(|(lo, _)| lo),
            max: range.map(|(_, hi)| hi),
        }
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }
}

/// Values of a categoric row plus the sorted set of distinct present values.
///
/// Missing values are not part of `distinct_values`; `has_missing` records
/// whether any sample lacks a value. Missing always sorts after every
/// concrete category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricValues {
    values: Vec<Option<String>>,
    distinct_values: Vec<String>,
    has_missing: bool,
}

impl CategoricValues {
    pub fn new(values: Vec<Option<String>>) -> Self {
        let mut distinct_values: Vec<String> = values.iter().flatten().cloned().collect();
        distinct_values.sort();
        distinct_values.dedup();
        let has_missing = values.iter().any(Option::is_none);
        Self {
            values,
            distinct_values,
            has_missing,
        }
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    pub fn distinct_values(&self) -> &[String] {
        &self.distinct_values
    }

    pub fn has_missing(&self) -> bool {
        self.has_missing
    }

    /// Position of `value` among the distinct values.
    pub fn rank_of(&self, value: &str) -> Option<usize> {
        self.distinct_values
            .binary_search_by(|probe| probe.as_str().cmp(value))
            .ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    Numeric(NumericValues),
    Categoric(CategoricValues),
}

/// One row of one spreadsheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    spreadsheet_id: SpreadsheetId,
    index: usize,
    values: RowValues,
}

impl Row {
    pub fn numeric(spreadsheet_id: SpreadsheetId, index: usize, values: Vec<Option<f64>>) -> Self {
        Self {
            spreadsheet_id,
            index,
            values: RowValues::Numeric(NumericValues::new(values)),
        }
    }

    pub fn categoric(
        spreadsheet_id: SpreadsheetId,
        index: usize,
        values: Vec<Option<String>>,
    ) -> Self {
        let values = values
            .into_iter()
            .map(|v| v.filter(|s| !is_missing_token(s)))
            .collect();
        Self {
            spreadsheet_id,
            index,
            values: RowValues::Categoric(CategoricValues::new(values)),
        }
    }

    /// Build a row from raw JSON values as delivered by the server.
    ///
    /// `Other` rows are kept as strings, like categoric rows.
    pub fn from_raw(
        spreadsheet_id: SpreadsheetId,
        index: usize,
        row_type: RowType,
        raw: &[Value],
    ) -> Self {
        match row_type {
            RowType::Numeric => Self::numeric(
                spreadsheet_id,
                index,
                raw.iter().map(numeric_from_json).collect(),
            ),
            RowType::Categoric | RowType::Other => Self::categoric(
                spreadsheet_id,
                index,
                raw.iter().map(category_from_json).collect(),
            ),
        }
    }

    pub fn spreadsheet_id(&self) -> SpreadsheetId {
        self.spreadsheet_id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// `(spreadsheet_id, index)`, the row's identity.
    pub fn row_ref(&self) -> (SpreadsheetId, usize) {
        (self.spreadsheet_id, self.index)
    }

    pub fn values(&self) -> &RowValues {
        &self.values
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.values, RowValues::Numeric(_))
    }

    pub fn value_count(&self) -> usize {
        match &self.values {
            RowValues::Numeric(n) => n.values.len(),
            RowValues::Categoric(c) => c.values.len(),
        }
    }

    pub fn as_numeric(&self) -> Option<&NumericValues> {
        match &self.values {
            RowValues::Numeric(n) => Some(n),
            RowValues::Categoric(_) => None,
        }
    }

    pub fn as_categoric(&self) -> Option<&CategoricValues> {
        match &self.values {
            RowValues::Categoric(c) => Some(c),
            RowValues::Numeric(_) => None,
        }
    }

    /// Numeric value at a sample position of the owning spreadsheet.
    pub fn numeric_value(&self, sample: usize) -> Option<f64> {
        self.as_numeric()
            .and_then(|n| n.values.get(sample).copied().flatten())
    }

    /// Categoric value at a sample position of the owning spreadsheet.
    pub fn category_value(&self, sample: usize) -> Option<&str> {
        self.as_categoric()
            .and_then(|c| c.values.get(sample))
            .and_then(|v| v.as_deref())
    }

    /// Rank of the sample's category among the distinct values.
    pub fn category_rank(&self, sample: usize) -> Option<usize> {
        let categoric = self.as_categoric()?;
        let value = categoric.values.get(sample)?.as_deref()?;
        categoric.rank_of(value)
    }

    pub fn name<'a>(&self, sheet: &'a Spreadsheet) -> Option<&'a str> {
        self.lookup(sheet)
            .and_then(|s| s.row_names().get(self.index))
            .map(String::as_str)
    }

    pub fn row_type(&self, sheet: &Spreadsheet) -> Option<RowType> {
        self.lookup(sheet)
            .and_then(|s| s.row_types().get(self.index).copied())
    }

    pub fn variance(&self, sheet: &Spreadsheet) -> Option<f64> {
        self.lookup(sheet)
            .and_then(|s| s.variances())
            .and_then(|v| v.get(self.index).copied())
    }

    pub fn correlation(&self, sheet: &Spreadsheet) -> Option<f64> {
        self.lookup(sheet)
            .and_then(|s| s.correlations())
            .and_then(|c| c.get(self.index).copied())
    }

    fn lookup<'a>(&self, sheet: &'a Spreadsheet) -> Option<&'a Spreadsheet> {
        (sheet.id() == self.spreadsheet_id).then_some(sheet)
    }
}

/// Tokens the server uses for a missing cell.
pub fn is_missing_token(s: &str) -> bool {
    let t = s.trim();
    t.is_empty()
        || t.eq_ignore_ascii_case("na")
        || t.eq_ignore_ascii_case("nan")
}

fn numeric_from_json(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|x| x.is_finite()),
        Value::String(s) if !is_missing_token(s) => {
            s.trim().parse::<f64>().ok().filter(|x| x.is_finite())
        }
        _ => None,
    }
}

fn category_from_json(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !is_missing_token(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
