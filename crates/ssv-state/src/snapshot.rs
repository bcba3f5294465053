//! Fully resolved, immutable visualization state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ssv_core::{Row, RowValues, Spreadsheet, SpreadsheetId};

use crate::ordering::order_samples;
use crate::request::{RowRef, StateRequest};

/// Survival p-value computed server-side for one row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PValueResult {
    pub row: RowRef,
    pub pvalue: f64,
}

#[derive(Debug, Clone)]
pub struct SurvivalRows {
    pub time_row: Arc<Row>,
    pub event_row: Arc<Row>,
}

/// Contiguous run of samples sharing one grouping value.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpan {
    /// Category (or formatted numeric value); `None` for missing.
    pub label: Option<String>,
    pub start: usize,
    pub len: usize,
}

#[derive(Debug, Clone)]
pub struct StateSnapshot {
    spreadsheets: Vec<Arc<Spreadsheet>>,
    grouping_row: Option<Arc<Row>>,
    sorting_row: Option<Arc<Row>>,
    other_rows: Vec<Arc<Row>>,
    survival_rows: Option<SurvivalRows>,
    pvalues: Vec<PValueResult>,
    request: StateRequest,
    ordered_sample_names: Vec<String>,
    generated_at: DateTime<Utc>,
}

impl StateSnapshot {
    /// Resolve `request` against the cached rows of `spreadsheets`.
    ///
    /// Computes the global sample order and gives each spreadsheet its
    /// mapping into it. Rows the caches do not hold resolve to nothing.
    pub fn new(
        mut spreadsheets: Vec<Spreadsheet>,
        request: StateRequest,
        pvalues: Vec<PValueResult>,
    ) -> Self {
        let resolve = |sheets: &[Spreadsheet], r: &RowRef| -> Option<Arc<Row>> {
            sheets
                .iter()
                .find(|s| s.id() == r.spreadsheet_id)
                .and_then(|s| s.cached_row(r.row_idx))
                .cloned()
        };

        let grouping_row = request
            .grouping
            .as_ref()
            .and_then(|r| resolve(&spreadsheets, r));
        let sorting_row = request
            .sorting
            .as_ref()
            .and_then(|r| resolve(&spreadsheets, r));
        let other_rows = request
            .other_rows
            .iter()
            .filter_map(|r| resolve(&spreadsheets, r))
            .collect();
        let survival_rows = request.survival.as_ref().and_then(|s| {
            Some(SurvivalRows {
                time_row: resolve(&spreadsheets, &s.time_row)?,
                event_row: resolve(&spreadsheets, &s.event_row)?,
            })
        });

        let ordered_sample_names =
            order_samples(&spreadsheets, grouping_row.as_deref(), sorting_row.as_deref());
        for sheet in &mut spreadsheets {
            sheet.set_sample_order(&ordered_sample_names);
        }

        Self {
            spreadsheets: spreadsheets.into_iter().map(Arc::new).collect(),
            grouping_row,
            sorting_row,
            other_rows,
            survival_rows,
            pvalues,
            request,
            ordered_sample_names,
            generated_at: Utc::now(),
        }
    }

    /// Initial snapshot: no grouping, sorting or selection.
    pub fn bootstrap(spreadsheets: Vec<Spreadsheet>) -> Self {
        Self::new(spreadsheets, StateRequest::default(), Vec::new())
    }

    pub fn spreadsheets(&self) -> &[Arc<Spreadsheet>] {
        &self.spreadsheets
    }

    pub fn spreadsheet(&self, id: SpreadsheetId) -> Option<&Arc<Spreadsheet>> {
        self.spreadsheets.iter().find(|s| s.id() == id)
    }

    pub fn grouping_row(&self) -> Option<&Arc<Row>> {
        self.grouping_row.as_ref()
    }

    pub fn sorting_row(&self) -> Option<&Arc<Row>> {
        self.sorting_row.as_ref()
    }

    pub fn other_rows(&self) -> &[Arc<Row>] {
        &self.other_rows
    }

    pub fn survival_rows(&self) -> Option<&SurvivalRows> {
        self.survival_rows.as_ref()
    }

    pub fn pvalues(&self) -> &[PValueResult] {
        &self.pvalues
    }

    pub fn pvalue_for(&self, row: RowRef) -> Option<f64> {
        self.pvalues.iter().find(|p| p.row == row).map(|p| p.pvalue)
    }

    pub fn request(&self) -> &StateRequest {
        &self.request
    }

    pub fn ordered_sample_names(&self) -> &[String] {
        &self.ordered_sample_names
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Main-heatmap rows of a spreadsheet, in display order.
    pub fn heatmap_rows(&self, id: SpreadsheetId) -> Vec<Arc<Row>> {
        self.spreadsheet(id)
            .map(|sheet| {
                sheet
                    .filtered_and_sorted_rows()
                    .iter()
                    .filter_map(|idx| sheet.cached_row(*idx).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Runs of equal grouping value over the ordered samples.
    ///
    /// Without a grouping row every sample falls into a single unlabeled span.
    pub fn group_boundaries(&self) -> Vec<GroupSpan> {
        let total = self.ordered_sample_names.len();
        let Some(group) = self.grouping_row.as_deref() else {
            return if total == 0 {
                Vec::new()
            } else {
                vec![GroupSpan {
                    label: None,
                    start: 0,
                    len: total,
                }]
            };
        };
        let sheet = self.spreadsheet(group.spreadsheet_id());

        let mut spans: Vec<GroupSpan> = Vec::new();
        for (i, name) in self.ordered_sample_names.iter().enumerate() {
            let label = sheet
                .and_then(|s| s.sample_position(name))
                .and_then(|pos| group_label(group, pos));
            match spans.last_mut() {
                Some(span) if span.label == label => span.len += 1,
                _ => spans.push(GroupSpan {
                    label,
                    start: i,
                    len: 1,
                }),
            }
        }
        spans
    }

    /// Row object for `r` from the snapshot's spreadsheets, if cached.
    pub fn row(&self, r: RowRef) -> Option<&Arc<Row>> {
        self.spreadsheet(r.spreadsheet_id)
            .and_then(|s| s.cached_row(r.row_idx))
    }

    /// Owning spreadsheet of a resolved row.
    pub fn sheet_of(&self, row: &Row) -> Option<&Spreadsheet> {
        self.spreadsheet(row.spreadsheet_id()).map(|s| s.as_ref())
    }
}

fn group_label(row: &Row, pos: usize) -> Option<String> {
    match row.values() {
        RowValues::Categoric(_) => row.category_value(pos).map(String::from),
        RowValues::Numeric(_) => row.numeric_value(pos).map(|v| v.to_string()),
    }
}
