//! Field-by-field comparison of two consecutive requests.
//!
//! The engine only does work for what a request changed. `RequestDelta`
//! makes those triggers explicit: the global ones (grouping, sorting, survival
//! context) and, per spreadsheet, the ones that force its heatmap rows and row
//! cache to be brought up to date.

use std::collections::HashSet;

use ssv_core::{ScoreType, SpreadsheetId};
use ssv_state::{MainSpreadsheetRequest, StateRequest};

/// What changed for one spreadsheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SheetDelta {
    /// No request has been processed for this spreadsheet since bootstrap.
    pub first_touch: bool,
    /// Filter type or limit changed, or the main request appeared or vanished.
    pub filter_changed: bool,
    pub sort_changed: bool,
    /// The set of rows this request references on the sheet changed.
    pub single_rows_changed: bool,
}

impl SheetDelta {
    /// Whether the sheet must be re-ranked and its missing rows fetched.
    pub fn needs_update(&self, context_changed: bool) -> bool {
        self.first_touch
            || self.filter_changed
            || self.sort_changed
            || self.single_rows_changed
            || context_changed
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestDelta {
    pub grouping_changed: bool,
    pub sorting_changed: bool,
    pub survival_context_changed: bool,
    pub sheets: Vec<(SpreadsheetId, SheetDelta)>,
}

impl RequestDelta {
    /// Diff `next` against `previous` for each of `sheet_ids`.
    ///
    /// `previous` is `None` right after bootstrap, which compares against an
    /// empty request. `touched` holds the sheets some earlier request already
    /// went through.
    pub fn between(
        previous: Option<&StateRequest>,
        next: &StateRequest,
        sheet_ids: &[SpreadsheetId],
        touched: &HashSet<SpreadsheetId>,
    ) -> Self {
        let empty = StateRequest::default();
        let prev = previous.unwrap_or(&empty);

        let sheets = sheet_ids
            .iter()
            .map(|id| {
                let before = prev.main_request(*id);
                let after = next.main_request(*id);
                let delta = SheetDelta {
                    first_touch: !touched.contains(id),
                    filter_changed: filter_key(before) != filter_key(after),
                    sort_changed: before.map(|m| m.sort_type) != after.map(|m| m.sort_type),
                    single_rows_changed: prev.referenced_rows_for(*id)
                        != next.referenced_rows_for(*id),
                };
                (*id, delta)
            })
            .collect();

        Self {
            grouping_changed: prev.grouping != next.grouping,
            sorting_changed: prev.sorting != next.sorting,
            survival_context_changed: prev.survival != next.survival,
            sheets,
        }
    }

    /// Grouping or sorting changed; every sheet's sample order is affected.
    pub fn context_changed(&self) -> bool {
        self.grouping_changed || self.sorting_changed
    }

    pub fn sheet(&self, id: SpreadsheetId) -> Option<&SheetDelta> {
        self.sheets.iter().find(|(s, _)| *s == id).map(|(_, d)| d)
    }

    /// Sheets that must be updated, in the order they were given.
    pub fn sheets_to_update(&self) -> impl Iterator<Item = SpreadsheetId> + '_ {
        let context = self.context_changed();
        self.sheets
            .iter()
            .filter(move |(_, d)| d.needs_update(context))
            .map(|(id, _)| *id)
    }

    /// Nothing changed at all.
    pub fn is_empty(&self) -> bool {
        !self.context_changed()
            && !self.survival_context_changed
            && self.sheets.iter().all(|(_, d)| !d.needs_update(false))
    }
}

fn filter_key(main: Option<&MainSpreadsheetRequest>) -> Option<(ScoreType, usize)> {
    main.map(|m| (m.filter_type, m.filter_limit))
}
