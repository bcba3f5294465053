//! Request-driven state machine behind `StateService`.
//!
//! The engine owns the spreadsheets of one job session together with
//! everything learned about them so far: cached rows, variance and
//! correlation scores, survival p-values. Each request is diffed against the
//! last one processed and only the work the differences call for is done.
//!
//! Processing is transactional. A request mutates a working copy of the
//! spreadsheet set and the copy is committed only when every fetch
//! succeeded, so a failed request leaves the previous state untouched.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rayon::prelude::*;
use ssv_client::{ClientError, DataSource, RowRecord, ScoreRecord, SurvivalQuery};
use ssv_core::{JobId, SELF_CORRELATION_SCORE, Spreadsheet, SpreadsheetId, pvalue_to_score};
use ssv_state::{
    PValueResult, RowRef, StateRequest, StateSnapshot, SurvivalRequest, effective_score_type,
    rank_rows,
};
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::diff::RequestDelta;
use crate::error::{AppError, AppResult};

/// Result of processing one request.
#[derive(Debug)]
pub enum EngineOutcome {
    Snapshot(StateSnapshot),
    /// The request ended the session; no state is published until the next bootstrap.
    Ended,
}

pub struct SessionEngine {
    source: Arc<dyn DataSource>,
    config: ServiceConfig,
    job_id: Option<JobId>,
    spreadsheets: Vec<Spreadsheet>,
    last_processed: Option<StateRequest>,
    touched: HashSet<SpreadsheetId>,
    pvalue_cache: HashMap<RowRef, f64>,
    pvalue_context: Option<SurvivalRequest>,
    ended: bool,
}

impl SessionEngine {
    pub fn new(source: Arc<dyn DataSource>, config: ServiceConfig) -> Self {
        Self {
            source,
            config,
            job_id: None,
            spreadsheets: Vec::new(),
            last_processed: None,
            touched: HashSet::new(),
            pvalue_cache: HashMap::new(),
            pvalue_context: None,
            ended: false,
        }
    }

    pub fn job_id(&self) -> Option<JobId> {
        self.job_id
    }

    pub fn spreadsheets(&self) -> &[Spreadsheet] {
        &self.spreadsheets
    }

    /// The request the current state was built from.
    pub fn last_request(&self) -> Option<&StateRequest> {
        self.last_processed.as_ref()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Start a session for `job_id`: load spreadsheet metadata and variances.
    ///
    /// Discards everything learned in a previous session.
    pub fn bootstrap(&mut self, job_id: JobId) -> AppResult<StateSnapshot> {
        info!(job = %job_id, "bootstrapping session");
        let ids = self.source.spreadsheet_ids_for_job(job_id)?;
        let sheets = if ids.is_empty() {
            warn!(job = %job_id, "job has no spreadsheets");
            Vec::new()
        } else {
            self.load_spreadsheets(&ids)?
        };

        self.job_id = Some(job_id);
        self.spreadsheets = sheets;
        self.last_processed = None;
        self.touched.clear();
        self.pvalue_cache.clear();
        self.pvalue_context = None;
        self.ended = false;

        info!(
            job = %job_id,
            spreadsheets = self.spreadsheets.len(),
            "session ready"
        );
        Ok(StateSnapshot::bootstrap(self.spreadsheets.clone()))
    }

    /// Bring the session state in line with `request`.
    pub fn process(&mut self, request: &StateRequest) -> AppResult<EngineOutcome> {
        if self.ended {
            return Err(AppError::SessionEnded);
        }
        if request.end_of_session {
            info!(job = ?self.job_id, "session ended");
            self.ended = true;
            return Ok(EngineOutcome::Ended);
        }
        if self.job_id.is_none() {
            return Err(AppError::InvalidInput(
                "no session has been bootstrapped".to_string(),
            ));
        }

        let ids: Vec<SpreadsheetId> = self.spreadsheets.iter().map(Spreadsheet::id).collect();
        warn_foreign_rows(request, &ids);
        let delta = RequestDelta::between(self.last_processed.as_ref(), request, &ids, &self.touched);
        if delta.is_empty() {
            debug!("request unchanged, reusing cached state");
        }

        let mut working = self.spreadsheets.clone();
        if delta.grouping_changed {
            self.update_correlations(&mut working, request.grouping)?;
        }
        let context_changed = delta.context_changed();
        let to_update: HashSet<SpreadsheetId> = delta.sheets_to_update().collect();
        for sheet in working.iter_mut() {
            if !to_update.contains(&sheet.id()) {
                debug!(spreadsheet = %sheet.id(), "spreadsheet unchanged");
                continue;
            }
            debug!(
                spreadsheet = %sheet.id(),
                context_changed,
                triggers = ?delta.sheet(sheet.id()),
                "updating spreadsheet"
            );
            self.update_sheet(sheet, request)?;
        }
        let (pvalues, pvalue_cache) = self.resolve_pvalues(request, &ids)?;

        self.touched.extend(ids);
        self.spreadsheets = working;
        self.last_processed = Some(request.clone());
        self.pvalue_cache = pvalue_cache;
        self.pvalue_context = request.survival.clone();

        Ok(EngineOutcome::Snapshot(StateSnapshot::new(
            self.spreadsheets.clone(),
            request.clone(),
            pvalues,
        )))
    }

    fn load_spreadsheets(&self, ids: &[SpreadsheetId]) -> AppResult<Vec<Spreadsheet>> {
        let records = self.source.spreadsheets(ids)?;
        let mut sheets: Vec<Spreadsheet> = Vec::with_capacity(ids.len());
        for record in records {
            let id = record.id;
            if !ids.contains(&id) {
                warn!(spreadsheet = %id, "metadata returned for a spreadsheet that was not requested");
                continue;
            }
            if sheets.iter().any(|s| s.id() == id) {
                warn!(spreadsheet = %id, "duplicate spreadsheet metadata ignored");
                continue;
            }
            match Spreadsheet::new(record.into_meta()) {
                Ok(sheet) => sheets.push(sheet),
                Err(e) => warn!(spreadsheet = %id, error = %e, "skipping malformed spreadsheet metadata"),
            }
        }
        for id in ids.iter().filter(|id| !sheets.iter().any(|s| s.id() == **id)) {
            warn!(spreadsheet = %id, "no usable metadata returned");
        }
        // keep the job's spreadsheet order
        sheets.sort_by_key(|s| ids.iter().position(|id| *id == s.id()));

        let loaded: Vec<SpreadsheetId> = sheets.iter().map(Spreadsheet::id).collect();
        if loaded.is_empty() {
            return Ok(sheets);
        }
        for record in self.source.variances(&loaded)? {
            let id = record.spreadsheet_id;
            let Some(sheet) = sheets.iter_mut().find(|s| s.id() == id) else {
                warn!(spreadsheet = %id, "variances returned for an unknown spreadsheet");
                continue;
            };
            if let Err(e) = sheet.set_variances(record.dense()) {
                warn!(spreadsheet = %id, error = %e, "ignoring malformed variances");
            }
        }
        Ok(sheets)
    }

    /// One batched call for every spreadsheet, or a local reset when grouping was removed.
    fn update_correlations(
        &self,
        working: &mut [Spreadsheet],
        grouping: Option<RowRef>,
    ) -> AppResult<()> {
        let Some(group) = grouping else {
            debug!("grouping removed, clearing correlation scores");
            working.iter_mut().for_each(Spreadsheet::clear_correlations);
            return Ok(());
        };
        if working.is_empty() {
            return Ok(());
        }

        let ids: Vec<SpreadsheetId> = working.iter().map(Spreadsheet::id).collect();
        let records = self.source.correlations(&ids, group)?;
        let mut updated = HashSet::new();
        for record in records {
            let id = record.spreadsheet_id;
            let Some(sheet) = working.iter_mut().find(|s| s.id() == id) else {
                warn!(spreadsheet = %id, "correlations returned for an unknown spreadsheet");
                continue;
            };
            match sheet.set_correlations(self.correlation_scores(&record, group)) {
                Ok(()) => {
                    updated.insert(id);
                }
                Err(e) => warn!(spreadsheet = %id, error = %e, "ignoring malformed correlations"),
            }
        }
        for sheet in working.iter_mut().filter(|s| !updated.contains(&s.id())) {
            sheet.clear_correlations();
        }
        debug!(group = %group, spreadsheets = updated.len(), "correlation scores updated");
        Ok(())
    }

    fn correlation_scores(&self, record: &ScoreRecord, group: RowRef) -> Vec<f64> {
        let cap = self.config.correlation_score_cap;
        let mut scores: Vec<f64> = record
            .dense()
            .into_iter()
            .map(|p| pvalue_to_score(p, cap))
            .collect();
        if record.spreadsheet_id == group.spreadsheet_id
            && let Some(own) = scores.get_mut(group.row_idx)
        {
            *own = SELF_CORRELATION_SCORE;
        }
        scores
    }

    /// Re-rank the heatmap rows of `sheet` and fetch whatever the cache lacks.
    fn update_sheet(&self, sheet: &mut Spreadsheet, request: &StateRequest) -> AppResult<()> {
        let id = sheet.id();
        let heatmap = match request.main_request(id) {
            Some(main) if sheet.is_heatmap_eligible() => {
                for requested in [main.filter_type, main.sort_type] {
                    if effective_score_type(sheet, requested) != requested {
                        debug!(
                            spreadsheet = %id,
                            score = %requested,
                            "scores unavailable, falling back to original order"
                        );
                    }
                }
                rank_rows(sheet, main.filter_type, main.filter_limit, main.sort_type)
            }
            Some(_) => {
                debug!(spreadsheet = %id, "spreadsheet cannot feed the heatmap");
                Vec::new()
            }
            None => Vec::new(),
        };

        let mut required = heatmap.clone();
        for idx in request.referenced_rows_for(id) {
            if idx < sheet.row_count() {
                required.push(idx);
            } else {
                warn!(spreadsheet = %id, row = idx, rows = sheet.row_count(), "requested row out of range");
            }
        }

        let missing = sheet.missing_rows(&required);
        if missing.is_empty() {
            debug!(spreadsheet = %id, "all required rows cached");
        } else {
            let records = self.fetch_rows(id, &missing)?;
            cache_rows(sheet, &missing, records)?;
        }
        sheet.set_filtered_and_sorted_rows(heatmap);
        Ok(())
    }

    /// Sequential fetches of at most `row_batch_size` indices each.
    fn fetch_rows(&self, sheet: SpreadsheetId, indices: &[usize]) -> AppResult<Vec<RowRecord>> {
        let mut records = Vec::with_capacity(indices.len());
        for chunk in indices.chunks(self.config.row_batch_size.max(1)) {
            debug!(spreadsheet = %sheet, count = chunk.len(), "fetching rows");
            records.extend(self.source.rows(sheet, chunk)?);
        }
        Ok(records)
    }

    /// P-values for `request.pvalue_rows`, plus the cache to commit.
    ///
    /// Cached values are reused while the survival context stays the same.
    /// The rest are fetched in parallel, one call per row. A malformed answer
    /// drops only that row; any other error fails the request.
    fn resolve_pvalues(
        &self,
        request: &StateRequest,
        ids: &[SpreadsheetId],
    ) -> AppResult<(Vec<PValueResult>, HashMap<RowRef, f64>)> {
        let Some(survival) = &request.survival else {
            if !request.pvalue_rows.is_empty() {
                warn!(
                    rows = request.pvalue_rows.len(),
                    "p-values requested without a survival context"
                );
            }
            return Ok((Vec::new(), HashMap::new()));
        };

        let mut cache = if self.pvalue_context.as_ref() == Some(survival) {
            self.pvalue_cache.clone()
        } else {
            HashMap::new()
        };

        let to_fetch: Vec<RowRef> = request
            .pvalue_rows
            .iter()
            .copied()
            .filter(|row| ids.contains(&row.spreadsheet_id) && !cache.contains_key(row))
            .collect();
        if to_fetch.is_empty() {
            debug!("p-values served from cache");
        } else {
            debug!(count = to_fetch.len(), "fetching survival p-values");
            let source = &self.source;
            let fetched = to_fetch
                .par_iter()
                .map(|row| {
                    let query = SurvivalQuery {
                        duration: survival.time_row,
                        group: *row,
                        event: survival.event_row,
                        event_value: survival.event_value.clone(),
                    };
                    (*row, source.survival_pvalue(&query))
                })
                .collect::<Vec<_>>();
            for (row, result) in fetched {
                match result {
                    Ok(pvalue) => {
                        cache.insert(row, pvalue);
                    }
                    Err(ClientError::Malformed(msg)) => {
                        warn!(row = %row, error = %msg, "skipping malformed survival p-value");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        // rows dropped from the request leave the cache
        cache.retain(|row, _| request.pvalue_rows.contains(row));

        let pvalues = request
            .pvalue_rows
            .iter()
            .filter_map(|row| {
                cache.get(row).map(|pvalue| PValueResult {
                    row: *row,
                    pvalue: *pvalue,
                })
            })
            .collect();
        Ok((pvalues, cache))
    }
}

/// Validate fetched rows against what was asked for and add them to the cache.
fn cache_rows(
    sheet: &mut Spreadsheet,
    requested: &[usize],
    records: Vec<RowRecord>,
) -> AppResult<()> {
    let id = sheet.id();
    let samples = sheet.sample_count();
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        if requested.binary_search(&record.row_idx).is_err() {
            warn!(spreadsheet = %id, row = record.row_idx, "server returned a row that was not requested");
            continue;
        }
        if record.values.len() != samples {
            warn!(
                spreadsheet = %id,
                row = record.row_idx,
                values = record.values.len(),
                samples,
                "row value count does not match sample count"
            );
            continue;
        }
        let row_type = sheet.row_type(record.row_idx)?;
        rows.push(record.into_row(id, row_type));
    }

    let inserted = sheet.insert_rows(rows)?;
    if inserted < requested.len() {
        warn!(
            spreadsheet = %id,
            requested = requested.len(),
            inserted,
            "some requested rows were not returned"
        );
    }
    Ok(())
}

fn warn_foreign_rows(request: &StateRequest, ids: &[SpreadsheetId]) {
    let survival_rows = request
        .survival
        .iter()
        .flat_map(|s| [s.time_row, s.event_row]);
    let rows = request
        .grouping
        .into_iter()
        .chain(request.sorting)
        .chain(request.other_rows.iter().copied())
        .chain(request.pvalue_rows.iter().copied())
        .chain(survival_rows);
    for row in rows.filter(|r| !ids.contains(&r.spreadsheet_id)) {
        warn!(row = %row, "row refers to a spreadsheet outside this session");
    }
    for main in request
        .main_spreadsheets
        .iter()
        .filter(|m| !ids.contains(&m.spreadsheet_id))
    {
        warn!(spreadsheet = %main.spreadsheet_id, "heatmap settings for a spreadsheet outside this session");
    }
}
