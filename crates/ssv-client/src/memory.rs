//! In-memory data source backed by a fixture.
//!
//! Serves the same records as the HTTP endpoints from spreadsheets held in
//! memory, and logs every call so callers can check which network traffic a
//! request would have caused.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ssv_core::{FileId, JobId, Row, RowType, SpreadsheetId, population_variance};
use ssv_state::RowRef;

use crate::error::{ClientError, ClientResult};
use crate::source::{DataSource, SurvivalQuery};
use crate::wire::{RowRecord, ScoreRecord, SpreadsheetRecord};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryFixture {
    #[serde(default)]
    pub jobs: Vec<FixtureJob>,
    #[serde(default)]
    pub spreadsheets: Vec<FixtureSheet>,
    #[serde(default)]
    pub correlations: Vec<FixtureCorrelation>,
    #[serde(default)]
    pub survival: Vec<FixtureSurvival>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureJob {
    pub job_id: JobId,
    pub spreadsheets: Vec<SpreadsheetId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSheet {
    pub id: SpreadsheetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<FileId>,
    pub sample_names: Vec<String>,
    pub rows: Vec<FixtureRow>,
    /// Overrides the locally computed variances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variances: Option<Vec<f64>>,
    #[serde(default)]
    pub is_transposed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureRow {
    pub name: String,
    #[serde(rename = "type")]
    pub row_type: RowType,
    pub values: Vec<Value>,
}

/// Raw correlation p-values of one spreadsheet's rows against a grouping row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureCorrelation {
    pub group: RowRef,
    pub spreadsheet_id: SpreadsheetId,
    pub pvalues: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSurvival {
    pub row: RowRef,
    pub pvalue: f64,
}

/// Record of every endpoint hit on a `MemorySource`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallLog {
    pub job_lookups: usize,
    pub metadata: usize,
    pub variances: usize,
    pub correlations: usize,
    pub row_batches: Vec<(SpreadsheetId, Vec<usize>)>,
    pub survival: Vec<RowRef>,
}

impl CallLog {
    pub fn rows_fetched(&self) -> usize {
        self.row_batches.iter().map(|(_, idx)| idx.len()).sum()
    }

    /// Every row index fetched for `sheet`, in fetch order.
    pub fn fetched_rows(&self, sheet: SpreadsheetId) -> Vec<usize> {
        self.row_batches
            .iter()
            .filter(|(s, _)| *s == sheet)
            .flat_map(|(_, idx)| idx.iter().copied())
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.job_lookups
            + self.metadata
            + self.variances
            + self.correlations
            + self.row_batches.len()
            + self.survival.len()
    }
}

pub struct MemorySource {
    jobs: HashMap<JobId, Vec<SpreadsheetId>>,
    sheets: BTreeMap<SpreadsheetId, FixtureSheet>,
    correlations: HashMap<(RowRef, SpreadsheetId), Vec<f64>>,
    survival: HashMap<RowRef, f64>,
    calls: Mutex<CallLog>,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            sheets: BTreeMap::new(),
            correlations: HashMap::new(),
            survival: HashMap::new(),
            calls: Mutex::new(CallLog::default()),
        }
    }

    /// Load a fixture from a YAML (or JSON) file.
    pub fn load(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Fixture(format!("{}: {}", path.display(), e)))?;
        let fixture: MemoryFixture = serde_yaml::from_str(&content)
            .map_err(|e| ClientError::Fixture(format!("{}: {}", path.display(), e)))?;
        Self::from_fixture(fixture)
    }

    pub fn from_fixture(fixture: MemoryFixture) -> ClientResult<Self> {
        let mut source = Self::new();
        for sheet in fixture.spreadsheets {
            source = source.with_sheet(sheet)?;
        }
        for job in fixture.jobs {
            source = source.with_job(job.job_id, job.spreadsheets);
        }
        for c in fixture.correlations {
            source = source.with_correlation_pvalues(c.group, c.spreadsheet_id, c.pvalues);
        }
        for s in fixture.survival {
            source = source.with_survival_pvalue(s.row, s.pvalue);
        }
        Ok(source)
    }

    pub fn with_job(mut self, job: JobId, sheets: Vec<SpreadsheetId>) -> Self {
        self.jobs.insert(job, sheets);
        self
    }

    pub fn with_sheet(mut self, sheet: FixtureSheet) -> ClientResult<Self> {
        let samples = sheet.sample_names.len();
        if let Some(bad) = sheet.rows.iter().find(|r| r.values.len() != samples) {
            return Err(ClientError::Fixture(format!(
                "row '{}' of spreadsheet {} has {} values for {} samples",
                bad.name,
                sheet.id,
                bad.values.len(),
                samples
            )));
        }
        if let Some(v) = &sheet.variances
            && v.len() != sheet.rows.len()
        {
            return Err(ClientError::Fixture(format!(
                "spreadsheet {} has {} variances for {} rows",
                sheet.id,
                v.len(),
                sheet.rows.len()
            )));
        }
        self.sheets.insert(sheet.id, sheet);
        Ok(self)
    }

    pub fn with_correlation_pvalues(
        mut self,
        group: RowRef,
        sheet: SpreadsheetId,
        pvalues: Vec<f64>,
    ) -> Self {
        self.correlations.insert((group, sheet), pvalues);
        self
    }

    pub fn with_survival_pvalue(mut self, row: RowRef, pvalue: f64) -> Self {
        self.survival.insert(row, pvalue);
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.lock().clone()
    }

    pub fn reset_calls(&self) {
        *self.calls.lock() = CallLog::default();
    }

    fn sheet(&self, id: SpreadsheetId) -> ClientResult<&FixtureSheet> {
        self.sheets
            .get(&id)
            .ok_or(ClientError::UnknownSpreadsheet(id))
    }
}

fn local_variances(sheet: &FixtureSheet) -> Vec<Option<f64>> {
    if let Some(v) = &sheet.variances {
        return v.iter().copied().map(Some).collect();
    }
    sheet
        .rows
        .iter()
        .enumerate()
        .map(|(idx, r)| {
            let row = Row::from_raw(sheet.id, idx, r.row_type, &r.values);
            row.as_numeric()
                .and_then(|n| population_variance(n.values()))
        })
        .collect()
}

impl DataSource for MemorySource {
    fn spreadsheet_ids_for_job(&self, job: JobId) -> ClientResult<Vec<SpreadsheetId>> {
        self.calls.lock().job_lookups += 1;
        self.jobs
            .get(&job)
            .cloned()
            .ok_or_else(|| ClientError::Http(404, format!("job {} not found", job)))
    }

    fn spreadsheets(&self, ids: &[SpreadsheetId]) -> ClientResult<Vec<SpreadsheetRecord>> {
        self.calls.lock().metadata += 1;
        ids.iter()
            .map(|id| {
                let sheet = self.sheet(*id)?;
                Ok(SpreadsheetRecord {
                    id: sheet.id,
                    file_id: sheet.file_id.unwrap_or(FileId(sheet.id.get())),
                    row_names: sheet.rows.iter().map(|r| r.name.clone()).collect(),
                    row_types: sheet.rows.iter().map(|r| r.row_type).collect(),
                    row_nan_counts: Some(
                        sheet
                            .rows
                            .iter()
                            .enumerate()
                            .map(|(idx, r)| {
                                let row = Row::from_raw(sheet.id, idx, r.row_type, &r.values);
                                missing_count(&row)
                            })
                            .collect(),
                    ),
                    sample_names: sheet.sample_names.clone(),
                    is_transposed: sheet.is_transposed,
                })
            })
            .collect()
    }

    fn variances(&self, ids: &[SpreadsheetId]) -> ClientResult<Vec<ScoreRecord>> {
        self.calls.lock().variances += 1;
        ids.iter()
            .map(|id| {
                let sheet = self.sheet(*id)?;
                Ok(ScoreRecord {
                    spreadsheet_id: sheet.id,
                    scores: local_variances(sheet),
                })
            })
            .collect()
    }

    fn correlations(
        &self,
        ids: &[SpreadsheetId],
        group: RowRef,
    ) -> ClientResult<Vec<ScoreRecord>> {
        self.calls.lock().correlations += 1;
        ids.iter()
            .map(|id| {
                let sheet = self.sheet(*id)?;
                let scores = match self.correlations.get(&(group, *id)) {
                    Some(p) => p.iter().copied().map(Some).collect(),
                    None => vec![Some(1.0); sheet.rows.len()],
                };
                Ok(ScoreRecord {
                    spreadsheet_id: *id,
                    scores,
                })
            })
            .collect()
    }

    fn rows(&self, sheet_id: SpreadsheetId, indices: &[usize]) -> ClientResult<Vec<RowRecord>> {
        self.calls
            .lock()
            .row_batches
            .push((sheet_id, indices.to_vec()));
        let sheet = self.sheet(sheet_id)?;
        indices
            .iter()
            .map(|idx| {
                let row = sheet.rows.get(*idx).ok_or_else(|| {
                    ClientError::Http(
                        400,
                        format!("row {} out of range for spreadsheet {}", idx, sheet_id),
                    )
                })?;
                Ok(RowRecord {
                    row_idx: *idx,
                    values: row.values.clone(),
                })
            })
            .collect()
    }

    fn survival_pvalue(&self, query: &SurvivalQuery) -> ClientResult<f64> {
        self.calls.lock().survival.push(query.group);
        self.sheet(query.duration.spreadsheet_id)?;
        self.sheet(query.event.spreadsheet_id)?;
        self.sheet(query.group.spreadsheet_id)?;
        Ok(self.survival.get(&query.group).copied().unwrap_or(1.0))
    }
}

fn missing_count(row: &Row) -> u64 {
    let missing = match row.values() {
        ssv_core::RowValues::Numeric(n) => n.values().iter().filter(|v| v.is_none()).count(),
        ssv_core::RowValues::Categoric(c) => c.values().iter().filter(|v| v.is_none()).count(),
    };
    missing as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> MemorySource {
        MemorySource::new()
            .with_sheet(FixtureSheet {
                id: SpreadsheetId(1),
                file_id: None,
                sample_names: vec!["a".into(), "b".into()],
                rows: vec![
                    FixtureRow {
                        name: "g".into(),
                        row_type: RowType::Numeric,
                        values: vec![json!(1.0), json!(3.0)],
                    },
                    FixtureRow {
                        name: "c".into(),
                        row_type: RowType::Categoric,
                        values: vec![json!("x"), json!(null)],
                    },
                ],
                variances: None,
                is_transposed: false,
            })
            .unwrap()
            .with_job(JobId(5), vec![SpreadsheetId(1)])
    }

    #[test]
    fn variances_are_computed_locally() {
        let src = source();
        let v = src.variances(&[SpreadsheetId(1)]).unwrap();
        assert_eq!(v[0].scores, vec![Some(1.0), None]);
    }

    #[test]
    fn metadata_counts_missing_values() {
        let src = source();
        let records = src.spreadsheets(&[SpreadsheetId(1)]).unwrap();
        assert_eq!(records[0].row_nan_counts, Some(vec![0, 1]));
        assert_eq!(records[0].file_id, FileId(1));
    }

    #[test]
    fn calls_are_logged() {
        let src = source();
        src.spreadsheet_ids_for_job(JobId(5)).unwrap();
        src.rows(SpreadsheetId(1), &[1, 0]).unwrap();
        let calls = src.calls();
        assert_eq!(calls.job_lookups, 1);
        assert_eq!(calls.fetched_rows(SpreadsheetId(1)), vec![1, 0]);
        assert_eq!(calls.total_calls(), 2);
        src.reset_calls();
        assert_eq!(src.calls(), CallLog::default());
    }

    #[test]
    fn unknown_entities_are_errors() {
        let src = source();
        assert!(src.spreadsheet_ids_for_job(JobId(9)).is_err());
        assert!(matches!(
            src.spreadsheets(&[SpreadsheetId(2)]),
            Err(ClientError::UnknownSpreadsheet(SpreadsheetId(2)))
        ));
        assert!(src.rows(SpreadsheetId(1), &[7]).is_err());
    }

    #[test]
    fn fixture_rows_must_match_samples() {
        let result = MemorySource::new().with_sheet(FixtureSheet {
            id: SpreadsheetId(1),
            file_id: None,
            sample_names: vec!["a".into()],
            rows: vec![FixtureRow {
                name: "g".into(),
                row_type: RowType::Numeric,
                values: vec![json!(1), json!(2)],
            }],
            variances: None,
            is_transposed: false,
        });
        assert!(matches!(result, Err(ClientError::Fixture(_))));
    }
}
