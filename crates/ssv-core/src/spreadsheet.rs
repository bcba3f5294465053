//! Spreadsheets: row metadata, score arrays and the sparse row cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::ids::{FileId, SpreadsheetId};
use crate::row::{Row, RowType};

/// Metadata describing a spreadsheet as stored on the server.
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadsheetMeta {
    pub id: SpreadsheetId,
    pub file_id: FileId,
    pub row_names: Vec<String>,
    pub row_types: Vec<RowType>,
    pub row_nan_counts: Option<Vec<u64>>,
    pub sample_names: Vec<String>,
    pub is_transposed: bool,
}

/// One uploaded data file plus everything derived from it client-side.
///
/// `row_names`, `row_types` and any populated score array are parallel and
/// indexed by row index. Only the state service mutates a spreadsheet;
/// snapshots hold read-only copies.
#[derive(Debug, Clone)]
pub struct Spreadsheet {
    id: SpreadsheetId,
    file_id: FileId,
    row_names: Vec<String>,
    row_types: Vec<RowType>,
    row_nan_counts: Option<Vec<u64>>,
    sample_names: Vec<String>,
    is_transposed: bool,
    variances: Option<Vec<f64>>,
    correlations: Option<Vec<f64>>,
    row_cache: BTreeMap<usize, Arc<Row>>,
    sample_lookup: HashMap<String, usize>,
    sample_indices: Vec<Option<usize>>,
    filtered_and_sorted_rows: Vec<usize>,
}

impl Spreadsheet {
    pub fn new(meta: SpreadsheetMeta) -> CoreResult<Self> {
        let n = meta.row_names.len();
        if meta.row_types.len() != n {
            return Err(CoreError::LengthMismatch {
                what: "row_types",
                expected: n,
                actual: meta.row_types.len(),
            });
        }
        if let Some(counts) = &meta.row_nan_counts
            && counts.len() != n
        {
            return Err(CoreError::LengthMismatch {
                what: "row_nan_counts",
                expected: n,
                actual: counts.len(),
            });
        }

        let mut sample_lookup = HashMap::with_capacity(meta.sample_names.len());
        for (i, name) in meta.sample_names.iter().enumerate() {
            sample_lookup.entry(name.clone()).or_insert(i);
        }

        Ok(Self {
            id: meta.id,
            file_id: meta.file_id,
            row_names: meta.row_names,
            row_types: meta.row_types,
            row_nan_counts: meta.row_nan_counts,
            sample_names: meta.sample_names,
            is_transposed: meta.is_transposed,
            variances: None,
            correlations: None,
            row_cache: BTreeMap::new(),
            sample_lookup,
            sample_indices: Vec::new(),
            filtered_and_sorted_rows: Vec::new(),
        })
    }

    pub fn id(&self) -> SpreadsheetId {
        self.id
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn row_names(&self) -> &[String] {
        &self.row_names
    }

    pub fn row_types(&self) -> &[RowType] {
        &self.row_types
    }

    pub fn row_nan_counts(&self) -> Option<&[u64]> {
        self.row_nan_counts.as_deref()
    }

    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    pub fn is_transposed(&self) -> bool {
        self.is_transposed
    }

    pub fn row_count(&self) -> usize {
        self.row_names.len()
    }

    pub fn sample_count(&self) -> usize {
        self.sample_names.len()
    }

    pub fn variances(&self) -> Option<&[f64]> {
        self.variances.as_deref()
    }

    pub fn correlations(&self) -> Option<&[f64]> {
        self.correlations.as_deref()
    }

    pub fn set_variances(&mut self, scores: Vec<f64>) -> CoreResult<()> {
        self.check_score_len("variances", &scores)?;
        self.variances = Some(scores);
        Ok(())
    }

    pub fn set_correlations(&mut self, scores: Vec<f64>) -> CoreResult<()> {
        self.check_score_len("correlations", &scores)?;
        self.correlations = Some(scores);
        Ok(())
    }

    pub fn clear_correlations(&mut self) {
        self.correlations = None;
    }

    /// A spreadsheet can feed the main heatmap only when every row is numeric.
    pub fn is_heatmap_eligible(&self) -> bool {
        !self.row_types.is_empty() && self.row_types.iter().all(|t| *t == RowType::Numeric)
    }

    pub fn row_type(&self, idx: usize) -> CoreResult<RowType> {
        self.row_types
            .get(idx)
            .copied()
            .ok_or(CoreError::IndexOob {
                what: "row index",
                index: idx,
                len: self.row_types.len(),
            })
    }

    pub fn find_row(&self, name: &str) -> Option<usize> {
        self.row_names.iter().position(|n| n == name)
    }

    pub fn cached_row(&self, idx: usize) -> Option<&Arc<Row>> {
        self.row_cache.get(&idx)
    }

    pub fn cached_row_count(&self) -> usize {
        self.row_cache.len()
    }

    /// Indices from `wanted` not yet in the cache, sorted and de-duplicated.
    pub fn missing_rows(&self, wanted: &[usize]) -> Vec<usize> {
        let mut missing: Vec<usize> = wanted
            .iter()
            .copied()
            .filter(|idx| !self.row_cache.contains_key(idx))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }

    /// Add fetched rows to the cache. Rows already cached are kept as-is.
    ///
    /// Returns the number of rows actually inserted.
    pub fn insert_rows<I>(&mut self, rows: I) -> CoreResult<usize>
    where
        I: IntoIterator<Item = Row>,
    {
        let mut inserted = 0;
        for row in rows {
            if row.spreadsheet_id() != self.id {
                return Err(CoreError::InvalidArg {
                    what: "row belongs to another spreadsheet",
                });
            }
            if row.index() >= self.row_count() {
                return Err(CoreError::IndexOob {
                    what: "row index",
                    index: row.index(),
                    len: self.row_count(),
                });
            }
            if let std::collections::btree_map::Entry::Vacant(slot) =
                self.row_cache.entry(row.index())
            {
                slot.insert(Arc::new(row));
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Position of a sample within this spreadsheet's stored sample order.
    pub fn sample_position(&self, name: &str) -> Option<usize> {
        self.sample_lookup.get(name).copied()
    }

    /// Map every position of the global sample order onto this spreadsheet.
    pub fn set_sample_order(&mut self, ordered_names: &[String]) {
        self.sample_indices = ordered_names
            .iter()
            .map(|name| self.sample_lookup.get(name).copied())
            .collect();
    }

    /// Global sample position -> index into `sample_names`, `None` where absent.
    pub fn sample_indices(&self) -> &[Option<usize>] {
        &self.sample_indices
    }

    pub fn filtered_and_sorted_rows(&self) -> &[usize] {
        &self.filtered_and_sorted_rows
    }

    pub fn set_filtered_and_sorted_rows(&mut self, rows: Vec<usize>) {
        self.filtered_and_sorted_rows = rows;
    }

    fn check_score_len(&self, what: &'static str, scores: &[f64]) -> CoreResult<()> {
        if scores.len() != self.row_count() {
            return Err(CoreError::LengthMismatch {
                what,
                expected: self.row_count(),
                actual: scores.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(types: Vec<RowType>) -> SpreadsheetMeta {
        SpreadsheetMeta {
            id: SpreadsheetId(1),
            file_id: FileId(10),
            row_names: (0..types.len()).map(|i| format!("g{i}")).collect(),
            row_types: types,
            row_nan_counts: None,
            sample_names: vec!["s1".into(), "s2".into(), "s3".into()],
            is_transposed: false,
        }
    }

    #[test]
    fn rejects_mismatched_types() {
        let mut m = meta(vec![RowType::Numeric]);
        m.row_names.push("extra".into());
        let err = Spreadsheet::new(m).unwrap_err();
        assert!(matches!(err, CoreError::LengthMismatch { what: "row_types", .. }));
    }

    #[test]
    fn score_arrays_must_match_row_count() {
        let mut sheet = Spreadsheet::new(meta(vec![RowType::Numeric; 2])).unwrap();
        assert!(sheet.set_variances(vec![1.0]).is_err());
        sheet.set_variances(vec![1.0, 2.0]).unwrap();
        assert_eq!(sheet.variances(), Some(&[1.0, 2.0][..]));
    }

    #[test]
    fn eligibility_requires_all_numeric() {
        let numeric = Spreadsheet::new(meta(vec![RowType::Numeric; 3])).unwrap();
        assert!(numeric.is_heatmap_eligible());
        let mixed = Spreadsheet::new(meta(vec![RowType::Numeric, RowType::Categoric])).unwrap();
        assert!(!mixed.is_heatmap_eligible());
        let empty = Spreadsheet::new(meta(vec![])).unwrap();
        assert!(!empty.is_heatmap_eligible());
    }

    #[test]
    fn cache_never_replaces_rows() {
        let mut sheet = Spreadsheet::new(meta(vec![RowType::Numeric; 3])).unwrap();
        let first = Row::numeric(SpreadsheetId(1), 1, vec![Some(1.0)]);
        let second = Row::numeric(SpreadsheetId(1), 1, vec![Some(2.0)]);
        assert_eq!(sheet.insert_rows([first]).unwrap(), 1);
        assert_eq!(sheet.insert_rows([second]).unwrap(), 0);
        assert_eq!(sheet.cached_row(1).unwrap().numeric_value(0), Some(1.0));
        assert_eq!(sheet.missing_rows(&[2, 1, 0, 2]), vec![0, 2]);
    }

    #[test]
    fn cache_rejects_foreign_rows() {
        let mut sheet = Spreadsheet::new(meta(vec![RowType::Numeric; 1])).unwrap();
        let foreign = Row::numeric(SpreadsheetId(2), 0, vec![]);
        assert!(sheet.insert_rows([foreign]).is_err());
        let oob = Row::numeric(SpreadsheetId(1), 5, vec![]);
        assert!(sheet.insert_rows([oob]).is_err());
    }

    #[test]
    fn sample_order_maps_absent_samples_to_none() {
        let mut sheet = Spreadsheet::new(meta(vec![RowType::Numeric])).unwrap();
        let order = vec!["s3".to_string(), "other".to_string(), "s1".to_string()];
        sheet.set_sample_order(&order);
        assert_eq!(sheet.sample_indices(), &[Some(2), None, Some(0)]);
    }

    #[test]
    fn derived_row_lookups() {
        let mut sheet = Spreadsheet::new(meta(vec![RowType::Numeric; 2])).unwrap();
        sheet.set_variances(vec![0.5, 0.25]).unwrap();
        let row = Row::numeric(SpreadsheetId(1), 1, vec![Some(1.0)]);
        assert_eq!(row.name(&sheet), Some("g1"));
        assert_eq!(row.row_type(&sheet), Some(RowType::Numeric));
        assert_eq!(row.variance(&sheet), Some(0.25));
        assert_eq!(row.correlation(&sheet), None);
    }
}
