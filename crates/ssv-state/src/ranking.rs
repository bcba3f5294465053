//! Row selection for the main heatmap.

use ssv_core::{ScoreType, Spreadsheet, cmp_scores_desc};

/// Score type actually usable for `sheet`; unavailable arrays fall back to file order.
pub fn effective_score_type(sheet: &Spreadsheet, requested: ScoreType) -> ScoreType {
    if requested.is_available(sheet) {
        requested
    } else {
        ScoreType::Original
    }
}

/// Rank rows by `filter_type`, keep the top `filter_limit`, then order them by `sort_type`.
///
/// Both passes are descending and stable, so ties keep row-index order.
/// Sheets that cannot feed the main heatmap yield no rows.
pub fn rank_rows(
    sheet: &Spreadsheet,
    filter_type: ScoreType,
    filter_limit: usize,
    sort_type: ScoreType,
) -> Vec<usize> {
    if !sheet.is_heatmap_eligible() {
        return Vec::new();
    }

    let filter_type = effective_score_type(sheet, filter_type);
    let sort_type = effective_score_type(sheet, sort_type);
    let score = |kind: ScoreType, idx: usize| kind.score(sheet, idx).unwrap_or(f64::NAN);

    let mut rows: Vec<usize> = (0..sheet.row_count()).collect();
    rows.sort_by(|a, b| cmp_scores_desc(score(filter_type, *a), score(filter_type, *b)));
    rows.truncate(filter_limit);
    rows.sort_by(|a, b| cmp_scores_desc(score(sort_type, *a), score(sort_type, *b)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssv_core::{FileId, RowType, SpreadsheetId, SpreadsheetMeta};

    fn numeric_sheet(rows: usize) -> Spreadsheet {
        Spreadsheet::new(SpreadsheetMeta {
            id: SpreadsheetId(1),
            file_id: FileId(1),
            row_names: (0..rows).map(|i| format!("g{i}")).collect(),
            row_types: vec![RowType::Numeric; rows],
            row_nan_counts: None,
            sample_names: vec!["s".into()],
            is_transposed: false,
        })
        .unwrap()
    }

    #[test]
    fn variance_filter_keeps_top_rows() {
        let mut sheet = numeric_sheet(5);
        sheet.set_variances(vec![0.1, 0.9, 0.5, 0.3, 0.7]).unwrap();

        let by_variance = rank_rows(&sheet, ScoreType::Variance, 2, ScoreType::Variance);
        assert_eq!(by_variance, vec![1, 4]);

        let by_original = rank_rows(&sheet, ScoreType::Variance, 2, ScoreType::Original);
        assert_eq!(by_original, vec![1, 4]);
    }

    #[test]
    fn filter_and_sort_use_different_scores() {
        let mut sheet = numeric_sheet(4);
        sheet.set_variances(vec![0.4, 0.3, 0.2, 0.1]).unwrap();
        sheet.set_correlations(vec![1.0, 5.0, 9.0, 0.0]).unwrap();
        let rows = rank_rows(&sheet, ScoreType::Variance, 3, ScoreType::Correlation);
        assert_eq!(rows, vec![2, 1, 0]);
    }

    #[test]
    fn missing_correlations_fall_back_to_file_order() {
        let mut sheet = numeric_sheet(3);
        sheet.set_variances(vec![0.1, 0.2, 0.3]).unwrap();
        assert_eq!(
            effective_score_type(&sheet, ScoreType::Correlation),
            ScoreType::Original
        );
        let rows = rank_rows(&sheet, ScoreType::Correlation, 2, ScoreType::Variance);
        assert_eq!(rows, vec![1, 0]);
    }

    #[test]
    fn infinite_self_correlation_ranks_first() {
        let mut sheet = numeric_sheet(3);
        sheet
            .set_correlations(vec![12.0, f64::INFINITY, 200.0])
            .unwrap();
        let rows = rank_rows(&sheet, ScoreType::Correlation, 3, ScoreType::Correlation);
        assert_eq!(rows, vec![1, 2, 0]);
    }

    #[test]
    fn ineligible_sheet_yields_nothing() {
        let sheet = Spreadsheet::new(SpreadsheetMeta {
            id: SpreadsheetId(1),
            file_id: FileId(1),
            row_names: vec!["a".into(), "b".into()],
            row_types: vec![RowType::Numeric, RowType::Categoric],
            row_nan_counts: None,
            sample_names: vec![],
            is_transposed: false,
        })
        .unwrap();
        assert!(rank_rows(&sheet, ScoreType::Original, 10, ScoreType::Original).is_empty());
    }

    #[test]
    fn limit_larger_than_sheet() {
        let sheet = numeric_sheet(2);
        assert_eq!(
            rank_rows(&sheet, ScoreType::Original, 50, ScoreType::Original),
            vec![0, 1]
        );
    }
}
