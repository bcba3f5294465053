//! Global sample ordering across every spreadsheet of a snapshot.
//!
//! Samples are grouped by the grouping row's value and, within a group,
//! ordered by the sorting row's value. Missing values sort last at both
//! levels, and ties keep the order in which samples were first seen.

use std::cmp::Ordering;
use std::collections::HashSet;

use ssv_core::{Row, RowValues, Spreadsheet};

/// Union of sample names in first-seen order (spreadsheet order, then sample order).
pub fn sample_union<'a, I>(sheets: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Spreadsheet>,
{
    let mut seen = HashSet::new();
    let mut union = Vec::new();
    for sheet in sheets {
        for name in sheet.sample_names() {
            if seen.insert(name.as_str()) {
                union.push(name.clone());
            }
        }
    }
    union
}

/// Order every sample name across `sheets` by grouping value, then sorting value.
pub fn order_samples(
    sheets: &[Spreadsheet],
    grouping: Option<&Row>,
    sorting: Option<&Row>,
) -> Vec<String> {
    let union = sample_union(sheets);
    if grouping.is_none() && sorting.is_none() {
        return union;
    }

    let group_sheet = grouping.and_then(|row| owning_sheet(sheets, row));
    let sort_sheet = sorting.and_then(|row| owning_sheet(sheets, row));

    let mut keyed: Vec<(Option<f64>, Option<f64>, String)> = union
        .into_iter()
        .map(|name| {
            let group_key = grouping
                .zip(group_sheet)
                .and_then(|(row, sheet)| sample_key(row, sheet, &name));
            let sort_key = sorting
                .zip(sort_sheet)
                .and_then(|(row, sheet)| sample_key(row, sheet, &name));
            (group_key, sort_key, name)
        })
        .collect();

    // stable: ties keep first-seen order
    keyed.sort_by(|a, b| cmp_missing_last(a.0, b.0).then_with(|| cmp_missing_last(a.1, b.1)));
    keyed.into_iter().map(|(_, _, name)| name).collect()
}

/// Sort key of one sample for `row`: numeric value, or category rank.
pub(crate) fn sample_key(row: &Row, sheet: &Spreadsheet, sample: &str) -> Option<f64> {
    let pos = sheet.sample_position(sample)?;
    match row.values() {
        RowValues::Numeric(_) => row.numeric_value(pos),
        RowValues::Categoric(_) => row.category_rank(pos).map(|r| r as f64),
    }
}

fn owning_sheet<'a>(sheets: &'a [Spreadsheet], row: &Row) -> Option<&'a Spreadsheet> {
    sheets.iter().find(|s| s.id() == row.spreadsheet_id())
}

fn cmp_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssv_core::{FileId, RowType, SpreadsheetId, SpreadsheetMeta};

    fn sheet(id: u64, samples: &[&str], types: Vec<RowType>) -> Spreadsheet {
        Spreadsheet::new(SpreadsheetMeta {
            id: SpreadsheetId(id),
            file_id: FileId(id),
            row_names: (0..types.len()).map(|i| format!("r{i}")).collect(),
            row_types: types,
            row_nan_counts: None,
            sample_names: samples.iter().map(|s| s.to_string()).collect(),
            is_transposed: false,
        })
        .unwrap()
    }

    fn cat(id: u64, idx: usize, values: &[Option<&str>]) -> Row {
        Row::categoric(
            SpreadsheetId(id),
            idx,
            values.iter().map(|v| v.map(String::from)).collect(),
        )
    }

    #[test]
    fn no_grouping_or_sorting_keeps_union_order() {
        let sheets = vec![
            sheet(1, &["a", "b"], vec![RowType::Numeric]),
            sheet(2, &["c", "a"], vec![RowType::Numeric]),
        ];
        assert_eq!(order_samples(&sheets, None, None), vec!["a", "b", "c"]);
    }

    #[test]
    fn grouping_puts_categories_in_order() {
        let sheets = vec![sheet(
            1,
            &["s1", "s2", "s3"],
            vec![RowType::Categoric, RowType::Numeric],
        )];
        let group = cat(1, 0, &[Some("y"), Some("x"), Some("x")]);
        assert_eq!(
            order_samples(&sheets, Some(&group), None),
            vec!["s2", "s3", "s1"]
        );
    }

    #[test]
    fn missing_group_and_absent_samples_go_last() {
        let sheets = vec![
            sheet(1, &["s1", "s2", "s3"], vec![RowType::Categoric]),
            sheet(2, &["s4"], vec![RowType::Numeric]),
        ];
        let group = cat(1, 0, &[None, Some("x"), Some("y")]);
        assert_eq!(
            order_samples(&sheets, Some(&group), None),
            vec!["s2", "s3", "s1", "s4"]
        );
    }

    #[test]
    fn sorting_within_groups_with_missing_last() {
        let sheets = vec![
            sheet(1, &["s1", "s2", "s3", "s4"], vec![RowType::Categoric]),
            sheet(2, &["s4", "s3", "s2", "s1"], vec![RowType::Numeric]),
        ];
        let group = cat(1, 0, &[Some("x"), Some("y"), Some("x"), Some("y")]);
        // sheet 2 order: s4, s3, s2, s1
        let sort = Row::numeric(SpreadsheetId(2), 0, vec![Some(1.0), None, Some(3.0), Some(2.0)]);
        assert_eq!(
            order_samples(&sheets, Some(&group), Some(&sort)),
            vec!["s1", "s3", "s4", "s2"]
        );
    }

    #[test]
    fn numeric_grouping_orders_by_value() {
        let sheets = vec![sheet(1, &["a", "b", "c"], vec![RowType::Numeric])];
        let group = Row::numeric(SpreadsheetId(1), 0, vec![Some(3.0), Some(1.0), Some(2.0)]);
        assert_eq!(order_samples(&sheets, Some(&group), None), vec!["b", "c", "a"]);
    }

    #[test]
    fn grouping_row_from_unknown_sheet_leaves_everything_missing() {
        let sheets = vec![sheet(1, &["a", "b"], vec![RowType::Categoric])];
        let group = cat(9, 0, &[Some("z"), Some("a")]);
        assert_eq!(order_samples(&sheets, Some(&group), None), vec!["a", "b"]);
    }
}
