//! Snapshot construction scenarios.

use ssv_core::{FileId, Row, RowType, ScoreType, Spreadsheet, SpreadsheetId, SpreadsheetMeta};
use ssv_state::{GroupSpan, RowRef, StateRequest, StateSnapshot, rank_rows};

fn mixed_sheet() -> Spreadsheet {
    let mut sheet = Spreadsheet::new(SpreadsheetMeta {
        id: SpreadsheetId(1),
        file_id: FileId(100),
        row_names: vec!["g1".into(), "g2".into()],
        row_types: vec![RowType::Categoric, RowType::Numeric],
        row_nan_counts: Some(vec![0, 0]),
        sample_names: vec!["a".into(), "b".into(), "c".into()],
        is_transposed: false,
    })
    .expect("valid metadata");
    sheet
        .insert_rows([
            Row::categoric(
                SpreadsheetId(1),
                0,
                vec![Some("y".into()), Some("x".into()), Some("x".into())],
            ),
            Row::numeric(SpreadsheetId(1), 1, vec![Some(1.0), Some(2.0), Some(3.0)]),
        ])
        .expect("rows belong to the sheet");
    sheet
}

#[test]
fn grouping_on_categoric_row_orders_x_before_y() {
    let request = StateRequest::new().with_grouping(Some(RowRef::new(SpreadsheetId(1), 0)));
    let snapshot = StateSnapshot::new(vec![mixed_sheet()], request, Vec::new());

    assert_eq!(snapshot.ordered_sample_names(), &["b", "c", "a"]);
    assert_eq!(
        snapshot.group_boundaries(),
        vec![
            GroupSpan {
                label: Some("x".into()),
                start: 0,
                len: 2
            },
            GroupSpan {
                label: Some("y".into()),
                start: 2,
                len: 1
            },
        ]
    );

    let sheet = snapshot.spreadsheet(SpreadsheetId(1)).unwrap();
    assert_eq!(sheet.sample_indices(), &[Some(1), Some(2), Some(0)]);
}

#[test]
fn sorting_descends_into_groups() {
    let request = StateRequest::new()
        .with_grouping(Some(RowRef::new(SpreadsheetId(1), 0)))
        .with_sorting(Some(RowRef::new(SpreadsheetId(1), 1)));
    let snapshot = StateSnapshot::new(vec![mixed_sheet()], request, Vec::new());
    assert_eq!(snapshot.ordered_sample_names(), &["b", "c", "a"]);
    assert_eq!(snapshot.sorting_row().unwrap().index(), 1);
}

#[test]
fn snapshots_are_stamped_when_built() {
    let before = chrono::Utc::now();
    let snapshot = StateSnapshot::bootstrap(vec![mixed_sheet()]);
    let after = chrono::Utc::now();
    assert!(before <= snapshot.generated_at() && snapshot.generated_at() <= after);
}

#[test]
fn bootstrap_has_no_selection() {
    let snapshot = StateSnapshot::bootstrap(vec![mixed_sheet()]);
    assert!(snapshot.grouping_row().is_none());
    assert!(snapshot.other_rows().is_empty());
    assert_eq!(snapshot.ordered_sample_names(), &["a", "b", "c"]);
    assert_eq!(snapshot.group_boundaries().len(), 1);
    assert_eq!(snapshot.request(), &StateRequest::default());
}

#[test]
fn unresolvable_rows_are_left_out() {
    let request = StateRequest::new()
        .with_other_row(RowRef::new(SpreadsheetId(1), 1))
        .with_other_row(RowRef::new(SpreadsheetId(7), 0));
    let snapshot = StateSnapshot::new(vec![mixed_sheet()], request, Vec::new());
    assert_eq!(snapshot.other_rows().len(), 1);
    let row = &snapshot.other_rows()[0];
    let sheet = snapshot.sheet_of(row).unwrap();
    assert_eq!(row.name(sheet), Some("g2"));
}

#[test]
fn heatmap_rows_follow_filtered_order() {
    let mut sheet = Spreadsheet::new(SpreadsheetMeta {
        id: SpreadsheetId(2),
        file_id: FileId(200),
        row_names: (0..5).map(|i| format!("gene{i}")).collect(),
        row_types: vec![RowType::Numeric; 5],
        row_nan_counts: None,
        sample_names: vec!["a".into()],
        is_transposed: false,
    })
    .unwrap();
    sheet.set_variances(vec![0.1, 0.9, 0.5, 0.3, 0.7]).unwrap();
    let selected = rank_rows(&sheet, ScoreType::Variance, 2, ScoreType::Variance);
    sheet
        .insert_rows(
            selected
                .iter()
                .map(|i| Row::numeric(SpreadsheetId(2), *i, vec![Some(*i as f64)])),
        )
        .unwrap();
    sheet.set_filtered_and_sorted_rows(selected);

    let snapshot = StateSnapshot::new(vec![sheet], StateRequest::default(), Vec::new());
    let rows: Vec<usize> = snapshot
        .heatmap_rows(SpreadsheetId(2))
        .iter()
        .map(|r| r.index())
        .collect();
    assert_eq!(rows, vec![1, 4]);
}

#[test]
fn requests_load_from_yaml() {
    let yaml = r#"
grouping: { spreadsheet_id: 1, row_idx: 0 }
main_spreadsheets:
  - spreadsheet_id: 2
    filter_type: variance
    filter_limit: 50
    sort_type: correlation
other_rows:
  - { spreadsheet_id: 1, row_idx: 3 }
"#;
    let request: StateRequest = serde_yaml::from_str(yaml).expect("valid request yaml");
    assert_eq!(request.grouping, Some(RowRef::new(SpreadsheetId(1), 0)));
    let main = request.main_request(SpreadsheetId(2)).unwrap();
    assert_eq!(main.sort_type, ScoreType::Correlation);
    assert_eq!(main.filter_limit, 50);
    assert!(!request.end_of_session);
    assert!(request.survival.is_none());
}
