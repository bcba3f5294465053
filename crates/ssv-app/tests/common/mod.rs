//! Shared fixture: one job with an expression sheet and a clinical sheet.
#![allow(dead_code)]

use serde_json::{Value, json};
use ssv_client::{FixtureRow, FixtureSheet, MemorySource};
use ssv_core::{JobId, RowType, ScoreType, SpreadsheetId};
use ssv_state::{MainSpreadsheetRequest, RowRef, SurvivalRequest};

pub const JOB: JobId = JobId(7);
pub const EXPR: SpreadsheetId = SpreadsheetId(1);
pub const CLIN: SpreadsheetId = SpreadsheetId(2);

/// Rows of the clinical sheet.
pub const GROUP: usize = 0;
pub const TIME: usize = 1;
pub const EVENT: usize = 2;
pub const AGE: usize = 3;

fn row(name: &str, row_type: RowType, values: Vec<Value>) -> FixtureRow {
    FixtureRow {
        name: name.to_string(),
        row_type,
        values,
    }
}

/// Expression sheet: five numeric rows, variances [0.1, 0.9, 0.5, 0.3, 0.7].
/// Clinical sheet: group [y, x, x, y], time, event, age (one missing).
/// Correlations against the group row, survival p-value 0.04 for expression row 1.
pub fn fixture() -> MemorySource {
    let samples = || vec!["a".to_string(), "b".into(), "c".into(), "d".into()];
    let expr = FixtureSheet {
        id: EXPR,
        file_id: None,
        sample_names: samples(),
        rows: (0..5)
            .map(|i| {
                let base = i as f64;
                row(
                    &format!("gene{i}"),
                    RowType::Numeric,
                    vec![json!(base), json!(base + 1.0), json!(base * 2.0), json!(0.5)],
                )
            })
            .collect(),
        variances: Some(vec![0.1, 0.9, 0.5, 0.3, 0.7]),
        is_transposed: false,
    };
    let clin = FixtureSheet {
        id: CLIN,
        file_id: None,
        sample_names: samples(),
        rows: vec![
            row("group", RowType::Categoric, vec![json!("y"), json!("x"), json!("x"), json!("y")]),
            row("time", RowType::Numeric, vec![json!(10), json!(20), json!(5), json!(8)]),
            row(
                "event",
                RowType::Categoric,
                vec![json!("dead"), json!("alive"), json!("dead"), json!("alive")],
            ),
            row("age", RowType::Numeric, vec![json!(50), json!(40), json!(60), json!(null)]),
        ],
        variances: None,
        is_transposed: false,
    };

    MemorySource::new()
        .with_sheet(expr)
        .unwrap()
        .with_sheet(clin)
        .unwrap()
        .with_job(JOB, vec![EXPR, CLIN])
        .with_correlation_pvalues(
            RowRef::new(CLIN, GROUP),
            EXPR,
            vec![0.5, 1e-5, 0.01, 1.0, 0.0],
        )
        .with_correlation_pvalues(RowRef::new(CLIN, GROUP), CLIN, vec![0.3, 0.2, 0.1, 0.9])
        .with_survival_pvalue(RowRef::new(EXPR, 1), 0.04)
}

pub fn main_request(
    filter_type: ScoreType,
    filter_limit: usize,
    sort_type: ScoreType,
) -> MainSpreadsheetRequest {
    MainSpreadsheetRequest {
        spreadsheet_id: EXPR,
        filter_type,
        filter_limit,
        sort_type,
    }
}

pub fn survival(event_value: &str) -> SurvivalRequest {
    SurvivalRequest {
        time_row: RowRef::new(CLIN, TIME),
        event_row: RowRef::new(CLIN, EVENT),
        event_value: event_value.to_string(),
    }
}
