use std::io::Write;

use ssv_client::{DataSource, MemorySource};
use ssv_core::{JobId, SpreadsheetId};
use ssv_state::RowRef;

const FIXTURE: &str = r#"
jobs:
  - job_id: 1
    spreadsheets: [10]
spreadsheets:
  - id: 10
    sample_names: [a, b, c]
    rows:
      - { name: subtype, type: categoric, values: [x, x, y] }
      - { name: TP53, type: numeric, values: [1, 2, 3] }
correlations:
  - group: { spreadsheet_id: 10, row_idx: 0 }
    spreadsheet_id: 10
    pvalues: [1.0, 0.001]
survival:
  - row: { spreadsheet_id: 10, row_idx: 0 }
    pvalue: 0.03
"#;

#[test]
fn fixture_file_round_trips_through_the_source() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(FIXTURE.as_bytes()).expect("write fixture");

    let source = MemorySource::load(file.path()).expect("fixture loads");
    assert_eq!(
        source.spreadsheet_ids_for_job(JobId(1)).unwrap(),
        vec![SpreadsheetId(10)]
    );

    let corr = source
        .correlations(&[SpreadsheetId(10)], RowRef::new(SpreadsheetId(10), 0))
        .unwrap();
    assert_eq!(corr[0].scores, vec![Some(1.0), Some(0.001)]);

    let unconfigured = source
        .correlations(&[SpreadsheetId(10)], RowRef::new(SpreadsheetId(10), 1))
        .unwrap();
    assert_eq!(unconfigured[0].scores, vec![Some(1.0), Some(1.0)]);
}

#[test]
fn broken_fixture_is_reported() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(b"spreadsheets: [ { id: 1 } ]").expect("write fixture");
    assert!(MemorySource::load(file.path()).is_err());
}
