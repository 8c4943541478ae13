//! End-to-end exports through the explorer

use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use mintview::config::Config;
use mintview::dataset::{Column, DataType, Dataset, Value};
use mintview::export::{ExportState, SPREADSHEET_MAX_DATA_ROWS};
use mintview::{ExportFormat, ExportRequest, Explorer, FilterSelection};

fn counting(rows: i64) -> Dataset {
    Dataset::from_rows(
        vec![
            Column::new("id", DataType::Int),
            Column::new("parity", DataType::Text),
        ],
        (0..rows)
            .map(|i| vec![Value::Int(i), Value::text(if i % 2 == 0 { "even" } else { "odd" })])
            .collect(),
    )
    .unwrap()
}

fn explorer(rows: i64) -> Explorer {
    let explorer = Explorer::new(Config::default());
    explorer.activate(counting(rows));
    explorer
}

fn request(format: ExportFormat, filters: FilterSelection, row_limit: Option<u64>) -> ExportRequest {
    ExportRequest {
        format,
        filters,
        row_limit,
    }
}

#[tokio::test]
async fn test_filtered_delimited_export() {
    let explorer = explorer(10);
    let stream = assert_ok!(
        explorer
            .start_export(request(
                ExportFormat::Delimited,
                FilterSelection::new().with("parity", vec!["odd"]),
                None,
            ))
            .await
    );
    assert!(!stream.truncated());
    assert!(stream.filename().ends_with(".csv"));

    let mut out = Vec::new();
    let summary = stream.write_to(&mut out).await.unwrap();
    assert_eq!(summary.rows_exported, 5);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "id,parity\n1,odd\n3,odd\n5,odd\n7,odd\n9,odd\n"
    );
}

#[tokio::test]
async fn test_caller_row_limit_is_not_truncation() {
    let explorer = explorer(1000);
    let stream = explorer
        .start_export(request(ExportFormat::Delimited, FilterSelection::new(), Some(10)))
        .await
        .unwrap();
    assert!(!stream.truncated());

    let summary = stream.write_to(&mut tokio::io::sink()).await.unwrap();
    assert_eq!(summary.rows_exported, 10);
    assert!(!summary.truncated);
}

#[tokio::test]
async fn test_invalid_filter_rejects_export() {
    let explorer = explorer(10);
    assert_err!(
        explorer
            .start_export(request(
                ExportFormat::Spreadsheet,
                FilterSelection::new().with("colour", vec!["red"]),
                None,
            ))
            .await
    );
}

#[tokio::test]
async fn test_large_delimited_export_uses_fixed_batches() {
    let explorer = explorer(1_000_000);
    let batch_size = explorer.config().export.batch_size;

    let stream = explorer
        .start_export(request(ExportFormat::Delimited, FilterSelection::new(), None))
        .await
        .unwrap();
    let summary = stream.write_to(&mut tokio::io::sink()).await.unwrap();

    assert_eq!(summary.rows_exported, 1_000_000);
    assert!(!summary.truncated);
    assert!(summary.peak_batch_rows <= batch_size);
    assert_eq!(summary.batches, 1_000_000 / batch_size as u64);
}

#[tokio::test]
async fn test_peak_batch_does_not_grow_with_result_size() {
    let mut peaks = Vec::new();
    for rows in [10_000, 100_000] {
        let explorer = explorer(rows);
        let stream = explorer
            .start_export(request(ExportFormat::Delimited, FilterSelection::new(), None))
            .await
            .unwrap();
        let summary = stream.write_to(&mut tokio::io::sink()).await.unwrap();
        assert_eq!(summary.rows_exported, rows as u64);
        peaks.push(summary.peak_batch_rows);
    }
    assert_eq!(peaks[0], peaks[1]);
}

#[tokio::test]
async fn test_spreadsheet_cap_known_before_streaming() {
    let explorer = explorer(2_000_000);
    let stream = explorer
        .start_export(request(
            ExportFormat::Spreadsheet,
            FilterSelection::new(),
            Some(2_000_000),
        ))
        .await
        .unwrap();

    assert!(stream.truncated());
    assert_eq!(stream.effective_row_limit(), 1_048_575);
    assert_eq!(stream.effective_row_limit(), SPREADSHEET_MAX_DATA_ROWS);
    assert_eq!(stream.content_type(), ExportFormat::Spreadsheet.content_type());
}

#[tokio::test]
async fn test_delimited_export_has_no_cap() {
    let explorer = explorer(1_100_000);
    let stream = explorer
        .start_export(request(ExportFormat::Delimited, FilterSelection::new(), None))
        .await
        .unwrap();
    assert!(!stream.truncated());
    assert_eq!(stream.effective_row_limit(), 1_100_000);
}

#[tokio::test]
#[ignore = "writes a full-size workbook"]
async fn test_spreadsheet_cap_full_drain() {
    let explorer = explorer(2_000_000);
    let stream = explorer
        .start_export(request(
            ExportFormat::Spreadsheet,
            FilterSelection::new(),
            Some(2_000_000),
        ))
        .await
        .unwrap();

    let summary = stream.write_to(&mut tokio::io::sink()).await.unwrap();
    assert_eq!(summary.rows_exported, SPREADSHEET_MAX_DATA_ROWS);
    assert!(summary.truncated);
}

#[tokio::test]
async fn test_external_cancel_fails_export() {
    let explorer = explorer(200_000);
    let cancel = CancellationToken::new();
    let mut stream = explorer
        .start_export_with(
            request(ExportFormat::Delimited, FilterSelection::new(), None),
            cancel.clone(),
            false,
        )
        .await
        .unwrap();

    assert_ok!(stream.next_chunk().await.unwrap());
    cancel.cancel();

    let mut last = None;
    while let Some(chunk) = stream.next_chunk().await {
        assert!(last.is_none(), "chunk arrived after the cancellation error");
        if let Err(e) = chunk {
            last = Some(e);
        }
    }
    let err = last.expect("cancellation must be reported before the stream ends");
    assert!(err.is_cancelled());
    assert_eq!(stream.state(), ExportState::Failed);
}

#[tokio::test]
async fn test_failed_export_leaves_target_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keep.csv");
    std::fs::write(&path, "old contents\n").unwrap();

    let explorer = explorer(200_000);
    let cancel = CancellationToken::new();
    let stream = explorer
        .start_export_with(
            request(ExportFormat::Delimited, FilterSelection::new(), None),
            cancel.clone(),
            false,
        )
        .await
        .unwrap();
    cancel.cancel();

    assert_err!(stream.write_to_path(&path).await);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "old contents\n");
}
