//! Page fetch, catalog and view properties over the public API

use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use mintview::config::Config;
use mintview::dataset::{Column, DataType, Dataset, Value};
use mintview::error::{ExplorerError, QueryError};
use mintview::view::{PageFetcher, ViewAction};
use mintview::{Explorer, FilterSelection};

fn scenario() -> Dataset {
    Dataset::from_rows(
        vec![
            Column::new("region", DataType::Text),
            Column::new("amount", DataType::Int),
        ],
        vec![
            vec!["east".into(), 10.into()],
            vec!["east".into(), 20.into()],
            vec!["west".into(), 5.into()],
            vec!["west".into(), 7.into()],
            vec!["north".into(), 1.into()],
        ],
    )
    .unwrap()
}

/// 1,000 rows across 4 regions, 10 colors and 250 sizes
fn wide() -> Dataset {
    let regions = ["east", "west", "north", "south"];
    Dataset::from_rows(
        vec![
            Column::new("region", DataType::Text),
            Column::new("color", DataType::Int),
            Column::new("size", DataType::Int),
        ],
        (0..1000i64)
            .map(|i| {
                vec![
                    Value::text(regions[(i % 4) as usize]),
                    Value::Int(i % 10),
                    Value::Int(i % 250),
                ]
            })
            .collect(),
    )
    .unwrap()
}

fn explorer(dataset: Dataset) -> Explorer {
    let explorer = Explorer::new(Config::default());
    explorer.activate(dataset);
    explorer
}

#[tokio::test]
async fn test_region_scenario() {
    let explorer = explorer(scenario());
    let page = assert_ok!(
        explorer
            .fetch_page(FilterSelection::new().with("region", vec!["east"]), 0, Some(10))
            .await
    );

    assert_eq!(page.filtered_rows, 2);
    assert_eq!(page.total_rows, 5);
    let amounts: Vec<&Value> = page.rows.iter().map(|r| &r[1]).collect();
    assert_eq!(amounts, vec![&Value::Int(10), &Value::Int(20)]);
}

#[tokio::test]
async fn test_adding_constraints_never_increases_count() {
    let explorer = explorer(wide());
    let selections = [
        FilterSelection::new(),
        FilterSelection::new().with("region", vec!["east", "west"]),
        FilterSelection::new().with("region", vec!["east"]),
        FilterSelection::new()
            .with("region", vec!["east"])
            .with("color", vec![0i64, 2, 4]),
        FilterSelection::new()
            .with("region", vec!["east"])
            .with("color", vec![0i64])
            .with("size", vec![0i64, 20]),
    ];

    let mut previous = u64::MAX;
    for selection in selections {
        let page = explorer.fetch_page(selection, 0, Some(1)).await.unwrap();
        assert!(page.filtered_rows <= previous);
        previous = page.filtered_rows;
    }
    assert!(previous > 0);
}

#[tokio::test]
async fn test_full_page_returns_every_match() {
    let explorer = explorer(wide());
    let selection = FilterSelection::new()
        .with("region", vec!["north"])
        .with("color", vec![2i64, 6, 8]);

    let first = explorer.fetch_page(selection.clone(), 0, Some(1)).await.unwrap();
    let all = explorer
        .fetch_page(selection, 0, Some(first.filtered_rows as usize))
        .await
        .unwrap();

    assert!(first.filtered_rows > 0);
    assert_eq!(all.rows.len() as u64, first.filtered_rows);
    for row in &all.rows {
        assert_eq!(row[0], Value::text("north"));
        assert!(matches!(row[1], Value::Int(2 | 6 | 8)));
    }
}

#[tokio::test]
async fn test_full_page_beyond_ten_thousand_matches() {
    let rows = Dataset::from_rows(
        vec![
            Column::new("id", DataType::Int),
            Column::new("half", DataType::Int),
        ],
        (0..30_000i64).map(|i| vec![Value::Int(i), Value::Int(i % 2)]).collect(),
    )
    .unwrap();
    let explorer = explorer(rows);
    let selection = FilterSelection::new().with("half", vec![1i64]);

    let first = explorer.fetch_page(selection.clone(), 0, Some(1)).await.unwrap();
    assert_eq!(first.filtered_rows, 15_000);

    let all = explorer
        .fetch_page(selection, 0, Some(first.filtered_rows as usize))
        .await
        .unwrap();
    assert_eq!(all.rows.len(), 15_000);
    assert!(all.rows.iter().all(|r| r[1] == Value::Int(1)));
    assert_eq!(all.rows.last().unwrap()[0], Value::Int(29_999));
}

#[tokio::test]
async fn test_full_page_with_no_matches() {
    let explorer = explorer(wide());
    let selection = FilterSelection::new()
        .with("region", vec!["east"])
        .with("color", vec![1i64]);

    let first = explorer.fetch_page(selection.clone(), 0, Some(1)).await.unwrap();
    assert_eq!(first.filtered_rows, 0);

    let all = assert_ok!(
        explorer
            .fetch_page(selection, 0, Some(first.filtered_rows as usize))
            .await
    );
    assert!(all.rows.is_empty());
    assert_eq!(all.filtered_rows, 0);
    assert_eq!(all.total_rows, 1000);
}

#[tokio::test]
async fn test_identical_fetches_are_identical() {
    let explorer = explorer(wide());
    let selection = FilterSelection::new().with("color", vec![7i64]);
    let a = explorer.fetch_page(selection.clone(), 20, Some(30)).await.unwrap();
    let b = explorer.fetch_page(selection, 20, Some(30)).await.unwrap();
    assert_eq!(a.rows, b.rows);
    assert_eq!(a.filtered_rows, b.filtered_rows);
}

#[tokio::test]
async fn test_out_of_range_window_is_clamped() {
    let explorer = explorer(scenario());
    let page = explorer
        .fetch_page(FilterSelection::new(), 500, Some(10))
        .await
        .unwrap();
    assert!(page.rows.is_empty());
    assert_eq!(page.offset, 5);
    assert_eq!(page.filtered_rows, 5);
}

#[tokio::test]
async fn test_unknown_column_rejects_whole_request() {
    let explorer = explorer(scenario());
    let err = assert_err!(
        explorer
            .fetch_page(
                FilterSelection::new()
                    .with("region", vec!["east"])
                    .with("planet", vec!["mars"]),
                0,
                None,
            )
            .await
    );
    assert!(matches!(
        err,
        ExplorerError::Query(QueryError::InvalidFilterColumn { ref column }) if column == "planet"
    ));
}

#[tokio::test]
async fn test_catalog_cap_keeps_true_count() {
    let mut config = Config::default();
    config.catalog.value_cap = 5;
    let explorer = Explorer::new(config);
    explorer.activate(wide());

    let entry = explorer.list_column_values("size").await.unwrap();
    assert_eq!(entry.values.len(), 5);
    assert_eq!(entry.count, 250);
    assert!(entry.is_capped());
    assert_eq!(entry.values, vec!["0", "1", "2", "3", "4"]);
}

#[tokio::test]
async fn test_view_shows_only_last_issued_result() {
    let explorer = Arc::new(explorer(wide()));
    let mut fetcher = PageFetcher::new(Arc::clone(&explorer), 10, Duration::from_secs(5));

    fetcher.dispatch(ViewAction::SetFilters(
        FilterSelection::new().with("region", vec!["east"]),
    ));
    fetcher.dispatch(ViewAction::SetFilters(
        FilterSelection::new().with("region", vec!["west"]),
    ));
    let status = fetcher.settle().await;

    let page = status.page().unwrap();
    assert!(page.rows.iter().all(|r| r[0] == Value::text("west")));
    assert_eq!(page.offset, 0);
}
