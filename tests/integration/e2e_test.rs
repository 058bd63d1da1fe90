//! End-to-end integration tests

use crate::fixture;
use chrono::{Duration, TimeZone, Utc};
use yt_fair_value::data::ParquetWriter;
use yt_fair_value::source::{gather, SnapshotSource, TransactionFilter};
use yt_fair_value::valuation::{
    self, CurveAttachment, RowFault, ValuationError, ValuationParams, ValuationResult,
};

async fn value_fixture(params: ValuationParams) -> Result<ValuationResult, ValuationError> {
    let source = SnapshotSource::load(fixture("snapshot.json")).unwrap();
    let (start, end) = source.history_range().unwrap();
    let inputs = gather(&source, "0xyt", start, end, &TransactionFilter::default())
        .await
        .unwrap();
    valuation::run(inputs, &params)
}

#[tokio::test]
async fn test_snapshot_pipeline() {
    let result = value_fixture(ValuationParams::default()).await.unwrap();

    // 4 swaps: 1 + (2 identical -> 1) + 2 + 1 with one malformed input skipped
    assert_eq!(result.expansion.records, 4);
    assert_eq!(result.legs.len(), 5);
    assert_eq!(result.expansion.duplicates_removed, 1);
    assert_eq!(result.expansion.malformed.len(), 1);
    assert!(result
        .legs
        .windows(2)
        .all(|w| w[0].leg.timestamp <= w[1].leg.timestamp));

    // (0.05*100 + 0.15*100 + 0.10*200*2 + 0.12*0) / 600
    assert!((result.avg_implied_apy.value().unwrap() - 0.10).abs() < 1e-12);
    assert!(result.total_weighted_points.is_valid());
    assert!(result.legs.iter().all(|l| l.underlying_apy == Some(0.04)));
    assert!(result.legs.iter().all(|l| l.yt_price.is_valid()));
}

#[tokio::test]
async fn test_snapshot_curve() {
    let result = value_fixture(ValuationParams::default()).await.unwrap();
    let first_leg = Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap();

    // 2024-01-01T05:00 to 2024-01-11T00:00 is 235 hours
    assert_eq!(result.curve.len(), 236);
    assert_eq!(result.grid()[0], first_leg);
    assert_eq!(result.grid()[235], result.maturity());
    assert_eq!(result.curve.points[235].fair_value, 0.0);

    // Prices before the first leg fall outside the grid
    let gap = Some(RowFault::AlignmentGap { field: "fairValue" });
    assert!(result.prices[..5].iter().all(|p| p.fair_value.fault() == gap));
    assert!(result.prices[5..].iter().all(|p| p.fair_value.is_valid()));
    assert_eq!(
        result.prices[6].point.sample.timestamp,
        first_leg + Duration::hours(1)
    );
}

#[tokio::test]
async fn test_snapshot_positional_attachment() {
    let params = ValuationParams {
        curve_attachment: CurveAttachment::Positional,
        ..Default::default()
    };
    let result = value_fixture(params).await.unwrap();

    assert!(result.prices.iter().all(|p| p.fair_value.is_valid()));
    assert_eq!(
        result.prices[0].fair_value.value(),
        Some(result.curve.points[0].fair_value)
    );
}

#[tokio::test]
async fn test_snapshot_summary_and_export() {
    let result = value_fixture(ValuationParams::default()).await.unwrap();

    let summary = result.summary();
    assert_eq!(summary.legs, 5);
    assert_eq!(summary.curve_points, 236);
    assert!(summary.latest.is_some());
    assert!(summary.format_table().contains("YT-eETH-11JAN2024"));

    let dir = tempfile::tempdir().unwrap();
    let files = ParquetWriter::new(dir.path().to_path_buf())
        .export(&result)
        .unwrap();

    for path in [files.legs, files.prices, files.curve] {
        assert!(path.unwrap().exists());
    }
}

#[tokio::test]
async fn test_window_without_history_is_fatal() {
    let source = SnapshotSource::load(fixture("snapshot.json")).unwrap();
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let inputs = gather(
        &source,
        "0xYT",
        start,
        start + Duration::days(1),
        &TransactionFilter::default(),
    )
    .await
    .unwrap();

    assert!(matches!(
        valuation::run(inputs, &ValuationParams::default()),
        Err(ValuationError::EmptyMarketSeries)
    ));
}
