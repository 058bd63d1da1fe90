//! Snapshot source integration tests

use crate::fixture;
use yt_fair_value::source::{
    AssetResolver, MarketDataSource, SnapshotSource, SourceError, TransactionFilter,
};

#[tokio::test]
async fn test_snapshot_fixture_loads() {
    let source = SnapshotSource::load(fixture("snapshot.json")).unwrap();
    let snapshot = source.snapshot();

    assert_eq!(snapshot.asset.symbol, "YT-eETH-11JAN2024");
    assert_eq!(snapshot.market.len(), 48);
    assert_eq!(snapshot.prices.len(), 48);
    assert_eq!(snapshot.transactions.len(), 5);
}

#[tokio::test]
async fn test_snapshot_filters_non_swaps() {
    let source = SnapshotSource::load(fixture("snapshot.json")).unwrap();
    let records = source
        .fetch_transactions(&TransactionFilter::default())
        .await
        .unwrap();

    assert_eq!(records.len(), 4);
    assert!(records
        .iter()
        .all(|r| r.action.as_deref() != Some("ADD_LIQUIDITY")));
}

#[tokio::test]
async fn test_snapshot_unknown_asset() {
    let source = SnapshotSource::load(fixture("snapshot.json")).unwrap();
    let err = source.resolve_asset("YT", "0xnothere").await.unwrap_err();
    assert!(matches!(err, SourceError::AssetNotFound { .. }));
}

#[test]
fn test_snapshot_missing_file() {
    let err = SnapshotSource::load(fixture("missing.json")).unwrap_err();
    assert!(matches!(err, SourceError::Io(_)));
}
