//! Benchmarks for leg valuation and curve generation

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use yt_fair_value::series::MarketSample;
use yt_fair_value::transaction::{expand_batched, TransactionRecord, DEFAULT_BATCH_SIZE};
use yt_fair_value::valuation::{align_legs, evaluate, FairValueCurve, Metric, PointsParams};

fn maturity() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 27, 0, 0, 0).unwrap()
}

fn start() -> DateTime<Utc> {
    maturity() - Duration::days(90)
}

fn records(count: i64) -> Vec<TransactionRecord> {
    (0..count)
        .map(|i| {
            let json = format!(
                r#"{{
                    "txHash": "0x{i:x}",
                    "timestamp": "{ts}",
                    "action": "SWAP_YT",
                    "inputs": [{{"asset": {{"address": "0xsy", "baseType": "SY"}}}}],
                    "outputs": [
                        {{"asset": {{"address": "0xyt", "baseType": "YT"}}}},
                        {{"asset": {{"address": "0xpt", "baseType": "PT"}}}}
                    ],
                    "valuation": {{"usd": {usd}}},
                    "impliedApy": {apy}
                }}"#,
                ts = (start() + Duration::minutes(i * 7)).to_rfc3339(),
                usd = 100 + i % 900,
                apy = 0.05 + (i % 20) as f64 * 0.005,
            );
            serde_json::from_str(&json).unwrap()
        })
        .collect()
}

fn market() -> Vec<MarketSample> {
    (0..24 * 90)
        .map(|h| MarketSample::new(start() + Duration::hours(h), 0.1, 0.04))
        .collect()
}

fn benchmark_expand(c: &mut Criterion) {
    let records = records(10_000);

    c.bench_function("expand_10k_records", |b| {
        b.iter(|| expand_batched(black_box(&records), DEFAULT_BATCH_SIZE))
    });
}

fn benchmark_evaluate(c: &mut Criterion) {
    let expansion = expand_batched(&records(10_000), DEFAULT_BATCH_SIZE);
    let aligned = align_legs(expansion.legs, &market()).unwrap();
    let params = PointsParams::default();

    c.bench_function("evaluate_20k_legs", |b| {
        b.iter_batched(
            || aligned.clone(),
            |rows| evaluate(black_box(rows), maturity(), &params),
            BatchSize::LargeInput,
        )
    });
}

fn benchmark_curve(c: &mut Criterion) {
    c.bench_function("fair_value_curve_90d", |b| {
        b.iter(|| FairValueCurve::generate(black_box(start()), maturity(), Metric::Valid(0.12)))
    });
}

criterion_group!(benches, benchmark_expand, benchmark_evaluate, benchmark_curve);
criterion_main!(benches);
