//! Parquet export of valuation results

use crate::valuation::{EnrichedLeg, FairValuePoint, Metric, PricePoint, ValuationResult};
use arrow::array::{ArrayRef, Float64Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LEG_METRICS: [&str; 5] = [
    "yt_price",
    "long_yield_apy",
    "points",
    "weighted_points",
    "fair_value",
];

fn timestamp_field() -> Field {
    Field::new(
        "timestamp",
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        false,
    )
}

/// A metric is stored as its value plus a `<name>_fault` column
fn metric_fields(name: &str) -> [Field; 2] {
    [
        Field::new(name, DataType::Float64, true),
        Field::new(format!("{}_fault", name), DataType::Utf8, true),
    ]
}

/// Enriched transaction legs
pub fn legs_schema() -> Schema {
    let mut fields = vec![
        timestamp_field(),
        Field::new("tx_hash", DataType::Utf8, true),
        Field::new("action", DataType::Utf8, true),
        Field::new("input_address", DataType::Utf8, true),
        Field::new("input_base_type", DataType::Utf8, true),
        Field::new("output_address", DataType::Utf8, true),
        Field::new("output_base_type", DataType::Utf8, true),
        Field::new("valuation_usd", DataType::Float64, true),
        Field::new("implied_apy", DataType::Float64, true),
        Field::new("underlying_apy", DataType::Float64, true),
        Field::new("hours_to_maturity", DataType::Float64, false),
    ];
    for name in LEG_METRICS {
        fields.extend(metric_fields(name));
    }
    Schema::new(fields)
}

/// APY history with prices and fair value
pub fn prices_schema() -> Schema {
    let mut fields = vec![
        timestamp_field(),
        Field::new("implied_apy", DataType::Float64, false),
        Field::new("underlying_apy", DataType::Float64, false),
        Field::new("open", DataType::Float64, true),
        Field::new("high", DataType::Float64, true),
        Field::new("low", DataType::Float64, true),
        Field::new("close", DataType::Float64, true),
        Field::new("volume", DataType::Float64, true),
    ];
    fields.extend(metric_fields("fair_value"));
    Schema::new(fields)
}

/// Hourly fair-value curve
pub fn curve_schema() -> Schema {
    Schema::new(vec![
        timestamp_field(),
        Field::new("hours_to_maturity", DataType::Float64, false),
        Field::new("fair_value", DataType::Float64, false),
    ])
}

fn timestamps<'a>(values: impl Iterator<Item = &'a DateTime<Utc>>) -> ArrayRef {
    let micros: Vec<i64> = values.map(|t| t.timestamp_micros()).collect();
    Arc::new(TimestampMicrosecondArray::from(micros).with_timezone("UTC"))
}

fn floats(values: impl Iterator<Item = Option<f64>>) -> ArrayRef {
    Arc::new(Float64Array::from(values.collect::<Vec<_>>()))
}

fn strings<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(StringArray::from(values.collect::<Vec<_>>()))
}

fn metric_columns<'a>(metrics: impl Iterator<Item = &'a Metric> + Clone) -> [ArrayRef; 2] {
    let faults: Vec<Option<String>> = metrics
        .clone()
        .map(|m| m.fault().map(|f| f.to_string()))
        .collect();
    [
        floats(metrics.map(|m| m.value())),
        Arc::new(StringArray::from(faults)),
    ]
}

/// Files written by an export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFiles {
    pub legs: Option<PathBuf>,
    pub prices: Option<PathBuf>,
    pub curve: Option<PathBuf>,
}

/// Parquet writer for valuation output
pub struct ParquetWriter {
    output_dir: PathBuf,
}

impl ParquetWriter {
    /// Create a new Parquet writer
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    /// Ensure output directory exists
    pub fn ensure_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// File path for a table of one asset
    pub fn file_path(&self, symbol: &str, table: &str) -> PathBuf {
        let stem: String = symbol
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.output_dir.join(format!("{}_{}.parquet", stem, table))
    }

    fn write_batch(&self, path: &Path, schema: Arc<Schema>, columns: Vec<ArrayRef>) -> anyhow::Result<()> {
        self.ensure_dir()?;

        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        let batch = RecordBatch::try_new(schema, columns)?;

        writer.write(&batch)?;
        writer.close()?;

        Ok(())
    }

    /// Write enriched legs
    pub fn write_legs(&self, path: &Path, legs: &[EnrichedLeg]) -> anyhow::Result<()> {
        if legs.is_empty() {
            return Ok(());
        }

        let mut columns = vec![
            timestamps(legs.iter().map(|l| &l.leg.timestamp)),
            strings(legs.iter().map(|l| l.leg.tx_hash.as_deref())),
            strings(legs.iter().map(|l| l.leg.action.as_deref())),
            strings(legs.iter().map(|l| l.leg.input_address.as_deref())),
            strings(legs.iter().map(|l| l.leg.input_base_type.as_deref())),
            strings(legs.iter().map(|l| l.leg.output_address.as_deref())),
            strings(legs.iter().map(|l| l.leg.output_base_type.as_deref())),
            floats(legs.iter().map(|l| l.leg.valuation_usd)),
            floats(legs.iter().map(|l| l.leg.implied_apy)),
            floats(legs.iter().map(|l| l.underlying_apy)),
            floats(legs.iter().map(|l| Some(l.hours_to_maturity))),
        ];
        columns.extend(metric_columns(legs.iter().map(|l| &l.yt_price)));
        columns.extend(metric_columns(legs.iter().map(|l| &l.long_yield_apy)));
        columns.extend(metric_columns(legs.iter().map(|l| &l.points)));
        columns.extend(metric_columns(legs.iter().map(|l| &l.weighted_points)));
        columns.extend(metric_columns(legs.iter().map(|l| &l.fair_value)));

        self.write_batch(path, Arc::new(legs_schema()), columns)?;
        tracing::debug!(path = ?path, count = legs.len(), "Wrote legs to Parquet");
        Ok(())
    }

    /// Write the price series with fair value attached
    pub fn write_prices(&self, path: &Path, prices: &[PricePoint]) -> anyhow::Result<()> {
        if prices.is_empty() {
            return Ok(());
        }

        let bar = |p: &PricePoint, f: fn(&crate::series::PriceSample) -> f64| {
            p.point.price.as_ref().map(f)
        };

        let mut columns = vec![
            timestamps(prices.iter().map(|p| &p.point.sample.timestamp)),
            floats(prices.iter().map(|p| Some(p.point.sample.implied_apy))),
            floats(prices.iter().map(|p| Some(p.point.sample.underlying_apy))),
            floats(prices.iter().map(|p| bar(p, |b| b.open))),
            floats(prices.iter().map(|p| bar(p, |b| b.high))),
            floats(prices.iter().map(|p| bar(p, |b| b.low))),
            floats(prices.iter().map(|p| bar(p, |b| b.close))),
            floats(prices.iter().map(|p| bar(p, |b| b.volume))),
        ];
        columns.extend(metric_columns(prices.iter().map(|p| &p.fair_value)));

        self.write_batch(path, Arc::new(prices_schema()), columns)?;
        tracing::debug!(path = ?path, count = prices.len(), "Wrote prices to Parquet");
        Ok(())
    }

    /// Write the fair-value curve
    pub fn write_curve(&self, path: &Path, points: &[FairValuePoint]) -> anyhow::Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let columns = vec![
            timestamps(points.iter().map(|p| &p.timestamp)),
            floats(points.iter().map(|p| Some(p.hours_to_maturity))),
            floats(points.iter().map(|p| Some(p.fair_value))),
        ];

        self.write_batch(path, Arc::new(curve_schema()), columns)?;
        tracing::debug!(path = ?path, count = points.len(), "Wrote curve to Parquet");
        Ok(())
    }

    /// Write all three tables of a result; empty tables are skipped
    pub fn export(&self, result: &ValuationResult) -> anyhow::Result<ExportedFiles> {
        let symbol = &result.asset.symbol;
        let written = |path: PathBuf, rows: usize| (rows > 0).then_some(path);

        let legs = self.file_path(symbol, "legs");
        self.write_legs(&legs, &result.legs)?;
        let prices = self.file_path(symbol, "prices");
        self.write_prices(&prices, &result.prices)?;
        let curve = self.file_path(symbol, "curve");
        self.write_curve(&curve, &result.curve.points)?;

        Ok(ExportedFiles {
            legs: written(legs, result.legs.len()),
            prices: written(prices, result.prices.len()),
            curve: written(curve, result.curve.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{MarketPoint, MarketSample, PriceSample};
    use crate::valuation::{DegenerateMath, FairValueCurve};
    use arrow::array::Array;
    use chrono::{Duration, TimeZone};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::TempDir;

    fn maturity() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
    }

    fn read(path: &Path) -> RecordBatch {
        let file = File::open(path).unwrap();
        let mut reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        reader.next().unwrap().unwrap()
    }

    #[test]
    fn test_schemas() {
        // 11 base fields + 5 metrics with a fault column each
        assert_eq!(legs_schema().fields().len(), 21);
        assert_eq!(prices_schema().fields().len(), 10);
        assert_eq!(prices_schema().field(9).name(), "fair_value_fault");
        assert_eq!(curve_schema().fields().len(), 3);
    }

    #[test]
    fn test_file_path_sanitizes_symbol() {
        let writer = ParquetWriter::new(PathBuf::from("/data"));
        assert_eq!(
            writer.file_path("YT-eETH 27/06", "curve"),
            PathBuf::from("/data/YT-eETH_27_06_curve.parquet")
        );
    }

    #[test]
    fn test_write_curve() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ParquetWriter::new(temp_dir.path().to_path_buf());
        let curve = FairValueCurve::generate(maturity() - Duration::hours(5), maturity(), Metric::Valid(0.1));

        let path = writer.file_path("YT", "curve");
        writer.write_curve(&path, &curve.points).unwrap();

        let batch = read(&path);
        assert_eq!(batch.num_rows(), 6);
        let fair = batch
            .column(2)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(fair.value(5), 0.0);
        assert!(fair.value(0) > fair.value(1));
    }

    #[test]
    fn test_write_prices_with_faults() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ParquetWriter::new(temp_dir.path().to_path_buf());
        let t = maturity() - Duration::hours(1);

        let prices = vec![
            PricePoint {
                point: MarketPoint {
                    sample: MarketSample::new(t, 0.1, 0.05),
                    price: Some(PriceSample::new(t, 0.01, 0.02, 0.005, 0.015, 3.0)),
                },
                fair_value: Metric::Valid(0.0001),
            },
            PricePoint {
                point: MarketPoint {
                    sample: MarketSample::new(maturity() + Duration::hours(1), 0.1, 0.05),
                    price: None,
                },
                fair_value: Metric::invalid(DegenerateMath::PostMaturity),
            },
        ];

        let path = writer.file_path("YT", "prices");
        writer.write_prices(&path, &prices).unwrap();

        let batch = read(&path);
        assert_eq!(batch.num_rows(), 2);
        let close = batch
            .column(6)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(close.value(0), 0.015);
        assert!(close.is_null(1));

        let faults = batch
            .column(9)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert!(faults.is_null(0));
        assert_eq!(faults.value(1), "degenerate math: row is past maturity");
    }

    #[test]
    fn test_write_empty_curve() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ParquetWriter::new(temp_dir.path().to_path_buf());

        let path = writer.file_path("YT", "curve");
        // Should succeed without creating file
        writer.write_curve(&path, &[]).unwrap();
        assert!(!path.exists());
    }
}
