//! Transaction expansion
//!
//! Turns one nested record into flat legs: the cross product of its input
//! items and output items. A record with `m` inputs and `n` outputs yields
//! `max(1, m) * max(1, n)` legs before duplicate removal.

use super::{TransactionItem, TransactionRecord};
use crate::series::Timestamped;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Default number of records expanded per batch
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

/// One flattened (input item, output item) combination of a transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionLeg {
    pub timestamp: DateTime<Utc>,
    pub id: Option<String>,
    pub chain_id: Option<u64>,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub action: Option<String>,
    pub origin: Option<String>,
    pub user: Option<String>,
    pub market_address: Option<String>,
    pub input_address: Option<String>,
    pub input_base_type: Option<String>,
    pub output_address: Option<String>,
    pub output_base_type: Option<String>,
    pub valuation_usd: Option<f64>,
    pub valuation_acc: Option<f64>,
    pub implied_apy: Option<f64>,
    /// Canonical JSON of the record's input list
    pub inputs: String,
    /// Canonical JSON of the record's output list
    pub outputs: String,
    /// Remaining record fields; nested lists are stored as canonical JSON strings
    pub extra: BTreeMap<String, Value>,
}

impl Timestamped for TransactionLeg {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl TransactionLeg {
    /// Key identifying exact duplicates
    fn dedup_key(&self) -> String {
        // Every field is plain data, so serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Which list a leg came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LegSide {
    Input,
    Output,
}

impl fmt::Display for LegSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegSide::Input => write!(f, "input"),
            LegSide::Output => write!(f, "output"),
        }
    }
}

/// An item skipped because its asset fields are missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedLeg {
    /// Transaction reference (hash, id, or timestamp)
    pub transaction: String,
    pub side: LegSide,
    /// Position within the record's list
    pub index: usize,
    /// Name of the missing field
    pub missing: &'static str,
}

impl fmt::Display for MalformedLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} #{} missing {}",
            self.transaction, self.side, self.index, self.missing
        )
    }
}

/// Expansion bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpansionReport {
    /// Records consumed
    pub records: usize,
    /// Legs kept after duplicate removal
    pub legs: usize,
    /// Exact duplicate legs dropped
    pub duplicates_removed: usize,
    /// Items skipped for missing asset fields
    pub malformed: Vec<MalformedLeg>,
}

/// Result of expanding a set of records
#[derive(Debug, Clone)]
pub struct Expansion {
    /// Timestamp-ascending legs
    pub legs: Vec<TransactionLeg>,
    pub report: ExpansionReport,
}

type AssetFields = (Option<String>, Option<String>);

/// Extract (address, baseType) from every well-formed item
///
/// An empty list, or a list whose items are all malformed, yields a single
/// pair of absent fields so the record still produces legs.
fn item_fields(
    record: &TransactionRecord,
    items: &[TransactionItem],
    side: LegSide,
    malformed: &mut Vec<MalformedLeg>,
) -> Vec<AssetFields> {
    let mut fields = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let extracted = match &item.asset {
            None => Err("asset"),
            Some(asset) => match (&asset.address, &asset.base_type) {
                (Some(address), Some(base_type)) => Ok((address.clone(), base_type.clone())),
                (None, _) => Err("asset.address"),
                (_, None) => Err("asset.baseType"),
            },
        };

        match extracted {
            Ok((address, base_type)) => fields.push((Some(address), Some(base_type))),
            Err(missing) => {
                tracing::debug!(
                    tx = %record.reference(),
                    %side,
                    index,
                    missing,
                    "Skipping malformed transaction item"
                );
                malformed.push(MalformedLeg {
                    transaction: record.reference(),
                    side,
                    index,
                    missing,
                });
            }
        }
    }

    if fields.is_empty() {
        fields.push((None, None));
    }
    fields
}

fn canonical_list(items: &[TransactionItem]) -> String {
    serde_json::to_string(items).unwrap_or_default()
}

fn canonical_extra(extra: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    extra
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Array(_) => Value::String(value.to_string()),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Expand one record into its legs
///
/// Returns the legs in input-major order (all outputs of the first input,
/// then the second input, ...) with exact duplicates removed, plus the items
/// that were skipped as malformed.
pub fn expand_record(record: &TransactionRecord) -> (Vec<TransactionLeg>, Vec<MalformedLeg>) {
    let (mut legs, malformed) = cross_product(record);
    let mut seen = HashSet::new();
    legs.retain(|leg| seen.insert(leg.dedup_key()));
    (legs, malformed)
}

/// Full inputs × outputs product of one record, duplicates included
fn cross_product(record: &TransactionRecord) -> (Vec<TransactionLeg>, Vec<MalformedLeg>) {
    let mut malformed = Vec::new();
    let inputs = item_fields(record, &record.inputs, LegSide::Input, &mut malformed);
    let outputs = item_fields(record, &record.outputs, LegSide::Output, &mut malformed);

    let inputs_json = canonical_list(&record.inputs);
    let outputs_json = canonical_list(&record.outputs);
    let extra = canonical_extra(&record.extra);
    let (valuation_usd, valuation_acc) = record
        .valuation
        .as_ref()
        .map(|v| (v.usd, v.acc))
        .unwrap_or((None, None));

    let mut legs = Vec::with_capacity(inputs.len() * outputs.len());

    for (input_address, input_base_type) in &inputs {
        for (output_address, output_base_type) in &outputs {
            let leg = TransactionLeg {
                timestamp: record.timestamp,
                id: record.id.clone(),
                chain_id: record.chain_id,
                tx_hash: record.tx_hash.clone(),
                block_number: record.block_number,
                action: record.action.clone(),
                origin: record.origin.clone(),
                user: record.user.clone(),
                market_address: record.market.as_ref().and_then(|m| m.address.clone()),
                input_address: input_address.clone(),
                input_base_type: input_base_type.clone(),
                output_address: output_address.clone(),
                output_base_type: output_base_type.clone(),
                valuation_usd,
                valuation_acc,
                implied_apy: record.implied_apy,
                inputs: inputs_json.clone(),
                outputs: outputs_json.clone(),
                extra: extra.clone(),
            };
            legs.push(leg);
        }
    }

    (legs, malformed)
}

/// Expand all records in bounded, timestamp-ordered batches
///
/// Records are ordered by timestamp (stable), so duplicates can only meet
/// within one timestamp; dedup keys are dropped as soon as time advances.
pub fn expand_batched(records: &[TransactionRecord], batch_size: usize) -> Expansion {
    let mut ordered: Vec<&TransactionRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.timestamp);

    let mut report = ExpansionReport {
        records: records.len(),
        ..Default::default()
    };
    let mut legs = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut current_ts: Option<DateTime<Utc>> = None;

    for (batch_index, batch) in ordered.chunks(batch_size.max(1)).enumerate() {
        let mut batch_legs = Vec::new();

        for record in batch {
            if current_ts != Some(record.timestamp) {
                seen.clear();
                current_ts = Some(record.timestamp);
            }

            let (record_legs, malformed) = cross_product(record);
            report.malformed.extend(malformed);

            for leg in record_legs {
                if seen.insert(leg.dedup_key()) {
                    batch_legs.push(leg);
                } else {
                    report.duplicates_removed += 1;
                }
            }
        }

        tracing::trace!(
            batch = batch_index,
            records = batch.len(),
            legs = batch_legs.len(),
            "Expanded transaction batch"
        );
        legs.append(&mut batch_legs);
    }

    report.legs = legs.len();
    tracing::debug!(
        records = report.records,
        legs = report.legs,
        duplicates = report.duplicates_removed,
        malformed = report.malformed.len(),
        "Expanded transactions"
    );

    Expansion { legs, report }
}
