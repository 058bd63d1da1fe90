//! Transaction module
//!
//! Typed swap records and their expansion into flat legs

mod expander;
mod types;

pub use expander::{
    expand_batched, expand_record, Expansion, ExpansionReport, LegSide, MalformedLeg,
    TransactionLeg, DEFAULT_BATCH_SIZE,
};
pub use types::{AssetRef, MarketRef, TransactionItem, TransactionRecord, Valuation};
