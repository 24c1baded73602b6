//! Coinbase "transaction history" CSV export.
//!
//! The export starts with a free-form preamble and has no header at a fixed
//! line, so rows are read positionally and anything that does not look like a
//! transaction row is skipped.

use super::{parse_decimal, CsvColumn, ImportError};
use crate::core::precision;
use crate::core::transaction::{parse_datetime, Currency, Transaction, TxKind};
use chrono::{DateTime, NaiveDate, Utc};
use cryptotax_derive::CsvColumns;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::str::FromStr;

pub const EXCHANGE: &str = "Coinbase";

const FIELDS: usize = 8;

#[derive(Debug, Clone, Deserialize, CsvColumns)]
pub struct Record {
    /// Date of the transaction (MM/DD/YYYY)
    #[serde(rename = "Timestamp")]
    timestamp: String,
    /// Buy or Sell; Send and Receive rows are skipped
    #[serde(rename = "Transaction Type")]
    kind: String,
    /// Asset code, e.g. BTC
    #[serde(rename = "Asset")]
    asset: String,
    /// Amount of the asset
    #[serde(rename = "Quantity Transacted")]
    quantity: String,
    /// Fiat price of one unit at the time of the transaction
    #[serde(rename = "Spot Price at Transaction")]
    spot_price: String,
    /// Fiat amount including Coinbase fees
    #[serde(rename = "Quantity Transacted (Inclusive of Coinbase Fees)")]
    total: String,
    /// Ignored
    #[serde(rename = "Address")]
    #[allow(dead_code)]
    address: Option<String>,
    /// Ignored
    #[serde(rename = "Notes")]
    #[allow(dead_code)]
    notes: Option<String>,
}

impl Record {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        NaiveDate::parse_from_str(self.timestamp.trim(), "%m/%d/%Y")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .or_else(|| parse_datetime(self.timestamp.trim()).ok())
    }

    fn is_transfer(&self) -> bool {
        matches!(self.kind.trim(), "Send" | "Receive")
    }
}

/// Derive a stable id from the row position and its content.
fn record_id(index: usize, record: &csv::StringRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_le_bytes());
    for field in record {
        hasher.update(field.as_bytes());
        hasher.update(b"\x1f");
    }
    hex::encode(&hasher.finalize()[..16])
}

/// Read buys and sells from a Coinbase export, priced in `fiat`.
pub fn read_csv<R: Read>(reader: R, fiat: &Currency) -> Result<Vec<Transaction>, ImportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut transactions = Vec::new();
    for (index, row) in rdr.records().enumerate() {
        let row = row?;
        let line = row.position().map_or(index as u64 + 1, |p| p.line());

        if row.len() != FIELDS {
            log::debug!("{} line {}: skipping row with {} fields", EXCHANGE, line, row.len());
            continue;
        }
        let record: Record = row.deserialize(None)?;
        let Some(timestamp) = record.timestamp() else {
            log::debug!("{} line {}: skipping row without date: {:?}", EXCHANGE, line, row);
            continue;
        };
        if record.is_transfer() {
            log::debug!("{} line {}: skipping {}", EXCHANGE, line, record.kind);
            continue;
        }

        let tx = to_transaction(&record, timestamp, record_id(index, &row), line, fiat)?;
        transactions.push(tx);
    }

    log::info!("Read {} transactions from {}", transactions.len(), EXCHANGE);
    Ok(transactions)
}

fn to_transaction(
    record: &Record,
    timestamp: DateTime<Utc>,
    id: String,
    line: u64,
    fiat: &Currency,
) -> Result<Transaction, ImportError> {
    let transaction_err = |source| ImportError::Transaction {
        exchange: EXCHANGE,
        line,
        source,
    };

    let kind = TxKind::from_str(&record.kind).map_err(transaction_err)?;
    let quantity = parse_decimal(EXCHANGE, line, "quantity", &record.quantity)?;
    let spot_price = parse_decimal(EXCHANGE, line, "spot price", &record.spot_price)?;
    let total = parse_decimal(EXCHANGE, line, "total", &record.total)?;

    let price = precision::mul(quantity, spot_price)?;
    let mut fees = match kind {
        TxKind::Buy => precision::sub(total, price)?,
        TxKind::Sell => precision::sub(price, total)?,
    };
    if fees < Decimal::ZERO {
        log::warn!(
            "{} line {}: total {} does not cover {} x {}, assuming no fees",
            EXCHANGE,
            line,
            total,
            quantity,
            spot_price
        );
        fees = Decimal::ZERO;
    }

    let tx = Transaction {
        id,
        exchange: EXCHANGE.to_string(),
        timestamp,
        kind,
        currency: Currency::new(&record.asset),
        pay_currency: fiat.clone(),
        quantity,
        spot_price,
        fees,
    };
    tx.validate().map_err(transaction_err)?;
    Ok(tx)
}
