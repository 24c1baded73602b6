pub mod coinbase;
pub mod kraken;

use crate::core::precision::ArithmeticError;
use crate::core::transaction::TransactionError;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Column of an exchange CSV export, generated by `#[derive(CsvColumns)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvColumn {
    pub position: usize,
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("{exchange} line {line}: {source}")]
    Transaction {
        exchange: &'static str,
        line: u64,
        source: TransactionError,
    },
    #[error("{exchange} line {line}: invalid {field} {value:?}")]
    InvalidNumber {
        exchange: &'static str,
        line: u64,
        field: &'static str,
        value: String,
    },
    #[error("{exchange} line {line}: unknown asset pair {pair:?}")]
    UnknownPair {
        exchange: &'static str,
        line: u64,
        pair: String,
    },
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
}

/// Parse a decimal column, allowing surrounding whitespace, a leading currency sign
/// and thousands separators. A comma is only taken as a thousands separator when a
/// decimal point follows it, so a decimal comma like "1,5" is rejected.
fn parse_decimal(
    exchange: &'static str,
    line: u64,
    field: &'static str,
    value: &str,
) -> Result<Decimal, ImportError> {
    let trimmed = value.trim().trim_start_matches(['€', '$', '£']);
    let trimmed = match (trimmed.rfind(','), trimmed.find('.')) {
        (Some(comma), Some(point)) if comma < point => trimmed.replace(',', ""),
        _ => trimmed.to_string(),
    };
    Decimal::from_str(&trimmed)
        .or_else(|_| Decimal::from_scientific(&trimmed))
        .map_err(|_| ImportError::InvalidNumber {
            exchange,
            line,
            field,
            value: value.to_string(),
        })
}
