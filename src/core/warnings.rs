use super::transaction::Currency;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain warning types emitted during matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Warning {
    /// No purchase lot was available for (part of) a sale.
    /// The unmatched quantity is assumed to have zero cost basis.
    MissingCostBasis {
        transaction_id: String,
        exchange: String,
        #[schemars(with = "String")]
        currency: Currency,
        #[schemars(with = "String")]
        timestamp: DateTime<Utc>,
        #[schemars(with = "f64")]
        unmatched: Decimal,
        /// Proceeds of the unmatched quantity, all counted as profit
        #[schemars(with = "f64")]
        assumed_profit: Decimal,
    },
    /// A sale was priced in a currency other than the fiat reference currency,
    /// so its profit is not expressed in fiat.
    NonFiatDisposal {
        transaction_id: String,
        #[schemars(with = "String")]
        currency: Currency,
        #[schemars(with = "String")]
        pay_currency: Currency,
    },
}

impl Warning {
    pub fn transaction_id(&self) -> &str {
        match self {
            Warning::MissingCostBasis { transaction_id, .. }
            | Warning::NonFiatDisposal { transaction_id, .. } => transaction_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Warning::MissingCostBasis { .. } => "MissingCostBasis",
            Warning::NonFiatDisposal { .. } => "NonFiatDisposal",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingCostBasis {
                transaction_id,
                exchange,
                currency,
                timestamp,
                unmatched,
                assumed_profit,
            } => write!(
                f,
                "no buy record for sale {} ({}) of {} {} at {}, assuming 100% earning of {}",
                transaction_id,
                exchange,
                unmatched,
                currency,
                timestamp.to_rfc3339(),
                assumed_profit
            ),
            Warning::NonFiatDisposal {
                transaction_id,
                currency,
                pay_currency,
            } => write!(
                f,
                "sale {} of {} is priced in {}, profit is not in fiat",
                transaction_id, currency, pay_currency
            ),
        }
    }
}
