use super::precision::{self, ArithmeticError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::io::Read;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("unsupported transaction type: {0}")]
    UnsupportedKind(String),
    #[error("transaction without id from {exchange} at {timestamp}")]
    MissingId {
        exchange: String,
        timestamp: DateTime<Utc>,
    },
    #[error("negative {field} in transaction {id}: {value}")]
    NegativeValue {
        id: String,
        field: &'static str,
        value: Decimal,
    },
    #[error("transaction {id} pays for {currency} with {currency}")]
    SameCurrency { id: String, currency: Currency },
    #[error("empty currency in transaction {0}")]
    EmptyCurrency(String),
    #[error("invalid datetime: {0}")]
    InvalidDatetime(String),
}

/// Asset code, normalized to upper case (e.g. "BTC", "EUR").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Self {
        Currency(code.trim().to_uppercase())
    }

    pub fn eur() -> Self {
        Currency::new("EUR")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Currency {
    fn from(code: String) -> Self {
        Currency::new(&code)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl FromStr for Currency {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Currency::new(s))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Buy,
    Sell,
}

impl FromStr for TxKind {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(TxKind::Buy),
            "sell" => Ok(TxKind::Sell),
            _ => Err(TransactionError::UnsupportedKind(s.to_string())),
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxKind::Buy => f.write_str("buy"),
            TxKind::Sell => f.write_str("sell"),
        }
    }
}

/// Input root for transaction JSON
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransactionInput {
    pub transactions: Vec<Transaction>,
}

/// A buy, sell or crypto-to-crypto trade reported by an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Transaction {
    /// Exchange assigned identifier, unique per exchange
    pub id: String,
    /// Exchange the transaction happened on (e.g. "Kraken")
    pub exchange: String,
    /// When the transaction happened (RFC3339; date-only assumes midnight UTC)
    #[serde(deserialize_with = "deserialize_datetime")]
    #[schemars(with = "String")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TxKind,
    /// Asset that was bought or sold
    #[schemars(with = "String")]
    pub currency: Currency,
    /// Asset that was paid with (fiat, or a crypto asset for trades)
    #[schemars(with = "String")]
    pub pay_currency: Currency,
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    /// Price of one unit of `currency` in `pay_currency`
    #[schemars(with = "f64")]
    pub spot_price: Decimal,
    /// Fees in `pay_currency`
    #[serde(default)]
    #[schemars(with = "f64")]
    pub fees: Decimal,
}

impl Transaction {
    /// Value of the transaction without fees, in `pay_currency`.
    pub fn price_no_fees(&self) -> Result<Decimal, ArithmeticError> {
        precision::mul(self.quantity, self.spot_price)
    }

    /// Key identifying the transaction across exchanges.
    pub fn key(&self) -> (&str, &str) {
        (&self.exchange, &self.id)
    }

    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.id.trim().is_empty() {
            return Err(TransactionError::MissingId {
                exchange: self.exchange.clone(),
                timestamp: self.timestamp,
            });
        }
        if self.currency.as_str().is_empty() || self.pay_currency.as_str().is_empty() {
            return Err(TransactionError::EmptyCurrency(self.id.clone()));
        }
        if self.currency == self.pay_currency {
            return Err(TransactionError::SameCurrency {
                id: self.id.clone(),
                currency: self.currency.clone(),
            });
        }
        for (field, value) in [
            ("quantity", self.quantity),
            ("spot price", self.spot_price),
            ("fees", self.fees),
        ] {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(TransactionError::NegativeValue {
                    id: self.id.clone(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let price = self
            .price_no_fees()
            .map(|p| p.round_dp(8).to_string())
            .unwrap_or_else(|_| "?".to_string());
        write!(
            f,
            "{} {} {} {} @ {} for {} {} + {} fees",
            self.timestamp.to_rfc3339(),
            self.kind,
            precision::format_quantity(self.quantity),
            self.currency,
            self.exchange,
            price,
            self.pay_currency,
            self.fees
        )
    }
}

/// Read transactions from JSON
pub fn read_transactions_json<R: Read>(reader: R) -> anyhow::Result<Vec<Transaction>> {
    let input: TransactionInput = serde_json::from_reader(reader)?;
    Ok(input.transactions)
}

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, TransactionError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(dt.and_utc());
    }
    if let Some(dt) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(dt.and_utc());
    }
    Err(TransactionError::InvalidDatetime(s.to_string()))
}

fn deserialize_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_datetime(&s).map_err(|err| serde::de::Error::custom(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn buy() -> Transaction {
        Transaction {
            id: "t1".to_string(),
            exchange: "Kraken".to_string(),
            timestamp: parse_datetime("2020-03-01T10:00:00Z").unwrap(),
            kind: TxKind::Buy,
            currency: Currency::new("btc"),
            pay_currency: Currency::eur(),
            quantity: dec!(0.5),
            spot_price: dec!(8000),
            fees: dec!(4),
        }
    }

    #[test]
    fn price_no_fees_is_quantity_times_spot() {
        assert_eq!(buy().price_no_fees().unwrap(), dec!(4000));
    }

    #[test]
    fn currency_is_normalized() {
        assert_eq!(Currency::new(" btc "), Currency::new("BTC"));
        assert_eq!(buy().currency.as_str(), "BTC");
    }

    #[test]
    fn kind_parsing_is_case_insensitive() {
        assert_eq!("BUY".parse::<TxKind>().unwrap(), TxKind::Buy);
        assert_eq!("Sell".parse::<TxKind>().unwrap(), TxKind::Sell);
        assert_eq!(
            "convert".parse::<TxKind>().unwrap_err(),
            TransactionError::UnsupportedKind("convert".to_string())
        );
    }

    #[test]
    fn negative_quantity_rejected() {
        let tx = Transaction {
            quantity: dec!(-1),
            ..buy()
        };
        assert_eq!(
            tx.validate().unwrap_err(),
            TransactionError::NegativeValue {
                id: "t1".to_string(),
                field: "quantity",
                value: dec!(-1),
            }
        );
    }

    #[test]
    fn paying_with_same_currency_rejected() {
        let tx = Transaction {
            pay_currency: Currency::new("BTC"),
            ..buy()
        };
        assert!(matches!(
            tx.validate(),
            Err(TransactionError::SameCurrency { .. })
        ));
    }

    #[test]
    fn empty_id_rejected() {
        let tx = Transaction {
            id: " ".to_string(),
            ..buy()
        };
        assert!(matches!(
            tx.validate(),
            Err(TransactionError::MissingId { .. })
        ));
    }

    #[test]
    fn read_json_input() {
        let json = r#"{
            "transactions": [
                {
                    "id": "a",
                    "exchange": "Manual",
                    "timestamp": "2021-05-01",
                    "type": "buy",
                    "currency": "eth",
                    "pay_currency": "EUR",
                    "quantity": "2",
                    "spot_price": "1500.25"
                }
            ]
        }"#;
        let txs = read_transactions_json(json.as_bytes()).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].currency, Currency::new("ETH"));
        assert_eq!(txs[0].spot_price, dec!(1500.25));
        assert_eq!(txs[0].fees, Decimal::ZERO);
        assert_eq!(
            txs[0].timestamp,
            parse_datetime("2021-05-01T00:00:00Z").unwrap()
        );
    }

    #[test]
    fn unknown_kind_in_json_fails() {
        let json = r#"{"transactions": [{"id": "a", "exchange": "M", "timestamp": "2021-05-01",
            "type": "send", "currency": "ETH", "pay_currency": "EUR",
            "quantity": "1", "spot_price": "1"}]}"#;
        assert!(read_transactions_json(json.as_bytes()).is_err());
    }

    #[test]
    fn parse_datetime_formats() {
        assert!(parse_datetime("2021-05-01 10:11:12.1234").is_ok());
        assert!(parse_datetime("2021-05-01T10:11:12+02:00").is_ok());
        assert_eq!(
            parse_datetime("yesterday").unwrap_err(),
            TransactionError::InvalidDatetime("yesterday".to_string())
        );
    }
}
