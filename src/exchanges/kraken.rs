//! Kraken "trades" CSV export.

use super::{parse_decimal, CsvColumn, ImportError};
use crate::core::transaction::{parse_datetime, Currency, Transaction, TxKind};
use cryptotax_derive::CsvColumns;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;

pub const EXCHANGE: &str = "Kraken";

// https://support.kraken.com/hc/en-us/articles/360001185506-Asset-Codes
const ASSET_CODES: &[(&str, &str)] = &[
    ("BCH", "BCH"),
    ("DASH", "DASH"),
    ("EOS", "EOS"),
    ("EUR", "EUR"),
    ("USD", "USD"),
    ("XBT", "BTC"),
    ("XETH", "ETH"),
    ("XLTC", "LTC"),
    ("XNMC", "NMC"),
    ("XXBT", "BTC"),
    ("XXLM", "XLM"),
    ("XXMR", "XMR"),
    ("XXRP", "XRP"),
    ("XZEC", "ZEC"),
    ("ZEUR", "EUR"),
    ("ZUSD", "USD"),
];

#[derive(Debug, Clone, Deserialize, CsvColumns)]
pub struct Record {
    /// Kraken trade id
    txid: String,
    /// Asset pair, e.g. XXBTZEUR
    pair: String,
    /// Trade time (YYYY-MM-DD hh:mm:ss.ffff, UTC)
    time: String,
    /// buy or sell
    #[serde(rename = "type")]
    kind: String,
    /// Price of one unit of the first asset of the pair in the second
    price: String,
    /// Fee in the second asset of the pair
    fee: String,
    /// Volume of the first asset of the pair
    vol: String,
}

fn asset(code: &str) -> Option<Currency> {
    ASSET_CODES
        .iter()
        .find(|(kraken, _)| *kraken == code)
        .map(|(_, name)| Currency::new(name))
}

/// Split a pair like `XXBTZEUR` or `XBTEUR` into the traded and the paying asset.
pub fn parse_pair(pair: &str) -> Option<(Currency, Currency)> {
    [3, 4].into_iter().find_map(|split| {
        let (base, quote) = (pair.get(..split)?, pair.get(split..)?);
        Some((asset(base)?, asset(quote)?))
    })
}

/// Read trades from a Kraken export. Fees are only kept for trades paid in `fiat`.
pub fn read_csv<R: Read>(reader: R, fiat: &Currency) -> Result<Vec<Transaction>, ImportError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();

    let mut transactions = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let line = row.position().map_or(0, |p| p.line());
        let record: Record = row.deserialize(Some(&headers))?;
        transactions.push(to_transaction(record, line, fiat)?);
    }

    log::info!("Read {} transactions from {}", transactions.len(), EXCHANGE);
    Ok(transactions)
}

fn to_transaction(record: Record, line: u64, fiat: &Currency) -> Result<Transaction, ImportError> {
    let transaction_err = |source| ImportError::Transaction {
        exchange: EXCHANGE,
        line,
        source,
    };

    let (currency, pay_currency) =
        parse_pair(record.pair.trim()).ok_or_else(|| ImportError::UnknownPair {
            exchange: EXCHANGE,
            line,
            pair: record.pair.clone(),
        })?;
    let timestamp = parse_datetime(record.time.trim()).map_err(transaction_err)?;
    let kind = TxKind::from_str(&record.kind).map_err(transaction_err)?;
    let spot_price = parse_decimal(EXCHANGE, line, "price", &record.price)?;
    let quantity = parse_decimal(EXCHANGE, line, "vol", &record.vol)?;

    let fees = if pay_currency == *fiat {
        parse_decimal(EXCHANGE, line, "fee", &record.fee)?
    } else {
        // the fiat value of a fee paid in crypto is unknown
        log::warn!(
            "{} trade {}: {} bought with {}, ignoring fee of {} {}",
            EXCHANGE,
            record.txid,
            currency,
            pay_currency,
            record.fee.trim(),
            pay_currency
        );
        Decimal::ZERO
    };

    let tx = Transaction {
        id: record.txid,
        exchange: EXCHANGE.to_string(),
        timestamp,
        kind,
        currency,
        pay_currency,
        quantity,
        spot_price,
        fees,
    };
    tx.validate().map_err(transaction_err)?;
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::TransactionError;
    use rust_decimal_macros::dec;

    const HEADER: &str =
        "\"txid\",\"ordertxid\",\"pair\",\"time\",\"type\",\"ordertype\",\"price\",\"cost\",\"fee\",\"vol\",\"margin\",\"misc\",\"ledgers\"\n";

    fn read(rows: &str) -> Result<Vec<Transaction>, ImportError> {
        read_csv(format!("{}{}", HEADER, rows).as_bytes(), &Currency::eur())
    }

    #[test]
    fn parses_pairs() {
        assert_eq!(
            parse_pair("XXBTZEUR"),
            Some((Currency::new("BTC"), Currency::new("EUR")))
        );
        assert_eq!(
            parse_pair("XBTEUR"),
            Some((Currency::new("BTC"), Currency::new("EUR")))
        );
        assert_eq!(
            parse_pair("XXLMXXBT"),
            Some((Currency::new("XLM"), Currency::new("BTC")))
        );
        assert_eq!(
            parse_pair("BCHXBT"),
            Some((Currency::new("BCH"), Currency::new("BTC")))
        );
        assert_eq!(
            parse_pair("DASHEUR"),
            Some((Currency::new("DASH"), Currency::new("EUR")))
        );
        assert_eq!(parse_pair("FOOBAR"), None);
        assert_eq!(parse_pair("XB"), None);
    }

    #[test]
    fn reads_fiat_trade_with_fee() {
        let txs = read(
            "\"TXA-1\",\"O-1\",\"XXBTZEUR\",\"2020-01-05 10:11:12.1234\",\"buy\",\"limit\",\"7000.0\",\"3500.0\",\"5.6\",\"0.5\",\"0.0\",\"\",\"L-1\"\n",
        )
        .unwrap();
        assert_eq!(txs.len(), 1);

        let tx = &txs[0];
        assert_eq!(tx.id, "TXA-1");
        assert_eq!(tx.exchange, "Kraken");
        assert_eq!(tx.kind, TxKind::Buy);
        assert_eq!(tx.currency, Currency::new("BTC"));
        assert_eq!(tx.pay_currency, Currency::eur());
        assert_eq!(tx.spot_price, dec!(7000));
        assert_eq!(tx.quantity, dec!(0.5));
        assert_eq!(tx.fees, dec!(5.6));
        assert_eq!(
            tx.timestamp,
            parse_datetime("2020-01-05T10:11:12.1234Z").unwrap()
        );
    }

    #[test]
    fn ignores_fee_of_crypto_paid_trade() {
        let txs = read(
            "\"TXB-1\",\"O-2\",\"XXRPXXBT\",\"2020-02-01 00:00:00.000\",\"buy\",\"market\",\"0.00003\",\"0.03\",\"0.0001\",\"1000\",\"0.0\",\"\",\"L-2\"\n",
        )
        .unwrap();
        assert_eq!(txs[0].currency, Currency::new("XRP"));
        assert_eq!(txs[0].pay_currency, Currency::new("BTC"));
        assert_eq!(txs[0].fees, Decimal::ZERO);
    }

    #[test]
    fn unknown_pair_is_an_error() {
        let err = read(
            "\"TXC-1\",\"O-3\",\"XDOGZEUR\",\"2020-02-01 00:00:00.000\",\"buy\",\"market\",\"0.1\",\"10\",\"0.01\",\"100\",\"0.0\",\"\",\"L-3\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::UnknownPair { line: 2, .. }));
    }

    #[test]
    fn unsupported_type_is_an_error() {
        let err = read(
            "\"TXD-1\",\"O-4\",\"XXBTZEUR\",\"2020-02-01 00:00:00.000\",\"margin\",\"market\",\"7000\",\"7000\",\"1\",\"1\",\"0.0\",\"\",\"L-4\"\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ImportError::Transaction {
                source: TransactionError::UnsupportedKind(_),
                ..
            }
        ));
    }

    #[test]
    fn columns_use_export_names() {
        let names: Vec<_> = Record::csv_columns().iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["txid", "pair", "time", "type", "price", "fee", "vol"]);
    }
}
