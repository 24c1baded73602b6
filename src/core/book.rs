use super::pool::{CreditPool, Lot, PoolError};
use super::precision::{self, ArithmeticError};
use super::tax::{self, TaxRecord, TaxReport};
use super::transaction::{Currency, Transaction, TransactionError, TxKind};
use super::warnings::Warning;
use chrono::{Datelike, Duration, Utc};
use rust_decimal::Decimal;
use std::fmt;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Debug, thiserror::Error)]
pub enum BookError {
    #[error("invalid transaction: {0}")]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
}

/// Settings of one report run.
#[derive(Debug, Clone)]
pub struct BookConfig {
    /// Currency lots are bought with and profits are expressed in
    pub fiat: Currency,
    /// Year reported by [`Book::tax_report`] when not asking for the full history
    pub tax_year: i32,
    /// Minimum holding period for a tax free sale
    pub tax_free_after: Duration,
}

impl Default for BookConfig {
    fn default() -> Self {
        BookConfig {
            fiat: Currency::eur(),
            tax_year: Utc::now().year() - 1,
            tax_free_after: tax::tax_free_after(),
        }
    }
}

/// All transactions of a run and the lots built from them.
#[derive(Debug, Clone)]
pub struct Book {
    config: BookConfig,
    buys: Vec<Transaction>,
    sells: Vec<Transaction>,
    pool: CreditPool,
    warnings: Vec<Warning>,
}

impl Book {
    /// Validate `records` and split them into buys and sells, each ordered by time.
    pub fn new(records: Vec<Transaction>, config: BookConfig) -> Result<Self, BookError> {
        let mut buys = Vec::new();
        let mut sells = Vec::new();

        for record in records {
            record.validate()?;
            match record.kind {
                TxKind::Buy => buys.push(record),
                TxKind::Sell => sells.push(record),
            }
        }

        buys.sort_by_key(|tx| tx.timestamp);
        sells.sort_by_key(|tx| tx.timestamp);

        log::info!("Book with {} buys and {} sells", buys.len(), sells.len());

        Ok(Book {
            pool: CreditPool::new(config.fiat.clone()),
            config,
            buys,
            sells,
            warnings: Vec::new(),
        })
    }

    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    /// Build the lots from all buys, then match all sells against them.
    ///
    /// Starts from an empty pool, so calling it again gives the same result.
    pub fn calculate(&mut self) -> Result<(), BookError> {
        self.pool = CreditPool::new(self.config.fiat.clone());
        self.warnings.clear();

        for buy in &self.buys {
            self.pool.add_credit(buy.quantity, buy)?;
        }

        for sell in &self.sells {
            let outcome = self.pool.sell(sell.quantity, sell)?;
            for warning in &outcome.warnings {
                log::warn!("accounting: {}", warning);
            }
            self.warnings.extend(outcome.warnings);
        }

        Ok(())
    }

    pub fn lots(&self) -> &[Lot] {
        self.pool.lots()
    }

    /// Warnings of the last [`Book::calculate`] run.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn tax_records(&self) -> Result<Vec<TaxRecord>, BookError> {
        Ok(tax::tax_records(&self.pool, self.config.tax_free_after)?)
    }

    /// Report over all years if `full`, otherwise over the taxable records of
    /// the configured tax year.
    pub fn tax_report(&self, full: bool) -> Result<TaxReport, BookError> {
        let year = if full {
            None
        } else {
            Some(self.config.tax_year)
        };
        Ok(TaxReport::new(
            self.tax_records()?,
            year,
            self.config.fiat.clone(),
        )?)
    }
}

#[derive(Tabled)]
struct LedgerRow {
    #[tabled(rename = "Balance")]
    balance: String,
    #[tabled(rename = "Type")]
    kind: &'static str,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Exchange")]
    exchange: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Spot Price")]
    spot_price: String,
    #[tabled(rename = "Exchange TX ID")]
    id: String,
    #[tabled(rename = "TX Fees")]
    fees: String,
    #[tabled(rename = "Profit")]
    profit: String,
    #[tabled(rename = "Hold Time in days")]
    hold_days: String,
    #[tabled(rename = "Taxable")]
    taxable: String,
}

impl Book {
    fn ledger_rows(&self) -> Vec<LedgerRow> {
        let mut rows = Vec::new();
        for lot in self.lots() {
            let buy = lot.buy();
            rows.push(LedgerRow {
                balance: format!("{} {}", precision::format_quantity(lot.balance()), buy.currency),
                kind: "BUY",
                timestamp: buy.timestamp.to_rfc2822(),
                exchange: buy.exchange.clone(),
                quantity: format!("{} {}", precision::format_quantity(buy.quantity), buy.currency),
                spot_price: format!("{} {}", buy.spot_price, buy.pay_currency),
                id: buy.id.clone(),
                fees: format!("{} {}", buy.fees, buy.pay_currency),
                profit: "-".to_string(),
                hold_days: "-".to_string(),
                taxable: "-".to_string(),
            });

            for m in lot.sells() {
                rows.push(LedgerRow {
                    balance: "-".to_string(),
                    kind: if m.paid_with_cryptocurrency {
                        "TRADE"
                    } else {
                        "SELL"
                    },
                    timestamp: m.tx.timestamp.to_rfc2822(),
                    exchange: m.tx.exchange.clone(),
                    quantity: format!("{} {}", precision::format_quantity(m.quantity), buy.currency),
                    spot_price: format!("{} {}", m.tx.spot_price, m.tx.pay_currency),
                    id: m.tx.id.clone(),
                    fees: format!("{} {}", m.tx.fees, m.tx.pay_currency),
                    profit: format!("{:.2} {}", m.profit, m.tx.pay_currency),
                    hold_days: m.hold_days().to_string(),
                    taxable: (!m.is_exempt(self.config.tax_free_after)).to_string(),
                });
            }
        }
        rows
    }
}

/// Ledger dump: every lot followed by the sales and trades that consumed it.
impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.ledger_rows();
        if rows.is_empty() {
            return writeln!(f, "(no lots)");
        }
        let table = Table::new(rows)
            .with(Style::psql())
            .with(Modify::new(Rows::new(1..)).with(Alignment::left()))
            .to_string();
        writeln!(f, "{}", table)?;

        let balances = self.pool.open_balances();
        let open: Vec<String> = balances
            .iter()
            .filter(|(_, balance)| **balance > Decimal::ZERO)
            .map(|(currency, balance)| {
                format!("{} {}", precision::format_quantity(*balance), currency)
            })
            .collect();
        if !open.is_empty() {
            writeln!(f, "Open balances: {}", open.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pool::tests::tx;
    use rust_decimal_macros::dec;

    fn config(year: i32) -> BookConfig {
        BookConfig {
            fiat: Currency::eur(),
            tax_year: year,
            tax_free_after: tax::tax_free_after(),
        }
    }

    fn sample() -> Vec<Transaction> {
        vec![
            tx("s2", TxKind::Sell, "2021-03-01", "ETH", "EUR", dec!(2), dec!(1500)),
            tx("b2", TxKind::Buy, "2020-02-01", "ETH", "EUR", dec!(5), dec!(200)),
            tx("s1", TxKind::Sell, "2020-06-01", "BTC", "EUR", dec!(1.5), dec!(9000)),
            tx("b1", TxKind::Buy, "2020-01-01", "BTC", "EUR", dec!(1), dec!(7000)),
            tx("t1", TxKind::Buy, "2020-03-01", "XRP", "ETH", dec!(1000), dec!(0.001)),
            tx("b3", TxKind::Buy, "2020-04-01", "BTC", "EUR", dec!(1), dec!(6000)),
        ]
    }

    #[test]
    fn new_rejects_invalid_records() {
        let mut bad = tx("b1", TxKind::Buy, "2020-01-01", "BTC", "EUR", dec!(1), dec!(100));
        bad.fees = dec!(-1);
        let err = Book::new(vec![bad], config(2020)).unwrap_err();
        assert!(matches!(
            err,
            BookError::Transaction(TransactionError::NegativeValue { field: "fees", .. })
        ));
    }

    #[test]
    fn calculate_processes_buys_before_sells_in_time_order() {
        let mut book = Book::new(sample(), config(2020)).unwrap();
        book.calculate().unwrap();

        let ids: Vec<_> = book.lots().iter().map(|l| l.buy().id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b2", "b3"]);

        // b1 fully sold, b3 half sold by s1
        assert_eq!(book.lots()[0].balance(), Decimal::ZERO);
        assert_eq!(book.lots()[2].balance(), dec!(0.5));

        // b2 paid 1 ETH for XRP, then 2 ETH sold
        assert_eq!(book.lots()[1].balance(), dec!(2));
        assert!(book.lots()[1].sells()[0].paid_with_cryptocurrency);

        assert!(book.warnings().is_empty());
    }

    #[test]
    fn same_time_buys_keep_input_order() {
        let records = vec![
            tx("s1", TxKind::Sell, "2020-06-01", "BTC", "EUR", dec!(1), dec!(9000)),
            tx("first", TxKind::Buy, "2020-01-01", "BTC", "EUR", dec!(1), dec!(7000)),
            tx("second", TxKind::Buy, "2020-01-01", "BTC", "EUR", dec!(1), dec!(8000)),
        ];
        let mut book = Book::new(records, config(2020)).unwrap();
        book.calculate().unwrap();

        let ids: Vec<_> = book.lots().iter().map(|l| l.buy().id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(book.lots()[0].balance(), Decimal::ZERO);
        assert_eq!(book.lots()[0].sells()[0].tx.id, "s1");
        assert_eq!(book.lots()[1].balance(), dec!(1));

        let records = book.tax_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].buy_price, dec!(7000));
    }

    #[test]
    fn balances_are_conserved() {
        let mut book = Book::new(sample(), config(2020)).unwrap();
        book.calculate().unwrap();
        for lot in book.lots() {
            let matched: Decimal = lot.sells().iter().map(|m| m.quantity).sum();
            assert_eq!(lot.balance() + matched, lot.buy().quantity);
        }
    }

    #[test]
    fn missing_funding_lot_aborts() {
        let records = vec![tx("t1", TxKind::Buy, "2020-03-01", "XRP", "ETH", dec!(1000), dec!(0.001))];
        let mut book = Book::new(records, config(2020)).unwrap();
        assert!(matches!(
            book.calculate(),
            Err(BookError::Pool(PoolError::FundingLotNotFound { .. }))
        ));
    }

    #[test]
    fn sale_without_buy_only_warns() {
        let records = vec![tx("s1", TxKind::Sell, "2020-03-01", "DASH", "EUR", dec!(3), dec!(80))];
        let mut book = Book::new(records, config(2020)).unwrap();
        book.calculate().unwrap();

        assert_eq!(book.warnings().len(), 1);
        assert_eq!(book.warnings()[0].transaction_id(), "s1");
        let records = book.tax_records().unwrap();
        assert!(records.iter().all(|r| r.currency != Currency::new("DASH")));
    }

    #[test]
    fn recalculating_gives_identical_records() {
        let mut first = Book::new(sample(), config(2020)).unwrap();
        first.calculate().unwrap();
        let mut second = Book::new(sample(), config(2020)).unwrap();
        second.calculate().unwrap();
        assert_eq!(first.tax_records().unwrap(), second.tax_records().unwrap());

        let before = first.tax_records().unwrap();
        first.calculate().unwrap();
        assert_eq!(first.tax_records().unwrap(), before);
    }

    #[test]
    fn year_report_uses_configured_year() {
        let mut book = Book::new(sample(), config(2020)).unwrap();
        book.calculate().unwrap();

        let year = book.tax_report(false).unwrap();
        assert_eq!(year.tax_year, Some(2020));
        // s1 matched against b1 and b3, plus the zero profit XRP trade
        assert_eq!(year.count, 3);
        // 1 * (9000 - 7000) + 0.5 * (9000 - 6000)
        assert_eq!(year.earnings, dec!(3500));

        let full = book.tax_report(true).unwrap();
        assert_eq!(full.tax_year, None);
        // plus the 2021 ETH sale
        assert_eq!(full.count, 4);
    }

    #[test]
    fn ledger_lists_lots_and_matches() {
        let mut book = Book::new(sample(), config(2020)).unwrap();
        book.calculate().unwrap();
        let ledger = book.to_string();
        assert!(ledger.contains("BUY"));
        assert!(ledger.contains("SELL"));
        assert!(ledger.contains("TRADE"));
        assert!(ledger.contains("Open balances: 0.5 BTC, 2 ETH"));
    }
}
