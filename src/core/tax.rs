use super::pool::CreditPool;
use super::precision::{self, ArithmeticError};
use super::transaction::Currency;
use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

/// Lots held at least this long are sold tax free.
pub const TAX_FREE_AFTER_DAYS: i64 = 365;

pub fn tax_free_after() -> Duration {
    Duration::days(TAX_FREE_AFTER_DAYS)
}

const DATE_FORMAT: &str = "%d.%m.%Y";

/// One match between a lot and a disposal, valued for the tax report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxRecord {
    pub currency: Currency,
    pub buy_timestamp: DateTime<Utc>,
    pub sell_timestamp: DateTime<Utc>,
    pub quantity: Decimal,
    pub sell_price: Decimal,
    pub buy_price: Decimal,
    /// Fees of the buy and of the sale, each counted only once per report
    pub advertising_costs: Decimal,
    pub hold_longer_than_a_year: bool,
    pub tax_year: i32,
    pub paid_with_cryptocurrency: bool,
}

impl TaxRecord {
    pub fn profit(&self) -> Decimal {
        self.sell_price - self.buy_price - self.advertising_costs
    }
}

/// Build one record per match of every lot, sorted by tax year, sale time and currency.
pub fn tax_records(
    pool: &CreditPool,
    tax_free_after: Duration,
) -> Result<Vec<TaxRecord>, ArithmeticError> {
    let mut records = Vec::new();
    let mut fees_included: HashSet<(&str, &str)> = HashSet::new();

    for lot in pool.lots() {
        let buy = lot.buy();
        for m in lot.sells() {
            let mut fees = Decimal::ZERO;
            if fees_included.insert(m.tx.key()) {
                fees = precision::add(fees, m.tx.fees)?;
            }
            if fees_included.insert(buy.key()) {
                fees = precision::add(fees, buy.fees)?;
            }

            let buy_price = precision::mul(m.quantity, buy.spot_price)?;
            // Spending crypto on another purchase realizes no gain here.
            let sell_price = if m.paid_with_cryptocurrency {
                buy_price
            } else {
                precision::mul(m.quantity, m.tx.spot_price)?
            };

            records.push(TaxRecord {
                currency: buy.currency.clone(),
                buy_timestamp: buy.timestamp,
                sell_timestamp: m.tx.timestamp,
                quantity: m.quantity,
                sell_price,
                buy_price,
                advertising_costs: fees,
                hold_longer_than_a_year: m.is_exempt(tax_free_after),
                tax_year: m.tx.timestamp.year(),
                paid_with_cryptocurrency: m.paid_with_cryptocurrency,
            });
        }
    }

    records.sort_by(|a, b| {
        a.tax_year
            .cmp(&b.tax_year)
            .then(a.sell_timestamp.cmp(&b.sell_timestamp))
            .then_with(|| a.currency.cmp(&b.currency))
    });

    Ok(records)
}

/// Aggregated tax report, either for one tax year or the full history.
#[derive(Debug, Clone, Serialize)]
pub struct TaxReport {
    /// `None` for the full history
    pub tax_year: Option<i32>,
    pub fiat: Currency,
    pub records: Vec<TaxRecord>,
    pub count: usize,
    pub earnings: Decimal,
    pub loss: Decimal,
}

impl TaxReport {
    /// With a `tax_year`, only taxable records of that year are kept; records held
    /// longer than a year are left out.
    pub fn new(
        records: Vec<TaxRecord>,
        tax_year: Option<i32>,
        fiat: Currency,
    ) -> Result<Self, ArithmeticError> {
        let records: Vec<TaxRecord> = records
            .into_iter()
            .filter(|r| tax_year.is_none_or(|y| r.tax_year == y && !r.hold_longer_than_a_year))
            .collect();

        let mut earnings = Decimal::ZERO;
        let mut loss = Decimal::ZERO;
        for record in &records {
            let profit = precision::sub(
                precision::sub(record.sell_price, record.buy_price)?,
                record.advertising_costs,
            )?;
            if profit >= Decimal::ZERO {
                earnings = precision::add(earnings, profit)?;
            } else {
                loss = precision::add(loss, profit)?;
            }
        }

        Ok(TaxReport {
            tax_year,
            fiat,
            count: records.len(),
            records,
            earnings,
            loss,
        })
    }

    pub fn total(&self) -> Decimal {
        self.earnings + self.loss
    }
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Tax Year")]
    tax_year: i32,
    #[tabled(rename = "Hold >=1 Year")]
    hold: bool,
    #[tabled(rename = "Currency")]
    currency: String,
    #[tabled(rename = "Buy Date")]
    buy_date: String,
    #[tabled(rename = "Sell Date")]
    sell_date: String,
    #[tabled(rename = "Sell Price")]
    sell_price: String,
    #[tabled(rename = "Buy Price")]
    buy_price: String,
    #[tabled(rename = "Advertising Costs")]
    costs: String,
}

impl fmt::Display for TaxReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fiat = &self.fiat;
        if !self.records.is_empty() {
            let rows = self.records.iter().map(|r| ReportRow {
                tax_year: r.tax_year,
                hold: r.hold_longer_than_a_year,
                currency: r.currency.to_string(),
                buy_date: r.buy_timestamp.format(DATE_FORMAT).to_string(),
                sell_date: r.sell_timestamp.format(DATE_FORMAT).to_string(),
                sell_price: format_fiat(r.sell_price, fiat),
                buy_price: format_fiat(r.buy_price, fiat),
                costs: format_fiat(r.advertising_costs, fiat),
            });
            let table = Table::new(rows)
                .with(Style::psql())
                .with(Modify::new(Columns::new(5..)).with(Alignment::right()))
                .to_string();
            writeln!(f, "{}", table)?;
        }
        writeln!(f, "---")?;
        writeln!(f, "Count: {}", self.count)?;
        writeln!(f, "Earning: {}", format_fiat(self.earnings, fiat))?;
        writeln!(f, "Loss: {}", format_fiat(self.loss, fiat))?;
        write!(f, "Total: {}", format_fiat(self.total(), fiat))
    }
}

pub fn format_fiat(amount: Decimal, fiat: &Currency) -> String {
    format!("{:.2} {}", amount, fiat)
}
