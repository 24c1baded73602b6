//! Records command - one row per lot/disposal match

use super::InputArgs;
use crate::core::{tax, TaxRecord};
use clap::Args;
use std::io;
use tabled::{settings::Style, Table, Tabled};

#[derive(Args, Debug)]
pub struct RecordsCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Only records of this tax year
    #[arg(short, long)]
    year: Option<i32>,

    /// Output as CSV
    #[arg(long, conflicts_with = "json")]
    csv: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Year")]
    tax_year: i32,
    #[tabled(rename = "Currency")]
    currency: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Bought")]
    bought: String,
    #[tabled(rename = "Sold")]
    sold: String,
    #[tabled(rename = "Buy Price")]
    buy_price: String,
    #[tabled(rename = "Sell Price")]
    sell_price: String,
    #[tabled(rename = "Costs")]
    costs: String,
    #[tabled(rename = "Profit")]
    profit: String,
    #[tabled(rename = "Exempt")]
    exempt: bool,
    #[tabled(rename = "Trade")]
    trade: bool,
}

impl RecordsCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let book = self.input.calculate(self.year)?;
        let records: Vec<TaxRecord> = book
            .tax_records()?
            .into_iter()
            .filter(|r| self.year.is_none_or(|y| r.tax_year == y))
            .collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else if self.csv {
            write_csv(&records, io::stdout())?;
        } else {
            self.print_table(&records);
        }
        Ok(())
    }

    fn print_table(&self, records: &[TaxRecord]) {
        let fiat = self.input.fiat();
        let rows = records.iter().map(|r| RecordRow {
            tax_year: r.tax_year,
            currency: r.currency.to_string(),
            quantity: crate::core::precision::format_quantity(r.quantity),
            bought: r.buy_timestamp.format("%Y-%m-%d").to_string(),
            sold: r.sell_timestamp.format("%Y-%m-%d").to_string(),
            buy_price: tax::format_fiat(r.buy_price, fiat),
            sell_price: tax::format_fiat(r.sell_price, fiat),
            costs: tax::format_fiat(r.advertising_costs, fiat),
            profit: tax::format_fiat(r.profit(), fiat),
            exempt: r.hold_longer_than_a_year,
            trade: r.paid_with_cryptocurrency,
        });
        println!("{}", Table::new(rows).with(Style::rounded()));
        println!("{} record(s)", records.len());
    }
}

fn write_csv<W: io::Write>(records: &[TaxRecord], writer: W) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}
