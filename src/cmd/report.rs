//! Report command - ledger and gains per tax year

use super::InputArgs;
use clap::Args;

#[derive(Args, Debug)]
pub struct ReportCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Tax year to report (defaults to the previous calendar year)
    #[arg(short = 'y', long)]
    tax_year: Option<i32>,

    /// Only print the report over all years
    #[arg(long)]
    full: bool,

    /// Do not print the ledger of lots and sales
    #[arg(long)]
    no_ledger: bool,
}

impl ReportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let book = self.input.calculate(self.tax_year)?;

        if !self.no_ledger {
            println!("{}", book);
        }

        println!("TAX REPORT Full");
        println!("{}", book.tax_report(true)?);

        if !self.full {
            println!();
            println!("TAX REPORT {}", book.config().tax_year);
            println!("{}", book.tax_report(false)?);
        }

        let warnings = book.warnings().len();
        if warnings > 0 {
            log::warn!("{} warning(s), see `cryptotax validate` for details", warnings);
        }
        Ok(())
    }
}
