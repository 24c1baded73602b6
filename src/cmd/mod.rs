pub mod records;
pub mod report;
pub mod schema;
pub mod validate;

use crate::core::{
    read_transactions_json, Book, BookConfig, Currency, Transaction, TAX_FREE_AFTER_DAYS,
};
use crate::exchanges::{coinbase, kraken};
use anyhow::Context;
use chrono::{Datelike, Duration, Utc};
use clap::Args;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Where transactions come from and how they are evaluated
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Coinbase transaction history CSV (can be repeated)
    #[arg(long = "coinbase-csv", value_name = "FILE")]
    coinbase: Vec<PathBuf>,

    /// Kraken trades CSV (can be repeated)
    #[arg(long = "kraken-csv", value_name = "FILE")]
    kraken: Vec<PathBuf>,

    /// JSON file of transactions, "-" reads stdin
    #[arg(short, long, value_name = "FILE")]
    transactions: Option<PathBuf>,

    /// Currency lots are bought with and gains are reported in
    #[arg(long, default_value = "EUR")]
    fiat: Currency,

    /// Holding period in days after which a sale is tax free
    #[arg(long, default_value_t = TAX_FREE_AFTER_DAYS)]
    holding_days: i64,
}

impl InputArgs {
    /// Read every configured input, in the order Coinbase, Kraken, JSON.
    pub fn load_transactions(&self) -> anyhow::Result<Vec<Transaction>> {
        if self.coinbase.is_empty() && self.kraken.is_empty() && self.transactions.is_none() {
            anyhow::bail!(
                "No input given. Use --coinbase-csv, --kraken-csv or --transactions."
            );
        }

        let mut transactions = Vec::new();
        for path in &self.coinbase {
            let file = open(path)?;
            let txs = coinbase::read_csv(file, &self.fiat)
                .with_context(|| format!("importing {}", path.display()))?;
            transactions.extend(txs);
        }
        for path in &self.kraken {
            let file = open(path)?;
            let txs = kraken::read_csv(file, &self.fiat)
                .with_context(|| format!("importing {}", path.display()))?;
            transactions.extend(txs);
        }
        if let Some(path) = &self.transactions {
            transactions.extend(read_json(path)?);
        }

        log::info!("Loaded {} transactions", transactions.len());
        Ok(transactions)
    }

    /// Load all inputs and run the matching.
    pub fn calculate(&self, tax_year: Option<i32>) -> anyhow::Result<Book> {
        self.calculate_transactions(self.load_transactions()?, tax_year)
    }

    pub fn calculate_transactions(
        &self,
        transactions: Vec<Transaction>,
        tax_year: Option<i32>,
    ) -> anyhow::Result<Book> {
        let tax_free_after = Duration::try_days(self.holding_days)
            .filter(|_| self.holding_days >= 0)
            .with_context(|| format!("invalid holding period of {} days", self.holding_days))?;
        let config = BookConfig {
            fiat: self.fiat.clone(),
            tax_year: tax_year.unwrap_or_else(|| Utc::now().year() - 1),
            tax_free_after,
        };
        let mut book = Book::new(transactions, config)?;
        book.calculate().context("calculating gains")?;
        Ok(book)
    }

    pub fn fiat(&self) -> &Currency {
        &self.fiat
    }
}

fn open(path: &Path) -> anyhow::Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Read transactions JSON from a file, or from stdin with "-"
fn read_json(path: &Path) -> anyhow::Result<Vec<Transaction>> {
    if path.as_os_str() == "-" {
        let mut buffer = Vec::new();
        io::stdin().lock().read_to_end(&mut buffer)?;
        if buffer.is_empty() {
            anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
        }
        read_transactions_json(io::Cursor::new(buffer))
    } else {
        read_transactions_json(open(path)?)
            .with_context(|| format!("reading {}", path.display()))
    }
}
