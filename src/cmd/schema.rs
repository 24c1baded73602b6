//! Schema command - print expected input formats

use crate::core::TransactionInput;
use crate::exchanges::{coinbase, kraken, CsvColumn};
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Input format to describe
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the --transactions input
    JsonSchema,
    /// Columns of the Coinbase transaction history CSV
    Coinbase,
    /// Columns read from the Kraken trades CSV
    Kraken,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => {
                let schema = schema_for!(TransactionInput);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::Coinbase => {
                print_columns(
                    "Coinbase CSV Format (no header, columns by position)",
                    coinbase::Record::csv_columns(),
                );
                println!();
                println!("Rows with another field count or without a date are skipped.");
            }
            SchemaFormat::Kraken => {
                print_columns(
                    "Kraken CSV Format (columns by header name)",
                    kraken::Record::csv_columns(),
                );
                println!();
                println!("Other columns of the export are ignored.");
            }
        }
        Ok(())
    }
}

fn print_columns(title: &str, columns: &[CsvColumn]) {
    println!("{}", title);
    println!("{}", "=".repeat(title.len()));
    println!();
    for column in columns {
        let req = if column.required { "required" } else { "optional" };
        println!(
            "{:>2}. {:50} ({:8})  {}",
            column.position + 1,
            column.name,
            req,
            column.description
        );
    }
}
