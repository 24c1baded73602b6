mod cmd;
mod core;
mod exchanges;

use clap::{Parser, Subcommand};

/// Capital gains of cryptocurrency trades, matched first-in first-out
#[derive(Parser, Debug)]
#[command(name = "cryptotax", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the ledger and the tax reports
    Report(cmd::report::ReportCommand),
    /// List the valued matches between buys and disposals
    Records(cmd::records::RecordsCommand),
    /// Report sales without cost basis and other data issues
    Validate(cmd::validate::ValidateCommand),
    /// Print the expected input formats
    Schema(cmd::schema::SchemaCommand),
}

impl Command {
    fn exec(&self) -> anyhow::Result<()> {
        match self {
            Command::Report(report) => report.exec(),
            Command::Records(records) => records.exec(),
            Command::Validate(validate) => validate.exec(),
            Command::Schema(schema) => schema.exec(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    cli.command.exec()
}
