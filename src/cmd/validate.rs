//! Validate command - surface data quality issues without generating full reports

use super::InputArgs;
use crate::core::Warning;
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// JSON output structure
#[derive(Debug, Serialize)]
struct ValidationOutput<'a> {
    transaction_count: usize,
    issue_count: usize,
    issues: &'a [Warning],
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let transactions = self.input.load_transactions()?;
        let transaction_count = transactions.len();
        let book = self.input.calculate_transactions(transactions, None)?;
        let issues = book.warnings();

        if self.json {
            let output = ValidationOutput {
                transaction_count,
                issue_count: issues.len(),
                issues,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_text(transaction_count, issues);
        }

        // Exit with code 1 if issues found
        if !issues.is_empty() {
            std::process::exit(1);
        }
        Ok(())
    }
}

fn print_text(transaction_count: usize, issues: &[Warning]) {
    println!();
    println!("VALIDATION RESULTS ({} transactions)", transaction_count);
    println!();

    if issues.is_empty() {
        println!("\u{2713} No issues found.");
        return;
    }

    println!("\u{26A0} {} issue(s) found:", issues.len());
    println!();
    for (i, issue) in issues.iter().enumerate() {
        println!("  {}. [{}] {}", i + 1, issue.kind(), issue.transaction_id());
        println!("     {}", issue);
        println!();
    }
}
