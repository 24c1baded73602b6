pub mod book;
pub mod matching;
pub mod pool;
pub mod precision;
pub mod tax;
pub mod transaction;
pub mod warnings;

pub use book::{Book, BookConfig};
pub use tax::{TaxRecord, TAX_FREE_AFTER_DAYS};
pub use transaction::{read_transactions_json, Currency, Transaction, TransactionInput};
pub use warnings::Warning;
