//! Point transactions.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Database functions for recording transactions against a user's points
//! - The route handler for creating transactions

mod core;
mod create_endpoint;

pub use core::{
    CreatedTransaction, DEFAULT_TITLE, Transaction, TransactionBuilder,
    create_transaction_and_update_points, create_transaction_table, insert_transaction,
};
pub use create_endpoint::create_transaction_endpoint;

#[cfg(test)]
pub use core::{count_transactions, get_transaction};
