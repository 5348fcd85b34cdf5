//! Defines the core data models and database queries for point transactions.

use rusqlite::{Connection, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::TransactionId,
    user::{UserID, get_user_points, set_user_points},
};

/// The title given to transactions created without one.
pub const DEFAULT_TITLE: &str = "Untitled transaction";

// ============================================================================
// MODELS
// ============================================================================

/// A ledger entry recording a change to a user's points.
///
/// Transactions are immutable once created. To create a new `Transaction`,
/// use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user whose points were changed.
    pub user_id: UserID,
    /// A short description of what the points were for.
    pub title: String,
    /// How many points were added (positive) or taken away (negative).
    pub points_change: i64,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(points_change: i64) -> TransactionBuilder {
        TransactionBuilder {
            title: DEFAULT_TITLE.to_owned(),
            points_change,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// The title defaults to [DEFAULT_TITLE].
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// A short description of what the points were for.
    pub title: String,

    /// The number of points to add to the user's balance.
    ///
    /// Negative values take points away. Callers should ensure this is not zero,
    /// the database rejects zero point changes.
    pub points_change: i64,
}

impl TransactionBuilder {
    /// Set the title for the transaction, keeping the default title if `title` is `None`.
    pub fn title(mut self, title: Option<String>) -> Self {
        if let Some(title) = title {
            self.title = title;
        }

        self
    }
}

/// The result of recording a transaction against a user's points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedTransaction {
    /// The newly created transaction.
    pub transaction: Transaction,
    /// The user's point balance after the transaction was applied.
    pub points: i64,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Record a new transaction for `user_id` and add its points change to the
/// user's balance as a single atomic operation.
///
/// Either both the new transaction row and the updated balance are saved, or
/// neither is.
///
/// # Errors
/// This function will return a:
/// - [Error::Unauthorized] if `user_id` does not refer to an existing user,
/// - [Error::PointsOverflow] if the new balance does not fit in an `i64`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction_and_update_points(
    user_id: UserID,
    builder: TransactionBuilder,
    connection: &mut Connection,
) -> Result<CreatedTransaction, Error> {
    // Take the write lock up front since the balance is read and then written.
    let sql_transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let transaction = insert_transaction(user_id, builder, &sql_transaction)
        .map_err(|error| missing_user_as_unauthorized(error, user_id))?;

    let points = get_user_points(user_id, &sql_transaction)
        .map_err(|error| missing_user_as_unauthorized(error, user_id))?;
    let points = points
        .checked_add(transaction.points_change)
        .ok_or(Error::PointsOverflow)?;
    set_user_points(user_id, points, &sql_transaction)?;

    sql_transaction.commit()?;

    Ok(CreatedTransaction {
        transaction,
        points,
    })
}

fn missing_user_as_unauthorized(error: Error, user_id: UserID) -> Error {
    match error {
        Error::NotFound => {
            tracing::warn!("tried to create a transaction for user {user_id} which does not exist");
            Error::Unauthorized
        }
        error => error,
    }
}

/// Insert a new transaction for `user_id` into the database.
///
/// This does not touch the user's point balance, use
/// [create_transaction_and_update_points] for that.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `user_id` does not refer to an existing user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn insert_transaction(
    user_id: UserID,
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\" (user_id, title, points_change, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, user_id, title, points_change, created_at",
        )?
        .query_row(
            (
                user_id.as_i64(),
                builder.title,
                builder.points_change,
                OffsetDateTime::now_utc(),
            ),
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => error.into(),
        })?;

    Ok(transaction)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
#[cfg(test)]
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, user_id, title, points_change, created_at FROM \"transaction\" WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
#[cfg(test)]
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// Requires the user table to exist.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                points_change INTEGER NOT NULL CHECK (points_change != 0),
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user ON \"transaction\"(user_id);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = UserID::new(row.get(1)?);
    let title = row.get(2)?;
    let points_change = row.get(3)?;
    let created_at = row.get(4)?;

    Ok(Transaction {
        id,
        user_id,
        title,
        points_change,
        created_at,
    })
}

// ============================================================================
// TESTS
// ============================================================================
