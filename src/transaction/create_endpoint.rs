//! Defines the endpoint for creating a new transaction.
use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Deserializer};
use serde_json::Number;

use crate::{
    AppState, Error,
    response_body::SuccessBody,
    transaction::{Transaction, TransactionBuilder, create_transaction_and_update_points},
    user::UserID,
    validation::{FieldError, JsonBody, check},
};

/// The minimum number of characters in a transaction title.
const TITLE_MIN_LENGTH: usize = 2;
/// The maximum number of characters in a transaction title.
const TITLE_MAX_LENGTH: usize = 80;

/// The state needed to create a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The JSON body for creating a transaction.
///
/// Fields are kept loose here so that every problem is reported as a field
/// error by [TransactionData::validate] rather than as a parse failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionData {
    /// `None` if the title was left out, `Some(None)` if it was `null`.
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Option<String>>,
    /// Any JSON number, whole floats such as `5.0` are accepted.
    #[serde(default)]
    pub points_change: Option<Number>,
}

/// Wraps any value that is present in the body, including `null`, in `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl TransactionData {
    /// Check every field and convert the data into a [TransactionBuilder].
    ///
    /// # Errors
    /// Returns an [Error::Validation] listing every invalid field.
    pub fn validate(self) -> Result<TransactionBuilder, Error> {
        let mut errors = Vec::new();

        let title = match self.title {
            None => None,
            Some(None) => {
                errors.push(FieldError::new("title", "Title must be a string"));
                None
            }
            Some(Some(title)) => {
                if !(TITLE_MIN_LENGTH..=TITLE_MAX_LENGTH).contains(&title_length(&title)) {
                    errors.push(FieldError::new(
                        "title",
                        format!(
                            "Title must be between {TITLE_MIN_LENGTH} and {TITLE_MAX_LENGTH} characters long"
                        ),
                    ));
                }

                Some(title)
            }
        };

        let points_change = match self.points_change.as_ref().map(whole_number) {
            None => {
                errors.push(FieldError::new("pointsChange", "Points change is required"));
                0
            }
            Some(None) => {
                errors.push(FieldError::new(
                    "pointsChange",
                    "Points change must be an integer",
                ));
                0
            }
            Some(Some(0)) => {
                errors.push(FieldError::new(
                    "pointsChange",
                    "Points change must be a non-zero integer",
                ));
                0
            }
            Some(Some(points_change)) => points_change,
        };

        check(errors)?;

        Ok(Transaction::build(points_change).title(title))
    }
}

/// The length of a title in code points.
///
/// Emoji and text presentation selectors (U+FE0F, U+FE0E) only change how the
/// previous character is drawn, so they are not counted.
fn title_length(title: &str) -> usize {
    title
        .chars()
        .filter(|c| !matches!(c, '\u{FE0E}' | '\u{FE0F}'))
        .count()
}

/// Convert `number` to an `i64` if it has no fractional part and fits.
fn whole_number(number: &Number) -> Option<i64> {
    if let Some(integer) = number.as_i64() {
        return Some(integer);
    }

    let float = number.as_f64()?;
    // 2^63 is exactly representable as a float but is one past `i64::MAX`.
    let in_range = float >= i64::MIN as f64 && float < i64::MAX as f64;

    (float.fract() == 0.0 && in_range).then_some(float as i64)
}

/// A route handler for creating a new transaction for the logged in user.
///
/// Inserts the transaction and adds its points change to the user's balance
/// atomically, then responds with the transaction and the new balance.
///
/// Responds with `400` if the body is invalid and `401` if the logged in user
/// no longer exists, in which case nothing is written.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(data): JsonBody<TransactionData>,
) -> Response {
    let builder = match data.validate() {
        Ok(builder) => builder,
        Err(error) => return error.into_response(),
    };

    let mut connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match create_transaction_and_update_points(user_id, builder, &mut connection) {
        Ok(created) => {
            tracing::info!(
                "Created transaction {} for user {user_id}, new balance is {} points",
                created.transaction.id,
                created.points
            );
            SuccessBody::new(created).into_response()
        }
        Err(error) => {
            tracing::error!("could not create transaction: {error}");
            error.into_response()
        }
    }
}
