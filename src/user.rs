//! Code for creating the user table, fetching users from the database and
//! reporting the current user's point balance.

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use email_address::EmailAddress;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{AppState, Error, auth::PasswordHash, response_body::SuccessBody};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
///
/// The password hash is never serialized so that a user can be returned to
/// the client as is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The email address the user logs in with.
    pub email: EmailAddress,
    /// The user's password hash.
    #[serde(skip_serializing)]
    pub password_hash: PasswordHash,
    /// The user's point balance.
    pub points: i64,
}

/// Create the user table.
///
/// `points` is nullable since older rows may not have a balance yet, readers
/// should treat `NULL` as zero points.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password TEXT NOT NULL,
                points INTEGER DEFAULT 0
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user with zero points into the database.
///
/// # Errors
///
/// Returns a:
/// - [Error::DuplicateEmail] if `email` is already registered,
/// - or [Error::SqlError] if some other SQL related error occurred.
pub fn create_user(
    email: EmailAddress,
    password_hash: PasswordHash,
    connection: &Connection,
) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (email, password, points) VALUES (?1, ?2, 0)",
        (email.as_str(), password_hash.as_ref()),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        email,
        password_hash,
        points: 0,
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user ([Error::NotFound]).
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, db_connection: &Connection) -> Result<User, Error> {
    db_connection
        .prepare("SELECT id, email, password, points FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user from the database that has the email address `email`.
///
/// # Errors
///
/// Returns a [Error::NotFound] error if there is no user with the specified
/// email or [Error::SqlError] if there are SQL related errors.
pub fn get_user_by_email(email: &EmailAddress, db_connection: &Connection) -> Result<User, Error> {
    db_connection
        .prepare("SELECT id, email, password, points FROM user WHERE email = :email")?
        .query_row(&[(":email", email.as_str())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the point balance of the user with the ID `user_id`.
///
/// A user whose points have never been set has zero points.
///
/// # Errors
///
/// Returns a [Error::NotFound] error if there is no user with the ID
/// `user_id` or [Error::SqlError] if there are SQL related errors.
pub fn get_user_points(user_id: UserID, connection: &Connection) -> Result<i64, Error> {
    let points: Option<i64> = connection
        .prepare("SELECT points FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], |row| row.get(0))?;

    Ok(points.unwrap_or(0))
}

/// Overwrite the point balance of the user with the ID `user_id`.
///
/// # Errors
///
/// Returns a [Error::NotFound] error if there is no user with the ID
/// `user_id` or [Error::SqlError] if there are SQL related errors.
pub fn set_user_points(user_id: UserID, points: i64, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET points = ?1 WHERE id = ?2",
        (points, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_id = row.get(0)?;
    let raw_email: String = row.get(1)?;
    let raw_password_hash: String = row.get(2)?;
    let points: Option<i64> = row.get(3)?;

    Ok(User {
        id: UserID::new(raw_id),
        email: EmailAddress::new_unchecked(raw_email),
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        points: points.unwrap_or(0),
    })
}

/// The state needed to look up users.
#[derive(Debug, Clone)]
pub struct UserState {
    /// The database connection for managing users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UserState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The payload returned by endpoints that describe a single user.
#[derive(Debug, Serialize)]
pub struct UserPayload {
    /// The user, without their password hash.
    pub user: User,
}

/// A route handler that returns the logged in user, including their point balance.
///
/// Responds with `401` if the session belongs to a user that no longer exists.
pub async fn get_current_user_endpoint(
    State(state): State<UserState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_user_by_id(user_id, &connection) {
        Ok(user) => SuccessBody::new(UserPayload { user }).into_response(),
        Err(Error::NotFound) => {
            tracing::warn!("session refers to user {user_id} which does not exist");
            Error::Unauthorized.into_response()
        }
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod user_tests {
    use std::str::FromStr;

    use email_address::EmailAddress;
    use rusqlite::Connection;

    use crate::{
        Error,
        auth::PasswordHash,
        user::{
            UserID, create_user, get_user_by_email, get_user_by_id, get_user_points,
            set_user_points,
        },
    };

    use super::create_user_table;

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");

        conn
    }

    fn email() -> EmailAddress {
        EmailAddress::from_str("hello@world.com").unwrap()
    }

    #[test]
    fn insert_user_succeeds() {
        let db_connection = get_db_connection();
        let password_hash = PasswordHash::new_unchecked("hunter2");

        let inserted_user = create_user(email(), password_hash.clone(), &db_connection).unwrap();

        assert!(inserted_user.id.as_i64() > 0);
        assert_eq!(inserted_user.email, email());
        assert_eq!(inserted_user.password_hash, password_hash);
        assert_eq!(inserted_user.points, 0);
    }

    #[test]
    fn insert_user_fails_on_duplicate_email() {
        let db_connection = get_db_connection();
        create_user(email(), PasswordHash::new_unchecked("hunter2"), &db_connection).unwrap();

        let result = create_user(email(), PasswordHash::new_unchecked("hunter3"), &db_connection);

        assert_eq!(result, Err(Error::DuplicateEmail));
    }

    #[test]
    fn get_user_fails_with_non_existent_id() {
        let db_connection = get_db_connection();

        let result = get_user_by_id(UserID::new(42), &db_connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn get_user_succeeds_with_existing_id() {
        let db_connection = get_db_connection();
        let test_user =
            create_user(email(), PasswordHash::new_unchecked("hunter2"), &db_connection).unwrap();

        let retrieved_user = get_user_by_id(test_user.id, &db_connection).unwrap();

        assert_eq!(retrieved_user, test_user);
    }

    #[test]
    fn get_user_by_email_succeeds() {
        let db_connection = get_db_connection();
        let test_user =
            create_user(email(), PasswordHash::new_unchecked("hunter2"), &db_connection).unwrap();

        let retrieved_user = get_user_by_email(&email(), &db_connection).unwrap();

        assert_eq!(retrieved_user, test_user);
    }

    #[test]
    fn null_points_read_as_zero() {
        let db_connection = get_db_connection();
        let test_user =
            create_user(email(), PasswordHash::new_unchecked("hunter2"), &db_connection).unwrap();
        db_connection
            .execute(
                "UPDATE user SET points = NULL WHERE id = ?1",
                (test_user.id.as_i64(),),
            )
            .unwrap();

        let retrieved_user = get_user_by_id(test_user.id, &db_connection).unwrap();

        assert_eq!(retrieved_user.points, 0);
    }

    #[test]
    fn set_and_get_points() {
        let db_connection = get_db_connection();
        let test_user =
            create_user(email(), PasswordHash::new_unchecked("hunter2"), &db_connection).unwrap();

        set_user_points(test_user.id, -42, &db_connection).unwrap();

        assert_eq!(get_user_points(test_user.id, &db_connection), Ok(-42));
    }

    #[test]
    fn get_points_fails_with_non_existent_id() {
        let db_connection = get_db_connection();

        let result = get_user_points(UserID::new(42), &db_connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn set_points_fails_with_non_existent_id() {
        let db_connection = get_db_connection();

        let result = set_user_points(UserID::new(42), 10, &db_connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn serialized_user_omits_password_hash() {
        let db_connection = get_db_connection();
        let test_user =
            create_user(email(), PasswordHash::new_unchecked("hunter2"), &db_connection).unwrap();

        let json = serde_json::to_value(&test_user).unwrap();

        assert_eq!(
            json,
            serde_json::json!({ "id": test_user.id.as_i64(), "email": "hello@world.com", "points": 0 })
        );
    }
}
