//! The API endpoints URIs.

/// The route for registering a new user.
pub const USERS: &str = "/api/users";
/// The route for getting the logged in user.
pub const CURRENT_USER: &str = "/api/users/me";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/log_out";
/// The prefix the transaction routes are nested under.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route for creating a transaction, relative to [TRANSACTIONS].
pub const CREATE_TRANSACTION: &str = "/";
