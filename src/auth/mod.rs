//! User accounts and cookie sessions.

mod cookie;
mod log_in;
mod log_out;
mod middleware;
mod password;
mod register_user;

pub use cookie::{DEFAULT_COOKIE_DURATION, invalidate_auth_cookie, set_auth_cookie};
pub use log_in::post_log_in;
pub use log_out::get_log_out;
pub use middleware::auth_guard;
pub use password::{PasswordHash, ValidatedPassword};
pub use register_user::register_user;

#[cfg(test)]
pub use cookie::COOKIE_TOKEN;

#[cfg(test)]
pub use log_in::LogInData;

#[cfg(test)]
pub use register_user::RegisterData;
