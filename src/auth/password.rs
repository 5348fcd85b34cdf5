//! Password strength checks and bcrypt hashing.
//!
//! A raw password must pass [ValidatedPassword::new] before it can be turned
//! into a [PasswordHash], so weak passwords never reach the database.

use std::fmt::{self, Debug};

use zxcvbn::{Score, zxcvbn};

use crate::Error;

/// A raw password that is strong enough to be hashed and stored.
///
/// The password is masked when printed with `{:?}`, so it is safe to include
/// in log messages by accident.
#[derive(Clone, PartialEq)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Check that `raw_password` is hard to guess.
    ///
    /// # Errors
    ///
    /// Returns [Error::TooWeak] with a hint on how to improve the password if
    /// zxcvbn scores it below three.
    pub fn new(raw_password: &str) -> Result<Self, Error> {
        let entropy = zxcvbn(raw_password, &[]);

        if entropy.score() >= Score::Three {
            return Ok(Self(raw_password.to_owned()));
        }

        let mut hints: Vec<String> = Vec::new();

        if let Some(feedback) = entropy.feedback() {
            hints.extend(feedback.warning().map(|warning| warning.to_string()));
            hints.extend(feedback.suggestions().iter().map(ToString::to_string));
        }

        if hints.is_empty() {
            hints.push("Add more words or characters to make it harder to guess.".to_owned());
        }

        Err(Error::TooWeak(hints.join(" ")))
    }
}

impl Debug for ValidatedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValidatedPassword(********)")
    }
}

/// A bcrypt hash of a user's password, including its salt and cost.
#[derive(Debug, Clone, PartialEq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// The cost used for passwords hashed by the server.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Hash `password` with bcrypt at the given `cost`.
    ///
    /// Tests pass the minimum cost of 4 to keep hashing fast.
    ///
    /// # Errors
    ///
    /// Returns [Error::HashingError] if bcrypt rejects the cost.
    pub fn new(password: ValidatedPassword, cost: u32) -> Result<Self, Error> {
        let hash = bcrypt::hash(password.0, cost)
            .map_err(|error| Error::HashingError(error.to_string()))?;

        Ok(Self(hash))
    }

    /// Wrap a hash read back from the database.
    pub fn new_unchecked(stored_hash: &str) -> Self {
        Self(stored_hash.to_owned())
    }

    /// Check the strength of `raw_password` and hash it.
    ///
    /// # Errors
    ///
    /// Returns [Error::TooWeak] or [Error::HashingError].
    pub fn from_raw_password(raw_password: &str, cost: u32) -> Result<Self, Error> {
        Self::new(ValidatedPassword::new(raw_password)?, cost)
    }

    /// Whether `raw_password` is the password this hash was made from.
    ///
    /// # Errors
    ///
    /// Returns [Error::HashingError] if the stored hash is not a valid bcrypt hash.
    pub fn verify(&self, raw_password: &str) -> Result<bool, Error> {
        bcrypt::verify(raw_password, &self.0).map_err(|error| {
            tracing::error!("could not verify password against stored hash: {error}");
            Error::HashingError(error.to_string())
        })
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
