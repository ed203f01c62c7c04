/*!
The errors callers of the core can tell apart.
*/
use thiserror::Error;

use crate::policy::DenyReason;
use crate::store::DbError;

#[derive(Debug, Error, PartialEq)]
pub enum HwError {
    /// A referenced account or homework doesn't exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate identity on registration, or a homework that changed
    /// underneath a transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed or out-of-range input.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("not permitted: {0}")]
    PolicyDenied(DenyReason),

    /// Email/password combination didn't check out.
    #[error("email or password is incorrect")]
    BadCredentials,

    /// Storage failure. The detail is for the log, not for the user.
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl HwError {
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        HwError::NotFound(what.into())
    }

    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        HwError::Validation(msg.into())
    }
}

impl From<DbError> for HwError {
    fn from(e: DbError) -> HwError {
        HwError::Unexpected(e.display().to_owned())
    }
}

impl From<DenyReason> for HwError {
    fn from(r: DenyReason) -> HwError {
        HwError::PolicyDenied(r)
    }
}
