//! Caller identity for admin-only operations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An authenticated caller.
///
/// Authentication itself happens upstream; by the time a `Principal` exists
/// its uid has been verified. Authorization is a lookup in the admin registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    uid: String,
}

impl Principal {
    /// Wrap a verified uid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] if the uid is blank.
    pub fn new(uid: impl Into<String>) -> Result<Self> {
        let uid = uid.into().trim().to_string();
        if uid.is_empty() {
            return Err(Error::Unauthenticated);
        }
        Ok(Self { uid })
    }

    /// The caller's uid.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uid)
    }
}

/// Resolve an optional caller into an authenticated one.
///
/// # Errors
///
/// Returns [`Error::Unauthenticated`] if there is no caller.
pub fn require(caller: Option<&Principal>) -> Result<&Principal> {
    caller.ok_or(Error::Unauthenticated)
}
