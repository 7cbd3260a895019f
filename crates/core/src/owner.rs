//! Owner identities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of an owner identity in bytes.
pub const MAX_OWNER_LEN: usize = 128;

/// Opaque identity of the caller that owns a staging area.
///
/// The host decides what an owner is (an account, a user, a token subject).
/// Identities are restricted to a conservative ASCII alphabet because sinks
/// use them as storage path components.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    /// Create from a string, validating format.
    pub fn new(owner: impl Into<String>) -> crate::Result<Self> {
        let owner = owner.into();
        if owner.is_empty() {
            return Err(crate::Error::InvalidOwner(
                "owner cannot be empty".to_string(),
            ));
        }
        if owner.len() > MAX_OWNER_LEN {
            return Err(crate::Error::InvalidOwner(format!(
                "owner must be at most {MAX_OWNER_LEN} bytes, got {}",
                owner.len()
            )));
        }
        if owner.starts_with('.') {
            return Err(crate::Error::InvalidOwner(
                "owner cannot start with '.'".to_string(),
            ));
        }
        for c in owner.chars() {
            if !matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '@' | ':') {
                return Err(crate::Error::InvalidOwner(format!(
                    "invalid character in owner: {c:?}"
                )));
            }
        }
        Ok(Self(owner))
    }

    /// Get the identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the identity bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for OwnerId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for OwnerId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<OwnerId> for String {
    fn from(owner: OwnerId) -> Self {
        owner.0
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerId({})", self.0)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
