//! Addresses of deployed objects.

use crate::owner::OwnerId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Domain separator mixed into derived object addresses.
const OBJECT_ADDRESS_DOMAIN: &[u8] = b"stager.object.v1";

/// Address of an addressable object holding a deployed package (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectAddress([u8; 32]);

impl ObjectAddress {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the address of a new object created by `owner` from `seed`.
    pub fn derive(owner: &OwnerId, seed: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(OBJECT_ADDRESS_DOMAIN);
        hasher.update((owner.as_bytes().len() as u64).to_be_bytes());
        hasher.update(owner.as_bytes());
        hasher.update(seed);
        Self(hasher.finalize().into())
    }

    /// Parse from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != 64 {
            return Err(crate::Error::InvalidAddress(format!(
                "expected 64 hex chars, got {}",
                digits.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in digits.as_bytes().chunks(2).enumerate() {
            let hex_str = std::str::from_utf8(chunk)
                .map_err(|e| crate::Error::InvalidAddress(e.to_string()))?;
            bytes[i] = u8::from_str_radix(hex_str, 16)
                .map_err(|e| crate::Error::InvalidAddress(e.to_string()))?;
        }
        Ok(Self(bytes))
    }

    /// Encode as lowercase hex with a `0x` prefix.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(66);
        out.push_str("0x");
        for b in self.0 {
            out.push_str(&format!("{b:02x}"));
        }
        out
    }
}

impl FromStr for ObjectAddress {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for ObjectAddress {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<ObjectAddress> for String {
    fn from(address: ObjectAddress) -> Self {
        address.to_hex()
    }
}

impl fmt::Debug for ObjectAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectAddress({})", &self.to_hex()[..18])
    }
}

impl fmt::Display for ObjectAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
