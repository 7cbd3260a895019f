//! Deployment sink trait and commit targets.

use crate::error::{DeployError, DeployResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stager_core::{ObjectAddress, OwnerId};
use stager_staging::Payload;
use std::fmt;
use std::str::FromStr;

/// Which kind of deployment a commit performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommitKind {
    /// Publish under the owner's own account.
    #[serde(rename = "account")]
    Account,
    /// Publish to a newly created object owned by the caller.
    #[serde(rename = "object")]
    NewObject,
    /// Replace the package at an existing object.
    #[serde(rename = "upgrade")]
    UpgradeObject,
}

impl CommitKind {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::NewObject => "object",
            Self::UpgradeObject => "upgrade",
        }
    }
}

impl fmt::Display for CommitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitKind {
    type Err = DeployError;

    fn from_str(s: &str) -> DeployResult<Self> {
        match s {
            "account" => Ok(Self::Account),
            "object" => Ok(Self::NewObject),
            "upgrade" => Ok(Self::UpgradeObject),
            other => Err(DeployError::Config(format!(
                "unknown commit target '{other}' (expected account, object or upgrade)"
            ))),
        }
    }
}

/// Destination of a commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitTarget {
    /// Publish under the owner's own account.
    Account,
    /// Publish to a newly created object owned by the caller.
    NewObject,
    /// Replace the package at an existing object.
    UpgradeObject(ObjectAddress),
}

impl CommitTarget {
    /// Build a target from a kind and an optional object address.
    ///
    /// Upgrades require an address; the other kinds reject one.
    pub fn from_kind(kind: CommitKind, object: Option<ObjectAddress>) -> DeployResult<Self> {
        match (kind, object) {
            (CommitKind::Account, None) => Ok(Self::Account),
            (CommitKind::NewObject, None) => Ok(Self::NewObject),
            (CommitKind::UpgradeObject, Some(address)) => Ok(Self::UpgradeObject(address)),
            (CommitKind::UpgradeObject, None) => Err(DeployError::MissingObjectAddress),
            (kind, Some(address)) => Err(DeployError::Config(format!(
                "object address {address} only applies to upgrades, not '{kind}'"
            ))),
        }
    }

    /// The kind of this target.
    pub fn kind(&self) -> CommitKind {
        match self {
            Self::Account => CommitKind::Account,
            Self::NewObject => CommitKind::NewObject,
            Self::UpgradeObject(_) => CommitKind::UpgradeObject,
        }
    }
}

/// What a sink reports after installing a package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// Kind of deployment performed.
    pub kind: CommitKind,
    /// Owner that published.
    pub owner: OwnerId,
    /// Object holding the package (object targets only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectAddress>,
    /// Package version assigned by the sink (starts at 1, bumps on republish).
    pub version: u64,
    /// Number of modules installed.
    pub module_count: usize,
    /// Metadata plus module bytes installed.
    pub total_bytes: u64,
}

/// External service that installs assembled packages.
///
/// Metadata and module bytes are opaque to the staging engine and are handed
/// to the sink unmodified.
#[async_trait]
pub trait DeploymentSink: Send + Sync + 'static {
    /// Install the package under `owner`'s own account.
    async fn publish_to_account(
        &self,
        owner: &OwnerId,
        payload: &Payload,
    ) -> DeployResult<CommitReceipt>;

    /// Create a new object owned by `owner` and install the package there.
    async fn publish_to_object(
        &self,
        owner: &OwnerId,
        payload: &Payload,
    ) -> DeployResult<CommitReceipt>;

    /// Replace the package at an existing object owned by `owner`.
    async fn upgrade_object(
        &self,
        owner: &OwnerId,
        payload: &Payload,
        object: &ObjectAddress,
    ) -> DeployResult<CommitReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_kind_parse() {
        for kind in [
            CommitKind::Account,
            CommitKind::NewObject,
            CommitKind::UpgradeObject,
        ] {
            assert_eq!(kind.as_str().parse::<CommitKind>().unwrap(), kind);
        }
        assert!("publish".parse::<CommitKind>().is_err());
    }

    #[test]
    fn test_target_from_kind() {
        let address = ObjectAddress::from_bytes([7; 32]);
        assert_eq!(
            CommitTarget::from_kind(CommitKind::UpgradeObject, Some(address)).unwrap(),
            CommitTarget::UpgradeObject(address)
        );
        assert!(matches!(
            CommitTarget::from_kind(CommitKind::UpgradeObject, None),
            Err(DeployError::MissingObjectAddress)
        ));
        assert!(matches!(
            CommitTarget::from_kind(CommitKind::Account, Some(address)),
            Err(DeployError::Config(_))
        ));
        assert_eq!(
            CommitTarget::from_kind(CommitKind::NewObject, None)
                .unwrap()
                .kind(),
            CommitKind::NewObject
        );
    }

    #[test]
    fn test_receipt_json_omits_missing_object() {
        let receipt = CommitReceipt {
            kind: CommitKind::Account,
            owner: OwnerId::new("alice").unwrap(),
            object: None,
            version: 1,
            module_count: 2,
            total_bytes: 10,
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["kind"], "account");
        assert!(json.get("object").is_none());
    }
}
