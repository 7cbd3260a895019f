//! Filesystem deployment sink.
//!
//! Installed packages live under the sink root:
//!
//! ```text
//! accounts/<owner>/      packages published under an owner's account
//! objects/<address>/     packages published to addressable objects
//! ```
//!
//! Each package directory holds `package.meta`, `modules/<index>.bin` and a
//! `manifest.json` describing the installed version. Packages are written to
//! a temporary sibling directory and swapped in by rename, so readers never
//! observe a half-written package.

use crate::error::{DeployError, DeployResult};
use crate::sink::{CommitKind, CommitReceipt, DeploymentSink};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stager_core::{ObjectAddress, OwnerId};
use stager_staging::Payload;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

const MANIFEST_FILE: &str = "manifest.json";
const METADATA_FILE: &str = "package.meta";
const MODULES_DIR: &str = "modules";

/// Description of an installed package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// Owner that published the package.
    pub owner: OwnerId,
    /// Object holding the package, for object packages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectAddress>,
    /// Installed version, starting at 1.
    pub version: u64,
    /// Metadata size in bytes.
    pub metadata_size: u64,
    /// SHA-256 of the metadata (hex).
    pub metadata_sha256: String,
    /// Installed modules in index order.
    pub modules: Vec<ModuleEntry>,
    /// When this version was installed.
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
}

/// One installed module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    /// Module index.
    pub index: u16,
    /// Module size in bytes.
    pub size: u64,
    /// SHA-256 of the module (hex).
    pub sha256: String,
}

/// Deployment sink installing packages into a local directory tree.
pub struct FilesystemSink {
    root: PathBuf,
    /// Serializes version read-modify-write cycles.
    install_lock: Mutex<()>,
}

impl FilesystemSink {
    /// Create a sink rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> DeployResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            install_lock: Mutex::new(()),
        })
    }

    /// Directory holding `owner`'s account package.
    pub fn account_dir(&self, owner: &OwnerId) -> PathBuf {
        self.root.join("accounts").join(owner.as_str())
    }

    /// Directory holding the package at `object`.
    pub fn object_dir(&self, object: &ObjectAddress) -> PathBuf {
        let hex = object.to_hex();
        self.root.join("objects").join(&hex[2..])
    }

    /// Manifest of the package installed under `owner`'s account.
    pub async fn account_manifest(&self, owner: &OwnerId) -> DeployResult<Option<PackageManifest>> {
        read_manifest(&self.account_dir(owner)).await
    }

    /// Manifest of the package installed at `object`.
    pub async fn object_manifest(
        &self,
        object: &ObjectAddress,
    ) -> DeployResult<Option<PackageManifest>> {
        read_manifest(&self.object_dir(object)).await
    }

    async fn install(
        &self,
        dir: &Path,
        kind: CommitKind,
        owner: &OwnerId,
        object: Option<ObjectAddress>,
        version: u64,
        payload: &Payload,
    ) -> DeployResult<CommitReceipt> {
        let manifest = PackageManifest {
            owner: owner.clone(),
            object,
            version,
            metadata_size: payload.metadata.len() as u64,
            metadata_sha256: sha256_hex(&payload.metadata),
            modules: payload
                .modules
                .iter()
                .enumerate()
                .map(|(index, module)| ModuleEntry {
                    index: index as u16,
                    size: module.len() as u64,
                    sha256: sha256_hex(module),
                })
                .collect(),
            published_at: OffsetDateTime::now_utc(),
        };

        write_package(dir, &manifest, payload).await?;

        tracing::info!(
            owner = %owner,
            kind = %kind,
            version,
            path = %dir.display(),
            "Package installed"
        );

        Ok(CommitReceipt {
            kind,
            owner: owner.clone(),
            object,
            version,
            module_count: payload.modules.len(),
            total_bytes: payload.total_bytes(),
        })
    }
}

#[async_trait]
impl DeploymentSink for FilesystemSink {
    #[instrument(skip(self, payload), fields(sink = "filesystem", modules = payload.modules.len()))]
    async fn publish_to_account(
        &self,
        owner: &OwnerId,
        payload: &Payload,
    ) -> DeployResult<CommitReceipt> {
        let _lock = self.install_lock.lock().await;
        let dir = self.account_dir(owner);
        let version = read_manifest(&dir).await?.map_or(1, |m| m.version + 1);
        self.install(&dir, CommitKind::Account, owner, None, version, payload)
            .await
    }

    #[instrument(skip(self, payload), fields(sink = "filesystem", modules = payload.modules.len()))]
    async fn publish_to_object(
        &self,
        owner: &OwnerId,
        payload: &Payload,
    ) -> DeployResult<CommitReceipt> {
        let _lock = self.install_lock.lock().await;
        let object = ObjectAddress::derive(owner, Uuid::new_v4().as_bytes());
        let dir = self.object_dir(&object);
        if fs::try_exists(&dir).await? {
            return Err(DeployError::Rejected(format!(
                "object {object} already exists"
            )));
        }
        self.install(&dir, CommitKind::NewObject, owner, Some(object), 1, payload)
            .await
    }

    #[instrument(skip(self, payload), fields(sink = "filesystem", modules = payload.modules.len()))]
    async fn upgrade_object(
        &self,
        owner: &OwnerId,
        payload: &Payload,
        object: &ObjectAddress,
    ) -> DeployResult<CommitReceipt> {
        let _lock = self.install_lock.lock().await;
        let dir = self.object_dir(object);
        let current = read_manifest(&dir)
            .await?
            .ok_or_else(|| DeployError::ObjectNotFound(object.to_hex()))?;
        if &current.owner != owner {
            return Err(DeployError::NotObjectOwner {
                address: object.to_hex(),
                owner: current.owner.to_string(),
                caller: owner.to_string(),
            });
        }
        self.install(
            &dir,
            CommitKind::UpgradeObject,
            owner,
            Some(*object),
            current.version + 1,
            payload,
        )
        .await
    }
}

fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

async fn read_manifest(dir: &Path) -> DeployResult<Option<PackageManifest>> {
    match fs::read(dir.join(MANIFEST_FILE)).await {
        Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write to a file and fsync it before returning.
async fn write_file(path: &Path, data: &[u8]) -> DeployResult<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

/// Write a package next to `dir` and swap it into place.
async fn write_package(
    dir: &Path,
    manifest: &PackageManifest,
    payload: &Payload,
) -> DeployResult<()> {
    let (parent, name) = split_package_dir(dir)?;
    fs::create_dir_all(parent).await?;

    let temp = parent.join(format!(".{name}.tmp.{}", Uuid::new_v4()));
    let result = match write_package_files(&temp, manifest, payload).await {
        Ok(()) => swap_into_place(&temp, dir).await,
        Err(e) => Err(e),
    };
    if result.is_err()
        && let Err(e) = fs::remove_dir_all(&temp).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(
            path = %temp.display(),
            error = %e,
            "Failed to remove partial package"
        );
    }
    result
}

/// Move the package at `temp` to `dir`, replacing any package already there.
///
/// If the new package cannot be moved in, the previous one is put back.
async fn swap_into_place(temp: &Path, dir: &Path) -> DeployResult<()> {
    if !fs::try_exists(dir).await? {
        fs::rename(temp, dir).await?;
        return Ok(());
    }

    let (parent, name) = split_package_dir(dir)?;
    let retired = parent.join(format!(".{name}.old.{}", Uuid::new_v4()));
    fs::rename(dir, &retired).await?;
    if let Err(e) = fs::rename(temp, dir).await {
        if let Err(restore_err) = fs::rename(&retired, dir).await {
            tracing::error!(
                path = %dir.display(),
                retired = %retired.display(),
                error = %restore_err,
                "Failed to restore replaced package"
            );
        }
        return Err(e.into());
    }

    if let Err(e) = fs::remove_dir_all(&retired).await {
        tracing::warn!(
            path = %retired.display(),
            error = %e,
            "Failed to remove replaced package"
        );
    }
    Ok(())
}

fn split_package_dir(dir: &Path) -> DeployResult<(&Path, String)> {
    let parent = dir.parent().ok_or_else(|| {
        DeployError::Config(format!("package dir has no parent: {}", dir.display()))
    })?;
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            DeployError::Config(format!("package dir has no name: {}", dir.display()))
        })?;
    Ok((parent, name))
}

async fn write_package_files(
    dir: &Path,
    manifest: &PackageManifest,
    payload: &Payload,
) -> DeployResult<()> {
    let modules_dir = dir.join(MODULES_DIR);
    fs::create_dir_all(&modules_dir).await?;

    write_file(&dir.join(METADATA_FILE), &payload.metadata).await?;
    for (index, module) in payload.modules.iter().enumerate() {
        write_file(&modules_dir.join(format!("{index:05}.bin")), module).await?;
    }
    write_file(&dir.join(MANIFEST_FILE), &serde_json::to_vec_pretty(manifest)?).await?;
    Ok(())
}
