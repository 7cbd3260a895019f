//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Staging registry configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Maximum metadata plus chunk bytes buffered by one staging area.
    /// `None` disables the limit.
    #[serde(default = "default_max_staged_bytes")]
    pub max_staged_bytes: Option<u64>,
    /// Maximum number of distinct chunk indices in one staging area.
    /// `None` disables the limit.
    #[serde(default = "default_max_chunk_indices")]
    pub max_chunk_indices: Option<u32>,
}

fn default_max_staged_bytes() -> Option<u64> {
    Some(crate::DEFAULT_MAX_STAGED_BYTES)
}

fn default_max_chunk_indices() -> Option<u32> {
    Some(crate::DEFAULT_MAX_CHUNK_INDICES)
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            max_staged_bytes: default_max_staged_bytes(),
            max_chunk_indices: default_max_chunk_indices(),
        }
    }
}

impl StagingConfig {
    /// Configuration without any limits.
    pub fn unlimited() -> Self {
        Self {
            max_staged_bytes: None,
            max_chunk_indices: None,
        }
    }

    /// Validate staging configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_staged_bytes == Some(0) {
            return Err("max_staged_bytes must be greater than zero when set".to_string());
        }
        if self.max_chunk_indices == Some(0) {
            return Err("max_chunk_indices must be greater than zero when set".to_string());
        }
        Ok(())
    }
}

/// Deployment sink configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeployConfig {
    /// Install packages into a local directory tree.
    Filesystem {
        /// Root directory for installed packages.
        path: PathBuf,
    },
    /// Log what would be installed without installing anything.
    DryRun,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/packages"),
        }
    }
}

impl DeployConfig {
    /// Validate deployment configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            DeployConfig::Filesystem { path } if path.as_os_str().is_empty() => {
                Err("filesystem deploy config requires a non-empty 'path'".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Client-side upload configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Maximum payload bytes carried by a single stage call.
    #[serde(default = "default_max_call_bytes")]
    pub max_call_bytes: usize,
}

fn default_max_call_bytes() -> usize {
    crate::DEFAULT_MAX_CALL_BYTES
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_call_bytes: default_max_call_bytes(),
        }
    }
}

impl ClientConfig {
    /// Validate client configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_call_bytes == 0 {
            return Err("max_call_bytes must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Staging registry configuration.
    #[serde(default)]
    pub staging: StagingConfig,
    /// Deployment sink configuration.
    #[serde(default)]
    pub deploy: DeployConfig,
    /// Client-side upload configuration.
    #[serde(default)]
    pub client: ClientConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses the dry-run sink so nothing touches disk.
    pub fn for_testing() -> Self {
        Self {
            staging: StagingConfig::default(),
            deploy: DeployConfig::DryRun,
            client: ClientConfig::default(),
        }
    }

    /// Validate every section, prefixing errors with the section name.
    pub fn validate(&self) -> crate::Result<()> {
        self.staging
            .validate()
            .map_err(|e| crate::Error::Config(format!("staging: {e}")))?;
        self.deploy
            .validate()
            .map_err(|e| crate::Error::Config(format!("deploy: {e}")))?;
        self.client
            .validate()
            .map_err(|e| crate::Error::Config(format!("client: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_config_defaults() {
        let config = StagingConfig::default();
        assert_eq!(config.max_staged_bytes, Some(crate::DEFAULT_MAX_STAGED_BYTES));
        assert_eq!(config.max_chunk_indices, Some(crate::DEFAULT_MAX_CHUNK_INDICES));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_staging_config_missing_fields_use_defaults() {
        let config: StagingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_staged_bytes, Some(crate::DEFAULT_MAX_STAGED_BYTES));

        let config: StagingConfig =
            serde_json::from_str(r#"{"max_staged_bytes":null,"max_chunk_indices":8}"#).unwrap();
        assert_eq!(config.max_staged_bytes, None);
        assert_eq!(config.max_chunk_indices, Some(8));
    }

    #[test]
    fn test_staging_config_rejects_zero_limits() {
        let config = StagingConfig {
            max_staged_bytes: Some(0),
            max_chunk_indices: None,
        };
        assert!(config.validate().is_err());

        let config = StagingConfig {
            max_staged_bytes: None,
            max_chunk_indices: Some(0),
        };
        assert!(config.validate().is_err());
        assert!(StagingConfig::unlimited().validate().is_ok());
    }

    #[test]
    fn test_deploy_config_tagged_roundtrip() {
        let json = r#"{"type":"filesystem","path":"/var/lib/stager"}"#;
        let config: DeployConfig = serde_json::from_str(json).unwrap();
        match &config {
            DeployConfig::Filesystem { path } => {
                assert_eq!(path, &PathBuf::from("/var/lib/stager"));
            }
            _ => panic!("expected filesystem config"),
        }

        let config: DeployConfig = serde_json::from_str(r#"{"type":"dryrun"}"#).unwrap();
        assert!(matches!(config, DeployConfig::DryRun));
    }

    #[test]
    fn test_deploy_config_validate_empty_path() {
        let config = DeployConfig::Filesystem {
            path: PathBuf::new(),
        };
        assert!(config.validate().is_err());
        assert!(DeployConfig::default().validate().is_ok());
    }

    #[test]
    fn test_app_config_validate_reports_section() {
        let mut config = AppConfig::for_testing();
        assert!(config.validate().is_ok());

        config.client.max_call_bytes = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("client"), "unexpected error: {err}");
    }
}
