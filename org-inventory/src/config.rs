use crate::error::{InventoryError, InventoryResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Organizations serves at most 20 results per page for every list call used here.
pub const MAX_PAGE_SIZE: i32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub credentials: CredentialSource,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    #[serde(default = "default_pacing")]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub output: OutputPaths
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialSource {
    #[default]
    Default,
    Profile {
        name: String
    },
    StaticKeys {
        access_key_id: String,
        secret_access_key: String
    }
}

/// Timing knobs for the fetcher and the tree walker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    pub min_call_interval_ms: u64,
    pub initial_backoff_ms: u64,
    pub ou_visit_pause_ms: u64,
    pub soft_error_pause_ms: u64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPaths {
    pub account_list: PathBuf,
    pub account_detail: PathBuf,
    pub orgs_detail: PathBuf
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_page_size() -> i32 {
    MAX_PAGE_SIZE
}

fn default_pacing() -> PacingConfig {
    PacingConfig {
        min_call_interval_ms: 1000,
        initial_backoff_ms: 1000,
        ou_visit_pause_ms: 100,
        soft_error_pause_ms: 1000
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        default_pacing()
    }
}

impl PacingConfig {
    pub fn min_call_interval(&self) -> Duration {
        Duration::from_millis(self.min_call_interval_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn ou_visit_pause(&self) -> Duration {
        Duration::from_millis(self.ou_visit_pause_ms)
    }

    pub fn soft_error_pause(&self) -> Duration {
        Duration::from_millis(self.soft_error_pause_ms)
    }
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            account_list: PathBuf::from("aws_account_list.csv"),
            account_detail: PathBuf::from("aws_account_detail.txt"),
            orgs_detail: PathBuf::from("aws_orgs_detail.txt")
        }
    }
}

impl OutputPaths {
    /// Default file names placed under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let defaults = Self::default();
        Self {
            account_list: dir.join(defaults.account_list),
            account_detail: dir.join(defaults.account_detail),
            orgs_detail: dir.join(defaults.orgs_detail)
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            credentials: CredentialSource::Default,
            region: default_region(),
            page_size: default_page_size(),
            pacing: default_pacing(),
            output: OutputPaths::default()
        }
    }
}

impl InventoryConfig {
    pub fn validate(&self) -> InventoryResult<()> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(InventoryError::Config(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }

        if self.region.trim().is_empty() {
            return Err(InventoryError::Config("region must not be empty".to_string()));
        }

        match &self.credentials {
            CredentialSource::Profile { name } if name.trim().is_empty() => Err(
                InventoryError::Config("profile name must not be empty".to_string())
            ),
            CredentialSource::StaticKeys {
                access_key_id,
                secret_access_key
            } if access_key_id.is_empty() || secret_access_key.is_empty() => {
                Err(InventoryError::Config(
                    "access key id and secret access key must both be set".to_string()
                ))
            }
            _ => Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_collector_constants() {
        let config = InventoryConfig::default();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.pacing.min_call_interval(), Duration::from_secs(1));
        assert_eq!(config.pacing.initial_backoff(), Duration::from_secs(1));
        assert_eq!(config.pacing.ou_visit_pause(), Duration::from_millis(100));
        assert_eq!(
            config.output.account_list,
            PathBuf::from("aws_account_list.csv")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_page_size_out_of_range() {
        let mut config = InventoryConfig::default();
        config.page_size = 0;
        assert!(config.validate().is_err());

        config.page_size = 21;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_half_key_pair() {
        let config = InventoryConfig {
            credentials: CredentialSource::StaticKeys {
                access_key_id: "AKIAEXAMPLE".to_string(),
                secret_access_key: String::new()
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(InventoryError::Config(_))));
    }

    #[test]
    fn test_output_paths_in_dir() {
        let paths = OutputPaths::in_dir("/tmp/inventory");
        assert_eq!(
            paths.orgs_detail,
            PathBuf::from("/tmp/inventory/aws_orgs_detail.txt")
        );
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: InventoryConfig =
            serde_json::from_str(r#"{"credentials": {"type": "profile", "name": "audit"}}"#)
                .unwrap();
        assert!(matches!(
            config.credentials,
            CredentialSource::Profile { ref name } if name == "audit"
        ));
        assert_eq!(config.page_size, 20);
        assert_eq!(config.pacing.soft_error_pause_ms, 1000);
    }
}
