//! Stack configuration (optional TOML file).
//!
//! Every field has a default, so an empty file (or no file) yields the
//! stock topology: 4096 MiB memory, 5 minute timeout, 4096 MiB ephemeral
//! storage, collection `video-similarity`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SynthError, SynthResult};
use crate::types::STACK_NAME;

/// OpenSearch Serverless caps policy and collection names at 32 characters.
pub const MAX_AOSS_NAME_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub stack_name: String,
    pub collection: CollectionConfig,
    pub compute: ComputeConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    pub memory_mib: u32,
    pub timeout_secs: u32,
    pub ephemeral_storage_mib: u32,
    /// Directory holding the container build context.
    pub image_asset_path: String,
    pub image_repository: String,
    pub image_tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub name: String,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: STACK_NAME.to_string(),
            collection: CollectionConfig::default(),
            compute: ComputeConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: "video-similarity".to_string(),
            description: "Collection for video similarity search".to_string(),
        }
    }
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            memory_mib: 4096,
            timeout_secs: 5 * 60,
            ephemeral_storage_mib: 4096,
            image_asset_path: "../lambda".to_string(),
            image_repository: "video-similarity".to_string(),
            image_tag: "latest".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            name: "Video Similarity API".to_string(),
        }
    }
}

impl StackConfig {
    pub fn from_file(path: &Path) -> SynthResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SynthError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> SynthResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Checks limits the provisioning engine would otherwise reject mid-deploy.
    pub fn validate(&self) -> SynthResult<()> {
        let mut errors = Vec::new();

        if self.stack_name.trim().is_empty() {
            errors.push("stack_name must not be empty".to_string());
        }

        let name = &self.collection.name;
        let valid_chars = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !(3..=MAX_AOSS_NAME_LEN).contains(&name.len())
            || !valid_chars
            || !name.starts_with(|c: char| c.is_ascii_lowercase())
        {
            errors.push(format!(
                "collection.name '{name}' must be 3-{MAX_AOSS_NAME_LEN} lowercase letters, digits or hyphens, starting with a letter"
            ));
        }
        for policy_name in [self.collection.access_policy_name(), self.collection.network_policy_name()] {
            if policy_name.len() > MAX_AOSS_NAME_LEN {
                errors.push(format!(
                    "derived policy name '{policy_name}' exceeds {MAX_AOSS_NAME_LEN} characters; shorten collection.name"
                ));
            }
        }

        let compute = &self.compute;
        if !(128..=10240).contains(&compute.memory_mib) {
            errors.push(format!("compute.memory_mib {} must be in 128..=10240", compute.memory_mib));
        }
        if !(1..=900).contains(&compute.timeout_secs) {
            errors.push(format!("compute.timeout_secs {} must be in 1..=900", compute.timeout_secs));
        }
        if !(512..=10240).contains(&compute.ephemeral_storage_mib) {
            errors.push(format!(
                "compute.ephemeral_storage_mib {} must be in 512..=10240",
                compute.ephemeral_storage_mib
            ));
        }
        if compute.image_repository.trim().is_empty() || compute.image_tag.trim().is_empty() {
            errors.push("compute.image_repository and compute.image_tag must not be empty".to_string());
        }

        if self.api.name.trim().is_empty() {
            errors.push("api.name must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SynthError::Config(errors.join("; ")))
        }
    }
}

impl CollectionConfig {
    pub fn access_policy_name(&self) -> String {
        format!("{}-access-policy", self.name)
    }

    pub fn network_policy_name(&self) -> String {
        format!("{}-network-policy", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = StackConfig::from_toml_str("").unwrap();
        assert_eq!(config, StackConfig::default());
        assert_eq!(config.compute.memory_mib, 4096);
        assert_eq!(config.compute.timeout_secs, 300);
        assert_eq!(config.compute.ephemeral_storage_mib, 4096);
        assert_eq!(config.collection.name, "video-similarity");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let toml_str = r#"
[compute]
memory_mib = 2048
image_tag = "v2"
"#;
        let config = StackConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.compute.memory_mib, 2048);
        assert_eq!(config.compute.image_tag, "v2");
        assert_eq!(config.compute.timeout_secs, 300);
        assert_eq!(config.api.name, "Video Similarity API");
    }

    #[test]
    fn test_policy_names_derive_from_collection() {
        let config = StackConfig::default();
        assert_eq!(config.collection.access_policy_name(), "video-similarity-access-policy");
        assert_eq!(config.collection.network_policy_name(), "video-similarity-network-policy");
    }

    #[test]
    fn test_validate_rejects_out_of_range_limits() {
        let mut config = StackConfig::default();
        config.compute.timeout_secs = 901;
        config.compute.memory_mib = 64;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("timeout_secs"));
        assert!(err.contains("memory_mib"));
    }

    #[test]
    fn test_validate_rejects_long_collection_name() {
        let mut config = StackConfig::default();
        config.collection.name = "video-similarity-long".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("derived policy name"));
    }

    #[test]
    fn test_unknown_field_type_is_parse_error() {
        let err = StackConfig::from_toml_str("[compute]\nmemory_mib = \"lots\"\n").unwrap_err();
        assert!(matches!(err, SynthError::ConfigParse(_)));
    }
}
