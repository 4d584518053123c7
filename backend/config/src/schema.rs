//! Configuration schema, typed for serde YAML deserialization.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use wor_core::InstanceConfig;

pub const DEFAULT_CONTACT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for a registry instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorConfig {
    #[serde(default)]
    pub federation: FederationConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// User ids holding the administrator capability
    #[serde(default)]
    pub admins: Vec<String>,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationConfig {
    /// Join the web of registries. Every federation operation is refused while false.
    #[serde(default)]
    pub enabled: bool,

    /// This instance's address without scheme, e.g. `registry.example.org`
    #[serde(default)]
    pub instance_url: String,

    /// Display name sent to partners
    #[serde(default)]
    pub instance_name: String,

    /// Upper bound on any single outbound partner call
    #[serde(default = "default_contact_timeout")]
    pub contact_timeout_secs: u64,

    /// Lifetime of a token issued for an in-flight handshake
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

fn default_contact_timeout() -> u64 {
    DEFAULT_CONTACT_TIMEOUT_SECS
}

fn default_token_ttl() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            instance_url: String::new(),
            instance_name: String::new(),
            contact_timeout_secs: DEFAULT_CONTACT_TIMEOUT_SECS,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

impl FederationConfig {
    pub fn contact_timeout(&self) -> Duration {
        Duration::from_secs(self.contact_timeout_secs)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// SQLite database holding partner records
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "wor.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { db_path: default_db_path() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for rolling JSON log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
        }
    }
}

impl InstanceConfig for WorConfig {
    fn is_federation_enabled(&self) -> bool {
        self.federation.enabled
    }

    fn this_instance_url(&self) -> String {
        self.federation.instance_url.trim().to_string()
    }

    fn this_instance_name(&self) -> String {
        self.federation.instance_name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config: WorConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, WorConfig::default());
        assert!(!config.is_federation_enabled());
        assert_eq!(config.federation.contact_timeout(), Duration::from_secs(30));
        assert_eq!(config.storage.db_path, "wor.db");
    }

    #[test]
    fn test_camel_case_yaml() {
        let yaml = r#"
federation:
  enabled: true
  instanceUrl: " registry.example.org "
  instanceName: Example Registry
  contactTimeoutSecs: 5
admins:
  - admin@example.org
"#;
        let config: WorConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.is_federation_enabled());
        assert_eq!(config.this_instance_url(), "registry.example.org");
        assert_eq!(config.this_instance_name(), "Example Registry");
        assert_eq!(config.federation.contact_timeout_secs, 5);
        assert_eq!(config.federation.token_ttl_secs, DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(config.admins, vec!["admin@example.org".to_string()]);
    }
}
