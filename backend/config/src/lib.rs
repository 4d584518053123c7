//! `wor-config`: registry instance configuration.
//!
//! Provides:
//! - Typed config schema (federation, storage, logging, admins)
//! - YAML read/write
//! - `WOR_*` environment overrides
//! - Validation report
//! - A static administrator list implementing `AdminCapability`

pub mod admins;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use admins::StaticAdmins;
pub use env::{apply_env_overrides, apply_env_overrides_with, parse_flag, EnvOverrideError};
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use schema::{FederationConfig, LoggingConfig, StorageConfig, WorConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use std::path::Path;

use anyhow::{Context, Result};

/// Load the config file and apply `WOR_*` overrides, without validating.
pub async fn load_with_overrides(path: &Path) -> Result<WorConfig> {
    let config = load_config(path).await?;
    apply_env_overrides(config).context("Failed to apply WOR_* overrides")
}

/// Validate the config and log every finding.
pub fn check_and_log(config: &WorConfig) -> ValidationReport {
    let report = validate(config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    report
}

/// Validate and log the config, failing on the first error.
///
/// Returns the report so callers can still inspect the warnings.
pub fn ensure_valid(config: &WorConfig) -> Result<ValidationReport> {
    let mut report = check_and_log(config);
    if !report.errors.is_empty() {
        return Err(report.errors.swap_remove(0).into());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_valid_fails_on_first_error() {
        let mut config = WorConfig::default();
        config.federation.contact_timeout_secs = 0;
        config.storage.db_path = String::new();

        let err = ensure_valid(&config).unwrap_err();
        assert!(err.to_string().contains("federation.contactTimeoutSecs"));
    }

    #[test]
    fn test_ensure_valid_keeps_warnings() {
        let mut config = WorConfig::default();
        config.federation.enabled = true;
        config.federation.instance_url = "localhost".into();

        let report = ensure_valid(&config).unwrap();
        assert!(report.warnings.iter().any(|w| w.path == "federation.instanceUrl"));
    }
}
