//! Config validation: field checks with user-friendly messages.

use thiserror::Error;
use wor_core::is_valid_address;

use crate::schema::WorConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A config validation finding with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &WorConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_federation(config, &mut report);
    validate_storage(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_federation(config: &WorConfig, report: &mut ValidationReport) {
    let fed = &config.federation;

    if fed.contact_timeout_secs == 0 {
        report.error("federation.contactTimeoutSecs", "must be > 0");
    }
    if fed.token_ttl_secs == 0 {
        report.error("federation.tokenTtlSecs", "must be > 0");
    } else if fed.token_ttl_secs < fed.contact_timeout_secs {
        report.warn(
            "federation.tokenTtlSecs",
            "shorter than contactTimeoutSecs; handshake tokens may expire mid-handshake",
        );
    }

    if !fed.enabled {
        return;
    }
    if !is_valid_address(&fed.instance_url) {
        // Not fatal: partners are recorded as NOT_CONTACTED until this is fixed.
        report.warn(
            "federation.instanceUrl",
            format!("'{}' is not a valid address; partners will not be contacted", fed.instance_url),
        );
    }
    if fed.instance_name.trim().is_empty() {
        report.warn("federation.instanceName", "No instance name; partners will see an empty name");
    }
    if config.admins.is_empty() {
        report.warn("admins", "No administrators configured; partners cannot be managed");
    }
}

fn validate_storage(config: &WorConfig, report: &mut ValidationReport) {
    if config.storage.db_path.trim().is_empty() {
        report.error("storage.dbPath", "Database path cannot be empty");
    }
}

fn validate_logging(config: &WorConfig, report: &mut ValidationReport) {
    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        report.warn(
            "logging.level",
            format!("Unknown level '{}'; expected one of {}", config.logging.level, LOG_LEVELS.join(", ")),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_config() -> WorConfig {
        let mut config = WorConfig::default();
        config.federation.enabled = true;
        config.federation.instance_url = "a.example.org".into();
        config.federation.instance_name = "Registry A".into();
        config.admins = vec!["admin".into()];
        config
    }

    #[test]
    fn test_default_config_is_valid() {
        let report = validate(&WorConfig::default());
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_enabled_config_is_clean() {
        let report = validate(&enabled_config());
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_bad_instance_url_is_warning() {
        let mut config = enabled_config();
        config.federation.instance_url = "not a url".into();
        let report = validate(&config);
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.path == "federation.instanceUrl"));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = enabled_config();
        config.federation.contact_timeout_secs = 0;
        let report = validate(&config);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "federation.contactTimeoutSecs");
    }

    #[test]
    fn test_short_ttl_warns() {
        let mut config = enabled_config();
        config.federation.contact_timeout_secs = 60;
        config.federation.token_ttl_secs = 10;
        let report = validate(&config);
        assert!(report.warnings.iter().any(|w| w.path == "federation.tokenTtlSecs"));
    }
}
