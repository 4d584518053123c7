//! `WOR_*` environment overrides applied on top of the config file.
//!
//! | Variable | Field |
//! |---|---|
//! | `WOR_JOIN_WEB_OF_REGISTRIES` | `federation.enabled` (`yes`/`true`/`no`/`false`) |
//! | `WOR_INSTANCE_URL` | `federation.instanceUrl` |
//! | `WOR_INSTANCE_NAME` | `federation.instanceName` |
//! | `WOR_CONTACT_TIMEOUT_SECS` | `federation.contactTimeoutSecs` |
//! | `WOR_TOKEN_TTL_SECS` | `federation.tokenTtlSecs` |
//! | `WOR_DB` | `storage.dbPath` |
//! | `WOR_LOG_LEVEL` | `logging.level` |
//! | `WOR_LOG_DIR` | `logging.dir` |
//! | `WOR_ADMINS` | `admins` (comma separated) |

use std::collections::HashMap;

use thiserror::Error;

use crate::schema::WorConfig;

#[derive(Debug, Error)]
#[error("Invalid value {value:?} for env var {var_name}: expected {expected}")]
pub struct EnvOverrideError {
    pub var_name: String,
    pub value: String,
    pub expected: &'static str,
}

/// Parse a yes/no style flag. `None` if the value is not recognized.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" | "on" => Some(true),
        "no" | "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: WorConfig) -> Result<WorConfig, EnvOverrideError> {
    apply_env_overrides_with(config, &std::env::vars().collect())
}

/// Apply overrides from the given map (useful for testing).
pub fn apply_env_overrides_with(
    mut config: WorConfig,
    env: &HashMap<String, String>,
) -> Result<WorConfig, EnvOverrideError> {
    let get = |name: &str| env.get(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("WOR_JOIN_WEB_OF_REGISTRIES") {
        config.federation.enabled = parse_flag(v).ok_or_else(|| EnvOverrideError {
            var_name: "WOR_JOIN_WEB_OF_REGISTRIES".into(),
            value: v.clone(),
            expected: "yes/true or no/false",
        })?;
    }
    if let Some(v) = get("WOR_INSTANCE_URL") {
        config.federation.instance_url = v.trim().to_string();
    }
    if let Some(v) = get("WOR_INSTANCE_NAME") {
        config.federation.instance_name = v.clone();
    }
    if let Some(v) = get("WOR_CONTACT_TIMEOUT_SECS") {
        config.federation.contact_timeout_secs = parse_secs("WOR_CONTACT_TIMEOUT_SECS", v)?;
    }
    if let Some(v) = get("WOR_TOKEN_TTL_SECS") {
        config.federation.token_ttl_secs = parse_secs("WOR_TOKEN_TTL_SECS", v)?;
    }
    if let Some(v) = get("WOR_DB") {
        config.storage.db_path = v.clone();
    }
    if let Some(v) = get("WOR_LOG_LEVEL") {
        config.logging.level = v.clone();
    }
    if let Some(v) = get("WOR_LOG_DIR") {
        config.logging.dir = v.clone();
    }
    if let Some(v) = get("WOR_ADMINS") {
        config.admins = v
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();
    }

    Ok(config)
}

fn parse_secs(var_name: &str, value: &str) -> Result<u64, EnvOverrideError> {
    value.trim().parse().map_err(|_| EnvOverrideError {
        var_name: var_name.to_string(),
        value: value.to_string(),
        expected: "a whole number of seconds",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_join_flag_accepts_yes_and_true() {
        for value in ["yes", "TRUE", "Yes"] {
            let config =
                apply_env_overrides_with(WorConfig::default(), &env(&[("WOR_JOIN_WEB_OF_REGISTRIES", value)]))
                    .unwrap();
            assert!(config.federation.enabled, "{value} should enable federation");
        }
    }

    #[test]
    fn test_join_flag_rejects_garbage() {
        let err = apply_env_overrides_with(WorConfig::default(), &env(&[("WOR_JOIN_WEB_OF_REGISTRIES", "maybe")]))
            .unwrap_err();
        assert_eq!(err.var_name, "WOR_JOIN_WEB_OF_REGISTRIES");
    }

    #[test]
    fn test_overrides_all_fields() {
        let config = apply_env_overrides_with(
            WorConfig::default(),
            &env(&[
                ("WOR_INSTANCE_URL", " a.example.org "),
                ("WOR_INSTANCE_NAME", "Registry A"),
                ("WOR_CONTACT_TIMEOUT_SECS", "7"),
                ("WOR_TOKEN_TTL_SECS", "60"),
                ("WOR_DB", "/tmp/a.db"),
                ("WOR_LOG_LEVEL", "debug"),
                ("WOR_ADMINS", "root@a.example.org, ops@a.example.org,"),
            ]),
        )
        .unwrap();
        assert_eq!(config.federation.instance_url, "a.example.org");
        assert_eq!(config.federation.instance_name, "Registry A");
        assert_eq!(config.federation.contact_timeout_secs, 7);
        assert_eq!(config.federation.token_ttl_secs, 60);
        assert_eq!(config.storage.db_path, "/tmp/a.db");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.admins.len(), 2);
    }

    #[test]
    fn test_bad_timeout() {
        let result =
            apply_env_overrides_with(WorConfig::default(), &env(&[("WOR_CONTACT_TIMEOUT_SECS", "soon")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let mut base = WorConfig::default();
        base.federation.instance_url = "a.example.org".into();
        let config = apply_env_overrides_with(base, &env(&[("WOR_INSTANCE_URL", "  ")])).unwrap();
        assert_eq!(config.federation.instance_url, "a.example.org");
    }
}
