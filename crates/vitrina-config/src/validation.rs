// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints that cannot be expressed via serde attributes,
//! such as timer orderings and non-zero intervals.

use crate::diagnostic::ConfigError;
use crate::model::VitrinaConfig;

/// Cache backends accepted by `storage.cache_backend`.
pub const CACHE_BACKENDS: &[&str] = &["sqlite", "memory"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &VitrinaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("gateway.host", "must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(
            "gateway.host",
            format!("`{host}` is not a valid IP address or hostname"),
        ));
    }

    if !config.gateway.webhook_path.starts_with('/') {
        errors.push(ConfigError::validation(
            "gateway.webhook_path",
            "must start with `/`",
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path",
            "must not be empty",
        ));
    }

    if !CACHE_BACKENDS.contains(&config.storage.cache_backend.as_str()) {
        errors.push(ConfigError::validation(
            "storage.cache_backend",
            format!(
                "`{}` is not one of: {}",
                config.storage.cache_backend,
                CACHE_BACKENDS.join(", ")
            ),
        ));
    }

    if config.agent.history_window == 0 {
        errors.push(ConfigError::validation(
            "agent.history_window",
            "must be at least 1",
        ));
    }

    if config.agent.search_limit == 0 {
        errors.push(ConfigError::validation(
            "agent.search_limit",
            "must be at least 1",
        ));
    }

    if config.session.ttl_secs == 0 {
        errors.push(ConfigError::validation("session.ttl_secs", "must be positive"));
    }

    if config.session.processed_ttl_secs == 0 {
        errors.push(ConfigError::validation(
            "session.processed_ttl_secs",
            "must be positive",
        ));
    }

    // The buffer must outlive its debounce timer or the flush finds nothing.
    if config.album.buffer_ttl_ms <= config.album.debounce_ms {
        errors.push(ConfigError::validation(
            "album.buffer_ttl_ms",
            format!(
                "must be greater than album.debounce_ms ({} <= {})",
                config.album.buffer_ttl_ms, config.album.debounce_ms
            ),
        ));
    }

    if config.album.lock_ttl_ms == 0 {
        errors.push(ConfigError::validation("album.lock_ttl_ms", "must be positive"));
    }

    if config.timeout.poll_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "timeout.poll_interval_secs",
            "must be positive",
        ));
    }

    if config.timeout.warn_after_secs == 0 {
        errors.push(ConfigError::validation(
            "timeout.warn_after_secs",
            "must be positive",
        ));
    }

    if config.timeout.close_after_secs == 0 {
        errors.push(ConfigError::validation(
            "timeout.close_after_secs",
            "must be positive",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error_for(errors: &[ConfigError], wanted: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { key, .. } if key == wanted))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&VitrinaConfig::default()).is_ok());
    }

    #[test]
    fn buffer_ttl_must_exceed_debounce() {
        let mut config = VitrinaConfig::default();
        config.album.debounce_ms = 5000;
        config.album.buffer_ttl_ms = 5000;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error_for(&errors, "album.buffer_ttl_ms"));
    }

    #[test]
    fn unknown_cache_backend_fails() {
        let mut config = VitrinaConfig::default();
        config.storage.cache_backend = "redis".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error_for(&errors, "storage.cache_backend"));
    }

    #[test]
    fn collects_every_error() {
        let mut config = VitrinaConfig::default();
        config.gateway.host = "".to_string();
        config.agent.history_window = 0;
        config.timeout.warn_after_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(has_error_for(&errors, "gateway.host"));
        assert!(has_error_for(&errors, "agent.history_window"));
        assert!(has_error_for(&errors, "timeout.warn_after_secs"));
    }

    #[test]
    fn hostname_and_ip_hosts_pass() {
        let mut config = VitrinaConfig::default();
        config.gateway.host = "0.0.0.0".to_string();
        assert!(validate_config(&config).is_ok());
        config.gateway.host = "bot.internal".to_string();
        assert!(validate_config(&config).is_ok());
        config.gateway.host = "bad host!".to_string();
        assert!(validate_config(&config).is_err());
    }
}
