// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./vitrina.toml` > `~/.config/vitrina/vitrina.toml` > `/etc/vitrina/vitrina.toml`
//! with environment variable overrides via `VITRINA_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::VitrinaConfig;

/// Config sections addressable from the environment. Order matters only for
/// sections sharing a prefix, so longer names come first.
const ENV_SECTIONS: &[&str] = &[
    "whatsapp",
    "inference",
    "gateway",
    "storage",
    "session",
    "timeout",
    "agent",
    "album",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/vitrina/vitrina.toml` (system-wide)
/// 3. `~/.config/vitrina/vitrina.toml` (user XDG config)
/// 4. `./vitrina.toml` (local directory)
/// 5. `VITRINA_*` environment variables
pub fn load_config() -> Result<VitrinaConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<VitrinaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VitrinaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<VitrinaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VitrinaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(VitrinaConfig::default()))
        .merge(Toml::file("/etc/vitrina/vitrina.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("vitrina/vitrina.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("vitrina.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `VITRINA_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `VITRINA_ALBUM_DEBOUNCE_MS` must map to `album.debounce_ms`.
fn env_provider() -> Env {
    Env::prefixed("VITRINA_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("album_debounce_ms"), "album.debounce_ms");
        assert_eq!(map_env_key("whatsapp_api_key"), "whatsapp.api_key");
        assert_eq!(
            map_env_key("timeout_warn_after_secs"),
            "timeout.warn_after_secs"
        );
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }
}
