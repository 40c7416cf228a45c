//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`LaunchSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `LIFTOFF_*` environment variable overrides
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{LaunchSettings, LogFormat};

/// Env var naming an explicit settings file.
pub const CONFIG_PATH_ENV: &str = "LIFTOFF_CONFIG";

/// Resolve the settings file path.
///
/// `$LIFTOFF_CONFIG` wins; otherwise `~/.liftoff/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(explicit) = read_env_string(CONFIG_PATH_ENV) {
        return PathBuf::from(explicit);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".liftoff").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<LaunchSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<LaunchSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<LaunchSettings> {
    let defaults = serde_json::to_value(LaunchSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `LIFTOFF_*` environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (the file/default value stays).
pub fn apply_env_overrides(settings: &mut LaunchSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides using `lookup` as the variable source.
pub fn apply_overrides_from(settings: &mut LaunchSettings, lookup: impl Fn(&str) -> Option<String>) {
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = string("LIFTOFF_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = string("LIFTOFF_PORT") {
        if let Some(port) = checked("LIFTOFF_PORT", &v, parse_u16_range(&v, 1, 65535)) {
            settings.server.port = port;
        }
    }
    if let Some(v) = string("LIFTOFF_MAX_CONNECTIONS") {
        if let Some(n) = checked(
            "LIFTOFF_MAX_CONNECTIONS",
            &v,
            parse_usize_range(&v, 1, 100_000),
        ) {
            settings.server.max_connections = n;
        }
    }

    // ── Session ─────────────────────────────────────────────────────
    if let Some(v) = string("LIFTOFF_THRESHOLD") {
        if let Some(n) = checked("LIFTOFF_THRESHOLD", &v, parse_u32_range(&v, 1, 1_000_000)) {
            settings.session.threshold = n;
        }
    }

    // ── Access ──────────────────────────────────────────────────────
    if let Some(v) = string("LIFTOFF_ADMIN_TOKEN") {
        settings.access.admin_token = Some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("LIFTOFF_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = string("LIFTOFF_LOG_FORMAT") {
        if let Some(format) = checked("LIFTOFF_LOG_FORMAT", &v, LogFormat::parse(&v)) {
            settings.logging.format = format;
        }
    }
}

fn checked<T>(key: &str, raw: &str, parsed: Option<T>) -> Option<T> {
    if parsed.is_none() {
        warn!(key, value = %raw, "invalid env var, ignoring");
    }
    parsed
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
