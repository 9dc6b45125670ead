//! Reading the settings file and the `TIDE_*` environment.
//!
//! The file is merged over the serialized defaults before deserializing, so
//! it only needs the keys it changes. Nested objects merge per key, anything
//! else (arrays included) is replaced, and `null` leaves the default alone.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::TideSettings;

/// `~/.tide/settings.json`, or under the temp dir when `HOME` is unset.
pub fn settings_path() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(std::env::temp_dir, PathBuf::from)
        .join(".tide/settings.json")
}

/// Settings from [`settings_path`] plus the environment.
pub fn load_settings() -> Result<TideSettings> {
    load_settings_from_path(&settings_path())
}

/// Settings from `path` plus the environment. A missing file means defaults;
/// an unreadable or malformed one is an error.
pub fn load_settings_from_path(path: &Path) -> Result<TideSettings> {
    let mut settings = load_file_layers(path)?;
    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

fn load_file_layers(path: &Path) -> Result<TideSettings> {
    let defaults = serde_json::to_value(TideSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// `overlay` merged into `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    let (mut base, overlay) = match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => (base, overlay),
        (_, overlay) => return overlay,
    };
    for (key, value) in overlay.into_iter().filter(|(_, v)| !v.is_null()) {
        let merged = match base.remove(&key) {
            Some(existing) => deep_merge(existing, value),
            None => value,
        };
        let _ = base.insert(key, merged);
    }
    Value::Object(base)
}

/// Overrides from the variables `lookup` resolves. A value that does not
/// parse, or is out of range, is logged and skipped.
pub fn apply_env_overrides<F>(settings: &mut TideSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Agent ───────────────────────────────────────────────────────
    if let Some(v) = env.u32("TIDE_MAX_ITERATIONS", 1, 10_000) {
        settings.agent.max_iterations = v;
    }
    if let Some(v) = env.usize("TIDE_MAX_PARALLEL", 1, 1024) {
        settings.agent.max_parallel_tools = v;
    }
    if let Some(v) = env.bool("TIDE_FAIL_FAST") {
        settings.agent.fail_fast = v;
    }
    if let Some(v) = env.bool("TIDE_YOLO") {
        settings.agent.yolo = v;
    }
    if let Some(v) = env.u64("TIDE_TURN_TIMEOUT_MS", 1_000, 86_400_000) {
        settings.agent.turn_timeout_ms = Some(v);
    }

    // ── Retry ───────────────────────────────────────────────────────
    if let Some(v) = env.u32("TIDE_MAX_RETRIES", 1, 20) {
        settings.retry.max_attempts = v;
    }

    // ── Provider ────────────────────────────────────────────────────
    if let Some(v) = env.string("TIDE_MODEL") {
        settings.provider.model = v;
    }
    if let Some(v) = env.string("TIDE_BASE_URL") {
        settings.provider.base_url = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("TIDE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Value parsing ───────────────────────────────────────────────────────────

/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`, any case.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// An integer in `min..=max`.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    val.trim().parse::<u64>().ok().filter(|n| (min..=max).contains(n))
}

// ── Typed lookups ───────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid integer env var, ignoring");
        }
        result
    }

    fn u32(&self, name: &str, min: u32, max: u32) -> Option<u32> {
        self.u64(name, u64::from(min), u64::from(max))
            .and_then(|v| u32::try_from(v).ok())
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.u64(name, min as u64, max as u64)
            .and_then(|v| usize::try_from(v).ok())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
