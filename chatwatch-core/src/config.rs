//! src/config.rs
//!
//! Loading [`ChatWindowConfig`] from a JSON file and `CHATWATCH_*`
//! environment variables. Missing fields fall back to the defaults.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info};

use crate::Error;
use crate::models::ChatWindowConfig;

pub const ENV_CAPACITY: &str = "CHATWATCH_CAPACITY";
pub const ENV_SCROLL_THRESHOLD: &str = "CHATWATCH_SCROLL_THRESHOLD";
pub const ENV_HIGHLIGHT_RETENTION_MS: &str = "CHATWATCH_HIGHLIGHT_RETENTION_MS";
pub const ENV_RECOUNT_INTERVAL_MS: &str = "CHATWATCH_RECOUNT_INTERVAL_MS";
pub const ENV_MIN_PATTERN_LEN: &str = "CHATWATCH_MIN_PATTERN_LEN";

/// Upper bound for retention and recount intervals (one day).
pub const MAX_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

/// Reads a config file. Fields not present keep their default value.
pub fn load_from_file(path: &Path) -> Result<ChatWindowConfig, Error> {
    let raw = fs::read_to_string(path)?;
    let config: ChatWindowConfig = serde_json::from_str(&raw)?;
    info!("loaded chat window config from {}", path.display());
    validate(config)
}

/// Applies any `CHATWATCH_*` variables on top of `base`. A `.env` file in the
/// working directory is honoured if present.
pub fn apply_env(base: ChatWindowConfig) -> Result<ChatWindowConfig, Error> {
    let _ = dotenv::dotenv();
    apply_overrides(base, |key| std::env::var(key).ok())
}

/// Same as [`apply_env`] but with an explicit lookup, so callers (and tests)
/// don't have to touch the process environment.
pub fn apply_overrides<F>(mut config: ChatWindowConfig, lookup: F) -> Result<ChatWindowConfig, Error>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = parse_var(&lookup, ENV_CAPACITY)? {
        config.capacity = v;
    }
    if let Some(v) = parse_var(&lookup, ENV_SCROLL_THRESHOLD)? {
        config.scroll_threshold = v;
    }
    if let Some(v) = parse_var(&lookup, ENV_HIGHLIGHT_RETENTION_MS)? {
        config.highlight_retention_ms = v;
    }
    if let Some(v) = parse_var(&lookup, ENV_RECOUNT_INTERVAL_MS)? {
        config.recount_interval_ms = v;
    }
    if let Some(v) = parse_var(&lookup, ENV_MIN_PATTERN_LEN)? {
        config.min_pattern_len = v;
    }
    validate(config)
}

/// Rejects values the chat window cannot run with.
pub fn validate(config: ChatWindowConfig) -> Result<ChatWindowConfig, Error> {
    if config.capacity == 0 {
        return Err(Error::Config("capacity must be at least 1".into()));
    }
    if !config.scroll_threshold.is_finite() || config.scroll_threshold < 0.0 {
        return Err(Error::Config(format!(
            "scroll_threshold must be a non-negative number, got {}",
            config.scroll_threshold
        )));
    }
    if config.recount_interval_ms == 0 {
        return Err(Error::Config("recount_interval_ms must be at least 1".into()));
    }
    for (name, value) in [
        ("recount_interval_ms", config.recount_interval_ms),
        ("highlight_retention_ms", config.highlight_retention_ms),
    ] {
        if value > MAX_INTERVAL_MS {
            return Err(Error::Config(format!(
                "{name} must be at most {MAX_INTERVAL_MS}, got {value}"
            )));
        }
    }
    Ok(config)
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    debug!("config override {}={}", key, raw);
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| Error::Config(format!("{key}: cannot parse {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn overrides_replace_only_given_fields() {
        let vars = HashMap::from([
            (ENV_CAPACITY, "300".to_string()),
            (ENV_HIGHLIGHT_RETENTION_MS, " 5000 ".to_string()),
        ]);
        let config = apply_overrides(ChatWindowConfig::default(), |k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.capacity, 300);
        assert_eq!(config.highlight_retention_ms, 5000);
        assert_eq!(config.recount_interval_ms, 10_000);
    }

    #[test]
    fn bad_override_is_a_config_error() {
        let vars = HashMap::from([(ENV_SCROLL_THRESHOLD, "lots".to_string())]);
        let err = apply_overrides(ChatWindowConfig::default(), |k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = ChatWindowConfig {
            capacity: 0,
            ..ChatWindowConfig::default()
        };
        assert!(matches!(validate(config), Err(Error::Config(_))));
    }

    #[test]
    fn oversized_intervals_are_rejected() {
        let vars = HashMap::from([(ENV_RECOUNT_INTERVAL_MS, u64::MAX.to_string())]);
        let err = apply_overrides(ChatWindowConfig::default(), |k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let config = ChatWindowConfig {
            highlight_retention_ms: MAX_INTERVAL_MS + 1,
            ..ChatWindowConfig::default()
        };
        assert!(matches!(validate(config), Err(Error::Config(_))));

        let config = ChatWindowConfig {
            recount_interval_ms: MAX_INTERVAL_MS,
            ..ChatWindowConfig::default()
        };
        assert!(validate(config).is_ok());
    }

    #[test]
    fn file_fields_default_when_missing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "capacity": 42, "scroll_threshold": 80.5 }}"#).unwrap();
        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.capacity, 42);
        assert_eq!(config.scroll_threshold, 80.5);
        assert_eq!(config.highlight_retention_ms, 20_000);
    }
}
