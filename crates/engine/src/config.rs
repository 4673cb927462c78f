use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use suggest_anchor::{ResolverConfig, DEFAULT_MIN_CONFIDENCE, DEFAULT_TOKEN_FLOOR};
use suggest_cache::{CacheConfig, Fingerprint, DEFAULT_KEY_CONTEXT_WINDOW};
use suggest_lifecycle::LifecycleConfig;
use suggest_protocol::HIGHLIGHT_VERSION;
use suggest_spans::{NormalizerConfig, DEFAULT_CONTEXT_WINDOW};

pub const ENV_DEBOUNCE_MS: &str = "SUGGEST_DEBOUNCE_MS";
pub const ENV_CACHE_TTL_MS: &str = "SUGGEST_CACHE_TTL_MS";
pub const ENV_CACHE_CAPACITY: &str = "SUGGEST_CACHE_CAPACITY";
pub const ENV_CONTEXT_WINDOW: &str = "SUGGEST_CONTEXT_WINDOW";
pub const ENV_FUZZY_MIN_CONFIDENCE: &str = "SUGGEST_FUZZY_MIN_CONFIDENCE";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Quiet period before a scheduled request runs (ms)
    pub debounce_ms: u64,

    /// Lifetime of cached suggestions and labels (ms)
    pub cache_ttl_ms: u64,

    /// Entries kept per cache
    pub cache_capacity: usize,

    /// Highlight and anchor context, in UTF-16 units
    pub context_window: usize,

    /// Context chars that take part in a request fingerprint
    pub fingerprint_window: usize,

    /// Minimum similarity for a fuzzy anchor match
    pub fuzzy_min_confidence: f64,

    /// Per-token similarity floor for fuzzy matching
    pub token_floor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            cache_ttl_ms: 300_000,
            cache_capacity: 50,
            context_window: DEFAULT_CONTEXT_WINDOW,
            fingerprint_window: DEFAULT_KEY_CONTEXT_WINDOW,
            fuzzy_min_confidence: DEFAULT_MIN_CONFIDENCE,
            token_floor: DEFAULT_TOKEN_FLOOR,
        }
    }
}

/// On-disk form; every key is optional and unknown keys are rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEngineConfig {
    debounce_ms: Option<u64>,
    cache_ttl_ms: Option<u64>,
    cache_capacity: Option<usize>,
    context_window: Option<usize>,
    fingerprint_window: Option<usize>,
    fuzzy_min_confidence: Option<f64>,
    token_floor: Option<f64>,
}

impl EngineConfig {
    /// Parse a TOML document, filling missing keys with defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let raw: RawEngineConfig =
            toml::from_str(raw).map_err(|err| EngineError::Config(err.to_string()))?;
        let defaults = Self::default();
        let config = Self {
            debounce_ms: raw.debounce_ms.unwrap_or(defaults.debounce_ms),
            cache_ttl_ms: raw.cache_ttl_ms.unwrap_or(defaults.cache_ttl_ms),
            cache_capacity: raw.cache_capacity.unwrap_or(defaults.cache_capacity),
            context_window: raw.context_window.unwrap_or(defaults.context_window),
            fingerprint_window: raw.fingerprint_window.unwrap_or(defaults.fingerprint_window),
            fuzzy_min_confidence: raw
                .fuzzy_min_confidence
                .unwrap_or(defaults.fuzzy_min_confidence),
            token_floor: raw.token_floor.unwrap_or(defaults.token_floor),
        };
        config.validate().map_err(EngineError::Config)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            EngineError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Apply `SUGGEST_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup. Blank values are ignored;
    /// unparsable ones are an error.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = parse_override(&lookup, ENV_DEBOUNCE_MS)? {
            self.debounce_ms = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_CACHE_TTL_MS)? {
            self.cache_ttl_ms = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_CACHE_CAPACITY)? {
            self.cache_capacity = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_CONTEXT_WINDOW)? {
            self.context_window = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_FUZZY_MIN_CONFIDENCE)? {
            self.fuzzy_min_confidence = value;
        }
        self.validate().map_err(EngineError::Config)?;
        Ok(self)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.context_window == 0 {
            return Err("context_window must be > 0".to_string());
        }
        if self.fingerprint_window == 0 {
            return Err("fingerprint_window must be > 0".to_string());
        }
        self.cache().validate()?;
        self.resolver().validate()?;
        Ok(())
    }

    #[must_use]
    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }

    #[must_use]
    pub fn cache(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_millis(self.cache_ttl_ms),
            capacity: self.cache_capacity,
        }
    }

    #[must_use]
    pub fn normalizer(&self) -> NormalizerConfig {
        NormalizerConfig {
            context_window: self.context_window,
            version: HIGHLIGHT_VERSION,
        }
    }

    #[must_use]
    pub fn resolver(&self) -> ResolverConfig {
        ResolverConfig {
            fuzzy_min_confidence: self.fuzzy_min_confidence,
            token_floor: self.token_floor,
        }
    }

    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.fingerprint_window)
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| EngineError::Config(format!("{key}={trimmed} is not a valid value")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lifecycle().debounce, Duration::from_millis(300));
        assert_eq!(config.cache().capacity, 50);
        assert_eq!(config.normalizer().context_window, 20);
        assert_eq!(config.fingerprint().context_window, 100);
    }

    #[test]
    fn toml_fills_missing_keys() {
        let config = EngineConfig::from_toml_str("debounce_ms = 50\ncache_capacity = 8\n").unwrap();
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.cache_capacity, 8);
        assert_eq!(config.cache_ttl_ms, 300_000);
    }

    #[test]
    fn toml_rejects_unknown_and_invalid_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("debounce = 50"),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("cache_capacity = 0"),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn overrides_take_precedence() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DEBOUNCE_MS, "10"),
            (ENV_CACHE_TTL_MS, " 1000 "),
            (ENV_CONTEXT_WINDOW, ""),
            (ENV_FUZZY_MIN_CONFIDENCE, "0.9"),
        ]);
        let config = EngineConfig::default()
            .with_overrides(|key| env.get(key).map(ToString::to_string))
            .unwrap();
        assert_eq!(config.debounce_ms, 10);
        assert_eq!(config.cache_ttl_ms, 1000);
        assert_eq!(config.context_window, 20);
        assert_eq!(config.fuzzy_min_confidence, 0.9);
    }

    #[test]
    fn garbage_override_is_an_error() {
        let result = EngineConfig::default().with_overrides(|key| {
            (key == ENV_CACHE_CAPACITY).then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(EngineError::Config(msg)) if msg.contains(ENV_CACHE_CAPACITY)));
    }
}
