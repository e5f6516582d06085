//! Session configuration with layered sources.
//!
//! Loading flow:
//! 1. Start with compiled [`SessionConfig::default()`]
//! 2. If a config file is given and exists, deep-merge its values over
//!    defaults
//! 3. Apply `PARLEY_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use parley_core::backoff::ReconnectPolicy;
use parley_core::ids::UserId;

/// Default heartbeat interval in milliseconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
/// Default typing auto-stop window in milliseconds.
pub const DEFAULT_TYPING_TIMEOUT_MS: u64 = 3000;

/// Configuration for a messaging session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// WebSocket endpoint, e.g. `wss://chat.example.com/ws`.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// The local user's ID. Drives unread-count and own-message rules.
    #[serde(default = "default_local_user_id")]
    pub local_user_id: UserId,
    /// Interval between outbound `ping` commands while connected.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Reconnection policy (linear backoff).
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
    /// Typing auto-stop window.
    #[serde(default = "default_typing_timeout_ms")]
    pub typing_timeout_ms: u64,
    /// Use the synthetic offline/demo feed instead of a live socket.
    #[serde(default)]
    pub synthetic_feed: bool,
}

fn default_server_url() -> String {
    "ws://localhost:8080/ws".to_owned()
}
fn default_local_user_id() -> UserId {
    UserId::from("local")
}
fn default_heartbeat_interval_ms() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}
fn default_typing_timeout_ms() -> u64 {
    DEFAULT_TYPING_TIMEOUT_MS
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            local_user_id: default_local_user_id(),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            reconnect: ReconnectPolicy::default(),
            typing_timeout_ms: DEFAULT_TYPING_TIMEOUT_MS,
            synthetic_feed: false,
        }
    }
}

impl SessionConfig {
    /// Load configuration from an optional file with env var overrides.
    ///
    /// If the file does not exist, starts from defaults. Invalid JSON in the
    /// file is an error; invalid env values are silently ignored.
    pub fn load_from_path(path: &Path) -> serde_json::Result<Self> {
        let defaults = serde_json::to_value(Self::default())?;

        let merged = if path.exists() {
            debug!(?path, "loading session config from file");
            let content = std::fs::read_to_string(path).unwrap_or_default();
            let user: Value = serde_json::from_str(&content)?;
            deep_merge(defaults, user)
        } else {
            debug!(?path, "config file not found, using defaults");
            defaults
        };

        let mut config: Self = serde_json::from_value(merged)?;
        apply_env_overrides(&mut config);
        Ok(config)
    }
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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

/// Apply `PARLEY_*` environment variable overrides.
///
/// Invalid values are silently ignored (fall back to file/default).
pub fn apply_env_overrides(config: &mut SessionConfig) {
    if let Some(v) = std::env::var("PARLEY_SERVER_URL").ok().filter(|v| !v.is_empty()) {
        config.server_url = v;
    }
    if let Some(v) = std::env::var("PARLEY_LOCAL_USER_ID").ok().filter(|v| !v.is_empty()) {
        config.local_user_id = UserId::from(v);
    }
    if let Some(v) = read_env_u64("PARLEY_HEARTBEAT_INTERVAL_MS", 1000, 600_000) {
        config.heartbeat_interval_ms = v;
    }
    if let Some(v) = read_env_u64("PARLEY_RECONNECT_BASE_DELAY_MS", 1, 600_000) {
        config.reconnect.base_delay_ms = v;
    }
    if let Some(v) = read_env_u64("PARLEY_RECONNECT_MAX_ATTEMPTS", 0, 1000) {
        #[allow(clippy::cast_possible_truncation)]
        {
            config.reconnect.max_attempts = v as u32;
        }
    }
    if let Some(v) = read_env_u64("PARLEY_TYPING_TIMEOUT_MS", 100, 60_000) {
        config.typing_timeout_ms = v;
    }
    if let Some(v) = read_env_bool("PARLEY_SYNTHETIC_FEED") {
        config.synthetic_feed = v;
    }
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    let parsed = raw.parse::<u64>().ok()?;
    (min..=max).contains(&parsed).then_some(parsed)
}

fn read_env_bool(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.server_url, "ws://localhost:8080/ws");
        assert_eq!(config.heartbeat_interval_ms, 30_000);
        assert_eq!(config.typing_timeout_ms, 3000);
        assert_eq!(config.reconnect.base_delay_ms, 1000);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert!(!config.synthetic_feed);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = SessionConfig::load_from_path(Path::new("/nonexistent/parley.json")).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            r#"{{"serverUrl": "wss://prod.example.com/ws", "reconnect": {{"maxAttempts": 9}}}}"#
        )
        .unwrap();

        let config = SessionConfig::load_from_path(&path).unwrap();
        assert_eq!(config.server_url, "wss://prod.example.com/ws");
        assert_eq!(config.reconnect.max_attempts, 9);
        // Untouched nested field keeps its default
        assert_eq!(config.reconnect.base_delay_ms, 1000);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.json");
        std::fs::write(&path, "{nope").unwrap();
        assert!(SessionConfig::load_from_path(&path).is_err());
    }

    #[test]
    fn serde_empty_object_gets_all_defaults() {
        let config: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    // -- deep_merge --

    #[test]
    fn deep_merge_objects_recursively() {
        let target = serde_json::json!({"a": {"x": 1, "y": 2}, "b": 3});
        let source = serde_json::json!({"a": {"y": 20}});
        let merged = deep_merge(target, source);
        assert_eq!(merged, serde_json::json!({"a": {"x": 1, "y": 20}, "b": 3}));
    }

    #[test]
    fn deep_merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn deep_merge_arrays_replaced_entirely() {
        let target = serde_json::json!({"a": [1, 2, 3]});
        let source = serde_json::json!({"a": [9]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], serde_json::json!([9]));
    }

    // -- env parsing helpers --

    #[test]
    fn unset_env_vars_return_none() {
        assert_eq!(read_env_u64("PARLEY_TEST_UNSET_U64", 0, 100), None);
        assert_eq!(read_env_bool("PARLEY_TEST_UNSET_BOOL"), None);
    }
}
