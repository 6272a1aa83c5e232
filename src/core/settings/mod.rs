//! Settings mirror
//!
//! Local copy of the backend configuration for one settings view. Writes are
//! applied locally first; if the backend rejects one, the whole copy goes
//! back to how it was before that write.

mod schema;

pub use schema::{
    Config, Section, SettingDescriptor, SettingKind, SETTINGS, descriptor, keys, parse_port,
};

use crate::bridge::BridgeError;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("Unknown setting: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Settings are not loaded")]
    NotLoaded,
}

/// A local update waiting on the backend write
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub key: String,
    pub value: Value,
    pub restart_required: bool,
    snapshot: Config,
}

impl PendingWrite {
    /// Configuration as it was before this update
    pub fn snapshot(&self) -> &Config {
        &self.snapshot
    }
}

#[derive(Debug, Clone, Default)]
pub struct SettingsMirror {
    config: Config,
    loaded: bool,
}

impl SettingsMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Result of the initial `get_config`. Never fails: anything but a
    /// config falls back to defaults.
    pub fn loaded(&mut self, result: Result<Option<Config>, BridgeError>) {
        self.config = match result {
            Ok(Some(config)) => config,
            Ok(None) => {
                tracing::info!("No saved configuration, using defaults");
                Config::default()
            }
            Err(e) => {
                tracing::warn!("Failed to load configuration, using defaults: {}", e);
                Config::default()
            }
        };
        self.loaded = true;
    }

    /// Current value of a key as it goes over the wire
    pub fn get(&self, key: &str) -> Option<Value> {
        serde_json::to_value(&self.config)
            .ok()
            .and_then(|v| v.get(key).cloned())
    }

    /// Whether the UI should let the user edit `key` right now
    pub fn is_editable(&self, key: &str) -> bool {
        match descriptor(key).and_then(|d| d.depends_on) {
            Some(dep) => self.get(dep).and_then(|v| v.as_bool()).unwrap_or(false),
            None => true,
        }
    }

    /// Apply `value` locally and return the write to send to the backend.
    ///
    /// Dependencies are not enforced here; they only disable UI controls.
    pub fn update(&mut self, key: &str, value: Value) -> Result<PendingWrite, SettingsError> {
        let setting = descriptor(key).ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;

        if setting.kind == SettingKind::Port {
            let text = value.as_str().unwrap_or_default();
            if parse_port(text).is_none() {
                return Err(SettingsError::InvalidPort(value.to_string()));
            }
        }

        let mut object = serde_json::to_value(&self.config).map_err(|e| invalid(key, e))?;
        if let Some(map) = object.as_object_mut() {
            map.insert(key.to_string(), value.clone());
        }
        let next: Config = serde_json::from_value(object).map_err(|e| invalid(key, e))?;

        let snapshot = std::mem::replace(&mut self.config, next);
        tracing::debug!("Updated {} locally", key);

        Ok(PendingWrite {
            key: key.to_string(),
            value,
            restart_required: setting.requires_restart,
            snapshot,
        })
    }

    /// The backend rejected `pending`: restore the copy taken before it
    pub fn write_failed(&mut self, pending: PendingWrite, error: &BridgeError) {
        tracing::warn!("Failed to save {}, rolling back: {}", pending.key, error);
        self.config = pending.snapshot;
    }
}

/// Turn user-typed text into the wire value for `key`
pub fn parse_value(key: &str, raw: &str) -> Result<Value, SettingsError> {
    let setting = descriptor(key).ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;
    let raw = raw.trim();
    match setting.kind {
        SettingKind::Toggle => match raw.to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Ok(Value::Bool(true)),
            "false" | "off" | "no" | "0" => Ok(Value::Bool(false)),
            _ => Err(SettingsError::InvalidValue {
                key: key.to_string(),
                message: format!("expected true or false, got {:?}", raw),
            }),
        },
        SettingKind::Port => parse_port(raw)
            .map(|port| Value::String(port.to_string()))
            .ok_or_else(|| SettingsError::InvalidPort(raw.to_string())),
        SettingKind::Image => match crate::core::presence::image(raw) {
            Some(image) => Ok(Value::String(image.key.to_string())),
            None => Err(SettingsError::InvalidValue {
                key: key.to_string(),
                message: format!("unknown image {:?}", raw),
            }),
        },
    }
}

fn invalid(key: &str, e: serde_json::Error) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loaded() -> SettingsMirror {
        let mut mirror = SettingsMirror::new();
        mirror.loaded(Ok(Some(Config::default())));
        mirror
    }

    #[test]
    fn test_load_falls_back_to_defaults() {
        let mut mirror = SettingsMirror::new();
        mirror.loaded(Err(BridgeError::Transport("closed".to_string())));
        assert!(mirror.is_loaded());
        assert_eq!(mirror.config(), &Config::default());

        let mut empty = SettingsMirror::new();
        empty.loaded(Ok(None));
        assert_eq!(empty.config(), &Config::default());
    }

    #[test]
    fn test_update_is_optimistic() {
        let mut mirror = loaded();
        let pending = mirror.update(keys::MINIMIZE_TO_TRAY, json!(true)).unwrap();

        assert!(mirror.config().minimize_to_tray);
        assert!(!pending.snapshot().minimize_to_tray);
        assert!(!pending.restart_required);
    }

    #[test]
    fn test_rollback_restores_whole_snapshot() {
        let mut mirror = loaded();
        let before = serde_json::to_vec(mirror.config()).unwrap();

        let pending = mirror.update(keys::ENABLE_RPC, json!(false)).unwrap();
        assert!(!mirror.config().enable_rpc);

        mirror.write_failed(pending, &BridgeError::command("set_config_key", "disk full"));
        assert_eq!(serde_json::to_vec(mirror.config()).unwrap(), before);
    }

    #[test]
    fn test_rollback_is_coarse() {
        let mut mirror = loaded();
        let first = mirror.update(keys::REDUCED_MOTION, json!(true)).unwrap();
        let _second = mirror.update(keys::AUTO_UPDATE, json!(false)).unwrap();

        // The first write failing also discards the second local change
        mirror.write_failed(first, &BridgeError::Transport("closed".to_string()));
        assert!(!mirror.config().reduced_motion);
        assert!(mirror.config().auto_update);
    }

    #[test]
    fn test_dependency_only_affects_editability() {
        let mut mirror = loaded();
        assert!(mirror.is_editable(keys::RPC_ANONYMIZE_PROFILE));

        mirror.update(keys::ENABLE_RPC, json!(false)).unwrap();
        assert!(!mirror.is_editable(keys::RPC_ANONYMIZE_PROFILE));
        assert!(!mirror.is_editable(keys::RPC_ANONYMIZE_LOCATION));
        assert!(mirror.is_editable(keys::AUTO_UPDATE));

        // Still accepted by the data layer
        assert!(mirror.update(keys::RPC_ANONYMIZE_PROFILE, json!(true)).is_ok());
    }

    #[test]
    fn test_restart_required_settings() {
        let mut mirror = loaded();
        assert!(mirror.update(keys::ENABLE_MSA, json!(true)).unwrap().restart_required);
        assert!(mirror.update(keys::PROXY_PORT, json!("25566")).unwrap().restart_required);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut mirror = loaded();
        assert_eq!(
            mirror.update("themeColor", json!("red")),
            Err(SettingsError::UnknownKey("themeColor".to_string()))
        );
        assert!(matches!(
            mirror.update(keys::PROXY_PORT, json!("99999")),
            Err(SettingsError::InvalidPort(_))
        ));
        assert!(matches!(
            mirror.update(keys::AUTO_UPDATE, json!("yes")),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert_eq!(mirror.config(), &Config::default());
    }

    #[test]
    fn test_get_uses_wire_names() {
        let mirror = loaded();
        assert_eq!(mirror.get(keys::PROXY_PORT), Some(json!("25565")));
        assert_eq!(mirror.get("proxy_port"), None);
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(keys::ENABLE_RPC, "off"), Ok(json!(false)));
        assert_eq!(parse_value(keys::PROXY_PORT, " 25570 "), Ok(json!("25570")));
        assert_eq!(
            parse_value(keys::PROXY_PORT, "0"),
            Err(SettingsError::InvalidPort("0".to_string()))
        );
        assert_eq!(parse_value(keys::RPC_IMAGE, "sword"), Ok(json!("sword")));
        assert!(parse_value(keys::RPC_IMAGE, "banana").is_err());
        assert_eq!(
            parse_value("volume", "3"),
            Err(SettingsError::UnknownKey("volume".to_string()))
        );
    }
}
