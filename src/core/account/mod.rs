//! Account module
//!
//! Signed-in user, API health and stats for the home view.
//! Everything here only gates UI affordances.

pub mod models;

pub use models::{
    DiscordAuthResult, GetUserResponse, Permission, ResponseCode, StatsResponse, User,
    VerifyFailure, VerifyTokenResponse,
};

use crate::bridge::BridgeError;
use serde_json::Value;

/// Per-mount account snapshot
#[derive(Debug, Clone, Default)]
pub struct AccountState {
    user: Option<User>,
    user_loaded: bool,
    api_online: Option<bool>,
    user_stats: Option<Value>,
    global_stats: Option<Value>,
}

impl AccountState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_user_loaded(&self) -> bool {
        self.user_loaded
    }

    pub fn is_banned(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_banned)
    }

    pub fn has_perks(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.has_perks())
    }

    pub fn api_online(&self) -> Option<bool> {
        self.api_online
    }

    pub fn user_stats(&self) -> Option<&Value> {
        self.user_stats.as_ref()
    }

    pub fn global_stats(&self) -> Option<&Value> {
        self.global_stats.as_ref()
    }

    /// Outcome of `get_token` + `get_user`. Failures just mean "no user".
    pub fn user_loaded(&mut self, result: Result<Option<GetUserResponse>, BridgeError>) {
        self.user_loaded = true;
        self.user = match result {
            Ok(Some(response)) => response.user(),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("Failed to fetch user: {}", e);
                None
            }
        };
    }

    pub fn api_status(&mut self, result: Result<bool, BridgeError>) {
        self.api_online = Some(result.unwrap_or(false));
    }

    pub fn user_stats_loaded(&mut self, result: Result<StatsResponse, BridgeError>) {
        self.user_stats = stats_value(result);
    }

    pub fn global_stats_loaded(&mut self, result: Result<StatsResponse, BridgeError>) {
        self.global_stats = stats_value(result);
    }

    pub fn signed_out(&mut self) {
        *self = Self {
            user_loaded: true,
            api_online: self.api_online,
            global_stats: self.global_stats.take(),
            ..Self::default()
        };
    }
}

fn stats_value(result: Result<StatsResponse, BridgeError>) -> Option<Value> {
    match result {
        Ok(response) if response.success => response.stats,
        Ok(response) => {
            tracing::debug!("Stats request refused: {:?}", response.code);
            None
        }
        Err(e) => {
            tracing::debug!("Failed to fetch stats: {}", e);
            None
        }
    }
}

/// Flatten a stats object into display rows. Nested objects use dotted keys.
pub fn stat_rows(stats: &Value) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    flatten("", stats, &mut rows);
    rows
}

fn flatten(prefix: &str, value: &Value, rows: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&key, value, rows);
            }
        }
        Value::String(s) => rows.push((prefix.to_string(), s.clone())),
        Value::Null => {}
        other => rows.push((prefix.to_string(), other.to_string())),
    }
}
