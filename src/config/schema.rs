//! Configuration schema
//!
//! Local launcher preferences. The proxy's own settings live in the backend
//! and are mirrored by `core::settings`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub ui: UiConfig,
}

/// How to reach the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Address of the backend socket
    #[serde(default = "default_address")]
    pub address: String,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub connect_timeout_secs: u64,
}

impl BridgeConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            connect_timeout_secs: default_timeout(),
        }
    }
}

/// Window preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub theme: Theme,

    /// Follow new log lines
    #[serde(default = "default_true")]
    pub auto_scroll: bool,

    /// Render ANSI colours in the log view
    #[serde(default = "default_true")]
    pub colored_logs: bool,

    /// First-run onboarding was finished at least once
    #[serde(default)]
    pub onboarding_complete: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            auto_scroll: true,
            colored_logs: true,
            onboarding_complete: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub const ALL: [Theme; 2] = [Theme::Dark, Theme::Light];

    pub fn label(self) -> &'static str {
        match self {
            Self::Dark => "Dark",
            Self::Light => "Light",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dark => write!(f, "dark"),
            Self::Light => write!(f, "light"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            _ => Err(format!("Unknown theme: {}", s)),
        }
    }
}

// Default value functions for serde
fn default_address() -> String {
    "127.0.0.1:47615".to_string()
}
fn default_timeout() -> u64 {
    5
}
fn default_true() -> bool {
    true
}
