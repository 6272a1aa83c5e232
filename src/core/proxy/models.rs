//! Proxy event payloads
//!
//! Shapes of the events the backend pushes while it checks for updates,
//! downloads and runs the proxy.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Payload of `updater:status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum UpdaterStatus {
    Checking,
    Downloading { version: String },
    Launching,
    Launched,
    Error,
}

impl UpdaterStatus {
    /// Short status text shown under the launch button
    pub fn describe(&self) -> String {
        match self {
            Self::Checking => "Checking for updates...".to_string(),
            Self::Downloading { version } => format!("Downloading version {}", version),
            Self::Launching => "Launching proxy...".to_string(),
            Self::Launched => "Proxy running".to_string(),
            Self::Error => "Proxy stopped unexpectedly".to_string(),
        }
    }
}

/// Payload of `updater:progress`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub downloaded: u64,
    pub total: u64,
    /// Bytes per second
    pub speed: f64,
}

impl DownloadProgress {
    /// Whole percent completed, 0 when the total is unknown
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.downloaded as f64 / self.total as f64) * 100.0;
        pct.clamp(0.0, 100.0).floor() as u8
    }

    /// Fraction completed in 0.0..=1.0, for progress bars
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        (self.downloaded as f64 / self.total as f64).clamp(0.0, 1.0) as f32
    }
}

/// How bad a pushed proxy error is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Only error and critical reports interrupt the user
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Error | Self::Critical)
    }
}

/// Either an RFC 3339 string or epoch milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Text(String),
}

impl Timestamp {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            Self::Text(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// Payload of `proxy-error`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyErrorReport {
    #[serde(default)]
    pub code: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub suggestion: Option<String>,
    pub severity: Severity,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub original_message: Option<String>,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

/// Payload of `rpc-user-data`, sent once the proxy sees a player join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcUserData {
    pub ign: String,
    pub uuid: String,
}
