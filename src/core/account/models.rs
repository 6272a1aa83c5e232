//! Account payloads
//!
//! Responses of the token and user commands.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Permission tier granted by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    User,
    Supporter,
    Premium,
    Partner,
    Staff,
    Admin,
    /// Anything this launcher version does not know about. Grants nothing.
    #[serde(other)]
    Unknown,
}

impl Permission {
    pub fn has_perks(self) -> bool {
        !matches!(self, Self::User | Self::Unknown)
    }
}

/// Identity returned by `get_user`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,
    #[serde(default)]
    pub is_banned: bool,
}

impl User {
    /// Donation perks (custom presence images, ...)
    pub fn has_perks(&self) -> bool {
        self.permissions.iter().any(|p| p.has_perks())
    }

    /// Highest known tier, for display
    pub fn tier(&self) -> Permission {
        self.permissions
            .iter()
            .copied()
            .filter(|p| *p != Permission::Unknown)
            .max()
            .unwrap_or(Permission::User)
    }
}

/// Failure code: either a string like `"banned"` or an HTTP status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseCode {
    Text(String),
    Status(u16),
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Status(n) => write!(f, "{}", n),
        }
    }
}

/// Result of `verify_token`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTokenResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ResponseCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Why a token was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyFailure {
    Banned,
    InvalidToken,
    Network,
    Other(String),
}

impl VerifyFailure {
    pub fn from_response(response: &VerifyTokenResponse) -> Self {
        match &response.code {
            Some(ResponseCode::Text(code)) if code == "banned" => Self::Banned,
            Some(ResponseCode::Text(code)) if code == "network_error" => Self::Network,
            Some(ResponseCode::Status(401 | 403)) => Self::InvalidToken,
            _ => Self::Other(
                response
                    .message
                    .clone()
                    .unwrap_or_else(|| "Verification failed".to_string()),
            ),
        }
    }
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Banned => f.write_str("This account is banned from Duels+."),
            Self::InvalidToken => f.write_str("That token is not valid. Check it and try again."),
            Self::Network => f.write_str("Could not reach the Duels+ API. Check your connection."),
            Self::Other(message) => f.write_str(message),
        }
    }
}

/// Result of `get_user`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUserResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ResponseCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GetUserResponse {
    /// The user, when the call succeeded and the payload is well formed
    pub fn user(&self) -> Option<User> {
        if !self.success {
            return None;
        }
        let data = self.data.clone()?;
        match serde_json::from_value(data) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("Malformed user payload: {}", e);
                None
            }
        }
    }
}

/// Result of `get_user_stats` and `get_global_stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ResponseCode>,
    #[serde(default, alias = "data", skip_serializing_if = "Option::is_none")]
    pub stats: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Payload of `discord-auth-result`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordAuthResult {
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
