//! Backend bridge
//!
//! The launcher never talks to the proxy, the updater or the auth API
//! directly. Everything goes through a backend process that exposes named
//! commands and pushes named events. This module defines the two capability
//! traits the rest of the crate depends on, plus the transports that satisfy
//! them.

mod backend;
pub mod demo;
mod memory;
mod offline;
mod socket;

pub use backend::Backend;
pub use memory::{Emitter, MemoryBridge, RecordedCall};
pub use offline::OfflineBridge;
pub use socket::SocketBridge;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

/// Stream of raw event payloads for a single named channel.
pub type Subscription = BoxStream<'static, Value>;

/// Named backend commands.
pub mod commands {
    pub const GET_PROXY_STATUS: &str = "get_proxy_status";
    pub const LAUNCH_PROXY: &str = "launch_proxy";
    pub const STOP_PROXY: &str = "stop_proxy";
    pub const TOKEN_EXISTS: &str = "token_exists";
    pub const GET_TOKEN: &str = "get_token";
    pub const VERIFY_TOKEN: &str = "verify_token";
    pub const SAVE_TOKEN: &str = "save_token";
    pub const DELETE_TOKEN: &str = "delete_token";
    pub const GET_USER: &str = "get_user";
    pub const GET_USER_STATS: &str = "get_user_stats";
    pub const GET_GLOBAL_STATS: &str = "get_global_stats";
    pub const FETCH_RELEASES: &str = "fetch_releases";
    pub const CHECK_API_STATUS: &str = "check_api_status";
    pub const RPC_SET_IMAGE: &str = "rpc_set_image";
    pub const RPC_SET_ENABLED: &str = "rpc_set_enabled";
    pub const CONFIG_EXISTS: &str = "config_exists";
    pub const LEGACY_CONFIG_EXISTS: &str = "legacy_config_exists";
    pub const GET_LEGACY_CONFIG: &str = "get_legacy_config";
    pub const GET_CONFIG: &str = "get_config";
    pub const GET_CONFIG_VALUE: &str = "get_config_value";
    pub const SET_CONFIG_KEY: &str = "set_config_key";
    pub const SAVE_CONFIG: &str = "save_config";
    pub const START_DISCORD_SIGNIN: &str = "start_discord_signin";
}

/// Named backend event channels.
pub mod events {
    pub const UPDATER_STATUS: &str = "updater:status";
    pub const UPDATER_PROGRESS: &str = "updater:progress";
    pub const UPDATER_SHOW: &str = "updater:show";
    pub const UPDATER_HIDE: &str = "updater:hide";
    pub const PROXY_ERROR: &str = "proxy-error";
    pub const LOG_MESSAGE: &str = "log-message";
    pub const DISCORD_AUTH_RESULT: &str = "discord-auth-result";
    pub const RPC_USER_DATA: &str = "rpc-user-data";
}

/// Errors raised while talking to the backend.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BridgeError {
    /// The backend ran the command and reported a failure
    #[error("{command} failed: {message}")]
    Command { command: String, message: String },

    /// The backend has no handler for this command
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Transport-level failure (connection refused, closed, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with a payload of the wrong shape
    #[error("Invalid payload for {command}: {message}")]
    Decode { command: String, message: String },
}

impl BridgeError {
    pub fn command(command: &str, message: impl Into<String>) -> Self {
        Self::Command {
            command: command.to_string(),
            message: message.into(),
        }
    }

    /// Human readable reason, without the command prefix.
    pub fn reason(&self) -> String {
        match self {
            Self::Command { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Invokes a named backend command and returns its raw JSON result.
#[async_trait]
pub trait CommandInvoker: Send + Sync {
    async fn call(&self, name: &str, args: Value) -> Result<Value, BridgeError>;
}

/// Subscribes to a named backend event channel.
///
/// Events on one channel arrive in emission order. Nothing is guaranteed
/// across channels.
pub trait EventSource: Send + Sync {
    fn subscribe(&self, name: &str) -> Subscription;
}
