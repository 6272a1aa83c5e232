//! Typed facade over the bridge traits
//!
//! One method per backend command and one stream per event channel, so the
//! rest of the crate never handles command names or raw JSON.

use super::{BridgeError, CommandInvoker, EventSource, Subscription, commands, events};
use crate::core::account::{DiscordAuthResult, GetUserResponse, StatsResponse, VerifyTokenResponse};
use crate::core::proxy::models::{DownloadProgress, ProxyErrorReport, RpcUserData, UpdaterStatus};
use crate::core::releases::Release;
use crate::core::settings::Config;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Clone)]
pub struct Backend {
    invoker: Arc<dyn CommandInvoker>,
    events: Arc<dyn EventSource>,
}

impl Backend {
    pub fn new(invoker: Arc<dyn CommandInvoker>, events: Arc<dyn EventSource>) -> Self {
        Self { invoker, events }
    }

    /// Use one transport for both commands and events
    pub fn from_bridge<B>(bridge: Arc<B>) -> Self
    where
        B: CommandInvoker + EventSource + 'static,
    {
        Self {
            invoker: bridge.clone(),
            events: bridge,
        }
    }

    /// Call a command and decode its result
    pub async fn invoke<T: DeserializeOwned>(&self, command: &str, args: Value) -> Result<T, BridgeError> {
        let value = self.invoker.call(command, args).await?;
        serde_json::from_value(value).map_err(|e| BridgeError::Decode {
            command: command.to_string(),
            message: e.to_string(),
        })
    }

    /// Call a command whose result carries nothing
    async fn invoke_unit(&self, command: &str, args: Value) -> Result<(), BridgeError> {
        self.invoker.call(command, args).await.map(|_| ())
    }

    // Proxy

    pub async fn get_proxy_status(&self) -> Result<bool, BridgeError> {
        self.invoke(commands::GET_PROXY_STATUS, Value::Null).await
    }

    /// Resolves once the backend has launched the proxy, or failed to
    pub async fn launch_proxy(&self, port: Option<u16>) -> Result<(), BridgeError> {
        let args = match port {
            Some(port) => json!({ "port": port }),
            None => json!({}),
        };
        self.invoke_unit(commands::LAUNCH_PROXY, args).await
    }

    pub async fn stop_proxy(&self) -> Result<(), BridgeError> {
        self.invoke_unit(commands::STOP_PROXY, Value::Null).await
    }

    pub async fn fetch_releases(&self) -> Result<Vec<Release>, BridgeError> {
        self.invoke(commands::FETCH_RELEASES, Value::Null).await
    }

    // Auth

    pub async fn token_exists(&self) -> Result<bool, BridgeError> {
        self.invoke(commands::TOKEN_EXISTS, Value::Null).await
    }

    pub async fn get_token(&self) -> Result<Option<String>, BridgeError> {
        self.invoke(commands::GET_TOKEN, Value::Null).await
    }

    pub async fn verify_token(&self, token: &str) -> Result<VerifyTokenResponse, BridgeError> {
        self.invoke(commands::VERIFY_TOKEN, json!({ "token": token })).await
    }

    pub async fn save_token(&self, token: &str) -> Result<(), BridgeError> {
        self.invoke_unit(commands::SAVE_TOKEN, json!({ "token": token })).await
    }

    /// Whether a token was actually removed
    pub async fn delete_token(&self) -> Result<bool, BridgeError> {
        self.invoke(commands::DELETE_TOKEN, Value::Null).await
    }

    pub async fn get_user(&self, token: &str) -> Result<GetUserResponse, BridgeError> {
        self.invoke(commands::GET_USER, json!({ "token": token })).await
    }

    pub async fn get_user_stats(&self, token: &str) -> Result<StatsResponse, BridgeError> {
        self.invoke(commands::GET_USER_STATS, json!({ "token": token })).await
    }

    pub async fn get_global_stats(&self) -> Result<StatsResponse, BridgeError> {
        self.invoke(commands::GET_GLOBAL_STATS, Value::Null).await
    }

    pub async fn check_api_status(&self) -> Result<bool, BridgeError> {
        self.invoke(commands::CHECK_API_STATUS, Value::Null).await
    }

    /// Opens the browser. The token arrives later on `discord-auth-result`.
    pub async fn start_discord_signin(&self) -> Result<(), BridgeError> {
        self.invoke_unit(commands::START_DISCORD_SIGNIN, Value::Null).await
    }

    pub async fn rpc_set_image(&self, image_key: &str) -> Result<(), BridgeError> {
        self.invoke_unit(commands::RPC_SET_IMAGE, json!({ "imageKey": image_key }))
            .await
    }

    /// Connect or disconnect Discord rich presence right away
    pub async fn rpc_set_enabled(&self, enabled: bool) -> Result<(), BridgeError> {
        self.invoke_unit(commands::RPC_SET_ENABLED, json!({ "enabled": enabled }))
            .await
    }

    // Remote config

    pub async fn config_exists(&self) -> Result<bool, BridgeError> {
        self.invoke(commands::CONFIG_EXISTS, Value::Null).await
    }

    pub async fn legacy_config_exists(&self) -> Result<bool, BridgeError> {
        self.invoke(commands::LEGACY_CONFIG_EXISTS, Value::Null).await
    }

    /// Config written by the previous launcher, if it left one behind
    pub async fn get_legacy_config(&self) -> Result<Option<Config>, BridgeError> {
        self.invoke(commands::GET_LEGACY_CONFIG, Value::Null).await
    }

    pub async fn get_config(&self) -> Result<Option<Config>, BridgeError> {
        self.invoke(commands::GET_CONFIG, Value::Null).await
    }

    pub async fn get_config_value(&self, key: &str) -> Result<Option<Value>, BridgeError> {
        self.invoke(commands::GET_CONFIG_VALUE, json!({ "key": key })).await
    }

    pub async fn set_config_key(&self, key: &str, value: Value) -> Result<(), BridgeError> {
        self.invoke_unit(commands::SET_CONFIG_KEY, json!({ "key": key, "value": value }))
            .await
    }

    pub async fn save_config(&self, config: &Config) -> Result<(), BridgeError> {
        self.invoke_unit(commands::SAVE_CONFIG, json!({ "config": config }))
            .await
    }

    // Events

    pub fn subscribe_raw(&self, name: &str) -> Subscription {
        self.events.subscribe(name)
    }

    /// Decoded payloads of one channel. Malformed payloads are logged and
    /// skipped.
    pub fn subscribe<T>(&self, name: &'static str) -> BoxStream<'static, T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.events
            .subscribe(name)
            .filter_map(move |payload| async move {
                match serde_json::from_value(payload) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!("Dropping malformed {} payload: {}", name, e);
                        None
                    }
                }
            })
            .boxed()
    }

    pub fn updater_status(&self) -> BoxStream<'static, UpdaterStatus> {
        self.subscribe(events::UPDATER_STATUS)
    }

    pub fn updater_progress(&self) -> BoxStream<'static, DownloadProgress> {
        self.subscribe(events::UPDATER_PROGRESS)
    }

    /// `updater:show` as `true`, `updater:hide` as `false`. The two
    /// channels are merged, so their relative order is not guaranteed.
    pub fn updater_visibility(&self) -> BoxStream<'static, bool> {
        let show = self.subscribe_raw(events::UPDATER_SHOW).map(|_| true);
        let hide = self.subscribe_raw(events::UPDATER_HIDE).map(|_| false);
        futures::stream::select(show, hide).boxed()
    }

    pub fn proxy_errors(&self) -> BoxStream<'static, ProxyErrorReport> {
        self.subscribe(events::PROXY_ERROR)
    }

    /// Log lines. Non-string payloads are rendered as JSON text.
    pub fn log_messages(&self) -> BoxStream<'static, String> {
        self.subscribe_raw(events::LOG_MESSAGE)
            .map(|payload| match payload {
                Value::String(line) => line,
                other => other.to_string(),
            })
            .boxed()
    }

    pub fn discord_auth_results(&self) -> BoxStream<'static, DiscordAuthResult> {
        self.subscribe(events::DISCORD_AUTH_RESULT)
    }

    pub fn rpc_user_data(&self) -> BoxStream<'static, RpcUserData> {
        self.subscribe(events::RPC_USER_DATA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MemoryBridge;

    fn backend() -> (Arc<MemoryBridge>, Backend) {
        let bridge = Arc::new(MemoryBridge::new());
        let backend = Backend::from_bridge(bridge.clone());
        (bridge, backend)
    }

    #[tokio::test]
    async fn test_typed_commands_send_expected_args() {
        let (bridge, backend) = backend();
        bridge
            .respond(commands::LAUNCH_PROXY, Value::Null)
            .respond(commands::SET_CONFIG_KEY, Value::Null)
            .respond(commands::RPC_SET_IMAGE, Value::Null);

        backend.launch_proxy(Some(25570)).await.unwrap();
        backend.launch_proxy(None).await.unwrap();
        backend.set_config_key("enableRpc", json!(false)).await.unwrap();
        backend.rpc_set_image("crown").await.unwrap();

        let launches = bridge.calls_to(commands::LAUNCH_PROXY);
        assert_eq!(launches[0].args, json!({"port": 25570}));
        assert_eq!(launches[1].args, json!({}));
        assert_eq!(
            bridge.calls_to(commands::SET_CONFIG_KEY)[0].args,
            json!({"key": "enableRpc", "value": false})
        );
        assert_eq!(
            bridge.calls_to(commands::RPC_SET_IMAGE)[0].args,
            json!({"imageKey": "crown"})
        );
    }

    #[tokio::test]
    async fn test_decode_error() {
        let (bridge, backend) = backend();
        bridge.respond(commands::GET_PROXY_STATUS, json!("yes"));

        let err = backend.get_proxy_status().await.unwrap_err();
        assert!(matches!(err, BridgeError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_null_config_is_none() {
        let (bridge, backend) = backend();
        bridge.respond(commands::GET_CONFIG, Value::Null);
        assert_eq!(backend.get_config().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_typed_events_skip_malformed_payloads() {
        let (bridge, backend) = backend();
        let mut statuses = backend.updater_status();

        bridge.emit(events::UPDATER_STATUS, json!({"status": "exploded"}));
        bridge.emit(events::UPDATER_STATUS, json!({"status": "downloading", "version": "1.4.0"}));

        assert_eq!(
            statuses.next().await,
            Some(UpdaterStatus::Downloading {
                version: "1.4.0".to_string()
            })
        );
    }
}
