//! In-process bridge
//!
//! Commands are answered by registered handlers and events are emitted by
//! hand. Every call is recorded so tests can assert on what the UI sent.

use super::{BridgeError, CommandInvoker, EventSource, Subscription};
use async_trait::async_trait;
use futures::future::{self, BoxFuture};
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, BridgeError>> + Send + Sync>;

const EVENT_CAPACITY: usize = 1024;

/// A command the bridge received
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub name: String,
    pub args: Value,
}

/// Sends events into a [`MemoryBridge`] from anywhere, including handlers
#[derive(Clone)]
pub struct Emitter {
    events: broadcast::Sender<(String, Value)>,
}

impl Emitter {
    pub fn emit(&self, name: &str, payload: Value) {
        // No subscribers is fine, the event is simply dropped
        let _ = self.events.send((name.to_string(), payload));
    }
}

pub struct MemoryBridge {
    handlers: Mutex<HashMap<String, Handler>>,
    calls: Mutex<Vec<RecordedCall>>,
    emitter: Emitter,
}

impl MemoryBridge {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            handlers: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            emitter: Emitter { events },
        }
    }

    /// Answer `name` with a synchronous handler, replacing any previous one
    pub fn on<F>(&self, name: &str, handler: F) -> &Self
    where
        F: Fn(Value) -> Result<Value, BridgeError> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(move |args| future::ready(handler(args)).boxed());
        self.handlers.lock().insert(name.to_string(), handler);
        self
    }

    /// Answer `name` with an async handler
    pub fn on_async<F, Fut>(&self, name: &str, handler: F) -> &Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BridgeError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |args| handler(args).boxed());
        self.handlers.lock().insert(name.to_string(), handler);
        self
    }

    /// Always answer `name` with `value`
    pub fn respond(&self, name: &str, value: Value) -> &Self {
        self.on(name, move |_| Ok(value.clone()))
    }

    /// Always fail `name` with `message`
    pub fn fail(&self, name: &str, message: &str) -> &Self {
        let command = name.to_string();
        let message = message.to_string();
        self.on(name, move |_| Err(BridgeError::command(&command, message.clone())))
    }

    pub fn emit(&self, name: &str, payload: Value) {
        self.emitter.emit(name, payload);
    }

    pub fn emitter(&self) -> Emitter {
        self.emitter.clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Recorded calls of one command, in order
    pub fn calls_to(&self, name: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.name == name)
            .cloned()
            .collect()
    }
}

impl Default for MemoryBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandInvoker for MemoryBridge {
    async fn call(&self, name: &str, args: Value) -> Result<Value, BridgeError> {
        tracing::debug!("memory bridge call: {} {}", name, args);
        self.calls.lock().push(RecordedCall {
            name: name.to_string(),
            args: args.clone(),
        });
        let handler = self.handlers.lock().get(name).cloned();
        match handler {
            Some(handler) => handler(args).await,
            None => Err(BridgeError::UnknownCommand(name.to_string())),
        }
    }
}

impl EventSource for MemoryBridge {
    fn subscribe(&self, name: &str) -> Subscription {
        filter_channel(self.emitter.events.subscribe(), name.to_string())
    }
}

/// Payloads of one named channel out of a shared event broadcast.
///
/// The receiver is created by the caller, so events emitted after this
/// returns are never missed.
pub(crate) fn filter_channel(rx: broadcast::Receiver<(String, Value)>, name: String) -> Subscription {
    futures::stream::unfold((rx, name), |(mut rx, name)| async move {
        loop {
            match rx.recv().await {
                Ok((event, payload)) if event == name => return Some((payload, (rx, name))),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Subscriber for {} lagged, {} events skipped", name, skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_handlers_and_recording() {
        let bridge = MemoryBridge::new();
        bridge
            .respond("get_proxy_status", json!(true))
            .fail("stop_proxy", "not running");

        assert_eq!(bridge.call("get_proxy_status", Value::Null).await, Ok(json!(true)));
        assert_eq!(
            bridge.call("stop_proxy", Value::Null).await,
            Err(BridgeError::command("stop_proxy", "not running"))
        );
        assert_eq!(
            bridge.call("nope", json!({"a": 1})).await,
            Err(BridgeError::UnknownCommand("nope".to_string()))
        );

        let calls = bridge.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].args, json!({"a": 1}));
        assert_eq!(bridge.calls_to("stop_proxy").len(), 1);
    }

    #[tokio::test]
    async fn test_async_handler() {
        let bridge = MemoryBridge::new();
        let emitter = bridge.emitter();
        bridge.on_async("launch_proxy", move |_| {
            let emitter = emitter.clone();
            async move {
                emitter.emit("updater:status", json!({"status": "launched"}));
                Ok(Value::Null)
            }
        });

        let mut events = bridge.subscribe("updater:status");
        bridge.call("launch_proxy", json!({})).await.unwrap();
        assert_eq!(events.next().await, Some(json!({"status": "launched"})));
    }

    #[tokio::test]
    async fn test_subscription_filters_by_name_and_keeps_order() {
        let bridge = MemoryBridge::new();
        let mut logs = bridge.subscribe("log-message");

        bridge.emit("log-message", json!("one"));
        bridge.emit("updater:status", json!({"status": "checking"}));
        bridge.emit("log-message", json!("two"));

        assert_eq!(logs.next().await, Some(json!("one")));
        assert_eq!(logs.next().await, Some(json!("two")));
    }
}
