//! Stand-in bridge for when the backend cannot be reached
//!
//! Every command fails with a transport error and no events ever arrive, so
//! the views fall back to their defaults instead of keeping the window shut.

use super::{BridgeError, CommandInvoker, EventSource, Subscription};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use serde_json::Value;

pub struct OfflineBridge {
    address: String,
}

impl OfflineBridge {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl CommandInvoker for OfflineBridge {
    async fn call(&self, name: &str, _args: Value) -> Result<Value, BridgeError> {
        tracing::debug!("Dropping {} while disconnected", name);
        Err(BridgeError::Transport(format!(
            "not connected to {}",
            self.address
        )))
    }
}

impl EventSource for OfflineBridge {
    fn subscribe(&self, _name: &str) -> Subscription {
        stream::empty().boxed()
    }
}
