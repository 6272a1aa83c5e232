//! Socket bridge
//!
//! Talks to the backend over a local TCP connection using newline-delimited
//! JSON. Requests carry an id, responses echo it back, and events arrive
//! unsolicited on the same connection.

use super::memory::filter_channel;
use super::{BridgeError, CommandInvoker, EventSource, Subscription};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 1024;

type Reply = Result<Value, String>;
/// In-flight requests by id. `None` once the connection is gone.
type PendingMap = Arc<Mutex<Option<HashMap<u64, oneshot::Sender<Reply>>>>>;

#[derive(Serialize)]
struct Request<'a> {
    id: u64,
    command: &'a str,
    args: &'a Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Incoming {
    Response {
        id: u64,
        ok: bool,
        #[serde(default)]
        value: Value,
        #[serde(default)]
        error: Option<String>,
    },
    Event {
        event: String,
        #[serde(default)]
        payload: Value,
    },
}

pub struct SocketBridge {
    outgoing: mpsc::UnboundedSender<String>,
    pending: PendingMap,
    next_id: AtomicU64,
    events: broadcast::Sender<(String, Value)>,
    tasks: Vec<JoinHandle<()>>,
}

impl SocketBridge {
    /// Connect to a backend listening on `addr`
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self, BridgeError> {
        tracing::info!("Connecting to backend at {}", addr);
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| BridgeError::Transport(format!("timed out connecting to {}", addr)))?
            .map_err(|e| BridgeError::Transport(format!("{}: {}", addr, e)))?;
        // Frames are small and latency matters more than throughput
        let _ = stream.set_nodelay(true);

        let (read_half, write_half) = stream.into_split();
        let pending: PendingMap = Arc::new(Mutex::new(Some(HashMap::new())));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (outgoing, rx) = mpsc::unbounded_channel();

        let tasks = vec![
            tokio::spawn(read_loop(read_half, pending.clone(), events.clone())),
            tokio::spawn(write_loop(write_half, rx)),
        ];

        Ok(Self {
            outgoing,
            pending,
            next_id: AtomicU64::new(1),
            events,
            tasks,
        })
    }
}

impl Drop for SocketBridge {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl CommandInvoker for SocketBridge {
    async fn call(&self, name: &str, args: Value) -> Result<Value, BridgeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&Request {
            id,
            command: name,
            args: &args,
        })
        .map_err(|e| BridgeError::Transport(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        match self.pending.lock().as_mut() {
            Some(pending) => pending.insert(id, tx),
            None => return Err(closed()),
        };

        if self.outgoing.send(line).is_err() {
            if let Some(pending) = self.pending.lock().as_mut() {
                pending.remove(&id);
            }
            return Err(closed());
        }

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(BridgeError::command(name, message)),
            Err(_) => Err(closed()),
        }
    }
}

fn closed() -> BridgeError {
    BridgeError::Transport("connection closed".to_string())
}

impl EventSource for SocketBridge {
    fn subscribe(&self, name: &str) -> Subscription {
        filter_channel(self.events.subscribe(), name.to_string())
    }
}

async fn read_loop(read_half: OwnedReadHalf, pending: PendingMap, events: broadcast::Sender<(String, Value)>) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::warn!("Backend closed the connection");
                break;
            }
            Err(e) => {
                tracing::error!("Failed to read from backend: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Incoming>(&line) {
            Ok(Incoming::Response { id, ok, value, error }) => {
                let tx = pending.lock().as_mut().and_then(|p| p.remove(&id));
                let Some(tx) = tx else {
                    tracing::debug!("Response for unknown request {}", id);
                    continue;
                };
                let reply = if ok {
                    Ok(value)
                } else {
                    Err(error.unwrap_or_else(|| "unknown error".to_string()))
                };
                let _ = tx.send(reply);
            }
            Ok(Incoming::Event { event, payload }) => {
                let _ = events.send((event, payload));
            }
            Err(e) => tracing::warn!("Ignoring malformed frame: {} ({})", line, e),
        }
    }
    // Dropping the senders fails every outstanding call
    pending.lock().take();
}

async fn write_loop(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            tracing::error!("Failed to write to backend: {}", e);
            break;
        }
    }
}
