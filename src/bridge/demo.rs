//! Simulated backend
//!
//! A [`MemoryBridge`] wired up to behave like the real backend: launching
//! goes through checking, downloading and launched with progress in between,
//! the proxy writes a few log lines, and config and token calls are served
//! from memory. Used by `--demo` and by the controller tests.

use super::memory::Emitter;
use super::{BridgeError, MemoryBridge, commands, events};
use crate::core::settings::Config;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

const DEMO_VERSION: &str = "1.4.2";
const DEMO_SIZE: u64 = 24 * 1024 * 1024;
const PROGRESS_STEPS: u64 = 8;

/// Token the demo accepts without complaint
pub const DEMO_TOKEN: &str = "demo-token-0000";

#[derive(Debug)]
struct DemoState {
    running: bool,
    installed: bool,
    token: Option<String>,
    config: Value,
}

/// Demo backend with the default pacing
pub fn bridge() -> Arc<MemoryBridge> {
    with_step(Duration::from_millis(400))
}

/// Demo backend that waits `step` between simulated updater phases
pub fn with_step(step: Duration) -> Arc<MemoryBridge> {
    let bridge = Arc::new(MemoryBridge::new());
    let state = Arc::new(Mutex::new(DemoState {
        running: false,
        installed: false,
        token: None,
        config: serde_json::to_value(Config::default()).unwrap_or(Value::Null),
    }));

    register_proxy(&bridge, &state, step);
    register_auth(&bridge, &state, step);
    register_config(&bridge, &state);
    register_misc(&bridge);

    bridge
}

fn register_proxy(bridge: &MemoryBridge, state: &Arc<Mutex<DemoState>>, step: Duration) {
    let s = state.clone();
    bridge.on(commands::GET_PROXY_STATUS, move |_| Ok(json!(s.lock().running)));

    let s = state.clone();
    let emitter = bridge.emitter();
    bridge.on_async(commands::LAUNCH_PROXY, move |args| {
        let state = s.clone();
        let emitter = emitter.clone();
        async move { launch(state, emitter, step, args).await }
    });

    let s = state.clone();
    let emitter = bridge.emitter();
    bridge.on(commands::STOP_PROXY, move |_| {
        let mut state = s.lock();
        if !state.running {
            return Err(BridgeError::command(commands::STOP_PROXY, "Proxy is not running"));
        }
        state.running = false;
        emitter.emit(events::LOG_MESSAGE, json!("Proxy process exited"));
        Ok(Value::Null)
    });
}

async fn launch(
    state: Arc<Mutex<DemoState>>,
    emitter: Emitter,
    step: Duration,
    args: Value,
) -> Result<Value, BridgeError> {
    let port = args.get("port").and_then(Value::as_u64).unwrap_or(25565);
    let needs_download = {
        let state = state.lock();
        if state.running {
            return Err(BridgeError::command(
                commands::LAUNCH_PROXY,
                "Proxy is already running",
            ));
        }
        !state.installed
    };

    emitter.emit(events::UPDATER_SHOW, Value::Null);
    emitter.emit(events::UPDATER_STATUS, json!({"status": "checking"}));
    tokio::time::sleep(step).await;

    if needs_download {
        emitter.emit(
            events::LOG_MESSAGE,
            json!(format!("Downloading version {}", DEMO_VERSION)),
        );
        emitter.emit(
            events::UPDATER_STATUS,
            json!({"status": "downloading", "version": DEMO_VERSION}),
        );
        for i in 1..=PROGRESS_STEPS {
            tokio::time::sleep(step / 2).await;
            emitter.emit(
                events::UPDATER_PROGRESS,
                json!({
                    "downloaded": DEMO_SIZE * i / PROGRESS_STEPS,
                    "total": DEMO_SIZE,
                    "speed": 3.5 * 1024.0 * 1024.0,
                }),
            );
        }
        emitter.emit(events::LOG_MESSAGE, json!("Download complete!"));
    } else {
        emitter.emit(
            events::LOG_MESSAGE,
            json!(format!("Proxy already up to date ({})", DEMO_VERSION)),
        );
    }

    emitter.emit(events::UPDATER_STATUS, json!({"status": "launching"}));
    tokio::time::sleep(step).await;

    {
        let mut state = state.lock();
        state.running = true;
        state.installed = true;
    }
    emitter.emit(events::UPDATER_STATUS, json!({"status": "launched"}));
    emitter.emit(events::UPDATER_HIDE, Value::Null);

    for line in startup_lines(port) {
        emitter.emit(events::LOG_MESSAGE, json!(line));
    }
    emitter.emit(
        events::PROXY_ERROR,
        json!({
            "code": "SLOW_UPSTREAM",
            "title": "Slow connection",
            "message": "Hypixel took a while to answer.",
            "severity": "warning",
            "category": "network",
            "timestamp": chrono::Utc::now().timestamp_millis(),
        }),
    );
    emitter.emit(
        events::RPC_USER_DATA,
        json!({"ign": "DemoPlayer", "uuid": "0f3c2b7e-8a41-4e5a-9c1d-2b6f7e9a1c35"}),
    );

    Ok(Value::Null)
}

fn startup_lines(port: u64) -> Vec<String> {
    vec![
        "\x1b[90m[DEBUG]\x1b[0m Loading modules".to_string(),
        format!("\x1b[32m[INFO]\x1b[0m Listening on \x1b[1m127.0.0.1:{}\x1b[0m", port),
        "\x1b[32m[INFO]\x1b[0m Connected to \x1b[38;5;214mmc.hypixel.net\x1b[0m".to_string(),
        "\x1b[33m[WARN]\x1b[0m Using cached party data".to_string(),
        "Waiting for client...".to_string(),
    ]
}

fn register_auth(bridge: &MemoryBridge, state: &Arc<Mutex<DemoState>>, step: Duration) {
    let s = state.clone();
    bridge.on(commands::TOKEN_EXISTS, move |_| Ok(json!(s.lock().token.is_some())));

    let s = state.clone();
    bridge.on(commands::GET_TOKEN, move |_| Ok(json!(s.lock().token)));

    bridge.on(commands::VERIFY_TOKEN, |args| {
        let token = args.get("token").and_then(Value::as_str).unwrap_or_default();
        Ok(verify(token))
    });

    let s = state.clone();
    bridge.on(commands::SAVE_TOKEN, move |args| {
        let token = args
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::command(commands::SAVE_TOKEN, "missing token"))?;
        s.lock().token = Some(token.to_string());
        Ok(Value::Null)
    });

    let s = state.clone();
    bridge.on(commands::DELETE_TOKEN, move |_| Ok(json!(s.lock().token.take().is_some())));

    bridge.on(commands::GET_USER, |args| {
        let token = args.get("token").and_then(Value::as_str).unwrap_or_default();
        if token.is_empty() {
            return Ok(json!({"success": false, "code": 401, "message": "Missing token"}));
        }
        Ok(json!({
            "success": true,
            "data": {
                "id": "demo-user",
                "username": "DemoPlayer",
                "permissions": ["user", "supporter"],
                "isBanned": false,
            }
        }))
    });

    bridge.respond(
        commands::GET_USER_STATS,
        json!({
            "success": true,
            "stats": {"sessions": 42, "duels": {"wins": 318, "losses": 120}, "playtimeHours": 96},
        }),
    );

    let emitter = bridge.emitter();
    bridge.on(commands::START_DISCORD_SIGNIN, move |_| {
        let emitter = emitter.clone();
        tokio::spawn(async move {
            tokio::time::sleep(step * 3).await;
            emitter.emit(
                events::DISCORD_AUTH_RESULT,
                json!({"success": true, "token": DEMO_TOKEN}),
            );
        });
        Ok(Value::Null)
    });
}

fn verify(token: &str) -> Value {
    match token {
        "banned" => json!({"success": false, "code": "banned", "message": "Account banned"}),
        "offline" => json!({"success": false, "code": "network_error"}),
        t if t.len() < 8 => json!({"success": false, "code": 401, "message": "Invalid token"}),
        _ => json!({"success": true, "userId": "demo-user", "username": "DemoPlayer"}),
    }
}

fn register_config(bridge: &MemoryBridge, state: &Arc<Mutex<DemoState>>) {
    bridge.respond(commands::CONFIG_EXISTS, json!(true));
    bridge.respond(commands::LEGACY_CONFIG_EXISTS, json!(false));
    bridge.respond(commands::GET_LEGACY_CONFIG, Value::Null);

    let s = state.clone();
    bridge.on(commands::GET_CONFIG, move |_| Ok(s.lock().config.clone()));

    let s = state.clone();
    bridge.on(commands::GET_CONFIG_VALUE, move |args| {
        let key = args.get("key").and_then(Value::as_str).unwrap_or_default();
        Ok(s.lock().config.get(key).cloned().unwrap_or(Value::Null))
    });

    let s = state.clone();
    bridge.on(commands::SET_CONFIG_KEY, move |args| {
        let key = args
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::command(commands::SET_CONFIG_KEY, "missing key"))?;
        let value = args.get("value").cloned().unwrap_or(Value::Null);
        match s.lock().config.as_object_mut() {
            Some(config) => {
                config.insert(key.to_string(), value);
                Ok(Value::Null)
            }
            None => Err(BridgeError::command(commands::SET_CONFIG_KEY, "config is not an object")),
        }
    });

    let s = state.clone();
    bridge.on(commands::SAVE_CONFIG, move |args| {
        let config = args
            .get("config")
            .cloned()
            .ok_or_else(|| BridgeError::command(commands::SAVE_CONFIG, "missing config"))?;
        s.lock().config = config;
        Ok(Value::Null)
    });
}

fn register_misc(bridge: &MemoryBridge) {
    bridge
        .respond(commands::CHECK_API_STATUS, json!(true))
        .respond(commands::RPC_SET_IMAGE, Value::Null)
        .respond(commands::RPC_SET_ENABLED, Value::Null)
        .respond(
            commands::GET_GLOBAL_STATS,
            json!({"success": true, "data": {"onlinePlayers": 1284, "totalUsers": 56012}}),
        )
        .respond(
            commands::FETCH_RELEASES,
            json!([
                {
                    "id": "r140",
                    "version": "1.4.0",
                    "releaseDate": "2024-05-02",
                    "changelog": "Party queue fixes.",
                    "whatsNew": ["Faster party queue", "Fixed tab list flicker"],
                    "assets": []
                },
                {
                    "id": "r142",
                    "version": DEMO_VERSION,
                    "releaseDate": "2024-06-14T09:30:00Z",
                    "isLatest": true,
                    "changelog": "Stability release.",
                    "whatsNew": ["Reconnect after server restarts"],
                    "assets": []
                },
                {
                    "id": "r150b",
                    "version": "1.5.0-beta.1",
                    "releaseDate": "2024-06-20",
                    "isBeta": true,
                    "changelog": "New overlay engine.",
                    "whatsNew": ["Overlay rewrite"],
                    "assets": []
                }
            ]),
        );
}
