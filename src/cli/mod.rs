//! CLI module
//!
//! Headless commands over the same backend the GUI uses.

mod args;

pub use args::{Args, Commands, ConfigAction};

use anyhow::{Context, Result};
use duelsplus_launcher::bridge::{self, Backend, OfflineBridge, SocketBridge};
use duelsplus_launcher::config::Config;
use duelsplus_launcher::core::controller::Launcher;
use duelsplus_launcher::core::logs::{LevelFilter, LogLevel, LogLine};
use duelsplus_launcher::core::proxy::ProxyViewState;
use duelsplus_launcher::core::releases::visible_releases;
use duelsplus_launcher::core::settings::{self, SETTINGS, keys};
use duelsplus_launcher::util::{format_size, format_speed};
use futures::StreamExt;
use std::sync::Arc;

/// Connect to the backend named by the flags, falling back to the config
pub async fn connect(args: &Args, config: &Config) -> Result<Backend> {
    if args.demo {
        tracing::info!("Using the simulated backend");
        return Ok(Backend::from_bridge(bridge::demo::bridge()));
    }

    let address = bridge_address(args, config);
    let socket = SocketBridge::connect(address, config.bridge.connect_timeout())
        .await
        .with_context(|| {
            format!(
                "Could not reach the launcher backend at {} (try --demo to run without one)",
                address
            )
        })?;
    Ok(Backend::from_bridge(Arc::new(socket)))
}

/// Like [`connect`], but an unreachable backend leaves the GUI running
/// disconnected instead of failing.
pub async fn connect_or_offline(args: &Args, config: &Config) -> Backend {
    match connect(args, config).await {
        Ok(backend) => backend,
        Err(e) => {
            tracing::warn!("{:#}. Starting without a backend.", e);
            let address = bridge_address(args, config);
            Backend::from_bridge(Arc::new(OfflineBridge::new(address)))
        }
    }
}

fn bridge_address<'a>(args: &'a Args, config: &'a Config) -> &'a str {
    args.bridge.as_deref().unwrap_or(&config.bridge.address)
}

pub async fn handle_command(command: Commands, backend: Backend) -> Result<()> {
    match command {
        Commands::Status => status(&backend).await,
        Commands::Launch { port } => launch(backend, port).await,
        Commands::Stop => stop(&backend).await,
        Commands::Logs { level, plain } => follow_logs(&backend, &level, plain).await,
        Commands::Config { action } => match action {
            ConfigAction::Get { key } => config_get(&backend, key.as_deref()).await,
            ConfigAction::Set { key, value } => config_set(&backend, &key, &value).await,
        },
        Commands::Releases { beta } => releases(&backend, beta).await,
    }
}

/// Show proxy and API status
async fn status(backend: &Backend) -> Result<()> {
    let running = backend
        .get_proxy_status()
        .await
        .context("Failed to query proxy status")?;
    let api = backend.check_api_status().await.unwrap_or(false);

    println!("🛰  Proxy: {}", if running { "running" } else { "stopped" });
    println!("🌐 API:   {}", if api { "online" } else { "offline" });
    Ok(())
}

/// Launch and follow status, progress and logs until the proxy runs
async fn launch(backend: Backend, port: Option<u16>) -> Result<()> {
    let mut launcher = Launcher::new(backend);
    launcher.mount_settings();
    launcher.mount_proxy();
    launcher
        .wait_until(|l| {
            l.settings().is_some_and(|s| s.is_loaded())
                && l.proxy().is_some_and(|p| p.state() != ProxyViewState::Unknown)
        })
        .await;

    if launcher.proxy().map(|p| p.state()) == Some(ProxyViewState::Running) {
        println!("✅ Proxy is already running.");
        return Ok(());
    }

    let port = port.or_else(|| launcher.settings().and_then(|s| s.config().port()));
    match port {
        Some(port) => println!("🚀 Launching proxy on port {}", port),
        None => println!("🚀 Launching proxy"),
    }
    launcher.start_proxy_on(port);

    let mut printed = 0;
    let mut last_status: Option<String> = None;
    let mut last_percent: Option<u8> = None;
    loop {
        let lines = launcher.logs().lines();
        for line in &lines[printed..] {
            println!("   {}", line.raw());
        }
        printed = lines.len();

        let Some(session) = launcher.proxy() else {
            anyhow::bail!("Proxy view went away");
        };

        let status = session.status_text().map(str::to_string);
        if status != last_status {
            if let Some(text) = &status {
                println!("   {}", text);
            }
            last_status = status;
        }

        if let Some(progress) = session.visible_progress() {
            let percent = progress.percent();
            // One line per 10% is plenty for a terminal
            if last_percent.is_none_or(|p| percent / 10 > p / 10) {
                println!(
                    "   ⬇ {}% ({} / {}, {})",
                    percent,
                    format_size(progress.downloaded),
                    format_size(progress.total),
                    format_speed(progress.speed)
                );
                last_percent = Some(percent);
            }
        }

        match session.state() {
            ProxyViewState::Running if !session.is_busy() => {
                println!("✅ Proxy is running.");
                return Ok(());
            }
            ProxyViewState::Error if !session.is_busy() => {
                anyhow::bail!(
                    "{}",
                    session.status_text().unwrap_or("Proxy failed to launch")
                );
            }
            _ => {}
        }

        if !launcher.next().await {
            anyhow::bail!("Backend went away");
        }
    }
}

async fn stop(backend: &Backend) -> Result<()> {
    backend.stop_proxy().await.context("Failed to stop proxy")?;
    println!("⏹  Proxy stopped.");
    Ok(())
}

/// Print log lines as they arrive until Ctrl+C
async fn follow_logs(backend: &Backend, levels: &[LogLevel], plain: bool) -> Result<()> {
    let filter = if levels.is_empty() {
        LevelFilter::all()
    } else {
        LevelFilter::only(levels)
    };
    let mut lines = backend.log_messages();

    println!("📜 Following proxy logs (Ctrl+C to stop)");
    loop {
        tokio::select! {
            line = lines.next() => {
                let Some(line) = line else {
                    println!("Backend closed the log stream.");
                    break;
                };
                let line = LogLine::new(line);
                if filter.allows(line.level()) {
                    println!("{}", if plain { line.plain() } else { line.raw() });
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn config_get(backend: &Backend, key: Option<&str>) -> Result<()> {
    if let Some(key) = key {
        settings::descriptor(key).with_context(|| format!("Unknown setting: {}", key))?;
        let value = backend
            .get_config_value(key)
            .await
            .context("Failed to read setting")?;
        match value {
            Some(value) => println!("{} = {}", key, value),
            None => println!("{} is not set", key),
        }
        return Ok(());
    }

    let config = backend
        .get_config()
        .await
        .context("Failed to read config")?
        .unwrap_or_default();
    let values = serde_json::to_value(&config)?;

    for setting in SETTINGS {
        let value = values.get(setting.key).cloned().unwrap_or_default();
        println!("{:<22} {:<8} {}", setting.key, value.to_string(), setting.label);
    }
    Ok(())
}

async fn config_set(backend: &Backend, key: &str, raw: &str) -> Result<()> {
    let value = settings::parse_value(key, raw)?;
    if key == keys::BETA_UPDATES && value == serde_json::Value::Bool(true) {
        println!("⚠️  Beta builds are released before they are fully tested.");
    }

    backend
        .set_config_key(key, value.clone())
        .await
        .with_context(|| format!("Failed to save {}", key))?;
    println!("✅ {} = {}", key, value);

    if settings::descriptor(key).is_some_and(|d| d.requires_restart) {
        println!("   Restart the launcher for this to take effect.");
    }
    Ok(())
}

async fn releases(backend: &Backend, beta: bool) -> Result<()> {
    let releases = backend
        .fetch_releases()
        .await
        .context("Failed to fetch releases")?;
    let visible = visible_releases(&releases, beta);

    if visible.is_empty() {
        println!("📦 No releases found.");
        return Ok(());
    }

    for release in visible {
        let mut tags = Vec::new();
        if release.is_latest {
            tags.push("latest");
        }
        if release.is_beta {
            tags.push("beta");
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };

        println!("📦 {} - {}{}", release.version, release.display_date(), tags);
        for item in &release.whats_new {
            println!("   • {}", item);
        }
    }
    Ok(())
}
