//! Utility module
//!
//! Common utilities used across the application.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Download speed from bytes per second
pub fn format_speed(bytes_per_sec: f64) -> String {
    if !bytes_per_sec.is_finite() || bytes_per_sec <= 0.0 {
        return "0 B/s".to_string();
    }
    format!("{}/s", format_size(bytes_per_sec as u64))
}

/// Open a link in the default browser
pub fn open_url(url: &str) -> Result<()> {
    tracing::info!("Opening {}", url);
    open::that(url).with_context(|| format!("Failed to open {}", url))
}

/// Start a fresh copy of this executable with the same arguments
pub fn relaunch() -> Result<()> {
    let exe = std::env::current_exe().context("Could not locate the launcher executable")?;
    std::process::Command::new(&exe)
        .args(std::env::args_os().skip(1))
        .spawn()
        .with_context(|| format!("Failed to restart {}", exe.display()))?;
    Ok(())
}

/// Write exported log text to a timestamped file in `dir`
pub fn export_logs(dir: &Path, contents: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let name = format!("proxy-{}.log", chrono::Local::now().format("%Y%m%d-%H%M%S"));
    let path = dir.join(name);
    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!("Exported logs to {}", path.display());
    Ok(path)
}
