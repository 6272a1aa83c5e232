//! Log buffer
//!
//! Append-only record of every `log-message` line the backend pushed during
//! this process. Filtering is a read-only projection; the buffer only shrinks
//! when the user clears it.

pub mod ansi;

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tokio::sync::broadcast;

const CHANGE_CAPACITY: usize = 1024;

static LEVEL_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*\[(DEBUG|INFO|WARN|WARNING|ERROR)\]").expect("valid level regex")
});

/// Severity parsed from a line's leading `[TAG]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const ALL: [LogLevel; 4] = [Self::Debug, Self::Info, Self::Warn, Self::Error];

    fn index(self) -> usize {
        self as usize
    }

    /// Level of an ANSI-stripped line, `None` when it carries no known tag
    pub fn classify(plain: &str) -> Option<Self> {
        let caps = LEVEL_TAG.captures(plain)?;
        match caps[1].to_ascii_uppercase().as_str() {
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARN" | "WARNING" => Some(Self::Warn),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("Unknown log level: {}", other)),
        }
    }
}

/// Which levels are shown. Unleveled lines are always shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelFilter {
    enabled: [bool; 4],
}

impl LevelFilter {
    pub fn all() -> Self {
        Self { enabled: [true; 4] }
    }

    pub fn none() -> Self {
        Self { enabled: [false; 4] }
    }

    pub fn only(levels: &[LogLevel]) -> Self {
        let mut filter = Self::none();
        for level in levels {
            filter.set(*level, true);
        }
        filter
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.enabled[level.index()]
    }

    pub fn set(&mut self, level: LogLevel, enabled: bool) {
        self.enabled[level.index()] = enabled;
    }

    pub fn toggle(&mut self, level: LogLevel) {
        self.enabled[level.index()] ^= true;
    }

    pub fn allows(&self, level: Option<LogLevel>) -> bool {
        level.is_none_or(|level| self.is_enabled(level))
    }
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// One buffered line. The raw text is kept untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    raw: String,
    plain: String,
    level: Option<LogLevel>,
}

impl LogLine {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let plain = ansi::strip(&raw);
        let level = LogLevel::classify(&plain);
        Self { raw, plain, level }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Text with escape sequences removed
    pub fn plain(&self) -> &str {
        &self.plain
    }

    pub fn level(&self) -> Option<LogLevel> {
        self.level
    }

    pub fn spans(&self) -> Vec<ansi::StyledSpan> {
        ansi::parse(&self.raw)
    }
}

/// Notification sent to buffer observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogChange {
    Appended(LogLine),
    Cleared,
}

#[derive(Debug)]
pub struct LogBuffer {
    lines: Vec<LogLine>,
    changes: broadcast::Sender<LogChange>,
}

impl LogBuffer {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            lines: Vec::new(),
            changes,
        }
    }

    pub fn push(&mut self, raw: impl Into<String>) {
        let line = LogLine::new(raw);
        self.lines.push(line.clone());
        let _ = self.changes.send(LogChange::Appended(line));
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        let _ = self.changes.send(LogChange::Cleared);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    /// Lines visible under `filter`, in buffer order
    pub fn filtered<'a>(&'a self, filter: &'a LevelFilter) -> impl Iterator<Item = &'a LogLine> + 'a {
        self.lines.iter().filter(move |line| filter.allows(line.level))
    }

    /// Visible lines joined as plain text, for copy and export
    pub fn to_plain_text(&self, filter: &LevelFilter) -> String {
        let mut out = String::new();
        for line in self.filtered(filter) {
            out.push_str(line.plain());
            out.push('\n');
        }
        out
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogChange> {
        self.changes.subscribe()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}
