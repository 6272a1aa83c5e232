//! Remote configuration schema
//!
//! Settings stored by the backend, plus the static description of how each
//! one is edited.

use serde::{Deserialize, Serialize};

/// Backend configuration object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Minimize the launcher to the system tray instead of closing
    #[serde(default)]
    pub minimize_to_tray: bool,

    /// Automatically download proxy updates
    #[serde(default = "default_true")]
    pub auto_update: bool,

    /// Switch to the logs view when the proxy launches
    #[serde(default = "default_true")]
    pub open_logs_on_launch: bool,

    #[serde(default)]
    pub reduced_motion: bool,

    /// Discord Rich Presence
    #[serde(default = "default_true")]
    pub enable_rpc: bool,

    #[serde(default)]
    pub rpc_anonymize_profile: bool,

    #[serde(default)]
    pub rpc_anonymize_location: bool,

    /// Large image key shown in Rich Presence
    #[serde(default = "default_rpc_image")]
    pub rpc_image: String,

    /// Proxy listen port, kept as a string on the wire
    #[serde(default = "default_proxy_port")]
    pub proxy_port: String,

    /// Microsoft account authentication
    #[serde(default)]
    pub enable_msa: bool,

    /// Receive beta proxy releases
    #[serde(default)]
    pub beta_updates: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            minimize_to_tray: false,
            auto_update: true,
            open_logs_on_launch: true,
            reduced_motion: false,
            enable_rpc: true,
            rpc_anonymize_profile: false,
            rpc_anonymize_location: false,
            rpc_image: default_rpc_image(),
            proxy_port: default_proxy_port(),
            enable_msa: false,
            beta_updates: false,
        }
    }
}

impl Config {
    /// Port to pass to `launch_proxy`, if the stored value is usable
    pub fn port(&self) -> Option<u16> {
        parse_port(&self.proxy_port)
    }
}

fn default_true() -> bool {
    true
}
fn default_rpc_image() -> String {
    "logo".to_string()
}
fn default_proxy_port() -> String {
    "25565".to_string()
}

/// Parse a user-entered port, rejecting 0 and anything outside u16
pub fn parse_port(input: &str) -> Option<u16> {
    input.trim().parse::<u16>().ok().filter(|port| *port != 0)
}

pub mod keys {
    pub const MINIMIZE_TO_TRAY: &str = "minimizeToTray";
    pub const AUTO_UPDATE: &str = "autoUpdate";
    pub const OPEN_LOGS_ON_LAUNCH: &str = "openLogsOnLaunch";
    pub const REDUCED_MOTION: &str = "reducedMotion";
    pub const ENABLE_RPC: &str = "enableRpc";
    pub const RPC_ANONYMIZE_PROFILE: &str = "rpcAnonymizeProfile";
    pub const RPC_ANONYMIZE_LOCATION: &str = "rpcAnonymizeLocation";
    pub const RPC_IMAGE: &str = "rpcImage";
    pub const PROXY_PORT: &str = "proxyPort";
    pub const ENABLE_MSA: &str = "enableMsa";
    pub const BETA_UPDATES: &str = "betaUpdates";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Toggle,
    Port,
    /// Picked through the rich presence dialog
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    General,
    Proxy,
    Discord,
    Advanced,
}

impl Section {
    pub const ALL: [Section; 4] = [Self::General, Self::Proxy, Self::Discord, Self::Advanced];

    pub fn title(self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Proxy => "Proxy",
            Self::Discord => "Discord",
            Self::Advanced => "Advanced",
        }
    }
}

/// How one setting is presented and edited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub kind: SettingKind,
    pub section: Section,
    /// Boolean setting that must be on for this one to be editable
    pub depends_on: Option<&'static str>,
    pub requires_restart: bool,
}

pub const SETTINGS: &[SettingDescriptor] = &[
    SettingDescriptor {
        key: keys::MINIMIZE_TO_TRAY,
        label: "Minimize to tray",
        description: "Keep running in the system tray when the window is closed.",
        kind: SettingKind::Toggle,
        section: Section::General,
        depends_on: None,
        requires_restart: false,
    },
    SettingDescriptor {
        key: keys::OPEN_LOGS_ON_LAUNCH,
        label: "Open logs on launch",
        description: "Switch to the logs view when the proxy starts.",
        kind: SettingKind::Toggle,
        section: Section::General,
        depends_on: None,
        requires_restart: false,
    },
    SettingDescriptor {
        key: keys::REDUCED_MOTION,
        label: "Reduced motion",
        description: "Turn off animations.",
        kind: SettingKind::Toggle,
        section: Section::General,
        depends_on: None,
        requires_restart: false,
    },
    SettingDescriptor {
        key: keys::AUTO_UPDATE,
        label: "Automatic updates",
        description: "Download new proxy versions before launching.",
        kind: SettingKind::Toggle,
        section: Section::Proxy,
        depends_on: None,
        requires_restart: false,
    },
    SettingDescriptor {
        key: keys::PROXY_PORT,
        label: "Proxy port",
        description: "Local port Minecraft connects to.",
        kind: SettingKind::Port,
        section: Section::Proxy,
        depends_on: None,
        requires_restart: true,
    },
    SettingDescriptor {
        key: keys::ENABLE_RPC,
        label: "Discord Rich Presence",
        description: "Show what you are playing on your Discord profile.",
        kind: SettingKind::Toggle,
        section: Section::Discord,
        depends_on: None,
        requires_restart: false,
    },
    SettingDescriptor {
        key: keys::RPC_ANONYMIZE_PROFILE,
        label: "Hide username",
        description: "Do not show your in-game name in Rich Presence.",
        kind: SettingKind::Toggle,
        section: Section::Discord,
        depends_on: Some(keys::ENABLE_RPC),
        requires_restart: false,
    },
    SettingDescriptor {
        key: keys::RPC_ANONYMIZE_LOCATION,
        label: "Hide mode and map",
        description: "Do not show the current game mode or map in Rich Presence.",
        kind: SettingKind::Toggle,
        section: Section::Discord,
        depends_on: Some(keys::ENABLE_RPC),
        requires_restart: false,
    },
    SettingDescriptor {
        key: keys::RPC_IMAGE,
        label: "Presence image",
        description: "Image shown on your Discord profile.",
        kind: SettingKind::Image,
        section: Section::Discord,
        depends_on: Some(keys::ENABLE_RPC),
        requires_restart: false,
    },
    SettingDescriptor {
        key: keys::ENABLE_MSA,
        label: "Microsoft authentication",
        description: "Sign in to Minecraft servers with your Microsoft account.",
        kind: SettingKind::Toggle,
        section: Section::Advanced,
        depends_on: None,
        requires_restart: true,
    },
    SettingDescriptor {
        key: keys::BETA_UPDATES,
        label: "Beta channel",
        description: "Receive pre-release proxy builds. They may be unstable.",
        kind: SettingKind::Toggle,
        section: Section::Advanced,
        depends_on: None,
        requires_restart: true,
    },
];

pub fn descriptor(key: &str) -> Option<&'static SettingDescriptor> {
    SETTINGS.iter().find(|d| d.key == key)
}
