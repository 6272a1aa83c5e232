//! Confirmation dialogs with a countdown before the confirm button unlocks

use super::CountdownGate;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmKind {
    /// Turning on pre-release proxy builds
    BetaChannel,
    /// Restarting the launcher so a setting takes effect
    Restart,
}

impl ConfirmKind {
    pub fn countdown(self) -> Duration {
        match self {
            Self::BetaChannel => Duration::from_secs(5),
            Self::Restart => Duration::from_secs(3),
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::BetaChannel => "Enable beta channel?",
            Self::Restart => "Restart required",
        }
    }

    pub fn body(self) -> &'static str {
        match self {
            Self::BetaChannel => {
                "Beta builds are released before they are fully tested. \
                 They may crash, lose settings or get you disconnected."
            }
            Self::Restart => {
                "This change takes effect after the launcher restarts."
            }
        }
    }

    pub fn confirm_label(self) -> &'static str {
        match self {
            Self::BetaChannel => "Enable",
            Self::Restart => "Restart now",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmDialog {
    kind: ConfirmKind,
    gate: CountdownGate,
}

impl ConfirmDialog {
    pub fn open(kind: ConfirmKind, now: Instant) -> Self {
        Self {
            kind,
            gate: CountdownGate::new(kind.countdown(), now),
        }
    }

    pub fn kind(&self) -> ConfirmKind {
        self.kind
    }

    pub fn can_confirm(&self, now: Instant) -> bool {
        self.gate.is_open(now)
    }

    /// Label for the confirm button, with the countdown while locked
    pub fn confirm_label(&self, now: Instant) -> String {
        if self.can_confirm(now) {
            self.kind.confirm_label().to_string()
        } else {
            format!("{} ({})", self.kind.confirm_label(), self.gate.seconds_left(now))
        }
    }

    /// Attempt to confirm. Refused while the countdown runs.
    pub fn confirm(&self, now: Instant) -> bool {
        self.can_confirm(now)
    }
}
