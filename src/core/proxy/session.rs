//! Proxy session view-state
//!
//! Mirrors what the backend reports about the proxy process and derives the
//! launch button from it. The session never talks to the backend itself:
//! start/stop return the request to issue, and the caller feeds results and
//! pushed events back in. This keeps every transition a pure function of the
//! inputs, so replaying the same inputs always lands in the same state.

use super::models::{DownloadProgress, ProxyErrorReport, RpcUserData, Severity, UpdaterStatus};
use crate::bridge::BridgeError;

/// Displayed proxy state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProxyViewState {
    /// Initial status poll has not resolved yet
    #[default]
    Unknown,
    Running,
    Checking,
    Downloading,
    Stopping,
    Stopped,
    Error,
}

impl ProxyViewState {
    /// States from which a launch may be requested
    pub fn can_start(self) -> bool {
        matches!(self, Self::Unknown | Self::Stopped | Self::Error)
    }
}

/// Backend call the session wants issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRequest {
    Launch { port: Option<u16> },
    Stop,
}

/// What clicking the launch button does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Launch,
    Stop,
}

/// Rendered launch button
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonView {
    pub label: String,
    pub icon: &'static str,
    pub enabled: bool,
    pub action: Option<ButtonAction>,
}

/// Blocking dialog opened by a severe proxy error
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorDialog {
    pub code: String,
    pub title: String,
    pub message: String,
    pub suggestion: Option<String>,
    pub severity: Severity,
}

impl From<&ProxyErrorReport> for ErrorDialog {
    fn from(report: &ProxyErrorReport) -> Self {
        Self {
            code: report.code.clone(),
            title: report.title.clone(),
            message: report.message.clone(),
            suggestion: report.suggestion.clone(),
            severity: report.severity,
        }
    }
}

/// Client-side view of one proxy session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxySession {
    state: ProxyViewState,
    /// Only `Some` while downloading
    progress: Option<DownloadProgress>,
    busy: bool,
    status_text: Option<String>,
    dialog: Option<ErrorDialog>,
    player: Option<RpcUserData>,
}

impl ProxySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ProxyViewState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    pub fn dialog(&self) -> Option<&ErrorDialog> {
        self.dialog.as_ref()
    }

    pub fn player(&self) -> Option<&RpcUserData> {
        self.player.as_ref()
    }

    /// Progress to render. `None` unless the proxy is downloading.
    pub fn visible_progress(&self) -> Option<&DownloadProgress> {
        self.progress.as_ref()
    }

    fn set_state(&mut self, state: ProxyViewState) {
        if state != ProxyViewState::Downloading || self.state != ProxyViewState::Downloading {
            self.progress = None;
        }
        if state != ProxyViewState::Running {
            self.player = None;
        }
        self.state = state;
    }

    /// Result of the `get_proxy_status` poll issued on mount.
    ///
    /// Ignored once anything else moved the session out of `Unknown`.
    pub fn status_polled(&mut self, result: Result<bool, BridgeError>) {
        if self.state != ProxyViewState::Unknown {
            return;
        }
        match result {
            Ok(true) => self.set_state(ProxyViewState::Running),
            Ok(false) => self.set_state(ProxyViewState::Stopped),
            Err(e) => {
                tracing::debug!("Proxy status poll failed, assuming stopped: {}", e);
                self.set_state(ProxyViewState::Stopped);
            }
        }
    }

    /// User asked to launch. Returns the call to issue, or `None` when the
    /// click is a no-op.
    pub fn request_start(&mut self, port: Option<u16>) -> Option<SessionRequest> {
        if self.busy || !self.state.can_start() {
            return None;
        }
        self.busy = true;
        self.status_text = Some(UpdaterStatus::Checking.describe());
        self.set_state(ProxyViewState::Checking);
        Some(SessionRequest::Launch { port })
    }

    /// User asked to stop. Returns the call to issue, or `None` when the
    /// click is a no-op.
    pub fn request_stop(&mut self) -> Option<SessionRequest> {
        if self.busy || self.state != ProxyViewState::Running {
            return None;
        }
        self.busy = true;
        self.status_text = Some("Stopping proxy...".to_string());
        self.set_state(ProxyViewState::Stopping);
        Some(SessionRequest::Stop)
    }

    /// Button click, dispatched on the current action
    pub fn press(&mut self, port: Option<u16>) -> Option<SessionRequest> {
        match self.button(false).action? {
            ButtonAction::Launch => self.request_start(port),
            ButtonAction::Stop => self.request_stop(),
        }
    }

    /// `launch_proxy` resolved
    pub fn launch_finished(&mut self, result: Result<(), BridgeError>) {
        self.busy = false;
        match result {
            Ok(()) => {
                if matches!(
                    self.state,
                    ProxyViewState::Checking | ProxyViewState::Downloading
                ) {
                    self.status_text = Some(UpdaterStatus::Launched.describe());
                    self.set_state(ProxyViewState::Running);
                }
            }
            Err(e) => {
                tracing::error!("Failed to launch proxy: {}", e);
                self.status_text = Some(format!("Error: {}", e.reason()));
                self.set_state(ProxyViewState::Error);
            }
        }
    }

    /// `stop_proxy` resolved. The proxy is considered stopped either way.
    pub fn stop_finished(&mut self, result: Result<(), BridgeError>) {
        if let Err(e) = result {
            tracing::error!("Failed to stop proxy: {}", e);
        }
        self.busy = false;
        self.status_text = None;
        self.set_state(ProxyViewState::Stopped);
    }

    /// Pushed `updater:status`
    pub fn apply_status(&mut self, status: &UpdaterStatus) {
        use ProxyViewState as S;

        let next = match (status, self.state) {
            // Only a new start attempt leaves these
            (_, S::Stopping | S::Error) => None,
            (UpdaterStatus::Checking, S::Unknown | S::Stopped | S::Checking) => {
                Some(S::Checking)
            }
            (UpdaterStatus::Downloading { .. }, S::Running) => None,
            (UpdaterStatus::Downloading { .. }, _) => Some(S::Downloading),
            (UpdaterStatus::Launching, S::Downloading) => Some(S::Checking),
            (UpdaterStatus::Launched, _) => Some(S::Running),
            (UpdaterStatus::Error, S::Checking | S::Downloading | S::Running) => Some(S::Error),
            _ => None,
        };

        let Some(next) = next else {
            tracing::debug!("Ignoring updater status {:?} in state {:?}", status, self.state);
            return;
        };

        // Entering downloading always starts from an empty progress bar
        if matches!(status, UpdaterStatus::Downloading { .. }) {
            self.progress = None;
        }
        if matches!(next, S::Running | S::Error) {
            self.busy = false;
        }
        self.status_text = Some(status.describe());
        self.set_state(next);
    }

    /// Pushed `updater:progress`. Only visible while downloading.
    pub fn apply_progress(&mut self, progress: DownloadProgress) {
        if self.state == ProxyViewState::Downloading {
            self.progress = Some(progress);
        }
    }

    /// Pushed `proxy-error`. Returns whether a dialog was opened.
    pub fn apply_proxy_error(&mut self, report: &ProxyErrorReport) -> bool {
        if !report.severity.is_blocking() {
            tracing::info!(
                code = %report.code,
                severity = ?report.severity,
                "Proxy reported: {}",
                report.message
            );
            return false;
        }
        tracing::warn!(code = %report.code, "Proxy error: {}", report.message);
        self.dialog = Some(ErrorDialog::from(report));
        true
    }

    pub fn dismiss_dialog(&mut self) {
        self.dialog = None;
    }

    /// Pushed `rpc-user-data`
    pub fn apply_player(&mut self, player: RpcUserData) {
        if self.state == ProxyViewState::Running {
            self.player = Some(player);
        }
    }

    /// Derive the launch button. A banned user can never launch.
    pub fn button(&self, banned: bool) -> ButtonView {
        use ProxyViewState as S;

        let (label, icon, action) = match self.state {
            S::Unknown => ("Loading...".to_string(), "⏳", None),
            S::Stopped => ("Launch".to_string(), "▶", Some(ButtonAction::Launch)),
            S::Checking => ("Checking...".to_string(), "⏳", None),
            S::Downloading => {
                let label = match &self.progress {
                    Some(p) => format!("Downloading... {}%", p.percent()),
                    None => "Downloading...".to_string(),
                };
                (label, "⬇", None)
            }
            S::Running => ("Stop".to_string(), "■", Some(ButtonAction::Stop)),
            S::Stopping => ("Stopping...".to_string(), "⏳", None),
            S::Error => ("Error".to_string(), "⚠", Some(ButtonAction::Launch)),
        };

        let action = match action {
            Some(ButtonAction::Launch) if banned => None,
            other => other,
        };

        ButtonView {
            label,
            icon,
            enabled: action.is_some() && !self.busy,
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> ProxySession {
        let mut session = ProxySession::new();
        session.status_polled(Ok(true));
        session
    }

    fn stopped() -> ProxySession {
        let mut session = ProxySession::new();
        session.status_polled(Ok(false));
        session
    }

    fn downloading() -> UpdaterStatus {
        UpdaterStatus::Downloading {
            version: "1.2.0".to_string(),
        }
    }

    fn report(severity: Severity) -> ProxyErrorReport {
        ProxyErrorReport {
            code: "E_PORT".to_string(),
            title: "Port unavailable".to_string(),
            message: "Port 25565 is already in use".to_string(),
            suggestion: Some("Pick another port in settings".to_string()),
            severity,
            category: "network".to_string(),
            original_message: None,
            context: None,
            timestamp: None,
        }
    }

    #[test]
    fn test_status_poll() {
        assert_eq!(running().state(), ProxyViewState::Running);
        assert_eq!(stopped().state(), ProxyViewState::Stopped);

        let mut failed = ProxySession::new();
        failed.status_polled(Err(BridgeError::Transport("refused".to_string())));
        assert_eq!(failed.state(), ProxyViewState::Stopped);
        assert!(failed.status_text().is_none());
    }

    #[test]
    fn test_late_poll_does_not_override_launch() {
        let mut session = ProxySession::new();
        assert!(session.request_start(None).is_some());
        session.status_polled(Ok(false));
        assert_eq!(session.state(), ProxyViewState::Checking);
    }

    #[test]
    fn test_launch_download_scenario() {
        let mut session = stopped();

        let request = session.request_start(Some(25565));
        assert_eq!(request, Some(SessionRequest::Launch { port: Some(25565) }));
        assert_eq!(session.state(), ProxyViewState::Checking);

        session.apply_status(&downloading());
        assert_eq!(session.state(), ProxyViewState::Downloading);
        assert!(session.visible_progress().is_none());

        session.apply_progress(DownloadProgress {
            downloaded: 1000,
            total: 10000,
            speed: 500.0,
        });
        assert_eq!(session.visible_progress().map(|p| p.percent()), Some(10));
        assert_eq!(session.button(false).label, "Downloading... 10%");

        session.apply_status(&UpdaterStatus::Launched);
        assert_eq!(session.state(), ProxyViewState::Running);
        assert!(session.visible_progress().is_none());
        assert!(!session.is_busy());
    }

    #[test]
    fn test_progress_outside_downloading_is_invisible() {
        let mut session = stopped();
        session.request_start(None);

        session.apply_progress(DownloadProgress {
            downloaded: 5,
            total: 10,
            speed: 1.0,
        });
        assert_eq!(session.state(), ProxyViewState::Checking);
        assert!(session.visible_progress().is_none());
        assert_eq!(session.button(false).label, "Checking...");
    }

    #[test]
    fn test_reentrant_clicks_are_noops() {
        let mut session = stopped();
        assert!(session.request_start(None).is_some());
        assert!(session.request_start(None).is_none());
        assert!(session.request_stop().is_none());
        assert!(!session.button(false).enabled);
    }

    #[test]
    fn test_stop_resolves_to_stopped_on_success_and_failure() {
        for result in [Ok(()), Err(BridgeError::command("stop_proxy", "Proxy is not running"))] {
            let mut session = running();
            assert_eq!(session.request_stop(), Some(SessionRequest::Stop));
            assert_eq!(session.state(), ProxyViewState::Stopping);

            session.stop_finished(result);
            assert_eq!(session.state(), ProxyViewState::Stopped);
            assert!(!session.is_busy());
        }
    }

    #[test]
    fn test_launch_failure_sets_error() {
        let mut session = stopped();
        session.request_start(None);
        session.launch_finished(Err(BridgeError::command(
            "launch_proxy",
            "No release found",
        )));

        assert_eq!(session.state(), ProxyViewState::Error);
        assert!(!session.is_busy());
        assert_eq!(session.status_text(), Some("Error: No release found"));

        let button = session.button(false);
        assert_eq!(button.label, "Error");
        assert_eq!(button.action, Some(ButtonAction::Launch));

        // Error is left only by a new start attempt
        for status in [
            UpdaterStatus::Error,
            UpdaterStatus::Checking,
            downloading(),
            UpdaterStatus::Launching,
            UpdaterStatus::Launched,
        ] {
            session.apply_status(&status);
            assert_eq!(session.state(), ProxyViewState::Error, "after {:?}", status);
        }
        assert_eq!(session.status_text(), Some("Error: No release found"));
        assert!(session.request_start(None).is_some());
        assert_eq!(session.state(), ProxyViewState::Checking);
    }

    #[test]
    fn test_launch_ok_without_launched_event() {
        let mut session = stopped();
        session.request_start(None);
        session.launch_finished(Ok(()));
        assert_eq!(session.state(), ProxyViewState::Running);
    }

    #[test]
    fn test_process_exit_while_running() {
        let mut session = running();
        session.apply_status(&UpdaterStatus::Error);
        assert_eq!(session.state(), ProxyViewState::Error);
    }

    #[test]
    fn test_status_events_ignored_while_stopping() {
        let mut session = running();
        session.request_stop();
        session.apply_status(&UpdaterStatus::Error);
        assert_eq!(session.state(), ProxyViewState::Stopping);
    }

    #[test]
    fn test_proxy_error_dialog_only_for_blocking() {
        let mut session = running();

        assert!(!session.apply_proxy_error(&report(Severity::Warning)));
        assert!(!session.apply_proxy_error(&report(Severity::Info)));
        assert!(session.dialog().is_none());

        assert!(session.apply_proxy_error(&report(Severity::Critical)));
        let dialog = session.dialog().unwrap();
        assert_eq!(dialog.message, "Port 25565 is already in use");
        assert_eq!(dialog.suggestion.as_deref(), Some("Pick another port in settings"));

        session.dismiss_dialog();
        assert!(session.dialog().is_none());
        assert_eq!(session.state(), ProxyViewState::Running);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let events = vec![
            downloading(),
            UpdaterStatus::Launching,
            UpdaterStatus::Checking,
            downloading(),
            UpdaterStatus::Launched,
            UpdaterStatus::Error,
        ];

        let replay = || {
            let mut session = stopped();
            session.request_start(None);
            for (i, event) in events.iter().enumerate() {
                session.apply_status(event);
                session.apply_progress(DownloadProgress {
                    downloaded: i as u64 * 10,
                    total: 100,
                    speed: 1.0,
                });
                assert_eq!(
                    session.visible_progress().is_some(),
                    session.state() == ProxyViewState::Downloading
                );
            }
            session
        };

        assert_eq!(replay(), replay());
        assert_eq!(replay().state(), ProxyViewState::Error);
    }

    #[test]
    fn test_banned_user_cannot_launch() {
        let session = stopped();
        let button = session.button(true);
        assert!(!button.enabled);
        assert!(button.action.is_none());

        // Stopping a running proxy stays possible
        assert!(running().button(true).enabled);
    }

    #[test]
    fn test_player_cleared_when_leaving_running() {
        let mut session = running();
        session.apply_player(RpcUserData {
            ign: "Steve".to_string(),
            uuid: "069a79f4".to_string(),
        });
        assert_eq!(session.player().map(|p| p.ign.as_str()), Some("Steve"));

        session.request_stop();
        assert!(session.player().is_none());
    }
}
