//! First-run onboarding
//!
//! welcome → token → theme → done. The token step needs a verified token
//! saved by the backend before it lets the user through.

use super::{FlowStep, LinearFlow};
use crate::bridge::BridgeError;
use crate::config::Theme;
use crate::core::account::{DiscordAuthResult, VerifyFailure, VerifyTokenResponse};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingStep {
    Welcome,
    Token,
    Theme,
    Done,
}

impl FlowStep for OnboardingStep {
    fn auto_advance(self) -> Option<Duration> {
        match self {
            Self::Welcome => Some(Duration::from_secs(3)),
            Self::Done => Some(Duration::from_secs(2)),
            Self::Token | Self::Theme => None,
        }
    }
}

/// Where the token step stands
#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenPhase {
    Editing,
    WaitingForDiscord,
    Verifying,
    Saving,
}

#[derive(Debug, Clone)]
pub struct Onboarding {
    flow: LinearFlow<OnboardingStep>,
    phase: TokenPhase,
    /// Text field contents
    pub token_input: String,
    error: Option<String>,
    username: Option<String>,
    theme: Theme,
}

impl Onboarding {
    pub fn new(theme: Theme, now: Instant) -> Self {
        Self {
            flow: LinearFlow::new(
                vec![
                    OnboardingStep::Welcome,
                    OnboardingStep::Token,
                    OnboardingStep::Theme,
                    OnboardingStep::Done,
                ],
                now,
            ),
            phase: TokenPhase::Editing,
            token_input: String::new(),
            error: None,
            username: None,
            theme,
        }
    }

    pub fn step(&self) -> OnboardingStep {
        self.flow.current()
    }

    pub fn position(&self) -> (usize, usize) {
        self.flow.position()
    }

    pub fn is_finished(&self) -> bool {
        self.flow.is_finished()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Username reported by a successful verification
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// A backend call for the token step is in flight
    pub fn is_working(&self) -> bool {
        self.phase != TokenPhase::Editing
    }

    pub fn is_waiting_for_discord(&self) -> bool {
        self.phase == TokenPhase::WaitingForDiscord
    }

    pub fn tick(&mut self, now: Instant) -> bool {
        self.flow.tick(now)
    }

    /// "Get started" on the welcome screen skips the remaining delay
    pub fn skip_welcome(&mut self, now: Instant) {
        if self.step() == OnboardingStep::Welcome {
            self.flow.advance(now);
        }
    }

    /// Submit the typed token. Returns the token to verify.
    pub fn submit_token(&mut self) -> Option<String> {
        if self.step() != OnboardingStep::Token || self.is_working() {
            return None;
        }
        let token = self.token_input.trim().to_string();
        if token.is_empty() {
            self.error = Some("Paste your Duels+ token first.".to_string());
            return None;
        }
        self.error = None;
        self.phase = TokenPhase::Verifying;
        Some(token)
    }

    /// Whether a Discord sign-in may be started now
    pub fn begin_discord_signin(&mut self) -> bool {
        if self.step() != OnboardingStep::Token || self.is_working() {
            return false;
        }
        self.error = None;
        self.phase = TokenPhase::WaitingForDiscord;
        true
    }

    /// `start_discord_signin` itself failed
    pub fn discord_signin_failed(&mut self, error: &BridgeError) {
        if self.phase == TokenPhase::WaitingForDiscord {
            self.phase = TokenPhase::Editing;
            self.error = Some(format!("Discord sign-in failed: {}", error.reason()));
        }
    }

    /// Pushed `discord-auth-result`. Returns the token to verify.
    pub fn discord_result(&mut self, result: DiscordAuthResult) -> Option<String> {
        if self.phase != TokenPhase::WaitingForDiscord {
            return None;
        }
        match result {
            DiscordAuthResult {
                success: true,
                token: Some(token),
                ..
            } => {
                self.token_input = token.clone();
                self.phase = TokenPhase::Verifying;
                Some(token)
            }
            DiscordAuthResult { error, .. } => {
                self.phase = TokenPhase::Editing;
                self.error = Some(error.unwrap_or_else(|| "Discord sign-in was cancelled.".to_string()));
                None
            }
        }
    }

    /// `verify_token` resolved. Returns the token to save on success.
    pub fn verify_finished(
        &mut self,
        token: String,
        result: Result<VerifyTokenResponse, BridgeError>,
    ) -> Option<String> {
        if self.phase != TokenPhase::Verifying {
            return None;
        }
        match result {
            Ok(response) if response.success => {
                self.username = response.username;
                self.phase = TokenPhase::Saving;
                Some(token)
            }
            Ok(response) => {
                let failure = VerifyFailure::from_response(&response);
                tracing::info!("Token rejected: {:?}", failure);
                self.phase = TokenPhase::Editing;
                self.error = Some(failure.to_string());
                None
            }
            Err(e) => {
                self.phase = TokenPhase::Editing;
                self.error = Some(format!("Could not verify token: {}", e.reason()));
                None
            }
        }
    }

    /// `save_token` resolved
    pub fn token_saved(&mut self, result: Result<(), BridgeError>, now: Instant) {
        if self.phase != TokenPhase::Saving {
            return;
        }
        self.phase = TokenPhase::Editing;
        match result {
            Ok(()) => {
                self.token_input.clear();
                self.flow.advance(now);
            }
            Err(e) => self.error = Some(format!("Could not save token: {}", e.reason())),
        }
    }

    pub fn choose_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    /// Leave the theme step. Returns the theme to persist.
    pub fn confirm_theme(&mut self, now: Instant) -> Option<Theme> {
        if self.step() != OnboardingStep::Theme {
            return None;
        }
        self.flow.advance(now);
        Some(self.theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::account::ResponseCode;

    fn verified(username: &str) -> VerifyTokenResponse {
        VerifyTokenResponse {
            success: true,
            code: None,
            user_id: Some("1".to_string()),
            username: Some(username.to_string()),
            message: None,
        }
    }

    fn at_token_step(start: Instant) -> Onboarding {
        let mut onboarding = Onboarding::new(Theme::Dark, start);
        onboarding.tick(start + Duration::from_secs(3));
        assert_eq!(onboarding.step(), OnboardingStep::Token);
        onboarding
    }

    #[test]
    fn test_position_starts_at_one() {
        let start = Instant::now();
        assert_eq!(Onboarding::new(Theme::Dark, start).position(), (1, 4));
        assert_eq!(at_token_step(start).position(), (2, 4));
    }

    #[test]
    fn test_full_flow() {
        let start = Instant::now();
        let mut onboarding = at_token_step(start);

        onboarding.token_input = "  abc123  ".to_string();
        let token = onboarding.submit_token().unwrap();
        assert_eq!(token, "abc123");
        assert!(onboarding.submit_token().is_none());

        let to_save = onboarding.verify_finished(token, Ok(verified("alex"))).unwrap();
        assert_eq!(to_save, "abc123");
        assert_eq!(onboarding.username(), Some("alex"));

        // Token step has no auto-advance
        assert!(!onboarding.tick(start + Duration::from_secs(100)));

        onboarding.token_saved(Ok(()), start + Duration::from_secs(10));
        assert_eq!(onboarding.step(), OnboardingStep::Theme);

        onboarding.choose_theme(Theme::Light);
        assert_eq!(onboarding.confirm_theme(start + Duration::from_secs(11)), Some(Theme::Light));
        assert_eq!(onboarding.step(), OnboardingStep::Done);

        assert!(onboarding.tick(start + Duration::from_secs(13)));
        assert!(onboarding.is_finished());
    }

    #[test]
    fn test_rejected_token_stays_on_step() {
        let start = Instant::now();
        let mut onboarding = at_token_step(start);
        onboarding.token_input = "bad".to_string();
        let token = onboarding.submit_token().unwrap();

        let response = VerifyTokenResponse {
            success: false,
            code: Some(ResponseCode::Text("banned".to_string())),
            user_id: None,
            username: None,
            message: None,
        };
        assert!(onboarding.verify_finished(token, Ok(response)).is_none());
        assert_eq!(onboarding.step(), OnboardingStep::Token);
        assert_eq!(onboarding.error(), Some("This account is banned from Duels+."));
        assert!(!onboarding.is_working());
    }

    #[test]
    fn test_empty_token_is_not_submitted() {
        let start = Instant::now();
        let mut onboarding = at_token_step(start);
        assert!(onboarding.submit_token().is_none());
        assert!(onboarding.error().is_some());
    }

    #[test]
    fn test_discord_signin() {
        let start = Instant::now();
        let mut onboarding = at_token_step(start);

        assert!(onboarding.begin_discord_signin());
        assert!(!onboarding.begin_discord_signin());

        let token = onboarding.discord_result(DiscordAuthResult {
            success: true,
            token: Some("from-discord".to_string()),
            error: None,
        });
        assert_eq!(token.as_deref(), Some("from-discord"));
        assert!(onboarding.is_working());
    }

    #[test]
    fn test_discord_timeout_reports_error() {
        let start = Instant::now();
        let mut onboarding = at_token_step(start);
        onboarding.begin_discord_signin();

        let token = onboarding.discord_result(DiscordAuthResult {
            success: false,
            token: None,
            error: Some("Authentication timed out".to_string()),
        });
        assert!(token.is_none());
        assert_eq!(onboarding.error(), Some("Authentication timed out"));
    }

    #[test]
    fn test_discord_result_ignored_when_not_waiting() {
        let start = Instant::now();
        let mut onboarding = at_token_step(start);
        let token = onboarding.discord_result(DiscordAuthResult {
            success: true,
            token: Some("stray".to_string()),
            error: None,
        });
        assert!(token.is_none());
    }

    #[test]
    fn test_welcome_can_be_skipped() {
        let start = Instant::now();
        let mut onboarding = Onboarding::new(Theme::Dark, start);
        onboarding.skip_welcome(start);
        assert_eq!(onboarding.step(), OnboardingStep::Token);
    }
}
