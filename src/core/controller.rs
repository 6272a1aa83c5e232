//! Launcher controller
//!
//! Owns the backend, the process-wide stores and whatever views are mounted.
//! Backend calls and event subscriptions run as tokio tasks; their results
//! come back through a channel and are applied on the thread that calls
//! [`Launcher::pump`] or [`Launcher::next`], so view state is only ever
//! touched from one place.
//!
//! Every mount gets a fresh generation. Results carry the generation they
//! were issued under and are dropped if the view has since been unmounted
//! or remounted.

use crate::bridge::{Backend, BridgeError};
use crate::config::Theme;
use crate::core::account::{AccountState, DiscordAuthResult, GetUserResponse, StatsResponse, VerifyTokenResponse};
use crate::core::flow::{ConfirmDialog, ConfirmKind, Onboarding};
use crate::core::logs::LogBuffer;
use crate::core::presence::{self, Selection};
use crate::core::proxy::{
    DownloadProgress, ProxyErrorReport, ProxySession, RpcUserData, SessionRequest, UpdaterChange,
    UpdaterStatus, UpdaterTracker,
};
use crate::core::releases::{Release, ReleaseNotes};
use crate::core::settings::{Config, PendingWrite, SettingsError, SettingsMirror, keys};
use futures::stream::BoxStream;
use futures::{Future, StreamExt};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type Generation = u64;
type Waker = Arc<dyn Fn() + Send + Sync>;

/// Aborts the forwarding task when dropped
pub struct SubscriptionGuard(JoinHandle<()>);

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

enum Message {
    Log(String),
    Updater(UpdaterChange),
    Proxy(Generation, ProxyMessage),
    Settings(Generation, SettingsMessage),
    Account(Generation, AccountMessage),
    Releases(Generation, Result<Vec<Release>, BridgeError>),
    TokenChecked(Result<bool, BridgeError>),
    Onboarding(Generation, OnboardingMessage),
    SignedOut(Result<bool, BridgeError>),
    ImageApplied(String, Result<(), BridgeError>),
    PresenceToggled(bool, Result<(), BridgeError>),
}

enum ProxyMessage {
    Polled(Result<bool, BridgeError>),
    Launched(Result<(), BridgeError>),
    Stopped(Result<(), BridgeError>),
    Status(UpdaterStatus),
    Progress(DownloadProgress),
    Error(ProxyErrorReport),
    Player(RpcUserData),
}

enum SettingsMessage {
    Loaded(Result<Option<Config>, BridgeError>),
    Written(PendingWrite, Result<(), BridgeError>),
}

enum AccountMessage {
    User(Result<Option<GetUserResponse>, BridgeError>),
    Api(Result<bool, BridgeError>),
    UserStats(Result<StatsResponse, BridgeError>),
    GlobalStats(Result<StatsResponse, BridgeError>),
}

enum OnboardingMessage {
    DiscordStarted(Result<(), BridgeError>),
    Discord(DiscordAuthResult),
    Verified(String, Result<VerifyTokenResponse, BridgeError>),
    Saved(Result<(), BridgeError>),
}

/// Sending half handed to spawned tasks
#[derive(Clone)]
struct Outbox {
    tx: mpsc::UnboundedSender<Message>,
    waker: Arc<RwLock<Option<Waker>>>,
}

impl Outbox {
    fn send(&self, message: Message) {
        if self.tx.send(message).is_err() {
            return;
        }
        if let Some(wake) = self.waker.read().as_ref() {
            wake();
        }
    }
}

struct Mounted<T> {
    generation: Generation,
    view: T,
    _subscriptions: Vec<SubscriptionGuard>,
}

fn view_for<T>(slot: &mut Option<Mounted<T>>, generation: Generation) -> Option<&mut T> {
    match slot {
        Some(mounted) if mounted.generation == generation => Some(&mut mounted.view),
        _ => {
            tracing::trace!("Dropping result for unmounted view (generation {})", generation);
            None
        }
    }
}

/// Whether first-run onboarding has to be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingGate {
    /// Waiting on `token_exists`
    Checking,
    Required,
    NotRequired,
}

pub struct Launcher {
    backend: Backend,
    runtime: Handle,
    outbox: Outbox,
    inbox: mpsc::UnboundedReceiver<Message>,
    next_generation: Generation,

    logs: LogBuffer,
    updater: UpdaterTracker,
    _global: Vec<SubscriptionGuard>,

    proxy: Option<Mounted<ProxySession>>,
    settings: Option<Mounted<SettingsMirror>>,
    account: Option<Mounted<AccountState>>,
    releases: Option<Mounted<ReleaseNotes>>,
    onboarding: Option<Mounted<Onboarding>>,

    gate: OnboardingGate,
    theme: Theme,
    dialog: Option<ConfirmDialog>,
    /// A restart prompt waiting for the dialog slot to free up
    restart_pending: bool,
    restart_requested: bool,
}

impl Launcher {
    /// Create the controller and start feeding the global stores.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(backend: Backend) -> Self {
        let (tx, inbox) = mpsc::unbounded_channel();
        let outbox = Outbox {
            tx,
            waker: Arc::new(RwLock::new(None)),
        };

        let mut launcher = Self {
            backend,
            runtime: Handle::current(),
            outbox,
            inbox,
            next_generation: 0,
            logs: LogBuffer::new(),
            updater: UpdaterTracker::new(),
            _global: Vec::new(),
            proxy: None,
            settings: None,
            account: None,
            releases: None,
            onboarding: None,
            gate: OnboardingGate::NotRequired,
            theme: Theme::default(),
            dialog: None,
            restart_pending: false,
            restart_requested: false,
        };

        launcher._global = vec![
            launcher.forward(launcher.backend.log_messages(), Message::Log),
            launcher.forward(launcher.backend.updater_status(), |s| {
                Message::Updater(UpdaterChange::Status(s))
            }),
            launcher.forward(launcher.backend.updater_progress(), |p| {
                Message::Updater(UpdaterChange::Progress(p))
            }),
            launcher.forward(launcher.backend.updater_visibility(), |v| {
                Message::Updater(UpdaterChange::Visibility(v))
            }),
        ];
        launcher
    }

    /// Called from any thread whenever a result is queued
    pub fn set_waker(&self, wake: impl Fn() + Send + Sync + 'static) {
        *self.outbox.waker.write() = Some(Arc::new(wake));
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    fn generation(&mut self) -> Generation {
        self.next_generation += 1;
        self.next_generation
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Message> + Send + 'static,
    {
        let outbox = self.outbox.clone();
        self.runtime.spawn(async move {
            outbox.send(task.await);
        });
    }

    fn forward<T, F>(&self, mut stream: BoxStream<'static, T>, wrap: F) -> SubscriptionGuard
    where
        T: Send + 'static,
        F: Fn(T) -> Message + Send + 'static,
    {
        let outbox = self.outbox.clone();
        SubscriptionGuard(self.runtime.spawn(async move {
            while let Some(item) = stream.next().await {
                outbox.send(wrap(item));
            }
        }))
    }

    // Message loop

    /// Apply every queued result. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(message) = self.inbox.try_recv() {
            self.apply(message);
            applied += 1;
        }
        applied
    }

    /// Wait for the next result and apply it
    pub async fn next(&mut self) -> bool {
        match self.inbox.recv().await {
            Some(message) => {
                self.apply(message);
                true
            }
            None => false,
        }
    }

    /// Apply results until `done` holds
    pub async fn wait_until(&mut self, mut done: impl FnMut(&Self) -> bool) {
        while !done(self) {
            if !self.next().await {
                break;
            }
        }
    }

    fn apply(&mut self, message: Message) {
        match message {
            Message::Log(line) => self.logs.push(line),
            Message::Updater(change) => self.updater.apply(change),
            Message::Proxy(generation, message) => self.apply_proxy(generation, message),
            Message::Settings(generation, message) => self.apply_settings(generation, message),
            Message::Account(generation, message) => {
                let Some(account) = view_for(&mut self.account, generation) else {
                    return;
                };
                match message {
                    AccountMessage::User(result) => account.user_loaded(result),
                    AccountMessage::Api(result) => account.api_status(result),
                    AccountMessage::UserStats(result) => account.user_stats_loaded(result),
                    AccountMessage::GlobalStats(result) => account.global_stats_loaded(result),
                }
            }
            Message::Releases(generation, result) => {
                if let Some(releases) = view_for(&mut self.releases, generation) {
                    releases.loaded(result);
                }
            }
            Message::TokenChecked(result) => self.token_checked(result),
            Message::Onboarding(generation, message) => self.apply_onboarding(generation, message),
            Message::SignedOut(result) => {
                if let Err(e) = result {
                    tracing::warn!("Failed to delete token: {}", e);
                }
                if let Some(mounted) = self.account.as_mut() {
                    mounted.view.signed_out();
                }
                self.begin_onboarding(Instant::now());
            }
            Message::ImageApplied(key, result) => match result {
                Ok(()) => tracing::info!("Presence image set to {}", key),
                Err(e) => tracing::warn!("Failed to set presence image {}: {}", key, e),
            },
            Message::PresenceToggled(enabled, result) => match result {
                Ok(()) => tracing::info!("Rich presence {}", if enabled { "enabled" } else { "disabled" }),
                Err(e) => tracing::warn!("Failed to toggle rich presence: {}", e),
            },
        }
    }

    // Global stores

    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
    }

    pub fn updater(&self) -> &UpdaterTracker {
        &self.updater
    }

    // Proxy view

    /// Mount the launch view and poll the current proxy status
    pub fn mount_proxy(&mut self) {
        let generation = self.generation();
        let backend = self.backend.clone();
        let subscriptions = vec![
            self.forward(backend.updater_status(), move |s| {
                Message::Proxy(generation, ProxyMessage::Status(s))
            }),
            self.forward(backend.updater_progress(), move |p| {
                Message::Proxy(generation, ProxyMessage::Progress(p))
            }),
            self.forward(backend.proxy_errors(), move |r| {
                Message::Proxy(generation, ProxyMessage::Error(r))
            }),
            self.forward(backend.rpc_user_data(), move |u| {
                Message::Proxy(generation, ProxyMessage::Player(u))
            }),
        ];
        self.proxy = Some(Mounted {
            generation,
            view: ProxySession::new(),
            _subscriptions: subscriptions,
        });

        self.spawn(async move {
            Message::Proxy(generation, ProxyMessage::Polled(backend.get_proxy_status().await))
        });
    }

    pub fn unmount_proxy(&mut self) {
        self.proxy = None;
    }

    pub fn proxy(&self) -> Option<&ProxySession> {
        self.proxy.as_ref().map(|m| &m.view)
    }

    /// Whether the signed-in user is banned, as far as the account view knows
    pub fn is_banned(&self) -> bool {
        self.account().is_some_and(|a| a.is_banned())
    }

    /// Click on the launch button: launch or stop depending on state
    pub fn press_launch_button(&mut self) {
        let Some(session) = self.proxy.as_ref().map(|m| &m.view) else {
            return;
        };
        if self.is_banned() && session.state().can_start() {
            tracing::warn!("Launch refused: account is banned");
            return;
        }
        let port = self.configured_port();
        let request = self.proxy.as_mut().and_then(|m| m.view.press(port));
        self.dispatch(request);
    }

    /// Launch on the configured port
    pub fn start_proxy(&mut self) {
        let port = self.configured_port();
        self.start_proxy_on(port);
    }

    /// Port from the loaded settings. `None` lets the backend pick.
    fn configured_port(&self) -> Option<u16> {
        self.settings()
            .filter(|s| s.is_loaded())
            .and_then(|s| s.config().port())
    }

    /// Launch on `port`, or the backend's default when `None`
    pub fn start_proxy_on(&mut self, port: Option<u16>) {
        if self.is_banned() {
            tracing::warn!("Launch refused: account is banned");
            return;
        }
        let request = self.proxy.as_mut().and_then(|m| m.view.request_start(port));
        self.dispatch(request);
    }

    pub fn stop_proxy(&mut self) {
        let request = self.proxy.as_mut().and_then(|m| m.view.request_stop());
        self.dispatch(request);
    }

    pub fn dismiss_proxy_error(&mut self) {
        if let Some(mounted) = self.proxy.as_mut() {
            mounted.view.dismiss_dialog();
        }
    }

    fn dispatch(&mut self, request: Option<SessionRequest>) {
        let (Some(request), Some(generation)) = (request, self.proxy.as_ref().map(|m| m.generation)) else {
            return;
        };
        let backend = self.backend.clone();
        match request {
            SessionRequest::Launch { port } => {
                tracing::info!("Launching proxy (port {:?})", port);
                self.spawn(async move {
                    Message::Proxy(generation, ProxyMessage::Launched(backend.launch_proxy(port).await))
                });
            }
            SessionRequest::Stop => {
                tracing::info!("Stopping proxy");
                self.spawn(async move {
                    Message::Proxy(generation, ProxyMessage::Stopped(backend.stop_proxy().await))
                });
            }
        }
    }

    fn apply_proxy(&mut self, generation: Generation, message: ProxyMessage) {
        let Some(session) = view_for(&mut self.proxy, generation) else {
            return;
        };
        match message {
            ProxyMessage::Polled(result) => session.status_polled(result),
            ProxyMessage::Launched(result) => session.launch_finished(result),
            ProxyMessage::Stopped(result) => session.stop_finished(result),
            ProxyMessage::Status(status) => session.apply_status(&status),
            ProxyMessage::Progress(progress) => session.apply_progress(progress),
            ProxyMessage::Error(report) => {
                session.apply_proxy_error(&report);
            }
            ProxyMessage::Player(player) => session.apply_player(player),
        }
    }

    // Settings view

    pub fn mount_settings(&mut self) {
        let generation = self.generation();
        self.settings = Some(Mounted {
            generation,
            view: SettingsMirror::new(),
            _subscriptions: Vec::new(),
        });
        let backend = self.backend.clone();
        self.spawn(async move {
            if let Err(e) = import_legacy_config(&backend).await {
                tracing::warn!("Could not import the legacy config: {}", e);
            }
            Message::Settings(generation, SettingsMessage::Loaded(backend.get_config().await))
        });
    }

    pub fn unmount_settings(&mut self) {
        self.settings = None;
    }

    pub fn settings(&self) -> Option<&SettingsMirror> {
        self.settings.as_ref().map(|m| &m.view)
    }

    /// Change a setting. Turning on beta updates opens a confirmation first.
    pub fn set_setting(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        let Some(settings) = self.settings() else {
            return Err(SettingsError::NotLoaded);
        };
        if !settings.is_loaded() {
            return Err(SettingsError::NotLoaded);
        }
        if key == keys::BETA_UPDATES && value == Value::Bool(true) && !settings.config().beta_updates {
            self.dialog = Some(ConfirmDialog::open(ConfirmKind::BetaChannel, Instant::now()));
            return Ok(());
        }
        self.write_setting(key, value)
    }

    fn write_setting(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        let Some(mounted) = self.settings.as_mut() else {
            return Err(SettingsError::NotLoaded);
        };
        let pending = mounted.view.update(key, value)?;
        let generation = mounted.generation;
        let backend = self.backend.clone();
        self.spawn(async move {
            let result = backend.set_config_key(&pending.key, pending.value.clone()).await;
            Message::Settings(generation, SettingsMessage::Written(pending, result))
        });
        Ok(())
    }

    fn apply_settings(&mut self, generation: Generation, message: SettingsMessage) {
        let Some(settings) = view_for(&mut self.settings, generation) else {
            return;
        };
        match message {
            SettingsMessage::Loaded(result) => settings.loaded(result),
            SettingsMessage::Written(pending, Ok(())) => {
                tracing::info!("Saved {}", pending.key);
                if pending.key == keys::ENABLE_RPC {
                    if let Some(enabled) = pending.value.as_bool() {
                        let backend = self.backend.clone();
                        self.spawn(async move {
                            Message::PresenceToggled(enabled, backend.rpc_set_enabled(enabled).await)
                        });
                    }
                }
                if pending.restart_required {
                    self.prompt_restart();
                }
            }
            SettingsMessage::Written(pending, Err(e)) => settings.write_failed(pending, &e),
        }
    }

    // Confirmation dialogs

    /// Open the restart prompt, or queue it behind whatever dialog is open
    fn prompt_restart(&mut self) {
        match self.dialog.as_ref().map(|d| d.kind()) {
            None => self.dialog = Some(ConfirmDialog::open(ConfirmKind::Restart, Instant::now())),
            Some(ConfirmKind::Restart) => {}
            Some(_) => self.restart_pending = true,
        }
    }

    fn open_queued_dialog(&mut self) {
        if self.dialog.is_none() && std::mem::take(&mut self.restart_pending) {
            self.dialog = Some(ConfirmDialog::open(ConfirmKind::Restart, Instant::now()));
        }
    }

    pub fn dialog(&self) -> Option<&ConfirmDialog> {
        self.dialog.as_ref()
    }

    /// Press the dialog's confirm button. Ignored while the countdown runs.
    pub fn confirm_dialog(&mut self, now: Instant) -> bool {
        let Some(dialog) = self.dialog.take() else {
            return false;
        };
        if !dialog.confirm(now) {
            self.dialog = Some(dialog);
            return false;
        }
        match dialog.kind() {
            ConfirmKind::BetaChannel => {
                if let Err(e) = self.write_setting(keys::BETA_UPDATES, Value::Bool(true)) {
                    tracing::warn!("Could not enable beta updates: {}", e);
                }
            }
            ConfirmKind::Restart => {
                self.restart_requested = true;
                self.restart_pending = false;
            }
        }
        self.open_queued_dialog();
        true
    }

    pub fn cancel_dialog(&mut self) {
        self.dialog = None;
        self.open_queued_dialog();
    }

    /// Whether the user confirmed a restart. Clears the request.
    pub fn take_restart_request(&mut self) -> bool {
        std::mem::take(&mut self.restart_requested)
    }

    // Account view

    pub fn mount_account(&mut self) {
        let generation = self.generation();
        self.account = Some(Mounted {
            generation,
            view: AccountState::new(),
            _subscriptions: Vec::new(),
        });

        let backend = self.backend.clone();
        self.spawn(async move {
            let result = match backend.get_token().await {
                Ok(Some(token)) => backend.get_user(&token).await.map(Some),
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            };
            Message::Account(generation, AccountMessage::User(result))
        });

        let backend = self.backend.clone();
        self.spawn(async move {
            Message::Account(generation, AccountMessage::Api(backend.check_api_status().await))
        });

        let backend = self.backend.clone();
        self.spawn(async move {
            let result = match backend.get_token().await {
                Ok(Some(token)) => backend.get_user_stats(&token).await,
                Ok(None) => Err(BridgeError::command("get_user_stats", "not signed in")),
                Err(e) => Err(e),
            };
            Message::Account(generation, AccountMessage::UserStats(result))
        });

        let backend = self.backend.clone();
        self.spawn(async move {
            Message::Account(
                generation,
                AccountMessage::GlobalStats(backend.get_global_stats().await),
            )
        });
    }

    pub fn unmount_account(&mut self) {
        self.account = None;
    }

    pub fn account(&self) -> Option<&AccountState> {
        self.account.as_ref().map(|m| &m.view)
    }

    /// Delete the stored token and go back to onboarding
    pub fn sign_out(&mut self) {
        let backend = self.backend.clone();
        self.spawn(async move { Message::SignedOut(backend.delete_token().await) });
    }

    // Release notes

    pub fn mount_releases(&mut self) {
        let generation = self.generation();
        self.releases = Some(Mounted {
            generation,
            view: ReleaseNotes::new(),
            _subscriptions: Vec::new(),
        });
        let backend = self.backend.clone();
        self.spawn(async move { Message::Releases(generation, backend.fetch_releases().await) });
    }

    pub fn unmount_releases(&mut self) {
        self.releases = None;
    }

    pub fn releases(&self) -> Option<&ReleaseNotes> {
        self.releases.as_ref().map(|m| &m.view)
    }

    /// Releases to list, honouring the beta setting
    pub fn visible_releases(&self) -> Vec<&Release> {
        let include_beta = self.settings().is_some_and(|s| s.config().beta_updates);
        self.releases()
            .map(|r| r.visible(include_beta))
            .unwrap_or_default()
    }

    // Rich presence

    /// Pick a presence image. Locked perks are left to the caller to upsell.
    pub fn select_presence_image(&mut self, key: &str) -> Selection {
        let selection = presence::select(key, self.account().and_then(|a| a.user()));
        if let Selection::Apply(key) = selection {
            let backend = self.backend.clone();
            self.spawn(async move {
                Message::ImageApplied(key.to_string(), backend.rpc_set_image(key).await)
            });
            if let Err(e) = self.set_setting(keys::RPC_IMAGE, Value::String(key.to_string())) {
                tracing::debug!("Presence image not stored: {}", e);
            }
        }
        selection
    }

    // Onboarding

    /// Theme to preselect when onboarding starts
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn onboarding_gate(&self) -> OnboardingGate {
        self.gate
    }

    /// Decide whether onboarding is needed. It is when the local config
    /// never finished it or the backend has no token.
    pub fn check_onboarding(&mut self, completed_locally: bool) {
        if !completed_locally {
            self.begin_onboarding(Instant::now());
            return;
        }
        self.gate = OnboardingGate::Checking;
        let backend = self.backend.clone();
        self.spawn(async move { Message::TokenChecked(backend.token_exists().await) });
    }

    fn token_checked(&mut self, result: Result<bool, BridgeError>) {
        if self.gate != OnboardingGate::Checking {
            return;
        }
        match result {
            Ok(true) => self.gate = OnboardingGate::NotRequired,
            Ok(false) => self.begin_onboarding(Instant::now()),
            Err(e) => {
                tracing::warn!("Could not check for a saved token: {}", e);
                self.gate = OnboardingGate::NotRequired;
            }
        }
    }

    pub fn begin_onboarding(&mut self, now: Instant) {
        let generation = self.generation();
        let subscriptions = vec![self.forward(self.backend.discord_auth_results(), move |r| {
            Message::Onboarding(generation, OnboardingMessage::Discord(r))
        })];
        self.onboarding = Some(Mounted {
            generation,
            view: Onboarding::new(self.theme, now),
            _subscriptions: subscriptions,
        });
        self.gate = OnboardingGate::Required;
    }

    pub fn onboarding(&self) -> Option<&Onboarding> {
        self.onboarding.as_ref().map(|m| &m.view)
    }

    pub fn onboarding_mut(&mut self) -> Option<&mut Onboarding> {
        self.onboarding.as_mut().map(|m| &mut m.view)
    }

    pub fn submit_token(&mut self) {
        let Some(mounted) = self.onboarding.as_mut() else {
            return;
        };
        if let Some(token) = mounted.view.submit_token() {
            let generation = mounted.generation;
            self.verify(generation, token);
        }
    }

    pub fn start_discord_signin(&mut self) {
        let Some(mounted) = self.onboarding.as_mut() else {
            return;
        };
        if !mounted.view.begin_discord_signin() {
            return;
        }
        let generation = mounted.generation;
        let backend = self.backend.clone();
        self.spawn(async move {
            Message::Onboarding(
                generation,
                OnboardingMessage::DiscordStarted(backend.start_discord_signin().await),
            )
        });
    }

    /// Leave the theme step. Returns the theme to persist locally.
    pub fn confirm_theme(&mut self, now: Instant) -> Option<Theme> {
        let theme = self.onboarding_mut()?.confirm_theme(now)?;
        self.theme = theme;
        Some(theme)
    }

    /// Advance timed steps. Returns `true` once when onboarding completes.
    pub fn tick_onboarding(&mut self, now: Instant) -> bool {
        let Some(mounted) = self.onboarding.as_mut() else {
            return false;
        };
        mounted.view.tick(now);
        if !mounted.view.is_finished() {
            return false;
        }
        tracing::info!("Onboarding complete");
        self.onboarding = None;
        self.gate = OnboardingGate::NotRequired;
        true
    }

    fn verify(&self, generation: Generation, token: String) {
        let backend = self.backend.clone();
        self.spawn(async move {
            let result = backend.verify_token(&token).await;
            Message::Onboarding(generation, OnboardingMessage::Verified(token, result))
        });
    }

    fn apply_onboarding(&mut self, generation: Generation, message: OnboardingMessage) {
        let Some(onboarding) = view_for(&mut self.onboarding, generation) else {
            return;
        };
        match message {
            OnboardingMessage::DiscordStarted(Ok(())) => {
                tracing::info!("Discord sign-in opened in the browser");
            }
            OnboardingMessage::DiscordStarted(Err(e)) => onboarding.discord_signin_failed(&e),
            OnboardingMessage::Discord(result) => {
                if let Some(token) = onboarding.discord_result(result) {
                    self.verify(generation, token);
                }
            }
            OnboardingMessage::Verified(token, result) => {
                if let Some(token) = onboarding.verify_finished(token, result) {
                    let backend = self.backend.clone();
                    self.spawn(async move {
                        Message::Onboarding(
                            generation,
                            OnboardingMessage::Saved(backend.save_token(&token).await),
                        )
                    });
                }
            }
            OnboardingMessage::Saved(result) => onboarding.token_saved(result, Instant::now()),
        }
    }
}

/// Carry the previous launcher's config over on first run
async fn import_legacy_config(backend: &Backend) -> Result<(), BridgeError> {
    if backend.config_exists().await? || !backend.legacy_config_exists().await? {
        return Ok(());
    }
    let Some(legacy) = backend.get_legacy_config().await? else {
        return Ok(());
    };
    tracing::info!("Importing config from the legacy launcher");
    backend.save_config(&legacy).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{MemoryBridge, OfflineBridge, commands, demo, events};
    use crate::core::flow::OnboardingStep;
    use crate::core::proxy::{ProxyViewState, Severity};
    use serde_json::json;
    use std::time::Duration;

    fn launcher_with(bridge: &Arc<MemoryBridge>) -> Launcher {
        Launcher::new(Backend::from_bridge(bridge.clone()))
    }

    async fn settle(launcher: &mut Launcher, done: impl FnMut(&Launcher) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), launcher.wait_until(done))
            .await
            .expect("launcher did not settle");
    }

    fn state(launcher: &Launcher) -> Option<ProxyViewState> {
        launcher.proxy().map(|p| p.state())
    }

    #[tokio::test]
    async fn test_mount_polls_status() {
        let bridge = Arc::new(MemoryBridge::new());
        bridge.respond(commands::GET_PROXY_STATUS, json!(true));
        let mut launcher = launcher_with(&bridge);

        launcher.mount_proxy();
        assert_eq!(state(&launcher), Some(ProxyViewState::Unknown));
        settle(&mut launcher, |l| state(l) == Some(ProxyViewState::Running)).await;
    }

    #[tokio::test]
    async fn test_failed_poll_means_stopped() {
        let bridge = Arc::new(MemoryBridge::new());
        bridge.fail(commands::GET_PROXY_STATUS, "backend starting");
        let mut launcher = launcher_with(&bridge);

        launcher.mount_proxy();
        settle(&mut launcher, |l| state(l) == Some(ProxyViewState::Stopped)).await;
        assert!(launcher.proxy().unwrap().dialog().is_none());
    }

    #[tokio::test]
    async fn test_demo_launch_reaches_running() {
        let bridge = demo::with_step(Duration::ZERO);
        let mut launcher = launcher_with(&bridge);
        launcher.mount_proxy();
        settle(&mut launcher, |l| state(l) == Some(ProxyViewState::Stopped)).await;

        launcher.press_launch_button();
        assert_eq!(state(&launcher), Some(ProxyViewState::Checking));
        assert!(launcher.proxy().unwrap().is_busy());

        settle(&mut launcher, |l| {
            l.proxy().is_some_and(|p| p.state() == ProxyViewState::Running && !p.is_busy())
        })
        .await;
        assert_eq!(bridge.calls_to(commands::LAUNCH_PROXY).len(), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_shows_error() {
        let bridge = Arc::new(MemoryBridge::new());
        bridge
            .respond(commands::GET_PROXY_STATUS, json!(false))
            .fail(commands::LAUNCH_PROXY, "No release for this platform");
        let mut launcher = launcher_with(&bridge);
        launcher.mount_proxy();
        settle(&mut launcher, |l| state(l) == Some(ProxyViewState::Stopped)).await;

        launcher.start_proxy();
        settle(&mut launcher, |l| state(l) == Some(ProxyViewState::Error)).await;

        let session = launcher.proxy().unwrap();
        assert_eq!(session.status_text(), Some("Error: No release for this platform"));
        assert_eq!(session.button(false).label, "Error");
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_stop_ends_stopped_even_on_failure() {
        let bridge = Arc::new(MemoryBridge::new());
        bridge
            .respond(commands::GET_PROXY_STATUS, json!(true))
            .fail(commands::STOP_PROXY, "process already gone");
        let mut launcher = launcher_with(&bridge);
        launcher.mount_proxy();
        settle(&mut launcher, |l| state(l) == Some(ProxyViewState::Running)).await;

        launcher.press_launch_button();
        assert_eq!(state(&launcher), Some(ProxyViewState::Stopping));
        // Re-entrant click is a no-op
        launcher.press_launch_button();

        settle(&mut launcher, |l| state(l) == Some(ProxyViewState::Stopped)).await;
        assert_eq!(bridge.calls_to(commands::STOP_PROXY).len(), 1);
    }

    #[tokio::test]
    async fn test_proxy_error_severity() {
        let bridge = Arc::new(MemoryBridge::new());
        bridge.respond(commands::GET_PROXY_STATUS, json!(true));
        let mut launcher = launcher_with(&bridge);
        launcher.mount_proxy();
        settle(&mut launcher, |l| state(l) == Some(ProxyViewState::Running)).await;

        let report = |severity: &str| {
            json!({
                "code": "E1",
                "title": "Connection lost",
                "message": "Lost connection to Hypixel",
                "suggestion": "Check your network",
                "severity": severity,
                "category": "network",
                "timestamp": "2024-06-01T10:00:00Z"
            })
        };

        bridge.emit(events::PROXY_ERROR, report("warning"));
        bridge.emit(events::PROXY_ERROR, report("critical"));
        settle(&mut launcher, |l| l.proxy().is_some_and(|p| p.dialog().is_some())).await;

        let dialog = launcher.proxy().unwrap().dialog().unwrap().clone();
        assert_eq!(dialog.severity, Severity::Critical);
        assert_eq!(dialog.message, "Lost connection to Hypixel");
        assert_eq!(dialog.suggestion.as_deref(), Some("Check your network"));

        launcher.dismiss_proxy_error();
        assert!(launcher.proxy().unwrap().dialog().is_none());
    }

    #[tokio::test]
    async fn test_results_for_unmounted_view_are_dropped() {
        let bridge = Arc::new(MemoryBridge::new());
        bridge.respond(commands::GET_PROXY_STATUS, json!(true));
        let mut launcher = launcher_with(&bridge);

        launcher.mount_proxy();
        launcher.unmount_proxy();
        launcher.mount_proxy();

        // Two polls answered; only the second mount may react
        let polls = bridge.clone();
        settle(&mut launcher, |l| {
            state(l) == Some(ProxyViewState::Running)
                && polls.calls_to(commands::GET_PROXY_STATUS).len() == 2
        })
        .await;
    }

    #[tokio::test]
    async fn test_logs_collected_globally() {
        let bridge = Arc::new(MemoryBridge::new());
        let mut launcher = launcher_with(&bridge);

        bridge.emit(events::LOG_MESSAGE, json!("[INFO] hello"));
        bridge.emit(events::LOG_MESSAGE, json!("\x1b[31m[ERROR]\x1b[0m boom"));
        settle(&mut launcher, |l| l.logs().len() == 2).await;

        assert_eq!(launcher.logs().lines()[1].plain(), "[ERROR] boom");
        launcher.clear_logs();
        assert!(launcher.logs().is_empty());
    }

    #[tokio::test]
    async fn test_setting_write_rolls_back_on_failure() {
        let bridge = Arc::new(MemoryBridge::new());
        bridge
            .respond(commands::GET_CONFIG, serde_json::to_value(Config::default()).unwrap())
            .fail(commands::SET_CONFIG_KEY, "disk full");
        let mut launcher = launcher_with(&bridge);
        launcher.mount_settings();
        settle(&mut launcher, |l| l.settings().is_some_and(|s| s.is_loaded())).await;

        launcher.set_setting(keys::ENABLE_RPC, json!(false)).unwrap();
        assert!(!launcher.settings().unwrap().config().enable_rpc);

        settle(&mut launcher, |l| l.settings().is_some_and(|s| s.config().enable_rpc)).await;
        assert_eq!(launcher.settings().unwrap().config(), &Config::default());
        assert!(bridge.calls_to(commands::RPC_SET_ENABLED).is_empty());
    }

    #[tokio::test]
    async fn test_rpc_toggle_applies_immediately() {
        let bridge = demo::with_step(Duration::ZERO);
        let mut launcher = launcher_with(&bridge);
        launcher.mount_settings();
        settle(&mut launcher, |l| l.settings().is_some_and(|s| s.is_loaded())).await;

        launcher.set_setting(keys::ENABLE_RPC, json!(false)).unwrap();
        let calls = bridge.clone();
        settle(&mut launcher, |_| calls.calls_to(commands::RPC_SET_ENABLED).len() == 1).await;
        assert_eq!(
            bridge.calls_to(commands::RPC_SET_ENABLED)[0].args,
            json!({"enabled": false})
        );
    }

    #[tokio::test]
    async fn test_legacy_config_imported_on_first_run() {
        let legacy = Config {
            proxy_port: "25570".to_string(),
            beta_updates: true,
            ..Config::default()
        };
        let legacy_json = serde_json::to_value(&legacy).unwrap();
        let bridge = Arc::new(MemoryBridge::new());
        bridge
            .respond(commands::CONFIG_EXISTS, json!(false))
            .respond(commands::LEGACY_CONFIG_EXISTS, json!(true))
            .respond(commands::GET_LEGACY_CONFIG, legacy_json.clone())
            .respond(commands::SAVE_CONFIG, Value::Null)
            .respond(commands::GET_CONFIG, legacy_json.clone());
        let mut launcher = launcher_with(&bridge);
        launcher.mount_settings();
        settle(&mut launcher, |l| l.settings().is_some_and(|s| s.is_loaded())).await;

        let saved = bridge.calls_to(commands::SAVE_CONFIG);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].args, json!({"config": legacy_json}));
        assert_eq!(launcher.settings().unwrap().config(), &legacy);
    }

    #[tokio::test]
    async fn test_legacy_config_ignored_once_config_exists() {
        let bridge = Arc::new(MemoryBridge::new());
        bridge
            .respond(commands::CONFIG_EXISTS, json!(true))
            .respond(commands::LEGACY_CONFIG_EXISTS, json!(true))
            .respond(commands::GET_CONFIG, serde_json::to_value(Config::default()).unwrap());
        let mut launcher = launcher_with(&bridge);
        launcher.mount_settings();
        settle(&mut launcher, |l| l.settings().is_some_and(|s| s.is_loaded())).await;

        assert!(bridge.calls_to(commands::GET_LEGACY_CONFIG).is_empty());
        assert!(bridge.calls_to(commands::SAVE_CONFIG).is_empty());
    }

    #[tokio::test]
    async fn test_offline_backend_falls_back_to_defaults() {
        let mut launcher = Launcher::new(Backend::from_bridge(Arc::new(OfflineBridge::new(
            "127.0.0.1:47615",
        ))));
        launcher.mount_proxy();
        launcher.mount_settings();
        launcher.mount_account();
        settle(&mut launcher, |l| {
            state(l) == Some(ProxyViewState::Stopped)
                && l.settings().is_some_and(|s| s.is_loaded())
                && l.account().is_some_and(|a| a.is_user_loaded())
        })
        .await;

        assert_eq!(launcher.settings().unwrap().config(), &Config::default());
        assert!(launcher.account().unwrap().user().is_none());
        assert!(launcher.proxy().unwrap().dialog().is_none());
    }

    #[tokio::test]
    async fn test_launch_before_settings_load_leaves_port_to_backend() {
        let bridge = Arc::new(MemoryBridge::new());
        bridge
            .respond(commands::GET_PROXY_STATUS, json!(false))
            .respond(commands::LAUNCH_PROXY, Value::Null)
            .respond(commands::GET_CONFIG, serde_json::to_value(Config::default()).unwrap());
        let mut launcher = launcher_with(&bridge);
        launcher.mount_proxy();
        settle(&mut launcher, |l| state(l) == Some(ProxyViewState::Stopped)).await;

        // Remounted settings are not loaded until get_config resolves
        launcher.mount_settings();
        launcher.start_proxy();

        let calls = bridge.clone();
        settle(&mut launcher, |_| calls.calls_to(commands::LAUNCH_PROXY).len() == 1).await;
        assert_eq!(bridge.calls_to(commands::LAUNCH_PROXY)[0].args, json!({}));
    }

    #[tokio::test]
    async fn test_invalid_port_never_written() {
        let bridge = Arc::new(MemoryBridge::new());
        bridge.respond(commands::GET_CONFIG, Value::Null);
        let mut launcher = launcher_with(&bridge);
        launcher.mount_settings();
        settle(&mut launcher, |l| l.settings().is_some_and(|s| s.is_loaded())).await;

        let err = launcher.set_setting(keys::PROXY_PORT, json!("70000")).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidPort(_)));
        assert!(bridge.calls_to(commands::SET_CONFIG_KEY).is_empty());
    }

    #[tokio::test]
    async fn test_beta_needs_confirmation_then_restart_prompt() {
        let bridge = demo::with_step(Duration::ZERO);
        let mut launcher = launcher_with(&bridge);
        launcher.mount_settings();
        settle(&mut launcher, |l| l.settings().is_some_and(|s| s.is_loaded())).await;

        launcher.set_setting(keys::BETA_UPDATES, json!(true)).unwrap();
        assert_eq!(launcher.dialog().map(|d| d.kind()), Some(ConfirmKind::BetaChannel));
        assert!(!launcher.settings().unwrap().config().beta_updates);

        let opened = Instant::now();
        assert!(!launcher.confirm_dialog(opened));
        assert!(launcher.confirm_dialog(opened + Duration::from_secs(6)));
        assert!(launcher.settings().unwrap().config().beta_updates);

        settle(&mut launcher, |l| l.dialog().is_some()).await;
        assert_eq!(launcher.dialog().map(|d| d.kind()), Some(ConfirmKind::Restart));
        assert!(launcher.confirm_dialog(Instant::now() + Duration::from_secs(4)));
        assert!(launcher.take_restart_request());
        assert!(!launcher.take_restart_request());
    }

    #[tokio::test]
    async fn test_restart_prompt_waits_for_open_dialog() {
        let bridge = demo::with_step(Duration::ZERO);
        let mut launcher = launcher_with(&bridge);
        launcher.mount_settings();
        settle(&mut launcher, |l| l.settings().is_some_and(|s| s.is_loaded())).await;

        launcher.set_setting(keys::BETA_UPDATES, json!(true)).unwrap();
        launcher.set_setting(keys::PROXY_PORT, json!("25570")).unwrap();
        settle(&mut launcher, |l| l.restart_pending).await;
        assert_eq!(launcher.dialog().map(|d| d.kind()), Some(ConfirmKind::BetaChannel));

        launcher.cancel_dialog();
        assert_eq!(launcher.dialog().map(|d| d.kind()), Some(ConfirmKind::Restart));
        assert!(!launcher.restart_pending);
    }

    #[tokio::test]
    async fn test_banned_user_cannot_launch() {
        let bridge = Arc::new(MemoryBridge::new());
        bridge
            .respond(commands::GET_PROXY_STATUS, json!(false))
            .respond(commands::GET_TOKEN, json!("t0ken-value"))
            .respond(
                commands::GET_USER,
                json!({"success": true, "data": {"id": "1", "username": "x", "isBanned": true}}),
            )
            .respond(commands::CHECK_API_STATUS, json!(true))
            .respond(commands::GET_USER_STATS, json!({"success": false}))
            .respond(commands::GET_GLOBAL_STATS, json!({"success": true, "data": {}}));
        let mut launcher = launcher_with(&bridge);
        launcher.mount_proxy();
        launcher.mount_account();
        settle(&mut launcher, |l| {
            state(l) == Some(ProxyViewState::Stopped) && l.account().is_some_and(|a| a.is_user_loaded())
        })
        .await;

        assert!(launcher.is_banned());
        launcher.press_launch_button();
        assert_eq!(state(&launcher), Some(ProxyViewState::Stopped));
        assert!(bridge.calls_to(commands::LAUNCH_PROXY).is_empty());
    }

    #[tokio::test]
    async fn test_onboarding_with_token() {
        let bridge = demo::with_step(Duration::ZERO);
        let mut launcher = launcher_with(&bridge);

        launcher.check_onboarding(true);
        assert_eq!(launcher.onboarding_gate(), OnboardingGate::Checking);
        settle(&mut launcher, |l| l.onboarding_gate() == OnboardingGate::Required).await;

        let start = Instant::now();
        launcher.tick_onboarding(start + Duration::from_secs(3));
        assert_eq!(launcher.onboarding().unwrap().step(), OnboardingStep::Token);

        launcher.onboarding_mut().unwrap().token_input = demo::DEMO_TOKEN.to_string();
        launcher.submit_token();
        settle(&mut launcher, |l| {
            l.onboarding().is_some_and(|o| o.step() == OnboardingStep::Theme)
        })
        .await;
        assert_eq!(bridge.calls_to(commands::SAVE_TOKEN).len(), 1);

        launcher.onboarding_mut().unwrap().choose_theme(Theme::Light);
        let now = Instant::now();
        assert_eq!(launcher.confirm_theme(now), Some(Theme::Light));
        assert!(!launcher.tick_onboarding(now));
        assert!(launcher.tick_onboarding(now + Duration::from_secs(2)));
        assert!(launcher.onboarding().is_none());
        assert_eq!(launcher.onboarding_gate(), OnboardingGate::NotRequired);
    }

    #[tokio::test]
    async fn test_onboarding_skipped_when_token_exists() {
        let bridge = Arc::new(MemoryBridge::new());
        bridge.respond(commands::TOKEN_EXISTS, json!(true));
        let mut launcher = launcher_with(&bridge);

        launcher.check_onboarding(true);
        settle(&mut launcher, |l| l.onboarding_gate() == OnboardingGate::NotRequired).await;
        assert!(launcher.onboarding().is_none());
    }

    #[tokio::test]
    async fn test_discord_signin_verifies_pushed_token() {
        let bridge = demo::with_step(Duration::ZERO);
        let mut launcher = launcher_with(&bridge);
        launcher.check_onboarding(false);
        launcher.tick_onboarding(Instant::now() + Duration::from_secs(3));

        launcher.start_discord_signin();
        settle(&mut launcher, |l| {
            l.onboarding().is_some_and(|o| o.step() == OnboardingStep::Theme)
        })
        .await;
        let verified = bridge.calls_to(commands::VERIFY_TOKEN);
        assert_eq!(verified[0].args, json!({"token": demo::DEMO_TOKEN}));
    }

    #[tokio::test]
    async fn test_presence_image_selection() {
        let bridge = demo::with_step(Duration::ZERO);
        let mut launcher = launcher_with(&bridge);
        launcher.mount_settings();
        launcher.mount_account();
        settle(&mut launcher, |l| {
            l.settings().is_some_and(|s| s.is_loaded()) && l.account().is_some_and(|a| a.is_user_loaded())
        })
        .await;

        // The demo has no token until onboarding saves one
        assert_eq!(launcher.select_presence_image("crown"), Selection::Locked);
        assert_eq!(launcher.select_presence_image("logo"), Selection::Apply("logo"));
        assert_eq!(launcher.settings().unwrap().config().rpc_image, "logo");
        let calls = bridge.clone();
        settle(&mut launcher, |_| calls.calls_to(commands::RPC_SET_IMAGE).len() == 1).await;
        assert_eq!(calls.calls_to(commands::RPC_SET_IMAGE)[0].args, json!({"imageKey": "logo"}));
    }

    #[tokio::test]
    async fn test_releases_respect_beta_setting() {
        let bridge = demo::with_step(Duration::ZERO);
        let mut launcher = launcher_with(&bridge);
        launcher.mount_settings();
        launcher.mount_releases();
        settle(&mut launcher, |l| {
            l.settings().is_some_and(|s| s.is_loaded()) && l.releases().is_some_and(|r| r.is_loaded())
        })
        .await;

        let versions: Vec<_> = launcher.visible_releases().iter().map(|r| r.version.clone()).collect();
        assert_eq!(versions, vec!["1.4.2", "1.4.0"]);
    }

    #[tokio::test]
    async fn test_updater_tracker_follows_events() {
        let bridge = Arc::new(MemoryBridge::new());
        let mut launcher = launcher_with(&bridge);

        bridge.emit(events::UPDATER_SHOW, Value::Null);
        bridge.emit(events::UPDATER_STATUS, json!({"status": "downloading", "version": "2.0"}));
        settle(&mut launcher, |l| l.updater().status().is_some()).await;

        // Channels are independent, so progress goes out once downloading landed
        bridge.emit(
            events::UPDATER_PROGRESS,
            json!({"downloaded": 1000, "total": 10000, "speed": 500.0}),
        );
        settle(&mut launcher, |l| l.updater().progress().is_some()).await;
        assert_eq!(launcher.updater().progress().unwrap().percent(), 10);

        settle(&mut launcher, |l| l.updater().is_visible()).await;
    }
}
