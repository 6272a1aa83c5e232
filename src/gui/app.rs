//! Main GUI application
//!
//! egui application state, frame loop and modal dialogs. The individual
//! pages live in `views`.

mod views;

use duelsplus_launcher::config::{self, Config, Theme};
use duelsplus_launcher::core::controller::{Launcher, OnboardingGate};
use duelsplus_launcher::core::flow::OnboardingStep;
use duelsplus_launcher::core::logs::LevelFilter;
use duelsplus_launcher::core::presence::{self, DONATE_URL, Selection};
use duelsplus_launcher::util::{self, format_size, format_speed};
use eframe::egui;
use std::time::{Duration, Instant};

/// Main launcher application state
pub struct LauncherApp {
    /// View-state controller, owns every backend call
    launcher: Launcher,
    /// Local launcher preferences
    config: Config,
    /// Current view
    current_view: View,
    /// Levels shown in the log view
    log_filter: LevelFilter,
    /// Port text field, seeded from the settings once loaded
    port_input: Option<String>,
    port_error: Option<String>,
    /// Rich presence image picker
    show_presence_dialog: bool,
    /// Set when the user picked an image they have not unlocked
    locked_image: Option<&'static str>,
    /// Error message to display
    error_message: Option<String>,
    /// Success message to display
    success_message: Option<String>,
    /// Theme currently applied to the egui context
    applied_theme: Option<Theme>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum View {
    #[default]
    Home,
    Logs,
    Settings,
    Releases,
    Account,
}

impl LauncherApp {
    pub fn new(cc: &eframe::CreationContext<'_>, mut launcher: Launcher, config: Config) -> Self {
        let ctx = cc.egui_ctx.clone();
        launcher.set_waker(move || ctx.request_repaint());

        launcher.set_theme(config.ui.theme);
        launcher.check_onboarding(config.ui.onboarding_complete);

        // The launch button and the account badge stay mounted for the
        // whole session
        launcher.mount_proxy();
        launcher.mount_account();
        launcher.mount_settings();

        Self {
            launcher,
            config,
            current_view: View::Home,
            log_filter: LevelFilter::all(),
            port_input: None,
            port_error: None,
            show_presence_dialog: false,
            locked_image: None,
            error_message: None,
            success_message: None,
            applied_theme: None,
        }
    }

    fn switch_view(&mut self, view: View) {
        if view == self.current_view {
            return;
        }
        if self.current_view == View::Releases {
            self.launcher.unmount_releases();
        }

        match view {
            View::Settings => {
                self.launcher.mount_settings();
                self.port_input = None;
                self.port_error = None;
            }
            View::Releases => self.launcher.mount_releases(),
            View::Account => self.launcher.mount_account(),
            View::Home | View::Logs => {}
        }
        self.current_view = view;
    }

    fn save_config(&mut self) {
        if let Err(e) = config::save(&self.config) {
            tracing::error!("Failed to save launcher config: {:#}", e);
            self.error_message = Some(format!("Failed to save preferences: {}", e));
        }
    }

    fn apply_theme(&mut self, ctx: &egui::Context) {
        // Preview the onboarding choice before it is saved
        let theme = self
            .launcher
            .onboarding()
            .map(|o| o.theme())
            .unwrap_or(self.config.ui.theme);

        if self.applied_theme != Some(theme) {
            ctx.set_visuals(match theme {
                Theme::Dark => egui::Visuals::dark(),
                Theme::Light => egui::Visuals::light(),
            });
            self.applied_theme = Some(theme);
        }
    }

    fn finish_onboarding(&mut self) {
        self.config.ui.onboarding_complete = true;
        self.save_config();
        // A token exists now, so the account badge can load
        self.launcher.mount_account();
        self.success_message = Some("Welcome to Duels+!".to_string());
    }

    fn restart(&mut self, ctx: &egui::Context) {
        match util::relaunch() {
            Ok(()) => ctx.send_viewport_cmd(egui::ViewportCommand::Close),
            Err(e) => {
                tracing::error!("Restart failed: {:#}", e);
                self.error_message = Some(e.to_string());
            }
        }
    }
}

impl eframe::App for LauncherApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Apply results queued by background tasks
        self.launcher.pump();

        let now = Instant::now();
        if self.launcher.tick_onboarding(now) {
            self.finish_onboarding();
        }
        if self.launcher.take_restart_request() {
            self.restart(ctx);
        }

        self.apply_theme(ctx);

        match self.launcher.onboarding_gate() {
            OnboardingGate::Checking => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(ui.available_height() / 2.0 - 20.0);
                        ui.spinner();
                        ui.label("Loading...");
                    });
                });
                return;
            }
            OnboardingGate::Required => {
                egui::CentralPanel::default().show(ctx, |ui| self.show_onboarding(ui, now));
                // Auto-advancing steps need frames without input
                ctx.request_repaint_after(Duration::from_millis(250));
                return;
            }
            OnboardingGate::NotRequired => {}
        }

        // Top panel - Header
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("⚔ Duels+");
                ui.separator();

                for (view, label) in [
                    (View::Home, "🏠 Home"),
                    (View::Logs, "📜 Logs"),
                    (View::Settings, "⚙ Settings"),
                    (View::Releases, "📦 Releases"),
                    (View::Account, "👤 Account"),
                ] {
                    if ui.selectable_label(self.current_view == view, label).clicked() {
                        self.switch_view(view);
                    }
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(user) = self.launcher.account().and_then(|a| a.user()) {
                        ui.label(format!("👤 {}", user.username));
                    }
                });
            });
        });

        // Bottom panel - Status bar
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(err) = &self.error_message {
                    ui.colored_label(egui::Color32::RED, format!("❌ {}", err));
                    if ui.small_button("✕").clicked() {
                        self.error_message = None;
                    }
                } else if let Some(msg) = &self.success_message {
                    ui.colored_label(egui::Color32::GREEN, format!("✅ {}", msg));
                    if ui.small_button("✕").clicked() {
                        self.success_message = None;
                    }
                } else if let Some(session) = self.launcher.proxy() {
                    if session.is_busy() {
                        ui.spinner();
                    }
                    ui.label(session.status_text().unwrap_or("Ready"));
                } else {
                    ui.label("Ready");
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("v{}", env!("CARGO_PKG_VERSION")));
                    match self.launcher.account().and_then(|a| a.api_online()) {
                        Some(true) => ui.colored_label(egui::Color32::GREEN, "● API online"),
                        Some(false) => ui.colored_label(egui::Color32::RED, "● API offline"),
                        None => ui.weak("● API"),
                    };
                });
            });
        });

        // Central panel - Main content
        egui::CentralPanel::default().show(ctx, |ui| match self.current_view {
            View::Home => self.show_home(ui),
            View::Logs => self.show_logs(ui),
            View::Settings => self.show_settings(ui),
            View::Releases => self.show_releases(ui),
            View::Account => self.show_account(ui),
        });

        if self.launcher.updater().is_visible() {
            self.show_updater_overlay(ctx);
        }
        if self.show_presence_dialog {
            self.show_presence_picker(ctx);
        }
        self.show_proxy_error_dialog(ctx);
        self.show_confirm_dialog(ctx, now);

        // Countdown labels tick without backend traffic
        if self.launcher.dialog().is_some() {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}

// Dialogs
impl LauncherApp {
    fn show_onboarding(&mut self, ui: &mut egui::Ui, now: Instant) {
        let Some(onboarding) = self.launcher.onboarding() else {
            return;
        };
        let step = onboarding.step();
        let (position, total) = onboarding.position();

        ui.vertical_centered(|ui| {
            ui.add_space(60.0);
            ui.weak(format!("Step {} of {}", position, total));
            ui.add_space(10.0);

            match step {
                OnboardingStep::Welcome => {
                    ui.heading("Welcome to Duels+");
                    ui.add_space(10.0);
                    ui.label("Let's get the launcher set up. This only takes a minute.");
                    ui.add_space(20.0);
                    if ui.button("Get started ➡").clicked() {
                        if let Some(onboarding) = self.launcher.onboarding_mut() {
                            onboarding.skip_welcome(now);
                        }
                    }
                }
                OnboardingStep::Token => self.show_token_step(ui),
                OnboardingStep::Theme => {
                    ui.heading("Pick a theme");
                    ui.add_space(10.0);

                    let current = self.launcher.onboarding().map(|o| o.theme());
                    ui.horizontal(|ui| {
                        for theme in Theme::ALL {
                            if ui
                                .selectable_label(current == Some(theme), theme.label())
                                .clicked()
                            {
                                if let Some(onboarding) = self.launcher.onboarding_mut() {
                                    onboarding.choose_theme(theme);
                                }
                            }
                        }
                    });

                    ui.add_space(20.0);
                    if ui.button("Continue ➡").clicked() {
                        if let Some(theme) = self.launcher.confirm_theme(now) {
                            self.config.ui.theme = theme;
                            self.save_config();
                        }
                    }
                }
                OnboardingStep::Done => {
                    let name = self.launcher.onboarding().and_then(|o| o.username());
                    match name {
                        Some(name) => ui.heading(format!("You're all set, {}!", name)),
                        None => ui.heading("You're all set!"),
                    };
                    ui.add_space(10.0);
                    ui.spinner();
                }
            }
        });
    }

    fn show_token_step(&mut self, ui: &mut egui::Ui) {
        ui.heading("Sign in");
        ui.add_space(10.0);
        ui.label("Paste your Duels+ token, or sign in with Discord.");
        ui.add_space(10.0);

        let Some(onboarding) = self.launcher.onboarding_mut() else {
            return;
        };
        let working = onboarding.is_working();
        let waiting = onboarding.is_waiting_for_discord();
        let error = onboarding.error().map(str::to_string);

        let response = ui.add_enabled(
            !working,
            egui::TextEdit::singleline(&mut onboarding.token_input)
                .password(true)
                .hint_text("Token")
                .desired_width(320.0),
        );
        let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

        ui.add_space(10.0);
        let mut submit = submitted;
        let mut discord = false;
        ui.horizontal(|ui| {
            submit |= ui
                .add_enabled(!working, egui::Button::new("Continue ➡"))
                .clicked();
            discord = ui
                .add_enabled(!working, egui::Button::new("🎮 Sign in with Discord"))
                .clicked();
        });

        if working {
            ui.add_space(10.0);
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(if waiting {
                    "Waiting for Discord in your browser..."
                } else {
                    "Checking your token..."
                });
            });
        }
        if let Some(error) = error {
            ui.add_space(10.0);
            ui.colored_label(egui::Color32::RED, error);
        }

        if submit {
            self.launcher.submit_token();
        }
        if discord {
            self.launcher.start_discord_signin();
        }
    }

    fn show_confirm_dialog(&mut self, ctx: &egui::Context, now: Instant) {
        let Some(dialog) = self.launcher.dialog() else {
            return;
        };
        let kind = dialog.kind();
        let can_confirm = dialog.can_confirm(now);
        let confirm_label = dialog.confirm_label(now);

        let mut confirm = false;
        let mut cancel = false;
        egui::Window::new(kind.title())
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.set_max_width(360.0);
                ui.label(kind.body());
                ui.add_space(10.0);
                ui.horizontal(|ui| {
                    cancel = ui.button("Cancel").clicked();
                    confirm = ui
                        .add_enabled(can_confirm, egui::Button::new(confirm_label))
                        .clicked();
                });
            });

        if confirm {
            self.launcher.confirm_dialog(now);
        } else if cancel {
            self.launcher.cancel_dialog();
        }
    }

    fn show_proxy_error_dialog(&mut self, ctx: &egui::Context) {
        let Some(dialog) = self.launcher.proxy().and_then(|p| p.dialog()).cloned() else {
            return;
        };

        let mut dismiss = false;
        let mut open_logs = false;
        egui::Window::new(format!("⚠ {}", dialog.title))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.set_max_width(400.0);
                ui.label(&dialog.message);
                if let Some(suggestion) = &dialog.suggestion {
                    ui.add_space(5.0);
                    ui.label(format!("💡 {}", suggestion));
                }
                if !dialog.code.is_empty() {
                    ui.add_space(5.0);
                    ui.weak(format!("Code: {}", dialog.code));
                }
                ui.add_space(10.0);
                ui.horizontal(|ui| {
                    dismiss = ui.button("Dismiss").clicked();
                    open_logs = ui.button("📜 View logs").clicked();
                });
            });

        if dismiss || open_logs {
            self.launcher.dismiss_proxy_error();
        }
        if open_logs {
            self.switch_view(View::Logs);
        }
    }

    fn show_updater_overlay(&self, ctx: &egui::Context) {
        let updater = self.launcher.updater();
        egui::Window::new("Updating proxy")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::RIGHT_BOTTOM, [-12.0, -36.0])
            .show(ctx, |ui| {
                ui.set_min_width(260.0);
                match updater.status() {
                    Some(status) => ui.label(status.describe()),
                    None => ui.label("Preparing..."),
                };
                if let Some(progress) = updater.progress() {
                    ui.add(egui::ProgressBar::new(progress.fraction()).show_percentage());
                    ui.weak(format!(
                        "{} / {} ({})",
                        format_size(progress.downloaded),
                        format_size(progress.total),
                        format_speed(progress.speed)
                    ));
                }
            });
    }

    fn show_presence_picker(&mut self, ctx: &egui::Context) {
        let user = self.launcher.account().and_then(|a| a.user()).cloned();
        let current = self
            .launcher
            .settings()
            .map(|s| s.config().rpc_image.clone())
            .unwrap_or_default();

        let mut picked = None;
        let mut close = false;
        let mut donate = false;
        egui::Window::new("Rich presence image")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.set_min_width(300.0);
                for image in presence::IMAGES {
                    let unlocked = presence::is_unlocked(image, user.as_ref());
                    let label = if unlocked {
                        image.label.to_string()
                    } else {
                        format!("🔒 {}", image.label)
                    };
                    if ui.selectable_label(current == image.key, label).clicked() {
                        picked = Some(image.key);
                    }
                }

                if let Some(key) = self.locked_image {
                    ui.add_space(10.0);
                    let label = presence::image(key).map_or(key, |i| i.label);
                    ui.label(format!("{} is a supporter perk.", label));
                    donate = ui.button("💖 Support Duels+").clicked();
                }

                ui.add_space(10.0);
                close = ui.button("Close").clicked();
            });

        if let Some(key) = picked {
            match self.launcher.select_presence_image(key) {
                Selection::Apply(_) => {
                    self.locked_image = None;
                    self.show_presence_dialog = false;
                }
                Selection::Locked => self.locked_image = Some(key),
                Selection::Unknown => {}
            }
        }
        if donate {
            if let Err(e) = util::open_url(DONATE_URL) {
                self.error_message = Some(e.to_string());
            }
        }
        if close {
            self.locked_image = None;
            self.show_presence_dialog = false;
        }
    }
}
