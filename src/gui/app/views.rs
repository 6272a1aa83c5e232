//! Pages shown in the central panel

use super::{LauncherApp, View};
use duelsplus_launcher::config::{self, Theme};
use duelsplus_launcher::core::account::stat_rows;
use duelsplus_launcher::core::logs::{LogLevel, LogLine};
use duelsplus_launcher::core::proxy::ButtonAction;
use duelsplus_launcher::core::settings::{SETTINGS, Section, SettingKind, parse_port};
use duelsplus_launcher::util::{self, format_size, format_speed};
use eframe::egui;
use serde_json::Value;

const LOG_FONT_SIZE: f32 = 12.0;

impl LauncherApp {
    pub(super) fn show_home(&mut self, ui: &mut egui::Ui) {
        let banned = self.launcher.is_banned();
        let Some(session) = self.launcher.proxy() else {
            return;
        };
        let button = session.button(banned);
        let status = session.status_text().map(str::to_string);
        let progress = session.visible_progress().copied();
        let player = session.player().cloned();
        let busy = session.is_busy();

        let mut pressed = false;
        ui.vertical_centered(|ui| {
            ui.add_space(40.0);
            ui.heading("Duels+ Proxy");
            ui.add_space(20.0);

            let text = egui::RichText::new(format!("{} {}", button.icon, button.label)).size(20.0);
            pressed = ui
                .add_enabled(
                    button.enabled,
                    egui::Button::new(text).min_size(egui::vec2(220.0, 48.0)),
                )
                .clicked();

            ui.add_space(10.0);
            ui.horizontal(|ui| {
                ui.add_space((ui.available_width() - 240.0).max(0.0) / 2.0);
                if busy {
                    ui.spinner();
                }
                if let Some(status) = &status {
                    ui.label(status);
                }
            });

            if let Some(progress) = progress {
                ui.add_space(10.0);
                ui.add(
                    egui::ProgressBar::new(progress.fraction())
                        .desired_width(360.0)
                        .text(format!(
                            "{}% · {} / {} · {}",
                            progress.percent(),
                            format_size(progress.downloaded),
                            format_size(progress.total),
                            format_speed(progress.speed)
                        )),
                );
            }

            if let Some(player) = &player {
                ui.add_space(10.0);
                ui.label(format!("🎮 Playing as {}", player.ign));
            }

            if banned {
                ui.add_space(20.0);
                ui.colored_label(
                    egui::Color32::RED,
                    "🚫 Your account is banned from Duels+. The proxy cannot be launched.",
                );
            }
        });

        if pressed {
            self.launcher.press_launch_button();
            let open_logs = self
                .launcher
                .settings()
                .is_some_and(|s| s.config().open_logs_on_launch);
            if button.action == Some(ButtonAction::Launch) && open_logs {
                self.switch_view(View::Logs);
            }
        }
    }

    pub(super) fn show_logs(&mut self, ui: &mut egui::Ui) {
        let mut copy = false;
        let mut export = false;
        let mut clear = false;
        let mut prefs_changed = false;

        ui.horizontal(|ui| {
            for level in LogLevel::ALL {
                let enabled = self.log_filter.is_enabled(level);
                if ui
                    .selectable_label(enabled, level.to_string().to_uppercase())
                    .clicked()
                {
                    self.log_filter.toggle(level);
                }
            }
            ui.separator();
            prefs_changed |= ui.checkbox(&mut self.config.ui.colored_logs, "Colours").changed();
            prefs_changed |= ui.checkbox(&mut self.config.ui.auto_scroll, "Auto-scroll").changed();

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                clear = ui.button("🗑 Clear").clicked();
                export = ui.button("💾 Export").clicked();
                copy = ui.button("📋 Copy").clicked();
            });
        });
        ui.separator();

        let logs = self.launcher.logs();
        let lines: Vec<&LogLine> = logs.filtered(&self.log_filter).collect();
        if logs.is_empty() {
            ui.weak("No output yet. Launch the proxy to see its logs here.");
        }

        let colored = self.config.ui.colored_logs;
        let row_height = ui.text_style_height(&egui::TextStyle::Monospace);
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(self.config.ui.auto_scroll)
            .show_rows(ui, row_height, lines.len(), |ui, range| {
                ui.style_mut().wrap_mode = Some(egui::TextWrapMode::Extend);
                for line in &lines[range] {
                    if colored {
                        let job = styled_line(ui, line);
                        ui.label(job);
                    } else {
                        ui.monospace(line.plain());
                    }
                }
            });

        if copy || export {
            let text = self.launcher.logs().to_plain_text(&self.log_filter);
            if copy {
                ui.output_mut(|o| o.copied_text = text.clone());
                self.success_message = Some("Logs copied".to_string());
            }
            if export {
                match util::export_logs(&config::config_dir().join("logs"), &text) {
                    Ok(path) => {
                        self.success_message = Some(format!("Saved {}", path.display()));
                    }
                    Err(e) => self.error_message = Some(e.to_string()),
                }
            }
        }
        if clear {
            self.launcher.clear_logs();
        }
        if prefs_changed {
            self.save_config();
        }
    }

    pub(super) fn show_settings(&mut self, ui: &mut egui::Ui) {
        ui.heading("Settings");
        ui.separator();

        let Some(settings) = self.launcher.settings() else {
            return;
        };
        if !settings.is_loaded() {
            ui.spinner();
            return;
        }

        let port_input = self
            .port_input
            .get_or_insert_with(|| settings.config().proxy_port.clone());
        let rpc_image = settings.config().rpc_image.clone();
        let rows: Vec<_> = SETTINGS
            .iter()
            .map(|d| (d, settings.get(d.key), settings.is_editable(d.key)))
            .collect();

        let mut write: Option<(&'static str, Value)> = None;
        let mut open_picker = false;
        let mut theme_changed = false;
        let mut port_error = self.port_error.clone();

        egui::ScrollArea::vertical().show(ui, |ui| {
            for section in Section::ALL {
                ui.collapsing(section.title(), |ui| {
                    for (descriptor, value, editable) in rows.iter().filter(|r| r.0.section == section) {
                        match descriptor.kind {
                            SettingKind::Toggle => {
                                let mut on = value.as_ref().and_then(Value::as_bool).unwrap_or(false);
                                if ui
                                    .add_enabled(*editable, egui::Checkbox::new(&mut on, descriptor.label))
                                    .changed()
                                {
                                    write = Some((descriptor.key, Value::Bool(on)));
                                }
                            }
                            SettingKind::Port => {
                                ui.horizontal(|ui| {
                                    ui.label(descriptor.label);
                                    ui.add(egui::TextEdit::singleline(port_input).desired_width(80.0));
                                    if ui.button("Apply").clicked() {
                                        match parse_port(port_input) {
                                            Some(port) => {
                                                port_error = None;
                                                write = Some((descriptor.key, Value::String(port.to_string())));
                                            }
                                            None => {
                                                port_error = Some("Port must be between 1 and 65535".to_string());
                                            }
                                        }
                                    }
                                });
                                if let Some(err) = &port_error {
                                    ui.colored_label(egui::Color32::RED, err);
                                }
                            }
                            SettingKind::Image => {
                                ui.horizontal(|ui| {
                                    ui.label(descriptor.label);
                                    ui.weak(&rpc_image);
                                    open_picker = ui
                                        .add_enabled(*editable, egui::Button::new("Change..."))
                                        .clicked();
                                });
                            }
                        }
                        ui.weak(descriptor.description);
                        if descriptor.requires_restart {
                            ui.weak("Requires a restart.");
                        }
                        ui.add_space(6.0);
                    }
                });
            }

            ui.collapsing("Launcher", |ui| {
                ui.horizontal(|ui| {
                    ui.label("Theme:");
                    egui::ComboBox::from_id_salt("theme_select")
                        .selected_text(self.config.ui.theme.label())
                        .show_ui(ui, |ui| {
                            for theme in Theme::ALL {
                                if ui
                                    .selectable_value(&mut self.config.ui.theme, theme, theme.label())
                                    .changed()
                                {
                                    self.launcher.set_theme(theme);
                                    theme_changed = true;
                                }
                            }
                        });
                });
                ui.label(format!("Backend: {}", self.config.bridge.address));
                ui.label(format!("Preferences: {}", config::config_path().display()));
            });
        });

        self.port_error = port_error;
        if open_picker {
            self.show_presence_dialog = true;
        }
        if let Some((key, value)) = write {
            if let Err(e) = self.launcher.set_setting(key, value) {
                self.error_message = Some(e.to_string());
            }
        }
        if theme_changed {
            self.save_config();
        }
    }

    pub(super) fn show_releases(&mut self, ui: &mut egui::Ui) {
        ui.heading("Releases");
        ui.separator();

        let Some(notes) = self.launcher.releases() else {
            return;
        };
        if !notes.is_loaded() {
            ui.spinner();
            return;
        }
        if let Some(err) = notes.error() {
            ui.colored_label(egui::Color32::RED, format!("❌ {}", err));
            return;
        }

        let releases = self.launcher.visible_releases();
        if releases.is_empty() {
            ui.label("No releases yet.");
            return;
        }

        egui::ScrollArea::vertical().show(ui, |ui| {
            for release in releases {
                ui.horizontal(|ui| {
                    ui.strong(format!("v{}", release.version));
                    if release.is_latest {
                        ui.colored_label(egui::Color32::GREEN, "latest");
                    }
                    if release.is_beta {
                        ui.colored_label(egui::Color32::YELLOW, "beta");
                    }
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.weak(release.display_date());
                    });
                });
                for item in &release.whats_new {
                    ui.label(format!("• {}", item));
                }
                if !release.changelog.is_empty() {
                    egui::CollapsingHeader::new("Changelog")
                        .id_salt(&release.id)
                        .show(ui, |ui| ui.label(&release.changelog));
                }
                ui.separator();
            }
        });
    }

    pub(super) fn show_account(&mut self, ui: &mut egui::Ui) {
        ui.heading("Account");
        ui.separator();

        let Some(account) = self.launcher.account() else {
            return;
        };

        let mut sign_out = false;
        if !account.is_user_loaded() {
            ui.spinner();
        } else if let Some(user) = account.user() {
            egui::Grid::new("user_info").num_columns(2).show(ui, |ui| {
                ui.label("Username:");
                ui.strong(&user.username);
                ui.end_row();
                ui.label("Tier:");
                ui.label(format!("{:?}", user.tier()));
                ui.end_row();
                if user.is_banned {
                    ui.label("Status:");
                    ui.colored_label(egui::Color32::RED, "Banned");
                    ui.end_row();
                }
            });
            ui.add_space(10.0);
            sign_out = ui.button("🚪 Sign out").clicked();
        } else {
            ui.label("Not signed in.");
        }

        ui.add_space(10.0);
        ui.columns(2, |cols| {
            cols[0].strong("Your stats");
            match account.user_stats() {
                Some(stats) => stats_grid(&mut cols[0], "user_stats", stats),
                None => {
                    cols[0].weak("Unavailable");
                }
            }
            cols[1].strong("Global stats");
            match account.global_stats() {
                Some(stats) => stats_grid(&mut cols[1], "global_stats", stats),
                None => {
                    cols[1].weak("Unavailable");
                }
            }
        });

        if sign_out {
            self.launcher.sign_out();
        }
    }
}

fn stats_grid(ui: &mut egui::Ui, id: &str, stats: &Value) {
    egui::Grid::new(id).striped(true).show(ui, |ui| {
        for (key, value) in stat_rows(stats) {
            ui.label(key);
            ui.label(value);
            ui.end_row();
        }
    });
}

/// Lay out one log line with its ANSI styling
fn styled_line(ui: &egui::Ui, line: &LogLine) -> egui::text::LayoutJob {
    let default_color = ui.visuals().text_color();
    let mut job = egui::text::LayoutJob::default();

    for span in line.spans() {
        let style = span.style;
        let mut color = style
            .fg
            .map(|c| {
                let (r, g, b) = c.to_rgb();
                egui::Color32::from_rgb(r, g, b)
            })
            .unwrap_or(default_color);
        if style.dim {
            color = color.gamma_multiply(0.6);
        }

        let mut format = egui::TextFormat {
            font_id: egui::FontId::monospace(LOG_FONT_SIZE),
            color,
            italics: style.italic,
            ..Default::default()
        };
        if let Some(bg) = style.bg {
            let (r, g, b) = bg.to_rgb();
            format.background = egui::Color32::from_rgb(r, g, b);
        }
        if style.underline {
            format.underline = egui::Stroke::new(1.0, color);
        }
        job.append(&span.text, 0.0, format);
    }
    job
}
