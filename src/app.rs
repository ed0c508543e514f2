//! Settings window: egui/eframe application.
//!
//! # Architecture
//!
//! [`SettingsApp`] is the top-level [`eframe::App`].  It owns the
//! [`Engine`] handle and edits a draft [`AppConfig`]:
//!
//! * live level and indicator come from [`LiveStatus`] (watch channels the
//!   loop thread writes every cycle);
//! * "Press key" buttons run [`capture_one`] on a helper thread and poll the
//!   result;
//! * "Apply & save" validates the draft, writes `settings.toml`, hands the
//!   engine a new [`EngineConfig`](crate::engine::EngineConfig) and, when the
//!   microphone changed, requests a device switch.
//!
//! The window title is [`SETTINGS_WINDOW_TITLE`]; while it is focused the
//! engine keeps sampling but never emulates keys.

use std::sync::mpsc;
use std::time::Duration;

use eframe::egui;

use crate::audio::MicrophoneInfo;
use crate::config::AppConfig;
use crate::engine::{Engine, LiveStatus, SwitchReply};
use crate::hotkey::{capture_one, InputObserver, KeyCombo, KeyParseError};
use crate::window::SETTINGS_WINDOW_TITLE;

/// Upper end of the level bar and threshold slider.
const LEVEL_SCALE: f32 = 3000.0;

const LAMP_ON: egui::Color32 = egui::Color32::from_rgb(0x0D, 0xFF, 0x82);
const LAMP_OFF: egui::Color32 = egui::Color32::from_rgb(0xFF, 0x0D, 0x31);

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Which combo field a key capture writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboField {
    Ptt,
    Ignore,
    Mute,
}

impl ComboField {
    fn label(self) -> &'static str {
        match self {
            ComboField::Ptt => "Push-to-talk keys",
            ComboField::Ignore => "Ignore keys",
            ComboField::Mute => "Mute keys",
        }
    }

    fn text_mut(self, config: &mut AppConfig) -> &mut String {
        match self {
            ComboField::Ptt => &mut config.keys.ptt,
            ComboField::Ignore => &mut config.keys.ignore,
            ComboField::Mute => &mut config.sound.mute_keys,
        }
    }
}

/// Strictly parse every combo in `draft`.  An empty push-to-talk combo is
/// rejected; the others may be empty.
pub fn validate(draft: &AppConfig) -> Result<(), String> {
    let check = |field: ComboField, text: &str| -> Result<KeyCombo, String> {
        KeyCombo::try_parse(text).map_err(|e: KeyParseError| format!("{}: {e}", field.label()))
    };

    if check(ComboField::Ptt, &draft.keys.ptt)?.is_empty() {
        return Err("Push-to-talk keys: at least one key is required".into());
    }
    check(ComboField::Ignore, &draft.keys.ignore)?;
    check(ComboField::Mute, &draft.sound.mute_keys)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// SettingsApp
// ---------------------------------------------------------------------------

enum Notice {
    Info(String),
    Error(String),
}

/// eframe application for the settings window.
pub struct SettingsApp {
    engine: Engine,
    status: LiveStatus,
    observer: InputObserver,

    /// Last applied configuration.
    applied: AppConfig,
    /// Configuration being edited.
    draft: AppConfig,
    microphones: Vec<MicrophoneInfo>,

    capture: Option<(ComboField, mpsc::Receiver<KeyCombo>)>,
    pending_switch: Option<(usize, SwitchReply)>,
    notice: Option<Notice>,
}

impl SettingsApp {
    pub fn new(
        engine: Engine,
        status: LiveStatus,
        observer: InputObserver,
        config: AppConfig,
        microphones: Vec<MicrophoneInfo>,
    ) -> Self {
        Self {
            engine,
            status,
            observer,
            applied: config.clone(),
            draft: config,
            microphones,
            capture: None,
            pending_switch: None,
            notice: None,
        }
    }

    // ── Background results ───────────────────────────────────────────────

    fn poll_capture(&mut self) {
        let Some((field, rx)) = &self.capture else {
            return;
        };
        let field = *field;
        let received = rx.try_recv();
        match received {
            Ok(combo) => {
                if !combo.is_empty() {
                    *field.text_mut(&mut self.draft) = combo.to_string();
                }
                self.capture = None;
            }
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => self.capture = None,
        }
    }

    fn poll_switch(&mut self) {
        let Some((index, reply)) = &self.pending_switch else {
            return;
        };
        let index = *index;
        let received = reply.try_recv();
        match received {
            Ok(Ok(())) => {
                self.notice = Some(Notice::Info(format!("Using microphone {index}")));
                self.pending_switch = None;
            }
            Ok(Err(e)) => {
                self.notice = Some(Notice::Error(e.to_string()));
                self.pending_switch = None;
            }
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => {
                self.notice = Some(Notice::Error("engine is not running".into()));
                self.pending_switch = None;
            }
        }
    }

    // ── Actions ──────────────────────────────────────────────────────────

    fn start_capture(&mut self, field: ComboField) {
        let observer = self.observer.clone();
        let (tx, rx) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("key-capture".into())
            .spawn(move || {
                let _ = tx.send(capture_one(&observer));
            });
        match spawned {
            Ok(_) => self.capture = Some((field, rx)),
            Err(e) => self.notice = Some(Notice::Error(format!("key capture failed: {e}"))),
        }
    }

    fn apply_and_save(&mut self) {
        if let Err(message) = validate(&self.draft) {
            self.notice = Some(Notice::Error(message));
            return;
        }

        self.notice = Some(match self.draft.save() {
            Ok(()) => Notice::Info("Settings saved".into()),
            Err(e) => {
                log::error!("config: save failed: {e:#}");
                Notice::Error(format!("Applied, but saving failed: {e}"))
            }
        });

        self.engine.apply_config(self.draft.to_engine_config());

        let index = self.draft.activation.microphone_index;
        if index != self.applied.activation.microphone_index {
            match self.engine.request_microphone_switch(index) {
                Ok(reply) => self.pending_switch = Some((index, reply)),
                Err(e) => self.notice = Some(Notice::Error(e.to_string())),
            }
        }
        self.applied = self.draft.clone();
    }

    // ── Panels ───────────────────────────────────────────────────────────

    fn draw_level(&self, ui: &mut egui::Ui) {
        let level = self.status.level();
        ui.horizontal(|ui| {
            let (rect, _) = ui.allocate_exact_size(egui::vec2(18.0, 18.0), egui::Sense::hover());
            let color = if self.status.indicator() { LAMP_ON } else { LAMP_OFF };
            ui.painter().circle_filled(rect.center(), 8.0, color);

            ui.add(
                egui::ProgressBar::new((level / LEVEL_SCALE).clamp(0.0, 1.0))
                    .text(format!("{level:.0}")),
            );
        });
    }

    fn combo_row(&mut self, ui: &mut egui::Ui, field: ComboField) {
        ui.label(field.label());
        ui.horizontal(|ui| {
            ui.text_edit_singleline(field.text_mut(&mut self.draft));
            let waiting = matches!(&self.capture, Some((f, _)) if *f == field);
            let caption = if waiting { "Press any key…" } else { "Press key" };
            if ui
                .add_enabled(self.capture.is_none(), egui::Button::new(caption))
                .clicked()
            {
                self.start_capture(field);
            }
        });
        ui.end_row();
    }

    fn draw_form(&mut self, ui: &mut egui::Ui) {
        egui::Grid::new("settings")
            .num_columns(2)
            .spacing([12.0, 6.0])
            .show(ui, |ui| {
                ui.label("Volume threshold");
                ui.add(egui::Slider::new(
                    &mut self.draft.activation.volume_threshold,
                    0..=LEVEL_SCALE as i32,
                ));
                ui.end_row();

                self.combo_row(ui, ComboField::Ptt);

                ui.label("Allowed windows");
                ui.text_edit_singleline(&mut self.draft.window.allowed_fragments)
                    .on_hover_text("Comma-separated parts of window titles");
                ui.end_row();

                ui.label("Release delay");
                ui.add(
                    egui::DragValue::new(&mut self.draft.activation.post_voice_release_delay_ms)
                        .range(0..=10_000)
                        .suffix(" ms"),
                );
                ui.end_row();

                ui.label("Microphone");
                let selected = self
                    .microphones
                    .iter()
                    .find(|m| m.index == self.draft.activation.microphone_index)
                    .map(|m| m.name.clone())
                    .unwrap_or_else(|| {
                        format!("Device {}", self.draft.activation.microphone_index)
                    });
                egui::ComboBox::from_id_salt("microphone")
                    .selected_text(selected)
                    .show_ui(ui, |ui| {
                        for mic in &self.microphones {
                            ui.selectable_value(
                                &mut self.draft.activation.microphone_index,
                                mic.index,
                                &mic.name,
                            );
                        }
                    });
                ui.end_row();

                ui.label("");
                ui.checkbox(&mut self.draft.keys.ignore_enabled, "Skip while ignore keys are held");
                ui.end_row();
                self.combo_row(ui, ComboField::Ignore);

                ui.label("");
                ui.horizontal(|ui| {
                    ui.checkbox(&mut self.draft.sound.fade_enabled, "Fade speakers by");
                    ui.add(
                        egui::DragValue::new(&mut self.draft.sound.fade_percent)
                            .range(0..=100)
                            .suffix("%"),
                    );
                });
                ui.end_row();

                ui.label("");
                ui.checkbox(&mut self.draft.sound.mute_enabled, "Mute-all hotkey");
                ui.end_row();
                self.combo_row(ui, ComboField::Mute);
            });
    }

    fn draw_notice(&self, ui: &mut egui::Ui) {
        match &self.notice {
            Some(Notice::Info(text)) => {
                ui.label(egui::RichText::new(text).color(egui::Color32::from_rgb(80, 200, 120)));
            }
            Some(Notice::Error(text)) => {
                ui.label(egui::RichText::new(text).color(egui::Color32::from_rgb(255, 136, 68)));
            }
            None => {}
        }
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for SettingsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_capture();
        self.poll_switch();

        // Live level bar.
        ctx.request_repaint_after(Duration::from_millis(50));

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(SETTINGS_WINDOW_TITLE);
            ui.add_space(4.0);
            self.draw_level(ui);
            ui.separator();

            self.draw_form(ui);
            ui.separator();

            ui.horizontal(|ui| {
                if ui.button("Apply & save").clicked() {
                    self.apply_and_save();
                }
                if self.draft != self.applied {
                    ui.label(egui::RichText::new("unsaved changes").italics());
                }
            });
            self.draw_notice(ui);
        });
    }

    /// Stop the engine so held keys are released and volumes restored.
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("app: settings window closing");
        self.engine.shutdown();
        self.observer.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
