use std::{
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use eframe::egui;
use maracy_shell::{
    APP_NAME, LoaderView, Notifier, PromptReply, ShellScreen, UpdatePhase, UpdatePrompt,
    UpdateView, version::RUNNING_VERSION,
};
use parking_lot::Mutex;
use tracing::{error, info};

const TOAST_DURATION: Duration = Duration::from_millis(3500);

struct Toast {
    message: String,
    shown_at: Instant,
}

struct PendingPrompt {
    prompt: UpdatePrompt,
    reply: PromptReply,
}

#[derive(Default)]
struct WindowState {
    status: Option<String>,
    revealed: bool,
    toasts: Vec<Toast>,
    prompt: Option<PendingPrompt>,
}

/// The window's side of the shell: everything the loader and checker show lands here
/// and is drawn on the next frame.
pub struct WindowView {
    page_url: String,
    state: Mutex<WindowState>,
    ctx: OnceLock<egui::Context>,
}

impl WindowView {
    pub fn new(page_url: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            state: Mutex::new(WindowState::default()),
            ctx: OnceLock::new(),
        }
    }

    pub fn attach(&self, ctx: &egui::Context) {
        let _ = self.ctx.set(ctx.clone());
        ctx.request_repaint();
    }

    fn repaint(&self) {
        if let Some(ctx) = self.ctx.get() {
            ctx.request_repaint();
        }
    }

    fn open_page(&self) {
        if let Err(err) = open::that(&self.page_url) {
            error!("❌ Failed to open browser: {err}");
        }
    }
}

impl Notifier for WindowView {
    fn notify(&self, message: &str) {
        self.state.lock().toasts.push(Toast {
            message: message.to_string(),
            shown_at: Instant::now(),
        });
        self.repaint();
    }
}

impl LoaderView for WindowView {
    fn show_loading(&self) {
        let mut state = self.state.lock();
        state.status = None;
        state.revealed = false;
        drop(state);
        self.repaint();
    }

    fn set_status_text(&self, text: &str) {
        self.state.lock().status = Some(text.to_string());
        self.repaint();
    }

    fn reveal_content(&self) {
        self.state.lock().revealed = true;
        info!("✅ Page is responsive! Opening browser...");
        self.open_page();
        self.repaint();
    }
}

impl UpdateView for WindowView {
    fn prompt_update(&self, prompt: UpdatePrompt, reply: PromptReply) {
        self.state.lock().prompt = Some(PendingPrompt { prompt, reply });
        self.repaint();
    }
}

pub struct ShellApp {
    view: Arc<WindowView>,
    screen: ShellScreen,
    download_label: String,
}

impl ShellApp {
    pub fn new(
        ctx: &egui::Context,
        view: Arc<WindowView>,
        screen: ShellScreen,
        download_label: String,
    ) -> Self {
        view.attach(ctx);
        Self {
            view,
            screen,
            download_label,
        }
    }

    fn draw_prompt(&self, ctx: &egui::Context) {
        let mut state = self.view.state.lock();
        let Some(pending) = &state.prompt else {
            return;
        };

        let mut answer = None;
        let modal = egui::Modal::new(egui::Id::new("update_prompt")).show(ctx, |ui| {
            ui.set_width(280.0);
            ui.heading(&pending.prompt.title);
            ui.add_space(8.0);
            ui.label(&pending.prompt.body);
            ui.add_space(12.0);
            ui.horizontal(|ui| {
                if ui.button(&pending.prompt.confirm_label).clicked() {
                    answer = Some(true);
                }
                if ui.button(&pending.prompt.cancel_label).clicked() {
                    answer = Some(false);
                }
            });
        });
        if answer.is_none() && modal.should_close() {
            answer = Some(false);
        }

        if let Some(accepted) = answer
            && let Some(pending) = state.prompt.take()
        {
            if accepted {
                pending.reply.accept();
            } else {
                pending.reply.decline();
            }
        }
    }

    fn draw_toasts(&self, ctx: &egui::Context) {
        let mut state = self.view.state.lock();
        state
            .toasts
            .retain(|toast| toast.shown_at.elapsed() < TOAST_DURATION);
        if state.toasts.is_empty() {
            return;
        }

        egui::Area::new("toasts".into())
            .anchor(egui::Align2::CENTER_BOTTOM, [0.0, -16.0])
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                for toast in &state.toasts {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.label(&toast.message);
                    });
                }
            });
        ctx.request_repaint_after(Duration::from_millis(250));
    }
}

impl eframe::App for ShellApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::Area::new("version_watermark".into())
            .anchor(egui::Align2::LEFT_BOTTOM, [8.0, -8.0])
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                ui.weak(format!("v{RUNNING_VERSION}"));
            });

        let (status, revealed) = {
            let state = self.view.state.lock();
            (state.status.clone(), state.revealed)
        };

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(APP_NAME);
            ui.separator();
            ui.add_space(40.0);

            ui.vertical_centered(|ui| {
                if revealed {
                    ui.label("Página aberta no navegador.");
                    ui.add_space(10.0);
                    if ui.button("🚀 Abrir novamente").clicked() {
                        self.view.open_page();
                    }
                } else if let Some(status) = status {
                    ui.colored_label(egui::Color32::RED, status);
                } else {
                    ui.spinner();
                    ui.add_space(10.0);
                    ui.label("Carregando...");
                }

                if self.screen.checker().phase() == UpdatePhase::Downloading {
                    ui.add_space(20.0);
                    ui.spinner();
                    ui.label(&self.download_label);
                }
            });
        });

        self.draw_prompt(ctx);
        self.draw_toasts(ctx);
    }
}

