use std::{io::BufRead, sync::Arc};

use anyhow::Context;
use maracy_shell::{
    LoaderView, Notifier, Platform, PromptReply, ShellConfig, ShellScreen, UpdatePrompt,
    UpdateView,
};
use reqwest::Client;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::renderer::ProbeRenderer;

/// Terminal surface: status lines on stdout, the update prompt on stdin.
pub struct ConsoleView {
    auto_accept: bool,
    open_page: Option<String>,
    settled: Notify,
}

impl ConsoleView {
    pub fn new(auto_accept: bool, open_page: Option<String>) -> Self {
        Self {
            auto_accept,
            open_page,
            settled: Notify::new(),
        }
    }

    /// Resolves once the page load was decided one way or the other.
    pub async fn load_settled(&self) {
        self.settled.notified().await;
    }
}

impl Notifier for ConsoleView {
    fn notify(&self, message: &str) {
        println!("» {message}");
    }
}

impl LoaderView for ConsoleView {
    fn show_loading(&self) {
        println!("Carregando...");
    }

    fn set_status_text(&self, text: &str) {
        println!("{text}");
        self.settled.notify_one();
    }

    fn reveal_content(&self) {
        println!("Página carregada.");
        if let Some(url) = &self.open_page
            && let Err(err) = open::that(url)
        {
            error!("❌ Failed to open browser: {err}");
        }
        self.settled.notify_one();
    }
}

impl UpdateView for ConsoleView {
    fn prompt_update(&self, prompt: UpdatePrompt, reply: PromptReply) {
        println!("\n{}\n\n{}", prompt.title, prompt.body);

        if self.auto_accept {
            println!("{} (--yes)", prompt.confirm_label);
            reply.accept();
            return;
        }

        println!("[s] {}  [n] {}", prompt.confirm_label, prompt.cancel_label);
        // Blocking stdin read off the runtime; EOF or an unreadable line counts as cancel.
        std::thread::spawn(move || {
            let mut line = String::new();
            match std::io::stdin().lock().read_line(&mut line) {
                Ok(_) if is_yes(&line) => reply.accept(),
                Ok(_) => reply.decline(),
                Err(err) => {
                    warn!("Failed to read prompt answer: {err}");
                    reply.decline();
                }
            }
        });
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "s" | "sim" | "y" | "yes"
    )
}

pub fn run(config: ShellConfig, client: Client, auto_accept: bool, open_page: bool) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    rt.block_on(async {
        let view = Arc::new(ConsoleView::new(
            auto_accept,
            open_page.then(|| config.source_url.clone()),
        ));
        let renderer = Arc::new(ProbeRenderer::new(
            client.clone(),
            tokio::runtime::Handle::current(),
        ));
        let platform = Platform::desktop(&config, client, renderer, view.clone(), view.clone());
        let screen = ShellScreen::create(&config, platform, None);

        let mut phases = screen.checker().subscribe();
        let finished = async {
            view.load_settled().await;
            let _ = phases.wait_for(|phase| phase.is_terminal()).await;
        };

        tokio::select! {
            () = finished => {
                info!(
                    "Done: page {:?}, update check {:?}",
                    screen.loader().outcome(),
                    screen.checker().phase()
                );
            }
            res = tokio::signal::ctrl_c() => match res {
                Ok(()) => info!("🛑 Received Ctrl+C, shutting down..."),
                Err(err) => error!("Unable to listen for shutdown signal: {err}"),
            },
        }

        screen.destroy();
        Ok(())
    })
}
