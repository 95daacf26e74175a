mod headless;
mod renderer;
mod window;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use eframe::egui;
use maracy_shell::{APP_NAME, Platform, ShellConfig, ShellScreen, UpdatePolicy};
use reqwest::Client;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    renderer::ProbeRenderer,
    window::{ShellApp, WindowView},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file layered over the built-in defaults
    #[arg(long, env = "MARACY_CONFIG")]
    config: Option<PathBuf>,

    /// Page shown by the shell
    #[arg(long)]
    source_url: Option<String>,

    /// Update descriptor endpoint
    #[arg(long)]
    update_url: Option<String>,

    /// Disables the page load timeout
    #[arg(long)]
    no_load_timeout: bool,

    /// Which reported versions count as updates ("any" or "newer")
    #[arg(long)]
    update_policy: Option<UpdatePolicy>,

    /// Directory the update package is downloaded into
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Runs in the terminal without the GUI
    #[arg(long, env = "MARACY_HEADLESS")]
    headless: bool,

    /// Accepts the update prompt without asking (Requires --headless)
    #[arg(long, requires = "headless")]
    yes: bool,

    /// Opens the page in the default browser once it answers (Requires --headless)
    #[arg(long, requires = "headless")]
    open_page: bool,
}

impl Cli {
    fn shell_config(&self) -> anyhow::Result<ShellConfig> {
        let mut config =
            ShellConfig::load(self.config.as_deref()).context("Failed to load configuration")?;

        if let Some(url) = &self.source_url {
            config.source_url = url.clone();
        }
        if let Some(url) = &self.update_url {
            config.update_endpoint_url = url.clone();
        }
        if self.no_load_timeout {
            config.enable_load_timeout = false;
        }
        if let Some(policy) = self.update_policy {
            config.update_policy = policy;
        }
        if let Some(dir) = &self.download_dir {
            config.download_dir = Some(dir.clone());
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let rust_log = env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let env_filter = match rust_log.is_empty() {
        true => EnvFilter::builder().parse_lossy("info"),
        false => EnvFilter::builder().parse_lossy(rust_log),
    };
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = args.shell_config()?;
    let client = Client::builder()
        .user_agent(concat!("maracy/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    if args.headless {
        info!("👻 Starting in Headless Mode (No GUI)...");
        return headless::run(config, client, args.yes, args.open_page);
    }

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let _guard = rt.enter();

    let view = Arc::new(WindowView::new(config.source_url.clone()));
    let renderer = Arc::new(ProbeRenderer::new(client.clone(), rt.handle().clone()));
    let download_label = config.messages.download_title.clone();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([360.0, 320.0])
            .with_title(APP_NAME)
            .with_resizable(false)
            .with_maximize_button(false),
        ..Default::default()
    };

    info!("🎨 Attempting to open GUI window...");
    let result = eframe::run_native(
        APP_NAME,
        options,
        Box::new(move |cc| {
            let platform =
                Platform::desktop(&config, client, renderer, view.clone(), view.clone());
            let screen = ShellScreen::create(&config, platform, None);
            Ok(Box::new(ShellApp::new(
                &cc.egui_ctx,
                view,
                screen,
                download_label,
            )))
        }),
    );

    match result {
        Ok(()) => {
            info!("👋 GUI exited normally.");
            Ok(())
        }
        Err(err) => {
            error!("❌ CRITICAL GUI ERROR: Failed to start eframe: {err}");
            Err(anyhow::anyhow!("eframe failed: {err}"))
        }
    }
}
