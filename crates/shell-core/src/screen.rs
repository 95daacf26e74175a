use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    checker::UpdateChecker,
    config::ShellConfig,
    descriptor::{DescriptorSource, HttpDescriptorSource},
    download::{HttpDownloader, PackageDownloader},
    install::{PackageInstaller, SystemInstaller},
    loader::{ContentLoader, PageRenderer, RendererState},
    task::TaskHandle,
    view::{LoaderView, UpdateView},
};

/// Platform collaborators of one screen.
pub struct Platform {
    pub renderer: Arc<dyn PageRenderer>,
    pub loader_view: Arc<dyn LoaderView>,
    pub update_view: Arc<dyn UpdateView>,
    pub source: Arc<dyn DescriptorSource>,
    pub downloader: Arc<dyn PackageDownloader>,
    pub installer: Arc<dyn PackageInstaller>,
}

impl Platform {
    /// Desktop wiring: descriptor and package over HTTP, install through the OS file handler.
    pub fn desktop(
        config: &ShellConfig,
        client: Client,
        renderer: Arc<dyn PageRenderer>,
        loader_view: Arc<dyn LoaderView>,
        update_view: Arc<dyn UpdateView>,
    ) -> Self {
        Self {
            renderer,
            loader_view,
            update_view,
            source: Arc::new(HttpDescriptorSource::new(
                client.clone(),
                config.update_endpoint_url.clone(),
                config.fetch_timeout(),
            )),
            downloader: Arc::new(HttpDownloader::new(client)),
            installer: Arc::new(SystemInstaller),
        }
    }
}

/// The single shell screen. Creating it starts both flows; destroying it cancels
/// everything still bound to it.
pub struct ShellScreen {
    loader: Arc<ContentLoader>,
    checker: Arc<UpdateChecker>,
    update_task: Mutex<Option<TaskHandle>>,
    token: CancellationToken,
    _views: (Arc<dyn LoaderView>, Arc<dyn UpdateView>),
}

impl ShellScreen {
    /// Screen start. Must run inside a Tokio runtime.
    pub fn create(
        config: &ShellConfig,
        platform: Platform,
        saved: Option<&RendererState>,
    ) -> Self {
        let token = CancellationToken::new();
        let checker = Arc::new(UpdateChecker::new(
            config,
            platform.source,
            platform.downloader,
            platform.installer,
        ));
        let loader = ContentLoader::new(
            config,
            platform.renderer,
            &platform.loader_view,
            token.child_token(),
        );

        info!(
            "Shell screen starting (version {}, timeout {:?})",
            config.running_version,
            config.load_timeout()
        );
        loader.start(saved);
        let update_task = checker.spawn(&platform.update_view, token.child_token());

        Self {
            loader,
            checker,
            update_task: Mutex::new(Some(update_task)),
            token,
            _views: (platform.loader_view, platform.update_view),
        }
    }

    pub fn loader(&self) -> &Arc<ContentLoader> {
        &self.loader
    }

    pub fn checker(&self) -> &Arc<UpdateChecker> {
        &self.checker
    }

    pub fn save_instance_state(&self) -> Option<RendererState> {
        self.loader.save_instance_state()
    }

    pub fn is_destroyed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn destroy(&self) {
        if self.token.is_cancelled() {
            return;
        }
        info!("Shell screen destroyed");
        self.token.cancel();
        self.loader.teardown();
        self.update_task.lock().take();
    }
}

impl Drop for ShellScreen {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        checker::UpdatePhase,
        loader::LoadOutcome,
        testing::{
            DownloadBehavior, FakeDownloader, FakeRenderer, FakeSource, PromptBehavior,
            RecordingInstaller, RecordingView, ViewEvent,
        },
        version::RunningVersion,
    };

    struct Parts {
        renderer: Arc<FakeRenderer>,
        view: Arc<RecordingView>,
        downloader: Arc<FakeDownloader>,
        platform: Platform,
    }

    fn parts(source: FakeSource, prompt: PromptBehavior) -> Parts {
        let renderer = Arc::new(FakeRenderer::default());
        let view = Arc::new(RecordingView::answering(prompt));
        let downloader = Arc::new(FakeDownloader::new(DownloadBehavior::Hold));
        let platform = Platform {
            renderer: renderer.clone(),
            loader_view: view.clone(),
            update_view: view.clone(),
            source: Arc::new(source),
            downloader: downloader.clone(),
            installer: Arc::new(RecordingInstaller::default()),
        };
        Parts {
            renderer,
            view,
            downloader,
            platform,
        }
    }

    fn config(dir: &tempfile::TempDir) -> ShellConfig {
        ShellConfig {
            running_version: RunningVersion::new("1.0.2"),
            download_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_flows_start_independently() {
        let dir = tempfile::tempdir().unwrap();
        let p = parts(
            FakeSource::serving("1.0.3", "https://x/y.apk", "fix"),
            PromptBehavior::Accept,
        );
        let renderer = p.renderer.clone();
        let view = p.view.clone();
        let screen = ShellScreen::create(&config(&dir), p.platform, None);

        let mut phases = screen.checker().subscribe();
        phases
            .wait_for(|phase| *phase == UpdatePhase::Downloading)
            .await
            .unwrap();
        assert_eq!(p.downloader.requests().len(), 1);
        assert_eq!(screen.loader().outcome(), None);

        renderer.finish();
        assert_eq!(screen.loader().outcome(), Some(LoadOutcome::Completed));
        assert!(view.events().contains(&ViewEvent::Reveal));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_side_failure_leaves_page_loading() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let config = ShellConfig {
            download_dir: Some(blocker.join("downloads")),
            ..config(&dir)
        };
        let p = parts(
            FakeSource::serving("1.0.3", "https://x/y.apk", "fix"),
            PromptBehavior::Accept,
        );
        let renderer = p.renderer.clone();
        let screen = ShellScreen::create(&config, p.platform, None);

        let mut phases = screen.checker().subscribe();
        phases
            .wait_for(|phase| *phase == UpdatePhase::DownloadFailed)
            .await
            .unwrap();
        assert!(p.downloader.requests().is_empty());

        renderer.set_progress(100);
        renderer.finish();
        assert_eq!(screen.loader().outcome(), Some(LoadOutcome::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_drops_late_completions() {
        let dir = tempfile::tempdir().unwrap();
        let p = parts(
            FakeSource::serving("1.0.3", "https://x/y.apk", "fix")
                .delayed(Duration::from_secs(2)),
            PromptBehavior::Accept,
        );
        let renderer = p.renderer.clone();
        let view = p.view.clone();
        let screen = ShellScreen::create(&config(&dir), p.platform, None);

        screen.destroy();
        tokio::time::sleep(Duration::from_secs(30)).await;
        renderer.finish();

        assert!(screen.is_destroyed());
        assert_eq!(view.events(), vec![ViewEvent::ShowLoading]);
        assert!(p.downloader.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recreated_screen_restores_saved_state() {
        let dir = tempfile::tempdir().unwrap();
        let first = parts(FakeSource::unreachable(), PromptBehavior::Decline);
        let first_renderer = first.renderer.clone();
        let screen = ShellScreen::create(&config(&dir), first.platform, None);
        first_renderer.set_saved(RendererState(b"back-forward-list".to_vec()));

        let saved = screen.save_instance_state();
        drop(screen);

        let second = parts(FakeSource::unreachable(), PromptBehavior::Decline);
        let second_renderer = second.renderer.clone();
        let _screen = ShellScreen::create(&config(&dir), second.platform, saved.as_ref());

        assert_eq!(second_renderer.loaded_url(), None);
        assert_eq!(
            second_renderer.restored(),
            Some(RendererState(b"back-forward-list".to_vec()))
        );
    }
}
