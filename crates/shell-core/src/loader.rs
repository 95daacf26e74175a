use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::ShellConfig,
    messages::Messages,
    task::{TaskHandle, UiRef, spawn_bound},
    view::LoaderView,
};

/// Renderer navigation state, saved and restored verbatim across screen recreation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererState(pub Vec<u8>);

/// The embedded page renderer (a WebView on Android).
pub trait PageRenderer: Send + Sync {
    /// Starts loading `url` with scripting enabled. Progress is reported through `events`.
    fn load_url(&self, url: &str, events: PageEvents);
    fn restore_state(&self, state: &RendererState, events: PageEvents);
    fn save_state(&self) -> Option<RendererState>;
    /// Load progress, 0 to 100.
    fn progress(&self) -> u8;
}

pub trait PageEventHandler: Send + Sync {
    fn page_finished(&self);
    fn load_failed(&self, description: &str);
}

/// Callback handle given to the renderer. Holds the loader weakly.
#[derive(Clone)]
pub struct PageEvents {
    handler: Weak<dyn PageEventHandler>,
}

impl PageEvents {
    pub fn new(handler: Weak<dyn PageEventHandler>) -> Self {
        Self { handler }
    }

    pub fn page_finished(&self) {
        if let Some(handler) = self.handler.upgrade() {
            handler.page_finished();
        }
    }

    pub fn load_failed(&self, description: &str) {
        if let Some(handler) = self.handler.upgrade() {
            handler.load_failed(description);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoadOutcome {
    Completed = 1,
    TimedOut = 2,
    Failed = 3,
}

const UNDECIDED: u8 = 0;

/// Single atomic "decided" marker. The first transition wins, every later one is refused.
#[derive(Debug, Default)]
pub struct LoadDecision(AtomicU8);

impl LoadDecision {
    pub fn decide(&self, outcome: LoadOutcome) -> bool {
        self.0
            .compare_exchange(UNDECIDED, outcome as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Moves a `from` decision to `to`. Used when a page recovers after a load error.
    pub fn supersede(&self, from: LoadOutcome, to: LoadOutcome) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn outcome(&self) -> Option<LoadOutcome> {
        match self.0.load(Ordering::Acquire) {
            1 => Some(LoadOutcome::Completed),
            2 => Some(LoadOutcome::TimedOut),
            3 => Some(LoadOutcome::Failed),
            _ => None,
        }
    }
}

pub struct ContentLoader {
    source_url: String,
    load_timeout: Option<Duration>,
    messages: Messages,
    renderer: Arc<dyn PageRenderer>,
    view: UiRef<dyn LoaderView>,
    decision: LoadDecision,
    started: AtomicBool,
    timer: Mutex<Option<TaskHandle>>,
    token: CancellationToken,
}

impl ContentLoader {
    pub fn new(
        config: &ShellConfig,
        renderer: Arc<dyn PageRenderer>,
        view: &Arc<dyn LoaderView>,
        token: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            source_url: config.source_url.clone(),
            load_timeout: config.load_timeout(),
            messages: config.messages.clone(),
            renderer,
            view: UiRef::new(view, token.clone()),
            decision: LoadDecision::default(),
            started: AtomicBool::new(false),
            timer: Mutex::new(None),
            token,
        })
    }

    /// Loads the configured page, or restores `saved` verbatim when the screen is recreated.
    /// Must run inside a Tokio runtime when the load timeout is enabled.
    pub fn start(self: &Arc<Self>, saved: Option<&RendererState>) {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!("Content loader already started, ignoring");
            return;
        }

        self.view.with(|view| view.show_loading());

        if let Some(timeout) = self.load_timeout {
            let timer = spawn_bound(self, self.token.child_token(), move |me| async move {
                if me.run(tokio::time::sleep(timeout)).await.is_some() {
                    me.with(|loader| loader.timeout_elapsed());
                }
            });
            *self.timer.lock() = Some(timer);
        }

        let handler: Arc<dyn PageEventHandler> = self.clone();
        let events = PageEvents::new(Arc::downgrade(&handler));
        match saved {
            Some(state) => {
                info!("Restoring saved renderer state ({} bytes)", state.0.len());
                self.renderer.restore_state(state, events);
            }
            None => {
                info!("Loading {}", self.source_url);
                self.renderer.load_url(&self.source_url, events);
            }
        }
    }

    pub fn outcome(&self) -> Option<LoadOutcome> {
        self.decision.outcome()
    }

    pub fn save_instance_state(&self) -> Option<RendererState> {
        self.renderer.save_state()
    }

    pub fn teardown(&self) {
        self.token.cancel();
        self.timer.lock().take();
    }

    fn cancel_timer(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.cancel();
        }
    }

    fn timeout_elapsed(&self) {
        let progress = self.renderer.progress();
        if progress >= 100 {
            debug!("Load timer fired with page fully loaded, leaving it to the finish callback");
            return;
        }
        if !self.decision.decide(LoadOutcome::TimedOut) {
            return;
        }

        warn!("Page load timed out at {progress}%");
        self.view.with(|view| {
            view.set_status_text(&self.messages.timeout_status);
            view.notify(&self.messages.timeout_toast);
        });
    }
}

impl PageEventHandler for ContentLoader {
    fn page_finished(&self) {
        if self.token.is_cancelled() {
            return;
        }
        if self.decision.decide(LoadOutcome::Completed) {
            info!("Page finished loading");
        } else if self
            .decision
            .supersede(LoadOutcome::Failed, LoadOutcome::Completed)
        {
            info!("Page finished loading after an earlier load error");
        } else {
            debug!("Page finished after {:?}, ignoring", self.decision.outcome());
            return;
        }

        self.cancel_timer();
        self.view.with(|view| view.reveal_content());
    }

    fn load_failed(&self, description: &str) {
        if self.token.is_cancelled() {
            return;
        }
        if !self.decision.decide(LoadOutcome::Failed) {
            debug!(
                "Load error after {:?}, ignoring: {description}",
                self.decision.outcome()
            );
            return;
        }

        warn!("Page failed to load: {description}");
        self.cancel_timer();
        self.view.with(|view| {
            view.set_status_text(&self.messages.load_error_status);
            view.notify(&self.messages.load_error_toast);
        });
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::{FakeRenderer, RecordingView, ViewEvent};

    fn setup(config: &ShellConfig) -> (Arc<ContentLoader>, Arc<FakeRenderer>, Arc<RecordingView>) {
        let renderer = Arc::new(FakeRenderer::default());
        let view = Arc::new(RecordingView::default());
        let loader_view: Arc<dyn LoaderView> = view.clone();
        let loader = ContentLoader::new(
            config,
            renderer.clone(),
            &loader_view,
            CancellationToken::new(),
        );
        (loader, renderer, view)
    }

    #[test]
    fn test_decision_first_wins() {
        let decision = LoadDecision::default();
        assert_eq!(decision.outcome(), None);
        assert!(decision.decide(LoadOutcome::TimedOut));
        assert!(!decision.decide(LoadOutcome::Completed));
        assert!(!decision.decide(LoadOutcome::Failed));
        assert_eq!(decision.outcome(), Some(LoadOutcome::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_before_timer_reveals_and_cancels_timer() {
        let (loader, renderer, view) = setup(&ShellConfig::default());
        loader.start(None);
        assert_eq!(renderer.loaded_url().as_deref(), Some("http://10.0.0.48:8080"));

        tokio::time::sleep(Duration::from_secs(3)).await;
        renderer.set_progress(100);
        renderer.finish();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(loader.outcome(), Some(LoadOutcome::Completed));
        assert_eq!(view.events(), vec![ViewEvent::ShowLoading, ViewEvent::Reveal]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_before_finish_shows_timeout_and_blocks_reveal() {
        let (loader, renderer, view) = setup(&ShellConfig::default());
        loader.start(None);
        renderer.set_progress(40);

        tokio::time::sleep(Duration::from_secs(11)).await;
        renderer.set_progress(100);
        renderer.finish();

        let messages = Messages::default();
        assert_eq!(loader.outcome(), Some(LoadOutcome::TimedOut));
        assert_eq!(
            view.events(),
            vec![
                ViewEvent::ShowLoading,
                ViewEvent::Status(messages.timeout_status),
                ViewEvent::Notify(messages.timeout_toast),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_with_full_progress_defers_to_finish() {
        let (loader, renderer, view) = setup(&ShellConfig::default());
        loader.start(None);
        renderer.set_progress(100);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(loader.outcome(), None);

        renderer.finish();
        assert_eq!(loader.outcome(), Some(LoadOutcome::Completed));
        assert_eq!(view.events(), vec![ViewEvent::ShowLoading, ViewEvent::Reveal]);
    }

    #[test]
    fn test_only_failure_can_be_superseded() {
        let decision = LoadDecision::default();
        assert!(!decision.supersede(LoadOutcome::Failed, LoadOutcome::Completed));
        assert!(decision.decide(LoadOutcome::Failed));
        assert!(decision.supersede(LoadOutcome::Failed, LoadOutcome::Completed));
        assert_eq!(decision.outcome(), Some(LoadOutcome::Completed));

        let timed_out = LoadDecision::default();
        assert!(timed_out.decide(LoadOutcome::TimedOut));
        assert!(!timed_out.supersede(LoadOutcome::Failed, LoadOutcome::Completed));
        assert_eq!(timed_out.outcome(), Some(LoadOutcome::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_after_load_error_reveals_content() {
        let (loader, renderer, view) = setup(&ShellConfig::default());
        loader.start(None);
        renderer.fail("net::ERR_NAME_NOT_RESOLVED");
        renderer.set_progress(100);
        renderer.finish();
        tokio::time::sleep(Duration::from_secs(30)).await;

        let messages = Messages::default();
        assert_eq!(loader.outcome(), Some(LoadOutcome::Completed));
        assert_eq!(
            view.events(),
            vec![
                ViewEvent::ShowLoading,
                ViewEvent::Status(messages.load_error_status),
                ViewEvent::Notify(messages.load_error_toast),
                ViewEvent::Reveal,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_error_without_finish_stays_failed() {
        let (loader, renderer, view) = setup(&ShellConfig::default());
        loader.start(None);
        renderer.fail("net::ERR_CONNECTION_REFUSED");
        tokio::time::sleep(Duration::from_secs(30)).await;

        let messages = Messages::default();
        assert_eq!(loader.outcome(), Some(LoadOutcome::Failed));
        assert_eq!(
            view.events(),
            vec![
                ViewEvent::ShowLoading,
                ViewEvent::Status(messages.load_error_status),
                ViewEvent::Notify(messages.load_error_toast),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_timeout_waits_indefinitely() {
        let config = ShellConfig {
            enable_load_timeout: false,
            ..Default::default()
        };
        let (loader, renderer, view) = setup(&config);
        loader.start(None);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(loader.outcome(), None);

        renderer.finish();
        assert_eq!(view.events(), vec![ViewEvent::ShowLoading, ViewEvent::Reveal]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_uses_saved_state_instead_of_url() {
        let (loader, renderer, _view) = setup(&ShellConfig::default());
        let saved = RendererState(b"history".to_vec());
        loader.start(Some(&saved));

        assert_eq!(renderer.loaded_url(), None);
        assert_eq!(renderer.restored(), Some(saved));
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_instance_state_comes_from_renderer() {
        let (loader, renderer, _view) = setup(&ShellConfig::default());
        loader.start(None);
        renderer.set_saved(RendererState(vec![1, 2, 3]));
        assert_eq!(loader.save_instance_state(), Some(RendererState(vec![1, 2, 3])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_silences_timer_and_callbacks() {
        let (loader, renderer, view) = setup(&ShellConfig::default());
        loader.start(None);
        loader.teardown();

        tokio::time::sleep(Duration::from_secs(30)).await;
        renderer.finish();

        assert_eq!(loader.outcome(), None);
        assert_eq!(view.events(), vec![ViewEvent::ShowLoading]);
    }
}
