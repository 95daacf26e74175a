use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use maracy_shell::{PageEvents, PageRenderer, RendererState};
use parking_lot::Mutex;
use reqwest::Client;
use tracing::{info, warn};

/// Stands in for the embedded page view on desktop: the page itself is shown by the
/// system browser, this only probes that the server answers.
pub struct ProbeRenderer {
    client: Client,
    runtime: tokio::runtime::Handle,
    progress: Arc<AtomicU8>,
    current_url: Mutex<Option<String>>,
}

impl ProbeRenderer {
    pub fn new(client: Client, runtime: tokio::runtime::Handle) -> Self {
        Self {
            client,
            runtime,
            progress: Arc::new(AtomicU8::new(0)),
            current_url: Mutex::new(None),
        }
    }

    fn probe(&self, url: String, events: PageEvents) {
        *self.current_url.lock() = Some(url.clone());
        self.progress.store(10, Ordering::SeqCst);

        let client = self.client.clone();
        let progress = self.progress.clone();
        self.runtime.spawn(async move {
            // Any HTTP answer counts as a rendered page; only transport errors fail the load.
            match client.get(&url).send().await {
                Ok(resp) => {
                    info!("Page at {url} answered with {}", resp.status());
                    progress.store(100, Ordering::SeqCst);
                    events.page_finished();
                }
                Err(err) => {
                    warn!("Page at {url} unreachable: {err}");
                    events.load_failed(&err.to_string());
                }
            }
        });
    }
}

impl PageRenderer for ProbeRenderer {
    fn load_url(&self, url: &str, events: PageEvents) {
        self.probe(url.to_string(), events);
    }

    fn restore_state(&self, state: &RendererState, events: PageEvents) {
        match String::from_utf8(state.0.clone()) {
            Ok(url) => self.probe(url, events),
            Err(_) => events.load_failed("saved page state is not readable"),
        }
    }

    fn save_state(&self) -> Option<RendererState> {
        self.current_url
            .lock()
            .clone()
            .map(|url| RendererState(url.into_bytes()))
    }

    fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }
}
