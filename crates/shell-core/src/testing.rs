//! Recording fakes for the platform seams.

use std::{
    sync::atomic::{AtomicU8, Ordering},
    time::Duration,
};

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::{
    descriptor::{DescriptorSource, UpdateDescriptor},
    download::{
        DownloadCompletion, DownloadRequest, DownloadTicket, DownloadedPackage, PackageDownloader,
    },
    error::{Result, ShellError},
    install::PackageInstaller,
    loader::{PageEvents, PageRenderer, RendererState},
    view::{LoaderView, Notifier, PromptReply, UpdatePrompt, UpdateView},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    ShowLoading,
    Status(String),
    Reveal,
    Notify(String),
    Prompt(UpdatePrompt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptBehavior {
    Accept,
    Decline,
    Dismiss,
    #[default]
    Hold,
}

#[derive(Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
    behavior: Mutex<PromptBehavior>,
    held: Mutex<Option<PromptReply>>,
}

impl RecordingView {
    pub fn answering(behavior: PromptBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().clone()
    }

    pub fn prompts(&self) -> Vec<UpdatePrompt> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ViewEvent::Prompt(prompt) => Some(prompt),
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ViewEvent::Notify(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    /// The reply of a prompt shown with [`PromptBehavior::Hold`].
    pub fn take_reply(&self) -> Option<PromptReply> {
        self.held.lock().take()
    }
}

impl Notifier for RecordingView {
    fn notify(&self, message: &str) {
        self.events.lock().push(ViewEvent::Notify(message.to_string()));
    }
}

impl LoaderView for RecordingView {
    fn show_loading(&self) {
        self.events.lock().push(ViewEvent::ShowLoading);
    }

    fn set_status_text(&self, text: &str) {
        self.events.lock().push(ViewEvent::Status(text.to_string()));
    }

    fn reveal_content(&self) {
        self.events.lock().push(ViewEvent::Reveal);
    }
}

impl UpdateView for RecordingView {
    fn prompt_update(&self, prompt: UpdatePrompt, reply: PromptReply) {
        self.events.lock().push(ViewEvent::Prompt(prompt));
        match *self.behavior.lock() {
            PromptBehavior::Accept => reply.accept(),
            PromptBehavior::Decline => reply.decline(),
            PromptBehavior::Dismiss => drop(reply),
            PromptBehavior::Hold => *self.held.lock() = Some(reply),
        }
    }
}

#[derive(Default)]
pub struct FakeRenderer {
    progress: AtomicU8,
    events: Mutex<Option<PageEvents>>,
    loaded: Mutex<Option<String>>,
    restored: Mutex<Option<RendererState>>,
    saved: Mutex<Option<RendererState>>,
}

impl FakeRenderer {
    pub fn set_progress(&self, progress: u8) {
        self.progress.store(progress, Ordering::SeqCst);
    }

    pub fn set_saved(&self, state: RendererState) {
        *self.saved.lock() = Some(state);
    }

    pub fn loaded_url(&self) -> Option<String> {
        self.loaded.lock().clone()
    }

    pub fn restored(&self) -> Option<RendererState> {
        self.restored.lock().clone()
    }

    pub fn finish(&self) {
        let events = self.events.lock().clone();
        if let Some(events) = events {
            events.page_finished();
        }
    }

    pub fn fail(&self, description: &str) {
        let events = self.events.lock().clone();
        if let Some(events) = events {
            events.load_failed(description);
        }
    }
}

impl PageRenderer for FakeRenderer {
    fn load_url(&self, url: &str, events: PageEvents) {
        *self.loaded.lock() = Some(url.to_string());
        *self.events.lock() = Some(events);
    }

    fn restore_state(&self, state: &RendererState, events: PageEvents) {
        *self.restored.lock() = Some(state.clone());
        *self.events.lock() = Some(events);
    }

    fn save_state(&self) -> Option<RendererState> {
        self.saved.lock().clone()
    }

    fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }
}

/// Serves a fixed descriptor, or fails like an unreachable endpoint.
pub struct FakeSource {
    descriptor: Option<UpdateDescriptor>,
    delay: Duration,
}

impl FakeSource {
    pub fn serving(version: &str, apk_url: &str, changelog: &str) -> Self {
        Self {
            descriptor: Some(UpdateDescriptor {
                version: version.to_string(),
                apk_url: apk_url.to_string(),
                changelog: changelog.to_string(),
            }),
            delay: Duration::ZERO,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            descriptor: None,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl DescriptorSource for FakeSource {
    fn fetch(&self) -> BoxFuture<'_, Result<UpdateDescriptor>> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.descriptor.clone().ok_or(ShellError::Status(503))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadBehavior {
    /// Writes the destination file and reports completion.
    Complete,
    /// Reports completion without producing a file.
    CompleteWithoutFile,
    Fail,
    /// Keeps the completion for the test to resolve.
    Hold,
    Reject,
}

pub struct FakeDownloader {
    behavior: DownloadBehavior,
    requests: Mutex<Vec<DownloadRequest>>,
    held: Mutex<Option<DownloadCompletion>>,
}

impl FakeDownloader {
    pub fn new(behavior: DownloadBehavior) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
            held: Mutex::new(None),
        }
    }

    pub fn requests(&self) -> Vec<DownloadRequest> {
        self.requests.lock().clone()
    }

    pub fn take_completion(&self) -> Option<DownloadCompletion> {
        self.held.lock().take()
    }
}

impl PackageDownloader for FakeDownloader {
    fn enqueue(&self, request: DownloadRequest) -> Result<DownloadTicket> {
        if self.behavior == DownloadBehavior::Reject {
            return Err(ShellError::Download("queue unavailable".to_string()));
        }

        let mut requests = self.requests.lock();
        requests.push(request.clone());
        let (completion, ticket) = DownloadTicket::channel(requests.len() as i64);

        match self.behavior {
            DownloadBehavior::Complete => {
                std::fs::write(&request.destination, b"PK")?;
                completion.complete(DownloadedPackage::at(request.destination));
            }
            DownloadBehavior::CompleteWithoutFile => {
                completion.complete(DownloadedPackage::at(request.destination));
            }
            DownloadBehavior::Fail => completion.fail("HTTP 404"),
            DownloadBehavior::Hold => *self.held.lock() = Some(completion),
            DownloadBehavior::Reject => unreachable!(),
        }

        Ok(ticket)
    }
}

#[derive(Default)]
pub struct RecordingInstaller {
    launched: Mutex<Vec<DownloadedPackage>>,
}

impl RecordingInstaller {
    pub fn launched(&self) -> Vec<DownloadedPackage> {
        self.launched.lock().clone()
    }
}

impl PackageInstaller for RecordingInstaller {
    fn launch(&self, package: &DownloadedPackage) -> Result<()> {
        self.launched.lock().push(package.clone());
        Ok(())
    }
}
