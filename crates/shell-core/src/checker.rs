use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::{ShellConfig, resolve_package_path},
    descriptor::{DescriptorSource, UpdateDescriptor},
    download::{DownloadOutcome, DownloadRequest, PackageDownloader},
    error::{Result, ShellError},
    install::{PackageInstaller, install_package},
    messages::Messages,
    task::{TaskHandle, UiRef, spawn_bound},
    version::{RunningVersion, UpdatePolicy, VersionCheck},
    view::{PromptAnswer, PromptReply, UpdatePrompt, UpdateView},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Fetching,
    FetchFailed,
    Parsed,
    UpToDate,
    UpdateAvailable,
    Prompted,
    Accepted,
    Declined,
    Downloading,
    DownloadFailed,
    Downloaded,
    Installing,
    InstallAborted,
}

impl UpdatePhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UpdatePhase::FetchFailed
                | UpdatePhase::UpToDate
                | UpdatePhase::Declined
                | UpdatePhase::DownloadFailed
                | UpdatePhase::Installing
                | UpdatePhase::InstallAborted
        )
    }

    pub fn can_advance_to(self, next: UpdatePhase) -> bool {
        use UpdatePhase::{
            Accepted, Declined, DownloadFailed, Downloaded, Downloading, FetchFailed, Fetching,
            Idle, InstallAborted, Installing, Parsed, Prompted, UpToDate, UpdateAvailable,
        };

        match (self, next) {
            (Idle, Fetching) => true,
            (Fetching, Parsed | FetchFailed) => true,
            (Parsed, UpToDate | UpdateAvailable) => true,
            (UpdateAvailable, Prompted) => true,
            (Prompted, Accepted | Declined) => true,
            (Accepted, Downloading | DownloadFailed) => true,
            (Downloading, Downloaded | DownloadFailed) => true,
            (Downloaded, Installing | InstallAborted) => true,
            _ => false,
        }
    }
}

/// Fetches the update descriptor, prompts on a version mismatch, then drives
/// download and install. At most one run is in flight.
pub struct UpdateChecker {
    running_version: RunningVersion,
    policy: UpdatePolicy,
    download_dir: Option<PathBuf>,
    package_file_name: String,
    messages: Messages,
    source: Arc<dyn DescriptorSource>,
    downloader: Arc<dyn PackageDownloader>,
    installer: Arc<dyn PackageInstaller>,
    phase: watch::Sender<UpdatePhase>,
    in_flight: AtomicBool,
}

impl UpdateChecker {
    pub fn new(
        config: &ShellConfig,
        source: Arc<dyn DescriptorSource>,
        downloader: Arc<dyn PackageDownloader>,
        installer: Arc<dyn PackageInstaller>,
    ) -> Self {
        let (phase, _) = watch::channel(UpdatePhase::Idle);
        Self {
            running_version: config.running_version.clone(),
            policy: config.update_policy,
            download_dir: config.download_dir.clone(),
            package_file_name: config.package_file_name.clone(),
            messages: config.messages.clone(),
            source,
            downloader,
            installer,
            phase,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn phase(&self) -> UpdatePhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<UpdatePhase> {
        self.phase.subscribe()
    }

    /// Where the package lands. Resolved per download, and the directory is created.
    pub fn package_path(&self) -> Result<PathBuf> {
        let path = resolve_package_path(self.download_dir.as_deref(), &self.package_file_name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    /// Runs one full check in the background, bound to `view`'s screen lifetime.
    pub fn spawn(
        self: &Arc<Self>,
        view: &Arc<dyn UpdateView>,
        token: CancellationToken,
    ) -> TaskHandle {
        let checker = self.clone();
        spawn_bound(view, token, move |ui| async move {
            checker.run(ui).await;
        })
    }

    /// Runs one full check and returns the phase it stopped in.
    pub async fn run(&self, ui: UiRef<dyn UpdateView>) -> UpdatePhase {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            warn!("Update check already in flight, skipping");
            return self.phase();
        }

        self.phase.send_replace(UpdatePhase::Idle);
        self.drive(&ui).await;
        self.in_flight.store(false, Ordering::Release);

        let phase = self.phase();
        if !phase.is_terminal() {
            debug!("Update check detached in phase {phase:?}");
        }
        phase
    }

    /// Fetch and compare only. Returns the descriptor when an update should be offered.
    /// Failures are silent: they end in `FetchFailed` and return `None`.
    pub async fn check(&self) -> Option<UpdateDescriptor> {
        self.advance(UpdatePhase::Fetching);

        let descriptor = match self.source.fetch().await {
            Ok(descriptor) => descriptor,
            Err(err) => {
                debug!("Update check failed silently: {err}");
                self.advance(UpdatePhase::FetchFailed);
                return None;
            }
        };
        self.advance(UpdatePhase::Parsed);

        match self.policy.check(&self.running_version, &descriptor.version) {
            VersionCheck::UpToDate => {
                info!("Running version {} is current", self.running_version);
                self.advance(UpdatePhase::UpToDate);
                None
            }
            VersionCheck::UpdateAvailable => {
                info!(
                    "Update available: {} (running {})",
                    descriptor.version, self.running_version
                );
                self.advance(UpdatePhase::UpdateAvailable);
                Some(descriptor)
            }
        }
    }

    async fn drive(&self, ui: &UiRef<dyn UpdateView>) {
        let Some(Some(descriptor)) = ui.run(self.check()).await else {
            return;
        };

        let (reply, answer) = PromptReply::channel();
        let prompt = self.prompt_for(descriptor.clone());
        self.advance(UpdatePhase::Prompted);
        if !ui.with(move |view| view.prompt_update(prompt, reply)) {
            return;
        }

        let answer = match ui.run(answer).await {
            None => return,
            Some(Ok(answer)) => answer,
            Some(Err(_)) => PromptAnswer::Declined,
        };
        if answer == PromptAnswer::Declined {
            info!("Update {} declined", descriptor.version);
            self.advance(UpdatePhase::Declined);
            return;
        }
        self.advance(UpdatePhase::Accepted);

        self.download_and_install(&descriptor, ui).await;
    }

    async fn download_and_install(
        &self,
        descriptor: &UpdateDescriptor,
        ui: &UiRef<dyn UpdateView>,
    ) {
        let destination = match self.package_path() {
            Ok(path) => path,
            Err(err) => {
                error!("No usable location for the update package: {err}");
                self.advance(UpdatePhase::DownloadFailed);
                ui.with(|view| view.notify(&self.messages.download_failed_toast));
                return;
            }
        };
        let request = DownloadRequest {
            url: descriptor.apk_url.clone(),
            destination,
            title: self.messages.download_title.clone(),
            description: self.messages.download_description.clone(),
        };

        let ticket = match self.downloader.enqueue(request) {
            Ok(ticket) => ticket,
            Err(err) => {
                error!("Could not enqueue update download: {err}");
                self.advance(UpdatePhase::DownloadFailed);
                ui.with(|view| view.notify(&self.messages.download_failed_toast));
                return;
            }
        };
        self.advance(UpdatePhase::Downloading);

        let package = match ui.run(ticket.outcome()).await {
            None => return,
            Some(DownloadOutcome::Completed(package)) => package,
            Some(DownloadOutcome::Failed(reason)) => {
                warn!("Update download failed: {reason}");
                self.advance(UpdatePhase::DownloadFailed);
                ui.with(|view| view.notify(&self.messages.download_failed_toast));
                return;
            }
        };
        self.advance(UpdatePhase::Downloaded);

        match install_package(self.installer.as_ref(), &package) {
            Ok(()) => self.advance(UpdatePhase::Installing),
            Err(ShellError::PackageMissing(_)) => {
                self.advance(UpdatePhase::InstallAborted);
                ui.with(|view| view.notify(&self.messages.package_missing_toast));
            }
            Err(err) => {
                error!("Installer launch failed: {err}");
                self.advance(UpdatePhase::InstallAborted);
            }
        }
    }

    fn prompt_for(&self, descriptor: UpdateDescriptor) -> UpdatePrompt {
        UpdatePrompt {
            title: self.messages.update_title.clone(),
            body: self.messages.update_body(&descriptor.changelog),
            confirm_label: self.messages.update_confirm.clone(),
            cancel_label: self.messages.update_cancel.clone(),
            descriptor,
        }
    }

    fn advance(&self, next: UpdatePhase) {
        self.phase.send_if_modified(|phase| {
            if phase.can_advance_to(next) {
                debug!("Update phase {phase:?} -> {next:?}");
                *phase = next;
                true
            } else {
                error!("Refusing update phase transition {phase:?} -> {next:?}");
                false
            }
        });
    }
}
