use std::{
    io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicI64, Ordering},
};

use futures::StreamExt;
use reqwest::Client;
use tokio::{io::AsyncWriteExt, sync::oneshot};
use tracing::{debug, error, info};

use crate::error::{Result, ShellError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub destination: PathBuf,
    /// Shown in the system download notification.
    pub title: String,
    pub description: String,
}

/// A package on local storage, ready for the installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedPackage {
    pub path: PathBuf,
    /// Content URI handed out by the platform downloader, when it has one.
    pub content_uri: Option<String>,
}

impl DownloadedPackage {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content_uri: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Completed(DownloadedPackage),
    Failed(String),
}

/// Sending half of a download's completion signal.
#[derive(Debug)]
pub struct DownloadCompletion(oneshot::Sender<DownloadOutcome>);

impl DownloadCompletion {
    pub fn complete(self, package: DownloadedPackage) {
        let _ = self.0.send(DownloadOutcome::Completed(package));
    }

    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.0.send(DownloadOutcome::Failed(reason.into()));
    }

    /// True once the ticket was dropped, e.g. because the screen went away.
    pub fn is_abandoned(&self) -> bool {
        self.0.is_closed()
    }
}

/// An enqueued download. Resolves once the download subsystem reports completion or failure.
#[derive(Debug)]
pub struct DownloadTicket {
    pub id: i64,
    completion: oneshot::Receiver<DownloadOutcome>,
}

impl DownloadTicket {
    pub fn channel(id: i64) -> (DownloadCompletion, Self) {
        let (tx, rx) = oneshot::channel();
        (DownloadCompletion(tx), Self { id, completion: rx })
    }

    pub async fn outcome(self) -> DownloadOutcome {
        let id = self.id;
        self.completion
            .await
            .unwrap_or_else(|_| DownloadOutcome::Failed(format!("download {id} was abandoned")))
    }
}

/// The platform's background download facility.
pub trait PackageDownloader: Send + Sync {
    fn enqueue(&self, request: DownloadRequest) -> Result<DownloadTicket>;
}

/// Removes a previous package so the new download lands on the fixed name.
pub fn clear_destination(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed previous package at {}", path.display());
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Streams the package over HTTP on the current Tokio runtime.
pub struct HttpDownloader {
    client: Client,
    next_id: AtomicI64,
}

impl HttpDownloader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            next_id: AtomicI64::new(1),
        }
    }
}

impl PackageDownloader for HttpDownloader {
    fn enqueue(&self, request: DownloadRequest) -> Result<DownloadTicket> {
        clear_destination(&request.destination)?;
        if let Some(parent) = request.destination.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (completion, ticket) = DownloadTicket::channel(id);
        let client = self.client.clone();

        info!(
            "{} [{}] {} -> {}",
            request.title,
            id,
            request.url,
            request.destination.display()
        );
        tokio::spawn(async move {
            match stream_to_file(&client, &request.url, &request.destination).await {
                Ok(bytes) => {
                    info!("Download {id} complete ({bytes} bytes)");
                    completion.complete(DownloadedPackage::at(request.destination));
                }
                Err(err) => {
                    error!("Download {id} failed: {err}");
                    completion.fail(err.to_string());
                }
            }
        });

        Ok(ticket)
    }
}

/// Writes into `<destination>.part` and renames on success, so the final name only
/// ever refers to a complete file. The partial file is removed on any failure.
async fn stream_to_file(client: &Client, url: &str, destination: &Path) -> Result<u64> {
    let partial = destination.with_extension("part");
    let result = match write_partial(client, url, &partial).await {
        Ok(bytes) => tokio::fs::rename(&partial, destination)
            .await
            .map(|()| bytes)
            .map_err(ShellError::from),
        Err(err) => Err(err),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(&partial).await;
    }
    result
}

async fn write_partial(client: &Client, url: &str, partial: &Path) -> Result<u64> {
    let response = client.get(url).send().await?.error_for_status()?;
    let total = response.content_length();

    let mut file = tokio::fs::File::create(partial).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut last_decile = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if let Some(total) = total.filter(|t| *t > 0) {
            let decile = downloaded * 10 / total;
            if decile > last_decile {
                last_decile = decile;
                debug!("Downloaded {downloaded}/{total} bytes");
            }
        }
    }

    file.sync_all().await?;
    drop(file);

    if let Some(total) = total
        && downloaded != total
    {
        return Err(ShellError::Download(format!(
            "expected {total} bytes, received {downloaded}"
        )));
    }
    Ok(downloaded)
}
