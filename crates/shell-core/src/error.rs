use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Descriptor endpoint returned status {0}")]
    Status(u16),

    #[error("Invalid update descriptor: {0}")]
    InvalidDescriptor(#[from] serde_json::Error),

    #[error("Update package not found at {}", .0.display())]
    PackageMissing(PathBuf),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Installer could not be launched: {0}")]
    Install(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ShellError>;
