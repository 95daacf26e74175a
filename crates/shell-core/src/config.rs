use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::{Result, ShellError},
    messages::Messages,
    version::{RunningVersion, UpdatePolicy},
};

pub const APP_NAME: &str = "Maracy Lavanderia";
pub const DEFAULT_SOURCE_URL: &str = "http://10.0.0.48:8080";
pub const DEFAULT_UPDATE_URL: &str = "https://devadrian.shop/maracy/update.json";
pub const DEFAULT_PACKAGE_FILE_NAME: &str = "app-update.apk";
pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Everything that differed between the shipped shell variants, as one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub source_url: String,
    pub update_endpoint_url: String,
    pub enable_load_timeout: bool,
    pub load_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub running_version: RunningVersion,
    pub update_policy: UpdatePolicy,
    /// Falls back to the platform data directory when unset.
    pub download_dir: Option<PathBuf>,
    pub package_file_name: String,
    pub messages: Messages,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            update_endpoint_url: DEFAULT_UPDATE_URL.to_string(),
            enable_load_timeout: true,
            load_timeout_secs: DEFAULT_LOAD_TIMEOUT_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            running_version: RunningVersion::default(),
            update_policy: UpdatePolicy::default(),
            download_dir: None,
            package_file_name: DEFAULT_PACKAGE_FILE_NAME.to_string(),
            messages: Messages::default(),
        }
    }
}

impl ShellConfig {
    /// Defaults, then the optional JSON file, then `MARACY_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Reading shell configuration from {}", path.display());
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| ShellError::Config(format!("{}: {e}", path.display())))
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = var("MARACY_SOURCE_URL") {
            self.source_url = url;
        }
        if let Some(url) = var("MARACY_UPDATE_URL") {
            self.update_endpoint_url = url;
        }
        if let Some(value) = var("MARACY_LOAD_TIMEOUT") {
            match parse_bool(&value) {
                Some(enabled) => self.enable_load_timeout = enabled,
                None => warn!("Ignoring MARACY_LOAD_TIMEOUT={value}: expected a boolean"),
            }
        }
        if let Some(value) = var("MARACY_LOAD_TIMEOUT_SECS") {
            match value.parse() {
                Ok(secs) => self.load_timeout_secs = secs,
                Err(_) => warn!("Ignoring MARACY_LOAD_TIMEOUT_SECS={value}: expected seconds"),
            }
        }
        if let Some(value) = var("MARACY_UPDATE_POLICY") {
            match value.parse() {
                Ok(policy) => self.update_policy = policy,
                Err(err) => warn!("Ignoring MARACY_UPDATE_POLICY: {err}"),
            }
        }
        if let Some(dir) = var("MARACY_DOWNLOAD_DIR") {
            self.download_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("source_url", &self.source_url),
            ("update_endpoint_url", &self.update_endpoint_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ShellError::Config(format!(
                    "{name} must be an http(s) URL, got '{url}'"
                )));
            }
        }

        if self.enable_load_timeout && self.load_timeout_secs == 0 {
            return Err(ShellError::Config(
                "load_timeout_secs must be positive when the load timeout is enabled".to_string(),
            ));
        }

        let name = self.package_file_name.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ShellError::Config(format!(
                "package_file_name must be a plain file name, got '{name}'"
            )));
        }

        Ok(())
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        self.enable_load_timeout
            .then(|| Duration::from_secs(self.load_timeout_secs))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

}

/// Fixed destination of the downloaded package; overwritten on every update cycle.
pub fn resolve_package_path(download_dir: Option<&Path>, file_name: &str) -> Result<PathBuf> {
    let dir = match download_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_download_dir()?,
    };
    Ok(dir.join(file_name))
}

pub fn default_download_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "maracy", APP_NAME)
        .ok_or_else(|| ShellError::Config("could not determine home directory".to_string()))?;
    Ok(dirs.data_dir().join("downloads"))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
