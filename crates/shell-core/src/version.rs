use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Version of the running build. Injected with `MARACY_RUNNING_VERSION` at build time,
/// otherwise the crate version.
pub const RUNNING_VERSION: &str = match option_env!("MARACY_RUNNING_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunningVersion(String);

impl RunningVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunningVersion {
    fn default() -> Self {
        Self::new(RUNNING_VERSION)
    }
}

impl fmt::Display for RunningVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decides which reported versions trigger the update prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Any literal difference prompts, including "older" or reformatted versions.
    #[default]
    AnyDifference,
    /// Only a semantically greater version prompts.
    StrictlyNewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCheck {
    UpToDate,
    UpdateAvailable,
}

impl UpdatePolicy {
    pub fn check(self, running: &RunningVersion, reported: &str) -> VersionCheck {
        let available = match self {
            UpdatePolicy::AnyDifference => reported != running.as_str(),
            UpdatePolicy::StrictlyNewer => {
                self_update::version::bump_is_greater(running.as_str(), reported).unwrap_or_else(
                    |err| {
                        warn!("Cannot compare versions {running} and {reported}: {err}");
                        false
                    },
                )
            }
        };

        if available {
            VersionCheck::UpdateAvailable
        } else {
            VersionCheck::UpToDate
        }
    }
}

impl FromStr for UpdatePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "any" | "any-difference" | "any_difference" => Ok(UpdatePolicy::AnyDifference),
            "newer" | "strictly-newer" | "strictly_newer" => Ok(UpdatePolicy::StrictlyNewer),
            other => Err(format!("unknown update policy '{other}'")),
        }
    }
}
