use tracing::{info, warn};

use crate::{
    download::DownloadedPackage,
    error::{Result, ShellError},
};

pub const PACKAGE_MIME_TYPE: &str = "application/vnd.android.package-archive";

/// Hands a downloaded package to the OS installer. The OS owns the install UI and
/// permission checks from there on.
pub trait PackageInstaller: Send + Sync {
    fn launch(&self, package: &DownloadedPackage) -> Result<()>;
}

/// Launches the installer only if the package file is still on disk.
pub fn install_package(installer: &dyn PackageInstaller, package: &DownloadedPackage) -> Result<()> {
    if !package.path.is_file() {
        warn!("Update package missing at {}", package.path.display());
        return Err(ShellError::PackageMissing(package.path.clone()));
    }

    info!("Launching installer for {}", package.path.display());
    installer.launch(package)
}

/// Opens the package with the desktop's default handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInstaller;

impl PackageInstaller for SystemInstaller {
    fn launch(&self, package: &DownloadedPackage) -> Result<()> {
        open::that(&package.path).map_err(|e| ShellError::Install(e.to_string()))
    }
}
