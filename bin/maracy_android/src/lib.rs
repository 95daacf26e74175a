pub mod logging;
pub mod status;

#[cfg(target_os = "android")]
mod bridge;
#[cfg(target_os = "android")]
mod downloads;
#[cfg(target_os = "android")]
mod host;
