pub mod checker;
pub mod config;
pub mod descriptor;
pub mod download;
pub mod error;
pub mod install;
pub mod loader;
pub mod messages;
pub mod screen;
pub mod task;
pub mod version;
pub mod view;

#[cfg(test)]
mod testing;

pub use checker::{UpdateChecker, UpdatePhase};
pub use config::{APP_NAME, ShellConfig};
pub use descriptor::UpdateDescriptor;
pub use error::{Result, ShellError};
pub use loader::{ContentLoader, LoadOutcome, PageEvents, PageRenderer, RendererState};
pub use messages::Messages;
pub use screen::{Platform, ShellScreen};
pub use version::{RunningVersion, UpdatePolicy};
pub use view::{LoaderView, Notifier, PromptAnswer, PromptReply, UpdatePrompt, UpdateView};
