//! Surfaces the shell drives on the platform UI.

use tokio::sync::oneshot;
use tracing::debug;

use crate::descriptor::UpdateDescriptor;

pub trait Notifier: Send + Sync {
    /// Short-lived notification (a toast on Android).
    fn notify(&self, message: &str);
}

/// The loading indicator and content view of the screen.
pub trait LoaderView: Notifier {
    /// Shows the loading indicator and hides the content view.
    fn show_loading(&self);
    /// Replaces the loading indicator's text. The indicator stays visible.
    fn set_status_text(&self, text: &str);
    /// Hides the loading indicator and shows the content view.
    fn reveal_content(&self);
}

pub trait UpdateView: Notifier {
    /// Shows the modal update confirmation. The answer goes through `reply`;
    /// dropping it counts as cancel.
    fn prompt_update(&self, prompt: UpdatePrompt, reply: PromptReply);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePrompt {
    pub title: String,
    pub body: String,
    pub confirm_label: String,
    pub cancel_label: String,
    pub descriptor: UpdateDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    Accepted,
    Declined,
}

/// One-shot answer channel for an update prompt.
#[derive(Debug)]
pub struct PromptReply(oneshot::Sender<PromptAnswer>);

impl PromptReply {
    pub fn channel() -> (Self, oneshot::Receiver<PromptAnswer>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    pub fn accept(self) {
        self.answer(PromptAnswer::Accepted);
    }

    pub fn decline(self) {
        self.answer(PromptAnswer::Declined);
    }

    pub fn answer(self, answer: PromptAnswer) {
        if self.0.send(answer).is_err() {
            debug!("Update prompt answered after the check ended");
        }
    }
}
