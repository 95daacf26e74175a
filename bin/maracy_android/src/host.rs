use std::sync::Arc;

use jni::{
    JNIEnv, JavaVM,
    objects::{GlobalRef, JByteArray, JObject, JValue},
};
use maracy_shell::{
    LoaderView, Notifier, PageEvents, PageRenderer, PromptAnswer, PromptReply, RendererState,
    UpdatePrompt, UpdateView,
};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

/// The hosting activity. Its UI methods post to the main thread themselves, so they can be
/// called from any thread.
#[derive(Clone)]
pub struct Host {
    vm: Arc<JavaVM>,
    activity: GlobalRef,
}

impl Host {
    pub fn new(env: &mut JNIEnv, activity: &JObject) -> jni::errors::Result<Self> {
        Ok(Self {
            vm: Arc::new(env.get_java_vm()?),
            activity: env.new_global_ref(activity)?,
        })
    }

    /// Runs `f` with an attached env and the activity. A pending Java exception is
    /// described and cleared before the error is returned.
    pub fn with_env<T>(
        &self,
        f: impl FnOnce(&mut JNIEnv, &JObject) -> jni::errors::Result<T>,
    ) -> jni::errors::Result<T> {
        let mut env = self.vm.attach_current_thread()?;
        let result = f(&mut *env, self.activity.as_obj());
        if result.is_err() && env.exception_check().unwrap_or(false) {
            let _ = env.exception_describe();
            let _ = env.exception_clear();
        }
        result
    }

    fn call(&self, method: &str) {
        let result = self.with_env(|env, activity| {
            env.call_method(activity, method, "()V", &[])?;
            Ok(())
        });
        if let Err(err) = result {
            error!("❌ {method}() failed: {err}");
        }
    }

    fn call_with_strings(&self, method: &str, args: &[&str]) {
        let sig = format!("({})V", "Ljava/lang/String;".repeat(args.len()));
        let result = self.with_env(|env, activity| {
            let mut strings = Vec::with_capacity(args.len());
            for arg in args {
                strings.push(env.new_string(arg)?);
            }
            let values: Vec<JValue> = strings.iter().map(|s| JValue::Object(s)).collect();
            env.call_method(activity, method, &sig, &values)?;
            Ok(())
        });
        if let Err(err) = result {
            error!("❌ {method}() failed: {err}");
        }
    }
}

/// Loading text, content view, toasts and the update dialog of the activity.
pub struct HostView {
    host: Host,
    reply: Mutex<Option<PromptReply>>,
}

impl HostView {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            reply: Mutex::new(None),
        }
    }

    /// Called from the dialog's buttons; cancelling the dialog answers `Declined`.
    pub fn answer(&self, answer: PromptAnswer) {
        match self.reply.lock().take() {
            Some(reply) => reply.answer(answer),
            None => debug!("Dialog answer {answer:?} without a pending prompt"),
        }
    }
}

impl Notifier for HostView {
    fn notify(&self, message: &str) {
        self.host.call_with_strings("showToast", &[message]);
    }
}

impl LoaderView for HostView {
    fn show_loading(&self) {
        self.host.call("showLoading");
    }

    fn set_status_text(&self, text: &str) {
        self.host.call_with_strings("setStatusText", &[text]);
    }

    fn reveal_content(&self) {
        self.host.call("revealContent");
    }
}

impl UpdateView for HostView {
    fn prompt_update(&self, prompt: UpdatePrompt, reply: PromptReply) {
        if let Some(previous) = self.reply.lock().replace(reply) {
            warn!("Replacing an unanswered update prompt");
            previous.decline();
        }
        self.host.call_with_strings(
            "showUpdateDialog",
            &[
                prompt.title.as_str(),
                prompt.body.as_str(),
                prompt.confirm_label.as_str(),
                prompt.cancel_label.as_str(),
            ],
        );
    }
}

/// The activity's WebView. Page callbacks come back through the bridge and are routed
/// to the events of the current load.
pub struct WebViewRenderer {
    host: Host,
    events: Mutex<Option<PageEvents>>,
}

impl WebViewRenderer {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            events: Mutex::new(None),
        }
    }

    pub fn page_finished(&self) {
        let events = self.events.lock().clone();
        if let Some(events) = events {
            events.page_finished();
        }
    }

    pub fn load_failed(&self, description: &str) {
        let events = self.events.lock().clone();
        if let Some(events) = events {
            events.load_failed(description);
        }
    }
}

impl PageRenderer for WebViewRenderer {
    fn load_url(&self, url: &str, events: PageEvents) {
        *self.events.lock() = Some(events);
        self.host.call_with_strings("loadUrl", &[url]);
    }

    fn restore_state(&self, state: &RendererState, events: PageEvents) {
        *self.events.lock() = Some(events);
        let result = self.host.with_env(|env, activity| {
            let bytes = env.byte_array_from_slice(&state.0)?;
            env.call_method(
                activity,
                "restoreWebViewState",
                "([B)V",
                &[JValue::Object(&bytes)],
            )?;
            Ok(())
        });
        if let Err(err) = result {
            error!("❌ restoreWebViewState() failed: {err}");
        }
    }

    fn save_state(&self) -> Option<RendererState> {
        let result = self.host.with_env(|env, activity| {
            let obj = env
                .call_method(activity, "saveWebViewState", "()[B", &[])?
                .l()?;
            if obj.is_null() {
                return Ok(None);
            }
            let bytes = env.convert_byte_array(JByteArray::from(obj))?;
            Ok(Some(RendererState(bytes)))
        });
        result.unwrap_or_else(|err| {
            error!("❌ saveWebViewState() failed: {err}");
            None
        })
    }

    fn progress(&self) -> u8 {
        let result = self.host.with_env(|env, activity| {
            env.call_method(activity, "webViewProgress", "()I", &[])?.i()
        });
        match result {
            Ok(progress) => progress.clamp(0, 100) as u8,
            Err(err) => {
                error!("❌ webViewProgress() failed: {err}");
                0
            }
        }
    }
}
