//! Native half of `com.maracy.lavanderia.ShellActivity`.
//!
//! The activity owns the widgets; everything it shows is decided here. Each activity
//! instance gets a handle from `nativeCreate` and passes it back on every callback.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicI64, Ordering},
    },
};

use anyhow::Context;
use jni::{
    JNIEnv,
    objects::{JByteArray, JClass, JObject, JString},
    sys::{jboolean, jbyteArray, jlong, jstring},
};
use lazy_static::lazy_static;
use maracy_shell::{
    Platform, PromptAnswer, RendererState, ShellConfig, ShellScreen,
    descriptor::HttpDescriptorSource,
};
use parking_lot::Mutex;
use reqwest::Client;
use tokio::runtime::Runtime;
use tracing::{error, info, warn};

use crate::{
    downloads::{IntentInstaller, SystemDownloader},
    host::{Host, HostView, WebViewRenderer},
    logging::{init_tracing, recent_logs},
};

struct AndroidShell {
    screen: ShellScreen,
    renderer: Arc<WebViewRenderer>,
    view: Arc<HostView>,
}

lazy_static! {
    static ref SHELLS: Mutex<HashMap<jlong, Arc<AndroidShell>>> = Mutex::new(HashMap::new());
}

static NEXT_HANDLE: AtomicI64 = AtomicI64::new(1);
static RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn runtime() -> anyhow::Result<&'static Runtime> {
    if let Some(rt) = RUNTIME.get() {
        return Ok(rt);
    }
    let rt = Runtime::new().context("Failed to create Tokio runtime")?;
    Ok(RUNTIME.get_or_init(|| rt))
}

fn shell(handle: jlong) -> Option<Arc<AndroidShell>> {
    let shell = SHELLS.lock().get(&handle).cloned();
    if shell.is_none() {
        warn!("Callback for unknown shell handle {handle}");
    }
    shell
}

fn create_shell(
    env: &mut JNIEnv,
    activity: &JObject,
    saved: &JByteArray,
    downloads_dir: &JString,
) -> anyhow::Result<jlong> {
    let saved = match saved.is_null() {
        true => None,
        false => Some(RendererState(env.convert_byte_array(saved)?)),
    };
    let downloads_dir: String = env.get_string(downloads_dir)?.into();

    let config = ShellConfig {
        download_dir: Some(PathBuf::from(downloads_dir)),
        ..ShellConfig::default()
    };
    config.validate()?;

    let host = Host::new(env, activity)?;
    let renderer = Arc::new(WebViewRenderer::new(host.clone()));
    let view = Arc::new(HostView::new(host.clone()));
    let platform = Platform {
        renderer: renderer.clone(),
        loader_view: view.clone(),
        update_view: view.clone(),
        source: Arc::new(HttpDescriptorSource::new(
            Client::new(),
            config.update_endpoint_url.clone(),
            config.fetch_timeout(),
        )),
        downloader: Arc::new(SystemDownloader::new(host.clone())),
        installer: Arc::new(IntentInstaller::new(host)),
    };

    let _guard = runtime()?.enter();
    let screen = ShellScreen::create(&config, platform, saved.as_ref());

    let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    SHELLS.lock().insert(
        handle,
        Arc::new(AndroidShell {
            screen,
            renderer,
            view,
        }),
    );
    info!("Shell {handle} created");
    Ok(handle)
}

/// Returns the shell handle, or 0 when the shell could not start.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_maracy_lavanderia_ShellActivity_nativeCreate<'local>(
    mut env: JNIEnv<'local>,
    activity: JObject<'local>,
    saved: JByteArray<'local>,
    downloads_dir: JString<'local>,
) -> jlong {
    init_tracing();
    match create_shell(&mut env, &activity, &saved, &downloads_dir) {
        Ok(handle) => handle,
        Err(err) => {
            error!("❌ Failed to create shell: {err:#}");
            0
        }
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_maracy_lavanderia_ShellActivity_nativePageFinished<'local>(
    _env: JNIEnv<'local>,
    _activity: JObject<'local>,
    handle: jlong,
) {
    if let Some(shell) = shell(handle) {
        shell.renderer.page_finished();
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_maracy_lavanderia_ShellActivity_nativeReceivedError<'local>(
    mut env: JNIEnv<'local>,
    _activity: JObject<'local>,
    handle: jlong,
    description: JString<'local>,
) {
    let description: String = match env.get_string(&description) {
        Ok(s) => s.into(),
        Err(_) => String::from("unknown error"),
    };
    if let Some(shell) = shell(handle) {
        shell.renderer.load_failed(&description);
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_maracy_lavanderia_ShellActivity_nativePromptAnswer<'local>(
    _env: JNIEnv<'local>,
    _activity: JObject<'local>,
    handle: jlong,
    accepted: jboolean,
) {
    let answer = match accepted != 0 {
        true => PromptAnswer::Accepted,
        false => PromptAnswer::Declined,
    };
    if let Some(shell) = shell(handle) {
        shell.view.answer(answer);
    }
}

/// Renderer state for the activity's saved-instance bundle, or null.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_maracy_lavanderia_ShellActivity_nativeSaveState<'local>(
    env: JNIEnv<'local>,
    _activity: JObject<'local>,
    handle: jlong,
) -> jbyteArray {
    let Some(state) = shell(handle).and_then(|shell| shell.screen.save_instance_state()) else {
        return std::ptr::null_mut();
    };
    match env.byte_array_from_slice(&state.0) {
        Ok(array) => array.into_raw(),
        Err(err) => {
            error!("❌ Failed to hand out saved state: {err}");
            std::ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_maracy_lavanderia_ShellActivity_nativeDestroy<'local>(
    _env: JNIEnv<'local>,
    _activity: JObject<'local>,
    handle: jlong,
) {
    let removed = SHELLS.lock().remove(&handle);
    if let Some(shell) = removed {
        shell.screen.destroy();
        info!("Shell {handle} destroyed");
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_maracy_lavanderia_ShellActivity_nativeRecentLogs<'local>(
    env: JNIEnv<'local>,
    _class: JClass<'local>,
) -> jstring {
    match env.new_string(recent_logs()) {
        Ok(logs) => logs.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}
