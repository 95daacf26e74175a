use std::{path::Path, thread, time::Duration};

use jni::{
    JNIEnv,
    objects::{JObject, JString, JValue},
};
use maracy_shell::{
    ShellError,
    download::{
        DownloadCompletion, DownloadRequest, DownloadTicket, DownloadedPackage, PackageDownloader,
        clear_destination,
    },
    install::{PACKAGE_MIME_TYPE, PackageInstaller},
};
use tracing::{error, info, warn};

use crate::{host::Host, status::DownloadStatus};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
/// `DownloadManager.Request.VISIBILITY_VISIBLE_NOTIFY_COMPLETED`
const VISIBLE_NOTIFY_COMPLETED: i32 = 1;
/// `FLAG_GRANT_READ_URI_PERMISSION | FLAG_ACTIVITY_NEW_TASK`
const INSTALL_INTENT_FLAGS: i32 = 1 | 268435456;

fn download_manager<'local>(
    env: &mut JNIEnv<'local>,
    context: &JObject,
) -> jni::errors::Result<JObject<'local>> {
    let dm_str = env.new_string("download")?;
    env.call_method(
        context,
        "getSystemService",
        "(Ljava/lang/String;)Ljava/lang/Object;",
        &[JValue::Object(&dm_str)],
    )?
    .l()
}

fn file_uri<'local>(env: &mut JNIEnv<'local>, path: &Path) -> jni::errors::Result<JObject<'local>> {
    let path_jstr = env.new_string(path.to_string_lossy())?;
    let file = env.new_object(
        "java/io/File",
        "(Ljava/lang/String;)V",
        &[JValue::Object(&path_jstr)],
    )?;
    env.call_static_method(
        "android/net/Uri",
        "fromFile",
        "(Ljava/io/File;)Landroid/net/Uri;",
        &[JValue::Object(&file)],
    )?
    .l()
}

/// Queues packages on the system `DownloadManager` and watches the queue for the outcome.
pub struct SystemDownloader {
    host: Host,
}

impl SystemDownloader {
    pub fn new(host: Host) -> Self {
        Self { host }
    }

    fn enqueue_request(&self, request: &DownloadRequest) -> jni::errors::Result<i64> {
        self.host.with_env(|env, context| {
            let url_jstr = env.new_string(&request.url)?;
            let uri = env
                .call_static_method(
                    "android/net/Uri",
                    "parse",
                    "(Ljava/lang/String;)Landroid/net/Uri;",
                    &[JValue::Object(&url_jstr)],
                )?
                .l()?;

            let req = env.new_object(
                "android/app/DownloadManager$Request",
                "(Landroid/net/Uri;)V",
                &[JValue::Object(&uri)],
            )?;

            let mime = env.new_string(PACKAGE_MIME_TYPE)?;
            env.call_method(
                &req,
                "setMimeType",
                "(Ljava/lang/String;)Landroid/app/DownloadManager$Request;",
                &[JValue::Object(&mime)],
            )?;
            let title = env.new_string(&request.title)?;
            env.call_method(
                &req,
                "setTitle",
                "(Ljava/lang/CharSequence;)Landroid/app/DownloadManager$Request;",
                &[JValue::Object(&title)],
            )?;
            let description = env.new_string(&request.description)?;
            env.call_method(
                &req,
                "setDescription",
                "(Ljava/lang/CharSequence;)Landroid/app/DownloadManager$Request;",
                &[JValue::Object(&description)],
            )?;
            env.call_method(
                &req,
                "setNotificationVisibility",
                "(I)Landroid/app/DownloadManager$Request;",
                &[JValue::Int(VISIBLE_NOTIFY_COMPLETED)],
            )?;
            let destination = file_uri(env, &request.destination)?;
            env.call_method(
                &req,
                "setDestinationUri",
                "(Landroid/net/Uri;)Landroid/app/DownloadManager$Request;",
                &[JValue::Object(&destination)],
            )?;

            let dm = download_manager(env, context)?;
            env.call_method(
                &dm,
                "enqueue",
                "(Landroid/app/DownloadManager$Request;)J",
                &[JValue::Object(&req)],
            )?
            .j()
        })
    }

    fn query_status(host: &Host, id: i64) -> jni::errors::Result<DownloadStatus> {
        host.with_env(|env, context| {
            let dm = download_manager(env, context)?;
            let query = env.new_object("android/app/DownloadManager$Query", "()V", &[])?;
            let id_array = env.new_long_array(1)?;
            env.set_long_array_region(&id_array, 0, &[id])?;
            env.call_method(
                &query,
                "setFilterById",
                "([J)Landroid/app/DownloadManager$Query;",
                &[JValue::Object(&id_array)],
            )?;

            let cursor = env
                .call_method(
                    &dm,
                    "query",
                    "(Landroid/app/DownloadManager$Query;)Landroid/database/Cursor;",
                    &[JValue::Object(&query)],
                )?
                .l()?;
            if cursor.is_null() {
                return Ok(DownloadStatus::from_row(None));
            }

            let mut code = None;
            if env.call_method(&cursor, "moveToFirst", "()Z", &[])?.z()? {
                let status_str = env.new_string("status")?;
                let col_idx = env
                    .call_method(
                        &cursor,
                        "getColumnIndex",
                        "(Ljava/lang/String;)I",
                        &[JValue::Object(&status_str)],
                    )?
                    .i()?;
                if col_idx >= 0 {
                    code = Some(
                        env.call_method(&cursor, "getInt", "(I)I", &[JValue::Int(col_idx)])?
                            .i()?,
                    );
                }
            }
            env.call_method(&cursor, "close", "()V", &[])?;
            Ok(DownloadStatus::from_row(code))
        })
    }

    fn downloaded_file_uri(host: &Host, id: i64) -> jni::errors::Result<Option<String>> {
        host.with_env(|env, context| {
            let dm = download_manager(env, context)?;
            let uri = env
                .call_method(
                    &dm,
                    "getUriForDownloadedFile",
                    "(J)Landroid/net/Uri;",
                    &[JValue::Long(id)],
                )?
                .l()?;
            if uri.is_null() {
                return Ok(None);
            }
            let text = JString::from(
                env.call_method(&uri, "toString", "()Ljava/lang/String;", &[])?
                    .l()?,
            );
            let text: String = env.get_string(&text)?.into();
            Ok(Some(text))
        })
    }
}

impl PackageDownloader for SystemDownloader {
    fn enqueue(&self, request: DownloadRequest) -> maracy_shell::Result<DownloadTicket> {
        clear_destination(&request.destination)?;
        let id = self
            .enqueue_request(&request)
            .map_err(|e| ShellError::Download(e.to_string()))?;
        info!("✅ Download Enqueued ID: {id}");

        let (completion, ticket) = DownloadTicket::channel(id);
        let host = self.host.clone();
        thread::spawn(move || monitor_download(host, id, request, completion));
        Ok(ticket)
    }
}

/// Polls the queue until the download leaves the in-progress states, or until nobody
/// waits for the outcome anymore.
fn monitor_download(host: Host, id: i64, request: DownloadRequest, completion: DownloadCompletion) {
    info!("👀 Starting download monitor for ID: {id}");
    loop {
        thread::sleep(POLL_INTERVAL);

        if completion.is_abandoned() {
            info!("🛑 Monitor for {id} stopped (screen closed)");
            return;
        }

        match SystemDownloader::query_status(&host, id) {
            Ok(DownloadStatus::InProgress) => {}
            Ok(DownloadStatus::Successful) => {
                let content_uri = SystemDownloader::downloaded_file_uri(&host, id)
                    .unwrap_or_else(|err| {
                        warn!("No content URI for download {id}: {err}");
                        None
                    });
                info!("✅ Download {id} complete");
                completion.complete(DownloadedPackage {
                    path: request.destination,
                    content_uri,
                });
                return;
            }
            Ok(DownloadStatus::Failed) => {
                warn!("🛑 Download {id} failed or was cancelled");
                completion.fail(format!("download {id} failed"));
                return;
            }
            Err(err) => {
                error!("❌ Download {id} status query failed: {err}");
                completion.fail(err.to_string());
                return;
            }
        }
    }
}

/// Starts the package installer with an `ACTION_VIEW` intent.
pub struct IntentInstaller {
    host: Host,
}

impl IntentInstaller {
    pub fn new(host: Host) -> Self {
        Self { host }
    }
}

impl PackageInstaller for IntentInstaller {
    fn launch(&self, package: &DownloadedPackage) -> maracy_shell::Result<()> {
        self.host
            .with_env(|env, context| {
                let uri = match &package.content_uri {
                    Some(content_uri) => {
                        let uri_jstr = env.new_string(content_uri)?;
                        env.call_static_method(
                            "android/net/Uri",
                            "parse",
                            "(Ljava/lang/String;)Landroid/net/Uri;",
                            &[JValue::Object(&uri_jstr)],
                        )?
                        .l()?
                    }
                    None => file_uri(env, &package.path)?,
                };

                let action_view = env
                    .get_static_field("android/content/Intent", "ACTION_VIEW", "Ljava/lang/String;")?
                    .l()?;
                let intent = env.new_object(
                    "android/content/Intent",
                    "(Ljava/lang/String;)V",
                    &[JValue::Object(&action_view)],
                )?;

                let mime = env.new_string(PACKAGE_MIME_TYPE)?;
                env.call_method(
                    &intent,
                    "setDataAndType",
                    "(Landroid/net/Uri;Ljava/lang/String;)Landroid/content/Intent;",
                    &[JValue::Object(&uri), JValue::Object(&mime)],
                )?;
                env.call_method(
                    &intent,
                    "addFlags",
                    "(I)Landroid/content/Intent;",
                    &[JValue::Int(INSTALL_INTENT_FLAGS)],
                )?;
                env.call_method(
                    context,
                    "startActivity",
                    "(Landroid/content/Intent;)V",
                    &[JValue::Object(&intent)],
                )?;
                Ok(())
            })
            .map_err(|e| ShellError::Install(e.to_string()))?;

        info!("✅ Install Intent Started");
        Ok(())
    }
}
