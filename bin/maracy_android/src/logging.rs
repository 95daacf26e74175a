use std::{collections::VecDeque, io, sync::Once};

use lazy_static::lazy_static;
use parking_lot::Mutex;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, fmt::MakeWriter};

const LOG_CAPACITY: usize = 500;

lazy_static! {
    static ref LOG_BUFFER: Mutex<LogBuffer> = Mutex::new(LogBuffer::new(LOG_CAPACITY));
}

static INIT: Once = Once::new();

/// Most recent formatted log lines, oldest first.
pub struct LogBuffer {
    capacity: usize,
    lines: VecDeque<String>,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lines: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, line: String) {
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn joined(&self) -> String {
        self.lines.iter().map(String::as_str).collect()
    }
}

#[cfg(target_os = "android")]
mod logcat {
    use std::ffi::{CString, c_char, c_int};

    const ANDROID_LOG_INFO: c_int = 4;
    const TAG: &std::ffi::CStr = c"maracy";

    #[link(name = "log")]
    unsafe extern "C" {
        fn __android_log_write(prio: c_int, tag: *const c_char, text: *const c_char) -> c_int;
    }

    pub fn write(line: &str) {
        let Ok(text) = CString::new(line.trim_end().replace('\0', " ")) else {
            return;
        };
        unsafe {
            __android_log_write(ANDROID_LOG_INFO, TAG.as_ptr(), text.as_ptr());
        }
    }
}

/// Sends one formatted line to the platform log: logcat on Android, stdout elsewhere.
fn mirror(line: &str) {
    #[cfg(target_os = "android")]
    logcat::write(line);
    #[cfg(not(target_os = "android"))]
    print!("{line}");
}

struct BufferWriter;

impl io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let line = String::from_utf8_lossy(buf).into_owned();
        mirror(&line);
        LOG_BUFFER.lock().push(line);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct BufferMakeWriter;

impl<'a> MakeWriter<'a> for BufferMakeWriter {
    type Writer = BufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BufferWriter
    }
}

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = LogTracer::init();
        let filter = EnvFilter::new("info,maracy_android=debug,maracy_shell=debug,jni=info");
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(BufferMakeWriter)
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

pub fn recent_logs() -> String {
    LOG_BUFFER.lock().joined()
}
