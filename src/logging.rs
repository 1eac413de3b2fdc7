//! Subscriber setup for the binary.
//!
//! One fmt layer always writes to stderr (stdout carries command output). A
//! second one is added for `--log-file` when the file can be opened safely.
//! Both share the same format, chosen by `--json`.

use anyhow::Result;
use atomic_paths::output as out;
use atomic_paths::platform::open_log_file_secure_append;
use atomic_paths::{path_has_symlink_ancestor, LogLevel};
use chrono::Local;
use std::fmt as stdfmt;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt as tsfmt;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{registry, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// `DD/MM/YY HH:MM:SS` in local time.
struct LocalHumanTime;

impl FormatTime for LocalHumanTime {
    fn format_time(&self, w: &mut tsfmt::format::Writer<'_>) -> stdfmt::Result {
        write!(w, "{}", Local::now().format("%d/%m/%y %H:%M:%S"))
    }
}

/// Each configured level shows one level more detail than its name suggests:
/// `normal` is info, `info` adds debug and `debug` adds trace.
fn env_filter(lvl: &LogLevel) -> EnvFilter {
    let level = match lvl {
        LogLevel::Quiet => LevelFilter::ERROR,
        LogLevel::Normal => LevelFilter::INFO,
        LogLevel::Info => LevelFilter::DEBUG,
        LogLevel::Debug => LevelFilter::TRACE,
    };
    EnvFilter::default().add_directive(level.into())
}

fn fmt_layer<W>(writer: W, json: bool, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = tsfmt::layer()
        .with_timer(LocalHumanTime)
        .with_target(true)
        .with_thread_ids(true)
        .with_ansi(ansi)
        .with_writer(writer);
    if json {
        base.json().boxed()
    } else {
        base.compact().boxed()
    }
}

/// Non-blocking appender for `path`. The error string says why file logging
/// stays off.
fn open_log_writer(path: &Path) -> std::result::Result<(NonBlocking, WorkerGuard), String> {
    match path_has_symlink_ancestor(path) {
        Ok(false) => {}
        Ok(true) => return Err(format!("{} sits below a symlinked directory", path.display())),
        Err(e) => return Err(format!("cannot inspect {}: {e}", path.display())),
    }
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    open_log_file_secure_append(path)
        .map(tracing_appender::non_blocking)
        .map_err(|e| format!("cannot open {}: {e}", path.display()))
}

/// Install the global subscriber. Hold the returned guard until exit so the
/// file appender flushes.
pub fn init_tracing(
    lvl: &LogLevel,
    log_file: Option<&Path>,
    json: bool,
) -> Result<Option<WorkerGuard>> {
    let mut layers = vec![fmt_layer(io::stderr, json, atty::is(atty::Stream::Stderr))];
    let mut guard = None;

    if let Some(path) = log_file {
        match open_log_writer(path) {
            Ok((writer, g)) => {
                layers.push(fmt_layer(writer, json, false));
                guard = Some(g);
            }
            Err(reason) => out::print_warn(&format!(
                "file logging disabled ({reason}); logging to stderr only"
            )),
        }
    }

    registry().with(layers).with(env_filter(lvl)).try_init()?;
    Ok(guard)
}
