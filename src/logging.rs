use std::env;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

const QUIET_FILTER: &str = "warn";
const DEBUG_FILTER: &str = "warn,gptbot=debug";
const DEFAULT_LOG_FILE_PATH: &str = "logs/gptbot.log";
const DEFAULT_LOG_FILE_NAME: &str = "gptbot.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

type InitResult = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

/// Where diagnostics go. Stdout is reserved for the response itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogOutput {
    Stderr,
    File,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LogSettings {
    format: LogFormat,
    output: LogOutput,
    file_path: PathBuf,
    default_filter: &'static str,
}

impl LogSettings {
    fn from_env_with<F>(debug: bool, get_var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let normalized = |key: &str| {
            get_var(key)
                .map(|value| value.trim().to_ascii_lowercase())
                .filter(|value| !value.is_empty())
        };

        let format = match normalized("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        let output = match normalized("LOG_OUTPUT").as_deref() {
            Some("file") => LogOutput::File,
            Some("both") => LogOutput::Both,
            _ => LogOutput::Stderr,
        };
        let file_path = get_var("LOG_FILE_PATH")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE_PATH));

        Self {
            format,
            output,
            file_path,
            default_filter: if debug { DEBUG_FILTER } else { QUIET_FILTER },
        }
    }

    /// `RUST_LOG` wins over the `--debug` default when it is set.
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.default_filter))
    }
}

fn rolling_file_writer(path: &Path) -> io::Result<(NonBlocking, WorkerGuard)> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE_NAME));

    fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::daily(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

fn install(settings: &LogSettings, writer: BoxMakeWriter) -> InitResult {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(settings.env_filter())
        .with_writer(writer)
        .with_target(true);

    match settings.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
}

fn install_with_file(settings: &LogSettings) -> InitResult {
    let also_stderr = settings.output == LogOutput::Both;

    let (file_writer, guard) = match rolling_file_writer(&settings.file_path) {
        Ok(parts) => parts,
        Err(err) => {
            eprintln!(
                "gptbot: cannot open log file '{}': {}; logging to stderr",
                settings.file_path.display(),
                err
            );
            return install(settings, BoxMakeWriter::new(io::stderr));
        }
    };

    let writer = if also_stderr {
        BoxMakeWriter::new(io::stderr.and(file_writer))
    } else {
        BoxMakeWriter::new(file_writer)
    };
    install(settings, writer)?;
    // The guard flushes buffered lines on exit; it has to outlive every span.
    let _ = LOG_GUARD.set(guard);
    Ok(())
}

/// Installs the global subscriber. `debug` raises gptbot's own level to `debug`.
///
/// A second call is a no-op.
pub fn init(debug: bool) {
    let settings = LogSettings::from_env_with(debug, |key| env::var(key).ok());

    let result = match settings.output {
        LogOutput::Stderr => install(&settings, BoxMakeWriter::new(io::stderr)),
        LogOutput::File | LogOutput::Both => install_with_file(&settings),
    };
    let _ = result;
}
