pub mod config;
pub mod context;
pub mod layers;

pub use context::{detect_context, ExecutionContext};
pub use layers::console::ConsoleOutput;

use crate::cli::Args;
use crate::logging::config::LoggingConfig;
use crate::logging::layers::{console, file};
use crate::Result;
use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::Registry;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Guards that keep logging sinks active for the duration of the command.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    context: ExecutionContext,
    console_output: ConsoleOutput,
    log_file_path: Option<PathBuf>,
}

impl LoggingGuard {
    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// Returns the console output configuration used during initialization.
    pub fn console_output(&self) -> ConsoleOutput {
        self.console_output
    }

    /// Log file written by the file sink, when enabled.
    pub fn log_file_path(&self) -> Option<&Path> {
        self.log_file_path.as_deref()
    }
}

/// Initialize logging for the parsed command line.
///
/// Precedence is defaults, then `<root>/.mailsmith/config/logging.toml`,
/// then environment (`RUST_LOG` for the filter, `MAILSMITH_LOG_CONSOLE`
/// for the console sink). Errors when called twice in one process.
pub fn init(args: &Args) -> Result<LoggingGuard> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(anyhow!("logging already initialized"));
    }

    let context = detect_context(&args.command);
    let requested_root = args.project_root().ok();
    let project_root = requested_root.clone().filter(|root| root.is_dir());
    // A missing root must not be created by the file sink.
    let root_missing = requested_root.is_some() && project_root.is_none();
    let config = LoggingConfig::load(project_root.as_deref())?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_level))
        .context("failed to configure tracing level")?;

    let file_enabled = !root_missing
        && config
            .enable_file
            .unwrap_or_else(|| context.default_file_sink());
    let log_file_path = file::log_file_path(&config, project_root.as_deref())?;
    type BaseRegistry = Registry;
    type FileSubscriber = file::FileLayerStack<BaseRegistry>;

    let (file_layer, file_guard) = file::file_layer::<BaseRegistry>(&log_file_path, file_enabled)?;
    let console_settings = console::select_console(context, config.console_output);
    let console_layer = console::console_layer::<FileSubscriber>(console_settings);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(env_filter)
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::debug!(
        ?context,
        console = %console_settings.output,
        file = file_enabled,
        "logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
        context,
        console_output: console_settings.output,
        log_file_path: file_enabled.then_some(log_file_path),
    })
}
