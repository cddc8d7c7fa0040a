use crate::logging::context::ExecutionContext;
use serde::Deserialize;
use std::fmt;
use std::io::{self, IsTerminal};
use std::str::FromStr;
use tracing::Subscriber;
use tracing_subscriber::fmt::{self as tracing_fmt, format, writer::BoxMakeWriter};
use tracing_subscriber::layer::Layered;
use tracing_subscriber::registry::LookupSpan;

/// Layer type returned by the console builder.
pub type ConsoleFmtLayer<S> =
    tracing_fmt::Layer<S, format::DefaultFields, format::Format<format::Compact>, BoxMakeWriter>;

/// Layer stack produced when a console layer is applied to a subscriber.
pub type ConsoleLayerStack<S> = Layered<ConsoleFmtLayer<S>, S>;

/// Where console logs should be emitted.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleOutput {
    Stdout,
    #[default]
    Stderr,
    None,
}

impl fmt::Display for ConsoleOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleOutput::Stdout => write!(f, "stdout"),
            ConsoleOutput::Stderr => write!(f, "stderr"),
            ConsoleOutput::None => write!(f, "none"),
        }
    }
}

impl FromStr for ConsoleOutput {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "stdout" => Ok(ConsoleOutput::Stdout),
            "stderr" => Ok(ConsoleOutput::Stderr),
            "none" => Ok(ConsoleOutput::None),
            _ => Err(format!(
                "invalid logging.console_output '{}'; supported values are stdout, stderr, none",
                value
            )),
        }
    }
}

/// Console sink plus whether it should be colored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConsoleSettings {
    pub output: ConsoleOutput,
    pub ansi: bool,
}

/// Derive console settings from the execution context and optional user override.
/// CI logs are never colored; terminals get color when attached to a tty.
pub fn select_console(context: ExecutionContext, configured: Option<ConsoleOutput>) -> ConsoleSettings {
    let output = configured.unwrap_or_default();
    let ansi = match (context, output) {
        (ExecutionContext::Ci, _) | (_, ConsoleOutput::None) => false,
        (_, ConsoleOutput::Stdout) => io::stdout().is_terminal(),
        (_, ConsoleOutput::Stderr) => io::stderr().is_terminal(),
    };
    ConsoleSettings { output, ansi }
}

/// Build the console tracing layer for the provided subscriber type.
pub fn console_layer<S>(settings: ConsoleSettings) -> ConsoleFmtLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let make_writer = match settings.output {
        ConsoleOutput::Stdout => BoxMakeWriter::new(io::stdout),
        ConsoleOutput::Stderr => BoxMakeWriter::new(io::stderr),
        ConsoleOutput::None => BoxMakeWriter::new(io::sink),
    };

    tracing_fmt::layer()
        .compact()
        .with_writer(make_writer)
        .with_ansi(settings.ansi)
        .with_target(false)
}
