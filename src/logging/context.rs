use crate::cli::Command;
use std::env;

/// Execution contexts that influence how logging is routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionContext {
    /// A single build command run from a terminal.
    OneShot,
    /// Long-running `watch` session with preview server.
    Watch,
    /// Continuous integration, detected through the `CI` variable.
    Ci,
}

impl ExecutionContext {
    /// Whether a file sink is written when configuration does not say.
    pub fn default_file_sink(self) -> bool {
        !matches!(self, ExecutionContext::Ci)
    }
}

/// Derive the active execution context from a parsed CLI command.
pub fn detect_context(command: &Command) -> ExecutionContext {
    if ci_enabled() {
        return ExecutionContext::Ci;
    }

    match command {
        Command::Watch(_) => ExecutionContext::Watch,
        _ => ExecutionContext::OneShot,
    }
}

fn ci_enabled() -> bool {
    env::var("CI")
        .map(|value| {
            let value = value.trim();
            !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
        })
        .unwrap_or(false)
}
