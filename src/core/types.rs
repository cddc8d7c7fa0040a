use serde::{Deserialize, Serialize};

/// Error category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Unreadable source, unwritable destination, unreadable directory.
    FilesystemError,
    /// Template or stylesheet compiler rejected its input.
    CompileError,
    /// Invalid configuration or task-graph composition.
    ConfigError,
    /// A step exceeded its configured timeout.
    TimeoutError,
    InternalError,
}

impl ErrorCategory {
    /// Code used when an error is created without an explicit one.
    pub fn default_code(&self) -> &'static str {
        match self {
            ErrorCategory::FilesystemError => "BLD-FS-000",
            ErrorCategory::CompileError => "BLD-COMPILE-000",
            ErrorCategory::ConfigError => "BLD-CONFIG-000",
            ErrorCategory::TimeoutError => "BLD-TIME-000",
            ErrorCategory::InternalError => "BLD-INTERNAL-000",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Line/column position reported by an external compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Outcome classification shared by pipeline reports and task summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Succeeded,
    PartialFailure,
    Fatal,
}

impl BuildStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Succeeded)
    }

    /// Combine two statuses, keeping the most severe.
    pub fn merge(self, other: BuildStatus) -> BuildStatus {
        match (self, other) {
            (BuildStatus::Fatal, _) | (_, BuildStatus::Fatal) => BuildStatus::Fatal,
            (BuildStatus::PartialFailure, _) | (_, BuildStatus::PartialFailure) => {
                BuildStatus::PartialFailure
            }
            _ => BuildStatus::Succeeded,
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BuildStatus::Succeeded => "succeeded",
            BuildStatus::PartialFailure => "partial failure",
            BuildStatus::Fatal => "fatal",
        };
        f.write_str(label)
    }
}
