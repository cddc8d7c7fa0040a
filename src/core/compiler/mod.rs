//! Seams for the external template and stylesheet compilers.

use crate::core::error::AppError;
use crate::core::types::{ErrorCategory, SourceLocation};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;

mod command;
mod grass_engine;
mod tera_engine;

pub use command::CommandCompiler;
pub use grass_engine::GrassCompiler;
pub use tera_engine::{PartialSource, TeraCompiler};

/// Renders template text against a context mapping.
#[async_trait]
pub trait TemplateCompiler: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Render `source`, registered under `name`, with `context` bound into scope.
    async fn render(&self, name: &str, source: &str, context: &Value)
        -> Result<String, CompilerError>;
}

/// Compiles stylesheet sources into CSS.
#[async_trait]
pub trait StylesheetCompiler: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Compile `source`; `origin` is the file it was read from, used to
    /// resolve relative imports.
    async fn compile(&self, source: &str, origin: &Path) -> Result<String, CompilerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CompilerError {
    #[error("{message}")]
    Syntax {
        message: String,
        location: Option<SourceLocation>,
    },
    #[error("failed to launch compiler '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("compiler '{command}' exited with {status}: {stderr}")]
    Process {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("compiler produced non UTF-8 output")]
    Encoding,
    #[error("compiler task aborted: {0}")]
    Join(String),
}

impl CompilerError {
    /// Build a syntax error, extracting the line/column from the compiler's
    /// own message when it carries one.
    pub fn syntax(message: impl Into<String>) -> Self {
        let message = message.into();
        let location = scan_location(&message);
        CompilerError::Syntax { message, location }
    }

    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            CompilerError::Syntax { location, .. } => *location,
            CompilerError::Process { stderr, .. } => scan_location(stderr),
            _ => None,
        }
    }

    /// Attach the failing file and convert into the crate error type.
    pub fn into_app_error(self, file: &Path) -> AppError {
        let location = self.location();
        let category = match self {
            CompilerError::Spawn { .. } => ErrorCategory::FilesystemError,
            CompilerError::Join(_) => ErrorCategory::InternalError,
            _ => ErrorCategory::CompileError,
        };
        AppError::new(category, self.to_string())
            .with_code("BLD-COMPILE-001")
            .with_path(file)
            .with_location(location)
    }
}

/// Locate a `line:column` pair in a compiler diagnostic. Understands the
/// `--> L:C` marker of template parse errors and the `L:C  root stylesheet`
/// trailer of Sass diagnostics.
pub fn scan_location(message: &str) -> Option<SourceLocation> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [r"-->\s*(\d+):(\d+)", r"(\d+):(\d+)\s+root stylesheet"]
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    });
    patterns.iter().find_map(|pattern| {
        let captures = pattern.captures(message)?;
        Some(SourceLocation {
            line: captures.get(1)?.as_str().parse().ok()?,
            column: captures.get(2)?.as_str().parse().ok()?,
        })
    })
}

/// Flatten an error and its source chain into one diagnostic string.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(source) = current {
        message.push('\n');
        message.push_str(&source.to_string());
        current = source.source();
    }
    message
}
