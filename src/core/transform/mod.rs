//! Per-file transform steps.

#![allow(clippy::result_large_err)] // Steps return AppError so per-file failures keep their diagnostics.

use crate::core::error::AppError;
use crate::core::matcher::MatchedFile;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

mod copy;
mod rename;
mod render;
mod replace;
mod stylesheet;

pub use copy::CopyStep;
pub use rename::RenameStep;
pub use render::RenderStep;
pub use replace::ReplaceStep;
pub use stylesheet::StylesheetStep;

/// A file flowing through a pipeline. Immutable: steps produce new values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    path: PathBuf,
    relative: PathBuf,
    contents: Vec<u8>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, relative: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            relative: relative.into(),
            contents,
        }
    }

    /// Read a matched file from disk.
    pub async fn read(matched: &MatchedFile) -> Result<Self, AppError> {
        let contents = tokio::fs::read(&matched.path)
            .await
            .map_err(|err| AppError::filesystem("read", &matched.path, err).with_code("BLD-FS-001"))?;
        Ok(Self::new(
            matched.path.clone(),
            matched.relative.clone(),
            contents,
        ))
    }

    /// Absolute path of the file this value originated from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Output placement, relative to the destination directory.
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Contents as UTF-8 text; text steps fail on binary input.
    pub fn text(&self) -> Result<&str, AppError> {
        std::str::from_utf8(&self.contents).map_err(|err| {
            AppError::new(
                ErrorCategory::CompileError,
                format!("{} is not valid UTF-8: {}", self.path.display(), err),
            )
            .with_code("BLD-STEP-001")
            .with_path(&self.path)
        })
    }

    /// Produce the file that results from applying a step's output.
    pub fn apply(self, result: TransformResult) -> SourceFile {
        SourceFile {
            path: self.path,
            relative: result.relative.unwrap_or(self.relative),
            contents: result.contents,
        }
    }
}

/// Output of a transform step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    pub contents: Vec<u8>,
    /// New output placement; `None` keeps the incoming relative path.
    pub relative: Option<PathBuf>,
}

impl TransformResult {
    pub fn new(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: contents.into(),
            relative: None,
        }
    }

    pub fn renamed(contents: impl Into<Vec<u8>>, relative: impl Into<PathBuf>) -> Self {
        Self {
            contents: contents.into(),
            relative: Some(relative.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Emit(TransformResult),
    /// The file produces no output; later steps are not applied.
    Skip,
}

/// Trait implemented by pipeline steps.
#[async_trait]
pub trait TransformStep: Send + Sync + 'static {
    /// Step name used in logs.
    fn name(&self) -> &'static str;

    /// Transform a single file.
    async fn apply(&self, file: &SourceFile) -> Result<StepOutcome, AppError>;
}

/// Relative path rendered with `/` separators, used as a stable file name
/// for compilers and logs.
pub(crate) fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
