use super::{SourceFile, StepOutcome, TransformResult, TransformStep};
use crate::core::error::AppError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Rewrites the output placement of a file without touching its content.
#[derive(Debug, Clone, Default)]
pub struct RenameStep {
    dirname: Option<PathBuf>,
    extension: Option<String>,
}

impl RenameStep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every directory segment: `a/b/c.ext` becomes `c.ext`.
    pub fn flatten() -> Self {
        Self::new().with_dirname("")
    }

    /// Replace the directory part of the relative path.
    pub fn with_dirname(mut self, dirname: impl Into<PathBuf>) -> Self {
        self.dirname = Some(dirname.into());
        self
    }

    /// Replace the extension (given without the leading dot).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn rename(&self, relative: &Path) -> PathBuf {
        let mut renamed = match (&self.dirname, relative.file_name()) {
            (Some(dirname), Some(file_name)) => dirname.join(file_name),
            _ => relative.to_path_buf(),
        };
        if let Some(extension) = &self.extension {
            renamed.set_extension(extension.trim_start_matches('.'));
        }
        renamed
    }
}

#[async_trait]
impl TransformStep for RenameStep {
    fn name(&self) -> &'static str {
        "rename"
    }

    async fn apply(&self, file: &SourceFile) -> Result<StepOutcome, AppError> {
        Ok(StepOutcome::Emit(TransformResult::renamed(
            file.contents().to_vec(),
            self.rename(file.relative()),
        )))
    }
}
