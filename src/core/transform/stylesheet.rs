use super::{SourceFile, StepOutcome, TransformResult, TransformStep};
use crate::core::compiler::StylesheetCompiler;
use crate::core::error::AppError;
use async_trait::async_trait;
use std::sync::Arc;

/// Compiles stylesheet sources to `.css`. Partials (`_name.scss`) are only
/// meant to be imported and produce no output of their own.
#[derive(Clone)]
pub struct StylesheetStep {
    compiler: Arc<dyn StylesheetCompiler>,
}

impl StylesheetStep {
    pub fn new(compiler: Arc<dyn StylesheetCompiler>) -> Self {
        Self { compiler }
    }
}

#[async_trait]
impl TransformStep for StylesheetStep {
    fn name(&self) -> &'static str {
        "stylesheet"
    }

    async fn apply(&self, file: &SourceFile) -> Result<StepOutcome, AppError> {
        let is_partial = file
            .relative()
            .file_name()
            .map(|name| name.to_string_lossy().starts_with('_'))
            .unwrap_or(false);
        if is_partial {
            return Ok(StepOutcome::Skip);
        }

        let css = self
            .compiler
            .compile(file.text()?, file.path())
            .await
            .map_err(|err| err.into_app_error(file.path()))?;
        let mut relative = file.relative().to_path_buf();
        relative.set_extension("css");
        Ok(StepOutcome::Emit(TransformResult::renamed(css, relative)))
    }
}
