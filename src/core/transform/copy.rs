use super::{SourceFile, StepOutcome, TransformResult, TransformStep};
use crate::core::error::AppError;
use async_trait::async_trait;

/// Passes content through unchanged. Used for static assets.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyStep;

#[async_trait]
impl TransformStep for CopyStep {
    fn name(&self) -> &'static str {
        "copy"
    }

    async fn apply(&self, file: &SourceFile) -> Result<StepOutcome, AppError> {
        Ok(StepOutcome::Emit(TransformResult::new(file.contents().to_vec())))
    }
}
