use super::{slash_path, SourceFile, StepOutcome, TransformResult, TransformStep};
use crate::core::compiler::TemplateCompiler;
use crate::core::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Renders the file through the template compiler with a shared context.
#[derive(Clone)]
pub struct RenderStep {
    compiler: Arc<dyn TemplateCompiler>,
    context: Arc<Value>,
}

impl RenderStep {
    pub fn new(compiler: Arc<dyn TemplateCompiler>, context: Arc<Value>) -> Self {
        Self { compiler, context }
    }
}

#[async_trait]
impl TransformStep for RenderStep {
    fn name(&self) -> &'static str {
        "render"
    }

    async fn apply(&self, file: &SourceFile) -> Result<StepOutcome, AppError> {
        let name = slash_path(file.relative());
        let rendered = self
            .compiler
            .render(&name, file.text()?, &self.context)
            .await
            .map_err(|err| err.into_app_error(file.path()))?;
        Ok(StepOutcome::Emit(TransformResult::new(rendered)))
    }
}
