use super::{CompilerError, StylesheetCompiler};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// In-process Sass compiler.
#[derive(Debug, Clone, Default)]
pub struct GrassCompiler {
    load_paths: Vec<PathBuf>,
}

impl GrassCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extra directory searched by `@use` / `@import`.
    pub fn with_load_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.load_paths.push(path.into());
        self
    }

    fn compile_blocking(&self, source: String, origin: &Path) -> Result<String, CompilerError> {
        let mut options = grass::Options::default();
        if let Some(parent) = origin.parent() {
            options = options.load_path(parent);
        }
        for path in &self.load_paths {
            options = options.load_path(path);
        }
        grass::from_string(source, &options).map_err(|err| CompilerError::syntax(err.to_string()))
    }
}

#[async_trait]
impl StylesheetCompiler for GrassCompiler {
    fn name(&self) -> &'static str {
        "grass"
    }

    async fn compile(&self, source: &str, origin: &Path) -> Result<String, CompilerError> {
        let compiler = self.clone();
        let source = source.to_string();
        let origin = origin.to_path_buf();
        tokio::task::spawn_blocking(move || compiler.compile_blocking(source, &origin))
            .await
            .map_err(|err| CompilerError::Join(err.to_string()))?
    }
}
