use super::{error_chain, CompilerError, TemplateCompiler};
use crate::core::matcher;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tera::{Context, Tera};

const PAGE_PREFIX: &str = "__page__/";

/// Directory of templates made available to `{% include %}` and
/// `{% extends %}`. Templates are registered under their path relative to
/// `root`, e.g. `components/header.tmpl`.
#[derive(Debug, Clone)]
pub struct PartialSource {
    pub root: PathBuf,
    pub pattern: String,
}

/// Template compiler backed by Tera.
///
/// Partials are re-read on every render so long-running watch sessions see
/// edits to included components.
#[derive(Debug, Clone, Default)]
pub struct TeraCompiler {
    partials: Vec<PartialSource>,
}

impl TeraCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partials(mut self, source: PartialSource) -> Self {
        self.partials.push(source);
        self
    }

    fn load_partials(&self) -> Result<Vec<(String, String)>, CompilerError> {
        let mut templates = Vec::new();
        for source in &self.partials {
            if !source.root.is_dir() {
                continue;
            }
            let files = matcher::resolve(&source.root, [source.pattern.as_str()])
                .map_err(|err| CompilerError::syntax(err.to_string()))?;
            for file in files {
                let name = file
                    .path
                    .strip_prefix(&source.root)
                    .unwrap_or(&file.relative)
                    .to_string_lossy()
                    .replace('\\', "/");
                let content = std::fs::read_to_string(&file.path).map_err(|err| {
                    CompilerError::syntax(format!(
                        "failed to read partial {}: {}",
                        file.path.display(),
                        err
                    ))
                })?;
                templates.push((name, content));
            }
        }
        Ok(templates)
    }

    fn render_blocking(
        &self,
        name: &str,
        source: &str,
        context: &Value,
    ) -> Result<String, CompilerError> {
        let mut tera = Tera::default();
        let mut templates = self.load_partials()?;
        // Pages live in their own namespace so they never shadow a partial.
        let page = format!("{}{}", PAGE_PREFIX, name);
        templates.push((page.clone(), source.to_string()));
        tera.add_raw_templates(templates)
            .map_err(|err| CompilerError::syntax(error_chain(&err)))?;
        let context =
            Context::from_value(context.clone()).map_err(|err| CompilerError::syntax(error_chain(&err)))?;
        tera.render(&page, &context)
            .map_err(|err| CompilerError::syntax(error_chain(&err)))
    }
}

#[async_trait]
impl TemplateCompiler for TeraCompiler {
    fn name(&self) -> &'static str {
        "tera"
    }

    async fn render(
        &self,
        name: &str,
        source: &str,
        context: &Value,
    ) -> Result<String, CompilerError> {
        let compiler = self.clone();
        let name = name.to_string();
        let source = source.to_string();
        let context = context.clone();
        tokio::task::spawn_blocking(move || compiler.render_blocking(&name, &source, &context))
            .await
            .map_err(|err| CompilerError::Join(err.to_string()))?
    }
}
