//! Explicitly constructed build environment: project root, configuration,
//! render context and compilers. Passed to everything that needs them.

#![allow(clippy::result_large_err)]

use crate::core::compiler::{
    CommandCompiler, GrassCompiler, PartialSource, StylesheetCompiler, TemplateCompiler,
    TeraCompiler,
};
use crate::core::config::{BuildConfig, ConfigValidator};
use crate::core::error::AppError;
use crate::core::pipeline::PipelineOptions;
use crate::core::types::ErrorCategory;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct BuildEnvironment {
    root: PathBuf,
    config: Arc<BuildConfig>,
    context: Arc<Value>,
    templates: Arc<dyn TemplateCompiler>,
    stylesheets: Arc<dyn StylesheetCompiler>,
}

impl BuildEnvironment {
    /// Validate the configuration, load the render context and select the
    /// compilers.
    pub fn new(root: impl Into<PathBuf>, config: BuildConfig) -> Result<Self, AppError> {
        let root = root.into();
        if !root.is_dir() {
            let err = std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "not an existing directory",
            );
            return Err(AppError::filesystem("open project root", &root, err).with_code("BLD-FS-004"));
        }
        ConfigValidator::validate(&config)?;

        let context = load_context(&root.join(&config.paths.context_file))?;
        let templates = default_template_compiler(&root, &config);
        let stylesheets = stylesheet_compiler(&root, &config)?;
        tracing::debug!(
            root = %root.display(),
            templates = templates.name(),
            stylesheets = stylesheets.name(),
            "build environment ready"
        );

        Ok(Self {
            root,
            config: Arc::new(config),
            context: Arc::new(context),
            templates,
            stylesheets,
        })
    }

    pub fn with_stylesheet_compiler(mut self, compiler: Arc<dyn StylesheetCompiler>) -> Self {
        self.stylesheets = compiler;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn context(&self) -> Arc<Value> {
        Arc::clone(&self.context)
    }

    pub fn templates(&self) -> Arc<dyn TemplateCompiler> {
        Arc::clone(&self.templates)
    }

    pub fn stylesheets(&self) -> Arc<dyn StylesheetCompiler> {
        Arc::clone(&self.stylesheets)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            concurrency: self.config.build.concurrency,
            step_timeout: self.config.build.step_timeout,
        }
    }
}

/// Load the render context. A missing file yields an empty mapping so
/// projects without mock data still build.
pub fn load_context(path: &Path) -> Result<Value, AppError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no context file, rendering with empty context");
        return Ok(Value::Object(Default::default()));
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|err| AppError::filesystem("read context file", path, err).with_code("BLD-CTX-001"))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    let value = if is_toml {
        let parsed: toml::Value = toml::from_str(&raw).map_err(|err| context_error(path, err))?;
        serde_json::to_value(parsed).map_err(|err| context_error(path, err))?
    } else {
        serde_json::from_str(&raw).map_err(|err| context_error(path, err))?
    };

    if !value.is_object() {
        return Err(AppError::config(format!(
            "context file {} must contain a mapping at the top level",
            path.display()
        ))
        .with_code("BLD-CTX-002")
        .with_path(path));
    }
    Ok(value)
}

fn context_error(path: &Path, err: impl std::fmt::Display) -> AppError {
    AppError::new(
        ErrorCategory::ConfigError,
        format!("failed to parse context file {}: {}", path.display(), err),
    )
    .with_code("BLD-CTX-002")
    .with_path(path)
}

/// Component templates are registered as partials named by their path from
/// the components directory's parent, e.g. `components/footer.tmpl`.
fn default_template_compiler(root: &Path, config: &BuildConfig) -> Arc<dyn TemplateCompiler> {
    let components = &config.paths.components;
    let parent = components.parent().unwrap_or_else(|| Path::new(""));
    let dir_name = components
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let pattern = format!("{}/**/*.{}", dir_name, config.paths.template_extension);
    Arc::new(TeraCompiler::new().with_partials(PartialSource {
        root: root.join(parent),
        pattern,
    }))
}

fn stylesheet_compiler(
    root: &Path,
    config: &BuildConfig,
) -> Result<Arc<dyn StylesheetCompiler>, AppError> {
    match config.stylesheet.command.as_deref() {
        Some(command_line) => {
            let compiler = CommandCompiler::parse(command_line).ok_or_else(|| {
                AppError::config("stylesheet.command must not be empty").with_code("BLD-CONFIG-016")
            })?;
            Ok(Arc::new(compiler))
        }
        None => Ok(Arc::new(
            GrassCompiler::new().with_load_path(root.join(&config.paths.sass)),
        )),
    }
}
