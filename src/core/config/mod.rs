pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Project configuration loaded from mailsmith.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BuildConfig {
    /// Source and output directory layout
    #[serde(default)]
    pub paths: PathsConfig,

    /// Pipeline execution settings
    #[serde(default)]
    pub build: BuildSettings,

    /// Stylesheet compiler selection
    #[serde(default)]
    pub stylesheet: StylesheetConfig,

    /// Cross-reference rewrite rules applied to templates
    #[serde(default)]
    pub rewrite: RewriteConfig,

    /// Watch mode configuration
    #[serde(default)]
    pub watch: WatchConfig,

    /// Preview server configuration
    #[serde(default)]
    pub preview: PreviewConfig,

    /// User-declared composite tasks
    #[serde(default)]
    pub tasks: IndexMap<String, TaskDecl>,
}

/// Source tree and output target layout, relative to the project root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_sass_dir")]
    pub sass: PathBuf,
    #[serde(default = "default_styles_dir")]
    pub styles: PathBuf,
    #[serde(default = "default_components_dir")]
    pub components: PathBuf,
    #[serde(default = "default_emails_dir")]
    pub emails: PathBuf,
    #[serde(default = "default_images_dir")]
    pub images: PathBuf,
    #[serde(default = "default_views_dir")]
    pub views: PathBuf,
    #[serde(default = "default_dist_dir")]
    pub dist: PathBuf,
    /// Mock data injected into every template render
    #[serde(default = "default_context_file")]
    pub context_file: PathBuf,
    /// Extension of template sources, without the leading dot
    #[serde(default = "default_template_extension")]
    pub template_extension: String,
}

/// Pipeline execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Maximum number of files processed concurrently inside one pipeline
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Optional per-step timeout, e.g. "30s"
    #[serde(
        default,
        with = "optional_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub step_timeout: Option<Duration>,
}

/// Stylesheet compiler selection
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StylesheetConfig {
    /// External compiler command reading SCSS on stdin and writing CSS on stdout.
    /// The in-process compiler is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// A single find/replace rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewriteRule {
    pub pattern: String,
    pub replacement: String,
    /// Treat `pattern` as literal text instead of a regular expression
    #[serde(default)]
    pub literal: bool,
    #[serde(default)]
    pub case_insensitive: bool,
}

/// Rewrite rules used by the template pipelines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// Remaps stylesheet-source references to compiled stylesheet references
    #[serde(default = "default_stylesheet_rule")]
    pub stylesheet: RewriteRule,
    /// Flattens upward-relative references for templates moved one level up
    #[serde(default = "default_relative_rule")]
    pub relative: RewriteRule,
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Include and `!`-prefixed exclude patterns, relative to the project root
    #[serde(default = "default_watch_patterns")]
    pub patterns: Vec<String>,
    /// Task re-run on every change
    #[serde(default = "default_watch_task")]
    pub task: String,
    #[serde(default = "default_debounce", with = "duration")]
    pub debounce: Duration,
}

/// Preview server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served by the preview server
    #[serde(default = "default_dist_dir")]
    pub base_dir: PathBuf,
    /// Delay between a finished rebuild and the browser reload signal
    #[serde(default = "default_reload_delay", with = "duration")]
    pub reload_delay: Duration,
}

/// Composite task declared in configuration. Exactly one of `series`
/// or `parallel` must be set.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TaskDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<Vec<String>>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sass: default_sass_dir(),
            styles: default_styles_dir(),
            components: default_components_dir(),
            emails: default_emails_dir(),
            images: default_images_dir(),
            views: default_views_dir(),
            dist: default_dist_dir(),
            context_file: default_context_file(),
            template_extension: default_template_extension(),
        }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            step_timeout: None,
        }
    }
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            stylesheet: default_stylesheet_rule(),
            relative: default_relative_rule(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            patterns: default_watch_patterns(),
            task: default_watch_task(),
            debounce: default_debounce(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            base_dir: default_dist_dir(),
            reload_delay: default_reload_delay(),
        }
    }
}

// Default functions
fn default_sass_dir() -> PathBuf {
    PathBuf::from("src/sass")
}

fn default_styles_dir() -> PathBuf {
    PathBuf::from("src/styles")
}

fn default_components_dir() -> PathBuf {
    PathBuf::from("src/components")
}

fn default_emails_dir() -> PathBuf {
    PathBuf::from("src/emails")
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("src/images")
}

fn default_views_dir() -> PathBuf {
    PathBuf::from("views")
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_context_file() -> PathBuf {
    PathBuf::from("src/mock.json")
}

fn default_template_extension() -> String {
    "tmpl".to_string()
}

fn default_concurrency() -> usize {
    16
}

fn default_stylesheet_rule() -> RewriteRule {
    RewriteRule {
        pattern: r#"/sass/([^"'()\s]+?)\.scss"#.to_string(),
        replacement: "/styles/${1}.css".to_string(),
        literal: false,
        case_insensitive: true,
    }
}

fn default_relative_rule() -> RewriteRule {
    RewriteRule {
        pattern: "../".to_string(),
        replacement: "./".to_string(),
        literal: true,
        case_insensitive: false,
    }
}

fn default_watch_patterns() -> Vec<String> {
    vec!["src/**/*".to_string(), "!src/**/*.css".to_string()]
}

fn default_watch_task() -> String {
    "rebuild".to_string()
}

fn default_debounce() -> Duration {
    Duration::from_millis(300)
}

fn default_port() -> u16 {
    8080
}

fn default_reload_delay() -> Duration {
    Duration::ZERO
}

/// Human readable durations ("300ms", "2s") in configuration files.
mod duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

mod optional_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => {
                serializer.serialize_str(&humantime::format_duration(*duration).to_string())
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|value| humantime::parse_duration(value.trim()).map_err(serde::de::Error::custom))
            .transpose()
    }
}
