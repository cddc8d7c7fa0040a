use mailsmith::core::config::{BuildConfig, ConfigLoader, ConfigValidator};
use mailsmith::core::types::ErrorCategory;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn clear_mailsmith_env() {
    for v in &[
        "MAILSMITH_PREVIEW_PORT",
        "MAILSMITH_WATCH_DEBOUNCE",
        "MAILSMITH_RELOAD_DELAY",
        "MAILSMITH_CONCURRENCY",
        "MAILSMITH_CONTEXT_FILE",
        "MAILSMITH_SASS_COMMAND",
    ] {
        env::remove_var(v);
    }
}

/// Full configuration file with every section set
#[test]
#[serial]
fn test_config_loading_integration() {
    clear_mailsmith_env();
    let temp_dir = TempDir::new().unwrap();

    let config_content = r#"
[paths]
emails = "templates/emails"
template_extension = "html.tera"
context_file = "data/mock.toml"

[build]
concurrency = 4
step_timeout = "30s"

[stylesheet]
command = "sass --stdin"

[rewrite.relative]
pattern = "../../"
replacement = "../"
literal = true

[watch]
patterns = ["templates/**/*", "!templates/**/*.css"]
task = "teste"
debounce = "1s"

[preview]
port = 3000
base_dir = "public"
reload_delay = "2s"

[tasks.release]
description = "full release build"
series = ["pb", "teste"]

[tasks.assets]
parallel = ["cpcss", "cpimages"]
"#;
    fs::write(temp_dir.path().join("mailsmith.toml"), config_content).unwrap();

    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();

    assert_eq!(config.paths.emails, PathBuf::from("templates/emails"));
    assert_eq!(config.paths.sass, PathBuf::from("src/sass"));
    assert_eq!(config.paths.template_extension, "html.tera");
    assert_eq!(config.build.concurrency, 4);
    assert_eq!(config.build.step_timeout, Some(Duration::from_secs(30)));
    assert_eq!(config.stylesheet.command.as_deref(), Some("sass --stdin"));
    assert_eq!(config.rewrite.relative.pattern, "../../");
    assert!(config.rewrite.stylesheet.case_insensitive);
    assert_eq!(config.watch.task, "teste");
    assert_eq!(config.watch.debounce, Duration::from_secs(1));
    assert_eq!(config.preview.port, 3000);
    assert_eq!(config.preview.base_dir, PathBuf::from("public"));
    assert_eq!(config.preview.reload_delay, Duration::from_secs(2));

    let names: Vec<&String> = config.tasks.keys().collect();
    assert_eq!(names, vec!["release", "assets"]);
    assert_eq!(
        config.tasks["release"].series,
        Some(vec!["pb".to_string(), "teste".to_string()])
    );
    ConfigValidator::validate(&config).unwrap();
}

#[test]
#[serial]
fn test_environment_overrides() {
    clear_mailsmith_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("mailsmith.toml"),
        "[build]\nconcurrency = 2\n[preview]\nreload_delay = \"1s\"\n",
    )
    .unwrap();

    env::set_var("MAILSMITH_CONCURRENCY", "8");
    env::set_var("MAILSMITH_RELOAD_DELAY", "250ms");
    env::set_var("MAILSMITH_CONTEXT_FILE", "fixtures/data.json");
    env::set_var("MAILSMITH_SASS_COMMAND", "dart-sass --stdin");
    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    clear_mailsmith_env();

    assert_eq!(config.build.concurrency, 8);
    assert_eq!(config.preview.reload_delay, Duration::from_millis(250));
    assert_eq!(config.paths.context_file, PathBuf::from("fixtures/data.json"));
    assert_eq!(config.stylesheet.command.as_deref(), Some("dart-sass --stdin"));
}

#[test]
#[serial]
fn test_malformed_file_is_config_error() {
    clear_mailsmith_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("mailsmith.toml"), "[preview\nport = 1").unwrap();

    let err = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap_err();
    assert_eq!(err.category, ErrorCategory::ConfigError);
    assert_eq!(err.code, "BLD-CONFIG-002");
}

#[test]
#[serial]
fn test_bad_duration_is_config_error() {
    clear_mailsmith_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("mailsmith.toml"),
        "[watch]\ndebounce = \"soon\"\n",
    )
    .unwrap();

    let err = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap_err();
    assert!(err.is_config());
}

#[test]
#[serial]
fn test_explicit_config_path() {
    clear_mailsmith_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ci.toml");
    fs::write(&path, "[preview]\nport = 9000\n").unwrap();

    let config = ConfigLoader::load_explicit(&path).unwrap();
    assert_eq!(config.preview.port, 9000);
}

#[test]
fn test_validation_rejects_zero_concurrency() {
    let mut config = BuildConfig::default();
    config.build.concurrency = 0;
    assert_eq!(
        ConfigValidator::validate(&config).unwrap_err().code,
        "BLD-CONFIG-010"
    );
}

#[test]
#[serial]
fn test_preview_port_zero_is_accepted() {
    clear_mailsmith_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("mailsmith.toml"), "[preview]\nport = 0\n").unwrap();

    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    assert_eq!(config.preview.port, 0);
    ConfigValidator::validate(&config).unwrap();
}

#[test]
fn test_validation_rejects_bad_rewrite_regex() {
    let mut config = BuildConfig::default();
    config.rewrite.stylesheet.pattern = "/sass/(".to_string();
    assert!(ConfigValidator::validate(&config).unwrap_err().is_config());
}

#[test]
fn test_validation_rejects_ambiguous_task() {
    let config: BuildConfig =
        toml::from_str("[tasks.both]\nseries = [\"sass\"]\nparallel = [\"cpcss\"]\n").unwrap();
    assert_eq!(
        ConfigValidator::validate(&config).unwrap_err().code,
        "BLD-CONFIG-014"
    );
}
