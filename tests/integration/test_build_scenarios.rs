use async_trait::async_trait;
use mailsmith::cli::commands::load_task_graph;
use mailsmith::core::compiler::{CompilerError, StylesheetCompiler};
use mailsmith::core::config::{BuildConfig, ConfigLoader};
use mailsmith::core::environment::BuildEnvironment;
use mailsmith::core::tasks::builtin;
use mailsmith::core::types::{BuildStatus, ErrorCategory};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const WELCOME: &str = r#"<html>
<head><link rel="stylesheet" href="../sass/theme.scss"></head>
<body>{% include "components/header.tmpl" %}<p>Hello {{ user.name }}</p></body>
</html>
"#;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Minimal project using the default layout.
fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "src/sass/_colors.scss", "$brand: #ff0000;\n");
    write(
        root,
        "src/sass/theme.scss",
        "@import \"colors\";\nbody { color: $brand; }\n",
    );
    write(root, "src/components/header.tmpl", "<header>Acme</header>");
    write(
        root,
        "src/components/banner.tmpl",
        "<link href=\"/sass/banner.scss\">",
    );
    write(root, "src/emails/welcome.tmpl", WELCOME);
    write(root, "src/images/logo.svg", "<svg/>");
    write(root, "src/images/photo.jpeg", "jpeg");
    write(root, "src/images/.keep", "");
    write(root, "src/mock.json", r#"{"user": {"name": "Ada"}}"#);
    temp
}

async fn run(root: &Path, task: &str) -> mailsmith::core::BuildSummary {
    let config = ConfigLoader::load_from_workspace(root).unwrap();
    let env = BuildEnvironment::new(root, config).unwrap();
    let graph = load_task_graph(&env).unwrap();
    graph.run(task, env.root(), &env.pipeline_options()).await.unwrap()
}

#[tokio::test]
async fn test_pb_builds_views() {
    let temp = project();
    let root = temp.path();

    let summary = run(root, builtin::PB).await;
    assert!(summary.is_success(), "{:?}", summary);

    let css = fs::read_to_string(root.join("src/styles/theme.css")).unwrap();
    assert!(css.contains("#ff0000"));
    assert!(!root.join("src/styles/_colors.css").exists());
    assert!(root.join("views/styles/theme.css").exists());

    let banner = fs::read_to_string(root.join("views/components/banner.tmpl")).unwrap();
    assert_eq!(banner, "<link href=\"/styles/banner.css\">");

    let html = fs::read_to_string(root.join("views/welcome.html")).unwrap();
    assert!(html.contains("./styles/theme.css"), "{}", html);
    assert!(!html.contains(".scss"), "{}", html);
    assert!(html.contains("Hello Ada"));
    assert!(html.contains("<header>Acme</header>"));

    assert!(root.join("views/images/logo.svg").exists());
    assert!(root.join("views/images/.keep").exists());
}

#[tokio::test]
async fn test_pb_is_idempotent() {
    let temp = project();
    let root = temp.path();

    run(root, builtin::PB).await;
    let first = fs::read(root.join("views/welcome.html")).unwrap();
    let first_css = fs::read(root.join("views/styles/theme.css")).unwrap();

    let summary = run(root, builtin::PB).await;
    assert!(summary.is_success());
    assert_eq!(fs::read(root.join("views/welcome.html")).unwrap(), first);
    assert_eq!(fs::read(root.join("views/styles/theme.css")).unwrap(), first_css);
}

#[tokio::test]
async fn test_teste_builds_flat_dist() {
    let temp = project();
    let root = temp.path();
    write(root, "src/emails/promo/spring.tmpl", "<p>{{ user.name }}</p>");

    let summary = run(root, builtin::TESTE).await;
    assert!(summary.is_success());

    let html = fs::read_to_string(root.join("dist/welcome.html")).unwrap();
    assert!(html.contains("../styles/theme.css"));
    assert!(!html.contains(".scss"));
    assert_eq!(
        fs::read_to_string(root.join("dist/spring.html")).unwrap(),
        "<p>Ada</p>"
    );
    assert!(!root.join("dist/promo").exists());
}

#[tokio::test]
async fn test_rebuild_copies_dist_images() {
    let temp = project();
    let root = temp.path();

    let summary = run(root, builtin::REBUILD).await;
    assert!(summary.is_success());
    assert!(root.join("dist/images/logo.svg").exists());
    assert!(root.join("dist/images/photo.jpeg").exists());
    assert!(!root.join("dist/images/.keep").exists());
}

#[tokio::test]
async fn test_template_error_is_partial_failure() {
    let temp = project();
    let root = temp.path();
    write(root, "src/emails/broken.tmpl", "<p>\n{{ user.name </p>");

    let summary = run(root, builtin::TESTE).await;
    assert_eq!(summary.status(), BuildStatus::PartialFailure);

    let report = summary.report(builtin::BUILD).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].source.ends_with("src/emails/broken.tmpl"));
    assert_eq!(
        report.failures[0].error.category,
        ErrorCategory::CompileError
    );
    assert!(root.join("dist/welcome.html").exists());
    assert!(!root.join("dist/broken.html").exists());
}

#[tokio::test]
async fn test_stylesheet_error_stops_series() {
    let temp = project();
    let root = temp.path();
    write(root, "src/sass/broken.scss", "a { color: ; ");

    let summary = run(root, builtin::TESTE).await;
    assert_eq!(summary.status(), BuildStatus::PartialFailure);
    assert!(summary.report(builtin::SASS).is_some());
    assert!(summary.report(builtin::BUILD).is_none());
}

#[tokio::test]
async fn test_declared_task_from_config() {
    let temp = project();
    let root = temp.path();
    write(
        root,
        "mailsmith.toml",
        "[tasks.assets]\nparallel = [\"cpcss\", \"cpimages\"]\n",
    );

    let summary = run(root, "assets").await;
    assert!(summary.is_success());
    assert!(root.join("views/images/logo.svg").exists());
}

/// Wraps compiled output in a marker comment.
struct MarkingCompiler;

#[async_trait]
impl StylesheetCompiler for MarkingCompiler {
    fn name(&self) -> &'static str {
        "marking"
    }

    async fn compile(&self, source: &str, _origin: &Path) -> Result<String, CompilerError> {
        Ok(format!("/* marked */\n{}", source))
    }
}

#[tokio::test]
async fn test_builtins_use_environment_stylesheet_compiler() {
    let temp = project();
    let root = temp.path();
    write(root, "src/sass/plain.scss", "p { margin: 0; }");

    let env = BuildEnvironment::new(root, BuildConfig::default())
        .unwrap()
        .with_stylesheet_compiler(Arc::new(MarkingCompiler));
    let graph = load_task_graph(&env).unwrap();
    let summary = graph
        .run(builtin::SASS, env.root(), &env.pipeline_options())
        .await
        .unwrap();

    assert!(summary.is_success());
    assert_eq!(
        fs::read_to_string(root.join("src/styles/plain.css")).unwrap(),
        "/* marked */\np { margin: 0; }"
    );
}

#[test]
fn test_missing_context_file_uses_empty_context() {
    let temp = TempDir::new().unwrap();
    let env = BuildEnvironment::new(temp.path(), BuildConfig::default()).unwrap();
    assert_eq!(*env.context(), serde_json::json!({}));
}
