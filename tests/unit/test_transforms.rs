use async_trait::async_trait;
use mailsmith::core::compiler::{CompilerError, StylesheetCompiler, TeraCompiler};
use mailsmith::core::config::RewriteConfig;
use mailsmith::core::transform::{
    CopyStep, RenameStep, RenderStep, ReplaceStep, SourceFile, StepOutcome, StylesheetStep,
    TransformStep,
};
use mailsmith::core::types::{ErrorCategory, SourceLocation};
use regex::Regex;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

fn file(relative: &str, contents: &str) -> SourceFile {
    SourceFile::new(
        Path::new("/project/src").join(relative),
        relative,
        contents.as_bytes().to_vec(),
    )
}

fn emitted(outcome: StepOutcome) -> (Vec<u8>, Option<std::path::PathBuf>) {
    match outcome {
        StepOutcome::Emit(result) => (result.contents, result.relative),
        StepOutcome::Skip => panic!("expected output"),
    }
}

/// Upper-cases its input; fails on the text `boom`.
struct ShoutCompiler;

#[async_trait]
impl StylesheetCompiler for ShoutCompiler {
    fn name(&self) -> &'static str {
        "shout"
    }

    async fn compile(&self, source: &str, _origin: &Path) -> Result<String, CompilerError> {
        if source.contains("boom") {
            return Err(CompilerError::syntax("unexpected boom\n  4:2  root stylesheet"));
        }
        Ok(source.to_uppercase())
    }
}

#[tokio::test]
async fn test_stylesheet_rewrite_counts_every_reference() {
    let step = ReplaceStep::from_rule(&RewriteConfig::default().stylesheet).unwrap();
    let source = r#"<link href="../sass/theme.scss"><link href="../SASS/email/reset.SCSS"><link href='/sass/print.scss'>"#;

    let (contents, relative) = emitted(step.apply(&file("emails/welcome.tmpl", source)).await.unwrap());
    let output = String::from_utf8(contents).unwrap();

    assert!(relative.is_none());
    assert_eq!(Regex::new(r"(?i)\.scss").unwrap().find_iter(&output).count(), 0);
    assert_eq!(output.matches("/styles/").count(), 3);
    assert!(output.contains("../styles/theme.css"));
    assert!(output.contains("../styles/email/reset.css"));
    assert!(output.contains("'/styles/print.css'"));
}

#[tokio::test]
async fn test_relative_rewrite_is_literal() {
    let step = ReplaceStep::from_rule(&RewriteConfig::default().relative).unwrap();
    let (contents, _) = emitted(
        step.apply(&file("emails/a.tmpl", "<img src=\"../images/a.png\"> ..x"))
            .await
            .unwrap(),
    );
    assert_eq!(contents, b"<img src=\"./images/a.png\"> ..x");
}

#[tokio::test]
async fn test_regex_rewrite_expands_captures() {
    let step = ReplaceStep::new(r"\{\{\s*(\w+)\s*\}\}", "[$1]").unwrap();
    let (contents, _) = emitted(
        step.apply(&file("emails/a.tmpl", "Hi {{ name }}, {{code}}"))
            .await
            .unwrap(),
    );
    assert_eq!(contents, b"Hi [name], [code]");
}

#[tokio::test]
async fn test_replace_rejects_binary_content() {
    let step = ReplaceStep::literal("a", "b").unwrap();
    let binary = SourceFile::new("/p/img.png", "img.png", vec![0xff, 0x00, 0xfe]);
    let err = step.apply(&binary).await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::CompileError);
}

#[tokio::test]
async fn test_flatten_keeps_content() {
    let step = RenameStep::flatten();
    let (contents, relative) = emitted(step.apply(&file("a/b/c.ext", "payload")).await.unwrap());
    assert_eq!(contents, b"payload");
    assert_eq!(relative.unwrap(), Path::new("c.ext"));
}

#[tokio::test]
async fn test_copy_is_identity() {
    let (contents, relative) = emitted(CopyStep.apply(&file("images/logo.svg", "<svg/>")).await.unwrap());
    assert_eq!(contents, b"<svg/>");
    assert!(relative.is_none());
}

#[tokio::test]
async fn test_stylesheet_step_renames_to_css() {
    let step = StylesheetStep::new(Arc::new(ShoutCompiler));
    let (contents, relative) = emitted(step.apply(&file("email/theme.scss", "a{}")).await.unwrap());
    assert_eq!(contents, b"A{}");
    assert_eq!(relative.unwrap(), Path::new("email/theme.css"));
}

#[tokio::test]
async fn test_stylesheet_step_skips_partials() {
    let step = StylesheetStep::new(Arc::new(ShoutCompiler));
    let outcome = step.apply(&file("email/_vars.scss", "$a: 1;")).await.unwrap();
    assert_eq!(outcome, StepOutcome::Skip);
}

#[tokio::test]
async fn test_stylesheet_failure_carries_location() {
    let step = StylesheetStep::new(Arc::new(ShoutCompiler));
    let err = step.apply(&file("theme.scss", "boom")).await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::CompileError);
    assert_eq!(err.location, Some(SourceLocation { line: 4, column: 2 }));
    assert!(err.message.contains("unexpected boom"));
}

#[tokio::test]
async fn test_render_binds_context() {
    let step = RenderStep::new(
        Arc::new(TeraCompiler::new()),
        Arc::new(json!({"customer": {"name": "Ada"}})),
    );
    let (contents, _) = emitted(
        step.apply(&file("emails/welcome.tmpl", "<p>Hello {{ customer.name }}</p>"))
            .await
            .unwrap(),
    );
    assert_eq!(contents, b"<p>Hello Ada</p>");
}

#[tokio::test]
async fn test_render_failure_is_compile_error() {
    let step = RenderStep::new(Arc::new(TeraCompiler::new()), Arc::new(json!({})));
    let err = step
        .apply(&file("emails/broken.tmpl", "<p>\n{% if %}\n</p>"))
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::CompileError);
    assert_eq!(err.location.map(|l| l.line), Some(2));
    assert_eq!(
        err.context.get("path").map(String::as_str),
        Some("/project/src/emails/broken.tmpl")
    );
}
