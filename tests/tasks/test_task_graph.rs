use async_trait::async_trait;
use indexmap::IndexMap;
use mailsmith::core::config::{BuildConfig, TaskDecl};
use mailsmith::core::environment::BuildEnvironment;
use mailsmith::core::error::AppError;
use mailsmith::core::pipeline::{PipelineOptions, PipelineSpec};
use mailsmith::core::tasks::{builtin, register_builtins, TaskGraph, TaskNode};
use mailsmith::core::transform::{CopyStep, SourceFile, StepOutcome, TransformStep};
use mailsmith::core::types::BuildStatus;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

struct AlwaysFail;

#[async_trait]
impl TransformStep for AlwaysFail {
    fn name(&self) -> &'static str {
        "always-fail"
    }

    async fn apply(&self, file: &SourceFile) -> Result<StepOutcome, AppError> {
        Err(AppError::compile("nope").with_path(file.path()))
    }
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// `failing` fails on its only file; `working` copies `b/x.txt` to `out/b/x.txt`.
fn fixture() -> (TempDir, mailsmith::core::TaskRegistryBuilder) {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a/x.txt", "a");
    write(temp.path(), "b/x.txt", "b");

    let builder = TaskGraph::builder()
        .register(
            "failing",
            TaskNode::pipeline(PipelineSpec::new("failing", ["a/*.txt"], "out/a").pipe(AlwaysFail)),
        )
        .register(
            "working",
            TaskNode::pipeline(PipelineSpec::new("working", ["b/*.txt"], "out/b").pipe(CopyStep)),
        );
    (temp, builder)
}

#[tokio::test]
async fn test_series_stops_after_failure() {
    let (temp, builder) = fixture();
    let graph = builder
        .register(
            "both",
            TaskNode::series([TaskNode::task("failing"), TaskNode::task("working")]),
        )
        .build()
        .unwrap();

    let summary = graph
        .run("both", temp.path(), &PipelineOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.status(), BuildStatus::PartialFailure);
    assert!(summary.report("failing").is_some());
    assert!(summary.report("working").is_none());
    assert!(!temp.path().join("out/b/x.txt").exists());
}

#[tokio::test]
async fn test_parallel_runs_siblings_of_a_failure() {
    let (temp, builder) = fixture();
    let graph = builder
        .register(
            "both",
            TaskNode::parallel([TaskNode::task("failing"), TaskNode::task("working")]),
        )
        .build()
        .unwrap();

    let summary = graph
        .run("both", temp.path(), &PipelineOptions::default())
        .await
        .unwrap();

    assert!(!summary.is_success());
    assert_eq!(summary.failure_count(), 1);
    assert_eq!(summary.report("working").unwrap().written(), 1);
    assert_eq!(fs::read_to_string(temp.path().join("out/b/x.txt")).unwrap(), "b");
}

#[tokio::test]
async fn test_series_runs_in_order_when_successful() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "in/x.txt", "payload");

    // second stage reads what the first one wrote
    let graph = TaskGraph::builder()
        .register(
            "stage1",
            TaskNode::pipeline(PipelineSpec::new("stage1", ["in/*.txt"], "mid").pipe(CopyStep)),
        )
        .register(
            "stage2",
            TaskNode::pipeline(PipelineSpec::new("stage2", ["mid/*.txt"], "final").pipe(CopyStep)),
        )
        .register(
            "chain",
            TaskNode::series([TaskNode::task("stage1"), TaskNode::task("stage2")]),
        )
        .build()
        .unwrap();

    let summary = graph
        .run("chain", temp.path(), &PipelineOptions::default())
        .await
        .unwrap();
    assert!(summary.is_success());
    assert_eq!(summary.files_written(), 2);
    assert_eq!(
        fs::read_to_string(temp.path().join("final/x.txt")).unwrap(),
        "payload"
    );
}

#[tokio::test]
async fn test_declared_tasks_run_builtin_children() {
    let (temp, builder) = fixture();
    let mut declared = IndexMap::new();
    declared.insert(
        "only-working".to_string(),
        TaskDecl {
            description: Some("copy b".to_string()),
            series: Some(vec!["working".to_string()]),
            parallel: None,
        },
    );

    let graph = builder.register_declared(&declared).unwrap().build().unwrap();
    let info = graph
        .list()
        .into_iter()
        .find(|info| info.name == "only-working")
        .unwrap();
    assert_eq!(info.kind, "series");
    assert_eq!(info.description.as_deref(), Some("copy b"));

    let summary = graph
        .run("only-working", temp.path(), &PipelineOptions::default())
        .await
        .unwrap();
    assert!(summary.is_success());
}

#[test]
fn test_declared_cycle_is_rejected() {
    let mut declared = IndexMap::new();
    declared.insert(
        "a".to_string(),
        TaskDecl {
            series: Some(vec!["b".to_string()]),
            ..Default::default()
        },
    );
    declared.insert(
        "b".to_string(),
        TaskDecl {
            parallel: Some(vec!["a".to_string()]),
            ..Default::default()
        },
    );

    let err = TaskGraph::builder()
        .register_declared(&declared)
        .unwrap()
        .build()
        .unwrap_err();
    assert_eq!(err.code, "BLD-GRAPH-003");
    assert!(err.message.contains("a, b"));
}

#[test]
fn test_builtin_registry_is_valid() {
    let temp = TempDir::new().unwrap();
    let env = BuildEnvironment::new(temp.path(), BuildConfig::default()).unwrap();
    let graph = register_builtins(TaskGraph::builder(), &env)
        .unwrap()
        .build()
        .unwrap();

    for name in [
        builtin::SASS,
        builtin::PREBCP,
        builtin::CPCSS,
        builtin::CPIMAGES,
        builtin::CPIMAGESDIST,
        builtin::PREBUILD,
        builtin::BUILD,
        builtin::PB,
        builtin::TESTE,
        builtin::REBUILD,
    ] {
        assert!(graph.contains(name), "missing builtin {}", name);
    }

    let pb = graph
        .list()
        .into_iter()
        .find(|info| info.name == builtin::PB)
        .unwrap();
    assert_eq!(
        pb.depends_on,
        vec!["sass", "prebcp", "cpcss", "cpimages", "prebuild"]
    );
    let dot = graph.to_dot();
    assert!(dot.starts_with("digraph"));
}

#[tokio::test]
async fn test_builtins_on_empty_project_succeed() {
    let temp = TempDir::new().unwrap();
    let env = BuildEnvironment::new(temp.path(), BuildConfig::default()).unwrap();
    let graph = register_builtins(TaskGraph::builder(), &env)
        .unwrap()
        .build()
        .unwrap();

    let summary = graph
        .run(builtin::PB, env.root(), &env.pipeline_options())
        .await
        .unwrap();
    assert!(summary.is_success());
    assert_eq!(summary.files_written(), 0);
}
