//! Pipelines: a source glob, an ordered list of transform steps and a
//! destination directory.
//!
//! Every matched file flows through the steps independently. A failing file
//! is recorded in the [`PipelineReport`] and never aborts its siblings; only a
//! matcher failure makes the whole pipeline fail.

#![allow(clippy::result_large_err)] // Pipeline returns AppError so failures keep their diagnostics.

use crate::core::error::AppError;
use crate::core::matcher::{FileMatcher, MatchedFile, PatternSet};
use crate::core::transform::{slash_path, SourceFile, StepOutcome, TransformStep};
use crate::core::types::{BuildStatus, ErrorCategory};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Ordered step composition bound to a source glob and a destination.
#[derive(Clone)]
pub struct PipelineSpec {
    name: String,
    patterns: Vec<String>,
    dest: PathBuf,
    steps: Vec<Arc<dyn TransformStep>>,
}

impl PipelineSpec {
    pub fn new<I, S>(name: impl Into<String>, patterns: I, dest: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            patterns: patterns.into_iter().map(Into::into).collect(),
            dest: dest.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step; steps run in the order they are piped.
    pub fn pipe(mut self, step: impl TransformStep) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }
}

impl fmt::Debug for PipelineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineSpec")
            .field("name", &self.name)
            .field("patterns", &self.patterns)
            .field("dest", &self.dest)
            .field("steps", &self.step_names())
            .finish()
    }
}

/// Execution knobs shared by every pipeline of a run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub concurrency: usize,
    pub step_timeout: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: 16,
            step_timeout: None,
        }
    }
}

/// A file that could not be processed.
#[derive(Debug)]
pub struct FileFailure {
    pub source: PathBuf,
    pub error: AppError,
}

/// Aggregate of per-file outcomes for one pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    pub pipeline: String,
    pub matched: usize,
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
    pub elapsed: Duration,
}

impl PipelineReport {
    /// Number of files written to the destination.
    pub fn written(&self) -> usize {
        self.written.len()
    }

    pub fn status(&self) -> BuildStatus {
        if self.failures.is_empty() {
            BuildStatus::Succeeded
        } else {
            BuildStatus::PartialFailure
        }
    }
}

enum FileOutcome {
    Written(PathBuf),
    Skipped(PathBuf),
    Failed(FileFailure),
}

/// Run a pipeline against `root`. Relative patterns and destination are
/// resolved against `root`.
pub async fn run(
    spec: &PipelineSpec,
    root: &Path,
    options: &PipelineOptions,
) -> Result<PipelineReport, AppError> {
    let started = Instant::now();
    let files = match_files(spec, root).await?;
    let dest = root.join(&spec.dest);
    tracing::debug!(
        pipeline = %spec.name,
        matched = files.len(),
        dest = %dest.display(),
        "pipeline matched sources"
    );

    let matched = files.len();
    let concurrency = options.concurrency.max(1);
    let outcomes: Vec<FileOutcome> = stream::iter(files)
        .map(|file| process_file(spec, file, &dest, options))
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut report = PipelineReport {
        pipeline: spec.name.clone(),
        matched,
        written: Vec::new(),
        skipped: Vec::new(),
        failures: Vec::new(),
        elapsed: Duration::ZERO,
    };
    for outcome in outcomes {
        match outcome {
            FileOutcome::Written(path) => report.written.push(path),
            FileOutcome::Skipped(path) => report.skipped.push(path),
            FileOutcome::Failed(failure) => {
                tracing::error!(
                    pipeline = %spec.name,
                    file = %failure.source.display(),
                    code = %failure.error.code,
                    "{}",
                    failure.error.message
                );
                report.failures.push(failure);
            }
        }
    }
    report.written.sort();
    report.skipped.sort();
    report.failures.sort_by(|a, b| a.source.cmp(&b.source));
    report.elapsed = started.elapsed();

    tracing::info!(
        pipeline = %spec.name,
        matched = report.matched,
        written = report.written(),
        skipped = report.skipped.len(),
        failed = report.failures.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "pipeline finished"
    );
    Ok(report)
}

async fn match_files(spec: &PipelineSpec, root: &Path) -> Result<Vec<MatchedFile>, AppError> {
    let patterns = PatternSet::new(&spec.patterns)?;
    let matcher = FileMatcher::new(root, patterns);
    tokio::task::spawn_blocking(move || matcher.resolve())
        .await
        .map_err(|err| {
            AppError::new(
                ErrorCategory::InternalError,
                format!("file matcher task failed: {}", err),
            )
            .with_code("BLD-PIPE-001")
        })?
}

async fn process_file(
    spec: &PipelineSpec,
    matched: MatchedFile,
    dest: &Path,
    options: &PipelineOptions,
) -> FileOutcome {
    let origin = matched.path.clone();
    match transform_and_write(spec, &matched, dest, options).await {
        Ok(Some(written)) => FileOutcome::Written(written),
        Ok(None) => FileOutcome::Skipped(origin),
        Err(error) => FileOutcome::Failed(FileFailure {
            source: origin,
            error,
        }),
    }
}

async fn transform_and_write(
    spec: &PipelineSpec,
    matched: &MatchedFile,
    dest: &Path,
    options: &PipelineOptions,
) -> Result<Option<PathBuf>, AppError> {
    let mut file = SourceFile::read(matched).await?;

    for step in &spec.steps {
        let outcome = apply_step(step.as_ref(), &file, options.step_timeout).await?;
        match outcome {
            StepOutcome::Emit(result) => file = file.apply(result),
            StepOutcome::Skip => {
                tracing::debug!(
                    pipeline = %spec.name,
                    step = step.name(),
                    file = %slash_path(file.relative()),
                    "file skipped"
                );
                return Ok(None);
            }
        }
    }

    let target = dest.join(file.relative());
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|err| {
            AppError::filesystem("create directory", parent, err).with_code("BLD-FS-002")
        })?;
    }
    tokio::fs::write(&target, file.contents())
        .await
        .map_err(|err| AppError::filesystem("write", &target, err).with_code("BLD-FS-003"))?;
    tracing::trace!(pipeline = %spec.name, target = %target.display(), "file written");
    Ok(Some(target))
}

async fn apply_step(
    step: &dyn TransformStep,
    file: &SourceFile,
    timeout: Option<Duration>,
) -> Result<StepOutcome, AppError> {
    let Some(limit) = timeout else {
        return step.apply(file).await;
    };
    match tokio::time::timeout(limit, step.apply(file)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(AppError::new(
            ErrorCategory::TimeoutError,
            format!(
                "step '{}' exceeded {} on {}",
                step.name(),
                humantime::format_duration(limit),
                file.path().display()
            ),
        )
        .with_code("BLD-TIME-001")
        .with_path(file.path())
        .with_context("step", step.name())),
    }
}
