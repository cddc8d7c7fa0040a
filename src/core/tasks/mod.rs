//! Named task graph: pipelines composed with `series` and `parallel`.
//!
//! Tasks are registered through [`TaskRegistryBuilder`], which validates the
//! whole graph (duplicate names, unknown references, cycles) before any task
//! can run.

#![allow(clippy::result_large_err)] // Task graph returns AppError with graph diagnostics.

pub mod builtin;
mod dot;

use crate::core::config::TaskDecl;
use crate::core::error::AppError;
use crate::core::pipeline::{self, PipelineOptions, PipelineReport, PipelineSpec};
use crate::core::types::BuildStatus;
use futures::future::{join_all, BoxFuture, FutureExt};
use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

pub use builtin::register_builtins;

/// A node of the task graph.
#[derive(Debug, Clone)]
pub enum TaskNode {
    Pipeline(Arc<PipelineSpec>),
    /// Reference to another registered task by name.
    Task(String),
    Series(Vec<TaskNode>),
    Parallel(Vec<TaskNode>),
}

impl TaskNode {
    pub fn pipeline(spec: PipelineSpec) -> Self {
        TaskNode::Pipeline(Arc::new(spec))
    }

    pub fn task(name: impl Into<String>) -> Self {
        TaskNode::Task(name.into())
    }

    pub fn series(children: impl IntoIterator<Item = TaskNode>) -> Self {
        TaskNode::Series(children.into_iter().collect())
    }

    pub fn parallel(children: impl IntoIterator<Item = TaskNode>) -> Self {
        TaskNode::Parallel(children.into_iter().collect())
    }

    /// Names of every task referenced anywhere below this node.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TaskNode::Pipeline(_) => {}
            TaskNode::Task(name) => out.push(name),
            TaskNode::Series(children) | TaskNode::Parallel(children) => {
                for child in children {
                    child.collect_references(out);
                }
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            TaskNode::Pipeline(_) => "pipeline",
            TaskNode::Task(_) => "alias",
            TaskNode::Series(_) => "series",
            TaskNode::Parallel(_) => "parallel",
        }
    }
}

/// A named entry of the graph.
#[derive(Debug, Clone)]
pub struct RegisteredTask {
    pub name: String,
    pub description: Option<String>,
    pub node: TaskNode,
}

/// Collects task registrations; `build` validates them into a [`TaskGraph`].
#[derive(Debug, Default)]
pub struct TaskRegistryBuilder {
    tasks: Vec<RegisteredTask>,
}

impl TaskRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, node: TaskNode) -> Self {
        self.tasks.push(RegisteredTask {
            name: name.into(),
            description: None,
            node,
        });
        self
    }

    pub fn register_described(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        node: TaskNode,
    ) -> Self {
        self.tasks.push(RegisteredTask {
            name: name.into(),
            description: Some(description.into()),
            node,
        });
        self
    }

    /// Register composite tasks declared in configuration.
    pub fn register_declared(
        mut self,
        declared: &IndexMap<String, TaskDecl>,
    ) -> Result<Self, AppError> {
        for (name, decl) in declared {
            let node = match (&decl.series, &decl.parallel) {
                (Some(children), None) => {
                    TaskNode::series(children.iter().map(TaskNode::task))
                }
                (None, Some(children)) => {
                    TaskNode::parallel(children.iter().map(TaskNode::task))
                }
                _ => {
                    return Err(AppError::config(format!(
                        "task '{}' must declare exactly one of series or parallel",
                        name
                    ))
                    .with_code("BLD-CONFIG-014"))
                }
            };
            self.tasks.push(RegisteredTask {
                name: name.clone(),
                description: decl.description.clone(),
                node,
            });
        }
        Ok(self)
    }

    pub fn build(self) -> Result<TaskGraph, AppError> {
        let mut tasks: IndexMap<String, RegisteredTask> = IndexMap::new();
        for task in self.tasks {
            if tasks.contains_key(&task.name) {
                return Err(AppError::config(format!(
                    "task '{}' is registered more than once",
                    task.name
                ))
                .with_code("BLD-GRAPH-001")
                .with_context("task", task.name));
            }
            tasks.insert(task.name.clone(), task);
        }

        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut indices: HashMap<String, NodeIndex> = HashMap::new();
        for name in tasks.keys() {
            indices.insert(name.clone(), graph.add_node(name.clone()));
        }
        for task in tasks.values() {
            let from = indices[&task.name];
            for reference in task.node.references() {
                let Some(&to) = indices.get(reference) else {
                    return Err(AppError::config(format!(
                        "task '{}' references unknown task '{}'",
                        task.name, reference
                    ))
                    .with_code("BLD-GRAPH-002")
                    .with_context("task", task.name.clone()));
                };
                graph.update_edge(from, to, ());
            }
        }

        for component in tarjan_scc(&graph) {
            let cyclic = component.len() > 1
                || component
                    .first()
                    .is_some_and(|&node| graph.contains_edge(node, node));
            if cyclic {
                let mut names: Vec<&str> =
                    component.iter().map(|&node| graph[node].as_str()).collect();
                names.sort_unstable();
                return Err(AppError::config(format!(
                    "task graph contains a cycle through: {}",
                    names.join(", ")
                ))
                .with_code("BLD-GRAPH-003"));
            }
        }

        Ok(TaskGraph { tasks, graph })
    }
}

/// Fatal error of one pipeline during a run.
#[derive(Debug)]
pub struct FatalError {
    pub pipeline: String,
    pub error: AppError,
}

/// Aggregated result of running a task.
#[derive(Debug)]
pub struct BuildSummary {
    pub task: String,
    pub run_id: uuid::Uuid,
    pub reports: Vec<PipelineReport>,
    pub fatal: Vec<FatalError>,
    pub elapsed: Duration,
}

impl BuildSummary {
    pub fn status(&self) -> BuildStatus {
        merged_status(&self.reports, &self.fatal)
    }

    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }

    pub fn files_written(&self) -> usize {
        self.reports.iter().map(PipelineReport::written).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.fatal.len()
            + self
                .reports
                .iter()
                .map(|report| report.failures.len())
                .sum::<usize>()
    }

    /// Report of the named pipeline, if it ran.
    pub fn report(&self, pipeline: &str) -> Option<&PipelineReport> {
        self.reports.iter().find(|report| report.pipeline == pipeline)
    }
}

/// Most severe status across pipeline reports and fatal errors.
fn merged_status(reports: &[PipelineReport], fatal: &[FatalError]) -> BuildStatus {
    let base = if fatal.is_empty() {
        BuildStatus::Succeeded
    } else {
        BuildStatus::Fatal
    };
    reports
        .iter()
        .fold(base, |status, report| status.merge(report.status()))
}

#[derive(Debug, Default)]
struct Outcome {
    reports: Vec<PipelineReport>,
    fatal: Vec<FatalError>,
}

impl Outcome {
    fn status(&self) -> BuildStatus {
        merged_status(&self.reports, &self.fatal)
    }

    fn absorb(&mut self, other: Outcome) {
        self.reports.extend(other.reports);
        self.fatal.extend(other.fatal);
    }
}

/// Summary row for task listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub name: String,
    pub kind: &'static str,
    pub description: Option<String>,
    pub depends_on: Vec<String>,
}

/// Validated, runnable task graph.
#[derive(Debug)]
pub struct TaskGraph {
    tasks: IndexMap<String, RegisteredTask>,
    graph: DiGraph<String, ()>,
}

impl TaskGraph {
    pub fn builder() -> TaskRegistryBuilder {
        TaskRegistryBuilder::new()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Tasks in registration order.
    pub fn list(&self) -> Vec<TaskInfo> {
        self.tasks
            .values()
            .map(|task| {
                let mut depends_on: Vec<String> = Vec::new();
                for reference in task.node.references() {
                    if !depends_on.iter().any(|known| known == reference) {
                        depends_on.push(reference.to_string());
                    }
                }
                TaskInfo {
                    name: task.name.clone(),
                    kind: task.node.kind(),
                    description: task.description.clone(),
                    depends_on,
                }
            })
            .collect()
    }

    /// Graphviz DOT rendering of task references.
    pub fn to_dot(&self) -> String {
        dot::render(&self.graph, &self.tasks)
    }

    /// Run a registered task to completion.
    pub async fn run(
        &self,
        name: &str,
        root: &Path,
        options: &PipelineOptions,
    ) -> Result<BuildSummary, AppError> {
        let task = self.tasks.get(name).ok_or_else(|| {
            AppError::config(format!("unknown task '{}'", name))
                .with_code("BLD-GRAPH-004")
                .with_context("task", name)
        })?;

        let run_id = uuid::Uuid::new_v4();
        let started = Instant::now();
        let span = tracing::info_span!("task", task = %name, run_id = %run_id);
        let outcome = self
            .execute(&task.node, root, options)
            .instrument(span)
            .await;

        let summary = BuildSummary {
            task: name.to_string(),
            run_id,
            reports: outcome.reports,
            fatal: outcome.fatal,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            task = %name,
            run_id = %run_id,
            status = %summary.status(),
            written = summary.files_written(),
            failures = summary.failure_count(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "task finished"
        );
        Ok(summary)
    }

    fn execute<'a>(
        &'a self,
        node: &'a TaskNode,
        root: &'a Path,
        options: &'a PipelineOptions,
    ) -> BoxFuture<'a, Outcome> {
        async move {
            match node {
                TaskNode::Pipeline(spec) => {
                    let span = tracing::info_span!("pipeline", pipeline = %spec.name());
                    match pipeline::run(spec, root, options).instrument(span).await {
                        Ok(report) => Outcome {
                            reports: vec![report],
                            fatal: Vec::new(),
                        },
                        Err(error) => {
                            tracing::error!(pipeline = %spec.name(), code = %error.code, "{}", error.message);
                            Outcome {
                                reports: Vec::new(),
                                fatal: vec![FatalError {
                                    pipeline: spec.name().to_string(),
                                    error,
                                }],
                            }
                        }
                    }
                }
                TaskNode::Task(name) => match self.tasks.get(name) {
                    Some(task) => self.execute(&task.node, root, options).await,
                    // build() rejects unknown references
                    None => Outcome::default(),
                },
                TaskNode::Series(children) => {
                    let mut outcome = Outcome::default();
                    for (position, child) in children.iter().enumerate() {
                        let result = self.execute(child, root, options).await;
                        let status = result.status();
                        outcome.absorb(result);
                        if !status.is_success() {
                            let remaining = children.len() - position - 1;
                            if remaining > 0 {
                                tracing::warn!(
                                    status = %status,
                                    skipped = remaining,
                                    "series stopped after failed step"
                                );
                            }
                            break;
                        }
                    }
                    outcome
                }
                TaskNode::Parallel(children) => {
                    let results = join_all(
                        children
                            .iter()
                            .map(|child| self.execute(child, root, options)),
                    )
                    .await;
                    let mut outcome = Outcome::default();
                    for result in results {
                        outcome.absorb(result);
                    }
                    outcome
                }
            }
        }
        .boxed()
    }
}
