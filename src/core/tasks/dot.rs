use super::RegisteredTask;
use indexmap::IndexMap;
use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;
use std::fmt;

/// Node weight carrying task display information.
struct TaskLabel {
    name: String,
    kind: &'static str,
}

impl fmt::Display for TaskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.name, self.kind)
    }
}

/// Render task references as Graphviz DOT. Edges point from a composite
/// task to the tasks it runs.
pub(super) fn render(graph: &DiGraph<String, ()>, tasks: &IndexMap<String, RegisteredTask>) -> String {
    let labelled = graph.map(
        |_, name| TaskLabel {
            name: name.clone(),
            kind: tasks
                .get(name)
                .map(|task| task.node.kind())
                .unwrap_or("task"),
        },
        |_, _| "",
    );
    format!("{}", Dot::with_config(&labelled, &[Config::EdgeNoLabel]))
}
