use clap::Args;

#[derive(Args, Debug, Default, Clone)]
pub struct WatchArgs {
    /// Preview server port, 0 for any free port (default: preview.port, 8080)
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Rebuild on change without starting the preview server
    #[arg(long)]
    pub no_preview: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Name of the task to run
    #[arg(value_name = "TASK")]
    pub task: String,
}

#[derive(Args, Debug, Default, Clone)]
pub struct TasksArgs {
    /// Print the task graph in Graphviz DOT format
    #[arg(long)]
    pub dot: bool,
}
